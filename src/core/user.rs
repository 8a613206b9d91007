//! User account operations: registration, login bookkeeping and the admin client list.

use crate::{
    core::settings::default_settings,
    entities::{Transaction, User, transaction, user},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;

/// Access level of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular user managing their own finances
    #[default]
    Client,
    /// May list every client account
    Admin,
}

impl Role {
    /// Storage form of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "client" => Ok(Self::Client),
            "admin" => Ok(Self::Admin),
            other => Err(Error::validation(format!("unknown role '{other}'"))),
        }
    }
}

/// A client as shown in the admin list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    /// User id
    pub id: String,
    /// Normalised email
    pub email: String,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Last login, if the client ever logged in
    pub last_login_at: Option<DateTime<Utc>>,
    /// Number of transactions the client owns
    pub transaction_count: i64,
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::validation(format!("invalid email '{email}'")));
    }
    Ok(email)
}

/// Registers a user and its default settings row.
///
/// The email is trimmed and lowercased; registering an address twice fails validation.
#[instrument(skip(db))]
pub async fn create_user(db: &DatabaseConnection, email: &str, role: Role) -> Result<user::Model> {
    let email = normalize_email(email)?;

    let existing = User::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::validation(format!("email '{email}' is already registered")));
    }

    let txn = db.begin().await?;
    let user = user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set(email),
        role: Set(role.as_str().to_string()),
        created_at: Set(Utc::now()),
        last_login_at: Set(None),
    }
    .insert(&txn)
    .await?;
    default_settings(&user.id).insert(&txn).await?;
    txn.commit().await?;

    tracing::info!(user_id = %user.id, role = %role, "Registered user");
    Ok(user)
}

/// Looks up a user by id.
pub async fn get_user(db: &DatabaseConnection, user_id: &str) -> Result<user::Model> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            id: user_id.to_string(),
        })
}

/// Stamps the user's last login time.
pub async fn record_login(
    db: &DatabaseConnection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = User::update_many()
        .col_expr(user::Column::LastLoginAt, Expr::value(Some(now)))
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::UserNotFound {
            id: user_id.to_string(),
        });
    }
    Ok(())
}

/// Lists every client account, newest first, with its transaction count.
///
/// Only admins may call this.
pub async fn list_clients(
    db: &DatabaseConnection,
    requester_id: &str,
) -> Result<Vec<ClientSummary>> {
    let requester = get_user(db, requester_id).await?;
    if requester.role != Role::Admin.as_str() {
        return Err(Error::Forbidden {
            message: "only admins can list clients".to_string(),
        });
    }

    let clients = User::find()
        .filter(user::Column::Role.eq(Role::Client.as_str()))
        .order_by_desc(user::Column::CreatedAt)
        .all(db)
        .await?;

    let counts: HashMap<String, i64> = Transaction::find()
        .select_only()
        .column(transaction::Column::UserId)
        .column_as(Expr::col(transaction::Column::Id).count(), "count")
        .group_by(transaction::Column::UserId)
        .into_tuple::<(String, i64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    Ok(clients
        .into_iter()
        .map(|client| ClientSummary {
            transaction_count: counts.get(&client.id).copied().unwrap_or(0),
            id: client.id,
            email: client.email,
            created_at: client.created_at,
            last_login_at: client.last_login_at,
        })
        .collect())
}
