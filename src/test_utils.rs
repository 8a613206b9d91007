//! Shared test utilities for `fintrack`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        date::{Recurrence, parse_date},
        transaction::TransactionStatus,
        user::{Role, create_user},
    },
    entities,
    errors::Result,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Registers a client user (with default settings) under `email`.
pub async fn create_test_user(db: &DatabaseConnection, email: &str) -> Result<entities::user::Model> {
    create_user(db, email, Role::Client).await
}

/// Inserts a transaction row directly, bypassing validation and successor creation.
///
/// # Defaults
/// * `transaction_type`: `"expense"`
/// * `category`: `"rent"`
/// * `description`: `"Test transaction"`
pub async fn create_custom_transaction(
    db: &DatabaseConnection,
    user_id: &str,
    date: &str,
    status: TransactionStatus,
    recurrence: Recurrence,
    amount: f64,
) -> Result<entities::transaction::Model> {
    insert_transaction(db, user_id, "expense", "rent", amount, date, status, recurrence).await
}

/// Inserts a one-off transaction with an explicit type and category.
pub async fn create_typed_transaction(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_type: &str,
    category: &str,
    amount: f64,
    date: &str,
    status: TransactionStatus,
) -> Result<entities::transaction::Model> {
    insert_transaction(
        db,
        user_id,
        transaction_type,
        category,
        amount,
        date,
        status,
        Recurrence::None,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn insert_transaction(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_type: &str,
    category: &str,
    amount: f64,
    date: &str,
    status: TransactionStatus,
    recurrence: Recurrence,
) -> Result<entities::transaction::Model> {
    let model = entities::transaction::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(user_id.to_string()),
        transaction_type: Set(transaction_type.to_string()),
        category: Set(category.to_string()),
        amount: Set(amount),
        description: Set(Some("Test transaction".to_string())),
        date: Set(parse_date(date)?),
        status: Set(status.as_str().to_string()),
        recurrence: Set(recurrence.as_str().to_string()),
        is_modified: Set(false),
        created_at: Set(Utc::now()),
    };
    Ok(model.insert(db).await?)
}

/// Sets up a complete test environment with one client user.
/// Returns (db, user) for common test scenarios.
pub async fn setup_with_user() -> Result<(DatabaseConnection, entities::user::Model)> {
    let db = setup_test_db().await?;
    let user = create_test_user(&db, "test@example.com").await?;
    Ok((db, user))
}
