//! Database configuration module.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust models.
//! Creation is idempotent (`IF NOT EXISTS`), which lets every process start call it.

use crate::entities::{
    AdvancementLock, BackgroundJob, Transaction, TransactionColumn, User, UserSettings,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

/// Fallback used when neither the settings file nor the environment names a database.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://fintrack.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, or the given fallback.
#[must_use]
pub fn get_database_url(fallback: &str) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| fallback.to_string())
}

/// Establishes a connection to the database at `database_url`.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database");
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all tables (and the due-lookup index) if they do not exist yet.
///
/// Tables are created parents first so the foreign keys on `transactions` and
/// `user_settings` resolve.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut tables = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(UserSettings),
        schema.create_table_from_entity(Transaction),
        schema.create_table_from_entity(AdvancementLock),
        schema.create_table_from_entity(BackgroundJob),
    ];
    for table in &mut tables {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    let due_index = Index::create()
        .if_not_exists()
        .name("idx_transactions_status_date")
        .table(Transaction)
        .col(TransactionColumn::Status)
        .col(TransactionColumn::Date)
        .to_owned();
    db.execute(builder.build(&due_index)).await?;

    info!("Database tables ensured");
    Ok(())
}
