//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod advancement_lock;
pub mod background_job;
pub mod transaction;
pub mod user;
pub mod user_settings;

// Re-export specific types to avoid conflicts
pub use advancement_lock::{
    Column as AdvancementLockColumn, Entity as AdvancementLock, Model as AdvancementLockModel,
};
pub use background_job::{
    Column as BackgroundJobColumn, Entity as BackgroundJob, Model as BackgroundJobModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
pub use user_settings::{
    Column as UserSettingsColumn, Entity as UserSettings, Model as UserSettingsModel,
};
