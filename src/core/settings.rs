//! Per-user preferences.

use crate::{
    entities::{UserSettings, user_settings},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};
use serde::Deserialize;

/// Savings goal given to new users
pub const DEFAULT_SAVINGS_GOAL: f64 = 10_000.0;
/// Currency given to new users
pub const DEFAULT_CURRENCY: &str = "EUR";
/// Language given to new users
pub const DEFAULT_LANGUAGE: &str = "es";
/// Interface languages a user may pick
pub const SUPPORTED_LANGUAGES: [&str; 5] = ["es", "en", "ca", "pt", "de"];

/// Settings row with default values for a new user.
pub(crate) fn default_settings(user_id: &str) -> user_settings::ActiveModel {
    user_settings::ActiveModel {
        user_id: Set(user_id.to_string()),
        savings_goal: Set(DEFAULT_SAVINGS_GOAL),
        currency: Set(DEFAULT_CURRENCY.to_string()),
        language: Set(DEFAULT_LANGUAGE.to_string()),
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    /// New savings goal, must be positive
    pub savings_goal: Option<f64>,
    /// New currency code, must not be empty
    pub currency: Option<String>,
    /// New language, one of [`SUPPORTED_LANGUAGES`]
    pub language: Option<String>,
}

impl SettingsUpdate {
    fn validate(&self) -> Result<()> {
        if let Some(goal) = self.savings_goal {
            if !goal.is_finite() || goal <= 0.0 {
                return Err(Error::InvalidAmount { amount: goal });
            }
        }
        if self.currency.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(Error::validation("currency must not be empty"));
        }
        match self.language.as_deref() {
            Some(language) if !SUPPORTED_LANGUAGES.contains(&language) => Err(Error::validation(
                format!("unsupported language '{language}'"),
            )),
            _ => Ok(()),
        }
    }
}

/// Returns the user's settings, or the defaults if none were ever stored.
pub async fn get_settings(db: &DatabaseConnection, user_id: &str) -> Result<user_settings::Model> {
    let stored = UserSettings::find_by_id(user_id).one(db).await?;
    Ok(stored.unwrap_or_else(|| user_settings::Model {
        user_id: user_id.to_string(),
        savings_goal: DEFAULT_SAVINGS_GOAL,
        currency: DEFAULT_CURRENCY.to_string(),
        language: DEFAULT_LANGUAGE.to_string(),
    }))
}

/// Applies a partial settings update, creating the row on first write.
pub async fn update_settings(
    db: &DatabaseConnection,
    user_id: &str,
    update: SettingsUpdate,
) -> Result<user_settings::Model> {
    update.validate()?;

    let current = get_settings(db, user_id).await?;
    let exists = UserSettings::find_by_id(user_id).one(db).await?.is_some();

    let model = user_settings::ActiveModel {
        user_id: Set(user_id.to_string()),
        savings_goal: Set(update.savings_goal.unwrap_or(current.savings_goal)),
        currency: Set(update
            .currency
            .map_or(current.currency, |c| c.trim().to_uppercase())),
        language: Set(update.language.unwrap_or(current.language)),
    };

    let saved = if exists {
        model.update(db).await?
    } else {
        model.insert(db).await?
    };
    Ok(saved)
}

/// Resets a user's settings to defaults. Returns whether a row existed.
pub async fn reset_settings(db: &DatabaseConnection, user_id: &str) -> Result<bool> {
    let result = UserSettings::delete_many()
        .filter(user_settings::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}
