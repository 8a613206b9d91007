//! Unified error type for the finance tracker.
//!
//! Store failures surface as [`Error::Database`] and are always retryable. Losing the
//! daily sweep lock is not an error at all; see [`crate::core::sweep::SweepOutcome`].

use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Any failure from the persistence layer
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Malformed input such as a bad date string or an unknown recurrence rule
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Amount that is zero, negative, or not a finite number
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Settings file could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Details about the configuration failure
        message: String,
    },

    /// No transaction with this id exists for the requesting user
    #[error("Transaction not found: {id}")]
    TransactionNotFound {
        /// Transaction id that was looked up
        id: String,
    },

    /// No user with this id exists
    #[error("User not found: {id}")]
    UserNotFound {
        /// User id that was looked up
        id: String,
    },

    /// Caller lacks the role needed for the operation
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Why access was refused
        message: String,
    },

    /// Background job with a type the worker does not know how to run
    #[error("Unknown job type: {job_type}")]
    UnknownJobType {
        /// The unrecognised type tag
        job_type: String,
    },

    /// Job payload could not be encoded or decoded
    #[error("Job payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Filesystem failure, e.g. while reading the settings file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds a [`Error::Validation`] from anything printable.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether retrying the same operation later can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DbErr;

    #[test]
    fn test_database_errors_are_retryable() {
        let err: Error = DbErr::Custom("connection reset".to_string()).into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        let err = Error::validation("bad date");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Validation error: bad date");
    }
}
