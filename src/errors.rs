//! Unified error types for the habit tracker.
//!
//! Every variant is recoverable from the application's point of view: a rejected
//! operation leaves state untouched, and a failed write leaves the in-memory state
//! authoritative until the next successful flush.

use thiserror::Error;

/// All errors surfaced by the habit tracker core and its reminder machinery.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any state was touched (names, frequency, time, weekday, date key)
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// Goal targets and overrides must be finite and greater than zero
    #[error("Invalid target: {target} (must be greater than 0)")]
    InvalidTarget {
        /// The rejected value
        target: f64,
    },

    /// No habit with the given id exists
    #[error("Habit not found: {id}")]
    HabitNotFound {
        /// The requested habit id
        id: String,
    },

    /// No category with the given name exists
    #[error("Category not found: {name}")]
    CategoryNotFound {
        /// The requested category name
        name: String,
    },

    /// Imported text could not be parsed as JSON at all
    #[error("Import failed: {message}")]
    MalformedImport {
        /// Parser message
        message: String,
    },

    /// The durable store rejected a read or write
    #[error("Persistence error: {message}")]
    Persistence {
        /// Underlying failure description
        message: String,
    },

    /// Database driver error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// JSON encoding/decoding error for persisted documents
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The background context is not currently reachable
    #[error("Background reminder worker is not reachable")]
    SyncUnreachable,

    /// Settings file or environment is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable reason
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] rejection.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// True for failures the application keeps running through.
    ///
    /// Only bootstrap failures (configuration, I/O, environment) are not; everything
    /// the core raises while the app is interactive is recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::Io(_) | Self::EnvVar(_))
    }

    /// True when the error only means the latest change has not reached durable storage.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Persistence { .. } | Self::Database(_) | Self::Serialization(_)
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_recoverable() {
        let err = Error::validation("Habit name is required.");
        assert!(err.is_recoverable());
        assert!(!err.is_persistence());
        assert_eq!(err.to_string(), "Validation error: Habit name is required.");
    }

    #[test]
    fn test_persistence_errors_are_flagged() {
        let err = Error::Persistence {
            message: "disk full".to_string(),
        };
        assert!(err.is_persistence());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_config_is_not_recoverable() {
        let err = Error::Config {
            message: "bad toml".to_string(),
        };
        assert!(!err.is_recoverable());
    }
}
