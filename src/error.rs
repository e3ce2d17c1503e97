//! Error types for gwstats
//!
//! Two levels of error live here. [`StatsError`] is what the public API
//! returns; [`FieldError`] describes a single raw-record field that could
//! not be read and never escapes a decode call.

use thiserror::Error;

/// Result type alias for gwstats operations
pub type Result<T> = std::result::Result<T, StatsError>;

/// Main error type for gwstats operations
#[derive(Error, Debug)]
pub enum StatsError {
    /// Dispatch for an entity the store does not know about
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// Raw record was not a JSON object
    #[error("Raw record must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Entity store capacity reached
    #[error("Entity store full: maximum {max} entities")]
    StoreFull { max: usize },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown entity kind name
    #[error("Unknown entity kind: {0}")]
    UnknownKind(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A raw-record field that could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Field absent from the record
    #[error("Missing field: {0}")]
    Missing(&'static str),

    /// Field present with an unexpected JSON type
    #[error("Field {field} has wrong type: expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    /// Field is not a parseable integer
    #[error("Field {field} is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// Hex text could not be decoded
    #[error("Invalid hex at byte {index} of {field}")]
    InvalidHex { field: &'static str, index: usize },

    /// Hex payload ends before the byte we need
    #[error("Field {field} too short: need byte {needed}, have {available}")]
    TooShort {
        field: &'static str,
        needed: usize,
        available: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StatsError::UnknownEntity("0x00158d0001".to_string());
        assert_eq!(format!("{}", err), "Unknown entity: 0x00158d0001");

        let err = FieldError::TooShort {
            field: "APSPlayload",
            needed: 3,
            available: 2,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("APSPlayload"));
        assert!(msg.contains("need byte 3"));
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StatsError = json_err.into();
        assert!(matches!(err, StatsError::Json(_)));
    }
}
