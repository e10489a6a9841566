//! Error types for the Tandem engine.
//!
//! Most reconciliation paths never surface these: a field that cannot be
//! converted or an event for an unknown type is logged and skipped. Errors are
//! returned from construction and validation APIs only.

use crate::EntityId;
use thiserror::Error;

/// All possible errors from the Tandem engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Configuration errors
    #[error("translator already registered for type: {0}")]
    DuplicateTranslator(String),

    // Lookup errors
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    // Representability errors
    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("array length mismatch: declared {declared}, payload has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    // Persistence errors
    #[error("invalid identifier list: {0}")]
    InvalidIdList(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::DuplicateTranslator("mesh".into());
        assert_eq!(err.to_string(), "translator already registered for type: mesh");

        let err = Error::LengthMismatch {
            declared: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "array length mismatch: declared 3, payload has 2"
        );

        let err = Error::TypeMismatch {
            field: "visible".into(),
            expected: "Bool".into(),
            got: "Int".into(),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for field 'visible': expected Bool, got Int"
        );
    }
}
