//! # Error Types
//!
//! Domain-specific error types for flashdeck-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  flashdeck-core errors (this file)                                     │
//! │  ├── CoreError        - Store operations that must report failure      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  flashdeck-db errors (separate crate)                                  │
//! │  └── DbError          - Local cache failures                           │
//! │                                                                         │
//! │  flashdeck-sync errors (separate crate)                                │
//! │  └── SyncError        - Remote / configuration failures                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Availability First
//! Most store operations never return an error at all. Renaming, moving or
//! deleting an unknown id is a silent no-op. Only `create` reports failures,
//! because the caller needs the new id back.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Store errors that are surfaced to the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Referenced item does not exist.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// New item would be placed under something that is not a folder.
    ///
    /// ## When This Occurs
    /// - Creating an item inside a set
    /// - Parent id refers to a set that was converted by a remote merge
    #[error("Parent {0} is not a folder")]
    ParentNotFolder(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::ParentNotFolder("set-1".to_string());
        assert_eq!(err.to_string(), "Parent set-1 is not a folder");

        let err = ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        };
        assert_eq!(err.to_string(), "name must be at most 200 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
