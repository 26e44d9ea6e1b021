//! # Validation Module
//!
//! Input validation utilities for Flashdeck.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Editor UI (TypeScript)                                       │
//! │  ├── Basic format checks (empty name prompt)                           │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Item Store (Rust)                                            │
//! │  ├── THIS MODULE: names, owner ids, chunk sizes                        │
//! │  └── Structural checks (parent exists, parent is a folder)             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Local cache (SQLite)                                         │
//! │  └── NOT NULL / PRIMARY KEY constraints                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use flashdeck_core::validation::{validate_item_name, validate_max_cards};
//!
//! let name = validate_item_name("  Spanish verbs ").unwrap();
//! assert_eq!(name, "Spanish verbs");
//!
//! assert!(validate_max_cards(30).is_ok());
//! ```

use crate::error::ValidationError;
use crate::{MAX_NAME_LEN, MAX_OWNER_ID_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Upper bound for cards per set when splitting a large import.
pub const MAX_CARDS_PER_SET: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a folder or set name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters (counted as chars, not bytes)
///
/// ## Returns
/// The trimmed name.
///
/// ```rust
/// use flashdeck_core::validation::validate_item_name;
///
/// assert!(validate_item_name("Animals").is_ok());
/// assert!(validate_item_name("   ").is_err());
/// assert!(validate_item_name(&"x".repeat(201)).is_err());
/// ```
pub fn validate_item_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates an owner identity before it becomes part of a cache key.
///
/// Empty or whitespace-only ids are rejected; callers wanting the anonymous
/// namespace pass `None` instead.
pub fn validate_owner_id(owner: &str) -> ValidationResult<()> {
    if owner.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "owner".to_string(),
        });
    }

    if owner.len() > MAX_OWNER_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "owner".to_string(),
            max: MAX_OWNER_ID_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the chunk size used when splitting a set.
pub fn validate_max_cards(max_cards: usize) -> ValidationResult<()> {
    if max_cards == 0 || max_cards > MAX_CARDS_PER_SET {
        return Err(ValidationError::OutOfRange {
            field: "max_cards".to_string(),
            min: 1,
            max: MAX_CARDS_PER_SET as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_item_name() {
        assert_eq!(validate_item_name("Animals").unwrap(), "Animals");
        assert_eq!(validate_item_name("  Verbs  ").unwrap(), "Verbs");

        assert!(validate_item_name("").is_err());
        assert!(validate_item_name(" \t ").is_err());
        assert!(validate_item_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_name_length_counts_chars() {
        // 200 two-byte chars is still within the limit
        let name = "é".repeat(200);
        assert!(validate_item_name(&name).is_ok());
    }

    #[test]
    fn test_validate_owner_id() {
        assert!(validate_owner_id("user-42").is_ok());
        assert!(validate_owner_id("").is_err());
        assert!(validate_owner_id(&"u".repeat(MAX_OWNER_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_max_cards() {
        assert!(validate_max_cards(1).is_ok());
        assert!(validate_max_cards(30).is_ok());
        assert!(validate_max_cards(MAX_CARDS_PER_SET).is_ok());

        assert!(validate_max_cards(0).is_err());
        assert!(validate_max_cards(MAX_CARDS_PER_SET + 1).is_err());
    }
}
