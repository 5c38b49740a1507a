//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! identifier validation, remote document decoding, and mapping rules.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid WooCommerce server identifier or URL
    #[error("Invalid server: {0}")]
    InvalidServer(String),

    /// Invalid remote (platform-assigned) ID
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid local item code
    #[error("Invalid item code: {0}")]
    InvalidItemCode(String),

    /// Invalid customer identifier
    #[error("Invalid customer identifier: {0}")]
    InvalidIdentifier(String),

    /// A path-query expression failed to parse
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// A remote document is missing a required attribute or has the wrong shape
    #[error("Malformed remote record: {0}")]
    MalformedRecord(String),

    /// A mapping rule cannot be expressed (e.g. empty target field)
    #[error("Invalid mapping rule: {0}")]
    InvalidMapping(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidRemoteId("abc".to_string());
        assert_eq!(err.to_string(), "Invalid remote ID: abc");

        let err = DomainError::MalformedRecord("missing id".to_string());
        assert_eq!(err.to_string(), "Malformed remote record: missing id");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidItemCode("".to_string());
        let err2 = DomainError::InvalidItemCode("".to_string());
        let err3 = DomainError::InvalidItemCode("x".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
