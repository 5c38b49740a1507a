//! Field mapping rules
//!
//! A [`FieldMappingRule`] tells the field mapper where a local field's value
//! lives in a remote document: either a top-level member (direct rule) or a
//! path-query expression.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::path_query::{PathQuery, PathQueryError};

/// A user-configured mapping from a remote value to a local field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldMappingRule {
    /// Copy a top-level remote member
    Direct {
        /// Name of the remote member
        remote_field: String,
        /// Name of the local field
        local_field: String,
    },
    /// Evaluate a path-query expression
    Expression {
        /// Path-query expression, e.g. `$.meta_data[?(@.key=='x')].value`
        expression: String,
        /// Name of the local field
        local_field: String,
    },
}

impl FieldMappingRule {
    /// A direct rule
    pub fn direct(
        remote_field: impl Into<String>,
        local_field: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let remote_field = remote_field.into();
        let local_field = local_field.into();
        if remote_field.trim().is_empty() || local_field.trim().is_empty() {
            return Err(DomainError::InvalidMapping(
                "direct rules need both a remote and a local field".to_string(),
            ));
        }
        Ok(FieldMappingRule::Direct {
            remote_field,
            local_field,
        })
    }

    /// An expression rule; the expression is validated and normalised
    ///
    /// Expressions without the `$` root (older configurations wrote bare
    /// member paths like `meta_data[0].value`) are anchored at `$.`.
    pub fn expression(
        expression: impl Into<String>,
        local_field: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let expression = normalize_expression(&expression.into());
        let local_field = local_field.into();
        if local_field.trim().is_empty() {
            return Err(DomainError::InvalidMapping(
                "expression rules need a local field".to_string(),
            ));
        }
        PathQuery::parse(&expression).map_err(|e| DomainError::InvalidExpression(e.to_string()))?;
        Ok(FieldMappingRule::Expression {
            expression,
            local_field,
        })
    }

    /// The local field this rule writes
    pub fn local_field(&self) -> &str {
        match self {
            FieldMappingRule::Direct { local_field, .. } => local_field,
            FieldMappingRule::Expression { local_field, .. } => local_field,
        }
    }

    /// Text shown to users for the remote side of the rule
    pub fn remote_source(&self) -> &str {
        match self {
            FieldMappingRule::Direct { remote_field, .. } => remote_field,
            FieldMappingRule::Expression { expression, .. } => expression,
        }
    }

    /// Compile the rule into a path query
    ///
    /// Direct rules compile to `$['field']`, which never fails.
    pub fn to_query(&self) -> Result<PathQuery, PathQueryError> {
        match self {
            FieldMappingRule::Direct { remote_field, .. } => {
                let escaped = remote_field.replace('\\', "\\\\").replace('\'', "\\'");
                PathQuery::parse(&format!("$['{escaped}']"))
            }
            FieldMappingRule::Expression { expression, .. } => {
                PathQuery::parse(&normalize_expression(expression))
            }
        }
    }
}

/// Anchor a legacy expression at the document root
pub fn normalize_expression(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.starts_with('$') {
        trimmed.to_string()
    } else {
        format!("$.{trimmed}")
    }
}
