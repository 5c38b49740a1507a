//! Field mapper
//!
//! Evaluates user-configured [`FieldMappingRule`]s against remote documents.
//! Evaluation never coerces types: the caller interprets the returned JSON
//! scalar against the target field.

use serde_json::Value;
use tracing::warn;
use woosync_core::domain::{FieldMappingRule, PathQuery, RemoteRecord};

use crate::error::ReconcileError;

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Stateless evaluator for single rules
pub struct FieldMapper;

impl FieldMapper {
    /// Value for the rule's local field, or `None` when nothing matches
    ///
    /// The first match counts; `null`, objects and arrays are absent.
    ///
    /// # Errors
    /// `InvalidExpression` when the rule's expression does not parse. This
    /// is a configuration error, distinct from "no match".
    pub fn evaluate(
        record: &RemoteRecord,
        rule: &FieldMappingRule,
    ) -> Result<Option<Value>, ReconcileError> {
        let query = rule
            .to_query()
            .map_err(|source| ReconcileError::InvalidExpression {
                local_field: rule.local_field().to_string(),
                source,
            })?;
        Ok(first_scalar(&query, record.body()))
    }
}

fn first_scalar(query: &PathQuery, document: &Value) -> Option<Value> {
    query
        .select_first(document)
        .filter(|v| is_scalar(v))
        .cloned()
}

#[derive(Debug, Clone)]
struct CompiledRule {
    local_field: String,
    query: PathQuery,
}

/// The mapping rules of one server, parsed once per pass
///
/// Rules that fail to parse are skipped with a warning and kept as
/// configuration errors so the pass can report them.
#[derive(Debug, Clone, Default)]
pub struct MappingSet {
    rules: Vec<CompiledRule>,
    errors: Vec<ReconcileError>,
}

impl MappingSet {
    /// Compile a rule list
    pub fn compile(rules: &[FieldMappingRule]) -> Self {
        let mut set = MappingSet::default();
        for rule in rules {
            match rule.to_query() {
                Ok(query) => set.rules.push(CompiledRule {
                    local_field: rule.local_field().to_string(),
                    query,
                }),
                Err(source) => {
                    warn!(
                        field = %rule.local_field(),
                        expression = %rule.remote_source(),
                        error = %source,
                        "Skipping invalid field mapping"
                    );
                    set.errors.push(ReconcileError::InvalidExpression {
                        local_field: rule.local_field().to_string(),
                        source,
                    });
                }
            }
        }
        set
    }

    /// Number of usable rules
    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }

    /// Rules that failed to compile
    pub fn errors(&self) -> &[ReconcileError] {
        &self.errors
    }

    /// Local field values extracted from a remote record
    ///
    /// Fields whose expression matches nothing are left out.
    pub fn extract(&self, record: &RemoteRecord) -> Vec<(String, Value)> {
        self.rules
            .iter()
            .filter_map(|rule| {
                first_scalar(&rule.query, record.body()).map(|v| (rule.local_field.clone(), v))
            })
            .collect()
    }

    /// Write local field values into a remote request body
    ///
    /// `local_value` returns the current value of a local field. Returns the
    /// number of fields written.
    pub fn apply_to_remote<F>(&self, body: &mut Value, local_value: F) -> usize
    where
        F: Fn(&str) -> Option<Value>,
    {
        let mut written = 0;
        for rule in &self.rules {
            let Some(value) = local_value(&rule.local_field) else {
                continue;
            };
            if rule.query.assign(body, value) {
                written += 1;
            } else {
                warn!(
                    field = %rule.local_field,
                    expression = %rule.query,
                    "Cannot write mapped field to remote document"
                );
            }
        }
        written
    }
}
