//! Remote (WooCommerce) records
//!
//! A [`RemoteRecord`] is a read-only view of a document fetched from the
//! commerce platform. The structured body is kept as a generic JSON tree so
//! that user-configured path-query mappings can address any member,
//! including vendor-specific `meta_data` entries.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::link::RemoteVersion;
use super::newtypes::RemoteId;

/// Kind of remote resource, including the parent for product variations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteEntity {
    /// A product (`simple` or `variable`)
    Product,
    /// A variation belonging to a `variable` product
    Variation {
        /// Remote id of the parent product
        parent: RemoteId,
    },
    /// A customer order
    Order,
}

impl RemoteEntity {
    /// REST collection path relative to the API root, e.g. `products/7/variations`
    pub fn endpoint(&self) -> String {
        match self {
            RemoteEntity::Product => "products".to_string(),
            RemoteEntity::Variation { parent } => format!("products/{parent}/variations"),
            RemoteEntity::Order => "orders".to_string(),
        }
    }
}

impl std::fmt::Display for RemoteEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteEntity::Product => write!(f, "product"),
            RemoteEntity::Variation { parent } => write!(f, "variation of {parent}"),
            RemoteEntity::Order => write!(f, "order"),
        }
    }
}

/// Parse a WooCommerce timestamp
///
/// The REST API emits `YYYY-MM-DDTHH:MM:SS` without an offset; the `_gmt`
/// variants are UTC. RFC 3339 strings are accepted too.
pub fn parse_remote_datetime(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
                .map(|ndt| ndt.and_utc())
                .ok()
        })
}

/// A document fetched from the commerce platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    entity: RemoteEntity,
    id: RemoteId,
    modified: DateTime<Utc>,
    body: Value,
}

impl RemoteRecord {
    /// Build a record from a REST response body
    ///
    /// # Errors
    /// Returns `MalformedRecord` if the body is not an object, lacks a valid
    /// `id`, or carries no parseable modification timestamp.
    pub fn from_json(entity: RemoteEntity, body: Value) -> Result<Self, DomainError> {
        if !body.is_object() {
            return Err(DomainError::MalformedRecord(format!(
                "{entity} payload is not an object"
            )));
        }

        let id = body
            .get("id")
            .and_then(value_as_u64)
            .ok_or_else(|| DomainError::MalformedRecord(format!("{entity} has no id")))?;
        let id = RemoteId::from_u64(id)
            .map_err(|e| DomainError::MalformedRecord(format!("{entity}: {e}")))?;

        let modified = ["date_modified_gmt", "date_modified"]
            .iter()
            .filter_map(|key| body.get(*key).and_then(Value::as_str))
            .find_map(parse_remote_datetime)
            .ok_or_else(|| {
                DomainError::MalformedRecord(format!("{entity} {id} has no modification date"))
            })?;

        Ok(Self {
            entity,
            id,
            modified,
            body,
        })
    }

    /// Resource kind
    pub fn entity(&self) -> &RemoteEntity {
        &self.entity
    }

    /// Platform-assigned id
    pub fn id(&self) -> &RemoteId {
        &self.id
    }

    /// Last modification time on the platform (UTC)
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// The full document
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Consume the record, returning the document
    pub fn into_body(self) -> Value {
        self.body
    }

    /// Timestamp view used by the reconciliation engine
    pub fn version(&self) -> RemoteVersion {
        RemoteVersion {
            modified: self.modified,
        }
    }

    /// A top-level member, treating JSON `null` as absent
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name).filter(|v| !v.is_null())
    }

    /// A top-level string member, treating blank strings as absent
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// A top-level integer member, accepting numeric strings
    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.field(name).and_then(value_as_u64)
    }

    /// A top-level money/quantity member (WooCommerce sends most as strings)
    pub fn decimal_field(&self, name: &str) -> Option<Decimal> {
        self.field(name).and_then(value_as_decimal)
    }

    /// Creation time on the platform, if present
    pub fn date_created(&self) -> Option<DateTime<Utc>> {
        ["date_created_gmt", "date_created"]
            .iter()
            .filter_map(|key| self.body.get(*key).and_then(Value::as_str))
            .find_map(parse_remote_datetime)
    }

    /// Payment time of an order; absent until the order is paid
    pub fn date_paid(&self) -> Option<DateTime<Utc>> {
        ["date_paid_gmt", "date_paid"]
            .iter()
            .filter_map(|key| self.body.get(*key).and_then(Value::as_str))
            .find_map(parse_remote_datetime)
    }

    /// Text value of the first `meta_data` entry with the given key
    ///
    /// Blank values count as absent.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.field("meta_data")?
            .as_array()?
            .iter()
            .find(|entry| entry.get("key").and_then(Value::as_str) == Some(key))
            .and_then(|entry| entry.get("value"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Remote status slug (`processing`, `on-hold`, `publish`, ...)
    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }
}

/// Interpret a JSON value as an unsigned integer (number or numeric string)
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Interpret a JSON value as a decimal amount (number or numeric string)
pub fn value_as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) if !s.trim().is_empty() => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}
