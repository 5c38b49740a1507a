//! Sync scopes and checkpoints

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Independent batch pass families; each has its own checkpoint and lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    /// Products and variations against Items
    Items,
    /// Remote orders against Sales Orders
    SalesOrders,
    /// Stock level push
    Stock,
}

impl SyncScope {
    /// Every scope
    pub const ALL: [SyncScope; 3] = [SyncScope::Items, SyncScope::SalesOrders, SyncScope::Stock];

    /// Stable storage key
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncScope::Items => "items",
            SyncScope::SalesOrders => "sales_orders",
            SyncScope::Stock => "stock",
        }
    }
}

impl Display for SyncScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncScope {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "items" => Ok(SyncScope::Items),
            "sales_orders" | "orders" => Ok(SyncScope::SalesOrders),
            "stock" => Ok(SyncScope::Stock),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown sync scope '{other}'"
            ))),
        }
    }
}

/// Lower bound for delta queries of one scope
///
/// Only moves forward: [`Checkpoint::advance_to`] ignores earlier instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(DateTime<Utc>);

impl Checkpoint {
    /// Checkpoint at the given instant
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// The instant
    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// The later of this checkpoint and `instant`
    #[must_use]
    pub fn advance_to(self, instant: DateTime<Utc>) -> Self {
        Self(self.0.max(instant))
    }
}

impl Display for Checkpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl FromStr for Checkpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| DomainError::ValidationFailed(format!("invalid checkpoint '{s}': {e}")))
    }
}
