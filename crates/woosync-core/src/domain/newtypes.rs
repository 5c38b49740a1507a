//! Domain newtypes with validation
//!
//! Identifiers that cross the WooCommerce/ERP boundary (server ids, remote
//! ids, item codes, record names) are validated once, here, and passed
//! around as distinct types so they cannot be mixed up.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Run and log identifiers
// ============================================================================

/// Identifier of a single synchronisation pass (batch or manual)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a RunId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("{s}: {e}")))
    }
}

/// Database-assigned identifier of an error log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorLogId(i64);

impl ErrorLogId {
    /// Create an ErrorLogId from a raw database id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw id
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl Display for ErrorLogId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// WooCommerce identifiers
// ============================================================================

/// Identifier of a WooCommerce server: the authority (host and optional port)
/// of its URL, e.g. `shop.example.com` or `localhost:8080`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerId(String);

impl ServerId {
    /// Create a ServerId from an already-derived authority string
    ///
    /// # Errors
    /// Returns error if the value is empty or contains whitespace or a path
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidServer(
                "Server ID cannot be empty".to_string(),
            ));
        }
        if id.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(DomainError::InvalidServer(format!(
                "Server ID must be a bare domain: {id}"
            )));
        }
        Ok(Self(id.to_ascii_lowercase()))
    }

    /// Derive the ServerId from a server URL
    ///
    /// ```
    /// use woosync_core::domain::ServerId;
    ///
    /// let id = ServerId::from_url("https://Shop.Example.com/").unwrap();
    /// assert_eq!(id.as_str(), "shop.example.com");
    /// ```
    pub fn from_url(raw: &str) -> Result<Self, DomainError> {
        let parsed = url::Url::parse(raw)
            .map_err(|e| DomainError::InvalidServer(format!("{raw}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| DomainError::InvalidServer(format!("{raw}: URL has no host")))?;
        match parsed.port() {
            Some(port) => Self::new(format!("{host}:{port}")),
            None => Self::new(host.to_string()),
        }
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ServerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ServerId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ServerId> for String {
    fn from(id: ServerId) -> Self {
        id.0
    }
}

/// WooCommerce object ID (positive integer, carried as a decimal string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the ID is empty, not numeric, or zero
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be empty".to_string(),
            ));
        }
        if !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::InvalidRemoteId(format!(
                "Remote ID must be numeric: {id}"
            )));
        }
        if id.chars().all(|c| c == '0') {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be zero".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Create a RemoteId from a numeric id as returned by the REST API
    pub fn from_u64(id: u64) -> Result<Self, DomainError> {
        Self::new(id.to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

// ============================================================================
// ERP identifiers
// ============================================================================

/// Maximum length of an ERP document name
const MAX_NAME_LEN: usize = 140;

/// Local Item identity (ERP `item_code`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemCode(String);

impl ItemCode {
    /// Create a new ItemCode
    ///
    /// # Errors
    /// Returns error if the code is blank, too long, or has surrounding whitespace
    pub fn new(code: String) -> Result<Self, DomainError> {
        if code.trim().is_empty() {
            return Err(DomainError::InvalidItemCode(
                "Item code cannot be blank".to_string(),
            ));
        }
        if code.trim() != code {
            return Err(DomainError::InvalidItemCode(format!(
                "Item code has surrounding whitespace: '{code}'"
            )));
        }
        if code.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::InvalidItemCode(format!(
                "Item code exceeds {MAX_NAME_LEN} characters"
            )));
        }
        Ok(Self(code))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ItemCode {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ItemCode> for String {
    fn from(code: ItemCode) -> Self {
        code.0
    }
}

/// Derived key identifying a Customer across guest, company and individual orders
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomerIdentifier(String);

impl CustomerIdentifier {
    /// Create a new CustomerIdentifier
    ///
    /// # Errors
    /// Returns error if the identifier is blank
    pub fn new(identifier: String) -> Result<Self, DomainError> {
        if identifier.trim().is_empty() {
            return Err(DomainError::InvalidIdentifier(
                "Customer identifier cannot be blank".to_string(),
            ));
        }
        Ok(Self(identifier))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CustomerIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CustomerIdentifier {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CustomerIdentifier> for String {
    fn from(id: CustomerIdentifier) -> Self {
        id.0
    }
}

/// Generated name of an ERP document such as a Sales Order or Address
///
/// Format: `{PREFIX}-{8 hex chars}`, e.g. `SO-1f3a9c0e`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordName(String);

impl RecordName {
    /// Wrap an existing document name
    pub fn new(name: String) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "Record name cannot be blank".to_string(),
            ));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::ValidationFailed(format!(
                "Record name exceeds {MAX_NAME_LEN} characters"
            )));
        }
        Ok(Self(name))
    }

    /// Generate a fresh name with the given prefix
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}-{}", &uuid[..8]))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RecordName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RecordName> for String {
    fn from(name: RecordName) -> Self {
        name.0
    }
}
