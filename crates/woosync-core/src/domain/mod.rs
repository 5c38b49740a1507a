//! Domain entities and business logic
//!
//! This module contains the core domain types for WooSync:
//! - Newtypes for identifiers (servers, remote ids, item codes, runs)
//! - The path-query grammar used by field mappings
//! - Remote documents and the links that tie them to local records
//! - ERP records: items, sales orders, payment entries, customers, addresses
//! - Checkpoints, scopes and error log entries

pub mod checkpoint;
pub mod customer;
pub mod error_log;
pub mod errors;
pub mod item;
pub mod link;
pub mod mapping;
pub mod newtypes;
pub mod order;
pub mod order_status;
pub mod path_query;
pub mod payment;
pub mod remote;

// Re-export commonly used types
pub use checkpoint::{Checkpoint, SyncScope};
pub use customer::{Address, AddressRole, Contact, Customer, CustomerType, NOT_PROVIDED};
pub use error_log::{ErrorKind, ErrorLogEntry};
pub use errors::DomainError;
pub use item::{
    Item, ItemAttribute, ItemAttributeValue, ItemDocField, ItemKind, StockLevel,
    DELETED_PRODUCT_ITEM_CODE, ITEM_DOCFIELDS,
};
pub use link::{LocalVersion, RemoteVersion, SyncLink, SyncLinks};
pub use mapping::FieldMappingRule;
pub use newtypes::*;
pub use order::{DocStatus, OrderCharge, OrderLine, SalesOrder};
pub use path_query::{PathQuery, PathQueryError};
pub use payment::PaymentEntry;
pub use remote::{RemoteEntity, RemoteRecord};
