//! WooSync Reconcile - Decision logic shared by all synchronisers
//!
//! Provides:
//! - The reconciliation engine deciding create/update/skip per record pair
//! - Identity resolution (item codes, customer identifiers, address slots,
//!   shipping rules, order line products)
//! - The field mapper evaluating user-configured mapping rules

pub mod engine;
pub mod error;
pub mod identity;
pub mod mapper;

pub use engine::{Action, Decision, ReconciliationEngine, SkipReason};
pub use error::ReconcileError;
pub use identity::{AddressPlan, LineProduct, ShippingRuleMatch};
pub use mapper::{FieldMapper, MappingSet};
