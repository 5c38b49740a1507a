//! Use cases (interactors) for WooSync
//!
//! This module contains application use cases that need nothing but the
//! domain and the ports. The synchronisation passes themselves live in
//! `woosync-sync`.
//!
//! ## Use Cases
//!
//! - [`introspection`] - Item docfields and the remote order status vocabulary
//! - [`ReviewErrorsUseCase`] - Reading back the persisted error log

pub mod introspection;
pub mod review_errors;

pub use introspection::{get_item_docfields, get_order_status_list, DocField};
pub use review_errors::{ErrorSummary, ReviewErrorsUseCase};
