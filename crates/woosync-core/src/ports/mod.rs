//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteApi`] - WooCommerce REST resources of one server
//! - [`ILocalStore`] - ERP records (items, customers, orders, stock)
//! - [`ISyncStateRepository`] - Checkpoints, pass locks and the error log

pub mod local_store;
pub mod remote_api;
pub mod sync_state;

pub use local_store::{ILocalStore, ItemFilter, SalesOrderFilter};
pub use remote_api::{IRemoteApi, RemoteApiError};
pub use sync_state::ISyncStateRepository;
