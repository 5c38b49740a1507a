//! WooSync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Item`, `SalesOrder`, `Customer`, `Address`, `RemoteRecord`, `SyncLink`
//! - **Path queries** - the expression grammar behind user-configured field mappings
//! - **Port definitions** - Traits for adapters: `IRemoteApi`, `ILocalStore`, `ISyncStateRepository`
//! - **Use cases** - mapping introspection and error log review
//! - **Configuration** - the YAML configuration file
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
