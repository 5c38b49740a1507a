//! WooSync Audit - Persisted error log
//!
//! Provides:
//! - `ErrorLogger`: records per-record and per-pass failures as reviewable
//!   error log entries
//! - `Classify`: maps the error types of the lower crates to an `ErrorKind`
//! - Integration with `ISyncStateRepository` for persistent storage

pub mod logger;
pub mod reason;

pub use logger::ErrorLogger;
pub use reason::Classify;
