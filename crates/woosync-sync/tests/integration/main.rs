//! Integration tests for woosync-sync
//!
//! Runs the orchestrator against an in-memory SQLite store and an
//! in-memory WooCommerce shop.

mod common;

mod test_items;
mod test_orders;
mod test_passes;
mod test_stock_status;
mod test_webhook;
