//! Integration tests for woosync-api
//!
//! Uses wiremock to simulate a WooCommerce `wc/v3` endpoint and verifies
//! end-to-end behavior of the client, paged listings and writes.

mod common;

mod test_errors;
mod test_fetch;
mod test_write;
