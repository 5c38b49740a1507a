//! WooSync API - WooCommerce REST client
//!
//! Provides an async client for the WooCommerce REST API (`wc/v3`):
//! - Consumer key/secret authentication (HTTP basic over TLS)
//! - Paged listing of products, variations and orders
//! - Reads, partial updates and creation of single records
//! - Automatic back-off on HTTP 429
//!
//! ## Modules
//!
//! - [`client`] - HTTP client, authentication and status mapping
//! - [`pagination`] - Paged collection listing
//! - [`provider`] - `IRemoteApi` implementation

pub mod client;
pub mod pagination;
pub mod provider;

use std::time::Duration;

use thiserror::Error;
use woosync_core::ports::RemoteApiError;

pub use client::WooClient;
pub use provider::{providers_for, WooCommerceProvider};

/// Errors that can occur when communicating with a WooCommerce server
#[derive(Debug, Error)]
pub enum ApiError {
    /// Consumer key/secret were rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The key lacks permission for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded and retries are exhausted
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration the server asked to wait
        retry_after: Duration,
    },

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message from the WooCommerce error body, or the raw body
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The server URL is unusable
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ApiError> for RemoteApiError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) => {
                RemoteApiError::Unauthorized(msg)
            }
            ApiError::NotFound(msg) => RemoteApiError::NotFound(msg),
            ApiError::TooManyRequests { retry_after } => RemoteApiError::Server {
                status: 429,
                message: format!("rate limited, retry after {}s", retry_after.as_secs()),
            },
            ApiError::Status { status, message } => RemoteApiError::Server { status, message },
            ApiError::NetworkError(err) if err.is_decode() => RemoteApiError::Decode(err.to_string()),
            ApiError::NetworkError(err) => RemoteApiError::Network(err.to_string()),
            ApiError::InvalidUrl(msg) => RemoteApiError::Network(msg),
            ApiError::InvalidResponse(msg) => RemoteApiError::Decode(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_map_to_port_errors() {
        assert_eq!(
            RemoteApiError::from(ApiError::Forbidden("no".into())),
            RemoteApiError::Unauthorized("no".into())
        );
        assert_eq!(
            RemoteApiError::from(ApiError::NotFound("gone".into())),
            RemoteApiError::NotFound("gone".into())
        );

        let throttled = RemoteApiError::from(ApiError::TooManyRequests {
            retry_after: Duration::from_secs(5),
        });
        assert!(throttled.is_transient());

        let bad_request = RemoteApiError::from(ApiError::Status {
            status: 400,
            message: "Invalid parameter(s): status".into(),
        });
        assert!(!bad_request.is_transient());
        assert!(matches!(
            RemoteApiError::from(ApiError::InvalidResponse("not an array".into())),
            RemoteApiError::Decode(_)
        ));
    }
}
