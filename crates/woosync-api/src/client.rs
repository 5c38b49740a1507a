//! WooCommerce REST client
//!
//! A thin typed wrapper over `reqwest` for the `wc/v3` API: base URL
//! construction, consumer key authentication, status classification and
//! 429 back-off.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use woosync_api::client::WooClient;
//!
//! # async fn example() -> Result<(), woosync_api::ApiError> {
//! let client = WooClient::with_base_url("ck_key", "cs_secret", "https://shop.example.com/wp-json/wc/v3");
//! let order = client.get_json("/orders/1234", &[]).await?;
//! println!("{}", order["status"]);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use woosync_core::config::ServerConfig;

use crate::ApiError;

/// Path of the REST namespace below the site URL
const API_PREFIX: &str = "wp-json/wc/v3";

/// Default Retry-After when the header is missing
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Longest Retry-After honoured; longer waits are capped
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Retries for 429 responses
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Error body returned by the WooCommerce REST API
#[derive(Debug, Deserialize)]
struct WooErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// HTTP client for one WooCommerce server
#[derive(Debug, Clone)]
pub struct WooClient {
    client: Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
    max_retries: u32,
}

impl WooClient {
    /// Creates a client for a configured server
    ///
    /// # Errors
    /// `InvalidUrl` when the server URL is not an absolute http(s) URL.
    pub fn new(server: &ServerConfig) -> Result<Self, ApiError> {
        let site = url::Url::parse(&server.url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", server.url, e)))?;
        if !matches!(site.scheme(), "http" | "https") || site.host_str().is_none() {
            return Err(ApiError::InvalidUrl(format!(
                "{}: expected an http(s) URL with a host",
                server.url
            )));
        }

        let base_url = format!("{}/{}", server.url.trim_end_matches('/'), API_PREFIX);
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::NetworkError)?;

        Ok(Self {
            client,
            base_url,
            consumer_key: server.api_consumer_key.clone(),
            consumer_secret: server.api_consumer_secret.clone(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Creates a client with an explicit API base URL (useful for testing)
    pub fn with_base_url(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets how often a 429 response is retried
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// API base URL, e.g. `https://shop.example.com/wp-json/wc/v3`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for a path below the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
    }

    /// Sends a request, backing off on 429 and classifying error statuses
    ///
    /// `build` is called once per attempt because request builders cannot
    /// be replayed.
    pub async fn execute<F>(&self, path: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        for attempt in 0..=self.max_retries {
            let response = build().send().await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                    .unwrap_or(DEFAULT_RETRY_AFTER);

                if attempt >= self.max_retries {
                    warn!(path, attempts = attempt + 1, "429 retry limit exhausted");
                    return Err(ApiError::TooManyRequests { retry_after });
                }

                info!(
                    path,
                    attempt,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Received 429, backing off"
                );
                tokio::time::sleep(retry_after).await;
                continue;
            }

            if attempt > 0 {
                info!(path, attempt, "Request succeeded after retry");
            }
            return check_status(path, response).await;
        }

        Err(ApiError::TooManyRequests {
            retry_after: DEFAULT_RETRY_AFTER,
        })
    }

    /// `GET` a path and decode the JSON body
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let response = self
            .execute(path, || self.request(Method::GET, path).query(query))
            .await?;
        decode_json(path, response).await
    }

    /// `PUT` a JSON body to a path and decode the response
    pub async fn put_json(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        debug!(path, "PUT");
        let response = self
            .execute(path, || self.request(Method::PUT, path).json(body))
            .await?;
        decode_json(path, response).await
    }

    /// `POST` a JSON body to a path and decode the response
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        debug!(path, "POST");
        let response = self
            .execute(path, || self.request(Method::POST, path).json(body))
            .await?;
        decode_json(path, response).await
    }
}

async fn decode_json(path: &str, response: Response) -> Result<Value, ApiError> {
    response
        .json()
        .await
        .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
}

/// Map a non-success status to an [`ApiError`]
async fn check_status(path: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<WooErrorBody>(&raw) {
        Ok(WooErrorBody {
            code: Some(code),
            message: Some(message),
        }) => format!("{} ({})", message, code),
        Ok(WooErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ if raw.is_empty() => status.to_string(),
        _ => raw,
    };
    debug!(path, status = status.as_u16(), %message, "Request failed");

    Err(match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(format!("{}: {}", path, message)),
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

/// Parses a Retry-After header value into a Duration
///
/// Accepts integer seconds or an HTTP-date; anything else falls back to
/// `default`. Waits are capped at five minutes.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds).min(MAX_RETRY_AFTER);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let wait = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        return match wait.to_std() {
            Ok(wait) => wait.min(MAX_RETRY_AFTER),
            Err(_) => Duration::ZERO,
        };
    }

    default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_from_server_config() {
        let server = ServerConfig::new("https://shop.example.com/", "ck_1", "cs_1");
        let client = WooClient::new(&server).unwrap();
        assert_eq!(client.base_url(), "https://shop.example.com/wp-json/wc/v3");
    }

    #[test]
    fn test_invalid_server_url_is_rejected() {
        let server = ServerConfig::new("shop.example.com", "ck", "cs");
        assert!(matches!(
            WooClient::new(&server),
            Err(ApiError::InvalidUrl(_))
        ));

        let ftp = ServerConfig::new("ftp://shop.example.com", "ck", "cs");
        assert!(matches!(WooClient::new(&ftp), Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_request_carries_basic_auth() {
        let client = WooClient::with_base_url("ck_key", "cs_secret", "http://localhost:8080/");
        let request = client.request(Method::GET, "/orders").build().unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:8080/orders");

        let auth = request
            .headers()
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap();
        // base64("ck_key:cs_secret")
        assert_eq!(auth, "Basic Y2tfa2V5OmNzX3NlY3JldA==");
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(
            parse_retry_after(" 12 ", Duration::from_secs(30)),
            Duration::from_secs(12)
        );
        assert_eq!(
            parse_retry_after("86400", Duration::from_secs(30)),
            MAX_RETRY_AFTER
        );
    }

    #[test]
    fn test_parse_retry_after_past_date_is_zero() {
        assert_eq!(
            parse_retry_after("Mon, 01 Jan 2001 00:00:00 GMT", Duration::from_secs(30)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_parse_retry_after_invalid_falls_back() {
        assert_eq!(
            parse_retry_after("soon", Duration::from_secs(30)),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_woo_error_body_deserialization() {
        let body: WooErrorBody = serde_json::from_str(
            r#"{"code":"woocommerce_rest_shop_order_invalid_id","message":"Invalid ID.","data":{"status":404}}"#,
        )
        .unwrap();
        assert_eq!(body.message.as_deref(), Some("Invalid ID."));
    }
}
