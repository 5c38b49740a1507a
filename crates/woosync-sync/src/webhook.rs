//! WooCommerce `order_created` webhook handling
//!
//! A delivery is accepted when its `X-WC-Webhook-Source` names a configured
//! server and its `X-WC-Webhook-Signature` is the base64 HMAC-SHA256 of the
//! raw body under that server's secret. The HTTP layer lives in the daemon;
//! this module maps a delivery to a [`WebhookOutcome`] or a [`WebhookError`]
//! carrying the status code to answer with.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, warn};

use woosync_core::domain::{RemoteEntity, RemoteRecord, ServerId};

use crate::engine::SyncOrchestrator;
use crate::report::RecordOutcome;
use crate::SyncError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 body signature
pub const SIGNATURE_HEADER: &str = "x-wc-webhook-signature";
/// Header carrying the URL of the sending site
pub const SOURCE_HEADER: &str = "x-wc-webhook-source";

/// Body prefix of the form-encoded ping sent when a webhook is saved
const PING_PREFIX: &[u8] = b"webhook_id=";

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// base64(HMAC-SHA256(body)) under `secret`
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Constant-time check of a delivered signature
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let computed = sign(secret, body);
    computed.as_bytes().ct_eq(signature.trim().as_bytes()).into()
}

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// Rejected or failed delivery
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing {SOURCE_HEADER} header")]
    MissingSource,

    #[error("invalid webhook source '{0}'")]
    InvalidSource(String),

    #[error("no server configured for {0}")]
    UnknownServer(ServerId),

    #[error("no webhook secret configured for {0}")]
    MissingSecret(ServerId),

    #[error("missing {SIGNATURE_HEADER} header")]
    MissingSignature,

    #[error("signature does not match")]
    InvalidSignature,

    #[error("malformed order payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl WebhookError {
    /// HTTP status to answer the delivery with
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::MissingSource | WebhookError::InvalidSource(_) | WebhookError::Malformed(_) => 400,
            WebhookError::MissingSecret(_)
            | WebhookError::MissingSignature
            | WebhookError::InvalidSignature => 401,
            WebhookError::UnknownServer(_) => 404,
            WebhookError::Sync(_) => 500,
        }
    }
}

/// Accepted delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Registration ping; nothing to sync
    Ping,
    /// Sync is switched off for the sending server
    Disabled,
    /// The order was reconciled
    Synced(RecordOutcome),
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Verifies deliveries and hands orders to the Sales Order Synchronizer
#[derive(Clone)]
pub struct WebhookHandler {
    orchestrator: Arc<SyncOrchestrator>,
}

impl WebhookHandler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Handle one `order_created` delivery
    #[tracing::instrument(skip(self, signature, body), fields(body_len = body.len()))]
    pub async fn order_created(
        &self,
        source: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        let source = source.ok_or(WebhookError::MissingSource)?;
        let server =
            ServerId::from_url(source).map_err(|_| WebhookError::InvalidSource(source.to_string()))?;
        let target = self
            .orchestrator
            .targets()
            .iter()
            .find(|t| t.server == server)
            .ok_or_else(|| WebhookError::UnknownServer(server.clone()))?;

        let secret = target
            .config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WebhookError::MissingSecret(server.clone()))?;
        let signature = signature.ok_or(WebhookError::MissingSignature)?;
        if !verify_signature(secret, body, signature) {
            warn!(%server, "Webhook signature mismatch");
            return Err(WebhookError::InvalidSignature);
        }

        if body.starts_with(PING_PREFIX) {
            info!(%server, "Webhook ping received");
            return Ok(WebhookOutcome::Ping);
        }
        if !target.is_enabled() {
            info!(%server, "Sync disabled, ignoring delivery");
            return Ok(WebhookOutcome::Disabled);
        }

        let payload: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| WebhookError::Malformed(e.to_string()))?;
        let record = RemoteRecord::from_json(RemoteEntity::Order, payload)
            .map_err(|e| WebhookError::Malformed(e.to_string()))?;

        let outcome = self
            .orchestrator
            .sync_remote_order_record(&server, &record)
            .await?;
        info!(%server, order = %record.id(), ?outcome, "Webhook order synced");
        Ok(WebhookOutcome::Synced(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_body_verifies() {
        let body = br#"{"id":1}"#;
        let signature = sign("secret", body);
        assert!(verify_signature("secret", body, &signature));
        assert_eq!(signature.len(), 44);
    }

    #[test]
    fn tampered_body_fails() {
        let signature = sign("secret", br#"{"id":1}"#);
        assert!(!verify_signature("secret", br#"{"id":2}"#, &signature));
        assert!(!verify_signature("other", br#"{"id":1}"#, &signature));
        assert!(!verify_signature("secret", br#"{"id":1}"#, ""));
    }

    #[test]
    fn status_codes() {
        assert_eq!(WebhookError::InvalidSignature.status_code(), 401);
        assert_eq!(WebhookError::MissingSource.status_code(), 400);
        assert_eq!(WebhookError::Malformed("eof".into()).status_code(), 400);
        assert_eq!(
            WebhookError::UnknownServer(ServerId::from_url("https://shop.example.com").unwrap())
                .status_code(),
            404
        );
    }
}
