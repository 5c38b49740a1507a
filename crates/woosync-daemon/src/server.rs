//! HTTP receiver for WooCommerce webhooks
//!
//! Serves `POST /woocommerce/order_created` on the configured bind address
//! (`127.0.0.1:8089` by default) and hands each delivery to the
//! [`WebhookHandler`]. Responses are small JSON documents; the status code
//! is what WooCommerce looks at.

use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use woosync_sync::webhook::{SIGNATURE_HEADER, SOURCE_HEADER};
use woosync_sync::WebhookHandler;

pub const ORDER_CREATED_PATH: &str = "/woocommerce/order_created";

/// Order payloads are a few kilobytes; anything this large is not one
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Accept loop serving the webhook endpoint
pub struct WebhookServer {
    handler: WebhookHandler,
    addr: SocketAddr,
}

impl WebhookServer {
    /// `bind` is an address such as `"127.0.0.1:8089"`
    pub fn new(handler: WebhookHandler, bind: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid webhook bind address '{bind}': {e}"))?;
        Ok(Self { handler, addr })
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, path = ORDER_CREATED_PATH, "Webhook receiver listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept webhook connection");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let handler = self.handler.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let handler = handler.clone();
                            async move { Ok::<_, Infallible>(route(req, &handler).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(%peer, error = %e, "Webhook HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Webhook receiver shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Dispatch one request
pub async fn route<B>(req: Request<B>, handler: &WebhookHandler) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if req.uri().path() != ORDER_CREATED_PATH {
        return json_response(StatusCode::NOT_FOUND, serde_json::json!({"error": "not found"}));
    }
    if req.method() != Method::POST {
        return json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            serde_json::json!({"error": "use POST"}),
        );
    }

    let source = header(&req, SOURCE_HEADER);
    let signature = header(&req, SIGNATURE_HEADER);

    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return json_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                serde_json::json!({"error": "payload too large"}),
            );
        }
        Err(e) => {
            warn!(error = %e, "Failed to read webhook body");
            return json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"error": "unreadable body"}),
            );
        }
    };

    match handler
        .order_created(source.as_deref(), signature.as_deref(), &body)
        .await
    {
        Ok(outcome) => {
            debug!(?outcome, "Webhook handled");
            json_response(StatusCode::OK, serde_json::json!(outcome))
        }
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                error!(error = %e, "Webhook delivery failed");
            } else {
                warn!(status = status.as_u16(), error = %e, "Webhook delivery rejected");
            }
            json_response(status, serde_json::json!({"error": e.to_string()}))
        }
    }
}

fn header<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
