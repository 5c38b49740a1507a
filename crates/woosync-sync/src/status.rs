//! Order status push
//!
//! When a sales order's status changes locally, the status configured for
//! it in `so_status_map` is written to the remote order. Failures are logged
//! and never propagate into the local save that triggered the push.

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use woosync_audit::ErrorLogger;
use woosync_core::domain::order_status::slug_for_label;
use woosync_core::domain::{ErrorKind, ErrorLogEntry, RemoteEntity, SalesOrder};

use crate::target::SyncTarget;

/// Result of one status push
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PushOutcome {
    /// The remote order now carries `remote_status`
    Pushed { remote_status: String },
    /// Status sync is switched off for the server
    Disabled,
    /// The sales order has no enabled link with a remote id
    NotLinked,
    /// No remote status is configured for the local status
    Unmapped { local_status: String },
    /// The remote side rejected the update or was unreachable
    Failed { message: String },
}

/// Pushes local sales order statuses to remote orders
pub struct OrderStatusSynchronizer {
    errors: ErrorLogger,
}

impl OrderStatusSynchronizer {
    pub fn new(errors: ErrorLogger) -> Self {
        Self { errors }
    }

    /// Write the mapped status of `order` to its remote order
    #[tracing::instrument(skip(self, target, order), fields(server = %target.server, sales_order = %order.name))]
    pub async fn push(&self, target: &SyncTarget, order: &SalesOrder) -> PushOutcome {
        if !target.config.enable_so_status_sync {
            debug!("Status sync disabled");
            return PushOutcome::Disabled;
        }

        let Some(remote_id) = order
            .link
            .as_ref()
            .filter(|link| link.enabled && link.server == target.server)
            .and_then(|link| link.remote_id.clone())
        else {
            return PushOutcome::NotLinked;
        };

        let Some((label, slug)) = target
            .config
            .remote_status_for(&order.status)
            .and_then(|label| slug_for_label(label).map(|slug| (label, slug)))
        else {
            warn!(status = %order.status, "No remote status mapped");
            let entry = ErrorLogEntry::new(
                ErrorKind::StatusPush,
                format!("no remote status mapped for '{}'", order.status),
            )
            .with_server(target.server.clone())
            .with_record(order.name.as_str())
            .with_details(json!({ "local_status": order.status }));
            self.errors.log(entry).await;
            return PushOutcome::Unmapped {
                local_status: order.status.clone(),
            };
        };

        match target
            .remote
            .update(&RemoteEntity::Order, &remote_id, json!({ "status": slug }))
            .await
        {
            Ok(_) => {
                info!(remote = %remote_id, status = %slug, "Pushed order status");
                PushOutcome::Pushed {
                    remote_status: label.to_string(),
                }
            }
            Err(e) => {
                self.errors
                    .log_status_push_failure(&target.server, order.name.as_str(), slug, &e)
                    .await;
                PushOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}
