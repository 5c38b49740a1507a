//! Stock level push
//!
//! The quantity published for an item is the sum over the server's
//! warehouses of actual stock (less reserved stock when configured),
//! rounded down.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info};

use woosync_core::domain::{Item, RemoteEntity, StockLevel};
use woosync_core::ports::ILocalStore;

use crate::report::RecordOutcome;
use crate::target::SyncTarget;
use crate::SyncError;

/// Pushes ERP stock levels to remote stock quantities
pub struct StockSynchronizer {
    store: Arc<dyn ILocalStore>,
}

impl StockSynchronizer {
    pub fn new(store: Arc<dyn ILocalStore>) -> Self {
        Self { store }
    }

    /// Publish the stock of one item to its product or variation
    ///
    /// Skips disabled items, non-stock items, and items without an enabled
    /// link on the server. Variants whose template has no remote product are
    /// skipped too.
    #[tracing::instrument(skip(self, target, item), fields(server = %target.server, item = %item.item_code))]
    pub async fn push(&self, target: &SyncTarget, mut item: Item) -> Result<RecordOutcome, SyncError> {
        if !target.config.enable_stock_level_sync || !item.is_stock_item || item.disabled {
            return Ok(RecordOutcome::Skipped);
        }
        let Some(link) = item
            .links
            .for_server(&target.server)
            .filter(|link| link.enabled)
            .cloned()
        else {
            return Ok(RecordOutcome::Skipped);
        };
        let Some(remote_id) = link.remote_id.clone() else {
            return Ok(RecordOutcome::Skipped);
        };

        let entity = match item.kind.variant_of() {
            Some(template) => {
                let parent = self
                    .store
                    .get_item(template)
                    .await?
                    .and_then(|t| t.links.for_server(&target.server).and_then(|l| l.remote_id.clone()));
                match parent {
                    Some(parent) => RemoteEntity::Variation { parent },
                    None => {
                        debug!(template = %template, "Template has no remote product, skipping");
                        return Ok(RecordOutcome::Skipped);
                    }
                }
            }
            None => RemoteEntity::Product,
        };

        let levels = self.store.get_stock_levels(&item.item_code).await?;
        let quantity = stock_quantity(
            &levels,
            &target.config.warehouses,
            target.config.subtract_reserved_stock,
        );

        let updated = target
            .remote
            .update(&entity, &remote_id, json!({ "stock_quantity": quantity }))
            .await?;
        info!(remote = %remote_id, quantity, "Pushed stock level");

        // An item in sync before the push stays in sync after it.
        if link.last_local_modified == Some(item.modified) {
            if let Some(link) = item.links.for_server_mut(&target.server) {
                link.last_remote_modified = Some(updated.modified());
            }
            self.store.save_item_links(&item.item_code, &item.links).await?;
        }

        Ok(RecordOutcome::UpdatedRemote)
    }
}

/// Whole units available across `warehouses`
pub fn stock_quantity(levels: &[StockLevel], warehouses: &[String], subtract_reserved: bool) -> i64 {
    let total: Decimal = levels
        .iter()
        .filter(|level| warehouses.iter().any(|w| *w == level.warehouse))
        .map(|level| level.available(subtract_reserved))
        .sum();
    total.floor().to_i64().unwrap_or(0)
}
