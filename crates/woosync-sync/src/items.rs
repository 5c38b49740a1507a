//! Item synchronisation
//!
//! Remote products and variations against ERP items. A `variable` product
//! becomes a template item and each of its variations a variant of that
//! template. Attributes found on either side are created in the ERP's
//! attribute master on the fly.
//!
//! Every write records the watermarks of both sides on the item's link, so
//! a pair that did not change since is skipped without writing.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use woosync_audit::ErrorLogger;
use woosync_core::config::NamingBasis;
use woosync_core::domain::{
    Item, ItemAttribute, ItemAttributeValue, ItemCode, ItemKind, RemoteEntity, RemoteId,
    RemoteRecord, ServerId, SyncLink, DELETED_PRODUCT_ITEM_CODE,
};
use woosync_core::ports::ILocalStore;
use woosync_reconcile::{identity, Action, LineProduct, ReconcileError, ReconciliationEngine};

use crate::report::RecordOutcome;
use crate::target::SyncTarget;
use crate::SyncError;

/// Name of the placeholder item used for lines of deleted products
pub const DELETED_PRODUCT_ITEM_NAME: &str = "Deleted WooCommerce Product";

/// Item group of the placeholder item
const PLACEHOLDER_ITEM_GROUP: &str = "All Item Groups";

/// Synchronises products and variations with ERP items
pub struct ItemSynchronizer {
    store: Arc<dyn ILocalStore>,
    errors: ErrorLogger,
}

impl ItemSynchronizer {
    pub fn new(store: Arc<dyn ILocalStore>, errors: ErrorLogger) -> Self {
        Self { store, errors }
    }

    /// Reconcile a remote product or variation with its local item
    ///
    /// The template of a variation is fetched and created first when it is
    /// not known locally yet. Returns the local item code alongside the
    /// outcome.
    #[tracing::instrument(skip(self, target, record), fields(server = %target.server, id = %record.id()))]
    pub async fn sync_remote(
        &self,
        target: &SyncTarget,
        record: &RemoteRecord,
    ) -> Result<(RecordOutcome, ItemCode), SyncError> {
        let template = match record.entity() {
            RemoteEntity::Variation { parent } => Some(self.ensure_template(target, parent).await?),
            _ => None,
        };
        self.reconcile(target, record, template.as_ref()).await
    }

    /// Reconcile a locally changed item with the server
    ///
    /// Items linked with a blank remote id are created remotely; linked
    /// items are fetched and go through the same decision as listed ones.
    #[tracing::instrument(skip(self, target, item), fields(server = %target.server, item = %item.item_code))]
    pub async fn sync_local(&self, target: &SyncTarget, item: Item) -> Result<RecordOutcome, SyncError> {
        let Some(link) = item.links.for_server(&target.server).cloned() else {
            return Ok(RecordOutcome::Skipped);
        };
        if !link.enabled {
            debug!("Link disabled, skipping");
            return Ok(RecordOutcome::Skipped);
        }

        let Some(remote_id) = link.remote_id else {
            let version = item.version_for(&target.server);
            let decision = ReconciliationEngine::decide(Some(&version), None);
            return match decision.action {
                Action::CreateRemote => self.create_remote(target, item).await,
                _ => Ok(RecordOutcome::Skipped),
            };
        };

        let entity = self.entity_for(target, &item).await?;
        let record = target.remote.fetch_by_id(&entity, &remote_id).await?;
        let template = match item.kind.variant_of() {
            Some(code) => Some(self.load(code).await?),
            None => None,
        };
        self.reconcile(target, &record, template.as_ref())
            .await
            .map(|(outcome, _)| outcome)
    }

    /// Local item code for a product referenced by an order line
    ///
    /// Unknown products are fetched and created locally; deleted products
    /// resolve to the placeholder item. An item whose link is disabled is
    /// fetched too, which re-enables the link and syncs the item.
    pub async fn ensure_local(
        &self,
        target: &SyncTarget,
        product: &LineProduct,
    ) -> Result<ItemCode, SyncError> {
        match product {
            LineProduct::Deleted => self.ensure_placeholder(target).await,
            LineProduct::Product(id) => {
                if let Some(code) = self.linked_item(&target.server, id).await? {
                    return Ok(code);
                }
                let record = target.remote.fetch_by_id(&RemoteEntity::Product, id).await?;
                let (_, code) = self.reconcile(target, &record, None).await?;
                Ok(code)
            }
            LineProduct::Variation { parent, id } => {
                if let Some(code) = self.linked_item(&target.server, id).await? {
                    return Ok(code);
                }
                let template = self.ensure_template(target, parent).await?;
                let entity = RemoteEntity::Variation {
                    parent: parent.clone(),
                };
                let record = target.remote.fetch_by_id(&entity, id).await?;
                let (_, code) = self.reconcile(target, &record, Some(&template)).await?;
                Ok(code)
            }
        }
    }

    /// The placeholder item for lines whose product was deleted remotely
    pub async fn ensure_placeholder(&self, target: &SyncTarget) -> Result<ItemCode, SyncError> {
        let code = ItemCode::new(DELETED_PRODUCT_ITEM_CODE.to_string())?;
        if self.store.get_item(&code).await?.is_none() {
            let mut item = Item::new(
                code.clone(),
                DELETED_PRODUCT_ITEM_NAME,
                PLACEHOLDER_ITEM_GROUP,
                target.config.stock_uom.clone(),
            );
            item.is_stock_item = false;
            self.store.save_item(&item).await?;
            info!(item = %code, "Created placeholder item for deleted products");
        }
        Ok(code)
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Code of the item linked to `id` through an enabled link
    async fn linked_item(&self, server: &ServerId, id: &RemoteId) -> Result<Option<ItemCode>, SyncError> {
        let item = self.store.find_item_by_remote(server, id).await?;
        Ok(item
            .filter(|item| item.links.for_server(server).is_some_and(|link| link.enabled))
            .map(|item| item.item_code))
    }

    async fn load(&self, code: &ItemCode) -> Result<Item, SyncError> {
        self.store
            .get_item(code)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("item {code}")))
    }

    /// The local template of a remote variable product, created on demand
    async fn ensure_template(&self, target: &SyncTarget, parent: &RemoteId) -> Result<Item, SyncError> {
        if let Some(code) = self.linked_item(&target.server, parent).await? {
            return self.load(&code).await;
        }
        debug!(parent = %parent, "Template not known locally, fetching product");
        let record = target.remote.fetch_by_id(&RemoteEntity::Product, parent).await?;
        let (_, code) = self.reconcile(target, &record, None).await?;
        self.load(&code).await
    }

    async fn reconcile(
        &self,
        target: &SyncTarget,
        record: &RemoteRecord,
        template: Option<&Item>,
    ) -> Result<(RecordOutcome, ItemCode), SyncError> {
        let server = &target.server;
        let local = match self.store.find_item_by_remote(server, record.id()).await? {
            Some(item) => Some(item),
            None => {
                let code = identity::item_code_for(record, target.config.name_by)?;
                let item = self.store.get_item(&code).await?;
                if let Some(item) = &item {
                    ensure_not_linked_elsewhere(item, server, record.id())?;
                }
                item
            }
        };

        let version = local.as_ref().map(|item| item.version_for(server));
        let decision = ReconciliationEngine::decide(version.as_ref(), Some(&record.version()));

        match (decision.action, local) {
            (Action::CreateLocal, _) => self.create_local(target, record, template).await,
            (Action::UpdateLocalFromRemote, Some(mut item)) => {
                self.apply_remote(target, record, template, &mut item).await?;
                link_to(&mut item, server, record.id());
                self.save_synced(&mut item, server, record.modified()).await?;
                info!(item = %item.item_code, "Updated item from remote");
                Ok((RecordOutcome::UpdatedLocal, item.item_code))
            }
            (Action::UpdateRemoteFromLocal, Some(mut item)) => {
                let body = self.remote_body(target, &item, false).await?;
                let updated = target.remote.update(record.entity(), record.id(), body).await?;
                link_to(&mut item, server, record.id());
                self.save_watermarks(&mut item, server, updated.modified()).await?;
                info!(item = %item.item_code, remote = %record.id(), "Updated remote product");
                Ok((RecordOutcome::UpdatedRemote, item.item_code))
            }
            (_, Some(mut item)) => {
                if decision.reenable_link {
                    link_to(&mut item, server, record.id());
                    self.store.save_item_links(&item.item_code, &item.links).await?;
                    info!(item = %item.item_code, "Re-enabled item link");
                }
                Ok((RecordOutcome::Skipped, item.item_code))
            }
            (_, None) => Err(SyncError::NotFound(format!("item for {} {}", record.entity(), record.id()))),
        }
    }

    async fn create_local(
        &self,
        target: &SyncTarget,
        record: &RemoteRecord,
        template: Option<&Item>,
    ) -> Result<(RecordOutcome, ItemCode), SyncError> {
        let code = identity::item_code_for(record, target.config.name_by)?;
        let mut item = Item::new(
            code.clone(),
            code.as_str(),
            target.config.item_group.clone(),
            target.config.stock_uom.clone(),
        );
        self.apply_remote(target, record, template, &mut item).await?;
        item.links
            .upsert(SyncLink::linked(target.server.clone(), record.id().clone()));
        self.save_synced(&mut item, &target.server, record.modified()).await?;

        info!(item = %code, kind = ?item.kind, "Created item from remote");
        Ok((RecordOutcome::CreatedLocal, code))
    }

    async fn create_remote(&self, target: &SyncTarget, mut item: Item) -> Result<RecordOutcome, SyncError> {
        let entity = self.entity_for(target, &item).await?;
        let body = self.remote_body(target, &item, true).await?;
        let created = target.remote.create(&entity, body).await?;

        link_to(&mut item, &target.server, created.id());
        self.save_watermarks(&mut item, &target.server, created.modified()).await?;

        info!(item = %item.item_code, remote = %created.id(), %entity, "Created remote product");
        Ok(RecordOutcome::CreatedRemote)
    }

    /// Remote resource kind of a local item on this server
    async fn entity_for(&self, target: &SyncTarget, item: &Item) -> Result<RemoteEntity, SyncError> {
        let Some(template) = item.kind.variant_of() else {
            return Ok(RemoteEntity::Product);
        };
        let template = self.load(template).await?;
        let parent = template
            .links
            .for_server(&target.server)
            .and_then(|link| link.remote_id.clone())
            .ok_or_else(|| {
                ReconcileError::MissingIdentity(format!(
                    "template {} of {} has no remote product on {}",
                    template.item_code, item.item_code, target.server
                ))
            })?;
        Ok(RemoteEntity::Variation { parent })
    }

    // ========================================================================
    // Field transfer
    // ========================================================================

    /// Copy remote attributes onto the item
    async fn apply_remote(
        &self,
        target: &SyncTarget,
        record: &RemoteRecord,
        template: Option<&Item>,
        item: &mut Item,
    ) -> Result<(), SyncError> {
        let attributes = remote_attributes(record);

        match (record.entity(), template) {
            (RemoteEntity::Variation { .. }, Some(template)) => {
                item.kind = ItemKind::Variant {
                    variant_of: template.item_code.clone(),
                };
                item.item_name = variant_name(template, &attributes);
                item.item_group = template.item_group.clone();
                item.attributes = attributes
                    .iter()
                    .map(|(name, options)| ItemAttributeValue {
                        attribute: name.clone(),
                        value: options.first().cloned(),
                    })
                    .collect();
                self.ensure_attributes(&attributes).await?;
            }
            _ => {
                if let Some(name) = record.str_field("name") {
                    item.item_name = name.to_string();
                }
                if record.str_field("type") == Some("variable") {
                    item.kind = ItemKind::Template;
                    item.attributes = attributes
                        .iter()
                        .map(|(name, _)| ItemAttributeValue {
                            attribute: name.clone(),
                            value: None,
                        })
                        .collect();
                    self.ensure_attributes(&attributes).await?;
                } else if item.kind == ItemKind::Template {
                    item.kind = ItemKind::Normal;
                    item.attributes.clear();
                }
            }
        }

        if let Some(description) = record.str_field("description") {
            item.description = Some(description.to_string());
        }

        if target.config.enable_image_sync {
            if let Some(src) = first_image(record) {
                item.image = Some(src.to_string());
            }
        }

        for (field, value) in target.mappings.extract(record) {
            if let Err(e) = item.set_field(&field, value) {
                warn!(item = %item.item_code, field = %field, error = %e, "Skipping mapped field");
                self.errors
                    .log_mapping_error(&target.server, &field, &e.to_string())
                    .await;
            }
        }

        Ok(())
    }

    /// Create missing attribute master records and values
    async fn ensure_attributes(&self, attributes: &[(String, Vec<String>)]) -> Result<(), SyncError> {
        for (name, options) in attributes {
            let existing = self.store.get_item_attribute(name).await?;
            let is_new = existing.is_none();
            let mut attribute = existing.unwrap_or_else(|| ItemAttribute::new(name.clone()));

            let mut changed = is_new;
            for option in options {
                changed |= attribute.ensure_value(option);
            }
            if changed {
                self.store.save_item_attribute(&attribute).await?;
                debug!(attribute = %name, values = attribute.values.len(), "Saved item attribute");
            }
        }
        Ok(())
    }

    /// Request body for creating or updating the remote counterpart
    async fn remote_body(
        &self,
        target: &SyncTarget,
        item: &Item,
        creating: bool,
    ) -> Result<Value, SyncError> {
        let mut body = Map::new();

        match &item.kind {
            ItemKind::Variant { .. } => {
                let attributes: Vec<Value> = item
                    .attributes
                    .iter()
                    .filter_map(|a| {
                        a.value
                            .as_ref()
                            .map(|value| json!({ "name": a.attribute, "option": value }))
                    })
                    .collect();
                body.insert("attributes".into(), Value::Array(attributes));
            }
            kind => {
                body.insert("name".into(), json!(item.item_name));
                if creating {
                    let product_type = if kind.has_variants() { "variable" } else { "simple" };
                    body.insert("type".into(), json!(product_type));
                }
                if kind.has_variants() {
                    let mut attributes = Vec::with_capacity(item.attributes.len());
                    for a in &item.attributes {
                        let options = self
                            .store
                            .get_item_attribute(&a.attribute)
                            .await?
                            .map(|attribute| attribute.values)
                            .unwrap_or_default();
                        attributes.push(json!({
                            "name": a.attribute,
                            "options": options,
                            "variation": true,
                            "visible": true,
                        }));
                    }
                    body.insert("attributes".into(), Value::Array(attributes));
                }
            }
        }

        if let Some(description) = &item.description {
            body.insert("description".into(), json!(description));
        }
        if target.config.name_by == NamingBasis::ProductSku {
            body.insert("sku".into(), json!(item.item_code.as_str()));
        }

        let mut body = Value::Object(body);
        let written = target
            .mappings
            .apply_to_remote(&mut body, |field| item.get_field(field));
        if written > 0 {
            debug!(item = %item.item_code, fields = written, "Applied field mappings to remote body");
        }
        Ok(body)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Save the item, then record both watermarks on its link
    async fn save_synced(
        &self,
        item: &mut Item,
        server: &ServerId,
        remote_modified: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), SyncError> {
        item.modified = self.store.save_item(item).await?;
        self.save_watermarks(item, server, remote_modified).await
    }

    /// Record both watermarks without touching the item itself
    async fn save_watermarks(
        &self,
        item: &mut Item,
        server: &ServerId,
        remote_modified: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), SyncError> {
        let local_modified = item.modified;
        if let Some(link) = item.links.for_server_mut(server) {
            link.mark_synced(remote_modified, local_modified);
        }
        self.store.save_item_links(&item.item_code, &item.links).await?;
        Ok(())
    }
}

/// Point the item's link for `server` at `id`, enabling it
fn link_to(item: &mut Item, server: &ServerId, id: &RemoteId) {
    match item.links.for_server_mut(server) {
        Some(link) => {
            link.remote_id = Some(id.clone());
            link.enabled = true;
        }
        None => item
            .links
            .upsert(SyncLink::linked(server.clone(), id.clone())),
    }
}

/// An item matched by code must not already belong to another remote record
fn ensure_not_linked_elsewhere(item: &Item, server: &ServerId, id: &RemoteId) -> Result<(), ReconcileError> {
    match item.links.for_server(server).and_then(|l| l.remote_id.as_ref()) {
        Some(linked) if linked != id => Err(ReconcileError::MissingIdentity(format!(
            "item {} is already linked to {} on {}, not {}",
            item.item_code, linked, server, id
        ))),
        _ => Ok(()),
    }
}

/// `(attribute, options)` of a remote product or variation
///
/// Variations carry one `option` per attribute. Products carry `options`;
/// attributes not used for variations are left out.
fn remote_attributes(record: &RemoteRecord) -> Vec<(String, Vec<String>)> {
    let Some(list) = record.field("attributes").and_then(Value::as_array) else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|attribute| {
            let name = attribute.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            if let Some(option) = attribute.get("option").and_then(Value::as_str) {
                return Some((name.to_string(), vec![option.to_string()]));
            }
            if attribute.get("variation").and_then(Value::as_bool) == Some(false) {
                return None;
            }
            let options = attribute
                .get("options")
                .and_then(Value::as_array)
                .map(|options| {
                    options
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some((name.to_string(), options))
        })
        .collect()
}

/// `"{template name} - {option} - {option}"`
fn variant_name(template: &Item, attributes: &[(String, Vec<String>)]) -> String {
    let options: Vec<&str> = attributes
        .iter()
        .filter_map(|(_, options)| options.first().map(String::as_str))
        .collect();
    if options.is_empty() {
        template.item_name.clone()
    } else {
        format!("{} - {}", template.item_name, options.join(" - "))
    }
}

fn first_image(record: &RemoteRecord) -> Option<&str> {
    record
        .field("images")
        .and_then(Value::as_array)
        .and_then(|images| images.first())
        .and_then(|image| image.get("src"))
        .and_then(Value::as_str)
        .filter(|src| !src.is_empty())
}
