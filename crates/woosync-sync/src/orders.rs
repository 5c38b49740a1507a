//! Sales order synchronisation
//!
//! Remote orders become ERP sales orders: the customer and its addresses are
//! resolved first, each line's product is resolved to a local item (fetched
//! and created when unknown), then the order is written with its shipping
//! charge, COD fee and discount.
//!
//! Later changes flow by timestamp. A newer remote order updates the remote
//! status, customer note and payment method of the sales order; a newer
//! sales order pushes its status and, when enabled, its lines. Cancelled
//! sales orders are never touched.
//!
//! Once a sales order is submitted and its remote order paid, a payment
//! entry is booked against it. This is attempted once per sales order.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use woosync_audit::ErrorLogger;
use woosync_core::domain::order_status::{label_for_slug, slug_for_label};
use woosync_core::domain::remote::{value_as_decimal, value_as_u64};
use woosync_core::domain::{
    DocStatus, ItemKind, OrderCharge, OrderLine, PaymentEntry, RecordName, RemoteEntity,
    RemoteRecord, SalesOrder, SyncLink,
};
use woosync_core::ports::ILocalStore;
use woosync_reconcile::{identity, Action, ReconciliationEngine, ShippingRuleMatch};

use crate::customers::CustomerSynchronizer;
use crate::items::ItemSynchronizer;
use crate::report::RecordOutcome;
use crate::target::SyncTarget;
use crate::SyncError;

/// Payment method titles at or above this length are replaced by the method id
const MAX_PAYMENT_METHOD_TITLE: usize = 140;

/// Local status of a new sales order
const DRAFT_STATUS: &str = "Draft";

/// Local status of a submitted sales order awaiting fulfilment
const SUBMITTED_STATUS: &str = "To Deliver and Bill";

/// Synchronises remote orders with ERP sales orders
pub struct SalesOrderSynchronizer {
    store: Arc<dyn ILocalStore>,
    customers: CustomerSynchronizer,
    items: Arc<ItemSynchronizer>,
    errors: ErrorLogger,
}

impl SalesOrderSynchronizer {
    pub fn new(store: Arc<dyn ILocalStore>, items: Arc<ItemSynchronizer>, errors: ErrorLogger) -> Self {
        Self {
            customers: CustomerSynchronizer::new(Arc::clone(&store)),
            store,
            items,
            errors,
        }
    }

    /// Reconcile a remote order with its sales order
    #[tracing::instrument(skip(self, target, record), fields(server = %target.server, order = %record.id()))]
    pub async fn sync_remote(&self, target: &SyncTarget, record: &RemoteRecord) -> Result<RecordOutcome, SyncError> {
        let local = self
            .store
            .find_sales_order_by_remote(&target.server, record.id())
            .await?;

        if let Some(order) = &local {
            if order.is_cancelled() {
                debug!(sales_order = %order.name, "Sales order cancelled, skipping");
                return Ok(RecordOutcome::Skipped);
            }
        }

        let version = local.as_ref().map(SalesOrder::version);
        let decision = ReconciliationEngine::decide(version.as_ref(), Some(&record.version()));

        let outcome = match (decision.action, local) {
            (Action::CreateLocal, _) => self.create_local(target, record).await?,
            (Action::UpdateLocalFromRemote, Some(order)) => self.update_local(target, record, order).await?,
            (Action::UpdateRemoteFromLocal, Some(order)) => self.update_remote(target, record, order).await?,
            (_, Some(mut order)) => {
                if decision.reenable_link {
                    if let Some(link) = order.link.as_mut() {
                        link.enabled = true;
                        self.store.save_sales_order_link(&order.name, link).await?;
                        info!(sales_order = %order.name, "Re-enabled sales order link");
                    }
                }
                RecordOutcome::Skipped
            }
            (_, None) => return Ok(RecordOutcome::Skipped),
        };

        let booked = self.settle_payment(target, record).await?;
        if booked && outcome == RecordOutcome::Skipped {
            Ok(RecordOutcome::UpdatedLocal)
        } else {
            Ok(outcome)
        }
    }

    // ========================================================================
    // Create
    // ========================================================================

    async fn create_local(&self, target: &SyncTarget, record: &RemoteRecord) -> Result<RecordOutcome, SyncError> {
        let config = &target.config;
        let resolved = self.customers.resolve(target, record).await?;

        let transaction_date = record
            .date_created()
            .map(|created| created.date_naive())
            .unwrap_or_else(|| Utc::now().date_naive());
        let delivery_date = transaction_date + Duration::days(i64::from(config.delivery_after_days));

        let items = self.order_lines(target, record, delivery_date).await?;
        let shipping_rule = self.shipping_rule(target, record).await;

        let mut order = SalesOrder {
            name: RecordName::generate("SO"),
            customer: resolved.customer.name.clone(),
            po_no: Some(record.id().to_string()),
            link: Some(SyncLink::linked(target.server.clone(), record.id().clone())),
            woocommerce_status: remote_status_label(record),
            status: if config.submit_sales_orders {
                SUBMITTED_STATUS.to_string()
            } else {
                DRAFT_STATUS.to_string()
            },
            docstatus: if config.submit_sales_orders {
                DocStatus::Submitted
            } else {
                DocStatus::Draft
            },
            customer_note: record.str_field("customer_note").map(str::to_string),
            currency: config
                .currency
                .clone()
                .or_else(|| record.str_field("currency").map(str::to_string))
                .unwrap_or_default(),
            company: config.company.clone(),
            transaction_date,
            delivery_date,
            payment_method: payment_method(record),
            shipping_rule,
            discount_amount: record.decimal_field("discount_total").unwrap_or_default(),
            charges: charges(record, &config.cod_fee_label),
            items,
            grand_total: record.decimal_field("total").unwrap_or_default(),
            billing_address: resolved.billing_address,
            shipping_address: resolved.shipping_address,
            payment_entry: None,
            payment_entry_attempted: false,
            modified: Utc::now(),
        };
        order.grand_total = order.computed_total();

        order.modified = self.store.save_sales_order(&order).await?;
        self.save_watermarks(&mut order, record.modified()).await?;

        info!(
            sales_order = %order.name,
            customer = %order.customer,
            lines = order.items.len(),
            total = %order.grand_total,
            "Created sales order"
        );
        Ok(RecordOutcome::CreatedLocal)
    }

    /// Lines of a new sales order
    ///
    /// An order without lines keeps the remote total as its grand total.
    async fn order_lines(
        &self,
        target: &SyncTarget,
        record: &RemoteRecord,
        delivery_date: NaiveDate,
    ) -> Result<Vec<OrderLine>, SyncError> {
        let Some(lines) = record.field("line_items").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = identity::line_product(line);
            let item_code = self.items.ensure_local(target, &product).await?;
            let rate = line
                .get("price")
                .and_then(value_as_decimal)
                .unwrap_or_default();

            items.push(OrderLine {
                item_code,
                qty: line
                    .get("quantity")
                    .and_then(value_as_decimal)
                    .unwrap_or(Decimal::ONE),
                rate,
                discount_percentage: if rate.is_zero() {
                    Decimal::ONE_HUNDRED
                } else {
                    Decimal::ZERO
                },
                warehouse: target.config.warehouse.clone(),
                delivery_date,
            });
        }
        Ok(items)
    }

    /// Shipping rule of the order's first shipping line, when enabled
    async fn shipping_rule(&self, target: &SyncTarget, record: &RemoteRecord) -> Option<String> {
        if !target.config.enable_shipping_methods_sync {
            return None;
        }
        match identity::shipping_rule_for(record, &target.config) {
            ShippingRuleMatch::Matched(rule) => Some(rule),
            ShippingRuleMatch::Unmapped { method_title } => {
                warn!(order = %record.id(), method = %method_title, "No shipping rule mapped, order created without one");
                self.errors
                    .log_unmapped_shipping(&target.server, record.id().as_str(), &method_title)
                    .await;
                None
            }
            ShippingRuleMatch::NoShippingLine => None,
        }
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Remote is newer: copy status, note and payment method
    async fn update_local(
        &self,
        target: &SyncTarget,
        record: &RemoteRecord,
        mut order: SalesOrder,
    ) -> Result<RecordOutcome, SyncError> {
        let mut dirty = false;

        let status = remote_status_label(record);
        if status.is_some() && order.woocommerce_status != status {
            order.woocommerce_status = status;
            dirty = true;
        }
        let note = record.str_field("customer_note").map(str::to_string);
        if order.customer_note != note {
            order.customer_note = note;
            dirty = true;
        }
        let method = payment_method(record);
        if method.is_some() && order.payment_method != method {
            order.payment_method = method;
            dirty = true;
        }

        enable_link(&mut order, target);
        if dirty {
            order.modified = self.store.save_sales_order(&order).await?;
        }
        self.save_watermarks(&mut order, record.modified()).await?;

        if dirty {
            info!(sales_order = %order.name, status = ?order.woocommerce_status, "Updated sales order from remote");
            Ok(RecordOutcome::UpdatedLocal)
        } else {
            Ok(RecordOutcome::Skipped)
        }
    }

    /// Local is newer: push status and, when enabled, lines
    async fn update_remote(
        &self,
        target: &SyncTarget,
        record: &RemoteRecord,
        mut order: SalesOrder,
    ) -> Result<RecordOutcome, SyncError> {
        let mut body = Map::new();

        if let Some(slug) = order.woocommerce_status.as_deref().and_then(slug_for_label) {
            if record.status() != Some(slug) {
                body.insert("status".into(), json!(slug));
            }
        }

        if target.config.sync_so_items_to_wc {
            if let Some(line_items) = self.changed_line_items(target, record, &order).await? {
                body.insert("line_items".into(), Value::Array(line_items));
            }
        }

        enable_link(&mut order, target);
        let remote_modified = if body.is_empty() {
            record.modified()
        } else {
            let fields: Vec<String> = body.keys().cloned().collect();
            let updated = target
                .remote
                .update(&RemoteEntity::Order, record.id(), Value::Object(body))
                .await?;
            info!(sales_order = %order.name, remote = %record.id(), ?fields, "Updated remote order");
            updated.modified()
        };
        self.save_watermarks(&mut order, remote_modified).await?;

        if remote_modified == record.modified() {
            Ok(RecordOutcome::Skipped)
        } else {
            Ok(RecordOutcome::UpdatedRemote)
        }
    }

    /// Replacement `line_items` when the local lines differ from the remote ones
    ///
    /// Existing remote lines are removed (`product_id: null`) and the local
    /// lines added in their place.
    async fn changed_line_items(
        &self,
        target: &SyncTarget,
        record: &RemoteRecord,
        order: &SalesOrder,
    ) -> Result<Option<Vec<Value>>, SyncError> {
        let remote_lines = record
            .field("line_items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut local_lines = Vec::with_capacity(order.items.len());
        for line in &order.items {
            let Some(item) = self.store.get_item(&line.item_code).await? else {
                return Err(SyncError::NotFound(format!("item {}", line.item_code)));
            };
            let Some(remote_id) = item
                .links
                .for_server(&target.server)
                .and_then(|l| l.remote_id.clone())
            else {
                warn!(item = %item.item_code, "Item has no remote product, lines not pushed");
                return Ok(None);
            };
            let product_id = match item.kind.variant_of() {
                Some(template) => self
                    .store
                    .get_item(template)
                    .await?
                    .and_then(|t| t.links.for_server(&target.server).and_then(|l| l.remote_id.clone())),
                None => None,
            };
            local_lines.push(match (&item.kind, product_id) {
                (ItemKind::Variant { .. }, Some(parent)) => json!({
                    "product_id": value_of(parent.as_str()),
                    "variation_id": value_of(remote_id.as_str()),
                    "quantity": quantity_value(line.qty),
                    "price": line.rate,
                }),
                _ => json!({
                    "product_id": value_of(remote_id.as_str()),
                    "quantity": quantity_value(line.qty),
                    "price": line.rate,
                }),
            });
        }

        if !lines_differ(&remote_lines, &local_lines) {
            return Ok(None);
        }

        let mut replacement: Vec<Value> = remote_lines
            .iter()
            .filter_map(|line| line.get("id").cloned())
            .map(|id| json!({ "id": id, "product_id": null }))
            .collect();
        replacement.extend(local_lines);
        debug!(order = %record.id(), lines = replacement.len(), "Line items changed");
        Ok(Some(replacement))
    }

    // ========================================================================
    // Payments
    // ========================================================================

    /// Book the payment entry of a paid order, once its sales order is submitted
    ///
    /// Returns whether an entry was booked or the attempt recorded.
    async fn settle_payment(&self, target: &SyncTarget, record: &RemoteRecord) -> Result<bool, SyncError> {
        if !target.config.enable_payments_sync {
            return Ok(false);
        }
        let Some(mut order) = self
            .store
            .find_sales_order_by_remote(&target.server, record.id())
            .await?
        else {
            return Ok(false);
        };
        if !order.awaits_payment_entry() || !self.book_payment(target, record, &mut order).await? {
            return Ok(false);
        }

        order.modified = self.store.save_sales_order(&order).await?;
        let remote_modified = order
            .link
            .as_ref()
            .and_then(|link| link.last_remote_modified)
            .unwrap_or_else(|| record.modified());
        self.save_watermarks(&mut order, remote_modified).await?;
        Ok(true)
    }

    /// Create the payment entry for a paid order and link it
    ///
    /// An order without payment method, or unpaid while the paid date is
    /// honoured, is left for a later pass. A method mapped to an empty bank
    /// account only marks the attempt. An unmapped method is logged and
    /// retried on later passes.
    async fn book_payment(
        &self,
        target: &SyncTarget,
        record: &RemoteRecord,
        order: &mut SalesOrder,
    ) -> Result<bool, SyncError> {
        let config = &target.config;
        let Some(method) = record.str_field("payment_method") else {
            return Ok(false);
        };
        let paid_at = record.date_paid();
        if paid_at.is_none() && !config.ignore_date_paid {
            debug!(sales_order = %order.name, "Order not paid yet");
            return Ok(false);
        }

        let Some(bank_account) = config.bank_account_for(method) else {
            warn!(sales_order = %order.name, method, "Payment method not mapped, no payment entry");
            self.errors
                .log_unmapped_payment_method(&target.server, order.name.as_str(), method)
                .await;
            return Ok(false);
        };
        if bank_account.is_empty() {
            debug!(sales_order = %order.name, method, "Payment method books no entry");
            order.payment_entry_attempted = true;
            return Ok(true);
        }
        let Some(paid_to) = config.gl_account_for(method) else {
            warn!(sales_order = %order.name, method, "Payment method has no ledger account, no payment entry");
            self.errors
                .log_unmapped_payment_method(&target.server, order.name.as_str(), method)
                .await;
            return Ok(false);
        };

        let date = paid_at
            .map(|paid| paid.date_naive())
            .unwrap_or(order.transaction_date);
        let amount = record.decimal_field("total").unwrap_or(order.grand_total);
        let mut entry = PaymentEntry {
            name: RecordName::generate("PE"),
            company: order.company.clone(),
            party: order.customer.clone(),
            reference_no: payment_reference(record, method),
            reference_date: date,
            posting_date: date,
            paid_amount: amount,
            received_amount: amount,
            bank_account: bank_account.to_string(),
            paid_to: paid_to.to_string(),
            sales_order: order.name.clone(),
            total_amount: order.grand_total,
            allocated_amount: order.grand_total,
            modified: Utc::now(),
        };
        entry.modified = self.store.save_payment_entry(&entry).await?;

        info!(
            sales_order = %order.name,
            payment_entry = %entry.name,
            amount = %entry.paid_amount,
            reference = %entry.reference_no,
            "Booked payment entry"
        );
        order.payment_entry = Some(entry.name);
        order.payment_entry_attempted = true;
        Ok(true)
    }

    /// Record both watermarks on the order's link
    async fn save_watermarks(
        &self,
        order: &mut SalesOrder,
        remote_modified: chrono::DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let local_modified = order.modified;
        if let Some(link) = order.link.as_mut() {
            link.mark_synced(remote_modified, local_modified);
            self.store.save_sales_order_link(&order.name, link).await?;
        }
        Ok(())
    }
}

fn enable_link(order: &mut SalesOrder, target: &SyncTarget) {
    if let Some(link) = order.link.as_mut() {
        if link.server == target.server {
            link.enabled = true;
        }
    }
}

/// Remote ids are numeric; send them as JSON numbers
fn value_of(id: &str) -> Value {
    id.parse::<u64>().map(Value::from).unwrap_or_else(|_| json!(id))
}

/// Whole quantities as JSON integers, fractional ones as decimal strings
fn quantity_value(qty: Decimal) -> Value {
    match qty.fract().is_zero().then(|| qty.to_i64()).flatten() {
        Some(whole) => Value::from(whole),
        None => json!(qty),
    }
}

/// Remote status label of an order (`Processing` for `processing`)
fn remote_status_label(record: &RemoteRecord) -> Option<String> {
    record
        .status()
        .and_then(label_for_slug)
        .map(str::to_string)
}

/// Payment method title, or the method id when the title is too long
fn payment_method(record: &RemoteRecord) -> Option<String> {
    match record.str_field("payment_method_title") {
        Some(title) if title.chars().count() < MAX_PAYMENT_METHOD_TITLE => Some(title.to_string()),
        _ => record.str_field("payment_method").map(str::to_string),
    }
}

/// Gateway transaction id, the Yoco payment id, or the method title
fn payment_reference(record: &RemoteRecord, method: &str) -> String {
    record
        .str_field("transaction_id")
        .or_else(|| record.meta_str("yoco_order_payment_id"))
        .or_else(|| record.str_field("payment_method_title"))
        .unwrap_or(method)
        .to_string()
}

/// Shipping total and the COD fee as order charges
fn charges(record: &RemoteRecord, cod_fee_label: &str) -> Vec<OrderCharge> {
    let mut charges = Vec::new();

    let shipping = record.decimal_field("shipping_total").unwrap_or_default();
    if !shipping.is_zero() {
        charges.push(OrderCharge {
            description: "Shipping".to_string(),
            amount: shipping,
        });
    }

    let label = cod_fee_label.to_lowercase();
    let cod: Decimal = record
        .field("fee_lines")
        .and_then(Value::as_array)
        .map(|fees| {
            fees.iter()
                .filter(|fee| {
                    !label.is_empty()
                        && fee
                            .get("name")
                            .and_then(Value::as_str)
                            .is_some_and(|name| name.to_lowercase().contains(&label))
                })
                .filter_map(|fee| fee.get("total").and_then(value_as_decimal))
                .sum()
        })
        .unwrap_or_default();
    if !cod.is_zero() {
        charges.push(OrderCharge {
            description: format!("{cod_fee_label} Fee"),
            amount: cod,
        });
    }

    charges
}

/// Compare remote lines with local ones on product, quantity and price
fn lines_differ(remote: &[Value], local: &[Value]) -> bool {
    if remote.len() != local.len() {
        return true;
    }
    remote.iter().zip(local).any(|(r, l)| {
        let product = |line: &Value| {
            line.get("variation_id")
                .and_then(value_as_u64)
                .filter(|id| *id != 0)
                .or_else(|| line.get("product_id").and_then(value_as_u64))
        };
        let number = |line: &Value, key: &str| line.get(key).and_then(value_as_decimal);
        product(r) != product(l)
            || number(r, "quantity") != number(l, "quantity")
            || number(r, "price").map(|d| d.normalize()) != number(l, "price").map(|d| d.normalize())
    })
}
