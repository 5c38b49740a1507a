//! SQLite implementation of ILocalStore
//!
//! Every `save_*` stamps `modified` with the write time and returns it.
//! Items and customers are upserted in place so that rows referencing them
//! (links, addresses, contacts) survive an update.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use woosync_core::domain::{
    Address, Contact, Customer, CustomerIdentifier, Item, ItemAttribute, ItemCode, PaymentEntry,
    RecordName, RemoteId, SalesOrder, ServerId, StockLevel, SyncLink, SyncLinks,
};
use woosync_core::ports::{ILocalStore, ItemFilter, SalesOrderFilter};

use crate::rows::{
    address_from_row, contact_from_row, customer_from_row, customer_type_to_str, encode_date,
    encode_datetime, item_attribute_from_row, item_from_row, item_kind_columns,
    item_link_from_row, order_charge_from_row, order_line_from_row, payment_entry_from_row,
    sales_order_from_row, stamp_now, stock_level_from_row,
};
use crate::StoreError;

/// SQLite-backed store for ERP records and sync state
///
/// Implements both [`ILocalStore`] and
/// [`ISyncStateRepository`](woosync_core::ports::ISyncStateRepository)
/// over one connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a store over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_item_links(&self, code: &str) -> Result<SyncLinks, StoreError> {
        let rows = sqlx::query("SELECT * FROM item_links WHERE item_code = ? ORDER BY server")
            .bind(code)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(item_link_from_row).collect()
    }

    async fn load_item(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Item, StoreError> {
        let code: String = row.get("item_code");
        let links = self.load_item_links(&code).await?;
        item_from_row(row, links)
    }

    async fn load_sales_order(
        &self,
        row: &sqlx::sqlite::SqliteRow,
    ) -> Result<SalesOrder, StoreError> {
        let name: String = row.get("name");

        let line_rows =
            sqlx::query("SELECT * FROM sales_order_items WHERE parent = ? ORDER BY idx")
                .bind(&name)
                .fetch_all(&self.pool)
                .await?;
        let items = line_rows
            .iter()
            .map(order_line_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let charge_rows =
            sqlx::query("SELECT * FROM sales_order_charges WHERE parent = ? ORDER BY idx")
                .bind(&name)
                .fetch_all(&self.pool)
                .await?;
        let charges = charge_rows
            .iter()
            .map(order_charge_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        sales_order_from_row(row, items, charges)
    }
}

/// Replace all links of an item inside an open transaction
async fn write_item_links(
    conn: &mut sqlx::SqliteConnection,
    code: &str,
    links: &SyncLinks,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM item_links WHERE item_code = ?")
        .bind(code)
        .execute(&mut *conn)
        .await?;

    for link in links.iter() {
        sqlx::query(
            "INSERT INTO item_links \
             (item_code, server, remote_id, enabled, last_remote_modified, last_local_modified) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(code)
        .bind(link.server.as_str())
        .bind(link.remote_id.as_ref().map(RemoteId::as_str))
        .bind(link.enabled)
        .bind(link.last_remote_modified.as_ref().map(encode_datetime))
        .bind(link.last_local_modified.as_ref().map(encode_datetime))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl ILocalStore for SqliteStore {
    // --- Items ---

    async fn get_item(&self, code: &ItemCode) -> anyhow::Result<Option<Item>> {
        let row = sqlx::query("SELECT * FROM items WHERE item_code = ?")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(self.load_item(r).await?)),
            None => Ok(None),
        }
    }

    async fn find_item_by_remote(
        &self,
        server: &ServerId,
        remote_id: &RemoteId,
    ) -> anyhow::Result<Option<Item>> {
        let row = sqlx::query(
            "SELECT i.* FROM items i \
             JOIN item_links l ON l.item_code = i.item_code \
             WHERE l.server = ? AND l.remote_id = ? \
             ORDER BY l.enabled DESC, i.item_code LIMIT 1",
        )
        .bind(server.as_str())
        .bind(remote_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(self.load_item(r).await?)),
            None => Ok(None),
        }
    }

    async fn query_items(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>> {
        let mut sql = String::from("SELECT * FROM items WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref modified_since) = filter.modified_since {
            sql.push_str(" AND modified > ?");
            binds.push(encode_datetime(modified_since));
        }

        if let Some(ref server) = filter.linked_to {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM item_links l \
                 WHERE l.item_code = items.item_code AND l.server = ? AND l.enabled = 1)",
            );
            binds.push(server.as_str().to_string());
        }

        if let Some(ref template) = filter.variant_of {
            sql.push_str(" AND variant_of = ?");
            binds.push(template.as_str().to_string());
        }

        sql.push_str(" ORDER BY item_code");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(self.load_item(row).await?);
        }
        Ok(items)
    }

    async fn save_item(&self, item: &Item) -> anyhow::Result<DateTime<Utc>> {
        let modified = stamp_now();
        let (kind, variant_of) = item_kind_columns(&item.kind);
        let attributes = serde_json::to_string(&item.attributes)
            .map_err(|e| anyhow::anyhow!("Failed to serialize attributes: {}", e))?;
        let custom_fields = serde_json::to_string(&item.custom_fields)
            .map_err(|e| anyhow::anyhow!("Failed to serialize custom fields: {}", e))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO items \
             (item_code, item_name, kind, variant_of, description, image, item_group, \
              stock_uom, disabled, is_stock_item, attributes, custom_fields, modified) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(item_code) DO UPDATE SET \
              item_name = excluded.item_name, kind = excluded.kind, \
              variant_of = excluded.variant_of, description = excluded.description, \
              image = excluded.image, item_group = excluded.item_group, \
              stock_uom = excluded.stock_uom, disabled = excluded.disabled, \
              is_stock_item = excluded.is_stock_item, attributes = excluded.attributes, \
              custom_fields = excluded.custom_fields, modified = excluded.modified",
        )
        .bind(item.item_code.as_str())
        .bind(&item.item_name)
        .bind(kind)
        .bind(variant_of)
        .bind(&item.description)
        .bind(&item.image)
        .bind(&item.item_group)
        .bind(&item.stock_uom)
        .bind(item.disabled)
        .bind(item.is_stock_item)
        .bind(&attributes)
        .bind(&custom_fields)
        .bind(encode_datetime(&modified))
        .execute(&mut *tx)
        .await?;

        write_item_links(&mut tx, item.item_code.as_str(), &item.links).await?;
        tx.commit().await?;

        tracing::trace!(item = %item.item_code, "Saved item");
        Ok(modified)
    }

    async fn save_item_links(&self, code: &ItemCode, links: &SyncLinks) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<String> =
            sqlx::query_scalar("SELECT item_code FROM items WHERE item_code = ?")
                .bind(code.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            anyhow::bail!("Item {} does not exist", code);
        }

        write_item_links(&mut tx, code.as_str(), links).await?;
        tx.commit().await?;

        tracing::trace!(item = %code, links = links.len(), "Saved item links");
        Ok(())
    }

    async fn get_item_attribute(&self, name: &str) -> anyhow::Result<Option<ItemAttribute>> {
        let row = sqlx::query("SELECT * FROM item_attributes WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(item_attribute_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn save_item_attribute(&self, attribute: &ItemAttribute) -> anyhow::Result<()> {
        let values = serde_json::to_string(&attribute.values)
            .map_err(|e| anyhow::anyhow!("Failed to serialize attribute values: {}", e))?;

        sqlx::query("INSERT OR REPLACE INTO item_attributes (name, attribute_values) VALUES (?, ?)")
            .bind(&attribute.name)
            .bind(&values)
            .execute(&self.pool)
            .await?;

        tracing::trace!(attribute = %attribute.name, "Saved item attribute");
        Ok(())
    }

    // --- Customers ---

    async fn get_customer(&self, name: &str) -> anyhow::Result<Option<Customer>> {
        let row = sqlx::query("SELECT * FROM customers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(customer_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn find_customer_by_identifier(
        &self,
        identifier: &CustomerIdentifier,
    ) -> anyhow::Result<Option<Customer>> {
        let row = sqlx::query(
            "SELECT * FROM customers WHERE woocommerce_identifier = ? ORDER BY name LIMIT 1",
        )
        .bind(identifier.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(customer_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn save_customer(&self, customer: &Customer) -> anyhow::Result<DateTime<Utc>> {
        let modified = stamp_now();

        sqlx::query(
            "INSERT INTO customers \
             (name, customer_name, customer_type, woocommerce_identifier, tax_id, gst_id, \
              customer_group, modified) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
              customer_name = excluded.customer_name, customer_type = excluded.customer_type, \
              woocommerce_identifier = excluded.woocommerce_identifier, \
              tax_id = excluded.tax_id, gst_id = excluded.gst_id, customer_group = excluded.customer_group, \
              modified = excluded.modified",
        )
        .bind(&customer.name)
        .bind(&customer.customer_name)
        .bind(customer_type_to_str(customer.customer_type))
        .bind(customer.identifier.as_str())
        .bind(&customer.tax_id)
        .bind(&customer.gst_id)
        .bind(&customer.customer_group)
        .bind(encode_datetime(&modified))
        .execute(&self.pool)
        .await?;

        tracing::trace!(customer = %customer.name, "Saved customer");
        Ok(modified)
    }

    async fn get_addresses(&self, customer: &str) -> anyhow::Result<Vec<Address>> {
        let rows = sqlx::query("SELECT * FROM addresses WHERE customer = ? ORDER BY name")
            .bind(customer)
            .fetch_all(&self.pool)
            .await?;

        let mut addresses = Vec::with_capacity(rows.len());
        for row in &rows {
            addresses.push(address_from_row(row)?);
        }
        Ok(addresses)
    }

    async fn save_address(&self, address: &Address) -> anyhow::Result<DateTime<Utc>> {
        let modified = stamp_now();

        sqlx::query(
            "INSERT OR REPLACE INTO addresses \
             (name, customer, is_primary_address, is_shipping_address, address_title, \
              address_line1, address_line2, city, state, pincode, country, phone, email_id, \
              modified) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&address.name)
        .bind(&address.customer)
        .bind(address.is_primary_address)
        .bind(address.is_shipping_address)
        .bind(&address.title)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.pincode)
        .bind(&address.country)
        .bind(&address.phone)
        .bind(&address.email)
        .bind(encode_datetime(&modified))
        .execute(&self.pool)
        .await?;

        tracing::trace!(address = %address.name, customer = %address.customer, "Saved address");
        Ok(modified)
    }

    async fn get_contacts(&self, customer: &str) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query("SELECT * FROM contacts WHERE customer = ? ORDER BY name")
            .bind(customer)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(contact_from_row).collect())
    }

    async fn save_contact(&self, contact: &Contact) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO contacts \
             (name, customer, first_name, last_name, email_id, phone) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&contact.name)
        .bind(&contact.customer)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .execute(&self.pool)
        .await?;

        tracing::trace!(contact = %contact.name, "Saved contact");
        Ok(())
    }

    // --- Sales orders ---

    async fn get_sales_order(&self, name: &RecordName) -> anyhow::Result<Option<SalesOrder>> {
        let row = sqlx::query("SELECT * FROM sales_orders WHERE name = ?")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(self.load_sales_order(r).await?)),
            None => Ok(None),
        }
    }

    async fn find_sales_order_by_remote(
        &self,
        server: &ServerId,
        remote_id: &RemoteId,
    ) -> anyhow::Result<Option<SalesOrder>> {
        let row = sqlx::query(
            "SELECT * FROM sales_orders WHERE link_server = ? AND link_remote_id = ? \
             ORDER BY name LIMIT 1",
        )
        .bind(server.as_str())
        .bind(remote_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(self.load_sales_order(r).await?)),
            None => Ok(None),
        }
    }

    async fn query_sales_orders(
        &self,
        filter: &SalesOrderFilter,
    ) -> anyhow::Result<Vec<SalesOrder>> {
        let mut sql = String::from("SELECT * FROM sales_orders WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref modified_since) = filter.modified_since {
            sql.push_str(" AND modified > ?");
            binds.push(encode_datetime(modified_since));
        }

        if let Some(ref server) = filter.linked_to {
            sql.push_str(" AND link_server = ?");
            binds.push(server.as_str().to_string());
        }

        sql.push_str(" ORDER BY name");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.load_sales_order(row).await?);
        }
        Ok(orders)
    }

    async fn save_sales_order(&self, order: &SalesOrder) -> anyhow::Result<DateTime<Utc>> {
        let modified = stamp_now();
        let name = order.name.as_str();
        let link = order.link.as_ref();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT OR REPLACE INTO sales_orders \
             (name, customer, po_no, link_server, link_remote_id, link_enabled, \
              link_last_remote_modified, link_last_local_modified, woocommerce_status, status, \
              docstatus, customer_note, currency, company, transaction_date, delivery_date, \
              payment_method, shipping_rule, discount_amount, grand_total, customer_address, \
              shipping_address_name, payment_entry, payment_entry_attempted, modified) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(&order.customer)
        .bind(&order.po_no)
        .bind(link.map(|l| l.server.as_str()))
        .bind(link.and_then(|l| l.remote_id.as_ref()).map(RemoteId::as_str))
        .bind(link.map_or(true, |l| l.enabled))
        .bind(link.and_then(|l| l.last_remote_modified.as_ref()).map(encode_datetime))
        .bind(link.and_then(|l| l.last_local_modified.as_ref()).map(encode_datetime))
        .bind(&order.woocommerce_status)
        .bind(&order.status)
        .bind(order.docstatus.as_i64())
        .bind(&order.customer_note)
        .bind(&order.currency)
        .bind(&order.company)
        .bind(encode_date(&order.transaction_date))
        .bind(encode_date(&order.delivery_date))
        .bind(&order.payment_method)
        .bind(&order.shipping_rule)
        .bind(order.discount_amount.to_string())
        .bind(order.grand_total.to_string())
        .bind(&order.billing_address)
        .bind(&order.shipping_address)
        .bind(order.payment_entry.as_ref().map(RecordName::as_str))
        .bind(order.payment_entry_attempted)
        .bind(encode_datetime(&modified))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM sales_order_items WHERE parent = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        for (idx, line) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO sales_order_items \
                 (parent, idx, item_code, qty, rate, discount_percentage, warehouse, delivery_date) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(name)
            .bind(idx as i64)
            .bind(line.item_code.as_str())
            .bind(line.qty.to_string())
            .bind(line.rate.to_string())
            .bind(line.discount_percentage.to_string())
            .bind(&line.warehouse)
            .bind(encode_date(&line.delivery_date))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM sales_order_charges WHERE parent = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        for (idx, charge) in order.charges.iter().enumerate() {
            sqlx::query(
                "INSERT INTO sales_order_charges (parent, idx, description, amount) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(name)
            .bind(idx as i64)
            .bind(&charge.description)
            .bind(charge.amount.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::trace!(order = %name, lines = order.items.len(), "Saved sales order");
        Ok(modified)
    }

    async fn save_sales_order_link(
        &self,
        name: &RecordName,
        link: &SyncLink,
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE sales_orders SET \
             link_server = ?, link_remote_id = ?, link_enabled = ?, \
             link_last_remote_modified = ?, link_last_local_modified = ? \
             WHERE name = ?",
        )
        .bind(link.server.as_str())
        .bind(link.remote_id.as_ref().map(RemoteId::as_str))
        .bind(link.enabled)
        .bind(link.last_remote_modified.as_ref().map(encode_datetime))
        .bind(link.last_local_modified.as_ref().map(encode_datetime))
        .bind(name.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Sales order {} does not exist", name);
        }

        tracing::trace!(order = %name, server = %link.server, "Saved sales order link");
        Ok(())
    }

    // --- Payment entries ---

    async fn get_payment_entry(&self, name: &RecordName) -> anyhow::Result<Option<PaymentEntry>> {
        let row = sqlx::query("SELECT * FROM payment_entries WHERE name = ?")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(payment_entry_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn payment_entries_for_order(
        &self,
        sales_order: &RecordName,
    ) -> anyhow::Result<Vec<PaymentEntry>> {
        let rows = sqlx::query("SELECT * FROM payment_entries WHERE sales_order = ? ORDER BY name")
            .bind(sales_order.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(payment_entry_from_row(row)?);
        }
        Ok(entries)
    }

    async fn save_payment_entry(&self, entry: &PaymentEntry) -> anyhow::Result<DateTime<Utc>> {
        let modified = stamp_now();

        sqlx::query(
            "INSERT OR REPLACE INTO payment_entries \
             (name, company, party, reference_no, reference_date, posting_date, paid_amount, \
              received_amount, bank_account, paid_to, sales_order, total_amount, \
              allocated_amount, modified) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.name.as_str())
        .bind(&entry.company)
        .bind(&entry.party)
        .bind(&entry.reference_no)
        .bind(encode_date(&entry.reference_date))
        .bind(encode_date(&entry.posting_date))
        .bind(entry.paid_amount.to_string())
        .bind(entry.received_amount.to_string())
        .bind(&entry.bank_account)
        .bind(&entry.paid_to)
        .bind(entry.sales_order.as_str())
        .bind(entry.total_amount.to_string())
        .bind(entry.allocated_amount.to_string())
        .bind(encode_datetime(&modified))
        .execute(&self.pool)
        .await?;

        tracing::trace!(payment_entry = %entry.name, order = %entry.sales_order, "Saved payment entry");
        Ok(modified)
    }

    // --- Stock ---

    async fn get_stock_levels(&self, code: &ItemCode) -> anyhow::Result<Vec<StockLevel>> {
        let rows = sqlx::query("SELECT * FROM stock_levels WHERE item_code = ? ORDER BY warehouse")
            .bind(code.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut levels = Vec::with_capacity(rows.len());
        for row in &rows {
            levels.push(stock_level_from_row(row)?);
        }
        Ok(levels)
    }

    async fn save_stock_level(&self, level: &StockLevel) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO stock_levels (item_code, warehouse, actual_qty, reserved_qty) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(level.item_code.as_str())
        .bind(&level.warehouse)
        .bind(level.actual_qty.to_string())
        .bind(level.reserved_qty.to_string())
        .execute(&self.pool)
        .await?;

        tracing::trace!(item = %level.item_code, warehouse = %level.warehouse, "Saved stock level");
        Ok(())
    }
}
