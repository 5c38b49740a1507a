//! Local store port (driven/secondary port)
//!
//! This module defines the interface to the ERP records the synchronisers
//! read and write: items, item attributes, customers, addresses, contacts,
//! sales orders, payment entries and stock levels.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - `save_*` methods stamp the record's `modified` time and return it.
//!   Link-only updates (`save_item_links`, `save_sales_order_link`) do not
//!   touch `modified`, so writing sync watermarks never looks like a local edit.
//! - Records are never deleted through this port.

use chrono::{DateTime, Utc};

use crate::domain::{
    Address, Contact, Customer, CustomerIdentifier, Item, ItemAttribute, ItemCode, PaymentEntry,
    RecordName, RemoteId, SalesOrder, ServerId, StockLevel, SyncLink, SyncLinks,
};

/// Filter criteria for querying items
///
/// All fields are optional; when `None`, no filtering is applied for that field.
/// Multiple filters are combined with AND logic.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Items modified after this timestamp
    pub modified_since: Option<DateTime<Utc>>,
    /// Items with an enabled link to this server
    pub linked_to: Option<ServerId>,
    /// Variants of this template
    pub variant_of: Option<ItemCode>,
}

impl ItemFilter {
    /// Creates a new empty filter (matches all items)
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the modified since filter
    pub fn with_modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.modified_since = Some(since);
        self
    }

    /// Sets the linked server filter
    pub fn with_linked_to(mut self, server: ServerId) -> Self {
        self.linked_to = Some(server);
        self
    }

    /// Sets the template filter
    pub fn with_variant_of(mut self, template: ItemCode) -> Self {
        self.variant_of = Some(template);
        self
    }

    /// Returns true if no filters are set
    pub fn is_empty(&self) -> bool {
        self.modified_since.is_none() && self.linked_to.is_none() && self.variant_of.is_none()
    }
}

/// Filter criteria for querying sales orders
#[derive(Debug, Clone, Default)]
pub struct SalesOrderFilter {
    /// Orders modified after this timestamp
    pub modified_since: Option<DateTime<Utc>>,
    /// Orders linked to this server
    pub linked_to: Option<ServerId>,
}

impl SalesOrderFilter {
    /// Creates a new empty filter (matches all orders)
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the modified since filter
    pub fn with_modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.modified_since = Some(since);
        self
    }

    /// Sets the linked server filter
    pub fn with_linked_to(mut self, server: ServerId) -> Self {
        self.linked_to = Some(server);
        self
    }
}

/// Port trait for ERP record storage
#[async_trait::async_trait]
pub trait ILocalStore: Send + Sync {
    // --- Items ---

    /// Retrieves an item by code
    async fn get_item(&self, code: &ItemCode) -> anyhow::Result<Option<Item>>;

    /// Retrieves the item linked to a remote product or variation
    async fn find_item_by_remote(
        &self,
        server: &ServerId,
        remote_id: &RemoteId,
    ) -> anyhow::Result<Option<Item>>;

    /// Queries items matching the given filter, ordered by code
    async fn query_items(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>>;

    /// Saves an item (insert or update); returns the stamped modification time
    async fn save_item(&self, item: &Item) -> anyhow::Result<DateTime<Utc>>;

    /// Replaces the links of an item without stamping `modified`
    async fn save_item_links(&self, code: &ItemCode, links: &SyncLinks) -> anyhow::Result<()>;

    /// Retrieves an attribute master record
    async fn get_item_attribute(&self, name: &str) -> anyhow::Result<Option<ItemAttribute>>;

    /// Saves an attribute master record (insert or update)
    async fn save_item_attribute(&self, attribute: &ItemAttribute) -> anyhow::Result<()>;

    // --- Customers ---

    /// Retrieves a customer by name
    async fn get_customer(&self, name: &str) -> anyhow::Result<Option<Customer>>;

    /// Exact-match lookup on the derived customer identifier
    async fn find_customer_by_identifier(
        &self,
        identifier: &CustomerIdentifier,
    ) -> anyhow::Result<Option<Customer>>;

    /// Saves a customer (insert or update)
    async fn save_customer(&self, customer: &Customer) -> anyhow::Result<DateTime<Utc>>;

    /// All addresses of a customer, ordered by name
    async fn get_addresses(&self, customer: &str) -> anyhow::Result<Vec<Address>>;

    /// Saves an address (insert or update)
    async fn save_address(&self, address: &Address) -> anyhow::Result<DateTime<Utc>>;

    /// All contacts of a customer
    async fn get_contacts(&self, customer: &str) -> anyhow::Result<Vec<Contact>>;

    /// Saves a contact (insert or update)
    async fn save_contact(&self, contact: &Contact) -> anyhow::Result<()>;

    // --- Sales orders ---

    /// Retrieves a sales order by name
    async fn get_sales_order(&self, name: &RecordName) -> anyhow::Result<Option<SalesOrder>>;

    /// Retrieves the sales order linked to a remote order
    async fn find_sales_order_by_remote(
        &self,
        server: &ServerId,
        remote_id: &RemoteId,
    ) -> anyhow::Result<Option<SalesOrder>>;

    /// Queries sales orders matching the given filter, ordered by name
    async fn query_sales_orders(&self, filter: &SalesOrderFilter)
        -> anyhow::Result<Vec<SalesOrder>>;

    /// Saves a sales order with its lines and charges (insert or update)
    async fn save_sales_order(&self, order: &SalesOrder) -> anyhow::Result<DateTime<Utc>>;

    /// Replaces the link of a sales order without stamping `modified`
    async fn save_sales_order_link(
        &self,
        name: &RecordName,
        link: &SyncLink,
    ) -> anyhow::Result<()>;

    // --- Payment entries ---

    /// Retrieves a payment entry by name
    async fn get_payment_entry(&self, name: &RecordName) -> anyhow::Result<Option<PaymentEntry>>;

    /// Payment entries allocated against a sales order, ordered by name
    async fn payment_entries_for_order(
        &self,
        sales_order: &RecordName,
    ) -> anyhow::Result<Vec<PaymentEntry>>;

    /// Saves a payment entry (insert or update)
    async fn save_payment_entry(&self, entry: &PaymentEntry) -> anyhow::Result<DateTime<Utc>>;

    // --- Stock ---

    /// Stock levels of an item across all warehouses
    async fn get_stock_levels(&self, code: &ItemCode) -> anyhow::Result<Vec<StockLevel>>;

    /// Saves a stock level (insert or update)
    async fn save_stock_level(&self, level: &StockLevel) -> anyhow::Result<()>;
}
