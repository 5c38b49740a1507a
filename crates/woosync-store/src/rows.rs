//! Column encoding and row mapping
//!
//! ## Type Mapping
//!
//! | Domain Type                         | SQL Type | Strategy                               |
//! |-------------------------------------|----------|----------------------------------------|
//! | ItemCode, RecordName, ServerId, ... | TEXT     | `.as_str()` / validating constructor   |
//! | DateTime<Utc>                       | TEXT     | RFC 3339, microseconds, `Z` suffix     |
//! | NaiveDate                           | TEXT     | `%Y-%m-%d`                             |
//! | Decimal                             | TEXT     | `to_string()` / `Decimal::from_str`    |
//! | ItemKind                            | TEXT     | `kind` + `variant_of` columns          |
//! | ItemAttributeValue[], custom fields | TEXT     | serde_json                             |
//! | bool                                | INTEGER  | 0 / 1                                  |

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Timelike, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use woosync_core::domain::{
    Address, Contact, Customer, CustomerIdentifier, CustomerType, DocStatus, ErrorKind,
    ErrorLogEntry, ErrorLogId, Item, ItemAttribute, ItemCode, ItemKind, OrderCharge, OrderLine,
    PaymentEntry, RecordName, RemoteId, RunId, SalesOrder, ServerId, StockLevel, SyncLink,
    SyncLinks, SyncScope,
};

use crate::StoreError;

// ============================================================================
// Scalar conversions
// ============================================================================

/// Current time at the precision the store keeps
///
/// Truncated to microseconds so a stamped value survives a round trip.
pub(crate) fn stamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

pub(crate) fn encode_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

pub(crate) fn parse_optional_datetime(
    s: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

pub(crate) fn encode_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| StoreError::SerializationError(format!("Failed to parse date '{}': {}", s, e)))
}

fn parse_decimal(s: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(s)
        .map_err(|e| StoreError::SerializationError(format!("Invalid decimal '{}': {}", s, e)))
}

fn serialization<E: std::fmt::Display>(what: &str, value: &str) -> impl FnOnce(E) -> StoreError {
    let context = format!("Invalid {} '{}'", what, value);
    move |e| StoreError::SerializationError(format!("{}: {}", context, e))
}

pub(crate) fn customer_type_to_str(customer_type: CustomerType) -> &'static str {
    match customer_type {
        CustomerType::Company => "Company",
        CustomerType::Individual => "Individual",
    }
}

fn customer_type_from_str(s: &str) -> Result<CustomerType, StoreError> {
    match s {
        "Company" => Ok(CustomerType::Company),
        "Individual" => Ok(CustomerType::Individual),
        other => Err(StoreError::SerializationError(format!(
            "Unknown customer type: {}",
            other
        ))),
    }
}

/// `kind` and `variant_of` columns of an item
pub(crate) fn item_kind_columns(kind: &ItemKind) -> (&'static str, Option<&str>) {
    match kind {
        ItemKind::Normal => ("normal", None),
        ItemKind::Template => ("template", None),
        ItemKind::Variant { variant_of } => ("variant", Some(variant_of.as_str())),
    }
}

fn item_kind_from_columns(kind: &str, variant_of: Option<String>) -> Result<ItemKind, StoreError> {
    match (kind, variant_of) {
        ("normal", _) => Ok(ItemKind::Normal),
        ("template", _) => Ok(ItemKind::Template),
        ("variant", Some(template)) => Ok(ItemKind::Variant {
            variant_of: ItemCode::new(template.clone())
                .map_err(serialization("template code", &template))?,
        }),
        ("variant", None) => Err(StoreError::SerializationError(
            "Variant item without template".to_string(),
        )),
        (other, _) => Err(StoreError::SerializationError(format!(
            "Unknown item kind: {}",
            other
        ))),
    }
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct a SyncLink from link columns sharing a prefix
///
/// Returns `None` when the server column is NULL.
fn link_from_columns(row: &SqliteRow, prefix: &str, server_col: &str) -> Result<Option<SyncLink>, StoreError> {
    let server: Option<String> = row.get(server_col);
    let Some(server) = server else {
        return Ok(None);
    };
    let remote_id: Option<String> = row.get(format!("{prefix}remote_id").as_str());
    let enabled: bool = row.get(format!("{prefix}enabled").as_str());
    let last_remote: Option<String> = row.get(format!("{prefix}last_remote_modified").as_str());
    let last_local: Option<String> = row.get(format!("{prefix}last_local_modified").as_str());

    let remote_id = match remote_id {
        Some(id) if !id.is_empty() => {
            Some(RemoteId::new(id.clone()).map_err(serialization("remote id", &id))?)
        }
        _ => None,
    };

    Ok(Some(SyncLink {
        server: ServerId::new(server.clone()).map_err(serialization("server", &server))?,
        remote_id,
        enabled,
        last_remote_modified: parse_optional_datetime(last_remote)?,
        last_local_modified: parse_optional_datetime(last_local)?,
    }))
}

/// Reconstruct a SyncLink from an `item_links` row
pub(crate) fn item_link_from_row(row: &SqliteRow) -> Result<SyncLink, StoreError> {
    link_from_columns(row, "", "server")?
        .ok_or_else(|| StoreError::SerializationError("Item link without server".to_string()))
}

/// Reconstruct an Item from an `items` row and its links
pub(crate) fn item_from_row(row: &SqliteRow, links: SyncLinks) -> Result<Item, StoreError> {
    let code: String = row.get("item_code");
    let kind: String = row.get("kind");
    let variant_of: Option<String> = row.get("variant_of");
    let attributes: String = row.get("attributes");
    let custom_fields: String = row.get("custom_fields");
    let modified: String = row.get("modified");

    Ok(Item {
        item_code: ItemCode::new(code.clone()).map_err(serialization("item code", &code))?,
        item_name: row.get("item_name"),
        kind: item_kind_from_columns(&kind, variant_of)?,
        description: row.get("description"),
        image: row.get("image"),
        item_group: row.get("item_group"),
        stock_uom: row.get("stock_uom"),
        disabled: row.get("disabled"),
        is_stock_item: row.get("is_stock_item"),
        attributes: serde_json::from_str(&attributes)?,
        custom_fields: serde_json::from_str(&custom_fields)?,
        links,
        modified: parse_datetime(&modified)?,
    })
}

pub(crate) fn item_attribute_from_row(row: &SqliteRow) -> Result<ItemAttribute, StoreError> {
    let values: String = row.get("attribute_values");
    Ok(ItemAttribute {
        name: row.get("name"),
        values: serde_json::from_str(&values)?,
    })
}

pub(crate) fn customer_from_row(row: &SqliteRow) -> Result<Customer, StoreError> {
    let customer_type: String = row.get("customer_type");
    let identifier: String = row.get("woocommerce_identifier");
    let modified: String = row.get("modified");

    Ok(Customer {
        name: row.get("name"),
        customer_name: row.get("customer_name"),
        customer_type: customer_type_from_str(&customer_type)?,
        identifier: CustomerIdentifier::new(identifier.clone())
            .map_err(serialization("customer identifier", &identifier))?,
        tax_id: row.get("tax_id"),
        gst_id: row.get("gst_id"),
        customer_group: row.get("customer_group"),
        modified: parse_datetime(&modified)?,
    })
}

pub(crate) fn address_from_row(row: &SqliteRow) -> Result<Address, StoreError> {
    let modified: String = row.get("modified");
    Ok(Address {
        name: row.get("name"),
        customer: row.get("customer"),
        is_primary_address: row.get("is_primary_address"),
        is_shipping_address: row.get("is_shipping_address"),
        title: row.get("address_title"),
        line1: row.get("address_line1"),
        line2: row.get("address_line2"),
        city: row.get("city"),
        state: row.get("state"),
        pincode: row.get("pincode"),
        country: row.get("country"),
        phone: row.get("phone"),
        email: row.get("email_id"),
        modified: parse_datetime(&modified)?,
    })
}

pub(crate) fn contact_from_row(row: &SqliteRow) -> Contact {
    Contact {
        name: row.get("name"),
        customer: row.get("customer"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email_id"),
        phone: row.get("phone"),
    }
}

pub(crate) fn order_line_from_row(row: &SqliteRow) -> Result<OrderLine, StoreError> {
    let code: String = row.get("item_code");
    let qty: String = row.get("qty");
    let rate: String = row.get("rate");
    let discount: String = row.get("discount_percentage");
    let delivery_date: String = row.get("delivery_date");

    Ok(OrderLine {
        item_code: ItemCode::new(code.clone()).map_err(serialization("item code", &code))?,
        qty: parse_decimal(&qty)?,
        rate: parse_decimal(&rate)?,
        discount_percentage: parse_decimal(&discount)?,
        warehouse: row.get("warehouse"),
        delivery_date: parse_date(&delivery_date)?,
    })
}

pub(crate) fn order_charge_from_row(row: &SqliteRow) -> Result<OrderCharge, StoreError> {
    let amount: String = row.get("amount");
    Ok(OrderCharge {
        description: row.get("description"),
        amount: parse_decimal(&amount)?,
    })
}

/// Reconstruct a SalesOrder header; lines and charges are loaded separately
pub(crate) fn sales_order_from_row(
    row: &SqliteRow,
    items: Vec<OrderLine>,
    charges: Vec<OrderCharge>,
) -> Result<SalesOrder, StoreError> {
    let name: String = row.get("name");
    let docstatus: i64 = row.get("docstatus");
    let transaction_date: String = row.get("transaction_date");
    let delivery_date: String = row.get("delivery_date");
    let discount_amount: String = row.get("discount_amount");
    let grand_total: String = row.get("grand_total");
    let payment_entry: Option<String> = row.get("payment_entry");
    let modified: String = row.get("modified");

    Ok(SalesOrder {
        name: RecordName::new(name.clone()).map_err(serialization("record name", &name))?,
        customer: row.get("customer"),
        po_no: row.get("po_no"),
        link: link_from_columns(row, "link_", "link_server")?,
        woocommerce_status: row.get("woocommerce_status"),
        status: row.get("status"),
        docstatus: DocStatus::from_i64(docstatus).ok_or_else(|| {
            StoreError::SerializationError(format!("Unknown docstatus: {}", docstatus))
        })?,
        customer_note: row.get("customer_note"),
        currency: row.get("currency"),
        company: row.get("company"),
        transaction_date: parse_date(&transaction_date)?,
        delivery_date: parse_date(&delivery_date)?,
        payment_method: row.get("payment_method"),
        shipping_rule: row.get("shipping_rule"),
        discount_amount: parse_decimal(&discount_amount)?,
        charges,
        items,
        grand_total: parse_decimal(&grand_total)?,
        billing_address: row.get("customer_address"),
        shipping_address: row.get("shipping_address_name"),
        payment_entry: payment_entry
            .map(|name| RecordName::new(name.clone()).map_err(serialization("payment entry", &name)))
            .transpose()?,
        payment_entry_attempted: row.get("payment_entry_attempted"),
        modified: parse_datetime(&modified)?,
    })
}

pub(crate) fn payment_entry_from_row(row: &SqliteRow) -> Result<PaymentEntry, StoreError> {
    let name: String = row.get("name");
    let sales_order: String = row.get("sales_order");
    let reference_date: String = row.get("reference_date");
    let posting_date: String = row.get("posting_date");
    let paid: String = row.get("paid_amount");
    let received: String = row.get("received_amount");
    let total: String = row.get("total_amount");
    let allocated: String = row.get("allocated_amount");
    let modified: String = row.get("modified");

    Ok(PaymentEntry {
        name: RecordName::new(name.clone()).map_err(serialization("record name", &name))?,
        company: row.get("company"),
        party: row.get("party"),
        reference_no: row.get("reference_no"),
        reference_date: parse_date(&reference_date)?,
        posting_date: parse_date(&posting_date)?,
        paid_amount: parse_decimal(&paid)?,
        received_amount: parse_decimal(&received)?,
        bank_account: row.get("bank_account"),
        paid_to: row.get("paid_to"),
        sales_order: RecordName::new(sales_order.clone())
            .map_err(serialization("sales order", &sales_order))?,
        total_amount: parse_decimal(&total)?,
        allocated_amount: parse_decimal(&allocated)?,
        modified: parse_datetime(&modified)?,
    })
}

pub(crate) fn stock_level_from_row(row: &SqliteRow) -> Result<StockLevel, StoreError> {
    let code: String = row.get("item_code");
    let actual: String = row.get("actual_qty");
    let reserved: String = row.get("reserved_qty");
    Ok(StockLevel {
        item_code: ItemCode::new(code.clone()).map_err(serialization("item code", &code))?,
        warehouse: row.get("warehouse"),
        actual_qty: parse_decimal(&actual)?,
        reserved_qty: parse_decimal(&reserved)?,
    })
}

pub(crate) fn error_log_from_row(row: &SqliteRow) -> Result<ErrorLogEntry, StoreError> {
    let id: i64 = row.get("id");
    let timestamp: String = row.get("timestamp");
    let run_id: Option<String> = row.get("run_id");
    let scope: Option<String> = row.get("scope");
    let kind: String = row.get("kind");
    let record: Option<String> = row.get("record");
    let server: Option<String> = row.get("server");
    let message: String = row.get("message");
    let details: String = row.get("details");

    let mut entry = ErrorLogEntry::new(ErrorKind::from_key(&kind), message)
        .with_id(ErrorLogId::new(id))
        .with_timestamp(parse_datetime(&timestamp)?)
        .with_details(serde_json::from_str(&details)?);

    if let Some(run_id) = run_id {
        entry = entry.with_run_id(RunId::from_str(&run_id).map_err(serialization("run id", &run_id))?);
    }
    if let Some(scope) = scope {
        entry = entry.with_scope(SyncScope::from_str(&scope).map_err(serialization("scope", &scope))?);
    }
    if let Some(record) = record {
        entry = entry.with_record(record);
    }
    if let Some(server) = server {
        entry = entry.with_server(ServerId::new(server.clone()).map_err(serialization("server", &server))?);
    }
    Ok(entry)
}
