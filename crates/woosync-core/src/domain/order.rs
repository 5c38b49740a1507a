//! ERP Sales Orders

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::link::{LocalVersion, SyncLink};
use super::newtypes::{ItemCode, RecordName};

/// Document lifecycle of an ERP document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    /// Editable draft
    Draft,
    /// Submitted and immutable
    Submitted,
    /// Cancelled; never touched by synchronisation
    Cancelled,
}

impl DocStatus {
    /// Numeric docstatus as stored by the ERP
    pub fn as_i64(self) -> i64 {
        match self {
            DocStatus::Draft => 0,
            DocStatus::Submitted => 1,
            DocStatus::Cancelled => 2,
        }
    }

    /// Inverse of [`DocStatus::as_i64`]
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(DocStatus::Draft),
            1 => Some(DocStatus::Submitted),
            2 => Some(DocStatus::Cancelled),
            _ => None,
        }
    }
}

/// One line of a Sales Order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Ordered item
    pub item_code: ItemCode,
    /// Quantity
    pub qty: Decimal,
    /// Unit price before discount
    pub rate: Decimal,
    /// Line discount in percent
    pub discount_percentage: Decimal,
    /// Fulfilment warehouse
    pub warehouse: Option<String>,
    /// Expected delivery
    pub delivery_date: NaiveDate,
}

impl OrderLine {
    /// Line total after discount
    pub fn amount(&self) -> Decimal {
        let gross = self.qty * self.rate;
        gross - gross * self.discount_percentage / Decimal::ONE_HUNDRED
    }
}

/// An extra charge on the order (cash-on-delivery fee, shipping)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCharge {
    /// Charge description
    pub description: String,
    /// Amount
    pub amount: Decimal,
}

/// An ERP Sales Order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    /// Local identity
    pub name: RecordName,
    /// Customer name (local identity of the Customer)
    pub customer: String,
    /// Customer purchase order number; holds the remote order id
    pub po_no: Option<String>,
    /// Link to the remote order
    pub link: Option<SyncLink>,
    /// Remote status label as last seen or pushed
    pub woocommerce_status: Option<String>,
    /// Local workflow status (`To Deliver and Bill`, `Completed`, ...)
    pub status: String,
    /// Document lifecycle
    pub docstatus: DocStatus,
    /// Free-text note copied from the remote order
    pub customer_note: Option<String>,
    /// ISO currency code
    pub currency: String,
    /// Selling company
    pub company: Option<String>,
    /// Order date
    pub transaction_date: NaiveDate,
    /// Expected delivery date
    pub delivery_date: NaiveDate,
    /// Payment method label
    pub payment_method: Option<String>,
    /// Shipping Rule name
    pub shipping_rule: Option<String>,
    /// Order-level discount
    pub discount_amount: Decimal,
    /// Extra charges
    pub charges: Vec<OrderCharge>,
    /// Lines
    pub items: Vec<OrderLine>,
    /// Grand total; used as-is for orders without lines
    pub grand_total: Decimal,
    /// Billing Address name
    pub billing_address: Option<String>,
    /// Shipping Address name
    pub shipping_address: Option<String>,
    /// Payment Entry booked for the paid remote order
    #[serde(default)]
    pub payment_entry: Option<RecordName>,
    /// A payment entry was considered once; set even when none was booked
    #[serde(default)]
    pub payment_entry_attempted: bool,
    /// Maintained by the store on every write
    pub modified: DateTime<Utc>,
}

impl SalesOrder {
    /// Reconciliation view
    pub fn version(&self) -> LocalVersion {
        LocalVersion {
            modified: self.modified,
            link: self.link.clone(),
        }
    }

    /// Whether synchronisation may modify this order
    pub fn is_cancelled(&self) -> bool {
        self.docstatus == DocStatus::Cancelled
    }

    /// Whether a payment entry may still be booked for this order
    pub fn awaits_payment_entry(&self) -> bool {
        self.docstatus == DocStatus::Submitted
            && self.payment_entry.is_none()
            && !self.payment_entry_attempted
    }

    /// Sum of line amounts and charges minus the order discount
    pub fn computed_total(&self) -> Decimal {
        if self.items.is_empty() {
            return self.grand_total;
        }
        let lines: Decimal = self.items.iter().map(OrderLine::amount).sum();
        let charges: Decimal = self.charges.iter().map(|c| c.amount).sum();
        lines + charges - self.discount_amount
    }
}
