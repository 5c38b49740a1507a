//! ERP Payment Entries booked for paid remote orders

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::newtypes::RecordName;

/// A received payment, allocated in full against one sales order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEntry {
    /// Local identity
    pub name: RecordName,
    /// Receiving company
    pub company: Option<String>,
    /// Paying customer (by name)
    pub party: String,
    /// Gateway transaction id, or the payment method title
    pub reference_no: String,
    /// Date of the reference
    pub reference_date: NaiveDate,
    /// Posting date
    pub posting_date: NaiveDate,
    /// Amount paid by the customer
    pub paid_amount: Decimal,
    /// Amount received into the bank account
    pub received_amount: Decimal,
    /// Company bank account
    pub bank_account: String,
    /// Ledger account credited with the payment
    pub paid_to: String,
    /// Sales order the payment is allocated against
    pub sales_order: RecordName,
    /// Order total at allocation
    pub total_amount: Decimal,
    /// Allocated amount
    pub allocated_amount: Decimal,
    /// Maintained by the store on every write
    pub modified: DateTime<Utc>,
}

impl PaymentEntry {
    /// Payment type of every synchronised entry
    pub const PAYMENT_TYPE: &'static str = "Receive";

    /// Amount left unallocated
    pub fn unallocated_amount(&self) -> Decimal {
        self.paid_amount - self.allocated_amount
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn overpayment_stays_unallocated() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let entry = PaymentEntry {
            name: RecordName::new("PE-1".to_string()).unwrap(),
            company: None,
            party: "ann@example.com".to_string(),
            reference_no: "ch_1".to_string(),
            reference_date: date,
            posting_date: date,
            paid_amount: dec!(25),
            received_amount: dec!(25),
            bank_account: "Main - Bank".to_string(),
            paid_to: "Bank - AC".to_string(),
            sales_order: RecordName::new("SO-1".to_string()).unwrap(),
            total_amount: dec!(20),
            allocated_amount: dec!(20),
            modified: Utc::now(),
        };
        assert_eq!(entry.unallocated_amount(), dec!(5));
    }
}
