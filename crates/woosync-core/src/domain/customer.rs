//! ERP Customers, Addresses and Contacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::CustomerIdentifier;

/// Placeholder written into mandatory address fields the order left blank
pub const NOT_PROVIDED: &str = "Not Provided";

/// Legal form of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerType {
    /// Billing company was given
    Company,
    /// Private person
    Individual,
}

impl std::fmt::Display for CustomerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CustomerType::Company => write!(f, "Company"),
            CustomerType::Individual => write!(f, "Individual"),
        }
    }
}

/// An ERP Customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Local identity
    pub name: String,
    /// Display name
    pub customer_name: String,
    /// Legal form
    pub customer_type: CustomerType,
    /// Derived key linking the customer to remote orders
    pub identifier: CustomerIdentifier,
    /// VAT / tax id
    pub tax_id: Option<String>,
    /// GST identification number from the order's `gst-tin` meta entry
    #[serde(default)]
    pub gst_id: Option<String>,
    /// Customer group
    pub customer_group: Option<String>,
    /// Maintained by the store on every write
    pub modified: DateTime<Utc>,
}

/// Which preferred-address slot an address fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressRole {
    /// Preferred billing address
    Billing,
    /// Preferred shipping address
    Shipping,
}

impl std::fmt::Display for AddressRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressRole::Billing => write!(f, "Billing"),
            AddressRole::Shipping => write!(f, "Shipping"),
        }
    }
}

/// An ERP Address linked to one customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Local identity
    pub name: String,
    /// Owning customer (by name)
    pub customer: String,
    /// Preferred billing address of the customer
    pub is_primary_address: bool,
    /// Preferred shipping address of the customer
    pub is_shipping_address: bool,
    /// Address title
    pub title: String,
    /// Address line 1
    pub line1: String,
    /// Address line 2
    pub line2: Option<String>,
    /// City
    pub city: String,
    /// State / county
    pub state: Option<String>,
    /// Postal code
    pub pincode: Option<String>,
    /// Country code or name
    pub country: Option<String>,
    /// Phone
    pub phone: Option<String>,
    /// Email
    pub email: Option<String>,
    /// Maintained by the store on every write
    pub modified: DateTime<Utc>,
}

impl Address {
    /// Whether the address fills a given slot
    pub fn has_role(&self, role: AddressRole) -> bool {
        match role {
            AddressRole::Billing => self.is_primary_address,
            AddressRole::Shipping => self.is_shipping_address,
        }
    }

    /// Set or clear a slot flag
    pub fn set_role(&mut self, role: AddressRole, value: bool) {
        match role {
            AddressRole::Billing => self.is_primary_address = value,
            AddressRole::Shipping => self.is_shipping_address = value,
        }
    }

    /// Whether the postal content equals another address (flags and identity ignored)
    pub fn same_content(&self, other: &Address) -> bool {
        self.title == other.title
            && self.line1 == other.line1
            && self.line2 == other.line2
            && self.city == other.city
            && self.state == other.state
            && self.pincode == other.pincode
            && self.country == other.country
            && self.phone == other.phone
            && self.email == other.email
    }
}

/// An ERP Contact created for new customers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Local identity
    pub name: String,
    /// Linked customer (by name)
    pub customer: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: Option<String>,
    /// Primary email
    pub email: Option<String>,
    /// Primary phone
    pub phone: Option<String>,
}
