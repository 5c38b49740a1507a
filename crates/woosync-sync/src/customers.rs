//! Customers, addresses and contacts derived from remote orders
//!
//! Customers are found by their derived identifier (billing email, email
//! plus company, or `Guest-{order id}`). Billing and shipping details are
//! kept in the customer's preferred billing and shipping addresses; when
//! both describe the same place a single address fills both slots.
//! A `gst-tin` meta entry on the order becomes the customer's GST id.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use woosync_core::config::AddressTitle;
use woosync_core::domain::{
    Address, AddressRole, Contact, Customer, CustomerType, RemoteRecord, NOT_PROVIDED,
};
use woosync_core::ports::ILocalStore;
use woosync_reconcile::{identity, AddressPlan};

use crate::target::SyncTarget;
use crate::SyncError;

/// Customer and preferred addresses an order is booked against
#[derive(Debug, Clone)]
pub struct ResolvedCustomer {
    pub customer: Customer,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    /// The customer did not exist before
    pub created: bool,
}

/// Resolves the customer side of remote orders
pub struct CustomerSynchronizer {
    store: Arc<dyn ILocalStore>,
}

impl CustomerSynchronizer {
    pub fn new(store: Arc<dyn ILocalStore>) -> Self {
        Self { store }
    }

    /// Find or create the order's customer and bring its addresses up to date
    ///
    /// # Errors
    /// `Mapping(MissingBillingEmail)` for a registered customer's order
    /// without billing email; store errors otherwise.
    pub async fn resolve(
        &self,
        target: &SyncTarget,
        order: &RemoteRecord,
    ) -> Result<ResolvedCustomer, SyncError> {
        let identifier = identity::customer_identifier(order, target.config.enable_dual_accounts)?;
        let billing = order.field("billing").cloned().unwrap_or(Value::Null);
        let shipping = order.field("shipping").cloned().unwrap_or(Value::Null);

        let company = text(&billing, "company");
        let customer_type = if company.is_some() {
            CustomerType::Company
        } else {
            CustomerType::Individual
        };
        let customer_name = company
            .clone()
            .or_else(|| full_name(&billing))
            .or_else(|| text(&billing, "email"))
            .unwrap_or_else(|| identifier.to_string());
        let tax_id = text(&billing, "vat_id");
        let gst_id = order.meta_str("gst-tin").map(str::to_string);

        let (customer, created) = match self.store.find_customer_by_identifier(&identifier).await? {
            Some(mut customer) => {
                let changed = customer.customer_name != customer_name
                    || customer.customer_type != customer_type
                    || (tax_id.is_some() && customer.tax_id != tax_id)
                    || (gst_id.is_some() && customer.gst_id != gst_id);
                if changed {
                    customer.customer_name = customer_name;
                    customer.customer_type = customer_type;
                    if tax_id.is_some() {
                        customer.tax_id = tax_id;
                    }
                    if gst_id.is_some() {
                        customer.gst_id = gst_id;
                    }
                    customer.modified = self.store.save_customer(&customer).await?;
                    debug!(customer = %customer.name, "Updated customer");
                }
                (customer, false)
            }
            None => {
                let mut customer = Customer {
                    name: self.unique_customer_name(&customer_name).await?,
                    customer_name,
                    customer_type,
                    identifier,
                    tax_id,
                    gst_id,
                    customer_group: target.config.customer_group.clone(),
                    modified: Utc::now(),
                };
                customer.modified = self.store.save_customer(&customer).await?;
                self.create_contact(&customer, &billing).await?;
                info!(customer = %customer.name, identifier = %customer.identifier, "Created customer");
                (customer, true)
            }
        };

        let (billing_address, shipping_address) = self
            .sync_addresses(target, &customer, &billing, &shipping)
            .await?;

        Ok(ResolvedCustomer {
            customer,
            billing_address: Some(billing_address),
            shipping_address: Some(shipping_address),
            created,
        })
    }

    async fn unique_customer_name(&self, wanted: &str) -> Result<String, SyncError> {
        let mut candidate = wanted.to_string();
        let mut n = 0;
        while self.store.get_customer(&candidate).await?.is_some() {
            n += 1;
            candidate = format!("{wanted} - {n}");
        }
        Ok(candidate)
    }

    /// A contact for a new customer, when there is an email or phone
    async fn create_contact(&self, customer: &Customer, billing: &Value) -> Result<(), SyncError> {
        let email = text(billing, "email");
        let phone = text(billing, "phone");
        if email.is_none() && phone.is_none() {
            return Ok(());
        }

        let first_name = text(billing, "first_name").unwrap_or_else(|| customer.customer_name.clone());
        let last_name = text(billing, "last_name");
        let display = match &last_name {
            Some(last) => format!("{first_name} {last}"),
            None => first_name.clone(),
        };

        let contact = Contact {
            name: format!("{display}-{}", customer.name),
            customer: customer.name.clone(),
            first_name,
            last_name,
            email,
            phone,
        };
        self.store.save_contact(&contact).await?;
        debug!(contact = %contact.name, "Created contact");
        Ok(())
    }

    // ========================================================================
    // Addresses
    // ========================================================================

    /// Bring the preferred addresses in line with the order
    ///
    /// Returns the names of the billing and shipping addresses (equal when
    /// one address fills both slots).
    async fn sync_addresses(
        &self,
        target: &SyncTarget,
        customer: &Customer,
        billing: &Value,
        shipping: &Value,
    ) -> Result<(String, String), SyncError> {
        let mut existing = self.store.get_addresses(&customer.name).await?;
        let title_style = target.config.address_title;

        let plan = if is_blank_address(shipping) {
            AddressPlan::Single
        } else {
            identity::address_plan(billing, shipping)
        };

        match plan {
            AddressPlan::Single => {
                let current = existing
                    .iter()
                    .position(|a| a.is_primary_address)
                    .or_else(|| existing.iter().position(|a| a.is_shipping_address));
                let desired = address_from(customer, billing, billing, AddressRole::Billing, title_style);
                let name = self
                    .upsert_address(&mut existing, current, desired, (true, true))
                    .await?;
                self.clear_other_flags(&mut existing, &name, &name).await?;
                Ok((name.clone(), name))
            }
            AddressPlan::Split => {
                let current_billing = existing.iter().position(|a| a.is_primary_address);
                let desired = address_from(customer, billing, billing, AddressRole::Billing, title_style);
                let billing_name = self
                    .upsert_address(&mut existing, current_billing, desired, (true, false))
                    .await?;

                let current_shipping = existing
                    .iter()
                    .position(|a| a.is_shipping_address && a.name != billing_name);
                let desired = address_from(customer, shipping, billing, AddressRole::Shipping, title_style);
                let shipping_name = self
                    .upsert_address(&mut existing, current_shipping, desired, (false, true))
                    .await?;

                self.clear_other_flags(&mut existing, &billing_name, &shipping_name)
                    .await?;
                Ok((billing_name, shipping_name))
            }
        }
    }

    /// Write `desired` over `existing[current]`, or add it as a new address
    ///
    /// Nothing is written when content and flags already match.
    async fn upsert_address(
        &self,
        existing: &mut Vec<Address>,
        current: Option<usize>,
        mut desired: Address,
        (primary, shipping): (bool, bool),
    ) -> Result<String, SyncError> {
        desired.is_primary_address = primary;
        desired.is_shipping_address = shipping;

        match current {
            Some(index) => {
                let slot = &mut existing[index];
                let unchanged = slot.same_content(&desired)
                    && slot.is_primary_address == primary
                    && slot.is_shipping_address == shipping;
                if !unchanged {
                    desired.name = slot.name.clone();
                    desired.modified = self.store.save_address(&desired).await?;
                    debug!(address = %desired.name, "Updated address");
                    *slot = desired;
                }
                Ok(slot.name.clone())
            }
            None => {
                desired.name = unique_address_name(existing, &desired.name);
                desired.modified = self.store.save_address(&desired).await?;
                debug!(address = %desired.name, "Created address");
                let name = desired.name.clone();
                existing.push(desired);
                Ok(name)
            }
        }
    }

    /// A customer has at most one preferred address per slot
    async fn clear_other_flags(
        &self,
        existing: &mut [Address],
        billing: &str,
        shipping: &str,
    ) -> Result<(), SyncError> {
        for address in existing.iter_mut() {
            let stale_billing = address.is_primary_address && address.name != billing;
            let stale_shipping = address.is_shipping_address && address.name != shipping;
            if !(stale_billing || stale_shipping) {
                continue;
            }
            if stale_billing {
                address.set_role(AddressRole::Billing, false);
            }
            if stale_shipping {
                address.set_role(AddressRole::Shipping, false);
            }
            address.modified = self.store.save_address(address).await?;
            debug!(address = %address.name, "Cleared preferred-address flags");
        }
        Ok(())
    }
}

/// Trimmed, non-empty string member
fn text(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn full_name(payload: &Value) -> Option<String> {
    let first = text(payload, "first_name").unwrap_or_default();
    let last = text(payload, "last_name").unwrap_or_default();
    let name = format!("{first} {last}").trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// No postal data at all (orders of virtual products)
fn is_blank_address(payload: &Value) -> bool {
    ["address_1", "city", "postcode", "country"]
        .iter()
        .all(|key| text(payload, key).is_none())
}

/// Address content from a billing or shipping payload
///
/// `fallback` supplies email and phone when `payload` has none (shipping
/// payloads usually carry neither).
fn address_from(
    customer: &Customer,
    payload: &Value,
    fallback: &Value,
    role: AddressRole,
    title_style: AddressTitle,
) -> Address {
    let title = match title_style {
        AddressTitle::CustomerName => customer.customer_name.clone(),
        AddressTitle::CustomerNameAndType => format!("{}-{}", customer.name, role),
    };

    Address {
        name: format!("{}-{}", customer.name, role),
        customer: customer.name.clone(),
        is_primary_address: false,
        is_shipping_address: false,
        title,
        line1: text(payload, "address_1").unwrap_or_else(|| NOT_PROVIDED.to_string()),
        line2: text(payload, "address_2"),
        city: text(payload, "city").unwrap_or_else(|| NOT_PROVIDED.to_string()),
        state: text(payload, "state"),
        pincode: text(payload, "postcode"),
        country: text(payload, "country"),
        phone: text(payload, "phone").or_else(|| text(fallback, "phone")),
        email: text(payload, "email").or_else(|| text(fallback, "email")),
        modified: Utc::now(),
    }
}

fn unique_address_name(existing: &[Address], wanted: &str) -> String {
    let mut candidate = wanted.to_string();
    let mut n = 0;
    while existing.iter().any(|a| a.name == candidate) {
        n += 1;
        candidate = format!("{wanted}-{n}");
    }
    candidate
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use woosync_core::domain::CustomerIdentifier;

    use super::*;

    fn customer() -> Customer {
        Customer {
            name: "Jane Doe".into(),
            customer_name: "Jane Doe".into(),
            customer_type: CustomerType::Individual,
            identifier: CustomerIdentifier::new("jane@example.com".into()).unwrap(),
            tax_id: None,
            gst_id: None,
            customer_group: None,
            modified: Utc::now(),
        }
    }

    #[test]
    fn missing_mandatory_fields_are_filled() {
        let address = address_from(
            &customer(),
            &json!({"address_1": "", "postcode": "1000"}),
            &json!({"email": "jane@example.com"}),
            AddressRole::Shipping,
            AddressTitle::CustomerName,
        );
        assert_eq!(address.line1, NOT_PROVIDED);
        assert_eq!(address.city, NOT_PROVIDED);
        assert_eq!(address.pincode.as_deref(), Some("1000"));
        assert_eq!(address.email.as_deref(), Some("jane@example.com"));
        assert_eq!(address.name, "Jane Doe-Shipping");
    }

    #[test]
    fn title_follows_configured_style() {
        let by_type = address_from(
            &customer(),
            &json!({}),
            &json!({}),
            AddressRole::Billing,
            AddressTitle::CustomerNameAndType,
        );
        assert_eq!(by_type.title, "Jane Doe-Billing");

        let by_name = address_from(
            &customer(),
            &json!({}),
            &json!({}),
            AddressRole::Billing,
            AddressTitle::CustomerName,
        );
        assert_eq!(by_name.title, "Jane Doe");
    }

    #[test]
    fn names_and_blank_payloads() {
        assert_eq!(
            full_name(&json!({"first_name": " Jane ", "last_name": ""})),
            Some("Jane".to_string())
        );
        assert_eq!(full_name(&json!({})), None);
        assert!(is_blank_address(&json!({"first_name": "Jane"})));
        assert!(!is_blank_address(&json!({"city": "Lyon"})));
    }

    #[test]
    fn address_names_are_made_unique() {
        let mut taken = address_from(
            &customer(),
            &json!({}),
            &json!({}),
            AddressRole::Billing,
            AddressTitle::CustomerName,
        );
        let existing = vec![taken.clone()];
        assert_eq!(unique_address_name(&existing, "Jane Doe-Billing"), "Jane Doe-Billing-1");

        taken.name = "Other".into();
        assert_eq!(unique_address_name(&[taken], "Jane Doe-Billing"), "Jane Doe-Billing");
    }
}
