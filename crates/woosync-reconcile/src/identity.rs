//! Identity resolution
//!
//! Derives the keys that tie local records to remote ones when there is no
//! stored link yet: item codes, customer identifiers, preferred-address
//! slots, shipping rules and the products referenced by order lines.

use serde_json::Value;
use tracing::debug;
use woosync_core::config::{NamingBasis, ServerConfig};
use woosync_core::domain::{remote::value_as_u64, CustomerIdentifier, ItemCode, RemoteId, RemoteRecord};

use crate::error::ReconcileError;

/// Members compared to decide whether billing and shipping are the same place
pub const ADDRESS_COMPARE_KEYS: &[&str] = &[
    "first_name",
    "last_name",
    "company",
    "address_1",
    "address_2",
    "city",
    "state",
    "postcode",
    "country",
];

/// Local item code for a remote product or variation
///
/// # Errors
/// `MissingIdentity` when naming by SKU and the product has none.
pub fn item_code_for(remote: &RemoteRecord, basis: NamingBasis) -> Result<ItemCode, ReconcileError> {
    let raw = match basis {
        NamingBasis::WoocommerceId => remote.id().to_string(),
        NamingBasis::ProductSku => remote
            .str_field("sku")
            .ok_or_else(|| {
                ReconcileError::MissingIdentity(format!(
                    "{} {} has no SKU",
                    remote.entity(),
                    remote.id()
                ))
            })?
            .to_string(),
    };
    Ok(ItemCode::new(raw)?)
}

/// Whether an order was placed without a customer account
pub fn is_guest(order: &RemoteRecord) -> bool {
    order.u64_field("customer_id").unwrap_or(0) == 0
}

fn billing_str<'a>(order: &'a RemoteRecord, key: &str) -> Option<&'a str> {
    order
        .field("billing")
        .and_then(|b| b.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Derived customer key of an order
///
/// - guest orders: `Guest-{order id}`
/// - billing company with dual accounts enabled: `{email}-{company}`
/// - otherwise: the billing email
///
/// # Errors
/// `MissingBillingEmail` for a registered customer without billing email.
pub fn customer_identifier(
    order: &RemoteRecord,
    dual_accounts: bool,
) -> Result<CustomerIdentifier, ReconcileError> {
    if is_guest(order) {
        return Ok(CustomerIdentifier::new(format!("Guest-{}", order.id()))?);
    }

    let email = billing_str(order, "email").ok_or_else(|| ReconcileError::MissingBillingEmail {
        order: order.id().clone(),
    })?;

    let identifier = match billing_str(order, "company") {
        Some(company) if dual_accounts => format!("{email}-{company}"),
        _ => email.to_string(),
    };
    Ok(CustomerIdentifier::new(identifier)?)
}

/// How many addresses an order's billing/shipping payloads need
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPlan {
    /// One address flagged as both preferred billing and preferred shipping
    Single,
    /// Separate billing and shipping addresses
    Split,
}

fn normalized<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("")
}

/// Compare billing and shipping payloads on [`ADDRESS_COMPARE_KEYS`]
///
/// Missing, `null` and empty members compare equal.
pub fn address_plan(billing: &Value, shipping: &Value) -> AddressPlan {
    let same = ADDRESS_COMPARE_KEYS
        .iter()
        .all(|key| normalized(billing, key) == normalized(shipping, key));
    if same {
        AddressPlan::Single
    } else {
        AddressPlan::Split
    }
}

/// Result of looking up an order's shipping method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShippingRuleMatch {
    /// Mapped to a local Shipping Rule
    Matched(String),
    /// The method has no entry in the shipping rule map
    Unmapped { method_title: String },
    /// The order has no shipping line
    NoShippingLine,
}

/// Local Shipping Rule for the first shipping line of an order
pub fn shipping_rule_for(order: &RemoteRecord, server: &ServerConfig) -> ShippingRuleMatch {
    let Some(method_title) = order
        .field("shipping_lines")
        .and_then(Value::as_array)
        .and_then(|lines| lines.first())
        .and_then(|line| line.get("method_title"))
        .and_then(Value::as_str)
    else {
        return ShippingRuleMatch::NoShippingLine;
    };

    match server.shipping_rule_for(method_title) {
        Some(rule) => ShippingRuleMatch::Matched(rule.to_string()),
        None => {
            debug!(method = %method_title, "No shipping rule mapped");
            ShippingRuleMatch::Unmapped {
                method_title: method_title.to_string(),
            }
        }
    }
}

/// Product referenced by an order line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineProduct {
    /// The product was deleted remotely (id 0)
    Deleted,
    /// A simple or variable product
    Product(RemoteId),
    /// A variation of `parent`
    Variation { parent: RemoteId, id: RemoteId },
}

/// Classify an order line by its `product_id` / `variation_id`
pub fn line_product(line: &Value) -> LineProduct {
    let product = line.get("product_id").and_then(value_as_u64).unwrap_or(0);
    let variation = line.get("variation_id").and_then(value_as_u64).unwrap_or(0);

    match (RemoteId::from_u64(product), RemoteId::from_u64(variation)) {
        (Ok(parent), Ok(id)) => LineProduct::Variation { parent, id },
        (Ok(product), Err(_)) => LineProduct::Product(product),
        _ => LineProduct::Deleted,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use woosync_core::domain::RemoteEntity;

    use super::*;

    fn order(body: Value) -> RemoteRecord {
        let mut body = body;
        body["date_modified_gmt"] = json!("2024-01-01T00:00:00");
        RemoteRecord::from_json(RemoteEntity::Order, body).unwrap()
    }

    #[test]
    fn guest_orders_use_order_id() {
        let o = order(json!({"id": 1234, "customer_id": 0, "billing": {"email": "a@b.com"}}));
        assert!(is_guest(&o));
        assert_eq!(customer_identifier(&o, true).unwrap().as_str(), "Guest-1234");

        let missing = order(json!({"id": 77, "billing": {}}));
        assert_eq!(customer_identifier(&missing, false).unwrap().as_str(), "Guest-77");
    }

    #[test]
    fn registered_customer_uses_email() {
        let o = order(json!({"id": 1, "customer_id": 9, "billing": {"email": "a@b.com", "company": ""}}));
        assert_eq!(customer_identifier(&o, true).unwrap().as_str(), "a@b.com");
    }

    #[test]
    fn dual_accounts_append_company() {
        let o = order(json!({"id": 1, "customer_id": 9, "billing": {"email": "a@b.com", "company": "Acme"}}));
        assert_eq!(customer_identifier(&o, true).unwrap().as_str(), "a@b.com-Acme");
        assert_eq!(customer_identifier(&o, false).unwrap().as_str(), "a@b.com");
    }

    #[test]
    fn registered_customer_without_email_is_rejected() {
        let o = order(json!({"id": 5, "customer_id": 9, "billing": {"email": ""}}));
        assert!(matches!(
            customer_identifier(&o, false),
            Err(ReconcileError::MissingBillingEmail { .. })
        ));
    }

    #[test]
    fn item_code_follows_naming_basis() {
        let product = RemoteRecord::from_json(
            RemoteEntity::Product,
            json!({"id": 42, "sku": "MUG-1", "date_modified_gmt": "2024-01-01T00:00:00"}),
        )
        .unwrap();
        assert_eq!(
            item_code_for(&product, NamingBasis::WoocommerceId).unwrap().as_str(),
            "42"
        );
        assert_eq!(
            item_code_for(&product, NamingBasis::ProductSku).unwrap().as_str(),
            "MUG-1"
        );

        let no_sku = RemoteRecord::from_json(
            RemoteEntity::Product,
            json!({"id": 43, "sku": "", "date_modified_gmt": "2024-01-01T00:00:00"}),
        )
        .unwrap();
        assert!(item_code_for(&no_sku, NamingBasis::ProductSku).is_err());
    }

    #[test]
    fn identical_payloads_collapse_to_one_address() {
        let billing = json!({"first_name": "Ann", "city": "X", "email": "a@b.com", "phone": "1"});
        let shipping = json!({"first_name": "Ann", "city": "X", "company": null});
        assert_eq!(address_plan(&billing, &shipping), AddressPlan::Single);

        let elsewhere = json!({"first_name": "Ann", "city": "Y"});
        assert_eq!(address_plan(&billing, &elsewhere), AddressPlan::Split);
    }

    #[test]
    fn shipping_rule_lookup() {
        let mut server = ServerConfig::default();
        server.shipping_rule_map.push(woosync_core::config::ShippingRuleMapping {
            wc_shipping_method: "Flat rate".into(),
            shipping_rule: "Standard".into(),
        });

        let flat = order(json!({"id": 1, "shipping_lines": [{"method_title": "Flat rate"}]}));
        assert_eq!(
            shipping_rule_for(&flat, &server),
            ShippingRuleMatch::Matched("Standard".into())
        );

        let express = order(json!({"id": 2, "shipping_lines": [{"method_title": "Express"}]}));
        assert_eq!(
            shipping_rule_for(&express, &server),
            ShippingRuleMatch::Unmapped {
                method_title: "Express".into()
            }
        );

        let none = order(json!({"id": 3, "shipping_lines": []}));
        assert_eq!(shipping_rule_for(&none, &server), ShippingRuleMatch::NoShippingLine);
    }

    #[test]
    fn line_products() {
        assert_eq!(
            line_product(&json!({"product_id": 0, "variation_id": 0})),
            LineProduct::Deleted
        );
        assert_eq!(
            line_product(&json!({"product_id": 5, "variation_id": 0})),
            LineProduct::Product(RemoteId::from_u64(5).unwrap())
        );
        assert_eq!(
            line_product(&json!({"product_id": 5, "variation_id": 8})),
            LineProduct::Variation {
                parent: RemoteId::from_u64(5).unwrap(),
                id: RemoteId::from_u64(8).unwrap()
            }
        );
    }
}
