//! ERP Item records
//!
//! Items are the local side of WooCommerce products. A `simple` product maps
//! to a normal item, a `variable` product to a template item and each of its
//! variations to a variant item pointing at the template.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::link::{LocalVersion, SyncLinks};
use super::newtypes::{ItemCode, ServerId};

/// Item code used for order lines whose remote product was deleted
pub const DELETED_PRODUCT_ITEM_CODE: &str = "DELETED_WOOCOMMERCE_PRODUCT";

/// Shape of an item in the variant hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    /// Stand-alone item
    Normal,
    /// Template item with variants
    Template,
    /// Variant of a template item
    Variant {
        /// Code of the template item
        variant_of: ItemCode,
    },
}

impl ItemKind {
    /// Whether the item has variants
    pub fn has_variants(&self) -> bool {
        matches!(self, ItemKind::Template)
    }

    /// The template of a variant
    pub fn variant_of(&self) -> Option<&ItemCode> {
        match self {
            ItemKind::Variant { variant_of } => Some(variant_of),
            _ => None,
        }
    }
}

/// One attribute value on an item (`Colour = Red`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttributeValue {
    /// Attribute name
    pub attribute: String,
    /// Selected value; templates leave it empty
    pub value: Option<String>,
}

/// An Item Attribute master record with its allowed values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttribute {
    /// Attribute name
    pub name: String,
    /// Allowed values
    pub values: Vec<String>,
}

impl ItemAttribute {
    /// An attribute with no values yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Add a value if it is missing; returns true when it was added
    pub fn ensure_value(&mut self, value: &str) -> bool {
        if self.values.iter().any(|v| v == value) {
            return false;
        }
        self.values.push(value.to_string());
        true
    }
}

/// An ERP Item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Local identity
    pub item_code: ItemCode,
    /// Display name
    pub item_name: String,
    /// Position in the variant hierarchy
    pub kind: ItemKind,
    /// Long description
    pub description: Option<String>,
    /// Image URL
    pub image: Option<String>,
    /// Item group
    pub item_group: String,
    /// Stock unit of measure
    pub stock_uom: String,
    /// Whether the item is disabled
    pub disabled: bool,
    /// Whether stock is tracked
    pub is_stock_item: bool,
    /// Attribute values
    pub attributes: Vec<ItemAttributeValue>,
    /// Fields outside the standard set, written by field mappings
    pub custom_fields: BTreeMap<String, Value>,
    /// One link per WooCommerce server
    pub links: SyncLinks,
    /// Maintained by the store on every write
    pub modified: DateTime<Utc>,
}

impl Item {
    /// A new enabled normal item
    pub fn new(
        item_code: ItemCode,
        item_name: impl Into<String>,
        item_group: impl Into<String>,
        stock_uom: impl Into<String>,
    ) -> Self {
        Self {
            item_code,
            item_name: item_name.into(),
            kind: ItemKind::Normal,
            description: None,
            image: None,
            item_group: item_group.into(),
            stock_uom: stock_uom.into(),
            disabled: false,
            is_stock_item: true,
            attributes: Vec::new(),
            custom_fields: BTreeMap::new(),
            links: SyncLinks::new(),
            modified: Utc::now(),
        }
    }

    /// Reconciliation view for one server
    pub fn version_for(&self, server: &ServerId) -> LocalVersion {
        LocalVersion {
            modified: self.modified,
            link: self.links.for_server(server).cloned(),
        }
    }

    /// Value of the attribute with the given name
    pub fn attribute_value(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.attribute == attribute)
            .and_then(|a| a.value.as_deref())
    }

    /// Read a mappable field as JSON
    pub fn get_field(&self, field: &str) -> Option<Value> {
        match field {
            "item_code" => Some(Value::String(self.item_code.to_string())),
            "item_name" => Some(Value::String(self.item_name.clone())),
            "description" => self.description.clone().map(Value::String),
            "image" => self.image.clone().map(Value::String),
            "item_group" => Some(Value::String(self.item_group.clone())),
            "stock_uom" => Some(Value::String(self.stock_uom.clone())),
            "disabled" => Some(Value::Bool(self.disabled)),
            other => self.custom_fields.get(other).cloned(),
        }
    }

    /// Write a mappable field from a scalar JSON value
    ///
    /// Text fields take the scalar's text form; `disabled` takes a boolean or
    /// `0`/`1`. Unknown names land in `custom_fields`. The item code is not
    /// mappable once the item exists.
    pub fn set_field(&mut self, field: &str, value: Value) -> Result<(), DomainError> {
        match field {
            "item_code" => Err(DomainError::InvalidMapping(
                "item_code cannot be overwritten by a field mapping".to_string(),
            )),
            "item_name" => {
                self.item_name = required_text(field, &value)?;
                Ok(())
            }
            "item_group" => {
                self.item_group = required_text(field, &value)?;
                Ok(())
            }
            "stock_uom" => {
                self.stock_uom = required_text(field, &value)?;
                Ok(())
            }
            "description" => {
                self.description = scalar_text(&value);
                Ok(())
            }
            "image" => {
                self.image = scalar_text(&value);
                Ok(())
            }
            "disabled" => {
                self.disabled = match &value {
                    Value::Bool(b) => *b,
                    Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
                    _ => {
                        return Err(DomainError::ValidationFailed(format!(
                            "disabled expects a boolean, got {value}"
                        )))
                    }
                };
                Ok(())
            }
            other => {
                self.custom_fields.insert(other.to_string(), value);
                Ok(())
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_text(field: &str, value: &Value) -> Result<String, DomainError> {
    scalar_text(value)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| DomainError::ValidationFailed(format!("{field} cannot be empty")))
}

/// Stock of an item in one warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    /// Item
    pub item_code: ItemCode,
    /// Warehouse name
    pub warehouse: String,
    /// Quantity on hand
    pub actual_qty: Decimal,
    /// Quantity reserved by open orders
    pub reserved_qty: Decimal,
}

impl StockLevel {
    /// Quantity that can be offered for sale
    pub fn available(&self, subtract_reserved: bool) -> Decimal {
        if subtract_reserved {
            self.actual_qty - self.reserved_qty
        } else {
            self.actual_qty
        }
    }
}

/// A field of the Item doctype, as exposed to mapping configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemDocField {
    /// Field name
    pub fieldname: &'static str,
    /// Human label
    pub label: &'static str,
    /// Field type; layout types carry no data
    pub fieldtype: &'static str,
}

impl ItemDocField {
    /// Whether the field only structures the form
    pub fn is_layout(&self) -> bool {
        matches!(self.fieldtype, "Section Break" | "Column Break" | "Tab Break")
    }
}

/// Fields of the Item doctype in form order
pub const ITEM_DOCFIELDS: &[ItemDocField] = &[
    ItemDocField { fieldname: "details", label: "Details", fieldtype: "Tab Break" },
    ItemDocField { fieldname: "item_code", label: "Item Code", fieldtype: "Data" },
    ItemDocField { fieldname: "item_name", label: "Item Name", fieldtype: "Data" },
    ItemDocField { fieldname: "item_group", label: "Item Group", fieldtype: "Link" },
    ItemDocField { fieldname: "stock_uom", label: "Default Unit of Measure", fieldtype: "Link" },
    ItemDocField { fieldname: "column_break0", label: "", fieldtype: "Column Break" },
    ItemDocField { fieldname: "disabled", label: "Disabled", fieldtype: "Check" },
    ItemDocField { fieldname: "is_stock_item", label: "Maintain Stock", fieldtype: "Check" },
    ItemDocField { fieldname: "section_break_11", label: "Description", fieldtype: "Section Break" },
    ItemDocField { fieldname: "description", label: "Description", fieldtype: "Text Editor" },
    ItemDocField { fieldname: "image", label: "Image", fieldtype: "Attach Image" },
    ItemDocField { fieldname: "brand", label: "Brand", fieldtype: "Link" },
    ItemDocField { fieldname: "variants_section", label: "Variants", fieldtype: "Section Break" },
    ItemDocField { fieldname: "has_variants", label: "Has Variants", fieldtype: "Check" },
    ItemDocField { fieldname: "variant_of", label: "Variant Of", fieldtype: "Link" },
    ItemDocField { fieldname: "weight_per_unit", label: "Weight Per Unit", fieldtype: "Float" },
    ItemDocField { fieldname: "weight_uom", label: "Weight UOM", fieldtype: "Link" },
    ItemDocField { fieldname: "country_of_origin", label: "Country of Origin", fieldtype: "Link" },
    ItemDocField { fieldname: "customs_tariff_number", label: "Customs Tariff Number", fieldtype: "Link" },
    ItemDocField { fieldname: "standard_rate", label: "Standard Selling Rate", fieldtype: "Currency" },
];
