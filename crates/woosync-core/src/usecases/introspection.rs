//! Introspection for mapping configuration
//!
//! Lists the local Item fields a field-mapping rule may target and the
//! remote order statuses a status map may use.

use serde::Serialize;

use crate::domain::{item::ITEM_DOCFIELDS, order_status};

/// A mappable Item field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocField {
    pub fieldname: String,
    pub label: String,
}

/// Data-carrying Item fields, sorted by label
pub fn get_item_docfields() -> Vec<DocField> {
    let mut fields: Vec<DocField> = ITEM_DOCFIELDS
        .iter()
        .filter(|f| !f.is_layout())
        .map(|f| DocField {
            fieldname: f.fieldname.to_string(),
            label: f.label.to_string(),
        })
        .collect();
    fields.sort_by(|a, b| a.label.cmp(&b.label).then(a.fieldname.cmp(&b.fieldname)));
    fields
}

/// Remote order status labels in display order
pub fn get_order_status_list() -> Vec<String> {
    order_status::remote_status_labels()
}
