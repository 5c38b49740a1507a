//! WooCommerce order status vocabulary
//!
//! Status maps are configured with the human labels below; the REST API
//! expects the slugs.

/// Remote order status labels and their REST slugs, in display order
pub const REMOTE_ORDER_STATUSES: &[(&str, &str)] = &[
    ("Pending Payment", "pending"),
    ("On hold", "on-hold"),
    ("Failed", "failed"),
    ("Cancelled", "cancelled"),
    ("Processing", "processing"),
    ("Refunded", "refunded"),
    ("Shipped", "completed"),
    ("Ready for Pickup", "ready-pickup"),
    ("Picked up", "pickup"),
    ("Delivered", "delivered"),
    ("Processing LP", "processing-lp"),
    ("Draft", "checkout-draft"),
    ("Quote Sent", "gplsquote-req"),
    ("Trash", "trash"),
    ("Partially Shipped", "partial-shipped"),
];

/// All remote status labels
pub fn remote_status_labels() -> Vec<String> {
    REMOTE_ORDER_STATUSES
        .iter()
        .map(|(label, _)| (*label).to_string())
        .collect()
}

/// REST slug for a status label
pub fn slug_for_label(label: &str) -> Option<&'static str> {
    REMOTE_ORDER_STATUSES
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, slug)| *slug)
}

/// Status label for a REST slug
pub fn label_for_slug(slug: &str) -> Option<&'static str> {
    REMOTE_ORDER_STATUSES
        .iter()
        .find(|(_, s)| *s == slug)
        .map(|(label, _)| *label)
}
