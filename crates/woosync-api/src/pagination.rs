//! Paged collection listing
//!
//! WooCommerce collections are paged with `page` / `per_page` and report
//! the page count in the `X-WP-TotalPages` header. Listing follows pages
//! until that count is reached or a short page comes back, whichever is
//! first. Servers behind caches sometimes drop the header, so the short
//! page check is the fallback.

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::client::WooClient;
use crate::ApiError;

/// Records requested per page (the API maximum)
pub const PAGE_SIZE: u32 = 100;

/// Safety stop for runaway pagination
const MAX_PAGES: u32 = 10_000;

/// One page of a collection
#[derive(Debug)]
pub struct Page {
    /// Records on this page
    pub records: Vec<Value>,
    /// Page count reported by the server, when present
    pub total_pages: Option<u32>,
}

/// Fetches one page of `path` with the given filters
pub async fn fetch_page(
    client: &WooClient,
    path: &str,
    filters: &[(&str, String)],
    page: u32,
) -> Result<Page, ApiError> {
    let mut query: Vec<(&str, String)> = filters.to_vec();
    query.push(("per_page", PAGE_SIZE.to_string()));
    query.push(("page", page.to_string()));

    let response = client
        .execute(path, || client.request(Method::GET, path).query(&query))
        .await?;

    let total_pages = response
        .headers()
        .get("X-WP-TotalPages")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok());

    let body: Value = response
        .json()
        .await
        .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))?;

    let records = match body {
        Value::Array(records) => records,
        other => {
            return Err(ApiError::InvalidResponse(format!(
                "{}: expected a JSON array, got {}",
                path,
                type_name(&other)
            )))
        }
    };

    Ok(Page {
        records,
        total_pages,
    })
}

/// Fetches every page of `path` with the given filters
pub async fn fetch_all(
    client: &WooClient,
    path: &str,
    filters: &[(&str, String)],
) -> Result<Vec<Value>, ApiError> {
    let mut records = Vec::new();
    let mut page_number: u32 = 1;

    loop {
        let page = fetch_page(client, path, filters, page_number).await?;
        let received = page.records.len();
        records.extend(page.records);

        debug!(
            path,
            page = page_number,
            received,
            total_pages = ?page.total_pages,
            "Received page"
        );

        let last_by_header = page.total_pages.is_some_and(|total| page_number >= total);
        if last_by_header || received < PAGE_SIZE as usize || page_number >= MAX_PAGES {
            break;
        }
        page_number += 1;
    }

    debug!(path, total = records.len(), pages = page_number, "Listing complete");
    Ok(records)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
