//! Introspection commands used while writing a server's mapping settings

use anyhow::Result;
use clap::Args;

use woosync_core::usecases::{get_item_docfields, get_order_status_list};

use super::CliContext;

/// `woosync docfields`: targets for `item_field_map`
#[derive(Debug, Args)]
pub struct DocfieldsCommand {}

impl DocfieldsCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let fields = get_item_docfields();

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::to_value(&fields)?);
            return Ok(());
        }

        formatter.success(&format!("Item fields ({})", fields.len()));
        let width = fields.iter().map(|f| f.label.len()).max().unwrap_or(0);
        for field in &fields {
            formatter.info(&format!("{:<width$}  {}", field.label, field.fieldname));
        }
        Ok(())
    }
}

/// `woosync order-statuses`: values for `so_status_map`
#[derive(Debug, Args)]
pub struct OrderStatusesCommand {}

impl OrderStatusesCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let statuses = get_order_status_list();

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!(statuses));
            return Ok(());
        }

        formatter.success("WooCommerce order statuses");
        for status in &statuses {
            formatter.info(status);
        }
        Ok(())
    }
}
