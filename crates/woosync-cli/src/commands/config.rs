//! Config command - View and validate the WooSync configuration
//!
//! `show` prints the effective configuration with credentials masked;
//! `validate` reports every problem the sync passes would refuse to run with.

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use woosync_core::config::Config;

use super::CliContext;
use crate::output;

const REDACTED: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration (credentials masked)
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx),
            ConfigCommand::Validate => execute_validate(ctx),
        }
    }
}

fn execute_show(ctx: &CliContext) -> Result<()> {
    let formatter = ctx.formatter();
    let config = redacted(ctx.load_config()?);

    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if ctx.format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_validate(ctx: &CliContext) -> Result<()> {
    let formatter = ctx.formatter();
    let path = ctx.config_path.display().to_string();

    if !ctx.config_path.exists() {
        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": false,
                "config_path": path,
                "errors": ["Configuration file not found"],
            }));
        } else {
            formatter.error(&format!("Configuration file not found at {}", path));
        }
        anyhow::bail!("No configuration to validate");
    }

    // Parse errors are reported like validation errors
    let config = match Config::load(&ctx.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": path,
                    "errors": [format!("{:#}", e)],
                }));
            } else {
                formatter.error(&format!("{:#}", e));
            }
            anyhow::bail!("Configuration could not be parsed");
        }
    };

    let errors = config.validate();

    if ctx.format.is_json() {
        let error_strings: Vec<String> = errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path,
            "servers": config.servers.len(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", path));
        formatter.info(&format!(
            "{} configured, {} enabled",
            output::count(config.servers.len() as u64, "server"),
            config.enabled_servers().count()
        ));
    } else {
        formatter.error(&format!(
            "Configuration has {}:",
            output::count(errors.len() as u64, "error")
        ));
        formatter.info(&format!("File: {}", path));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("Configuration is invalid");
    }
    Ok(())
}

/// Mask API credentials and webhook secrets
fn redacted(mut config: Config) -> Config {
    for server in &mut config.servers {
        server.api_consumer_key = mask_key(&server.api_consumer_key);
        if !server.api_consumer_secret.is_empty() {
            server.api_consumer_secret = REDACTED.to_string();
        }
        if server.secret.is_some() {
            server.secret = Some(REDACTED.to_string());
        }
    }
    config
}

/// Keep the `ck_` prefix and last four characters so keys stay recognisable
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return REDACTED.to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    match key.strip_prefix("ck_") {
        Some(_) => format!("ck_{}{}", REDACTED, tail),
        None => format!("{}{}", REDACTED, tail),
    }
}
