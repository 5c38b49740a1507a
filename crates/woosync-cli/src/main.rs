//! WooSync CLI - Command-line interface for WooSync
//!
//! Provides commands for:
//! - Running item, sales order and stock passes by hand
//! - Syncing a single item or order
//! - Pushing a sales order status to WooCommerce
//! - Listing mappable fields and remote order statuses
//! - Inspecting configuration, checkpoints and the error log

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    checkpoint::CheckpointCommand,
    completions::CompletionsCommand,
    config::ConfigCommand,
    errors::ErrorsCommand,
    inspect::{DocfieldsCommand, OrderStatusesCommand},
    record::{PushStatusCommand, SyncItemCommand, SyncOrderCommand, SyncRemoteOrderCommand},
    sync::SyncCommand,
    CliContext,
};
use output::OutputFormat;
use woosync_core::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "woosync",
    version,
    about = "Synchronise WooCommerce shops with ERPNext"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a synchronisation pass
    Sync(SyncCommand),
    /// Sync one ERP item with every server it is linked to
    SyncItem(SyncItemCommand),
    /// Sync one ERP sales order with its WooCommerce order
    SyncOrder(SyncOrderCommand),
    /// Fetch one WooCommerce order and sync it into the ERP
    SyncRemoteOrder(SyncRemoteOrderCommand),
    /// Push the status of a sales order to WooCommerce
    PushStatus(PushStatusCommand),
    /// List the item fields a field mapping may target
    Docfields(DocfieldsCommand),
    /// List the WooCommerce order statuses
    OrderStatuses(OrderStatusesCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// View the error log
    Errors(ErrorsCommand),
    /// View and move pass checkpoints
    #[command(subcommand)]
    Checkpoint(CheckpointCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    init_tracing(cli.verbose, &Config::load_or_default(&config_path));

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CliContext::new(format, config_path);

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::SyncItem(cmd) => cmd.execute(&ctx).await,
        Commands::SyncOrder(cmd) => cmd.execute(&ctx).await,
        Commands::SyncRemoteOrder(cmd) => cmd.execute(&ctx).await,
        Commands::PushStatus(cmd) => cmd.execute(&ctx).await,
        Commands::Docfields(cmd) => cmd.execute(&ctx).await,
        Commands::OrderStatuses(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Errors(cmd) => cmd.execute(&ctx).await,
        Commands::Checkpoint(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}

/// `RUST_LOG` wins, then `-v`/`-vv`, then `logging.level`
fn init_tracing(verbose: u8, config: &Config) {
    let level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so `--json` output stays parseable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
