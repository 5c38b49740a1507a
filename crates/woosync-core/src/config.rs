//! Configuration module for WooSync.
//!
//! One YAML file describes every WooCommerce server (credentials, mapping
//! tables, feature switches) plus the integration, store, daemon, logging
//! and retry settings. [`Config::validate`] reports every problem at once so
//! a bad mapping table is caught before any pass touches a record.

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::mapping::FieldMappingRule;
use crate::domain::newtypes::ServerId;
use crate::domain::order_status;
use crate::domain::path_query::PathQuery;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for WooSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub servers: Vec<ServerConfig>,
    pub integration: IntegrationConfig,
    pub store: StoreConfig,
    pub daemon: DaemonConfig,
    pub logging: LoggingConfig,
    pub retry: RetryConfig,
}

/// How remote products are turned into local item codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingBasis {
    /// Item code = remote product id
    #[default]
    WoocommerceId,
    /// Item code = remote SKU
    ProductSku,
}

/// Convention for titles of created addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressTitle {
    /// `Jane Doe`
    #[default]
    CustomerName,
    /// `Jane Doe-Billing`
    CustomerNameAndType,
}

/// One row of the shipping-method to shipping-rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRuleMapping {
    /// Remote shipping method title
    pub wc_shipping_method: String,
    /// Local Shipping Rule name
    pub shipping_rule: String,
}

/// One row of the local-status to remote-status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMapping {
    /// Local Sales Order status
    pub erpnext_sales_order_status: String,
    /// Remote status label (see [`order_status::REMOTE_ORDER_STATUSES`])
    pub woocommerce_sales_order_status: String,
}

/// A WooCommerce site and how it is synchronised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Site URL, e.g. `https://shop.example.com`
    pub url: String,
    pub api_consumer_key: String,
    pub api_consumer_secret: String,
    /// Webhook shared secret; webhooks are refused without one
    pub secret: Option<String>,
    pub enable_sync: bool,
    pub name_by: NamingBasis,
    /// Warehouses whose stock is pushed to this site
    pub warehouses: Vec<String>,
    pub item_field_map: Vec<FieldMappingRule>,
    pub shipping_rule_map: Vec<ShippingRuleMapping>,
    pub so_status_map: Vec<StatusMapping>,
    pub enable_so_status_sync: bool,
    pub enable_dual_accounts: bool,
    pub enable_image_sync: bool,
    pub enable_shipping_methods_sync: bool,
    pub enable_stock_level_sync: bool,
    pub subtract_reserved_stock: bool,
    /// Create remote products for items added to orders locally
    pub sync_so_items_to_wc: bool,
    pub submit_sales_orders: bool,
    pub delivery_after_days: u32,
    pub company: Option<String>,
    /// Overrides the order currency
    pub currency: Option<String>,
    pub customer_group: Option<String>,
    pub item_group: String,
    pub stock_uom: String,
    /// Warehouse set on order lines
    pub warehouse: Option<String>,
    pub address_title: AddressTitle,
    /// Fee lines whose name contains this label become a charge
    pub cod_fee_label: String,
    /// Book a payment entry for paid orders
    pub enable_payments_sync: bool,
    /// Treat every order with a payment method as paid
    pub ignore_date_paid: bool,
    /// Remote payment method id to company bank account; an empty account
    /// books no entry
    pub payment_method_bank_account_mapping: BTreeMap<String, String>,
    /// Remote payment method id to the ledger account paid into
    pub payment_method_gl_account_mapping: BTreeMap<String, String>,
}

impl ServerConfig {
    /// A disabled server with defaults for everything but the connection.
    pub fn new(
        url: impl Into<String>,
        api_consumer_key: impl Into<String>,
        api_consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_consumer_key: api_consumer_key.into(),
            api_consumer_secret: api_consumer_secret.into(),
            ..Self::default()
        }
    }

    /// Identifier derived from the URL authority.
    pub fn server_id(&self) -> Result<ServerId, crate::domain::DomainError> {
        ServerId::from_url(&self.url)
    }

    /// Remote status label configured for a local status.
    pub fn remote_status_for(&self, local_status: &str) -> Option<&str> {
        self.so_status_map
            .iter()
            .find(|m| m.erpnext_sales_order_status == local_status)
            .map(|m| m.woocommerce_sales_order_status.as_str())
    }

    /// Local Shipping Rule configured for a remote method title.
    pub fn shipping_rule_for(&self, method_title: &str) -> Option<&str> {
        self.shipping_rule_map
            .iter()
            .find(|m| m.wc_shipping_method == method_title)
            .map(|m| m.shipping_rule.as_str())
    }

    /// Bank account configured for a payment method.
    ///
    /// `None` when the method is not mapped at all, `Some("")` when it is
    /// mapped to no account.
    pub fn bank_account_for(&self, payment_method: &str) -> Option<&str> {
        self.payment_method_bank_account_mapping
            .get(payment_method)
            .map(String::as_str)
    }

    /// Ledger account configured for a payment method.
    pub fn gl_account_for(&self, payment_method: &str) -> Option<&str> {
        self.payment_method_gl_account_mapping
            .get(payment_method)
            .map(String::as_str)
            .filter(|account| !account.is_empty())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_consumer_key: String::new(),
            api_consumer_secret: String::new(),
            secret: None,
            enable_sync: false,
            name_by: NamingBasis::default(),
            warehouses: Vec::new(),
            item_field_map: Vec::new(),
            shipping_rule_map: Vec::new(),
            so_status_map: Vec::new(),
            enable_so_status_sync: false,
            enable_dual_accounts: false,
            enable_image_sync: false,
            enable_shipping_methods_sync: false,
            enable_stock_level_sync: false,
            subtract_reserved_stock: false,
            sync_so_items_to_wc: false,
            submit_sales_orders: false,
            delivery_after_days: 7,
            company: None,
            currency: None,
            customer_group: None,
            item_group: "All Item Groups".to_string(),
            stock_uom: "Nos".to_string(),
            warehouse: None,
            address_title: AddressTitle::default(),
            cod_fee_label: "COD".to_string(),
            enable_payments_sync: false,
            ignore_date_paid: false,
            payment_method_bank_account_mapping: BTreeMap::new(),
            payment_method_gl_account_mapping: BTreeMap::new(),
        }
    }
}

/// Integration-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Checkpoint used when the store has none yet.
    pub initial_checkpoint: Option<DateTime<Utc>>,
    /// Remote orders created before this instant are ignored.
    pub minimum_creation_date: Option<DateTime<Utc>>,
    /// A pass lock older than this (seconds) is treated as abandoned.
    pub pass_lock_stale_secs: u64,
}

/// Local database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database.
    pub database_path: PathBuf,
}

/// Daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seconds between batch passes.
    pub interval_secs: u64,
    /// Whether to serve the webhook endpoint.
    pub webhook_enabled: bool,
    /// Listen address of the webhook endpoint.
    pub webhook_bind: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
}

/// Retry policy for remote list fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each attempt.
    pub base_delay_ms: u64,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    ///
    /// Legacy item-map expressions without a `$` root are anchored at `$.`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.normalize();
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/woosync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("woosync")
            .join("config.yaml")
    }

    /// Server configuration by id.
    pub fn server(&self, id: &ServerId) -> Option<&ServerConfig> {
        self.servers
            .iter()
            .find(|s| s.server_id().ok().as_ref() == Some(id))
    }

    /// Servers with `enable_sync` set.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|s| s.enable_sync)
    }

    fn normalize(&mut self) {
        for server in &mut self.servers {
            for rule in &mut server.item_field_map {
                if let FieldMappingRule::Expression { expression, .. } = rule {
                    *expression = crate::domain::mapping::normalize_expression(expression);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            initial_checkpoint: None,
            minimum_creation_date: None,
            pass_lock_stale_secs: 2 * 60 * 60,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("woosync")
                .join("woosync.db"),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            webhook_enabled: true,
            webhook_bind: "127.0.0.1:8089".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"servers[0].url"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- servers ---
        let mut seen_ids = HashSet::new();
        for (i, server) in self.servers.iter().enumerate() {
            let prefix = format!("servers[{i}]");
            match url::Url::parse(&server.url) {
                Ok(parsed) if parsed.host_str().is_some() => {}
                _ => errors.push(ValidationError {
                    field: format!("{prefix}.url"),
                    message: format!("'{}' must be an absolute URL with a host", server.url),
                }),
            }
            if let Ok(id) = server.server_id() {
                if !seen_ids.insert(id.clone()) {
                    errors.push(ValidationError {
                        field: format!("{prefix}.url"),
                        message: format!("duplicate server '{id}'"),
                    });
                }
            }
            if server.enable_sync && server.warehouses.is_empty() {
                errors.push(ValidationError {
                    field: format!("{prefix}.warehouses"),
                    message: "at least one warehouse is required when sync is enabled".into(),
                });
            }
            validate_status_map(&prefix, server, &mut errors);
            validate_item_field_map(&prefix, server, &mut errors);
            validate_payment_accounts(&prefix, server, &mut errors);
        }

        // --- integration ---
        if self.integration.pass_lock_stale_secs == 0 {
            errors.push(ValidationError {
                field: "integration.pass_lock_stale_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- daemon ---
        if self.daemon.interval_secs == 0 {
            errors.push(ValidationError {
                field: "daemon.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.daemon.webhook_bind.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "daemon.webhook_bind".into(),
                message: format!("'{}' is not a socket address", self.daemon.webhook_bind),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

fn validate_status_map(prefix: &str, server: &ServerConfig, errors: &mut Vec<ValidationError>) {
    let mut local_seen = HashSet::new();
    let mut remote_seen = HashSet::new();
    for (j, mapping) in server.so_status_map.iter().enumerate() {
        let field = format!("{prefix}.so_status_map[{j}]");
        if !local_seen.insert(mapping.erpnext_sales_order_status.as_str()) {
            errors.push(ValidationError {
                field: field.clone(),
                message: format!(
                    "local status '{}' is mapped more than once",
                    mapping.erpnext_sales_order_status
                ),
            });
        }
        if !remote_seen.insert(mapping.woocommerce_sales_order_status.as_str()) {
            errors.push(ValidationError {
                field: field.clone(),
                message: format!(
                    "remote status '{}' is mapped more than once",
                    mapping.woocommerce_sales_order_status
                ),
            });
        }
        if order_status::slug_for_label(&mapping.woocommerce_sales_order_status).is_none() {
            errors.push(ValidationError {
                field,
                message: format!(
                    "unknown remote status '{}'",
                    mapping.woocommerce_sales_order_status
                ),
            });
        }
    }
}

fn validate_item_field_map(prefix: &str, server: &ServerConfig, errors: &mut Vec<ValidationError>) {
    for (j, rule) in server.item_field_map.iter().enumerate() {
        let field = format!("{prefix}.item_field_map[{j}]");
        let FieldMappingRule::Expression { expression, .. } = rule else {
            continue;
        };
        let query = match PathQuery::parse(&crate::domain::mapping::normalize_expression(expression))
        {
            Ok(query) => query,
            Err(e) => {
                errors.push(ValidationError {
                    field,
                    message: e.to_string(),
                });
                continue;
            }
        };
        if query.references_field("attributes") {
            errors.push(ValidationError {
                field: field.clone(),
                message: "attributes are synchronised automatically and cannot be mapped".into(),
            });
        }
        if server.enable_image_sync && query.references_field("images") {
            errors.push(ValidationError {
                field,
                message: "images cannot be mapped while image sync is enabled".into(),
            });
        }
    }
}

fn validate_payment_accounts(prefix: &str, server: &ServerConfig, errors: &mut Vec<ValidationError>) {
    if !server.enable_payments_sync {
        return;
    }
    if server.payment_method_bank_account_mapping.is_empty() {
        errors.push(ValidationError {
            field: format!("{prefix}.payment_method_bank_account_mapping"),
            message: "at least one payment method is required when payments sync is enabled".into(),
        });
    }
    for (method, bank_account) in &server.payment_method_bank_account_mapping {
        if !bank_account.is_empty() && server.gl_account_for(method).is_none() {
            errors.push(ValidationError {
                field: format!("{prefix}.payment_method_gl_account_mapping"),
                message: format!("payment method '{method}' has a bank account but no ledger account"),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use woosync_core::config::{ConfigBuilder, ServerConfig};
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .server(ServerConfig::new("https://shop.example.com", "ck_x", "cs_x"))
///     .database_path(PathBuf::from("/var/lib/woosync/woosync.db"))
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- servers ---

    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.servers.push(server);
        self
    }

    // --- integration ---

    pub fn initial_checkpoint(mut self, at: DateTime<Utc>) -> Self {
        self.config.integration.initial_checkpoint = Some(at);
        self
    }

    pub fn minimum_creation_date(mut self, at: DateTime<Utc>) -> Self {
        self.config.integration.minimum_creation_date = Some(at);
        self
    }

    pub fn pass_lock_stale_secs(mut self, seconds: u64) -> Self {
        self.config.integration.pass_lock_stale_secs = seconds;
        self
    }

    // --- store ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.store.database_path = path;
        self
    }

    // --- daemon ---

    pub fn daemon_interval_secs(mut self, seconds: u64) -> Self {
        self.config.daemon.interval_secs = seconds;
        self
    }

    pub fn webhook_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.daemon.webhook_bind = bind.into();
        self
    }

    pub fn webhook_enabled(mut self, enabled: bool) -> Self {
        self.config.daemon.webhook_enabled = enabled;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- retry ---

    pub fn retry_max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.base_delay_ms = ms;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(mut self) -> Config {
        self.config.normalize();
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
