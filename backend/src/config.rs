//! Configuration management for the Indago pipeline
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. `config/default.toml`
//! 3. Environment file (`config/development.toml`, `config/production.toml`)
//! 4. Environment variable overrides with INDAGO__ prefix

use std::collections::BTreeMap;
use std::time::Duration;

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{default_seed_stock, BudgetPolicy, Component, CostTable, Recipe, RecipeBook, StockSeed};

use crate::external::RetryConfig;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Which components this process hosts
    pub service: ServiceConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    pub storage: StorageConfig,

    /// Base URLs of components hosted elsewhere
    pub downstream: DownstreamConfig,

    /// Retry budget for cross-service calls
    pub retry: RetrySettings,

    #[serde(default)]
    pub kitchen: KitchenConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,

    pub finance: FinanceConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Component names, or `all`
    pub roles: Vec<String>,
}

impl ServiceConfig {
    pub fn hosts(&self, component: Component) -> bool {
        self.roles
            .iter()
            .any(|r| r == "all" || r == component.as_str())
    }

    pub fn hosted(&self) -> Vec<Component> {
        [
            Component::Orders,
            Component::Kitchen,
            Component::Inventory,
            Component::Finance,
            Component::Sales,
        ]
        .into_iter()
        .filter(|c| self.hosts(*c))
        .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for role in &self.roles {
            if role != "all" && Component::parse(role).is_none() {
                return Err(ConfigError::Message(format!(
                    "service.roles: unknown role '{}'",
                    role
                )));
            }
        }
        if self.roles.is_empty() {
            return Err(ConfigError::Message(
                "service.roles: at least one role is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Postgres => "postgres",
            StorageBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownstreamConfig {
    pub orders_url: String,
    pub kitchen_url: String,
    pub inventory_url: String,
    pub finance_url: String,

    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
}

impl DownstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_factor: f64,
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
            backoff_factor: self.backoff_factor,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct KitchenConfig {
    pub recipes: Vec<Recipe>,
}

impl KitchenConfig {
    pub fn recipe_book(&self) -> RecipeBook {
        RecipeBook::new(self.recipes.clone())
    }
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            recipes: RecipeBook::default().into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    /// Stock loaded into an empty ledger at startup
    pub seed: Vec<StockSeed>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            seed: default_seed_stock(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FinanceConfig {
    pub budget_limit: Decimal,

    /// Decide submitted requests immediately with the budget policy
    pub auto_decide: bool,

    /// Ingredient → unit cost
    #[serde(default)]
    pub ingredient_costs: BTreeMap<String, Decimal>,

    pub default_unit_cost: Decimal,
}

impl FinanceConfig {
    pub fn budget_policy(&self) -> BudgetPolicy {
        BudgetPolicy::new(self.budget_limit)
    }

    pub fn cost_table(&self) -> CostTable {
        let mut table = CostTable::default();
        table.default_unit_cost = self.default_unit_cost;
        table.costs.extend(
            self.ingredient_costs
                .iter()
                .map(|(k, v)| (k.clone(), *v)),
        );
        table
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("INDAGO_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::defaults(config::Config::builder(), &environment)?
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (INDAGO__ prefix)
            .add_source(
                Environment::with_prefix("INDAGO")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("service.roles")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.service.validate()?;
        Ok(config)
    }

    /// Configuration built from code defaults only
    pub fn from_defaults() -> Result<Self, ConfigError> {
        let config: Config = Self::defaults(config::Config::builder(), "test")?
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            // Start with default values
            .set_default("environment", environment)?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("service.roles", vec!["all"])?
            .set_default("database.url", "postgres://localhost/indago")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("storage.backend", "postgres")?
            .set_default("downstream.orders_url", "http://localhost:3000")?
            .set_default("downstream.kitchen_url", "http://localhost:3000")?
            .set_default("downstream.inventory_url", "http://localhost:3000")?
            .set_default("downstream.finance_url", "http://localhost:3000")?
            .set_default("downstream.timeout_ms", 5000)?
            .set_default("retry.max_attempts", 3)?
            .set_default("retry.initial_backoff_ms", 100)?
            .set_default("retry.max_backoff_ms", 2000)?
            .set_default("retry.backoff_factor", 2.0)?
            .set_default("finance.budget_limit", "500000")?
            .set_default("finance.auto_decide", false)?
            .set_default("finance.default_unit_cost", "1")?
            .set_default("logging.format", "pretty")
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.to_retry_config()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
