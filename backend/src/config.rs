//! Configuration management for the Warehouse Inventory Tracker
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with WIT_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Which store implementation backs the movement engine
    pub storage: StorageConfig,

    /// JWT verification configuration
    pub jwt: JwtConfig,

    /// Bulk import policies
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection before failing the request
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify bearer tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Prefix of the generated reference for inbound rows without one
    pub inbound_placeholder_prefix: String,

    /// Prefix of the generated reference for outbound rows without one
    pub outbound_placeholder_prefix: String,

    /// Contact recorded on suppliers created by an import
    pub supplier_placeholder_contact: String,

    /// Contact recorded on customers created by an import
    pub customer_placeholder_contact: String,

    /// Customer used when an outbound row names none
    pub walk_in_customer_name: String,

    /// Whether a positive cost on an inbound row overwrites the product's cost price
    pub overwrite_product_cost: bool,

    /// Warehouse that receives the opening stock of imported products
    pub default_warehouse_name: String,

    /// Location recorded if the default warehouse has to be created
    pub default_warehouse_location: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            inbound_placeholder_prefix: "BULK-IMPORT".to_string(),
            outbound_placeholder_prefix: "BULK-OUT".to_string(),
            supplier_placeholder_contact: "Imported".to_string(),
            customer_placeholder_contact: "Imported via CSV".to_string(),
            walk_in_customer_name: "Walk-in Customer".to_string(),
            overwrite_product_cost: true,
            default_warehouse_name: "Main Warehouse".to_string(),
            default_warehouse_location: "HQ".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("WIT_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let import = ImportConfig::default();

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("storage.backend", "postgres")?
            .set_default("jwt.secret", "development-secret-key")?
            .set_default("import.inbound_placeholder_prefix", import.inbound_placeholder_prefix)?
            .set_default("import.outbound_placeholder_prefix", import.outbound_placeholder_prefix)?
            .set_default("import.supplier_placeholder_contact", import.supplier_placeholder_contact)?
            .set_default("import.customer_placeholder_contact", import.customer_placeholder_contact)?
            .set_default("import.walk_in_customer_name", import.walk_in_customer_name)?
            .set_default("import.overwrite_product_cost", import.overwrite_product_cost)?
            .set_default("import.default_warehouse_name", import.default_warehouse_name)?
            .set_default("import.default_warehouse_location", import.default_warehouse_location)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (WIT_ prefix)
            .add_source(
                Environment::with_prefix("WIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_defaults_match_upload_conventions() {
        let import = ImportConfig::default();
        assert_eq!(import.inbound_placeholder_prefix, "BULK-IMPORT");
        assert_eq!(import.outbound_placeholder_prefix, "BULK-OUT");
        assert_eq!(import.walk_in_customer_name, "Walk-in Customer");
        assert!(import.overwrite_product_cost);
    }

    #[test]
    fn test_storage_backend_parses_lowercase() {
        let cfg: StorageConfig = serde_json::from_str(r#"{"backend":"memory"}"#).unwrap();
        assert_eq!(cfg.backend, StorageBackend::Memory);
    }
}
