//! # configs
//!
//! Layered settings for the market binary and its stores. Lowest precedence
//! first:
//!
//! 1. built-in defaults,
//! 2. `config/market.toml` if present (`MARKET_CONFIG` points elsewhere),
//! 3. `.env`,
//! 4. `MARKET__SECTION__KEY` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use domains::CartMergePolicy;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "config/market.toml";
pub const CONFIG_PATH_VAR: &str = "MARKET_CONFIG";
const ENV_PREFIX: &str = "MARKET";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub commerce: CommerceSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    pub page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommerceSettings {
    /// Upper bound on every backend call, in milliseconds.
    pub backend_timeout_ms: u64,
    pub cart_merge_policy: CartMergePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory of the JSON-file local storage.
    pub local_dir: PathBuf,
    pub cart_key: String,
    pub database_url: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
    pub json: bool,
}

impl CommerceSettings {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}

impl Settings {
    /// Loads `.env`, then the layered settings.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), ".env loaded");
        }
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::build(Some(Path::new(&path)), None)
    }

    /// Builds settings from an optional file and an environment. `env: None`
    /// reads the process environment.
    pub fn build(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("catalog.page_size", 24)?
            .set_default("catalog.max_page_size", 100)?
            .set_default("commerce.backend_timeout_ms", 10_000)?
            .set_default("commerce.cart_merge_policy", "keep_local")?
            .set_default("storage.local_dir", "./data/local")?
            .set_default("storage.cart_key", "cart")?
            .set_default("storage.database_url", "sqlite://data/market.db?mode=rwc")?
            .set_default("log.filter", "info")?
            .set_default("log.json", false)?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.page_size == 0 {
            return Err(invalid("catalog.page_size", "must be greater than zero"));
        }
        if self.catalog.page_size > self.catalog.max_page_size {
            return Err(invalid(
                "catalog.page_size",
                format!("{} exceeds catalog.max_page_size {}", self.catalog.page_size, self.catalog.max_page_size),
            ));
        }
        if self.commerce.backend_timeout_ms == 0 {
            return Err(invalid("commerce.backend_timeout_ms", "must be greater than zero"));
        }
        if self.storage.cart_key.trim().is_empty() {
            return Err(invalid("storage.cart_key", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}
