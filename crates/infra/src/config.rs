//! Configuration loading and representation.

use std::time::Duration;

use thiserror::Error;

use solderp_invoicing::TaxRate;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://solderp.db?mode=rwc";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {var}='{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub bind_addr: String,
    pub invoice_tax: TaxRate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            invoice_tax: TaxRate::default(),
        }
    }
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            cfg.database.url = url;
        }
        if let Some(raw) = lookup("DB_MAX_CONNECTIONS") {
            let n: u32 = parse("DB_MAX_CONNECTIONS", &raw)?;
            if n == 0 {
                return Err(invalid("DB_MAX_CONNECTIONS", &raw, "must be at least 1"));
            }
            cfg.database.max_connections = n;
        }
        if let Some(raw) = lookup("DB_BUSY_TIMEOUT_MS") {
            let ms: u64 = parse("DB_BUSY_TIMEOUT_MS", &raw)?;
            cfg.database.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(addr) = lookup("BIND_ADDR").filter(|v| !v.trim().is_empty()) {
            cfg.bind_addr = addr;
        }
        if let Some(raw) = lookup("INVOICE_TAX_BPS") {
            let bps: u32 = parse("INVOICE_TAX_BPS", &raw)?;
            cfg.invoice_tax = TaxRate::from_bps(bps)
                .map_err(|e| invalid("INVOICE_TAX_BPS", &raw, &e.to_string()))?;
        }

        Ok(cfg)
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| invalid(var, raw, &e.to_string()))
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
