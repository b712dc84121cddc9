//! Runtime settings from the environment (optionally a `.env` file loaded by the binaries).

use crate::error::ConfigError;
use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/drug_catalog";
const DEFAULT_CATALOG_SCHEMA: &str = "public";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    /// Schema holding the catalog tables.
    pub catalog_schema: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub admin_username: String,
    /// Admin login is disabled when unset.
    pub admin_password: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_url: DEFAULT_DATABASE_URL.into(),
            catalog_schema: DEFAULT_CATALOG_SCHEMA.into(),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            admin_username: DEFAULT_ADMIN_USERNAME.into(),
            admin_password: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = AppConfig::default();
        Ok(AppConfig {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            catalog_schema: get("CATALOG_SCHEMA").unwrap_or(defaults.catalog_schema),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), defaults.db_max_connections)?,
            admin_username: get("ADMIN_USERNAME").unwrap_or(defaults.admin_username),
            admin_password: get("ADMIN_PASSWORD"),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"), defaults.max_upload_bytes)?,
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) => s.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: format!("{:?}: {}", s, e),
        }),
    }
}
