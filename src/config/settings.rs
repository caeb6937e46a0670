//! Application settings loading.
//!
//! Settings come from an optional `config.toml` (path taken from `CRM_CONFIG`,
//! default `./config.toml`), then environment variables override individual
//! values. A missing default file is fine; a missing file named explicitly by
//! `CRM_CONFIG` is a configuration error.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Bootstrap admin, created on start when no admin exists
    pub admin: Option<AdminSeed>,
    /// List endpoint paging limits
    pub pagination: PaginationConfig,
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SeaORM` connection URL
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// `[admin]` section
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    /// Login email of the bootstrap admin
    pub email: String,
    /// Initial password of the bootstrap admin
    pub password: String,
    /// Display name
    #[serde(default = "default_admin_name")]
    pub full_name: String,
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

/// `[pagination]` section
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when the request names none
    pub default_limit: u64,
    /// Upper bound for a requested page size
    pub max_limit: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Parses settings from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the file named by `CRM_CONFIG` (or `./config.toml` if present) and
/// applies environment overrides.
pub fn load_app_configuration() -> Result<AppConfig> {
    let mut config = match std::env::var("CRM_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH)?,
        Err(_) => {
            info!("No config.toml found, using defaults and environment.");
            AppConfig::default()
        }
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Applies `DATABASE_URL`, `CRM_BIND`, `CRM_ADMIN_EMAIL` and `CRM_ADMIN_PASSWORD`.
fn apply_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(bind) = lookup("CRM_BIND") {
        config.server.bind = bind;
    }
    if let (Some(email), Some(password)) = (lookup("CRM_ADMIN_EMAIL"), lookup("CRM_ADMIN_PASSWORD"))
    {
        let full_name = config
            .admin
            .as_ref()
            .map_or_else(default_admin_name, |admin| admin.full_name.clone());
        config.admin = Some(AdminSeed {
            email,
            password,
            full_name,
        });
    }
}

fn validate(config: &AppConfig) -> Result<()> {
    let pagination = config.pagination;
    if pagination.default_limit == 0 || pagination.default_limit > pagination.max_limit {
        return Err(Error::Config {
            message: format!(
                "pagination.default_limit must be between 1 and max_limit ({})",
                pagination.max_limit
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [server]
            bind = "127.0.0.1:9000"

            [database]
            url = "sqlite::memory:"

            [admin]
            email = "root@agency.test"
            password = "change-me-now"

            [pagination]
            default_limit = 20
            max_limit = 50
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.database.url, "sqlite::memory:");
        let admin = config.admin.unwrap();
        assert_eq!(admin.email, "root@agency.test");
        assert_eq!(admin.full_name, "Administrator");
        assert_eq!(config.pagination.default_limit, 20);
        assert_eq!(config.pagination.max_limit, 50);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
        assert!(config.admin.is_none());
        assert_eq!(config.pagination.default_limit, 10);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_config("[server\nbind = 1");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("CRM_BIND", "127.0.0.1:1234"),
            ("CRM_ADMIN_EMAIL", "boss@agency.test"),
            ("CRM_ADMIN_PASSWORD", "s3cret-pass"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        apply_overrides(&mut config, |key| env.get(key).map(ToString::to_string));

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.server.bind, "127.0.0.1:1234");
        assert_eq!(config.admin.unwrap().email, "boss@agency.test");
    }

    #[test]
    fn test_admin_override_needs_both_values() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, |key| {
            (key == "CRM_ADMIN_EMAIL").then(|| "half@agency.test".to_string())
        });
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_pagination_bounds_are_validated() {
        let config = parse_config("[pagination]\ndefault_limit = 500\nmax_limit = 100").unwrap();
        assert!(matches!(validate(&config), Err(Error::Config { .. })));
    }
}
