use std::env;
use std::net::SocketAddr;

use thiserror::Error;

use crate::table::DEFAULT_PAGE_SIZE;

pub mod cors;
pub mod security;

pub use cors::{create_cors_layer, DEFAULT_ALLOWED_ORIGINS};
pub use security::create_security_headers_layer;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3001";
const DEFAULT_BANNER_BUCKET: &str = "event-banners";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Everything in process; nothing survives a restart.
    Memory,
    /// Postgres for events, the hosted REST APIs for auth and storage.
    Hosted,
}

#[derive(Debug, Clone)]
pub struct HostedConfig {
    pub database_url: String,
    pub backend_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub mode: BackendMode,
    pub hosted: Option<HostedConfig>,
    pub public_base_url: String,
    pub banner_bucket: String,
    pub events_page_size: usize,
    pub require_email_confirmation: bool,
    pub cors_allowed_origins: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            mode: BackendMode::Memory,
            hosted: None,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            banner_bucket: DEFAULT_BANNER_BUCKET.to_string(),
            events_page_size: DEFAULT_PAGE_SIZE,
            require_email_confirmation: false,
            cors_allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

impl BackendMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Ok(BackendMode::Memory),
            "hosted" => Ok(BackendMode::Hosted),
            _ => Err(ConfigError::Invalid {
                name: "BACKEND_MODE",
                value: value.to_string(),
            }),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind = var_or("BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = bind.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind.clone(),
        })?;

        let mode = BackendMode::parse(&var_or("BACKEND_MODE", "memory"))?;
        let hosted = match mode {
            BackendMode::Memory => None,
            BackendMode::Hosted => Some(HostedConfig {
                database_url: required("DATABASE_URL")?,
                backend_url: required("BACKEND_URL")?,
                api_key: required("BACKEND_API_KEY")?,
            }),
        };

        let public_base_url = match &hosted {
            Some(h) => var_or("PUBLIC_BASE_URL", &h.backend_url),
            None => var_or("PUBLIC_BASE_URL", DEFAULT_PUBLIC_BASE_URL),
        };

        let page_size = var_or("EVENTS_PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string());
        let events_page_size = page_size
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid {
                name: "EVENTS_PAGE_SIZE",
                value: page_size.clone(),
            })?;

        let require_email_confirmation = parse_flag(
            "MEMORY_REQUIRE_EMAIL_CONFIRMATION",
            &var_or("MEMORY_REQUIRE_EMAIL_CONFIRMATION", "false"),
        )?;

        Ok(Self {
            bind_addr,
            mode,
            hosted,
            public_base_url,
            banner_bucket: var_or("BANNER_BUCKET", DEFAULT_BANNER_BUCKET),
            events_page_size,
            require_email_confirmation,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_mode_parse() {
        assert_eq!(BackendMode::parse("Memory").unwrap(), BackendMode::Memory);
        assert_eq!(BackendMode::parse(" hosted ").unwrap(), BackendMode::Hosted);
        assert!(BackendMode::parse("sqlite").is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("X", "TRUE").unwrap());
        assert!(!parse_flag("X", "0").unwrap());
        assert!(matches!(
            parse_flag("X", "maybe"),
            Err(ConfigError::Invalid { name: "X", .. })
        ));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.banner_bucket, "event-banners");
        assert_eq!(config.events_page_size, 10);
        assert!(config.hosted.is_none());
    }
}
