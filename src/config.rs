use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{anyhow, ensure, Result};
use tracing::info;

use crate::search::PageLimits;

pub struct Config {
    pub port: u16,
    /// In-memory store when unset
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub page_limits: PageLimits,
    pub seed_file: Option<PathBuf>,
    /// Shared secret the identity proxy sends with forwarded claims
    pub proxy_secret: Option<String>,
    /// Subjects allowed to create, edit and delete listings
    pub listing_admins: Vec<String>,
    /// Browser origins allowed to call the API
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let page_limits = PageLimits {
            default_limit: load_or(&lookup, "DEFAULT_PAGE_LIMIT", "20")?,
            max_limit: load_or(&lookup, "MAX_PAGE_LIMIT", "100")?,
        };
        ensure!(
            page_limits.default_limit >= 1 && page_limits.default_limit <= page_limits.max_limit,
            "DEFAULT_PAGE_LIMIT must be between 1 and MAX_PAGE_LIMIT"
        );

        Ok(Self {
            port: load_or(&lookup, "PORT", "5000")?,
            database_url: optional(&lookup, "DATABASE_URL"),
            db_max_connections: load_or(&lookup, "DB_MAX_CONNECTIONS", "10")?,
            page_limits,
            seed_file: optional(&lookup, "SEED_FILE").map(PathBuf::from),
            proxy_secret: optional(&lookup, "PROXY_SECRET"),
            listing_admins: list(&lookup, "LISTING_ADMINS"),
            cors_origins: list(&lookup, "CORS_ORIGINS"),
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn list(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Vec<String> {
    optional(lookup, key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn load_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T>
where
    T::Err: Display,
{
    let raw = optional(lookup, key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_use_memory_store() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert!(config.database_url.is_none());
        assert_eq!(config.page_limits, PageLimits::default());
        assert!(config.seed_file.is_none());
        assert!(config.proxy_secret.is_none());
        assert!(config.listing_admins.is_empty());
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/housing"),
            ("MAX_PAGE_LIMIT", "50"),
            ("SEED_FILE", "listings.json"),
            ("PROXY_SECRET", "s3cret"),
            ("LISTING_ADMINS", "landlord-1, ,landlord-2"),
            ("CORS_ORIGINS", "http://localhost:5173"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/housing"));
        assert_eq!(config.page_limits.max_limit, 50);
        assert_eq!(config.seed_file, Some(PathBuf::from("listings.json")));
        assert_eq!(config.proxy_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.listing_admins, vec!["landlord-1", "landlord-2"]);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("DEFAULT_PAGE_LIMIT", "200")]).is_err());
    }
}
