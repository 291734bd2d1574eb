//! Process configuration read from the environment. Exchange contracts are attached after the catalog is reachable.

use crate::config::ExchangeContract;
use crate::error::ConfigError;
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/world";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:6336";
pub const DEFAULT_WORLD_SCHEMA: &str = "public";
const DEFAULT_MAX_PAGE_SIZE: u32 = 1000;
const DEFAULT_EXCHANGE_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct CmsConfig {
    pub database_url: String,
    pub bind_addr: String,
    /// Schema holding world, _config and data_exchange. Must be a valid PostgreSQL identifier.
    pub world_schema: String,
    /// Reference ids whose requests skip permission checks.
    pub admin_user_ids: HashSet<String>,
    pub max_page_size: u32,
    pub exchange_timeout: Duration,
    pub exchanges: Vec<ExchangeContract>,
}

impl Default for CmsConfig {
    fn default() -> Self {
        CmsConfig {
            database_url: DEFAULT_DATABASE_URL.into(),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            world_schema: DEFAULT_WORLD_SCHEMA.into(),
            admin_user_ids: HashSet::new(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            exchange_timeout: Duration::from_secs(DEFAULT_EXCHANGE_TIMEOUT_SECS),
            exchanges: Vec::new(),
        }
    }
}

impl CmsConfig {
    /// Read DATABASE_URL, BIND_ADDR, WORLD_SCHEMA, ADMIN_USER_IDS, MAX_PAGE_SIZE, EXCHANGE_TIMEOUT_SECS.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CmsConfig::default();
        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(schema) = lookup("WORLD_SCHEMA") {
            if !is_identifier(&schema) {
                return Err(ConfigError::Invalid {
                    key: "WORLD_SCHEMA",
                    message: format!("'{}' is not a valid identifier", schema),
                });
            }
            config.world_schema = schema;
        }
        if let Some(ids) = lookup("ADMIN_USER_IDS") {
            config.admin_user_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(size) = lookup("MAX_PAGE_SIZE") {
            config.max_page_size = parse_number("MAX_PAGE_SIZE", &size)?;
        }
        if let Some(secs) = lookup("EXCHANGE_TIMEOUT_SECS") {
            config.exchange_timeout = Duration::from_secs(parse_number("EXCHANGE_TIMEOUT_SECS", &secs)?);
        }
        Ok(config)
    }

    pub fn is_admin(&self, reference_id: &str) -> bool {
        self.admin_user_ids.contains(reference_id)
    }

    /// Schema-qualified name for a system table (e.g. "public.world").
    pub fn qualified(&self, table: &str) -> String {
        format!("{}.{}", self.world_schema, table)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = CmsConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.world_schema, "public");
        assert_eq!(config.max_page_size, 1000);
        assert!(config.admin_user_ids.is_empty());
    }

    #[test]
    fn parses_admin_ids_and_numbers() {
        let config = CmsConfig::from_lookup(lookup(&[
            ("ADMIN_USER_IDS", " a1, ,b2 "),
            ("MAX_PAGE_SIZE", "50"),
            ("EXCHANGE_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert!(config.is_admin("a1"));
        assert!(config.is_admin("b2"));
        assert_eq!(config.admin_user_ids.len(), 2);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.exchange_timeout, Duration::from_secs(3));
    }

    #[test]
    fn rejects_bad_schema_and_numbers() {
        assert!(matches!(
            CmsConfig::from_lookup(lookup(&[("WORLD_SCHEMA", "bad-name;")])),
            Err(ConfigError::Invalid { key: "WORLD_SCHEMA", .. })
        ));
        assert!(matches!(
            CmsConfig::from_lookup(lookup(&[("MAX_PAGE_SIZE", "lots")])),
            Err(ConfigError::Invalid { key: "MAX_PAGE_SIZE", .. })
        ));
    }

    #[test]
    fn qualifies_system_tables() {
        let config = CmsConfig::default();
        assert_eq!(config.qualified("world"), "public.world");
    }
}
