use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;

use crate::lifecycle::engine::Policy;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Scanning a pending pass approves it
    pub scan_auto_approve: bool,
    pub seed_default_users: bool,

    pub cache_capacity: u64,
    pub cache_ttl_secs: u64,

    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            server_addr: or("SERVER_ADDR", "0.0.0.0:5001"),
            database_url: or("DATABASE_URL", "sqlite:hostel.db"),
            jwt_secret: lookup("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?,
            access_token_ttl: parse(&lookup, "ACCESS_TOKEN_TTL", 900)?, // default 15 min

            rate_login_per_min: parse(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse(&lookup, "RATE_REGISTER_PER_MIN", 30)?,
            rate_protected_per_min: parse(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: or("API_PREFIX", "/api"),

            scan_auto_approve: parse(&lookup, "SCAN_AUTO_APPROVE", true)?,
            seed_default_users: parse(&lookup, "SEED_DEFAULT_USERS", false)?,

            cache_capacity: parse(&lookup, "CACHE_CAPACITY", 10_000)?,
            cache_ttl_secs: parse(&lookup, "CACHE_TTL_SECS", 300)?,

            log_dir: or("LOG_DIR", "logs"),
        })
    }

    pub fn policy(&self) -> Policy {
        Policy {
            auto_approve_on_scan: self.scan_auto_approve,
        }
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| match key {
            "JWT_SECRET" => Some("test-secret".to_string()),
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            _ => None,
        })
        .expect("test config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup_from(&[("JWT_SECRET", "s")])).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:5001");
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.access_token_ttl, 900);
        assert!(config.scan_auto_approve);
        assert!(!config.seed_default_users);
        assert!(config.policy().auto_approve_on_scan);
    }

    #[test]
    fn secret_is_required() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = Config::from_lookup(lookup_from(&[("JWT_SECRET", "s"), ("SCAN_AUTO_APPROVE", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("SCAN_AUTO_APPROVE"));
    }

    #[test]
    fn auto_approval_can_be_disabled() {
        let config =
            Config::from_lookup(lookup_from(&[("JWT_SECRET", "s"), ("SCAN_AUTO_APPROVE", "false")]))
                .unwrap();
        assert!(!config.policy().auto_approve_on_scan);
    }
}
