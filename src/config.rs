use std::env;
use std::fmt::{Debug, Display};
use std::ops::RangeInclusive;
use std::str::FromStr;

use tracing::info;

use crate::error::Error;

/// Tokens live at most a year.
const JWT_TTL_HOURS: RangeInclusive<i64> = 1..=24 * 365;
/// Cached listings live at most a week.
const CACHE_TTL_SECONDS: RangeInclusive<u64> = 1..=7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub ads: AdConfig,
    pub seed_database: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
}

// keep the secret out of logs
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"****")
            .field("jwt_ttl_hours", &self.jwt_ttl_hours)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct AdConfig {
    pub default_cost_per_click: f64,
}

impl Config {
    /// Reads the configuration from the process environment, after loading
    /// a `.env` file if one exists.
    pub fn from_env() -> Result<Config, Error> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("loaded environment from {}", path.display());
        }

        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| Error::InvalidConfiguration {
                variable: "JWT_SECRET".into(),
                reason: "must be set".into(),
            })?;

        let default_cost_per_click: f64 = parse_or(&lookup, "AD_DEFAULT_COST_PER_CLICK", 0.10)?;
        if !(default_cost_per_click > 0.0) {
            return Err(Error::InvalidConfiguration {
                variable: "AD_DEFAULT_COST_PER_CLICK".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Config {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".into()),
                port: parse_or(&lookup, "PORT", 8080)?,
            },
            database: DatabaseConfig {
                uri: lookup("MONGODB_URI").unwrap_or_else(|| "mongodb://localhost:27017".into()),
                name: lookup("MONGODB_DATABASE").unwrap_or_else(|| "eventhub".into()),
            },
            auth: AuthConfig {
                jwt_secret,
                jwt_ttl_hours: parse_in(&lookup, "JWT_TTL_HOURS", 24, JWT_TTL_HOURS)?,
            },
            cache: CacheConfig {
                redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
                ttl_seconds: parse_in(&lookup, "CACHE_TTL_SECONDS", 300, CACHE_TTL_SECONDS)?,
            },
            ads: AdConfig {
                default_cost_per_click,
            },
            seed_database: parse_or(&lookup, "SEED_DATABASE", false)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|err: T::Err| Error::InvalidConfiguration {
            variable: key.to_owned(),
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_in<F, T>(
    lookup: &F,
    key: &str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Debug,
    T::Err: Display,
{
    let value = parse_or(lookup, key, default)?;
    if !range.contains(&value) {
        return Err(Error::InvalidConfiguration {
            variable: key.to_owned(),
            reason: format!("must be between {:?} and {:?}", range.start(), range.end()),
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.name, "eventhub");
        assert_eq!(config.auth.jwt_ttl_hours, 24);
        assert!(config.cache.redis_url.is_none());
        assert!(!config.seed_database);
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();

        assert_eq!(
            err,
            Error::InvalidConfiguration {
                variable: "JWT_SECRET".into(),
                reason: "must be set".into(),
            }
        );
    }

    #[test]
    fn unparsable_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "s"), ("PORT", "eighty")]))
            .unwrap_err();

        match err {
            Error::InvalidConfiguration { variable, .. } => assert_eq!(variable, "PORT"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn secret_is_not_debug_printed() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "hunter2")])).unwrap();

        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn token_lifetime_must_be_positive_and_bounded() {
        for hours in ["0", "-5", "9223372036854775807"] {
            let err = Config::from_lookup(lookup(&[("JWT_SECRET", "s"), ("JWT_TTL_HOURS", hours)]))
                .unwrap_err();

            match err {
                Error::InvalidConfiguration { variable, .. } => {
                    assert_eq!(variable, "JWT_TTL_HOURS")
                }
                other => panic!("unexpected error {:?}", other),
            }
        }

        let config =
            Config::from_lookup(lookup(&[("JWT_SECRET", "s"), ("JWT_TTL_HOURS", "8760")])).unwrap();
        assert_eq!(config.auth.jwt_ttl_hours, 8760);
    }

    #[test]
    fn zero_cache_ttl_is_rejected() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "s"), ("CACHE_TTL_SECONDS", "0")]))
            .unwrap_err();

        assert_eq!(
            err,
            Error::InvalidConfiguration {
                variable: "CACHE_TTL_SECONDS".into(),
                reason: "must be between 1 and 604800".into(),
            }
        );
    }
}
