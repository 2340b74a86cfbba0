//! Server settings read from the environment.
//!
//! Values come from process environment variables, usually populated from a
//! `.env` file by `dotenvy` in `main`. Every setting has a default.

use super::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Address the HTTP API listens on when `BIND_ADDR` is not set
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5275";

/// Runtime settings of the API server
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// `DATABASE_URL`
    pub database_url: String,
    /// `BIND_ADDR`
    pub bind_addr: SocketAddr,
    /// `OFFLINE_AFTER_SECS`: machines silent for longer are marked offline
    pub offline_after: Duration,
    /// `OFFLINE_SWEEP_SECS`: interval of the offline sweep
    pub offline_sweep: Duration,
    /// `SEED_CONFIG`: optional TOML file with reference data
    pub seed_config: PathBuf,
}

impl ServerSettings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when a value is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|e| Error::Config {
            message: format!("Invalid BIND_ADDR '{bind_raw}': {e}"),
        })?;

        let offline_after = Duration::from_secs(parse_secs(&lookup, "OFFLINE_AFTER_SECS", 90)?);
        let offline_sweep = Duration::from_secs(parse_secs(&lookup, "OFFLINE_SWEEP_SECS", 30)?);
        let seed_config =
            PathBuf::from(lookup("SEED_CONFIG").unwrap_or_else(|| "config.toml".to_string()));

        Ok(Self {
            database_url,
            bind_addr,
            offline_after,
            offline_sweep,
            seed_config,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(Error::Config {
                message: format!("{key} must be a positive number of seconds, got '{raw}'"),
            }),
            Ok(secs) => Ok(secs),
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = ServerSettings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(settings.bind_addr.port(), 5275);
        assert_eq!(settings.offline_after, Duration::from_secs(90));
        assert_eq!(settings.offline_sweep, Duration::from_secs(30));
        assert_eq!(settings.seed_config, PathBuf::from("config.toml"));
    }

    #[test]
    fn test_overrides() {
        let settings = ServerSettings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("OFFLINE_AFTER_SECS", "120"),
        ]))
        .unwrap();
        assert_eq!(settings.database_url, "sqlite::memory:");
        assert_eq!(settings.bind_addr.port(), 8080);
        assert_eq!(settings.offline_after, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_addr = ServerSettings::from_lookup(lookup_from(&[("BIND_ADDR", "nope")]));
        assert!(matches!(bad_addr, Err(Error::Config { .. })));

        let zero = ServerSettings::from_lookup(lookup_from(&[("OFFLINE_SWEEP_SECS", "0")]));
        assert!(matches!(zero, Err(Error::Config { .. })));
    }
}
