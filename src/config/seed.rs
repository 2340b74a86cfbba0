//! Seed data loading from config.toml
//!
//! This module provides functionality to load reference data (machine types
//! and production lines) from a TOML file. Entries are created at startup
//! when they are missing from the database; existing rows are left alone.

use crate::core::{line, machine_type};
use crate::errors::{Error, Result};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Configuration structure representing the entire seed file
#[derive(Debug, Default, Deserialize)]
pub struct SeedConfig {
    /// Machine type names to ensure
    #[serde(default)]
    pub machine_types: Vec<String>,
    /// Production lines to ensure
    #[serde(default)]
    pub lines: Vec<LineSeed>,
}

/// Configuration for a single production line
#[derive(Debug, Deserialize, Clone)]
pub struct LineSeed {
    /// Name of the line (e.g., "L01")
    pub name: String,
}

/// Loads seed configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_seed_config<P: AsRef<Path>>(path: P) -> Result<SeedConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read seed file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse seed file: {e}"),
    })
}

/// Creates every machine type and line from `seed` that does not exist yet.
///
/// Returns the number of rows created.
pub async fn apply_seed(db: &DatabaseConnection, seed: &SeedConfig) -> Result<usize> {
    let mut created = 0;

    for name in &seed.machine_types {
        if machine_type::get_machine_type_by_name(db, name).await?.is_none() {
            machine_type::create_machine_type(db, name.clone()).await?;
            created += 1;
        }
    }

    for line_seed in &seed.lines {
        if line::get_line_by_name(db, &line_seed.name).await?.is_none() {
            line::create_line(db, line_seed.name.clone()).await?;
            created += 1;
        }
    }

    info!(created, "Seed data applied");
    Ok(created)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;

    const SEED: &str = r#"
        machine_types = ["ICT", "FCT", "Router"]

        [[lines]]
        name = "L01"

        [[lines]]
        name = "L02"
    "#;

    #[test]
    fn test_parse_seed_config() {
        let config: SeedConfig = toml::from_str(SEED).unwrap();
        assert_eq!(config.machine_types, vec!["ICT", "FCT", "Router"]);
        assert_eq!(config.lines.len(), 2);
        assert_eq!(config.lines[1].name, "L02");
    }

    #[test]
    fn test_parse_empty_seed_config() {
        let config: SeedConfig = toml::from_str("").unwrap();
        assert!(config.machine_types.is_empty());
        assert!(config.lines.is_empty());
    }

    #[test]
    fn test_load_seed_config_missing_file() {
        let result = load_seed_config("/definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_seed_config_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "machine_types = [\"ICT\"").unwrap();

        let err = load_seed_config(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().starts_with("Configuration error: Failed to parse seed file"));
    }

    #[tokio::test]
    async fn test_apply_seed_skips_existing() -> Result<()> {
        let db = setup_test_db().await?;
        let config: SeedConfig = toml::from_str(SEED).unwrap();

        assert_eq!(apply_seed(&db, &config).await?, 5);
        assert_eq!(apply_seed(&db, &config).await?, 0);
        assert_eq!(machine_type::get_all_machine_types(&db).await?.len(), 3);
        Ok(())
    }
}
