//! Core business logic for the factory hierarchy and the machine-facing data.
//!
//! Every module takes a `&DatabaseConnection` (or any `ConnectionTrait` where a
//! transaction is involved) and returns `crate::errors::Result`. Nothing here
//! knows about HTTP; the `api` module translates errors into status codes.

/// Buyer CRUD, search and dependent checks
pub mod buyer;
/// Per-machine key/value configuration
pub mod client_config;
/// Command queue for machine agents
pub mod command;
/// Dashboard metrics, alerts and activity feed
pub mod dashboard;
/// Production line CRUD
pub mod line;
/// Log row upload, query and retention
pub mod log;
/// Log file metadata
pub mod log_file;
/// Machine CRUD, registration, heartbeat and detail projection
pub mod machine;
/// Machine type catalogue
pub mod machine_type;
/// Product model CRUD
pub mod model;
/// Model group CRUD
pub mod model_group;
/// Model process CRUD and projection
pub mod model_process;
/// Station CRUD
pub mod station;

use crate::errors::{Error, Result};

/// Trims `value` and checks it is non-empty and at most `max_len` characters.
pub(crate) fn required_text(field: &str, value: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_len {
        return Err(Error::validation(format!(
            "{field} cannot exceed {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional value, mapping blank strings to `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
