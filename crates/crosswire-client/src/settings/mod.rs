//! Proxy settings loader (strict parsing).

pub mod schema;

use std::fs;

use crosswire_core::error::{CrosswireError, Result};

pub use schema::ProxySettings;

pub fn load_from_file(path: &str) -> Result<ProxySettings> {
    let s = fs::read_to_string(path)
        .map_err(|e| CrosswireError::Configuration(format!("read settings failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ProxySettings> {
    let settings: ProxySettings = serde_yaml::from_str(s)
        .map_err(|e| CrosswireError::Configuration(format!("invalid yaml: {e}")))?;
    settings.validate()?;
    Ok(settings)
}
