//! Daemon configuration, loaded from an optional TOML file with CLI
//! overrides on top.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Bind address.
    pub bind: String,
    pub port: u16,
    /// Enables the encrypted codec when non-empty.
    pub password: Option<String>,
    /// Keep the current primary across competing focus reports.
    pub sticky: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 6783,
            password: None,
            sticky: false,
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
