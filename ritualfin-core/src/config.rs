//! Configuration management
//!
//! settings.json in the data directory:
//! ```json
//! {
//!   "import": { "maxStoredErrors": 5, "maxReportedErrors": 10, "accountSource": "M&M" },
//!   "identities": { "<token>": { "id": "user-1", "email": "me@example.com" } }
//! }
//! ```
//! Keys this crate doesn't manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::result::{Error, Result};
use crate::domain::Identity;

pub const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    import: ImportSettings,
    #[serde(default)]
    identities: HashMap<String, Identity>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Import pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSettings {
    /// Row errors joined into the upload's error message
    #[serde(default = "default_max_stored_errors")]
    pub max_stored_errors: usize,
    /// Row errors returned to the caller
    #[serde(default = "default_max_reported_errors")]
    pub max_reported_errors: usize,
    /// Source label written to raw and final records
    #[serde(default = "default_account_source")]
    pub account_source: String,
}

fn default_max_stored_errors() -> usize {
    5
}

fn default_max_reported_errors() -> usize {
    10
}

fn default_account_source() -> String {
    "M&M".to_string()
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_stored_errors: default_max_stored_errors(),
            max_reported_errors: default_max_reported_errors(),
            account_source: default_account_source(),
        }
    }
}

/// RitualFin configuration (simplified view of settings)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub import: ImportSettings,
    /// Bearer token to identity
    pub identities: HashMap<String, Identity>,
}

impl Config {
    /// Load config from the data directory
    ///
    /// A missing file gives defaults; a malformed one is a `Config` error.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;
        Ok(Self {
            import: raw.import,
            identities: raw.identities,
        })
    }

    /// Save config to the data directory, preserving unmanaged settings
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let mut settings = read_settings(data_dir).unwrap_or_else(|e| {
            warn!(error = %e, "Replacing unreadable settings file");
            SettingsFile::default()
        });

        settings.import = self.import.clone();
        settings.identities = self.identities.clone();

        std::fs::create_dir_all(data_dir)?;
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    /// Register a token for an identity
    pub fn add_identity(&mut self, token: impl Into<String>, identity: Identity) {
        self.identities.insert(token.into(), identity);
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", settings_path.display(), e)))
}
