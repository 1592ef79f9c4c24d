//! Client-local preferences (active theme and persona) stored as TOML.

use crate::error::PreferencesError;
use crate::persona::{PersonaId, Theme};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    /// Unset when the active persona opts out of persistence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<PersonaId>,
}

impl Preferences {
    pub fn default_path() -> PathBuf {
        PathBuf::from("nytechat_prefs.toml")
    }

    /// Missing file yields defaults. Unknown theme or persona values are dropped
    /// individually rather than failing the whole load.
    pub fn load_from_path(path: &Path) -> Result<Self, PreferencesError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&content)?;
        Ok(Self {
            theme: field(&table, "theme"),
            persona: field(&table, "persona"),
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), PreferencesError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

fn field<T: serde::de::DeserializeOwned>(table: &toml::Table, key: &str) -> Option<T> {
    let value = table.get(key)?.clone();
    match value.clone().try_into() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(target: "nytechat::prefs", "Ignoring saved {} = {}: {}", key, value, e);
            None
        }
    }
}
