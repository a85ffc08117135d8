//! Explicit runtime configuration, passed into the services that need it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::LedgerError;

pub const DEFAULT_COALESCE_WINDOW_MS: u64 = 300;

/// Replaces the original's global preference singleton: every service that
/// needs a default takes this struct explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    /// ISO 4217 code used for wealth summaries and system accounts when the
    /// caller does not specify one.
    pub default_currency: String,
    /// Derived-view recompute coalescing window in milliseconds.
    pub coalesce_window_ms: u64,
    /// How many JSON store backups to retain.
    pub backup_retention: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_currency: "USD".into(),
            coalesce_window_ms: DEFAULT_COALESCE_WINDOW_MS,
            backup_retention: 5,
        }
    }
}

impl LedgerConfig {
    /// Loads from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        if path.exists() {
            let data = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&data)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_defaults() {
        let temp = tempdir().unwrap();
        let config = LedgerConfig::load(&temp.path().join("config.json")).unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("config.json");
        let config = LedgerConfig {
            default_currency: "EUR".into(),
            coalesce_window_ms: 150,
            backup_retention: 9,
        };
        config.save(&path).unwrap();
        assert_eq!(LedgerConfig::load(&path).unwrap(), config);
    }
}
