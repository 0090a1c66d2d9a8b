use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::backend::BackendConfig;

/// Persisted display configuration: which backend is active plus the
/// per-backend settings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_active")]
    pub active: String,
    #[serde(default)]
    pub plugins: HashMap<String, BackendConfig>,
    /// When enabled the application initialises the logger at debug level.
    /// Defaults to `false` when the field is missing in the settings file.
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_active() -> String {
    "strip".into()
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            active: default_active(),
            plugins: HashMap::new(),
            debug_logging: false,
        }
    }
}

impl DisplaySettings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Config for the active backend; defaults when the table has no
    /// entry for it.
    pub fn active_config(&self) -> BackendConfig {
        self.plugins.get(&self.active).cloned().unwrap_or_default()
    }
}
