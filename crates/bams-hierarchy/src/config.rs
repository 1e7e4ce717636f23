use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use bams_crypto::MiningBudget;

use crate::error::{HierarchyError, HierarchyResult};

/// Environment variable that overrides [`HierarchyConfig::data_dir`].
pub const DATA_DIR_ENV: &str = "BAMS_DATA_DIR";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub data_dir: PathBuf,
    pub snapshot_file: String,
    /// Save the full snapshot after every successful mutation.
    pub persist_on_mutation: bool,
    pub mining: MiningConfig,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            snapshot_file: "bams_structure.json".into(),
            persist_on_mutation: true,
            mining: MiningConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Wall-clock limit for one nonce search, in milliseconds. Unlimited when
    /// unset.
    pub max_duration_ms: Option<u64>,
}

impl MiningConfig {
    pub fn budget(&self) -> MiningBudget {
        MiningBudget {
            max_duration: self.max_duration_ms.map(Duration::from_millis),
        }
    }
}

impl HierarchyConfig {
    pub fn from_toml_str(s: &str) -> HierarchyResult<Self> {
        toml::from_str(s).map_err(|e| HierarchyError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> HierarchyResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HierarchyError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Load from `path` (or defaults) and apply the `BAMS_DATA_DIR` override.
    pub fn load(path: Option<&Path>) -> HierarchyResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_data_dir_override(std::env::var_os(DATA_DIR_ENV)))
    }

    pub fn with_data_dir_override(mut self, data_dir: Option<OsString>) -> Self {
        if let Some(dir) = data_dir.filter(|d| !d.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }
}
