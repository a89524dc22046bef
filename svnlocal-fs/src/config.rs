//! Per-repository configuration stored at `conf/svnlocal.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Repository tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReposConfig {
    /// zstd level for stored objects; 0 stores them uncompressed.
    pub compression_level: i32,
    /// Number of decoded tree nodes kept in memory.
    pub node_cache_size: usize,
}

impl Default for ReposConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            node_cache_size: 1024,
        }
    }
}

impl ReposConfig {
    /// Location of the config file inside a repository
    pub fn path(repo_path: &Path) -> PathBuf {
        repo_path.join("conf").join("svnlocal.toml")
    }

    /// Load the config of a repository, falling back to defaults when the
    /// file does not exist.
    pub fn load(repo_path: &Path) -> Result<Self> {
        let config_path = Self::path(repo_path);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&config_path)?;
        toml::from_str(&data)
            .map_err(|e| Error::Config(format!("{}: {}", config_path.display(), e)))
    }

    /// Save the config into a repository
    pub fn save(&self, repo_path: &Path) -> Result<()> {
        let config_path = Self::path(repo_path);
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        let tmp_path = config_path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &config_path)?;
        Ok(())
    }
}
