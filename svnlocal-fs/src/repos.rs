//! On-disk repository layout
//!
//! ```text
//! {root}/
//!   format                  "svnlocal-1"
//!   uuid                    repository UUID
//!   conf/svnlocal.toml      repository configuration
//!   db/                     object store and revision records
//!   hooks/                  pre-commit, post-commit
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ReposConfig;
use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::hooks::HookManager;
use crate::storage::DiskStorage;

/// Contents of the `format` file
pub const FORMAT: &str = "svnlocal-1";

/// An opened repository
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
    config: ReposConfig,
    fs: Filesystem,
}

impl Repository {
    /// Create a new repository at `path`; the directory must be absent or empty.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() && fs::read_dir(path)?.next().is_some() {
            return Err(Error::AlreadyExists(path.display().to_string()));
        }
        fs::create_dir_all(path)?;

        let config = ReposConfig::default();
        config.save(path)?;
        HookManager::new(path).ensure_hooks_dir()?;
        fs::write(path.join("uuid"), uuid::Uuid::new_v4().to_string())?;
        // Written last: a directory only counts as a repository once
        // everything else is in place.
        fs::write(path.join("format"), format!("{}\n", FORMAT))?;

        let repos = Self::open(path)?;
        info!(path = %path.display(), uuid = repos.fs.uuid(), "created repository");
        Ok(repos)
    }

    /// Open an existing repository
    pub fn open(path: &Path) -> Result<Self> {
        let format_path = path.join("format");
        let format = match fs::read_to_string(&format_path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotARepository(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        if format.trim() != FORMAT {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
                found: format.trim().to_string(),
            });
        }

        let config = ReposConfig::load(path)?;
        let uuid = fs::read_to_string(path.join("uuid"))?.trim().to_string();
        let storage = DiskStorage::open(&path.join("db"), config.compression_level)?;
        let filesystem = Filesystem::new(
            Box::new(storage),
            uuid,
            &config,
            Some(HookManager::new(path)),
        )?;
        debug!(path = %path.display(), "opened repository");

        Ok(Self {
            path: path.to_path_buf(),
            config,
            fs: filesystem,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ReposConfig {
        &self.config
    }

    pub fn fs(&self) -> &Filesystem {
        &self.fs
    }

    pub fn uuid(&self) -> &str {
        self.fs.uuid()
    }
}

/// Whether `path` holds a repository of a supported format
pub fn is_repository(path: &Path) -> bool {
    fs::read_to_string(path.join("format"))
        .map(|f| f.trim() == FORMAT)
        .unwrap_or(false)
}

/// Find the repository containing `path`: the nearest ancestor-or-self
/// that is a repository.
pub fn find_root_path(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|candidate| is_repository(candidate))
        .map(Path::to_path_buf)
}
