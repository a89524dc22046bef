//! svnlocal repository access
//!
//! The `ra_local` access method: sessions on repositories reachable
//! through `file://` URLs, driven in-process.
//!
//! ```ignore
//! let plugin = svnlocal_ra::init();
//! let session = plugin.open("file:///srv/repos/trunk", &SystemAuth)?;
//! println!("youngest is r{}", session.latest_revision()?);
//! ```

pub mod auth;
pub mod commit;
pub mod error;
pub mod file;
pub mod location;
pub mod pipe;
pub mod session;

pub use auth::{AuthProvider, StaticAuth, SystemAuth};
pub use commit::CommitSlots;
pub use error::{RaError, Result};
pub use file::{FetchedFile, CHUNK_SIZE};
pub use location::{split_url, to_url};
pub use pipe::PipeEditor;
pub use session::{LocalSession, LogReceiver, RaSession, Reporter};

/// The local access method
#[derive(Debug, Clone, Copy, Default)]
pub struct RaPlugin;

impl RaPlugin {
    pub const NAME: &'static str = "ra_local";
    pub const DESCRIPTION: &'static str = "Module for accessing a repository on local disk.";
    pub const SCHEMES: &'static [&'static str] = &["file"];

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    /// URL schemes this access method handles
    pub fn schemes(&self) -> &'static [&'static str] {
        Self::SCHEMES
    }

    pub fn handles(&self, url: &str) -> bool {
        url.split_once("://")
            .is_some_and(|(scheme, _)| Self::SCHEMES.contains(&scheme))
    }

    /// Open a session on `url`, acting as the user `auth` names
    pub fn open(&self, url: &str, auth: &dyn AuthProvider) -> Result<Box<dyn RaSession>> {
        Ok(Box::new(LocalSession::open(url, auth)?))
    }
}

/// Construct the access method
pub fn init() -> RaPlugin {
    RaPlugin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_identity() {
        let plugin = init();
        assert_eq!(plugin.name(), "ra_local");
        assert_eq!(plugin.schemes(), &["file"]);
        assert!(plugin.handles("file:///tmp/repos"));
        assert!(!plugin.handles("svn://host/repos"));
        assert!(!plugin.handles("/tmp/repos"));
    }

    #[test]
    fn test_open_missing_repository() {
        let tmp = tempfile::TempDir::new().unwrap();
        let url = to_url(tmp.path(), "/nothing").unwrap();
        let result = init().open(&url, &StaticAuth::new("alice"));
        assert!(matches!(result, Err(RaError::InvalidLocation { .. })));
    }
}
