//! Location splitting
//!
//! A `file://` URL names a path on local disk. Some ancestor of that path
//! is a repository; the rest of the path is a location inside it.

use std::path::{Path, PathBuf};
use url::Url;

use svnlocal_fs::{find_root_path, path};

use crate::error::{RaError, Result};

/// Split `url` into the repository's root directory and the in-repository
/// path below it (always absolute, "/" for the repository root).
pub fn split_url(url: &str) -> Result<(PathBuf, String)> {
    let parsed = Url::parse(url).map_err(|e| RaError::invalid_location(url, e.to_string()))?;
    if parsed.scheme() != "file" {
        return Err(RaError::invalid_location(
            url,
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    match parsed.host_str() {
        None | Some("") | Some("localhost") => {}
        Some(host) => {
            return Err(RaError::invalid_location(
                url,
                format!("host '{host}' is not local"),
            ));
        }
    }

    let local = parsed
        .to_file_path()
        .map_err(|()| RaError::invalid_location(url, "not a local path"))?;
    let root = find_root_path(&local)
        .ok_or_else(|| RaError::invalid_location(url, "no repository found along the path"))?;
    let rest = local
        .strip_prefix(&root)
        .map_err(|e| RaError::invalid_location(url, e.to_string()))?;
    let components: Option<Vec<&str>> = rest.components().map(|c| c.as_os_str().to_str()).collect();
    let components =
        components.ok_or_else(|| RaError::invalid_location(url, "path is not valid UTF-8"))?;

    Ok((root, path::canonicalize(&components.join("/"))))
}

/// `file://` URL for `fs_path` inside the repository at `repos_root`
pub fn to_url(repos_root: &Path, fs_path: &str) -> Result<String> {
    let mut local = repos_root.to_path_buf();
    local.extend(path::components(fs_path));
    let url = Url::from_file_path(&local).map_err(|()| {
        RaError::invalid_location(&local.display().to_string(), "not an absolute path")
    })?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use svnlocal_fs::Repository;
    use tempfile::TempDir;

    fn repository() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repos");
        Repository::create(&root).unwrap();
        (tmp, root)
    }

    #[test]
    fn test_split_repository_root() {
        let (_tmp, root) = repository();
        let url = to_url(&root, "/").unwrap();
        let (found, fs_path) = split_url(&url).unwrap();
        assert_eq!(found, root);
        assert_eq!(fs_path, "/");
    }

    #[test]
    fn test_split_inner_path() {
        let (_tmp, root) = repository();
        let url = format!("{}/trunk/src", to_url(&root, "/").unwrap().trim_end_matches('/'));
        let (found, fs_path) = split_url(&url).unwrap();
        assert_eq!(found, root);
        assert_eq!(fs_path, "/trunk/src");
    }

    #[test]
    fn test_split_decodes_escapes() {
        let (_tmp, root) = repository();
        let url = to_url(&root, "/with space").unwrap();
        assert!(url.contains("%20"));
        assert_eq!(split_url(&url).unwrap().1, "/with space");
    }

    #[test]
    fn test_split_rejects_bad_locations() {
        let (tmp, _root) = repository();
        for url in [
            "not a url".to_string(),
            "http://example.com/repos".to_string(),
            "file://elsewhere/repos".to_string(),
            to_url(tmp.path(), "/no-repos-here").unwrap(),
        ] {
            match split_url(&url) {
                Err(RaError::InvalidLocation { url: reported, .. }) => assert_eq!(reported, url),
                other => panic!("expected InvalidLocation for {url}, got {other:?}"),
            }
        }
    }
}
