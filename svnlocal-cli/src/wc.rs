//! Working copies
//!
//! A working copy is a plain directory tree plus a `.svnlocal` state
//! file recording where it came from and which revision it is at.
//! `WcWriter` is the editor that materialises edits into the tree.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use svnlocal_fs::{Error, Revnum};
use svnlocal_repos::{Editor, TextDelta};

/// Name of the state file at the top of a working copy
pub const STATE_FILE: &str = ".svnlocal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WcState {
    pub url: String,
    pub revision: Revnum,
    /// False for a checkout that skipped subdirectories
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    /// Every versioned path, relative to the working copy root
    pub entries: BTreeSet<String>,
}

fn default_recursive() -> bool {
    true
}

impl WcState {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(STATE_FILE);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("{} is not a working copy", dir.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(STATE_FILE);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Versioned paths that are no longer on disk
    pub fn missing(&self, dir: &Path) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| !dir.join(entry).exists())
            .cloned()
            .collect()
    }
}

/// Editor writing into a working copy directory
#[derive(Debug)]
pub struct WcWriter {
    root: PathBuf,
    pub entries: BTreeSet<String>,
    pub target_revision: Option<Revnum>,
    /// Counts of added, updated and deleted paths
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl WcWriter {
    pub fn new(root: &Path, entries: BTreeSet<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            entries,
            target_revision: None,
            added: 0,
            updated: 0,
            deleted: 0,
        }
    }

    fn local(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Editor for WcWriter {
    fn set_target_revision(&mut self, revision: Revnum) -> svnlocal_fs::Result<()> {
        self.target_revision = Some(revision);
        Ok(())
    }

    fn open_root(&mut self, _base_revision: Option<Revnum>) -> svnlocal_fs::Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn delete_entry(&mut self, path: &str, _revision: Option<Revnum>) -> svnlocal_fs::Result<()> {
        let local = self.local(path);
        let removed = if local.is_dir() {
            fs::remove_dir_all(&local)
        } else {
            fs::remove_file(&local)
        };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let prefix = format!("{path}/");
        self.entries.retain(|e| e != path && !e.starts_with(&prefix));
        self.deleted += 1;
        debug!(path, "deleted");
        Ok(())
    }

    fn add_directory(&mut self, path: &str, _copyfrom: Option<(&str, Revnum)>) -> svnlocal_fs::Result<()> {
        fs::create_dir_all(self.local(path))?;
        self.entries.insert(path.to_string());
        self.added += 1;
        Ok(())
    }

    fn add_file(&mut self, path: &str, _copyfrom: Option<(&str, Revnum)>) -> svnlocal_fs::Result<()> {
        self.entries.insert(path.to_string());
        self.added += 1;
        Ok(())
    }

    fn open_file(&mut self, _path: &str, _base_revision: Option<Revnum>) -> svnlocal_fs::Result<()> {
        self.updated += 1;
        Ok(())
    }

    fn apply_text_delta(
        &mut self,
        path: &str,
        base_checksum: Option<&str>,
        delta: &TextDelta,
    ) -> svnlocal_fs::Result<()> {
        let local = self.local(path);
        let base = match fs::read(&local) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        if let Some(expected) = base_checksum {
            let actual = format!("{:x}", md5::compute(&base));
            if actual != expected {
                return Err(Error::ChecksumMismatch {
                    path: path.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        fs::write(&local, delta.apply(&base)?)?;
        Ok(())
    }

    fn close_file(&mut self, path: &str, text_checksum: Option<&str>) -> svnlocal_fs::Result<()> {
        let local = self.local(path);
        if !local.exists() {
            fs::write(&local, b"")?;
        }
        if let Some(expected) = text_checksum {
            let actual = format!("{:x}", md5::compute(fs::read(&local)?));
            if actual != expected {
                return Err(Error::ChecksumMismatch {
                    path: path.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn md5_hex(data: &[u8]) -> String {
        format!("{:x}", md5::compute(data))
    }

    #[test]
    fn test_writer_materialises_edits() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("wc");
        let mut writer = WcWriter::new(&root, BTreeSet::new());

        writer.set_target_revision(1).unwrap();
        writer.open_root(None).unwrap();
        writer.add_directory("dir", None).unwrap();
        writer.add_file("dir/f", None).unwrap();
        writer
            .apply_text_delta("dir/f", None, &TextDelta::compute(b"", b"hello\n"))
            .unwrap();
        writer.close_file("dir/f", Some(&md5_hex(b"hello\n"))).unwrap();
        assert_eq!(fs::read(root.join("dir/f")).unwrap(), b"hello\n");

        writer.open_file("dir/f", Some(1)).unwrap();
        writer
            .apply_text_delta(
                "dir/f",
                Some(&md5_hex(b"hello\n")),
                &TextDelta::compute(b"hello\n", b"hello world\n"),
            )
            .unwrap();
        assert_eq!(fs::read(root.join("dir/f")).unwrap(), b"hello world\n");

        writer.delete_entry("dir", Some(1)).unwrap();
        assert!(!root.join("dir").exists());
        assert!(writer.entries.is_empty());
        assert_eq!((writer.added, writer.updated, writer.deleted), (2, 1, 1));
        assert_eq!(writer.target_revision, Some(1));
    }

    #[test]
    fn test_writer_detects_local_changes() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("f"), b"edited locally").unwrap();
        let mut writer = WcWriter::new(tmp.path(), BTreeSet::new());
        let result = writer.apply_text_delta(
            "f",
            Some(&md5_hex(b"pristine")),
            &TextDelta::compute(b"pristine", b"new"),
        );
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_state_round_trip_and_missing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("present"), b"").unwrap();
        let state = WcState {
            url: "file:///srv/repos".to_string(),
            revision: 4,
            recursive: true,
            entries: ["present", "gone"].iter().map(|s| s.to_string()).collect(),
        };
        state.save(tmp.path()).unwrap();
        let loaded = WcState::load(tmp.path()).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.missing(tmp.path()), vec!["gone".to_string()]);
    }
}
