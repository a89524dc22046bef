//! Read-only view of one revision's tree

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::object::{DirEntry, Node, NodeKind, ObjectId, Revnum};
use crate::path;
use crate::properties::{revprops, PropMap};

/// Commit metadata of the revision that last changed a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedInfo {
    pub revision: Revnum,
    pub date: Option<String>,
    pub author: Option<String>,
}

/// Immutable tree of a published revision
#[derive(Debug, Clone)]
pub struct RevisionRoot {
    fs: Filesystem,
    revision: Revnum,
    root: ObjectId,
}

impl RevisionRoot {
    pub(crate) fn new(fs: Filesystem, revision: Revnum, root: ObjectId) -> Self {
        Self { fs, revision, root }
    }

    pub fn revision(&self) -> Revnum {
        self.revision
    }

    pub fn fs(&self) -> &Filesystem {
        &self.fs
    }

    /// Resolve a path to its directory entry. `None` when the path does
    /// not exist, including when it runs through a file.
    pub fn entry(&self, path: &str) -> Result<Option<DirEntry>> {
        let mut current = DirEntry {
            kind: NodeKind::Dir,
            id: self.root,
        };
        for name in path::components(path) {
            if current.kind != NodeKind::Dir {
                return Ok(None);
            }
            let node = self.fs.load_node(&current.id)?;
            match node.as_dir().and_then(|d| d.entries.get(name)) {
                Some(child) => current = *child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn check_path(&self, path: &str) -> Result<NodeKind> {
        Ok(self.entry(path)?.map_or(NodeKind::None, |e| e.kind))
    }

    /// Node id at `path`, `None` when absent
    pub fn node_id(&self, path: &str) -> Result<Option<ObjectId>> {
        Ok(self.entry(path)?.map(|e| e.id))
    }

    pub fn node(&self, path: &str) -> Result<Arc<Node>> {
        let entry = self
            .entry(path)?
            .ok_or_else(|| Error::NotFound(path::canonicalize(path)))?;
        self.fs.load_node(&entry.id)
    }

    pub fn dir_entries(&self, path: &str) -> Result<BTreeMap<String, DirEntry>> {
        let node = self.node(path)?;
        node.as_dir()
            .map(|d| d.entries.clone())
            .ok_or_else(|| Error::NotADirectory(path::canonicalize(path)))
    }

    pub fn file_contents(&self, path: &str) -> Result<Vec<u8>> {
        let node = self.node(path)?;
        let file = node
            .as_file()
            .ok_or_else(|| Error::NotAFile(path::canonicalize(path)))?;
        self.fs.load_blob(&file.content)
    }

    /// File contents as a readable stream
    pub fn file_stream(&self, path: &str) -> Result<Cursor<Vec<u8>>> {
        Ok(Cursor::new(self.file_contents(path)?))
    }

    pub fn file_md5(&self, path: &str) -> Result<String> {
        let node = self.node(path)?;
        node.as_file()
            .map(|f| f.md5.clone())
            .ok_or_else(|| Error::NotAFile(path::canonicalize(path)))
    }

    pub fn file_size(&self, path: &str) -> Result<u64> {
        let node = self.node(path)?;
        node.as_file()
            .map(|f| f.size)
            .ok_or_else(|| Error::NotAFile(path::canonicalize(path)))
    }

    pub fn node_proplist(&self, path: &str) -> Result<PropMap> {
        Ok(self.node(path)?.props().clone())
    }

    /// Revision in which the node at `path` last changed
    pub fn created_rev(&self, path: &str) -> Result<Revnum> {
        Ok(self.node(path)?.created_rev())
    }

    /// Revision, date and author of the last change to `path`
    pub fn committed_info(&self, path: &str) -> Result<CommittedInfo> {
        let revision = self.created_rev(path)?;
        let mut props = self.fs.revision_props(revision)?;
        Ok(CommittedInfo {
            revision,
            date: props.remove(revprops::DATE),
            author: props.remove(revprops::AUTHOR),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Filesystem {
        let fs = Filesystem::in_memory().unwrap();
        let mut txn = fs.begin_txn(0, Some("alice"), "init").unwrap();
        txn.make_dir("/trunk").unwrap();
        txn.make_file("/trunk/a.txt").unwrap();
        txn.set_contents("/trunk/a.txt", b"hello\n".to_vec()).unwrap();
        txn.change_prop("/trunk/a.txt", "svn:eol-style", Some("native".into()))
            .unwrap();
        txn.commit().unwrap();
        fs
    }

    #[test]
    fn test_check_path_kinds() {
        let fs = sample();
        let root = fs.revision_root(1).unwrap();
        assert_eq!(root.check_path("/").unwrap(), NodeKind::Dir);
        assert_eq!(root.check_path("/trunk").unwrap(), NodeKind::Dir);
        assert_eq!(root.check_path("trunk/a.txt").unwrap(), NodeKind::File);
        assert_eq!(root.check_path("/missing").unwrap(), NodeKind::None);
        assert_eq!(root.check_path("/trunk/a.txt/below").unwrap(), NodeKind::None);
    }

    #[test]
    fn test_file_accessors() {
        let fs = sample();
        let root = fs.revision_root(1).unwrap();
        assert_eq!(root.file_contents("/trunk/a.txt").unwrap(), b"hello\n");
        assert_eq!(root.file_size("/trunk/a.txt").unwrap(), 6);
        assert_eq!(
            root.file_md5("/trunk/a.txt").unwrap(),
            format!("{:x}", md5::compute(b"hello\n"))
        );
        assert_eq!(
            root.node_proplist("/trunk/a.txt").unwrap().get("svn:eol-style"),
            Some(&"native".to_string())
        );
        assert!(matches!(root.file_contents("/trunk"), Err(Error::NotAFile(_))));
        assert!(matches!(root.dir_entries("/trunk/a.txt"), Err(Error::NotADirectory(_))));
        assert!(root.node("/nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_committed_info() {
        let fs = sample();
        let root = fs.revision_root(1).unwrap();
        let info = root.committed_info("/trunk/a.txt").unwrap();
        assert_eq!(info.revision, 1);
        assert_eq!(info.author.as_deref(), Some("alice"));
        assert!(info.date.is_some());

        let zero = fs.revision_root(0).unwrap().committed_info("/").unwrap();
        assert_eq!(zero.revision, 0);
        assert_eq!(zero.author, None);
    }
}
