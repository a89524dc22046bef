//! Commit editor
//!
//! `CommitEditor` turns an edit drive into a transaction. Paths are
//! relative to the directory the editor was rooted at. `close_edit`
//! commits and then hands the new revision to the commit hook; after
//! `close_edit` or `abort_edit` every call fails.

use std::collections::HashMap;
use tracing::debug;

use svnlocal_fs::{
    entry_props, path, CommitInfo, Error, NodeKind, Result, Revnum, Txn,
};

use crate::editor::Editor;
use crate::txdelta::TextDelta;

/// Called once with the published revision. It cannot fail: by the time
/// it runs the revision is already visible.
pub type CommitHook<'a> = Box<dyn FnOnce(&CommitInfo) + 'a>;

pub struct CommitEditor<'a> {
    txn: Option<Txn>,
    base_path: String,
    hook: Option<CommitHook<'a>>,
    /// Base revisions of the open directories
    dir_bases: HashMap<String, Option<Revnum>>,
}

impl<'a> CommitEditor<'a> {
    pub fn new(txn: Txn, base_path: &str, hook: CommitHook<'a>) -> Self {
        Self {
            txn: Some(txn),
            base_path: path::canonicalize(base_path),
            hook: Some(hook),
            dir_bases: HashMap::new(),
        }
    }

    fn txn(&mut self) -> Result<&mut Txn> {
        self.txn.as_mut().ok_or(Error::EditorClosed)
    }

    fn fs_path(&self, rel_path: &str) -> String {
        path::join(&self.base_path, rel_path)
    }

    /// Fail if the node changed after the revision the client based its
    /// edit on
    fn check_up_to_date(&mut self, fs_path: &str, base_revision: Option<Revnum>) -> Result<()> {
        let Some(base) = base_revision else {
            return Ok(());
        };
        if let Some(changed) = self.txn()?.created_rev(fs_path)? {
            if base < changed {
                return Err(Error::OutOfDate {
                    path: fs_path.to_string(),
                    base,
                    changed,
                });
            }
        }
        Ok(())
    }

    fn expect_kind(&mut self, fs_path: &str, kind: NodeKind) -> Result<()> {
        match self.txn()?.check_path(fs_path)? {
            NodeKind::None => Err(Error::NotFound(fs_path.to_string())),
            found if found == kind => Ok(()),
            NodeKind::Dir => Err(Error::NotAFile(fs_path.to_string())),
            NodeKind::File => Err(Error::NotADirectory(fs_path.to_string())),
        }
    }

    fn add_node(&mut self, rel_path: &str, copyfrom: Option<(&str, Revnum)>, kind: NodeKind) -> Result<()> {
        let fs_path = self.fs_path(rel_path);
        let txn = self.txn()?;
        match (copyfrom, kind) {
            (Some((from_path, from_rev)), _) => txn.copy(from_rev, from_path, &fs_path),
            (None, NodeKind::Dir) => txn.make_dir(&fs_path),
            (None, _) => txn.make_file(&fs_path),
        }
    }

    fn change_prop(&mut self, rel_path: &str, name: &str, value: Option<&str>) -> Result<()> {
        // Entry properties are derived from history and never stored.
        if entry_props::is_entry_property(name) {
            self.txn()?;
            return Ok(());
        }
        let fs_path = self.fs_path(rel_path);
        self.txn()?
            .change_prop(&fs_path, name, value.map(str::to_string))
    }
}

impl Editor for CommitEditor<'_> {
    fn set_target_revision(&mut self, _revision: Revnum) -> Result<()> {
        self.txn().map(|_| ())
    }

    fn open_root(&mut self, base_revision: Option<Revnum>) -> Result<()> {
        self.txn()?;
        self.dir_bases.insert(String::new(), base_revision);
        Ok(())
    }

    fn delete_entry(&mut self, path: &str, revision: Option<Revnum>) -> Result<()> {
        let fs_path = self.fs_path(path);
        self.check_up_to_date(&fs_path, revision)?;
        self.txn()?.delete(&fs_path)
    }

    fn add_directory(&mut self, path: &str, copyfrom: Option<(&str, Revnum)>) -> Result<()> {
        self.add_node(path, copyfrom, NodeKind::Dir)?;
        self.dir_bases
            .insert(path::canonicalize_relative(path), None);
        Ok(())
    }

    fn open_directory(&mut self, path: &str, base_revision: Option<Revnum>) -> Result<()> {
        let fs_path = self.fs_path(path);
        self.expect_kind(&fs_path, NodeKind::Dir)?;
        self.dir_bases
            .insert(path::canonicalize_relative(path), base_revision);
        Ok(())
    }

    fn change_dir_prop(&mut self, path: &str, name: &str, value: Option<&str>) -> Result<()> {
        let fs_path = self.fs_path(path);
        let base = self
            .dir_bases
            .get(&path::canonicalize_relative(path))
            .copied()
            .flatten();
        if !entry_props::is_entry_property(name) {
            self.check_up_to_date(&fs_path, base)?;
        }
        self.change_prop(path, name, value)
    }

    fn close_directory(&mut self, path: &str) -> Result<()> {
        self.txn()?;
        self.dir_bases.remove(&path::canonicalize_relative(path));
        Ok(())
    }

    fn add_file(&mut self, path: &str, copyfrom: Option<(&str, Revnum)>) -> Result<()> {
        self.add_node(path, copyfrom, NodeKind::File)
    }

    fn open_file(&mut self, path: &str, base_revision: Option<Revnum>) -> Result<()> {
        let fs_path = self.fs_path(path);
        self.expect_kind(&fs_path, NodeKind::File)?;
        self.check_up_to_date(&fs_path, base_revision)
    }

    fn apply_text_delta(
        &mut self,
        path: &str,
        base_checksum: Option<&str>,
        delta: &TextDelta,
    ) -> Result<()> {
        let fs_path = self.fs_path(path);
        let txn = self.txn()?;
        let base = txn.contents(&fs_path)?;
        if let Some(expected) = base_checksum {
            let actual = format!("{:x}", md5::compute(&base));
            if actual != expected {
                return Err(Error::ChecksumMismatch {
                    path: fs_path,
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        let text = delta.apply(&base)?;
        debug!(path = %fs_path, bytes = text.len(), "applied text delta");
        txn.set_contents(&fs_path, text)
    }

    fn change_file_prop(&mut self, path: &str, name: &str, value: Option<&str>) -> Result<()> {
        self.change_prop(path, name, value)
    }

    fn close_file(&mut self, path: &str, text_checksum: Option<&str>) -> Result<()> {
        let fs_path = self.fs_path(path);
        let txn = self.txn()?;
        if let Some(expected) = text_checksum {
            let actual = txn.file_md5(&fs_path)?;
            if actual != expected {
                return Err(Error::ChecksumMismatch {
                    path: fs_path,
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        Ok(())
    }

    fn close_edit(&mut self) -> Result<()> {
        let txn = self.txn.take().ok_or(Error::EditorClosed)?;
        let info = txn.commit()?;
        if let Some(hook) = self.hook.take() {
            hook(&info);
        }
        Ok(())
    }

    fn abort_edit(&mut self) -> Result<()> {
        self.txn.take().ok_or(Error::EditorClosed)?.abort();
        Ok(())
    }
}
