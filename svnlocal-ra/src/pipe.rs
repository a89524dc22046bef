//! Entry property injection
//!
//! `PipeEditor` forwards every call to the editor it wraps. After each
//! root, directory or file is opened or added, it also sends that entry's
//! commit metadata (committed revision, date and last author at the
//! target revision) as entry properties on the same entry.

use tracing::debug;

use svnlocal_fs::{
    entry_props, path, CommittedInfo, Error, Filesystem, Result, RevisionRoot, Revnum,
};
use svnlocal_repos::{Editor, TextDelta};

/// Entry properties describing the last change to a node
pub fn entry_properties(info: &CommittedInfo) -> Vec<(&'static str, String)> {
    let mut props = vec![(entry_props::COMMITTED_REV, info.revision.to_string())];
    if let Some(date) = &info.date {
        props.push((entry_props::COMMITTED_DATE, date.clone()));
    }
    if let Some(author) = &info.author {
        props.push((entry_props::LAST_AUTHOR, author.clone()));
    }
    props
}

pub struct PipeEditor<E> {
    inner: E,
    fs: Filesystem,
    /// Repository path the edit's paths are relative to
    anchor: String,
    /// Entry whose metadata comes from another repository path, for a
    /// single-file switch: `(entry name, destination path)`
    renamed: Option<(String, String)>,
    root: Option<RevisionRoot>,
}

impl<E: Editor> PipeEditor<E> {
    pub fn new(inner: E, fs: Filesystem, anchor: &str) -> Self {
        Self {
            inner,
            fs,
            anchor: path::canonicalize(anchor),
            renamed: None,
            root: None,
        }
    }

    /// Take the metadata of `entry` (and anything below it) from
    /// `destination` instead of from below the anchor
    pub fn with_renamed_entry(mut self, entry: &str, destination: &str) -> Self {
        self.renamed = Some((
            path::canonicalize_relative(entry),
            path::canonicalize(destination),
        ));
        self
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    fn fs_path(&self, rel_path: &str) -> String {
        let rel_path = path::canonicalize_relative(rel_path);
        if let Some((entry, destination)) = &self.renamed {
            if let Some(rest) = path::relative_to(entry, &rel_path) {
                return path::join(destination, rest);
            }
        }
        path::join(&self.anchor, &rel_path)
    }

    fn committed_info(&self, rel_path: &str) -> Result<CommittedInfo> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| Error::Editor("target revision was never set".to_string()))?;
        let fs_path = self.fs_path(rel_path);
        debug!(path = %fs_path, revision = root.revision(), "fetching entry properties");
        root.committed_info(&fs_path)
    }

    fn send_dir_entry_props(&mut self, rel_path: &str) -> Result<()> {
        let info = self.committed_info(rel_path)?;
        for (name, value) in entry_properties(&info) {
            self.inner.change_dir_prop(rel_path, name, Some(&value))?;
        }
        Ok(())
    }

    fn send_file_entry_props(&mut self, rel_path: &str) -> Result<()> {
        let info = self.committed_info(rel_path)?;
        for (name, value) in entry_properties(&info) {
            self.inner.change_file_prop(rel_path, name, Some(&value))?;
        }
        Ok(())
    }
}

impl<E: Editor> Editor for PipeEditor<E> {
    fn set_target_revision(&mut self, revision: Revnum) -> Result<()> {
        self.root = Some(self.fs.revision_root(revision)?);
        self.inner.set_target_revision(revision)
    }

    fn open_root(&mut self, base_revision: Option<Revnum>) -> Result<()> {
        self.inner.open_root(base_revision)?;
        self.send_dir_entry_props("")
    }

    fn delete_entry(&mut self, path: &str, revision: Option<Revnum>) -> Result<()> {
        self.inner.delete_entry(path, revision)
    }

    fn add_directory(&mut self, path: &str, copyfrom: Option<(&str, Revnum)>) -> Result<()> {
        self.inner.add_directory(path, copyfrom)?;
        self.send_dir_entry_props(path)
    }

    fn open_directory(&mut self, path: &str, base_revision: Option<Revnum>) -> Result<()> {
        self.inner.open_directory(path, base_revision)?;
        self.send_dir_entry_props(path)
    }

    fn change_dir_prop(&mut self, path: &str, name: &str, value: Option<&str>) -> Result<()> {
        self.inner.change_dir_prop(path, name, value)
    }

    fn close_directory(&mut self, path: &str) -> Result<()> {
        self.inner.close_directory(path)
    }

    fn add_file(&mut self, path: &str, copyfrom: Option<(&str, Revnum)>) -> Result<()> {
        self.inner.add_file(path, copyfrom)?;
        self.send_file_entry_props(path)
    }

    fn open_file(&mut self, path: &str, base_revision: Option<Revnum>) -> Result<()> {
        self.inner.open_file(path, base_revision)?;
        self.send_file_entry_props(path)
    }

    fn apply_text_delta(
        &mut self,
        path: &str,
        base_checksum: Option<&str>,
        delta: &TextDelta,
    ) -> Result<()> {
        self.inner.apply_text_delta(path, base_checksum, delta)
    }

    fn change_file_prop(&mut self, path: &str, name: &str, value: Option<&str>) -> Result<()> {
        self.inner.change_file_prop(path, name, value)
    }

    fn close_file(&mut self, path: &str, text_checksum: Option<&str>) -> Result<()> {
        self.inner.close_file(path, text_checksum)
    }

    fn close_edit(&mut self) -> Result<()> {
        self.inner.close_edit()
    }

    fn abort_edit(&mut self) -> Result<()> {
        self.inner.abort_edit()
    }
}
