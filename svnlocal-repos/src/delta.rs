//! Tree comparison driver
//!
//! `DeltaDriver` compares what a client already has (a `ClientState`)
//! against a target revision and drives an `Editor` with the edits that
//! turn one into the other. The walk is a single depth-first pass over
//! entry names in lexical order, so the same inputs always produce the
//! same call sequence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use svnlocal_fs::{
    path, prop_diffs, DirEntry, Error, Filesystem, Node, NodeKind, PropMap, Result, RevisionRoot,
    Revnum,
};

use crate::editor::Editor;
use crate::report::check_target;
use crate::txdelta::TextDelta;

/// The client's claimed tree: for paths relative to the client anchor,
/// either "I have revision R here" (`Some(R)`) or "I have nothing here"
/// (`None`). A path inherits the claim of its nearest claimed ancestor;
/// a path with no claimed ancestor is absent.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    claims: BTreeMap<String, Option<Revnum>>,
}

impl ClientState {
    /// A client that has nothing, as for a fresh checkout
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record a claim, replacing any earlier one for the same path
    pub fn claim(&mut self, rel_path: &str, revision: Option<Revnum>) {
        self.claims
            .insert(path::canonicalize_relative(rel_path), revision);
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Every claimed revision, for validation
    pub fn revisions(&self) -> impl Iterator<Item = Revnum> + '_ {
        self.claims.values().filter_map(|r| *r)
    }

    /// Revision the client has at `rel_path`, from the nearest claim
    pub fn base_of(&self, rel_path: &str) -> Option<Revnum> {
        let mut current = path::canonicalize_relative(rel_path);
        loop {
            if let Some(claim) = self.claims.get(&current) {
                return *claim;
            }
            if current.is_empty() {
                return None;
            }
            current = path::dirname_relative(&current);
        }
    }

    /// Whether anything strictly below `rel_path` is claimed
    pub fn has_claims_below(&self, rel_path: &str) -> bool {
        self.claims
            .keys()
            .any(|p| p != rel_path && path::is_ancestor(rel_path, p))
    }

    /// Names of entries directly below `rel_path` the client claims to have
    fn claimed_children<'a>(&'a self, rel_path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims.iter().filter_map(move |(p, rev)| {
            rev.as_ref()?;
            let rest = path::relative_to(rel_path, p)?;
            (!rest.is_empty() && !rest.contains('/')).then_some(rest)
        })
    }
}

/// What the comparison sends
#[derive(Debug, Clone, Copy)]
pub struct DeltaOptions {
    /// Send file text; otherwise changed files receive an empty delta
    pub text_deltas: bool,
    /// Descend into subdirectories; otherwise only files directly below
    /// the anchor are compared
    pub recurse: bool,
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self {
            text_deltas: true,
            recurse: true,
        }
    }
}

/// Drives an editor with the difference between a client state and a
/// target revision
pub struct DeltaDriver<'a> {
    fs: &'a Filesystem,
    client: &'a ClientState,
    /// Repository path the client's paths are relative to
    source_anchor: String,
    target: &'a RevisionRoot,
    /// Target entry name when the edit is narrowed to one child of the anchor
    target_entry: Option<String>,
    /// Target path compared against the anchor, or against `target_entry`
    target_path: String,
    options: DeltaOptions,
    roots: HashMap<Revnum, RevisionRoot>,
}

impl<'a> DeltaDriver<'a> {
    pub fn new(
        client: &'a ClientState,
        source_anchor: &str,
        target: &'a RevisionRoot,
        target_entry: Option<&str>,
        target_path: &str,
        options: DeltaOptions,
    ) -> Self {
        Self {
            fs: target.fs(),
            client,
            source_anchor: path::canonicalize(source_anchor),
            target,
            target_entry: target_entry
                .map(path::canonicalize_relative)
                .filter(|e| !e.is_empty()),
            target_path: path::canonicalize(target_path),
            options,
            roots: HashMap::new(),
        }
    }

    /// Drive `editor`: opens the root, sends the edits, closes the root
    /// and closes the edit.
    pub fn drive(&mut self, editor: &mut dyn Editor) -> Result<()> {
        if let Some(entry) = self.target_entry.as_deref() {
            check_target(entry)?;
        }
        editor.open_root(self.client.base_of(""))?;

        match self.target_entry.clone() {
            Some(entry) => {
                let source = self.source_entry(&entry)?;
                let target = self.target.entry(&self.target_path)?;
                self.diff_entry(editor, &entry, source, target)?;
            }
            None => {
                let target = self
                    .target
                    .entry(&self.target_path)?
                    .filter(|e| e.kind == NodeKind::Dir)
                    .ok_or_else(|| Error::NotFound(self.target_path.clone()))?;
                let source = self
                    .source_entry("")?
                    .filter(|(e, _)| e.kind == NodeKind::Dir);
                let unchanged = matches!(source, Some((s, _)) if s.id == target.id)
                    && !self.client.has_claims_below("");
                if !unchanged {
                    self.diff_dir_props(editor, "", source.map(|(e, _)| e), &target)?;
                    self.diff_dir_entries(editor, "", source.map(|(e, _)| e), &target)?;
                }
            }
        }

        editor.close_directory("")?;
        editor.close_edit()
    }

    fn root_at(&mut self, revision: Revnum) -> Result<&RevisionRoot> {
        if !self.roots.contains_key(&revision) {
            let root = self.fs.revision_root(revision)?;
            self.roots.insert(revision, root);
        }
        self.roots
            .get(&revision)
            .ok_or(Error::NoSuchRevision(revision))
    }

    /// Entry the client has at `rel_path`, with the revision it has it at
    fn source_entry(&mut self, rel_path: &str) -> Result<Option<(DirEntry, Revnum)>> {
        let Some(revision) = self.client.base_of(rel_path) else {
            return Ok(None);
        };
        let fs_path = path::join(&self.source_anchor, rel_path);
        let entry = self.root_at(revision)?.entry(&fs_path)?;
        Ok(entry.map(|e| (e, revision)))
    }

    fn load(&self, entry: &DirEntry) -> Result<std::sync::Arc<Node>> {
        self.fs.load_node(&entry.id)
    }

    fn skipped(&self, kind: NodeKind) -> bool {
        !self.options.recurse && kind == NodeKind::Dir
    }

    fn diff_entry(
        &mut self,
        editor: &mut dyn Editor,
        rel_path: &str,
        source: Option<(DirEntry, Revnum)>,
        target: Option<DirEntry>,
    ) -> Result<()> {
        match (source, target) {
            (None, None) => Ok(()),
            (Some((_, revision)), None) => editor.delete_entry(rel_path, Some(revision)),
            (None, Some(target)) => self.add_entry(editor, rel_path, &target),
            (Some((source, revision)), Some(target)) if source.kind != target.kind => {
                editor.delete_entry(rel_path, Some(revision))?;
                self.add_entry(editor, rel_path, &target)
            }
            (Some((source, revision)), Some(target)) => {
                if source.id == target.id && !self.client.has_claims_below(rel_path) {
                    return Ok(());
                }
                match target.kind {
                    NodeKind::Dir => {
                        editor.open_directory(rel_path, Some(revision))?;
                        self.diff_dir_props(editor, rel_path, Some(source), &target)?;
                        self.diff_dir_entries(editor, rel_path, Some(source), &target)?;
                        editor.close_directory(rel_path)
                    }
                    _ => {
                        editor.open_file(rel_path, Some(revision))?;
                        self.send_file(editor, rel_path, Some(&source), &target)
                    }
                }
            }
        }
    }

    fn add_entry(&mut self, editor: &mut dyn Editor, rel_path: &str, target: &DirEntry) -> Result<()> {
        match target.kind {
            NodeKind::Dir => {
                editor.add_directory(rel_path, None)?;
                self.diff_dir_props(editor, rel_path, None, target)?;
                let node = self.load(target)?;
                if let Some(dir) = node.as_dir() {
                    for (name, child) in &dir.entries {
                        if self.skipped(child.kind) {
                            continue;
                        }
                        let child_path = path::join_relative(rel_path, name);
                        self.add_entry(editor, &child_path, child)?;
                    }
                }
                editor.close_directory(rel_path)
            }
            _ => {
                editor.add_file(rel_path, None)?;
                self.send_file(editor, rel_path, None, target)
            }
        }
    }

    fn diff_dir_props(
        &self,
        editor: &mut dyn Editor,
        rel_path: &str,
        source: Option<DirEntry>,
        target: &DirEntry,
    ) -> Result<()> {
        let source_props = match source {
            Some(source) => self.load(&source)?.props().clone(),
            None => PropMap::new(),
        };
        let target_node = self.load(target)?;
        for change in prop_diffs(&source_props, target_node.props()) {
            editor.change_dir_prop(rel_path, &change.name, change.value.as_deref())?;
        }
        Ok(())
    }

    fn diff_dir_entries(
        &mut self,
        editor: &mut dyn Editor,
        rel_path: &str,
        source: Option<DirEntry>,
        target: &DirEntry,
    ) -> Result<()> {
        let target_entries = match self.load(target)?.as_dir() {
            Some(dir) => dir.entries.clone(),
            None => BTreeMap::new(),
        };
        let mut names: BTreeSet<String> = target_entries.keys().cloned().collect();
        if let Some(source) = source {
            if let Some(dir) = self.load(&source)?.as_dir() {
                names.extend(dir.entries.keys().cloned());
            }
        }
        names.extend(self.client.claimed_children(rel_path).map(str::to_string));

        for name in names {
            let child_path = path::join_relative(rel_path, &name);
            let source = self.source_entry(&child_path)?;
            let target = target_entries.get(&name).copied();

            if !self.options.recurse {
                self.diff_shallow_entry(editor, &child_path, source, target)?;
                continue;
            }
            self.diff_entry(editor, &child_path, source, target)?;
        }
        Ok(())
    }

    /// `diff_entry` for a walk that leaves directories out. A kind change
    /// still deletes the old entry; only the directory side is skipped.
    fn diff_shallow_entry(
        &mut self,
        editor: &mut dyn Editor,
        rel_path: &str,
        source: Option<(DirEntry, Revnum)>,
        target: Option<DirEntry>,
    ) -> Result<()> {
        let source_kind = source.map(|(e, _)| e.kind);
        let target_kind = target.map(|e| e.kind);
        let has_dir = source_kind == Some(NodeKind::Dir) || target_kind == Some(NodeKind::Dir);
        if !has_dir {
            return self.diff_entry(editor, rel_path, source, target);
        }
        match (source, target) {
            (Some((source, revision)), Some(target)) if source.kind != target.kind => {
                editor.delete_entry(rel_path, Some(revision))?;
                if target.kind == NodeKind::File {
                    self.add_entry(editor, rel_path, &target)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Props, text and close for a file being added (`source == None`) or
    /// opened
    fn send_file(
        &self,
        editor: &mut dyn Editor,
        rel_path: &str,
        source: Option<&DirEntry>,
        target: &DirEntry,
    ) -> Result<()> {
        let target_node = self.load(target)?;
        let target_file = target_node
            .as_file()
            .ok_or_else(|| Error::NotAFile(rel_path.to_string()))?;

        let source_node = source.map(|s| self.load(s)).transpose()?;
        let source_file = source_node.as_deref().and_then(Node::as_file);

        let empty = PropMap::new();
        let source_props = source_file.map_or(&empty, |f| &f.props);
        for change in prop_diffs(source_props, &target_file.props) {
            editor.change_file_prop(rel_path, &change.name, change.value.as_deref())?;
        }

        let text_changed = source_file.is_none_or(|f| f.content != target_file.content);
        if text_changed {
            let base_checksum = source_file.map(|f| f.md5.as_str());
            let delta = if self.options.text_deltas {
                let source_text = match source_file {
                    Some(f) => self.fs.load_blob(&f.content)?,
                    None => Vec::new(),
                };
                let target_text = self.fs.load_blob(&target_file.content)?;
                TextDelta::compute(&source_text, &target_text)
            } else {
                TextDelta::empty()
            };
            debug!(path = rel_path, new_bytes = delta.new_data_len(), "sending text delta");
            editor.apply_text_delta(rel_path, base_checksum, &delta)?;
        }

        editor.close_file(rel_path, Some(&target_file.md5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{EditOp, RecordingEditor};

    #[test]
    fn test_client_state_inheritance() {
        let mut client = ClientState::empty();
        assert_eq!(client.base_of("a/b"), None);

        client.claim("", Some(3));
        client.claim("a", Some(5));
        client.claim("a/gone", None);
        client.claim("/a/", Some(6));

        assert_eq!(client.base_of(""), Some(3));
        assert_eq!(client.base_of("x/y"), Some(3));
        assert_eq!(client.base_of("a/b/c"), Some(6));
        assert_eq!(client.base_of("a/gone/deeper"), None);
        assert!(client.has_claims_below(""));
        assert!(client.has_claims_below("a"));
        assert!(!client.has_claims_below("x"));
        assert_eq!(client.claimed_children("").collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_checkout_of_empty_revision() {
        let fs = Filesystem::in_memory().unwrap();
        let target = fs.revision_root(0).unwrap();
        let client = ClientState::empty();
        let mut editor = RecordingEditor::new();
        DeltaDriver::new(&client, "/", &target, None, "/", DeltaOptions::default())
            .drive(&mut editor)
            .unwrap();
        assert_eq!(
            editor.ops,
            vec![
                EditOp::OpenRoot { base_revision: None },
                EditOp::CloseDirectory { path: String::new() },
                EditOp::CloseEdit,
            ]
        );
    }

    #[test]
    fn test_missing_anchor_is_an_error() {
        let fs = Filesystem::in_memory().unwrap();
        let target = fs.revision_root(0).unwrap();
        let client = ClientState::empty();
        let mut editor = RecordingEditor::new();
        let result = DeltaDriver::new(&client, "/nope", &target, None, "/nope", DeltaOptions::default())
            .drive(&mut editor);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
