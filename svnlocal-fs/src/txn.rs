//! Write transactions
//!
//! A `Txn` holds a mutable copy-on-write image of its base revision's tree.
//! Nodes are loaded ("thawed") only when something below or at them is
//! written; untouched subtrees stay as references to stored objects, so
//! freezing the txn only writes the nodes that actually changed.
//!
//! `commit` publishes the txn as the next revision. When other commits
//! landed after the base revision, the txn's change list is replayed on top
//! of the youngest tree, failing with a conflict if any changed path was
//! also changed there.

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::object::{
    ChangeAction, ChangedPath, DirEntry, DirNode, FileNode, Node, NodeKind, ObjectId,
    RevisionRecord, Revnum,
};
use crate::path;
use crate::properties::{format_date, revprops, PropMap};
use crate::root::RevisionRoot;

/// Identity of a freshly published revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub revision: Revnum,
    pub date: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
struct TxnFile {
    data: Vec<u8>,
    props: PropMap,
    /// Created revision of the node this was thawed from
    created_rev: Option<Revnum>,
}

#[derive(Debug, Clone, Default)]
struct TxnDir {
    entries: BTreeMap<String, TxnEntry>,
    props: PropMap,
    created_rev: Option<Revnum>,
}

#[derive(Debug, Clone)]
enum TxnEntry {
    Stored(DirEntry),
    File(TxnFile),
    Dir(TxnDir),
}

enum NodeMut<'a> {
    File(&'a mut TxnFile),
    Dir(&'a mut TxnDir),
}

enum Located<'a> {
    Stored(DirEntry),
    File(&'a TxnFile),
    Dir(&'a TxnDir),
}

impl Located<'_> {
    fn to_entry(&self) -> TxnEntry {
        match self {
            Located::Stored(e) => TxnEntry::Stored(*e),
            Located::File(f) => TxnEntry::File((*f).clone()),
            Located::Dir(d) => TxnEntry::Dir((*d).clone()),
        }
    }

    fn kind(&self) -> NodeKind {
        match self {
            Located::Stored(e) => e.kind,
            Located::File(_) => NodeKind::File,
            Located::Dir(_) => NodeKind::Dir,
        }
    }
}

impl TxnEntry {
    fn thaw(&mut self, fs: &Filesystem) -> Result<()> {
        if let TxnEntry::Stored(entry) = *self {
            let node = fs.load_node(&entry.id)?;
            *self = match &*node {
                Node::Dir(dir) => TxnEntry::Dir(TxnDir::from_node(dir)),
                Node::File(file) => TxnEntry::File(TxnFile {
                    data: fs.load_blob(&file.content)?,
                    props: file.props.clone(),
                    created_rev: Some(file.created_rev),
                }),
            };
        }
        Ok(())
    }

    fn freeze(self, fs: &Filesystem, rev: Revnum) -> Result<DirEntry> {
        match self {
            TxnEntry::Stored(entry) => Ok(entry),
            TxnEntry::Dir(dir) => Ok(DirEntry {
                kind: NodeKind::Dir,
                id: dir.freeze(fs, rev)?,
            }),
            TxnEntry::File(file) => {
                let size = file.data.len() as u64;
                let md5 = format!("{:x}", md5::compute(&file.data));
                let content = fs.store_blob(file.data)?;
                let id = fs.store_node(Node::File(FileNode {
                    content,
                    size,
                    md5,
                    props: file.props,
                    created_rev: rev,
                }))?;
                Ok(DirEntry {
                    kind: NodeKind::File,
                    id,
                })
            }
        }
    }
}

impl TxnDir {
    fn from_node(dir: &DirNode) -> Self {
        Self {
            entries: dir
                .entries
                .iter()
                .map(|(name, entry)| (name.clone(), TxnEntry::Stored(*entry)))
                .collect(),
            props: dir.props.clone(),
            created_rev: Some(dir.created_rev),
        }
    }

    fn thawed(fs: &Filesystem, id: &ObjectId) -> Result<Self> {
        let node = fs.load_node(id)?;
        node.as_dir()
            .map(Self::from_node)
            .ok_or_else(|| Error::Corrupt(format!("root object {} is not a directory", id)))
    }

    /// Walk to the directory at `dir_path`, thawing every step
    fn dir_mut<'a>(&'a mut self, fs: &Filesystem, dir_path: &str) -> Result<&'a mut TxnDir> {
        let mut dir = self;
        let mut walked = String::from("/");
        for name in path::components(dir_path) {
            walked = path::join(&walked, name);
            let entry = dir
                .entries
                .get_mut(name)
                .ok_or_else(|| Error::NotFound(walked.clone()))?;
            entry.thaw(fs)?;
            dir = match entry {
                TxnEntry::Dir(d) => d,
                _ => return Err(Error::NotADirectory(walked)),
            };
        }
        Ok(dir)
    }

    fn node_mut<'a>(&'a mut self, fs: &Filesystem, node_path: &str) -> Result<NodeMut<'a>> {
        let name = path::basename(node_path);
        if name.is_empty() {
            return Ok(NodeMut::Dir(self));
        }
        let parent = self.dir_mut(fs, &path::dirname(node_path))?;
        let entry = parent
            .entries
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(node_path.to_string()))?;
        entry.thaw(fs)?;
        match entry {
            TxnEntry::File(f) => Ok(NodeMut::File(f)),
            TxnEntry::Dir(d) => Ok(NodeMut::Dir(d)),
            TxnEntry::Stored(_) => Err(Error::Corrupt(format!("failed to load '{}'", node_path))),
        }
    }

    /// Insert a new entry; fails if something is already there
    fn insert(&mut self, fs: &Filesystem, node_path: &str, entry: TxnEntry) -> Result<()> {
        let name = path::basename(node_path);
        if name.is_empty() {
            return Err(Error::AlreadyExists(node_path.to_string()));
        }
        let parent = self.dir_mut(fs, &path::dirname(node_path))?;
        if parent.entries.contains_key(name) {
            return Err(Error::AlreadyExists(node_path.to_string()));
        }
        parent.entries.insert(name.to_string(), entry);
        Ok(())
    }

    /// Insert or replace an entry
    fn put(&mut self, fs: &Filesystem, node_path: &str, entry: TxnEntry) -> Result<()> {
        let name = path::basename(node_path);
        let parent = self.dir_mut(fs, &path::dirname(node_path))?;
        parent.entries.insert(name.to_string(), entry);
        Ok(())
    }

    fn remove(&mut self, fs: &Filesystem, node_path: &str) -> Result<TxnEntry> {
        let name = path::basename(node_path);
        if name.is_empty() {
            return Err(Error::Editor("cannot delete the repository root".to_string()));
        }
        let parent = self.dir_mut(fs, &path::dirname(node_path))?;
        parent
            .entries
            .remove(name)
            .ok_or_else(|| Error::NotFound(node_path.to_string()))
    }

    fn freeze(self, fs: &Filesystem, rev: Revnum) -> Result<ObjectId> {
        let mut entries = BTreeMap::new();
        for (name, entry) in self.entries {
            entries.insert(name, entry.freeze(fs, rev)?);
        }
        fs.store_node(Node::Dir(DirNode {
            entries,
            props: self.props,
            created_rev: rev,
        }))
    }
}

/// A mutable transaction against a revisioned filesystem
pub struct Txn {
    fs: Filesystem,
    base_rev: Revnum,
    base_root: ObjectId,
    author: Option<String>,
    log: String,
    root: TxnDir,
    changes: BTreeMap<String, ChangedPath>,
}

impl Txn {
    pub(crate) fn new(
        fs: Filesystem,
        base_rev: Revnum,
        base_root: ObjectId,
        author: Option<String>,
        log: String,
    ) -> Result<Self> {
        let root = TxnDir::thawed(&fs, &base_root)?;
        debug!(base_rev, "began transaction");
        Ok(Self {
            fs,
            base_rev,
            base_root,
            author,
            log,
            root,
            changes: BTreeMap::new(),
        })
    }

    pub fn base_revision(&self) -> Revnum {
        self.base_rev
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn fs(&self) -> &Filesystem {
        &self.fs
    }

    /// Paths changed so far
    pub fn changes(&self) -> &BTreeMap<String, ChangedPath> {
        &self.changes
    }

    fn locate(&self, node_path: &str) -> Result<Option<Located<'_>>> {
        let mut current = Located::Dir(&self.root);
        for name in path::components(node_path) {
            current = match current {
                Located::Dir(dir) => match dir.entries.get(name) {
                    None => return Ok(None),
                    Some(TxnEntry::Stored(e)) => Located::Stored(*e),
                    Some(TxnEntry::File(f)) => Located::File(f),
                    Some(TxnEntry::Dir(d)) => Located::Dir(d),
                },
                Located::Stored(e) if e.kind == NodeKind::Dir => {
                    let node = self.fs.load_node(&e.id)?;
                    match node.as_dir().and_then(|d| d.entries.get(name)) {
                        Some(child) => Located::Stored(*child),
                        None => return Ok(None),
                    }
                }
                _ => return Ok(None),
            };
        }
        Ok(Some(current))
    }

    fn located(&self, node_path: &str) -> Result<Located<'_>> {
        self.locate(node_path)?
            .ok_or_else(|| Error::NotFound(path::canonicalize(node_path)))
    }

    pub fn check_path(&self, node_path: &str) -> Result<NodeKind> {
        Ok(self.locate(node_path)?.map_or(NodeKind::None, |l| l.kind()))
    }

    /// Revision the node at `node_path` was last changed in before this
    /// txn; `None` for nodes added by the txn.
    pub fn created_rev(&self, node_path: &str) -> Result<Option<Revnum>> {
        match self.located(node_path)? {
            Located::Stored(e) => Ok(Some(self.fs.load_node(&e.id)?.created_rev())),
            Located::File(f) => Ok(f.created_rev),
            Located::Dir(d) => Ok(d.created_rev),
        }
    }

    pub fn contents(&self, node_path: &str) -> Result<Vec<u8>> {
        match self.located(node_path)? {
            Located::File(f) => Ok(f.data.clone()),
            Located::Stored(e) if e.kind == NodeKind::File => {
                let node = self.fs.load_node(&e.id)?;
                match node.as_file() {
                    Some(file) => self.fs.load_blob(&file.content),
                    None => Err(Error::Corrupt(format!("'{}' is not a file node", node_path))),
                }
            }
            _ => Err(Error::NotAFile(path::canonicalize(node_path))),
        }
    }

    pub fn file_md5(&self, node_path: &str) -> Result<String> {
        Ok(format!("{:x}", md5::compute(self.contents(node_path)?)))
    }

    pub fn node_props(&self, node_path: &str) -> Result<PropMap> {
        match self.located(node_path)? {
            Located::File(f) => Ok(f.props.clone()),
            Located::Dir(d) => Ok(d.props.clone()),
            Located::Stored(e) => Ok(self.fs.load_node(&e.id)?.props().clone()),
        }
    }

    pub fn make_dir(&mut self, node_path: &str) -> Result<()> {
        let node_path = path::canonicalize(node_path);
        self.root
            .insert(&self.fs, &node_path, TxnEntry::Dir(TxnDir::default()))?;
        self.record_change(&node_path, ChangeAction::Added, None);
        Ok(())
    }

    pub fn make_file(&mut self, node_path: &str) -> Result<()> {
        let node_path = path::canonicalize(node_path);
        let file = TxnFile {
            data: Vec::new(),
            props: PropMap::new(),
            created_rev: None,
        };
        self.root.insert(&self.fs, &node_path, TxnEntry::File(file))?;
        self.record_change(&node_path, ChangeAction::Added, None);
        Ok(())
    }

    /// Copy `from_path@from_rev` to `to_path`
    pub fn copy(&mut self, from_rev: Revnum, from_path: &str, to_path: &str) -> Result<()> {
        let from_path = path::canonicalize(from_path);
        let to_path = path::canonicalize(to_path);
        let source = self.fs.revision_root(from_rev)?;
        let entry = source
            .entry(&from_path)?
            .ok_or_else(|| Error::NotFound(from_path.clone()))?;

        // Thaw the copy's top node so it is re-frozen with the new revision.
        let mut entry = TxnEntry::Stored(entry);
        entry.thaw(&self.fs)?;
        self.root.insert(&self.fs, &to_path, entry)?;
        self.record_change(&to_path, ChangeAction::Added, Some((from_path, from_rev)));
        Ok(())
    }

    pub fn delete(&mut self, node_path: &str) -> Result<()> {
        let node_path = path::canonicalize(node_path);
        self.root.remove(&self.fs, &node_path)?;
        self.record_change(&node_path, ChangeAction::Deleted, None);
        Ok(())
    }

    pub fn set_contents(&mut self, node_path: &str, data: Vec<u8>) -> Result<()> {
        let node_path = path::canonicalize(node_path);
        match self.root.node_mut(&self.fs, &node_path)? {
            NodeMut::File(file) => file.data = data,
            NodeMut::Dir(_) => return Err(Error::NotAFile(node_path)),
        }
        self.record_change(&node_path, ChangeAction::Modified, None);
        Ok(())
    }

    /// Set (`Some`) or remove (`None`) a node property
    pub fn change_prop(&mut self, node_path: &str, name: &str, value: Option<String>) -> Result<()> {
        let node_path = path::canonicalize(node_path);
        let props = match self.root.node_mut(&self.fs, &node_path)? {
            NodeMut::File(file) => &mut file.props,
            NodeMut::Dir(dir) => &mut dir.props,
        };
        match value {
            Some(value) => {
                props.insert(name.to_string(), value);
            }
            None => {
                props.remove(name);
            }
        }
        self.record_change(&node_path, ChangeAction::Modified, None);
        Ok(())
    }

    fn record_change(&mut self, node_path: &str, action: ChangeAction, copyfrom: Option<(String, Revnum)>) {
        let under_added = self.changes.iter().any(|(p, c)| {
            p != node_path
                && path::is_ancestor(p, node_path)
                && matches!(c.action, ChangeAction::Added | ChangeAction::Replaced)
        });
        let previous = self.changes.get(node_path).map(|c| c.action);

        match action {
            ChangeAction::Modified => {
                if !under_added {
                    self.changes
                        .entry(node_path.to_string())
                        .or_insert(ChangedPath { action, copyfrom });
                }
            }
            ChangeAction::Deleted => {
                self.changes.retain(|p, _| !path::is_ancestor(node_path, p));
                if !under_added && previous != Some(ChangeAction::Added) {
                    self.changes
                        .insert(node_path.to_string(), ChangedPath { action, copyfrom });
                }
            }
            ChangeAction::Added | ChangeAction::Replaced => {
                let action = match previous {
                    Some(ChangeAction::Deleted) => ChangeAction::Replaced,
                    _ => action,
                };
                self.changes
                    .insert(node_path.to_string(), ChangedPath { action, copyfrom });
            }
        }
    }

    /// Replay this txn's changes on top of revision `youngest`
    fn rebase(&self, youngest: Revnum) -> Result<TxnDir> {
        let base = RevisionRoot::new(self.fs.clone(), self.base_rev, self.base_root);
        let head = self.fs.revision_root(youngest)?;
        let mut tree = TxnDir::thawed(&self.fs, &self.fs.revision_record(youngest)?.root)?;
        let mut covered: Vec<&str> = Vec::new();

        for (node_path, change) in &self.changes {
            if covered.iter().any(|c| path::is_ancestor(c, node_path)) {
                continue;
            }
            let conflicted = || Error::Conflict {
                path: node_path.clone(),
            };
            let conflict = |e: Error| match e {
                Error::NotFound(_) | Error::NotADirectory(_) | Error::AlreadyExists(_) => conflicted(),
                other => other,
            };
            let ours = self.locate(node_path)?;

            if let (ChangeAction::Modified, Some(Located::Dir(dir))) = (change.action, &ours) {
                // Directory modifications are property changes; entries
                // below them carry their own records.
                let base_props = base.node(node_path)?.props().clone();
                let head_props = head.node(node_path).map_err(conflict)?.props().clone();
                if head_props != base_props {
                    return Err(conflicted());
                }
                match tree.node_mut(&self.fs, node_path).map_err(conflict)? {
                    NodeMut::Dir(target) => target.props = dir.props.clone(),
                    NodeMut::File(_) => return Err(conflicted()),
                }
                continue;
            }

            if base.node_id(node_path)? != head.node_id(node_path)? {
                return Err(conflicted());
            }
            match (change.action, ours) {
                (ChangeAction::Deleted, _) => {
                    tree.remove(&self.fs, node_path).map_err(conflict)?;
                }
                (action, Some(located)) => {
                    tree.put(&self.fs, node_path, located.to_entry())
                        .map_err(conflict)?;
                    if matches!(action, ChangeAction::Added | ChangeAction::Replaced) {
                        covered.push(node_path);
                    }
                }
                (_, None) => {
                    return Err(Error::Corrupt(format!(
                        "changed path '{}' missing from transaction",
                        node_path
                    )));
                }
            }
        }
        debug!(base_rev = self.base_rev, youngest, "rebased transaction");
        Ok(tree)
    }

    /// Publish the transaction as a new revision
    pub fn commit(self) -> Result<CommitInfo> {
        if let Some(hooks) = self.fs.hooks() {
            hooks.run_pre_commit(self.base_rev, self.author.as_deref(), &self.log, &self.changes)?;
        }

        loop {
            let youngest = self.fs.youngest()?;
            let tree = if youngest == self.base_rev {
                self.root.clone()
            } else {
                self.rebase(youngest)?
            };
            let revision = youngest + 1;
            let root = tree.freeze(&self.fs, revision)?;

            let date = format_date(&Utc::now());
            let mut props = PropMap::new();
            props.insert(revprops::DATE.to_string(), date.clone());
            props.insert(revprops::LOG.to_string(), self.log.clone());
            if let Some(author) = &self.author {
                props.insert(revprops::AUTHOR.to_string(), author.clone());
            }
            let record = RevisionRecord {
                revision,
                root,
                props,
                changes: self.changes.clone(),
            };

            if !self.fs.claim_revision(&record)? {
                debug!(revision, "revision taken by a concurrent commit, retrying");
                continue;
            }
            info!(revision, author = ?self.author, "committed revision");

            if let Some(hooks) = self.fs.hooks() {
                hooks.run_post_commit(revision, self.author.as_deref(), &self.log, &date);
            }
            return Ok(CommitInfo {
                revision,
                date: Some(date),
                author: self.author,
            });
        }
    }

    /// Discard the transaction
    pub fn abort(self) {
        debug!(base_rev = self.base_rev, "aborted transaction");
    }
}
