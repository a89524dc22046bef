//! Core object model for the snapshot store
//!
//! Every revision is an immutable tree of content-addressed objects:
//! file contents live in `Blob`s, files and directories are `Node`s that
//! carry their properties and the revision they were last changed in, and
//! each published revision is described by a `RevisionRecord`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::properties::PropMap;

/// Revision number
pub type Revnum = u64;

/// Unique identifier for any stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute ObjectId from data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hexadecimal string
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Classification of a path in a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    None,
    File,
    Dir,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::None => "none",
            NodeKind::File => "file",
            NodeKind::Dir => "dir",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File content object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    /// Raw content data
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// Reference from a directory to one of its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub kind: NodeKind,
    pub id: ObjectId,
}

/// A file node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Blob holding the file's bytes
    pub content: ObjectId,
    /// Content length in bytes
    pub size: u64,
    /// Hex MD5 of the content
    pub md5: String,
    pub props: PropMap,
    /// Revision in which this node was last changed
    pub created_rev: Revnum,
}

/// A directory node; entries are kept sorted for deterministic hashing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirNode {
    pub entries: BTreeMap<String, DirEntry>,
    pub props: PropMap,
    /// Revision in which this node (or anything below it) last changed
    pub created_rev: Revnum,
}

/// A versioned tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    File(FileNode),
    Dir(DirNode),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::File(_) => NodeKind::File,
            Node::Dir(_) => NodeKind::Dir,
        }
    }

    pub fn props(&self) -> &PropMap {
        match self {
            Node::File(f) => &f.props,
            Node::Dir(d) => &d.props,
        }
    }

    pub fn created_rev(&self) -> Revnum {
        match self {
            Node::File(f) => f.created_rev,
            Node::Dir(d) => d.created_rev,
        }
    }

    pub fn as_dir(&self) -> Option<&DirNode> {
        match self {
            Node::Dir(d) => Some(d),
            Node::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(f) => Some(f),
            Node::Dir(_) => None,
        }
    }
}

/// Generic stored object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Object {
    Blob(Blob),
    Node(Node),
}

impl Object {
    /// Serialize to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary format
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// What happened to a path in a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    Added,
    Modified,
    Deleted,
    Replaced,
}

impl ChangeAction {
    /// Single-letter code as printed by `log -v`
    pub fn as_char(&self) -> char {
        match self {
            ChangeAction::Added => 'A',
            ChangeAction::Modified => 'M',
            ChangeAction::Deleted => 'D',
            ChangeAction::Replaced => 'R',
        }
    }
}

/// A changed path recorded in a revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedPath {
    pub action: ChangeAction,
    /// Copy source (path, revision) for copied nodes
    pub copyfrom: Option<(String, Revnum)>,
}

/// A published revision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub revision: Revnum,
    /// Root directory node of the revision's tree
    pub root: ObjectId,
    /// Revision properties (`svn:author`, `svn:date`, `svn:log`)
    pub props: PropMap,
    /// Absolute paths changed by this revision
    pub changes: BTreeMap<String, ChangedPath>,
}

impl RevisionRecord {
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_hex() {
        let id = ObjectId::from_data(b"hello world");
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(ObjectId::from_hex(&hex).unwrap(), id);
        assert!(ObjectId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_dir_node_hash_is_order_independent() {
        let file = DirEntry {
            kind: NodeKind::File,
            id: ObjectId::new([7u8; 32]),
        };

        let mut a = DirNode::default();
        a.entries.insert("b.txt".into(), file);
        a.entries.insert("a.txt".into(), file);

        let mut b = DirNode::default();
        b.entries.insert("a.txt".into(), file);
        b.entries.insert("b.txt".into(), file);

        let a = Object::Node(Node::Dir(a)).to_bytes().unwrap();
        let b = Object::Node(Node::Dir(b)).to_bytes().unwrap();
        assert_eq!(ObjectId::from_data(&a), ObjectId::from_data(&b));
    }

    #[test]
    fn test_created_rev_changes_identity() {
        let node = |rev| {
            Object::Node(Node::File(FileNode {
                content: ObjectId::new([1u8; 32]),
                size: 3,
                md5: String::new(),
                props: PropMap::new(),
                created_rev: rev,
            }))
            .to_bytes()
            .unwrap()
        };
        assert_ne!(ObjectId::from_data(&node(1)), ObjectId::from_data(&node(2)));
    }

    #[test]
    fn test_revision_record_serialization() {
        let mut changes = BTreeMap::new();
        changes.insert(
            "/a.txt".to_string(),
            ChangedPath {
                action: ChangeAction::Added,
                copyfrom: None,
            },
        );
        let record = RevisionRecord {
            revision: 4,
            root: ObjectId::new([3u8; 32]),
            props: PropMap::new(),
            changes,
        };
        let back = RevisionRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(back.revision, 4);
        assert_eq!(back.changes["/a.txt"].action.as_char(), 'A');
    }
}
