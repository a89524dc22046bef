//! svnlocal snapshot store
//!
//! A revisioned, content-addressed tree store: immutable revision roots for
//! reading, copy-on-write transactions for writing, and an on-disk
//! repository layout that ties them together.

pub mod config;
pub mod error;
pub mod fs;
pub mod hooks;
pub mod log;
pub mod object;
pub mod path;
pub mod properties;
pub mod repos;
pub mod root;
pub mod storage;
pub mod txn;

pub use config::ReposConfig;
pub use error::{Error, Result};
pub use fs::Filesystem;
pub use hooks::HookManager;
pub use log::LogEntry;
pub use object::{
    Blob, ChangeAction, ChangedPath, DirEntry, DirNode, FileNode, Node, NodeKind, Object,
    ObjectId, RevisionRecord, Revnum,
};
pub use properties::{entry_props, format_date, parse_date, prop_diffs, revprops, svn_props, PropChange, PropMap};
pub use repos::{find_root_path, is_repository, Repository};
pub use root::{CommittedInfo, RevisionRoot};
pub use storage::{DiskStorage, MemoryStorage, Storage};
pub use txn::{CommitInfo, Txn};
