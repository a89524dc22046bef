//! The revisioned filesystem
//!
//! `Filesystem` is a cheap, clonable handle over a `Storage` backend. Reads
//! go through immutable `RevisionRoot`s; writes go through a `Txn` that is
//! published atomically by `Txn::commit`.

use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::config::ReposConfig;
use crate::error::{Error, Result};
use crate::hooks::HookManager;
use crate::object::{Blob, DirNode, Node, Object, ObjectId, RevisionRecord, Revnum};
use crate::properties::{format_date, parse_date, revprops, PropMap};
use crate::root::RevisionRoot;
use crate::storage::{MemoryStorage, Storage};
use crate::txn::Txn;

struct FsInner {
    storage: Box<dyn Storage>,
    uuid: String,
    nodes: Mutex<LruCache<ObjectId, Arc<Node>>>,
    hooks: Option<HookManager>,
}

/// Handle to a revisioned filesystem
#[derive(Clone)]
pub struct Filesystem {
    inner: Arc<FsInner>,
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("uuid", &self.inner.uuid)
            .finish_non_exhaustive()
    }
}

impl Filesystem {
    /// Wrap a storage backend, creating revision 0 if the store is empty.
    pub fn new(
        storage: Box<dyn Storage>,
        uuid: String,
        config: &ReposConfig,
        hooks: Option<HookManager>,
    ) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.node_cache_size).unwrap_or(NonZeroUsize::MIN);
        let fs = Self {
            inner: Arc::new(FsInner {
                storage,
                uuid,
                nodes: Mutex::new(LruCache::new(capacity)),
                hooks,
            }),
        };
        if fs.inner.storage.youngest()?.is_none() {
            fs.create_revision_zero()?;
        }
        Ok(fs)
    }

    /// A scratch filesystem held entirely in memory
    pub fn in_memory() -> Result<Self> {
        Self::new(
            Box::new(MemoryStorage::new()),
            uuid::Uuid::new_v4().to_string(),
            &ReposConfig::default(),
            None,
        )
    }

    fn create_revision_zero(&self) -> Result<()> {
        let root = self.store_node(Node::Dir(DirNode::default()))?;
        let mut props = PropMap::new();
        props.insert(revprops::DATE.to_string(), format_date(&Utc::now()));
        let record = RevisionRecord {
            revision: 0,
            root,
            props,
            changes: Default::default(),
        };
        self.claim_revision(&record)?;
        debug!("created revision 0");
        Ok(())
    }

    pub fn uuid(&self) -> &str {
        &self.inner.uuid
    }

    pub(crate) fn hooks(&self) -> Option<&HookManager> {
        self.inner.hooks.as_ref()
    }

    /// Youngest published revision
    pub fn youngest(&self) -> Result<Revnum> {
        self.inner
            .storage
            .youngest()?
            .ok_or_else(|| Error::Corrupt("repository has no revisions".to_string()))
    }

    /// Load the record of a published revision
    pub fn revision_record(&self, rev: Revnum) -> Result<RevisionRecord> {
        let data = self
            .inner
            .storage
            .read_revision(rev)?
            .ok_or(Error::NoSuchRevision(rev))?;
        Ok(RevisionRecord::from_bytes(&data)?)
    }

    /// Open the immutable tree of a revision
    pub fn revision_root(&self, rev: Revnum) -> Result<RevisionRoot> {
        let record = self.revision_record(rev)?;
        Ok(RevisionRoot::new(self.clone(), rev, record.root))
    }

    /// All revision properties of `rev`
    pub fn revision_props(&self, rev: Revnum) -> Result<PropMap> {
        Ok(self.revision_record(rev)?.props)
    }

    /// A single revision property
    pub fn revision_prop(&self, rev: Revnum, name: &str) -> Result<Option<String>> {
        Ok(self.revision_record(rev)?.props.remove(name))
    }

    /// Latest revision whose `svn:date` is at or before `tm`, 0 when `tm`
    /// precedes every revision.
    pub fn dated_revision(&self, tm: &DateTime<Utc>) -> Result<Revnum> {
        let youngest = self.youngest()?;
        let (mut lo, mut hi) = (0, youngest);
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            match self.revision_date(mid)? {
                Some(date) if date > *tm => hi = mid - 1,
                _ => lo = mid,
            }
        }
        Ok(lo)
    }

    fn revision_date(&self, rev: Revnum) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .revision_prop(rev, revprops::DATE)?
            .as_deref()
            .and_then(parse_date))
    }

    /// Begin a transaction based on `base_rev`
    pub fn begin_txn(&self, base_rev: Revnum, author: Option<&str>, log: &str) -> Result<Txn> {
        let root = self.revision_record(base_rev)?.root;
        Txn::new(
            self.clone(),
            base_rev,
            root,
            author.map(str::to_string),
            log.to_string(),
        )
    }

    pub(crate) fn claim_revision(&self, record: &RevisionRecord) -> Result<bool> {
        self.inner
            .storage
            .claim_revision(record.revision, &record.to_bytes()?)
    }

    /// Load a tree node, going through the node cache
    pub fn load_node(&self, id: &ObjectId) -> Result<Arc<Node>> {
        {
            let mut cache = self.inner.nodes.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(node) = cache.get(id) {
                return Ok(Arc::clone(node));
            }
        }
        match self.load_object(id)? {
            Object::Node(node) => {
                let node = Arc::new(node);
                let mut cache = self.inner.nodes.lock().unwrap_or_else(|e| e.into_inner());
                cache.put(*id, Arc::clone(&node));
                Ok(node)
            }
            Object::Blob(_) => Err(Error::Corrupt(format!("object {} is not a node", id))),
        }
    }

    /// Load a content blob
    pub fn load_blob(&self, id: &ObjectId) -> Result<Vec<u8>> {
        match self.load_object(id)? {
            Object::Blob(blob) => Ok(blob.data),
            Object::Node(_) => Err(Error::Corrupt(format!("object {} is not a blob", id))),
        }
    }

    fn load_object(&self, id: &ObjectId) -> Result<Object> {
        let data = self
            .inner
            .storage
            .read_object(id)?
            .ok_or(Error::ObjectNotFound(*id))?;
        Ok(Object::from_bytes(&data)?)
    }

    pub(crate) fn store_node(&self, node: Node) -> Result<ObjectId> {
        self.store_object(&Object::Node(node))
    }

    pub(crate) fn store_blob(&self, data: Vec<u8>) -> Result<ObjectId> {
        self.store_object(&Object::Blob(Blob::new(data)))
    }

    fn store_object(&self, object: &Object) -> Result<ObjectId> {
        let data = object.to_bytes()?;
        let id = ObjectId::from_data(&data);
        self.inner.storage.write_object(&id, &data)?;
        Ok(id)
    }
}
