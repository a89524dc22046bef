//! Storage abstraction layer
//!
//! A `Storage` keeps two things: content-addressed objects and the
//! sequence of published revision records. Objects may be written at any
//! time (they are immutable and idempotent); a revision only becomes
//! visible once its record has been claimed.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::object::{ObjectId, Revnum};

/// Generic storage backend interface
pub trait Storage: Send + Sync {
    /// Get object data by ID
    fn read_object(&self, id: &ObjectId) -> Result<Option<Vec<u8>>>;

    /// Store object data under its ID (no-op if already present)
    fn write_object(&self, id: &ObjectId, data: &[u8]) -> Result<()>;

    /// Get a published revision record
    fn read_revision(&self, rev: Revnum) -> Result<Option<Vec<u8>>>;

    /// Publish a revision record. Returns `false` without touching
    /// anything if `rev` has already been claimed by another writer.
    fn claim_revision(&self, rev: Revnum, data: &[u8]) -> Result<bool>;

    /// Youngest published revision, `None` for an empty store
    fn youngest(&self) -> Result<Option<Revnum>>;
}

/// In-memory storage, used for tests and scratch filesystems
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
    revisions: RwLock<BTreeMap<Revnum, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Corrupt("storage lock poisoned".to_string())
}

impl Storage for MemoryStorage {
    fn read_object(&self, id: &ObjectId) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().map_err(poisoned)?.get(id).cloned())
    }

    fn write_object(&self, id: &ObjectId, data: &[u8]) -> Result<()> {
        self.objects
            .write()
            .map_err(poisoned)?
            .entry(*id)
            .or_insert_with(|| data.to_vec());
        Ok(())
    }

    fn read_revision(&self, rev: Revnum) -> Result<Option<Vec<u8>>> {
        Ok(self.revisions.read().map_err(poisoned)?.get(&rev).cloned())
    }

    fn claim_revision(&self, rev: Revnum, data: &[u8]) -> Result<bool> {
        let mut revisions = self.revisions.write().map_err(poisoned)?;
        if revisions.contains_key(&rev) {
            return Ok(false);
        }
        revisions.insert(rev, data.to_vec());
        Ok(true)
    }

    fn youngest(&self) -> Result<Option<Revnum>> {
        Ok(self
            .revisions
            .read()
            .map_err(poisoned)?
            .keys()
            .next_back()
            .copied())
    }
}

const RAW_TAG: u8 = b'R';
const ZSTD_TAG: u8 = b'Z';

/// Disk-backed storage
///
/// Layout (under the repository's `db/` directory):
/// ```text
/// objects/{hash[0..2]}/{hash[2..]}  content-addressed objects
/// revs/{rev}.bin                    revision records
/// current                           youngest revision (hint)
/// ```
/// Every file starts with a one-byte tag telling whether the payload is
/// zstd-compressed.
pub struct DiskStorage {
    root: PathBuf,
    compression_level: i32,
}

impl DiskStorage {
    /// Open (and lay out, if needed) a storage directory
    pub fn open(root: &Path, compression_level: i32) -> Result<Self> {
        fs::create_dir_all(root.join("objects"))?;
        fs::create_dir_all(root.join("revs"))?;
        Ok(Self {
            root: root.to_path_buf(),
            compression_level,
        })
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    fn revision_path(&self, rev: Revnum) -> PathBuf {
        self.root.join("revs").join(format!("{}.bin", rev))
    }

    fn current_path(&self) -> PathBuf {
        self.root.join("current")
    }

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if self.compression_level <= 0 {
            let mut out = Vec::with_capacity(data.len() + 1);
            out.push(RAW_TAG);
            out.extend_from_slice(data);
            return Ok(out);
        }
        let compressed = zstd::encode_all(data, self.compression_level)?;
        let mut out = Vec::with_capacity(compressed.len() + 1);
        out.push(ZSTD_TAG);
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    fn decode(path: &Path, data: Vec<u8>) -> Result<Vec<u8>> {
        match data.first() {
            Some(&RAW_TAG) => Ok(data[1..].to_vec()),
            Some(&ZSTD_TAG) => Ok(zstd::decode_all(&data[1..])?),
            _ => Err(Error::Corrupt(format!("unknown encoding in {:?}", path))),
        }
    }

    fn read_file(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(data) => Ok(Some(Self::decode(path, data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn tmp_path(path: &Path) -> PathBuf {
        path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()))
    }

    fn read_current_hint(&self) -> Result<Option<Revnum>> {
        match fs::read_to_string(self.current_path()) {
            Ok(s) => s
                .trim()
                .parse::<Revnum>()
                .map(Some)
                .map_err(|e| Error::Corrupt(format!("bad current file: {}", e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_current_hint(&self, rev: Revnum) -> Result<()> {
        let path = self.current_path();
        let tmp = Self::tmp_path(&path);
        fs::write(&tmp, rev.to_string())?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl Storage for DiskStorage {
    fn read_object(&self, id: &ObjectId) -> Result<Option<Vec<u8>>> {
        Self::read_file(&self.object_path(id))
    }

    fn write_object(&self, id: &ObjectId, data: &[u8]) -> Result<()> {
        let path = self.object_path(id);
        if path.exists() {
            return Ok(()); // content-addressed, so already stored means identical
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = Self::tmp_path(&path);
        fs::write(&tmp, self.encode(data)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read_revision(&self, rev: Revnum) -> Result<Option<Vec<u8>>> {
        Self::read_file(&self.revision_path(rev))
    }

    fn claim_revision(&self, rev: Revnum, data: &[u8]) -> Result<bool> {
        let path = self.revision_path(rev);
        let tmp = Self::tmp_path(&path);
        fs::write(&tmp, self.encode(data)?)?;

        // hard_link refuses to replace an existing file, which makes the
        // claim atomic across processes.
        let claimed = match fs::hard_link(&tmp, &path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => false,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e.into());
            }
        };
        fs::remove_file(&tmp)?;

        if claimed {
            self.write_current_hint(rev)?;
        }
        Ok(claimed)
    }

    fn youngest(&self) -> Result<Option<Revnum>> {
        // The hint can lag behind when a writer died between claiming a
        // revision and updating it, so probe forward from it.
        let mut youngest = match self.read_current_hint()? {
            Some(rev) if self.revision_path(rev).exists() => Some(rev),
            _ if self.revision_path(0).exists() => Some(0),
            _ => None,
        };
        if let Some(mut rev) = youngest {
            while self.revision_path(rev + 1).exists() {
                rev += 1;
            }
            youngest = Some(rev);
        }
        Ok(youngest)
    }
}
