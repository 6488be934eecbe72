//! Keyed bundle storage
//!
//! One bundle per model family. A new training run overwrites the previous
//! bundle of the same family. Writers of the same key are serialized by a
//! per-key lock, and the file-backed store replaces files atomically with a
//! rename, so a reader never observes a half-written bundle.

use super::bundle::TrainedBundle;
use crate::error::{Result, SelectError};
use crate::training::ModelFamily;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Key to bytes storage of trained bundles
pub trait BundleStore: Send + Sync {
    fn put_bytes(&self, family: ModelFamily, bytes: Vec<u8>) -> Result<()>;

    /// Raw persisted bytes; `ModelNotFound` when nothing is stored
    fn get_bytes(&self, family: ModelFamily) -> Result<Vec<u8>>;

    fn contains(&self, family: ModelFamily) -> bool;

    /// Families with a stored bundle, in catalog order
    fn families(&self) -> Result<Vec<ModelFamily>>;

    fn put(&self, bundle: &TrainedBundle) -> Result<()> {
        self.put_bytes(bundle.family, bundle.to_bytes()?)
    }

    fn get(&self, family: ModelFamily) -> Result<TrainedBundle> {
        TrainedBundle::from_bytes(&self.get_bytes(family)?)
    }

    /// Exact persisted bytes under the `<family>_model.json` export name
    fn export(&self, family: ModelFamily) -> Result<(String, Vec<u8>)> {
        Ok((TrainedBundle::export_name(family), self.get_bytes(family)?))
    }
}

fn not_found(family: ModelFamily) -> SelectError {
    SelectError::ModelNotFound(format!("no trained bundle for '{}'", family))
}

/// Bundles stored as `<family>_best.json` files under one directory
pub struct FileBundleStore {
    root: PathBuf,
    locks: Mutex<HashMap<ModelFamily, Arc<Mutex<()>>>>,
}

impl FileBundleStore {
    /// Open the store, creating the directory if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, family: ModelFamily) -> PathBuf {
        self.root.join(format!("{}_best.json", family))
    }

    fn lock_for(&self, family: ModelFamily) -> Arc<Mutex<()>> {
        self.locks.lock().entry(family).or_default().clone()
    }
}

impl BundleStore for FileBundleStore {
    fn put_bytes(&self, family: ModelFamily, bytes: Vec<u8>) -> Result<()> {
        let lock = self.lock_for(family);
        let _guard = lock.lock();

        let path = self.path_for(family);
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(family = %family, path = %path.display(), bytes = bytes.len(), "bundle written");
        Ok(())
    }

    fn get_bytes(&self, family: ModelFamily) -> Result<Vec<u8>> {
        let lock = self.lock_for(family);
        let _guard = lock.lock();

        match fs::read(self.path_for(family)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(family)),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, family: ModelFamily) -> bool {
        self.path_for(family).is_file()
    }

    fn families(&self) -> Result<Vec<ModelFamily>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix("_best.json")) else {
                continue;
            };
            if let Ok(family) = stem.parse::<ModelFamily>() {
                found.push(family);
            }
        }
        found.sort();
        Ok(found)
    }
}

/// In-process store, used by tests and embedded callers
#[derive(Default)]
pub struct MemoryBundleStore {
    entries: RwLock<BTreeMap<ModelFamily, Vec<u8>>>,
}

impl MemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BundleStore for MemoryBundleStore {
    fn put_bytes(&self, family: ModelFamily, bytes: Vec<u8>) -> Result<()> {
        self.entries.write().insert(family, bytes);
        Ok(())
    }

    fn get_bytes(&self, family: ModelFamily) -> Result<Vec<u8>> {
        self.entries
            .read()
            .get(&family)
            .cloned()
            .ok_or_else(|| not_found(family))
    }

    fn contains(&self, family: ModelFamily) -> bool {
        self.entries.read().contains_key(&family)
    }

    fn families(&self) -> Result<Vec<ModelFamily>> {
        Ok(self.entries.read().keys().copied().collect())
    }
}
