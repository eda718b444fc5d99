//! Index manifest: the persisted record of provisioned indexes
//!
//! A structured JSON sidecar, one entry set per table, mapping field name to
//! the list of provisioned index-kind strings. Sorted maps keep the file
//! human-diffable and safe to check into version control. The manifest is
//! the single source of truth for "is this index provisioned"; provisioning
//! is never inferred from runtime data.
//!
//! Concurrency: reads go through an immutable `Arc` snapshot that is swapped
//! atomically on reload (mtime-checked), so a compilation never observes a
//! half-updated manifest. Writes are serialized behind a single lock and are
//! idempotent.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::errors::{IndexingError, IndexingResult};
use crate::observability::Logger;

/// Per-table map of field name to provisioned index kinds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexManifest {
    tables: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl IndexManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if (table, field, kind) is provisioned
    pub fn contains(&self, table: &str, field: &str, kind: &str) -> bool {
        self.tables
            .get(table)
            .and_then(|fields| fields.get(field))
            .map(|kinds| kinds.contains(kind))
            .unwrap_or(false)
    }

    /// Provisioned kinds for a field, if any
    pub fn kinds_for(&self, table: &str, field: &str) -> Option<&BTreeSet<String>> {
        self.tables.get(table).and_then(|fields| fields.get(field))
    }

    /// Inserts an entry. Returns false if it was already present.
    pub fn insert(
        &mut self,
        table: impl Into<String>,
        field: impl Into<String>,
        kind: impl Into<String>,
    ) -> bool {
        self.tables
            .entry(table.into())
            .or_default()
            .entry(field.into())
            .or_default()
            .insert(kind.into())
    }

    /// Total number of (table, field, kind) entries
    pub fn len(&self) -> usize {
        self.tables
            .values()
            .flat_map(|fields| fields.values())
            .map(|kinds| kinds.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The JSON fragment that would provision (table, field, kind), formatted
    /// so it can be mechanically merged into the manifest file.
    pub fn snippet_for(table: &str, field: &str, kind: &str) -> String {
        json!({ table: { field: [kind] } }).to_string()
    }
}

/// Whether missing manifest entries may be auto-provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestMode {
    /// Production: a missing entry is always a compilation error
    Strict,
    /// Development/test: missing entries are written to the manifest and
    /// compilation proceeds
    AutoProvision,
}

impl ManifestMode {
    pub fn allows_auto_provision(&self) -> bool {
        matches!(self, ManifestMode::AutoProvision)
    }
}

struct CacheState {
    manifest: Arc<IndexManifest>,
    loaded_mtime: Option<SystemTime>,
    loaded: bool,
}

/// File-backed manifest catalog with snapshot caching.
///
/// The calling context owns the catalog; there is no hidden module-level
/// global. `snapshot` re-reads the file when its modification time changes,
/// swapping in a new immutable snapshot.
pub struct ManifestCatalog {
    path: Option<PathBuf>,
    mode: ManifestMode,
    cache: RwLock<CacheState>,
    write_lock: Mutex<()>,
}

impl ManifestCatalog {
    /// Creates a catalog backed by a manifest file. A missing file reads as
    /// an empty manifest.
    pub fn new(path: impl Into<PathBuf>, mode: ManifestMode) -> Self {
        Self {
            path: Some(path.into()),
            mode,
            cache: RwLock::new(CacheState {
                manifest: Arc::new(IndexManifest::new()),
                loaded_mtime: None,
                loaded: false,
            }),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a purely in-memory catalog preloaded with `manifest`.
    /// Provisioning mutates the snapshot only; nothing is persisted.
    pub fn in_memory(manifest: IndexManifest, mode: ManifestMode) -> Self {
        Self {
            path: None,
            mode,
            cache: RwLock::new(CacheState {
                manifest: Arc::new(manifest),
                loaded_mtime: None,
                loaded: true,
            }),
            write_lock: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> ManifestMode {
        self.mode
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the current manifest snapshot, reloading from disk if the
    /// file's modification time has changed since the last load.
    pub fn snapshot(&self) -> IndexingResult<Arc<IndexManifest>> {
        let Some(path) = &self.path else {
            return Ok(Arc::clone(&read_guard(&self.cache).manifest));
        };

        let current_mtime = file_mtime(path);
        {
            let state = read_guard(&self.cache);
            if state.loaded && state.loaded_mtime == current_mtime {
                return Ok(Arc::clone(&state.manifest));
            }
        }

        let manifest = Arc::new(load_file(path)?);
        let mut state = write_guard(&self.cache);
        state.manifest = Arc::clone(&manifest);
        state.loaded_mtime = current_mtime;
        state.loaded = true;
        Ok(manifest)
    }

    /// Provisions (table, field, kind), persisting the updated manifest.
    ///
    /// Serialized behind a single writer lock; a concurrent attempt for the
    /// same entry is a no-op once it observes the entry present. Returns
    /// true if this call wrote the entry.
    pub fn provision(&self, table: &str, field: &str, kind: &str) -> IndexingResult<bool> {
        let _writer = lock_writer(&self.write_lock);

        // Re-read under the lock so the decision is made against the latest
        // persisted state, not a stale snapshot.
        let mut manifest = match &self.path {
            Some(path) => load_file(path)?,
            None => (*read_guard(&self.cache).manifest).clone(),
        };

        if !manifest.insert(table, field, kind) {
            return Ok(false);
        }

        let mut new_mtime = None;
        if let Some(path) = &self.path {
            persist(path, &manifest)?;
            new_mtime = file_mtime(path);
        }

        let mut state = write_guard(&self.cache);
        state.manifest = Arc::new(manifest);
        state.loaded_mtime = new_mtime;
        state.loaded = true;
        drop(state);

        Logger::info(
            "INDEX_PROVISIONED",
            &[("table", table), ("field", field), ("kind", kind)],
        );
        Ok(true)
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

fn load_file(path: &Path) -> IndexingResult<IndexManifest> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(IndexManifest::new()),
        Err(e) => {
            return Err(IndexingError::manifest_io(
                path.display().to_string(),
                e.to_string(),
            ))
        }
    };
    serde_json::from_str(&content).map_err(|e| {
        IndexingError::manifest_malformed(path.display().to_string(), e.to_string())
    })
}

/// Write via a temp file plus rename so readers never see a partial file
fn persist(path: &Path, manifest: &IndexManifest) -> IndexingResult<()> {
    let io_err = |e: std::io::Error| {
        IndexingError::manifest_io(path.display().to_string(), e.to_string())
    };

    let serialized = serde_json::to_string_pretty(manifest).map_err(|e| {
        IndexingError::manifest_io(path.display().to_string(), e.to_string())
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, serialized + "\n").map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

// Lock poisoning only happens if a panicking thread held the guard; the
// protected state is still structurally valid, so recover the inner value.
fn read_guard(lock: &RwLock<CacheState>) -> std::sync::RwLockReadGuard<'_, CacheState> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_guard(lock: &RwLock<CacheState>) -> std::sync::RwLockWriteGuard<'_, CacheState> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_writer(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
