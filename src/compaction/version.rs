//! Version management.
//!
//! A [`Version`] is an immutable manifest snapshot. The [`VersionSet`] keeps
//! every version that is still referenced, keyed by its encoded manifest text:
//! registering a manifest that is already present bumps its reference count
//! instead of creating a duplicate, and a version whose count drops to zero is
//! evicted.
//!
//! The set holds one reference on the latest version; readers take their own
//! through [`VersionSet::current`]. Files that disappear from every remaining
//! version after an eviction are queued as obsolete so the database can delete
//! them.

use crate::compaction::manifest::Manifest;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// An immutable manifest snapshot.
#[derive(Debug)]
pub struct Version {
    id: u64,
    key: String,
    manifest: Manifest,
}

impl Version {
    /// Unique id, in registration order.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The snapshot.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

struct Registered {
    version: Arc<Version>,
    refs: usize,
}

#[derive(Default)]
struct Inner {
    versions: HashMap<String, Registered>,
    latest: Option<String>,
    next_id: u64,
    obsolete: Vec<String>,
}

impl Inner {
    fn append(&mut self, manifest: Manifest) -> bool {
        let key = manifest.encode();
        if let Some(existing) = self.versions.get_mut(&key) {
            existing.refs += 1;
            return false;
        }
        let id = self.next_id;
        self.next_id += 1;
        let version = Arc::new(Version { id, key: key.clone(), manifest });
        self.versions.insert(key, Registered { version, refs: 1 });
        true
    }

    fn unref(&mut self, key: &str) -> Result<()> {
        let entry = self
            .versions
            .get_mut(key)
            .ok_or_else(|| Error::bad_argument("unref of an unregistered version"))?;
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return Ok(());
        }

        if let Some(evicted) = self.versions.remove(key) {
            let live: HashSet<&String> =
                self.versions.values().flat_map(|r| r.version.manifest.all_files()).collect();
            let dead = evicted.version.manifest.all_files().filter(|f| !live.contains(f)).cloned();
            self.obsolete.extend(dead);
            log::debug!("Evicted version {}", evicted.version.id);
        }
        Ok(())
    }
}

/// Reference-counted registry of manifest snapshots.
#[derive(Default)]
pub struct VersionSet {
    inner: Mutex<Inner>,
}

impl VersionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `manifest` with one reference, or bumps the reference count
    /// of an identical version. Returns true when a new version was created.
    pub fn append_version(&self, manifest: Manifest) -> bool {
        self.inner.lock().append(manifest)
    }

    /// Drops one reference on the version with this manifest.
    pub fn unref_version(&self, manifest: &Manifest) -> Result<()> {
        self.inner.lock().unref(&manifest.encode())
    }

    /// Whether a version with this manifest is registered.
    pub fn exists(&self, manifest: &Manifest) -> bool {
        self.inner.lock().versions.contains_key(&manifest.encode())
    }

    /// Makes `manifest` the latest version. The set's reference moves from the
    /// previous latest version to the new one.
    pub fn install(&self, manifest: Manifest) -> Result<()> {
        let mut inner = self.inner.lock();
        let key = manifest.encode();
        if inner.latest.as_deref() == Some(key.as_str()) {
            return Ok(());
        }
        inner.append(manifest);
        if let Some(previous) = inner.latest.replace(key) {
            inner.unref(&previous)?;
        }
        Ok(())
    }

    /// Takes a reference on the latest version.
    pub fn current(&self) -> Result<VersionRef<'_>> {
        let mut inner = self.inner.lock();
        let key = inner.latest.clone().ok_or_else(|| Error::undefined("no version installed"))?;
        let entry = inner
            .versions
            .get_mut(&key)
            .ok_or_else(|| Error::undefined("latest version is not registered"))?;
        entry.refs += 1;
        Ok(VersionRef { set: self, version: Arc::clone(&entry.version) })
    }

    /// Reference count of the version with this manifest.
    pub fn ref_count(&self, manifest: &Manifest) -> usize {
        self.inner.lock().versions.get(&manifest.encode()).map_or(0, |r| r.refs)
    }

    /// Number of registered versions.
    pub fn len(&self) -> usize {
        self.inner.lock().versions.len()
    }

    /// Whether no version is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains the files no registered version refers to any more.
    pub fn take_obsolete(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.lock().obsolete)
    }
}

/// A reference on a version, released on drop.
pub struct VersionRef<'a> {
    set: &'a VersionSet,
    version: Arc<Version>,
}

impl VersionRef<'_> {
    /// The referenced version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// The referenced manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.version.manifest
    }
}

impl Drop for VersionRef<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.set.inner.lock().unref(&self.version.key) {
            log::warn!("Releasing version {}: {}", self.version.id, e);
        }
    }
}
