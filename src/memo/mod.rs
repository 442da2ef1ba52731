//! Persistent memo of geocoding results.
//!
//! The memo is a single JSON document holding every name that has been
//! resolved, the id it resolves to, one [`LocationRecord`] per id, and for
//! every user agent the names it could not resolve. It is loaded once per
//! run (after rotating two generations of backups), mutated in place by the
//! resolver and flushed at checkpoints chosen by the caller.

mod record;

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;

pub use record::{format_location, osm_id, LocationRecord, NameAlias, OsmId, UNAVAILABLE};

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{MemoError, MemoResult};
use crate::geocoder::RawLocation;

/// On-disk layout of the memo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoDocument {
    /// User agent to the names it failed to geocode.
    pub unknown: BTreeMap<String, BTreeSet<String>>,
    pub known_names: BTreeSet<String>,
    pub known_osm_ids: BTreeSet<OsmId>,
    pub map_name: BTreeMap<String, NameAlias>,
    /// Records keyed by the decimal form of their OSM id.
    pub locations: BTreeMap<String, LocationRecord>,
}

/// In-memory memo store, optionally backed by a file.
#[derive(Debug, Clone, Default)]
pub struct Memo {
    path: Option<PathBuf>,
    data: MemoDocument,
    pending: usize,
}

impl Memo {
    /// Create an empty memo that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the memo at `path`, rotating backups first.
    ///
    /// A missing or corrupt file is replaced with an empty document. Fails with
    /// [`MemoError::Unavailable`] only if that fresh document cannot be read back.
    pub fn load(path: impl Into<PathBuf>) -> MemoResult<Self> {
        let path = path.into();
        rotate_backups(&path)?;

        let data = match read_document(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Memo missing or unreadable, starting from an empty memo"
                );
                write_document(&path, &MemoDocument::default()).map_err(|e| {
                    MemoError::Unavailable {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    }
                })?;
                read_document(&path).map_err(|e| MemoError::Unavailable {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?
            }
        };

        info!(
            path = %path.display(),
            names = data.known_names.len(),
            locations = data.locations.len(),
            "Memo loaded"
        );

        Ok(Self {
            path: Some(path),
            data,
            pending: 0,
        })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read-only view of the whole document.
    pub fn document(&self) -> &MemoDocument {
        &self.data
    }

    /// Whether `name` is recorded as unresolvable, for one user agent or for any.
    pub fn is_unknown(&self, name: &str, agent: Option<&str>) -> bool {
        match agent {
            Some(agent) => self
                .data
                .unknown
                .get(agent)
                .is_some_and(|names| names.contains(name)),
            None => self.data.unknown.values().any(|names| names.contains(name)),
        }
    }

    /// Clear `name` from every user agent's unknown set.
    pub fn remove_unknown(&mut self, name: &str) -> bool {
        let removed = self.forget_unknown(name);
        if removed {
            self.pending += 1;
        }
        removed
    }

    /// Alias registered for `name`.
    pub fn alias(&self, name: &str) -> Option<NameAlias> {
        self.data.map_name.get(name).copied()
    }

    /// Whether `id` has ever been resolved.
    pub fn is_known_id(&self, id: OsmId) -> bool {
        self.data.known_osm_ids.contains(&id)
    }

    /// Find the record for `name`, falling back to `id` when the name is not known.
    ///
    /// A known id with no stored record is dropped from the known ids.
    pub fn search(&mut self, name: &str, id: Option<OsmId>) -> Option<LocationRecord> {
        if self.data.known_names.contains(name) {
            if let Some(alias) = self.alias(name) {
                if let Some(record) = self.data.locations.get(&alias.id.to_string()) {
                    debug!(name = %name, osm_id = alias.id, "Memo hit by name");
                    return Some(record.clone());
                }
                self.purge_orphan(alias.id);
                return None;
            }
        }

        let id = id?;
        if !self.is_known_id(id) {
            debug!(name = %name, osm_id = id, "Memo miss by name and id");
            return None;
        }
        match self.data.locations.get(&id.to_string()) {
            Some(record) => {
                debug!(osm_id = id, "Memo hit by id");
                Some(record.clone())
            }
            None => {
                self.purge_orphan(id);
                None
            }
        }
    }

    /// Register `name` as an alias of `id`. The first confidence recorded wins.
    pub fn add_known(&mut self, name: &str, id: OsmId, confidence: f64) -> bool {
        let changed = self.insert_alias(name, id, confidence);
        if changed {
            self.pending += 1;
        }
        changed
    }

    /// Store a freshly geocoded payload under `id` and alias `name` (and the
    /// payload's display name) to it. Returns the canonical record for `id`.
    pub fn add(
        &mut self,
        name: &str,
        id: OsmId,
        raw: &RawLocation,
        confidence: f64,
    ) -> MemoResult<LocationRecord> {
        let key = id.to_string();

        if let Some(existing) = self.data.locations.get(&key).cloned() {
            debug!(osm_id = id, "Location already in memo");
            let mut changed = self.insert_alias(name, id, confidence);
            if let Some(display_name) = existing.display_name.as_deref() {
                changed |= self.alias_display_name(display_name, id, confidence);
            }
            if changed {
                self.pending += 1;
            }
            return Ok(existing);
        }

        let record = format_location(raw)?;
        self.insert_alias(name, id, confidence);
        if let Some(display_name) = record.display_name.as_deref() {
            self.alias_display_name(display_name, id, confidence);
        }
        self.data.locations.insert(key, record.clone());
        self.pending += 1;
        debug!(name = %name, osm_id = id, "New location added to memo");

        Ok(record)
    }

    /// Record that `agent` could not resolve `name`.
    pub fn add_unknown(&mut self, agent: &str, name: &str) -> bool {
        let name = name.to_lowercase();
        let inserted = self
            .data
            .unknown
            .entry(agent.to_string())
            .or_default()
            .insert(name.clone());
        if inserted {
            debug!(agent = %agent, name = %name, "Added unknown name");
            self.pending += 1;
        }
        inserted
    }

    /// Store mutations since the last [`reset_pending`](Self::reset_pending).
    pub fn pending_changes(&self) -> usize {
        self.pending
    }

    pub fn reset_pending(&mut self) {
        self.pending = 0;
    }

    /// Write the whole document to the backing file.
    pub fn save(&self) -> MemoResult<()> {
        let Some(path) = self.path.as_deref() else {
            debug!("In-memory memo, nothing to save");
            return Ok(());
        };
        write_document(path, &self.data)?;
        info!(
            path = %path.display(),
            names = self.data.known_names.len(),
            locations = self.data.locations.len(),
            "Memo saved"
        );
        Ok(())
    }

    fn insert_alias(&mut self, name: &str, id: OsmId, confidence: f64) -> bool {
        let name = name.to_lowercase();
        let mut changed = false;
        let alias = *self.data.map_name.entry(name.clone()).or_insert_with(|| {
            debug!(name = %name, osm_id = id, confidence, "Added name alias");
            changed = true;
            NameAlias { id, confidence }
        });
        if alias.id != id {
            return changed;
        }
        changed |= self.data.known_names.insert(name);
        changed |= self.data.known_osm_ids.insert(id);
        changed
    }

    /// A display name that now resolves to `id` is no longer unknown to anyone.
    fn alias_display_name(&mut self, display_name: &str, id: OsmId, confidence: f64) -> bool {
        let mut changed = self.insert_alias(display_name, id, confidence);
        if self.alias(&display_name.to_lowercase()).is_some_and(|a| a.id == id) {
            changed |= self.forget_unknown(&display_name.to_lowercase());
        }
        changed
    }

    fn forget_unknown(&mut self, name: &str) -> bool {
        let mut removed = false;
        for (agent, names) in self.data.unknown.iter_mut() {
            if names.remove(name) {
                debug!(agent = %agent, name = %name, "Removed from unknown names");
                removed = true;
            }
        }
        removed
    }

    fn purge_orphan(&mut self, id: OsmId) {
        warn!(osm_id = id, "Known id has no stored location, removing it from known ids");
        if self.data.known_osm_ids.remove(&id) {
            self.pending += 1;
        }
    }
}

/// Backup file names for `path`: `memo.json` → (`memo.bak`, `memo.bak.bak`).
pub fn backup_paths(path: &Path) -> (PathBuf, PathBuf) {
    (path.with_extension("bak"), path.with_extension("bak.bak"))
}

/// Shift `memo.bak` into `memo.bak.bak`, then copy the memo into `memo.bak`.
fn rotate_backups(path: &Path) -> MemoResult<()> {
    let (first, second) = backup_paths(path);
    if first.exists() {
        fs::copy(&first, &second)?;
        debug!(from = %first.display(), to = %second.display(), "Rotated memo backup");
    }
    if path.exists() {
        fs::copy(path, &first)?;
        debug!(from = %path.display(), to = %first.display(), "Backed up memo");
    }
    Ok(())
}

fn read_document(path: &Path) -> MemoResult<MemoDocument> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Write to a temporary sibling, fsync, then rename over `path`.
fn write_document(path: &Path, data: &MemoDocument) -> MemoResult<()> {
    let temp_path = path.with_extension(format!("tmp.{}", Uuid::new_v4()));

    let result = (|| -> MemoResult<()> {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        serde_json::to_writer_pretty(&mut writer, data)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}
