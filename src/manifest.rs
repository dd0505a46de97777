//! C4: the state file (manifest).
//!
//! The manifest is the authoritative, persisted record of which segments
//! exist, which are sealed, and each one's minimum tick. Saves are
//! crash-safe: write to a temp file, fsync, then rename over the real
//! manifest, so a crash between those two steps always leaves the
//! previous manifest (or none) intact rather than a half-written one.

use crate::error::Result;
use crate::segment::{segment_filename, Segment};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const MANIFEST_FILENAME: &str = "replication.json";
const MANIFEST_TMP_FILENAME: &str = "replication.json.tmp";

/// One entry in the persisted manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub filename: String,
    pub sealed: bool,
    #[serde(rename = "tickMin")]
    pub tick_min: String,
}

impl ManifestEntry {
    pub fn from_segment(segment: &Segment) -> Self {
        Self {
            id: segment.id.to_string(),
            filename: segment_filename(segment.id),
            sealed: segment.sealed,
            tick_min: segment.tick_min.to_string(),
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.id.parse().ok()
    }

    pub fn tick_min(&self) -> Option<u64> {
        self.tick_min.parse().ok()
    }
}

/// The manifest document: `{"logs":[...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub logs: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest snapshot from the current in-memory segment set.
    pub fn from_segments(segments: &[Segment]) -> Self {
        Self {
            logs: segments.iter().map(ManifestEntry::from_segment).collect(),
        }
    }

    /// Look up a manifest entry by its on-disk filename.
    pub fn find_by_filename(&self, filename: &str) -> Option<&ManifestEntry> {
        self.logs.iter().find(|e| e.filename == filename)
    }

    /// Load `<dir>/replication.json`. A missing manifest is not an error:
    /// the directory is treated as fresh and an empty manifest is returned.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(MANIFEST_FILENAME);
        match fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Save the manifest crash-safely: write + fsync a `.tmp` file, then
    /// rename it over the real manifest.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        let tmp_path = dir.join(MANIFEST_TMP_FILENAME);
        let final_path = dir.join(MANIFEST_FILENAME);

        let encoded = serde_json::to_vec_pretty(self)?;
        {
            let mut file = fs::File::create(&tmp_path)?;
            use std::io::Write;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    /// Remove any dangling `.tmp` file left behind by a crash between the
    /// write and the rename of a previous save.
    pub fn clear_stray_tmp<P: AsRef<Path>>(dir: P) -> Result<()> {
        let tmp_path = dir.as_ref().join(MANIFEST_TMP_FILENAME);
        match fs::remove_file(&tmp_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_manifest_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(manifest.logs.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let segment = Segment::create(7, 7, 100, true);
        let manifest = Manifest::from_segments(std::slice::from_ref(&segment));
        manifest.save(dir.path()).unwrap();

        let reloaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(reloaded.logs.len(), 1);
        assert_eq!(reloaded.logs[0].id, "7");
        assert_eq!(reloaded.logs[0].filename, "replication-7.db");
        assert!(reloaded.logs[0].sealed);
        assert_eq!(reloaded.logs[0].tick_min, "7");
    }

    #[test]
    fn save_leaves_no_tmp_file_behind() {
        let dir = TempDir::new().unwrap();
        Manifest::default().save(dir.path()).unwrap();
        assert!(!dir.path().join(MANIFEST_TMP_FILENAME).exists());
        assert!(dir.path().join(MANIFEST_FILENAME).exists());
    }

    #[test]
    fn clear_stray_tmp_is_a_noop_when_absent() {
        let dir = TempDir::new().unwrap();
        Manifest::clear_stray_tmp(dir.path()).unwrap();
    }

    #[test]
    fn clear_stray_tmp_removes_crash_residue() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_TMP_FILENAME), b"{}").unwrap();
        Manifest::clear_stray_tmp(dir.path()).unwrap();
        assert!(!dir.path().join(MANIFEST_TMP_FILENAME).exists());
    }

    #[test]
    fn huge_ids_round_trip_exactly() {
        let dir = TempDir::new().unwrap();
        let huge = (1u64 << 53) + 999;
        let segment = Segment::create(huge, huge, 0, true);
        let manifest = Manifest::from_segments(std::slice::from_ref(&segment));
        manifest.save(dir.path()).unwrap();

        let reloaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(reloaded.logs[0].id(), Some(huge));
    }
}
