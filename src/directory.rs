//! C3: the directory manager.
//!
//! Owns the logic for turning a directory on disk plus a persisted
//! manifest into the ordered, reconciled in-memory segment set the logger
//! core operates on, and for enforcing retention once that set grows past
//! `max_logs`.

use crate::error::{LogError, Result};
use crate::manifest::Manifest;
use crate::segment::{parse_segment_filename, segment_filename, Segment};
use std::fs;
use std::path::Path;

/// Ensure `dir` exists and is writable, removing any dangling
/// `replication.json.tmp` crash residue, then scan it and reconcile
/// against the manifest.
///
/// Returns the reconciled segment set, sorted by id ascending. Orphan
/// files — present on disk but absent from the manifest — are silently
/// skipped: the manifest, not the directory listing, is authoritative.
pub fn startup_scan<P: AsRef<Path>>(dir: P) -> Result<Vec<Segment>> {
    let dir = dir.as_ref();
    ensure_writable_directory(dir)?;
    Manifest::clear_stray_tmp(dir)?;

    let manifest = Manifest::load(dir)?;
    let mut segments = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(id) = parse_segment_filename(name) else {
            continue;
        };
        let Some(manifest_entry) = manifest.find_by_filename(name) else {
            tracing::debug!(segment = name, "skipping orphan segment file not in manifest");
            continue;
        };
        let Some(tick_min) = manifest_entry.tick_min() else {
            tracing::debug!(segment = name, "skipping manifest entry with unparseable tickMin");
            continue;
        };
        let size = entry.metadata()?.len();
        segments.push(Segment::create(id, tick_min, size, manifest_entry.sealed));
    }

    segments.sort_by_key(|s| s.id);
    Ok(segments)
}

fn ensure_writable_directory(dir: &Path) -> Result<()> {
    let metadata = fs::metadata(dir).map_err(|_| {
        LogError::NotFound(format!("directory does not exist: {}", dir.display()))
    })?;
    if !metadata.is_dir() {
        return Err(LogError::NotFound(format!(
            "not a directory: {}",
            dir.display()
        )));
    }
    // Probe writability with a throwaway temp file rather than inspecting
    // permission bits, which are not portable across platforms.
    let probe = dir.join(".replog-writable-probe");
    match fs::File::create(&probe) {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            Ok(())
        }
        Err(_) => Err(LogError::NotWritable(format!(
            "directory not writable: {}",
            dir.display()
        ))),
    }
}

/// Drop the oldest sealed segments from the front of `segments` until its
/// length is at most `max_logs`, stopping early if the head becomes
/// unsealed. Unlinks each removed segment's file first. Returns `true` if
/// any segment was removed (callers use this to decide whether the
/// manifest needs resaving).
pub fn enforce_retention<P: AsRef<Path>>(
    dir: P,
    segments: &mut Vec<Segment>,
    max_logs: usize,
) -> Result<bool> {
    let max_logs = max_logs.max(1);
    let mut removed_any = false;

    while segments.len() > max_logs {
        if !segments[0].sealed {
            break;
        }
        let victim = segments.remove(0);
        victim.unlink(dir.as_ref())?;
        tracing::info!(segment = segment_filename(victim.id), "retention removed sealed segment");
        removed_any = true;
    }

    Ok(removed_any)
}
