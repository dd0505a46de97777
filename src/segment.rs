//! C2: the logfile descriptor.
//!
//! A `Segment` represents one `replication-<id>.db` file. It tracks just
//! enough state (sealed/flushed flags, current size, an optional open
//! handle) for the directory manager and logger core to reason about it
//! without re-touching the filesystem on every decision.

use crate::error::{LogError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Build the on-disk filename for a segment id.
pub fn segment_filename(id: u64) -> String {
    format!("replication-{id}.db")
}

/// Parse a `replication-<digits>.db` filename, returning its id.
///
/// Returns `None` for anything that doesn't match the pattern exactly —
/// used by the directory scan to recognize segment files among arbitrary
/// directory entries without pulling in a regex engine for one fixed shape.
pub fn parse_segment_filename(name: &str) -> Option<u64> {
    let digits = name.strip_prefix("replication-")?.strip_suffix(".db")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A scoped file handle for one segment.
///
/// `Drop` best-effort-closes (and, if still open, flushes) the handle so a
/// `Segment` can never leak a file descriptor; `flush` is a distinct,
/// explicit method for the caller that wants to observe and propagate I/O
/// errors, which `Drop` cannot do.
#[derive(Debug)]
pub struct SegmentFile {
    file: File,
}

impl SegmentFile {
    fn new(file: File) -> Self {
        Self { file }
    }

    fn fsync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes)?;
        Ok(())
    }
}

/// One on-disk log segment and its in-memory metadata.
#[derive(Debug)]
pub struct Segment {
    pub id: u64,
    pub tick_min: u64,
    pub size: u64,
    pub sealed: bool,
    pub flushed: bool,
    fd: Option<SegmentFile>,
}

impl Segment {
    /// Allocate a descriptor for a segment that is known to exist but is
    /// not currently open (`sealed=true, flushed=true, fd=None`). Used when
    /// reconstructing the set from the manifest before deciding which
    /// member, if any, needs reopening.
    pub fn create(id: u64, tick_min: u64, size: u64, sealed: bool) -> Self {
        Self {
            id,
            tick_min,
            size,
            sealed,
            flushed: true,
            fd: None,
        }
    }

    /// Create a brand-new, unsealed segment file at `dir` exclusively
    /// (fails if one already exists with that name).
    pub fn create_new<P: AsRef<Path>>(dir: P, id: u64) -> Result<Self> {
        let path = dir.as_ref().join(segment_filename(id));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok(Self {
            id,
            tick_min: id,
            size: 0,
            sealed: false,
            flushed: false,
            fd: Some(SegmentFile::new(file)),
        })
    }

    /// Reopen an existing segment's file for append, seeking to the
    /// recorded size. Fails if the file is missing or shorter than the
    /// recorded size (on-disk truncation the manifest didn't expect).
    pub fn open_append<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let path = dir.as_ref().join(segment_filename(self.id));
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let actual_len = file.metadata()?.len();
        if actual_len < self.size {
            return Err(LogError::Internal(format!(
                "segment {} is shorter on disk ({actual_len} bytes) than recorded ({} bytes)",
                self.id, self.size
            )));
        }
        self.size = actual_len;
        let pos = file.seek(SeekFrom::Start(self.size))?;
        if pos != self.size {
            return Err(LogError::Internal(format!(
                "seek mismatch reopening segment {}: expected {}, got {pos}",
                self.id, self.size
            )));
        }
        self.fd = Some(SegmentFile::new(file));
        self.flushed = true;
        Ok(())
    }

    /// Whether this segment currently has an open handle.
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Append `bytes` to the segment. Fails if sealed or not open, or on
    /// any I/O error. Updates `size` and clears `flushed` on success.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if self.sealed {
            return Err(LogError::Internal(format!(
                "cannot append to sealed segment {}",
                self.id
            )));
        }
        let fd = self
            .fd
            .as_mut()
            .ok_or_else(|| LogError::Internal(format!("segment {} has no open handle", self.id)))?;
        fd.write_all(bytes)?;
        self.size += bytes.len() as u64;
        self.flushed = false;
        Ok(())
    }

    /// Flush (fsync) the segment if it has pending unflushed bytes.
    /// Idempotent: a no-op if already sealed or already flushed.
    pub fn flush(&mut self) -> Result<()> {
        if self.sealed || self.flushed {
            return Ok(());
        }
        if let Some(fd) = self.fd.as_mut() {
            fd.fsync()?;
        }
        self.flushed = true;
        Ok(())
    }

    /// Flush and close the handle, optionally sealing the segment.
    /// Idempotent with respect to an already-closed segment.
    pub fn close(&mut self, seal: bool) -> Result<()> {
        self.flush()?;
        self.fd = None;
        if seal {
            self.sealed = true;
        }
        Ok(())
    }

    /// Delete the underlying file. Requires the segment to be closed.
    pub fn unlink<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        if self.fd.is_some() {
            return Err(LogError::Internal(format!(
                "cannot unlink segment {} while its file handle is open",
                self.id
            )));
        }
        let path: PathBuf = dir.as_ref().join(segment_filename(self.id));
        fs::remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn filename_round_trip() {
        assert_eq!(segment_filename(42), "replication-42.db");
        assert_eq!(parse_segment_filename("replication-42.db"), Some(42));
        assert_eq!(parse_segment_filename("replication-.db"), None);
        assert_eq!(parse_segment_filename("replication-abc.db"), None);
        assert_eq!(parse_segment_filename("other-42.db"), None);
        assert_eq!(parse_segment_filename("replication.json"), None);
    }

    #[test]
    fn create_new_then_append_and_close() {
        let dir = TempDir::new().unwrap();
        let mut seg = Segment::create_new(dir.path(), 1).unwrap();
        assert!(!seg.sealed);
        assert!(seg.is_open());

        seg.append(b"hello\n").unwrap();
        assert_eq!(seg.size, 6);
        assert!(!seg.flushed);

        seg.close(true).unwrap();
        assert!(seg.sealed);
        assert!(!seg.is_open());
        assert!(seg.flushed);

        let bytes = fs::read(dir.path().join("replication-1.db")).unwrap();
        assert_eq!(bytes, b"hello\n");
    }

    #[test]
    fn append_after_seal_fails() {
        let dir = TempDir::new().unwrap();
        let mut seg = Segment::create_new(dir.path(), 1).unwrap();
        seg.close(true).unwrap();
        assert!(seg.append(b"x").is_err());
    }

    #[test]
    fn reopen_at_recorded_size() {
        let dir = TempDir::new().unwrap();
        let mut seg = Segment::create_new(dir.path(), 1).unwrap();
        seg.append(b"abc").unwrap();
        seg.close(false).unwrap();

        let mut reopened = Segment::create(1, 1, 3, false);
        reopened.open_append(dir.path()).unwrap();
        assert!(reopened.is_open());
        reopened.append(b"def").unwrap();
        reopened.close(false).unwrap();

        let bytes = fs::read(dir.path().join("replication-1.db")).unwrap();
        assert_eq!(bytes, b"abcdef");
    }

    #[test]
    fn unlink_requires_closed_handle() {
        let dir = TempDir::new().unwrap();
        let seg = Segment::create_new(dir.path(), 1).unwrap();
        assert!(seg.unlink(dir.path()).is_err());
    }
}
