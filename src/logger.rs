//! C5: the logger core.
//!
//! Ties the encoder (C1), segment descriptors (C2), directory manager (C3)
//! and manifest (C4) together behind a single reader/writer lock, exposing
//! the operation-specific entry points a host process calls for every
//! primary-side mutation.

use crate::clock::{AtomicClock, Clock};
use crate::directory::{enforce_retention, startup_scan};
use crate::encoder;
use crate::error::{LogError, Result};
use crate::manifest::Manifest;
use crate::markers::{CollectionOps, DocumentOp, DocumentOpKind, Marker, Transaction};
use crate::segment::Segment;
use crate::shaper::{JsonShaper, Shaper};
use bytes::BytesMut;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Immutable logger configuration, fixed for the lifetime of a `Logger`.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Directory holding segment files and the manifest.
    pub path: PathBuf,
    /// Rotation threshold, in bytes.
    pub log_size: u64,
    /// Retention count; segments beyond this are pruned once sealed.
    pub max_logs: usize,
    /// Segment close and rotation always fsync; setting this additionally
    /// forces an fsync after every single append, for hosts that need
    /// per-write durability over rotation-only durability (see §9).
    pub wait_for_sync: bool,
}

impl LoggerConfig {
    pub fn new(path: impl Into<PathBuf>, log_size: u64, max_logs: usize, wait_for_sync: bool) -> Self {
        Self {
            path: path.into(),
            log_size,
            max_logs: max_logs.max(1),
            wait_for_sync,
        }
    }
}

struct LoggerState {
    active: bool,
    segments: Vec<Segment>,
}

/// The replication event logger.
///
/// A `Logger` is constructed against an existing, writable directory (the
/// directory is scanned and the manifest reconciled at construction time)
/// and sits inactive until `start` is called. All mutating operations
/// acquire the writer lock for their full duration; see §5.
pub struct Logger {
    config: LoggerConfig,
    clock: Arc<dyn Clock>,
    shaper: Arc<dyn Shaper>,
    state: RwLock<LoggerState>,
}

impl Logger {
    /// Construct a logger against `config.path`, using `clock` for tick
    /// allocation and `shaper` for stringifying shaped document bodies.
    pub fn new(config: LoggerConfig, clock: Arc<dyn Clock>, shaper: Arc<dyn Shaper>) -> Result<Self> {
        let segments = startup_scan(&config.path)?;
        Ok(Self {
            config,
            clock,
            shaper,
            state: RwLock::new(LoggerState {
                active: false,
                segments,
            }),
        })
    }

    /// Construct a logger with the built-in `AtomicClock` and `JsonShaper`,
    /// convenient for tests and hosts with no more elaborate collaborators.
    pub fn with_defaults(config: LoggerConfig) -> Result<Self> {
        Self::new(config, Arc::new(AtomicClock::default()), Arc::new(JsonShaper))
    }

    /// Number of segments currently known (sealed + unsealed).
    pub fn segment_count(&self) -> usize {
        self.lock_read().segments.len()
    }

    /// Snapshot of known segment ids, sorted ascending, for diagnostics and
    /// tests.
    pub fn segment_ids(&self) -> Vec<u64> {
        self.lock_read().segments.iter().map(|s| s.id).collect()
    }

    pub fn is_active(&self) -> bool {
        self.lock_read().active
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, LoggerState> {
        self.state.read().expect("Logger poisoned read lock")
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, LoggerState> {
        self.state.write().expect("Logger poisoned write lock")
    }

    /// Activate the logger: applies retention, then reopens the tail
    /// unsealed segment or creates a fresh one, and resaves the manifest.
    /// Fails if already active.
    pub fn start(&self) -> Result<()> {
        let mut guard = self.lock_write();
        if guard.active {
            return Err(LogError::Internal("logger already active".into()));
        }

        enforce_retention(&self.config.path, &mut guard.segments, self.config.max_logs)?;

        let reopen = matches!(guard.segments.last(), Some(seg) if !seg.sealed);
        if reopen {
            let idx = guard.segments.len() - 1;
            guard.segments[idx].open_append(&self.config.path)?;
        } else {
            let id = self.clock.next_tick();
            let segment = Segment::create_new(&self.config.path, id)?;
            guard.segments.push(segment);
        }

        guard.active = true;
        tracing::info!(path = %self.config.path.display(), "replication logger started");
        self.save_manifest_locked(&guard)
    }

    /// Deactivate the logger: flushes and closes (without sealing) the
    /// active segment, and resaves the manifest. Fails if not active.
    pub fn stop(&self) -> Result<()> {
        let mut guard = self.lock_write();
        if !guard.active {
            return Err(LogError::Internal("logger not active".into()));
        }

        if let Some(segment) = guard.segments.last_mut() {
            segment.close(false)?;
        }
        guard.active = false;
        tracing::info!(path = %self.config.path.display(), "replication logger stopped");
        self.save_manifest_locked(&guard)
    }

    fn save_manifest_locked(&self, guard: &LoggerState) -> Result<()> {
        let manifest = Manifest::from_segments(&guard.segments);
        match manifest.save(&self.config.path) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "failed to save replication manifest");
                Err(e)
            }
        }
    }

    /// Encode-then-append the common path shared by every `log_*` entry
    /// point: a no-op, successful return when the logger is inactive, an
    /// append against the active segment (with conditional rotation)
    /// otherwise.
    fn append_record(&self, buf: &[u8]) -> Result<()> {
        let mut guard = self.lock_write();
        if !guard.active {
            tracing::debug!("discarding replication event: logger inactive");
            return Ok(());
        }

        let idx = match guard.segments.len().checked_sub(1) {
            Some(idx) => idx,
            None => return Err(LogError::Internal("no active segment to append to".into())),
        };

        {
            let segment = &mut guard.segments[idx];
            if segment.sealed || !segment.is_open() {
                return Err(LogError::Internal(format!(
                    "active segment {} is not writable",
                    segment.id
                )));
            }
            segment.append(buf)?;
            if self.config.wait_for_sync {
                segment.flush()?;
            }
        }

        let needs_rotation = guard.segments[idx].size >= self.config.log_size;
        if needs_rotation {
            self.rotate_locked(&mut guard)?;
        }
        Ok(())
    }

    fn rotate_locked(&self, guard: &mut LoggerState) -> Result<()> {
        if let Some(segment) = guard.segments.last_mut() {
            segment.close(true)?;
            tracing::info!(segment = segment.id, "sealed segment on rotation");
        }

        enforce_retention(&self.config.path, &mut guard.segments, self.config.max_logs)?;

        let new_id = self.clock.next_tick();
        let new_segment = Segment::create_new(&self.config.path, new_id)?;
        tracing::info!(segment = new_segment.id, "opened new segment on rotation");
        guard.segments.push(new_segment);

        self.save_manifest_locked(guard)
    }

    fn encode_and_append(&self, f: impl FnOnce(&mut BytesMut, &dyn Shaper) -> Result<()>) -> Result<()> {
        let mut buf = BytesMut::with_capacity(256);
        f(&mut buf, self.shaper.as_ref())?;
        buf.extend_from_slice(b"\n");
        self.append_record(&buf)
    }

    /// Log a single document mutation. `tick` is the revision stamped on
    /// the marker's `doc` object (already allocated by the caller, e.g.
    /// from the same external clock the logger uses for segment ids).
    pub fn log_document(
        &self,
        cid: u64,
        kind: DocumentOpKind,
        tick: u64,
        marker: Marker,
        old_rev: Option<u64>,
    ) -> Result<()> {
        let op = DocumentOp::new(kind, marker, tick, old_rev);
        self.encode_and_append(|buf, shaper| encoder::encode_document_op(buf, Some(cid), &op, shaper))
    }

    /// Log a finalized, committed transaction as one batched record.
    pub fn log_transaction(&self, trx: Transaction) -> Result<()> {
        self.encode_and_append(|buf, shaper| encoder::encode_transaction(buf, &trx, shaper))
    }

    pub fn log_create_collection(&self, collection: Value) -> Result<()> {
        self.encode_and_append(|buf, _| {
            encoder::encode_collection_create_or_change(buf, "create", &collection)
        })
    }

    pub fn log_change_properties(&self, collection: Value) -> Result<()> {
        self.encode_and_append(|buf, _| {
            encoder::encode_collection_create_or_change(buf, "change", &collection)
        })
    }

    pub fn log_drop_collection(&self, cid: u64) -> Result<()> {
        self.encode_and_append(|buf, _| encoder::encode_collection_drop(buf, cid))
    }

    pub fn log_rename_collection(&self, cid: u64, name: &str) -> Result<()> {
        self.encode_and_append(|buf, _| encoder::encode_collection_rename(buf, cid, name))
    }

    pub fn log_create_index(&self, cid: u64, index: Value) -> Result<()> {
        self.encode_and_append(|buf, _| encoder::encode_index_create(buf, cid, &index))
    }

    pub fn log_drop_index(&self, cid: u64, iid: u64) -> Result<()> {
        self.encode_and_append(|buf, _| encoder::encode_index_drop(buf, cid, iid))
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        let mut guard = self.lock_write();
        if guard.active {
            if let Some(segment) = guard.segments.last_mut() {
                let _ = segment.close(false);
            }
            guard.active = false;
        }
        let manifest = Manifest::from_segments(&guard.segments);
        if let Err(e) = manifest.save(&self.config.path) {
            tracing::error!(error = %e, "failed to save replication manifest on drop");
        }
    }
}

/// Helper re-exported for callers that want to build a `CollectionOps`
/// group without importing `markers` directly.
pub fn collection_ops(cid: u64, operations: Vec<DocumentOp>) -> CollectionOps {
    CollectionOps { cid, operations }
}
