//! In-memory mutation descriptors consumed by the encoder (C1).
//!
//! These types stand in for the markers the (out-of-scope) document storage
//! engine hands the logger, and for the finalized transaction snapshot the
//! (out-of-scope) transaction manager hands the logger once a transaction
//! has committed. The logger never constructs these itself.

use serde_json::Value;

/// The three marker shapes the encoder accepts.
///
/// Anything that doesn't fit one of these variants is, by construction,
/// impossible to represent here — the encoder's "unrecognized marker"
/// failure mode only arises if a caller hands it something outside this
/// enum's shape (e.g. a malformed shaped body), not from a missing enum
/// variant.
#[derive(Debug, Clone)]
pub enum Marker {
    /// A deletion marker: only the document key survives.
    Deletion { key: String },
    /// A plain document marker: key plus a shaped body.
    Document { key: String, body: Value },
    /// An edge marker: key, shaped body, and the two endpoints.
    Edge {
        key: String,
        from: (u64, String),
        to: (u64, String),
        body: Value,
    },
}

impl Marker {
    /// The document key this marker describes.
    pub fn key(&self) -> &str {
        match self {
            Marker::Deletion { key } => key,
            Marker::Document { key, .. } => key,
            Marker::Edge { key, .. } => key,
        }
    }
}

/// The kind of a single document mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOpKind {
    Insert,
    Update,
    Remove,
}

impl DocumentOpKind {
    /// The `<action>` half of the `document-<action>` record type.
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentOpKind::Insert => "insert",
            DocumentOpKind::Update => "update",
            DocumentOpKind::Remove => "remove",
        }
    }

    /// Whether this op kind carries an `oldRev` field.
    pub fn has_old_rev(self) -> bool {
        matches!(self, DocumentOpKind::Update | DocumentOpKind::Remove)
    }
}

/// A single document mutation, as it would appear standalone or nested
/// inside a transaction's per-collection operation vector.
#[derive(Debug, Clone)]
pub struct DocumentOp {
    pub kind: DocumentOpKind,
    pub marker: Marker,
    /// The tick stamped as `_rev` on the marker's `doc` object.
    pub tick: u64,
    /// Previous revision, present iff `kind.has_old_rev()`.
    pub old_rev: Option<u64>,
}

impl DocumentOp {
    pub fn new(kind: DocumentOpKind, marker: Marker, tick: u64, old_rev: Option<u64>) -> Self {
        Self {
            kind,
            marker,
            tick,
            old_rev,
        }
    }
}

/// One collection's operation vector within a committed transaction.
#[derive(Debug, Clone)]
pub struct CollectionOps {
    pub cid: u64,
    pub operations: Vec<DocumentOp>,
}

/// A finalized, committed transaction snapshot handed to the logger by the
/// (out-of-scope) transaction manager.
///
/// Collections are kept in an ordered `Vec`, not a `HashMap`, so that the
/// encoder reproduces the transaction manager's iteration order exactly
/// (per spec §8 scenario S3).
#[derive(Debug, Clone)]
pub struct Transaction {
    pub tid: u64,
    pub collections: Vec<CollectionOps>,
}
