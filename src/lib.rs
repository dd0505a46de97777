//! replog: a durable, rotating replication event logger for a document
//! database.
//!
//! This crate is the logfile lifecycle manager, event serializer, and
//! write path for a primary-side replication log: an append-only,
//! rotating sequence of newline-delimited JSON records that downstream
//! replicas consume to mirror primary state. It does not implement the
//! document storage engine, the transaction manager, tick allocation, or
//! any network/HTTP surface — those are external collaborators, consumed
//! here only through the narrow `Clock`/`Shaper` traits and the
//! `Marker`/`Transaction` descriptor types.
//!
//! # Example
//!
//! ```no_run
//! use replog::prelude::*;
//! use serde_json::json;
//!
//! # fn example() -> replog::error::Result<()> {
//! let config = LoggerConfig::new("/var/lib/mydb/replication", 32 * 1024 * 1024, 10, true);
//! let logger = Logger::with_defaults(config)?;
//! logger.start()?;
//!
//! logger.log_document(
//!     42,
//!     DocumentOpKind::Insert,
//!     7,
//!     Marker::Document { key: "a".to_string(), body: json!({"x": 1}) },
//!     None,
//! )?;
//!
//! logger.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod directory;
pub mod encoder;
pub mod error;
pub mod logger;
pub mod manifest;
pub mod markers;
pub mod segment;
pub mod shaper;

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::clock::{AtomicClock, Clock};
    pub use crate::error::{LogError, Result};
    pub use crate::logger::{collection_ops, Logger, LoggerConfig};
    pub use crate::manifest::{Manifest, ManifestEntry};
    pub use crate::markers::{CollectionOps, DocumentOp, DocumentOpKind, Marker, Transaction};
    pub use crate::segment::Segment;
    pub use crate::shaper::{JsonShaper, Shaper};
}
