//! The shaped-document stringifier.
//!
//! In the real system the document storage engine keeps documents in a
//! compact "shaped" binary form and only the shaper knows how to turn one
//! back into JSON. The logger never sees that binary form: it receives an
//! already-shaped value (here, a `serde_json::Value` object) and asks the
//! shaper to append its fields into the event buffer. This module defines
//! that narrow collaborator interface plus a default implementation good
//! enough for tests and for hosts that hand the logger plain JSON bodies
//! directly.

use crate::error::{LogError, Result};
use bytes::BytesMut;
use serde_json::Value;

/// Stringifies a shaped document body into a buffer.
///
/// The logger never escapes document fields itself; it delegates all of
/// that to the shaper, exactly as the original engine's
/// `TRI_StringifyArrayShapedJson` did.
pub trait Shaper: Send + Sync {
    /// Append `shaped`'s fields into `buf`.
    ///
    /// When `with_braces` is `true`, the value is appended as a complete,
    /// self-contained JSON object (`{...}`). When `false`, only the
    /// field list is appended, each prefixed with a comma, so the caller
    /// can splice it into an object it is already building (e.g. the
    /// `doc` object of a document-insert record, which starts with
    /// `_key`/`_rev` fields written by the encoder itself).
    fn stringify(&self, buf: &mut BytesMut, shaped: &Value, with_braces: bool) -> Result<()>;
}

/// Default shaper backed directly by `serde_json`.
///
/// `shaped` is expected to be a JSON object; anything else is rejected as
/// an internal error since a shaped document body is always a field map.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonShaper;

impl Shaper for JsonShaper {
    fn stringify(&self, buf: &mut BytesMut, shaped: &Value, with_braces: bool) -> Result<()> {
        let obj = shaped
            .as_object()
            .ok_or_else(|| LogError::Internal("shaped document body is not an object".into()))?;

        if with_braces {
            buf.extend_from_slice(b"{");
        }
        for (key, value) in obj {
            buf.extend_from_slice(b",\"");
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(b"\":");
            let encoded = serde_json::to_vec(value)?;
            buf.extend_from_slice(&encoded);
        }
        if with_braces {
            buf.extend_from_slice(b"}");
        }
        Ok(())
    }
}
