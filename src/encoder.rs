//! C1: the event encoder.
//!
//! Turns a marker/transaction/collection/index descriptor into one
//! canonical JSON record. The encoder never touches I/O — every function
//! here appends into a caller-owned `BytesMut` and returns `Result<()>`, so
//! callers can short-circuit with `?` the same way the original's
//! `APPEND_STRING`/`APPEND_CHAR` macros short-circuited on the first
//! failure, without needing macros of our own.
//!
//! Numeric identifiers (cid, tid, iid, tick, rev) are always written as
//! quoted decimal strings so that values above 2^53 survive a round trip
//! through consumers that parse JSON numbers as IEEE 754 doubles.

use crate::error::Result;
use crate::markers::{CollectionOps, DocumentOp, Marker, Transaction};
use crate::shaper::Shaper;
use bytes::BytesMut;

fn push_decimal(buf: &mut BytesMut, id: u64) {
    buf.extend_from_slice(b"\"");
    let mut tmp = itoa_buf(id);
    buf.extend_from_slice(tmp.as_bytes());
    tmp.clear();
    buf.extend_from_slice(b"\"");
}

/// Minimal decimal formatting without pulling in a dependency: `u64` never
/// needs more than 20 digits.
fn itoa_buf(mut id: u64) -> String {
    if id == 0 {
        return "0".to_string();
    }
    let mut digits = [0u8; 20];
    let mut i = digits.len();
    while id > 0 {
        i -= 1;
        digits[i] = b'0' + (id % 10) as u8;
        id /= 10;
    }
    String::from_utf8_lossy(&digits[i..]).into_owned()
}

fn push_raw(buf: &mut BytesMut, s: &[u8]) {
    buf.extend_from_slice(s);
}

/// Append the `doc` object (`"_key":...,"_rev":...[,"_from":...,"_to":...],<shaped-fields>`)
/// for a document or edge marker, including its surrounding braces, and the
/// record's final closing brace.
fn push_doc_and_close(
    buf: &mut BytesMut,
    marker: &Marker,
    tick: u64,
    shaper: &dyn Shaper,
) -> Result<()> {
    match marker {
        Marker::Deletion { .. } => {
            push_raw(buf, b"}");
            Ok(())
        }
        Marker::Document { key, body } => {
            push_raw(buf, b",\"doc\":{\"_key\":\"");
            push_raw(buf, key.as_bytes());
            push_raw(buf, b"\",\"_rev\":");
            push_decimal(buf, tick);
            shaper.stringify(buf, body, false)?;
            push_raw(buf, b"}}");
            Ok(())
        }
        Marker::Edge {
            key,
            from,
            to,
            body,
        } => {
            push_raw(buf, b",\"doc\":{\"_key\":\"");
            push_raw(buf, key.as_bytes());
            push_raw(buf, b"\",\"_rev\":");
            push_decimal(buf, tick);
            push_raw(buf, b",\"_from\":\"");
            push_decimal_unquoted(buf, from.0);
            push_raw(buf, b"/");
            push_raw(buf, from.1.as_bytes());
            push_raw(buf, b"\",\"_to\":\"");
            push_decimal_unquoted(buf, to.0);
            push_raw(buf, b"/");
            push_raw(buf, to.1.as_bytes());
            push_raw(buf, b"\"");
            shaper.stringify(buf, body, false)?;
            push_raw(buf, b"}}");
            Ok(())
        }
    }
}

/// Like `push_decimal` but without the surrounding quotes, for embedding a
/// numeric cid inline inside a `"cid/key"` handle string.
fn push_decimal_unquoted(buf: &mut BytesMut, id: u64) {
    let s = itoa_buf(id);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a single document operation.
///
/// When `cid` is `Some`, the record carries its own `"cid"` field (the
/// standalone `log_document` entry point); when `None`, the field is
/// omitted because the caller (transaction encoding) already scoped the
/// operation to its parent collection group.
pub fn encode_document_op(
    buf: &mut BytesMut,
    cid: Option<u64>,
    op: &DocumentOp,
    shaper: &dyn Shaper,
) -> Result<()> {
    push_raw(buf, b"{\"type\":\"document-");
    push_raw(buf, op.kind.as_str().as_bytes());
    push_raw(buf, b"\"");
    if let Some(cid) = cid {
        push_raw(buf, b",\"cid\":");
        push_decimal(buf, cid);
    }
    push_raw(buf, b",\"key\":\"");
    push_raw(buf, op.marker.key().as_bytes());
    push_raw(buf, b"\"");

    if op.kind.has_old_rev() {
        if let Some(old_rev) = op.old_rev {
            push_raw(buf, b",\"oldRev\":");
            push_decimal(buf, old_rev);
        }
    }

    push_doc_and_close(buf, &op.marker, op.tick, shaper)
}

/// Encode a committed transaction as a single batched record.
///
/// Collections whose operation vector is empty are skipped entirely.
/// Collections are emitted in the order they appear in `trx.collections`,
/// preserving the transaction manager's own iteration order.
pub fn encode_transaction(
    buf: &mut BytesMut,
    trx: &Transaction,
    shaper: &dyn Shaper,
) -> Result<()> {
    push_raw(buf, b"{\"type\":\"transaction\",\"tid\":");
    push_decimal(buf, trx.tid);
    push_raw(buf, b",\"collections\":{");

    let mut first_collection = true;
    for coll in &trx.collections {
        if coll.operations.is_empty() {
            continue;
        }
        if !first_collection {
            push_raw(buf, b",");
        }
        first_collection = false;
        encode_collection_group(buf, coll, shaper)?;
    }

    push_raw(buf, b"}}");
    Ok(())
}

fn encode_collection_group(
    buf: &mut BytesMut,
    coll: &CollectionOps,
    shaper: &dyn Shaper,
) -> Result<()> {
    push_decimal(buf, coll.cid);
    push_raw(buf, b":{\"cid\":");
    push_decimal(buf, coll.cid);
    push_raw(buf, b",\"operations\":[");
    for (i, op) in coll.operations.iter().enumerate() {
        if i > 0 {
            push_raw(buf, b",");
        }
        encode_document_op(buf, None, op, shaper)?;
    }
    push_raw(buf, b"]}");
    Ok(())
}

/// Encode a `collection-create` or `collection-change` record.
///
/// `collection` is the already-serialized collection descriptor, embedded
/// verbatim (it is produced and trusted by the out-of-scope collection
/// subsystem).
pub fn encode_collection_create_or_change(
    buf: &mut BytesMut,
    kind: &str,
    collection: &serde_json::Value,
) -> Result<()> {
    push_raw(buf, b"{\"type\":\"collection-");
    push_raw(buf, kind.as_bytes());
    push_raw(buf, b"\",\"collection\":");
    let encoded = serde_json::to_vec(collection)?;
    push_raw(buf, &encoded);
    push_raw(buf, b"}");
    Ok(())
}

/// Encode a `collection-drop` record.
pub fn encode_collection_drop(buf: &mut BytesMut, cid: u64) -> Result<()> {
    push_raw(buf, b"{\"type\":\"collection-drop\",\"cid\":");
    push_decimal(buf, cid);
    push_raw(buf, b"}");
    Ok(())
}

/// Encode a `collection-rename` record.
///
/// `name` is passed through unescaped; the caller guarantees it contains no
/// JSON meta-characters.
pub fn encode_collection_rename(buf: &mut BytesMut, cid: u64, name: &str) -> Result<()> {
    push_raw(buf, b"{\"type\":\"collection-rename\",\"cid\":");
    push_decimal(buf, cid);
    push_raw(buf, b",\"name\":\"");
    push_raw(buf, name.as_bytes());
    push_raw(buf, b"\"}");
    Ok(())
}

/// Encode an `index-create` record. `index` is embedded verbatim.
pub fn encode_index_create(
    buf: &mut BytesMut,
    cid: u64,
    index: &serde_json::Value,
) -> Result<()> {
    push_raw(buf, b"{\"type\":\"index-create\",\"cid\":");
    push_decimal(buf, cid);
    push_raw(buf, b",\"index\":");
    let encoded = serde_json::to_vec(index)?;
    push_raw(buf, &encoded);
    push_raw(buf, b"}");
    Ok(())
}

/// Encode an `index-drop` record.
pub fn encode_index_drop(buf: &mut BytesMut, cid: u64, iid: u64) -> Result<()> {
    push_raw(buf, b"{\"type\":\"index-drop\",\"cid\":");
    push_decimal(buf, cid);
    push_raw(buf, b",\"index\":{\"id\":");
    push_decimal(buf, iid);
    push_raw(buf, b"}}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::DocumentOpKind;
    use crate::shaper::JsonShaper;
    use serde_json::json;

    fn buf_str(buf: &BytesMut) -> String {
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn document_insert_matches_scenario_s2() {
        let shaper = JsonShaper;
        let mut buf = BytesMut::new();
        let op = DocumentOp::new(
            DocumentOpKind::Insert,
            Marker::Document {
                key: "a".to_string(),
                body: json!({"x": 1}),
            },
            7,
            None,
        );
        encode_document_op(&mut buf, Some(42), &op, &shaper).unwrap();
        assert_eq!(
            buf_str(&buf),
            r#"{"type":"document-insert","cid":"42","key":"a","doc":{"_key":"a","_rev":"7","x":1}}"#
        );
    }

    #[test]
    fn document_remove_uses_deletion_marker_and_old_rev() {
        let shaper = JsonShaper;
        let mut buf = BytesMut::new();
        let op = DocumentOp::new(
            DocumentOpKind::Remove,
            Marker::Deletion {
                key: "b".to_string(),
            },
            11,
            Some(5),
        );
        encode_document_op(&mut buf, Some(2), &op, &shaper).unwrap();
        assert_eq!(
            buf_str(&buf),
            r#"{"type":"document-remove","cid":"2","key":"b","oldRev":"5"}"#
        );
    }

    #[test]
    fn transaction_batches_collections_in_order() {
        let shaper = JsonShaper;
        let mut buf = BytesMut::new();
        let trx = Transaction {
            tid: 9,
            collections: vec![
                CollectionOps {
                    cid: 1,
                    operations: vec![DocumentOp::new(
                        DocumentOpKind::Insert,
                        Marker::Document {
                            key: "a".to_string(),
                            body: json!({}),
                        },
                        1,
                        None,
                    )],
                },
                CollectionOps {
                    cid: 2,
                    operations: vec![DocumentOp::new(
                        DocumentOpKind::Remove,
                        Marker::Deletion {
                            key: "b".to_string(),
                        },
                        2,
                        Some(5),
                    )],
                },
            ],
        };
        encode_transaction(&mut buf, &trx, &shaper).unwrap();
        let s = buf_str(&buf);
        assert!(s.starts_with(r#"{"type":"transaction","tid":"9","collections":{"#));
        assert!(s.contains(r#""1":{"cid":"1","operations":[{"type":"document-insert","key":"a""#));
        assert!(s.contains(r#""2":{"cid":"2","operations":[{"type":"document-remove","key":"b","oldRev":"5"}]}"#));
    }

    #[test]
    fn transaction_skips_empty_collections() {
        let shaper = JsonShaper;
        let mut buf = BytesMut::new();
        let trx = Transaction {
            tid: 1,
            collections: vec![
                CollectionOps {
                    cid: 1,
                    operations: vec![],
                },
                CollectionOps {
                    cid: 2,
                    operations: vec![DocumentOp::new(
                        DocumentOpKind::Insert,
                        Marker::Deletion {
                            key: "k".to_string(),
                        },
                        1,
                        None,
                    )],
                },
            ],
        };
        encode_transaction(&mut buf, &trx, &shaper).unwrap();
        let s = buf_str(&buf);
        assert!(!s.contains("\"1\":{"));
        assert!(s.contains("\"2\":{"));
    }

    #[test]
    fn collection_create_embeds_verbatim_json() {
        let mut buf = BytesMut::new();
        encode_collection_create_or_change(&mut buf, "create", &json!({"name": "users"}))
            .unwrap();
        assert_eq!(
            buf_str(&buf),
            r#"{"type":"collection-create","collection":{"name":"users"}}"#
        );
    }

    #[test]
    fn collection_drop_and_rename() {
        let mut buf = BytesMut::new();
        encode_collection_drop(&mut buf, 7).unwrap();
        assert_eq!(buf_str(&buf), r#"{"type":"collection-drop","cid":"7"}"#);

        let mut buf = BytesMut::new();
        encode_collection_rename(&mut buf, 7, "renamed").unwrap();
        assert_eq!(
            buf_str(&buf),
            r#"{"type":"collection-rename","cid":"7","name":"renamed"}"#
        );
    }

    #[test]
    fn index_create_and_drop() {
        let mut buf = BytesMut::new();
        encode_index_create(&mut buf, 3, &json!({"type": "hash", "fields": ["a"]})).unwrap();
        assert_eq!(
            buf_str(&buf),
            r#"{"type":"index-create","cid":"3","index":{"fields":["a"],"type":"hash"}}"#
        );

        let mut buf = BytesMut::new();
        encode_index_drop(&mut buf, 3, 99).unwrap();
        assert_eq!(
            buf_str(&buf),
            r#"{"type":"index-drop","cid":"3","index":{"id":"99"}}"#
        );
    }

    #[test]
    fn edge_marker_embeds_from_and_to() {
        let shaper = JsonShaper;
        let mut buf = BytesMut::new();
        let op = DocumentOp::new(
            DocumentOpKind::Insert,
            Marker::Edge {
                key: "e1".to_string(),
                from: (10, "a".to_string()),
                to: (20, "b".to_string()),
                body: json!({}),
            },
            3,
            None,
        );
        encode_document_op(&mut buf, Some(5), &op, &shaper).unwrap();
        assert_eq!(
            buf_str(&buf),
            r#"{"type":"document-insert","cid":"5","key":"e1","doc":{"_key":"e1","_rev":"3","_from":"10/a","_to":"20/b"}}"#
        );
    }

    #[test]
    fn ids_above_2_pow_53_round_trip_as_strings() {
        let huge = (1u64 << 53) + 12345;
        let mut buf = BytesMut::new();
        encode_collection_drop(&mut buf, huge).unwrap();
        let s = buf_str(&buf);
        let parsed: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(parsed["cid"].as_str().unwrap(), huge.to_string());
    }

    #[quickcheck_macros::quickcheck]
    fn prop_cid_iid_tick_round_trip_exactly(cid: u64, iid: u64, tick: u64) -> bool {
        let shaper = JsonShaper;

        let mut buf = BytesMut::new();
        encode_index_drop(&mut buf, cid, iid).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&buf_str(&buf)).unwrap();
        let index_drop_ok = parsed["cid"].as_str() == Some(cid.to_string().as_str())
            && parsed["index"]["id"].as_str() == Some(iid.to_string().as_str());

        let mut buf = BytesMut::new();
        let op = DocumentOp::new(
            DocumentOpKind::Insert,
            Marker::Document {
                key: "k".to_string(),
                body: json!({}),
            },
            tick,
            None,
        );
        encode_document_op(&mut buf, Some(cid), &op, &shaper).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&buf_str(&buf)).unwrap();
        let document_ok = parsed["cid"].as_str() == Some(cid.to_string().as_str())
            && parsed["doc"]["_rev"].as_str() == Some(tick.to_string().as_str());

        index_drop_ok && document_ok
    }
}
