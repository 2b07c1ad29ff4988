//! remote - методы DB.* удалённого хранилища.
//!
//! Контракт сервиса (как он зарегистрирован на ноде):
//!   DB.OpenSnapshot()                                   -> {"snapshot": <opaque>}
//!   DB.GetIterator({snapshot, prefix, options})         -> {"items": [{"Key","Value"}], "limit": N}
//!   DB.ReleaseSnapshot({snapshot})                      -> ack
//!
//! Кодирование на проводе:
//! - prefix: JSON-строка из одного символа с кодом байта префикса;
//! - options.cursor: base64 последнего увиденного ключа или null;
//! - Key/Value: base64 (null => пустые байты).

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::ExportError;
use crate::prefix::Category;
use crate::rpc::RpcCall;

pub const METHOD_OPEN_SNAPSHOT: &str = "DB.OpenSnapshot";
pub const METHOD_GET_ITERATOR: &str = "DB.GetIterator";
pub const METHOD_RELEASE_SNAPSHOT: &str = "DB.ReleaseSnapshot";

/// Opaque snapshot handle as returned by the service; echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub Value);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

/// One exported (key, value) pair; raw bytes, no encoding assumptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterOptions {
    pub limit: u64,
    pub reverse: bool,
    /// base64 of the last key of the previous page.
    pub cursor: Option<String>,
}

impl IterOptions {
    pub fn forward(limit: u64, cursor: Option<&[u8]>) -> Self {
        Self {
            limit,
            reverse: false,
            cursor: cursor.map(|c| B64.encode(c)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireItem {
    #[serde(rename = "Key", default)]
    key: Option<String>,
    #[serde(rename = "Value", default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePage {
    #[serde(default)]
    items: Option<Vec<WireItem>>,
    #[serde(default)]
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireSnapshot {
    snapshot: Value,
}

/// Decoded iterator page.
#[derive(Debug, Clone)]
pub struct IteratorPage {
    pub items: Vec<Record>,
    /// Limit echoed by the service, if any.
    pub limit: Option<u64>,
}

fn decode_field(field: &'static str, v: Option<String>) -> Result<Vec<u8>> {
    match v {
        None => Ok(Vec::new()),
        Some(s) => B64
            .decode(s.as_bytes())
            .map_err(|e| ExportError::decode(format!("{} is not valid base64: {}", field, e)).into()),
    }
}

pub fn open_snapshot<C: RpcCall + ?Sized>(c: &mut C) -> Result<SnapshotId> {
    let result = c.call(METHOD_OPEN_SNAPSHOT, Vec::new())?;
    let snap: WireSnapshot = serde_json::from_value(result)
        .map_err(|e| ExportError::decode(format!("{} result: {}", METHOD_OPEN_SNAPSHOT, e)))?;
    if snap.snapshot.is_null() {
        return Err(ExportError::decode(format!("{} returned null snapshot", METHOD_OPEN_SNAPSHOT)).into());
    }
    Ok(SnapshotId(snap.snapshot))
}

pub fn get_iterator<C: RpcCall + ?Sized>(
    c: &mut C,
    snapshot: &SnapshotId,
    category: &Category,
    opts: &IterOptions,
) -> Result<IteratorPage> {
    let params = vec![json!({
        "snapshot": snapshot,
        "prefix": category.wire_prefix(),
        "options": opts,
    })];
    let result = c.call(METHOD_GET_ITERATOR, params)?;
    let page: WirePage = serde_json::from_value(result)
        .map_err(|e| ExportError::decode(format!("{} result: {}", METHOD_GET_ITERATOR, e)))?;

    let wire = page.items.unwrap_or_default();
    let mut items = Vec::with_capacity(wire.len());
    for (i, it) in wire.into_iter().enumerate() {
        let key = decode_field("Key", it.key)
            .with_context(|| format!("{} item #{}", category.name, i))?;
        let value = decode_field("Value", it.value)
            .with_context(|| format!("{} item #{}", category.name, i))?;
        items.push(Record { key, value });
    }

    Ok(IteratorPage {
        items,
        limit: page.limit,
    })
}

/// Release the snapshot; returns the acknowledgement payload as is.
pub fn release_snapshot<C: RpcCall + ?Sized>(c: &mut C, snapshot: &SnapshotId) -> Result<Value> {
    c.call(METHOD_RELEASE_SNAPSHOT, vec![json!({ "snapshot": snapshot })])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned {
        seen: Vec<(String, Vec<Value>)>,
        reply: Value,
    }

    impl RpcCall for Canned {
        fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value> {
            self.seen.push((method.to_string(), params));
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn iterator_request_and_decode() {
        let mut c = Canned {
            seen: Vec::new(),
            reply: json!({"items": [{"Key": "EAE=", "Value": null}, {"Key": "EAI=", "Value": "/wA="}], "limit": 2}),
        };
        let cat = Category::new("block-transaction-hash", 0x10);
        let snap = SnapshotId(json!("snap-1"));
        let page = get_iterator(&mut c, &snap, &cat, &IterOptions::forward(2, Some(&[0x10u8, 0x00][..]))).unwrap();

        assert_eq!(page.limit, Some(2));
        assert_eq!(page.items[0], Record { key: vec![0x10, 0x01], value: vec![] });
        assert_eq!(page.items[1].value, vec![0xff, 0x00]);

        let (method, params) = &c.seen[0];
        assert_eq!(method, METHOD_GET_ITERATOR);
        assert_eq!(
            params[0],
            json!({
                "snapshot": "snap-1",
                "prefix": "\u{10}",
                "options": {"limit": 2, "reverse": false, "cursor": "EAA="}
            })
        );
    }

    #[test]
    fn bad_base64_is_decode_error() {
        let mut c = Canned {
            seen: Vec::new(),
            reply: json!({"items": [{"Key": "***", "Value": ""}], "limit": 10}),
        };
        let cat = Category::new("internal", 0x50);
        let err = get_iterator(&mut c, &SnapshotId(json!("s")), &cat, &IterOptions::forward(10, None))
            .unwrap_err();
        assert!(matches!(
            crate::error::find_export_error(&err),
            Some(ExportError::Decode(_))
        ));
    }

    #[test]
    fn open_snapshot_extracts_id() {
        let mut c = Canned {
            seen: Vec::new(),
            reply: json!({"snapshot": "0b1f"}),
        };
        let s = open_snapshot(&mut c).unwrap();
        assert_eq!(s.to_string(), "0b1f");
        assert!(c.seen[0].1.is_empty());
    }
}
