//! Sharded archive format.
//!
//! Один каталог, по файлу `<category>.json.gz` на каждую категорию, в которую
//! попала хотя бы одна запись. Каждая строка - самостоятельный JSON-объект
//! `{"Key":"<base64>","Value":"<base64>"}` + '\n', поэтому файл читается
//! построчно без буферизации целиком. Поля совпадают с JSON-представлением
//! элемента итератора на ноде, так что архив можно загрузить обратно (`import`).

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::ExportError;
use crate::remote::Record;

pub mod reader;

pub use reader::{category_of_file, list_archive_files, ArchiveReader};

pub const ARCHIVE_EXT: &str = ".json.gz";
pub const PLAIN_EXT: &str = ".json";

#[derive(Debug, Serialize)]
struct LineOut {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct LineIn {
    #[serde(rename = "Key", default)]
    key: Option<String>,
    #[serde(rename = "Value", default)]
    value: Option<String>,
}

/// File name of the shard for a category.
pub fn shard_file_name(category: &str) -> String {
    format!("{}{}", category, ARCHIVE_EXT)
}

/// Write one record as a JSON line (with the trailing '\n').
pub fn write_line<W: Write>(w: &mut W, key: &[u8], value: &[u8]) -> Result<()> {
    let line = LineOut {
        key: B64.encode(key),
        value: B64.encode(value),
    };
    serde_json::to_writer(&mut *w, &line)?;
    w.write_all(b"\n")?;
    Ok(())
}

pub fn encode_line(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4 * (key.len() + value.len()) / 3 + 32);
    write_line(&mut out, key, value)?;
    Ok(out)
}

/// Decode one line (trailing "\n"/"\r\n" tolerated). `null` fields decode to empty bytes.
pub fn decode_line(line: &[u8]) -> Result<Record> {
    let line = trim_eol(line);
    let parsed: LineIn = serde_json::from_slice(line)
        .map_err(|e| ExportError::decode(format!("archive line is not a JSON record: {}", e)))?;
    let key = decode_b64("Key", parsed.key)?;
    let value = decode_b64("Value", parsed.value)?;
    Ok(Record { key, value })
}

fn decode_b64(field: &str, v: Option<String>) -> Result<Vec<u8>> {
    match v {
        None => Ok(Vec::new()),
        Some(s) => B64.decode(s.as_bytes()).map_err(|e| {
            ExportError::decode(format!("archive {} is not valid base64: {}", field, e)).into()
        }),
    }
}

fn trim_eol(mut line: &[u8]) -> &[u8] {
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_shape_matches_node_items() {
        let line = encode_line(&[0x10, 0x01], b"v").unwrap();
        assert_eq!(line, b"{\"Key\":\"EAE=\",\"Value\":\"dg==\"}\n".to_vec());
    }

    #[test]
    fn arbitrary_bytes_survive() {
        let key: Vec<u8> = (0u8..=255).collect();
        let value = vec![b'\n', b'"', 0x00, 0xff, b'\\', b'\r'];
        let line = encode_line(&key, &value).unwrap();
        // ровно один перевод строки - в конце
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
        let rec = decode_line(&line).unwrap();
        assert_eq!(rec.key, key);
        assert_eq!(rec.value, value);
    }

    #[test]
    fn null_and_garbage() {
        let rec = decode_line(b"{\"Key\":\"UA==\",\"Value\":null}\r\n").unwrap();
        assert_eq!(rec.key, vec![0x50]);
        assert!(rec.value.is_empty());

        assert!(decode_line(b"not json").is_err());
        assert!(decode_line(b"{\"Key\":\"%%%\",\"Value\":\"\"}").is_err());
    }

    #[test]
    fn shard_names() {
        assert_eq!(shard_file_name("block-hash"), "block-hash.json.gz");
    }
}
