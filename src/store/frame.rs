//! store/frame - кадры data.log нативного store.
//!
//! Формат файла (LE):
//!   header16 = MAGIC8 "P2KVLOG1" | u32 version | u32 reserved
//!   далее записи: [crc32c u32][key_len u32][val_len u32][key][value]
//!
//! CRC32C считается по header[4..12] (длины) + key + value.
//! Частичный хвост (обрыв посреди заголовка или payload) - нормальный EOF;
//! полная запись с неверным CRC - ошибка.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Write};

pub const LOG_FILE: &str = "data.log";
pub const LOG_MAGIC: &[u8; 8] = b"P2KVLOG1";
pub const LOG_VERSION: u32 = 1;
pub const LOG_HDR_SIZE: usize = 16;

pub const REC_HDR_SIZE: usize = 12;
const REC_OFF_CRC32: usize = 0;
const REC_OFF_KEY_LEN: usize = 4;
const REC_OFF_VAL_LEN: usize = 8;

pub fn log_header() -> [u8; LOG_HDR_SIZE] {
    let mut h = [0u8; LOG_HDR_SIZE];
    h[..8].copy_from_slice(LOG_MAGIC);
    LittleEndian::write_u32(&mut h[8..12], LOG_VERSION);
    h
}

pub fn check_log_header(h: &[u8]) -> Result<()> {
    if h.len() < LOG_HDR_SIZE || &h[..8] != LOG_MAGIC {
        return Err(anyhow!("bad data.log header magic"));
    }
    let v = LittleEndian::read_u32(&h[8..12]);
    if v != LOG_VERSION {
        return Err(anyhow!("unsupported data.log version {}", v));
    }
    Ok(())
}

fn record_crc(lens: &[u8], key: &[u8], value: &[u8]) -> u32 {
    let c = crc32c::crc32c_append(0, lens);
    let c = crc32c::crc32c_append(c, key);
    crc32c::crc32c_append(c, value)
}

/// Записать одну запись; возвращает число записанных байт.
pub fn write_record<W: Write>(w: &mut W, key: &[u8], value: &[u8]) -> Result<usize> {
    if key.len() > u32::MAX as usize || value.len() > u32::MAX as usize {
        return Err(anyhow!(
            "record too large for data.log: key={} B, value={} B (max {} each)",
            key.len(),
            value.len(),
            u32::MAX
        ));
    }

    let mut hdr = [0u8; REC_HDR_SIZE];
    LittleEndian::write_u32(&mut hdr[REC_OFF_KEY_LEN..REC_OFF_KEY_LEN + 4], key.len() as u32);
    LittleEndian::write_u32(&mut hdr[REC_OFF_VAL_LEN..REC_OFF_VAL_LEN + 4], value.len() as u32);
    let crc = record_crc(&hdr[REC_OFF_KEY_LEN..], key, value);
    LittleEndian::write_u32(&mut hdr[REC_OFF_CRC32..REC_OFF_CRC32 + 4], crc);

    w.write_all(&hdr)?;
    w.write_all(key)?;
    w.write_all(value)?;
    Ok(REC_HDR_SIZE + key.len() + value.len())
}

/// Read exactly `buf.len()` bytes; Ok(false) on a clean or partial EOF.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<bool> {
    match r.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Прочитать следующую запись. None - конец лога (включая частичный хвост).
///
/// `avail` - сколько байт лога осталось от начала записи. Длины из заголовка,
/// выходящие за него, трактуются как хвост без аллокации payload; отличить
/// такой хвост от порчи длины может только вызывающий (по meta).
pub fn read_record<R: Read>(r: &mut R, avail: u64) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    let mut hdr = [0u8; REC_HDR_SIZE];
    if !read_full(r, &mut hdr)? {
        return Ok(None);
    }
    let key_len = LittleEndian::read_u32(&hdr[REC_OFF_KEY_LEN..REC_OFF_KEY_LEN + 4]) as usize;
    let val_len = LittleEndian::read_u32(&hdr[REC_OFF_VAL_LEN..REC_OFF_VAL_LEN + 4]) as usize;
    let need = (REC_HDR_SIZE + key_len + val_len) as u64;
    if need > avail {
        return Ok(None);
    }
    let crc_expected = LittleEndian::read_u32(&hdr[REC_OFF_CRC32..REC_OFF_CRC32 + 4]);

    let mut key = vec![0u8; key_len];
    if !read_full(r, &mut key)? {
        return Ok(None);
    }
    let mut value = vec![0u8; val_len];
    if !read_full(r, &mut value)? {
        return Ok(None);
    }

    let crc_actual = record_crc(&hdr[REC_OFF_KEY_LEN..], &key, &value);
    if crc_actual != crc_expected {
        return Err(anyhow!(
            "data.log CRC mismatch (expected {:08x}, got {:08x})",
            crc_expected,
            crc_actual
        ));
    }
    Ok(Some((key, value)))
}
