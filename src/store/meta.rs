// src/store/meta.rs - native store meta (v1)
//
// Формат <root>/meta (LE):
// MAGIC8 = "P2KVMETA"
// u32 version         = 1
// u64 record_count    (записей в data.log на момент последнего close)
// u8  clean_shutdown  (1=clean, 0=writer не закрылся штатно)
//
// Политика:
// - Атомарная запись: tmp+rename, затем fsync родительского каталога (best‑effort на Windows).

use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
#[cfg(unix)]
use std::fs::File;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const META_MAGIC: &[u8; 8] = b"P2KVMETA";
const META_FILE: &str = "meta";
pub const META_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMeta {
    pub version: u32,
    pub record_count: u64,
    pub clean_shutdown: bool,
}

impl Default for StoreMeta {
    fn default() -> Self {
        Self {
            version: META_VERSION,
            record_count: 0,
            clean_shutdown: true,
        }
    }
}

#[inline]
fn meta_path(root: &Path) -> PathBuf {
    root.join(META_FILE)
}

#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Записать meta через tmp+rename (создаёт или перезаписывает).
pub fn write_meta(root: &Path, m: &StoreMeta) -> Result<()> {
    let path = meta_path(root);
    let tmp = root.join(format!("{}.tmp", META_FILE));
    let _ = fs::remove_file(&tmp);

    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .with_context(|| format!("open meta tmp {}", tmp.display()))?;

    f.write_all(META_MAGIC)?;
    f.write_u32::<LittleEndian>(m.version)?;
    f.write_u64::<LittleEndian>(m.record_count)?;
    f.write_u8(if m.clean_shutdown { 1 } else { 0 })?;
    f.sync_all()?;

    fs::rename(&tmp, &path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    let _ = fsync_dir(&path);
    Ok(())
}

pub fn read_meta(root: &Path) -> Result<StoreMeta> {
    let path = meta_path(root);
    let mut f = OpenOptions::new()
        .read(true)
        .open(&path)
        .with_context(|| format!("open meta {}", path.display()))?;

    let mut magic = [0u8; 8];
    f.read_exact(&mut magic)?;
    if &magic != META_MAGIC {
        return Err(anyhow!(
            "bad meta magic at {} (expected {:?}, got {:?})",
            path.display(),
            META_MAGIC,
            magic
        ));
    }

    let version = f.read_u32::<LittleEndian>()?;
    if version != META_VERSION {
        return Err(anyhow!(
            "unsupported store meta version {} at {}",
            version,
            path.display()
        ));
    }
    let record_count = f.read_u64::<LittleEndian>()?;
    let clean_shutdown = f.read_u8()? == 1;

    Ok(StoreMeta {
        version,
        record_count,
        clean_shutdown,
    })
}
