//! Native store: append-only key/value log with a meta file and a writer lock.
//!
//! Раскладка каталога:
//! - <root>/LOCK      - fs2 advisory lock (exclusive у writer'а, shared у читателей);
//! - <root>/meta      - magic/version/record_count/clean_shutdown (tmp+rename);
//! - <root>/data.log  - header16 + кадры [crc32c][key_len][val_len][key][value].
//!
//! Экспортёр пользуется только контрактом put/close; open_ro/scan_stream нужны
//! для `scan`, `import` и тестов.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub mod lock;
pub mod frame;
pub mod meta;

use self::lock::{try_acquire_lock, LockGuard, LockMode};
use self::frame::{
    check_log_header, log_header, read_record, write_record, LOG_FILE, LOG_HDR_SIZE, REC_HDR_SIZE,
};
use self::meta::{read_meta, write_meta, StoreMeta};
use crate::error::ExportError;
use crate::metrics::record_store_put;

/// True if `p` does not exist or is an empty directory.
pub fn is_absent_or_empty_dir(p: &Path) -> Result<bool> {
    match fs::symlink_metadata(p) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e).with_context(|| format!("stat {}", p.display())),
        Ok(md) if md.is_dir() => {
            let mut it = fs::read_dir(p).with_context(|| format!("read_dir {}", p.display()))?;
            Ok(it.next().is_none())
        }
        Ok(_) => Ok(false),
    }
}

/// Writer handle. Exactly one per store directory (exclusive LOCK).
pub struct Store {
    root: PathBuf,
    writer: Option<BufWriter<File>>,
    records: u64,
    bytes: u64,
    fsync: bool,
    lock: Option<LockGuard>,
}

impl Store {
    /// Create a new store at `root`. The directory must be absent or empty.
    pub fn create(root: &Path, fsync: bool) -> Result<Self> {
        if !is_absent_or_empty_dir(root)? {
            return Err(ExportError::precondition(format!(
                "store directory {} exists and is not empty",
                root.display()
            ))
            .into());
        }
        fs::create_dir_all(root).with_context(|| format!("create store dir {}", root.display()))?;

        let lock = try_acquire_lock(root, LockMode::Exclusive)?;

        // dirty до штатного close()
        write_meta(
            root,
            &StoreMeta {
                clean_shutdown: false,
                ..StoreMeta::default()
            },
        )?;

        let log_path = root.join(LOG_FILE);
        let f = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&log_path)
            .with_context(|| format!("create {}", log_path.display()))?;
        let mut writer = BufWriter::with_capacity(1 << 20, f);
        writer.write_all(&log_header())?;

        debug!("store: created {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            writer: Some(writer),
            records: 0,
            bytes: 0,
            fsync,
            lock: Some(lock),
        })
    }

    /// Open an existing store for reading (shared LOCK).
    pub fn open_ro(root: &Path) -> Result<StoreReader> {
        StoreReader::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let w = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("store {} is closed", self.root.display()))?;
        let n = write_record(w, key, value)?;
        self.records += 1;
        self.bytes += n as u64;
        record_store_put();
        Ok(())
    }

    /// Flush the log, optionally fsync, mark the store clean and release LOCK. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        let Some(w) = self.writer.take() else {
            return Ok(());
        };
        let f = w
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flush {}: {}", LOG_FILE, e.error()))?;
        if self.fsync {
            f.sync_all()
                .with_context(|| format!("fsync {}", self.root.join(LOG_FILE).display()))?;
        }
        write_meta(
            &self.root,
            &StoreMeta {
                record_count: self.records,
                clean_shutdown: true,
                ..StoreMeta::default()
            },
        )?;
        debug!(
            "store: closed {} ({} records, {} B)",
            self.root.display(),
            self.records,
            self.bytes
        );
        self.lock = None;
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.close() {
                warn!("store: close on drop failed for {}: {:#}", self.root.display(), e);
            }
        }
    }
}

/// Read-only view of a store directory.
pub struct StoreReader {
    root: PathBuf,
    meta: StoreMeta,
    _lock: LockGuard,
}

impl StoreReader {
    pub fn open(root: &Path) -> Result<Self> {
        let lock = try_acquire_lock(root, LockMode::Shared)?;
        let meta = read_meta(root)?;
        if !meta.clean_shutdown {
            warn!(
                "store: {} was not closed cleanly; reading up to the last complete record",
                root.display()
            );
        }
        Ok(Self {
            root: root.to_path_buf(),
            meta,
            _lock: lock,
        })
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    /// Stream every record (log order), optionally filtered by key prefix.
    /// Returns the number of records passed to `f`.
    ///
    /// A store closed cleanly must end exactly at its last record and hold
    /// `meta.record_count` records; anything else is reported as corruption.
    /// For a dirty store a short tail is dropped with a warning.
    pub fn scan_stream<F>(&self, prefix: Option<&[u8]>, mut f: F) -> Result<u64>
    where
        F: FnMut(&[u8], &[u8]),
    {
        let path = self.root.join(LOG_FILE);
        let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let file_len = file
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        let mut r = BufReader::with_capacity(1 << 20, file);

        let mut hdr = [0u8; LOG_HDR_SIZE];
        r.read_exact(&mut hdr)
            .with_context(|| format!("read header of {}", path.display()))?;
        check_log_header(&hdr)?;

        let mut pos = LOG_HDR_SIZE as u64;
        let mut seen = 0u64;
        let mut n = 0u64;
        while let Some((k, v)) = read_record(&mut r, file_len.saturating_sub(pos))
            .with_context(|| format!("read {}", path.display()))?
        {
            pos += (REC_HDR_SIZE + k.len() + v.len()) as u64;
            seen += 1;
            if let Some(p) = prefix {
                if !k.starts_with(p) {
                    continue;
                }
            }
            f(&k, &v);
            n += 1;
        }

        if self.meta.clean_shutdown {
            if pos != file_len || seen != self.meta.record_count {
                return Err(ExportError::decode(format!(
                    "{} is corrupted: {} of {} records readable, stopped at byte {} of {}",
                    path.display(),
                    seen,
                    self.meta.record_count,
                    pos,
                    file_len
                ))
                .into());
            }
        } else if pos != file_len {
            warn!(
                "store: dropped {} trailing byte(s) of {} after record {}",
                file_len - pos,
                path.display(),
                seen
            );
        }
        Ok(n)
    }
}
