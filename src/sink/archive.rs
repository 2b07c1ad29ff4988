use anyhow::{anyhow, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::Sink;
use crate::archive::{shard_file_name, write_line};
use crate::error::ExportError;
use crate::metrics::record_archive_stream_opened;
use crate::prefix::PrefixRegistry;

struct Shard {
    name: &'static str,
    path: PathBuf,
    enc: GzEncoder<BufWriter<File>>,
    records: u64,
}

impl Shard {
    fn finish(self) -> Result<(&'static str, u64)> {
        let bw = self
            .enc
            .finish()
            .with_context(|| format!("finish gzip stream {}", self.path.display()))?;
        bw.into_inner()
            .map_err(|e| anyhow!("flush {}: {}", self.path.display(), e.error()))?;
        Ok((self.name, self.records))
    }
}

/// Sharded gzip JSONL sink.
///
/// Routes every record by the first key byte; a shard `<category>.json.gz`
/// is created on the first record of its category and never reopened.
pub struct ArchiveSink {
    root: PathBuf,
    registry: PrefixRegistry,
    level: Compression,
    shards: BTreeMap<u8, Shard>,
    finished: Vec<(&'static str, u64)>,
    closed: bool,
}

impl ArchiveSink {
    /// The target directory must not exist yet; it is created here.
    pub fn create(root: &Path, registry: PrefixRegistry, gzip_level: u32) -> Result<Self> {
        if let Some(parent) = root.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent of {}", root.display()))?;
        }
        match fs::create_dir(root) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ExportError::precondition(format!(
                    "archive directory {} already exists",
                    root.display()
                ))
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("create archive dir {}", root.display()));
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            registry,
            level: Compression::new(gzip_level.min(9)),
            shards: BTreeMap::new(),
            finished: Vec::new(),
            closed: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// (category, records) per shard opened so far, in prefix order.
    pub fn shard_counts(&self) -> Vec<(&'static str, u64)> {
        let mut v: Vec<_> = self.finished.clone();
        v.extend(self.shards.values().map(|s| (s.name, s.records)));
        v
    }

    fn shard_for(&mut self, key: &[u8]) -> Result<&mut Shard> {
        let cat = *self.registry.route(key).ok_or_else(|| {
            ExportError::invariant(format!(
                "key with unregistered prefix {} cannot be routed",
                key.first()
                    .map(|b| format!("0x{:02x}", b))
                    .unwrap_or_else(|| "(empty key)".to_string())
            ))
        })?;

        if !self.shards.contains_key(&cat.prefix) {
            let path = self.root.join(shard_file_name(cat.name));
            let f = OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&path)
                .with_context(|| format!("create shard {}", path.display()))?;
            let enc = GzEncoder::new(BufWriter::with_capacity(1 << 20, f), self.level);
            debug!("archive: opened {}", path.display());
            record_archive_stream_opened();
            self.shards.insert(
                cat.prefix,
                Shard {
                    name: cat.name,
                    path,
                    enc,
                    records: 0,
                },
            );
        }

        self.shards
            .get_mut(&cat.prefix)
            .ok_or_else(|| anyhow!("archive shard for {} vanished", cat.name))
    }

    /// Finish every open shard; keeps going after a failure and returns the first error.
    fn finish_all(&mut self) -> Result<()> {
        let mut first_err: Option<anyhow::Error> = None;
        for (_, shard) in std::mem::take(&mut self.shards) {
            match shard.finish() {
                Ok(done) => self.finished.push(done),
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Sink for ArchiveSink {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.closed {
            return Err(anyhow!("archive {} is closed", self.root.display()));
        }
        let shard = self.shard_for(key)?;
        write_line(&mut shard.enc, key, value)
            .with_context(|| format!("write {}", shard.path.display()))?;
        shard.records += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.finish_all()?;
        debug!(
            "archive: closed {} ({} shard(s))",
            self.root.display(),
            self.finished.len()
        );
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "json"
    }
}

impl Drop for ArchiveSink {
    fn drop(&mut self) {
        // ошибка на полпути: дописываем gzip-трейлеры, чтобы шарды читались до последней строки
        if !self.closed && !self.shards.is_empty() {
            if let Err(e) = self.finish_all() {
                warn!("archive: finishing shards on drop failed: {:#}", e);
            }
        }
    }
}
