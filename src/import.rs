//! Import: sharded archive directory → any sink (normally a new native store).

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::archive::{category_of_file, list_archive_files, ArchiveReader};
use crate::error::ExportError;
use crate::prefix::PrefixRegistry;
use crate::sink::Sink;

#[derive(Debug, Clone, Serialize)]
pub struct ImportedFile {
    pub path: PathBuf,
    pub category: Option<String>,
    pub records: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub total: u64,
    pub files: Vec<ImportedFile>,
    pub elapsed_secs: f64,
}

/// Load every shard of `src_dir` into `sink`, then close the sink.
///
/// A shard named after a registered category must only hold keys of that
/// category; keys of other shards are taken as is.
pub fn import_archive(
    src_dir: &Path,
    sink: &mut dyn Sink,
    registry: &PrefixRegistry,
) -> Result<ImportSummary> {
    if !src_dir.is_dir() {
        return Err(ExportError::config(format!(
            "archive directory {} does not exist",
            src_dir.display()
        ))
        .into());
    }
    let files = list_archive_files(src_dir)?;
    if files.is_empty() {
        return Err(ExportError::config(format!(
            "no archive files (*.json.gz, *.json) in {}",
            src_dir.display()
        ))
        .into());
    }

    let t0 = Instant::now();
    let loaded = load_files(&files, sink, registry);
    let out = match loaded {
        Ok(out) => {
            sink.close()?;
            out
        }
        Err(e) => {
            if let Err(ce) = sink.close() {
                warn!("{} sink close after failure: {:#}", sink.kind(), ce);
            }
            return Err(e);
        }
    };

    let total = out.iter().map(|f| f.records).sum();
    let elapsed = t0.elapsed().as_secs_f64();
    info!(
        "imported {} records from {} file(s) in {:.3}s",
        total,
        out.len(),
        elapsed
    );
    Ok(ImportSummary {
        total,
        files: out,
        elapsed_secs: elapsed,
    })
}

fn load_files(
    files: &[PathBuf],
    sink: &mut dyn Sink,
    registry: &PrefixRegistry,
) -> Result<Vec<ImportedFile>> {
    let mut out = Vec::with_capacity(files.len());
    for path in files {
        let category = category_of_file(path);
        let expected = category.as_deref().and_then(|n| registry.by_name(n)).copied();
        if expected.is_none() {
            debug!("import: {} is not named after a known category", path.display());
        }

        let mut reader = ArchiveReader::open(path)?;
        let mut n = 0u64;
        while let Some(rec) = reader.next_record()? {
            if let Some(cat) = &expected {
                if !cat.owns(&rec.key) {
                    return Err(ExportError::invariant(format!(
                        "{}: record #{} does not belong to category {}",
                        path.display(),
                        n + 1,
                        cat.name
                    ))
                    .into());
                }
            }
            sink.put(&rec.key, &rec.value)
                .with_context(|| format!("import {}", path.display()))?;
            n += 1;
        }
        debug!("import: {} -> {} records", path.display(), n);
        out.push(ImportedFile {
            path: path.clone(),
            category,
            records: n,
        });
    }
    Ok(out)
}
