use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use super::{decode_line, ARCHIVE_EXT, PLAIN_EXT};
use crate::remote::Record;

/// Line-by-line reader over one archive shard (`.json.gz`, or plain `.json`).
pub struct ArchiveReader {
    path: PathBuf,
    inner: BufReader<Box<dyn Read>>,
    line_no: u64,
    buf: Vec<u8>,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("open archive {}", path.display()))?;
        let raw: Box<dyn Read> = if path.to_string_lossy().ends_with(".gz") {
            Box::new(MultiGzDecoder::new(f))
        } else {
            Box::new(f)
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner: BufReader::with_capacity(1 << 20, raw),
            line_no: 0,
            buf: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next record; None at EOF. Blank lines are skipped.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.buf.clear();
            let n = self
                .inner
                .read_until(b'\n', &mut self.buf)
                .with_context(|| format!("read {}", self.path.display()))?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if self.buf.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            let rec = decode_line(&self.buf).with_context(|| {
                format!("{}: line {}", self.path.display(), self.line_no)
            })?;
            return Ok(Some(rec));
        }
    }
}

impl Iterator for ArchiveReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Archive shards in `dir` (`*.json.gz` and `*.json`), sorted by file name.
pub fn list_archive_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for ent in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let ent = ent?;
        if !ent.file_type()?.is_file() {
            continue;
        }
        let name = ent.file_name().to_string_lossy().to_string();
        if name.ends_with(ARCHIVE_EXT) || name.ends_with(PLAIN_EXT) {
            out.push(ent.path());
        }
    }
    out.sort();
    Ok(out)
}

/// Category name encoded in a shard file name (`block-hash.json.gz` -> `block-hash`).
pub fn category_of_file(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().to_string();
    name.strip_suffix(ARCHIVE_EXT)
        .or_else(|| name.strip_suffix(PLAIN_EXT))
        .map(|s| s.to_string())
}
