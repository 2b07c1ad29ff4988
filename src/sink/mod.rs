//! Output sinks: куда пишутся выгруженные записи.
//!
//! Варианты (выбираются один раз при старте, см. `open_sink`):
//! - NoopSink    - dry run: пагинация идёт полностью, на диск ничего не пишется;
//! - StoreSink   - нативный KV store (store::Store), байты ключа/значения как есть;
//! - ArchiveSink - gzip JSONL шарды по категориям, файл открывается лениво.
//!
//! Запись идёт из одного потока; внутренних блокировок нет.

use anyhow::Result;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::config::ExportConfig;
use crate::prefix::PrefixRegistry;

pub mod archive;
pub mod noop;
pub mod store;

pub use archive::ArchiveSink;
pub use noop::NoopSink;
pub use store::StoreSink;

/// Destination of exported records.
pub trait Sink {
    /// Persist one record. Key/value bytes are written exactly as given.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Flush and release everything the sink opened. Calling it twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Short name for logs.
    fn kind(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Native KV store (`leveldb` for compatibility with older dump scripts).
    Native,
    /// Sharded gzip JSONL archive.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "leveldb" | "store" => Ok(OutputFormat::Native),
            "json" | "jsonl" | "archive" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown output format '{}' (supported: leveldb|native, json)",
                other
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Native => f.write_str("native"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

/// Build the sink selected on the command line.
/// A dry run always gets a `NoopSink` and never touches `output`.
pub fn open_sink(
    format: OutputFormat,
    dry_run: bool,
    output: &Path,
    registry: &PrefixRegistry,
    cfg: &ExportConfig,
) -> Result<Box<dyn Sink>> {
    if dry_run {
        return Ok(Box::new(NoopSink::default()));
    }
    match format {
        OutputFormat::Native => Ok(Box::new(StoreSink::create(output, cfg.store_fsync)?)),
        OutputFormat::Json => Ok(Box::new(ArchiveSink::create(
            output,
            registry.clone(),
            cfg.gzip_level,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!("leveldb".parse::<OutputFormat>().unwrap(), OutputFormat::Native);
        assert_eq!("native".parse::<OutputFormat>().unwrap(), OutputFormat::Native);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("csv".parse::<OutputFormat>().is_err());
    }
}
