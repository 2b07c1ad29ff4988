//! Centralized configuration for the exporter.
//!
//! Same shape as the DB config: `Default`, `from_env()`, fluent setters and a
//! `Display` impl for the debug log at startup. CLI flags are applied on top
//! of `from_env()` by the binary.
//!
//! ENV:
//! - P1_EXPORT_PAGE_LIMIT      - page size for DB.GetIterator (default 10^18, >= 1)
//! - P1_ARCHIVE_GZIP_LEVEL     - gzip level 0..=9 for archive shards (default 1, fastest)
//! - P1_STORE_FSYNC            - fsync native store log on close (default true)
//! - P1_EXPORT_PROGRESS_EVERY  - progress log period in records (default 100000, 0 = off)
//! - P1_EXPORT_STRICT          - check key order/prefix per page (default true)

use std::fmt;

/// Default page size: effectively "everything in one page".
pub const DEFAULT_PAGE_LIMIT: u64 = 1_000_000_000_000_000_000;

/// Fastest gzip level: bulk one-shot export, not archival compression.
pub const DEFAULT_GZIP_LEVEL: u32 = 1;

pub const DEFAULT_PROGRESS_EVERY: u64 = 100_000;

#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Requested page size for every iterator call.
    /// Env: P1_EXPORT_PAGE_LIMIT
    pub page_limit: u64,

    /// Compression level of archive shards (0..=9).
    /// Env: P1_ARCHIVE_GZIP_LEVEL
    pub gzip_level: u32,

    /// fsync data.log of the native store on close.
    /// Env: P1_STORE_FSYNC
    pub store_fsync: bool,

    /// Log a progress line every N records of a category (0 disables).
    /// Env: P1_EXPORT_PROGRESS_EVERY
    pub progress_every: u64,

    /// Validate ascending key order and prefix membership of every page.
    /// Env: P1_EXPORT_STRICT
    pub strict_order: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            gzip_level: DEFAULT_GZIP_LEVEL,
            store_fsync: true,
            progress_every: DEFAULT_PROGRESS_EVERY,
            strict_order: true,
        }
    }
}

fn parse_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "on" || s == "yes"
}

impl ExportConfig {
    /// Load configuration from environment variables; unknown/invalid values keep defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("P1_EXPORT_PAGE_LIMIT") {
            if let Ok(n) = v.trim().parse::<u64>() {
                if n >= 1 {
                    cfg.page_limit = n;
                }
            }
        }

        if let Ok(v) = std::env::var("P1_ARCHIVE_GZIP_LEVEL") {
            if let Ok(n) = v.trim().parse::<u32>() {
                cfg.gzip_level = n.min(9);
            }
        }

        if let Ok(v) = std::env::var("P1_STORE_FSYNC") {
            cfg.store_fsync = parse_flag(&v);
        }

        if let Ok(v) = std::env::var("P1_EXPORT_PROGRESS_EVERY") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.progress_every = n;
            }
        }

        if let Ok(v) = std::env::var("P1_EXPORT_STRICT") {
            cfg.strict_order = parse_flag(&v);
        }

        cfg
    }

    pub fn with_page_limit(mut self, limit: u64) -> Self {
        // limit=0 зациклил бы пагинацию на пустых страницах
        self.page_limit = limit.max(1);
        self
    }

    pub fn with_gzip_level(mut self, level: u32) -> Self {
        self.gzip_level = level.min(9);
        self
    }

    pub fn with_store_fsync(mut self, on: bool) -> Self {
        self.store_fsync = on;
        self
    }

    pub fn with_progress_every(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }

    pub fn with_strict_order(mut self, on: bool) -> Self {
        self.strict_order = on;
        self
    }
}

impl fmt::Display for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExportConfig {{ \
             page_limit: {}, \
             gzip_level: {}, \
             store_fsync: {}, \
             progress_every: {}, \
             strict_order: {} \
             }}",
            self.page_limit, self.gzip_level, self.store_fsync, self.progress_every, self.strict_order,
        )
    }
}
