//! Snapshot-scoped cursor pagination over one category.
//!
//! Start → Fetching → (Fetching | Done). Страница короче лимита означает конец
//! категории; иначе курсор = последний ключ страницы и запрос повторяется.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::time::Instant;

use crate::error::ExportError;
use crate::metrics::{record_exported, record_page_fetched};
use crate::prefix::Category;
use crate::remote::{get_iterator, IterOptions, SnapshotId};
use crate::rpc::RpcCall;
use crate::sink::Sink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Start,
    Fetching,
    Done,
}

/// Per-category result of a finished pagination.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub name: &'static str,
    pub prefix: u8,
    pub records: u64,
    pub pages: u64,
    pub bytes: u64,
    pub elapsed_secs: f64,
}

pub struct Paginator<'a, C: RpcCall + ?Sized> {
    client: &'a mut C,
    snapshot: &'a SnapshotId,
    category: Category,
    limit: u64,
    strict: bool,
    progress_every: u64,

    state: PageState,
    cursor: Option<Vec<u8>>,
    records: u64,
    pages: u64,
    bytes: u64,
}

impl<'a, C: RpcCall + ?Sized> Paginator<'a, C> {
    pub fn new(client: &'a mut C, snapshot: &'a SnapshotId, category: Category, limit: u64) -> Self {
        Self {
            client,
            snapshot,
            category,
            limit: limit.max(1),
            strict: true,
            progress_every: 0,
            state: PageState::Start,
            cursor: None,
            records: 0,
            pages: 0,
            bytes: 0,
        }
    }

    pub fn with_strict_order(mut self, on: bool) -> Self {
        self.strict = on;
        self
    }

    /// 0 disables the progress line.
    pub fn with_progress_every(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Fetch the next page and feed it to `sink`. Returns the state after the page.
    pub fn step(&mut self, sink: &mut dyn Sink) -> Result<PageState> {
        if self.state == PageState::Done {
            return Ok(PageState::Done);
        }
        self.state = PageState::Fetching;

        let opts = IterOptions::forward(self.limit, self.cursor.as_deref());
        let page = get_iterator(&mut *self.client, self.snapshot, &self.category, &opts)
            .with_context(|| {
                format!(
                    "fetch page {} of category {}",
                    self.pages + 1,
                    self.category.name
                )
            })?;
        self.pages += 1;
        record_page_fetched();

        // сервис может урезать размер страницы; сравниваем с тем, что он реально отдаёт
        let effective = match page.limit {
            Some(echoed) if echoed > 0 => self.limit.min(echoed),
            _ => self.limit,
        };

        let n = page.items.len() as u64;
        for rec in &page.items {
            if self.strict {
                self.check_order(&rec.key)?;
            }
            sink.put(&rec.key, &rec.value).with_context(|| {
                format!("{} sink put in category {}", sink.kind(), self.category.name)
            })?;

            self.records += 1;
            self.bytes += (rec.key.len() + rec.value.len()) as u64;
            record_exported(rec.key.len(), rec.value.len());

            if self.progress_every > 0 && self.records % self.progress_every == 0 {
                debug!("{}: {} records so far", self.category.name, self.records);
            }
            if self.strict {
                self.cursor = Some(rec.key.clone());
            }
        }

        if n < effective {
            self.state = PageState::Done;
        } else if let Some(last) = page.items.last() {
            self.cursor = Some(last.key.clone());
        }
        Ok(self.state)
    }

    fn check_order(&self, key: &[u8]) -> Result<()> {
        if !self.category.owns(key) {
            return Err(ExportError::invariant(format!(
                "category {}: key {} does not carry prefix 0x{:02x}",
                self.category.name,
                to_hex_short(key),
                self.category.prefix
            ))
            .into());
        }
        if let Some(prev) = &self.cursor {
            if key <= prev.as_slice() {
                return Err(ExportError::invariant(format!(
                    "category {}: key {} is not after {}",
                    self.category.name,
                    to_hex_short(key),
                    to_hex_short(prev)
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Drive the state machine to Done.
    pub fn run(mut self, sink: &mut dyn Sink) -> Result<CategoryStats> {
        let t0 = Instant::now();
        debug!("{}: start (prefix 0x{:02x})", self.category.name, self.category.prefix);
        while self.step(sink)? != PageState::Done {}
        let elapsed = t0.elapsed().as_secs_f64();
        debug!(
            "{}: {} records, {} page(s) in {:.3}s",
            self.category.name, self.records, self.pages, elapsed
        );
        Ok(CategoryStats {
            name: self.category.name,
            prefix: self.category.prefix,
            records: self.records,
            pages: self.pages,
            bytes: self.bytes,
            elapsed_secs: elapsed,
        })
    }
}

fn to_hex_short(b: &[u8]) -> String {
    let mut s = String::with_capacity(2 + b.len().min(32) * 2);
    s.push_str("0x");
    for x in b.iter().take(32) {
        s.push_str(&format!("{:02x}", x));
    }
    if b.len() > 32 {
        s.push_str("..");
    }
    s
}
