//! Lightweight global metrics for the exporter.
//!
//! Атомарные счётчики процесса:
//! - JSON-RPC (запросы, ошибки протокола)
//! - Пагинация (страницы, записи, байты ключей/значений)
//! - Приёмники (открытые gzip-шарды, записи в нативный store)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- JSON-RPC -----
static RPC_REQUESTS_TOTAL: AtomicU64 = AtomicU64::new(0);
static RPC_PROTOCOL_ERRORS: AtomicU64 = AtomicU64::new(0);

// ----- Pagination -----
static PAGES_FETCHED: AtomicU64 = AtomicU64::new(0);
static RECORDS_EXPORTED: AtomicU64 = AtomicU64::new(0);
static BYTES_EXPORTED: AtomicU64 = AtomicU64::new(0);

// ----- Sinks -----
static ARCHIVE_STREAMS_OPENED: AtomicU64 = AtomicU64::new(0);
static STORE_RECORDS_WRITTEN: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub rpc_requests_total: u64,
    pub rpc_protocol_errors: u64,

    pub pages_fetched: u64,
    pub records_exported: u64,
    pub bytes_exported: u64,

    pub archive_streams_opened: u64,
    pub store_records_written: u64,
}

impl MetricsSnapshot {
    pub fn avg_records_per_page(&self) -> f64 {
        if self.pages_fetched == 0 {
            0.0
        } else {
            self.records_exported as f64 / self.pages_fetched as f64
        }
    }
}

// ----- Recorders (JSON-RPC) -----
pub fn record_rpc_request() {
    RPC_REQUESTS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_rpc_protocol_error() {
    RPC_PROTOCOL_ERRORS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Pagination) -----
pub fn record_page_fetched() {
    PAGES_FETCHED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_exported(key_len: usize, value_len: usize) {
    RECORDS_EXPORTED.fetch_add(1, Ordering::Relaxed);
    BYTES_EXPORTED.fetch_add((key_len + value_len) as u64, Ordering::Relaxed);
}

// ----- Recorders (Sinks) -----
pub fn record_archive_stream_opened() {
    ARCHIVE_STREAMS_OPENED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_store_put() {
    STORE_RECORDS_WRITTEN.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        rpc_requests_total: RPC_REQUESTS_TOTAL.load(Ordering::Relaxed),
        rpc_protocol_errors: RPC_PROTOCOL_ERRORS.load(Ordering::Relaxed),
        pages_fetched: PAGES_FETCHED.load(Ordering::Relaxed),
        records_exported: RECORDS_EXPORTED.load(Ordering::Relaxed),
        bytes_exported: BYTES_EXPORTED.load(Ordering::Relaxed),
        archive_streams_opened: ARCHIVE_STREAMS_OPENED.load(Ordering::Relaxed),
        store_records_written: STORE_RECORDS_WRITTEN.load(Ordering::Relaxed),
    }
}
