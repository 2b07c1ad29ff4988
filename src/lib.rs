#![allow(non_snake_case)]

// Базовые модули
pub mod config;
pub mod error;
pub mod metrics;
pub mod prefix;

// JSON-RPC транспорт и протокол удалённого хранилища
pub mod rpc;    // src/rpc/{mod,client}.rs
pub mod remote;

// Выгрузка: пагинация под снапшотом + приёмники
pub mod paginator;
pub mod sink;   // src/sink/{mod,noop,store,archive}.rs
pub mod export;

// Локальные форматы: нативный KV-лог и gzip JSONL архив
pub mod store;  // src/store/{mod,lock,meta,frame}.rs
pub mod archive; // src/archive/{mod,reader}.rs
pub mod import;

// Удобные реэкспорты
pub use config::ExportConfig;
pub use error::ExportError;
pub use export::{export_all, ExportSummary};
pub use paginator::{CategoryStats, Paginator};
pub use prefix::{Category, PrefixRegistry};
pub use remote::{Record, SnapshotId};
pub use rpc::{JsonRpcClient, RpcCall};
pub use sink::{open_sink, ArchiveSink, NoopSink, OutputFormat, Sink, StoreSink};
pub use store::Store;
