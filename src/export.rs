//! Export driver: one snapshot, every selected category, one sink.

use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Instant;

use crate::config::ExportConfig;
use crate::metrics::{self, MetricsSnapshot};
use crate::paginator::{CategoryStats, Paginator};
use crate::prefix::Category;
use crate::remote::{open_snapshot, release_snapshot, SnapshotId};
use crate::rpc::RpcCall;
use crate::sink::Sink;

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub snapshot: SnapshotId,
    pub total: u64,
    pub categories: Vec<CategoryStats>,
    pub dry_run: bool,
    pub elapsed_secs: f64,
    pub metrics: MetricsSnapshot,
}

impl ExportSummary {
    pub fn bytes(&self) -> u64 {
        self.categories.iter().map(|c| c.bytes).sum()
    }
}

/// Export `categories` (in the given order) under a single snapshot.
///
/// The snapshot is released and the sink closed on both paths; on failure
/// the pagination error is returned and cleanup errors are only logged.
pub fn export_all<C: RpcCall + ?Sized>(
    client: &mut C,
    sink: &mut dyn Sink,
    categories: &[Category],
    cfg: &ExportConfig,
    dry_run: bool,
) -> Result<ExportSummary> {
    let t0 = Instant::now();
    let snapshot = open_snapshot(client)?;
    debug!("snapshot {} opened", snapshot);

    let paged = paginate_all(client, &snapshot, sink, categories, cfg);

    match release_snapshot(client, &snapshot) {
        Ok(ack) => debug!("snapshot {} released: {}", snapshot, ack),
        Err(e) => warn!("snapshot {} release failed: {:#}", snapshot, e),
    }

    let stats = match paged {
        Ok(stats) => {
            sink.close()?;
            stats
        }
        Err(e) => {
            if let Err(ce) = sink.close() {
                warn!("{} sink close after failure: {:#}", sink.kind(), ce);
            }
            return Err(e);
        }
    };

    let total = stats.iter().map(|s| s.records).sum();
    let elapsed = t0.elapsed().as_secs_f64();
    info!(
        "exported {} records in {} categories ({}) in {:.3}s",
        total,
        stats.len(),
        if dry_run { "dry run" } else { sink.kind() },
        elapsed
    );

    Ok(ExportSummary {
        snapshot,
        total,
        categories: stats,
        dry_run,
        elapsed_secs: elapsed,
        metrics: metrics::snapshot(),
    })
}

fn paginate_all<C: RpcCall + ?Sized>(
    client: &mut C,
    snapshot: &SnapshotId,
    sink: &mut dyn Sink,
    categories: &[Category],
    cfg: &ExportConfig,
) -> Result<Vec<CategoryStats>> {
    let mut out = Vec::with_capacity(categories.len());
    for cat in categories {
        let st = Paginator::new(&mut *client, snapshot, *cat, cfg.page_limit)
            .with_strict_order(cfg.strict_order)
            .with_progress_every(cfg.progress_every)
            .run(sink)?;
        out.push(st);
    }
    Ok(out)
}
