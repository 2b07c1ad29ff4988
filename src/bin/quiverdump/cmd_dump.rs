use anyhow::Result;
use log::info;
use std::path::PathBuf;

use QuiverDump::{
    export_all, open_sink, ExportConfig, ExportError, ExportSummary, JsonRpcClient, OutputFormat,
    PrefixRegistry,
};

use super::util::prepare_output;

pub struct DumpArgs {
    pub source: String,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub dry_run: bool,
    pub prefixes: Vec<String>,
    pub force: bool,
    pub page_limit: Option<u64>,
    pub json: bool,
}

pub fn exec(args: DumpArgs) -> Result<()> {
    if args.source.trim().is_empty() {
        return Err(ExportError::config("source endpoint is empty").into());
    }
    if args.output.as_os_str().is_empty() {
        return Err(ExportError::config("output path is empty").into());
    }
    if args.page_limit == Some(0) {
        return Err(ExportError::config("--page-limit must be at least 1").into());
    }

    let mut cfg = ExportConfig::from_env();
    if let Some(n) = args.page_limit {
        cfg = cfg.with_page_limit(n);
    }

    let registry = PrefixRegistry::standard();
    let categories = registry.select(&args.prefixes[..])?;
    let mut client = JsonRpcClient::new(&args.source)?;

    // всё, что может упасть на конфигурации, проверяем до первого запроса
    if !args.dry_run {
        prepare_output(&args.output, args.force)?;
    }
    let mut sink = open_sink(args.format, args.dry_run, &args.output, &registry, &cfg)?;

    info!(
        "dump {} -> {} ({}{}), {} categories, {}",
        client.endpoint(),
        args.output.display(),
        args.format,
        if args.dry_run { ", dry run" } else { "" },
        categories.len(),
        cfg
    );

    let summary = export_all(&mut client, sink.as_mut(), &categories, &cfg, args.dry_run)?;
    print_summary(&summary, args.json)
}

fn print_summary(s: &ExportSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(s)?);
        return Ok(());
    }

    println!("snapshot:   {}", s.snapshot);
    for c in &s.categories {
        println!(
            "  {:<32} 0x{:02x} {:>12} records {:>6} pages {:>14} B  {:.3}s",
            c.name, c.prefix, c.records, c.pages, c.bytes, c.elapsed_secs
        );
    }
    println!("total:      {} records, {} B", s.total, s.bytes());
    println!("elapsed:    {:.3}s", s.elapsed_secs);
    println!(
        "requests:   {} ({:.1} records/page)",
        s.metrics.rpc_requests_total,
        s.metrics.avg_records_per_page()
    );
    if s.dry_run {
        println!("dry run:    nothing written");
    }
    Ok(())
}
