use anyhow::Result;
use std::path::PathBuf;

use QuiverDump::import::import_archive;
use QuiverDump::{ExportConfig, PrefixRegistry, StoreSink};

use super::util::prepare_output;

pub fn exec(src: PathBuf, output: PathBuf, force: bool, json: bool) -> Result<()> {
    let cfg = ExportConfig::from_env();
    let registry = PrefixRegistry::standard();

    prepare_output(&output, force)?;
    let mut sink = StoreSink::create(&output, cfg.store_fsync)?;
    let summary = import_archive(&src, &mut sink, &registry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    for f in &summary.files {
        println!(
            "  {:<40} {:>12} records",
            f.path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            f.records
        );
    }
    println!(
        "imported:   {} records into {} ({:.3}s)",
        summary.total,
        output.display(),
        summary.elapsed_secs
    );
    Ok(())
}
