use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use QuiverDump::{ExportError, PrefixRegistry, Store};

use super::util::{display_text, to_hex};

pub fn exec(path: PathBuf, prefix: Option<String>, json: bool) -> Result<()> {
    let registry = PrefixRegistry::standard();
    let filter = match prefix.as_deref() {
        None => None,
        Some(name) => Some(
            registry
                .by_name(name)
                .map(|c| c.prefix)
                .ok_or_else(|| ExportError::config(format!("unknown category '{}'", name)))?,
        ),
    };

    let reader = Store::open_ro(&path)?;
    let pref = filter.map(|b| [b]);
    let mut line_err: Option<serde_json::Error> = None;

    let n = reader.scan_stream(pref.as_ref().map(|p| &p[..]), |k, v| {
        let cat = registry.route(k).map(|c| c.name).unwrap_or("?");
        if json {
            let row = json!({
                "category": cat,
                "key_hex": to_hex(k),
                "value_hex": to_hex(v),
                "key_len": k.len(),
                "value_len": v.len(),
            });
            match serde_json::to_string(&row) {
                Ok(s) => println!("{}", s),
                Err(e) => {
                    if line_err.is_none() {
                        line_err = Some(e);
                    }
                }
            }
        } else {
            println!(
                "[{}] key={} ({} B) -> value={} ({} B)",
                cat,
                display_text(k),
                k.len(),
                display_text(v),
                v.len()
            );
        }
    })?;
    if let Some(e) = line_err {
        return Err(e.into());
    }

    if !json {
        if n == 0 {
            println!("(no items)");
        }
        let meta = reader.meta();
        println!(
            "{} record(s); store holds {} (clean_shutdown={})",
            n, meta.record_count, meta.clean_shutdown
        );
    }
    Ok(())
}
