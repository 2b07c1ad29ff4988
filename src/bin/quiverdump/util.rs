use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;

use QuiverDump::store::is_absent_or_empty_dir;
use QuiverDump::ExportError;

pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

pub fn display_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if !s.chars().any(|c| c.is_control()) => s.to_string(),
        _ => format!("0x{}", to_hex(bytes)),
    }
}

/// Output directory check done before any network call.
///
/// Without `force` a non-empty directory (or a plain file) is an error.
/// With `force` whatever is there is removed. An empty directory is removed
/// as well so that sinks which insist on creating the directory can do so.
pub fn prepare_output(output: &Path, force: bool) -> Result<()> {
    if output.as_os_str().is_empty() {
        return Err(ExportError::config("output path is empty").into());
    }
    let md = match fs::symlink_metadata(output) {
        Ok(md) => md,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("stat {}", output.display())),
    };

    if !force && !is_absent_or_empty_dir(output)? {
        return Err(ExportError::precondition(format!(
            "output {} already exists and is not empty (use --force to replace it)",
            output.display()
        ))
        .into());
    }

    if md.is_dir() {
        if force {
            info!("removing existing output {}", output.display());
        }
        fs::remove_dir_all(output).with_context(|| format!("remove {}", output.display()))?;
    } else {
        fs::remove_file(output).with_context(|| format!("remove {}", output.display()))?;
    }
    Ok(())
}
