use clap::{Parser, Subcommand};
use std::path::PathBuf;

use QuiverDump::OutputFormat;

/// Snapshot-consistent exporter for a JSON-RPC key/value node
#[derive(Parser, Debug)]
#[command(name = "quiverdump", version, about = "QuiverDump storage exporter")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

impl Cli {
    pub fn verbose(&self) -> bool {
        match &self.cmd {
            Cmd::Dump { verbose, .. } | Cmd::Import { verbose, .. } => *verbose,
            Cmd::Prefixes { .. } | Cmd::Scan { .. } => false,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Export the whole store (or selected categories) under one snapshot
    Dump {
        /// JSON-RPC endpoint, e.g. http://127.0.0.1:54321/jsonrpc
        source: String,
        /// Output directory (native store or archive directory)
        output: PathBuf,
        /// leveldb|native (KV log) or json (gzip JSONL per category)
        #[arg(long, default_value = "leveldb")]
        format: OutputFormat,
        /// Paginate everything, write nothing
        #[arg(long)]
        dry_run: bool,
        #[arg(long, short)]
        verbose: bool,
        /// Category name (repeatable); `all` selects every category
        #[arg(long = "prefix", default_value = "all")]
        prefixes: Vec<String>,
        /// Remove an existing output directory first
        #[arg(long)]
        force: bool,
        /// Page size requested from the node (overrides P1_EXPORT_PAGE_LIMIT)
        #[arg(long)]
        page_limit: Option<u64>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load an archive directory back into a new native store
    Import {
        /// Directory with <category>.json.gz shards
        src: PathBuf,
        /// New native store directory
        output: PathBuf,
        #[arg(long)]
        force: bool,
        #[arg(long, short)]
        verbose: bool,
        #[arg(long)]
        json: bool,
    },
    /// List category names and their key prefixes
    Prefixes {
        #[arg(long)]
        json: bool,
    },
    /// Print records of a native store (JSONL with --json)
    Scan {
        #[arg(long)]
        path: PathBuf,
        /// Category name to filter by
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        json: bool,
    },
}
