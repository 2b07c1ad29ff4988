use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod util;
mod cmd_dump;
mod cmd_import;
mod cmd_prefixes;
mod cmd_scan;

fn init_logger(verbose: bool) {
    // RUST_LOG всегда главнее; --verbose меняет только дефолт.
    let level = if verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn main() {
    let cli = cli::Cli::parse();
    init_logger(cli.verbose());

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: cli::Cli) -> Result<()> {
    match cli.cmd {
        cli::Cmd::Dump {
            source,
            output,
            format,
            dry_run,
            verbose: _,
            prefixes,
            force,
            page_limit,
            json,
        } => cmd_dump::exec(cmd_dump::DumpArgs {
            source,
            output,
            format,
            dry_run,
            prefixes,
            force,
            page_limit,
            json,
        }),

        cli::Cmd::Import {
            src,
            output,
            force,
            verbose: _,
            json,
        } => cmd_import::exec(src, output, force, json),

        cli::Cmd::Prefixes { json } => cmd_prefixes::exec(json),

        cli::Cmd::Scan { path, prefix, json } => cmd_scan::exec(path, prefix, json),
    }
}
