//! DriveSort: reorders the directory entries of removable FAT drives.
//!
//! Thin binary entry point. All logic lives in the `drivesort-core`
//! and `drivesort-cli` crates.

use clap::Parser;
use drivesort_cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so trees and JSON on stdout stay machine-readable.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("DriveSort {} starting", env!("CARGO_PKG_VERSION"));

    drivesort_cli::run(cli)
}
