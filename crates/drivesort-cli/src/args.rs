/// Command-line surface.
use clap::{Args, Parser, Subcommand, ValueEnum};
use drivesort_core::model::{SortOptions, SortOrder};
use drivesort_core::privilege::ElevationPreference;
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "drivesort",
    version,
    about = "Reorder the directory entries of removable FAT drives"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print trees and volume lists as JSON.
    #[arg(long, global = true, conflicts_with = "raw")]
    pub json: bool,

    /// Print trees in the tool's own listing format.
    #[arg(long, global = true)]
    pub raw: bool,

    /// Read configuration from this file instead of the default location.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path or name of the sorting tool.
    #[arg(long, global = true, value_name = "PATH")]
    pub tool: Option<PathBuf>,

    /// How to obtain the rights the tool needs.
    #[arg(long, global = true, value_enum)]
    pub elevation: Option<ElevationArg>,

    /// Log debug detail to stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }

    pub fn output(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.raw {
            OutputFormat::Raw
        } else {
            OutputFormat::Tree
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tree,
    Json,
    Raw,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List mounted removable volumes that can be sorted.
    Volumes,

    /// Show the current on-disk order of a volume.
    List {
        /// Volume name or device node, e.g. `PLAYER` or `/dev/sdb1`.
        volume: String,
    },

    /// Reorder a volume, then show the result.
    Sort(SortArgs),

    /// Print volumes as they appear and disappear.
    Watch,
}

#[derive(Debug, Args)]
pub struct SortArgs {
    /// Volume name or device node.
    pub volume: String,

    /// Interleaving of directories and files. Defaults to the configured order.
    #[arg(short, long, value_enum)]
    pub order: Option<OrderArg>,

    /// Only sort this directory, relative to the volume root.
    #[arg(short = 'D', long, value_name = "DIR")]
    pub dir: Option<String>,

    #[arg(short, long)]
    pub reverse: bool,

    #[arg(short = 'c', long)]
    pub ignore_case: bool,

    /// Natural order (`track2` before `track10`).
    #[arg(short, long)]
    pub natural: bool,

    /// Sort by modification time instead of name.
    #[arg(short = 't', long)]
    pub by_modification: bool,
}

impl SortArgs {
    pub fn options(&self, default_order: SortOrder) -> SortOptions {
        SortOptions {
            order: Some(self.order.map_or(default_order, SortOrder::from)),
            reverse: self.reverse,
            ignore_case: self.ignore_case,
            natural: self.natural,
            by_modification: self.by_modification,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    #[value(alias = "d")]
    DirectoriesFirst,
    #[value(alias = "f")]
    FilesFirst,
    #[value(alias = "a")]
    Mixed,
}

impl From<OrderArg> for SortOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::DirectoriesFirst => Self::DirectoriesFirst,
            OrderArg::FilesFirst => Self::FilesFirst,
            OrderArg::Mixed => Self::Mixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ElevationArg {
    Auto,
    Direct,
    Sudo,
    Pkexec,
}

impl From<ElevationArg> for ElevationPreference {
    fn from(arg: ElevationArg) -> Self {
        match arg {
            ElevationArg::Auto => Self::Auto,
            ElevationArg::Direct => Self::Direct,
            ElevationArg::Sudo => Self::Sudo,
            ElevationArg::Pkexec => Self::Pkexec,
        }
    }
}
