/// DriveSort CLI: terminal frontend.
///
/// This crate contains argument parsing and output formatting. Business
/// logic lives in `drivesort-core`.
pub mod app;
pub mod args;
pub mod tree_view;

pub use app::run;
pub use args::Cli;
