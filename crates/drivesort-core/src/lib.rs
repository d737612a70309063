/// DriveSort Core: volume arbitration, privileged tool runs, and listing.
///
/// This crate contains all business logic with zero UI dependencies.
/// Frontends supply intent (which volume, list or sort, which order) and
/// consume the resulting tree or error.
///
/// # Modules
///
/// - [`model`]: File tree, volumes, and operation requests.
/// - [`listing`]: Parser for the external tool's directory listing.
/// - [`privilege`]: Elevated launches of the external tool.
/// - [`platform`]: Volume enumeration, unmount/mount, and change watching.
/// - [`operation`]: The single-flight orchestration engine.
/// - [`config`]: User configuration.
/// - [`error`]: Error types for every subsystem.
pub mod config;
pub mod error;
pub mod listing;
pub mod model;
pub mod operation;
pub mod platform;
pub mod privilege;

pub use config::Config;
pub use operation::{OperationReport, SortEngine};
