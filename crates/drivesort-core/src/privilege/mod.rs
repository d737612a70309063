/// Running the external tool with elevated rights.
///
/// A [`PrivilegeChannel`] obtains rights at most once per process and then
/// launches every command through the same strategy. Each run hands back a
/// [`PrivilegedOutput`] carrying the tool's combined stdout and stderr.
pub mod elevation;
pub mod output;

pub use elevation::{is_elevated, Elevation, ElevationPreference};
pub use output::PrivilegedOutput;

use crate::error::PrivilegeError;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tracing::{debug, info, warn};

/// Anything that can launch the tool with elevated rights.
///
/// The engine depends on this rather than on [`PrivilegeChannel`] so tests
/// can script tool output without a real helper.
pub trait PrivilegedRunner: Send + Sync {
    /// Launch `executable` with `args` (each passed as one argv element).
    fn run(&self, executable: &Path, args: &[OsString]) -> Result<PrivilegedOutput, PrivilegeError>;
}

/// Proof that elevation succeeded, cached for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub elevation: Elevation,
    pub acquired_at: DateTime<Local>,
}

/// The process-wide elevation service.
///
/// Construct one at startup and share it (behind an `Arc`) with the engine.
#[derive(Debug)]
pub struct PrivilegeChannel {
    elevation: Elevation,
    capability: Mutex<Option<Capability>>,
}

impl PrivilegeChannel {
    pub fn new(elevation: Elevation) -> Self {
        Self {
            elevation,
            capability: Mutex::new(None),
        }
    }

    pub fn elevation(&self) -> &Elevation {
        &self.elevation
    }

    /// Obtain elevated rights, prompting the user the first time only.
    ///
    /// A successful result is memoized; failures are not, so the user can
    /// retry after cancelling a prompt. Strategies without reusable rights
    /// (direct, pkexec) succeed here without running anything.
    pub fn acquire(&self) -> Result<Capability, PrivilegeError> {
        // Held across the prompt so concurrent callers don't prompt twice.
        let mut cached = self.capability.lock();
        if let Some(cap) = cached.as_ref() {
            return Ok(cap.clone());
        }

        if let Some(mut cmd) = self.elevation.acquire_command() {
            info!("Requesting elevated rights via {}", self.elevation.label());
            let program = Path::new(cmd.get_program()).to_path_buf();
            let status = cmd.status().map_err(|source| PrivilegeError::LaunchFailed {
                program,
                source,
            })?;
            if !status.success() {
                warn!("Elevation via {} refused ({status})", self.elevation.label());
                return Err(PrivilegeError::AuthorizationDenied(format!(
                    "{} exited with {status}",
                    self.elevation.label()
                )));
            }
        }

        let cap = Capability {
            elevation: self.elevation.clone(),
            acquired_at: Local::now(),
        };
        info!("Elevated rights acquired ({})", self.elevation.label());
        *cached = Some(cap.clone());
        Ok(cap)
    }
}

impl PrivilegedRunner for PrivilegeChannel {
    fn run(&self, executable: &Path, args: &[OsString]) -> Result<PrivilegedOutput, PrivilegeError> {
        let cap = self.acquire()?;

        let launch_failed = |source| PrivilegeError::LaunchFailed {
            program: executable.to_path_buf(),
            source,
        };

        let (reader, writer) = std::io::pipe().map_err(launch_failed)?;
        let mut cmd = cap.elevation.command(executable, args);
        cmd.stdin(Stdio::null())
            .stdout(writer.try_clone().map_err(launch_failed)?)
            .stderr(writer);

        debug!("Launching {:?} {:?} via {}", executable, args, cap.elevation.label());
        let child = cmd.spawn().map_err(launch_failed)?;
        // The command still owns write ends of the pipe; dropping it lets the
        // reader see EOF once the child exits.
        drop(cmd);

        Ok(PrivilegedOutput::spawned(
            reader,
            child,
            cap.elevation.denial_codes(),
        ))
    }
}
