/// Error taxonomy for the orchestration core.
///
/// Each subsystem has its own error type; [`OperationError`] wraps them with
/// the stage of the operation at which they occurred and is what a caller
/// receives in the final report.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the privilege-elevation channel and the tool it launches.
#[derive(Debug, Error)]
pub enum PrivilegeError {
    /// The user cancelled the prompt or policy refused escalation.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The helper or the tool could not be started.
    #[error("failed to launch {program:?}: {source}")]
    LaunchFailed {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading the merged output pipe failed.
    #[error("I/O error while reading tool output: {0}")]
    Io(#[from] io::Error),

    /// The tool ran but exited unsuccessfully. `output` is everything it printed.
    #[error("tool exited with status {code:?}: {}", output.trim())]
    ToolExited { code: Option<i32>, output: String },
}

/// The arbitration layer refused or failed to take the volume offline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnmountError {
    #[error("unmount of {device} dissented: {reason}")]
    Dissented { device: String, reason: String },

    #[error("unmount of {device} never completed")]
    Abandoned { device: String },
}

/// The arbitration layer failed to bring the volume back online.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MountError {
    #[error("mount of {device} dissented: {reason}")]
    Dissented { device: String, reason: String },

    #[error("mount of {device} never completed")]
    Abandoned { device: String },
}

/// Enumerating mounted volumes failed.
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no eligible volume matches {0:?}")]
    NotFound(String),
}

/// Loading or saving the configuration file failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no home directory available to locate the config file")]
    NoConfigDir,

    #[error("tool {0:?} not found on PATH")]
    ToolNotFound(String),
}

/// Which of the two tool invocations failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStage {
    /// The mutating reorder pass.
    Sort,
    /// The list-only pass that produces the displayed tree.
    List,
}

impl std::fmt::Display for InvocationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sort => f.write_str("sort"),
            Self::List => f.write_str("list"),
        }
    }
}

/// Terminal failure of a request, reported verbatim to the caller.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The volume could not be unmounted; nothing was invoked.
    #[error(transparent)]
    Unmount(#[from] UnmountError),

    /// A tool invocation failed. When `stage` is `List` after a successful
    /// sort, the reorder already happened and is not rolled back.
    #[error("{stage} invocation failed: {source}")]
    Invocation {
        stage: InvocationStage,
        #[source]
        source: PrivilegeError,
    },

    /// The engine worker went away before reporting.
    #[error("operation engine stopped")]
    EngineStopped,
}

impl OperationError {
    /// `true` if the failure came from the user or policy refusing escalation.
    pub fn is_authorization_denied(&self) -> bool {
        matches!(
            self,
            Self::Invocation {
                source: PrivilegeError::AuthorizationDenied(_),
                ..
            }
        )
    }
}

/// Synchronous rejection from [`crate::operation::SortEngine::start`].
#[derive(Debug, Error)]
pub enum StartError {
    /// Another operation is in flight; the request was not queued.
    #[error("another operation is already in progress")]
    OperationInProgress,

    #[error("operation engine stopped")]
    EngineStopped,
}
