/// What an operation hands back to its caller, and the progress events it
/// emits on the way.
use crate::error::{InvocationStage, MountError, OperationError};
use crate::model::{FileNode, Mode, OperationRequest};
use chrono::{DateTime, Local};
use thiserror::Error;

/// Where the engine currently is. Every terminal outcome returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Unmounting,
    Invoking(InvocationStage),
    Parsing,
    Remounting,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Unmounting => "unmounting",
            Self::Invoking(InvocationStage::Sort) => "sorting",
            Self::Invoking(InvocationStage::List) => "listing",
            Self::Parsing => "parsing",
            Self::Remounting => "remounting",
        }
    }
}

/// Progress notifications for frontends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    PhaseChanged(Phase),
    Finished { succeeded: bool },
}

/// Secondary problems that do not change the outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationWarning {
    #[error("remount failed: {0}")]
    RemountFailed(MountError),
}

/// Terminal result of one request.
#[derive(Debug)]
pub struct OperationReport {
    pub request: OperationRequest,
    pub outcome: Result<FileNode, OperationError>,
    pub warnings: Vec<OperationWarning>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl OperationReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The listed tree, if the final list pass succeeded.
    pub fn tree(&self) -> Option<&FileNode> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&OperationError> {
        self.outcome.as_ref().err()
    }

    /// `true` if the volume was reordered, even when the listing afterwards
    /// failed.
    pub fn sorted(&self) -> bool {
        self.request.mode == Mode::Sort
            && match &self.outcome {
                Ok(_) => true,
                Err(OperationError::Invocation { stage, .. }) => *stage == InvocationStage::List,
                Err(_) => false,
            }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
