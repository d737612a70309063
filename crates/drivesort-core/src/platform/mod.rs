/// Volume enumeration and arbitration.
///
/// The engine only sees the [`VolumeController`] capability. The Linux
/// implementation reads `/proc/self/mountinfo` and sysfs and asks udisks to
/// unmount and mount; tests substitute their own controllers.
pub mod mountinfo;
pub mod udisks;
pub mod watcher;

pub use udisks::UdisksController;
pub use watcher::{start_watcher, VolumeEvent, VolumeSet, WatchHandle};

use crate::error::{MountError, UnmountError, VolumeError};
use crate::model::Volume;
use std::path::PathBuf;
use tracing::warn;

/// Enumerate volumes and take them offline and back online.
pub trait VolumeController: Send + Sync {
    /// Currently mounted volumes that are both removable and ejectable and
    /// resolve to a block device. Others are silently skipped.
    fn list_eligible_volumes(&self) -> Result<Vec<Volume>, VolumeError>;

    /// Request an asynchronous unmount. `done` fires once, on a background
    /// thread.
    fn unmount(&self, volume: &Volume, done: Completion<UnmountError>);

    /// Request an asynchronous mount. Same contract as [`Self::unmount`].
    fn mount(&self, volume: &Volume, done: Completion<MountError>);

    /// A file that signals `POLLPRI` whenever the mount table changes
    /// (`/proc/self/mountinfo` on Linux). Without one, watchers only poll.
    fn change_source(&self) -> Option<PathBuf> {
        None
    }
}

/// Look up an eligible volume by display name or device node.
pub fn find_volume(
    controller: &dyn VolumeController,
    query: &str,
) -> Result<Volume, VolumeError> {
    controller
        .list_eligible_volumes()?
        .into_iter()
        .find(|v| v.matches(query))
        .ok_or_else(|| VolumeError::NotFound(query.to_string()))
}

/// Arbitration errors that can describe a completion nobody delivered.
pub trait ArbitrationError: Send + 'static {
    fn abandoned(device: &str) -> Self;
}

impl ArbitrationError for UnmountError {
    fn abandoned(device: &str) -> Self {
        Self::Abandoned {
            device: device.to_string(),
        }
    }
}

impl ArbitrationError for MountError {
    fn abandoned(device: &str) -> Self {
        Self::Abandoned {
            device: device.to_string(),
        }
    }
}

type Callback<E> = Box<dyn FnOnce(Result<(), E>) + Send>;

/// One-shot completion for an arbitration request.
///
/// [`Completion::complete`] consumes the value, so a result can be delivered
/// at most once. A completion dropped without being completed delivers an
/// `Abandoned` error instead, so the waiting side always hears back.
pub struct Completion<E: ArbitrationError> {
    device: String,
    callback: Option<Callback<E>>,
}

impl<E: ArbitrationError> Completion<E> {
    pub fn new(device: impl Into<String>, callback: impl FnOnce(Result<(), E>) + Send + 'static) -> Self {
        Self {
            device: device.into(),
            callback: Some(Box::new(callback)),
        }
    }

    /// Device this completion belongs to.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn complete(mut self, result: Result<(), E>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl<E: ArbitrationError> Drop for Completion<E> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            warn!("Arbitration completion for {} dropped unanswered", self.device);
            callback(Err(E::abandoned(&self.device)));
        }
    }
}

impl<E: ArbitrationError> std::fmt::Debug for Completion<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("device", &self.device)
            .field("pending", &self.callback.is_some())
            .finish()
    }
}
