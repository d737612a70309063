/// Removable volumes eligible for sorting.
use compact_str::CompactString;
use serde::Serialize;
use std::path::PathBuf;

/// Opaque token the arbitration layer uses to address a disk.
///
/// The orchestration core stores and forwards it but never interprets it;
/// only the [`crate::platform::VolumeController`] that issued it does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArbitrationHandle(CompactString);

impl ArbitrationHandle {
    pub fn new(token: impl Into<CompactString>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the controller that created it.
    pub fn token(&self) -> &str {
        &self.0
    }
}

/// A mounted removable, ejectable volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volume {
    /// Block-device node backing the volume, e.g. `/dev/sdb1`.
    pub device: PathBuf,
    /// Human-readable name. Volume sets are keyed on this.
    pub name: String,
    /// Where the filesystem is currently mounted.
    pub mount_path: PathBuf,
    #[serde(skip)]
    pub handle: ArbitrationHandle,
}

impl Volume {
    /// `true` if `query` names this volume by display name or device node.
    pub fn matches(&self, query: &str) -> bool {
        self.name == query || self.device.as_os_str() == query
    }
}
