/// Linux volume controller backed by sysfs and `udisksctl`.
///
/// Eligible volumes are FAT or exFAT mounts whose source is a block device
/// on a disk that sysfs flags as removable and that hangs off a
/// hot-pluggable bus (USB, MMC, FireWire). Unmount and mount requests are queued to a single
/// arbitration thread which runs `udisksctl` and fires the completion.
use super::mountinfo::{parse_mountinfo, MountEntry};
use super::{Completion, VolumeController};
use crate::error::{MountError, UnmountError, VolumeError};
use crate::model::{ArbitrationHandle, Volume};
use crossbeam_channel::{unbounded, Sender};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use tracing::{debug, info, warn};

/// Path components that identify a hot-pluggable bus in a sysfs device path.
const HOTPLUG_BUS_PREFIXES: &[&str] = &["usb", "mmc", "firewire"];

/// Kernel filesystem types the sorting tool understands (FAT12/16/32, exFAT).
const SORTABLE_FS_TYPES: &[&str] = &["vfat", "msdos", "exfat"];

enum ArbitrationJob {
    Unmount(PathBuf, Completion<UnmountError>),
    Mount(PathBuf, Completion<MountError>),
}

/// `VolumeController` for Linux desktops running udisks.
pub struct UdisksController {
    mountinfo: PathBuf,
    sys_root: PathBuf,
    jobs: Sender<ArbitrationJob>,
}

impl UdisksController {
    /// Controller reading the live system tables.
    pub fn new(udisksctl: PathBuf) -> io::Result<Self> {
        Self::with_roots(udisksctl, "/proc/self/mountinfo", "/sys")
    }

    /// Controller reading tables from custom locations.
    pub fn with_roots(
        udisksctl: PathBuf,
        mountinfo: impl Into<PathBuf>,
        sys_root: impl Into<PathBuf>,
    ) -> io::Result<Self> {
        let (jobs, rx) = unbounded::<ArbitrationJob>();
        thread::Builder::new()
            .name("drivesort-arbitration".into())
            .spawn(move || {
                // Exits once the controller (the only sender) is dropped.
                for job in rx {
                    run_job(&udisksctl, job);
                }
                debug!("Arbitration thread exiting");
            })?;

        Ok(Self {
            mountinfo: mountinfo.into(),
            sys_root: sys_root.into(),
            jobs,
        })
    }

    fn to_volume(&self, entry: MountEntry) -> Option<Volume> {
        if !SORTABLE_FS_TYPES.contains(&entry.fs_type.as_str()) {
            return None;
        }
        let dev_name = entry.source.strip_prefix("/dev/")?;
        if dev_name.contains('/') || !self.is_eligible(dev_name) {
            return None;
        }
        let name = entry
            .mount_point
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.mount_point.to_string_lossy().into_owned());

        Some(Volume {
            device: PathBuf::from(&entry.source),
            name,
            mount_path: entry.mount_point,
            handle: ArbitrationHandle::new(entry.source.as_str()),
        })
    }

    /// Removable flag on the whole disk, plus a hot-pluggable bus in the
    /// resolved device path.
    fn is_eligible(&self, dev_name: &str) -> bool {
        let class_entry = self.sys_root.join("class/block").join(dev_name);
        let Ok(real) = fs::canonicalize(&class_entry) else {
            return false;
        };
        let disk_dir = if real.join("partition").exists() {
            match real.parent() {
                Some(parent) => parent.to_path_buf(),
                None => return false,
            }
        } else {
            real.clone()
        };

        let removable = fs::read_to_string(disk_dir.join("removable"))
            .map(|s| s.trim() == "1")
            .unwrap_or(false);
        removable && on_hotplug_bus(&real)
    }
}

fn on_hotplug_bus(device_path: &Path) -> bool {
    device_path.components().any(|c| {
        let part = c.as_os_str().to_string_lossy();
        HOTPLUG_BUS_PREFIXES.iter().any(|p| part.starts_with(p))
    })
}

impl VolumeController for UdisksController {
    fn list_eligible_volumes(&self) -> Result<Vec<Volume>, VolumeError> {
        let text = fs::read_to_string(&self.mountinfo).map_err(|source| VolumeError::Read {
            path: self.mountinfo.clone(),
            source,
        })?;
        Ok(parse_mountinfo(&text)
            .into_iter()
            .filter_map(|entry| self.to_volume(entry))
            .collect())
    }

    fn unmount(&self, volume: &Volume, done: Completion<UnmountError>) {
        let device = PathBuf::from(volume.handle.token());
        info!("Requesting unmount of {}", device.display());
        // If the thread is gone the job (and its completion) is dropped,
        // which reports the request as abandoned.
        let _ = self.jobs.send(ArbitrationJob::Unmount(device, done));
    }

    fn mount(&self, volume: &Volume, done: Completion<MountError>) {
        let device = PathBuf::from(volume.handle.token());
        info!("Requesting mount of {}", device.display());
        let _ = self.jobs.send(ArbitrationJob::Mount(device, done));
    }

    fn change_source(&self) -> Option<PathBuf> {
        Some(self.mountinfo.clone())
    }
}

fn run_job(udisksctl: &Path, job: ArbitrationJob) {
    match job {
        ArbitrationJob::Unmount(device, done) => {
            let result = udisksctl_call(udisksctl, "unmount", &device).map_err(|reason| {
                UnmountError::Dissented {
                    device: device.display().to_string(),
                    reason,
                }
            });
            debug!("Unmount of {} finished: {:?}", device.display(), result);
            done.complete(result);
        }
        ArbitrationJob::Mount(device, done) => {
            let result = udisksctl_call(udisksctl, "mount", &device).map_err(|reason| {
                MountError::Dissented {
                    device: device.display().to_string(),
                    reason,
                }
            });
            debug!("Mount of {} finished: {:?}", device.display(), result);
            done.complete(result);
        }
    }
}

/// Run `udisksctl <verb> --block-device <dev> --no-user-interaction`,
/// returning its stderr as the dissent reason on failure.
fn udisksctl_call(udisksctl: &Path, verb: &str, device: &Path) -> Result<(), String> {
    let output = Command::new(udisksctl)
        .arg(verb)
        .arg("--block-device")
        .arg(device)
        .arg("--no-user-interaction")
        .output()
        .map_err(|e| format!("failed to launch {}: {e}", udisksctl.display()))?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    warn!("udisksctl {verb} {} failed: {stderr}", device.display());
    Err(if stderr.is_empty() {
        format!("udisksctl exited with {}", output.status)
    } else {
        stderr
    })
}
