/// Volume-set tracking.
///
/// A background thread re-enumerates eligible volumes when the mount table
/// signals a change (with a fixed interval as fallback) and reconciles the
/// result into a [`VolumeSet`] keyed on display name.
/// Only additions and removals are reported, so observers keyed by name
/// stay stable across re-enumeration.
///
/// ```ignore
/// let handle = start_watcher(controller, Duration::from_secs(1));
/// for event in handle.receiver.iter() { /* ... */ }
/// handle.stop();
/// ```
use super::VolumeController;
use crate::model::Volume;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Granularity at which the watcher re-checks its cancel flag while idle.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Bound on queued events. A stalled consumer stalls the watcher rather
/// than growing the queue.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change to the set of eligible volumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeEvent {
    Added(Volume),
    Removed(Volume),
}

/// Known volumes, in the order they first appeared.
#[derive(Debug, Clone, Default)]
pub struct VolumeSet {
    volumes: Vec<Volume>,
}

impl VolumeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn get(&self, name: &str) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.name == name)
    }

    /// Bring the set in line with a fresh enumeration.
    ///
    /// Names no longer present are removed, new names appended. Names
    /// present in both keep their position but take the fresh details
    /// (device and mount path can change across a remount).
    pub fn reconcile(&mut self, fresh: Vec<Volume>) -> Vec<VolumeEvent> {
        let mut events = Vec::new();

        let mut kept = Vec::with_capacity(self.volumes.len());
        for old in self.volumes.drain(..) {
            match fresh.iter().find(|v| v.name == old.name) {
                Some(current) => kept.push(current.clone()),
                None => events.push(VolumeEvent::Removed(old)),
            }
        }
        self.volumes = kept;

        for volume in fresh {
            if self.get(&volume.name).is_none() {
                self.volumes.push(volume.clone());
                events.push(VolumeEvent::Added(volume));
            }
        }

        events
    }
}

/// Handle to a running watcher. Dropping it does not stop the thread;
/// call [`WatchHandle::stop`].
pub struct WatchHandle {
    pub receiver: Receiver<VolumeEvent>,
    cancel: Arc<AtomicBool>,
}

impl WatchHandle {
    /// Signal the watcher to exit. Non-blocking.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Start watching for volume changes. The first pass reports every volume
/// already present as `Added`.
pub fn start_watcher(
    controller: Arc<dyn VolumeController>,
    interval: Duration,
) -> std::io::Result<WatchHandle> {
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = Arc::clone(&cancel);
    let (tx, rx) = bounded::<VolumeEvent>(EVENT_CHANNEL_CAPACITY);

    thread::Builder::new()
        .name("drivesort-watcher".to_owned())
        .spawn(move || run_watcher(controller, interval, cancel_clone, tx))?;

    Ok(WatchHandle {
        receiver: rx,
        cancel,
    })
}

fn run_watcher(
    controller: Arc<dyn VolumeController>,
    interval: Duration,
    cancel: Arc<AtomicBool>,
    tx: Sender<VolumeEvent>,
) {
    let change = controller.change_source().and_then(|path| match File::open(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            warn!("Watcher: cannot watch {}: {e}; polling only", path.display());
            None
        }
    });

    let mut set = VolumeSet::new();
    while !cancel.load(Ordering::Relaxed) {
        match controller.list_eligible_volumes() {
            Ok(fresh) => {
                for event in set.reconcile(fresh) {
                    debug!("Watcher: {:?}", event);
                    if tx.send(event).is_err() {
                        debug!("Watcher: receiver gone, exiting");
                        return;
                    }
                }
            }
            Err(e) => warn!("Watcher: enumeration failed: {e}"),
        }

        // Sleep until the next pass, waking early if the mount table changes.
        let deadline = Instant::now() + interval;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let slice = CANCEL_POLL.min(remaining);
            match &change {
                Some(file) => {
                    if wait_for_change(file, slice) {
                        debug!("Watcher: mount table changed");
                        break;
                    }
                }
                None => thread::sleep(slice),
            }
        }
    }
}

/// Block up to `timeout` for `POLLPRI` on `file`. Returns `true` if the
/// file reported a change.
#[cfg(unix)]
fn wait_for_change(file: &File, timeout: Duration) -> bool {
    use std::os::fd::AsRawFd;

    let mut pfd = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLPRI,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    // SAFETY: `pfd` is a single valid pollfd that outlives the call, and the
    // descriptor stays open because `file` is borrowed for its duration.
    let ready = unsafe { libc::poll(&mut pfd, 1, millis) };
    if ready < 0 {
        // EINTR or a broken descriptor; don't spin.
        thread::sleep(timeout);
        return false;
    }
    ready > 0 && pfd.revents & (libc::POLLPRI | libc::POLLERR) != 0
}

#[cfg(not(unix))]
fn wait_for_change(_file: &File, timeout: Duration) -> bool {
    thread::sleep(timeout);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MountError, UnmountError, VolumeError};
    use crate::model::ArbitrationHandle;
    use crate::platform::Completion;
    use crossbeam_channel::RecvTimeoutError;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    /// Serves whatever volume list the test last stored.
    #[derive(Default)]
    struct ScriptedVolumes {
        current: Mutex<Vec<Volume>>,
        change_source: Option<PathBuf>,
    }

    impl VolumeController for ScriptedVolumes {
        fn list_eligible_volumes(&self) -> Result<Vec<Volume>, VolumeError> {
            Ok(self.current.lock().clone())
        }

        fn unmount(&self, _volume: &Volume, done: Completion<UnmountError>) {
            done.complete(Ok(()));
        }

        fn mount(&self, _volume: &Volume, done: Completion<MountError>) {
            done.complete(Ok(()));
        }

        fn change_source(&self) -> Option<PathBuf> {
            self.change_source.clone()
        }
    }

    fn next(handle: &WatchHandle) -> VolumeEvent {
        handle
            .receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("watcher must report")
    }

    fn vol(name: &str, dev: &str) -> Volume {
        Volume {
            device: PathBuf::from(dev),
            name: name.into(),
            mount_path: PathBuf::from(format!("/media/{name}")),
            handle: ArbitrationHandle::new(dev),
        }
    }

    #[test]
    fn test_first_reconcile_adds_everything() {
        let mut set = VolumeSet::new();
        let events = set.reconcile(vec![vol("A", "/dev/sdb1"), vol("B", "/dev/sdc1")]);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], VolumeEvent::Added(v) if v.name == "A"));
        assert_eq!(set.volumes().len(), 2);
    }

    #[test]
    fn test_reconcile_by_name() {
        let mut set = VolumeSet::new();
        set.reconcile(vec![vol("A", "/dev/sdb1"), vol("B", "/dev/sdc1")]);

        // B leaves, C arrives, A comes back on a different node.
        let events = set.reconcile(vec![vol("C", "/dev/sdd1"), vol("A", "/dev/sde1")]);
        assert_eq!(
            events,
            vec![
                VolumeEvent::Removed(vol("B", "/dev/sdc1")),
                VolumeEvent::Added(vol("C", "/dev/sdd1")),
            ]
        );
        let names: Vec<_> = set.volumes().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["A", "C"]);
        assert_eq!(set.get("A").unwrap().device, PathBuf::from("/dev/sde1"));
    }

    #[test]
    fn test_unchanged_set_is_quiet() {
        let mut set = VolumeSet::new();
        set.reconcile(vec![vol("A", "/dev/sdb1")]);
        assert!(set.reconcile(vec![vol("A", "/dev/sdb1")]).is_empty());
    }

    #[test]
    fn test_watcher_reports_changes_and_stops() {
        let volumes = Arc::new(ScriptedVolumes::default());
        *volumes.current.lock() = vec![vol("A", "/dev/sdb1"), vol("B", "/dev/sdc1")];
        let handle = start_watcher(volumes.clone(), Duration::from_millis(10)).unwrap();

        assert_eq!(next(&handle), VolumeEvent::Added(vol("A", "/dev/sdb1")));
        assert_eq!(next(&handle), VolumeEvent::Added(vol("B", "/dev/sdc1")));

        *volumes.current.lock() = vec![vol("B", "/dev/sdc1"), vol("C", "/dev/sdd1")];
        assert_eq!(next(&handle), VolumeEvent::Removed(vol("A", "/dev/sdb1")));
        assert_eq!(next(&handle), VolumeEvent::Added(vol("C", "/dev/sdd1")));

        handle.stop();
        // The thread exits and drops its sender.
        assert_eq!(
            handle.receiver.recv_timeout(Duration::from_secs(5)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn test_watcher_polls_when_change_source_is_quiet() {
        let tmp = tempfile::TempDir::new().unwrap();
        let quiet = tmp.path().join("mounts");
        std::fs::write(&quiet, "").unwrap();
        let volumes = Arc::new(ScriptedVolumes {
            change_source: Some(quiet),
            ..ScriptedVolumes::default()
        });
        let handle = start_watcher(volumes.clone(), Duration::from_millis(20)).unwrap();

        *volumes.current.lock() = vec![vol("A", "/dev/sdb1")];
        assert_eq!(next(&handle), VolumeEvent::Added(vol("A", "/dev/sdb1")));
        handle.stop();
    }

    #[test]
    fn test_missing_change_source_falls_back_to_polling() {
        let volumes = Arc::new(ScriptedVolumes {
            change_source: Some(PathBuf::from("/nonexistent/drivesort/mounts")),
            ..ScriptedVolumes::default()
        });
        *volumes.current.lock() = vec![vol("A", "/dev/sdb1")];
        let handle = start_watcher(volumes, Duration::from_millis(10)).unwrap();
        assert_eq!(next(&handle), VolumeEvent::Added(vol("A", "/dev/sdb1")));
        handle.stop();
    }

    #[cfg(unix)]
    #[test]
    fn test_regular_file_never_signals_change() {
        let file = tempfile::tempfile().unwrap();
        let started = Instant::now();
        assert!(!wait_for_change(&file, Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
