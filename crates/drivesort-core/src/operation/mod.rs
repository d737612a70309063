/// The orchestration engine.
///
/// A [`SortEngine`] sequences one request at a time through
///
/// ```text
/// Idle -> Unmounting -> Invoking (sort, then list) -> Parsing -> Remounting -> Idle
/// ```
///
/// Every transition happens on a single engine thread that drains one
/// inbox. Arbitration completions and tool results are posted into that
/// inbox, so they can never interleave. The tool itself runs on a separate
/// invoker thread because reading its output blocks until it exits.
///
/// Failure handling:
/// - unmount failure ends the request, nothing is invoked or remounted;
/// - invocation failure ends the request, but the volume is still remounted;
/// - remount failure is recorded as a warning and never changes the outcome.
pub mod command;
pub mod report;

pub use command::{plan, Invocation};
pub use report::{OperationEvent, OperationReport, OperationWarning, Phase};

use crate::error::{
    InvocationStage, MountError, OperationError, PrivilegeError, StartError, UnmountError,
};
use crate::listing;
use crate::model::{FileNode, OperationRequest};
use crate::platform::{Completion, VolumeController};
use crate::privilege::{PrivilegedOutput, PrivilegedRunner};
use chrono::{DateTime, Local};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

type ResultCallback = Box<dyn FnOnce(OperationReport) + Send>;

/// Messages processed by the engine thread.
enum EngineMsg {
    Start {
        request: OperationRequest,
        on_result: ResultCallback,
    },
    Unmounted(Result<(), UnmountError>),
    Invoked {
        stage: InvocationStage,
        result: Result<Vec<u8>, PrivilegeError>,
    },
    Mounted(Result<(), MountError>),
    Shutdown,
}

struct InvokeJob {
    stage: InvocationStage,
    args: Vec<OsString>,
}

/// The single in-flight slot, readable from any thread.
struct Shared {
    phase: Mutex<Phase>,
}

/// Handle to the engine. Cheap to query from any thread. Dropping it does
/// not block; the engine thread exits once any operation in flight has
/// finished, remount included, and its callback has run.
pub struct SortEngine {
    shared: Arc<Shared>,
    inbox: Sender<EngineMsg>,
    _thread: thread::JoinHandle<()>,
}

impl SortEngine {
    /// Spawn the engine and its invoker thread.
    ///
    /// `tool` is the path of the external sorting tool.
    pub fn new(
        controller: Arc<dyn VolumeController>,
        runner: Arc<dyn PrivilegedRunner>,
        tool: PathBuf,
    ) -> io::Result<Self> {
        Self::spawn(controller, runner, tool, None)
    }

    /// Like [`SortEngine::new`], additionally reporting every phase change
    /// on `observer`.
    pub fn with_observer(
        controller: Arc<dyn VolumeController>,
        runner: Arc<dyn PrivilegedRunner>,
        tool: PathBuf,
        observer: Sender<OperationEvent>,
    ) -> io::Result<Self> {
        Self::spawn(controller, runner, tool, Some(observer))
    }

    fn spawn(
        controller: Arc<dyn VolumeController>,
        runner: Arc<dyn PrivilegedRunner>,
        tool: PathBuf,
        observer: Option<Sender<OperationEvent>>,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            phase: Mutex::new(Phase::Idle),
        });
        let (inbox, rx) = unbounded::<EngineMsg>();
        let (jobs_tx, jobs_rx) = unbounded::<InvokeJob>();

        let invoker_inbox = inbox.clone();
        thread::Builder::new()
            .name("drivesort-invoker".into())
            .spawn(move || run_invoker(runner, tool, jobs_rx, invoker_inbox))?;

        let orchestrator = Orchestrator {
            shared: Arc::clone(&shared),
            controller,
            invoker: jobs_tx,
            inbox: inbox.clone(),
            observer,
            current: None,
        };
        let thread = thread::Builder::new()
            .name("drivesort-engine".into())
            .spawn(move || orchestrator.run(rx))?;

        Ok(Self {
            shared,
            inbox,
            _thread: thread,
        })
    }

    /// Current phase. `Idle` means a new request would be accepted.
    pub fn phase(&self) -> Phase {
        *self.shared.phase.lock()
    }

    pub fn is_busy(&self) -> bool {
        self.phase() != Phase::Idle
    }

    /// Submit a request. `on_result` runs exactly once, on the engine
    /// thread, after the engine is back to `Idle`.
    ///
    /// Returns [`StartError::OperationInProgress`] without touching the
    /// running operation if one is already in flight.
    pub fn start(
        &self,
        request: OperationRequest,
        on_result: impl FnOnce(OperationReport) + Send + 'static,
    ) -> Result<(), StartError> {
        {
            let mut phase = self.shared.phase.lock();
            if *phase != Phase::Idle {
                debug!("Rejecting request while {}", phase.label());
                return Err(StartError::OperationInProgress);
            }
            *phase = Phase::Unmounting;
        }

        let msg = EngineMsg::Start {
            request,
            on_result: Box::new(on_result),
        };
        if self.inbox.send(msg).is_err() {
            *self.shared.phase.lock() = Phase::Idle;
            return Err(StartError::EngineStopped);
        }
        Ok(())
    }

    /// Submit a request and block until its report arrives.
    ///
    /// Must not be called from inside an `on_result` callback.
    pub fn run(&self, request: OperationRequest) -> Result<OperationReport, StartError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.start(request, move |report| {
            let _ = tx.send(report);
        })?;
        rx.recv().map_err(|_| StartError::EngineStopped)
    }
}

impl Drop for SortEngine {
    fn drop(&mut self) {
        let _ = self.inbox.send(EngineMsg::Shutdown);
    }
}

// ─── Engine thread ───────────────────────────────────────────────────────────

struct InFlight {
    request: OperationRequest,
    on_result: ResultCallback,
    pending: VecDeque<Invocation>,
    outcome: Option<Result<FileNode, OperationError>>,
    warnings: Vec<OperationWarning>,
    started_at: DateTime<Local>,
}

struct Orchestrator {
    shared: Arc<Shared>,
    controller: Arc<dyn VolumeController>,
    invoker: Sender<InvokeJob>,
    inbox: Sender<EngineMsg>,
    observer: Option<Sender<OperationEvent>>,
    current: Option<InFlight>,
}

impl Orchestrator {
    fn run(mut self, rx: Receiver<EngineMsg>) {
        let mut stopping = false;
        for msg in rx {
            match msg {
                EngineMsg::Start { request, on_result } => self.on_start(request, on_result),
                EngineMsg::Unmounted(result) => self.on_unmounted(result),
                EngineMsg::Invoked { stage, result } => self.on_invoked(stage, result),
                EngineMsg::Mounted(result) => self.on_mounted(result),
                EngineMsg::Shutdown => {
                    if self.current.is_some() {
                        // The volume may be offline; run to the remount first.
                        info!("Engine stopping after the operation in flight");
                    }
                    stopping = true;
                }
            }
            if stopping && self.current.is_none() {
                break;
            }
        }

        if self.current.is_some() {
            warn!("Engine stopping with an operation in flight");
            self.set_outcome(Err(OperationError::EngineStopped));
            self.finish();
        }
        debug!("Engine thread exiting");
    }

    fn set_phase(&self, phase: Phase) {
        *self.shared.phase.lock() = phase;
        debug!("Engine phase: {}", phase.label());
        self.notify(OperationEvent::PhaseChanged(phase));
    }

    fn notify(&self, event: OperationEvent) {
        if let Some(observer) = &self.observer {
            let _ = observer.send(event);
        }
    }

    fn set_outcome(&mut self, outcome: Result<FileNode, OperationError>) {
        if let Some(op) = self.current.as_mut() {
            op.outcome = Some(outcome);
        }
    }

    fn on_start(&mut self, request: OperationRequest, on_result: ResultCallback) {
        if self.current.is_some() {
            // `start` claims the slot before posting, so this means a bug.
            warn!("Start received while an operation is in flight; dropping it");
            return;
        }

        info!(
            "Starting {:?} on {} ({})",
            request.mode,
            request.volume.name,
            request.volume.device.display()
        );
        let volume = request.volume.clone();
        self.current = Some(InFlight {
            request,
            on_result,
            pending: VecDeque::new(),
            outcome: None,
            warnings: Vec::new(),
            started_at: Local::now(),
        });
        self.set_phase(Phase::Unmounting);

        let inbox = self.inbox.clone();
        self.controller.unmount(
            &volume,
            Completion::new(volume.device.display().to_string(), move |result| {
                let _ = inbox.send(EngineMsg::Unmounted(result));
            }),
        );
    }

    fn on_unmounted(&mut self, result: Result<(), UnmountError>) {
        let Some(op) = self.current.as_mut() else {
            warn!("Unmount completion with no operation in flight");
            return;
        };
        match result {
            Ok(()) => {
                info!("Unmounted {}", op.request.volume.device.display());
                op.pending = plan(&op.request).into();
                self.dispatch_next();
            }
            Err(e) => {
                warn!("Unmount failed: {e}");
                self.set_outcome(Err(e.into()));
                self.finish();
            }
        }
    }

    fn dispatch_next(&mut self) {
        let Some(Invocation { stage, args }) =
            self.current.as_mut().and_then(|op| op.pending.pop_front())
        else {
            return;
        };
        self.set_phase(Phase::Invoking(stage));
        if self.invoker.send(InvokeJob { stage, args }).is_err() {
            let source = PrivilegeError::Io(io::Error::other("invoker thread stopped"));
            self.set_outcome(Err(OperationError::Invocation { stage, source }));
            self.remount();
        }
    }

    fn on_invoked(&mut self, stage: InvocationStage, result: Result<Vec<u8>, PrivilegeError>) {
        let Some(op) = self.current.as_ref() else {
            warn!("Invocation result with no operation in flight");
            return;
        };
        let more = !op.pending.is_empty();

        match result {
            Ok(output) if more => {
                info!("{stage} pass finished");
                debug!("{stage} output:\n{}", String::from_utf8_lossy(&output));
                self.dispatch_next();
            }
            Ok(output) => {
                self.set_phase(Phase::Parsing);
                let tree = listing::parse_bytes(&output);
                info!("Listing parsed: {} entries", tree.descendant_count());
                self.set_outcome(Ok(tree));
                self.remount();
            }
            Err(source) => {
                warn!("{stage} invocation failed: {source}");
                self.set_outcome(Err(OperationError::Invocation { stage, source }));
                self.remount();
            }
        }
    }

    fn remount(&mut self) {
        let Some(volume) = self.current.as_ref().map(|op| op.request.volume.clone()) else {
            return;
        };
        self.set_phase(Phase::Remounting);

        let inbox = self.inbox.clone();
        self.controller.mount(
            &volume,
            Completion::new(volume.device.display().to_string(), move |result| {
                let _ = inbox.send(EngineMsg::Mounted(result));
            }),
        );
    }

    fn on_mounted(&mut self, result: Result<(), MountError>) {
        let Some(op) = self.current.as_mut() else {
            warn!("Mount completion with no operation in flight");
            return;
        };
        match result {
            Ok(()) => info!("Remounted {}", op.request.volume.device.display()),
            Err(e) => {
                warn!("Remount failed: {e}");
                op.warnings.push(OperationWarning::RemountFailed(e));
            }
        }
        self.finish();
    }

    /// Release the slot and hand the report to the caller.
    fn finish(&mut self) {
        let Some(op) = self.current.take() else {
            return;
        };
        let report = OperationReport {
            request: op.request,
            outcome: op
                .outcome
                .unwrap_or(Err(OperationError::EngineStopped)),
            warnings: op.warnings,
            started_at: op.started_at,
            finished_at: Local::now(),
        };

        self.set_phase(Phase::Idle);
        self.notify(OperationEvent::Finished {
            succeeded: report.is_success(),
        });
        match &report.outcome {
            Ok(_) => info!("Operation finished in {} ms", report.duration().num_milliseconds()),
            Err(e) => warn!("Operation failed: {e}"),
        }
        (op.on_result)(report);
    }
}

// ─── Invoker thread ──────────────────────────────────────────────────────────

/// Runs tool invocations one at a time. Blocking on the tool's pipe here
/// keeps the engine thread free to receive arbitration completions.
fn run_invoker(
    runner: Arc<dyn PrivilegedRunner>,
    tool: PathBuf,
    jobs: Receiver<InvokeJob>,
    inbox: Sender<EngineMsg>,
) {
    for job in jobs {
        info!(
            "Invoking {} {}",
            tool.display(),
            command::display_args(&job.args)
        );
        let result = runner
            .run(&tool, &job.args)
            .and_then(PrivilegedOutput::collect);
        if inbox
            .send(EngineMsg::Invoked {
                stage: job.stage,
                result,
            })
            .is_err()
        {
            break;
        }
    }
    debug!("Invoker thread exiting");
}
