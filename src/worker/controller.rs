//! Worker Controller Module
//!
//! Runs discovery and batch execution on a background thread and reports back
//! over a channel. At most one worker runs at a time: starting a discovery
//! while a run is in progress (or the reverse) is refused with
//! [`ExtractError::Busy`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use crate::core::discovery::{IdFilter, IdentifierResolver, SetMode};
use crate::core::error::{ExtractError, Result};
use crate::core::executor::{BatchExecutor, ExecutorConfig, RunOutcome};
use crate::core::progress::CancellationToken;
use crate::core::selection::{ElementType, SelectionState};
use crate::reader::SeriesReader;
use crate::worker::events::{WorkKind, WorkerEvent};

// =============================================================================
// Controller State
// =============================================================================

/// Current state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControllerState {
    Idle = 0,
    Discovering = 1,
    Running = 2,
    /// Cancellation requested, worker still finishing its current unit
    Cancelling = 3,
}

impl From<u8> for ControllerState {
    fn from(value: u8) -> Self {
        match value {
            1 => ControllerState::Discovering,
            2 => ControllerState::Running,
            3 => ControllerState::Cancelling,
            _ => ControllerState::Idle,
        }
    }
}

/// Parameters of a discovery pass
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRequest {
    pub files: Vec<PathBuf>,
    pub types: Vec<ElementType>,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub mode: SetMode,
}

// =============================================================================
// Controller
// =============================================================================

/// Owns the reader, the cancellation token and the event channel shared with
/// the worker thread
pub struct WorkerController {
    reader: Arc<dyn SeriesReader>,
    state: Arc<AtomicU8>,
    /// Which worker is active, for the busy message
    active: Arc<Mutex<Option<WorkKind>>>,
    cancel: CancellationToken,
    event_tx: Sender<WorkerEvent>,
    event_rx: Receiver<WorkerEvent>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerController {
    pub fn new(reader: Arc<dyn SeriesReader>) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            reader,
            state: Arc::new(AtomicU8::new(ControllerState::Idle as u8)),
            active: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
            event_tx,
            event_rx,
            worker_handle: Mutex::new(None),
        }
    }

    /// Use an externally owned token, e.g. one a Ctrl+C handler also sets
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> ControllerState {
        ControllerState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn is_busy(&self) -> bool {
        self.state() != ControllerState::Idle
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Receiver for worker events; clones share the same queue
    pub fn events(&self) -> Receiver<WorkerEvent> {
        self.event_rx.clone()
    }

    /// Receive an event, giving up after `timeout`
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<WorkerEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Claim the controller for `kind`, or report what is already running
    fn claim(&self, kind: WorkKind, next: ControllerState) -> Result<()> {
        let claimed = self.state.compare_exchange(
            ControllerState::Idle as u8,
            next as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if claimed.is_err() {
            let running = self
                .active
                .lock()
                .ok()
                .and_then(|a| *a)
                .unwrap_or(kind);
            return Err(ExtractError::Busy(running.as_str()));
        }

        // The previous worker already released the state; reap its thread
        self.reap();
        if let Ok(mut active) = self.active.lock() {
            *active = Some(kind);
        }
        self.cancel.reset();
        Ok(())
    }

    fn release(state: &AtomicU8, active: &Mutex<Option<WorkKind>>) {
        if let Ok(mut active) = active.lock() {
            *active = None;
        }
        state.store(ControllerState::Idle as u8, Ordering::SeqCst);
    }

    fn reap(&self) {
        let previous = self
            .worker_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = previous {
            if handle.join().is_err() {
                warn!("Previous worker thread panicked");
            }
        }
    }

    /// Start a discovery pass on a background thread.
    ///
    /// Invalid include/exclude patterns are reported here, before the thread
    /// starts.
    pub fn start_discovery(&self, request: DiscoveryRequest) -> Result<()> {
        IdFilter::new(request.include.as_deref(), request.exclude.as_deref())?;
        self.claim(WorkKind::Discovery, ControllerState::Discovering)?;

        let reader = Arc::clone(&self.reader);
        let state = Arc::clone(&self.state);
        let active = Arc::clone(&self.active);
        let cancel = self.cancel.clone();
        let event_tx = self.event_tx.clone();

        info!(
            "Starting discovery over {} file(s), {} type(s)",
            request.files.len(),
            request.types.len()
        );

        // Held until the handle is stored; the next claim reaps through it
        let mut slot = self
            .worker_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(thread::spawn(move || {
            let progress_tx = event_tx.clone();
            let resolver = IdentifierResolver::new(
                reader.as_ref(),
                request.include.as_deref(),
                request.exclude.as_deref(),
                request.mode,
            );
            let event = match resolver {
                Ok(resolver) => {
                    let result = resolver
                        .with_progress(move |update| {
                            let _ = progress_tx.send(WorkerEvent::DiscoveryProgress(update));
                        })
                        .with_cancellation(cancel)
                        .discover(&request.files, &request.types);
                    WorkerEvent::DiscoveryFinished(result)
                }
                Err(e) => WorkerEvent::Failed {
                    kind: WorkKind::Discovery,
                    configuration: e.is_configuration(),
                    message: e.to_string(),
                },
            };
            debug!("{}", event.describe());
            Self::release(&state, &active);
            let _ = event_tx.send(event);
        }));
        Ok(())
    }

    /// Start a batch run on a background thread. The selection is moved into
    /// the worker and stays unchanged for the whole run.
    pub fn start_run(&self, selection: SelectionState, plan_only: bool) -> Result<()> {
        self.claim(WorkKind::Run, ControllerState::Running)?;

        let reader = Arc::clone(&self.reader);
        let state = Arc::clone(&self.state);
        let active = Arc::clone(&self.active);
        let cancel = self.cancel.clone();
        let event_tx = self.event_tx.clone();

        info!(
            "Starting {} over {} file(s)",
            if plan_only { "plan" } else { "run" },
            selection.files.len()
        );

        // Held until the handle is stored; the next claim reaps through it
        let mut slot = self
            .worker_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(thread::spawn(move || {
            let progress_tx = event_tx.clone();
            let message_tx = event_tx.clone();
            let config = ExecutorConfig::default()
                .plan_only(plan_only)
                .with_progress(move |update| {
                    let _ = progress_tx.send(WorkerEvent::Progress(update));
                })
                .with_messages(move |message| {
                    let _ = message_tx.send(WorkerEvent::Message(message.to_string()));
                });

            let event = match BatchExecutor::new(reader.as_ref(), config)
                .with_cancellation(cancel)
                .run(&selection)
            {
                Ok(RunOutcome::Completed(report)) => WorkerEvent::RunFinished(report),
                Ok(RunOutcome::Cancelled(report)) => WorkerEvent::Cancelled(report),
                Err(e) => WorkerEvent::Failed {
                    kind: WorkKind::Run,
                    configuration: e.is_configuration(),
                    message: e.to_string(),
                },
            };
            debug!("{}", event.describe());
            Self::release(&state, &active);
            let _ = event_tx.send(event);
        }));
        Ok(())
    }

    /// Ask the active worker to stop after its current unit
    pub fn cancel(&self) -> Result<()> {
        let cancelling = self.state.compare_exchange(
            ControllerState::Running as u8,
            ControllerState::Cancelling as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        let discovering = self.state() == ControllerState::Discovering;
        if cancelling.is_err() && !discovering {
            return Err(ExtractError::IoError("No active worker to cancel".to_string()));
        }
        info!("Cancellation requested");
        self.cancel.cancel();
        Ok(())
    }

    /// Block until the worker thread exits
    pub fn wait(&self) -> Result<()> {
        let handle = self
            .worker_handle
            .lock()
            .map_err(|_| ExtractError::IoError("Worker handle lock poisoned".to_string()))?
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| ExtractError::IoError("Worker thread panicked".to_string()))?;
        }
        Ok(())
    }

    /// Cancel anything running and wait for it
    pub fn shutdown(&self) {
        let _ = self.cancel();
        let _ = self.wait();
    }
}

impl Drop for WorkerController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
