//! Auto-compile scheduling.
//!
//! The scheduler is a single actor task that turns a stream of session
//! changes into compile triggers:
//!
//! ```text
//!              edit (enabled, has path)
//!   ┌──────┐ ─────────────────────────► ┌─────────┐   deadline    ┌───────────┐
//!   │ Idle │                            │ Pending │ ────────────► │ Compiling │
//!   └──────┘ ◄───────────────────────── └─────────┘               └───────────┘
//!      ▲      disabled / path cleared     ▲     │ edit: re-arm         │
//!      │                                  └─────┘                      │
//!      └───────────────────────────────────────────────────────────────┘
//!                    done (re-arms if edits arrived meanwhile)
//! ```
//!
//! Only one compile is ever in flight. Edits made while compiling still
//! update the session, and arm a fresh timer once the compile is done.
//! Manual requests skip the timer; one made while compiling is queued and
//! runs as soon as the current compile ends. Requests queued together share
//! that single run.

use crate::pipeline::{CompileError, Pipeline, Trigger};
use crate::session::{Session, SessionChange};
use ferroview_build::CompilationResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Outcome delivered to a manual compile request.
pub type ManualOutcome = Result<CompilationResult, Arc<CompileError>>;

/// Observable state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// A debounce timer is armed.
    Pending,
    Compiling,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    Pending { deadline: Instant },
    Compiling,
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::Idle => Phase::Idle,
            State::Pending { .. } => Phase::Pending,
            State::Compiling => Phase::Compiling,
        }
    }
}

type Waiter = oneshot::Sender<ManualOutcome>;

/// Handle to a running scheduler. Dropping it stops the scheduler; a compile
/// already in flight still runs to completion.
pub struct SchedulerHandle {
    requests: mpsc::Sender<Waiter>,
    phase: watch::Receiver<Phase>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Compiles now, bypassing the debounce timer.
    ///
    /// If a compile is in flight, this waits for it and then compiles again
    /// with whatever the content is at that point.
    pub async fn compile_now(&self) -> ManualOutcome {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(tx)
            .await
            .map_err(|_| Arc::new(CompileError::SchedulerStopped))?;
        rx.await
            .unwrap_or_else(|_| Err(Arc::new(CompileError::SchedulerStopped)))
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Follows phase transitions.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.clone()
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Starts the scheduler on the current tokio runtime.
pub fn spawn(pipeline: Arc<Pipeline>, delay: Duration) -> SchedulerHandle {
    let changes = pipeline.session().subscribe();
    let (requests_tx, requests_rx) = mpsc::channel(16);
    let (phase_tx, phase_rx) = watch::channel(Phase::Idle);

    let scheduler = Scheduler {
        session: pipeline.session().clone(),
        pipeline,
        delay,
        state: State::Idle,
        rearm_when_done: false,
        active_waiters: Vec::new(),
        queued_waiters: Vec::new(),
        phase: phase_tx,
    };
    let task = tokio::spawn(scheduler.run(changes, requests_rx));

    SchedulerHandle {
        requests: requests_tx,
        phase: phase_rx,
        task,
    }
}

struct Scheduler {
    session: Arc<Session>,
    pipeline: Arc<Pipeline>,
    delay: Duration,
    state: State,
    /// Edits arrived while compiling.
    rearm_when_done: bool,
    /// Requesters waiting on the compile in flight.
    active_waiters: Vec<Waiter>,
    /// Requesters waiting for the next compile.
    queued_waiters: Vec<Waiter>,
    phase: watch::Sender<Phase>,
}

impl Scheduler {
    async fn run(
        mut self,
        mut changes: broadcast::Receiver<SessionChange>,
        mut requests: mpsc::Receiver<Waiter>,
    ) {
        let (done_tx, mut done_rx) = mpsc::channel::<(Trigger, ManualOutcome)>(1);

        loop {
            let deadline = match self.state {
                State::Pending { deadline } => Some(deadline),
                _ => None,
            };

            tokio::select! {
                biased;
                Some((trigger, outcome)) = done_rx.recv() => {
                    self.on_compiled(trigger, outcome, &done_tx);
                }
                change = changes.recv() => match change {
                    Ok(change) => self.on_change(change),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("Scheduler missed {} session changes, re-evaluating", missed);
                        self.on_edit();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                request = requests.recv() => match request {
                    Some(waiter) => self.on_manual(waiter, &done_tx),
                    None => break,
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    log::debug!("Debounce elapsed, auto-compiling");
                    self.start(Trigger::Auto, &done_tx);
                }
            }
        }
        log::debug!("Scheduler stopped");
    }

    fn set_state(&mut self, state: State) {
        self.state = state;
        self.phase.send_replace(state.phase());
    }

    fn on_change(&mut self, change: SessionChange) {
        match change {
            SessionChange::Content | SessionChange::FilePath | SessionChange::AutoCompile(_) => {
                self.on_edit()
            }
            // Written by the pipeline itself.
            SessionChange::ArtifactPath
            | SessionChange::Compiling(_)
            | SessionChange::LastResult
            | SessionChange::ArtifactRevision(_) => {}
        }
    }

    fn on_edit(&mut self) {
        let active = self.session.auto_compile_active();
        match self.state {
            State::Compiling => self.rearm_when_done = active,
            State::Idle | State::Pending { .. } if active => self.arm(),
            State::Pending { .. } => {
                log::debug!("Auto-compile off or no file path, cancelling pending compile");
                self.set_state(State::Idle);
            }
            State::Idle => {}
        }
    }

    /// Arms the debounce timer for the full interval, replacing any armed one.
    fn arm(&mut self) {
        self.set_state(State::Pending {
            deadline: Instant::now() + self.delay,
        });
    }

    fn on_manual(&mut self, waiter: Waiter, done_tx: &mpsc::Sender<(Trigger, ManualOutcome)>) {
        match self.state {
            State::Compiling => {
                log::info!("Compile in progress, queueing manual compile");
                self.queued_waiters.push(waiter);
            }
            State::Idle | State::Pending { .. } => {
                self.active_waiters.push(waiter);
                self.start(Trigger::Manual, done_tx);
            }
        }
    }

    fn start(&mut self, trigger: Trigger, done_tx: &mpsc::Sender<(Trigger, ManualOutcome)>) {
        self.set_state(State::Compiling);
        self.rearm_when_done = false;

        // Captured now, not when the spawned task first runs.
        let snapshot = self.pipeline.snapshot();
        let pipeline = self.pipeline.clone();
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let outcome = pipeline
                .compile_snapshot(trigger, snapshot)
                .await
                .map_err(Arc::new);
            let _ = done_tx.send((trigger, outcome)).await;
        });
    }

    fn on_compiled(
        &mut self,
        trigger: Trigger,
        outcome: ManualOutcome,
        done_tx: &mpsc::Sender<(Trigger, ManualOutcome)>,
    ) {
        match &outcome {
            Ok(result) => log::info!(
                "{:?} compile finished (success: {})",
                trigger,
                result.success
            ),
            Err(e) => log::warn!("{:?} compile aborted: {}", trigger, e),
        }
        for waiter in self.active_waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
        self.set_state(State::Idle);

        if !self.queued_waiters.is_empty() {
            // The queued run compiles the latest content, covering any edits
            // made during the previous compile.
            self.active_waiters = std::mem::take(&mut self.queued_waiters);
            self.start(Trigger::Manual, done_tx);
        } else if std::mem::take(&mut self.rearm_when_done) && self.session.auto_compile_active() {
            self.arm();
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
