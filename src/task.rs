//! The periodic control task.
//!
//! A [`ControlTask`] runs one [`ControlLaw`] against one [`MotorBackend`] on a dedicated thread.
//! Each tick it reads the law's measurement, steps the law, applies the resulting command,
//! acknowledges the host watchdog, sleeps out the period and then checks for a stop request.
//!
//! The law, the backend and the scheduler are moved into the thread by [`ControlTask::start`]
//! and handed back by [`ControlTask::stop`], so only one running law can ever command a backend.
//! The law's working variables live on the control thread only.

use std::string::String;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, TryLockError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::backend::MotorBackend;
use crate::law::{ControlCommand, ControlLaw, Quantity};
use crate::safety::Zone;
use crate::stats::RegenStats;
use crate::time::{period_ticks, Scheduler};
use crate::{lit, Real};

/// Lifecycle of a control task.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// No control thread is running.
    Stopped = 0,
    /// A thread has been requested but has not entered its loop yet.
    Starting = 1,
    /// The control loop is ticking.
    Running = 2,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RunState::Starting,
            2 => RunState::Running,
            _ => RunState::Stopped,
        }
    }
}

/// Errors reported by [`ControlTask`].
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The OS refused to create the control thread.
    #[error("failed to spawn the control thread")]
    Spawn(#[source] std::io::Error),

    /// The control thread panicked. The law, backend and scheduler were lost with it.
    #[error("the control thread panicked")]
    Panicked,

    /// A previous run panicked, so there is nothing left to start.
    #[error("the control task lost its parts in an earlier panic and cannot be restarted")]
    Unavailable,
}

/// A read-only snapshot of the last tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Telemetry<F> {
    /// The measurement the law was stepped with.
    pub measurement: F,
    /// The command sent to the backend.
    pub command: ControlCommand<F>,
    /// The branch that produced the command.
    pub zone: Zone,
    /// The counters after the tick.
    pub stats: RegenStats<F>,
}

struct Shared<F, L> {
    stop: AtomicBool,
    run_state: AtomicU8,
    reset_stats: AtomicBool,
    retune: Mutex<Option<L>>,
    telemetry: Mutex<Option<Telemetry<F>>>,
}

impl<F, L> Shared<F, L> {
    fn set_run_state(&self, state: RunState) {
        self.run_state.store(state as u8, Ordering::Release);
    }
}

/// Marks the task stopped when the control thread exits, including by unwinding.
struct StoppedOnExit<'a, F, L>(&'a Shared<F, L>);

impl<F, L> Drop for StoppedOnExit<'_, F, L> {
    fn drop(&mut self) {
        self.0.set_run_state(RunState::Stopped);
    }
}

struct Parts<F, L, B, S> {
    law: L,
    backend: B,
    scheduler: S,
    stats: RegenStats<F>,
}

/// A control law running periodically against a motor backend.
///
/// Dropping a running task stops it and joins its thread.
pub struct ControlTask<F, L, B, S>
where
    F: Real,
    L: ControlLaw<F>,
    B: MotorBackend<F> + Send + 'static,
    S: Scheduler + Send + 'static,
{
    name: String,
    shared: Arc<Shared<F, L>>,
    parts: Option<Parts<F, L, B, S>>,
    handle: Option<JoinHandle<Option<Parts<F, L, B, S>>>>,
}

impl<F, L, B, S> ControlTask<F, L, B, S>
where
    F: Real,
    L: ControlLaw<F>,
    B: MotorBackend<F> + Send + 'static,
    S: Scheduler + Send + 'static,
{
    /// Creates a stopped task.
    pub fn new(law: L, backend: B, scheduler: S) -> Self {
        ControlTask {
            name: String::from("regen-control"),
            shared: Arc::new(Shared {
                stop: AtomicBool::new(true),
                run_state: AtomicU8::new(RunState::Stopped as u8),
                reset_stats: AtomicBool::new(false),
                retune: Mutex::new(None),
                telemetry: Mutex::new(None),
            }),
            parts: Some(Parts {
                law,
                backend,
                scheduler,
                stats: RegenStats::new(),
            }),
            handle: None,
        }
    }

    /// Sets the name of the control thread and of the task in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = String::from(name);
        self
    }

    /// Returns the lifecycle state.
    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.shared.run_state.load(Ordering::Acquire))
    }

    /// Returns `true` if a control thread has been started and not yet joined.
    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Starts the control thread.
    ///
    /// Starting a task that is already started does nothing. The law starts from a fresh state
    /// on every activation.
    ///
    /// # Errors
    /// [`TaskError::Spawn`] if the thread cannot be created, in which case the task stays
    /// stopped and can be started again. [`TaskError::Unavailable`] if an earlier run panicked.
    pub fn start(&mut self) -> Result<(), TaskError> {
        if self.handle.is_some() {
            debug!("{}: start requested while already started", self.name);
            return Ok(());
        }
        let Some(parts) = self.parts.take() else {
            return Err(TaskError::Unavailable);
        };

        self.shared.stop.store(false, Ordering::Release);
        self.shared.set_run_state(RunState::Starting);

        // Parts go through a channel so a failed spawn does not drop them
        let (tx, rx) = mpsc::sync_channel(1);
        let shared = Arc::clone(&self.shared);
        let name = self.name.clone();
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let parts = rx.recv().ok()?;
                Some(run(&name, &shared, parts))
            });

        match spawned {
            Ok(handle) => {
                if let Err(mpsc::SendError(parts)) = tx.send(parts) {
                    // Unreachable while the receiver lives in the thread; keep the parts anyway
                    self.parts = Some(parts);
                    self.shared.set_run_state(RunState::Stopped);
                    return Ok(());
                }
                self.handle = Some(handle);
                info!("{}: started", self.name);
                Ok(())
            }
            Err(err) => {
                self.shared.stop.store(true, Ordering::Release);
                self.shared.set_run_state(RunState::Stopped);
                self.parts = Some(parts);
                Err(TaskError::Spawn(err))
            }
        }
    }

    /// Requests a stop and blocks until the control thread has exited.
    ///
    /// The thread notices the request at its next tick boundary, so this waits for up to one
    /// control period plus the duration of the backend calls. Returns the counters of the run.
    /// Stopping a stopped task only returns the counters.
    ///
    /// # Errors
    /// [`TaskError::Panicked`] if the control thread panicked.
    pub fn stop(&mut self) -> Result<RegenStats<F>, TaskError> {
        let Some(handle) = self.handle.take() else {
            return self
                .parts
                .as_ref()
                .map(|parts| parts.stats)
                .ok_or(TaskError::Unavailable);
        };

        self.shared.stop.store(true, Ordering::Release);
        let joined = handle.join();
        self.shared.set_run_state(RunState::Stopped);

        match joined {
            Ok(Some(mut parts)) => {
                self.apply_staged(&mut parts);
                let stats = parts.stats;
                self.parts = Some(parts);
                info!("{}: stopped after {} ticks", self.name, stats.iterations());
                Ok(stats)
            }
            Ok(None) => Err(TaskError::Unavailable),
            Err(_) => {
                warn!("{}: control thread panicked", self.name);
                Err(TaskError::Panicked)
            }
        }
    }

    /// Applies requests the control thread exited before seeing.
    fn apply_staged(&self, parts: &mut Parts<F, L, B, S>) {
        let staged = match self.shared.retune.lock() {
            Ok(mut staged) => staged.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(law) = staged {
            parts.law = law;
            info!("{}: retuned while stopping", self.name);
        }
        if self.shared.reset_stats.swap(false, Ordering::AcqRel) {
            parts.stats.reset();
        }
    }

    /// Replaces the control law.
    ///
    /// On a running task the new law is staged and swapped in at the next tick boundary, where
    /// the law's state is reset. The state is never touched from the caller's thread. A later
    /// request overrides a staged one that has not been applied yet, and [`stop`](Self::stop)
    /// applies one the thread exited before seeing.
    pub fn request_retune(&mut self, law: L) {
        match self.parts.as_mut() {
            Some(parts) if self.handle.is_none() => parts.law = law,
            _ => match self.shared.retune.lock() {
                Ok(mut staged) => *staged = Some(law),
                Err(poisoned) => *poisoned.into_inner() = Some(law),
            },
        }
    }

    /// Zeroes the counters, at the next tick boundary if the task is running.
    pub fn request_stats_reset(&mut self) {
        match self.parts.as_mut() {
            Some(parts) if self.handle.is_none() => parts.stats.reset(),
            _ => self.shared.reset_stats.store(true, Ordering::Release),
        }
    }

    /// Returns the snapshot published by the most recent tick, if any.
    pub fn telemetry(&self) -> Option<Telemetry<F>> {
        match self.shared.telemetry.lock() {
            Ok(snapshot) => *snapshot,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Returns the counters of the last run. `None` while the task is started.
    pub fn stats(&self) -> Option<RegenStats<F>> {
        self.parts.as_ref().map(|parts| parts.stats)
    }

    /// Returns the control law. `None` while the task is started.
    pub fn law(&self) -> Option<&L> {
        self.parts.as_ref().map(|parts| &parts.law)
    }

    /// Returns the backend. `None` while the task is started.
    pub fn backend(&self) -> Option<&B> {
        self.parts.as_ref().map(|parts| &parts.backend)
    }

    /// Returns the backend mutably. `None` while the task is started.
    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.parts.as_mut().map(|parts| &mut parts.backend)
    }

    /// Returns the scheduler. `None` while the task is started.
    pub fn scheduler(&self) -> Option<&S> {
        self.parts.as_ref().map(|parts| &parts.scheduler)
    }
}

impl<F, L, B, S> Drop for ControlTask<F, L, B, S>
where
    F: Real,
    L: ControlLaw<F>,
    B: MotorBackend<F> + Send + 'static,
    S: Scheduler + Send + 'static,
{
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(err) = self.stop() {
                warn!("{}: {err} while dropping the task", self.name);
            }
        }
    }
}

/// The control loop. Runs on the control thread until a stop is requested.
fn run<F, L, B, S>(name: &str, shared: &Shared<F, L>, mut parts: Parts<F, L, B, S>) -> Parts<F, L, B, S>
where
    F: Real,
    L: ControlLaw<F>,
    B: MotorBackend<F>,
    S: Scheduler,
{
    let _stopped = StoppedOnExit(shared);
    shared.set_run_state(RunState::Running);

    let mut state = L::State::default();
    let mut last_zone = None;

    loop {
        if let Ok(mut staged) = shared.retune.try_lock() {
            if let Some(law) = staged.take() {
                parts.law = law;
                state = L::State::default();
                info!("{name}: retuned, state reset");
            }
        }
        if shared.reset_stats.swap(false, Ordering::AcqRel) {
            parts.stats.reset();
        }

        let rate = parts.law.update_rate_hz();
        let period = period_ticks(parts.scheduler.frequency_hz(), rate);

        let measurement = L::QUANTITY.read(&mut parts.backend);
        let decision = parts.law.step(measurement, &mut state);
        parts.backend.apply(decision.command);
        parts.backend.acknowledge_liveness();

        parts.stats.record_tick(decision.magnitude);
        if L::QUANTITY == Quantity::BusVoltage && !decision.command.is_release() {
            let dt = F::one() / lit::<F>(rate as f32);
            parts.stats.record_energy(decision.magnitude, measurement, dt);
        }

        if last_zone != Some(decision.zone) {
            match decision.zone {
                Zone::BelowMinimum => {
                    warn!("{name}: {measurement:?} below the floor, output disabled")
                }
                Zone::Active => info!("{name}: {measurement:?}, control active"),
                Zone::Idle => info!("{name}: {measurement:?}, idle"),
            }
            last_zone = Some(decision.zone);
        }

        if parts.stats.iterations() % u64::from(rate.max(1)) == 0 {
            debug!(
                "{name}: measured {:?}, magnitude {:?}, recovered {:?} Wh, peak {:?}, ticks {}",
                measurement,
                decision.magnitude,
                parts.stats.energy_recovered_wh(),
                parts.stats.max_current(),
                parts.stats.iterations()
            );
        }

        publish(
            shared,
            Telemetry {
                measurement,
                command: decision.command,
                zone: decision.zone,
                stats: parts.stats,
            },
        );

        parts.scheduler.sleep(period);

        if shared.stop.load(Ordering::Acquire) {
            break;
        }
    }

    parts
}

/// Publishes a snapshot without blocking the control thread. A contended tick is skipped.
fn publish<F, L>(shared: &Shared<F, L>, snapshot: Telemetry<F>) {
    match shared.telemetry.try_lock() {
        Ok(mut slot) => *slot = Some(snapshot),
        Err(TryLockError::Poisoned(poisoned)) => *poisoned.into_inner() = Some(snapshot),
        Err(TryLockError::WouldBlock) => {}
    }
}
