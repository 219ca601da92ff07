//! # Dispatch Scheduler
//!
//! Background task that owns the AT link and transmits one command per tick.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start--> Running <--pause/resume--> Paused
//!                    |                          |
//!                    +----------stop------------+--> Stopping --> Stopped
//! ```
//!
//! Every tick the task takes the oldest queued command, or a `COMWDG` when
//! the queue is empty, so the drone keeps receiving frames and never trips
//! its communication watchdog. Ticks are spaced by a fixed delay measured
//! from the end of the previous transmission.
//!
//! ## Discarded commands
//!
//! [`Scheduler::interrupt`] with `discard` drops every queued command when
//! its guard is released. Signals of discarded commands never fire, so a
//! caller blocked in [`CompletionSignal::wait`] on one of them stays blocked.

pub mod queue;
pub mod signal;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::at::{commands, AtLink, Command};
use crate::error::SchedulerError;
pub use queue::{CommandQueue, QueuedCommand};
pub use signal::CompletionSignal;

/// Default delay between ticks
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30);

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Paused,
    Stopping,
    Stopped,
}

impl SchedulerState {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Paused => "paused",
            SchedulerState::Stopping => "stopping",
            SchedulerState::Stopped => "stopped",
        }
    }
}

/// Lifecycle without the pause overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopping,
    Stopped,
}

struct Shared {
    link: AtLink,
    queue: CommandQueue,
    interval: Duration,
    lifecycle: Mutex<Lifecycle>,
    paused: watch::Sender<bool>,
    closed: watch::Sender<bool>,
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> SchedulerState {
        match *self.lifecycle() {
            Lifecycle::Idle => SchedulerState::Idle,
            Lifecycle::Running if *self.paused.borrow() => SchedulerState::Paused,
            Lifecycle::Running => SchedulerState::Running,
            Lifecycle::Stopping => SchedulerState::Stopping,
            Lifecycle::Stopped => SchedulerState::Stopped,
        }
    }

    fn invalid(&self, operation: &'static str) -> SchedulerError {
        SchedulerError::InvalidState {
            operation,
            state: self.state().name(),
        }
    }
}

/// Fixed-delay command dispatcher
pub struct Scheduler {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create an idle scheduler transmitting through `link`.
    ///
    /// # Arguments
    ///
    /// * `link` - Sequence-numbered AT link, owned by the scheduler from now on
    /// * `interval` - Delay between two transmissions
    pub fn new(link: AtLink, interval: Duration) -> Self {
        let (paused, _) = watch::channel(false);
        let (closed, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                link,
                queue: CommandQueue::new(),
                interval,
                lifecycle: Mutex::new(Lifecycle::Idle),
                paused,
                closed,
            }),
            task: Mutex::new(None),
        }
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// Number of commands waiting to be transmitted
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Spawn the tick task.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the scheduler is idle.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut lifecycle = self.shared.lifecycle();
        if *lifecycle != Lifecycle::Idle {
            drop(lifecycle);
            return Err(self.shared.invalid("start"));
        }
        *lifecycle = Lifecycle::Running;
        drop(lifecycle);

        let handle = tokio::spawn(tick_loop(
            Arc::clone(&self.shared),
            self.shared.paused.subscribe(),
            self.shared.closed.subscribe(),
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!("Scheduler started ({:?} interval)", self.shared.interval);
        Ok(())
    }

    /// Queue a command without waiting for it.
    ///
    /// # Arguments
    ///
    /// * `command` - Command to transmit
    /// * `want_signal` - Whether to return a signal fired after transmission
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` once the scheduler is stopping or stopped.
    pub fn enqueue(
        &self,
        command: Command,
        want_signal: bool,
    ) -> Result<Option<CompletionSignal>, SchedulerError> {
        if matches!(
            *self.shared.lifecycle(),
            Lifecycle::Stopping | Lifecycle::Stopped
        ) {
            return Err(self.shared.invalid("enqueue"));
        }

        let signal = want_signal.then(CompletionSignal::new);
        debug!("Queued {:?}", command);
        self.shared.queue.push(QueuedCommand {
            command,
            signal: signal.clone(),
        });
        Ok(signal)
    }

    /// Queue a command and wait until it has been transmitted.
    ///
    /// Waits forever if the scheduler stays paused or the command is
    /// discarded by an interrupt.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` once the scheduler is stopping or stopped.
    pub async fn send(&self, command: Command) -> Result<(), SchedulerError> {
        if let Some(signal) = self.enqueue(command, true)? {
            signal.wait().await;
        }
        Ok(())
    }

    /// Stop transmitting until [`resume`](Self::resume).
    ///
    /// With `wait`, first waits until every queued command has been sent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless running or paused.
    pub async fn pause(&self, wait: bool) -> Result<(), SchedulerError> {
        if *self.shared.lifecycle() != Lifecycle::Running {
            return Err(self.shared.invalid("pause"));
        }
        if wait {
            self.shared.queue.wait_drained().await;
        }
        self.shared.paused.send_replace(true);
        info!("Scheduler paused");
        Ok(())
    }

    /// Resume transmitting; no effect while already running.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless running or paused.
    pub fn resume(&self) -> Result<(), SchedulerError> {
        if *self.shared.lifecycle() != Lifecycle::Running {
            return Err(self.shared.invalid("resume"));
        }
        if self.shared.paused.send_replace(false) {
            info!("Scheduler resumed");
        }
        Ok(())
    }

    /// Pause the scheduler for as long as the returned guard lives.
    ///
    /// # Arguments
    ///
    /// * `wait` - Let queued commands go out before pausing
    /// * `discard` - Drop every queued command when the guard is released
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless running or paused.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn demo(scheduler: &ardrone_link::scheduler::Scheduler) -> ardrone_link::error::Result<()> {
    /// use ardrone_link::at::commands;
    ///
    /// {
    ///     let _guard = scheduler.interrupt(false, true).await?;
    ///     // nothing is transmitted here
    /// }
    /// scheduler.send(commands::land()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn interrupt(
        &self,
        wait: bool,
        discard: bool,
    ) -> Result<InterruptGuard, SchedulerError> {
        self.pause(wait).await?;
        Ok(InterruptGuard {
            shared: Arc::clone(&self.shared),
            discard,
        })
    }

    /// Stop the tick task and wait for it to exit.
    ///
    /// With `wait`, first waits until the queue has drained. A paused
    /// scheduler never drains on its own.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless running or paused.
    pub async fn stop(&self, wait: bool) -> Result<(), SchedulerError> {
        {
            let mut lifecycle = self.shared.lifecycle();
            if *lifecycle != Lifecycle::Running {
                drop(lifecycle);
                return Err(self.shared.invalid("stop"));
            }
            *lifecycle = Lifecycle::Stopping;
        }
        info!("Scheduler stopping");

        if wait {
            self.shared.queue.wait_drained().await;
        }
        self.shared.closed.send_replace(true);

        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Scheduler task failed: {}", e);
            }
        }

        *self.shared.lifecycle() = Lifecycle::Stopped;
        info!("Scheduler stopped");
        Ok(())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.closed.send_replace(true);
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Keeps the scheduler paused until dropped
#[must_use = "the scheduler resumes as soon as the guard is dropped"]
pub struct InterruptGuard {
    shared: Arc<Shared>,
    discard: bool,
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if self.discard {
            let discarded = self.shared.queue.clear();
            debug!("Interrupt discarded {} queued commands", discarded);
        }
        if *self.shared.lifecycle() == Lifecycle::Running {
            self.shared.paused.send_replace(false);
        }
    }
}

async fn wait_until_unpaused(paused: &mut watch::Receiver<bool>) {
    loop {
        if !*paused.borrow_and_update() {
            return;
        }
        if paused.changed().await.is_err() {
            return;
        }
    }
}

async fn tick_loop(
    shared: Arc<Shared>,
    mut paused: watch::Receiver<bool>,
    mut closed: watch::Receiver<bool>,
) {
    loop {
        if *closed.borrow_and_update() {
            break;
        }

        tokio::select! {
            _ = closed.changed() => continue,
            _ = wait_until_unpaused(&mut paused) => {}
        }

        tick(&shared).await;

        tokio::select! {
            _ = closed.changed() => {}
            _ = tokio::time::sleep(shared.interval) => {}
        }
    }
    debug!("Scheduler task exiting");
}

async fn tick(shared: &Shared) {
    let (item, from_queue) = match shared.queue.try_pop() {
        Some(item) => (item, true),
        None => (
            QueuedCommand {
                command: commands::watchdog(),
                signal: None,
            },
            false,
        ),
    };

    if let Err(e) = shared.link.transmit(&item.command).await {
        warn!("Failed to transmit {:?}: {}", item.command, e);
    }
    if let Some(signal) = item.signal {
        signal.fire();
    }
    if from_queue {
        shared.queue.task_done();
    }
}
