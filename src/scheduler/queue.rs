//! FIFO of commands awaiting transmission, with unfinished-work tracking.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::signal::CompletionSignal;
use crate::at::Command;

/// A command plus the signal to fire once it has been transmitted
#[derive(Debug)]
pub struct QueuedCommand {
    pub command: Command,
    pub signal: Option<CompletionSignal>,
}

#[derive(Debug, Default)]
struct State {
    items: VecDeque<QueuedCommand>,
    /// Pushed but not yet marked done
    unfinished: usize,
}

/// Thread-safe FIFO shared by callers and the tick task
#[derive(Debug, Default)]
pub struct CommandQueue {
    state: Mutex<State>,
    drained: Notify,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a command
    pub fn push(&self, item: QueuedCommand) {
        let mut state = self.lock();
        state.items.push_back(item);
        state.unfinished += 1;
    }

    /// Take the oldest command without blocking
    pub fn try_pop(&self) -> Option<QueuedCommand> {
        self.lock().items.pop_front()
    }

    /// Mark one popped command as finished
    pub fn task_done(&self) {
        let mut state = self.lock();
        state.unfinished = state.unfinished.saturating_sub(1);
        if state.unfinished == 0 {
            self.drained.notify_waiters();
        }
    }

    /// Drop every queued command without firing its signal.
    ///
    /// Returns how many commands were discarded.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let discarded = state.items.len();
        state.items.clear();
        state.unfinished = state.unfinished.saturating_sub(discarded);
        if state.unfinished == 0 {
            self.drained.notify_waiters();
        }
        discarded
    }

    /// Number of commands waiting
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until every pushed command has been marked done or discarded
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.lock().unfinished == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::at::commands;
    use tokio_test::{assert_pending, assert_ready, task};

    fn queued(command: Command) -> QueuedCommand {
        QueuedCommand {
            command,
            signal: None,
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = CommandQueue::new();
        queue.push(queued(commands::takeoff()));
        queue.push(queued(commands::land()));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_pop().unwrap().command, commands::takeoff());
        assert_eq!(queue.try_pop().unwrap().command, commands::land());
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_drained_after_task_done() {
        let queue = CommandQueue::new();
        queue.push(queued(commands::hover()));

        let mut drained = task::spawn(queue.wait_drained());
        assert_pending!(drained.poll());

        queue.try_pop().unwrap();
        assert_pending!(drained.poll());

        queue.task_done();
        assert!(drained.is_woken());
        assert_ready!(drained.poll());
    }

    #[test]
    fn test_clear_discards_without_firing() {
        let queue = CommandQueue::new();
        let signal = CompletionSignal::new();
        queue.push(QueuedCommand {
            command: commands::takeoff(),
            signal: Some(signal.clone()),
        });
        queue.push(queued(commands::land()));

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(!signal.is_fired());

        let mut drained = task::spawn(queue.wait_drained());
        assert_ready!(drained.poll());
    }
}
