//! Bounded admission queue with live positions.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

use crate::config::QueueConfig;

/// Admission queue shared by every job of one service.
///
/// At most `parallelize` jobs run at once and at most `max` jobs are admitted
/// (running plus waiting). Waiting jobs are promoted in admission order.
#[derive(Debug, Clone)]
pub struct JobQueue {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    parallelize: usize,
    max: usize,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    running: usize,
    waiting: VecDeque<Waiter>,
    next_id: u64,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    position: watch::Sender<usize>,
}

/// Snapshot of a queue's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub running: usize,
    pub queued: usize,
    pub parallelize: usize,
    pub max: usize,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                parallelize: config.parallelize.max(1),
                max: config.max.max(1),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Admits a job, or returns `None` when the queue is full.
    ///
    /// The returned ticket holds the job's place; dropping it frees the slot
    /// (running) or the place in line (waiting).
    pub fn push(&self) -> Option<Ticket> {
        let mut state = self.shared.lock();
        if state.running + state.waiting.len() >= self.shared.max {
            return None;
        }

        let id = state.next_id;
        state.next_id += 1;

        let position = if state.waiting.is_empty() && state.running < self.shared.parallelize {
            state.running += 1;
            let (_tx, rx) = watch::channel(0);
            rx
        } else {
            let (tx, rx) = watch::channel(state.waiting.len() + 1);
            state.waiting.push_back(Waiter { id, position: tx });
            rx
        };

        debug!(
            id,
            running = state.running,
            waiting = state.waiting.len(),
            "Job admitted"
        );

        Some(Ticket {
            shared: Arc::clone(&self.shared),
            id,
            position,
        })
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.shared.lock();
        QueueStatus {
            running: state.running,
            queued: state.waiting.len(),
            parallelize: self.shared.parallelize,
            max: self.shared.max,
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, id: u64) {
        let mut state = self.lock();

        if let Some(index) = state.waiting.iter().position(|w| w.id == id) {
            state.waiting.remove(index);
        } else {
            state.running = state.running.saturating_sub(1);
        }

        while state.running < self.parallelize {
            let Some(next) = state.waiting.pop_front() else {
                break;
            };
            state.running += 1;
            next.position.send_replace(0);
        }

        for (index, waiter) in state.waiting.iter().enumerate() {
            waiter.position.send_if_modified(|position| {
                let updated = index + 1;
                if *position == updated {
                    false
                } else {
                    *position = updated;
                    true
                }
            });
        }

        debug!(
            id,
            running = state.running,
            waiting = state.waiting.len(),
            "Job released"
        );
    }
}

/// A job's place in a [`JobQueue`].
#[derive(Debug)]
pub struct Ticket {
    shared: Arc<Shared>,
    id: u64,
    position: watch::Receiver<usize>,
}

impl Ticket {
    /// Current position; 0 means the job may run.
    pub fn position(&self) -> usize {
        *self.position.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.position() == 0
    }

    /// Waits for the next position change and returns the new position.
    ///
    /// A running ticket never changes again, so this then waits forever.
    pub async fn changed(&mut self) -> usize {
        if self.position.changed().await.is_err() {
            // Sender dropped: the ticket was promoted and removed from the line.
            std::future::pending::<()>().await;
        }
        *self.position.borrow_and_update()
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.shared.release(self.id);
    }
}
