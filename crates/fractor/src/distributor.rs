//! Work distribution: matching queued items to idle actors

use crate::actor::WorkerActor;
use crate::queue::WorkQueue;
use crate::supervisor::PerformanceMonitor;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// Shared live roster of actors.
///
/// The distributor and supervisor hold the same handle, so the
/// distributor always observes the current actor set rather than a
/// snapshot taken before startup.
pub type ActorRoster = Arc<RwLock<Vec<Arc<WorkerActor>>>>;

/// Tracks idle and busy actors and assigns queued work to idle ones
pub struct WorkDistributor {
    queue: Arc<WorkQueue>,
    roster: ActorRoster,
    idle: Mutex<HashSet<String>>,
    monitor: Option<Arc<PerformanceMonitor>>,
}

impl WorkDistributor {
    pub fn new(
        queue: Arc<WorkQueue>,
        roster: ActorRoster,
        monitor: Option<Arc<PerformanceMonitor>>,
    ) -> Self {
        Self {
            queue,
            roster,
            idle: Mutex::new(HashSet::new()),
            monitor,
        }
    }

    /// Mark an actor idle; idempotent
    pub fn mark_worker_idle(&self, actor_name: &str) {
        self.idle.lock().unwrap().insert(actor_name.to_string());
    }

    /// Mark an actor busy
    pub fn mark_worker_busy(&self, actor_name: &str) {
        self.idle.lock().unwrap().remove(actor_name);
    }

    /// Assign one queued item to the given actor.
    ///
    /// Pops only when the actor is open; returns whether work was sent.
    pub fn assign_work_to_worker(&self, actor: &WorkerActor) -> bool {
        if actor.is_closed() || self.queue.is_empty() {
            return false;
        }

        let Some(work) = self.queue.pop() else {
            return false;
        };

        if !actor.dispatch(work.clone()) {
            // Actor refused (closing); put the item back for another actor
            self.queue.push(work);
            return false;
        }

        self.mark_worker_busy(actor.name());
        if let Some(monitor) = &self.monitor {
            monitor.record_dispatch(actor.name());
        }
        debug!("Assigned work to actor {}", actor.name());
        true
    }

    /// Assign queued items to idle actors until the queue empties or no
    /// idle actor remains
    pub fn distribute_to_idle_workers(&self) -> usize {
        let idle_names: Vec<String> = self.idle.lock().unwrap().iter().cloned().collect();
        let mut assigned = 0;

        for name in idle_names {
            if self.queue.is_empty() {
                break;
            }
            let actor = {
                let roster = self.roster.read().unwrap();
                roster.iter().find(|a| a.name() == name).cloned()
            };
            if let Some(actor) = actor {
                if self.assign_work_to_worker(&actor) {
                    assigned += 1;
                }
            } else {
                // Actor left the roster; forget it
                self.idle.lock().unwrap().remove(&name);
            }
        }

        assigned
    }

    /// Number of idle actors
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    /// Number of busy actors (current roster minus idle)
    pub fn busy_count(&self) -> usize {
        let total = self.roster.read().unwrap().len();
        total.saturating_sub(self.idle_count())
    }

    /// One-line summary for status displays
    pub fn status_summary(&self) -> String {
        let total = self.roster.read().unwrap().len();
        format!(
            "workers: {} total, {} idle, {} busy, queue depth {}",
            total,
            self.idle_count(),
            self.busy_count(),
            self.queue.len()
        )
    }
}
