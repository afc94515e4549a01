//! Health supervision for long-lived components
//!
//! Each registered task is polled on a timer. An unhealthy task is restarted;
//! after `max_restarts` consecutive failed recoveries it is marked failed and
//! no longer polled.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::future::BoxFuture;
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A component the supervisor can health-check and restart.
pub trait SupervisedTask: Send + Sync {
    fn name(&self) -> &str;
    fn health_check(&self) -> BoxFuture<'_, bool>;
    /// Attempt recovery. Returns whether the task is healthy afterwards.
    fn restart(&self) -> BoxFuture<'_, bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Healthy,
    /// Unhealthy with this many consecutive failed restarts
    Recovering(u32),
    Failed,
}

struct Entry {
    task: Arc<dyn SupervisedTask>,
    status: TaskStatus,
}

pub struct Supervisor {
    entries: StdMutex<Vec<Entry>>,
    max_restarts: u32,
}

impl Supervisor {
    pub fn new(max_restarts: u32) -> Self {
        Self {
            entries: StdMutex::new(Vec::new()),
            max_restarts: max_restarts.max(1),
        }
    }

    pub fn register(&self, task: Arc<dyn SupervisedTask>) {
        info!("supervising {}", task.name());
        self.lock().push(Entry {
            task,
            status: TaskStatus::Healthy,
        });
    }

    /// Status of every task, in registration order.
    pub fn statuses(&self) -> Vec<(String, TaskStatus)> {
        self.lock()
            .iter()
            .map(|e| (e.task.name().to_string(), e.status))
            .collect()
    }

    pub fn status(&self, name: &str) -> Option<TaskStatus> {
        self.lock()
            .iter()
            .find(|e| e.task.name() == name)
            .map(|e| e.status)
    }

    /// Probe every live task once, restarting the unhealthy ones.
    pub async fn poll_once(&self) {
        let live: Vec<(usize, Arc<dyn SupervisedTask>, TaskStatus)> = self
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status != TaskStatus::Failed)
            .map(|(i, e)| (i, e.task.clone(), e.status))
            .collect();

        for (index, task, status) in live {
            let next = self.check(task.as_ref(), status).await;
            self.set_status(index, next);
        }
    }

    fn set_status(&self, index: usize, status: TaskStatus) {
        if let Some(entry) = self.lock().get_mut(index) {
            entry.status = status;
        }
    }

    async fn check(&self, task: &dyn SupervisedTask, status: TaskStatus) -> TaskStatus {
        if task.health_check().await {
            if status != TaskStatus::Healthy {
                info!("{} healthy again", task.name());
            }
            return TaskStatus::Healthy;
        }

        let attempts = match status {
            TaskStatus::Recovering(n) => n,
            _ => 0,
        };
        warn!("{} unhealthy; restart attempt {}", task.name(), attempts + 1);
        if task.restart().await {
            info!("{} restarted", task.name());
            return TaskStatus::Healthy;
        }

        let attempts = attempts + 1;
        if attempts >= self.max_restarts {
            error!("{} failed after {} restart attempts", task.name(), attempts);
            TaskStatus::Failed
        } else {
            TaskStatus::Recovering(attempts)
        }
    }

    /// Poll every `period` until aborted.
    pub fn spawn(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                supervisor.poll_once().await;
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
