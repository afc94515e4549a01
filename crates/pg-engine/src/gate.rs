//! Initialization gate
//!
//! Work submitted before the engine is ready waits in a bounded queue and is
//! released in submission order once initialization succeeds. While the
//! backlog is replayed new work keeps queueing behind it, so nothing
//! overtakes an older entry.
//!
//! ```text
//! Uninitialized --begin--> Initializing --succeed--> Replaying --queue empty--> Ready
//!                               |
//!                               +------fail------> Failed --begin--> Initializing
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Gate lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Uninitialized,
    Initializing,
    /// Backlog handed out; new work still queues
    Replaying,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Initialization failed: {0}")]
    Failed(String),
    #[error("Gate is not initializing (state {0:?})")]
    InvalidTransition(GateState),
}

/// What the caller should do with a submitted item.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<T> {
    /// The gate is ready; run it now
    Run(T),
    /// Held until the gate opens
    Queued,
}

/// Entries dropped while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evictions {
    pub expired: usize,
    pub overflow: usize,
}

#[derive(Debug)]
pub struct InitGate<T> {
    state: GateState,
    queue: VecDeque<(Instant, T)>,
    capacity: usize,
    max_age: Duration,
    evicted: Evictions,
}

impl<T> InitGate<T> {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            state: GateState::Uninitialized,
            queue: VecDeque::new(),
            capacity: capacity.max(1),
            max_age,
            evicted: Evictions::default(),
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == GateState::Ready
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn evictions(&self) -> Evictions {
        self.evicted
    }

    /// Start initializing. Returns false if already initializing or ready.
    pub fn begin(&mut self) -> bool {
        match self.state {
            GateState::Uninitialized | GateState::Failed(_) => {
                self.state = GateState::Initializing;
                true
            }
            GateState::Initializing | GateState::Replaying | GateState::Ready => false,
        }
    }

    /// Admit an item: run it now if ready, queue it otherwise.
    ///
    /// A full queue drops its oldest entry to make room.
    pub fn submit(&mut self, item: T, now: Instant) -> Result<Admission<T>, GateError> {
        match &self.state {
            GateState::Ready => return Ok(Admission::Run(item)),
            GateState::Failed(reason) => return Err(GateError::Failed(reason.clone())),
            GateState::Uninitialized | GateState::Initializing | GateState::Replaying => {}
        }

        self.evict_expired(now);
        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            self.evicted.overflow += 1;
            warn!("pending queue full ({}); dropped oldest entry", self.capacity);
        }
        self.queue.push_back((now, item));
        Ok(Admission::Queued)
    }

    /// Start replaying: hand back the still-fresh queued items, oldest first.
    /// The gate opens once [`next_replay`](Self::next_replay) finds the queue
    /// empty.
    pub fn succeed(&mut self, now: Instant) -> Result<Vec<T>, GateError> {
        if self.state != GateState::Initializing {
            return Err(GateError::InvalidTransition(self.state.clone()));
        }
        self.state = GateState::Replaying;
        let drained = self.drain_fresh(now);
        debug!("initialized; replaying {} queued entries", drained.len());
        Ok(drained)
    }

    /// Items queued during the previous replay batch. An empty result means
    /// the gate is now ready.
    pub fn next_replay(&mut self, now: Instant) -> Vec<T> {
        if self.state != GateState::Replaying {
            return Vec::new();
        }
        let drained = self.drain_fresh(now);
        if drained.is_empty() {
            self.state = GateState::Ready;
            debug!("gate ready");
        }
        drained
    }

    fn drain_fresh(&mut self, now: Instant) -> Vec<T> {
        self.evict_expired(now);
        self.queue.drain(..).map(|(_, item)| item).collect()
    }

    /// Mark the gate failed and hand back every queued item for rejection.
    pub fn fail(&mut self, reason: &str) -> Vec<T> {
        self.state = GateState::Failed(reason.to_string());
        let rejected: Vec<T> = self.queue.drain(..).map(|(_, item)| item).collect();
        warn!("initialization failed: {}; rejecting {} queued entries", reason, rejected.len());
        rejected
    }

    fn evict_expired(&mut self, now: Instant) {
        let max_age = self.max_age;
        let before = self.queue.len();
        self.queue
            .retain(|(queued_at, _)| now.saturating_duration_since(*queued_at) <= max_age);
        let expired = before - self.queue.len();
        if expired > 0 {
            self.evicted.expired += expired;
            debug!("evicted {} expired pending entries", expired);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> InitGate<u32> {
        InitGate::new(3, Duration::from_secs(30))
    }

    #[test]
    fn test_queue_then_replay_in_order() {
        let mut g = gate();
        let t0 = Instant::now();
        assert_eq!(g.submit(1, t0), Ok(Admission::Queued));
        assert!(g.begin());
        assert_eq!(g.submit(2, t0), Ok(Admission::Queued));
        assert_eq!(g.succeed(t0), Ok(vec![1, 2]));
        assert_eq!(g.next_replay(t0), Vec::<u32>::new());
        assert!(g.is_ready());
        assert_eq!(g.submit(3, t0), Ok(Admission::Run(3)));
        assert_eq!(g.pending(), 0);
    }

    #[test]
    fn test_submissions_during_replay_wait_their_turn() {
        let mut g = gate();
        let t0 = Instant::now();
        g.submit(1, t0).unwrap();
        g.begin();
        assert_eq!(g.succeed(t0), Ok(vec![1]));
        assert_eq!(g.state(), &GateState::Replaying);

        assert_eq!(g.submit(2, t0), Ok(Admission::Queued));
        assert!(!g.begin());
        assert_eq!(g.next_replay(t0), vec![2]);
        assert!(!g.is_ready());
        assert_eq!(g.next_replay(t0), Vec::<u32>::new());
        assert_eq!(g.submit(3, t0), Ok(Admission::Run(3)));
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut g = gate();
        let t0 = Instant::now();
        for i in 0..5 {
            g.submit(i, t0).unwrap();
        }
        assert_eq!(g.pending(), 3);
        assert_eq!(g.evictions().overflow, 2);
        g.begin();
        assert_eq!(g.succeed(t0).unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn test_expired_entries_evicted() {
        let mut g = gate();
        let t0 = Instant::now();
        g.submit(1, t0).unwrap();
        g.submit(2, t0 + Duration::from_secs(20)).unwrap();
        g.begin();
        assert_eq!(g.succeed(t0 + Duration::from_secs(40)).unwrap(), vec![2]);
        assert_eq!(g.evictions().expired, 1);
    }

    #[test]
    fn test_failure_rejects_queued_and_new() {
        let mut g = gate();
        let t0 = Instant::now();
        g.submit(1, t0).unwrap();
        g.begin();
        assert_eq!(g.fail("storage down"), vec![1]);
        assert_eq!(g.submit(2, t0), Err(GateError::Failed("storage down".to_string())));

        // Retry is allowed from Failed
        assert!(g.begin());
        assert_eq!(g.succeed(t0), Ok(vec![]));
    }

    #[test]
    fn test_succeed_requires_initializing() {
        let mut g = gate();
        assert_eq!(
            g.succeed(Instant::now()),
            Err(GateError::InvalidTransition(GateState::Uninitialized))
        );
        g.begin();
        assert!(!g.begin());
    }
}
