//! Gated detector service
//!
//! Wraps a [`LearningEngine`] behind an [`InitGate`]: decisions recorded
//! before storage has been verified are queued and replayed once it has.
//! Classification is never queued; before the gate opens it runs on the
//! heuristic rubric alone.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use log::{info, warn};
use pg_core::classifier::{classify, Classification};
use pg_core::patterns::UpsertOutcome;
use pg_core::{DetectorConfig, ElementView, PopupRecord, Viewport};
use tokio::task::JoinHandle;

use crate::gate::{Admission, GateError, GateState, InitGate};
use crate::learning::LearningEngine;
use crate::storage::PatternStorage;
use crate::supervisor::SupervisedTask;

pub struct PopGuard<S> {
    engine: Arc<LearningEngine<S>>,
    gate: StdMutex<InitGate<PopupRecord>>,
    background: StdMutex<Vec<JoinHandle<()>>>,
}

impl<S: PatternStorage + 'static> PopGuard<S> {
    pub fn new(storage: Arc<S>, config: DetectorConfig) -> Self {
        let engine = Arc::new(LearningEngine::new(storage, config));
        let cfg = engine.config();
        let gate = InitGate::new(
            cfg.pending_queue_capacity,
            Duration::from_millis(cfg.pending_max_age_ms),
        );
        Self {
            engine,
            gate: StdMutex::new(gate),
            background: StdMutex::new(Vec::new()),
        }
    }

    pub fn engine(&self) -> &Arc<LearningEngine<S>> {
        &self.engine
    }

    pub fn state(&self) -> GateState {
        self.gate().state().clone()
    }

    pub fn pending(&self) -> usize {
        self.gate().pending()
    }

    fn gate(&self) -> MutexGuard<'_, InitGate<PopupRecord>> {
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Verify storage and open the gate, replaying queued decisions in order.
    /// Returns how many were replayed.
    pub async fn initialize(&self) -> Result<usize, GateError> {
        if !self.gate().begin() {
            return Ok(0);
        }

        if !self.engine.storage().health_check().await {
            let rejected = self.gate().fail("pattern storage unavailable");
            warn!("{} queued decisions rejected", rejected.len());
            return Err(GateError::Failed("pattern storage unavailable".to_string()));
        }

        // Decisions arriving during replay queue behind it
        let mut batch = self.gate().succeed(Instant::now())?;
        let mut replayed = 0;
        loop {
            replayed += batch.len();
            for record in batch {
                self.engine.record_decision(record).await;
            }
            batch = self.gate().next_replay(Instant::now());
            if batch.is_empty() {
                break;
            }
        }
        info!("detector ready ({} queued decisions replayed)", replayed);
        Ok(replayed)
    }

    /// Record a decision now if ready, otherwise queue it.
    ///
    /// Returns `Ok(None)` when queued.
    pub async fn record_decision(&self, record: PopupRecord) -> Result<Option<UpsertOutcome>, GateError> {
        let admission = self.gate().submit(record, Instant::now())?;
        match admission {
            Admission::Run(record) => Ok(Some(self.engine.record_decision(record).await)),
            Admission::Queued => Ok(None),
        }
    }

    pub async fn classify<E: ElementView + ?Sized>(
        &self,
        domain: &str,
        element: &E,
        viewport: &Viewport,
        now_ms: u64,
    ) -> Classification {
        let ready = self.gate().is_ready();
        if ready {
            self.engine.classify(domain, element, viewport, now_ms).await
        } else {
            classify(element, viewport, &[], now_ms)
        }
    }

    /// Start periodic cleanup.
    pub fn start(&self) {
        let handle = self.engine.spawn_cleanup();
        self.background
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    /// Stop background tasks and make a last attempt to persist dirty domains.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .background
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            handle.abort();
        }
        let dirty = self.engine.flush().await;
        if dirty > 0 {
            warn!("{} domains not persisted at shutdown", dirty);
        }
    }
}

impl<S: PatternStorage + 'static> SupervisedTask for LearningEngine<S> {
    fn name(&self) -> &str {
        "pattern-store"
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            self.storage().health_check().await && self.dirty_domains().is_empty()
        })
    }

    fn restart(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.storage().health_check().await && self.flush().await == 0 })
    }
}
