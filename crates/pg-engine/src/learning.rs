//! Learning engine
//!
//! Owns the in-memory pattern cache for every domain seen so far. Each domain
//! has a state mutex, held only while patterns are loaded or changed, and a
//! writer mutex that puts its writes to storage in order. Classification
//! never waits on a write.
//!
//! Persistence is best-effort: the in-memory update always stands, and a
//! failed or slow write only leaves the domain dirty for the next flush.
//! A domain whose stored patterns could not be read is never written; the
//! decisions learned meanwhile are folded into the stored collection once a
//! read succeeds.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use pg_core::classifier::{classify, Classification};
use pg_core::history::{DomainStats, PopupHistory};
use pg_core::patterns::{cleanup, upsert, UpsertOutcome};
use pg_core::url::{domain_of, normalize_domain};
use pg_core::{DetectorConfig, ElementView, Pattern, PersistenceError, PopupRecord, Viewport};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::storage::PatternStorage;

#[derive(Debug, Default)]
struct DomainState {
    patterns: Vec<Pattern>,
    loaded: bool,
    /// Learned before the stored collection could be read
    unmerged: Vec<PopupRecord>,
    /// Bumped on every change to `patterns`
    version: u64,
    /// Last version storage acknowledged
    persisted: u64,
}

impl DomainState {
    fn dirty(&self) -> bool {
        self.version > self.persisted
    }

    fn idle(&self) -> bool {
        self.loaded && self.patterns.is_empty() && self.unmerged.is_empty() && !self.dirty()
    }
}

#[derive(Debug, Default)]
struct DomainCell {
    state: Mutex<DomainState>,
    writer: Mutex<()>,
}

/// Totals from one cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupReport {
    pub domains: usize,
    pub removed: usize,
    pub history_pruned: usize,
    /// Idle domains dropped from the cache
    pub evicted: usize,
}

pub struct LearningEngine<S> {
    storage: Arc<S>,
    config: DetectorConfig,
    domains: StdMutex<HashMap<String, Arc<DomainCell>>>,
    history: StdMutex<PopupHistory>,
}

impl<S: PatternStorage> LearningEngine<S> {
    pub fn new(storage: Arc<S>, config: DetectorConfig) -> Self {
        let config = config.validated();
        let history = PopupHistory::new(config.history_max_entries, config.history_max_age_days);
        Self {
            storage,
            config,
            domains: StdMutex::new(HashMap::new()),
            history: StdMutex::new(history),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.config.persist_timeout_ms)
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, PersistenceError>
    where
        F: Future<Output = Result<T, PersistenceError>>,
    {
        match tokio::time::timeout(self.persist_timeout(), op).await {
            Ok(result) => result,
            Err(_) => Err(PersistenceError::Timeout(self.config.persist_timeout_ms)),
        }
    }

    // =========================================================================
    // Storage
    // =========================================================================

    /// Load a domain's patterns from storage. Failures log and yield empty.
    pub async fn get_stored_patterns(&self, domain: &str) -> Vec<Pattern> {
        match self.bounded(self.storage.load(domain)).await {
            Ok(patterns) => patterns,
            Err(e) => {
                warn!("loading patterns for {} failed: {}", domain, e);
                Vec::new()
            }
        }
    }

    /// Write a domain's patterns to storage. Failures log and return false.
    pub async fn put_stored_patterns(&self, domain: &str, patterns: &[Pattern]) -> bool {
        match self.bounded(self.storage.store(domain, patterns)).await {
            Ok(()) => true,
            Err(e) => {
                warn!("persisting {} patterns for {} failed: {}", patterns.len(), domain, e);
                false
            }
        }
    }

    fn domain_cell(&self, domain: &str) -> Arc<DomainCell> {
        let mut domains = lock(&self.domains);
        domains.entry(domain.to_string()).or_default().clone()
    }

    /// Read the stored collection if not yet loaded. A failed read leaves the
    /// domain unloaded so the next use retries it.
    async fn ensure_loaded(&self, domain: &str, state: &mut DomainState) -> bool {
        if state.loaded {
            return true;
        }
        let stored = match self.bounded(self.storage.load(domain)).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("loading patterns for {} failed: {}; will retry", domain, e);
                return false;
            }
        };

        state.patterns = stored;
        state.loaded = true;
        let unmerged = std::mem::take(&mut state.unmerged);
        if !unmerged.is_empty() {
            debug!("merging {} decisions into stored patterns for {}", unmerged.len(), domain);
            for record in &unmerged {
                upsert(&mut state.patterns, record);
            }
            if let Some(last) = unmerged.last() {
                self.enforce_limit(state, last.timestamp);
            }
            state.version += 1;
        }
        true
    }

    fn enforce_limit(&self, state: &mut DomainState, now_ms: u64) {
        if state.patterns.len() > self.config.max_patterns_per_domain {
            let patterns = std::mem::take(&mut state.patterns);
            state.patterns = cleanup(patterns, now_ms, &self.config.cleanup_policy());
        }
    }

    /// Write the domain's latest patterns if storage is behind. Writes for one
    /// domain run one at a time, each taking the newest snapshot, so storage
    /// never moves backwards. Returns whether the domain is clean afterwards.
    async fn persist(&self, domain: &str, cell: &DomainCell) -> bool {
        let _writer = cell.writer.lock().await;
        let (patterns, version) = {
            let state = cell.state.lock().await;
            if !state.loaded {
                return !state.dirty();
            }
            if !state.dirty() {
                return true;
            }
            (state.patterns.clone(), state.version)
        };

        let ok = self.put_stored_patterns(domain, &patterns).await;
        let mut state = cell.state.lock().await;
        if ok {
            state.persisted = state.persisted.max(version);
        }
        !state.dirty()
    }

    // =========================================================================
    // Classification & Learning
    // =========================================================================

    /// Current patterns for a domain, loading them on first use.
    pub async fn patterns(&self, domain: &str) -> Vec<Pattern> {
        let domain = normalize_domain(domain);
        let cell = self.domain_cell(&domain);
        let mut state = cell.state.lock().await;
        self.ensure_loaded(&domain, &mut state).await;
        state.patterns.clone()
    }

    /// Classify an element against the domain's learned patterns.
    pub async fn classify<E: ElementView + ?Sized>(
        &self,
        domain: &str,
        element: &E,
        viewport: &Viewport,
        now_ms: u64,
    ) -> Classification {
        let patterns = self.patterns(domain).await;
        classify(element, viewport, &patterns, now_ms)
    }

    /// Record a resolved pop-up and learn from it.
    ///
    /// The record always enters history. Learning is skipped when disabled or
    /// when the resolution carries no decision.
    pub async fn record_decision(&self, mut record: PopupRecord) -> UpsertOutcome {
        record.domain = record_domain(&record);
        {
            let mut history = lock(&self.history);
            history.push(record.clone());
            history.prune(record.timestamp);
        }

        if !self.config.learning_enabled {
            debug!("learning disabled; {} recorded without learning", record.id);
            return UpsertOutcome::Ignored;
        }
        if record.user_decision.learnable().is_none() || record.domain.is_empty() {
            return UpsertOutcome::Ignored;
        }

        let domain = record.domain.clone();
        let cell = self.domain_cell(&domain);
        let outcome = {
            let mut state = cell.state.lock().await;
            let loaded = self.ensure_loaded(&domain, &mut state).await;
            let outcome = upsert(&mut state.patterns, &record);
            self.enforce_limit(&mut state, record.timestamp);
            if !loaded {
                state.unmerged.push(record);
            }
            state.version += 1;
            outcome
        };

        self.persist(&domain, &cell).await;
        outcome
    }

    /// Retry persisting every dirty domain. Returns how many are still dirty.
    pub async fn flush(&self) -> usize {
        let mut still_dirty = 0;
        for (domain, cell) in self.tracked_domains() {
            {
                let mut state = cell.state.lock().await;
                if !state.dirty() {
                    continue;
                }
                self.ensure_loaded(&domain, &mut state).await;
            }
            if !self.persist(&domain, &cell).await {
                still_dirty += 1;
            }
        }
        still_dirty
    }

    pub fn dirty_domains(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .tracked_domains()
            .into_iter()
            .filter(|(_, cell)| cell.state.try_lock().map_or(false, |s| s.dirty()))
            .map(|(d, _)| d)
            .collect();
        out.sort();
        out
    }

    /// Domains currently held in the cache.
    pub fn tracked_len(&self) -> usize {
        lock(&self.domains).len()
    }

    fn tracked_domains(&self) -> Vec<(String, Arc<DomainCell>)> {
        lock(&self.domains)
            .iter()
            .map(|(d, cell)| (d.clone(), cell.clone()))
            .collect()
    }

    /// Drop cached domains with nothing learned, nothing pending and no user.
    fn evict_idle(&self) -> usize {
        let mut domains = lock(&self.domains);
        let before = domains.len();
        domains.retain(|_, cell| {
            let unused = Arc::strong_count(cell) == 1;
            !(unused && cell.state.try_lock().map_or(false, |s| s.idle()))
        });
        before - domains.len()
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn history_stats(&self, domain: &str) -> DomainStats {
        lock(&self.history).stats(&normalize_domain(domain))
    }

    pub fn history_len(&self) -> usize {
        lock(&self.history).len()
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Prune every known domain, including ones only present in storage, then
    /// drop idle domains from the cache.
    pub async fn run_cleanup(&self, now_ms: u64) -> CleanupReport {
        match self.bounded(self.storage.domains()).await {
            Ok(stored) => {
                for domain in stored {
                    self.domain_cell(&domain);
                }
            }
            Err(e) => warn!("listing stored domains failed: {}", e),
        }

        let policy = self.config.cleanup_policy();
        let mut report = CleanupReport::default();
        for (domain, cell) in self.tracked_domains() {
            let removed = {
                let mut state = cell.state.lock().await;
                if !self.ensure_loaded(&domain, &mut state).await {
                    continue;
                }
                let before = state.patterns.len();
                let patterns = std::mem::take(&mut state.patterns);
                state.patterns = cleanup(patterns, now_ms, &policy);
                let removed = before - state.patterns.len();
                if removed > 0 {
                    state.version += 1;
                }
                removed
            };

            self.persist(&domain, &cell).await;
            report.domains += 1;
            report.removed += removed;
        }

        report.history_pruned = lock(&self.history).prune(now_ms);
        report.evicted = self.evict_idle();
        if report.removed > 0 || report.history_pruned > 0 {
            info!(
                "cleanup removed {} patterns across {} domains, {} history records",
                report.removed, report.domains, report.history_pruned
            );
        }
        debug!("cleanup evicted {} idle domains", report.evicted);
        report
    }
}

impl<S: PatternStorage + 'static> LearningEngine<S> {
    /// Run [`run_cleanup`](Self::run_cleanup) every `cleanup_interval_secs`.
    /// The first pass runs one full interval after spawning.
    pub fn spawn_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let period = Duration::from_secs(engine.config.cleanup_interval_secs);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                engine.run_cleanup(crate::now_ms()).await;
            }
        })
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn record_domain(record: &PopupRecord) -> String {
    let domain = normalize_domain(&record.domain);
    if domain.is_empty() {
        domain_of(&record.url)
    } else {
        domain
    }
}
