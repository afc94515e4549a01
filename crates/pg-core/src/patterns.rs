//! Learned patterns
//!
//! A domain's pattern collection is a plain `Vec<Pattern>`. The functions in
//! this module implement the read-modify-write cycle over it; callers own the
//! collection and are responsible for serializing writes per domain.
//!
//! # Lifecycle
//!
//! ```text
//! [unmatched decision] -> create (confidence 0.6)
//! [matched decision]   -> agree: +0.1 (cap 1.0)
//!                         disagree: -0.2 (floor 0.1), below 0.3 flips decision, resets to 0.6
//! [cleanup]            -> stale / weak / excess patterns dropped
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::hash::hash_fingerprint;
use crate::similarity::similarity;
use crate::types::{Characteristics, PopupRecord, PositionKind, UserDecision};

/// Confidence of a freshly created pattern, and after a decision flip.
pub const INITIAL_CONFIDENCE: f64 = 0.6;
pub const MIN_PATTERN_CONFIDENCE: f64 = 0.1;
pub const MAX_PATTERN_CONFIDENCE: f64 = 1.0;
pub const AGREE_STEP: f64 = 0.1;
pub const DISAGREE_STEP: f64 = 0.2;
/// A disagreement that leaves confidence below this flips the decision.
pub const FLIP_THRESHOLD: f64 = 0.3;

/// Minimum similarity for a decision to update an existing pattern.
pub const LEARNING_MATCH_THRESHOLD: f64 = 0.7;
/// Minimum similarity for a pattern to drive an automatic action.
pub const SUGGESTION_MATCH_THRESHOLD: f64 = 0.8;
/// Minimum stored confidence for a pattern to drive an automatic action.
pub const SUGGESTION_MIN_CONFIDENCE: f64 = 0.7;

/// Boolean traits follow the newest observation until a pattern has seen
/// more than this many occurrences; after that they are frozen.
pub const BOOLEAN_OVERRIDE_OCCURRENCES: u32 = 2;

/// Width of the size buckets used in fingerprints, in px.
pub const SIZE_BUCKET_PX: f64 = 100.0;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Key namespace for persisted pattern collections.
pub const STORAGE_KEY_PREFIX: &str = "popguard:patterns:";

/// Storage key for a domain's pattern collection.
pub fn storage_key(domain: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{domain}")
}

/// Domain for a storage key, if the key is in our namespace.
pub fn domain_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(STORAGE_KEY_PREFIX).filter(|d| !d.is_empty())
}

// =============================================================================
// Pattern Traits
// =============================================================================

/// Representative snapshot of the characteristics a pattern stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternTraits {
    pub tag_name: String,
    pub position: PositionKind,
    pub has_close_button: bool,
    pub contains_ads: bool,
    pub has_external_links: bool,
    pub is_modal: bool,
    pub z_index: f64,
    pub width: f64,
    pub height: f64,
}

impl From<&Characteristics> for PatternTraits {
    fn from(c: &Characteristics) -> Self {
        Self {
            tag_name: c.tag_name.to_ascii_lowercase(),
            position: c.position_kind(),
            has_close_button: c.close_button.has_close_button,
            contains_ads: c.content.contains_ads,
            has_external_links: c.content.has_external_links,
            is_modal: c.is_modal(),
            z_index: c.z_index.value as f64,
            width: c.dimensions.width,
            height: c.dimensions.height,
        }
    }
}

impl PatternTraits {
    /// Fingerprint key: tag, position category and size bucket.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}x{}",
            self.tag_name,
            self.position.as_str(),
            size_bucket(self.width),
            size_bucket(self.height)
        )
    }

    /// Deterministic pattern id derived from the fingerprint.
    pub fn pattern_id(&self) -> String {
        format!("pat_{}", hash_fingerprint(&self.fingerprint()).to_hex())
    }

    /// Fold a new observation into this snapshot.
    ///
    /// Numeric fields take an occurrence-weighted running mean. Boolean
    /// fields take the new value while `prior_occurrences` is at most
    /// [`BOOLEAN_OVERRIDE_OCCURRENCES`] and are kept as-is afterwards; this
    /// approximates a majority vote without storing history.
    pub fn merge(&mut self, sample: &PatternTraits, prior_occurrences: u32) {
        let n = prior_occurrences.max(1) as f64;
        let mean = |old: f64, new: f64| (old * n + new) / (n + 1.0);
        self.z_index = mean(self.z_index, sample.z_index);
        self.width = mean(self.width, sample.width);
        self.height = mean(self.height, sample.height);

        if prior_occurrences <= BOOLEAN_OVERRIDE_OCCURRENCES {
            self.has_close_button = sample.has_close_button;
            self.contains_ads = sample.contains_ads;
            self.has_external_links = sample.has_external_links;
            self.is_modal = sample.is_modal;
        }
    }
}

fn size_bucket(extent: f64) -> u64 {
    if extent.is_finite() && extent > 0.0 {
        (extent / SIZE_BUCKET_PX).floor() as u64
    } else {
        0
    }
}

// =============================================================================
// Pattern
// =============================================================================

/// A learned pattern for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub pattern_id: String,
    pub characteristics: PatternTraits,
    pub user_decision: UserDecision,
    pub confidence: f64,
    pub occurrences: u32,
    /// Epoch milliseconds
    pub last_seen: u64,
    pub domain: String,
}

impl Pattern {
    /// A new pattern from a first, unmatched observation.
    pub fn new(domain: &str, traits: PatternTraits, decision: UserDecision, now: u64) -> Self {
        Self {
            pattern_id: traits.pattern_id(),
            characteristics: traits,
            user_decision: decision,
            confidence: INITIAL_CONFIDENCE,
            occurrences: 1,
            last_seen: now,
            domain: domain.to_string(),
        }
    }

    /// Apply one more observation of this pattern.
    pub fn observe(&mut self, traits: &PatternTraits, decision: UserDecision, now: u64) {
        let prior = self.occurrences;
        self.occurrences = self.occurrences.saturating_add(1);
        self.last_seen = self.last_seen.max(now);

        if decision == self.user_decision {
            self.confidence = clamp_confidence(self.confidence + AGREE_STEP);
        } else {
            self.confidence = clamp_confidence(self.confidence - DISAGREE_STEP);
            if self.confidence < FLIP_THRESHOLD {
                debug!(
                    "pattern {} flipped {:?} -> {:?}",
                    self.pattern_id, self.user_decision, decision
                );
                self.user_decision = decision;
                self.confidence = INITIAL_CONFIDENCE;
            }
        }

        self.characteristics.merge(traits, prior);
    }

    /// Age in days relative to `now`. Patterns from the future are age 0.
    pub fn age_days(&self, now: u64) -> f64 {
        now.saturating_sub(self.last_seen) as f64 / MS_PER_DAY
    }
}

#[inline]
fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_PATTERN_CONFIDENCE, MAX_PATTERN_CONFIDENCE)
    } else {
        MIN_PATTERN_CONFIDENCE
    }
}

// =============================================================================
// Matching
// =============================================================================

/// Best pattern for a sample, with its similarity.
#[derive(Debug, Clone, Copy)]
pub struct PatternMatch<'a> {
    pub pattern: &'a Pattern,
    pub similarity: f64,
}

/// Autonomous-action suggestion from a strong pattern match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub pattern_id: String,
    pub decision: UserDecision,
    pub confidence: f64,
    pub similarity: f64,
}

fn best_match<'a, F>(patterns: &'a [Pattern], sample: &PatternTraits, accept: F) -> Option<PatternMatch<'a>>
where
    F: Fn(&Pattern, f64) -> bool,
{
    let mut best: Option<PatternMatch<'a>> = None;
    for pattern in patterns {
        let s = similarity(&pattern.characteristics, sample);
        if !accept(pattern, s) {
            continue;
        }
        // First pattern wins ties
        if best.map_or(true, |b| s > b.similarity) {
            best = Some(PatternMatch { pattern, similarity: s });
        }
    }
    best
}

/// Best pattern at or above [`LEARNING_MATCH_THRESHOLD`].
pub fn find_match<'a>(patterns: &'a [Pattern], characteristics: &Characteristics) -> Option<PatternMatch<'a>> {
    let sample = PatternTraits::from(characteristics);
    best_match(patterns, &sample, |_, s| s >= LEARNING_MATCH_THRESHOLD)
}

/// Suggestion from the best pattern at or above [`SUGGESTION_MATCH_THRESHOLD`]
/// whose confidence is at least [`SUGGESTION_MIN_CONFIDENCE`].
pub fn suggest(patterns: &[Pattern], characteristics: &Characteristics) -> Option<Suggestion> {
    let sample = PatternTraits::from(characteristics);
    best_match(patterns, &sample, |p, s| {
        s >= SUGGESTION_MATCH_THRESHOLD && p.confidence >= SUGGESTION_MIN_CONFIDENCE
    })
    .map(|m| Suggestion {
        pattern_id: m.pattern.pattern_id.clone(),
        decision: m.pattern.user_decision,
        confidence: m.pattern.confidence,
        similarity: m.similarity,
    })
}

// =============================================================================
// Upsert
// =============================================================================

/// What [`upsert`] did with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(String),
    Updated(String),
    /// Timeout or dismiss: nothing learned
    Ignored,
}

/// Learn from one resolved pop-up.
///
/// Uses the record timestamp as "now". Matching prefers the most similar
/// existing pattern; an unmatched record whose fingerprint id already exists
/// updates that pattern so ids stay unique within the collection.
pub fn upsert(patterns: &mut Vec<Pattern>, record: &PopupRecord) -> UpsertOutcome {
    let Some(decision) = record.user_decision.learnable() else {
        return UpsertOutcome::Ignored;
    };

    let sample = PatternTraits::from(&record.characteristics);
    let matched = best_match(patterns, &sample, |_, s| s >= LEARNING_MATCH_THRESHOLD)
        .map(|m| m.pattern.pattern_id.clone());

    let target = matched.or_else(|| {
        let id = sample.pattern_id();
        patterns.iter().any(|p| p.pattern_id == id).then_some(id)
    });

    if let Some(id) = target {
        if let Some(pattern) = patterns.iter_mut().find(|p| p.pattern_id == id) {
            pattern.observe(&sample, decision, record.timestamp);
            debug!(
                "updated pattern {} on {} (confidence {:.2}, occurrences {})",
                pattern.pattern_id, record.domain, pattern.confidence, pattern.occurrences
            );
            return UpsertOutcome::Updated(id);
        }
    }

    let pattern = Pattern::new(&record.domain, sample, decision, record.timestamp);
    let id = pattern.pattern_id.clone();
    debug!("created pattern {} on {}", id, record.domain);
    patterns.push(pattern);
    UpsertOutcome::Created(id)
}

// =============================================================================
// Cleanup
// =============================================================================

/// Pruning limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanupPolicy {
    pub max_patterns: usize,
    pub stale_days: u32,
    pub min_confidence: f64,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            max_patterns: 100,
            stale_days: 30,
            min_confidence: 0.3,
        }
    }
}

/// Retention rank: `confidence × ln(occurrences + 1) × recency`.
pub fn retention_score(pattern: &Pattern, now: u64, stale_days: u32) -> f64 {
    let window = f64::from(stale_days.max(1));
    let recency = (-pattern.age_days(now) / window).exp();
    pattern.confidence * (f64::from(pattern.occurrences) + 1.0).ln() * recency
}

/// Drop stale, weak and excess patterns.
///
/// The result is ordered by descending retention score (ties by id), so
/// running cleanup again with the same `now` returns the same collection.
pub fn cleanup(patterns: Vec<Pattern>, now: u64, policy: &CleanupPolicy) -> Vec<Pattern> {
    let stale_ms = u64::from(policy.stale_days).saturating_mul(86_400_000);
    let before = patterns.len();

    // Collapse duplicate ids (can only come from hand-edited or merged stores)
    let mut by_id: HashMap<String, Pattern> = HashMap::with_capacity(patterns.len());
    for pattern in patterns {
        if now.saturating_sub(pattern.last_seen) > stale_ms
            || pattern.confidence < policy.min_confidence
            || pattern.occurrences < 1
        {
            continue;
        }
        match by_id.get(&pattern.pattern_id) {
            Some(existing) if existing.occurrences >= pattern.occurrences => {}
            _ => {
                by_id.insert(pattern.pattern_id.clone(), pattern);
            }
        }
    }

    let mut kept: Vec<(f64, Pattern)> = by_id
        .into_values()
        .map(|p| (retention_score(&p, now, policy.stale_days), p))
        .collect();
    kept.sort_by(|(sa, a), (sb, b)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.pattern_id.cmp(&b.pattern_id))
    });
    kept.truncate(policy.max_patterns);

    if kept.len() != before {
        debug!("cleanup kept {} of {} patterns", kept.len(), before);
    }
    kept.into_iter().map(|(_, p)| p).collect()
}
