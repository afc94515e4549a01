//! Bounded history of resolved pop-ups

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::types::{PopupRecord, Resolution};

const MS_PER_DAY: u64 = 86_400_000;

/// Per-domain resolution counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainStats {
    pub detected: usize,
    pub closed: usize,
    pub kept: usize,
    /// Timed out or dismissed
    pub ignored: usize,
}

impl DomainStats {
    fn count(&mut self, resolution: Resolution) {
        self.detected += 1;
        match resolution {
            Resolution::Close => self.closed += 1,
            Resolution::Keep => self.kept += 1,
            Resolution::Timeout | Resolution::Dismiss => self.ignored += 1,
        }
    }
}

/// Append-only record log, pruned by age and count. Oldest first.
#[derive(Debug, Clone)]
pub struct PopupHistory {
    records: VecDeque<PopupRecord>,
    max_entries: usize,
    max_age_ms: u64,
}

impl PopupHistory {
    pub fn new(max_entries: usize, max_age_days: u32) -> Self {
        Self {
            records: VecDeque::new(),
            max_entries: max_entries.max(1),
            max_age_ms: u64::from(max_age_days).saturating_mul(MS_PER_DAY),
        }
    }

    /// Append a record, evicting the oldest past the entry limit.
    pub fn push(&mut self, record: PopupRecord) {
        self.records.push_back(record);
        while self.records.len() > self.max_entries {
            self.records.pop_front();
        }
    }

    /// Drop records older than the age limit. Returns how many were dropped.
    pub fn prune(&mut self, now: u64) -> usize {
        let before = self.records.len();
        let max_age = self.max_age_ms;
        self.records.retain(|r| now.saturating_sub(r.timestamp) <= max_age);
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PopupRecord> {
        self.records.iter()
    }

    /// Records for one domain, newest first.
    pub fn for_domain<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a PopupRecord> + 'a {
        self.records.iter().rev().filter(move |r| r.domain == domain)
    }

    pub fn stats(&self, domain: &str) -> DomainStats {
        self.for_domain(domain).fold(DomainStats::default(), |mut s, r| {
            s.count(r.user_decision);
            s
        })
    }

    /// Stats for every domain present in the history.
    pub fn all_stats(&self) -> HashMap<String, DomainStats> {
        let mut out: HashMap<String, DomainStats> = HashMap::new();
        for r in &self.records {
            let s = out.entry(r.domain.clone()).or_default();
            s.count(r.user_decision);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Characteristics;

    fn rec(domain: &str, ts: u64, decision: Resolution) -> PopupRecord {
        PopupRecord {
            id: format!("{domain}-{ts}"),
            url: format!("https://{domain}/"),
            domain: domain.to_string(),
            timestamp: ts,
            characteristics: Characteristics::default(),
            user_decision: decision,
            confidence: 0.5,
        }
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut h = PopupHistory::new(2, 30);
        h.push(rec("a.com", 1, Resolution::Close));
        h.push(rec("a.com", 2, Resolution::Close));
        h.push(rec("a.com", 3, Resolution::Keep));
        let ts: Vec<u64> = h.iter().map(|r| r.timestamp).collect();
        assert_eq!(ts, vec![2, 3]);
    }

    #[test]
    fn test_prune_by_age() {
        let mut h = PopupHistory::new(10, 1);
        h.push(rec("a.com", 0, Resolution::Close));
        h.push(rec("a.com", MS_PER_DAY, Resolution::Close));
        assert_eq!(h.prune(MS_PER_DAY + 1), 1);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_stats_per_domain() {
        let mut h = PopupHistory::new(10, 30);
        h.push(rec("a.com", 1, Resolution::Close));
        h.push(rec("a.com", 2, Resolution::Keep));
        h.push(rec("a.com", 3, Resolution::Timeout));
        h.push(rec("b.com", 4, Resolution::Close));
        assert_eq!(
            h.stats("a.com"),
            DomainStats { detected: 3, closed: 1, kept: 1, ignored: 1 }
        );
        assert_eq!(h.all_stats().len(), 2);
        assert_eq!(h.for_domain("a.com").next().map(|r| r.timestamp), Some(3));
    }
}
