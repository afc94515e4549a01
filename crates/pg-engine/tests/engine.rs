use std::sync::Arc;
use std::time::Duration;

use pg_core::patterns::UpsertOutcome;
use pg_core::{Characteristics, DetectorConfig, ElementSnapshot, PopupRecord, Resolution, Viewport};
use pg_engine::{GateError, GateState, JsonFileStorage, LearningEngine, MemoryStorage, PatternStorage, PopGuard};

const DAY: u64 = 86_400_000;

fn modal() -> ElementSnapshot {
    ElementSnapshot::new("div")
        .with_style("position", "fixed")
        .with_style("z-index", "9999")
        .with_style("background-color", "rgba(0, 0, 0, 0.8)")
        .with_rect(710.0, 390.0, 500.0, 300.0)
        .with_text("Advertisement")
}

fn characteristics() -> Characteristics {
    pg_core::classify(&modal(), &Viewport::default(), &[], 0).characteristics
}

fn banner_record(domain: &str, ts: u64) -> PopupRecord {
    let banner = ElementSnapshot::new("section")
        .with_style("position", "static")
        .with_rect(0.0, 0.0, 1500.0, 900.0);
    PopupRecord {
        characteristics: pg_core::classify(&banner, &Viewport::default(), &[], 0).characteristics,
        ..record(domain, Resolution::Keep, ts)
    }
}

fn record(domain: &str, decision: Resolution, ts: u64) -> PopupRecord {
    PopupRecord {
        id: format!("{domain}-{ts}"),
        url: format!("https://{domain}/"),
        domain: domain.to_string(),
        timestamp: ts,
        characteristics: characteristics(),
        user_decision: decision,
        confidence: 0.6,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_decisions_for_one_domain_all_apply() {
    let storage = Arc::new(MemoryStorage::new());
    let engine = Arc::new(LearningEngine::new(storage.clone(), DetectorConfig::default()));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.record_decision(record("a.com", Resolution::Close, i)).await })
        })
        .collect();
    for h in handles {
        h.await.unwrap();
    }

    let patterns = engine.patterns("a.com").await;
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].occurrences, 10);
    assert_eq!(patterns[0].confidence, 1.0);
    assert_eq!(storage.snapshot("a.com").unwrap()[0].occurrences, 10);
}

#[tokio::test]
async fn slow_storage_times_out_but_learning_stands() {
    let storage = Arc::new(MemoryStorage::new().with_delay(Duration::from_millis(400)));
    let config = DetectorConfig {
        persist_timeout_ms: 100,
        ..DetectorConfig::default()
    };
    let engine = LearningEngine::new(storage, config);

    let outcome = engine.record_decision(record("slow.com", Resolution::Close, 1)).await;
    assert!(matches!(outcome, UpsertOutcome::Created(_)));
    assert_eq!(engine.patterns("slow.com").await.len(), 1);
    assert_eq!(engine.dirty_domains(), vec!["slow.com".to_string()]);
}

#[tokio::test]
async fn failed_read_never_overwrites_stored_patterns() {
    let storage = Arc::new(MemoryStorage::new());
    {
        let engine = LearningEngine::new(storage.clone(), DetectorConfig::default());
        for ts in 1..=3 {
            engine.record_decision(record("a.com", Resolution::Close, ts)).await;
        }
        engine.record_decision(banner_record("a.com", 4)).await;
    }
    assert_eq!(storage.snapshot("a.com").unwrap().len(), 2);

    let engine = LearningEngine::new(storage.clone(), DetectorConfig::default());
    storage.set_failing(true);
    let early = engine.classify("a.com", &modal(), &Viewport::default(), 5).await;
    assert!(early.suggestion.is_none());

    storage.set_failing(false);
    engine.record_decision(record("a.com", Resolution::Close, 6)).await;

    let mut occurrences: Vec<u32> = storage
        .snapshot("a.com")
        .unwrap()
        .iter()
        .map(|p| p.occurrences)
        .collect();
    occurrences.sort();
    assert_eq!(occurrences, vec![1, 4]);
}

#[tokio::test]
async fn decisions_learned_while_unreadable_merge_into_store() {
    let storage = Arc::new(MemoryStorage::new());
    {
        let engine = LearningEngine::new(storage.clone(), DetectorConfig::default());
        engine.record_decision(record("a.com", Resolution::Close, 1)).await;
        engine.record_decision(banner_record("a.com", 2)).await;
    }

    let engine = LearningEngine::new(storage.clone(), DetectorConfig::default());
    storage.set_failing(true);
    engine.record_decision(record("a.com", Resolution::Close, 3)).await;
    assert_eq!(engine.flush().await, 1);

    storage.set_failing(false);
    assert_eq!(engine.flush().await, 0);
    let stored = storage.snapshot("a.com").unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored.iter().map(|p| p.occurrences).max(), Some(2));
}

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store").join("patterns.json");

    {
        let engine = LearningEngine::new(Arc::new(JsonFileStorage::new(&path)), DetectorConfig::default());
        engine.record_decision(record("a.com", Resolution::Close, 1)).await;
        engine.record_decision(record("a.com", Resolution::Close, 2)).await;
        engine.record_decision(record("b.com", Resolution::Keep, 3)).await;
    }

    let engine = LearningEngine::new(Arc::new(JsonFileStorage::new(&path)), DetectorConfig::default());
    let a = engine.patterns("a.com").await;
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].occurrences, 2);

    let result = engine.classify("b.com", &modal(), &Viewport::default(), 10).await;
    assert!(result.suggestion.is_none(), "one keep is below the suggestion bar");
}

#[tokio::test]
async fn cleanup_prunes_stored_domains() {
    let storage = Arc::new(MemoryStorage::new());
    let engine = LearningEngine::new(storage.clone(), DetectorConfig::default());
    engine.record_decision(record("old.com", Resolution::Close, 0)).await;
    engine.record_decision(record("new.com", Resolution::Close, 40 * DAY)).await;

    // A fresh engine only knows these domains through storage
    let fresh = LearningEngine::new(storage.clone(), DetectorConfig::default());
    let report = fresh.run_cleanup(41 * DAY).await;
    assert_eq!(report.domains, 2);
    assert_eq!(report.removed, 1);
    assert_eq!(storage.snapshot("old.com").map(|p| p.len()), Some(0));
    assert_eq!(storage.snapshot("new.com").map(|p| p.len()), Some(1));
}

#[tokio::test]
async fn gate_queues_until_initialized() {
    let storage = Arc::new(MemoryStorage::new());
    let guard = PopGuard::new(storage.clone(), DetectorConfig::default());

    assert_eq!(guard.record_decision(record("a.com", Resolution::Close, 1)).await, Ok(None));
    assert_eq!(guard.record_decision(record("a.com", Resolution::Close, 2)).await, Ok(None));
    assert_eq!(guard.pending(), 2);
    assert!(storage.snapshot("a.com").is_none());

    let early = guard.classify("a.com", &modal(), &Viewport::default(), 5).await;
    assert!(early.suggestion.is_none());

    assert_eq!(guard.initialize().await, Ok(2));
    assert_eq!(guard.state(), GateState::Ready);
    assert_eq!(storage.snapshot("a.com").unwrap()[0].occurrences, 2);

    let outcome = guard.record_decision(record("a.com", Resolution::Close, 3)).await;
    assert!(matches!(outcome, Ok(Some(UpsertOutcome::Updated(_)))));
}

#[tokio::test]
async fn gate_rejects_after_failed_initialization() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_failing(true);
    let guard = PopGuard::new(storage.clone(), DetectorConfig::default());

    guard.record_decision(record("a.com", Resolution::Close, 1)).await.unwrap();
    assert!(matches!(guard.initialize().await, Err(GateError::Failed(_))));
    assert_eq!(guard.pending(), 0);
    assert!(matches!(
        guard.record_decision(record("a.com", Resolution::Close, 2)).await,
        Err(GateError::Failed(_))
    ));

    storage.set_failing(false);
    assert_eq!(guard.initialize().await, Ok(0));
    assert!(storage.health_check().await);
}

#[tokio::test]
async fn decisions_during_replay_queue_behind_backlog() {
    let storage = Arc::new(MemoryStorage::new().with_delay(Duration::from_millis(100)));
    let guard = Arc::new(PopGuard::new(storage.clone(), DetectorConfig::default()));
    guard.record_decision(record("a.com", Resolution::Close, 1)).await.unwrap();

    let init = {
        let guard = guard.clone();
        tokio::spawn(async move { guard.initialize().await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(guard.state(), GateState::Replaying);
    assert_eq!(guard.record_decision(record("a.com", Resolution::Close, 2)).await, Ok(None));

    assert_eq!(init.await.unwrap(), Ok(2));
    assert_eq!(guard.state(), GateState::Ready);
    let stored = storage.snapshot("a.com").unwrap();
    assert_eq!(stored[0].occurrences, 2);
    assert_eq!(stored[0].last_seen, 2);
}
