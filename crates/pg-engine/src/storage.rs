//! Pattern storage backends
//!
//! Patterns are stored per domain under the key `popguard:patterns:<domain>`.
//! Backends only move whole collections; merging and pruning happen in the
//! learning engine.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use log::debug;
pub use pg_core::patterns::{domain_from_key, storage_key, STORAGE_KEY_PREFIX};
use pg_core::{Pattern, PersistenceError};

/// Async key-value persistence for pattern collections.
pub trait PatternStorage: Send + Sync {
    /// Load a domain's patterns. A domain with nothing stored yields an empty vec.
    fn load(&self, domain: &str) -> impl Future<Output = Result<Vec<Pattern>, PersistenceError>> + Send;

    /// Replace a domain's patterns.
    fn store(
        &self,
        domain: &str,
        patterns: &[Pattern],
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Domains with a stored collection.
    fn domains(&self) -> impl Future<Output = Result<Vec<String>, PersistenceError>> + Send;

    /// Whether the backend can currently serve requests.
    fn health_check(&self) -> impl Future<Output = bool> + Send;
}

// =============================================================================
// Memory
// =============================================================================

/// In-process storage. Used by tests and as the fallback when no file is given.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<Pattern>>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every operation fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Stored patterns for a domain, bypassing the async API.
    pub fn snapshot(&self, domain: &str) -> Option<Vec<Pattern>> {
        self.lock().get(&storage_key(domain)).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Pattern>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self) -> Result<(), PersistenceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory storage marked failing".to_string()));
        }
        Ok(())
    }
}

impl PatternStorage for MemoryStorage {
    async fn load(&self, domain: &str) -> Result<Vec<Pattern>, PersistenceError> {
        self.enter().await?;
        Ok(self.lock().get(&storage_key(domain)).cloned().unwrap_or_default())
    }

    async fn store(&self, domain: &str, patterns: &[Pattern]) -> Result<(), PersistenceError> {
        self.enter().await?;
        self.lock().insert(storage_key(domain), patterns.to_vec());
        Ok(())
    }

    async fn domains(&self) -> Result<Vec<String>, PersistenceError> {
        self.enter().await?;
        let mut out: Vec<String> = self
            .lock()
            .keys()
            .filter_map(|k| domain_from_key(k).map(str::to_string))
            .collect();
        out.sort();
        Ok(out)
    }

    async fn health_check(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }
}

// =============================================================================
// JSON File
// =============================================================================

type StoreMap = BTreeMap<String, Vec<Pattern>>;

/// One JSON object mapping storage keys to pattern arrays.
///
/// Writes go to a sibling temp file that is renamed over the original.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<StoreMap, PersistenceError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StoreMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_map(&self, map: &StoreMap) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(map)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("wrote {} bytes to {}", json.len(), self.path.display());
        Ok(())
    }
}

impl PatternStorage for JsonFileStorage {
    async fn load(&self, domain: &str) -> Result<Vec<Pattern>, PersistenceError> {
        let mut map = self.read_map().await?;
        Ok(map.remove(&storage_key(domain)).unwrap_or_default())
    }

    async fn store(&self, domain: &str, patterns: &[Pattern]) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(storage_key(domain), patterns.to_vec());
        self.write_map(&map).await
    }

    async fn domains(&self) -> Result<Vec<String>, PersistenceError> {
        let map = self.read_map().await?;
        Ok(map
            .keys()
            .filter_map(|k| domain_from_key(k).map(str::to_string))
            .collect())
    }

    async fn health_check(&self) -> bool {
        self.read_map().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_core::patterns::PatternTraits;
    use pg_core::types::PositionKind;
    use pg_core::UserDecision;

    fn pattern(domain: &str, width: f64) -> Pattern {
        let traits = PatternTraits {
            tag_name: "div".to_string(),
            position: PositionKind::Fixed,
            has_close_button: true,
            contains_ads: true,
            has_external_links: false,
            is_modal: true,
            z_index: 9999.0,
            width,
            height: 300.0,
        };
        Pattern::new(domain, traits, UserDecision::Close, 1_000)
    }

    #[tokio::test]
    async fn test_memory_round_trip_and_failure() {
        let storage = MemoryStorage::new();
        assert!(storage.load("a.com").await.unwrap().is_empty());

        storage.store("a.com", &[pattern("a.com", 500.0)]).await.unwrap();
        assert_eq!(storage.load("a.com").await.unwrap().len(), 1);
        assert_eq!(storage.domains().await.unwrap(), vec!["a.com".to_string()]);

        storage.set_failing(true);
        assert!(!storage.health_check().await);
        assert!(matches!(storage.load("a.com").await, Err(PersistenceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_json_file_keeps_domains_apart() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("patterns.json"));
        assert!(storage.health_check().await);

        storage.store("a.com", &[pattern("a.com", 500.0)]).await.unwrap();
        storage
            .store("b.com", &[pattern("b.com", 300.0), pattern("b.com", 900.0)])
            .await
            .unwrap();
        storage.store("a.com", &[]).await.unwrap();

        let reopened = JsonFileStorage::new(storage.path());
        assert!(reopened.load("a.com").await.unwrap().is_empty());
        assert_eq!(reopened.load("b.com").await.unwrap().len(), 2);
        assert_eq!(
            reopened.domains().await.unwrap(),
            vec!["a.com".to_string(), "b.com".to_string()]
        );

        let raw = std::fs::read_to_string(storage.path()).unwrap();
        assert!(raw.contains("popguard:patterns:b.com"));
    }

    #[tokio::test]
    async fn test_json_file_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        std::fs::write(&path, "{ not json").unwrap();
        let storage = JsonFileStorage::new(&path);
        assert!(matches!(storage.load("a.com").await, Err(PersistenceError::Serialization(_))));
        assert!(!storage.health_check().await);
    }
}
