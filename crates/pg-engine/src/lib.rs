//! PopGuard Engine
//!
//! Async shell around `pg-core`: pattern persistence, per-domain serialized
//! learning, periodic cleanup, an initialization gate and a health
//! supervisor.
//!
//! # Modules
//!
//! - `storage`: Storage trait with in-memory and JSON file backends
//! - `learning`: Per-domain learning engine with best-effort persistence
//! - `gate`: Initialization state machine with a bounded pending queue
//! - `supervisor`: Health check and restart loop for long-lived components
//! - `service`: Gate and engine combined into the detector service

pub mod gate;
pub mod learning;
pub mod service;
pub mod storage;
pub mod supervisor;

pub use gate::{Admission, GateError, GateState, InitGate};
pub use learning::{CleanupReport, LearningEngine};
pub use service::PopGuard;
pub use storage::{storage_key, JsonFileStorage, MemoryStorage, PatternStorage};
pub use supervisor::{SupervisedTask, Supervisor, TaskStatus};

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock epoch milliseconds. Zero if the clock is before the epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
