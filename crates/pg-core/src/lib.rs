//! PopGuard Core Library
//!
//! This crate provides the heuristic pop-up classifier and the per-domain
//! pattern learning store for the PopGuard overlay blocker.
//!
//! # Architecture
//!
//! Classification is a pipeline of pure functions:
//!
//! ```text
//! element -> features -> analyzer -> { scorer, pattern lookup } -> policy
//! ```
//!
//! Nothing in this crate performs I/O or reads a clock. Callers pass the
//! current time explicitly so the same code runs natively and in wasm.
//! Persistence and scheduling live in `pg-engine`.
//!
//! # Modules
//!
//! - `element`: DOM-like element abstraction and a serializable snapshot
//! - `features`: Feature extraction from one element
//! - `analyzer`: Feature record to semantic characteristics
//! - `scorer`: Weighted confidence rubric
//! - `similarity`: Pattern-vs-sample similarity
//! - `patterns`: Learned patterns, matching, upsert and cleanup
//! - `history`: Bounded history of resolved pop-ups
//! - `policy`: Final block / allow / ask decision
//! - `classifier`: End-to-end classification entry point
//! - `config`: Detector configuration with clamping
//! - `hash`: Murmur3 hashing for pattern fingerprints
//! - `url`: Host extraction for domain partitioning
//! - `types`: Shared type definitions

pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod element;
pub mod error;
pub mod features;
pub mod hash;
pub mod history;
pub mod patterns;
pub mod policy;
pub mod scorer;
pub mod similarity;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use analyzer::analyze;
pub use classifier::{classify, Classification};
pub use config::DetectorConfig;
pub use element::{ElementSnapshot, ElementView, Rect};
pub use error::{ConfigError, ExtractionError, PersistenceError};
pub use features::extract_features;
pub use history::{DomainStats, PopupHistory};
pub use patterns::{cleanup, find_match, suggest, upsert, Pattern, PatternTraits, Suggestion};
pub use policy::{decide, Action};
pub use scorer::score;
pub use types::{
    Characteristics, FeatureRecord, PopupRecord, Resolution, UserDecision, Viewport,
};
