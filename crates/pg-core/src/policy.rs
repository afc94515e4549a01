//! Decision policy
//!
//! | input                                   | action    |
//! |-----------------------------------------|-----------|
//! | suggestion `close`                      | block     |
//! | suggestion `keep`                       | allow     |
//! | confidence ≥ [`AUTO_BLOCK_THRESHOLD`]   | block     |
//! | confidence < [`AUTO_ALLOW_THRESHOLD`]   | allow     |
//! | otherwise                               | ask user  |

use serde::{Deserialize, Serialize};

use crate::patterns::{Suggestion, SUGGESTION_MATCH_THRESHOLD, SUGGESTION_MIN_CONFIDENCE};
use crate::types::UserDecision;

/// Raw confidence at or above which an element is blocked without asking.
pub const AUTO_BLOCK_THRESHOLD: f64 = 0.85;
/// Raw confidence below which an element is left alone without asking.
pub const AUTO_ALLOW_THRESHOLD: f64 = 0.35;
/// Minimum raw confidence for an element to be reported as a pop-up candidate.
pub const POPUP_CANDIDATE_THRESHOLD: f64 = 0.5;

/// Final action for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Block,
    Allow,
    AskUser,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Allow => "allow",
            Self::AskUser => "ask-user",
        }
    }
}

/// Combine the raw score with an optional pattern suggestion.
pub fn decide(confidence: f64, suggestion: Option<&Suggestion>) -> Action {
    if let Some(s) = suggestion.filter(|s| {
        s.similarity >= SUGGESTION_MATCH_THRESHOLD && s.confidence >= SUGGESTION_MIN_CONFIDENCE
    }) {
        return match s.decision {
            UserDecision::Close => Action::Block,
            UserDecision::Keep => Action::Allow,
        };
    }

    if !confidence.is_finite() {
        return Action::Allow;
    }
    if confidence >= AUTO_BLOCK_THRESHOLD {
        Action::Block
    } else if confidence < AUTO_ALLOW_THRESHOLD {
        Action::Allow
    } else {
        Action::AskUser
    }
}

/// Whether a raw score is high enough to report the element at all.
#[inline]
pub fn is_candidate(confidence: f64) -> bool {
    confidence >= POPUP_CANDIDATE_THRESHOLD
}
