//! End-to-end classification of one element

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::analyzer::analyze;
use crate::element::ElementView;
use crate::error::ExtractionError;
use crate::features::extract_features;
use crate::patterns::{suggest, Pattern, Suggestion};
use crate::policy::{decide, is_candidate, Action};
use crate::scorer::{score_breakdown, ScoreBreakdown};
use crate::types::{Characteristics, Viewport};

/// Result of classifying one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub characteristics: Characteristics,
    /// Heuristic confidence in `[0, 1]`, before any pattern override
    pub confidence: f64,
    pub breakdown: ScoreBreakdown,
    /// Raw confidence reaches the candidate threshold
    pub is_candidate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
    pub action: Action,
}

impl Classification {
    /// The result for an element that could not be read at all.
    fn unreadable() -> Self {
        Self {
            characteristics: Characteristics::default(),
            confidence: 0.0,
            breakdown: ScoreBreakdown::default(),
            is_candidate: false,
            suggestion: None,
            action: decide(0.0, None),
        }
    }
}

/// Classify `element` against the heuristic rubric and the domain's learned
/// patterns. Never fails: a detached element scores 0 with no suggestion.
pub fn classify<E: ElementView + ?Sized>(
    element: &E,
    viewport: &Viewport,
    patterns: &[Pattern],
    now_ms: u64,
) -> Classification {
    if let Err(ExtractionError::Detached) = element.bounding_rect() {
        trace!("element detached; skipping");
        return Classification::unreadable();
    }

    let features = extract_features(element, viewport, now_ms);
    let characteristics = analyze(&features, viewport);
    let breakdown = score_breakdown(&characteristics);
    let confidence = breakdown.confidence();
    let suggestion = suggest(patterns, &characteristics);
    let action = decide(confidence, suggestion.as_ref());

    debug!(
        "classified <{}> confidence {:.2} action {}{}",
        characteristics.tag_name,
        confidence,
        action.as_str(),
        suggestion
            .as_ref()
            .map(|s| format!(" (pattern {})", s.pattern_id))
            .unwrap_or_default()
    );

    Classification {
        characteristics,
        confidence,
        breakdown,
        is_candidate: is_candidate(confidence),
        suggestion,
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{upsert, PatternTraits};
    use crate::types::{PopupRecord, Resolution, UserDecision};

    fn modal() -> crate::element::ElementSnapshot {
        crate::element::ElementSnapshot::new("div")
            .with_style("position", "fixed")
            .with_style("z-index", "9999")
            .with_style("background-color", "rgba(0, 0, 0, 0.8)")
            .with_rect(710.0, 390.0, 500.0, 300.0)
            .with_text("広告 今すぐクリック")
    }

    #[test]
    fn test_classify_modal_is_candidate() {
        let vp = Viewport::default();
        let c = classify(&modal(), &vp, &[], 0);
        assert!(c.is_candidate);
        assert!(c.confidence >= 0.5);
        assert!(c.suggestion.is_none());
        assert_eq!(c.confidence, c.breakdown.confidence());
    }

    #[test]
    fn test_classify_detached_scores_zero() {
        let mut el = modal();
        el.detached = true;
        let c = classify(&el, &Viewport::default(), &[], 0);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.action, Action::Allow);
        assert!(!c.is_candidate);
    }

    #[test]
    fn test_learned_keep_overrides_score() {
        let vp = Viewport::default();
        let el = modal();
        let first = classify(&el, &vp, &[], 0);

        let mut patterns = Vec::new();
        for ts in 0..3 {
            upsert(
                &mut patterns,
                &PopupRecord {
                    id: format!("r{ts}"),
                    url: "https://example.com/".to_string(),
                    domain: "example.com".to_string(),
                    timestamp: ts,
                    characteristics: first.characteristics.clone(),
                    user_decision: Resolution::Keep,
                    confidence: first.confidence,
                },
            );
        }
        assert_eq!(patterns.len(), 1);
        assert_eq!(
            patterns[0].characteristics,
            PatternTraits::from(&first.characteristics)
        );

        let again = classify(&el, &vp, &patterns, 10);
        let s = again.suggestion.expect("strong keep pattern");
        assert_eq!(s.decision, UserDecision::Keep);
        assert_eq!(again.action, Action::Allow);
        assert_eq!(again.confidence, first.confidence);
    }
}
