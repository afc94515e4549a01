use pg_core::patterns::{cleanup, upsert, CleanupPolicy, PatternTraits};
use pg_core::similarity::similarity;
use pg_core::types::PositionKind;
use pg_core::{classify, ElementSnapshot, PopupRecord, Resolution, Viewport};
use proptest::prelude::*;

const DAY: u64 = 86_400_000;

fn position() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("static"),
        Just("relative"),
        Just("absolute"),
        Just("fixed"),
        Just("sticky"),
    ]
}

prop_compose! {
    fn snapshot()(
        pos in position(),
        z in -10i64..200_000,
        left in -500.0f64..3000.0,
        top in -500.0f64..2000.0,
        width in 0.0f64..4000.0,
        height in 0.0f64..3000.0,
        alpha in 0.0f64..1.0,
        opacity in 0.0f64..1.0,
        text in "[a-z 広告無料]{0,40}",
    ) -> ElementSnapshot {
        ElementSnapshot::new("div")
            .with_style("position", pos)
            .with_style("z-index", &z.to_string())
            .with_style("background-color", &format!("rgba(0, 0, 0, {alpha})"))
            .with_style("opacity", &opacity.to_string())
            .with_rect(left, top, width, height)
            .with_text(&text)
    }
}

prop_compose! {
    fn traits()(
        close in any::<bool>(),
        ads in any::<bool>(),
        links in any::<bool>(),
        modal in any::<bool>(),
        z in 0.0f64..100_000.0,
        width in 0.0f64..4000.0,
        height in 0.0f64..3000.0,
    ) -> PatternTraits {
        PatternTraits {
            tag_name: "div".to_string(),
            position: PositionKind::Fixed,
            has_close_button: close,
            contains_ads: ads,
            has_external_links: links,
            is_modal: modal,
            z_index: z,
            width,
            height,
        }
    }
}

fn record_for(el: &ElementSnapshot, decision: Resolution, ts: u64) -> PopupRecord {
    let c = classify(el, &Viewport::default(), &[], ts).characteristics;
    PopupRecord {
        id: format!("r{ts}"),
        url: "https://example.com/".to_string(),
        domain: "example.com".to_string(),
        timestamp: ts,
        characteristics: c,
        user_decision: decision,
        confidence: 0.5,
    }
}

fn decision() -> impl Strategy<Value = Resolution> {
    prop_oneof![
        Just(Resolution::Close),
        Just(Resolution::Keep),
        Just(Resolution::Timeout),
        Just(Resolution::Dismiss),
    ]
}

proptest! {
    #[test]
    fn classification_is_deterministic(el in snapshot()) {
        let vp = Viewport::default();
        let a = classify(&el, &vp, &[], 0);
        let b = classify(&el, &vp, &[], 0);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn confidence_is_bounded(el in snapshot()) {
        let c = classify(&el, &Viewport::default(), &[], 0).confidence;
        prop_assert!((0.0..=1.0).contains(&c), "confidence {}", c);
    }

    #[test]
    fn self_similarity_is_one(t in traits()) {
        prop_assert_eq!(similarity(&t, &t), 1.0);
    }

    #[test]
    fn similarity_is_bounded(a in traits(), b in traits()) {
        let s = similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn pattern_confidence_stays_bounded(
        els in prop::collection::vec(snapshot(), 1..8),
        decisions in prop::collection::vec(decision(), 1..30),
    ) {
        let mut patterns = Vec::new();
        for (i, d) in decisions.iter().enumerate() {
            let el = &els[i % els.len()];
            upsert(&mut patterns, &record_for(el, *d, i as u64));
        }
        for p in &patterns {
            prop_assert!((0.1..=1.0).contains(&p.confidence), "confidence {}", p.confidence);
            prop_assert!(p.occurrences >= 1);
        }
        let mut ids: Vec<&str> = patterns.iter().map(|p| p.pattern_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), patterns.len());
    }

    #[test]
    fn cleanup_is_idempotent(
        els in prop::collection::vec(snapshot(), 1..12),
        ages in prop::collection::vec(0u64..60, 1..12),
        max_patterns in 1usize..6,
    ) {
        let now = 100 * DAY;
        let mut patterns = Vec::new();
        for (i, el) in els.iter().enumerate() {
            let age = ages[i % ages.len()];
            upsert(&mut patterns, &record_for(el, Resolution::Close, now - age * DAY));
        }
        let policy = CleanupPolicy { max_patterns, ..CleanupPolicy::default() };
        let once = cleanup(patterns, now, &policy);
        let twice = cleanup(once.clone(), now, &policy);
        prop_assert!(once.len() <= max_patterns);
        prop_assert_eq!(once, twice);
    }
}
