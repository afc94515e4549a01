use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pg_core::element::ControlInfo;
use pg_core::patterns::{upsert, Pattern};
use pg_core::types::Resolution;
use pg_core::{classify, ElementSnapshot, PopupRecord, Rect, Viewport};

fn modal_snapshot() -> ElementSnapshot {
    let mut el = ElementSnapshot::new("div")
        .with_style("position", "fixed")
        .with_style("z-index", "9999")
        .with_style("background-color", "rgba(0, 0, 0, 0.8)")
        .with_style("box-shadow", "0 2px 8px rgba(0,0,0,0.3)")
        .with_rect(710.0, 390.0, 500.0, 300.0)
        .with_text("Sponsored offer: click now for a free trial")
        .with_control(ControlInfo {
            tag_name: "button".to_string(),
            text: "×".to_string(),
            rect: Some(Rect::new(1180.0, 395.0, 24.0, 24.0)),
            ..ControlInfo::default()
        });
    el.links = vec!["https://ads.example.net/click".to_string()];
    el.page_url = Some("https://news.example.com/".to_string());
    el
}

/// 50 patterns with spread-out sizes so matching scans the whole set.
fn pattern_set(base: &pg_core::Characteristics) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    for i in 0..50u64 {
        let mut c = base.clone();
        c.dimensions.width = 100.0 + 40.0 * i as f64;
        c.dimensions.height = 80.0 + 25.0 * i as f64;
        c.content.contains_ads = i % 2 == 0;
        upsert(
            &mut patterns,
            &PopupRecord {
                id: format!("r{i}"),
                url: "https://news.example.com/".to_string(),
                domain: "news.example.com".to_string(),
                timestamp: i,
                characteristics: c,
                user_decision: Resolution::Close,
                confidence: 0.8,
            },
        );
    }
    patterns
}

fn bench_classify(c: &mut Criterion) {
    let vp = Viewport::default();
    let el = modal_snapshot();

    c.bench_function("classify_no_patterns", |b| {
        b.iter(|| classify(black_box(&el), &vp, &[], 0))
    });

    let base = classify(&el, &vp, &[], 0).characteristics;
    let patterns = pattern_set(&base);
    c.bench_function("classify_50_patterns", |b| {
        b.iter(|| classify(black_box(&el), &vp, black_box(&patterns), 0))
    });
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
