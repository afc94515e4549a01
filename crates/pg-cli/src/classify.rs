//! Classify element snapshots from JSON files

use std::path::Path;
use std::sync::Arc;

use log::debug;
use pg_core::{classify, Classification, DetectorConfig, ElementSnapshot, Pattern, Viewport};
use pg_engine::{now_ms, JsonFileStorage, LearningEngine};
use serde::Deserialize;

use crate::input::read_json;

pub struct ClassifyOptions {
    pub input_paths: Vec<String>,
    pub viewport: Viewport,
    /// Learned patterns come from `store` under this domain
    pub domain: Option<String>,
    pub store_path: Option<String>,
    pub config: DetectorConfig,
    pub json: bool,
}

/// A file holds one snapshot or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Many(Vec<ElementSnapshot>),
    One(Box<ElementSnapshot>),
}

impl SnapshotFile {
    fn into_vec(self) -> Vec<ElementSnapshot> {
        match self {
            Self::Many(v) => v,
            Self::One(s) => vec![*s],
        }
    }
}

fn load_patterns(opts: &ClassifyOptions) -> Result<Vec<Pattern>, String> {
    let (Some(domain), Some(store)) = (&opts.domain, &opts.store_path) else {
        return Ok(Vec::new());
    };
    let engine = LearningEngine::new(Arc::new(JsonFileStorage::new(store)), opts.config.clone());
    let rt = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start runtime: {}", e))?;
    let patterns = rt.block_on(engine.patterns(domain));
    debug!("loaded {} patterns for {} from '{}'", patterns.len(), domain, store);
    Ok(patterns)
}

fn print_result(label: &str, result: &Classification) {
    let b = &result.breakdown;
    let c = &result.characteristics;
    println!("{}", label);
    println!("  Action:     {}", result.action.as_str());
    println!(
        "  Confidence: {:.3}{}",
        result.confidence,
        if result.is_candidate { " (candidate)" } else { "" }
    );
    println!(
        "  Points:     position {:.2}, z-index {:.2}, size {:.2}, modal {:.2}, content {:.2}, close {:.2}, visual {:.2}",
        b.position, b.z_index, b.dimensions, b.modal, b.content, b.close_button, b.visual
    );
    println!(
        "  Element:    <{}> {} z{} {}x{}",
        c.tag_name,
        c.position_kind().as_str(),
        c.z_index.value,
        c.dimensions.width.round(),
        c.dimensions.height.round()
    );
    if let Some(s) = &result.suggestion {
        println!(
            "  Learned:    {:?} (pattern {}, similarity {:.2}, confidence {:.2})",
            s.decision, s.pattern_id, s.similarity, s.confidence
        );
    }
}

pub fn run_classify(opts: ClassifyOptions) -> Result<(), String> {
    if opts.input_paths.is_empty() {
        return Err("No input files specified".to_string());
    }
    if opts.domain.is_some() != opts.store_path.is_some() {
        return Err("--domain and --store must be given together".to_string());
    }

    let patterns = load_patterns(&opts)?;
    let now = now_ms();

    let mut results = Vec::new();
    for path in &opts.input_paths {
        let file: SnapshotFile = read_json(Path::new(path))?;
        for (i, snapshot) in file.into_vec().iter().enumerate() {
            let result = classify(snapshot, &opts.viewport, &patterns, now);
            results.push((format!("{}[{}]", path, i), result));
        }
    }

    if opts.json {
        let out: Vec<&Classification> = results.iter().map(|(_, r)| r).collect();
        let json = serde_json::to_string_pretty(&out)
            .map_err(|e| format!("Failed to serialize results: {}", e))?;
        println!("{}", json);
    } else {
        for (label, result) in &results {
            print_result(label, result);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_file_one_or_many() {
        let one: SnapshotFile = serde_json::from_str(r#"{ "tagName": "div" }"#).unwrap();
        assert_eq!(one.into_vec().len(), 1);

        let many: SnapshotFile =
            serde_json::from_str(r#"[{ "tagName": "div" }, { "tagName": "span" }]"#).unwrap();
        let v = many.into_vec();
        assert_eq!(v.len(), 2);
        assert_eq!(v[1].tag_name, "span");
    }

    #[test]
    fn test_domain_requires_store() {
        let opts = ClassifyOptions {
            input_paths: vec!["x.json".to_string()],
            viewport: Viewport::default(),
            domain: Some("a.com".to_string()),
            store_path: None,
            config: DetectorConfig::default(),
            json: false,
        };
        assert!(run_classify(opts).is_err());
    }

    #[test]
    fn test_classify_fixture_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("el.json");
        std::fs::write(
            &path,
            r#"{ "tagName": "div", "style": { "position": "fixed", "z-index": "9999" },
                 "rect": { "left": 0, "top": 0, "width": 1920, "height": 1080 } }"#,
        )
        .unwrap();
        let opts = ClassifyOptions {
            input_paths: vec![path.to_string_lossy().into_owned()],
            viewport: Viewport::default(),
            domain: None,
            store_path: None,
            config: DetectorConfig::default(),
            json: true,
        };
        run_classify(opts).unwrap();
    }
}
