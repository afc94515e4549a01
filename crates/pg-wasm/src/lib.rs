//! WebAssembly bindings for PopGuard
//!
//! The content script owns one [`Detector`] per page. Persisting patterns is
//! left to the extension: it reads and writes the JSON returned by
//! `exportPatterns` under `storage_key(domain)`.

mod element;
mod logging;

use std::collections::HashMap;

use js_sys::Reflect;
use pg_core::classifier::{classify, Classification};
use pg_core::patterns::{cleanup, upsert, UpsertOutcome};
use pg_core::url::{domain_of, normalize_domain};
use pg_core::{DetectorConfig, ElementSnapshot, Pattern, PopupHistory, PopupRecord, Viewport};
use wasm_bindgen::prelude::*;

pub use element::WebElement;

#[wasm_bindgen]
pub fn init_logging(level: &str) {
    logging::install(logging::parse_level(level));
}

#[wasm_bindgen]
pub fn storage_key(domain: &str) -> String {
    pg_core::patterns::storage_key(&normalize_domain(domain))
}

fn set(target: &js_sys::Object, key: &str, value: &JsValue) {
    let _ = Reflect::set(target, &key.into(), value);
}

fn to_js_json<T: serde::Serialize>(value: &T) -> JsValue {
    serde_json::to_string(value)
        .ok()
        .and_then(|json| js_sys::JSON::parse(&json).ok())
        .unwrap_or(JsValue::NULL)
}

fn current_viewport() -> Viewport {
    let Some(window) = web_sys::window() else {
        return Viewport::default();
    };
    let width = window.inner_width().ok().and_then(|v| v.as_f64());
    let height = window.inner_height().ok().and_then(|v| v.as_f64());
    match (width, height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Viewport::new(w, h),
        _ => Viewport::default(),
    }
}

fn now_ms() -> u64 {
    js_sys::Date::now().max(0.0) as u64
}

fn classification_to_js(result: &Classification) -> JsValue {
    let js_result = js_sys::Object::new();
    set(&js_result, "confidence", &JsValue::from(result.confidence));
    set(&js_result, "action", &JsValue::from_str(result.action.as_str()));
    set(&js_result, "isCandidate", &JsValue::from(result.is_candidate));
    set(&js_result, "characteristics", &to_js_json(&result.characteristics));

    if let Some(s) = &result.suggestion {
        let suggestion = js_sys::Object::new();
        set(&suggestion, "patternId", &JsValue::from_str(&s.pattern_id));
        set(&suggestion, "decision", &to_js_json(&s.decision));
        set(&suggestion, "confidence", &JsValue::from(s.confidence));
        set(&suggestion, "similarity", &JsValue::from(s.similarity));
        set(&js_result, "suggestion", &suggestion);
    }
    js_result.into()
}

/// Per-page detector state: config, pattern cache and decision history.
#[wasm_bindgen]
pub struct Detector {
    config: DetectorConfig,
    patterns: HashMap<String, Vec<Pattern>>,
    history: PopupHistory,
}

impl Detector {
    fn domain_patterns(&self, domain: &str) -> &[Pattern] {
        self.patterns
            .get(&normalize_domain(domain))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[wasm_bindgen]
impl Detector {
    /// `config_json` may be omitted for defaults. Out-of-range values are
    /// clamped; only malformed JSON is an error.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<Detector, JsValue> {
        let config = match config_json.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => DetectorConfig::from_json(json)
                .map_err(|e| JsValue::from_str(&e.to_string()))?,
            _ => DetectorConfig::default(),
        };
        let history = PopupHistory::new(config.history_max_entries, config.history_max_age_days);
        Ok(Detector {
            config,
            patterns: HashMap::new(),
            history,
        })
    }

    #[wasm_bindgen(getter, js_name = learningEnabled)]
    pub fn learning_enabled(&self) -> bool {
        self.config.learning_enabled
    }

    /// Classify a live element on a page of `domain`.
    pub fn classify(&self, element: &web_sys::Element, domain: &str, inserted_at: Option<f64>) -> JsValue {
        let view = WebElement::new(element.clone())
            .with_inserted_at(inserted_at.filter(|t| *t >= 0.0).map(|t| t as u64));
        let result = classify(&view, &current_viewport(), self.domain_patterns(domain), now_ms());
        classification_to_js(&result)
    }

    /// Classify a serialized element snapshot.
    #[wasm_bindgen(js_name = classifySnapshot)]
    pub fn classify_snapshot(&self, snapshot_json: &str, domain: &str) -> Result<JsValue, JsValue> {
        let snapshot: ElementSnapshot = serde_json::from_str(snapshot_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid snapshot: {}", e)))?;
        let result = classify(&snapshot, &current_viewport(), self.domain_patterns(domain), now_ms());
        Ok(classification_to_js(&result))
    }

    /// Learn from a resolved pop-up. Returns `{ outcome, patternId? }`.
    #[wasm_bindgen(js_name = recordDecision)]
    pub fn record_decision(&mut self, record_json: &str) -> Result<JsValue, JsValue> {
        let mut record: PopupRecord = serde_json::from_str(record_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid popup record: {}", e)))?;
        record.domain = match normalize_domain(&record.domain) {
            d if d.is_empty() => domain_of(&record.url),
            d => d,
        };

        self.history.push(record.clone());
        self.history.prune(record.timestamp);

        let outcome = if self.config.learning_enabled && !record.domain.is_empty() {
            let policy = self.config.cleanup_policy();
            let patterns = self.patterns.entry(record.domain.clone()).or_default();
            let outcome = upsert(patterns, &record);
            if patterns.len() > policy.max_patterns {
                *patterns = cleanup(std::mem::take(patterns), record.timestamp, &policy);
            }
            outcome
        } else {
            UpsertOutcome::Ignored
        };

        let js_result = js_sys::Object::new();
        let (label, id) = match &outcome {
            UpsertOutcome::Created(id) => ("created", Some(id)),
            UpsertOutcome::Updated(id) => ("updated", Some(id)),
            UpsertOutcome::Ignored => ("ignored", None),
        };
        set(&js_result, "outcome", &JsValue::from_str(label));
        if let Some(id) = id {
            set(&js_result, "patternId", &JsValue::from_str(id));
        }
        Ok(js_result.into())
    }

    /// Replace a domain's patterns with a stored JSON array. Returns the count.
    #[wasm_bindgen(js_name = importPatterns)]
    pub fn import_patterns(&mut self, domain: &str, patterns_json: &str) -> Result<u32, JsValue> {
        let patterns: Vec<Pattern> = if patterns_json.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(patterns_json)
                .map_err(|e| JsValue::from_str(&format!("Invalid patterns: {}", e)))?
        };
        let count = patterns.len() as u32;
        self.patterns.insert(normalize_domain(domain), patterns);
        Ok(count)
    }

    /// A domain's patterns as a JSON array, for storage under `storage_key`.
    #[wasm_bindgen(js_name = exportPatterns)]
    pub fn export_patterns(&self, domain: &str) -> Result<String, JsValue> {
        serde_json::to_string(self.domain_patterns(domain))
            .map_err(|e| JsValue::from_str(&format!("Failed to serialize patterns: {}", e)))
    }

    /// Prune every cached domain and the history. Returns patterns removed.
    pub fn cleanup(&mut self) -> u32 {
        let now = now_ms();
        let policy = self.config.cleanup_policy();
        let mut removed = 0usize;
        for patterns in self.patterns.values_mut() {
            let before = patterns.len();
            *patterns = cleanup(std::mem::take(patterns), now, &policy);
            removed += before - patterns.len();
        }
        self.history.prune(now);
        removed as u32
    }

    /// Resolution counts for a domain: `{ detected, closed, kept, ignored }`.
    pub fn stats(&self, domain: &str) -> JsValue {
        to_js_json(&self.history.stats(&normalize_domain(domain)))
    }
}
