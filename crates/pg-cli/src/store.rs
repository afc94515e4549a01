//! Pattern store file commands

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use pg_core::patterns::UpsertOutcome;
use pg_core::{DetectorConfig, Pattern, PopupRecord};
use pg_engine::{now_ms, JsonFileStorage, LearningEngine, PatternStorage};

use crate::input::read_json;

pub struct StoreOptions {
    pub store_path: String,
    pub config: DetectorConfig,
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start runtime: {}", e))
}

fn open(opts: StoreOptions) -> LearningEngine<JsonFileStorage> {
    LearningEngine::new(Arc::new(JsonFileStorage::new(&opts.store_path)), opts.config)
}

/// Fails on an unreadable store instead of treating it as empty.
async fn check_readable(engine: &LearningEngine<JsonFileStorage>) -> Result<(), String> {
    if engine.storage().health_check().await {
        Ok(())
    } else {
        Err(format!("Store '{}' is unreadable", engine.storage().path().display()))
    }
}

fn print_pattern(p: &Pattern, now: u64) {
    let t = &p.characteristics;
    println!(
        "    {}  {:<5} conf {:.2}  seen {:>3}x  age {:>5.1}d  <{}> {} {}x{} z{}{}{}",
        p.pattern_id,
        format!("{:?}", p.user_decision).to_lowercase(),
        p.confidence,
        p.occurrences,
        p.age_days(now),
        t.tag_name,
        t.position.as_str(),
        t.width.round(),
        t.height.round(),
        t.z_index,
        if t.contains_ads { " ads" } else { "" },
        if t.is_modal { " modal" } else { "" },
    );
}

pub fn run_list(opts: StoreOptions, domain: Option<String>) -> Result<(), String> {
    let store_path = opts.store_path.clone();
    let engine = open(opts);

    runtime()?.block_on(async {
        check_readable(&engine).await?;
        let domains = match domain {
            Some(d) => vec![d],
            None => engine
                .storage()
                .domains()
                .await
                .map_err(|e| format!("Failed to list domains: {}", e))?,
        };

        let now = now_ms();
        let mut total = 0usize;
        println!("Pattern store '{}'", store_path);
        for domain in &domains {
            let patterns = engine.patterns(domain).await;
            total += patterns.len();
            println!("  {} ({} patterns)", domain, patterns.len());
            for p in &patterns {
                print_pattern(p, now);
            }
        }
        println!("  Domains:  {}", domains.len());
        println!("  Patterns: {}", total);
        Ok(())
    })
}

pub fn run_cleanup(opts: StoreOptions) -> Result<(), String> {
    let engine = open(opts);
    runtime()?.block_on(async {
        check_readable(&engine).await?;
        let report = engine.run_cleanup(now_ms()).await;
        let dirty = engine.dirty_domains();

        println!("Cleaned '{}'", engine.storage().path().display());
        println!("  Domains:  {}", report.domains);
        println!("  Removed:  {}", report.removed);
        println!("  Evicted:  {}", report.evicted);
        if !dirty.is_empty() {
            return Err(format!("Failed to persist {} domain(s): {}", dirty.len(), dirty.join(", ")));
        }
        Ok(())
    })
}

/// Feed resolved pop-up records into the store, as the extension would.
pub fn run_learn(opts: StoreOptions, records_path: &str) -> Result<(), String> {
    let records: Vec<PopupRecord> = read_json(Path::new(records_path))?;
    info!("learning from {} records in '{}'", records.len(), records_path);
    let engine = open(opts);

    runtime()?.block_on(async {
        check_readable(&engine).await?;
        let (mut created, mut updated, mut ignored) = (0usize, 0usize, 0usize);
        for record in records {
            match engine.record_decision(record).await {
                UpsertOutcome::Created(_) => created += 1,
                UpsertOutcome::Updated(_) => updated += 1,
                UpsertOutcome::Ignored => ignored += 1,
            }
        }
        let unsaved = engine.flush().await;

        println!("Learned into '{}'", engine.storage().path().display());
        println!("  Created:  {}", created);
        println!("  Updated:  {}", updated);
        println!("  Ignored:  {}", ignored);
        if unsaved > 0 {
            warn!("{} domain(s) still dirty after flush", unsaved);
            return Err(format!("{} domain(s) could not be persisted", unsaved));
        }
        Ok(())
    })
}
