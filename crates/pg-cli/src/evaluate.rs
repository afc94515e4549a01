//! Precision / recall against a labeled sample set

use std::path::Path;

use pg_core::policy::POPUP_CANDIDATE_THRESHOLD;
use pg_core::{classify, ElementSnapshot, Viewport};
use serde::Deserialize;

use crate::input::read_json;

pub struct EvaluateOptions {
    pub input_path: String,
    pub viewport: Viewport,
    pub threshold: Option<f64>,
    pub verbose: bool,
}

/// One hand-labeled element.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledSample {
    pub name: String,
    pub is_popup: bool,
    /// Overrides the run's viewport
    #[serde(default)]
    pub viewport: Option<Viewport>,
    pub element: ElementSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Confusion {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl Confusion {
    pub fn add(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.true_positive += 1,
            (true, false) => self.false_positive += 1,
            (false, false) => self.true_negative += 1,
            (false, true) => self.false_negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// 1.0 when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    /// 1.0 when the set has no positives.
    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        1.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-sample outcome.
#[derive(Debug, Clone)]
pub struct SampleResult {
    pub name: String,
    pub is_popup: bool,
    pub confidence: f64,
    pub predicted: bool,
}

impl SampleResult {
    pub fn correct(&self) -> bool {
        self.predicted == self.is_popup
    }
}

/// Classify every sample with no learned patterns and tally the confusion matrix.
pub fn evaluate(samples: &[LabeledSample], viewport: &Viewport, threshold: f64) -> (Confusion, Vec<SampleResult>) {
    let mut confusion = Confusion::default();
    let results: Vec<SampleResult> = samples
        .iter()
        .map(|sample| {
            let vp = sample.viewport.as_ref().unwrap_or(viewport);
            let confidence = classify(&sample.element, vp, &[], 0).confidence;
            let predicted = confidence >= threshold;
            confusion.add(predicted, sample.is_popup);
            SampleResult {
                name: sample.name.clone(),
                is_popup: sample.is_popup,
                confidence,
                predicted,
            }
        })
        .collect();
    (confusion, results)
}

pub fn run_evaluate(opts: EvaluateOptions) -> Result<(), String> {
    let threshold = opts.threshold.unwrap_or(POPUP_CANDIDATE_THRESHOLD);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("Threshold {} is outside [0, 1]", threshold));
    }

    let samples: Vec<LabeledSample> = read_json(Path::new(&opts.input_path))?;
    if samples.is_empty() {
        return Err(format!("No samples in '{}'", opts.input_path));
    }

    let (confusion, results) = evaluate(&samples, &opts.viewport, threshold);

    println!("Evaluated {} samples from '{}'", confusion.total(), opts.input_path);
    if opts.verbose {
        for r in &results {
            println!(
                "  {} {:<32} conf {:.3}  label {}",
                if r.correct() { "✓" } else { "✗" },
                r.name,
                r.confidence,
                if r.is_popup { "popup" } else { "benign" }
            );
        }
    }
    println!("  Threshold: {:.2}", threshold);
    println!(
        "  Matrix:    TP {}  FP {}  TN {}  FN {}",
        confusion.true_positive, confusion.false_positive, confusion.true_negative, confusion.false_negative
    );
    println!("  Precision: {:.3}", confusion.precision());
    println!("  Recall:    {:.3}", confusion.recall());
    println!("  F1:        {:.3}", confusion.f1());
    println!("  Accuracy:  {:.3}", confusion.accuracy());
    Ok(())
}
