//! Evaluation result aggregates
//!
//! `OrdinaryResults` holds document-level label metrics. `AspectBasedResults`
//! holds the five matching counters and the metrics derived from them.
//! Derived metrics are `None` when their denominator is zero, which keeps an
//! undefined score distinguishable from a genuine `0.0`.

use serde::{Deserialize, Serialize};

// ============================================================================
// Result Rows
// ============================================================================

/// One statistic of a result aggregate in long format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub statistic: String,
    /// `None` for undefined metrics
    pub value: Option<f64>,
    pub name: Option<String>,
}

impl ResultRow {
    fn new(statistic: &str, value: Option<f64>, name: Option<&str>) -> Self {
        Self {
            statistic: statistic.to_string(),
            value,
            name: name.map(str::to_string),
        }
    }
}

// ============================================================================
// Ordinary Results
// ============================================================================

/// Metrics for whole-document sentiment labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdinaryResults {
    pub global_accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub micro_precision: f64,
    pub micro_recall: f64,
    pub micro_f1: f64,
    /// Tool that produced the predictions
    #[serde(default)]
    pub name: Option<String>,
}

impl OrdinaryResults {
    /// Tag the results with a tool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Flatten into `(statistic, value, name)` rows
    pub fn to_rows(&self) -> Vec<ResultRow> {
        let name = self.name.as_deref();
        vec![
            ResultRow::new("global_accuracy", Some(self.global_accuracy), name),
            ResultRow::new("macro_precision", Some(self.macro_precision), name),
            ResultRow::new("macro_recall", Some(self.macro_recall), name),
            ResultRow::new("macro_f1", Some(self.macro_f1), name),
            ResultRow::new("micro_precision", Some(self.micro_precision), name),
            ResultRow::new("micro_recall", Some(self.micro_recall), name),
            ResultRow::new("micro_f1", Some(self.micro_f1), name),
        ]
    }

    /// Human-readable summary, one metric per line
    pub fn report(&self) -> String {
        let mut out = header("Ordinary results", self.name.as_deref());
        for row in self.to_rows() {
            out.push_str(&format_metric(&row.statistic, row.value));
        }
        out
    }
}

// ============================================================================
// Aspect-based Results
// ============================================================================

/// Raw outcome counters of aspect matching
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectCounts {
    /// Same text and same label as a gold aspect
    pub correct: usize,
    /// Matched a gold aspect by text but carries a different label
    pub incorrect: usize,
    /// Overlaps a gold aspect by substring and carries the same label
    pub partial: usize,
    /// Gold total minus correct, incorrect and partial
    ///
    /// Negative when several predictions claim the same gold aspect.
    pub missing: i64,
    /// Predictions with no gold counterpart
    pub spurious: usize,
}

impl AspectCounts {
    pub fn new(
        correct: usize,
        incorrect: usize,
        partial: usize,
        missing: i64,
        spurious: usize,
    ) -> Self {
        Self {
            correct,
            incorrect,
            partial,
            missing,
            spurious,
        }
    }
}

/// Results of an aspect-based evaluation
///
/// Only the counters are inputs. `possible`, `actual`, `precision`,
/// `recall`, and `f1` are computed at construction and cannot be set
/// independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SerializedCounts")]
pub struct AspectBasedResults {
    correct: usize,
    incorrect: usize,
    partial: usize,
    missing: i64,
    spurious: usize,
    possible: i64,
    actual: usize,
    precision: Option<f64>,
    recall: Option<f64>,
    f1: Option<f64>,
    name: Option<String>,
}

impl AspectBasedResults {
    /// Build results from the five counters
    pub fn new(
        correct: usize,
        incorrect: usize,
        partial: usize,
        missing: i64,
        spurious: usize,
    ) -> Self {
        Self::from_counts(AspectCounts::new(
            correct, incorrect, partial, missing, spurious,
        ))
    }

    pub fn from_counts(counts: AspectCounts) -> Self {
        let matched = counts.correct + counts.incorrect + counts.partial;
        let possible = matched as i64 + counts.missing;
        let actual = matched + counts.spurious;
        let precision = ratio(counts.correct, actual as i64);
        let recall = ratio(counts.correct, possible);
        let f1 = match (precision, recall) {
            (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
            _ => None,
        };

        Self {
            correct: counts.correct,
            incorrect: counts.incorrect,
            partial: counts.partial,
            missing: counts.missing,
            spurious: counts.spurious,
            possible,
            actual,
            precision,
            recall,
            f1,
            name: None,
        }
    }

    /// Tag the results with a pipeline name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn counts(&self) -> AspectCounts {
        AspectCounts::new(
            self.correct,
            self.incorrect,
            self.partial,
            self.missing,
            self.spurious,
        )
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn incorrect(&self) -> usize {
        self.incorrect
    }

    pub fn partial(&self) -> usize {
        self.partial
    }

    pub fn missing(&self) -> i64 {
        self.missing
    }

    pub fn spurious(&self) -> usize {
        self.spurious
    }

    /// Gold annotations contributing to the score
    pub fn possible(&self) -> i64 {
        self.possible
    }

    /// Annotations produced by the system
    pub fn actual(&self) -> usize {
        self.actual
    }

    /// `correct / actual`, `None` when nothing was predicted
    pub fn precision(&self) -> Option<f64> {
        self.precision
    }

    /// `correct / possible`, `None` when there was no gold annotation
    pub fn recall(&self) -> Option<f64> {
        self.recall
    }

    /// Harmonic mean of precision and recall, `None` when either is
    /// undefined or both are zero
    pub fn f1(&self) -> Option<f64> {
        self.f1
    }

    /// True when precision, recall and F1 are all defined
    pub fn is_defined(&self) -> bool {
        self.precision.is_some() && self.recall.is_some() && self.f1.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Flatten into `(statistic, value, name)` rows
    pub fn to_rows(&self) -> Vec<ResultRow> {
        let name = self.name.as_deref();
        vec![
            ResultRow::new("correct", Some(self.correct as f64), name),
            ResultRow::new("incorrect", Some(self.incorrect as f64), name),
            ResultRow::new("partial", Some(self.partial as f64), name),
            ResultRow::new("missing", Some(self.missing as f64), name),
            ResultRow::new("spurious", Some(self.spurious as f64), name),
            ResultRow::new("possible", Some(self.possible as f64), name),
            ResultRow::new("actual", Some(self.actual as f64), name),
            ResultRow::new("precision", self.precision, name),
            ResultRow::new("recall", self.recall, name),
            ResultRow::new("f1", self.f1, name),
        ]
    }

    /// Human-readable summary; undefined metrics print as `undefined`
    pub fn report(&self) -> String {
        let mut out = header("Aspect-based results", self.name.as_deref());
        let counters = [
            ("correct", self.correct as i64),
            ("incorrect", self.incorrect as i64),
            ("partial", self.partial as i64),
            ("missing", self.missing),
            ("spurious", self.spurious as i64),
            ("possible", self.possible),
            ("actual", self.actual as i64),
        ];
        for (statistic, count) in counters {
            out.push_str(&format!("  {statistic:<16} {count}\n"));
        }
        out.push_str(&format_metric("precision", self.precision));
        out.push_str(&format_metric("recall", self.recall));
        out.push_str(&format_metric("f1", self.f1));
        out
    }
}

impl From<AspectCounts> for AspectBasedResults {
    fn from(counts: AspectCounts) -> Self {
        Self::from_counts(counts)
    }
}

fn header(title: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{title} for {name}\n"),
        None => format!("{title}\n"),
    }
}

fn format_metric(statistic: &str, value: Option<f64>) -> String {
    match value {
        Some(value) => format!("  {statistic:<16} {value:.4}\n"),
        None => format!("  {statistic:<16} undefined\n"),
    }
}

fn ratio(numerator: usize, denominator: i64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

/// Deserialization proxy: derived fields in the input are ignored and
/// recomputed from the counters.
#[derive(Deserialize)]
struct SerializedCounts {
    correct: usize,
    incorrect: usize,
    partial: usize,
    missing: i64,
    spurious: usize,
    #[serde(default)]
    name: Option<String>,
}

impl From<SerializedCounts> for AspectBasedResults {
    fn from(raw: SerializedCounts) -> Self {
        let results = Self::new(
            raw.correct,
            raw.incorrect,
            raw.partial,
            raw.missing,
            raw.spurious,
        );
        match raw.name {
            Some(name) => results.with_name(name),
            None => results,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_fields() {
        let results = AspectBasedResults::new(2, 1, 1, 1, 0);

        assert_eq!(results.possible(), 5);
        assert_eq!(results.actual(), 4);
        assert!((results.precision().unwrap() - 0.5).abs() < 1e-9);
        assert!((results.recall().unwrap() - 0.4).abs() < 1e-9);
        // 2 * 0.5 * 0.4 / 0.9
        assert!((results.f1().unwrap() - 0.4444).abs() < 1e-3);
        assert!(results.is_defined());
    }

    #[test]
    fn test_negative_missing_keeps_possible_at_gold_total() {
        // one gold aspect claimed by two predictions
        let results = AspectBasedResults::new(1, 1, 0, -1, 0);

        assert_eq!(results.missing(), -1);
        assert_eq!(results.possible(), 1);
        assert_eq!(results.actual(), 2);
        assert_eq!(results.recall(), Some(1.0));
        assert_eq!(results.precision(), Some(0.5));
        assert!(results.report().contains("missing          -1"));
    }

    #[test]
    fn test_nothing_predicted_is_undefined_precision() {
        let results = AspectBasedResults::new(0, 0, 0, 3, 0);

        assert_eq!(results.actual(), 0);
        assert_eq!(results.precision(), None);
        assert_eq!(results.recall(), Some(0.0));
        assert_eq!(results.f1(), None);
        assert!(!results.is_defined());
    }

    #[test]
    fn test_no_gold_is_undefined_recall() {
        let results = AspectBasedResults::new(0, 0, 0, 0, 2);

        assert_eq!(results.precision(), Some(0.0));
        assert_eq!(results.recall(), None);
        assert_eq!(results.f1(), None);
    }

    #[test]
    fn test_zero_precision_and_recall_is_undefined_f1() {
        let results = AspectBasedResults::new(0, 2, 0, 1, 1);

        assert_eq!(results.precision(), Some(0.0));
        assert_eq!(results.recall(), Some(0.0));
        assert_eq!(results.f1(), None);
    }

    #[test]
    fn test_empty_evaluation_fully_undefined() {
        let results = AspectBasedResults::from_counts(AspectCounts::default());

        assert_eq!(results.precision(), None);
        assert_eq!(results.recall(), None);
        assert_eq!(results.f1(), None);
    }

    #[test]
    fn test_deserialize_recomputes_derived_fields() {
        let json = r#"{
            "correct": 2, "incorrect": 1, "partial": 1, "missing": 1, "spurious": 0,
            "possible": 999, "precision": 0.99, "name": "A + B"
        }"#;
        let results: AspectBasedResults = serde_json::from_str(json).unwrap();

        assert_eq!(results.possible(), 5);
        assert!((results.precision().unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(results.name(), Some("A + B"));
    }

    #[test]
    fn test_serialized_undefined_metric_is_null() {
        let results = AspectBasedResults::new(0, 0, 0, 0, 0);
        let value = serde_json::to_value(&results).unwrap();

        assert!(value["precision"].is_null());
        assert_eq!(value["correct"], 0);
    }

    #[test]
    fn test_rows_carry_name() {
        let ordinary = OrdinaryResults {
            global_accuracy: 1.0,
            macro_precision: 1.0,
            macro_recall: 1.0,
            macro_f1: 1.0,
            micro_precision: 1.0,
            micro_recall: 1.0,
            micro_f1: 1.0,
            name: None,
        }
        .with_name("LexiconAnnotator");

        let rows = ordinary.to_rows();
        assert_eq!(rows.len(), 7);
        assert!(rows
            .iter()
            .all(|r| r.name.as_deref() == Some("LexiconAnnotator")));

        let aspect_rows = AspectBasedResults::new(1, 0, 0, 0, 0).to_rows();
        assert_eq!(aspect_rows.len(), 10);
        assert_eq!(aspect_rows[7].statistic, "precision");
    }

    #[test]
    fn test_report_prints_undefined() {
        let report = AspectBasedResults::new(0, 0, 0, 2, 0)
            .with_name("DictionaryExtractor + LexiconClassifier")
            .report();

        assert!(report.starts_with("Aspect-based results for DictionaryExtractor + LexiconClassifier"));
        assert!(report.contains("missing          2"));
        assert!(report.contains("precision        undefined"));
        assert!(report.contains("recall           0.0000"));
    }
}
