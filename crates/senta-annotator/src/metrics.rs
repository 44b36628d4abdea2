//! Quality Metrics module
//!
//! Scores predicted annotations against gold annotations.
//!
//! Aspect-based scoring aligns every predicted aspect with the gold aspects
//! of the same document and counts outcomes in the categories used by
//! named-entity evaluation: correct, incorrect, partial, missing, spurious.
//! Ordinary scoring compares one label per document and reports accuracy
//! with macro and micro precision, recall and F1.

use std::collections::{BTreeMap, BTreeSet};

use senta_core::{
    AspectAnnotation, AspectBasedResults, AspectCounts, OrdinaryResults, Result, SentaError,
    SentimentAnnotation,
};

// ============================================================================
// Aspect Matching
// ============================================================================

/// Outcome of matching one predicted aspect against a document's gold aspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Same text, same label
    Correct,
    /// Matched by text (exact or substring), different label
    Incorrect,
    /// Substring overlap, same label
    Partial,
    /// No gold aspect matches
    Spurious,
}

/// Match a single predicted aspect against a document's gold aspects
///
/// Exact text equality is tried over the whole gold list first; only when
/// it finds nothing is substring containment (in either direction) tried.
/// Within each pass the first gold aspect in list order wins. Labels are
/// compared case-insensitively; aspect texts are compared as given.
pub fn match_aspect(predicted: &SentimentAnnotation, gold: &[SentimentAnnotation]) -> MatchOutcome {
    let predicted_label = predicted.normalized_label();

    if let Some(exact) = gold.iter().find(|g| g.text == predicted.text) {
        return if exact.normalized_label() == predicted_label {
            MatchOutcome::Correct
        } else {
            MatchOutcome::Incorrect
        };
    }

    let overlapping = gold
        .iter()
        .find(|g| predicted.text.contains(g.text.as_str()) || g.text.contains(predicted.text.as_str()));

    match overlapping {
        Some(g) if g.normalized_label() == predicted_label => MatchOutcome::Partial,
        Some(_) => MatchOutcome::Incorrect,
        None => MatchOutcome::Spurious,
    }
}

/// Outcome tallies for one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentTally {
    pub correct: usize,
    pub incorrect: usize,
    pub partial: usize,
    pub spurious: usize,
    /// Number of gold aspects in the document
    pub gold_total: usize,
}

impl DocumentTally {
    fn record(&mut self, outcome: MatchOutcome) {
        match outcome {
            MatchOutcome::Correct => self.correct += 1,
            MatchOutcome::Incorrect => self.incorrect += 1,
            MatchOutcome::Partial => self.partial += 1,
            MatchOutcome::Spurious => self.spurious += 1,
        }
    }

    /// Add another document's tally
    pub fn add(&mut self, other: &DocumentTally) {
        self.correct += other.correct;
        self.incorrect += other.incorrect;
        self.partial += other.partial;
        self.spurious += other.spurious;
        self.gold_total += other.gold_total;
    }

    /// Predictions that claimed some gold aspect
    pub fn matched(&self) -> usize {
        self.correct + self.incorrect + self.partial
    }

    /// Final counters; `missing` is the gold total minus matched predictions
    ///
    /// A gold aspect is not consumed by a match, so several predictions may
    /// claim the same one and drive `missing` below zero.
    pub fn into_counts(self) -> AspectCounts {
        AspectCounts {
            correct: self.correct,
            incorrect: self.incorrect,
            partial: self.partial,
            missing: self.gold_total as i64 - self.matched() as i64,
            spurious: self.spurious,
        }
    }
}

/// Tally outcomes for one document
pub fn match_document(gold: &AspectAnnotation, predicted: &AspectAnnotation) -> DocumentTally {
    let mut tally = DocumentTally {
        gold_total: gold.aspects.len(),
        ..Default::default()
    };

    for prediction in &predicted.aspects {
        tally.record(match_aspect(prediction, &gold.aspects));
    }

    tally
}

/// Score a batch of predicted annotations against gold annotations
///
/// Documents correspond pairwise by index. Per-document tallies are summed
/// and `missing` is derived once from the batch totals.
pub fn calculate_aspect_results(
    gold: &[AspectAnnotation],
    predicted: &[AspectAnnotation],
) -> Result<AspectBasedResults> {
    if gold.len() != predicted.len() {
        return Err(SentaError::ValidationError(format!(
            "gold and predicted annotations must have equal length: {} gold vs {} predicted",
            gold.len(),
            predicted.len()
        )));
    }

    let mut total = DocumentTally::default();
    for (g, p) in gold.iter().zip(predicted) {
        total.add(&match_document(g, p));
    }

    Ok(AspectBasedResults::from_counts(total.into_counts()))
}

// ============================================================================
// Ordinary Label Metrics
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct ClassCounts {
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
}

/// `numerator / denominator`, 0.0 on a zero denominator
fn ratio_or_zero(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1_or_zero(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Accuracy plus macro and micro precision, recall and F1 for document labels
///
/// Labels are lowercased before comparison. The class set is the union of
/// labels seen in either sequence. Any zero denominator contributes `0.0`,
/// so a class that is never predicted does not make the score undefined.
pub fn calculate_ordinary_results<T, P>(true_labels: &[T], predicted_labels: &[P]) -> Result<OrdinaryResults>
where
    T: AsRef<str>,
    P: AsRef<str>,
{
    if true_labels.len() != predicted_labels.len() {
        return Err(SentaError::ValidationError(format!(
            "lengths of true_labels and predicted_labels must be equal: {} vs {}",
            true_labels.len(),
            predicted_labels.len()
        )));
    }
    if true_labels.is_empty() {
        return Err(SentaError::ValidationError(
            "cannot score an empty set of labels".to_string(),
        ));
    }

    let truth: Vec<String> = true_labels.iter().map(|l| l.as_ref().to_lowercase()).collect();
    let predicted: Vec<String> = predicted_labels
        .iter()
        .map(|l| l.as_ref().to_lowercase())
        .collect();

    let classes: BTreeSet<&str> = truth
        .iter()
        .chain(predicted.iter())
        .map(String::as_str)
        .collect();
    let mut per_class: BTreeMap<&str, ClassCounts> =
        classes.iter().map(|c| (*c, ClassCounts::default())).collect();

    let mut hits = 0;
    for (t, p) in truth.iter().zip(&predicted) {
        if t == p {
            hits += 1;
            if let Some(counts) = per_class.get_mut(t.as_str()) {
                counts.true_positives += 1;
            }
        } else {
            if let Some(counts) = per_class.get_mut(p.as_str()) {
                counts.false_positives += 1;
            }
            if let Some(counts) = per_class.get_mut(t.as_str()) {
                counts.false_negatives += 1;
            }
        }
    }

    let n_classes = per_class.len() as f64;
    let (mut macro_precision, mut macro_recall, mut macro_f1) = (0.0, 0.0, 0.0);
    let (mut tp, mut fp, mut fn_) = (0, 0, 0);

    for counts in per_class.values() {
        let precision = ratio_or_zero(
            counts.true_positives,
            counts.true_positives + counts.false_positives,
        );
        let recall = ratio_or_zero(
            counts.true_positives,
            counts.true_positives + counts.false_negatives,
        );
        macro_precision += precision;
        macro_recall += recall;
        macro_f1 += f1_or_zero(precision, recall);

        tp += counts.true_positives;
        fp += counts.false_positives;
        fn_ += counts.false_negatives;
    }

    let micro_precision = ratio_or_zero(tp, tp + fp);
    let micro_recall = ratio_or_zero(tp, tp + fn_);

    Ok(OrdinaryResults {
        global_accuracy: hits as f64 / truth.len() as f64,
        macro_precision: macro_precision / n_classes,
        macro_recall: macro_recall / n_classes,
        macro_f1: macro_f1 / n_classes,
        micro_precision,
        micro_recall,
        micro_f1: f1_or_zero(micro_precision, micro_recall),
        name: None,
    })
}

// ============================================================================
// Tests
// ============================================================================
