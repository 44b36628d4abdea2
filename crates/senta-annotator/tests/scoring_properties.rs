//! Property tests for aspect matching and label scoring

use proptest::prelude::*;
use senta_annotator::metrics::match_document;
use senta_annotator::{calculate_aspect_results, calculate_ordinary_results};
use senta_core::{AspectAnnotation, SentimentAnnotation};

const ASPECTS: &[&str] = &[
    "food",
    "service",
    "room service",
    "price",
    "battery",
    "battery life",
];
const LABELS: &[&str] = &["positive", "negative", "neutral", "Positive"];

fn annotation() -> impl Strategy<Value = SentimentAnnotation> {
    (prop::sample::select(ASPECTS), prop::sample::select(LABELS))
        .prop_map(|(aspect, label)| SentimentAnnotation::new(aspect, label))
}

fn document() -> impl Strategy<Value = AspectAnnotation> {
    prop::collection::vec(annotation(), 0..5)
        .prop_map(|aspects| AspectAnnotation::new("review", aspects))
}

/// Document whose aspect texts are all distinct
fn distinct_document() -> impl Strategy<Value = AspectAnnotation> {
    (
        prop::sample::subsequence(ASPECTS, 0..=ASPECTS.len()),
        prop::collection::vec(prop::sample::select(LABELS), ASPECTS.len()),
    )
        .prop_map(|(aspects, labels)| {
            AspectAnnotation::new(
                "review",
                aspects
                    .into_iter()
                    .zip(labels)
                    .map(|(aspect, label)| SentimentAnnotation::new(aspect, label))
                    .collect(),
            )
        })
}

fn paired_batches() -> impl Strategy<Value = (Vec<AspectAnnotation>, Vec<AspectAnnotation>)> {
    prop::collection::vec((document(), document()), 0..8).prop_map(
        |pairs| -> (Vec<AspectAnnotation>, Vec<AspectAnnotation>) { pairs.into_iter().unzip() },
    )
}

proptest! {
    /// Every prediction lands in exactly one outcome.
    #[test]
    fn predicted_total_is_conserved((gold, predicted) in paired_batches()) {
        let results = calculate_aspect_results(&gold, &predicted).unwrap();
        let predicted_total: usize = predicted.iter().map(|d| d.aspects.len()).sum();

        prop_assert_eq!(
            results.correct() + results.incorrect() + results.partial() + results.spurious(),
            predicted_total
        );
        prop_assert_eq!(results.actual(), predicted_total);
    }

    /// Correct, incorrect, partial and missing add up to the gold total.
    #[test]
    fn gold_total_is_conserved((gold, predicted) in paired_batches()) {
        let results = calculate_aspect_results(&gold, &predicted).unwrap();
        let gold_total: usize = gold.iter().map(|d| d.aspects.len()).sum();
        let matched = results.correct() + results.incorrect() + results.partial();

        prop_assert_eq!(matched as i64 + results.missing(), gold_total as i64);
        prop_assert_eq!(results.possible(), gold_total as i64);
    }

    /// Predicting distinct gold aspects back yields no errors of any kind.
    #[test]
    fn gold_against_itself_is_all_correct(gold in prop::collection::vec(distinct_document(), 0..8)) {
        let results = calculate_aspect_results(&gold, &gold).unwrap();

        prop_assert_eq!(results.incorrect() + results.partial() + results.spurious(), 0);
        prop_assert_eq!(results.missing(), 0);
    }

    /// Scoring a batch equals summing per-document tallies.
    #[test]
    fn batch_is_sum_of_documents((gold, predicted) in paired_batches()) {
        let results = calculate_aspect_results(&gold, &predicted).unwrap();
        let correct: usize = gold
            .iter()
            .zip(&predicted)
            .map(|(g, p)| match_document(g, p).correct)
            .sum();

        prop_assert_eq!(results.correct(), correct);
    }

    /// Ordinary metrics stay within [0, 1] and accuracy matches a direct count.
    #[test]
    fn ordinary_metrics_are_bounded(
        pairs in prop::collection::vec(
            (prop::sample::select(LABELS), prop::sample::select(LABELS)),
            1..30,
        )
    ) {
        let (truth, predicted): (Vec<&str>, Vec<&str>) = pairs.iter().copied().unzip();
        let results = calculate_ordinary_results(&truth, &predicted).unwrap();

        let hits = pairs
            .iter()
            .filter(|(t, p)| t.to_lowercase() == p.to_lowercase())
            .count();
        prop_assert!((results.global_accuracy - hits as f64 / pairs.len() as f64).abs() < 1e-9);

        for value in [
            results.macro_precision,
            results.macro_recall,
            results.macro_f1,
            results.micro_precision,
            results.micro_recall,
            results.micro_f1,
        ] {
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }
}
