//! Pipeline Integration Tests
//!
//! Runs complete pipelines built from the in-tree tools and scripted fakes
//! against gold data in both accepted shapes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use senta_annotator::{
    AspectAnnotator, DictionaryExtractor, Extractor, Extrassifier, GoldColumns, GoldData,
    GoldTable, LexiconAnnotator, LexiconClassifier, OverallAnnotator, Pipeline, PipelineStage,
};
use senta_core::{
    AspectAnnotation, ExtractedAspect, FailurePolicy, Result, SentaError, SentimentAnnotation,
};

/// Helper to build gold annotations from (text, [(aspect, label)])
fn gold(documents: &[(&str, &[(&str, &str)])]) -> Vec<AspectAnnotation> {
    documents
        .iter()
        .map(|(text, aspects)| {
            AspectAnnotation::new(
                *text,
                aspects
                    .iter()
                    .map(|(aspect, label)| SentimentAnnotation::new(*aspect, *label))
                    .collect(),
            )
        })
        .collect()
}

fn restaurant_gold() -> Vec<AspectAnnotation> {
    gold(&[
        (
            "The pizza was delicious but the waiter was rude",
            &[("pizza", "positive"), ("waiter", "negative")],
        ),
        ("Great coffee", &[("coffee", "Positive")]),
        ("Nice view", &[("view", "positive")]),
    ])
}

fn dictionary() -> DictionaryExtractor {
    DictionaryExtractor::new(["pizza", "waiter", "coffee", "price"])
        .unwrap()
        .with_context_window(2)
}

// =============================================================================
// Pipeline Shape Tests
// =============================================================================

struct CountingExtractor {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Extractor for CountingExtractor {
    async fn extract(&self, texts: &[String]) -> Result<Vec<Vec<ExtractedAspect>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Vec::new(); texts.len()])
    }
}

#[test]
fn test_three_stage_pipeline_rejected_before_processing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let err = AspectAnnotator::from_stages(vec![
        PipelineStage::extractor(CountingExtractor {
            calls: calls.clone(),
        }),
        PipelineStage::classifier(LexiconClassifier::default()),
        PipelineStage::classifier(LexiconClassifier::default()),
    ])
    .unwrap_err();

    assert!(matches!(err, SentaError::InvalidPipeline(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_wrong_capability_rejected_with_position() {
    let err = AspectAnnotator::from_stages(vec![
        PipelineStage::classifier(LexiconClassifier::default()),
        PipelineStage::extractor(dictionary()),
    ])
    .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("first stage"));
    assert!(message.contains("Classifier `LexiconClassifier`"));
}

// =============================================================================
// End-to-end Evaluation Tests
// =============================================================================

#[tokio::test]
async fn test_dictionary_lexicon_pipeline_end_to_end() {
    let annotator = AspectAnnotator::new(Pipeline::two_stage(
        dictionary(),
        LexiconClassifier::default(),
    ));

    let results = annotator.test_annotator(restaurant_gold()).await.unwrap();

    assert_eq!(results.name(), Some("DictionaryExtractor + LexiconClassifier"));
    assert_eq!(results.correct(), 3);
    assert_eq!(results.missing(), 1);
    assert_eq!(results.spurious(), 0);
    assert_eq!(results.precision(), Some(1.0));
    assert_eq!(results.recall(), Some(0.75));
}

#[tokio::test]
async fn test_table_gold_matches_annotation_gold() {
    let headers = vec!["id", "review", "aspect", "label"];
    let rows = vec![
        vec!["1", "The pizza was delicious but the waiter was rude", "pizza", "positive"],
        vec!["1", "The pizza was delicious but the waiter was rude", "waiter", "negative"],
        vec!["2", "Great coffee", "coffee", "Positive"],
        vec!["3", "Nice view", "view", "positive"],
    ];
    let table = GoldTable::new(
        headers.into_iter().map(str::to_string).collect(),
        rows.into_iter()
            .map(|row| row.into_iter().map(str::to_string).collect())
            .collect(),
    );

    let annotator = AspectAnnotator::new(Pipeline::two_stage(
        dictionary(),
        LexiconClassifier::default(),
    ));
    let from_table = annotator
        .test_annotator(GoldData::table(
            table,
            GoldColumns::named("id", "review", "aspect", "label"),
        ))
        .await
        .unwrap();
    let from_annotations = annotator.test_annotator(restaurant_gold()).await.unwrap();

    assert_eq!(from_table, from_annotations);
}

#[tokio::test]
async fn test_missing_column_named_in_error() {
    let table = GoldTable::new(
        vec!["id".to_string(), "review".to_string(), "aspect".to_string()],
        Vec::new(),
    );
    let annotator = AspectAnnotator::new(Pipeline::two_stage(
        dictionary(),
        LexiconClassifier::default(),
    ));

    let err = annotator
        .test_annotator(GoldData::table(
            table,
            GoldColumns::named("id", "review", "aspect", "sentiment"),
        ))
        .await
        .unwrap_err();

    match err {
        SentaError::MissingColumn { column } => assert_eq!(column, "sentiment"),
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// Failure Policy Tests
// =============================================================================

/// Answers `food: positive` except for texts containing "garbled"
struct FlakyExtrassifier;

#[async_trait]
impl Extrassifier for FlakyExtrassifier {
    async fn classify(&self, texts: &[String]) -> Result<Vec<AspectAnnotation>> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| {
                if text.contains("garbled") {
                    Err(SentaError::CollaboratorOutput {
                        document: index,
                        message: "no Label line".to_string(),
                    })
                } else {
                    Ok(AspectAnnotation::new(
                        text.as_str(),
                        vec![SentimentAnnotation::new("food", "positive")],
                    ))
                }
            })
            .collect()
    }
}

fn flaky_gold() -> Vec<AspectAnnotation> {
    gold(&[
        ("food ok", &[("food", "positive")]),
        ("garbled", &[("food", "negative")]),
        ("food good", &[("food", "positive")]),
    ])
}

#[tokio::test]
async fn test_abort_policy_reports_batch_index() {
    let annotator = AspectAnnotator::new(Pipeline::fused(FlakyExtrassifier));
    let err = annotator.test_annotator(flaky_gold()).await.unwrap_err();

    assert!(err.is_collaborator_failure());
    assert!(err.to_string().contains("document 1"));
}

#[tokio::test]
async fn test_skip_policy_excludes_document_from_scoring() {
    let annotator = AspectAnnotator::new(Pipeline::fused(FlakyExtrassifier))
        .with_failure_policy(FailurePolicy::Skip);
    let results = annotator.test_annotator(flaky_gold()).await.unwrap();

    assert_eq!(results.correct(), 2);
    assert_eq!(results.incorrect(), 0);
    assert_eq!(results.missing(), 0);
    assert_eq!(results.possible(), 2);
}

#[tokio::test]
async fn test_annotate_always_aborts() {
    let annotator = AspectAnnotator::new(Pipeline::fused(FlakyExtrassifier))
        .with_failure_policy(FailurePolicy::Skip);
    let err = annotator
        .annotate(vec!["food ok", "food fine", "garbled"])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("document 2"));
}

// =============================================================================
// Overall Annotation Tests
// =============================================================================

#[tokio::test]
async fn test_overall_lexicon_accuracy() {
    let annotator = OverallAnnotator::new(LexiconAnnotator::default());
    let results = annotator
        .test_annotator(
            vec!["I loved the food", "Terrible service", "It was a Tuesday"],
            &["Positive", "negative", "positive"],
        )
        .await
        .unwrap();

    assert!((results.global_accuracy - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(results.name.as_deref(), Some("LexiconAnnotator"));
}
