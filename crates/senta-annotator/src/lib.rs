//! Senta Annotator - Aspect-based sentiment pipelines and evaluation
//!
//! Defines the capability traits every sentiment tool implements, composes
//! them into pipelines, and scores pipeline output against gold annotations.
//!
//! Two pipeline shapes are supported:
//! - an [`Extractor`] followed by a [`Classifier`]
//! - a single [`Extrassifier`] that extracts and classifies in one step
//!
//! Document-level tools implement [`OverallClassifier`] and are wrapped by
//! [`OverallAnnotator`].

use async_trait::async_trait;

use senta_core::{AspectAnnotation, ExtractedAspect, Result, SentaError, SentimentAnnotation};

pub mod gold;
pub mod lexicon;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod report;

pub use gold::{read_annotations_json, GoldColumns, GoldData, GoldTable};
pub use lexicon::{DictionaryExtractor, Lexicon, LexiconAnnotator, LexiconClassifier};
pub use llm::{LlmExtractor, LlmExtrassifier, LlmOverallAnnotator};
pub use metrics::{calculate_aspect_results, calculate_ordinary_results, MatchOutcome};
pub use pipeline::{AspectAnnotator, OverallAnnotator, Pipeline, PipelineStage};
pub use report::{concat_results, transform_output, EvaluationResults, OutputRow, ResultsTable};

// ============================================================================
// Capability Traits
// ============================================================================

/// Locates aspects in texts without labeling sentiment
#[async_trait]
pub trait Extractor: Send + Sync {
    /// One list of aspects per input text, aligned by index
    async fn extract(&self, texts: &[String]) -> Result<Vec<Vec<ExtractedAspect>>>;

    /// Name used when reporting results
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }
}

/// Assigns sentiment to already-extracted aspects
#[async_trait]
pub trait Classifier: Send + Sync {
    /// One annotation per input text; `aspects` and `texts` have equal length
    async fn classify(
        &self,
        aspects: &[Vec<ExtractedAspect>],
        texts: &[String],
    ) -> Result<Vec<AspectAnnotation>>;

    fn name(&self) -> &str {
        short_type_name::<Self>()
    }
}

/// Extracts aspects and assigns sentiment in one step
#[async_trait]
pub trait Extrassifier: Send + Sync {
    async fn classify(&self, texts: &[String]) -> Result<Vec<AspectAnnotation>>;

    fn name(&self) -> &str {
        short_type_name::<Self>()
    }
}

/// Assigns one sentiment label to each whole text
#[async_trait]
pub trait OverallClassifier: Send + Sync {
    async fn classify(&self, texts: &[String]) -> Result<Vec<SentimentAnnotation>>;

    fn name(&self) -> &str {
        short_type_name::<Self>()
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Last path segment of a type name without generic arguments,
/// e.g. `LexiconClassifier`
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

/// Validate classifier arguments before any processing
pub fn check_classifier_arguments(aspects: &[Vec<ExtractedAspect>], texts: &[String]) -> Result<()> {
    if aspects.len() != texts.len() {
        return Err(SentaError::ValidationError(format!(
            "aspects must be of the same length as the texts: got {} aspect lists for {} texts",
            aspects.len(),
            texts.len()
        )));
    }
    Ok(())
}

/// Map an integer sentiment class to its label
///
/// 0 → `positive`, 1 → `negative`, 2 → `neutral`.
pub fn map_sentiment(sentiment: usize) -> Option<&'static str> {
    match sentiment {
        0 => Some("positive"),
        1 => Some("negative"),
        2 => Some("neutral"),
        _ => None,
    }
}

/// Context for an aspect: the aspect plus up to `n_neighbors` words on
/// each side
///
/// Apostrophes split words. Words are compared with surrounding
/// punctuation stripped. Falls back to the whole text when the aspect does
/// not occur as a word sequence.
pub fn context_window(aspect: &str, full_text: &str, n_neighbors: usize) -> String {
    let normalized = full_text.replace('\'', " ");
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let target: Vec<&str> = aspect.split_whitespace().collect();

    if target.is_empty() || target.len() > words.len() {
        return full_text.to_string();
    }

    let strip = |w: &str| -> String {
        w.trim_matches(|c: char| c.is_ascii_punctuation())
            .to_lowercase()
    };
    let target: Vec<String> = target.iter().map(|w| strip(*w)).collect();

    let position = words
        .windows(target.len())
        .position(|window| window.iter().zip(&target).all(|(w, t)| strip(*w) == *t));

    match position {
        Some(start) => {
            let from = start.saturating_sub(n_neighbors);
            let to = (start + target.len() + n_neighbors).min(words.len());
            words[from..to].join(" ")
        }
        None => full_text.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
