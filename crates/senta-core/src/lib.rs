//! Senta Core - Annotation models, errors, and shared traits
//!
//! This crate defines the value types shared by every senta component:
//! - Annotation models (extracted aspects, sentiment spans, document annotations)
//! - Evaluation result aggregates (ordinary and aspect-based)
//! - Common error types
//! - The LLM client trait used by remote collaborators
//! - Configuration management

pub mod config;
pub mod results;

pub use config::{
    AnnotatorConfig, AppConfig, ConfigError, FailurePolicy, LlmConfig, LlmProvider,
    LoggingConfig,
};
pub use results::{AspectBasedResults, AspectCounts, OrdinaryResults, ResultRow};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for senta operations
#[derive(Error, Debug)]
pub enum SentaError {
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Collaborator produced unparsable output for document {document}: {message}")]
    CollaboratorOutput { document: usize, message: String },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Table error: {0}")]
    TableError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SentaError {
    /// Shift the document index of a collaborator failure.
    ///
    /// Collaborators report indices relative to the slice they were given;
    /// the dispatcher calls them one document at a time and rebases the
    /// index onto the whole batch.
    pub fn at_document(self, offset: usize) -> Self {
        match self {
            Self::CollaboratorOutput { document, message } => Self::CollaboratorOutput {
                document: document + offset,
                message,
            },
            other => other,
        }
    }

    /// Whether this error came from a collaborator's output rather than
    /// from configuration or arguments
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, Self::CollaboratorOutput { .. })
    }
}

impl From<ConfigError> for SentaError {
    fn from(e: ConfigError) -> Self {
        Self::ConfigError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SentaError>;

// ============================================================================
// Annotation Models
// ============================================================================

/// Output of an aspect extractor: an aspect keyword and its context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedAspect {
    /// Keyword or phrase identifying the aspect
    pub aspect: String,

    /// Chunk of the document surrounding the aspect
    pub text: String,
}

impl ExtractedAspect {
    pub fn new(aspect: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            aspect: aspect.into(),
            text: text.into(),
        }
    }
}

/// A single labeled span: an aspect keyword or a whole document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnnotation {
    /// Labeled string
    pub text: String,

    /// Sentiment label, e.g. `positive`, `negative`, `neutral`
    pub label: String,

    /// Tool-defined confidence; absent when the tool provides none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SentimentAnnotation {
    /// Create an annotation without a score
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
            score: None,
        }
    }

    /// Attach a confidence score
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Label lowercased for comparison
    pub fn normalized_label(&self) -> String {
        self.label.to_lowercase()
    }
}

/// All aspect annotations for one document
///
/// Gold and predicted annotations share this shape so they can be
/// compared symmetrically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectAnnotation {
    /// Original document
    pub text: String,

    /// One annotation per discovered aspect, in discovery order
    #[serde(default)]
    pub aspects: Vec<SentimentAnnotation>,
}

impl AspectAnnotation {
    pub fn new(text: impl Into<String>, aspects: Vec<SentimentAnnotation>) -> Self {
        Self {
            text: text.into(),
            aspects,
        }
    }

    /// Document with no aspects
    pub fn empty(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }
}

// ============================================================================
// Text Batches
// ============================================================================

/// Input texts for an annotation run
///
/// Accepts either a single string or a sequence of strings; a single string
/// becomes a batch of one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBatch(Vec<String>);

impl TextBatch {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for TextBatch {
    fn from(text: &str) -> Self {
        Self(vec![text.to_string()])
    }
}

impl From<String> for TextBatch {
    fn from(text: String) -> Self {
        Self(vec![text])
    }
}

impl From<Vec<String>> for TextBatch {
    fn from(texts: Vec<String>) -> Self {
        Self(texts)
    }
}

impl From<Vec<&str>> for TextBatch {
    fn from(texts: Vec<&str>) -> Self {
        Self(texts.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for TextBatch {
    fn from(texts: &[String]) -> Self {
        Self(texts.to_vec())
    }
}

impl From<&[&str]> for TextBatch {
    fn from(texts: &[&str]) -> Self {
        Self(texts.iter().map(|t| t.to_string()).collect())
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for LLM clients used by remote collaborators
///
/// A call may block for as long as the provider takes to answer; callers
/// impose no timeout beyond the client's own.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single prompt and return the reply text
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoClient;

    #[async_trait::async_trait]
    impl LlmClient for EchoClient {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("echo: {prompt}"))
        }
    }

    #[test]
    fn test_text_batch_from_single_string() {
        let batch = TextBatch::from("The pizza was great");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.as_slice()[0], "The pizza was great");
    }

    #[test]
    fn test_text_batch_from_sequence() {
        let batch = TextBatch::from(vec!["one", "two"]);
        assert_eq!(batch.into_inner(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_sentiment_annotation_score_is_optional() {
        let plain = SentimentAnnotation::new("pizza", "Positive");
        assert!(plain.score.is_none());
        assert_eq!(plain.normalized_label(), "positive");

        let scored = plain.with_score(0.75);
        assert_eq!(scored.score, Some(0.75));
    }

    #[test]
    fn test_aspect_annotation_deserializes_without_scores() {
        let json = r#"{"text": "Food ok", "aspects": [{"text": "Food", "label": "neutral"}]}"#;
        let annotation: AspectAnnotation = serde_json::from_str(json).unwrap();

        assert_eq!(annotation.aspects.len(), 1);
        assert_eq!(annotation.aspects[0].score, None);
    }

    #[test]
    fn test_error_rebased_to_batch_index() {
        let err = SentaError::CollaboratorOutput {
            document: 0,
            message: "no Label line".to_string(),
        }
        .at_document(7);

        assert!(err.is_collaborator_failure());
        assert!(err.to_string().contains("document 7"));
    }

    #[test]
    fn test_non_collaborator_error_not_rebased() {
        let err = SentaError::ValidationError("bad".to_string()).at_document(3);
        assert!(!err.is_collaborator_failure());
        assert_eq!(err.to_string(), "Validation error: bad");
    }

    #[test]
    fn test_llm_client_object_safe() {
        let client: Box<dyn LlmClient> = Box::new(EchoClient);
        let reply = tokio_test::block_on(client.generate("hi")).unwrap();
        assert_eq!(reply, "echo: hi");
    }
}
