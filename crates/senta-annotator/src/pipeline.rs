//! Pipeline composition and dispatch
//!
//! A [`Pipeline`] is either an extractor followed by a classifier or a
//! single extrassifier. Its shape is checked once, when it is built; after
//! that dispatch cannot meet an invalid combination.
//!
//! [`AspectAnnotator`] runs a pipeline over texts and scores it against gold
//! annotations. [`OverallAnnotator`] does the same for document-level tools.

use senta_core::{
    AspectAnnotation, AspectBasedResults, FailurePolicy, OrdinaryResults, Result, SentaError,
    SentimentAnnotation, TextBatch,
};
use tracing::{debug, info, warn};

use crate::gold::GoldData;
use crate::metrics::{calculate_aspect_results, calculate_ordinary_results};
use crate::{Classifier, Extractor, Extrassifier, OverallClassifier};

// ============================================================================
// Pipeline Stages
// ============================================================================

/// A tool tagged with the capability it provides
pub enum PipelineStage {
    Extractor(Box<dyn Extractor>),
    Classifier(Box<dyn Classifier>),
    Extrassifier(Box<dyn Extrassifier>),
}

impl PipelineStage {
    pub fn extractor(tool: impl Extractor + 'static) -> Self {
        Self::Extractor(Box::new(tool))
    }

    pub fn classifier(tool: impl Classifier + 'static) -> Self {
        Self::Classifier(Box::new(tool))
    }

    pub fn extrassifier(tool: impl Extrassifier + 'static) -> Self {
        Self::Extrassifier(Box::new(tool))
    }

    /// Capability provided by this stage
    pub fn capability(&self) -> &'static str {
        match self {
            Self::Extractor(_) => "Extractor",
            Self::Classifier(_) => "Classifier",
            Self::Extrassifier(_) => "Extrassifier",
        }
    }

    /// Name of the wrapped tool
    pub fn name(&self) -> &str {
        match self {
            Self::Extractor(tool) => tool.name(),
            Self::Classifier(tool) => tool.name(),
            Self::Extrassifier(tool) => tool.name(),
        }
    }

    fn describe(&self) -> String {
        format!("{} `{}`", self.capability(), self.name())
    }
}

impl std::fmt::Debug for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PipelineStage({})", self.describe())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// A validated aspect-based sentiment pipeline
pub enum Pipeline {
    TwoStage {
        extractor: Box<dyn Extractor>,
        classifier: Box<dyn Classifier>,
    },
    Fused {
        extrassifier: Box<dyn Extrassifier>,
    },
}

impl Pipeline {
    /// Extractor followed by classifier
    pub fn two_stage(
        extractor: impl Extractor + 'static,
        classifier: impl Classifier + 'static,
    ) -> Self {
        Self::TwoStage {
            extractor: Box::new(extractor),
            classifier: Box::new(classifier),
        }
    }

    /// Single tool that extracts and classifies
    pub fn fused(extrassifier: impl Extrassifier + 'static) -> Self {
        Self::Fused {
            extrassifier: Box::new(extrassifier),
        }
    }

    /// Build a pipeline from a list of stages
    ///
    /// Accepts `[Extractor, Classifier]` or `[Extrassifier]`. Any other
    /// length, order, or capability is rejected with an error naming the
    /// offending stage.
    pub fn from_stages(stages: Vec<PipelineStage>) -> Result<Self> {
        let count = stages.len();
        let mut stages = stages.into_iter();

        match (stages.next(), stages.next(), count) {
            (None, _, _) => Err(SentaError::InvalidPipeline(
                "pipeline is empty; expected [Extractor, Classifier] or [Extrassifier]"
                    .to_string(),
            )),
            (Some(PipelineStage::Extrassifier(extrassifier)), None, 1) => {
                Ok(Self::Fused { extrassifier })
            }
            (Some(other), None, 1) => Err(SentaError::InvalidPipeline(format!(
                "the only stage of a pipeline must be an Extrassifier, got {}",
                other.describe()
            ))),
            (
                Some(PipelineStage::Extractor(extractor)),
                Some(PipelineStage::Classifier(classifier)),
                2,
            ) => Ok(Self::TwoStage {
                extractor,
                classifier,
            }),
            (Some(PipelineStage::Extractor(_)), Some(second), 2) => {
                Err(SentaError::InvalidPipeline(format!(
                    "second stage of the pipeline must be a Classifier, got {}",
                    second.describe()
                )))
            }
            (Some(first), Some(_), 2) => Err(SentaError::InvalidPipeline(format!(
                "first stage of the pipeline must be an Extractor, got {}",
                first.describe()
            ))),
            _ => Err(SentaError::InvalidPipeline(format!(
                "pipeline longer than 2 stages is not allowed, got {count}"
            ))),
        }
    }

    /// Component tool names joined with ` + `
    pub fn name(&self) -> String {
        match self {
            Self::TwoStage {
                extractor,
                classifier,
            } => format!("{} + {}", extractor.name(), classifier.name()),
            Self::Fused { extrassifier } => extrassifier.name().to_string(),
        }
    }

    /// Run the pipeline on a batch of texts
    ///
    /// Every collaborator must return exactly one result per text.
    pub async fn run(&self, texts: &[String]) -> Result<Vec<AspectAnnotation>> {
        match self {
            Self::TwoStage {
                extractor,
                classifier,
            } => {
                let aspects = extractor.extract(texts).await?;
                ensure_aligned(extractor.name(), aspects.len(), texts.len())?;

                let annotations = classifier.classify(&aspects, texts).await?;
                ensure_aligned(classifier.name(), annotations.len(), texts.len())?;
                Ok(annotations)
            }
            Self::Fused { extrassifier } => {
                let annotations = extrassifier.classify(texts).await?;
                ensure_aligned(extrassifier.name(), annotations.len(), texts.len())?;
                Ok(annotations)
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pipeline({})", self.name())
    }
}

/// Reject collaborator output whose length does not match its input
fn ensure_aligned(tool: &str, returned: usize, expected: usize) -> Result<()> {
    if returned == expected {
        return Ok(());
    }
    Err(SentaError::CollaboratorOutput {
        document: returned.min(expected.saturating_sub(1)),
        message: format!("{tool} returned {returned} results for {expected} texts"),
    })
}

// ============================================================================
// Aspect Annotator
// ============================================================================

/// Runs an aspect-based pipeline and evaluates it against gold data
#[derive(Debug)]
pub struct AspectAnnotator {
    pipeline: Pipeline,
    failure_policy: FailurePolicy,
}

impl AspectAnnotator {
    /// Wrap a pipeline; collaborator failures abort the batch
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            failure_policy: FailurePolicy::Abort,
        }
    }

    /// Validate stages and wrap the resulting pipeline
    pub fn from_stages(stages: Vec<PipelineStage>) -> Result<Self> {
        Ok(Self::new(Pipeline::from_stages(stages)?))
    }

    /// Set how unusable collaborator output is handled during evaluation
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn name(&self) -> String {
        self.pipeline.name()
    }

    /// Annotate one text or a batch of texts
    ///
    /// Texts are dispatched one at a time in input order; the result has one
    /// annotation per text. Any collaborator failure aborts the call.
    pub async fn annotate(&self, texts: impl Into<TextBatch>) -> Result<Vec<AspectAnnotation>> {
        let texts = texts.into();
        info!(pipeline = %self.name(), documents = texts.len(), "annotating texts");

        let mut annotations = Vec::with_capacity(texts.len());
        for (index, text) in texts.as_slice().iter().enumerate() {
            annotations.push(self.annotate_document(index, text).await?);
        }
        Ok(annotations)
    }

    async fn annotate_document(&self, index: usize, text: &String) -> Result<AspectAnnotation> {
        debug!(document = index, chars = text.len(), "dispatching document");

        let mut annotations = self
            .pipeline
            .run(std::slice::from_ref(text))
            .await
            .map_err(|e| e.at_document(index))?;

        annotations.pop().ok_or_else(|| SentaError::CollaboratorOutput {
            document: index,
            message: "pipeline returned no annotation".to_string(),
        })
    }

    /// Run the pipeline on the gold texts and score the predictions
    ///
    /// Under [`FailurePolicy::Skip`] a document whose collaborator output is
    /// unusable is logged and left out of scoring on both sides.
    pub async fn test_annotator(&self, gold: impl Into<GoldData>) -> Result<AspectBasedResults> {
        let gold = gold.into().into_annotations()?;
        info!(
            pipeline = %self.name(),
            documents = gold.len(),
            policy = %self.failure_policy,
            "evaluating aspect annotator"
        );

        let mut scored_gold = Vec::with_capacity(gold.len());
        let mut predicted = Vec::with_capacity(gold.len());
        let mut skipped = 0usize;

        for (index, document) in gold.into_iter().enumerate() {
            match self.annotate_document(index, &document.text).await {
                Ok(annotation) => {
                    scored_gold.push(document);
                    predicted.push(annotation);
                }
                Err(e) if e.is_collaborator_failure() && self.failure_policy == FailurePolicy::Skip => {
                    warn!(document = index, error = %e, "skipping document");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if skipped > 0 {
            info!(skipped, "documents left out of scoring");
        }

        let results = self.calculate_results(&scored_gold, &predicted)?;
        info!(
            correct = results.correct(),
            incorrect = results.incorrect(),
            partial = results.partial(),
            missing = results.missing(),
            spurious = results.spurious(),
            precision = ?results.precision(),
            recall = ?results.recall(),
            "aspect evaluation finished"
        );
        Ok(results)
    }

    /// Score predictions against gold annotations, named after the pipeline
    pub fn calculate_results(
        &self,
        gold: &[AspectAnnotation],
        predicted: &[AspectAnnotation],
    ) -> Result<AspectBasedResults> {
        Ok(calculate_aspect_results(gold, predicted)?.with_name(self.name()))
    }
}

// ============================================================================
// Overall Annotator
// ============================================================================

/// Runs a document-level sentiment tool and evaluates it against gold labels
pub struct OverallAnnotator {
    tool: Box<dyn OverallClassifier>,
}

impl OverallAnnotator {
    pub fn new(tool: impl OverallClassifier + 'static) -> Self {
        Self {
            tool: Box::new(tool),
        }
    }

    pub fn from_boxed(tool: Box<dyn OverallClassifier>) -> Self {
        Self { tool }
    }

    pub fn name(&self) -> &str {
        self.tool.name()
    }

    /// Label one text or a batch of texts, one annotation per text
    pub async fn annotate(&self, texts: impl Into<TextBatch>) -> Result<Vec<SentimentAnnotation>> {
        let texts = texts.into();
        info!(tool = %self.name(), documents = texts.len(), "annotating texts");

        let annotations = self.tool.classify(texts.as_slice()).await?;
        ensure_aligned(self.name(), annotations.len(), texts.len())?;
        Ok(annotations)
    }

    /// Label `texts` and score against `true_labels`
    pub async fn test_annotator<S: AsRef<str>>(
        &self,
        texts: impl Into<TextBatch>,
        true_labels: &[S],
    ) -> Result<OrdinaryResults> {
        let texts = texts.into();
        if texts.len() != true_labels.len() {
            return Err(SentaError::ValidationError(format!(
                "got {} texts but {} true labels",
                texts.len(),
                true_labels.len()
            )));
        }

        let predicted: Vec<String> = self
            .annotate(texts)
            .await?
            .iter()
            .map(SentimentAnnotation::normalized_label)
            .collect();

        let results = self.calculate_results(true_labels, &predicted)?;
        info!(
            tool = %self.name(),
            accuracy = results.global_accuracy,
            macro_f1 = results.macro_f1,
            "overall evaluation finished"
        );
        Ok(results)
    }

    /// Score predicted labels against true labels, named after the tool
    pub fn calculate_results<T: AsRef<str>, P: AsRef<str>>(
        &self,
        true_labels: &[T],
        predicted_labels: &[P],
    ) -> Result<OrdinaryResults> {
        Ok(calculate_ordinary_results(true_labels, predicted_labels)?.with_name(self.name()))
    }
}

// ============================================================================
// Tests
// ============================================================================
