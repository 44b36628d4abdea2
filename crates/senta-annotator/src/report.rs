//! Result tables and output flattening
//!
//! Collects evaluation results from several tools into one long-format
//! table, and flattens predicted annotations into one row per aspect.

use senta_core::{AspectAnnotation, AspectBasedResults, OrdinaryResults, Result, ResultRow, SentaError};
use serde::{Deserialize, Serialize};

// ============================================================================
// Results Table
// ============================================================================

/// Either kind of evaluation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationResults {
    Ordinary(OrdinaryResults),
    AspectBased(AspectBasedResults),
}

impl EvaluationResults {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ordinary(_) => "ordinary",
            Self::AspectBased(_) => "aspect-based",
        }
    }

    pub fn to_rows(&self) -> Vec<ResultRow> {
        match self {
            Self::Ordinary(results) => results.to_rows(),
            Self::AspectBased(results) => results.to_rows(),
        }
    }

    pub fn report(&self) -> String {
        match self {
            Self::Ordinary(results) => results.report(),
            Self::AspectBased(results) => results.report(),
        }
    }
}

impl From<OrdinaryResults> for EvaluationResults {
    fn from(results: OrdinaryResults) -> Self {
        Self::Ordinary(results)
    }
}

impl From<AspectBasedResults> for EvaluationResults {
    fn from(results: AspectBasedResults) -> Self {
        Self::AspectBased(results)
    }
}

/// Long-format table of `(statistic, value, name)` rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub rows: Vec<ResultRow>,
}

impl ResultsTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as a markdown table
    pub fn to_markdown(&self) -> String {
        let mut md = String::from("| name | statistic | value |\n|---|---|---|\n");
        for row in &self.rows {
            let value = row
                .value
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "undefined".to_string());
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                row.name.as_deref().unwrap_or(""),
                row.statistic,
                value
            ));
        }
        md
    }
}

/// Stack the rows of several results of the same kind
pub fn concat_results<R>(results: &[R]) -> Result<ResultsTable>
where
    R: Clone + Into<EvaluationResults>,
{
    let results: Vec<EvaluationResults> = results.iter().cloned().map(Into::into).collect();

    if let Some(first) = results.first() {
        if let Some(other) = results.iter().find(|r| r.kind() != first.kind()) {
            return Err(SentaError::ValidationError(format!(
                "all results must be the same kind: found {} and {}",
                first.kind(),
                other.kind()
            )));
        }
    }

    Ok(ResultsTable {
        rows: results.iter().flat_map(EvaluationResults::to_rows).collect(),
    })
}

// ============================================================================
// Output Rows
// ============================================================================

/// One predicted aspect of one review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub review: String,
    pub aspect: String,
    /// Lowercased label
    pub label: String,
}

/// Flatten annotations into one row per predicted aspect
///
/// Reviews without aspects produce no rows.
pub fn transform_output<S: AsRef<str>>(
    reviews: &[S],
    annotations: &[AspectAnnotation],
) -> Result<Vec<OutputRow>> {
    if reviews.len() != annotations.len() {
        return Err(SentaError::ValidationError(format!(
            "got {} reviews but {} annotations",
            reviews.len(),
            annotations.len()
        )));
    }

    Ok(reviews
        .iter()
        .zip(annotations)
        .flat_map(|(review, annotation)| {
            annotation.aspects.iter().map(move |aspect| OutputRow {
                review: review.as_ref().to_string(),
                aspect: aspect.text.clone(),
                label: aspect.normalized_label(),
            })
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
