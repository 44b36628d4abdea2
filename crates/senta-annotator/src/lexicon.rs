//! Lexicon-based sentiment tools
//!
//! Local tools that need no model or network access:
//! - [`DictionaryExtractor`] finds configured aspect terms in a text
//! - [`LexiconClassifier`] labels each aspect from the words around it
//! - [`LexiconAnnotator`] labels whole texts
//!
//! Scores are the sum of signed word weights. A negator flips the sign of
//! the next sentiment word. The label is trinary: positive, negative or
//! neutral.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use regex::Regex;
use senta_core::{
    AspectAnnotation, ExtractedAspect, Result, SentaError, SentimentAnnotation,
};
use tracing::debug;

use crate::{check_classifier_arguments, context_window, map_sentiment};
use crate::{Classifier, Extractor, OverallClassifier};

const DEFAULT_CONTEXT_WINDOW: usize = 4;

// ============================================================================
// Lexicon
// ============================================================================

/// Signed word weights plus negation words
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    weights: HashMap<String, f64>,
    negators: HashSet<String>,
}

impl Lexicon {
    /// Empty lexicon
    pub fn new() -> Self {
        Self::default()
    }

    /// Small general-purpose English lexicon for reviews
    pub fn english() -> Self {
        let mut lexicon = Self::new();

        for (word, weight) in [
            ("good", 2.0),
            ("great", 3.0),
            ("excellent", 4.0),
            ("amazing", 4.0),
            ("wonderful", 4.0),
            ("perfect", 4.0),
            ("best", 3.0),
            ("delicious", 3.0),
            ("tasty", 2.0),
            ("fresh", 2.0),
            ("friendly", 2.0),
            ("kind", 2.0),
            ("helpful", 2.0),
            ("nice", 2.0),
            ("pleasant", 2.0),
            ("clean", 2.0),
            ("comfortable", 2.0),
            ("cozy", 2.0),
            ("fast", 1.0),
            ("quick", 1.0),
            ("cheap", 1.0),
            ("happy", 2.0),
            ("love", 3.0),
            ("loved", 3.0),
            ("like", 1.0),
            ("liked", 1.0),
            ("enjoy", 2.0),
            ("enjoyed", 2.0),
            ("recommend", 2.0),
            ("bad", -2.0),
            ("poor", -2.0),
            ("terrible", -4.0),
            ("awful", -4.0),
            ("horrible", -4.0),
            ("worst", -4.0),
            ("disgusting", -4.0),
            ("rude", -3.0),
            ("unfriendly", -2.0),
            ("slow", -1.0),
            ("cold", -1.0),
            ("dirty", -2.0),
            ("bland", -2.0),
            ("stale", -2.0),
            ("noisy", -1.0),
            ("broken", -2.0),
            ("boring", -2.0),
            ("expensive", -1.0),
            ("overpriced", -2.0),
            ("disappointing", -3.0),
            ("disappointed", -3.0),
            ("hate", -3.0),
            ("hated", -3.0),
        ] {
            lexicon.weights.insert(word.to_string(), weight);
        }

        // Contractions appear both whole and split at the apostrophe
        for word in [
            "not", "no", "never", "nor", "neither", "hardly", "without", "nothing", "don't",
            "doesn't", "didn't", "isn't", "wasn't", "aren't", "weren't", "won't", "wouldn't",
            "can't", "couldn't", "don", "doesn", "didn", "isn", "wasn", "aren", "weren",
            "wouldn", "couldn",
        ] {
            lexicon.negators.insert(word.to_string());
        }

        lexicon
    }

    /// Add or replace a word weight
    pub fn with_term(mut self, word: &str, weight: f64) -> Self {
        self.weights.insert(word.to_lowercase(), weight);
        self
    }

    pub fn with_negator(mut self, word: &str) -> Self {
        self.negators.insert(word.to_lowercase());
        self
    }

    pub fn weight(&self, word: &str) -> Option<f64> {
        self.weights.get(&word.to_lowercase()).copied()
    }

    /// Sum of word weights in `text`
    pub fn score(&self, text: &str) -> f64 {
        let mut total = 0.0;
        let mut negate = false;

        for token in tokenize(text) {
            if self.negators.contains(&token) {
                negate = true;
                continue;
            }
            if let Some(weight) = self.weights.get(&token) {
                total += if negate { -weight } else { *weight };
                negate = false;
            }
        }

        total
    }

    /// Trinary label and raw score for `text`
    pub fn annotate(&self, text: &str) -> (&'static str, f64) {
        let score = self.score(text);
        (polarity(score), score)
    }
}

/// Lowercased word tokens; apostrophes stay inside words
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn polarity(score: f64) -> &'static str {
    let class = if score > 0.0 {
        0
    } else if score < 0.0 {
        1
    } else {
        2
    };
    map_sentiment(class).unwrap_or("neutral")
}

// ============================================================================
// Dictionary Extractor
// ============================================================================

/// Finds configured aspect terms, case-insensitively and as whole words
///
/// Each term is reported at most once per text, at its first occurrence,
/// in order of appearance. The aspect keeps the casing used in the text.
#[derive(Debug, Clone)]
pub struct DictionaryExtractor {
    terms: Vec<(String, Regex)>,
    context_window: usize,
}

impl DictionaryExtractor {
    pub fn new<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut compiled = Vec::new();
        for term in terms {
            let term = term.into();
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            let regex = Regex::new(&term_pattern(term))
                .map_err(|e| SentaError::ConfigError(format!("invalid aspect term `{term}`: {e}")))?;
            compiled.push((term.to_string(), regex));
        }

        if compiled.is_empty() {
            return Err(SentaError::ConfigError(
                "dictionary extractor needs at least one aspect term".to_string(),
            ));
        }

        Ok(Self {
            terms: compiled,
            context_window: DEFAULT_CONTEXT_WINDOW,
        })
    }

    /// Words kept on each side of an aspect
    pub fn with_context_window(mut self, n_neighbors: usize) -> Self {
        self.context_window = n_neighbors;
        self
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(term, _)| term.as_str())
    }

    fn extract_one(&self, text: &str) -> Vec<ExtractedAspect> {
        let mut found: Vec<(usize, &str)> = self
            .terms
            .iter()
            .filter_map(|(_, regex)| regex.find(text))
            .map(|m| (m.start(), m.as_str()))
            .collect();
        found.sort_by_key(|(start, _)| *start);

        let mut seen = HashSet::new();
        found
            .into_iter()
            .filter(|(_, aspect)| seen.insert(aspect.to_lowercase()))
            .map(|(_, aspect)| {
                ExtractedAspect::new(aspect, context_window(aspect, text, self.context_window))
            })
            .collect()
    }
}

/// Case-insensitive pattern for a term, anchored at word boundaries only on
/// edges that are word characters (so `c++` and `.net` still match)
fn term_pattern(term: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let boundary = |edge: Option<char>| if edge.is_some_and(is_word) { r"\b" } else { "" };

    format!(
        "(?i){}{}{}",
        boundary(term.chars().next()),
        regex::escape(term),
        boundary(term.chars().next_back())
    )
}

#[async_trait]
impl Extractor for DictionaryExtractor {
    async fn extract(&self, texts: &[String]) -> Result<Vec<Vec<ExtractedAspect>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let aspects = self.extract_one(text);
                debug!(aspects = aspects.len(), "dictionary extraction");
                aspects
            })
            .collect())
    }
}

// ============================================================================
// Lexicon Classifier
// ============================================================================

/// Labels each aspect from the lexicon score of its context chunk
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    lexicon: Lexicon,
}

impl LexiconClassifier {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new(Lexicon::english())
    }
}

#[async_trait]
impl Classifier for LexiconClassifier {
    async fn classify(
        &self,
        aspects: &[Vec<ExtractedAspect>],
        texts: &[String],
    ) -> Result<Vec<AspectAnnotation>> {
        check_classifier_arguments(aspects, texts)?;

        Ok(aspects
            .iter()
            .zip(texts)
            .map(|(found, text)| {
                let labeled = found
                    .iter()
                    .map(|aspect| {
                        let (label, score) = self.lexicon.annotate(&aspect.text);
                        SentimentAnnotation::new(aspect.aspect.as_str(), label).with_score(score)
                    })
                    .collect();
                AspectAnnotation::new(text.as_str(), labeled)
            })
            .collect())
    }
}

// ============================================================================
// Lexicon Annotator
// ============================================================================

/// Labels whole texts with the lexicon
#[derive(Debug, Clone)]
pub struct LexiconAnnotator {
    lexicon: Lexicon,
}

impl LexiconAnnotator {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }
}

impl Default for LexiconAnnotator {
    fn default() -> Self {
        Self::new(Lexicon::english())
    }
}

#[async_trait]
impl OverallClassifier for LexiconAnnotator {
    async fn classify(&self, texts: &[String]) -> Result<Vec<SentimentAnnotation>> {
        Ok(texts
            .iter()
            .map(|text| {
                let (label, score) = self.lexicon.annotate(text);
                SentimentAnnotation::new(text.as_str(), label).with_score(score)
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
