//! LLM-backed sentiment tools
//!
//! Each tool sends one prompt per text through an [`LlmClient`] and parses a
//! line-oriented reply:
//!
//! ```text
//! Aspect: <aspect>          Aspect: <aspect>          Label: <label>
//! Chunk: <text chunk>       Label: <label>            Score: <score>
//!                           Score: <score>
//! ```
//!
//! Aspect replies hold one block per aspect, blocks separated by a blank
//! line. A reply that does not follow its format is reported as a
//! collaborator failure for that document.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use senta_core::{
    AnnotatorConfig, AspectAnnotation, ExtractedAspect, LlmClient, Result, SentaError,
    SentimentAnnotation,
};
use tracing::{debug, warn};

use crate::{Extractor, Extrassifier, OverallClassifier};

const DEFAULT_MAX_CHARS: usize = 1000;

// ============================================================================
// Prompts
// ============================================================================

/// Prompt asking for distinct aspects and the chunk describing each
pub fn extraction_prompt(text: &str) -> String {
    format!(
        "List the distinct aspects of the text below that can be used for aspect-based \
         sentiment analysis. Aspects must not repeat and must use the exact words of the \
         text, at most 3 words each. For every aspect give the chunk of the text that \
         describes it.\n\
         Answer with one block per aspect, blocks separated by an empty line:\n\
         Aspect: <aspect>\n\
         Chunk: <chunk of the text about the aspect>\n\
         Do not repeat the text or add anything else. Answer in the language of the text.\n\n\
         Text:\n{text}"
    )
}

/// Prompt asking for aspect-based sentiment with scores
pub fn aspect_sentiment_prompt(text: &str) -> String {
    format!(
        "Perform aspect-based sentiment analysis of the text below.\n\
         Answer with one block per aspect, blocks separated by an empty line:\n\
         Aspect: <aspect, exact words from the text>\n\
         Label: <sentiment label>\n\
         Score: <score>\n\
         Do not repeat the text or add anything else. Answer in the language of the text.\n\n\
         Text:\n{text}"
    )
}

/// Prompt asking for a single sentiment label and score
pub fn overall_prompt(text: &str) -> String {
    format!(
        "Give the sentiment of the text below in the format:\n\
         Label: <sentiment label>\n\
         Score: <score>\n\n\
         Text:\n{text}"
    )
}

// ============================================================================
// Reply Parsing
// ============================================================================

/// Non-empty line groups separated by blank lines
fn blocks(reply: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in reply.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Value of the first `Key:` line in a block
fn field<'a>(block: &[&'a str], key: &str) -> Option<&'a str> {
    block.iter().find_map(|line| {
        let (name, value) = line.trim().split_once(':')?;
        name.trim().eq_ignore_ascii_case(key).then(|| value.trim())
    })
}

fn required<'a>(block: &[&'a str], key: &str) -> std::result::Result<&'a str, String> {
    match field(block, key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(format!("missing `{key}:` in block {:?}", block.join(" / "))),
    }
}

fn optional_score(block: &[&str]) -> std::result::Result<Option<f64>, String> {
    match field(block, "Score") {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("score `{raw}` is not a number")),
    }
}

fn non_empty_blocks(reply: &str) -> std::result::Result<Vec<Vec<&str>>, String> {
    let blocks = blocks(reply);
    if blocks.is_empty() {
        return Err("empty reply".to_string());
    }
    Ok(blocks)
}

/// Parse `Aspect:` / `Chunk:` blocks
pub fn parse_extraction_reply(reply: &str) -> std::result::Result<Vec<ExtractedAspect>, String> {
    non_empty_blocks(reply)?
        .iter()
        .map(|block| -> std::result::Result<_, String> {
            Ok(ExtractedAspect::new(
                required(block, "Aspect")?,
                required(block, "Chunk")?,
            ))
        })
        .collect()
}

/// Parse `Aspect:` / `Label:` / `Score:` blocks; the score may be absent
pub fn parse_aspect_sentiment_reply(
    reply: &str,
) -> std::result::Result<Vec<SentimentAnnotation>, String> {
    non_empty_blocks(reply)?
        .iter()
        .map(|block| -> std::result::Result<_, String> {
            let annotation =
                SentimentAnnotation::new(required(block, "Aspect")?, required(block, "Label")?);
            Ok(match optional_score(block)? {
                Some(score) => annotation.with_score(score),
                None => annotation,
            })
        })
        .collect()
}

/// Parse a `Label:` / `Score:` reply into a label and optional score
pub fn parse_overall_reply(reply: &str) -> std::result::Result<(String, Option<f64>), String> {
    let lines: Vec<&str> = reply.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return Err("empty reply".to_string());
    }
    let label = required(&lines, "Label")?;
    Ok((label.to_string(), optional_score(&lines)?))
}

fn unparsable(document: usize, tool: &str, message: String) -> SentaError {
    warn!(document, tool, %message, "unparsable reply");
    SentaError::CollaboratorOutput { document, message }
}

// ============================================================================
// Shared Call Settings
// ============================================================================

#[derive(Clone)]
struct Remote {
    client: Arc<dyn LlmClient>,
    cooldown: Duration,
}

impl Remote {
    async fn ask(&self, prompt: &str) -> Result<String> {
        let reply = self.client.generate(prompt).await?;
        debug!(reply_chars = reply.len(), "received reply");

        if !self.cooldown.is_zero() {
            debug!(secs = self.cooldown.as_secs_f64(), "cooling down");
            tokio::time::sleep(self.cooldown).await;
        }
        Ok(reply)
    }
}

// ============================================================================
// LLM Extractor
// ============================================================================

/// Extractor that asks an LLM for aspects and their chunks
#[derive(Clone)]
pub struct LlmExtractor {
    remote: Remote,
}

impl LlmExtractor {
    /// No pause between calls
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            remote: Remote {
                client,
                cooldown: Duration::ZERO,
            },
        }
    }

    pub fn from_config(client: Arc<dyn LlmClient>, config: &AnnotatorConfig) -> Self {
        Self::new(client).with_cooldown(config.cooldown())
    }

    /// Pause after every call, for rate-limited accounts
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.remote.cooldown = cooldown;
        self
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, texts: &[String]) -> Result<Vec<Vec<ExtractedAspect>>> {
        let mut aspects = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let reply = self.remote.ask(&extraction_prompt(text)).await?;
            let found = parse_extraction_reply(&reply)
                .map_err(|message| unparsable(index, self.name(), message))?;
            aspects.push(found);
        }
        Ok(aspects)
    }
}

// ============================================================================
// LLM Extrassifier
// ============================================================================

/// Extrassifier that asks an LLM for aspects with labels and scores
#[derive(Clone)]
pub struct LlmExtrassifier {
    remote: Remote,
}

impl LlmExtrassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            remote: Remote {
                client,
                cooldown: Duration::ZERO,
            },
        }
    }

    pub fn from_config(client: Arc<dyn LlmClient>, config: &AnnotatorConfig) -> Self {
        Self::new(client).with_cooldown(config.cooldown())
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.remote.cooldown = cooldown;
        self
    }
}

#[async_trait]
impl Extrassifier for LlmExtrassifier {
    async fn classify(&self, texts: &[String]) -> Result<Vec<AspectAnnotation>> {
        let mut annotations = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let reply = self.remote.ask(&aspect_sentiment_prompt(text)).await?;
            let aspects = parse_aspect_sentiment_reply(&reply)
                .map_err(|message| unparsable(index, self.name(), message))?;
            annotations.push(AspectAnnotation::new(text.as_str(), aspects));
        }
        Ok(annotations)
    }
}

// ============================================================================
// LLM Overall Annotator
// ============================================================================

/// Document-level labels from an LLM
///
/// Texts longer than `max_chars` characters are truncated before prompting;
/// the returned annotation keeps the full text.
#[derive(Clone)]
pub struct LlmOverallAnnotator {
    remote: Remote,
    max_chars: usize,
}

impl LlmOverallAnnotator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            remote: Remote {
                client,
                cooldown: Duration::ZERO,
            },
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    pub fn from_config(client: Arc<dyn LlmClient>, config: &AnnotatorConfig) -> Self {
        Self::new(client)
            .with_cooldown(config.cooldown())
            .with_max_chars(config.max_overall_chars)
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.remote.cooldown = cooldown;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

#[async_trait]
impl OverallClassifier for LlmOverallAnnotator {
    async fn classify(&self, texts: &[String]) -> Result<Vec<SentimentAnnotation>> {
        let mut annotations = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let truncated: String = text.chars().take(self.max_chars).collect();
            let reply = self.remote.ask(&overall_prompt(&truncated)).await?;
            let (label, score) = parse_overall_reply(&reply)
                .map_err(|message| unparsable(index, self.name(), message))?;

            let annotation = SentimentAnnotation::new(text.as_str(), label);
            annotations.push(match score {
                Some(score) => annotation.with_score(score),
                None => annotation,
            });
        }
        Ok(annotations)
    }
}

// ============================================================================
// Tests
// ============================================================================
