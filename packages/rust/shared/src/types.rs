//! Core domain types shared between the fetcher, provider and pipeline crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A hyperlink found on a fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Visible link text, trimmed.
    pub text: String,
    /// Absolute target URL.
    pub href: String,
}

/// A fetched page, ready to be summarized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// The URL that was fetched.
    pub url: String,
    /// Page title (`<title>`, falling back to the first `<h1>`).
    pub title: String,
    /// Raw extracted text, not yet normalized.
    pub text: String,
    /// Links in document order.
    #[serde(default)]
    pub links: Vec<Link>,
    /// When the page was retrieved.
    pub fetched_at: DateTime<Utc>,
}

impl Document {
    /// Build a document from already-extracted text (no links).
    pub fn from_text(
        url: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            text: text.into(),
            links: Vec::new(),
            fetched_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// SummaryRequest
// ---------------------------------------------------------------------------

/// Model parameters for one kind of completion request.
///
/// Passed through to the provider untouched; the pipeline never interprets
/// the sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    /// Provider model identifier.
    pub model: String,
    /// Maximum tokens the model may generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Instruction text (chunk prompt or final prompt template).
    pub prompt: String,
}

// ---------------------------------------------------------------------------
// FailurePolicy
// ---------------------------------------------------------------------------

/// What the dispatcher does when a chunk request fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Surface the first failure once its window resolves and stop.
    #[default]
    Abort,
    /// Record the failure and keep dispatching; the chunk is left out of the fact list.
    Skip,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// How chunk budgets and page sizes are measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tokenizer {
    /// GPT `cl100k_base` byte-pair encoding.
    #[default]
    Cl100k,
    /// About four characters per token; no encoder tables needed.
    Heuristic,
}

impl std::fmt::Display for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cl100k => write!(f, "cl100k"),
            Self::Heuristic => write!(f, "heuristic"),
        }
    }
}

impl std::str::FromStr for Tokenizer {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(Self::Cl100k),
            "heuristic" => Ok(Self::Heuristic),
            other => Err(format!("unknown tokenizer '{other}' (expected cl100k or heuristic)")),
        }
    }
}
