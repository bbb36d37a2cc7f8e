//! End-to-end summarize pipeline: URL → fetch → normalize → chunk → dispatch → aggregate.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

use pagedigest_fetcher::PageFetcher;
use pagedigest_llm::CompletionProvider;
use pagedigest_shared::{
    AppConfig, Document, Link, PageDigestError, Result, SummaryRequest, Tokenizer,
};

use crate::aggregate::aggregate;
use crate::chunker::chunk_with;
use crate::dispatch::{DispatchOptions, dispatch_all};
use crate::normalize::normalize_lines;
use crate::report::{PipelineEvent, PipelineReporter};
use crate::tokens::count_tokens;

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum tokens per chunk.
    pub token_budget: usize,
    /// How `token_budget` is measured.
    pub tokenizer: Tokenizer,
    /// Model parameters and instruction for the per-chunk requests.
    pub chunk_request: SummaryRequest,
    /// Model parameters and prompt template for the final request.
    pub summary_request: SummaryRequest,
    pub dispatch: DispatchOptions,
    /// Pause between the last chunk response and the final request.
    pub pre_summary_delay: Duration,
    /// Upper bound on the whole run. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl PipelineConfig {
    /// Build run settings from the application config, validating it first.
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            token_budget: config.chunking.token_budget,
            tokenizer: config.chunking.tokenizer,
            chunk_request: config.chunk_request(),
            summary_request: config.summary_request(),
            dispatch: DispatchOptions::from(config),
            pre_summary_delay: Duration::from_millis(config.summary.pre_summary_delay_ms),
            timeout: None,
        })
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Identifier for this run, used to correlate log lines.
    pub run_id: Uuid,
    pub url: String,
    pub title: String,
    /// The final provider response, verbatim.
    pub text: String,
    /// Chunks produced by the chunker.
    pub chunk_count: usize,
    /// Chunk requests that returned a result (completed or skipped).
    pub dispatched: usize,
    /// Indices of chunks recorded as failed under the skip policy.
    pub failed_chunks: Vec<usize>,
    /// Tokens of the normalized page text.
    pub total_tokens: usize,
    pub elapsed_ms: u64,
    /// Model used for the final request.
    pub model: String,
    pub links: Vec<Link>,
}

/// Fetch `url` and summarize it.
#[instrument(skip_all, fields(url = %url))]
pub async fn summarize_url(
    url: &Url,
    fetcher: &dyn PageFetcher,
    provider: &dyn CompletionProvider,
    config: &PipelineConfig,
    reporter: &dyn PipelineReporter,
) -> Result<Summary> {
    with_timeout(config.timeout, async {
        reporter.event(&PipelineEvent::Fetching { url: url.as_str() });
        let document = fetcher.fetch(url).await?;
        run(document, provider, config, reporter).await
    })
    .await
}

/// Summarize a document that has already been fetched.
#[instrument(skip_all, fields(url = %document.url))]
pub async fn summarize_document(
    document: Document,
    provider: &dyn CompletionProvider,
    config: &PipelineConfig,
    reporter: &dyn PipelineReporter,
) -> Result<Summary> {
    with_timeout(config.timeout, run(document, provider, config, reporter)).await
}

async fn with_timeout(
    limit: Option<Duration>,
    run: impl Future<Output = Result<Summary>>,
) -> Result<Summary> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .map_err(|_| PageDigestError::Timeout(limit))?,
        None => run.await,
    }
}

async fn run(
    document: Document,
    provider: &dyn CompletionProvider,
    config: &PipelineConfig,
    reporter: &dyn PipelineReporter,
) -> Result<Summary> {
    let start = Instant::now();
    let run_id = Uuid::now_v7();

    info!(%run_id, title = %document.title, "starting summarize pipeline");
    reporter.event(&PipelineEvent::Fetched {
        title: &document.title,
        chars: document.text.chars().count(),
    });

    // --- Phase 1: Normalize ---
    let text = normalize_lines(&document.text);
    if text.is_empty() {
        return Err(PageDigestError::fetch(
            &document.url,
            "page contained no extractable text",
        ));
    }
    let total_tokens = count_tokens(&text, config.tokenizer);
    info!(total_tokens, tokenizer = %config.tokenizer, "normalized page text");
    reporter.event(&PipelineEvent::Normalized {
        tokens: total_tokens,
    });

    // --- Phase 2: Chunk ---
    let chunks = chunk_with(&text, config.token_budget, config.tokenizer);
    info!(chunks = chunks.len(), token_budget = config.token_budget, "chunked page text");
    reporter.event(&PipelineEvent::Chunked {
        chunks: chunks.len(),
        token_budget: config.token_budget,
    });

    // --- Phase 3: Dispatch ---
    let results = dispatch_all(
        &chunks,
        provider,
        &config.chunk_request,
        &config.dispatch,
        reporter,
    )
    .await?;

    let failed_chunks: Vec<usize> = results
        .iter()
        .filter(|r| r.is_failed())
        .map(|r| r.index)
        .collect();
    if !results.is_empty() && failed_chunks.len() == results.len() {
        return Err(PageDigestError::validation(
            "every chunk failed; nothing to summarize",
        ));
    }
    if !failed_chunks.is_empty() {
        warn!(failed = failed_chunks.len(), "continuing with partial results");
    }

    // --- Phase 4: Aggregate ---
    if !config.pre_summary_delay.is_zero() {
        tokio::time::sleep(config.pre_summary_delay).await;
    }
    reporter.event(&PipelineEvent::Aggregating {
        facts: results.len() - failed_chunks.len(),
    });
    let text = aggregate(
        &results,
        &config.summary_request.prompt,
        &document.url,
        provider,
        &config.summary_request,
    )
    .await?;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    info!(%run_id, elapsed_ms, "summarize pipeline complete");
    reporter.event(&PipelineEvent::Finished { elapsed_ms });

    Ok(Summary {
        run_id,
        url: document.url,
        title: document.title,
        text,
        chunk_count: chunks.len(),
        dispatched: results.len(),
        failed_chunks,
        total_tokens,
        elapsed_ms,
        model: config.summary_request.model.clone(),
        links: document.links,
    })
}
