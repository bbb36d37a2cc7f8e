//! Windowed, paced dispatch of chunks to a completion provider.
//!
//! Chunks are sent in windows of at most `concurrency` requests. Every
//! request in a window waits the inter-request delay, then all of them run
//! concurrently on the calling task; the next window starts only after the
//! whole current window has resolved. Results keep their chunk index, so
//! callers get them back in input order whatever the completion order was.

use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use pagedigest_llm::CompletionProvider;
use pagedigest_shared::{
    AppConfig, DispatchConfig, FailurePolicy, PageDigestError, Result, SummaryRequest,
};

use crate::chunker::Chunk;
use crate::report::{PipelineEvent, PipelineReporter};

// ---------------------------------------------------------------------------
// Backoff policy
// ---------------------------------------------------------------------------

/// Retry schedule for a single chunk request.
///
/// Only transient provider errors (rate limits, 5xx, transport) are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total attempts per request, including the first. `1` disables retry.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Growth factor applied to the delay after each retry.
    pub multiplier: f64,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
}

impl BackoffPolicy {
    /// A single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based), capped at `max_delay`.
    ///
    /// A schedule that overflows or is not a number falls back to `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(scaled).map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Whether a request that just failed on `attempt` (1-based) should be retried.
    pub fn should_retry(&self, attempt: u32, err: &PageDigestError) -> bool {
        attempt < self.max_attempts && err.is_transient()
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(8),
        }
    }
}

impl From<&DispatchConfig> for BackoffPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            multiplier: config.retry_multiplier,
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

/// Scheduling parameters for [`dispatch_all`].
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Maximum requests in flight per window. Must be positive.
    pub concurrency: usize,
    /// Wait applied to every request before it is issued.
    pub inter_request_delay: Duration,
    pub failure_policy: FailurePolicy,
    pub backoff: BackoffPolicy,
    /// Text placed after each chunk in the rendered prompt.
    pub chunk_suffix: String,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for DispatchOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.dispatch.concurrency,
            inter_request_delay: Duration::from_millis(config.dispatch.inter_request_delay_ms),
            failure_policy: config.dispatch.failure_policy,
            backoff: BackoffPolicy::from(&config.dispatch),
            chunk_suffix: config.chunking.chunk_suffix.clone(),
        }
    }
}

/// What came back for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ChunkOutcome {
    Completed(String),
    /// Only produced under [`FailurePolicy::Skip`]; holds the error message.
    Failed(String),
}

/// The provider response for the chunk at `index`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkResult {
    pub index: usize,
    pub outcome: ChunkOutcome,
}

impl ChunkResult {
    /// Response text, if the request succeeded.
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            ChunkOutcome::Completed(text) => Some(text),
            ChunkOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ChunkOutcome::Failed(_))
    }
}

/// Build the user message for one chunk: `"{prompt} {chunk} {suffix}"`.
pub fn render_chunk_prompt(prompt: &str, chunk: &str, suffix: &str) -> String {
    [prompt.trim(), chunk, suffix.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Send every non-empty chunk to `provider` and collect the results in index order.
///
/// Chunks whose content is empty or whitespace are skipped entirely: no
/// request, no result. Under [`FailurePolicy::Abort`] the lowest-index failure
/// of a window is returned once that window has resolved, and no later window
/// starts. Under [`FailurePolicy::Skip`] failures are recorded as
/// [`ChunkOutcome::Failed`] and dispatch continues.
#[instrument(skip_all, fields(chunks = chunks.len(), concurrency = options.concurrency))]
pub async fn dispatch_all(
    chunks: &[Chunk],
    provider: &dyn CompletionProvider,
    request: &SummaryRequest,
    options: &DispatchOptions,
    reporter: &dyn PipelineReporter,
) -> Result<Vec<ChunkResult>> {
    if options.concurrency == 0 {
        return Err(PageDigestError::validation(
            "dispatch concurrency must be greater than zero",
        ));
    }

    let pending: Vec<&Chunk> = chunks
        .iter()
        .filter(|c| !c.content.trim().is_empty())
        .collect();

    let skipped = chunks.len() - pending.len();
    if skipped > 0 {
        debug!(skipped, "dropping empty chunks before dispatch");
    }

    let total = pending.len();
    let mut results = Vec::with_capacity(total);

    for (window, batch) in pending.chunks(options.concurrency).enumerate() {
        reporter.event(&PipelineEvent::WindowStarted {
            window,
            size: batch.len(),
        });
        debug!(window, size = batch.len(), "starting dispatch window");

        let offset = window * options.concurrency;
        let requests = batch.iter().enumerate().map(|(i, chunk)| {
            send_chunk(chunk, offset + i + 1, total, provider, request, options, reporter)
        });

        // join_all yields in input order, so the first Err seen is the lowest index.
        let mut first_failure: Option<(usize, PageDigestError)> = None;
        for (index, outcome) in join_all(requests).await {
            match outcome {
                Ok(text) => results.push(ChunkResult {
                    index,
                    outcome: ChunkOutcome::Completed(text),
                }),
                Err(err) => match options.failure_policy {
                    FailurePolicy::Abort => {
                        if first_failure.is_none() {
                            first_failure = Some((index, err));
                        }
                    }
                    FailurePolicy::Skip => {
                        warn!(index, error = %err, "chunk failed, skipping");
                        results.push(ChunkResult {
                            index,
                            outcome: ChunkOutcome::Failed(err.to_string()),
                        });
                    }
                },
            }
        }

        if let Some((index, source)) = first_failure {
            warn!(index, window, error = %source, "aborting dispatch");
            return Err(PageDigestError::ChunkDispatch {
                index,
                source: Box::new(source),
            });
        }
    }

    results.sort_by_key(|r| r.index);

    info!(
        dispatched = results.len(),
        failed = results.iter().filter(|r| r.is_failed()).count(),
        "dispatch complete"
    );

    Ok(results)
}

/// Pace, send and (if the policy allows) retry one chunk request.
async fn send_chunk(
    chunk: &Chunk,
    position: usize,
    total: usize,
    provider: &dyn CompletionProvider,
    request: &SummaryRequest,
    options: &DispatchOptions,
    reporter: &dyn PipelineReporter,
) -> (usize, Result<String>) {
    if !options.inter_request_delay.is_zero() {
        tokio::time::sleep(options.inter_request_delay).await;
    }

    let prompt = render_chunk_prompt(&request.prompt, &chunk.content, &options.chunk_suffix);
    let mut attempt = 1;

    loop {
        reporter.event(&PipelineEvent::ChunkSent {
            index: chunk.index,
            position,
            total,
            attempt,
        });
        debug!(index = chunk.index, attempt, tokens = chunk.estimated_tokens, "sending chunk");

        match provider.complete(request, &prompt).await {
            Ok(text) => {
                reporter.event(&PipelineEvent::ChunkCompleted { index: chunk.index });
                return (chunk.index, Ok(text));
            }
            Err(err) => {
                let will_retry = options.backoff.should_retry(attempt, &err);
                let message = err.to_string();
                reporter.event(&PipelineEvent::ChunkFailed {
                    index: chunk.index,
                    error: &message,
                    will_retry,
                });
                if !will_retry {
                    return (chunk.index, Err(err));
                }
                let delay = options.backoff.delay_for(attempt);
                warn!(index = chunk.index, attempt, ?delay, error = %message, "retrying chunk");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
