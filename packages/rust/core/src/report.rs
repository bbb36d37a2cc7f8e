//! Progress reporting for pipeline runs.
//!
//! The pipeline never writes to the terminal itself; callers pass a
//! [`PipelineReporter`] and decide how to render each [`PipelineEvent`].

use std::fmt;

/// Something noteworthy happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent<'a> {
    /// Page retrieval started.
    Fetching { url: &'a str },
    /// Page retrieved and text extracted.
    Fetched { title: &'a str, chars: usize },
    /// Text normalized; total estimated size.
    Normalized { tokens: usize },
    /// Text split into chunks.
    Chunked { chunks: usize, token_budget: usize },
    /// A dispatch window is about to start.
    WindowStarted { window: usize, size: usize },
    /// A chunk request is being sent (`position` is 1-based among dispatched chunks).
    ChunkSent {
        index: usize,
        position: usize,
        total: usize,
        attempt: u32,
    },
    /// A chunk request returned text.
    ChunkCompleted { index: usize },
    /// A chunk request failed.
    ChunkFailed {
        index: usize,
        error: &'a str,
        will_retry: bool,
    },
    /// The final summarization request is being sent.
    Aggregating { facts: usize },
    /// The run finished.
    Finished { elapsed_ms: u64 },
}

impl fmt::Display for PipelineEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetching { url } => write!(f, "Fetching {url}"),
            Self::Fetched { title, chars } => write!(f, "Fetched \"{title}\" ({chars} chars)"),
            Self::Normalized { tokens } => write!(f, "Token count: {tokens}"),
            Self::Chunked {
                chunks,
                token_budget,
            } => write!(f, "Split into {chunks} chunks of up to {token_budget} tokens"),
            Self::WindowStarted { window, size } => {
                write!(f, "Dispatch window {} ({size} chunks)", window + 1)
            }
            Self::ChunkSent {
                position,
                total,
                attempt,
                ..
            } => {
                if *attempt > 1 {
                    write!(f, "Sending chunk {position} of {total} (attempt {attempt})")
                } else {
                    write!(f, "Sending chunk {position} of {total}")
                }
            }
            Self::ChunkCompleted { index } => write!(f, "Chunk {index} done"),
            Self::ChunkFailed {
                index,
                error,
                will_retry,
            } => {
                let suffix = if *will_retry { ", retrying" } else { "" };
                write!(f, "Chunk {index} failed: {error}{suffix}")
            }
            Self::Aggregating { facts } => write!(f, "Summarizing {facts} facts"),
            Self::Finished { elapsed_ms } => write!(f, "Done in {elapsed_ms} ms"),
        }
    }
}

/// Receives pipeline events. Implementations must be cheap; events are
/// delivered inline on the pipeline task.
pub trait PipelineReporter: Send + Sync {
    fn event(&self, event: &PipelineEvent<'_>);
}

/// No-op reporter for headless/test usage.
pub struct SilentReporter;

impl PipelineReporter for SilentReporter {
    fn event(&self, _event: &PipelineEvent<'_>) {}
}
