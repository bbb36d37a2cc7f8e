//! Core summarization pipeline for PageDigest.
//!
//! Page text is normalized, split into token-bounded chunks, sent to a
//! completion provider in paced concurrent windows, and the per-chunk facts
//! are folded into one final summarization request (see [`pipeline`]).

pub mod aggregate;
pub mod chunker;
pub mod dispatch;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod tokens;

#[cfg(test)]
mod testing;

pub use aggregate::{aggregate, fact_list, render_final_prompt};
pub use chunker::{Chunk, chunk, chunk_with};
pub use dispatch::{
    BackoffPolicy, ChunkOutcome, ChunkResult, DispatchOptions, dispatch_all, render_chunk_prompt,
};
pub use normalize::{normalize, normalize_lines};
pub use pipeline::{PipelineConfig, Summary, summarize_document, summarize_url};
pub use report::{PipelineEvent, PipelineReporter, SilentReporter};
pub use tokens::{count_tokens, estimate_message_tokens, estimate_tokens};
