//! Completion provider abstraction and the OpenAI-compatible HTTP client.
//!
//! The pipeline only ever talks to [`CompletionProvider`]; [`OpenAiProvider`]
//! is the production implementation.

mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use pagedigest_shared::{Result, SummaryRequest};

pub use openai::OpenAiProvider;

/// An external LLM completion service.
///
/// `request` carries the model and sampling parameters; `prompt` is the fully
/// rendered user message. Implementations return the model's text verbatim.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &SummaryRequest, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<P: CompletionProvider + ?Sized> CompletionProvider for Arc<P> {
    async fn complete(&self, request: &SummaryRequest, prompt: &str) -> Result<String> {
        (**self).complete(request, prompt).await
    }
}
