//! Token counting.
//!
//! [`estimate_tokens`] is a character heuristic (about four characters per
//! token). [`count_tokens`] dispatches on the configured [`Tokenizer`] and
//! uses the GPT `cl100k_base` encoding when asked to. Counts are only
//! compared against budgets, never used for billing.

use std::sync::LazyLock;

use pagedigest_shared::Tokenizer;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Characters per estimated token.
const CHARS_PER_TOKEN: usize = 4;

static CL100K: LazyLock<CoreBPE> =
    LazyLock::new(|| cl100k_base().expect("bundled cl100k_base encoding"));

/// Estimate the token cost of `s`. Empty input costs 0.
///
/// Subadditive: `estimate_tokens(a + b) <= estimate_tokens(a) + estimate_tokens(b)`.
pub fn estimate_tokens(s: &str) -> usize {
    s.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Sum of [`estimate_tokens`] over a list of messages.
pub fn estimate_message_tokens<S: AsRef<str>>(messages: &[S]) -> usize {
    messages.iter().map(|m| estimate_tokens(m.as_ref())).sum()
}

/// Count the tokens of `s` with the given tokenizer. Empty input costs 0.
pub fn count_tokens(s: &str, tokenizer: Tokenizer) -> usize {
    match tokenizer {
        Tokenizer::Heuristic => estimate_tokens(s),
        Tokenizer::Cl100k if s.is_empty() => 0,
        Tokenizer::Cl100k => CL100K.encode_ordinary(s).len(),
    }
}
