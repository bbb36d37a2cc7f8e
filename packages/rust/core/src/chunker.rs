//! Line-aware splitting of page text under a token budget.

use pagedigest_shared::Tokenizer;
use serde::Serialize;

use crate::tokens::count_tokens;

/// One bounded-size segment of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in emission order, starting at 0.
    pub index: usize,
    /// Trimmed chunk text.
    pub content: String,
    /// Token count of `content` under the tokenizer that produced the chunk.
    pub estimated_tokens: usize,
}

impl Chunk {
    /// A chunk measured with the character heuristic.
    pub fn new(index: usize, content: impl Into<String>) -> Self {
        Self::counted(index, content, Tokenizer::Heuristic)
    }

    pub fn counted(index: usize, content: impl Into<String>, tokenizer: Tokenizer) -> Self {
        let content = content.into();
        let estimated_tokens = count_tokens(&content, tokenizer);
        Self {
            index,
            content,
            estimated_tokens,
        }
    }
}

/// Split `text` into chunks whose estimated cost stays within `token_budget`,
/// measured with the character heuristic.
///
/// Lines are accumulated whole. A line that does not fit closes the current
/// chunk and starts the next one; a single line larger than the budget
/// becomes its own oversized chunk and is never cut. Empty text yields no
/// chunks, and no emitted chunk is empty.
pub fn chunk(text: &str, token_budget: usize) -> Vec<Chunk> {
    chunk_with(text, token_budget, Tokenizer::Heuristic)
}

/// [`chunk`] with an explicit tokenizer.
///
/// The running cost of a chunk is the sum of its lines' costs (each with its
/// line break), which never undercounts the heuristic. With a BPE tokenizer
/// the bound holds up to merges across line boundaries.
pub fn chunk_with(text: &str, token_budget: usize, tokenizer: Tokenizer) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_tokens = 0;

    for line in text.split('\n') {
        let fits = buffer_tokens + count_tokens(line, tokenizer) <= token_budget;
        if !fits && !buffer.trim().is_empty() {
            flush(&mut chunks, &buffer, tokenizer);
            buffer.clear();
            buffer_tokens = 0;
        }
        let start = buffer.len();
        buffer.push_str(line);
        buffer.push('\n');
        buffer_tokens += count_tokens(&buffer[start..], tokenizer);
    }

    flush(&mut chunks, &buffer, tokenizer);
    chunks
}

fn flush(chunks: &mut Vec<Chunk>, buffer: &str, tokenizer: Tokenizer) {
    let content = buffer.trim();
    if content.is_empty() {
        return;
    }
    chunks.push(Chunk::counted(chunks.len(), content, tokenizer));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_lines;
    use crate::tokens::estimate_tokens;

    fn sample_texts() -> Vec<String> {
        vec![
            "Line one.\nLine two.\nLine three.".into(),
            "single line without breaks".into(),
            (0..50)
                .map(|i| format!("Paragraph {i} talks about topic {} at some length.", i * 7))
                .collect::<Vec<_>>()
                .join("\n"),
            format!("short\n{}\nshort again\ntail", "x".repeat(400)),
            "  padded  \n\n\n  lines\twith\ttabs  \n".into(),
        ]
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk("", 100).is_empty());
        assert!(chunk("\n\n  \n", 100).is_empty());
    }

    #[test]
    fn everything_fits_in_one_chunk() {
        let chunks = chunk("Line one.\nLine two.\nLine three.", 1_000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].content, "Line one.\nLine two.\nLine three.");
        assert_eq!(chunks[0].estimated_tokens, estimate_tokens(&chunks[0].content));
    }

    #[test]
    fn tiny_budget_puts_each_line_in_its_own_chunk() {
        let chunks = chunk("Line one.\nLine two.\nLine three.", 3);
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["Line one.", "Line two.", "Line three."]);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn oversized_line_is_kept_whole() {
        let long = "y".repeat(1_000);
        let text = format!("before\n{long}\nafter");
        let chunks = chunk(&text, 10);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].content, long);
        assert!(chunks[1].estimated_tokens > 10);
    }

    #[test]
    fn reassembly_is_lossless_for_normalized_text() {
        for raw in sample_texts() {
            let text = normalize_lines(&raw);
            for budget in [1, 3, 10, 25, 100, 10_000] {
                let chunks = chunk(&text, budget);
                let rebuilt = chunks
                    .iter()
                    .map(|c| c.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                assert_eq!(rebuilt, text, "budget {budget}");
            }
        }
    }

    #[test]
    fn multi_line_chunks_respect_budget() {
        for raw in sample_texts() {
            let text = normalize_lines(&raw);
            for budget in [1, 3, 10, 25, 100] {
                for c in chunk(&text, budget) {
                    assert!(
                        c.estimated_tokens <= budget || !c.content.contains('\n'),
                        "chunk {} over budget {budget}: {:?}",
                        c.index,
                        c.content
                    );
                }
            }
        }
    }

    #[test]
    fn chunks_are_never_empty_and_indices_contiguous() {
        for raw in sample_texts() {
            let chunks = chunk(&raw, 7);
            for (i, c) in chunks.iter().enumerate() {
                assert_eq!(c.index, i);
                assert!(!c.content.trim().is_empty());
            }
        }
    }

    #[test]
    fn bpe_chunks_are_lossless_and_counted() {
        let text = normalize_lines(&sample_texts()[2]);
        let chunks = chunk_with(&text, 40, Tokenizer::Cl100k);

        assert!(chunks.len() > 1);
        let rebuilt = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(rebuilt, text);
        for c in &chunks {
            assert_eq!(c.estimated_tokens, count_tokens(&c.content, Tokenizer::Cl100k));
        }
    }
}
