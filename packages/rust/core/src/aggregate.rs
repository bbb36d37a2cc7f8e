//! Folding chunk results into one final summarization request.

use tracing::{debug, info, instrument, warn};

use pagedigest_llm::CompletionProvider;
use pagedigest_shared::{PageDigestError, Result, SummaryRequest};

use crate::dispatch::ChunkResult;

/// Join the completed texts, in index order, with `\n`.
///
/// Failed results are left out. `results` is expected to be sorted by index,
/// which is what the dispatcher returns.
pub fn fact_list(results: &[ChunkResult]) -> String {
    results
        .iter()
        .filter_map(ChunkResult::text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the final prompt.
///
/// `{url}` and `{facts}` in the template are substituted. A template without
/// a `{facts}` placeholder is treated as a plain instruction and the URL and
/// facts are laid out after it.
pub fn render_final_prompt(template: &str, url: &str, facts: &str) -> String {
    if template.contains("{facts}") {
        return template.replace("{url}", url).replace("{facts}", facts);
    }
    let instruction = template.replace("{url}", url);
    let instruction = instruction.trim_end().trim_end_matches(':');
    format!("{instruction}:\n\nURL: <{url}>\n\n{facts}")
}

/// Send the combined fact list to the provider and return its answer verbatim.
///
/// Exactly one provider call is made. Any failure is wrapped in
/// [`PageDigestError::Aggregation`].
#[instrument(skip_all, fields(url = %url, results = results.len()))]
pub async fn aggregate(
    results: &[ChunkResult],
    final_prompt_template: &str,
    url: &str,
    provider: &dyn CompletionProvider,
    final_request: &SummaryRequest,
) -> Result<String> {
    let failed: Vec<usize> = results
        .iter()
        .filter(|r| r.is_failed())
        .map(|r| r.index)
        .collect();
    if !failed.is_empty() {
        warn!(?failed, "omitting failed chunks from fact list");
    }

    let facts = fact_list(results);
    let completed = results.len() - failed.len();
    info!(facts = completed, "generated fact list");
    debug!(facts = completed, fact_list = %facts, "fact list for final request");

    let prompt = render_final_prompt(final_prompt_template, url, &facts);
    debug!(prompt_chars = prompt.len(), "sending final summarization request");

    let summary = provider
        .complete(final_request, &prompt)
        .await
        .map_err(|e| PageDigestError::Aggregation(Box::new(e)))?;

    info!(summary_chars = summary.len(), "summary received");
    Ok(summary)
}
