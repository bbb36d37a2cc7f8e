//! Page retrieval and text extraction.
//!
//! This crate provides:
//! - [`PageFetcher`]: the collaborator trait the pipeline fetches documents through
//! - [`HttpPageFetcher`]: a plain HTTP implementation backed by `reqwest` + `scraper`
//! - [`extract`]: the HTML → text/title/links helpers it uses

pub mod extract;
mod http;

use async_trait::async_trait;
use pagedigest_shared::{Document, Result};
use url::Url;

pub use extract::{TEXT_ELEMENTS, clean_url, extract_links, extract_text, extract_title};
pub use http::HttpPageFetcher;

/// Retrieves a page and turns it into a [`Document`].
///
/// Any failure (navigation, timeout, non-success status) is reported as
/// [`PageDigestError::Fetch`](pagedigest_shared::PageDigestError::Fetch).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Document>;
}
