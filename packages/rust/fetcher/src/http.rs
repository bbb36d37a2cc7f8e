//! HTTP page fetcher.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use scraper::Html;
use tracing::{debug, instrument};
use url::Url;

use pagedigest_shared::{Document, FetchConfig, PageDigestError, Result};

use crate::PageFetcher;
use crate::extract::{extract_links, extract_text, extract_title};

/// Fetches pages over plain HTTP(S). No JavaScript is executed.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    /// Create a fetcher with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                PageDigestError::config(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<Document> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(PageDigestError::fetch(
                    url.as_str(),
                    format!("unsupported scheme '{other}'"),
                ));
            }
        }

        debug!("fetching page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| PageDigestError::fetch(url.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageDigestError::fetch(url.as_str(), format!("HTTP {status}")));
        }

        // Redirects may have moved us; links resolve against the final URL.
        let final_url = response.url().clone();

        let body = response
            .text()
            .await
            .map_err(|e| PageDigestError::fetch(url.as_str(), format!("body read failed: {e}")))?;

        let doc = Html::parse_document(&body);
        let text = extract_text(&doc);
        let title = extract_title(&doc).unwrap_or_default();
        let links = extract_links(&doc, &final_url);

        debug!(
            bytes = body.len(),
            text_len = text.len(),
            links = links.len(),
            "page extracted"
        );

        Ok(Document {
            url: url.to_string(),
            title,
            text,
            links,
            fetched_at: Utc::now(),
        })
    }
}
