//! Web search collaborator.
//!
//! The pipeline only needs "query in, ordered snippets out", expressed by the
//! [`SearchProvider`] trait. [`DuckDuckGoSearch`] implements it against the
//! DuckDuckGo no-JS HTML endpoint, which needs no API key.

mod parser;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use researcher_shared::{ResearcherError, Result, SearchConfig, Snippet};
use tracing::{debug, info, instrument};
use url::Url;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// Browser-like User-Agent; the HTML endpoint rejects empty agents.
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; Researcher/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Anything that can turn a query into an ordered list of snippets.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Run the search, returning at most `max_results` snippets in rank order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Snippet>>;
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Connection settings for [`DuckDuckGoSearch`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Endpoint serving the HTML results page.
    pub base_url: String,
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// DuckDuckGo backend
// ---------------------------------------------------------------------------

/// DuckDuckGo HTML search.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: Url,
}

impl DuckDuckGoSearch {
    pub fn new(opts: &SearchOptions) -> Result<Self> {
        let base_url = Url::parse(&opts.base_url).map_err(|e| {
            ResearcherError::config(format!("invalid search URL '{}': {e}", opts.base_url))
        })?;

        Ok(Self {
            client: build_client(opts)?,
            base_url,
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    #[instrument(skip_all, fields(provider = "duckduckgo", max_results = max_results))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Snippet>> {
        debug!(url = %self.base_url, "querying search backend");

        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ResearcherError::Search(format!("{}: {e}", self.base_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearcherError::Search(format!(
                "{}: HTTP {status}",
                self.base_url
            )));
        }

        let body = response.text().await.map_err(|e| {
            ResearcherError::Search(format!("{}: failed to read body: {e}", self.base_url))
        })?;

        let snippets = parser::parse_results(&body, max_results)?;
        info!(results = snippets.len(), "web search complete");
        Ok(snippets)
    }
}

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &SearchOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| ResearcherError::Search(format!("failed to build HTTP client: {e}")))
}
