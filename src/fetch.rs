use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::Config;

/// Per-request timeouts. A hung remote can stall one request, never the
/// whole cycle.
const LISTING_TIMEOUT: Duration = Duration::from_secs(10);
const DETAIL_TIMEOUT: Duration = Duration::from_secs(15);

/// Page fetching seam between the orchestrator and the network. The real
/// implementation is `PageClient`; tests substitute canned documents.
pub trait PageSource {
    fn listing_page(&self) -> Result<String>;
    fn detail_page(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP session with the configured user agent.
pub struct PageClient {
    http: reqwest::blocking::Client,
    listing_url: String,
}

impl PageClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            listing_url: config.listing_url.clone(),
        })
    }
}

impl PageSource for PageClient {
    fn listing_page(&self) -> Result<String> {
        let response = self
            .http
            .get(&self.listing_url)
            .timeout(LISTING_TIMEOUT)
            .send()
            .with_context(|| format!("failed to fetch {}", self.listing_url))?
            .error_for_status()
            .context("listing page returned an error status")?;
        response.text().context("failed to read listing page body")
    }

    fn detail_page(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .timeout(DETAIL_TIMEOUT)
            .send()
            .with_context(|| format!("failed to fetch {}", url))?
            .error_for_status()
            .context("detail page returned an error status")?;
        response.text().context("failed to read detail page body")
    }
}

/// Scheme + host of a URL, used to absolutize relative listing links.
pub fn origin_of(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => url.trim_end_matches('/').to_string(),
    }
}
