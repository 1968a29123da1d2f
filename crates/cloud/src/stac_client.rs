//! Async STAC Item Search client.
//!
//! Earth Search is the default catalog. Planetary Computer works the same
//! way but its asset URLs must be signed before they can be read.

use std::fmt;
use std::time::Duration;

use futures::future::try_join_all;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CloudError, Result};
use crate::stac_models::{StacItem, StacItemCollection, StacLink, StacSearchParams};

const EARTH_SEARCH_ROOT: &str = "https://earth-search.aws.element84.com/v1";
const PLANETARY_COMPUTER_ROOT: &str = "https://planetarycomputer.microsoft.com/api/stac/v1";
const PLANETARY_COMPUTER_SIGN: &str = "https://planetarycomputer.microsoft.com/api/sas/v1/sign";
/// Error bodies are cut to this many characters in messages
const BODY_EXCERPT: usize = 300;

/// STAC API endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StacCatalog {
    /// Element 84 Earth Search on AWS
    #[default]
    EarthSearch,
    /// Microsoft Planetary Computer; assets need SAS signing
    PlanetaryComputer,
    /// Any other STAC API root URL
    Custom(String),
}

impl StacCatalog {
    /// `earth-search` / `es`, `planetary-computer` / `pc`, or a root URL.
    pub fn from_str_or_url(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            "pc" | "planetary-computer" | "planetarycomputer" => Self::PlanetaryComputer,
            _ => Self::Custom(s.trim().to_string()),
        }
    }

    pub fn root_url(&self) -> &str {
        match self {
            Self::EarthSearch => EARTH_SEARCH_ROOT,
            Self::PlanetaryComputer => PLANETARY_COMPUTER_ROOT,
            Self::Custom(url) => url.trim_end_matches('/'),
        }
    }

    /// `POST` endpoint for item search
    pub fn search_url(&self) -> String {
        let root = self.root_url();
        if root.ends_with("/search") {
            root.to_string()
        } else {
            format!("{root}/search")
        }
    }

    pub fn needs_signing(&self) -> bool {
        *self == Self::PlanetaryComputer
    }
}

impl fmt::Display for StacCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EarthSearch => f.write_str("earth-search"),
            Self::PlanetaryComputer => f.write_str("planetary-computer"),
            Self::Custom(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StacClientOptions {
    pub request_timeout: Duration,
    /// Retries after a timeout, connection failure or 5xx response
    pub max_retries: u32,
    /// Stop paging once this many items are collected
    pub max_items: usize,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            max_items: 100,
        }
    }
}

/// How to fetch the page a `next` link points at
#[derive(Debug, Clone, PartialEq)]
enum NextPage {
    Get(String),
    Post { url: String, body: Value },
}

impl NextPage {
    /// Resolve a `next` link against the body of the request that produced it.
    fn from_link(link: &StacLink, previous: &StacSearchParams) -> Result<Self> {
        let is_post = link
            .method
            .as_deref()
            .map_or(false, |m| m.eq_ignore_ascii_case("POST"));
        if !is_post {
            return Ok(Self::Get(link.href.clone()));
        }

        let mut body = match (&link.body, link.merge.unwrap_or(false)) {
            (Some(b), false) => return Ok(Self::Post { url: link.href.clone(), body: b.clone() }),
            _ => serde_json::to_value(previous)
                .map_err(|e| CloudError::Network(format!("serializing search body: {e}")))?,
        };
        if let (Some(target), Some(Value::Object(patch))) = (body.as_object_mut(), &link.body) {
            target.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(Self::Post {
            url: link.href.clone(),
            body,
        })
    }
}

/// Async client for STAC Item Search
pub struct StacClient {
    catalog: StacCatalog,
    http: reqwest::Client,
    options: StacClientOptions,
}

impl StacClient {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            catalog,
            http,
            options,
        })
    }

    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }

    /// One page of results.
    pub async fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        let url = self.catalog.search_url();
        debug!(%url, "STAC search");
        self.fetch_page("search", || self.http.post(&url).json(params))
            .await
    }

    /// Follow `next` links until the catalog runs out or `max_items` is reached.
    pub async fn search_all(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        let max = self.options.max_items;
        let mut items = Vec::new();
        let mut page = self.search(params).await?;
        let mut pages = 1;

        loop {
            let next = page.next_link().map(|l| NextPage::from_link(l, params)).transpose()?;
            items.append(&mut page.features);
            if items.len() >= max {
                break;
            }
            let Some(next) = next else { break };

            page = match &next {
                NextPage::Get(url) => self.fetch_page("next page", || self.http.get(url)).await?,
                NextPage::Post { url, body } => {
                    self.fetch_page("next page", || self.http.post(url).json(body))
                        .await?
                }
            };
            pages += 1;
            if page.is_empty() {
                break;
            }
        }

        items.truncate(max);
        debug!(items = items.len(), pages, "STAC search complete");
        Ok(items)
    }

    /// Signed copies of `hrefs`, in order. Unchanged unless the catalog
    /// needs signing.
    pub async fn sign_asset_hrefs(&self, hrefs: &[String]) -> Result<Vec<String>> {
        if !self.catalog.needs_signing() {
            return Ok(hrefs.to_vec());
        }
        try_join_all(hrefs.iter().map(|h| self.sign(h))).await
    }

    async fn sign(&self, href: &str) -> Result<String> {
        let resp = self
            .http
            .get(PLANETARY_COMPUTER_SIGN)
            .query(&[("href", href)])
            .send()
            .await
            .map_err(|e| CloudError::Network(format!("signing request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(http_error("signing", status, resp.text().await.unwrap_or_default()));
        }
        let body: Value = resp.json().await?;
        body.get("href")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CloudError::Network("signing response has no href".into()))
    }

    /// Send the request built by `build`, retrying transient failures with
    /// exponential backoff (500 ms, 1 s, 2 s, ...).
    async fn fetch_page<F>(&self, what: &str, build: F) -> Result<StacItemCollection>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_err = None;
        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(500 << (attempt - 1));
                warn!(attempt, ?delay, "retrying STAC {}", what);
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json::<StacItemCollection>().await.map_err(|e| {
                        CloudError::Network(format!("parsing STAC {what} response: {e}"))
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let err = http_error(what, status, resp.text().await.unwrap_or_default());
                    if status.is_client_error() {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
                Err(e) if e.is_timeout() || e.is_connect() => last_err = Some(e.into()),
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| CloudError::Network(format!("STAC {what} failed"))))
    }
}

fn http_error(what: &str, status: StatusCode, body: String) -> CloudError {
    let excerpt: String = body.chars().take(BODY_EXCERPT).collect();
    CloudError::Network(format!("STAC {what} returned HTTP {status}: {excerpt}"))
}
