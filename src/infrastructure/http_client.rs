//! Document fetching with per-attempt sessions and bounded retry
//!
//! Every attempt opens its own [`BrowserSession`] and the session is closed
//! when the attempt ends, whatever the outcome. A page classified as
//! "not found" ends the fetch immediately; transient failures are retried
//! with a linear backoff of `attempt * base_delay`.

#![allow(clippy::uninlined_format_args)]

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::domain::identifier::RetrievalKey;
use crate::infrastructure::config::ScrapingConfig;
use crate::infrastructure::parsing::config::ExtractorSelectors;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Failed to open browser session: {message}")]
    Session { message: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Page load for {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("Title element did not appear on {url} within {waited:?}")]
    TitleMissing { url: String, waited: Duration },

    #[error("HTTP error {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Giving up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

impl FetchError {
    /// Transient failures are worth another attempt; everything else is final
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Session { .. } => true,
            Self::Navigation { .. } => true,
            Self::Timeout { .. } => true,
            Self::TitleMissing { .. } => true,
            Self::Http { status, .. } => {
                *status >= 500
                    || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || *status == StatusCode::REQUEST_TIMEOUT.as_u16()
            }
            Self::RetriesExhausted { .. } => false,
        }
    }
}

/// A page as a session loaded it
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub status: u16,
    /// Text of the document `<title>`, if any
    pub title: Option<String>,
    pub source: String,
}

/// A successfully retrieved product page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Found(FetchedPage),
    /// The site answered with a definitive "no such product"
    NotFound,
}

/// Classification of a loaded page before extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    NotFound,
    Candidate,
}

/// Status 404 or a title mentioning 404 / "not found" is a definitive miss
pub fn classify_page(page: &LoadedPage) -> PageClass {
    if page.status == StatusCode::NOT_FOUND.as_u16() {
        return PageClass::NotFound;
    }
    match &page.title {
        Some(title) if title.contains("404") || title.to_lowercase().contains("not found") => {
            PageClass::NotFound
        }
        _ => PageClass::Candidate,
    }
}

/// One rendering session. Sessions are never shared between attempts.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<LoadedPage, FetchError>;

    /// Whether any of `selectors` matches within `wait`
    async fn wait_for_element(&mut self, selectors: &[String], wait: Duration) -> bool;

    /// Release the session. Called exactly once.
    fn close(&mut self);
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>, FetchError>;
}

/// Closes the wrapped session when dropped
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut dyn BrowserSession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
    }
}

/// Anything that can turn a retrieval key into a page
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, key: &RetrievalKey) -> Result<FetchOutcome, FetchError>;
}

/// Attempt counter and accumulated backoff for one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    elapsed_backoff: Duration,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            elapsed_backoff: Duration::ZERO,
        }
    }

    /// Start the next attempt. Returns `false` once the budget is spent.
    pub fn begin_attempt(&mut self) -> bool {
        if self.attempt >= self.max_attempts {
            return false;
        }
        self.attempt += 1;
        true
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn has_remaining(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Delay after the current failed attempt, recorded as elapsed backoff
    pub fn next_backoff(&mut self, base_delay: Duration) -> Duration {
        let delay = base_delay.saturating_mul(self.attempt);
        self.elapsed_backoff += delay;
        delay
    }

    pub fn elapsed_backoff(&self) -> Duration {
        self.elapsed_backoff
    }
}

/// Fetch behavior derived from the scraping configuration
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub base_url: String,
    pub page_load_timeout: Duration,
    pub element_wait: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub user_agents: Vec<String>,
    pub rotate_user_agents: bool,
    /// Elements whose presence marks a rendered product page
    pub presence_selectors: Vec<String>,
}

impl FetcherConfig {
    pub fn from_scraping(config: &ScrapingConfig) -> Self {
        Self {
            base_url: config.site_base_url.clone(),
            page_load_timeout: config.page_load_timeout(),
            element_wait: config.element_wait(),
            max_attempts: config.max_attempts(),
            base_delay: config.retry_base_delay(),
            user_agents: config
                .user_agents
                .iter()
                .filter(|ua| !ua.trim().is_empty())
                .cloned()
                .collect(),
            rotate_user_agents: config.user_agent_rotation,
            presence_selectors: ExtractorSelectors::default().title,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self::from_scraping(&ScrapingConfig::default())
    }
}

/// Retrieves product pages through a [`SessionFactory`]
pub struct DocumentFetcher<F> {
    factory: F,
    config: FetcherConfig,
}

impl<F: SessionFactory> DocumentFetcher<F> {
    pub fn new(factory: F, config: FetcherConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    fn pick_user_agent(&self) -> &str {
        let agents = &self.config.user_agents;
        if agents.is_empty() {
            return "";
        }
        if self.config.rotate_user_agents {
            &agents[fastrand::usize(..agents.len())]
        } else {
            &agents[0]
        }
    }

    /// One page load in a fresh session
    async fn attempt(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let session = self.factory.open(self.pick_user_agent()).await?;
        let mut guard = SessionGuard::new(session);

        let load_timeout = self.config.page_load_timeout;
        let page = timeout(load_timeout, guard.session().navigate(url, load_timeout))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                after: load_timeout,
            })??;

        if classify_page(&page) == PageClass::NotFound {
            debug!("Page classified as not found: {} (title: {:?})", url, page.title);
            return Ok(FetchOutcome::NotFound);
        }

        if !(200..300).contains(&page.status) {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: page.status,
            });
        }

        let wait = self.config.element_wait;
        let present = timeout(
            wait,
            guard
                .session()
                .wait_for_element(&self.config.presence_selectors, wait),
        )
        .await
        .unwrap_or(false);

        if !present {
            return Err(FetchError::TitleMissing {
                url: url.to_string(),
                waited: wait,
            });
        }

        Ok(FetchOutcome::Found(FetchedPage {
            url: url.to_string(),
            html: page.source,
        }))
    }
}

#[async_trait]
impl<F: SessionFactory> DocumentSource for DocumentFetcher<F> {
    async fn fetch(&self, key: &RetrievalKey) -> Result<FetchOutcome, FetchError> {
        let url = key.url(&self.config.base_url);
        info!("Fetching {}", url);

        let mut state = RetryState::new(self.config.max_attempts);
        let mut last_error: Option<FetchError> = None;

        while state.begin_attempt() {
            match self.attempt(&url).await {
                Ok(outcome) => {
                    debug!("Fetched {} on attempt {}", url, state.attempt());
                    return Ok(outcome);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        "Attempt {}/{} failed for {}: {}",
                        state.attempt(),
                        self.config.max_attempts,
                        url,
                        e
                    );
                    last_error = Some(e);

                    if state.has_remaining() {
                        let delay = state.next_backoff(self.config.base_delay);
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            url,
            attempts: state.attempt(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts allowed".to_string()),
        })
    }
}

/// Text of the first `<title>` element
pub fn document_title(source: &str) -> Option<String> {
    let document = Html::parse_document(source);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
}

/// Whether any valid selector in `selectors` matches `source`
pub fn has_any_element(source: &str, selectors: &[String]) -> bool {
    let document = Html::parse_document(source);
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .any(|selector| document.select(&selector).next().is_some())
}

/// Opens plain HTTP sessions backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    timeout: Duration,
}

impl HttpSessionFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>, FetchError> {
        let client = ClientBuilder::new()
            .timeout(self.timeout)
            .user_agent(user_agent)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Session {
                message: e.to_string(),
            })?;

        Ok(Box::new(HttpSession {
            client: Some(client),
            source: None,
        }))
    }
}

/// A single HTTP "session": its own client and cookie jar
struct HttpSession {
    client: Option<Client>,
    source: Option<String>,
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<LoadedPage, FetchError> {
        let client = self.client.as_ref().ok_or_else(|| FetchError::Session {
            message: "session already closed".to_string(),
        })?;

        let response = client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                        after: timeout,
                    }
                } else {
                    FetchError::Navigation {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let source = response.text().await.map_err(|e| FetchError::Navigation {
            url: url.to_string(),
            message: format!("Failed to read response body: {}", e),
        })?;

        let title = document_title(&source);
        self.source = Some(source.clone());

        Ok(LoadedPage {
            status,
            title,
            source,
        })
    }

    async fn wait_for_element(&mut self, selectors: &[String], _wait: Duration) -> bool {
        // Static markup: the element is either there now or never
        self.source
            .as_deref()
            .is_some_and(|source| has_any_element(source, selectors))
    }

    fn close(&mut self) {
        self.client = None;
        self.source = None;
    }
}
