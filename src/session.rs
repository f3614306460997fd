#![forbid(unsafe_code)]

//! Browser automation seam. Components borrow a `BrowserSession` instead of
//! reaching for a shared driver, which keeps every run self-contained and
//! lets tests script the page.

use async_trait::async_trait;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation to {url} exceeded {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("lost connection to the browser: {0}")]
    Disconnected(String),
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("browser error: {0}")]
    Other(String),
}

impl SessionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout { .. })
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, SessionError::Disconnected(_))
    }
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Loads `url`, failing with `SessionError::Timeout` when the page does
    /// not finish loading in the session's bounded time.
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// Runs a script in the page and returns whatever it `return`s.
    async fn evaluate(&self, script: &str) -> Result<Value, SessionError>;

    async fn current_url(&self) -> Result<String, SessionError>;

    async fn title(&self) -> Result<String, SessionError>;

    /// `href` attribute of every element matching `selector`, in document
    /// order. Elements without the attribute yield `None`.
    async fn anchor_hrefs(&self, selector: &str) -> Result<Vec<Option<String>>, SessionError>;

    async fn quit(&self) -> Result<(), SessionError>;
}

/// Parameters for opening a WebDriver session.
#[derive(Debug, Clone)]
pub struct WebDriverOptions {
    pub webdriver_url: String,
    pub page_load_timeout: Duration,
    pub headless: bool,
}

/// Session backed by a W3C WebDriver server (chromedriver, geckodriver).
pub struct WebDriverSession {
    client: Client,
    page_load_timeout: Duration,
}

impl WebDriverSession {
    pub async fn connect(options: &WebDriverOptions) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = ClientBuilder::native()
            .capabilities(browser_capabilities(options.headless))
            .connect(&options.webdriver_url)
            .await
            .with_context(|| format!("connecting to WebDriver at {}", options.webdriver_url))?;

        client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(options.page_load_timeout),
                None,
            ))
            .await
            .context("configuring page load timeout")?;

        tracing::info!(webdriver = %options.webdriver_url, "browser session started");
        Ok(Self {
            client,
            page_load_timeout: options.page_load_timeout,
        })
    }

    fn map_error(&self, url: &str, err: CmdError) -> SessionError {
        match err {
            CmdError::Standard(ref wd) if wd.error == ErrorStatus::Timeout => SessionError::Timeout {
                url: url.to_string(),
                timeout: self.page_load_timeout,
            },
            CmdError::Standard(ref wd)
                if matches!(
                    wd.error,
                    ErrorStatus::JavascriptError | ErrorStatus::ScriptTimeout
                ) =>
            {
                SessionError::Script(err.to_string())
            }
            CmdError::Lost(_) => SessionError::Disconnected(err.to_string()),
            other => SessionError::Other(other.to_string()),
        }
    }
}

/// Chrome and Firefox both get a headless flag; the driver ignores the block
/// that is not meant for it.
fn browser_capabilities(headless: bool) -> Map<String, Value> {
    let mut caps = Map::new();
    if headless {
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": ["--headless=new", "--disable-gpu"] }),
        );
        caps.insert(
            "moz:firefoxOptions".to_string(),
            json!({ "args": ["-headless"] }),
        );
    }
    caps
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        // The driver enforces the page load timeout too, but a wedged driver
        // must not hang the run.
        let grace = self.page_load_timeout + Duration::from_secs(5);
        match tokio::time::timeout(grace, self.client.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(self.map_error(url, err)),
            Err(_) => Err(SessionError::Timeout {
                url: url.to_string(),
                timeout: self.page_load_timeout,
            }),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value, SessionError> {
        self.client
            .execute(script, Vec::new())
            .await
            .map_err(|err| self.map_error("<script>", err))
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(|err| self.map_error("<current url>", err))
    }

    async fn title(&self) -> Result<String, SessionError> {
        self.client
            .title()
            .await
            .map_err(|err| self.map_error("<title>", err))
    }

    async fn anchor_hrefs(&self, selector: &str) -> Result<Vec<Option<String>>, SessionError> {
        let elements = self
            .client
            .find_all(Locator::Css(selector))
            .await
            .map_err(|err| self.map_error(selector, err))?;

        let mut hrefs = Vec::with_capacity(elements.len());
        for element in elements {
            match element.attr("href").await {
                Ok(href) => hrefs.push(href),
                // Re-rendered thumbnails go stale between lookup and read.
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable anchor");
                    hrefs.push(None);
                }
            }
        }
        Ok(hrefs)
    }

    async fn quit(&self) -> Result<(), SessionError> {
        self.client
            .clone()
            .close()
            .await
            .map_err(|err| self.map_error("<close>", err))
    }
}

/// Scripted page used by the validator, harvester and app tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// How a scripted navigation behaves.
    #[derive(Debug, Clone)]
    pub enum Landing {
        /// Loads and reports the given URL and title.
        Page { url: String, title: String },
        Timeout,
        Refused,
    }

    #[derive(Default)]
    struct State {
        current_url: String,
        title: String,
        scrolls: Vec<u64>,
        navigations: Vec<String>,
        quit: bool,
    }

    /// A lazily loading listing page: `heights[i]` is the scroll height after
    /// the `i+1`-th scroll, the last value repeating once content runs out.
    pub struct FakeSession {
        landings: HashMap<String, Landing>,
        pub viewport: u64,
        pub initial_height: u64,
        pub heights: Vec<u64>,
        pub anchors: Vec<Option<String>>,
        pub fail_evaluate_after: Option<usize>,
        state: Mutex<State>,
    }

    impl FakeSession {
        pub fn new() -> Self {
            Self {
                landings: HashMap::new(),
                viewport: 1000,
                initial_height: 1000,
                heights: Vec::new(),
                anchors: Vec::new(),
                fail_evaluate_after: None,
                state: Mutex::new(State::default()),
            }
        }

        pub fn with_page(mut self, url: &str, title: &str) -> Self {
            self.landings.insert(
                url.to_string(),
                Landing::Page {
                    url: url.to_string(),
                    title: title.to_string(),
                },
            );
            self
        }

        pub fn with_landing(mut self, url: &str, landing: Landing) -> Self {
            self.landings.insert(url.to_string(), landing);
            self
        }

        pub fn with_listing(mut self, heights: Vec<u64>, anchors: Vec<Option<String>>) -> Self {
            self.heights = heights;
            self.anchors = anchors;
            self
        }

        pub fn scrolls(&self) -> Vec<u64> {
            self.state.lock().unwrap().scrolls.clone()
        }

        pub fn navigations(&self) -> Vec<String> {
            self.state.lock().unwrap().navigations.clone()
        }

        pub fn was_quit(&self) -> bool {
            self.state.lock().unwrap().quit
        }

        fn scroll_height(&self, scrolls: usize) -> u64 {
            if scrolls == 0 || self.heights.is_empty() {
                return self.initial_height;
            }
            let index = (scrolls - 1).min(self.heights.len() - 1);
            self.heights[index]
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn navigate(&self, url: &str) -> Result<(), SessionError> {
            let mut state = self.state.lock().unwrap();
            state.navigations.push(url.to_string());
            match self.landings.get(url) {
                Some(Landing::Page { url, title }) => {
                    state.current_url = url.clone();
                    state.title = title.clone();
                    state.scrolls.clear();
                    Ok(())
                }
                Some(Landing::Timeout) => Err(SessionError::Timeout {
                    url: url.to_string(),
                    timeout: Duration::from_secs(30),
                }),
                Some(Landing::Refused) => {
                    Err(SessionError::Disconnected("connection refused".into()))
                }
                None => {
                    state.current_url = crate::channel::YOUTUBE_404.to_string();
                    state.title = "404 Not Found".to_string();
                    Ok(())
                }
            }
        }

        async fn evaluate(&self, script: &str) -> Result<Value, SessionError> {
            let mut state = self.state.lock().unwrap();
            if let Some(limit) = self.fail_evaluate_after
                && state.scrolls.len() >= limit
            {
                return Err(SessionError::Disconnected("connection refused".into()));
            }
            if script.contains("window.screen.height") {
                return Ok(json!(self.viewport));
            }
            if let Some(rest) = script.strip_prefix("window.scrollTo(0, ") {
                let target = rest
                    .trim_end_matches(';')
                    .trim_end_matches(')')
                    .parse::<u64>()
                    .map_err(|err| SessionError::Script(err.to_string()))?;
                state.scrolls.push(target);
                return Ok(Value::Null);
            }
            if script.contains("scrollHeight") {
                return Ok(json!(self.scroll_height(state.scrolls.len())));
            }
            Err(SessionError::Script(format!("unexpected script: {script}")))
        }

        async fn current_url(&self) -> Result<String, SessionError> {
            Ok(self.state.lock().unwrap().current_url.clone())
        }

        async fn title(&self) -> Result<String, SessionError> {
            Ok(self.state.lock().unwrap().title.clone())
        }

        async fn anchor_hrefs(&self, _selector: &str) -> Result<Vec<Option<String>>, SessionError> {
            Ok(self.anchors.clone())
        }

        async fn quit(&self) -> Result<(), SessionError> {
            self.state.lock().unwrap().quit = true;
            Ok(())
        }
    }
}
