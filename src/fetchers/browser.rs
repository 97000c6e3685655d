use super::{FetchRequest, PageFetcher};
use crate::config::ScrapeConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

/// Common WebDriver endpoints tried when the configured one is unreachable
const FALLBACK_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444", // geckodriver by IP instead of localhost
];

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";
const SCROLL_SETTLE: Duration = Duration::from_millis(750);

/// Renders pages in a WebDriver session.
///
/// The session is opened lazily on the first fetch, reopened once when the
/// driver reports it lost, and recycled every `session_refresh_every` fetches
/// when that is non-zero.
pub struct BrowserFetcher {
    webdriver_url: String,
    headless: bool,
    page_load_timeout: Duration,
    scroll_passes: u32,
    session_refresh_every: u32,
    clear_cookies: bool,
    client: Option<Client>,
    fetches_in_session: u32,
}

impl BrowserFetcher {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            headless: config.headless,
            page_load_timeout: config.request_timeout(),
            scroll_passes: config.scroll_passes,
            session_refresh_every: config.session_refresh_every,
            clear_cookies: config.clear_cookies,
            client: None,
            fetches_in_session: 0,
        }
    }

    /// The current session, connecting first when there is none
    async fn session(&mut self) -> Result<&Client, FetchError> {
        if self.client.is_none() {
            let client = connect(&self.webdriver_url, self.headless).await?;
            self.fetches_in_session = 0;
            self.client = Some(client);
        }
        self.client
            .as_ref()
            .ok_or_else(|| FetchError::Connect("no WebDriver session".to_string()))
    }

    async fn end_session(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver session: {}", e);
            }
        }
        self.fetches_in_session = 0;
    }

    async fn refresh_if_due(&mut self) {
        if self.session_refresh_every > 0
            && self.client.is_some()
            && self.fetches_in_session >= self.session_refresh_every
        {
            ::log::info!(
                "Refreshing WebDriver session after {} fetches",
                self.fetches_in_session
            );
            self.end_session().await;
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn open(&mut self) -> Result<(), FetchError> {
        self.session().await.map(|_| ())
    }

    async fn fetch(&mut self, request: &FetchRequest) -> Result<String, FetchError> {
        self.refresh_if_due().await;

        let page_load_timeout = self.page_load_timeout;
        let scroll_passes = if request.scroll { self.scroll_passes } else { 0 };

        let mut result = Err(FetchError::SessionLost(request.url.to_string()));
        for attempt in 0..2 {
            if attempt > 0 {
                ::log::warn!("Attempting to reconnect WebDriver session");
                // the old session is gone server-side, dropping it is enough
                self.client = None;
            }
            let client = self.session().await?;
            result = load(client, request, page_load_timeout, scroll_passes).await;
            if !matches!(result, Err(FetchError::SessionLost(_))) {
                break;
            }
        }

        if result.is_ok() {
            self.fetches_in_session += 1;
            if self.clear_cookies {
                if let Some(client) = &self.client {
                    if let Err(e) = client.delete_all_cookies().await {
                        ::log::warn!("Failed to clear cookies: {}", e);
                    }
                }
            }
        }
        result
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        match self.client.take() {
            Some(client) => client
                .close()
                .await
                .map_err(|e| FetchError::Connect(format!("closing session: {e}"))),
            None => Ok(()),
        }
    }
}

/// Navigate, wait for the shop's content, optionally scroll, then read the source
async fn load(
    client: &Client,
    request: &FetchRequest,
    page_load_timeout: Duration,
    scroll_passes: u32,
) -> Result<String, FetchError> {
    let url = request.url.as_str();
    ::log::debug!("SCRAPE: {}", url);

    match timeout(page_load_timeout, client.goto(url)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(command_error(e, "accessing", url)),
        Err(_) => return Err(FetchError::Timeout(url.to_string())),
    }

    if let Some(selector) = &request.wait_for {
        let waited = client
            .wait()
            .at_most(request.timeout)
            .for_element(Locator::Css(selector))
            .await;
        if let Err(e) = waited {
            // an empty listing never shows the selector, let the caller see the page
            ::log::warn!("Gave up waiting for {} on {}: {}", selector, url, e);
        }
    }

    for pass in 0..scroll_passes {
        ::log::trace!("Scroll pass {} on {}", pass + 1, url);
        client
            .execute(SCROLL_SCRIPT, vec![])
            .await
            .map_err(|e| command_error(e, "scrolling", url))?;
        tokio::time::sleep(SCROLL_SETTLE).await;
    }

    client
        .source()
        .await
        .map_err(|e| command_error(e, "getting source for", url))
}

/// Connects to the configured WebDriver, then to the common fallbacks
async fn connect(webdriver_url: &str, headless: bool) -> Result<Client, FetchError> {
    match open_session(webdriver_url, headless).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
        }
    }

    for url in FALLBACK_URLS {
        if url == webdriver_url {
            continue;
        }
        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = open_session(url, headless).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(FetchError::Connect(format!(
        "no WebDriver reachable at {webdriver_url} or the fallback ports"
    )))
}

async fn open_session(
    url: &str,
    headless: bool,
) -> Result<Client, fantoccini::error::NewSessionError> {
    let mut builder = ClientBuilder::native();
    if headless {
        let capabilities = json!({
            "moz:firefoxOptions": { "args": ["-headless"] },
            "goog:chromeOptions": { "args": ["--headless=new", "--disable-gpu"] },
        });
        if let serde_json::Value::Object(map) = capabilities {
            builder.capabilities(map);
        }
    }
    builder.connect(url).await
}

/// Classify a WebDriver command failure
fn command_error(error: fantoccini::error::CmdError, context: &str, url: &str) -> FetchError {
    let message = error.to_string();
    if message.contains("Unable to find session") || message.contains("invalid session id") {
        ::log::warn!("Lost session while {} {}", context, url);
        FetchError::SessionLost(url.to_string())
    } else {
        ::log::error!("Failed {} {}: {}", context, url, message);
        FetchError::Navigation {
            url: url.to_string(),
            message,
        }
    }
}
