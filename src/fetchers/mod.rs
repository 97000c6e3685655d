//! Page fetchers.
//!
//! A [`PageFetcher`] turns a URL into page markup. The listing loop and the
//! details pass only see this trait, so pacing, retries, browser sessions and
//! plain HTTP are all interchangeable behind it.

pub mod browser;
pub mod http;
pub mod paced;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;
pub use paced::Paced;

use crate::config::ScrapeConfig;
use crate::error::FetchError;
use crate::shops::ShopExtractor;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// One page to retrieve
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    /// CSS selector to wait for before reading the page (browser only)
    pub wait_for: Option<String>,
    /// How long to wait for `wait_for`
    pub timeout: Duration,
    /// Scroll to the bottom to trigger lazy loading (browser only)
    pub scroll: bool,
}

impl FetchRequest {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            url,
            wait_for: None,
            timeout,
            scroll: false,
        }
    }

    /// Request for a listing page of `shop`, carrying its wait and scroll hints
    pub fn listing(shop: &dyn ShopExtractor, url: Url, timeout: Duration) -> Self {
        Self {
            url,
            wait_for: shop.wait_for().map(str::to_string),
            timeout,
            scroll: shop.scroll_to_load(),
        }
    }
}

#[async_trait]
pub trait PageFetcher: Send {
    /// Acquire whatever the fetcher needs up front, so that a missing
    /// WebDriver is reported before the run starts
    async fn open(&mut self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Retrieve the markup of one page
    async fn fetch(&mut self, request: &FetchRequest) -> Result<String, FetchError>;

    /// Release any session held by the fetcher
    async fn close(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for Box<F> {
    async fn open(&mut self) -> Result<(), FetchError> {
        (**self).open().await
    }

    async fn fetch(&mut self, request: &FetchRequest) -> Result<String, FetchError> {
        (**self).fetch(request).await
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        (**self).close().await
    }
}

/// Build the fetcher stack for `shop`: a browser session when the shop renders
/// its listing with scripts, plain HTTP otherwise, both paced by the config
pub fn for_shop(
    shop: &dyn ShopExtractor,
    config: &ScrapeConfig,
) -> Result<Paced<Box<dyn PageFetcher>>, FetchError> {
    let inner: Box<dyn PageFetcher> = if shop.needs_browser() {
        ::log::info!("Using WebDriver at {} for {}", config.webdriver_url, shop.name());
        Box::new(BrowserFetcher::new(config))
    } else {
        ::log::info!("Using plain HTTP for {}", shop.name());
        Box::new(HttpFetcher::new(config.request_timeout())?)
    };
    Ok(Paced::new(inner, config.page_delay(), config.retries))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory fetcher serving fixed markup per URL and recording every request
    #[derive(Clone, Default)]
    pub struct ScriptedFetcher {
        pages: HashMap<String, Option<String>>,
        requested: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
        unreachable: bool,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `markup` for `url`
        pub fn page(mut self, url: &str, markup: &str) -> Self {
            self.pages.insert(url.to_string(), Some(markup.to_string()));
            self
        }

        /// Fail every request for `url`
        pub fn failing(mut self, url: &str) -> Self {
            self.pages.insert(url.to_string(), None);
            self
        }

        /// Fail `open` the way a missing WebDriver does
        pub fn unreachable(mut self) -> Self {
            self.unreachable = true;
            self
        }

        /// URLs requested so far, in order
        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }

        pub fn was_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn open(&mut self) -> Result<(), FetchError> {
            if self.unreachable {
                return Err(FetchError::Connect("nothing listening".to_string()));
            }
            Ok(())
        }

        async fn fetch(&mut self, request: &FetchRequest) -> Result<String, FetchError> {
            let url = request.url.to_string();
            self.requested.lock().unwrap().push(url.clone());
            match self.pages.get(&url) {
                Some(Some(markup)) => Ok(markup.clone()),
                Some(None) => Err(FetchError::Status { status: 503, url }),
                None => Err(FetchError::Navigation {
                    url,
                    message: "not scripted".to_string(),
                }),
            }
        }

        async fn close(&mut self) -> Result<(), FetchError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
