pub mod config;
pub mod crawlers;
pub mod error;
pub mod fetchers;
pub mod logging;
pub mod parsers;
pub mod results;
pub mod shops;
pub mod sink;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::ScrapeConfig;
pub use crawlers::listing::{RunStats, StopReason};
pub use results::{ProductRecord, TechDetailsRecord};
pub use shops::{Shop, ShopExtractor};

use crate::crawlers::listing::{self, RunOptions};
use crate::fetchers::PageFetcher;
use crate::sink::{CsvSink, RecordSink};
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Builder for one listing run over a shop
pub struct Listings {
    shop: Shop,
    config: ScrapeConfig,
}

impl Listings {
    /// Create a builder for `shop` with default settings and the
    /// `WEBDRIVER_URL` override applied
    pub fn new(shop: Shop) -> Self {
        Self {
            shop,
            config: ScrapeConfig::default().with_env(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: ScrapeConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a file
    pub fn with_config_file(
        self,
        path: impl AsRef<Path>,
    ) -> Result<Self, error::ConfigError> {
        let config = ScrapeConfig::from_file(path)?.with_env();
        Ok(self.with_config(config))
    }

    /// Load configuration from a string
    pub fn with_config_str(self, config_str: &str) -> Result<Self, error::ConfigError> {
        let config = ScrapeConfig::from_json(config_str)?.with_env();
        Ok(self.with_config(config))
    }

    /// Set the safety cap on listing pages
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Start from another listing page than the shop's default
    pub fn with_listing_url(mut self, url: impl Into<String>) -> Self {
        self.config.listing_url = Some(url.into());
        self
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Open the shop's page fetcher and start the run, returning a receiver
    /// that yields records as they are found and a handle resolving to the
    /// run's counters once the fetcher has been closed
    pub async fn generate(
        self,
    ) -> Result<(mpsc::Receiver<ProductRecord>, JoinHandle<RunStats>), Box<dyn std::error::Error>>
    {
        let fetcher = fetchers::for_shop(self.shop.extractor(), &self.config)?;
        self.start(fetcher).await
    }

    /// Like [`Listings::generate`] with a caller-supplied fetcher
    pub async fn start<F>(
        self,
        mut fetcher: F,
    ) -> Result<(mpsc::Receiver<ProductRecord>, JoinHandle<RunStats>), Box<dyn std::error::Error>>
    where
        F: PageFetcher + 'static,
    {
        let extractor = self.shop.extractor();
        let options = RunOptions {
            listing_url: Some(self.config.listing_url(extractor)?),
            max_pages: self.config.max_pages,
            wait_timeout: self.config.wait_timeout(),
        };

        fetcher.open().await?;
        Ok(listing::start(fetcher, extractor, options))
    }

    /// Run the listing into a CSV file at `path`.
    ///
    /// The file is only created once the fetcher is open, so a run that cannot
    /// reach its WebDriver leaves an earlier file of the same name as it was.
    pub async fn save_csv<F>(
        self,
        fetcher: F,
        path: &Path,
        date: &str,
    ) -> Result<RunStats, Box<dyn std::error::Error>>
    where
        F: PageFetcher + 'static,
    {
        let shop = self.shop;
        let separator = self.config.separator;
        let (mut rx, handle) = self.start(fetcher).await?;

        let mut sink = match CsvSink::create(path, shop.name(), date, separator) {
            Ok(sink) => sink,
            Err(e) => {
                drop(rx);
                handle.await?;
                return Err(e.into());
            }
        };

        let mut write_error = None;
        while let Some(record) = rx.recv().await {
            if let Err(e) = sink.write_record(&record) {
                write_error = Some(e);
                break;
            }
        }
        // lets the run task close the browser session before we report
        drop(rx);
        let stats = handle.await?;

        if let Some(e) = write_error {
            return Err(e.into());
        }
        sink.flush()?;
        Ok(stats)
    }
}
