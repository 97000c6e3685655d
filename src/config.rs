use crate::error::ConfigError;
use crate::shops::{Shop, ShopExtractor};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Configuration for a scraping run.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Retailer to scrape; may also be given on the command line
    #[serde(default)]
    pub shop: Option<Shop>,

    /// Replaces the shop's built-in first listing page
    #[serde(default)]
    pub listing_url: Option<String>,

    /// Safety cap on listing pages per run; 0 fetches nothing
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// How long a browser waits for the shop's content selector
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// Page load / HTTP request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Pause between consecutive fetches
    #[serde(default)]
    pub page_delay_ms: u64,

    /// Extra attempts for a failed fetch before pagination ends
    #[serde(default)]
    pub retries: u32,

    /// Reopen the browser session after this many fetches, 0 for never
    #[serde(default)]
    pub session_refresh_every: u32,

    /// Delete cookies after every browser fetch
    #[serde(default)]
    pub clear_cookies: bool,

    /// Scroll passes on shops with lazily loaded grids
    #[serde(default = "default_scroll_passes")]
    pub scroll_passes: u32,

    /// Directory receiving CSV and log files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Cell separator of the CSV output
    #[serde(default = "default_separator")]
    pub separator: char,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            shop: None,
            listing_url: None,
            max_pages: default_max_pages(),
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            wait_timeout_secs: default_wait_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            page_delay_ms: 0,
            retries: 0,
            session_refresh_every: 0,
            clear_cookies: false,
            scroll_passes: default_scroll_passes(),
            output_dir: default_output_dir(),
            separator: default_separator(),
        }
    }
}

/// Default value for max_pages
fn default_max_pages() -> u32 {
    100
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_wait_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_scroll_passes() -> u32 {
    2
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_separator() -> char {
    ','
}

impl ScrapeConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply the `WEBDRIVER_URL` environment variable when set
    pub fn with_env(self) -> Self {
        self.with_webdriver_override(std::env::var("WEBDRIVER_URL").ok())
    }

    fn with_webdriver_override(mut self, webdriver_url: Option<String>) -> Self {
        if let Some(url) = webdriver_url.filter(|url| !url.trim().is_empty()) {
            self.webdriver_url = url;
        }
        self
    }

    /// First listing page for `shop`, honoring the configured override
    pub fn listing_url(&self, shop: &dyn ShopExtractor) -> Result<Url, ConfigError> {
        match &self.listing_url {
            Some(url) => Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
                url: url.clone(),
                source,
            }),
            None => Ok(shop.listing_url()),
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = ScrapeConfig::from_json("{}").unwrap();
        assert_eq!(config, ScrapeConfig::default());
        assert_eq!(config.max_pages, 100);
        assert_eq!(config.retries, 0);
        assert_eq!(config.separator, ',');
        assert_eq!(config.wait_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_fields_override_defaults() {
        let config = ScrapeConfig::from_json(
            r#"{
                "shop": "rtv-euro-agd",
                "max_pages": 3,
                "page_delay_ms": 1500,
                "retries": 2,
                "separator": "\t",
                "output_dir": "/tmp/listings"
            }"#,
        )
        .unwrap();
        assert_eq!(config.shop, Some(Shop::RtvEuroAgd));
        assert_eq!(config.max_pages, 3);
        assert_eq!(config.page_delay(), Duration::from_millis(1500));
        assert_eq!(config.retries, 2);
        assert_eq!(config.separator, '\t');
        assert_eq!(config.output_dir, PathBuf::from("/tmp/listings"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            ScrapeConfig::from_json(r#"{"max_pages": "many"}"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            ScrapeConfig::from_file("/nonexistent/shop-listings.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_webdriver_override() {
        let config = ScrapeConfig::default()
            .with_webdriver_override(Some("http://selenium:4444".to_string()));
        assert_eq!(config.webdriver_url, "http://selenium:4444");

        let config = ScrapeConfig::default().with_webdriver_override(Some(" ".to_string()));
        assert_eq!(config.webdriver_url, "http://localhost:4444");
    }

    #[test]
    fn test_listing_url_override() {
        let shop = Shop::Komputronik.extractor();
        let mut config = ScrapeConfig::default();
        assert_eq!(config.listing_url(shop).unwrap(), shop.listing_url());

        config.listing_url = Some("https://www.komputronik.pl/category/1099/tablety.html".into());
        assert_eq!(
            config.listing_url(shop).unwrap().path(),
            "/category/1099/tablety.html"
        );

        config.listing_url = Some("not a url".into());
        assert!(matches!(
            config.listing_url(shop),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }
}
