use clap::{Parser, Subcommand};
use shop_listings::{ScrapeConfig, Shop};
use std::path::PathBuf;

/// Session refresh cadence of the details pass when none is configured
const DETAILS_REFRESH_EVERY: u32 = 10;

#[derive(Parser, Debug)]
#[command(name = "shop-listings")]
#[command(about = "Scrapes phone listings and technical details from Polish electronics shops")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for CSV and log files
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// WebDriver server URL (WEBDRIVER_URL also works)
    #[arg(long, global = true)]
    pub webdriver_url: Option<String>,

    /// Pause between page fetches in milliseconds
    #[arg(long, global = true)]
    pub delay_ms: Option<u64>,

    /// Extra attempts for a failed page fetch
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Write tab-separated files instead of comma-separated
    #[arg(long, global = true)]
    pub tsv: bool,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headed: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape listing pages into {shop}_{date}.csv
    Listing {
        /// Shop to scrape (falls back to the config file)
        #[arg(value_enum)]
        shop: Option<Shop>,

        /// Safety cap on listing pages
        #[arg(short, long)]
        max_pages: Option<u32>,

        /// Start from this listing page instead of the shop's default
        #[arg(long)]
        listing_url: Option<String>,
    },

    /// Scrape product pages named in the latest listing CSV into tech_details_{shop}_{date}.csv
    Details {
        /// Shop whose listing to read (falls back to the config file)
        #[arg(value_enum)]
        shop: Option<Shop>,

        /// Reopen the browser session after this many products
        #[arg(long)]
        refresh_every: Option<u32>,
    },
}

impl Args {
    pub fn shop(&self) -> Option<Shop> {
        match &self.command {
            Command::Listing { shop, .. } | Command::Details { shop, .. } => *shop,
        }
    }

    /// Apply command-line overrides on top of the file configuration
    pub fn apply(&self, mut config: ScrapeConfig) -> ScrapeConfig {
        if let Some(shop) = self.shop() {
            config.shop = Some(shop);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(url) = &self.webdriver_url {
            config.webdriver_url = url.clone();
        }
        if let Some(delay) = self.delay_ms {
            config.page_delay_ms = delay;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if self.tsv {
            config.separator = '\t';
        }
        if self.headed {
            config.headless = false;
        }

        match &self.command {
            Command::Listing {
                max_pages,
                listing_url,
                ..
            } => {
                if let Some(max_pages) = max_pages {
                    config.max_pages = *max_pages;
                }
                if let Some(url) = listing_url {
                    config.listing_url = Some(url.clone());
                }
            }
            Command::Details { refresh_every, .. } => {
                config.session_refresh_every = match refresh_every {
                    Some(every) => *every,
                    None if config.session_refresh_every == 0 => DETAILS_REFRESH_EVERY,
                    None => config.session_refresh_every,
                };
            }
        }
        config
    }
}
