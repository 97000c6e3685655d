use clap::Parser;
use shop_listings::crawlers::details;
use shop_listings::fetchers;
use shop_listings::sink;
use shop_listings::{Listings, ScrapeConfig, Shop, logging, utils};
use std::error::Error;
use std::fs;
use std::time::Instant;

mod args;
use args::{Args, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Parse command-line arguments
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ScrapeConfig::from_file(path)?,
        None => ScrapeConfig::default(),
    };
    let config = args.apply(config.with_env());
    let shop = config
        .shop
        .ok_or("no shop given on the command line or in the config file")?;

    fs::create_dir_all(&config.output_dir)?;
    let date = utils::run_date();

    match args.command {
        Command::Listing { .. } => run_listing(shop, config, &date).await,
        Command::Details { .. } => run_details(shop, config, &date).await,
    }
}

async fn run_listing(shop: Shop, config: ScrapeConfig, date: &str) -> Result<(), Box<dyn Error>> {
    let csv_path = utils::listing_csv_path(&config.output_dir, shop.name(), date);
    let log_path = utils::listing_log_path(&config.output_dir, shop.name(), date);
    logging::init(&log_path)?;

    ::log::info!("Starting scraping of {}", shop);
    ::log::info!("CSV file: {}", csv_path.display());
    ::log::info!("Log file: {}", log_path.display());

    let start_time = Instant::now();
    let listings = Listings::new(shop).with_config(config);
    let fetcher = fetchers::for_shop(shop.extractor(), listings.config())?;
    let stats = match listings.save_csv(fetcher, &csv_path, date).await {
        Ok(stats) => stats,
        Err(e) => {
            ::log::error!("Scraping of {} failed: {}", shop, e);
            return Err(e);
        }
    };

    ::log::info!(
        "Scraping complete - {} records from {} pages in {:.2} seconds ({} failed, {} duplicates, {} coerced fields)",
        stats.records_emitted,
        stats.pages_fetched,
        start_time.elapsed().as_secs_f64(),
        stats.items_failed,
        stats.duplicates,
        stats.coercions
    );
    if let Some(reason) = stats.stop_reason {
        ::log::info!("Stopped because: {}", reason);
    }
    ::log::info!("Data saved to {}", csv_path.display());
    Ok(())
}

async fn run_details(shop: Shop, config: ScrapeConfig, date: &str) -> Result<(), Box<dyn Error>> {
    let log_path = utils::tech_details_log_path(&config.output_dir, shop.name(), date);
    logging::init(&log_path)?;
    ::log::info!("Starting technical details scraping of {}", shop);

    let Some(listing_csv) = utils::latest_listing_csv(&config.output_dir, shop.name())? else {
        ::log::error!(
            "No {}_<date>.csv listing found in {}",
            shop.name(),
            config.output_dir.display()
        );
        return Err(format!("no listing CSV for {shop}").into());
    };
    ::log::info!("Selected CSV file: {}", listing_csv.display());

    let links = sink::product_links(&fs::read_to_string(&listing_csv)?, config.separator);
    let out_path = utils::tech_details_csv_path(&config.output_dir, shop.name(), date);

    let extractor = shop.extractor();
    let fetcher = fetchers::for_shop(extractor, &config)?;
    let stats = match details::save_details(
        fetcher,
        extractor,
        &links,
        config.wait_timeout(),
        &out_path,
        config.separator,
    )
    .await
    {
        Ok(stats) => stats,
        Err(e) => {
            ::log::error!("Technical details of {} failed: {}", shop, e);
            return Err(e);
        }
    };
    ::log::info!(
        "Technical details complete - {} products, {} failed, {} without details",
        stats.products,
        stats.failed,
        stats.without_details
    );
    ::log::info!("Data saved to {}", out_path.display());
    Ok(())
}
