//! Technical-details pass over product pages found by a listing run.

use crate::fetchers::{FetchRequest, PageFetcher};
use crate::parsers::html;
use crate::results::TechDetailsRecord;
use crate::shops::ShopExtractor;
use crate::sink::TechDetailsSink;
use std::collections::BTreeMap;
use std::error::Error;
use std::io;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailsStats {
    pub products: usize,
    pub failed: usize,
    pub without_details: usize,
}

/// Fetch every product page in `links` and hand one record per link to `emit`,
/// in input order. A page that cannot be fetched yields an empty record and
/// the pass moves on; only a failing `emit` stops it.
pub async fn scrape_details<F, E>(
    fetcher: &mut F,
    shop: &dyn ShopExtractor,
    links: &[String],
    wait_timeout: Duration,
    mut emit: E,
) -> io::Result<DetailsStats>
where
    F: PageFetcher,
    E: FnMut(TechDetailsRecord) -> io::Result<()>,
{
    let mut stats = DetailsStats::default();
    ::log::info!("Found {} products to process", links.len());

    for link in links {
        stats.products += 1;
        ::log::info!("Processing: {}", link);

        let tech_details = match Url::parse(link) {
            Ok(url) => match fetcher.fetch(&FetchRequest::new(url, wait_timeout)).await {
                Ok(markup) => product_details(shop, &markup),
                Err(e) => {
                    stats.failed += 1;
                    ::log::error!("Failed to open {}: {}", link, e);
                    BTreeMap::new()
                }
            },
            Err(e) => {
                stats.failed += 1;
                ::log::error!("Invalid product link {}: {}", link, e);
                BTreeMap::new()
            }
        };

        if tech_details.is_empty() {
            stats.without_details += 1;
            ::log::warn!("No technical details found for {}", link);
        }
        emit(TechDetailsRecord {
            product_link: link.clone(),
            tech_details,
        })?;
    }

    Ok(stats)
}

/// Open `fetcher`, run the pass over `links` into a file at `path`, then close it.
///
/// Nothing is written to `path` unless the fetcher opened, so an earlier file
/// of the same name survives a missing WebDriver.
pub async fn save_details<F: PageFetcher>(
    mut fetcher: F,
    shop: &dyn ShopExtractor,
    links: &[String],
    wait_timeout: Duration,
    path: &Path,
    sep: char,
) -> Result<DetailsStats, Box<dyn Error>> {
    fetcher.open().await?;

    let result = match TechDetailsSink::create(path, sep) {
        Ok(mut out) => scrape_details(&mut fetcher, shop, links, wait_timeout, |record| {
            out.write(&record)
        })
        .await
        .and_then(|stats| out.flush().map(|()| stats)),
        Err(e) => Err(e),
    };
    if let Err(e) = fetcher.close().await {
        ::log::warn!("Failed to close page fetcher: {}", e);
    }
    Ok(result?)
}

fn product_details(shop: &dyn ShopExtractor, markup: &str) -> BTreeMap<String, String> {
    let doc = html::parse(markup);
    shop.product_details(&doc)
}
