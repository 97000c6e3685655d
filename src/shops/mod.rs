//! Per-retailer field extractors.
//!
//! Every shop implements [`ShopExtractor`]. The listing loop only ever talks to
//! that trait, so a shop is selected by configuration through [`Shop`] rather
//! than by its own copy of the pagination code.

pub mod elektromarket;
pub mod euro;
pub mod komputronik;
pub mod mediaexpert;
pub mod mediamarkt;
pub mod morele;
pub mod neonet;

use crate::error::{ConfigError, ExtractionError, FieldError};
use crate::parsers::fields::{self, FieldCoercion};
use crate::results::ProductRecord;
use clap::ValueEnum;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Per-page state handed to the extractor together with each item node
#[derive(Debug)]
pub struct PageContext<'a> {
    /// 1-based page number
    pub page: u32,
    /// Shop base URL used to absolutize relative links
    pub base_url: &'a Url,
    /// Optional fields that fell back to their default for the current item
    pub coercions: Vec<FieldCoercion>,
}

impl<'a> PageContext<'a> {
    pub fn new(page: u32, base_url: &'a Url) -> Self {
        Self {
            page,
            base_url,
            coercions: Vec::new(),
        }
    }

    /// Record that `field` was defaulted
    pub fn coerce(&mut self, field: &'static str, raw: &str, reason: impl ToString) {
        self.coercions.push(FieldCoercion::new(field, raw, reason));
    }
}

/// Site-specific extraction of product fields from listing markup.
///
/// Title and link failures make the whole item fail. Price, availability,
/// rating and review count are optional: their extractors return `Ok(None)`
/// when the shop shows nothing and `Err` when something was shown but could
/// not be parsed, in which case [`ShopExtractor::extract`] applies the
/// documented default and records a coercion.
pub trait ShopExtractor: Send + Sync {
    /// Short name used in output file names
    fn name(&self) -> &'static str;

    /// Scheme and host relative links are resolved against
    fn base_url(&self) -> Url;

    /// First page of the listing
    fn listing_url(&self) -> Url;

    /// URL of listing page `page` (1-based) starting from `listing`
    fn page_url(&self, listing: &Url, page: u32) -> Url;

    /// Selector matching one item node per product
    fn item_selector(&self) -> &Selector;

    /// CSS selector a browser should wait for before reading the page
    fn wait_for(&self) -> Option<&'static str> {
        None
    }

    /// Whether listing pages need script execution
    fn needs_browser(&self) -> bool {
        true
    }

    /// Whether the grid lazily loads more items on scroll
    fn scroll_to_load(&self) -> bool {
        false
    }

    fn extract_title(&self, item: ElementRef<'_>) -> Option<String>;

    /// Raw href or URL of the product page
    fn extract_link(&self, item: ElementRef<'_>) -> Option<String>;

    /// Raw price text; `None` when no price is shown
    fn extract_price(&self, item: ElementRef<'_>) -> Option<String>;

    /// `Some(false)` only when the tile carries the shop's unavailable marker;
    /// shops without such a marker list every product as available
    fn extract_availability(&self, _item: ElementRef<'_>) -> Option<bool> {
        Some(true)
    }

    fn extract_rating(&self, _item: ElementRef<'_>) -> Result<Option<f32>, FieldError> {
        Ok(None)
    }

    fn extract_review_count(&self, _item: ElementRef<'_>) -> Result<Option<u32>, FieldError> {
        Ok(None)
    }

    /// Free-form attributes shown on the listing tile
    fn extract_tech_details(&self, _item: ElementRef<'_>) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Map one item node to a record
    fn extract(
        &self,
        item: ElementRef<'_>,
        ctx: &mut PageContext<'_>,
    ) -> Result<ProductRecord, ExtractionError> {
        let title = self
            .extract_title(item)
            .map(|t| fields::clean_text(&t))
            .filter(|t| !t.is_empty())
            .ok_or(ExtractionError::MissingField("title"))?;
        let href = self
            .extract_link(item)
            .ok_or(ExtractionError::MissingField("product link"))?;

        let mut record = ProductRecord::new(title);
        record.product_link = Some(fields::absolute_link(ctx.base_url, &href)?);
        record.availability = self.extract_availability(item);

        match self.extract_price(item) {
            Some(raw) => match fields::parse_price(&raw) {
                Ok(price) => record.price = price,
                Err(e) => ctx.coerce("price", &raw, e),
            },
            // unavailable products show no price
            None if record.availability == Some(false) => {}
            None => ctx.coerce("price", "", "no price shown"),
        }

        match self.extract_rating(item) {
            Ok(rating) => record.rating = rating,
            Err(e) => ctx.coerce("rating", e.raw(), &e),
        }
        match self.extract_review_count(item) {
            Ok(count) => record.review_count = count,
            Err(e) => ctx.coerce("review_count", e.raw(), &e),
        }

        record.extra = self.extract_tech_details(item);
        Ok(record)
    }

    /// Whether another listing page follows `page`
    fn has_next_page(&self, doc: &Html, page: u32, item_count: usize) -> bool;

    /// Technical attributes from a product page
    fn product_details(&self, _doc: &Html) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Supported retailers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Shop {
    MediaExpert,
    MediaMarkt,
    Morele,
    Komputronik,
    Neonet,
    RtvEuroAgd,
    Elektromarket,
}

impl Shop {
    pub const ALL: [Shop; 7] = [
        Shop::MediaExpert,
        Shop::MediaMarkt,
        Shop::Morele,
        Shop::Komputronik,
        Shop::Neonet,
        Shop::RtvEuroAgd,
        Shop::Elektromarket,
    ];

    /// Field extractors for this shop
    pub fn extractor(self) -> &'static dyn ShopExtractor {
        match self {
            Shop::MediaExpert => &mediaexpert::MediaExpert,
            Shop::MediaMarkt => &mediamarkt::MediaMarkt,
            Shop::Morele => &morele::Morele,
            Shop::Komputronik => &komputronik::Komputronik,
            Shop::Neonet => &neonet::Neonet,
            Shop::RtvEuroAgd => &euro::RtvEuroAgd,
            Shop::Elektromarket => &elektromarket::Elektromarket,
        }
    }

    pub fn name(self) -> &'static str {
        self.extractor().name()
    }
}

impl fmt::Display for Shop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shop {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        Shop::ALL
            .into_iter()
            .find(|shop| shop.name().replace(['-', '_'], "") == wanted)
            .ok_or_else(|| ConfigError::UnknownShop(s.to_string()))
    }
}

/// Parse a constant URL owned by a shop adapter
pub(crate) fn static_url(url: &str) -> Url {
    Url::parse(url).unwrap_or_else(|e| panic!("invalid shop URL {url:?}: {e}"))
}

/// Copy of `listing` with `key=value` set in the query, other pairs kept in order
pub(crate) fn with_query(listing: &Url, key: &str, value: &str) -> Url {
    let kept: Vec<(String, String)> = listing
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut url = listing.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);
    url
}
