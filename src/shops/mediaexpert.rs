use super::{ShopExtractor, static_url, with_query};
use crate::error::FieldError;
use crate::parsers::fields;
use crate::parsers::html::{self, css};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

static ITEM: LazyLock<Selector> = LazyLock::new(|| css("div.offer-box"));
static NAME_LINK: LazyLock<Selector> = LazyLock::new(|| css("h2.name a"));
static WHOLE: LazyLock<Selector> = LazyLock::new(|| css("span.whole"));
static CENTS: LazyLock<Selector> = LazyLock::new(|| css("span.cents"));
static RATING: LazyLock<Selector> = LazyLock::new(|| css("div.product-rating"));
static FULL_STAR: LazyLock<Selector> = LazyLock::new(|| css("i.icon-star01.is-filled"));
static HALF_STAR: LazyLock<Selector> = LazyLock::new(|| css("svg.is-half-filled"));
static REVIEWS: LazyLock<Selector> = LazyLock::new(|| css("span.count-number"));
static LAST_PAGE: LazyLock<Selector> = LazyLock::new(|| css("div.lastpage-button"));
static ATTRIBUTES: LazyLock<Selector> = LazyLock::new(|| css("table.list.attributes"));
static ROW: LazyLock<Selector> = LazyLock::new(|| css("tr"));
static TH: LazyLock<Selector> = LazyLock::new(|| css("th"));
static TD: LazyLock<Selector> = LazyLock::new(|| css("td"));

/// mediaexpert.pl: script-rendered grid, star icons, last page number in the pager
pub struct MediaExpert;

impl ShopExtractor for MediaExpert {
    fn name(&self) -> &'static str {
        "mediaexpert"
    }

    fn base_url(&self) -> Url {
        static_url("https://www.mediaexpert.pl")
    }

    fn listing_url(&self) -> Url {
        static_url("https://www.mediaexpert.pl/smartfony-i-zegarki/smartfony")
    }

    fn page_url(&self, listing: &Url, page: u32) -> Url {
        if page <= 1 {
            listing.clone()
        } else {
            with_query(listing, "page", &page.to_string())
        }
    }

    fn item_selector(&self) -> &Selector {
        &ITEM
    }

    fn wait_for(&self) -> Option<&'static str> {
        Some("div.offer-box")
    }

    fn scroll_to_load(&self) -> bool {
        true
    }

    fn extract_title(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_text(item, &NAME_LINK)
    }

    fn extract_link(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_attr(item, &NAME_LINK, "href")
    }

    fn extract_price(&self, item: ElementRef<'_>) -> Option<String> {
        let whole = html::first_text(item, &WHOLE)?;
        let cents = html::first_text(item, &CENTS).unwrap_or_else(|| "00".to_string());
        // whole part keeps its grouping space, so join with an explicit decimal comma
        Some(format!("{whole},{cents}"))
    }

    fn extract_rating(&self, item: ElementRef<'_>) -> Result<Option<f32>, FieldError> {
        let Some(block) = item.select(&RATING).next() else {
            return Ok(None);
        };
        let full = html::count(block, &FULL_STAR);
        let half = html::count(block, &HALF_STAR);
        Ok(Some(fields::star_rating(full, half)))
    }

    fn extract_review_count(&self, item: ElementRef<'_>) -> Result<Option<u32>, FieldError> {
        let Some(block) = item.select(&RATING).next() else {
            return Ok(None);
        };
        match html::first_text(block, &REVIEWS) {
            Some(text) => fields::parse_count(&text).map(Some),
            None => Ok(Some(0)),
        }
    }

    fn has_next_page(&self, doc: &Html, page: u32, _item_count: usize) -> bool {
        let Some(last) = doc.select(&LAST_PAGE).next().map(html::text_of) else {
            ::log::debug!("No last-page button on page {}", page);
            return false;
        };
        match fields::parse_count(&last) {
            Ok(last_page) => last_page > page,
            Err(e) => {
                ::log::warn!("Unreadable last-page button {:?}: {}", last, e);
                false
            }
        }
    }

    fn product_details(&self, doc: &Html) -> BTreeMap<String, String> {
        doc.select(&ATTRIBUTES)
            .flat_map(|table| html::key_value_rows(table, &ROW, &TH, &TD))
            .collect()
    }
}
