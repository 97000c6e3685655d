use super::{ShopExtractor, static_url, with_query};
use crate::error::FieldError;
use crate::parsers::fields;
use crate::parsers::html::{self, css};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

static ITEM: LazyLock<Selector> = LazyLock::new(|| css(r#"div[data-name="listingTile"]"#));
static LINK: LazyLock<Selector> = LazyLock::new(|| css("a[title]"));
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| css(r#"div[data-name="listingPrice"] div[data-price-type="final"]"#));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| css("img"));
static CODES: LazyLock<Selector> = LazyLock::new(|| css("div.mt-6.hidden p"));
static ACCORDION_ROW: LazyLock<Selector> =
    LazyLock::new(|| css(r#"div[data-role="accordion"] div.py-4 div.py-1"#));
static SPAN: LazyLock<Selector> = LazyLock::new(|| css("span"));
static REVIEW: LazyLock<Selector> = LazyLock::new(|| css("p.text-base.leading-none"));
static REVIEW_SCORE: LazyLock<Selector> = LazyLock::new(|| css("span.font-bold"));
static REVIEW_COUNT: LazyLock<Selector> = LazyLock::new(|| css("span:not(.font-bold)"));
static NEXT: LazyLock<Selector> =
    LazyLock::new(|| css(r#"a[aria-label="nawiguj do następnej strony"]"#));
static ATTRIBUTES: LazyLock<Selector> =
    LazyLock::new(|| css(r#"div[data-name="productAttributes"] div.mt-4, div[data-name="productAttributes"] div.space-y-2"#));
static P: LazyLock<Selector> = LazyLock::new(|| css("p"));
static LABEL: LazyLock<Selector> = LazyLock::new(|| css("label"));
static CHECKED_INPUT: LazyLock<Selector> = LazyLock::new(|| css("input[checked]"));

/// komputronik.pl: server-rendered listing with codes and key specs on every tile
pub struct Komputronik;

impl ShopExtractor for Komputronik {
    fn name(&self) -> &'static str {
        "komputronik"
    }

    fn base_url(&self) -> Url {
        static_url("https://www.komputronik.pl")
    }

    fn listing_url(&self) -> Url {
        static_url("https://www.komputronik.pl/category/1596/telefony.html")
    }

    fn page_url(&self, listing: &Url, page: u32) -> Url {
        if page <= 1 {
            listing.clone()
        } else {
            with_query(listing, "p", &page.to_string())
        }
    }

    fn item_selector(&self) -> &Selector {
        &ITEM
    }

    fn needs_browser(&self) -> bool {
        false
    }

    fn extract_title(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_attr(item, &LINK, "title")
    }

    fn extract_link(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_attr(item, &LINK, "href")
    }

    fn extract_price(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_text(item, &PRICE)
    }

    fn extract_rating(&self, item: ElementRef<'_>) -> Result<Option<f32>, FieldError> {
        let Some(review) = item.select(&REVIEW).next() else {
            return Ok(None);
        };
        match html::first_text(review, &REVIEW_SCORE) {
            Some(score) => fields::parse_rating(&score).map(Some),
            None => Ok(None),
        }
    }

    fn extract_review_count(&self, item: ElementRef<'_>) -> Result<Option<u32>, FieldError> {
        let Some(review) = item.select(&REVIEW).next() else {
            return Ok(None);
        };
        match html::first_text(review, &REVIEW_COUNT) {
            Some(count) => fields::parse_count(&count).map(Some),
            None => Ok(None),
        }
    }

    fn extract_tech_details(&self, item: ElementRef<'_>) -> BTreeMap<String, String> {
        let mut extra = BTreeMap::new();

        if let Some(src) = html::first_attr(item, &IMAGE, "src") {
            extra.insert("image_url".to_string(), src);
        }

        // visible system/producer codes, "Kod producenta: SM-A556B"
        for p in item.select(&CODES) {
            let text = html::text_of(p);
            if let Some((key, value)) = text.split_once(':') {
                extra.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        for row in item.select(&ACCORDION_ROW) {
            let spans: Vec<_> = row.select(&SPAN).map(html::text_of).collect();
            if let [key, value, ..] = spans.as_slice() {
                extra.insert(html::strip_colon(key), value.clone());
            }
        }

        extra
    }

    fn has_next_page(&self, doc: &Html, _page: u32, _item_count: usize) -> bool {
        html::exists(doc, &NEXT)
    }

    fn product_details(&self, doc: &Html) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        for group in doc.select(&ATTRIBUTES) {
            if let Some(key) = html::first_text(group, &P) {
                // option pickers show every choice, the checked one is the product's
                let labels: Vec<_> = group.select(&LABEL).collect();
                let value = labels
                    .iter()
                    .find(|label| html::count(**label, &CHECKED_INPUT) > 0)
                    .or(labels.first())
                    .and_then(|label| html::first_text(*label, &SPAN));
                if let Some(value) = value {
                    details.insert(html::strip_colon(&key), value);
                }
                continue;
            }
            let spans: Vec<_> = group.select(&SPAN).map(html::text_of).collect();
            if let [key, value, ..] = spans.as_slice() {
                details.insert(html::strip_colon(key), value.clone());
            }
        }
        details
    }
}
