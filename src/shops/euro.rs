use super::{ShopExtractor, static_url};
use crate::error::FieldError;
use crate::parsers::fields;
use crate::parsers::html::{self, css};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

static ITEM: LazyLock<Selector> = LazyLock::new(|| css("div.product-medium-box"));
static LINK: LazyLock<Selector> = LazyLock::new(|| css("a.product-medium-box-intro__link"));
static PRICE_TOTAL: LazyLock<Selector> = LazyLock::new(|| css("span.parted-price-total"));
static PRICE_DECIMAL: LazyLock<Selector> = LazyLock::new(|| css("span.parted-price-decimal"));
static RATE: LazyLock<Selector> = LazyLock::new(|| css("span.client-rate__rate"));
static OPINIONS: LazyLock<Selector> = LazyLock::new(|| css("span.client-rate__opinions"));
static SHOW_MORE: LazyLock<Selector> =
    LazyLock::new(|| css(r#"a[data-aut-id="show-more-products-button"]"#));
static SECTION_ROW: LazyLock<Selector> =
    LazyLock::new(|| css("div.technical-attributes div.technical-attributes__section tr"));
static TH: LazyLock<Selector> = LazyLock::new(|| css("th"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| css("span"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| css("a"));

/// euro.com.pl (RTV EURO AGD): "load more" button instead of a pager, prices split in two spans
pub struct RtvEuroAgd;

impl ShopExtractor for RtvEuroAgd {
    fn name(&self) -> &'static str {
        "rtv_euro_agd"
    }

    fn base_url(&self) -> Url {
        static_url("https://www.euro.com.pl")
    }

    fn listing_url(&self) -> Url {
        static_url("https://www.euro.com.pl/telefony-komorkowe.bhtml")
    }

    /// `telefony-komorkowe.bhtml` becomes `telefony-komorkowe,strona-3.bhtml`
    fn page_url(&self, listing: &Url, page: u32) -> Url {
        if page <= 1 {
            return listing.clone();
        }
        let path = listing.path();
        let paged = match path.strip_suffix(".bhtml") {
            Some(stem) => format!("{stem},strona-{page}.bhtml"),
            None => format!("{},strona-{page}", path.trim_end_matches('/')),
        };
        let mut url = listing.clone();
        url.set_path(&paged);
        url
    }

    fn item_selector(&self) -> &Selector {
        &ITEM
    }

    fn wait_for(&self) -> Option<&'static str> {
        Some("div.product-medium-box")
    }

    fn extract_title(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_text(item, &LINK)
    }

    fn extract_link(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_attr(item, &LINK, "href")
    }

    fn extract_price(&self, item: ElementRef<'_>) -> Option<String> {
        let total = html::first_text(item, &PRICE_TOTAL)?;
        match html::first_text(item, &PRICE_DECIMAL) {
            Some(decimal) => Some(format!("{total},{decimal}")),
            None => Some(total),
        }
    }

    fn extract_rating(&self, item: ElementRef<'_>) -> Result<Option<f32>, FieldError> {
        match html::first_text(item, &RATE) {
            Some(rate) => fields::parse_rating(&rate).map(Some),
            None => Ok(None),
        }
    }

    fn extract_review_count(&self, item: ElementRef<'_>) -> Result<Option<u32>, FieldError> {
        match html::first_text(item, &OPINIONS) {
            Some(opinions) => fields::parse_count(&opinions).map(Some),
            None => Ok(None),
        }
    }

    fn has_next_page(&self, doc: &Html, _page: u32, _item_count: usize) -> bool {
        html::exists(doc, &SHOW_MORE)
    }

    /// Rows linking to downloads (manuals, warranty) are not attributes and are skipped
    fn product_details(&self, doc: &Html) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        for row in doc.select(&SECTION_ROW) {
            if html::count(row, &ANCHOR) > 0 {
                ::log::debug!("Skipping attribute row with a link");
                continue;
            }
            match (html::first_text(row, &TH), html::first_text(row, &SPAN)) {
                (Some(key), Some(value)) => {
                    details.insert(html::strip_colon(&key), value);
                }
                _ => ::log::debug!("Skipping attribute row without th or span"),
            }
        }
        details
    }
}
