use super::{ShopExtractor, static_url, with_query};
use crate::error::FieldError;
use crate::parsers::fields;
use crate::parsers::html::{self, css};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

static ITEM: LazyLock<Selector> = LazyLock::new(|| css(r#"div[data-test="mms-product-card"]"#));
static TITLE: LazyLock<Selector> = LazyLock::new(|| css(r#"p[data-test="product-title"], p"#));
static LINK: LazyLock<Selector> = LazyLock::new(|| css("a[href]"));
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| css(r#"[data-test="product-price"] span, [data-test="mms-price"] span"#));
static RATING: LazyLock<Selector> = LazyLock::new(|| css(r#"[data-test="mms-customer-rating"]"#));
static RATING_VALUE: LazyLock<Selector> = LazyLock::new(|| css(r#"[data-test="rating-value"]"#));
static RATING_COUNT: LazyLock<Selector> = LazyLock::new(|| css(r#"[data-test="rating-count"]"#));
static FEATURE_ROW: LazyLock<Selector> = LazyLock::new(|| css(r#"[data-test="feature-list"] li"#));
static SPEC_ROW: LazyLock<Selector> = LazyLock::new(|| css(r#"[data-test="mms-accordion-features"] tr"#));
static TD: LazyLock<Selector> = LazyLock::new(|| css("td"));
static SECOND_TD: LazyLock<Selector> = LazyLock::new(|| css("td:nth-of-type(2)"));

/// mediamarkt.pl: lazily loaded grid with no usable pager, paged until a page comes back empty
pub struct MediaMarkt;

impl ShopExtractor for MediaMarkt {
    fn name(&self) -> &'static str {
        "mediamarkt"
    }

    fn base_url(&self) -> Url {
        static_url("https://mediamarkt.pl")
    }

    fn listing_url(&self) -> Url {
        static_url("https://mediamarkt.pl/pl/category/smartfony-25983.html")
    }

    fn page_url(&self, listing: &Url, page: u32) -> Url {
        with_query(listing, "page", &page.max(1).to_string())
    }

    fn item_selector(&self) -> &Selector {
        &ITEM
    }

    fn wait_for(&self) -> Option<&'static str> {
        Some(r#"div[data-test="mms-product-card"]"#)
    }

    fn scroll_to_load(&self) -> bool {
        true
    }

    fn extract_title(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_text(item, &TITLE)
    }

    fn extract_link(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_attr(item, &LINK, "href")
    }

    fn extract_price(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_text(item, &PRICE)
    }

    fn extract_rating(&self, item: ElementRef<'_>) -> Result<Option<f32>, FieldError> {
        let Some(block) = item.select(&RATING).next() else {
            return Ok(None);
        };
        match html::first_text(block, &RATING_VALUE) {
            Some(text) => fields::parse_rating(&text).map(Some),
            None => Ok(None),
        }
    }

    fn extract_review_count(&self, item: ElementRef<'_>) -> Result<Option<u32>, FieldError> {
        let Some(block) = item.select(&RATING).next() else {
            return Ok(None);
        };
        match html::first_text(block, &RATING_COUNT) {
            Some(text) => fields::parse_count(&text).map(Some),
            None => Ok(Some(0)),
        }
    }

    fn extract_tech_details(&self, item: ElementRef<'_>) -> BTreeMap<String, String> {
        item.select(&FEATURE_ROW)
            .filter_map(|row| {
                let text = html::text_of(row);
                let (key, value) = text.split_once(':')?;
                Some((html::strip_colon(key), value.trim().to_string()))
            })
            .filter(|(key, value)| !key.is_empty() && !value.is_empty())
            .collect()
    }

    /// The listing has no reliable "next" control: keep going while pages have items
    fn has_next_page(&self, _doc: &Html, _page: u32, item_count: usize) -> bool {
        item_count > 0
    }

    fn product_details(&self, doc: &Html) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        for row in doc.select(&SPEC_ROW) {
            let (Some(key), Some(value)) =
                (html::first_text(row, &TD), html::first_text(row, &SECOND_TD))
            else {
                continue;
            };
            details.insert(html::strip_colon(&key), value);
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shops::PageContext;

    #[test]
    fn test_extracts_product_card() {
        let doc = html::parse(
            r#"<div data-test="mms-product-card">
                 <a href="https://mediamarkt.pl/pl/product/_smartfon-xiaomi-redmi-note-13-1234.html">
                   <p data-test="product-title">Smartfon XIAOMI Redmi Note 13 8/256GB</p>
                 </a>
                 <div data-test="mms-customer-rating">
                   <span data-test="rating-value">4,6</span><span data-test="rating-count">(312)</span>
                 </div>
                 <ul data-test="feature-list"><li>Pamięć RAM: 8 GB</li><li>Ekran: 6.67"</li></ul>
                 <div data-test="product-price"><span>999,-</span></div>
               </div>"#,
        );
        let shop = MediaMarkt;
        let base = shop.base_url();
        let item = doc.select(shop.item_selector()).next().unwrap();
        let mut ctx = PageContext::new(1, &base);
        let record = shop.extract(item, &mut ctx).unwrap();

        assert_eq!(record.title, "Smartfon XIAOMI Redmi Note 13 8/256GB");
        assert_eq!(record.price, 999.0);
        assert_eq!(record.rating, Some(4.6));
        assert_eq!(record.review_count, Some(312));
        assert_eq!(record.extra["Pamięć RAM"], "8 GB");
        assert!(ctx.coercions.is_empty());
    }

    #[test]
    fn test_pages_until_empty() {
        let shop = MediaMarkt;
        let doc = html::parse("<div></div>");
        assert!(shop.has_next_page(&doc, 4, 12));
        assert!(!shop.has_next_page(&doc, 5, 0));
        assert_eq!(
            shop.page_url(&shop.listing_url(), 1).as_str(),
            "https://mediamarkt.pl/pl/category/smartfony-25983.html?page=1"
        );
    }

    #[test]
    fn test_product_details_rows() {
        let doc = html::parse(
            r#"<div data-test="mms-accordion-features"><table>
                 <tr><td>Procesor</td><td>Snapdragon 685</td></tr>
                 <tr><td>Wersja systemu</td><td>Android 13</td></tr>
                 <tr><td>Pusty</td></tr>
               </table></div>"#,
        );
        let details = MediaMarkt.product_details(&doc);
        assert_eq!(details.len(), 2);
        assert_eq!(details["Procesor"], "Snapdragon 685");
    }
}
