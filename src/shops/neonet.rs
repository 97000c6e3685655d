use super::{ShopExtractor, static_url, with_query};
use crate::error::FieldError;
use crate::parsers::fields;
use crate::parsers::html::{self, css};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

static ITEM: LazyLock<Selector> = LazyLock::new(|| css("section[data-neonet-product-id]"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| css(r#"h2[class*="listingItemHeaderScss-name"]"#));
static LINK: LazyLock<Selector> = LazyLock::new(|| css("a[href]"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| css(r#"span[data-marker="UIPriceSimple"]"#));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| css("img"));
static RATING: LazyLock<Selector> =
    LazyLock::new(|| css(r#"section[class*="ratingStarsScss-wrapper"]"#));
static RATING_BAR: LazyLock<Selector> =
    LazyLock::new(|| css(r#"span[class*="ratingStarsScss-rating"]"#));
static RATING_COUNT: LazyLock<Selector> =
    LazyLock::new(|| css(r#"span[class*="ratingStarsScss-count"]"#));
static PAGE_COUNT: LazyLock<Selector> = LazyLock::new(|| {
    css(r#"section[class*="listingPaginationScss-paginationSection"] input[type="number"]"#)
});
static SPEC_ROW: LazyLock<Selector> =
    LazyLock::new(|| css(r#"table[data-id="tableFeaturedTechnicalSpecifications"] tr"#));
static FIRST_TD: LazyLock<Selector> = LazyLock::new(|| css("td:nth-of-type(1)"));
static SECOND_TD: LazyLock<Selector> = LazyLock::new(|| css("td:nth-of-type(2)"));

/// neonet.pl: lazily loaded grid, star bar widths, total page count in the pager input
pub struct Neonet;

impl ShopExtractor for Neonet {
    fn name(&self) -> &'static str {
        "neonet"
    }

    fn base_url(&self) -> Url {
        static_url("https://www.neonet.pl")
    }

    fn listing_url(&self) -> Url {
        static_url("https://www.neonet.pl/smartfony-i-navi/smartfony.html")
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

    fn wait_for(&self) -> Option<&'static str> {
        Some("section[data-neonet-product-id]")
    }

    fn scroll_to_load(&self) -> bool {
        true
    }

    fn extract_title(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_text(item, &TITLE)
    }

    /// The anchor wrapping the product name, falling back to the first link on the tile
    fn extract_link(&self, item: ElementRef<'_>) -> Option<String> {
        item.select(&LINK)
            .find(|a| html::count(*a, &TITLE) > 0)
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
            .or_else(|| html::first_attr(item, &LINK, "href"))
    }

    fn extract_price(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_text(item, &PRICE)
    }

    fn extract_rating(&self, item: ElementRef<'_>) -> Result<Option<f32>, FieldError> {
        let Some(block) = item.select(&RATING).next() else {
            return Ok(None);
        };
        match html::first_attr(block, &RATING_BAR, "style") {
            Some(style) => fields::rating_from_width(&style).map(Some),
            None => Ok(None),
        }
    }

    fn extract_review_count(&self, item: ElementRef<'_>) -> Result<Option<u32>, FieldError> {
        let Some(block) = item.select(&RATING).next() else {
            return Ok(None);
        };
        match html::first_text(block, &RATING_COUNT) {
            Some(text) => fields::parse_count(&text).map(Some),
            None => Ok(None),
        }
    }

    fn extract_tech_details(&self, item: ElementRef<'_>) -> BTreeMap<String, String> {
        html::first_attr(item, &IMAGE, "src")
            .map(|src| BTreeMap::from([("image_url".to_string(), src)]))
            .unwrap_or_default()
    }

    fn has_next_page(&self, doc: &Html, page: u32, _item_count: usize) -> bool {
        let max = doc
            .select(&PAGE_COUNT)
            .next()
            .and_then(|input| input.value().attr("max"))
            .and_then(|max| max.trim().parse::<u32>().ok());
        match max {
            Some(max) => max > page,
            None => {
                ::log::debug!("No page count on page {}, assuming a single page", page);
                false
            }
        }
    }

    fn product_details(&self, doc: &Html) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        for row in doc.select(&SPEC_ROW) {
            if let (Some(key), Some(value)) =
                (html::first_text(row, &FIRST_TD), html::first_text(row, &SECOND_TD))
            {
                details.insert(html::strip_colon(&key), value);
            }
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shops::PageContext;

    const LISTING: &str = r#"
        <section data-neonet-product-id="1001">
          <a href="/smartfony/motorola-moto-g84.html">
            <h2 class="listingItemHeaderScss-name-2Ae">Motorola moto g84 5G 12/256GB</h2>
          </a>
          <img src="https://www.neonet.pl/img/g84.jpg">
          <section class="ratingStarsScss-wrapper-1mq">
            <span class="ratingStarsScss-rating-3xe" style="width: 90%;"></span>
            <span class="ratingStarsScss-count-1T-">(17)</span>
          </section>
          <span data-marker="UIPriceSimple">899,00 zł</span>
        </section>
        <section class="listingPaginationScss-paginationSection-1VV"><input type="number" min="1" max="9"></section>"#;

    #[test]
    fn test_extracts_product_section() {
        let doc = html::parse(LISTING);
        let shop = Neonet;
        let base = shop.base_url();
        let item = doc.select(shop.item_selector()).next().unwrap();
        let mut ctx = PageContext::new(1, &base);
        let record = shop.extract(item, &mut ctx).unwrap();

        assert_eq!(record.title, "Motorola moto g84 5G 12/256GB");
        assert_eq!(
            record.product_link.as_deref(),
            Some("https://www.neonet.pl/smartfony/motorola-moto-g84.html")
        );
        assert_eq!(record.price, 899.0);
        assert_eq!(record.rating, Some(4.5));
        assert_eq!(record.review_count, Some(17));
        assert_eq!(record.extra["image_url"], "https://www.neonet.pl/img/g84.jpg");
    }

    #[test]
    fn test_page_count_from_pager_input() {
        let doc = html::parse(LISTING);
        assert!(Neonet.has_next_page(&doc, 8, 20));
        assert!(!Neonet.has_next_page(&doc, 9, 20));
        assert!(!Neonet.has_next_page(&html::parse("<p></p>"), 1, 20));
    }

    #[test]
    fn test_featured_specifications() {
        let doc = html::parse(
            r#"<table data-id="tableFeaturedTechnicalSpecifications">
                 <tr><td>Procesor:</td><td>MediaTek Dimensity 7020</td></tr>
                 <tr><td>Pojemność akumulatora:</td><td>5000 mAh</td></tr>
               </table>"#,
        );
        let details = Neonet.product_details(&doc);
        assert_eq!(details["Procesor"], "MediaTek Dimensity 7020");
        assert_eq!(details["Pojemność akumulatora"], "5000 mAh");
    }
}
