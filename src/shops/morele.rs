use super::{ShopExtractor, static_url};
use crate::error::FieldError;
use crate::parsers::fields;
use crate::parsers::html::{self, css};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

static ITEM: LazyLock<Selector> = LazyLock::new(|| css("div.cat-product.card"));
static LINK: LazyLock<Selector> = LazyLock::new(|| css("a.productLink"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| css("div.price-new"));
static RATING_COUNT: LazyLock<Selector> = LazyLock::new(|| css("span.rating-count"));
static RATING_CHECKED: LazyLock<Selector> =
    LazyLock::new(|| css(r#"input[type="radio"][checked]"#));
static NEXT: LazyLock<Selector> = LazyLock::new(|| css("a.pagination-btn i.icon-arrow-right"));
static SPEC_GROUP: LazyLock<Selector> =
    LazyLock::new(|| css("#specification div.group__specification"));
static SPEC_NAME: LazyLock<Selector> = LazyLock::new(|| css(".specification__name"));
static SPEC_VALUE: LazyLock<Selector> = LazyLock::new(|| css(".specification__value"));
static SPEC_ROW: LazyLock<Selector> = LazyLock::new(|| css(".specification__row"));
static EXPERT_ITEM: LazyLock<Selector> = LazyLock::new(|| css("#specification div.expert-table li"));
static EXPERT_KEY: LazyLock<Selector> = LazyLock::new(|| css("span:first-child"));
static EXPERT_VALUE: LazyLock<Selector> = LazyLock::new(|| css("span:last-child"));

static CAPACITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"GB\s*").expect("GB pattern"));

/// morele.net: tiles carry the model name and the variant in one title
pub struct Morele;

impl Morele {
    /// Split `"Smartfon Apple iPhone 15 128GB - Czarny"` into the model up to
    /// the capacity and the trailing variant words
    pub fn split_title(raw: &str) -> (String, Vec<String>) {
        let title = raw.trim();
        let title = title.strip_prefix("Smartfon").unwrap_or(title).trim();
        let mut parts = CAPACITY.splitn(title, 2);
        let model = parts.next().unwrap_or_default().trim();
        let model = if title.contains("GB") {
            format!("{model}GB")
        } else {
            model.to_string()
        };
        let variant = parts
            .next()
            .unwrap_or_default()
            .split_whitespace()
            .filter(|word| *word != "-")
            .map(str::to_string)
            .collect();
        (model, variant)
    }
}

impl ShopExtractor for Morele {
    fn name(&self) -> &'static str {
        "morele"
    }

    fn base_url(&self) -> Url {
        static_url("https://www.morele.net")
    }

    fn listing_url(&self) -> Url {
        static_url("https://www.morele.net/kategoria/smartfony-280/")
    }

    fn page_url(&self, listing: &Url, page: u32) -> Url {
        if page <= 1 {
            return listing.clone();
        }
        let mut url = listing.clone();
        let path = format!("{}/,,,,,,,,0,,,,/{}/", listing.path().trim_end_matches('/'), page);
        url.set_path(&path);
        url
    }

    fn item_selector(&self) -> &Selector {
        &ITEM
    }

    fn extract_title(&self, item: ElementRef<'_>) -> Option<String> {
        let raw = html::first_attr(item, &LINK, "title")?;
        Some(Self::split_title(&raw).0)
    }

    fn extract_link(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_attr(item, &LINK, "href")
    }

    fn extract_price(&self, item: ElementRef<'_>) -> Option<String> {
        html::first_text(item, &PRICE)
    }

    fn extract_rating(&self, item: ElementRef<'_>) -> Result<Option<f32>, FieldError> {
        match html::first_attr(item, &RATING_CHECKED, "value") {
            Some(value) => fields::parse_rating(&value).map(Some),
            None => Ok(Some(0.0)),
        }
    }

    fn extract_review_count(&self, item: ElementRef<'_>) -> Result<Option<u32>, FieldError> {
        match html::first_text(item, &RATING_COUNT) {
            Some(text) => fields::parse_count(&text).map(Some),
            None => Ok(Some(0)),
        }
    }

    fn extract_tech_details(&self, item: ElementRef<'_>) -> BTreeMap<String, String> {
        let mut extra = BTreeMap::new();
        if let Some(raw) = html::first_attr(item, &LINK, "title") {
            let (_, variant) = Self::split_title(&raw);
            if !variant.is_empty() {
                extra.insert("variant".to_string(), variant.join(" "));
            }
        }
        extra
    }

    fn has_next_page(&self, doc: &Html, _page: u32, _item_count: usize) -> bool {
        html::exists(doc, &NEXT)
    }

    fn product_details(&self, doc: &Html) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        for item in doc.select(&EXPERT_ITEM) {
            let (Some(key), Some(value)) = (
                html::first_text(item, &EXPERT_KEY),
                html::first_text(item, &EXPERT_VALUE),
            ) else {
                continue;
            };
            if key != value {
                details.insert(html::strip_colon(&key), value);
            }
        }
        for group in doc.select(&SPEC_GROUP) {
            details.extend(html::key_value_rows(group, &SPEC_ROW, &SPEC_NAME, &SPEC_VALUE));
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shops::PageContext;

    #[test]
    fn test_split_title() {
        let (model, variant) = Morele::split_title("Smartfon Apple iPhone 15 128GB - Czarny");
        assert_eq!(model, "Apple iPhone 15 128GB");
        assert_eq!(variant, vec!["Czarny"]);

        let (model, variant) = Morele::split_title("Smartfon Motorola Edge 50 Neo 12/512GB Szary 5G");
        assert_eq!(model, "Motorola Edge 50 Neo 12/512GB");
        assert_eq!(variant, vec!["Szary", "5G"]);

        let (model, variant) = Morele::split_title("Nokia 3310");
        assert_eq!(model, "Nokia 3310");
        assert!(variant.is_empty());
    }

    #[test]
    fn test_extracts_card() {
        let doc = html::parse(
            r#"<div class="cat-product card">
                 <a class="productLink" href="/smartfon-apple-iphone-15-128gb-czarny-12345/"
                    title="Smartfon Apple iPhone 15 128GB - Czarny">Apple iPhone 15</a>
                 <div class="rating"><input type="radio" value="4" checked="checked"><input type="radio" value="5"></div>
                 <span class="rating-count">(41)</span>
                 <div class="price-new">3 299,00 zł</div>
               </div>
               <a class="pagination-btn" href="/kategoria/smartfony-280/,,,,,,,,0,,,,/2/"><i class="icon-arrow-right"></i></a>"#,
        );
        let shop = Morele;
        let base = shop.base_url();
        let item = doc.select(shop.item_selector()).next().unwrap();
        let mut ctx = PageContext::new(1, &base);
        let record = shop.extract(item, &mut ctx).unwrap();

        assert_eq!(record.title, "Apple iPhone 15 128GB");
        assert_eq!(record.price, 3299.0);
        assert_eq!(record.rating, Some(4.0));
        assert_eq!(record.review_count, Some(41));
        assert_eq!(record.extra["variant"], "Czarny");
        assert_eq!(
            record.product_link.as_deref(),
            Some("https://www.morele.net/smartfon-apple-iphone-15-128gb-czarny-12345/")
        );
        assert!(shop.has_next_page(&doc, 1, 1));
    }

    #[test]
    fn test_missing_rating_defaults_to_zero() {
        let doc = html::parse(
            r#"<div class="cat-product card"><a class="productLink" href="/p/1/" title="Xiaomi 14"></a></div>"#,
        );
        let shop = Morele;
        let base = shop.base_url();
        let item = doc.select(shop.item_selector()).next().unwrap();
        let mut ctx = PageContext::new(1, &base);
        let record = shop.extract(item, &mut ctx).unwrap();
        assert_eq!(record.rating, Some(0.0));
        assert_eq!(record.review_count, Some(0));
        assert_eq!(record.price, 0.0);
        assert!(!shop.has_next_page(&doc, 1, 1));
    }

    #[test]
    fn test_page_url() {
        let shop = Morele;
        let listing = shop.listing_url();
        assert_eq!(shop.page_url(&listing, 1), listing);
        assert_eq!(
            shop.page_url(&listing, 4).as_str(),
            "https://www.morele.net/kategoria/smartfony-280/,,,,,,,,0,,,,/4/"
        );
    }
}
