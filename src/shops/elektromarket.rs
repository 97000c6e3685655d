use super::{ShopExtractor, static_url, with_query};
use crate::parsers::html::{self, css};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

static ITEM: LazyLock<Selector> = LazyLock::new(|| css(".product-list .left"));
static LINK: LazyLock<Selector> = LazyLock::new(|| css("a"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| css(".priceCurrent"));
static SUP: LazyLock<Selector> = LazyLock::new(|| css("sup"));
static UNAVAILABLE: LazyLock<Selector> = LazyLock::new(|| css("span.boxRed"));
static FORWARD: LazyLock<Selector> = LazyLock::new(|| css(".forward"));
static TAB_HEADING: LazyLock<Selector> = LazyLock::new(|| css(".tab-pane.fade.active.in h2"));
static ROW: LazyLock<Selector> = LazyLock::new(|| css("tr"));
static TD: LazyLock<Selector> = LazyLock::new(|| css("td"));

const TECH_HEADING: &str = "Dane techniczne";

/// elektromarket.pl: static pages, each product split into a `.left` box
/// (image and link) and the `.right` box that follows it (price and stock)
pub struct Elektromarket;

impl Elektromarket {
    fn info_box(item: ElementRef<'_>) -> Option<ElementRef<'_>> {
        item.next_siblings()
            .filter_map(ElementRef::wrap)
            .take_while(|el| !el.value().classes().any(|class| class == "left"))
            .find(|el| el.value().classes().any(|class| class == "right"))
    }
}

impl ShopExtractor for Elektromarket {
    fn name(&self) -> &'static str {
        "elektromarket"
    }

    fn base_url(&self) -> Url {
        static_url("https://elektromarket.pl")
    }

    fn listing_url(&self) -> Url {
        static_url(
            "https://elektromarket.pl/kategorie/telefony-100/telefony-komorkowe-i-smartfony-102.html",
        )
    }

    fn page_url(&self, listing: &Url, page: u32) -> Url {
        let mut url = listing.clone();
        for (key, value) in [
            ("priceFrom", ""),
            ("priceTill", ""),
            ("orderBy", "priceHit"),
            ("perPage", "20"),
        ] {
            if !url.query_pairs().any(|(k, _)| k == key) {
                url = with_query(&url, key, value);
            }
        }
        with_query(&url, "page", &page.max(1).to_string())
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

    /// Whole amount as the first text node, grosze in a `<sup>`
    fn extract_price(&self, item: ElementRef<'_>) -> Option<String> {
        let price = Self::info_box(item)?.select(&PRICE).next()?;
        let whole = price
            .children()
            .filter_map(|node| node.value().as_text())
            .map(|text| text.trim())
            .find(|text| !text.is_empty())?
            .to_string();
        match html::first_text(price, &SUP) {
            Some(cents) => Some(format!("{whole}.{cents}")),
            None => Some(whole),
        }
    }

    fn extract_availability(&self, item: ElementRef<'_>) -> Option<bool> {
        match Self::info_box(item) {
            Some(info) => Some(html::count(info, &UNAVAILABLE) == 0),
            None => Some(true),
        }
    }

    fn has_next_page(&self, doc: &Html, _page: u32, _item_count: usize) -> bool {
        html::exists(doc, &FORWARD)
    }

    fn product_details(&self, doc: &Html) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        let tables = doc
            .select(&TAB_HEADING)
            .filter(|h2| html::text_of(*h2) == TECH_HEADING)
            .filter_map(|h2| {
                h2.next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|el| el.value().name() == "table")
            });
        for table in tables {
            for row in table.select(&ROW) {
                let cells: Vec<_> = row.select(&TD).map(html::text_of).collect();
                match cells.as_slice() {
                    [key, value] => {
                        details.insert(key.clone(), value.clone());
                    }
                    _ => ::log::warn!("Unexpected column count {} in technical data", cells.len()),
                }
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
        <div class="product-list">
          <div class="left"><a href="/produkt/nokia-105.html" title="Nokia 105 Dual SIM"><img src="/img/105.jpg"></a></div>
          <div class="right"><div class="priceCurrent">119<sup>99</sup> zł</div></div>
          <div class="left"><a href="/produkt/panasonic-kx.html" title="Panasonic KX-TGC210"></a></div>
          <div class="right"><span class="boxRed">Chwilowo niedostępny</span></div>
        </div>
        <a class="forward" href="?page=2">&raquo;</a>"#;

    #[test]
    fn test_pairs_left_and_right_boxes() {
        let doc = html::parse(LISTING);
        let shop = Elektromarket;
        let base = shop.base_url();
        let mut ctx = PageContext::new(1, &base);
        let records: Vec<_> = doc
            .select(shop.item_selector())
            .map(|item| shop.extract(item, &mut ctx).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Nokia 105 Dual SIM");
        assert_eq!(records[0].price, 119.99);
        assert_eq!(records[0].availability, Some(true));
        assert_eq!(
            records[0].product_link.as_deref(),
            Some("https://elektromarket.pl/produkt/nokia-105.html")
        );

        assert_eq!(records[1].availability, Some(false));
        assert_eq!(records[1].price, 0.0);
        assert!(ctx.coercions.is_empty());
        assert!(shop.has_next_page(&doc, 1, 2));
    }

    #[test]
    fn test_tile_without_info_box_is_available() {
        let doc = html::parse(
            r#"<div class="product-list">
                 <div class="left"><a href="/produkt/myphone.html" title="myPhone Halo 3"></a></div>
               </div>"#,
        );
        let shop = Elektromarket;
        let base = shop.base_url();
        let mut ctx = PageContext::new(1, &base);
        let item = doc.select(shop.item_selector()).next().unwrap();
        let record = shop.extract(item, &mut ctx).unwrap();

        assert_eq!(record.availability, Some(true));
        assert_eq!(record.price, 0.0);
        assert_eq!(ctx.coercions.len(), 1);
        assert_eq!(ctx.coercions[0].field, "price");
    }

    #[test]
    fn test_page_url_keeps_listing_filters() {
        let shop = Elektromarket;
        assert_eq!(
            shop.page_url(&shop.listing_url(), 3).as_str(),
            "https://elektromarket.pl/kategorie/telefony-100/telefony-komorkowe-i-smartfony-102.html?priceFrom=&priceTill=&orderBy=priceHit&perPage=20&page=3"
        );
    }

    #[test]
    fn test_technical_data_table() {
        let doc = html::parse(
            r#"<div class="tab-pane fade active in">
                 <h2>Opis</h2><table><tr><td>Nie</td><td>to</td></tr></table>
                 <h2>Dane techniczne</h2>
                 <table>
                   <tr><td>Wyświetlacz</td><td>1,8"</td></tr>
                   <tr><td>Bateria</td><td>800 mAh</td></tr>
                   <tr><td colspan="2">Gwarancja</td></tr>
                 </table>
               </div>"#,
        );
        let details = Elektromarket.product_details(&doc);
        assert_eq!(details.len(), 2);
        assert_eq!(details["Bateria"], "800 mAh");
    }
}
