use crate::parsers::fields::clean_text;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

/// Compile a selector that is a constant in this crate
pub fn css(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid selector {selector:?}: {e}"))
}

/// Parses listing or product markup into a document
pub fn parse(markup: &str) -> Html {
    let doc = Html::parse_document(markup);
    if !doc.errors.is_empty() {
        ::log::trace!("HTML parser reported {} recoverable errors", doc.errors.len());
    }
    doc
}

/// All text below an element with whitespace collapsed
pub fn text_of(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first match below `el`, `None` when nothing matches or the text is empty
pub fn first_text(el: ElementRef<'_>, selector: &Selector) -> Option<String> {
    el.select(selector)
        .next()
        .map(text_of)
        .filter(|text| !text.is_empty())
}

/// Attribute of the first match below `el` that carries a non-empty value
pub fn first_attr(el: ElementRef<'_>, selector: &Selector, name: &str) -> Option<String> {
    el.select(selector).find_map(|e| {
        e.value()
            .attr(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// Number of matches below `el`
pub fn count(el: ElementRef<'_>, selector: &Selector) -> usize {
    el.select(selector).count()
}

/// True when anything in the document matches
pub fn exists(doc: &Html, selector: &Selector) -> bool {
    doc.select(selector).next().is_some()
}

/// Collect `key: value` pairs from table-like rows.
///
/// Rows missing either cell are skipped. Trailing colons are stripped from keys.
pub fn key_value_rows(
    root: ElementRef<'_>,
    rows: &Selector,
    key: &Selector,
    value: &Selector,
) -> BTreeMap<String, String> {
    let mut details = BTreeMap::new();
    for row in root.select(rows) {
        let Some(k) = first_text(row, key) else {
            continue;
        };
        let Some(v) = first_text(row, value) else {
            ::log::debug!("Skipping attribute row without a value: {}", k);
            continue;
        };
        details.insert(strip_colon(&k), v);
    }
    details
}

/// Key text without a trailing `:`
pub fn strip_colon(key: &str) -> String {
    key.trim().trim_end_matches(':').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_helpers() {
        let doc = parse(
            r#"<html><body><div id="p"><h2> Apple
                iPhone&nbsp;15 </h2><a class="l" href="">x</a><a class="l" href="/p/1">y</a>
                <i class="s"></i><i class="s"></i></div></body></html>"#,
        );
        let root = doc.select(&css("#p")).next().unwrap();

        assert_eq!(first_text(root, &css("h2")).as_deref(), Some("Apple iPhone 15"));
        assert_eq!(first_text(root, &css("h3")), None);
        assert_eq!(first_attr(root, &css("a.l"), "href").as_deref(), Some("/p/1"));
        assert_eq!(first_attr(root, &css("a.l"), "title"), None);
        assert_eq!(count(root, &css("i.s")), 2);
        assert!(exists(&doc, &css("h2")));
    }

    #[test]
    fn test_key_value_rows() {
        let doc = parse(
            r#"<table><tr><th>Pamięć RAM:</th><td>8 GB</td></tr>
               <tr><th>Bateria</th><td> 5000 mAh </td></tr>
               <tr><th>Brak</th></tr></table>"#,
        );
        let table = doc.select(&css("table")).next().unwrap();
        let details = key_value_rows(table, &css("tr"), &css("th"), &css("td"));

        assert_eq!(details.len(), 2);
        assert_eq!(details["Pamięć RAM"], "8 GB");
        assert_eq!(details["Bateria"], "5000 mAh");
    }
}
