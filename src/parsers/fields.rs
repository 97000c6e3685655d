//! Normalization of the field types every shop encodes differently.

use crate::error::{ExtractionError, FieldError};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("number pattern"));
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("digits pattern"));
static WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"width\s*:\s*(\d+(?:[.,]\d+)?)\s*%").expect("width pattern"));

/// An optional field that fell back to its default instead of failing the item
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCoercion {
    pub field: &'static str,
    pub raw: String,
    pub reason: String,
}

impl FieldCoercion {
    pub fn new(field: &'static str, raw: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            field,
            raw: raw.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for FieldCoercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} defaulted ({}) from {:?}", self.field, self.reason, self.raw)
    }
}

/// Parses a price like `"1 299,99 zł"`, `"1299.99"` or `"2.499,00 PLN"`.
///
/// Everything except digits and `,`/`.` is dropped first, so grouping spaces
/// (including NBSP and U+202F) and currency symbols never matter. A separator
/// is treated as decimal when it is the last one present and is not a lone
/// separator followed by exactly three digits.
pub fn parse_price(raw: &str) -> Result<f64, FieldError> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let kept = kept.trim_matches(|c| c == ',' || c == '.');

    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return Err(FieldError::NoDigits(raw.to_string()));
    }

    let decimal_at = decimal_separator_index(kept);
    let mut normalized = String::with_capacity(kept.len());
    for (i, c) in kept.char_indices() {
        if c.is_ascii_digit() {
            normalized.push(c);
        } else if Some(i) == decimal_at {
            normalized.push('.');
        }
    }

    normalized
        .parse::<f64>()
        .map_err(|_| FieldError::NotANumber(raw.to_string()))
}

fn decimal_separator_index(s: &str) -> Option<usize> {
    let last = s.rfind([',', '.'])?;
    let last_char = s[last..].chars().next()?;
    let separators = s.matches([',', '.']).count();
    let same_kind = s.matches(last_char).count();
    let digits_after = s.len() - last - 1;

    if separators == same_kind && same_kind == 1 && digits_after == 3 {
        // "1.299" or "1,299": grouping, not a fraction
        return None;
    }
    if separators == same_kind && same_kind > 1 {
        // "1.299.999": every separator is grouping
        return None;
    }
    Some(last)
}

/// First decimal number in the text, e.g. `"4,5/5"` or `"Ocena 4.8"`, clamped to `[0, 5]`
pub fn parse_rating(raw: &str) -> Result<f32, FieldError> {
    let found = NUMBER
        .find(raw)
        .ok_or_else(|| FieldError::NoDigits(raw.to_string()))?;
    let value = found
        .as_str()
        .replace(',', ".")
        .parse::<f32>()
        .map_err(|_| FieldError::NotANumber(raw.to_string()))?;
    Ok(clamp_rating(value))
}

/// Rating rendered as star icons: each full star counts 1, each half star 0.5
pub fn star_rating(full: usize, half: usize) -> f32 {
    clamp_rating(full as f32 + 0.5 * half as f32)
}

/// Rating rendered as a filled bar, e.g. `style="width: 90%"` is 4.5
pub fn rating_from_width(style: &str) -> Result<f32, FieldError> {
    let captures = WIDTH
        .captures(style)
        .ok_or_else(|| FieldError::NoDigits(style.to_string()))?;
    let percent = captures[1]
        .replace(',', ".")
        .parse::<f32>()
        .map_err(|_| FieldError::NotANumber(style.to_string()))?;
    // percent / 20 stars, kept to one decimal place
    Ok(clamp_rating((percent / 2.0).round() / 10.0))
}

fn clamp_rating(value: f32) -> f32 {
    value.clamp(0.0, 5.0)
}

/// First run of digits, e.g. `"(123)"` or `"57 opinii"`
pub fn parse_count(raw: &str) -> Result<u32, FieldError> {
    let found = DIGITS
        .find(raw)
        .ok_or_else(|| FieldError::NoDigits(raw.to_string()))?;
    found
        .as_str()
        .parse::<u32>()
        .map_err(|_| FieldError::NotANumber(raw.to_string()))
}

/// Resolve a product href against the shop base URL.
///
/// Absolute hrefs are kept as they are; relative ones get the shop's scheme
/// and host. Fragments are dropped.
pub fn absolute_link(base: &Url, href: &str) -> Result<String, ExtractionError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(ExtractionError::MissingField("product link"));
    }

    let mut resolved = base
        .join(href)
        .map_err(|e| ExtractionError::InvalidLink {
            href: href.to_string(),
            reason: e.to_string(),
        })?;

    if resolved.host_str().is_none() || !matches!(resolved.scheme(), "http" | "https") {
        return Err(ExtractionError::InvalidLink {
            href: href.to_string(),
            reason: "not an http(s) URL with a host".to_string(),
        });
    }

    resolved.set_fragment(None);
    Ok(resolved.to_string())
}

/// Collapse all whitespace runs (NBSP and narrow NBSP included) into single spaces
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
