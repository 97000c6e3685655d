use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One normalized product row extracted from a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product name as shown on the listing
    pub title: String,

    /// Price in the shop's currency, 0 when it could not be read
    pub price: f64,

    /// Absolute URL of the product page
    pub product_link: Option<String>,

    /// Set by the extractor: `Some(false)` only for products marked unavailable
    pub availability: Option<bool>,

    /// Score in `[0, 5]`
    pub rating: Option<f32>,

    pub review_count: Option<u32>,

    /// Free-form technical attributes shown on the listing
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ProductRecord {
    /// Create a record with only a title; everything else is filled by the extractor
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price: 0.0,
            product_link: None,
            availability: None,
            rating: None,
            review_count: None,
            extra: BTreeMap::new(),
        }
    }

    /// Key used to suppress duplicates within a run: the link when there is one, else the title
    pub fn key(&self) -> &str {
        match self.product_link.as_deref() {
            Some(link) if !link.is_empty() => link,
            _ => &self.title,
        }
    }
}

/// Technical attributes scraped from a single product page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechDetailsRecord {
    pub product_link: String,
    pub tech_details: BTreeMap<String, String>,
}
