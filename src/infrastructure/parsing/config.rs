//! Selector configuration for product page extraction
//!
//! Every list is a priority-ordered cascade: the first selector (or the
//! first container) that yields something wins.

use serde::{Deserialize, Serialize};

/// CSS selectors for product detail pages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractorSelectors {
    /// Product title, most specific first
    pub title: Vec<String>,

    /// Containers whose `<p>` children form the description
    pub description_container: Vec<String>,

    /// Explicitly tagged specification table
    pub spec_table: Vec<String>,

    /// Any table, used when no tagged table exists
    pub fallback_table: Vec<String>,

    /// Loosely marked spec rows with key/value children
    pub spec_row: Vec<String>,
    pub spec_key: Vec<String>,
    pub spec_value: Vec<String>,

    /// Elements scanned for `key: value` free text
    pub free_text: Vec<String>,

    /// Media source elements referencing video files
    pub video_source: Vec<String>,

    /// Sources nested in generic video containers
    pub nested_video_source: Vec<String>,

    pub product_image: Vec<String>,
    pub gallery_image: Vec<String>,

    pub price: Vec<String>,
}

impl Default for ExtractorSelectors {
    fn default() -> Self {
        Self {
            title: vec![
                "h1.product-name.mb-0".to_string(),
                "h1.product-name".to_string(),
                "h1[class*='product-name']".to_string(),
                "h1[class*='title']".to_string(),
                ".product-title h1".to_string(),
                ".product-title".to_string(),
                "h1".to_string(),
            ],
            description_container: vec![
                ".tab-content".to_string(),
                ".product-description".to_string(),
                "#product-description".to_string(),
                ".description".to_string(),
                "#description".to_string(),
            ],
            spec_table: vec!["table.table.table-condensed.specs-table".to_string()],
            fallback_table: vec!["table".to_string()],
            spec_row: vec![".specs-row, [class*='spec']".to_string()],
            spec_key: vec![".spec-key, .spec-name, [class*='key'], [class*='name']".to_string()],
            spec_value: vec![".spec-value, .spec-val, [class*='value'], [class*='val']".to_string()],
            free_text: vec!["p, div, li, span".to_string()],
            video_source: vec!["source[src*='.mp4'], source[type*='video']".to_string()],
            nested_video_source: vec!["video source".to_string()],
            product_image: vec![
                ".product-image img, #product-image img, #main-image img, .main-image img, [class*='product'] img, [id*='product'] img".to_string(),
            ],
            gallery_image: vec![
                ".gallery img, .product-gallery img, #gallery img, [class*='gallery'] img, .carousel img".to_string(),
            ],
            price: vec![".product-price, .price, [class*='price'], .regular-price".to_string()],
        }
    }
}

/// Tuning values for the extraction heuristics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionRules {
    /// Lower-case prefix marking promotional paragraphs
    pub promo_prefix: String,

    /// Paragraphs mentioning this word are dropped from descriptions
    pub excluded_word: String,

    /// Longest element text the free-text scan looks at
    pub free_text_max_chars: usize,

    /// A free-text key must contain one of these terms
    pub spec_vocabulary: Vec<String>,

    /// `<img width>` above this counts as a product image
    pub min_image_width: u32,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            promo_prefix: "*free".to_string(),
            excluded_word: "video".to_string(),
            free_text_max_chars: 100,
            spec_vocabulary: [
                "manufacturer",
                "food type",
                "frypot style",
                "heat",
                "hertz",
                "nema",
                "number of",
                "oil capacity",
                "phase",
                "product",
                "type",
                "rating",
                "special features",
                "voltage",
                "warranty",
                "weight",
                "dimensions",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_image_width: 200,
        }
    }
}
