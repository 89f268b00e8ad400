//! Product detail page extraction
//!
//! Turns the markup of one catalog page into a [`ProductRecord`]. The title
//! gates everything else: a page without one is treated as not being a
//! product page and yields the absence sentinels only.

#![allow(clippy::uninlined_format_args)]

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::config::{ExtractionRules, ExtractorSelectors};
use super::media::MediaExtractor;
use super::spec_table::SpecTableInference;
use super::{ParsingResult, compile_selectors, element_text, escape_html, fixed_selector};
use crate::domain::product::{DESCRIPTION_NOT_FOUND, ProductRecord};
use crate::infrastructure::http_client::FetchedPage;

/// Field extractor for product detail pages
pub struct ProductPageExtractor {
    title_selectors: Vec<Selector>,
    description_containers: Vec<Selector>,
    paragraph: Selector,
    specs: SpecTableInference,
    media: MediaExtractor,
    rules: ExtractionRules,
}

impl ProductPageExtractor {
    /// Create an extractor with the default selector set
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ExtractorSelectors::default(), ExtractionRules::default())
    }

    /// Create an extractor with custom selectors and rules
    pub fn with_config(selectors: &ExtractorSelectors, rules: ExtractionRules) -> ParsingResult<Self> {
        Ok(Self {
            title_selectors: compile_selectors("title", &selectors.title)?,
            description_containers: compile_selectors(
                "description_container",
                &selectors.description_container,
            )?,
            paragraph: fixed_selector("p")?,
            specs: SpecTableInference::with_config(selectors, rules.clone())?,
            media: MediaExtractor::with_config(selectors, &rules)?,
            rules,
        })
    }

    /// Extract a record from a fetched page, resolving relative links
    /// against the page URL
    pub fn extract_page(&self, page: &FetchedPage) -> ProductRecord {
        let base = Url::parse(&page.url).ok();
        self.extract_with_base(&page.html, base.as_ref())
    }

    /// Extract a record from raw markup
    pub fn extract(&self, html: &str) -> ProductRecord {
        self.extract_with_base(html, None)
    }

    fn extract_with_base(&self, html: &str, base: Option<&Url>) -> ProductRecord {
        let document = Html::parse_document(html);

        let Some(title) = self.extract_title(&document) else {
            debug!("No title element found, skipping remaining fields");
            return ProductRecord::not_found();
        };

        let inference = self.specs.infer_specs(&document);
        let (main_image, additional_images) = self.media.extract_images(&document, html, base);

        ProductRecord {
            title,
            description: self.extract_description(&document),
            specifications: inference.specifications,
            spec_html: inference.html_fragment,
            video_links: self.media.extract_video_links(&document, html, base),
            main_image,
            additional_images,
            price: self.media.extract_price(&document),
        }
    }

    /// First selector in the cascade yielding non-empty text wins
    fn extract_title(&self, document: &Html) -> Option<String> {
        for (index, selector) in self.title_selectors.iter().enumerate() {
            let found = document
                .select(selector)
                .map(element_text)
                .find(|text| !text.is_empty());
            if let Some(title) = found {
                debug!("Title matched by selector #{}: {}", index, title);
                return Some(title);
            }
        }
        None
    }

    /// Paragraphs of the first description container that keeps any after
    /// filtering, each wrapped as `<p>..</p>`. Only the first element each
    /// container selector matches is considered.
    fn extract_description(&self, document: &Html) -> String {
        for selector in &self.description_containers {
            let Some(container) = document.select(selector).next() else {
                continue;
            };
            let paragraphs: Vec<String> = container
                .select(&self.paragraph)
                .map(element_text)
                .filter(|text| self.keep_paragraph(text))
                .map(|text| format!("<p>{}</p>", escape_html(&text)))
                .collect();

            if !paragraphs.is_empty() {
                debug!("Description built from {} paragraphs", paragraphs.len());
                return paragraphs.concat();
            }
        }
        DESCRIPTION_NOT_FOUND.to_string()
    }

    fn keep_paragraph(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        !lower.starts_with(&self.rules.promo_prefix) && !lower.contains(&self.rules.excluded_word)
    }
}
