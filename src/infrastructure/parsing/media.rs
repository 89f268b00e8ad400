//! Video links, product images and price

#![allow(clippy::uninlined_format_args)]

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::config::{ExtractionRules, ExtractorSelectors};
use super::{ParsingError, ParsingResult, collapse_whitespace, compile_selectors, element_text, fixed_selector, resolve_url};
use crate::domain::product::MAX_ADDITIONAL_IMAGES;

/// Extracts media references and the price from a product page
pub struct MediaExtractor {
    video_source: Vec<Selector>,
    nested_video_source: Vec<Selector>,
    product_image: Vec<Selector>,
    gallery_image: Vec<Selector>,
    any_image: Selector,
    price: Vec<Selector>,
    any_element: Selector,
    video_url_pattern: Regex,
    image_url_pattern: Regex,
    min_image_width: u32,
}

impl MediaExtractor {
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ExtractorSelectors::default(), &ExtractionRules::default())
    }

    pub fn with_config(selectors: &ExtractorSelectors, rules: &ExtractionRules) -> ParsingResult<Self> {
        Ok(Self {
            video_source: compile_selectors("video_source", &selectors.video_source)?,
            nested_video_source: compile_selectors(
                "nested_video_source",
                &selectors.nested_video_source,
            )?,
            product_image: compile_selectors("product_image", &selectors.product_image)?,
            gallery_image: compile_selectors("gallery_image", &selectors.gallery_image)?,
            any_image: fixed_selector("img")?,
            price: compile_selectors("price", &selectors.price)?,
            any_element: fixed_selector("body *")?,
            video_url_pattern: Regex::new(r#"https?://[^"']+?\.mp4"#)
                .map_err(|e| ParsingError::invalid_pattern("video_url", e))?,
            image_url_pattern: Regex::new(r#"(?i)https?://[^"'\s]+?\.(?:jpe?g|png|gif|webp)"#)
                .map_err(|e| ParsingError::invalid_pattern("image_url", e))?,
            min_image_width: rules.min_image_width,
        })
    }

    /// Video links from the first of three sources that yields any:
    /// explicit video sources, sources inside `<video>`, then a raw markup
    /// scan. Sources are never merged. Links are de-duplicated in order.
    pub fn extract_video_links(&self, document: &Html, source: &str, base: Option<&Url>) -> Vec<String> {
        let from_elements = |selectors: &[Selector]| -> Vec<String> {
            let mut links = Vec::new();
            for selector in selectors {
                for element in document.select(selector) {
                    if let Some(src) = element.value().attr("src").filter(|s| !s.trim().is_empty()) {
                        push_unique(&mut links, resolve_url(base, src));
                    }
                }
            }
            links
        };

        let explicit = from_elements(self.video_source.as_slice());
        if !explicit.is_empty() {
            debug!("Found {} video links in media sources", explicit.len());
            return explicit;
        }

        let nested = from_elements(self.nested_video_source.as_slice());
        if !nested.is_empty() {
            debug!("Found {} video links in video containers", nested.len());
            return nested;
        }

        let mut scanned = Vec::new();
        for m in self.video_url_pattern.find_iter(source) {
            push_unique(&mut scanned, m.as_str().to_string());
        }
        if !scanned.is_empty() {
            debug!("Found {} video links in page markup", scanned.len());
        }
        scanned
    }

    /// Main image and up to five distinct additional images.
    ///
    /// Candidates come from the first non-empty tier of product images,
    /// gallery images, wide images, any image. Icons and logos are skipped.
    /// With no usable candidate the raw markup is scanned for image URLs.
    pub fn extract_images(&self, document: &Html, source: &str, base: Option<&Url>) -> (String, Vec<String>) {
        let candidates = self.image_candidates(document);

        let srcs = candidates
            .iter()
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| !src.trim().is_empty())
            .map(|src| resolve_url(base, src));
        let (main_image, additional) = pick_images(srcs);
        if !main_image.is_empty() {
            return (main_image, additional);
        }

        let scanned = self
            .image_url_pattern
            .find_iter(source)
            .map(|m| m.as_str().to_string());
        pick_images(scanned)
    }

    fn image_candidates<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for tier in [&self.product_image, &self.gallery_image] {
            let found: Vec<_> = tier.iter().flat_map(|s| document.select(s)).collect();
            if !found.is_empty() {
                return found;
            }
        }

        let wide: Vec<_> = document
            .select(&self.any_image)
            .filter(|img| {
                img.value()
                    .attr("width")
                    .and_then(|w| w.trim().trim_end_matches("px").parse::<u32>().ok())
                    .is_some_and(|w| w > self.min_image_width)
            })
            .collect();
        if !wide.is_empty() {
            return wide;
        }

        document.select(&self.any_image).collect()
    }

    /// Price text with a leading `$` guaranteed. Falls back to the first
    /// element whose own text mentions `$`. Empty when nothing is found.
    pub fn extract_price(&self, document: &Html) -> String {
        for selector in &self.price {
            for element in document.select(selector) {
                let text = element_text(element);
                if text.is_empty() {
                    continue;
                }
                return if text.contains('$') {
                    text
                } else {
                    format!("${}", text)
                };
            }
        }

        for element in document.select(&self.any_element) {
            let name = element.value().name();
            if name == "script" || name == "style" {
                continue;
            }
            let own_text: String = element
                .children()
                .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
                .collect();
            if own_text.contains('$') {
                debug!("Price taken from <{}> fallback", name);
                return collapse_whitespace(&own_text);
            }
        }

        String::new()
    }
}

fn is_decorative(src: &str) -> bool {
    let lower = src.to_lowercase();
    lower.ends_with(".ico") || lower.ends_with(".svg") || lower.contains("icon") || lower.contains("logo")
}

fn push_unique(links: &mut Vec<String>, link: String) {
    if !links.contains(&link) {
        links.push(link);
    }
}

/// First usable source is the main image; later distinct ones are additional
fn pick_images(srcs: impl Iterator<Item = String>) -> (String, Vec<String>) {
    let mut main_image = String::new();
    let mut additional: Vec<String> = Vec::new();

    for src in srcs {
        if is_decorative(&src) {
            continue;
        }
        if main_image.is_empty() {
            main_image = src;
        } else if src != main_image && !additional.contains(&src) {
            additional.push(src);
            if additional.len() >= MAX_ADDITIONAL_IMAGES {
                break;
            }
        }
    }

    (main_image, additional)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> MediaExtractor {
        MediaExtractor::new().unwrap()
    }

    fn videos(html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        extractor().extract_video_links(&document, html, None)
    }

    #[test]
    fn explicit_sources_win_and_are_deduplicated() {
        let html = r#"
            <source src="https://cdn.example.com/a.mp4" type="video/mp4">
            <source src="https://cdn.example.com/a.mp4" type="video/mp4">
            <video><source src="https://cdn.example.com/b.webm"></video>
            <script>var v = "https://cdn.example.com/c.mp4";</script>
        "#;
        // b.webm sits in a <video> but only explicit sources are used here
        assert_eq!(videos(html), vec!["https://cdn.example.com/a.mp4"]);
    }

    #[test]
    fn nested_sources_used_when_no_explicit_ones() {
        let html = r#"<video><source src="/media/demo.webm"></video>
            <script>var v = "https://cdn.example.com/c.mp4";</script>"#;
        let document = Html::parse_document(html);
        let base = Url::parse("https://www.katom.com/150-X.html").unwrap();
        assert_eq!(
            extractor().extract_video_links(&document, html, Some(&base)),
            vec!["https://www.katom.com/media/demo.webm"]
        );
    }

    #[test]
    fn markup_scan_is_last_resort() {
        let html = r#"<script>
            var a = "https://cdn.example.com/c.mp4";
            var b = 'https://cdn.example.com/c.mp4';
            var c = "https://cdn.example.com/d.mp4";
        </script>"#;
        assert_eq!(
            videos(html),
            vec!["https://cdn.example.com/c.mp4", "https://cdn.example.com/d.mp4"]
        );
        assert!(videos("<p>no media</p>").is_empty());
    }

    #[test]
    fn images_skip_logos_and_cap_additional() {
        let mut html = String::from(r#"<div class="product-gallery">"#);
        html.push_str(r#"<img src="https://img.example.com/logo.png">"#);
        for i in 0..8 {
            html.push_str(&format!(r#"<img src="https://img.example.com/p{}.jpg">"#, i));
        }
        html.push_str(r#"<img src="https://img.example.com/p1.jpg"></div>"#);

        let document = Html::parse_document(&html);
        let (main, additional) = extractor().extract_images(&document, &html, None);
        assert_eq!(main, "https://img.example.com/p0.jpg");
        assert_eq!(additional.len(), MAX_ADDITIONAL_IMAGES);
        assert_eq!(additional[0], "https://img.example.com/p1.jpg");
        assert!(!additional.iter().any(|src| src.contains("logo")));
    }

    #[test]
    fn wide_images_preferred_over_any_image() {
        let html = r#"<img src="/small.jpg" width="50"><img src="/big.jpg" width="600">"#;
        let document = Html::parse_document(html);
        let base = Url::parse("https://www.katom.com/").unwrap();
        let (main, additional) = extractor().extract_images(&document, html, Some(&base));
        assert_eq!(main, "https://www.katom.com/big.jpg");
        assert!(additional.is_empty());
    }

    #[test]
    fn image_urls_scanned_from_markup_when_no_usable_img() {
        let html = r#"<img src="/icons/cart.svg">
            <script>var gallery = ["https://img.example.com/fryer.JPG", "https://img.example.com/side.png"];</script>"#;
        let document = Html::parse_document(html);
        let (main, additional) = extractor().extract_images(&document, html, None);
        assert_eq!(main, "https://img.example.com/fryer.JPG");
        assert_eq!(additional, vec!["https://img.example.com/side.png"]);
    }

    #[test]
    fn price_gets_dollar_prefix() {
        let document = Html::parse_document(r#"<span class="product-price"> 1,299.00 </span>"#);
        assert_eq!(extractor().extract_price(&document), "$1,299.00");

        let document = Html::parse_document(r#"<div class="price">$849.50</div>"#);
        assert_eq!(extractor().extract_price(&document), "$849.50");
    }

    #[test]
    fn price_falls_back_to_dollar_text() {
        let document = Html::parse_document(
            "<div><p>Call for details</p><p>Our price: <b>today</b> $99</p></div>",
        );
        assert_eq!(extractor().extract_price(&document), "Our price: $99");
        assert_eq!(extractor().extract_price(&Html::parse_document("<p>free</p>")), "");
    }
}
