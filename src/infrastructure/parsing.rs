//! HTML extraction for catalog product pages
//!
//! Selectors are compiled once per extractor and tried as ordered cascades.
//! Parsed documents (`scraper::Html`) never leave the synchronous call that
//! created them.

pub mod config;
pub mod error;
pub mod media;
pub mod product_detail_parser;
pub mod spec_table;

// Re-export public types
pub use config::{ExtractionRules, ExtractorSelectors};
pub use error::{ParsingError, ParsingResult};
pub use media::MediaExtractor;
pub use product_detail_parser::ProductPageExtractor;
pub use spec_table::{SpecInference, SpecTableInference};

use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

/// Compile selector strings, skipping invalid ones with a warning.
/// Fails only when none of a non-empty list compiles.
pub fn compile_selectors(field: &str, selector_strings: &[String]) -> ParsingResult<Vec<Selector>> {
    let mut selectors = Vec::with_capacity(selector_strings.len());

    for selector_str in selector_strings {
        match Selector::parse(selector_str) {
            Ok(selector) => selectors.push(selector),
            Err(e) => {
                let err = ParsingError::invalid_selector(field, selector_str, &e.to_string());
                warn!("{}", err);
            }
        }
    }

    if selectors.is_empty() && !selector_strings.is_empty() {
        return Err(ParsingError::NoValidSelectors {
            field: field.to_string(),
            attempted: selector_strings.len(),
        });
    }

    Ok(selectors)
}

/// Compile a selector known to be valid at build time
pub(crate) fn fixed_selector(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ParsingError::invalid_selector("fixed", selector, &e.to_string()))
}

/// Elements matched by the first selector in the cascade that matches anything
pub fn select_first_group<'a>(selectors: &[Selector], document: &'a Html) -> Vec<ElementRef<'a>> {
    for selector in selectors {
        let elements: Vec<_> = document.select(selector).collect();
        if !elements.is_empty() {
            return elements;
        }
    }
    Vec::new()
}

/// Rendered text of an element with runs of whitespace collapsed
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape text for inclusion in synthesized markup
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Resolve `href` against `base` when it is relative; absolute or
/// unresolvable values come back trimmed but otherwise untouched.
pub fn resolve_url(base: Option<&Url>, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_selectors_are_skipped() {
        let selectors =
            compile_selectors("title", &["h1".to_string(), "[[broken".to_string()]).unwrap();
        assert_eq!(selectors.len(), 1);

        let err = compile_selectors("title", &["[[broken".to_string()]).unwrap_err();
        assert!(matches!(err, ParsingError::NoValidSelectors { attempted: 1, .. }));
    }

    #[test]
    fn first_matching_group_wins() {
        let document = Html::parse_document("<div class='b'>b1</div><div class='a'>a1</div>");
        let selectors = compile_selectors(
            "test",
            &[".missing".to_string(), ".a".to_string(), ".b".to_string()],
        )
        .unwrap();
        let found = select_first_group(&selectors, &document);
        assert_eq!(found.len(), 1);
        assert_eq!(element_text(found[0]), "a1");
    }

    #[test]
    fn text_helpers() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(escape_html("5\" <b>&"), "5&quot; &lt;b&gt;&amp;");
    }

    #[test]
    fn relative_urls_resolve_against_page() {
        let base = Url::parse("https://www.katom.com/150-64900K.html").unwrap();
        assert_eq!(
            resolve_url(Some(&base), "/img/fryer.jpg"),
            "https://www.katom.com/img/fryer.jpg"
        );
        assert_eq!(resolve_url(None, " /img/fryer.jpg "), "/img/fryer.jpg");
        assert_eq!(
            resolve_url(Some(&base), "https://cdn.example.com/v.mp4"),
            "https://cdn.example.com/v.mp4"
        );
    }
}
