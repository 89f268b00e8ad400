//! Specification table inference
//!
//! Key/value specification data is located by a list of strategies of
//! decreasing structural assumption. Strategies run in order and the first
//! one that yields any pair wins; later strategies are never consulted.

#![allow(clippy::uninlined_format_args)]

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use super::config::{ExtractionRules, ExtractorSelectors};
use super::{ParsingError, ParsingResult, compile_selectors, element_text, escape_html, fixed_selector};
use crate::domain::product::Specifications;
use crate::domain::weight::normalize_weight;

const FRAGMENT_OPEN: &str = r#"<table class="specs-table" cellspacing="0" cellpadding="4" border="1" style="margin-top:10px;border-collapse:collapse;width:auto;" align="left"><tbody>"#;
const FRAGMENT_CLOSE: &str = "</tbody></table>";
const CELL_STYLE: &str = "padding:3px 8px;";

/// Raw key/value pairs found by one strategy, in page order
pub type SpecPairs = Vec<(String, String)>;

/// A single inference strategy
pub type SpecStrategy = fn(&SpecTableInference, &Html) -> SpecPairs;

/// Result of specification inference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecInference {
    pub specifications: Specifications,
    /// Re-synthesized table markup, empty when nothing was found
    pub html_fragment: String,
    /// Name of the strategy that produced the data
    pub strategy: Option<&'static str>,
}

/// Compiled selectors and patterns for specification inference
pub struct SpecTableInference {
    tagged_table: Vec<Selector>,
    fallback_table: Vec<Selector>,
    spec_row: Vec<Selector>,
    spec_key: Vec<Selector>,
    spec_value: Vec<Selector>,
    free_text: Vec<Selector>,
    row: Selector,
    cell: Selector,
    definition_list: Selector,
    term: Selector,
    definition: Selector,
    /// `key: value` then `key - value`
    free_text_patterns: Vec<Regex>,
    rules: ExtractionRules,
}

impl SpecTableInference {
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ExtractorSelectors::default(), ExtractionRules::default())
    }

    pub fn with_config(selectors: &ExtractorSelectors, rules: ExtractionRules) -> ParsingResult<Self> {
        let free_text_patterns = [("colon", r"^([^:]+):\s*(.+)"), ("dash", r"^([^-]+)-\s*(.+)")]
            .into_iter()
            .map(|(name, pattern)| {
                Regex::new(pattern).map_err(|e| ParsingError::invalid_pattern(name, e))
            })
            .collect::<ParsingResult<Vec<_>>>()?;

        Ok(Self {
            tagged_table: compile_selectors("spec_table", &selectors.spec_table)?,
            fallback_table: compile_selectors("fallback_table", &selectors.fallback_table)?,
            spec_row: compile_selectors("spec_row", &selectors.spec_row)?,
            spec_key: compile_selectors("spec_key", &selectors.spec_key)?,
            spec_value: compile_selectors("spec_value", &selectors.spec_value)?,
            free_text: compile_selectors("free_text", &selectors.free_text)?,
            row: fixed_selector("tr")?,
            cell: fixed_selector("td")?,
            definition_list: fixed_selector("dl")?,
            term: fixed_selector("dt")?,
            definition: fixed_selector("dd")?,
            free_text_patterns,
            rules,
        })
    }

    /// Strategies in the order they are tried
    pub fn strategies() -> [(&'static str, SpecStrategy); 5] {
        [
            ("tagged_table", Self::from_tagged_table),
            ("fallback_table", Self::from_fallback_table),
            ("spec_rows", Self::from_spec_rows),
            ("definition_lists", Self::from_definition_lists),
            ("free_text", Self::from_free_text),
        ]
    }

    /// Run the strategy cascade and build both the mapping and the fragment
    pub fn infer_specs(&self, document: &Html) -> SpecInference {
        for (name, strategy) in Self::strategies() {
            let pairs = strategy(self, document);
            if pairs.is_empty() {
                continue;
            }

            debug!("Specifications found by {} ({} pairs)", name, pairs.len());
            let mut specifications = Specifications::new();
            for (key, value) in &pairs {
                specifications.insert_first_wins(key, value.clone());
            }

            return SpecInference {
                specifications,
                html_fragment: render_spec_fragment(&pairs),
                strategy: Some(name),
            };
        }

        debug!("No specification data found by any strategy");
        SpecInference::default()
    }

    /// Strategy 1: the explicitly tagged specs table
    pub fn from_tagged_table(&self, document: &Html) -> SpecPairs {
        self.first_table_pairs(&self.tagged_table, document)
    }

    /// Strategy 2: the first table of any kind
    pub fn from_fallback_table(&self, document: &Html) -> SpecPairs {
        self.first_table_pairs(&self.fallback_table, document)
    }

    fn first_table_pairs(&self, selectors: &[Selector], document: &Html) -> SpecPairs {
        let Some(table) = selectors
            .iter()
            .find_map(|selector| document.select(selector).next())
        else {
            return Vec::new();
        };

        let mut pairs = Vec::new();
        for row in table.select(&self.row) {
            let cells: Vec<_> = row.select(&self.cell).collect();
            if cells.len() >= 2 {
                self.push_pair(&mut pairs, &element_text(cells[0]), element_text(cells[1]));
            }
        }
        pairs
    }

    /// Strategy 3: loosely marked spec rows with key and value children
    pub fn from_spec_rows(&self, document: &Html) -> SpecPairs {
        let mut pairs = Vec::new();
        for selector in &self.spec_row {
            for row in document.select(selector) {
                let key = self.spec_key.iter().find_map(|s| row.select(s).next());
                let value = self.spec_value.iter().find_map(|s| row.select(s).next());
                if let (Some(key), Some(value)) = (key, value) {
                    self.push_pair(&mut pairs, &element_text(key), element_text(value));
                }
            }
        }
        pairs
    }

    /// Strategy 4: `<dt>`/`<dd>` pairs of every definition list
    pub fn from_definition_lists(&self, document: &Html) -> SpecPairs {
        let mut pairs = Vec::new();
        for list in document.select(&self.definition_list) {
            let terms = list.select(&self.term);
            let definitions = list.select(&self.definition);
            for (term, definition) in terms.zip(definitions) {
                self.push_pair(&mut pairs, &element_text(term), element_text(definition));
            }
        }
        pairs
    }

    /// Strategy 5: short text elements shaped like `key: value` or
    /// `key - value` whose key mentions a known specification term
    pub fn from_free_text(&self, document: &Html) -> SpecPairs {
        let mut pairs = Vec::new();
        for selector in &self.free_text {
            for element in document.select(selector) {
                let text = element_text(element);
                if text.is_empty() || text.chars().count() > self.rules.free_text_max_chars {
                    continue;
                }

                for pattern in &self.free_text_patterns {
                    let Some(caps) = pattern.captures(&text) else {
                        continue;
                    };
                    let key = caps.get(1).map_or("", |m| m.as_str()).trim();
                    let value = caps.get(2).map_or("", |m| m.as_str()).trim();
                    if self.is_known_spec_term(key) {
                        self.push_pair(&mut pairs, key, value.to_string());
                        break;
                    }
                }
            }
        }
        pairs
    }

    fn is_known_spec_term(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.rules
            .spec_vocabulary
            .iter()
            .any(|term| key.contains(term.as_str()))
    }

    /// Blank keys are dropped; weight values are normalized on the way in
    fn push_pair(&self, pairs: &mut SpecPairs, key: &str, value: String) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        let value = if key.to_lowercase().contains("weight") {
            normalize_weight(&value)
        } else {
            value
        };
        pairs.push((key.to_string(), value));
    }
}

/// Render pairs as the fixed-style specification table. Identical repeated
/// pairs are rendered once.
pub fn render_spec_fragment(pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return String::new();
    }

    let mut html = String::from(FRAGMENT_OPEN);
    let mut rendered: Vec<&(String, String)> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        if rendered.contains(&pair) {
            continue;
        }
        rendered.push(pair);
        html.push_str(&format!(
            r#"<tr><td style="{style}"><b>{key}</b></td><td style="{style}">{value}</td></tr>"#,
            style = CELL_STYLE,
            key = escape_html(&pair.0),
            value = escape_html(&pair.1),
        ));
    }
    html.push_str(FRAGMENT_CLOSE);
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inference() -> SpecTableInference {
        SpecTableInference::new().unwrap()
    }

    fn pairs(list: &[(&str, &str)]) -> SpecPairs {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const TAGGED_AND_FREE_TEXT: &str = r#"
        <table class="table table-condensed specs-table">
            <tr><td>Voltage</td><td>208V</td></tr>
            <tr><td>Weight</td><td>22.5 lbs</td></tr>
        </table>
        <p>Voltage: 120V</p>
    "#;

    #[test]
    fn tagged_table_wins_over_free_text() {
        let document = Html::parse_document(TAGGED_AND_FREE_TEXT);
        let result = inference().infer_specs(&document);

        assert_eq!(result.strategy, Some("tagged_table"));
        assert_eq!(result.specifications.get("voltage"), Some("208V"));
        assert_eq!(result.specifications.get("weight"), Some("28 lbs"));
        assert!(result.html_fragment.contains("<b>Weight</b>"));
        assert!(result.html_fragment.contains(">28 lbs<"));
        assert!(!result.html_fragment.contains("120V"));
    }

    #[test]
    fn fallback_table_used_without_tagged_one() {
        let document = Html::parse_document(
            "<table><tr><th>Spec</th><th>Value</th></tr><tr><td>Phase</td><td>1</td></tr></table>",
        );
        let inference = inference();
        assert!(inference.from_tagged_table(&document).is_empty());
        assert_eq!(inference.from_fallback_table(&document), pairs(&[("Phase", "1")]));
    }

    #[test]
    fn spec_rows_pair_key_and_value_children() {
        let document = Html::parse_document(
            r#"<div class="specs-row"><span class="spec-key">Heat</span><span class="spec-value">Gas</span></div>
               <div class="specs-row"><span class="spec-key">Orphan</span></div>"#,
        );
        assert_eq!(inference().from_spec_rows(&document), pairs(&[("Heat", "Gas")]));
    }

    #[test]
    fn definition_lists_zip_terms_and_definitions() {
        let document = Html::parse_document(
            "<dl><dt>Hertz</dt><dd>60</dd><dt>NEMA</dt><dd>5-15P</dd><dt>Extra</dt></dl>",
        );
        let result = inference().infer_specs(&document);
        assert_eq!(result.strategy, Some("definition_lists"));
        assert_eq!(result.specifications.len(), 2);
        assert_eq!(result.specifications.get("nema"), Some("5-15P"));
    }

    #[test]
    fn free_text_requires_known_terms() {
        let document = Html::parse_document(
            r#"<ul>
                 <li>Voltage: 208V</li>
                 <li>Shipping Weight - 40.2 lbs</li>
                 <li>Call us: 800-555-0100</li>
                 <li>Free shipping - today only</li>
               </ul>
               <p>This is a very long paragraph that mentions voltage: but it keeps going well past the cap of one hundred characters total.</p>"#,
        );
        let found = inference().from_free_text(&document);
        assert_eq!(
            found,
            pairs(&[("Voltage", "208V"), ("Shipping Weight", "46 lbs")])
        );
    }

    #[test]
    fn duplicate_keys_keep_first_value() {
        let document = Html::parse_document(
            "<table><tr><td>Voltage</td><td>208V</td></tr><tr><td>VOLTAGE</td><td>240V</td></tr></table>",
        );
        let result = inference().infer_specs(&document);
        assert_eq!(result.specifications.len(), 1);
        assert_eq!(result.specifications.get("voltage"), Some("208V"));
    }

    #[test]
    fn empty_document_yields_nothing() {
        let result = inference().infer_specs(&Html::parse_document("<p>Nothing here</p>"));
        assert!(result.specifications.is_empty());
        assert!(result.html_fragment.is_empty());
        assert_eq!(result.strategy, None);
    }

    #[test]
    fn fragment_uses_fixed_styling() {
        let html = render_spec_fragment(&pairs(&[("Voltage", "208V"), ("Voltage", "208V")]));
        assert!(html.starts_with(r#"<table class="specs-table" cellspacing="0""#));
        assert_eq!(html.matches("<tr>").count(), 1);
        assert!(html.ends_with("</tbody></table>"));
        assert!(render_spec_fragment(&[]).is_empty());
    }
}
