//! Model identifier canonicalization and retrieval key construction

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Trailing marker stripped from canonical identifiers
const TRAILING_SUFFIX: &str = "HC";

/// Canonicalize a raw model string.
///
/// Drops every character that is not a letter or digit, upper-cases the rest
/// and removes a single trailing `HC`. Empty input yields empty output; the
/// caller decides whether that means "skip".
pub fn normalize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect();

    match cleaned.strip_suffix(TRAILING_SUFFIX) {
        Some(stripped) => stripped.to_string(),
        None => cleaned,
    }
}

/// Canonical retrieval key: user prefix plus normalized identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetrievalKey {
    prefix: String,
    model: String,
}

impl RetrievalKey {
    /// Build a key from a raw model value. Returns `None` when the model
    /// normalizes to nothing.
    pub fn new(prefix: &str, raw_model: &str) -> Option<Self> {
        let model = normalize(raw_model);
        if model.is_empty() {
            return None;
        }
        Some(Self {
            prefix: prefix.trim().to_string(),
            model,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Normalized model identifier
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Path segment `{prefix}-{model}`
    pub fn path_segment(&self) -> String {
        format!("{}-{}", self.prefix, self.model)
    }

    /// Full page URL `{base}/{prefix}-{model}.html`
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}.html", base_url.trim_end_matches('/'), self.path_segment())
    }
}

impl std::fmt::Display for RetrievalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path_segment())
    }
}

static PREFIX_IN_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\w+-(\d+)").expect("prefix pattern is valid")
});

/// Derive the catalog prefix from an input file name such as `vendor-150.xlsx`
pub fn infer_prefix_from_filename(file_name: &str) -> Option<String> {
    PREFIX_IN_FILENAME
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
