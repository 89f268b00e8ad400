use serde::{Deserialize, Serialize};

/// Sentinel stored when a page has no recognizable title
pub const TITLE_NOT_FOUND: &str = "Title not found";
/// Sentinel stored when no description paragraph survives filtering
pub const DESCRIPTION_NOT_FOUND: &str = "Description not found";

/// Maximum number of additional images kept per product
pub const MAX_ADDITIONAL_IMAGES: usize = 5;

/// Specification key/value pairs extracted from a product page.
///
/// Keys are stored lower-cased and unique. The first value seen for a key
/// is kept; later duplicates are ignored. Insertion order is preserved so
/// the synthesized specification table matches the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specifications {
    entries: Vec<(String, String)>,
}

impl Specifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair unless the lower-cased key is already present.
    /// Returns `true` when the pair was stored.
    pub fn insert_first_wins(&mut self, key: &str, value: impl Into<String>) -> bool {
        let key = key.trim().to_lowercase();
        if key.is_empty() || self.contains_key(&key) {
            return false;
        }
        self.entries.push((key, value.into()));
        true
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.entries.iter().any(|(k, _)| *k == key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Structured product data extracted from one catalog page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    /// Concatenated `<p>` fragments or [`DESCRIPTION_NOT_FOUND`]
    pub description: String,
    pub specifications: Specifications,
    /// Re-synthesized HTML table of `specifications`, empty when none were found
    pub spec_html: String,
    pub video_links: Vec<String>,
    pub main_image: String,
    pub additional_images: Vec<String>,
    pub price: String,
}

impl ProductRecord {
    /// Record carrying absence sentinels and no extracted data
    pub fn not_found() -> Self {
        Self {
            title: TITLE_NOT_FOUND.to_string(),
            description: DESCRIPTION_NOT_FOUND.to_string(),
            specifications: Specifications::new(),
            spec_html: String::new(),
            video_links: Vec::new(),
            main_image: String::new(),
            additional_images: Vec::new(),
            price: String::new(),
        }
    }

    /// A record whose title signals absence never becomes an output row
    pub fn is_found(&self) -> bool {
        !self.title.trim().is_empty() && !self.title.to_lowercase().contains("not found")
    }
}

impl Default for ProductRecord {
    fn default() -> Self {
        Self::not_found()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_wins_for_duplicate_keys() {
        let mut specs = Specifications::new();
        assert!(specs.insert_first_wins("Voltage", "208V"));
        assert!(!specs.insert_first_wins("VOLTAGE", "240V"));
        assert!(specs.insert_first_wins("Phase", "1"));

        assert_eq!(specs.len(), 2);
        assert_eq!(specs.get("voltage"), Some("208V"));
        assert_eq!(specs.get("Voltage"), Some("208V"));
        let keys: Vec<_> = specs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["voltage", "phase"]);
    }

    #[test]
    fn blank_keys_are_ignored() {
        let mut specs = Specifications::new();
        assert!(!specs.insert_first_wins("   ", "x"));
        assert!(specs.is_empty());
    }

    #[test]
    fn not_found_record_is_not_found() {
        let record = ProductRecord::not_found();
        assert!(!record.is_found());
        assert_eq!(record.description, DESCRIPTION_NOT_FOUND);

        let found = ProductRecord {
            title: "Test Fryer".to_string(),
            ..ProductRecord::not_found()
        };
        assert!(found.is_found());

        let error_page = ProductRecord {
            title: "Page Not Found".to_string(),
            ..ProductRecord::not_found()
        };
        assert!(!error_page.is_found());
    }
}
