//! Output column schema
//!
//! Column order is fixed: identifier, selected built-ins, custom fields,
//! then the trailing title/description/price/media columns. Names are
//! unique case-insensitively; on collision the later column is dropped.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::fields::FieldSelection;
use super::product::MAX_ADDITIONAL_IMAGES;

pub const IDENTIFIER_COLUMN: &str = "Mfr Model";
pub const TITLE_COLUMN: &str = "Title";
pub const DESCRIPTION_COLUMN: &str = "Description";
pub const PRICE_COLUMN: &str = "Price";
pub const MAIN_IMAGE_COLUMN: &str = "Main Image";

/// Number of indexed video link columns
pub const VIDEO_SLOTS: usize = 5;

pub fn video_column(slot: usize) -> String {
    format!("Video Link {slot}")
}

pub fn additional_image_column(slot: usize) -> String {
    format!("Additional Image {slot}")
}

/// Title-case a field name the way the catalog sheets expect:
/// a letter following a non-letter is upper-cased, any other letter is
/// lower-cased. `"oil capacity/fryer (lb)"` becomes `"Oil Capacity/Fryer (Lb)"`.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut previous_is_letter = false;
    for ch in name.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}

/// Ordered, case-insensitively unique output columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    columns: Vec<String>,
    /// Columns removed by the deduplication pass, in the order they were seen
    dropped: Vec<String>,
}

impl OutputSchema {
    pub fn for_selection(selection: &FieldSelection) -> Self {
        build_schema(selection.selected(), selection.custom())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Schema column matching `name` case-insensitively
    pub fn column_for(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.columns[idx].as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.columns.iter().position(|c| c.to_lowercase() == wanted)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }
}

/// Build the output schema from selected built-in fields and custom fields.
///
/// `title` and `description` are skipped among the selected fields since they
/// always appear in the trailing block.
pub fn build_schema<'a>(
    selected: impl IntoIterator<Item = &'a str>,
    custom: impl IntoIterator<Item = &'a str>,
) -> OutputSchema {
    let mut candidates = vec![IDENTIFIER_COLUMN.to_string()];
    candidates.extend(
        selected
            .into_iter()
            .filter(|f| {
                let f = f.trim();
                !f.eq_ignore_ascii_case("title") && !f.eq_ignore_ascii_case("description")
            })
            .map(|f| title_case(f.trim())),
    );
    candidates.extend(custom.into_iter().map(|f| title_case(f.trim())));
    candidates.extend([
        TITLE_COLUMN.to_string(),
        DESCRIPTION_COLUMN.to_string(),
        PRICE_COLUMN.to_string(),
    ]);
    candidates.extend((1..=VIDEO_SLOTS).map(video_column));
    candidates.push(MAIN_IMAGE_COLUMN.to_string());
    candidates.extend((1..=MAX_ADDITIONAL_IMAGES).map(additional_image_column));

    dedup_columns(candidates)
}

fn dedup_columns(candidates: Vec<String>) -> OutputSchema {
    let mut columns: Vec<String> = Vec::with_capacity(candidates.len());
    let mut seen: Vec<String> = Vec::with_capacity(candidates.len());
    let mut dropped = Vec::new();

    for column in candidates {
        let lowered = column.to_lowercase();
        if column.trim().is_empty() || seen.contains(&lowered) {
            warn!("Skipping duplicate column: {}", column);
            dropped.push(column);
        } else {
            seen.push(lowered);
            columns.push(column);
        }
    }

    OutputSchema { columns, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("voltage", "Voltage")]
    #[case("number of fry pots", "Number Of Fry Pots")]
    #[case("oil capacity/fryer (lb)", "Oil Capacity/Fryer (Lb)")]
    #[case("shipping_weight", "Shipping_Weight")]
    #[case("NEMA", "Nema")]
    #[case("3phase", "3Phase")]
    fn title_cases_field_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(title_case(raw), expected);
    }

    #[test]
    fn default_selection_produces_expected_layout() {
        let schema = OutputSchema::for_selection(&FieldSelection::default());
        let columns = schema.columns();

        assert_eq!(columns[0], IDENTIFIER_COLUMN);
        assert_eq!(columns[1], "Manufacturer");
        assert!(schema.contains("Shipping_Weight"));
        // Selected "price" claims the slot before the trailing Price column.
        assert_eq!(schema.dropped(), &["Price".to_string()]);

        let title_at = schema.position("title").unwrap();
        assert_eq!(columns[title_at + 1], DESCRIPTION_COLUMN);
        assert_eq!(columns[title_at + 2], "Video Link 1");
        assert_eq!(columns.last().unwrap(), "Additional Image 5");
    }

    #[test]
    fn colliding_custom_field_is_dropped_not_renamed() {
        let schema = build_schema(["voltage", "weight"], ["WEIGHT", "Gas Type"]);
        assert_eq!(
            schema.columns()[..4],
            ["Mfr Model", "Voltage", "Weight", "Gas Type"]
        );
        assert_eq!(schema.dropped(), &["Weight".to_string()]);
    }

    #[test]
    fn fixed_fields_are_not_repeated_mid_schema() {
        let schema = build_schema(["title", "Description", "voltage"], []);
        assert_eq!(schema.columns()[1], "Voltage");
        assert_eq!(schema.columns()[2], TITLE_COLUMN);
        assert!(schema.dropped().is_empty());
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let schema = build_schema(["voltage"], []);
        assert_eq!(schema.column_for("VOLTAGE"), Some("Voltage"));
        assert_eq!(schema.column_for("video link 3"), Some("Video Link 3"));
        assert_eq!(schema.column_for("amperage"), None);
    }

    proptest! {
        #[test]
        fn columns_are_unique_case_insensitively(
            selected in proptest::collection::vec("[a-cA-C ]{1,4}", 0..12),
            custom in proptest::collection::vec("[a-cA-C ]{1,4}", 0..6),
        ) {
            let schema = build_schema(
                selected.iter().map(String::as_str),
                custom.iter().map(String::as_str),
            );
            let mut lowered: Vec<String> =
                schema.columns().iter().map(|c| c.to_lowercase()).collect();
            let before = lowered.len();
            lowered.sort();
            lowered.dedup();
            prop_assert_eq!(lowered.len(), before);
            prop_assert_eq!(&schema.columns()[0], IDENTIFIER_COLUMN);
        }
    }
}
