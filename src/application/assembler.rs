//! Folds an extracted product record into an output row

use tracing::debug;

use crate::domain::fields::FieldSelection;
use crate::domain::product::ProductRecord;
use crate::domain::schema::{
    DESCRIPTION_COLUMN, IDENTIFIER_COLUMN, MAIN_IMAGE_COLUMN, OutputSchema, PRICE_COLUMN,
    TITLE_COLUMN, VIDEO_SLOTS, additional_image_column, title_case, video_column,
};
use crate::infrastructure::spreadsheet::OutputRow;

/// Specification key whose value feeds the shipping weight column
const WEIGHT_KEY: &str = "weight";
const SHIPPING_WEIGHT: &str = "shipping weight";

/// Description wrapped for display, followed by the specification table
/// when one was found
pub fn combined_description(record: &ProductRecord) -> String {
    let mut html = format!(
        r#"<div style="text-align: justify;">{}</div>"#,
        record.description
    );
    if !record.spec_html.is_empty() {
        html.push_str(r#"<h3 style="margin-top: 15px;">Specifications</h3>"#);
        html.push_str(&record.spec_html);
    }
    html
}

/// Build the output row for one input model.
///
/// Returns `None` for records that signal absence. Every schema column is
/// present in the returned row; unset ones hold an empty string.
pub fn assemble(
    model: &str,
    record: &ProductRecord,
    schema: &OutputSchema,
    selection: &FieldSelection,
) -> Option<OutputRow> {
    if !record.is_found() {
        return None;
    }

    let mut row: OutputRow = schema
        .columns()
        .iter()
        .map(|c| (c.clone(), String::new()))
        .collect();

    let mut set = |column: &str, value: &str| {
        if let Some(name) = schema.column_for(column) {
            row.insert(name.to_string(), value.to_string());
        }
    };

    set(IDENTIFIER_COLUMN, model.trim());
    set(TITLE_COLUMN, &record.title);
    set(DESCRIPTION_COLUMN, &combined_description(record));
    set(PRICE_COLUMN, &record.price);
    set(MAIN_IMAGE_COLUMN, &record.main_image);
    for (idx, image) in record.additional_images.iter().enumerate() {
        set(&additional_image_column(idx + 1), image);
    }

    let fields = selection.matchable_fields();
    for (key, value) in record.specifications.iter() {
        match match_field(key, &fields) {
            Some(field) => {
                debug!("Spec '{}' mapped to field '{}'", key, field);
                set(&title_case(field), value);
            }
            None => debug!("Spec '{}' matches no configured field", key),
        }
    }

    if let Some(weight) = record.specifications.get(WEIGHT_KEY) {
        let shipping = schema
            .columns()
            .iter()
            .find(|c| c.to_lowercase().replace('_', " ") == SHIPPING_WEIGHT)
            .cloned();
        if let Some(column) = shipping {
            set(&column, weight);
        }
    }

    for slot in 1..=VIDEO_SLOTS {
        let link = record.video_links.get(slot - 1).map_or("", String::as_str);
        set(&video_column(slot), link);
    }

    Some(row)
}

/// First configured field equal to the key, or containing it, or contained
/// in it (case-insensitive)
fn match_field<'a>(key: &str, fields: &[&'a str]) -> Option<&'a str> {
    let key = key.to_lowercase();
    fields.iter().copied().find(|field| {
        let field = field.to_lowercase();
        key == field || key.contains(&field) || field.contains(&key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fields::FieldToggle;
    use crate::domain::product::Specifications;
    use crate::domain::schema::build_schema;

    fn record() -> ProductRecord {
        let mut specifications = Specifications::new();
        specifications.insert_first_wins("weight", "28 lbs");
        specifications.insert_first_wins("voltage", "208V");
        ProductRecord {
            title: "Test Fryer".to_string(),
            description: "<p>Gas fryer</p>".to_string(),
            specifications,
            spec_html: "<table></table>".to_string(),
            video_links: (1..=7).map(|i| format!("https://v.example.com/{i}.mp4")).collect(),
            main_image: "https://img.example.com/main.jpg".to_string(),
            additional_images: vec!["https://img.example.com/side.jpg".to_string()],
            price: "$1,299.00".to_string(),
        }
    }

    #[test]
    fn default_selection_row_is_fully_populated() {
        let selection = FieldSelection::default();
        let schema = OutputSchema::for_selection(&selection);
        let row = assemble(" 64900K ", &record(), &schema, &selection).unwrap();

        assert_eq!(row.len(), schema.len());
        assert_eq!(row["Mfr Model"], "64900K");
        assert_eq!(row["Title"], "Test Fryer");
        assert_eq!(row["Weight"], "28 lbs");
        assert_eq!(row["Shipping_Weight"], "28 lbs");
        assert_eq!(row["Voltage"], "208V");
        assert_eq!(row["Price"], "$1,299.00");
        assert_eq!(row["Main Image"], "https://img.example.com/main.jpg");
        assert_eq!(row["Additional Image 1"], "https://img.example.com/side.jpg");
        assert_eq!(row["Additional Image 2"], "");
        assert_eq!(row["Manufacturer"], "");
    }

    #[test]
    fn video_links_fill_exactly_five_slots() {
        let selection = FieldSelection::default();
        let schema = OutputSchema::for_selection(&selection);

        let row = assemble("A1", &record(), &schema, &selection).unwrap();
        assert_eq!(row["Video Link 5"], "https://v.example.com/5.mp4");
        assert!(!row.values().any(|v| v.ends_with("/6.mp4")));

        let mut short = record();
        short.video_links.truncate(1);
        let row = assemble("A1", &short, &schema, &selection).unwrap();
        assert_eq!(row["Video Link 1"], "https://v.example.com/1.mp4");
        assert_eq!(row["Video Link 2"], "");
    }

    #[test]
    fn description_carries_spec_table() {
        let description = combined_description(&record());
        assert!(description.starts_with(r#"<div style="text-align: justify;"><p>Gas fryer</p></div>"#));
        assert!(description.ends_with("<h3 style=\"margin-top: 15px;\">Specifications</h3><table></table>"));

        let mut plain = record();
        plain.spec_html.clear();
        assert!(!combined_description(&plain).contains("<h3"));
    }

    #[test]
    fn not_found_record_yields_no_row() {
        let selection = FieldSelection::default();
        let schema = OutputSchema::for_selection(&selection);
        assert!(assemble("A1", &ProductRecord::not_found(), &schema, &selection).is_none());
    }

    #[test]
    fn spec_keys_match_by_containment_either_way() {
        let selection = FieldSelection::new(
            vec![
                FieldToggle::new("oil capacity/fryer (lb)", true),
                FieldToggle::new("voltage", true),
            ],
            vec![FieldToggle::new("warranty parts", true)],
        );
        let schema = build_schema(selection.selected(), selection.custom());

        let mut specifications = Specifications::new();
        // key contained in field
        specifications.insert_first_wins("oil capacity", "40 lb");
        // field contained in key
        specifications.insert_first_wins("input voltage", "120V");
        specifications.insert_first_wins("warranty", "1 year");
        specifications.insert_first_wins("color", "steel");
        let record = ProductRecord {
            specifications,
            ..record()
        };

        let row = assemble("A1", &record, &schema, &selection).unwrap();
        assert_eq!(row["Oil Capacity/Fryer (Lb)"], "40 lb");
        assert_eq!(row["Voltage"], "120V");
        assert_eq!(row["Warranty Parts"], "1 year");
        assert!(!row.values().any(|v| v == "steel"));
    }

    #[test]
    fn first_matching_field_wins() {
        let fields = ["food type", "type"];
        assert_eq!(match_field("Type", &fields), Some("food type"));
        assert_eq!(match_field("frypot", &fields), None);
    }
}
