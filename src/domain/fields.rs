//! User field selection
//!
//! The selection file is JSON of the shape
//! `{"selected_fields": {"voltage": true, ...}, "custom_fields": [{"name": "...", "enabled": true}]}`.
//! It is validated into [`FieldSelection`] once at load time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Built-in fields offered for selection, in display order
pub const BUILTIN_FIELDS: [&str; 23] = [
    "manufacturer",
    "food type",
    "frypot style",
    "heat",
    "hertz",
    "nema",
    "number of fry pots",
    "oil capacity/fryer (lb)",
    "phase",
    "product",
    "product type",
    "rating",
    "special features",
    "type",
    "voltage",
    "warranty",
    "weight",
    "title",
    "description",
    "model",
    "dimensions",
    "price",
    "sku",
];

/// Custom fields enabled when no selection file exists
pub const DEFAULT_CUSTOM_FIELDS: [&str; 1] = ["shipping_weight"];

/// Fields that always get their own trailing columns
const FIXED_FIELDS: [&str; 2] = ["title", "description"];

/// One named toggle in the selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldToggle {
    pub name: String,
    pub enabled: bool,
}

impl FieldToggle {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
        }
    }
}

/// Typed field selection: built-in toggles in file order plus custom fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    builtin: Vec<FieldToggle>,
    custom: Vec<FieldToggle>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SelectionFile {
    #[serde(default)]
    selected_fields: Map<String, Value>,
    #[serde(default)]
    custom_fields: Vec<CustomFieldEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CustomFieldEntry {
    name: String,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for FieldSelection {
    fn default() -> Self {
        Self {
            builtin: BUILTIN_FIELDS
                .iter()
                .map(|name| FieldToggle::new(*name, true))
                .collect(),
            custom: DEFAULT_CUSTOM_FIELDS
                .iter()
                .map(|name| FieldToggle::new(*name, true))
                .collect(),
        }
    }
}

impl FieldSelection {
    pub fn new(builtin: Vec<FieldToggle>, custom: Vec<FieldToggle>) -> Self {
        Self { builtin, custom }
    }

    /// Parse the selection JSON. Non-boolean toggles count as unselected and
    /// custom entries with a blank name are dropped.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: SelectionFile = serde_json::from_str(json)?;

        let builtin = file
            .selected_fields
            .into_iter()
            .filter(|(name, _)| !name.trim().is_empty())
            .map(|(name, value)| {
                let enabled = value.as_bool().unwrap_or(false);
                FieldToggle::new(name.trim(), enabled)
            })
            .collect();

        let custom = file
            .custom_fields
            .into_iter()
            .filter(|entry| !entry.name.trim().is_empty())
            .map(|entry| FieldToggle::new(entry.name.trim(), entry.enabled))
            .collect();

        Ok(Self { builtin, custom })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let selected_fields = self
            .builtin
            .iter()
            .map(|t| (t.name.clone(), Value::Bool(t.enabled)))
            .collect();
        let custom_fields = self
            .custom
            .iter()
            .map(|t| CustomFieldEntry {
                name: t.name.clone(),
                enabled: t.enabled,
            })
            .collect();

        serde_json::to_string_pretty(&SelectionFile {
            selected_fields,
            custom_fields,
        })
    }

    /// Selected built-in field names in file order
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.builtin
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.name.as_str())
    }

    /// Enabled custom field names in file order
    pub fn custom(&self) -> impl Iterator<Item = &str> {
        self.custom
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.name.as_str())
    }

    /// Selected built-ins that get their own mid-schema column
    pub fn selected_columns(&self) -> impl Iterator<Item = &str> {
        self.selected().filter(|name| !is_fixed_field(name))
    }

    /// Field names that specification keys are matched against, in priority order
    pub fn matchable_fields(&self) -> Vec<&str> {
        self.selected_columns().chain(self.custom()).collect()
    }

    pub fn builtin_toggles(&self) -> &[FieldToggle] {
        &self.builtin
    }

    pub fn custom_toggles(&self) -> &[FieldToggle] {
        &self.custom
    }
}

fn is_fixed_field(name: &str) -> bool {
    FIXED_FIELDS
        .iter()
        .any(|fixed| fixed.eq_ignore_ascii_case(name.trim()))
}
