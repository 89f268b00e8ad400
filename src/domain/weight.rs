//! Weight value normalization
//!
//! Catalog weights are product weights; the output carries a shipping
//! figure, so every weight is rounded up and padded by a fixed allowance.

use once_cell::sync::Lazy;
use regex::Regex;

/// Pounds added to every rounded weight
pub const WEIGHT_OFFSET: i64 = 5;

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern is valid"));

static TRAILING_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\d.]+$").expect("unit pattern is valid"));

/// Normalize a raw weight string.
///
/// `"22.93 lbs"` becomes `"28 lbs"`. Values without a number, or too large
/// to round, are returned unchanged.
pub fn normalize_weight(raw: &str) -> String {
    let Some(number) = FIRST_NUMBER.find(raw) else {
        return raw.to_string();
    };

    let Ok(value) = number.as_str().parse::<f64>() else {
        return raw.to_string();
    };

    let Some(adjusted) = rounded_pounds(value).and_then(|n| n.checked_add(WEIGHT_OFFSET)) else {
        return raw.to_string();
    };

    let unit = TRAILING_UNIT
        .find(raw)
        .map(|m| m.as_str().trim())
        .unwrap_or_default();

    if unit.is_empty() {
        adjusted.to_string()
    } else {
        format!("{adjusted} {unit}")
    }
}

/// Ceiling of `value` as an integer, or `None` outside the `i64` range
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn rounded_pounds(value: f64) -> Option<i64> {
    let ceiled = value.ceil();
    // i64::MAX as f64 is 2^63, the first value that no longer fits
    (ceiled.is_finite() && ceiled < i64::MAX as f64 && ceiled >= i64::MIN as f64)
        .then_some(ceiled as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("22.93 lbs", "28 lbs")]
    #[case("22.5 lbs", "28 lbs")]
    #[case("40", "45")]
    #[case("40.0lb", "45 lb")]
    #[case("Approx. 12 kg", "17 kg")]
    #[case("N/A", "N/A")]
    #[case("", "")]
    #[case("99999999999999999999 lbs", "99999999999999999999 lbs")]
    #[case("9223372036854775806 lbs", "9223372036854775806 lbs")]
    fn applies_shipping_allowance(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_weight(raw), expected);
    }

    proptest! {
        #[test]
        fn rounds_up_and_adds_offset(whole in 0u32..5000, frac in 0u32..100, unit in "(lbs|lb|kg|)") {
            let raw = if unit.is_empty() {
                format!("{whole}.{frac:02}")
            } else {
                format!("{whole}.{frac:02} {unit}")
            };
            let value: f64 = format!("{whole}.{frac:02}").parse().unwrap();
            let expected_number = value.ceil() as i64 + WEIGHT_OFFSET;
            let expected = if unit.is_empty() {
                expected_number.to_string()
            } else {
                format!("{expected_number} {unit}")
            };
            prop_assert_eq!(normalize_weight(&raw), expected);
        }

        #[test]
        fn text_without_digits_is_untouched(raw in "[a-zA-Z /]{0,20}") {
            prop_assert_eq!(normalize_weight(&raw), raw);
        }
    }
}
