//! Per-field value formatting
//!
//! Every value written into the document passes through [`format_value`]:
//! dash normalization, fixed-precision decimals with a decimal comma,
//! yes/no and flow-direction recoding, and a non-breaking space for empty
//! values so the template's highlighting stays visible.

use serde::{Deserialize, Serialize};

/// Placeholder for empty values
pub const NBSP: &str = "\u{a0}";

/// Replacement for a lone hyphen
const DASH: &str = "\u{2014}";

/// Fields rendered with one fractional digit
const ONE_DECIMAL: &[&str] = &["pier_height", "foundation_depth", "piles_spacing"];

/// Fields rendered with two fractional digits
const TWO_DECIMAL: &[&str] = &[
    "length",
    "full_width",
    "width_G",
    "width_T1",
    "width_T2",
    "pier_size_a",
    "pier_size_b",
    "pier_rigel_width",
    "pier_rigel_height",
    "pier_rigel_length",
];

/// Yes/no fields recoded to `1`/`0`
const YES_NO: &[&str] = &["lighting", "drainage", "fencing", "under_water"];

/// Field whose value depends on the output profile
const FLOW_DIRECTION: &str = "flow_direction";

/// Output document flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Technical passport
    #[default]
    Passport,
    /// Inspection report
    Report,
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::Passport => write!(f, "passport"),
            Profile::Report => write!(f, "report"),
        }
    }
}

/// How a field key is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Decimal(usize),
    YesNo,
    FlowDirection,
    Text,
}

impl FieldClass {
    pub fn of(key: &str) -> Self {
        if ONE_DECIMAL.contains(&key) {
            FieldClass::Decimal(1)
        } else if TWO_DECIMAL.contains(&key) {
            FieldClass::Decimal(2)
        } else if YES_NO.contains(&key) {
            FieldClass::YesNo
        } else if key == FLOW_DIRECTION {
            FieldClass::FlowDirection
        } else {
            FieldClass::Text
        }
    }
}

/// Format a raw field value for the document
pub fn format_value(key: &str, raw: &str, profile: Profile) -> String {
    let value = normalize_dashes(raw);

    let value = match FieldClass::of(key) {
        FieldClass::Decimal(places) => format_decimal_field(key, &value, places),
        FieldClass::YesNo => recode_yes_no(&value),
        FieldClass::FlowDirection => match profile {
            Profile::Passport => recode_flow_direction(&value),
            Profile::Report => value,
        },
        FieldClass::Text => value,
    };

    or_placeholder(value)
}

/// Substitute the non-breaking placeholder for a blank value
pub fn or_placeholder(value: String) -> String {
    if value.trim().is_empty() {
        NBSP.to_string()
    } else {
        value
    }
}

/// Lone hyphen becomes a dash; ` - ` inside text becomes ` — `
pub fn normalize_dashes(value: &str) -> String {
    if value == "-" {
        return DASH.to_string();
    }
    value.replace(" - ", &format!(" {} ", DASH))
}

/// Parse a decimal written with either a comma or a period
///
/// Spaces (including non-breaking ones) used as thousands separators are
/// ignored.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render a number with a fixed number of places and a decimal comma
pub fn format_decimal(value: f64, places: usize) -> String {
    format!("{:.*}", places, value).replace('.', ",")
}

fn format_decimal_field(key: &str, value: &str, places: usize) -> String {
    if value.trim().is_empty() || value == DASH {
        return value.to_string();
    }
    match parse_decimal(value) {
        Some(number) => format_decimal(number, places),
        None => {
            log::warn!("Field '{}' is not a number: '{}'", key, value);
            String::new()
        }
    }
}

fn recode_yes_no(value: &str) -> String {
    match value.trim().to_lowercase().as_str() {
        "да" | "yes" | "true" | "1" => "1".to_string(),
        "нет" | "no" | "false" | "0" => "0".to_string(),
        _ => value.to_string(),
    }
}

fn recode_flow_direction(value: &str) -> String {
    match value.trim().to_lowercase().as_str() {
        "слева направо" | "left-to-right" | "left to right" => "1".to_string(),
        "справа налево" | "right-to-left" | "right to left" => "-1".to_string(),
        _ => value.to_string(),
    }
}

/// Render `m2`/`m3` (Latin or Cyrillic) with superscript digits
pub fn fix_unit_symbols(value: &str) -> String {
    value
        .replace("m2", "m²")
        .replace("m3", "m³")
        .replace("м2", "м²")
        .replace("м3", "м³")
}

/// Derive the kilometre code from a chainage such as `9+700` or `9,700`
///
/// The kilometre number is incremented and zero-padded to three digits
/// below 1000. Anything else yields an empty string.
pub fn km_code(chainage: &str) -> String {
    let trimmed = chainage.trim();
    let Some((left, right)) = trimmed.split_once(['+', ',']) else {
        return String::new();
    };
    let (Ok(km), Ok(_)) = (left.trim().parse::<u64>(), right.trim().parse::<u64>()) else {
        return String::new();
    };

    let Some(next) = km.checked_add(1) else {
        log::warn!("Kilometre number out of range: '{}'", chainage);
        return String::new();
    };
    if next < 1000 {
        format!("{:03}", next)
    } else {
        next.to_string()
    }
}
