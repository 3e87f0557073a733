//! Defect quantity rules
//!
//! Some defect types in the catalog carry a rule for computing the affected
//! quantity from the bridge geometry. Results are rendered the same way the
//! document shows decimals: two places and a decimal comma.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::export::format::{format_decimal, parse_decimal};

/// Errors from quantity evaluation
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuantityError {
    #[error("Unknown quantity rule: {0}")]
    UnknownRule(String),

    #[error("Rule {rule} needs bridge fields: {}", .missing.join(", "))]
    MissingInputs {
        rule: QuantityRule,
        missing: Vec<&'static str>,
    },
}

/// Computation attached to a defect type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityRule {
    /// Deck area: `length × width_G`
    DeckAreaG,
    /// Sidewalk area: `length × (width_T1 + width_T2)`
    SidewalkAreaT,
    /// Entered by hand
    Manual,
}

impl FromStr for QuantityRule {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DECK_AREA_G" => Ok(QuantityRule::DeckAreaG),
            "SIDEWALK_AREA_T" => Ok(QuantityRule::SidewalkAreaT),
            "" | "MANUAL" => Ok(QuantityRule::Manual),
            other => Err(QuantityError::UnknownRule(other.to_string())),
        }
    }
}

impl fmt::Display for QuantityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantityRule::DeckAreaG => write!(f, "DECK_AREA_G"),
            QuantityRule::SidewalkAreaT => write!(f, "SIDEWALK_AREA_T"),
            QuantityRule::Manual => write!(f, "MANUAL"),
        }
    }
}

impl QuantityRule {
    /// Evaluate against the bridge attributes
    ///
    /// `Ok(None)` for manual rules.
    pub fn evaluate(&self, bridge: &BTreeMap<String, String>) -> Result<Option<f64>, QuantityError> {
        let number = |key: &str| bridge.get(key).and_then(|v| parse_decimal(v));

        match self {
            QuantityRule::Manual => Ok(None),
            QuantityRule::DeckAreaG => {
                let length = number("length");
                let width = number("width_G");
                match (length, width) {
                    (Some(length), Some(width)) => Ok(Some(length * width)),
                    _ => Err(self.missing(&[("length", length), ("width_G", width)])),
                }
            }
            QuantityRule::SidewalkAreaT => {
                let length = number("length");
                let t1 = number("width_T1");
                let t2 = number("width_T2");
                let sidewalks = t1.unwrap_or(0.0) + t2.unwrap_or(0.0);
                match length {
                    Some(length) if sidewalks != 0.0 => Ok(Some(length * sidewalks)),
                    _ => {
                        let mut missing = Vec::new();
                        if length.is_none() {
                            missing.push("length");
                        }
                        if sidewalks == 0.0 {
                            missing.push("width_T1/width_T2");
                        }
                        Err(QuantityError::MissingInputs {
                            rule: *self,
                            missing,
                        })
                    }
                }
            }
        }
    }

    fn missing(&self, inputs: &[(&'static str, Option<f64>)]) -> QuantityError {
        QuantityError::MissingInputs {
            rule: *self,
            missing: inputs
                .iter()
                .filter(|(_, value)| value.is_none())
                .map(|(key, _)| *key)
                .collect(),
        }
    }

    /// Evaluate and render for display (`12,50`)
    pub fn display(&self, bridge: &BTreeMap<String, String>) -> Result<Option<String>, QuantityError> {
        Ok(self.evaluate(bridge)?.map(|value| format_decimal(value, 2)))
    }
}

/// Letter used in front of a quantity, chosen by unit
///
/// Area → `F`, length → `L`, thickness → `T`, pieces → `N`.
pub fn quantity_prefix(unit: &str) -> Option<char> {
    let unit: String = unit
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    match unit.as_str() {
        "м2" | "м²" | "m2" | "m²" => Some('F'),
        "м" | "m" => Some('L'),
        "мм" | "см" | "mm" | "cm" => Some('T'),
        "шт" | "pcs" => Some('N'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_rule_parsing() {
        assert_eq!("deck_area_g".parse::<QuantityRule>(), Ok(QuantityRule::DeckAreaG));
        assert_eq!(" SIDEWALK_AREA_T ".parse::<QuantityRule>(), Ok(QuantityRule::SidewalkAreaT));
        assert_eq!("".parse::<QuantityRule>(), Ok(QuantityRule::Manual));
        assert_eq!(
            "VOLUME".parse::<QuantityRule>(),
            Err(QuantityError::UnknownRule("VOLUME".to_string()))
        );
    }

    #[test]
    fn test_deck_area() {
        let b = bridge(&[("length", "42,5"), ("width_G", "8")]);
        assert_eq!(
            QuantityRule::DeckAreaG.display(&b),
            Ok(Some("340,00".to_string()))
        );

        let b = bridge(&[("length", "42,5")]);
        assert_eq!(
            QuantityRule::DeckAreaG.evaluate(&b),
            Err(QuantityError::MissingInputs {
                rule: QuantityRule::DeckAreaG,
                missing: vec!["width_G"],
            })
        );
    }

    #[test]
    fn test_sidewalk_area_accepts_one_side() {
        let b = bridge(&[("length", "10"), ("width_T2", "1,5")]);
        assert_eq!(
            QuantityRule::SidewalkAreaT.display(&b),
            Ok(Some("15,00".to_string()))
        );

        let b = bridge(&[("length", "10")]);
        assert!(QuantityRule::SidewalkAreaT.evaluate(&b).is_err());
    }

    #[test]
    fn test_manual_rule_computes_nothing() {
        assert_eq!(QuantityRule::Manual.evaluate(&BTreeMap::new()), Ok(None));
    }

    #[test]
    fn test_quantity_prefix() {
        assert_eq!(quantity_prefix("м2"), Some('F'));
        assert_eq!(quantity_prefix(" m² "), Some('F'));
        assert_eq!(quantity_prefix("м"), Some('L'));
        assert_eq!(quantity_prefix("см"), Some('T'));
        assert_eq!(quantity_prefix("шт"), Some('N'));
        assert_eq!(quantity_prefix("кг"), None);
    }
}
