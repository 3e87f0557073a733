//! Defect catalog
//!
//! The catalog lists the standard defect types per structural section
//! (placement), with their severity codes, measurement unit, quantity rule
//! and recommended repair action.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::project::sort_placements;
use crate::quantity::QuantityRule;

/// Errors from loading the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One defect type of the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DefectType {
    pub placement: String,
    pub code: String,
    pub name: String,
    pub option: String,
    pub safety: String,
    pub durability: String,
    pub repairability: String,
    pub loadcap: String,
    pub localization: String,
    pub unit: String,
    pub qty_rule: String,
    pub action: String,
}

impl DefectType {
    /// Parsed quantity rule; unknown rules fall back to manual entry
    pub fn quantity_rule(&self) -> QuantityRule {
        self.qty_rule.parse().unwrap_or_else(|e| {
            log::warn!("Defect type {}: {}", self.code, e);
            QuantityRule::Manual
        })
    }

    /// Name with localization, as offered in a picker: `Трещины (плита)`
    pub fn display_name(&self) -> String {
        if self.localization.trim().is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.localization.trim())
        }
    }
}

/// Read-only source of defect types
pub trait DefectCatalog {
    /// Distinct placements, in section order
    fn placements(&self) -> Vec<String>;

    /// Defect types offered for a placement
    fn defect_types(&self, placement: &str) -> Vec<DefectType>;

    /// Repair action recommended for a defect type code
    fn repair_action(&self, code: &str) -> Option<String>;
}

/// Catalog loaded from one CSV file
#[derive(Debug, Clone, Default)]
pub struct CsvCatalog {
    entries: Vec<DefectType>,
}

impl CsvCatalog {
    /// Load the catalog from a CSV file with a header row
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        log::info!("Loading defect catalog from {}", path.display());
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut entries = Vec::new();
        for result in reader.deserialize() {
            let entry: DefectType = result?;
            entries.push(entry);
        }
        log::debug!("Catalog has {} defect types", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DefectCatalog for CsvCatalog {
    fn placements(&self) -> Vec<String> {
        sort_placements(
            self.entries
                .iter()
                .map(|e| e.placement.as_str())
                .filter(|p| !p.is_empty()),
        )
        .into_iter()
        .map(str::to_string)
        .collect()
    }

    fn defect_types(&self, placement: &str) -> Vec<DefectType> {
        self.entries
            .iter()
            .filter(|e| e.placement == placement.trim())
            .cloned()
            .collect()
    }

    fn repair_action(&self, code: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|e| e.code == code.trim())
            .map(|e| e.action.clone())
            .filter(|action| !action.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
placement,code,name,option,safety,durability,repairability,loadcap,localization,unit,qty_rule,action
10.Пролётные строения,P-1,Трещины,Раскрытие до 0.3 мм,2,2,,,плита,м,,Инъецирование
2.Опоры,O-1,Разрушение защитного слоя,Площадь до 10%,,3,2,,ригель,м2,,Восстановление защитного слоя
3.Покрытие,C-1,Выбоины,,3,,,1,,м2,DECK_AREA_G,Ямочный ремонт
2.Опоры,O-2,Коррозия арматуры,,1,1,,1,,шт,VOLUME,
";

    fn catalog() -> CsvCatalog {
        CsvCatalog::from_reader(CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_placements_are_sorted_by_number() {
        assert_eq!(
            catalog().placements(),
            vec!["2.Опоры", "3.Покрытие", "10.Пролётные строения"]
        );
    }

    #[test]
    fn test_defect_types_for_placement() {
        let catalog = catalog();
        let types = catalog.defect_types("2.Опоры");
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].display_name(), "Разрушение защитного слоя (ригель)");
        assert_eq!(types[1].display_name(), "Коррозия арматуры");
        assert_eq!(types[1].quantity_rule(), QuantityRule::Manual);

        let deck = catalog.defect_types("3.Покрытие");
        assert_eq!(deck[0].quantity_rule(), QuantityRule::DeckAreaG);
    }

    #[test]
    fn test_repair_action_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.repair_action("P-1").as_deref(), Some("Инъецирование"));
        assert_eq!(catalog.repair_action("O-2"), None);
        assert_eq!(catalog.repair_action("missing"), None);
    }

    #[test]
    fn test_malformed_csv_is_an_error() {
        let result = CsvCatalog::from_reader("placement,code\n2.Опоры,O-1,extra\n".as_bytes());
        assert!(result.is_err());
    }
}
