//! Project aggregate
//!
//! One inspection project: bridge attributes, repeatable span and pier forms,
//! the defect list and the photo block. The export engine only reads it; all
//! edits go through the methods here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::quantity;

/// Field keys of a new span form
pub const SPAN_FIELDS: &[&str] = &[
    "span_system",
    "span_type",
    "deck_structure",
    "main_beam_material",
    "joints_type",
    "span_scheme",
    "span_loads",
    "typical_project",
    "bearings",
    "span_expansion_joints",
    "transverse_conn",
    "span_notes",
];

/// Field keys of a new pier form
pub const PIER_FIELDS: &[&str] = &[
    "piers_type",
    "foundation_type",
    "pier_material",
    "pier_height",
    "foundation_depth",
    "pier_typical_project",
    "pier_size_a",
    "pier_size_b",
    "piles_qty",
    "piles_spacing",
    "pier_scheme",
    "pier_rigel_width",
    "pier_rigel_height",
    "pier_rigel_length",
    "pile_section",
    "pier_notes",
];

/// One repeatable form (a span or a pier)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRecord {
    /// Stable identifier, never shown in the document
    pub uid: String,
    #[serde(default)]
    pub title: String,
    /// Every other field, including keys this version does not know
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

pub type SpanRecord = FormRecord;
pub type PierRecord = FormRecord;

impl FormRecord {
    fn blank(title: String, keys: &[&str]) -> Self {
        Self {
            uid: new_uid(),
            title,
            fields: keys
                .iter()
                .map(|key| (key.to_string(), String::new()))
                .collect(),
        }
    }

    /// Field value, empty when absent
    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or_default()
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }
}

/// One row of the defects table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectRecord {
    pub uid: String,
    /// Section, `"<ordinal>.<label>"`
    pub placement: String,
    pub location: String,
    pub name: String,
    /// Description, possibly ending with a quantity line
    pub option: String,
    pub qty: String,
    pub unit: String,
    pub safety: String,
    pub durability: String,
    pub repairability: String,
    pub loadcap: String,
    pub action: String,
}

impl DefectRecord {
    /// Severity summary, e.g. `Б2, Д1, Г`
    ///
    /// `Г` is added only when the load-capacity code is exactly 1.
    pub fn categories(&self) -> String {
        let mut parts: Vec<String> = [
            ("Б", &self.safety),
            ("Д", &self.durability),
            ("Р", &self.repairability),
        ]
        .into_iter()
        .filter(|(_, code)| !code.trim().is_empty())
        .map(|(letter, code)| format!("{}{}", letter, code.trim()))
        .collect();

        if self.loadcap.trim().parse::<i64>() == Ok(1) {
            parts.push("Г".to_string());
        }
        parts.join(", ")
    }
}

/// Input for [`Project::add_defect`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewDefect {
    pub placement: String,
    pub location: String,
    pub name: String,
    pub option: String,
    pub qty: String,
    pub unit: String,
    pub safety: String,
    pub durability: String,
    pub repairability: String,
    pub loadcap: String,
    pub action: String,
}

impl NewDefect {
    /// Attach a quantity, appending a line such as `F = 12,50 м2` to the option
    pub fn with_quantity(mut self, qty: &str, unit: &str) -> Self {
        let qty = qty.trim();
        let unit = unit.trim();
        self.qty = qty.to_string();
        self.unit = unit.to_string();
        if qty.is_empty() {
            return self;
        }

        let sign = match quantity::quantity_prefix(unit) {
            Some(prefix) => format!("{} =", prefix),
            None => "=".to_string(),
        };
        let line = if unit.is_empty() {
            format!("{} {}", sign, qty)
        } else {
            format!("{} {} {}", sign, qty, unit)
        };
        self.option = format!("{}\n{}", self.option, line).trim().to_string();
        self
    }

    fn into_record(self, uid: String) -> DefectRecord {
        DefectRecord {
            uid,
            placement: self.placement,
            location: self.location,
            name: self.name,
            option: self.option,
            qty: self.qty,
            unit: self.unit,
            safety: self.safety,
            durability: self.durability,
            repairability: self.repairability,
            loadcap: self.loadcap,
            action: self.action,
        }
    }
}

/// A photo reference relative to the photo folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoRecord {
    pub filename: String,
    pub caption: String,
}

impl PhotoRecord {
    pub fn new(filename: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            caption: caption.into(),
        }
    }
}

/// Cover photo and gallery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoBlock {
    pub folder: PathBuf,
    pub cover: PhotoRecord,
    pub gallery: Vec<PhotoRecord>,
}

impl PhotoBlock {
    /// Full path of a photo, `None` when no file is chosen
    pub fn resolve(&self, record: &PhotoRecord) -> Option<PathBuf> {
        let filename = record.filename.trim();
        if filename.is_empty() {
            return None;
        }
        let path = Path::new(filename);
        Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.folder.join(path)
        })
    }

    /// Append files that are not yet in the gallery, with an empty caption
    ///
    /// Existing entries keep their order and captions. Returns the number of
    /// entries added.
    pub fn sync_gallery<S: AsRef<str>>(&mut self, files: &[S]) -> usize {
        let mut added = 0;
        for file in files {
            let file = file.as_ref();
            if self.gallery.iter().any(|photo| photo.filename == file) {
                continue;
            }
            self.gallery.push(PhotoRecord::new(file, ""));
            added += 1;
        }
        added
    }
}

/// Parsed placement string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement<'a> {
    /// Leading integer, when there is one
    pub ordinal: Option<u64>,
    /// Text after the first `.`, trimmed
    pub label: &'a str,
}

impl<'a> Placement<'a> {
    /// Examples: `"2.Опоры"` → (2, "Опоры"), `"Прочее"` → (None, "Прочее")
    pub fn parse(raw: &'a str) -> Self {
        let raw = raw.trim();
        match raw.split_once('.') {
            Some((prefix, rest)) => Self {
                ordinal: prefix.trim().parse().ok(),
                label: rest.trim(),
            },
            None => Self {
                ordinal: raw.parse().ok(),
                label: raw,
            },
        }
    }

    /// Numbered sections first, in numeric order; the rest after them
    pub fn sort_key(&self) -> (bool, u64) {
        match self.ordinal {
            Some(n) => (false, n),
            None => (true, 0),
        }
    }
}

/// Sort placement strings by numeric prefix, keeping first-seen order for ties
pub fn sort_placements<'a, I>(placements: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    placements
        .into_iter()
        .unique()
        .sorted_by_key(|p| Placement::parse(p).sort_key())
        .collect()
}

/// The whole project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub bridge: BTreeMap<String, String>,
    pub spans: Vec<SpanRecord>,
    pub piers: Vec<PierRecord>,
    pub defects: Vec<DefectRecord>,
    #[serde(default)]
    pub photos: PhotoBlock,
}

fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge attribute, empty when absent
    pub fn bridge_field(&self, key: &str) -> &str {
        self.bridge.get(key).map(String::as_str).unwrap_or_default()
    }

    pub fn set_bridge_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.bridge.insert(key.into(), value.into());
    }

    /// Append a blank span form, returning its uid
    pub fn add_span(&mut self) -> String {
        let record = FormRecord::blank(format!("Пролёты № {}", self.spans.len() + 1), SPAN_FIELDS);
        let uid = record.uid.clone();
        self.spans.push(record);
        uid
    }

    /// Append a blank pier form, returning its uid
    pub fn add_pier(&mut self) -> String {
        let record = FormRecord::blank(format!("ОПОРЫ № {}", self.piers.len() + 1), PIER_FIELDS);
        let uid = record.uid.clone();
        self.piers.push(record);
        uid
    }

    pub fn remove_span(&mut self, uid: &str) -> Option<SpanRecord> {
        take_by_uid(&mut self.spans, uid, |r| &r.uid)
    }

    pub fn remove_pier(&mut self, uid: &str) -> Option<PierRecord> {
        take_by_uid(&mut self.piers, uid, |r| &r.uid)
    }

    pub fn span_mut(&mut self, uid: &str) -> Option<&mut SpanRecord> {
        self.spans.iter_mut().find(|r| r.uid == uid)
    }

    pub fn pier_mut(&mut self, uid: &str) -> Option<&mut PierRecord> {
        self.piers.iter_mut().find(|r| r.uid == uid)
    }

    /// Append a defect, returning its uid
    pub fn add_defect(&mut self, defect: NewDefect) -> String {
        let uid = new_uid();
        self.defects.push(defect.into_record(uid.clone()));
        uid
    }

    pub fn remove_defect(&mut self, uid: &str) -> Option<DefectRecord> {
        take_by_uid(&mut self.defects, uid, |r| &r.uid)
    }

    pub fn defect_mut(&mut self, uid: &str) -> Option<&mut DefectRecord> {
        self.defects.iter_mut().find(|r| r.uid == uid)
    }

    /// Distinct non-empty placements of the defect list, in section order
    pub fn placements(&self) -> Vec<&str> {
        sort_placements(
            self.defects
                .iter()
                .map(|d| d.placement.trim())
                .filter(|p| !p.is_empty()),
        )
    }
}

fn take_by_uid<T>(items: &mut Vec<T>, uid: &str, key: impl Fn(&T) -> &String) -> Option<T> {
    let index = items.iter().position(|item| key(item) == uid)?;
    Some(items.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_forms_get_unique_uids_and_titles() {
        let mut project = Project::new();
        let first = project.add_span();
        let second = project.add_span();
        project.add_pier();

        assert_ne!(first, second);
        assert_eq!(project.spans[1].title, "Пролёты № 2");
        assert_eq!(project.piers[0].title, "ОПОРЫ № 1");
        assert_eq!(project.spans[0].fields.len(), SPAN_FIELDS.len());
        assert_eq!(project.piers[0].field("pier_height"), "");

        project.span_mut(&second).unwrap().set_field("span_type", "балочная");
        assert_eq!(project.spans[1].field("span_type"), "балочная");

        assert!(project.remove_span(&first).is_some());
        assert!(project.remove_span(&first).is_none());
        assert_eq!(project.spans.len(), 1);
    }

    #[test]
    fn test_categories_string() {
        let defect = DefectRecord {
            safety: "2".to_string(),
            loadcap: "1".to_string(),
            ..DefectRecord::default()
        };
        assert_eq!(defect.categories(), "Б2, Г");

        let defect = DefectRecord {
            safety: "1".to_string(),
            durability: " 3 ".to_string(),
            repairability: "2".to_string(),
            loadcap: "x".to_string(),
            ..DefectRecord::default()
        };
        assert_eq!(defect.categories(), "Б1, Д3, Р2");

        let defect = DefectRecord {
            loadcap: "2".to_string(),
            ..DefectRecord::default()
        };
        assert_eq!(defect.categories(), "");
    }

    #[test]
    fn test_placement_parse_and_order() {
        let p = Placement::parse("10.Пролёты");
        assert_eq!(p.ordinal, Some(10));
        assert_eq!(p.label, "Пролёты");

        let p = Placement::parse("Прочее");
        assert_eq!(p.ordinal, None);
        assert_eq!(p.label, "Прочее");

        let order = sort_placements(["10.Пролёты", "x.Прочее", "2.Опоры", "10.Пролёты", "1.Мост"]);
        assert_eq!(order, vec!["1.Мост", "2.Опоры", "10.Пролёты", "x.Прочее"]);
    }

    #[test]
    fn test_add_defect_with_quantity_line() {
        let mut project = Project::new();
        let defect = NewDefect {
            placement: "3.Покрытие".to_string(),
            option: "Выбоины".to_string(),
            ..NewDefect::default()
        }
        .with_quantity("12,50", "м2");
        assert_eq!(defect.option, "Выбоины\nF = 12,50 м2");

        let uid = project.add_defect(defect);
        let stored = project.defect_mut(&uid).unwrap();
        assert_eq!(stored.qty, "12,50");
        assert_eq!(stored.unit, "м2");

        let plain = NewDefect::default().with_quantity("3", "");
        assert_eq!(plain.option, "= 3");
        assert_eq!(project.placements(), vec!["3.Покрытие"]);
    }

    #[test]
    fn test_photo_block_sync_and_resolve() {
        let mut photos = PhotoBlock {
            folder: PathBuf::from("/data/photos"),
            cover: PhotoRecord::default(),
            gallery: vec![PhotoRecord::new("b.jpg", "Опора 1")],
        };
        let added = photos.sync_gallery(&["a.jpg", "b.jpg", "c.png"]);
        assert_eq!(added, 2);
        assert_eq!(photos.gallery[0].caption, "Опора 1");
        assert_eq!(photos.gallery[1].filename, "a.jpg");

        assert_eq!(photos.resolve(&photos.cover), None);
        assert_eq!(
            photos.resolve(&photos.gallery[0]),
            Some(PathBuf::from("/data/photos/b.jpg"))
        );
    }
}
