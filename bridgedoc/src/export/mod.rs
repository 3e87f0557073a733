//! Template-driven document assembly
//!
//! An export fills a copy of a .docx template from a [`Project`]:
//!
//! 1. `{{bridge.*}}` tokens everywhere, headers and footers included
//! 2. the span block between `{{SPAN_FORM}}` and `{{PIER_FORM}}`, once per span
//! 3. the pier block between `{{PIER_FORM}}` and `{{FORM4_START}}`, once per pier
//! 4. `{{FORM4_START}}` cleared
//! 5. the defects table after `{{DEFECTS_TABLE}}`
//! 6. the cover photo at `{{PHOTO_COVER}}` and the gallery after `{{PHOTOS_SECTION}}`
//!
//! The project is only read. The result is written next to the target and
//! renamed into place once complete.

pub mod blocks;
pub mod defects;
pub mod format;
pub mod photos;
pub mod substitute;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::PhotoConfig;
use crate::docx::{table, Body, DocxPackage, PackageError};
use crate::project::{FormRecord, Project};
use blocks::BlockMarkers;
use format::{format_value, km_code, or_placeholder, Profile};
use substitute::{Substitutions, TokenFamily};

/// Start of the repeatable span block
pub const SPAN_FORM: &str = "{{SPAN_FORM}}";
/// End of the span block, start of the pier block
pub const PIER_FORM: &str = "{{PIER_FORM}}";
/// End of the pier block
pub const FORM4_START: &str = "{{FORM4_START}}";
/// Paragraph preceding the defects table
pub const DEFECTS_TABLE: &str = "{{DEFECTS_TABLE}}";
/// Paragraph receiving the cover photo
pub const PHOTO_COVER: &str = "{{PHOTO_COVER}}";
/// Paragraph after which the gallery is inserted
pub const PHOTOS_SECTION: &str = "{{PHOTOS_SECTION}}";

/// All markers a complete template carries, in document order
pub const MARKERS: &[&str] = &[
    SPAN_FORM,
    PIER_FORM,
    FORM4_START,
    DEFECTS_TABLE,
    PHOTO_COVER,
    PHOTOS_SECTION,
];

const BRIDGE_PREFIX: &str = "bridge";
const SPAN_PREFIX: &str = "span";
const PIER_PREFIX: &str = "pier";

/// Errors that abort an export
#[derive(Error, Debug)]
pub enum ExportError {
    /// A marker paragraph is missing from the template
    #[error("Template marker {marker} not found")]
    MarkerNotFound { marker: String },

    /// Block markers appear in the wrong order
    #[error("Template marker {end} must come after {start}")]
    MarkerOrder { start: String, end: String },

    /// No table follows the defects marker
    #[error("No table found after {marker}; put the marker right before the defects table")]
    DefectsTableNotFound { marker: String },

    /// The defects table lacks columns
    #[error("Defects table has {found} columns, {required} required")]
    DefectsTableTooNarrow { found: usize, required: usize },

    /// Reading or writing the document failed
    #[error(transparent)]
    Package(#[from] PackageError),
}

/// How span and pier data reach the template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Clone the marker-delimited block once per record (`{{span.key}}`)
    #[default]
    Cloned,
    /// Fixed layout addressing records by position (`{{span0.key}}`)
    Indexed,
}

/// Export settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportOptions {
    pub profile: Profile,
    pub mode: ExportMode,
    pub photos: PhotoConfig,
}

/// What an export produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub spans: usize,
    pub piers: usize,
    pub defect_rows: usize,
    pub cover_placed: bool,
    pub gallery: usize,
}

/// Mapping for the `{{bridge.*}}` tokens, including the derived `km_code`
pub fn bridge_substitutions(project: &Project, profile: Profile) -> Substitutions {
    let mut subs: Substitutions = project
        .bridge
        .iter()
        .map(|(key, value)| {
            (
                Substitutions::token(BRIDGE_PREFIX, key),
                format_value(key, value, profile),
            )
        })
        .collect();
    subs.insert(
        Substitutions::token(BRIDGE_PREFIX, "km_code"),
        or_placeholder(km_code(project.bridge_field("km"))),
    );
    subs
}

/// Mapping for one span or pier record under `prefix`
///
/// The uid is never exposed.
pub fn record_substitutions(prefix: &str, record: &FormRecord, profile: Profile) -> Substitutions {
    let mut subs = Substitutions::new();
    subs.insert(
        Substitutions::token(prefix, "title"),
        format_value("title", &record.title, profile),
    );
    for (key, value) in record.fields.iter().filter(|(key, _)| key.as_str() != "uid") {
        subs.insert(Substitutions::token(prefix, key), format_value(key, value, profile));
    }
    subs
}

/// Fill an opened template in place
pub fn assemble(
    package: &mut DocxPackage,
    project: &Project,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let profile = options.profile;
    let mut summary = ExportSummary::default();

    let bridge = bridge_substitutions(project, profile);
    substitute::substitute_everywhere(package, &bridge)?;
    substitute::sweep_tokens_everywhere(package, TokenFamily::plain(BRIDGE_PREFIX))?;
    log::info!("Filled {} bridge fields", project.bridge.len());

    match options.mode {
        ExportMode::Cloned => {
            summary.spans = blocks::clone_block(
                package,
                BlockMarkers {
                    start: SPAN_FORM,
                    end: PIER_FORM,
                    prefix: SPAN_PREFIX,
                },
                &project.spans,
                |span| record_substitutions(SPAN_PREFIX, span, profile),
            )?;
            summary.piers = blocks::clone_block(
                package,
                BlockMarkers {
                    start: PIER_FORM,
                    end: FORM4_START,
                    prefix: PIER_PREFIX,
                },
                &project.piers,
                |pier| record_substitutions(PIER_PREFIX, pier, profile),
            )?;
        }
        ExportMode::Indexed => {
            summary.spans = fill_indexed(package, SPAN_PREFIX, &project.spans, profile)?;
            summary.piers = fill_indexed(package, PIER_PREFIX, &project.piers, profile)?;
            substitute::remove_marker_everywhere(package, SPAN_FORM)?;
            substitute::remove_marker_everywhere(package, PIER_FORM)?;
        }
    }
    substitute::remove_marker_everywhere(package, FORM4_START)?;

    summary.defect_rows = defects::fill_defects_table(package, DEFECTS_TABLE, &project.defects)?;

    let cover = project.photos.resolve(&project.photos.cover);
    summary.cover_placed = photos::insert_cover_photo(
        package,
        PHOTO_COVER,
        cover.as_deref(),
        options.photos.cover_size(),
    )?;
    summary.gallery =
        photos::insert_photo_gallery(package, PHOTOS_SECTION, &project.photos, &options.photos)?;

    Ok(summary)
}

/// Substitute `{{prefix<i>.key}}` for every record, document-wide
fn fill_indexed(
    package: &mut DocxPackage,
    prefix: &str,
    records: &[FormRecord],
    profile: Profile,
) -> Result<usize, ExportError> {
    for (index, record) in records.iter().enumerate() {
        let subs = record_substitutions(&format!("{}{}", prefix, index), record, profile);
        substitute::substitute_everywhere(package, &subs)?;
    }
    substitute::sweep_tokens_everywhere(package, TokenFamily::indexed(prefix))?;
    log::info!("Filled {} indexed {} records", records.len(), prefix);
    Ok(records.len())
}

/// Export a project through a template file into `output`
pub fn export_project(
    template: &Path,
    output: &Path,
    project: &Project,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let mut package = DocxPackage::open(template)?;
    let summary = assemble(&mut package, project, options)?;

    let partial = partial_path(output);
    if let Err(e) = package.save(&partial) {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    fs::rename(&partial, output).map_err(|e| {
        let _ = fs::remove_file(&partial);
        PackageError::from(e)
    })?;

    log::info!("Exported {} ({}) to {}", template.display(), options.profile, output.display());
    Ok(summary)
}

/// Sibling path used while the output is being written
fn partial_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.docx".to_string());
    output.with_file_name(format!(".{}.partial", name))
}

/// Result of checking a template against the marker contract
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateReport {
    /// Each marker with the body index of its paragraph
    pub markers: Vec<(&'static str, Option<usize>)>,
    /// Column count of the table after the defects marker
    pub defects_columns: Option<usize>,
    /// Problems that would make an export fail
    pub problems: Vec<String>,
}

impl TemplateReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check markers, marker order and the defects table without changing anything
pub fn check_template(package: &mut DocxPackage) -> Result<TemplateReport, ExportError> {
    let body = Body::new(package.body_mut()?);
    let mut report = TemplateReport {
        markers: MARKERS
            .iter()
            .map(|marker| (*marker, body.find_marker(marker)))
            .collect(),
        ..TemplateReport::default()
    };

    for (marker, index) in &report.markers {
        if index.is_none() && [SPAN_FORM, PIER_FORM, FORM4_START].contains(marker) {
            report
                .problems
                .push(ExportError::MarkerNotFound { marker: marker.to_string() }.to_string());
        }
    }

    let position = |marker: &str| {
        report
            .markers
            .iter()
            .find(|(m, _)| *m == marker)
            .and_then(|(_, index)| *index)
    };
    for pair in [[SPAN_FORM, PIER_FORM], [PIER_FORM, FORM4_START]] {
        if let (Some(start), Some(end)) = (position(pair[0]), position(pair[1])) {
            if end <= start {
                report.problems.push(
                    ExportError::MarkerOrder {
                        start: pair[0].to_string(),
                        end: pair[1].to_string(),
                    }
                    .to_string(),
                );
            }
        }
    }

    match body.table_after_marker(DEFECTS_TABLE).and_then(|i| body.get(i)) {
        Some(tbl) => {
            let columns = table::column_count(tbl);
            report.defects_columns = Some(columns);
            if columns < defects::REQUIRED_COLUMNS {
                report.problems.push(
                    ExportError::DefectsTableTooNarrow {
                        found: columns,
                        required: defects::REQUIRED_COLUMNS,
                    }
                    .to_string(),
                );
            }
        }
        None => report.problems.push(
            ExportError::DefectsTableNotFound {
                marker: DEFECTS_TABLE.to_string(),
            }
            .to_string(),
        ),
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;

    #[test]
    fn test_bridge_substitutions_format_values_and_km_code() {
        let mut project = Project::new();
        project.set_bridge_field("length", "12,5");
        project.set_bridge_field("km", "9+700");
        project.set_bridge_field("notes", "");

        let subs = bridge_substitutions(&project, Profile::Passport);
        assert_eq!(subs.get("{{bridge.length}}"), Some("12,50"));
        assert_eq!(subs.get("{{bridge.km}}"), Some("9+700"));
        assert_eq!(subs.get("{{bridge.km_code}}"), Some("010"));
        assert_eq!(subs.get("{{bridge.notes}}"), Some("\u{a0}"));
    }

    #[test]
    fn test_km_code_without_chainage_is_placeholder() {
        let subs = bridge_substitutions(&Project::new(), Profile::Report);
        assert_eq!(subs.get("{{bridge.km_code}}"), Some("\u{a0}"));
    }

    #[test]
    fn test_record_substitutions_hide_uid() {
        let mut project = Project::new();
        let uid = project.add_pier();
        let pier = project.pier_mut(&uid).unwrap();
        pier.set_field("pier_height", "6");
        pier.set_field("uid", "leak");

        let subs = record_substitutions("pier1", &project.piers[0], Profile::Report);
        assert_eq!(subs.get("{{pier1.title}}"), Some("ОПОРЫ № 1"));
        assert_eq!(subs.get("{{pier1.pier_height}}"), Some("6,0"));
        assert_eq!(subs.get("{{pier1.uid}}"), None);
    }

    #[test]
    fn test_partial_path_is_a_hidden_sibling() {
        assert_eq!(
            partial_path(Path::new("/out/report.docx")),
            PathBuf::from("/out/.report.docx.partial")
        );
    }
}
