//! Defects table
//!
//! The table after `{{DEFECTS_TABLE}}` keeps its header row; below it each
//! placement gets a merged section row followed by one row per defect.
//! Numbering runs across the whole table.

use itertools::Itertools;

use super::format::{fix_unit_symbols, or_placeholder};
use super::substitute;
use super::ExportError;
use crate::docx::paragraph::RunFormat;
use crate::docx::table::{self, CellSpec};
use crate::docx::{Body, DocxPackage};
use crate::project::{sort_placements, DefectRecord, Placement};

/// Columns the table must have: №, location, defect, description,
/// categories, action
pub const REQUIRED_COLUMNS: usize = 6;

/// Section rows are 12 pt
const SECTION_FONT_HALF_POINTS: &str = "24";

/// Fill the defects table that follows `marker`
///
/// Returns the number of defect rows written.
pub fn fill_defects_table(
    package: &mut DocxPackage,
    marker: &str,
    defects: &[DefectRecord],
) -> Result<usize, ExportError> {
    let mut body = Body::new(package.body_mut()?);
    let index = body
        .table_after_marker(marker)
        .ok_or_else(|| ExportError::DefectsTableNotFound {
            marker: marker.to_string(),
        })?;
    let Some(tbl) = body.get_mut(index) else {
        return Err(ExportError::DefectsTableNotFound {
            marker: marker.to_string(),
        });
    };

    let columns = table::column_count(tbl);
    if columns < REQUIRED_COLUMNS {
        return Err(ExportError::DefectsTableTooNarrow {
            found: columns,
            required: REQUIRED_COLUMNS,
        });
    }

    let widths = table::grid_widths(tbl);
    let width = |column: usize| widths.get(column).copied().filter(|w| *w > 0);
    table::truncate_rows(tbl, 1);

    let skipped = defects
        .iter()
        .filter(|d| d.placement.trim().is_empty())
        .count();
    if skipped > 0 {
        log::warn!("{} defects have no placement and are left out", skipped);
    }

    let placements = sort_placements(
        defects
            .iter()
            .map(|d| d.placement.trim())
            .filter(|p| !p.is_empty()),
    );

    let mut counter = 0;
    for placement in placements {
        let section = CellSpec {
            span: columns,
            width: Some(widths.iter().sum::<u32>()).filter(|w| *w > 0),
            format: RunFormat {
                size: Some(SECTION_FONT_HALF_POINTS.to_string()),
                ..RunFormat::bold()
            },
            ..CellSpec::new(Placement::parse(placement).label)
        };
        tbl.push(table::new_row(&[section]));

        for defect in defects.iter().filter(|d| d.placement.trim() == placement) {
            counter += 1;
            let values = [
                counter.to_string(),
                defect.location.clone(),
                defect.name.clone(),
                fix_unit_symbols(&defect.option),
                defect.categories(),
                defect.action.clone(),
            ];
            let mut cells: Vec<CellSpec> = values
                .into_iter()
                .enumerate()
                .map(|(column, text)| CellSpec {
                    width: width(column),
                    ..CellSpec::new(or_placeholder(text))
                })
                .collect();
            // Extra template columns stay empty
            cells.extend((REQUIRED_COLUMNS..columns).map(|column| CellSpec {
                width: width(column),
                ..CellSpec::new("")
            }));
            tbl.push(table::new_row(&cells));
        }
    }

    log::info!(
        "Defects table: {} rows in {} sections",
        counter,
        defects
            .iter()
            .map(|d| d.placement.trim())
            .filter(|p| !p.is_empty())
            .unique()
            .count()
    );

    substitute::remove_marker_everywhere(package, marker)?;
    Ok(counter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::paragraph;
    use crate::docx::xml::XmlElement;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const MARKER: &str = "{{DEFECTS_TABLE}}";

    fn package_with_table(columns: usize) -> DocxPackage {
        let grid: String = (0..columns)
            .map(|_| r#"<w:gridCol w:w="1000"/>"#)
            .collect();
        let header: String = (0..columns)
            .map(|i| format!(r#"<w:tc><w:p><w:r><w:t>H{}</w:t></w:r></w:p></w:tc>"#, i))
            .collect();
        let document = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p><w:p/><w:tbl><w:tblPr/><w:tblGrid>{}</w:tblGrid><w:tr>{}</w:tr><w:tr>{}</w:tr></w:tbl><w:sectPr/></w:body></w:document>"#,
            MARKER, grid, header, header
        );
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            zip.start_file("word/document.xml", SimpleFileOptions::default())
                .unwrap();
            zip.write_all(document.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        DocxPackage::from_reader(Cursor::new(buffer.into_inner())).unwrap()
    }

    fn defect(placement: &str, name: &str) -> DefectRecord {
        DefectRecord {
            placement: placement.to_string(),
            name: name.to_string(),
            ..DefectRecord::default()
        }
    }

    fn table_rows(package: &mut DocxPackage) -> Vec<Vec<String>> {
        let body = package.body_mut().unwrap();
        let tbl: &XmlElement = body.child("w:tbl").unwrap();
        table::rows(tbl)
            .map(|row| {
                table::cells(row)
                    .map(|cell| cell.children_named("w:p").map(paragraph::text).collect())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_sections_sorted_numerically_with_contiguous_numbering() {
        let mut package = package_with_table(6);
        let defects = vec![
            DefectRecord {
                safety: "2".to_string(),
                loadcap: "1".to_string(),
                option: "S = 2 м2".to_string(),
                ..defect("2.Опоры", "Трещины")
            },
            defect("10.Пролёты", "Сколы"),
            defect("2.Опоры", "Коррозия"),
        ];

        let written = fill_defects_table(&mut package, MARKER, &defects).unwrap();
        assert_eq!(written, 3);

        let rows = table_rows(&mut package);
        assert_eq!(rows.len(), 1 + 2 + 3);
        assert_eq!(rows[0][0], "H0");
        assert_eq!(rows[1], vec!["Опоры"]);
        assert_eq!(rows[2][0], "1");
        assert_eq!(rows[2][2], "Трещины");
        assert_eq!(rows[2][3], "S = 2 м²");
        assert_eq!(rows[2][4], "Б2, Г");
        assert_eq!(rows[3][0], "2");
        assert_eq!(rows[3][2], "Коррозия");
        assert_eq!(rows[4], vec!["Пролёты"]);
        assert_eq!(rows[5][0], "3");
        assert_eq!(rows[5][4], "\u{a0}");

        let body = package.body_mut().unwrap();
        assert!(!body.text().contains(MARKER));
    }

    #[test]
    fn test_section_row_is_merged_and_bold() {
        let mut package = package_with_table(7);
        fill_defects_table(&mut package, MARKER, &[defect("1.Мост", "x")]).unwrap();

        let body = package.body_mut().unwrap();
        let tbl = body.child("w:tbl").unwrap();
        let section = table::rows(tbl).nth(1).unwrap();
        let cell = table::cells(section).next().unwrap();
        let span = cell
            .child("w:tcPr")
            .and_then(|pr| pr.child("w:gridSpan"))
            .and_then(|s| s.attr("w:val"));
        assert_eq!(span, Some("7"));

        let run = cell.child("w:p").and_then(|p| p.child("w:r")).unwrap();
        assert!(paragraph::is_bold(run));
        assert_eq!(RunFormat::from_run(run).size.as_deref(), Some("24"));

        // Seven-column templates get an empty seventh cell on defect rows
        let row = table::rows(tbl).nth(2).unwrap();
        assert_eq!(table::cells(row).count(), 7);
    }

    #[test]
    fn test_non_numeric_and_empty_placements() {
        let mut package = package_with_table(6);
        let defects = vec![
            defect("Прочее", "a"),
            defect("", "lost"),
            defect("3.Покрытие", "b"),
        ];
        let written = fill_defects_table(&mut package, MARKER, &defects).unwrap();
        assert_eq!(written, 2);

        let rows = table_rows(&mut package);
        assert_eq!(rows[1], vec!["Покрытие"]);
        assert_eq!(rows[3], vec!["Прочее"]);
    }

    #[test]
    fn test_table_contract_violations() {
        let mut narrow = package_with_table(5);
        let err = fill_defects_table(&mut narrow, MARKER, &[]).unwrap_err();
        assert!(matches!(
            err,
            ExportError::DefectsTableTooNarrow {
                found: 5,
                required: 6
            }
        ));

        let mut wrong_marker = package_with_table(6);
        let err = fill_defects_table(&mut wrong_marker, "{{OTHER}}", &[]).unwrap_err();
        assert!(matches!(err, ExportError::DefectsTableNotFound { .. }));
    }
}
