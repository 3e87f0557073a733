//! Table helpers: column count, row truncation and row construction

use super::paragraph::{self, RunFormat};
use super::xml::{XmlElement, XmlNode};

/// Schema order of `w:tcPr` children
const TCPR_ORDER: &[&str] = &[
    "w:cnfStyle",
    "w:tcW",
    "w:gridSpan",
    "w:hMerge",
    "w:vMerge",
    "w:tcBorders",
    "w:shd",
    "w:noWrap",
    "w:tcMar",
    "w:textDirection",
    "w:tcFitText",
    "w:vAlign",
    "w:hideMark",
];

/// Rows of a table
pub fn rows(table: &XmlElement) -> impl Iterator<Item = &XmlElement> {
    table.children_named("w:tr")
}

/// Cells of a row
pub fn cells(row: &XmlElement) -> impl Iterator<Item = &XmlElement> {
    row.children_named("w:tc")
}

fn grid_span(cell: &XmlElement) -> usize {
    cell.child("w:tcPr")
        .and_then(|pr| pr.child("w:gridSpan"))
        .and_then(|span| span.attr("w:val"))
        .and_then(|val| val.parse().ok())
        .unwrap_or(1)
}

/// Widths of the table grid columns, in twips (0 when unspecified)
pub fn grid_widths(table: &XmlElement) -> Vec<u32> {
    table
        .child("w:tblGrid")
        .map(|grid| {
            grid.children_named("w:gridCol")
                .map(|col| col.attr("w:w").and_then(|w| w.parse().ok()).unwrap_or(0))
                .collect()
        })
        .unwrap_or_default()
}

/// Number of grid columns
///
/// Uses `w:tblGrid`; tables without a grid fall back to the widest row,
/// counting merged cells by their span.
pub fn column_count(table: &XmlElement) -> usize {
    let grid = grid_widths(table).len();
    if grid > 0 {
        return grid;
    }
    rows(table)
        .map(|row| cells(row).map(grid_span).sum::<usize>())
        .max()
        .unwrap_or(0)
}

/// Remove every row after the first `keep` rows
pub fn truncate_rows(table: &mut XmlElement, keep: usize) {
    let mut seen = 0;
    table.children.retain(|node| match node {
        XmlNode::Element(e) if e.is("w:tr") => {
            seen += 1;
            seen <= keep
        }
        _ => true,
    });
}

/// Content of a cell being built
#[derive(Debug, Clone, Default)]
pub struct CellSpec {
    /// Cell text
    pub text: String,
    /// Grid columns covered
    pub span: usize,
    /// Width in twips, if known
    pub width: Option<u32>,
    /// Run formatting
    pub format: RunFormat,
}

impl CellSpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            span: 1,
            ..Self::default()
        }
    }
}

/// Build a table cell whose text is centered both ways
pub fn centered_cell(spec: &CellSpec) -> XmlElement {
    let mut cell = XmlElement::new("w:tc");
    cell.edit_first_child("w:tcPr", |tcpr| {
        if let Some(width) = spec.width {
            tcpr.set_ordered_child(
                XmlElement::new("w:tcW")
                    .with_attr("w:w", width.to_string())
                    .with_attr("w:type", "dxa"),
                TCPR_ORDER,
            );
        }
        if spec.span > 1 {
            tcpr.set_ordered_child(
                XmlElement::new("w:gridSpan").with_attr("w:val", spec.span.to_string()),
                TCPR_ORDER,
            );
        }
        tcpr.set_ordered_child(
            XmlElement::new("w:vAlign").with_attr("w:val", "center"),
            TCPR_ORDER,
        );
    });

    // A cell must contain at least one paragraph
    let mut p = paragraph::new_paragraph(&spec.text, &spec.format);
    paragraph::set_alignment(&mut p, "center");
    cell.push(p);
    cell
}

/// Build a row from cell specs
pub fn new_row(cells: &[CellSpec]) -> XmlElement {
    cells
        .iter()
        .fold(XmlElement::new("w:tr"), |row, spec| row.with_child(centered_cell(spec)))
}
