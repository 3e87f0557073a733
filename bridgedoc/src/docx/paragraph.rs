//! Paragraph and run primitives
//!
//! A paragraph (`w:p`) holds runs (`w:r`); a run holds its formatting
//! (`w:rPr`) and text content (`w:t`, `w:tab`, `w:br`, `w:cr`). Only direct
//! runs of a paragraph are considered, the same set Word's object model
//! exposes as the paragraph's runs.

use super::xml::{XmlElement, XmlNode};

/// Schema order of `w:rPr` children
const RPR_ORDER: &[&str] = &[
    "w:rStyle",
    "w:rFonts",
    "w:b",
    "w:bCs",
    "w:i",
    "w:iCs",
    "w:caps",
    "w:smallCaps",
    "w:strike",
    "w:dstrike",
    "w:outline",
    "w:shadow",
    "w:emboss",
    "w:imprint",
    "w:noProof",
    "w:snapToGrid",
    "w:vanish",
    "w:webHidden",
    "w:color",
    "w:spacing",
    "w:w",
    "w:kern",
    "w:position",
    "w:sz",
    "w:szCs",
    "w:highlight",
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
];

/// Schema order of `w:pPr` children
const PPR_ORDER: &[&str] = &[
    "w:pStyle",
    "w:keepNext",
    "w:keepLines",
    "w:pageBreakBefore",
    "w:framePr",
    "w:widowControl",
    "w:numPr",
    "w:suppressLineNumbers",
    "w:pBdr",
    "w:shd",
    "w:tabs",
    "w:suppressAutoHyphens",
    "w:kinsoku",
    "w:wordWrap",
    "w:overflowPunct",
    "w:topLinePunct",
    "w:autoSpaceDE",
    "w:autoSpaceDN",
    "w:bidi",
    "w:adjustRightInd",
    "w:snapToGrid",
    "w:spacing",
    "w:ind",
    "w:contextualSpacing",
    "w:mirrorIndents",
    "w:suppressOverlap",
    "w:jc",
    "w:textDirection",
    "w:textAlignment",
    "w:textboxTightWrap",
    "w:outlineLvl",
    "w:divId",
    "w:cnfStyle",
    "w:rPr",
    "w:sectPr",
    "w:pPrChange",
];

/// `w:rPr` children that [`RunFormat`] reads and writes
const FORMAT_PROPERTIES: &[&str] = &[
    "w:rFonts",
    "w:b",
    "w:i",
    "w:caps",
    "w:smallCaps",
    "w:strike",
    "w:dstrike",
    "w:color",
    "w:sz",
    "w:szCs",
    "w:u",
    "w:vertAlign",
];

/// Run children that carry text
const TEXT_CONTENT: &[&str] = &["w:t", "w:tab", "w:br", "w:cr"];

/// Direct runs of a paragraph
pub fn runs(paragraph: &XmlElement) -> impl Iterator<Item = &XmlElement> {
    paragraph.children_named("w:r")
}

/// Mutable direct runs of a paragraph
pub fn runs_mut(paragraph: &mut XmlElement) -> impl Iterator<Item = &mut XmlElement> {
    paragraph.elements_mut().filter(|e| e.is("w:r"))
}

/// Text of a single run
///
/// Tabs and breaks are rendered as `\t` and `\n`.
pub fn run_text(run: &XmlElement) -> String {
    let mut text = String::new();
    for child in run.elements() {
        match child.name.as_str() {
            "w:t" => text.push_str(&child.text()),
            "w:tab" => text.push('\t'),
            "w:br" | "w:cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

/// Text of a paragraph: the concatenation of its runs
pub fn text(paragraph: &XmlElement) -> String {
    runs(paragraph).map(run_text).collect()
}

/// Replace the text content of a run, keeping its formatting and any
/// non-text content such as drawings
pub fn set_run_text(run: &mut XmlElement, text: &str) {
    run.children.retain(|node| match node {
        XmlNode::Element(e) => !TEXT_CONTENT.contains(&e.name.as_str()),
        XmlNode::Text(_) => false,
    });
    run.children.extend(text_content(text).into_iter().map(XmlNode::Element));
}

/// Build the `w:t`/`w:tab`/`w:br` sequence for a string
fn text_content(text: &str) -> Vec<XmlElement> {
    let mut content = Vec::new();
    for (line_index, line) in text.split('\n').enumerate() {
        if line_index > 0 {
            content.push(XmlElement::new("w:br"));
        }
        for (tab_index, segment) in line.split('\t').enumerate() {
            if tab_index > 0 {
                content.push(XmlElement::new("w:tab"));
            }
            if !segment.is_empty() {
                content.push(
                    XmlElement::new("w:t")
                        .with_attr("xml:space", "preserve")
                        .with_text(segment),
                );
            }
        }
    }
    content
}

/// Create a run with the given text and formatting
pub fn new_run(text: &str, format: &RunFormat) -> XmlElement {
    let mut run = XmlElement::new("w:r");
    format.apply(&mut run);
    set_run_text(&mut run, text);
    run
}

/// Create a paragraph holding a single run
pub fn new_paragraph(text: &str, format: &RunFormat) -> XmlElement {
    let mut paragraph = XmlElement::new("w:p");
    if !text.is_empty() {
        paragraph.push(new_run(text, format));
    }
    paragraph
}

/// Whether an on/off property element is switched on
///
/// `<w:b/>` and `<w:b w:val="true"/>` are on; `w:val` of `0`, `false` or `off`
/// is off.
fn is_on(property: &XmlElement) -> bool {
    !matches!(property.attr("w:val"), Some("0") | Some("false") | Some("off"))
}

/// Whether a run is explicitly bold
pub fn is_bold(run: &XmlElement) -> bool {
    run.child("w:rPr")
        .and_then(|rpr| rpr.child("w:b"))
        .is_some_and(is_on)
}

/// Character formatting carried from one run to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFormat {
    /// Bold
    pub bold: Option<bool>,
    /// Italic
    pub italic: Option<bool>,
    /// Underline style (`w:u w:val`)
    pub underline: Option<String>,
    /// Font family (`w:rFonts`, all attributes)
    pub fonts: Option<XmlElement>,
    /// Font size in half-points
    pub size: Option<String>,
    /// All caps
    pub caps: Option<bool>,
    /// Small caps
    pub small_caps: Option<bool>,
    /// Single strike-through
    pub strike: Option<bool>,
    /// Double strike-through
    pub double_strike: Option<bool>,
    /// `superscript` / `subscript` / `baseline`
    pub vertical_align: Option<String>,
    /// Explicit RGB color
    pub color: Option<String>,
}

impl RunFormat {
    /// Bold text, everything else inherited
    pub fn bold() -> Self {
        Self {
            bold: Some(true),
            ..Self::default()
        }
    }

    /// Read the formatting of a run
    pub fn from_run(run: &XmlElement) -> Self {
        let Some(rpr) = run.child("w:rPr") else {
            return Self::default();
        };
        let flag = |name: &str| rpr.child(name).map(is_on);
        let value = |name: &str| {
            rpr.child(name)
                .and_then(|e| e.attr("w:val"))
                .map(str::to_string)
        };

        Self {
            bold: flag("w:b"),
            italic: flag("w:i"),
            underline: value("w:u"),
            fonts: rpr.child("w:rFonts").cloned(),
            size: value("w:sz"),
            caps: flag("w:caps"),
            small_caps: flag("w:smallCaps"),
            strike: flag("w:strike"),
            double_strike: flag("w:dstrike"),
            vertical_align: value("w:vertAlign"),
            color: value("w:color").filter(|c| c != "auto"),
        }
    }

    /// Write this formatting onto a run, leaving unset properties untouched
    pub fn apply(&self, run: &mut XmlElement) {
        let has_any = self.bold.is_some()
            || self.italic.is_some()
            || self.underline.is_some()
            || self.fonts.is_some()
            || self.size.is_some()
            || self.caps.is_some()
            || self.small_caps.is_some()
            || self.strike.is_some()
            || self.double_strike.is_some()
            || self.vertical_align.is_some()
            || self.color.is_some();
        if !has_any {
            return;
        }
        run.edit_first_child("w:rPr", |rpr| self.write_properties(rpr));
    }

    /// Make a run look exactly like this formatting
    ///
    /// Unlike [`RunFormat::apply`], properties this format does not carry are
    /// removed from the run, so nothing of its previous look survives.
    pub fn replace_on(&self, run: &mut XmlElement) {
        if let Some(rpr) = run.child_mut("w:rPr") {
            for name in FORMAT_PROPERTIES {
                rpr.remove_children_named(name);
            }
        }
        self.apply(run);
    }

    fn write_properties(&self, rpr: &mut XmlElement) {
        let toggles = [
            ("w:b", self.bold),
            ("w:i", self.italic),
            ("w:caps", self.caps),
            ("w:smallCaps", self.small_caps),
            ("w:strike", self.strike),
            ("w:dstrike", self.double_strike),
        ];
        for (name, state) in toggles {
            if let Some(on) = state {
                let mut property = XmlElement::new(name);
                if !on {
                    property.set_attr("w:val", "0");
                }
                rpr.set_ordered_child(property, RPR_ORDER);
            }
        }

        if let Some(fonts) = &self.fonts {
            rpr.set_ordered_child(fonts.clone(), RPR_ORDER);
        }
        let values = [
            ("w:u", &self.underline),
            ("w:sz", &self.size),
            ("w:vertAlign", &self.vertical_align),
            ("w:color", &self.color),
        ];
        for (name, value) in values {
            if let Some(value) = value {
                rpr.set_ordered_child(
                    XmlElement::new(name).with_attr("w:val", value.as_str()),
                    RPR_ORDER,
                );
            }
        }
        if let Some(size) = &self.size {
            rpr.set_ordered_child(
                XmlElement::new("w:szCs").with_attr("w:val", size.as_str()),
                RPR_ORDER,
            );
        }
    }
}

/// Set a paragraph property (`w:jc`, `w:spacing`, ...) in schema order
fn set_paragraph_property(paragraph: &mut XmlElement, property: XmlElement) {
    paragraph.edit_first_child("w:pPr", |ppr| ppr.set_ordered_child(property, PPR_ORDER));
}

/// Set horizontal alignment (`left`, `center`, `right`, `both`)
pub fn set_alignment(paragraph: &mut XmlElement, alignment: &str) {
    set_paragraph_property(
        paragraph,
        XmlElement::new("w:jc").with_attr("w:val", alignment),
    );
}

/// Set the space after the paragraph, in twentieths of a point
pub fn set_space_after(paragraph: &mut XmlElement, twips: u32) {
    set_paragraph_property(
        paragraph,
        XmlElement::new("w:spacing")
            .with_attr("w:before", "0")
            .with_attr("w:after", twips.to_string()),
    );
}

/// Remove a marker from the text of each run that contains it whole
///
/// Formatting is untouched. Returns whether the paragraph still contains the
/// marker afterwards (split across runs).
pub fn remove_from_runs(paragraph: &mut XmlElement, marker: &str) -> bool {
    for run in runs_mut(paragraph) {
        let current = run_text(run);
        if current.contains(marker) {
            set_run_text(run, &current.replace(marker, ""));
        }
    }
    text(paragraph).contains(marker)
}

/// Visit every paragraph under a container, in document order
///
/// Descends into tables, rows, cells and content controls, so nested tables
/// are covered too.
pub fn for_each_paragraph_mut(container: &mut XmlElement, f: &mut dyn FnMut(&mut XmlElement)) {
    for child in container.elements_mut() {
        match child.name.as_str() {
            "w:p" => f(child),
            "w:tbl" | "w:tr" | "w:tc" | "w:sdt" | "w:sdtContent" | "w:customXml" => {
                for_each_paragraph_mut(child, f)
            }
            _ => {}
        }
    }
}

/// Visit every paragraph under a container, read-only
pub fn for_each_paragraph(container: &XmlElement, f: &mut dyn FnMut(&XmlElement)) {
    for child in container.elements() {
        match child.name.as_str() {
            "w:p" => f(child),
            "w:tbl" | "w:tr" | "w:tc" | "w:sdt" | "w:sdtContent" | "w:customXml" => {
                for_each_paragraph(child, f)
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::parse_fragment;

    fn paragraph(xml: &str) -> XmlElement {
        parse_fragment(xml).unwrap().remove(0)
    }

    #[test]
    fn test_text_concatenates_runs_with_tabs_and_breaks() {
        let p = paragraph(
            r#"<w:p><w:r><w:t>Span</w:t><w:tab/></w:r><w:r><w:t xml:space="preserve">No. 1</w:t><w:br/></w:r><w:hyperlink><w:r><w:t>skip</w:t></w:r></w:hyperlink></w:p>"#,
        );
        assert_eq!(text(&p), "Span\tNo. 1\n");
    }

    #[test]
    fn test_set_run_text_keeps_formatting_and_drawings() {
        let mut run = paragraph(
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>old</w:t><w:drawing/></w:r></w:p>"#,
        )
        .children_named("w:r")
        .next()
        .cloned()
        .unwrap();
        set_run_text(&mut run, "a\tb\nc");
        assert!(is_bold(&run));
        assert!(run.child("w:drawing").is_some());
        assert_eq!(run_text(&run), "a\tb\nc");
    }

    #[test]
    fn test_bold_detection_respects_val() {
        let p = paragraph(
            r#"<w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>a</w:t></w:r><w:r><w:rPr><w:b w:val="true"/></w:rPr><w:t>b</w:t></w:r></w:p>"#,
        );
        let flags: Vec<bool> = runs(&p).map(is_bold).collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_run_format_copy() {
        let source = paragraph(
            r#"<w:p><w:r><w:rPr><w:rFonts w:ascii="Times New Roman"/><w:caps/><w:color w:val="FF0000"/><w:sz w:val="24"/><w:vertAlign w:val="superscript"/></w:rPr><w:t>x</w:t></w:r></w:p>"#,
        );
        let format = RunFormat::from_run(runs(&source).next().unwrap());
        assert_eq!(format.size.as_deref(), Some("24"));
        assert_eq!(format.caps, Some(true));
        assert_eq!(format.color.as_deref(), Some("FF0000"));

        let mut target = XmlElement::new("w:r");
        format.apply(&mut target);
        let copied = RunFormat::from_run(&target);
        assert_eq!(copied.fonts, format.fonts);
        assert_eq!(copied.vertical_align.as_deref(), Some("superscript"));

        let names: Vec<&str> = target
            .child("w:rPr")
            .unwrap()
            .elements()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["w:rFonts", "w:caps", "w:color", "w:sz", "w:szCs", "w:vertAlign"]
        );
    }

    #[test]
    fn test_replace_on_clears_properties_the_format_lacks() {
        let p = paragraph(
            r#"<w:p><w:r><w:rPr><w:rStyle w:val="Strong"/><w:i/><w:caps/><w:sz w:val="32"/><w:szCs w:val="32"/></w:rPr><w:t>x</w:t></w:r></w:p>"#,
        );
        let mut run = runs(&p).next().unwrap().clone();
        let format = RunFormat {
            size: Some("22".to_string()),
            ..RunFormat::default()
        };
        format.replace_on(&mut run);

        assert_eq!(RunFormat::from_run(&run), format);
        let rpr = run.child("w:rPr").unwrap();
        let names: Vec<&str> = rpr.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:rStyle", "w:sz", "w:szCs"]);
    }

    #[test]
    fn test_remove_from_runs_reports_split_markers() {
        let mut whole = paragraph(r#"<w:p><w:r><w:t>{{MARK}} tail</w:t></w:r></w:p>"#);
        assert!(!remove_from_runs(&mut whole, "{{MARK}}"));
        assert_eq!(text(&whole), " tail");

        let mut split = paragraph(r#"<w:p><w:r><w:t>{{MA</w:t></w:r><w:r><w:t>RK}}</w:t></w:r></w:p>"#);
        assert!(remove_from_runs(&mut split, "{{MARK}}"));
    }

    #[test]
    fn test_alignment_goes_into_ppr_in_order() {
        let mut p = paragraph(r#"<w:p><w:pPr><w:pStyle w:val="Caption"/><w:rPr/></w:pPr></w:p>"#);
        set_alignment(&mut p, "center");
        set_space_after(&mut p, 120);
        let names: Vec<&str> = p
            .child("w:pPr")
            .unwrap()
            .elements()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["w:pStyle", "w:spacing", "w:jc", "w:rPr"]);
    }

    #[test]
    fn test_for_each_paragraph_reaches_nested_tables() {
        let body = paragraph(
            r#"<w:body><w:p/><w:tbl><w:tr><w:tc><w:p/><w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl></w:tc></w:tr></w:tbl><w:sectPr/></w:body>"#,
        );
        let mut count = 0;
        for_each_paragraph(&body, &mut |_| count += 1);
        assert_eq!(count, 3);
    }
}
