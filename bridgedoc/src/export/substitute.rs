//! Placeholder substitution at run level
//!
//! Tokens such as `{{bridge.length}}` are often split by Word across several
//! runs, so matching happens on the paragraph's concatenated text. When a
//! paragraph contains a token, its text is rebuilt into the first run with
//! the formatting of a sample run copied over; paragraphs without a token are
//! never touched.

use std::sync::OnceLock;

use regex::Regex;

use super::format::NBSP;
use crate::docx::paragraph::{self, RunFormat};
use crate::docx::xml::{XmlElement, XmlNode};
use crate::docx::{DocxPackage, PackageError};

/// Ordered token → value mapping
///
/// Tokens are replaced one after another in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    pairs: Vec<(String, String)>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{{prefix.key}}`
    pub fn token(prefix: &str, key: &str) -> String {
        format!("{{{{{}.{}}}}}", prefix, key)
    }

    /// Add or replace a token
    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        let token = token.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(t, _)| *t == token) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((token, value)),
        }
    }

    /// Add a token whose value may be absent (absent → empty string)
    pub fn insert_opt(&mut self, token: impl Into<String>, value: Option<&str>) {
        self.insert(token, value.unwrap_or_default());
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn matches(&self, text: &str) -> bool {
        self.pairs.iter().any(|(token, _)| text.contains(token.as_str()))
    }

    fn apply(&self, text: &str) -> String {
        self.pairs
            .iter()
            .fold(text.to_string(), |acc, (token, value)| acc.replace(token.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Substitutions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut subs = Substitutions::new();
        for (token, value) in iter {
            subs.insert(token, value);
        }
        subs
    }
}

/// Substitute tokens in one paragraph
///
/// Returns whether the paragraph was rewritten.
pub fn substitute_paragraph(p: &mut XmlElement, subs: &Substitutions) -> bool {
    if paragraph::runs(p).next().is_none() {
        return false;
    }

    let original = paragraph::text(p);
    if !subs.matches(&original) {
        return false;
    }
    let replaced = subs.apply(&original);

    let any_bold = paragraph::runs(p).any(paragraph::is_bold);
    let sample = paragraph::runs(p)
        .find(|run| !paragraph::run_text(run).is_empty())
        .or_else(|| paragraph::runs(p).next())
        .map(RunFormat::from_run)
        .unwrap_or_default();
    let format = if any_bold {
        RunFormat {
            bold: Some(true),
            ..sample
        }
    } else {
        sample
    };

    let mut first = true;
    for run in paragraph::runs_mut(p) {
        if first {
            paragraph::set_run_text(run, &replaced);
            format.replace_on(run);
            first = false;
        } else {
            paragraph::set_run_text(run, "");
        }
    }

    // Drop the emptied runs unless they still hold something (a drawing, a field)
    let mut seen_first = false;
    p.children.retain(|node| match node {
        XmlNode::Element(run) if run.is("w:r") => {
            if !seen_first {
                seen_first = true;
                return true;
            }
            run.elements().any(|child| !child.is("w:rPr"))
        }
        _ => true,
    });

    true
}

/// Substitute tokens in every paragraph below an element (table, cell, ...)
///
/// Returns the number of rewritten paragraphs.
pub fn substitute_in(element: &mut XmlElement, subs: &Substitutions) -> usize {
    if element.is("w:p") {
        return usize::from(substitute_paragraph(element, subs));
    }
    let mut count = 0;
    paragraph::for_each_paragraph_mut(element, &mut |p| {
        if substitute_paragraph(p, subs) {
            count += 1;
        }
    });
    count
}

/// Substitute tokens in a slice of body blocks
pub fn substitute_blocks(blocks: &mut [XmlElement], subs: &Substitutions) -> usize {
    blocks
        .iter_mut()
        .map(|block| substitute_in(block, subs))
        .sum()
}

/// Substitute tokens in the whole document: body, tables, headers and footers
pub fn substitute_everywhere(
    package: &mut DocxPackage,
    subs: &Substitutions,
) -> Result<usize, PackageError> {
    let mut count = substitute_in(package.body_mut()?, subs);
    for part in package.header_footer_parts()? {
        count += substitute_in(package.xml_part_mut(&part)?, subs);
    }
    log::debug!("Substituted {} tokens in {} paragraphs", subs.len(), count);
    Ok(count)
}

/// Remove a marker from a paragraph, preferring run-level edits
///
/// Only when the marker is split across runs does the paragraph get rebuilt.
pub fn remove_marker(p: &mut XmlElement, marker: &str) -> bool {
    if !paragraph::text(p).contains(marker) {
        return false;
    }
    if paragraph::remove_from_runs(p, marker) {
        let subs: Substitutions = [(marker, "")].into_iter().collect();
        substitute_paragraph(p, &subs);
    }
    true
}

/// Remove a marker below an element
pub fn remove_marker_in(element: &mut XmlElement, marker: &str) -> usize {
    if element.is("w:p") {
        return usize::from(remove_marker(element, marker));
    }
    let mut count = 0;
    paragraph::for_each_paragraph_mut(element, &mut |p| {
        if remove_marker(p, marker) {
            count += 1;
        }
    });
    count
}

/// Remove a marker from the whole document, headers and footers included
pub fn remove_marker_everywhere(
    package: &mut DocxPackage,
    marker: &str,
) -> Result<usize, PackageError> {
    let mut count = remove_marker_in(package.body_mut()?, marker);
    for part in package.header_footer_parts()? {
        count += remove_marker_in(package.xml_part_mut(&part)?, marker);
    }
    log::debug!("Removed marker {} from {} paragraphs", marker, count);
    Ok(count)
}

/// Pattern of `{{prefix.key}}` and `{{prefixN.key}}` tokens
fn token_pattern() -> Option<&'static Regex> {
    static TOKEN: OnceLock<Option<Regex>> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(r"\{\{([A-Za-z]+)(\d*)\.([A-Za-z0-9_]+)\}\}").ok())
        .as_ref()
}

/// Which leftover tokens to blank out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenFamily<'a> {
    /// Token prefix, e.g. `span`
    pub prefix: &'a str,
    /// Match `{{span0.key}}` instead of `{{span.key}}`
    pub indexed: bool,
}

impl<'a> TokenFamily<'a> {
    pub fn plain(prefix: &'a str) -> Self {
        Self {
            prefix,
            indexed: false,
        }
    }

    pub fn indexed(prefix: &'a str) -> Self {
        Self {
            prefix,
            indexed: true,
        }
    }

    /// Tokens of this family occurring in `text`, in order of appearance
    pub fn tokens_in(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let Some(pattern) = token_pattern() else {
            return found;
        };
        for caps in pattern.captures_iter(text) {
            let (Some(whole), Some(name), Some(index)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if name.as_str() != self.prefix || index.as_str().is_empty() == self.indexed {
                continue;
            }
            let token = whole.as_str().to_string();
            if !found.contains(&token) {
                found.push(token);
            }
        }
        found
    }
}

/// Replace every remaining token of a family with the empty-value placeholder
///
/// Covers keys the template asks for but the record does not have.
pub fn sweep_tokens(element: &mut XmlElement, family: TokenFamily<'_>) -> usize {
    let sweep = |p: &mut XmlElement| {
        let tokens = family.tokens_in(&paragraph::text(p));
        if tokens.is_empty() {
            return false;
        }
        log::debug!("Blanking unmatched tokens {:?}", tokens);
        let subs: Substitutions = tokens.into_iter().map(|t| (t, NBSP)).collect();
        substitute_paragraph(p, &subs)
    };

    if element.is("w:p") {
        return usize::from(sweep(element));
    }
    let mut count = 0;
    paragraph::for_each_paragraph_mut(element, &mut |p| {
        if sweep(p) {
            count += 1;
        }
    });
    count
}

/// [`sweep_tokens`] over the whole document
pub fn sweep_tokens_everywhere(
    package: &mut DocxPackage,
    family: TokenFamily<'_>,
) -> Result<usize, PackageError> {
    let mut count = sweep_tokens(package.body_mut()?, family);
    for part in package.header_footer_parts()? {
        count += sweep_tokens(package.xml_part_mut(&part)?, family);
    }
    Ok(count)
}
