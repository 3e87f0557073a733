//! Top-level blocks of the document body
//!
//! The body is an ordered sequence of paragraphs and tables (plus section
//! properties and the occasional content control). Markers are located by
//! paragraph text, and every index handed out here is a position in the body's
//! element sequence.

use std::ops::Range;

use super::paragraph;
use super::xml::{XmlElement, XmlNode};

/// Kind of a body-level block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Table,
    Other,
}

impl BlockKind {
    fn of(element: &XmlElement) -> Self {
        match element.name.as_str() {
            "w:p" => BlockKind::Paragraph,
            "w:tbl" => BlockKind::Table,
            _ => BlockKind::Other,
        }
    }
}

/// Mutable view over `w:body`
pub struct Body<'a> {
    element: &'a mut XmlElement,
}

impl<'a> Body<'a> {
    pub fn new(element: &'a mut XmlElement) -> Self {
        // Stray text nodes would shift block indices
        element
            .children
            .retain(|node| matches!(node, XmlNode::Element(_)));
        Self { element }
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.element.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element.children.is_empty()
    }

    /// Kind of the block at `index`
    pub fn kind(&self, index: usize) -> Option<BlockKind> {
        self.get(index).map(BlockKind::of)
    }

    pub fn get(&self, index: usize) -> Option<&XmlElement> {
        match self.element.children.get(index) {
            Some(XmlNode::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut XmlElement> {
        match self.element.children.get_mut(index) {
            Some(XmlNode::Element(element)) => Some(element),
            _ => None,
        }
    }

    /// All blocks, in order
    pub fn blocks(&self) -> impl Iterator<Item = &XmlElement> {
        self.element.elements()
    }

    /// The underlying `w:body` element
    pub fn element_mut(&mut self) -> &mut XmlElement {
        self.element
    }

    /// Index of the first top-level paragraph whose text contains `marker`
    pub fn find_marker(&self, marker: &str) -> Option<usize> {
        self.find_marker_from(marker, 0)
    }

    /// Like [`Body::find_marker`], searching from `start` onwards
    pub fn find_marker_from(&self, marker: &str, start: usize) -> Option<usize> {
        self.blocks()
            .enumerate()
            .skip(start)
            .find(|(_, block)| block.is("w:p") && paragraph::text(block).contains(marker))
            .map(|(index, _)| index)
    }

    /// Index of the first table after the paragraph holding `marker`
    pub fn table_after_marker(&self, marker: &str) -> Option<usize> {
        let marker_index = self.find_marker(marker)?;
        self.blocks()
            .enumerate()
            .skip(marker_index + 1)
            .find(|(_, block)| block.is("w:tbl"))
            .map(|(index, _)| index)
    }

    /// Insert a block before `index` (or at the end if `index == len`)
    pub fn insert(&mut self, index: usize, block: XmlElement) {
        self.element.children.insert(index, XmlNode::Element(block));
    }

    /// Remove and return the block at `index`
    pub fn remove(&mut self, index: usize) -> Option<XmlElement> {
        if index >= self.len() {
            return None;
        }
        match self.element.children.remove(index) {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        }
    }

    /// Remove and return a contiguous run of blocks
    pub fn drain(&mut self, range: Range<usize>) -> Vec<XmlElement> {
        self.element
            .children
            .drain(range)
            .filter_map(|node| match node {
                XmlNode::Element(element) => Some(element),
                XmlNode::Text(_) => None,
            })
            .collect()
    }
}
