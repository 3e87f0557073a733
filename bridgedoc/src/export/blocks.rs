//! Repeatable block cloning
//!
//! A block is every body element from the paragraph holding the start marker
//! up to (not including) the paragraph holding the end marker. The block is
//! lifted out once and one substituted copy per record is put back in its
//! place, in record order.

use super::substitute::{self, Substitutions, TokenFamily};
use super::ExportError;
use crate::docx::{Body, DocxPackage};

/// Marker pair delimiting a repeatable block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMarkers<'a> {
    pub start: &'a str,
    pub end: &'a str,
    /// Token prefix used inside the block, e.g. `span`
    pub prefix: &'a str,
}

/// Clone the block once per item
///
/// With no items the block stays as it is and only the start marker is
/// removed. Returns the number of copies inserted.
pub fn clone_block<T>(
    package: &mut DocxPackage,
    markers: BlockMarkers<'_>,
    items: &[T],
    mapping: impl Fn(&T) -> Substitutions,
) -> Result<usize, ExportError> {
    if items.is_empty() {
        log::info!("No records for {}; keeping the template block", markers.start);
        substitute::remove_marker_everywhere(package, markers.start)?;
        return Ok(0);
    }

    let mut body = Body::new(package.body_mut()?);
    let start = body
        .find_marker(markers.start)
        .ok_or_else(|| ExportError::MarkerNotFound {
            marker: markers.start.to_string(),
        })?;
    let end = body
        .find_marker(markers.end)
        .ok_or_else(|| ExportError::MarkerNotFound {
            marker: markers.end.to_string(),
        })?;
    if end <= start {
        return Err(ExportError::MarkerOrder {
            start: markers.start.to_string(),
            end: markers.end.to_string(),
        });
    }

    let template = body.drain(start..end);
    log::debug!(
        "Block {}..{} spans {} elements at index {}",
        markers.start,
        markers.end,
        template.len(),
        start
    );

    let family = TokenFamily::plain(markers.prefix);
    let mut cursor = start;
    for item in items {
        let mut copy = template.clone();
        for element in copy.iter_mut() {
            substitute::remove_marker_in(element, markers.start);
        }

        let subs = mapping(item);
        substitute::substitute_blocks(&mut copy, &subs);
        for element in copy.iter_mut() {
            substitute::sweep_tokens(element, family);
        }

        for element in copy {
            body.insert(cursor, element);
            cursor += 1;
        }
    }

    log::info!(
        "Cloned {} block {} times",
        markers.start,
        items.len()
    );
    Ok(items.len())
}
