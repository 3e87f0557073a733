//! DOCX package access
//!
//! A .docx file is a ZIP archive of XML parts. The package keeps every entry
//! of the template in its original order; parts that the exporter touches are
//! parsed on first access into an owned [`XmlElement`] tree and serialized back
//! on save, everything else is copied byte for byte. This preserves title
//! pages, styles, numbering, themes and document properties exactly as the
//! template author left them.

use super::xml::{self, XmlElement};
use std::io::{Read, Seek, Write};
use std::path::Path;
use thiserror::Error;
use zip::read::ZipArchive;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Main document part
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Relationships of the main document part
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";

/// Package content types
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const IMAGE_RELATIONSHIP_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const HEADER_RELATIONSHIP_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const FOOTER_RELATIONSHIP_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Errors raised while reading or writing a package
#[derive(Error, Debug)]
pub enum PackageError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A part could not be parsed as XML
    #[error("XML error in {part}: {source}")]
    Xml {
        /// Part name inside the archive
        part: String,
        /// Parser diagnostic
        #[source]
        source: roxmltree::Error,
    },

    /// A part is not UTF-8 text
    #[error("Part {0} is not valid UTF-8")]
    Encoding(String),

    /// A required part is absent
    #[error("Missing part: {0}")]
    MissingPart(String),

    /// A part does not have the expected structure
    #[error("Malformed part {part}: {message}")]
    Malformed {
        /// Part name inside the archive
        part: String,
        /// What was expected
        message: String,
    },
}

enum PartData {
    Raw(Vec<u8>),
    Xml(XmlElement),
}

struct PackageEntry {
    name: String,
    data: PartData,
}

/// An image stored in the package and referenced from the main document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// Relationship ID used by `a:blip r:embed`
    pub rel_id: String,
    /// Natural size in pixels, when the header could be read
    pub pixel_size: Option<(usize, usize)>,
}

/// An opened .docx package
pub struct DocxPackage {
    entries: Vec<PackageEntry>,
    media_counter: usize,
    drawing_counter: u32,
}

impl DocxPackage {
    /// Open a .docx file
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        log::info!("Reading template from {}", path.display());
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Read a package from any seekable source
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();

            // Skip directories
            if name.ends_with('/') {
                continue;
            }

            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            entries.push(PackageEntry {
                name,
                data: PartData::Raw(contents),
            });
        }

        if !entries.iter().any(|e| e.name == DOCUMENT_PART) {
            return Err(PackageError::MissingPart(DOCUMENT_PART.to_string()));
        }

        log::debug!("Package has {} parts", entries.len());
        Ok(Self {
            entries,
            media_counter: 0,
            drawing_counter: 5000,
        })
    }

    /// Names of all parts, in archive order
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Whether the package contains a part
    pub fn has_part(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Raw bytes of a part, serializing it if it has been parsed
    pub fn part_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.iter().find(|e| e.name == name).map(|e| match &e.data {
            PartData::Raw(bytes) => bytes.clone(),
            PartData::Xml(root) => xml::to_part_bytes(root),
        })
    }

    /// Parsed root element of an XML part
    pub fn xml_part_mut(&mut self, name: &str) -> Result<&mut XmlElement, PackageError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| PackageError::MissingPart(name.to_string()))?;

        if let PartData::Raw(bytes) = &entry.data {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| PackageError::Encoding(name.to_string()))?;
            // Parts may start with a UTF-8 byte order mark
            let text = text.trim_start_matches('\u{feff}');
            let root = xml::parse(text).map_err(|source| PackageError::Xml {
                part: name.to_string(),
                source,
            })?;
            entry.data = PartData::Xml(root);
        }

        match &mut entry.data {
            PartData::Xml(root) => Ok(root),
            PartData::Raw(_) => Err(PackageError::Malformed {
                part: name.to_string(),
                message: "part is not XML".to_string(),
            }),
        }
    }

    /// The `w:body` element of the main document
    pub fn body_mut(&mut self) -> Result<&mut XmlElement, PackageError> {
        self.xml_part_mut(DOCUMENT_PART)?
            .child_mut("w:body")
            .ok_or_else(|| PackageError::Malformed {
                part: DOCUMENT_PART.to_string(),
                message: "no w:body element".to_string(),
            })
    }

    /// Header and footer parts (every section, every variant)
    ///
    /// Follows the main document's relationships. A package without a
    /// relationships part falls back to the conventional part names.
    pub fn header_footer_parts(&self) -> Result<Vec<String>, PackageError> {
        let Some(bytes) = self.part_bytes(DOCUMENT_RELS_PART) else {
            return Ok(self
                .entries
                .iter()
                .map(|e| e.name.as_str())
                .filter(|name| is_header_or_footer(name))
                .map(str::to_string)
                .collect());
        };

        let text = std::str::from_utf8(&bytes)
            .map_err(|_| PackageError::Encoding(DOCUMENT_RELS_PART.to_string()))?;
        let rels = roxmltree::Document::parse(text.trim_start_matches('\u{feff}')).map_err(
            |source| PackageError::Xml {
                part: DOCUMENT_RELS_PART.to_string(),
                source,
            },
        )?;

        let mut parts: Vec<String> = Vec::new();
        for rel in rels
            .root_element()
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
        {
            let wanted = rel.attribute("Type").is_some_and(|t| {
                t == HEADER_RELATIONSHIP_TYPE || t == FOOTER_RELATIONSHIP_TYPE
            });
            if !wanted || rel.attribute("TargetMode") == Some("External") {
                continue;
            }
            let Some(target) = rel.attribute("Target") else {
                continue;
            };
            let name = resolve_target(target);
            if !self.has_part(&name) {
                log::warn!("Relationship {:?} points to missing part {}", rel.attribute("Id"), name);
                continue;
            }
            if !parts.contains(&name) {
                parts.push(name);
            }
        }
        Ok(parts)
    }

    /// Allocate a drawing object ID unique within this export
    pub fn next_drawing_id(&mut self) -> u32 {
        self.drawing_counter += 1;
        self.drawing_counter
    }

    /// Store an image file as media of the main document
    ///
    /// Returns `Ok(None)` when the file cannot be read; a missing photo leaves
    /// an empty slot rather than failing the export.
    pub fn embed_image(&mut self, path: &Path) -> Result<Option<EmbeddedImage>, PackageError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Could not read image {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
            .to_lowercase();

        let pixel_size = match imagesize::blob_size(&bytes) {
            Ok(size) if size.width > 0 && size.height > 0 => Some((size.width, size.height)),
            Ok(_) => None,
            Err(e) => {
                log::warn!(
                    "Could not read dimensions for {}: {}",
                    path.display(),
                    e
                );
                None
            }
        };

        self.media_counter += 1;
        let media_name = format!("media/bridgedoc_image{}.{}", self.media_counter, extension);

        let rel_id = self.add_image_relationship(&media_name)?;
        self.ensure_image_content_type(&extension)?;
        self.entries.push(PackageEntry {
            name: format!("word/{}", media_name),
            data: PartData::Raw(bytes),
        });

        log::debug!("Embedded {} as {} ({})", path.display(), media_name, rel_id);
        Ok(Some(EmbeddedImage { rel_id, pixel_size }))
    }

    /// Add an image relationship to document.xml.rels, returning its ID
    fn add_image_relationship(&mut self, target: &str) -> Result<String, PackageError> {
        if !self.has_part(DOCUMENT_RELS_PART) {
            self.entries.push(PackageEntry {
                name: DOCUMENT_RELS_PART.to_string(),
                data: PartData::Xml(
                    XmlElement::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS),
                ),
            });
        }

        let rels = self.xml_part_mut(DOCUMENT_RELS_PART)?;

        // Find next available rId number
        let max_rid = rels
            .elements()
            .filter_map(|rel| rel.attr("Id"))
            .filter_map(|id| id.strip_prefix("rId"))
            .filter_map(|digits| digits.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        let rel_id = format!("rId{}", max_rid + 1);

        rels.push(
            XmlElement::new("Relationship")
                .with_attr("Id", rel_id.as_str())
                .with_attr("Type", IMAGE_RELATIONSHIP_TYPE)
                .with_attr("Target", target),
        );
        Ok(rel_id)
    }

    /// Ensure an image extension has a Default entry in \[Content_Types\].xml
    fn ensure_image_content_type(&mut self, extension: &str) -> Result<(), PackageError> {
        let types = self.xml_part_mut(CONTENT_TYPES_PART)?;

        let present = types
            .children_named("Default")
            .any(|d| d.attr("Extension").is_some_and(|e| e.eq_ignore_ascii_case(extension)));
        if present {
            return Ok(());
        }

        let content_type = match extension {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            _ => "application/octet-stream",
        };

        // Default entries precede Override entries
        let insert_at = types
            .children
            .iter()
            .position(|node| matches!(node, xml::XmlNode::Element(e) if e.is("Override")))
            .unwrap_or(types.children.len());
        types.children.insert(
            insert_at,
            xml::XmlNode::Element(
                XmlElement::new("Default")
                    .with_attr("Extension", extension)
                    .with_attr("ContentType", content_type),
            ),
        );
        Ok(())
    }

    /// Write the package to a file
    pub fn save(&self, path: &Path) -> Result<(), PackageError> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(path)?;
        self.write_to(file)?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }

    /// Write the package to any seekable sink
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<(), PackageError> {
        let mut output_zip = ZipWriter::new(writer);

        for entry in &self.entries {
            let is_media = entry.name.starts_with("word/media/");
            let method = if is_media {
                zip::CompressionMethod::Stored // Images don't compress well
            } else {
                zip::CompressionMethod::Deflated
            };
            let options = SimpleFileOptions::default().compression_method(method);
            output_zip.start_file(entry.name.as_str(), options)?;
            match &entry.data {
                PartData::Raw(bytes) => output_zip.write_all(bytes)?,
                PartData::Xml(root) => output_zip.write_all(&xml::to_part_bytes(root))?,
            }
        }

        output_zip.finish()?;
        Ok(())
    }
}

/// Part name of a relationship target of `word/document.xml`
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = vec!["word"];
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn is_header_or_footer(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    !file.contains('/')
        && file.ends_with(".xml")
        && (file.starts_with("header") || file.starts_with("footer"))
}
