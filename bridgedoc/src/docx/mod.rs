//! Minimal WordprocessingML document model
//!
//! Just enough of OOXML to fill a template: open the package, walk the body as
//! a sequence of blocks, edit runs without losing their formatting, build
//! table rows and place inline pictures.

pub mod body;
pub mod drawing;
pub mod package;
pub mod paragraph;
pub mod table;
pub mod xml;

pub use body::{BlockKind, Body};
pub use drawing::PictureSize;
pub use package::{DocxPackage, EmbeddedImage, PackageError, DOCUMENT_PART};
pub use paragraph::RunFormat;
pub use xml::{XmlElement, XmlNode};
