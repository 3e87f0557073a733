//! bridgedoc - bridge inspection document assembly
//!
//! Fills .docx templates (technical passport, inspection report) from a
//! project snapshot: bridge attributes, per-span and per-pier forms, a
//! defects table grouped by structural section, and photos.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
// Allow some pedantic lints that are too strict for this project
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod catalog;
pub mod config;
pub mod docx;
pub mod export;
pub mod project;
pub mod quantity;
pub mod storage;

pub use config::Config;
pub use export::{export_project, ExportError, ExportMode, ExportOptions};
pub use project::Project;
