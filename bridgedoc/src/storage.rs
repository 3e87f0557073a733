//! Project snapshots on disk
//!
//! A snapshot is the JSON form of a [`Project`] plus the time it was saved.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::project::Project;

/// Keys a snapshot must contain
const REQUIRED_KEYS: &[&str] = &["bridge", "spans", "piers", "defects"];

/// Image extensions picked up from the photo folder
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// Errors from reading or writing snapshots
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid project file: expected a JSON object")]
    NotAnObject,

    #[error("Invalid project file: missing key '{0}'")]
    MissingKey(&'static str),
}

/// Project plus save timestamp, as written to disk
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    #[serde(flatten)]
    project: Project,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<String>,
}

/// Write a project snapshot, stamping the local save time
pub fn save_project(path: &Path, project: &Project) -> Result<(), StorageError> {
    let snapshot = Snapshot {
        project: project.clone(),
        saved_at: Some(chrono::Local::now().to_rfc3339()),
    };
    let json = serde_json::to_string_pretty(&snapshot)?;
    fs::write(path, json).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Saved project to {}", path.display());
    Ok(())
}

/// Read a project snapshot
pub fn load_project(path: &Path) -> Result<Project, StorageError> {
    let content = fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_project(&content)
}

/// Parse snapshot JSON, checking the top-level keys first
pub fn parse_project(json: &str) -> Result<Project, StorageError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let object = value.as_object().ok_or(StorageError::NotAnObject)?;
    if let Some(missing) = REQUIRED_KEYS
        .iter()
        .copied()
        .find(|key| !object.contains_key(*key))
    {
        return Err(StorageError::MissingKey(missing));
    }

    let snapshot: Snapshot = serde_json::from_value(value)?;
    if let Some(saved_at) = &snapshot.saved_at {
        log::debug!("Project saved at {}", saved_at);
    }
    Ok(snapshot.project)
}

/// Image files directly inside `folder`, sorted by name
pub fn discover_images(folder: &Path) -> Result<Vec<String>, StorageError> {
    let mut names = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| StorageError::Io {
            path: folder.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_image = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if is_image {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{NewDefect, PhotoRecord};

    fn sample_project() -> Project {
        let mut project = Project::new();
        project.set_bridge_field("id", "М-4 км 9+700");
        project.set_bridge_field("length", "42,5");
        let span = project.add_span();
        project
            .span_mut(&span)
            .unwrap()
            .set_field("custom_key", "kept");
        project.add_pier();
        project.add_defect(NewDefect {
            placement: "2.Опоры".to_string(),
            name: "Трещины".to_string(),
            safety: "2".to_string(),
            ..NewDefect::default()
        });
        project.photos.folder = PathBuf::from("photos");
        project.photos.cover = PhotoRecord::new("cover.jpg", "Общий вид");
        project.photos.gallery.push(PhotoRecord::new("1.jpg", "Опора 1"));
        project
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        let project = sample_project();

        save_project(&path, &project).unwrap();
        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded, project);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"saved_at\""));
        // Non-ASCII text is written as is
        assert!(raw.contains("Трещины"));
    }

    #[test]
    fn test_missing_key_is_reported() {
        let err = parse_project(r#"{"bridge": {}, "spans": [], "defects": []}"#).unwrap_err();
        assert!(matches!(err, StorageError::MissingKey("piers")));
        assert_eq!(err.to_string(), "Invalid project file: missing key 'piers'");

        let err = parse_project("[]").unwrap_err();
        assert!(matches!(err, StorageError::NotAnObject));
    }

    #[test]
    fn test_photos_default_when_absent() {
        let project =
            parse_project(r#"{"bridge": {"road": "М-4"}, "spans": [], "piers": [], "defects": []}"#)
                .unwrap();
        assert_eq!(project.bridge_field("road"), "М-4");
        assert!(project.photos.gallery.is_empty());
    }

    #[test]
    fn test_discover_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.JPG", "a.png", "notes.txt", "c.jpeg"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("d.jpg"), b"x").unwrap();

        let names = discover_images(dir.path()).unwrap();
        assert_eq!(names, vec!["a.png", "b.JPG", "c.jpeg"]);
    }
}
