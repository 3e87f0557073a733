//! Tool configuration from bridgedoc.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::docx::PictureSize;
use crate::export::format::Profile;

/// Default configuration file name, looked up in the current directory
pub const CONFIG_FILE_NAME: &str = "bridgedoc.toml";

/// Main configuration from bridgedoc.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Template for the technical passport
    pub passport_template: Option<PathBuf>,

    /// Template for the inspection report
    pub report_template: Option<PathBuf>,

    /// Defect catalog CSV
    pub catalog: Option<PathBuf>,

    /// Photo layout
    pub photos: PhotoConfig,
}

/// Photo sizes and caption settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhotoConfig {
    /// Cover photo width in centimeters
    pub cover_width_cm: f64,

    /// Cover photo height; aspect ratio is kept when absent
    pub cover_height_cm: Option<f64>,

    /// Gallery photo width in centimeters
    pub gallery_width_cm: f64,

    /// Gallery photo height; aspect ratio is kept when absent
    pub gallery_height_cm: Option<f64>,

    /// Word in front of the caption number ("Photo 3. ...")
    pub caption_label: String,

    /// Space after image and caption paragraphs, in points
    pub space_after_pt: u32,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            cover_width_cm: 16.0,
            cover_height_cm: None,
            gallery_width_cm: 15.0,
            gallery_height_cm: None,
            caption_label: "Photo".to_string(),
            space_after_pt: 6,
        }
    }
}

impl PhotoConfig {
    pub fn cover_size(&self) -> PictureSize {
        PictureSize {
            width_cm: self.cover_width_cm,
            height_cm: self.cover_height_cm,
        }
    }

    pub fn gallery_size(&self) -> PictureSize {
        PictureSize {
            width_cm: self.gallery_width_cm,
            height_cm: self.gallery_height_cm,
        }
    }
}

impl Config {
    /// Load configuration from a bridgedoc.toml file
    ///
    /// # Parameters
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(ConfigError)` - Error reading or parsing the configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(ConfigError::IoError)?;

        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        Ok(config)
    }

    /// Load the given file, or `bridgedoc.toml` in the current directory if
    /// it exists, or fall back to defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = Path::new(CONFIG_FILE_NAME);
        if local.is_file() {
            log::info!("Using configuration from {}", local.display());
            return Self::load(local);
        }
        Ok(Self::default())
    }

    /// Save configuration to a bridgedoc.toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;

        fs::write(&path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }

    /// Template configured for a profile
    pub fn template_for(&self, profile: Profile) -> Option<&Path> {
        match profile {
            Profile::Passport => self.passport_template.as_deref(),
            Profile::Report => self.report_template.as_deref(),
        }
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum ConfigError {
    /// IO error when reading or writing file
    IoError(std::io::Error),

    /// Error parsing TOML
    ParseError(toml::de::Error),

    /// Error serializing to TOML
    SerializeError(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "TOML serialize error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip() {
        let config = Config {
            passport_template: Some(PathBuf::from("templates/passport.docx")),
            report_template: None,
            catalog: Some(PathBuf::from("data/defects.csv")),
            photos: PhotoConfig {
                cover_height_cm: Some(11.5),
                caption_label: "Фото".to_string(),
                ..PhotoConfig::default()
            },
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        config.save(&path).unwrap();
        let parsed = Config::load(&path).unwrap();

        assert_eq!(parsed, config);
        assert_eq!(
            parsed.template_for(Profile::Passport),
            Some(Path::new("templates/passport.docx"))
        );
        assert_eq!(parsed.template_for(Profile::Report), None);
    }

    #[test]
    fn test_parse_partial_toml_uses_defaults() {
        let toml_content = r#"
report_template = "report.docx"

[photos]
gallery_width_cm = 12.0
"#;

        let config: Config = toml::from_str(toml_content).unwrap();

        assert_eq!(config.photos.gallery_width_cm, 12.0);
        assert_eq!(config.photos.cover_width_cm, 16.0);
        assert_eq!(config.photos.caption_label, "Photo");
        assert_eq!(config.photos.space_after_pt, 6);
        assert!(config.catalog.is_none());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result: Result<Config, _> = toml::from_str("report_templte = \"x.docx\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let result = Config::discover(Some(Path::new("/no/such/bridgedoc.toml")));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
