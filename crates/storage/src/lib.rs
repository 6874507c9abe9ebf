//! Persistent editor preferences.
//!
//! Preferences live in a versioned JSON envelope under the platform data
//! directory. Environment variables override individual values on top of
//! whatever was loaded.

use directories::ProjectDirs;
use doc_model::{Color, Tool, ToolStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PREFS_SCHEMA_VERSION: u32 = 1;

pub const ENV_FONT_PATH: &str = "PAGEMARK_FONT_PATH";
pub const ENV_EXPORT_SCALE: &str = "PAGEMARK_EXPORT_SCALE";
pub const ENV_THUMBNAIL_SCALE: &str = "PAGEMARK_THUMBNAIL_SCALE";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported preferences version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorPreferences {
    pub default_tool: Tool,
    pub default_color: Color,
    pub stroke_width: f32,
    pub font_size: f32,
    /// Render scale for whole-document export.
    pub export_scale: f32,
    pub thumbnail_scale: f32,
    pub device_pixel_ratio: f32,
    pub font_path: Option<PathBuf>,
}

impl Default for EditorPreferences {
    fn default() -> Self {
        let style = ToolStyle::default();
        Self {
            default_tool: Tool::Pen,
            default_color: style.color,
            stroke_width: style.stroke_width,
            font_size: style.font_size,
            export_scale: 2.0,
            thumbnail_scale: 0.25,
            device_pixel_ratio: 1.0,
            font_path: None,
        }
    }
}

impl EditorPreferences {
    pub fn tool_style(&self) -> ToolStyle {
        ToolStyle {
            color: self.default_color,
            stroke_width: self.stroke_width,
            font_size: self.font_size,
        }
    }

    /// Applies `PAGEMARK_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, StorageError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, StorageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_FONT_PATH) {
            if value.trim().is_empty() {
                return Err(invalid(ENV_FONT_PATH, &value));
            }
            self.font_path = Some(PathBuf::from(value));
        }

        if let Some(value) = lookup(ENV_EXPORT_SCALE) {
            self.export_scale = parse_scale(ENV_EXPORT_SCALE, &value)?;
        }

        if let Some(value) = lookup(ENV_THUMBNAIL_SCALE) {
            self.thumbnail_scale = parse_scale(ENV_THUMBNAIL_SCALE, &value)?;
        }

        Ok(self)
    }

    /// Checks that every numeric setting is usable.
    pub fn validate(&self) -> Result<(), StorageError> {
        let checks = [
            ("stroke_width", self.stroke_width),
            ("font_size", self.font_size),
            ("export_scale", self.export_scale),
            ("thumbnail_scale", self.thumbnail_scale),
            ("device_pixel_ratio", self.device_pixel_ratio),
        ];
        for (key, value) in checks {
            if !is_positive(value) {
                return Err(invalid(key, &value.to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: EditorPreferences,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "pagemark", "pagemark").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_preferences(&self) -> Result<EditorPreferences, StorageError> {
        let path = self.preferences_path();
        if !path.exists() {
            return Ok(EditorPreferences::default());
        }

        let bytes = fs::read(path)?;
        let envelope: PreferencesEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > PREFS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }

        envelope.preferences.validate()?;
        Ok(envelope.preferences)
    }

    pub fn save_preferences(&self, preferences: &EditorPreferences) -> Result<(), StorageError> {
        preferences.validate()?;
        fs::create_dir_all(&self.root)?;

        let envelope =
            PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: preferences.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.preferences_path(), bytes)?;
        Ok(())
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.root.join("preferences.json")
    }
}

/// Loads preferences from the default project directory with environment
/// overrides applied. A missing data directory yields defaults.
pub fn load_effective_preferences() -> Result<EditorPreferences, StorageError> {
    let base = match Storage::from_default_project() {
        Ok(storage) => storage.load_preferences()?,
        Err(StorageError::NoDataDirectory) => EditorPreferences::default(),
        Err(other) => return Err(other),
    };
    let preferences = base.with_env_overrides()?;
    preferences.validate()?;
    Ok(preferences)
}

fn parse_scale(key: &str, value: &str) -> Result<f32, StorageError> {
    match value.trim().parse::<f32>() {
        Ok(scale) if is_positive(scale) => Ok(scale),
        _ => Err(invalid(key, value)),
    }
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(key: &str, value: &str) -> StorageError {
    StorageError::InvalidValue { key: key.to_owned(), value: value.to_owned() }
}
