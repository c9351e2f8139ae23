//! TOML-based settings for data directory paths and dataset selection.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Fixed settings filename looked up in the search path.
pub const SETTINGS_FILENAME: &str = "re-atlas.toml";

/// Bundled fallback settings, used when no file is found in the search path.
const BUNDLED_SETTINGS: &str = include_str!("../resources/default_settings.toml");

/// Data directory settings parsed from TOML.
///
/// The key set is closed: unknown keys are rejected at parse time via
/// `deny_unknown_fields`, and the struct fields are the only assignable
/// settings. All fields have defaults matching the bundled settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding prepared weather cutouts.
    pub cutout_dir: PathBuf,
    /// Path to the GEBCO bathymetry/height dataset.
    pub gebco_path: PathBuf,
    /// Directory holding NCEP reanalysis data.
    pub ncep_dir: PathBuf,
    /// Directory holding SARAH satellite irradiance data.
    pub sarah_dir: PathBuf,
    /// Directory holding CORDEX regional climate model data.
    pub cordex_dir: PathBuf,
    /// Default weather dataset selection.
    pub weather_dataset: WeatherDataset,
}

/// Weather dataset selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherDataset {
    /// Dataset module name (`"cordex"`, `"ncep"`, `"sarah"`).
    pub module: String,
    /// Model identifier within the module.
    pub model: String,
}

impl Default for WeatherDataset {
    fn default() -> Self {
        Self {
            module: "cordex".to_string(),
            model: "MPI-M-MPI-ESM-LR".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cutout_dir: PathBuf::from("cutouts"),
            gebco_path: PathBuf::from("data/gebco/GEBCO_2014_2D.nc"),
            ncep_dir: PathBuf::from("data/ncep"),
            sarah_dir: PathBuf::from("data/sarah_v2"),
            cordex_dir: PathBuf::from("data/cordex"),
            weather_dataset: WeatherDataset::default(),
        }
    }
}

/// Settings error with field path and constraint description.
#[derive(Debug)]
pub struct SettingsError {
    /// Dotted field path or construction-argument name.
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "settings error: {} — {}", self.field, self.message)
    }
}

impl Error for SettingsError {}

impl Settings {
    /// Constructs settings from either explicit override values or an
    /// explicit file path — never both.
    ///
    /// With neither argument the search-path fallback of
    /// [`Settings::discover`] applies. An explicit path that does not exist
    /// is rejected; there is no silent fallback on that route.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if both arguments are given, the explicit
    /// path is missing or unreadable, or the values contain unknown keys.
    pub fn new(overrides: Option<toml::Table>, path: Option<&Path>) -> Result<Self, SettingsError> {
        match (overrides, path) {
            (Some(_), Some(_)) => Err(SettingsError {
                field: "overrides/path".to_string(),
                message: "override values and a settings file path are mutually exclusive"
                    .to_string(),
            }),
            (Some(table), None) => table.try_into().map_err(|e: toml::de::Error| SettingsError {
                field: "overrides".to_string(),
                message: e.to_string(),
            }),
            (None, Some(p)) => Self::from_toml_file(p),
            (None, None) => Self::discover(),
        }
    }

    /// Loads settings by walking the search path: `$HOME/re-atlas.toml`,
    /// then the crate directory, then the bundled default settings.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if a found file fails to parse.
    pub fn discover() -> Result<Self, SettingsError> {
        for dir in search_dirs() {
            let candidate = dir.join(SETTINGS_FILENAME);
            if candidate.is_file() {
                return Self::from_toml_file(&candidate);
            }
        }
        Self::from_toml_str(BUNDLED_SETTINGS)
    }

    /// Parses settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if the file cannot be read or the TOML is
    /// invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|e| SettingsError {
            field: "path".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if the TOML is invalid or contains
    /// unknown keys.
    pub fn from_toml_str(s: &str) -> Result<Self, SettingsError> {
        toml::from_str(s).map_err(|e| SettingsError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Writes the settings as TOML to the given path.
    ///
    /// Refuses to overwrite an existing file unless `overwrite` is set.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if the target exists without `overwrite`,
    /// or serialization/writing fails.
    pub fn save_to(&self, path: &Path, overwrite: bool) -> Result<(), SettingsError> {
        if path.exists() && !overwrite {
            return Err(SettingsError {
                field: "path".to_string(),
                message: format!(
                    "\"{}\" already exists; pass overwrite to replace it",
                    path.display()
                ),
            });
        }
        let content = toml::to_string_pretty(self).map_err(|e| SettingsError {
            field: "toml".to_string(),
            message: e.to_string(),
        })?;
        fs::write(path, content).map_err(|e| SettingsError {
            field: "path".to_string(),
            message: format!("cannot write \"{}\": {e}", path.display()),
        })
    }
}

/// Directories searched for [`SETTINGS_FILENAME`], in priority order.
fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(PathBuf::from(home));
    }
    dirs.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")));
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_settings_parse_to_defaults() {
        let parsed = Settings::from_toml_str(BUNDLED_SETTINGS).ok();
        assert_eq!(parsed, Some(Settings::default()));
    }

    #[test]
    fn unknown_key_rejected() {
        let toml = r#"
cutout_dir = "cutouts"
bogus_key = true
"#;
        let result = Settings::from_toml_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let toml = r#"
[weather_dataset]
module = "ncep"
resolution = "hourly"
"#;
        let result = Settings::from_toml_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
ncep_dir = "/scratch/ncep"
"#;
        let settings = Settings::from_toml_str(toml).ok();
        assert_eq!(
            settings.as_ref().map(|s| s.ncep_dir.clone()),
            Some(PathBuf::from("/scratch/ncep"))
        );
        assert_eq!(
            settings.as_ref().map(|s| s.cutout_dir.clone()),
            Some(PathBuf::from("cutouts"))
        );
    }

    #[test]
    fn overrides_and_path_are_mutually_exclusive() {
        let table = toml::Table::new();
        let result = Settings::new(Some(table), Some(Path::new("somewhere.toml")));
        assert!(result.is_err());
        let err = result.err();
        assert_eq!(
            err.as_ref().map(|e| e.field.as_str()),
            Some("overrides/path")
        );
    }

    #[test]
    fn overrides_construct_settings() {
        let table: Option<toml::Table> = toml::from_str(r#"sarah_dir = "/data/sarah""#).ok();
        assert!(table.is_some());
        let settings = Settings::new(table, None).ok();
        assert_eq!(
            settings.map(|s| s.sarah_dir),
            Some(PathBuf::from("/data/sarah"))
        );
    }

    #[test]
    fn overrides_with_unknown_key_rejected() {
        let table: Option<toml::Table> = toml::from_str(r#"nonsense = 1"#).ok();
        assert!(table.is_some());
        assert!(Settings::new(table, None).is_err());
    }

    #[test]
    fn explicit_missing_path_rejected() {
        let result = Settings::new(None, Some(Path::new("/nonexistent/re-atlas.toml")));
        assert!(result.is_err());
        let err = result.err();
        assert_eq!(err.as_ref().map(|e| e.field.as_str()), Some("path"));
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().ok();
        assert!(dir.is_some());
        if let Some(dir) = dir {
            let path = dir.path().join(SETTINGS_FILENAME);
            let settings = Settings {
                cordex_dir: PathBuf::from("/archive/cordex"),
                ..Settings::default()
            };
            assert!(settings.save_to(&path, false).is_ok());

            let reloaded = Settings::from_toml_file(&path).ok();
            assert_eq!(reloaded, Some(settings));
        }
    }

    #[test]
    fn save_refuses_to_overwrite() {
        let dir = tempfile::tempdir().ok();
        assert!(dir.is_some());
        if let Some(dir) = dir {
            let path = dir.path().join(SETTINGS_FILENAME);
            let settings = Settings::default();
            assert!(settings.save_to(&path, false).is_ok());
            assert!(settings.save_to(&path, false).is_err());
            assert!(settings.save_to(&path, true).is_ok());
        }
    }
}
