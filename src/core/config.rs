//! Configuration file support
//!
//! Settings live in a TOML file in the platform config directory:
//! - Linux: ~/.config/swmm_timeseries_extractor/config.toml
//! - macOS: ~/Library/Application Support/swmm_timeseries_extractor/config.toml
//! - Windows: %APPDATA%\swmm_timeseries_extractor\config.toml
//!
//! The file only seeds a [`SelectionBuilder`]; a run never reads the config
//! itself.

use crate::core::discovery::{IdFilter, SetMode};
use crate::core::export::{self, FloatFormat};
use crate::core::selection::{
    CombineMode, OutputFormat, SelectionBuilder, TemplateSet, DEFAULT_TIME_FORMAT,
};
use crate::core::template::FilenameTemplate;
use crate::core::units::ParameterFamily;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application name used for the config directory
const APP_NAME: &str = "swmm_timeseries_extractor";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Platform configuration directory for the application
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Full path of the config file in the standard location
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Write the commented default config to the standard location unless a file
/// is already there. Returns the path.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;
    fs::create_dir_all(&dir).map_err(|e| ConfigError::WriteError(dir.clone(), e.to_string()))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        fs::write(&path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(path.clone(), e.to_string()))?;
    }
    Ok(path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub naming: NamingConfig,
    pub units: UnitsConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

/// Output location, format and naming affixes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Empty writes next to each source file
    pub directory: String,
    pub format: OutputFormat,
    pub combine_mode: CombineMode,
    pub prefix: String,
    pub suffix: String,
    pub time_format: String,
    pub float_format: FloatFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: String::new(),
            format: OutputFormat::default(),
            combine_mode: CombineMode::default(),
            prefix: String::new(),
            suffix: String::new(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            float_format: FloatFormat::default(),
        }
    }
}

/// Filename templates, short names and labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub tsf_separate_template: String,
    pub tsf_combined_template: String,
    pub tabular_template: String,
    pub short_names: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

impl NamingConfig {
    pub fn template_set(&self) -> TemplateSet {
        let slot = |t: &str| Some(t.trim().to_string()).filter(|t| !t.is_empty());
        TemplateSet {
            tsf_separate: slot(&self.tsf_separate_template),
            tsf_combined: slot(&self.tsf_combined_template),
            tabular: slot(&self.tabular_template),
        }
    }
}

/// Unit maps keyed by family name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitsConfig {
    pub assumed: BTreeMap<String, String>,
    pub target: BTreeMap<String, String>,
    pub family_overrides: BTreeMap<String, ParameterFamily>,
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            assumed: ParameterFamily::default_assumed_units()
                .into_iter()
                .map(|(family, unit)| (family.to_string(), unit))
                .collect(),
            target: BTreeMap::new(),
            family_overrides: BTreeMap::new(),
        }
    }
}

/// Identifier discovery filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub include_regex: String,
    pub exclude_regex: String,
    pub mode: SetMode,
}

impl DiscoveryConfig {
    pub fn include(&self) -> Option<&str> {
        Some(self.include_regex.as_str()).filter(|p| !p.is_empty())
    }

    pub fn exclude(&self) -> Option<&str> {
        Some(self.exclude_regex.as_str()).filter(|p| !p.is_empty())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// error, warn, info, debug or trace
    pub level: String,
    /// Also write the log to `log_file`
    pub log_to_file: bool,
    pub log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: "ts-extract.log".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Load `./config.toml`, else the standard location, else defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        let local = PathBuf::from("./config.toml");
        if local.exists() {
            return Self::load(&local);
        }
        if let Some(path) = get_config_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Path of the file [`Config::load_default`] would read, if any
    pub fn active_path() -> Option<PathBuf> {
        let local = PathBuf::from("./config.toml");
        if local.exists() {
            return Some(local);
        }
        get_config_path().filter(|p| p.exists())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(parent.to_path_buf(), e.to_string()))?;
        }
        fs::write(path, content).map_err(|e| ConfigError::WriteError(path.to_path_buf(), e.to_string()))
    }

    /// Commented default config
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }

    /// Check patterns, templates and family names without running anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        IdFilter::new(self.discovery.include(), self.discovery.exclude())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let templates = [
            &self.naming.tsf_separate_template,
            &self.naming.tsf_combined_template,
            &self.naming.tabular_template,
        ];
        for template in templates.iter().filter(|t| !t.trim().is_empty()) {
            FilenameTemplate::parse(template).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        export::validate_time_format(&self.output.time_format)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        for family in self.units.assumed.keys().chain(self.units.target.keys()) {
            family
                .parse::<ParameterFamily>()
                .map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    /// Seed a selection builder with everything except files, ids and parameters
    pub fn to_builder(&self) -> SelectionBuilder {
        let mut builder = SelectionBuilder::new()
            .output_format(self.output.format)
            .combine_mode(self.output.combine_mode)
            .output_dir(&self.output.directory)
            .prefix(&self.output.prefix)
            .suffix(&self.output.suffix)
            .time_format(&self.output.time_format)
            .float_format(self.output.float_format)
            .templates(self.naming.template_set());

        for (param, short) in &self.naming.short_names {
            builder = builder.short_name(param, short);
        }
        for (param, label) in &self.naming.labels {
            builder = builder.label(param, label);
        }
        for (family, unit) in family_units(&self.units.assumed) {
            builder = builder.assumed_unit(family, &unit);
        }
        for (family, unit) in family_units(&self.units.target) {
            builder = builder.target_unit(family, &unit);
        }
        for (param, family) in &self.units.family_overrides {
            builder = builder.family_override(param, *family);
        }
        builder
    }
}

/// Parse family-keyed unit entries, skipping unknown families and empty units
fn family_units(map: &BTreeMap<String, String>) -> Vec<(ParameterFamily, String)> {
    map.iter()
        .filter(|(_, unit)| !unit.trim().is_empty())
        .filter_map(|(name, unit)| match name.parse::<ParameterFamily>() {
            Ok(family) => Some((family, unit.trim().to_string())),
            Err(e) => {
                warn!("Ignoring unit setting: {}", e);
                None
            }
        })
        .collect()
}

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file '{}': {}", .0.display(), .1)]
    ReadError(PathBuf, String),

    #[error("Failed to parse configuration file '{}': {}", .0.display(), .1)]
    ParseError(PathBuf, String),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(String),

    #[error("Failed to write configuration file '{}': {}", .0.display(), .1)]
    WriteError(PathBuf, String),

    #[error("Could not determine the configuration directory")]
    ConfigDirNotFound,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selection::ElementType;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(&Config::generate_default_config()).unwrap();
        assert_eq!(config, Config::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.output.format = OutputFormat::Csv;
        config.output.combine_mode = CombineMode::MergeAcrossFiles;
        config.output.float_format = FloatFormat::with_precision(3);
        config.naming.short_names.insert("Flow_rate".into(), "Q".into());
        config.units.target.insert("flow".into(), "cms".into());
        config.discovery.mode = SetMode::Intersection;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[output]\nformat = \"dat\"\ncombine_mode = \"combined-per-element\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output.format, OutputFormat::Dat);
        assert_eq!(config.output.time_format, DEFAULT_TIME_FORMAT);
        assert_eq!(config.units.assumed.get("flow").map(String::as_str), Some("cfs"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let missing = Config::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::FileNotFound(_)));

        let path = dir.path().join("bad.toml");
        fs::write(&path, "[output]\nfloat_format = \"six\"\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
    }

    #[test]
    fn test_validate_rejects_bad_pattern_and_template() {
        let mut config = Config::default();
        config.discovery.include_regex = "[".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.naming.tabular_template = "{nope}.csv".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.units.target.insert("pressure".into(), "psi".into());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.time_format = "%Q".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_to_builder_applies_settings() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("model.out");
        fs::write(&source, b"").unwrap();

        let mut config = Config::default();
        config.output.prefix = "run".into();
        config.output.format = OutputFormat::Csv;
        config.naming.tabular_template = "{short}-{id}.csv".into();
        config.naming.short_names.insert("Flow_rate".into(), "Q".into());
        config.units.target.insert("flow".into(), "cms".into());
        config
            .units
            .family_overrides
            .insert("Capacity".into(), ParameterFamily::Other);

        let state = config
            .to_builder()
            .file(&source)
            .ids(ElementType::Link, ["C1"])
            .params(ElementType::Link, ["Flow_rate"])
            .build()
            .unwrap();

        assert_eq!(state.prefix, "run_");
        assert_eq!(state.output_dir, None);
        assert_eq!(state.target_unit(ParameterFamily::Flow), Some("cms"));
        assert_eq!(state.short_name("Flow_rate"), "Q");
        assert_eq!(state.templates.tabular.as_deref(), Some("{short}-{id}.csv"));
        assert_eq!(
            state.family_overrides.get("Capacity"),
            Some(&ParameterFamily::Other)
        );
    }
}
