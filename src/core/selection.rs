//! Selection model for one batch run
//!
//! A [`SelectionState`] captures everything a run needs: source files, the chosen
//! identifiers and parameters per element type, unit maps, output format, combine
//! mode and naming. It is built once through [`SelectionBuilder`], validated, and
//! never mutated afterwards. A new run builds a new one.

use crate::core::error::{ExtractError, Result};
use crate::core::export::{self, FloatFormat};
use crate::core::units::ParameterFamily;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Synthetic identifier used for the `system` element type
pub const SYSTEM_ID: &str = "SYSTEM";

/// Default timestamp pattern for written files
pub const DEFAULT_TIME_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Category of modeled object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Node,
    Link,
    Subcatchment,
    System,
    Pollutant,
}

impl ElementType {
    /// All element types in iteration order
    pub const ALL: [ElementType; 5] = [
        ElementType::Node,
        ElementType::Link,
        ElementType::Subcatchment,
        ElementType::System,
        ElementType::Pollutant,
    ];

    /// Lowercase name used in labels, templates and config files
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Node => "node",
            ElementType::Link => "link",
            ElementType::Subcatchment => "subcatchment",
            ElementType::System => "system",
            ElementType::Pollutant => "pollutant",
        }
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        ElementType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ExtractError::UnknownElementType(s.to_string()))
    }
}

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Tsf,
    Dat,
    Csv,
}

impl OutputFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Tsf => "tsf",
            OutputFormat::Dat => "dat",
            OutputFormat::Csv => "csv",
        }
    }

    /// Flat tabular formats share one naming template
    pub fn is_tabular(&self) -> bool {
        matches!(self, OutputFormat::Dat | OutputFormat::Csv)
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tsf" => Ok(OutputFormat::Tsf),
            "dat" => Ok(OutputFormat::Dat),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(ExtractError::UnknownFormat(s.to_string())),
        }
    }
}

/// How parameters and source files are grouped into output files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombineMode {
    /// One file per (file, type, id, param)
    #[default]
    Separate,
    /// One file per (file, type, id) holding every selected parameter
    CombinedPerElement,
    /// Like `CombinedPerElement`, then merged across source files
    MergeAcrossFiles,
}

impl CombineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombineMode::Separate => "separate",
            CombineMode::CombinedPerElement => "combined-per-element",
            CombineMode::MergeAcrossFiles => "merge-across-files",
        }
    }

    /// Whether all parameters of an element share one output file
    pub fn groups_parameters(&self) -> bool {
        !matches!(self, CombineMode::Separate)
    }
}

impl Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombineMode {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "separate" | "sep" => Ok(CombineMode::Separate),
            "combined-per-element" | "combined" | "com" => Ok(CombineMode::CombinedPerElement),
            "merge-across-files" | "across" => Ok(CombineMode::MergeAcrossFiles),
            _ => Err(ExtractError::UnknownCombineMode(s.to_string())),
        }
    }
}

/// User-supplied filename templates, one slot per (format, mode) family
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSet {
    /// `.tsf` output, one file per parameter
    pub tsf_separate: Option<String>,
    /// `.tsf` output, parameters combined
    pub tsf_combined: Option<String>,
    /// `.dat` / `.csv` output
    pub tabular: Option<String>,
}

impl TemplateSet {
    /// Template in effect for the given format and mode, if the user set one
    pub fn for_output(&self, format: OutputFormat, mode: CombineMode) -> Option<&str> {
        let slot = if format.is_tabular() {
            &self.tabular
        } else if mode.groups_parameters() {
            &self.tsf_combined
        } else {
            &self.tsf_separate
        };
        slot.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Immutable input to one batch run
#[derive(Debug, Clone)]
pub struct SelectionState {
    pub files: Vec<PathBuf>,
    pub ids_by_type: BTreeMap<ElementType, BTreeSet<String>>,
    pub params_by_type: BTreeMap<ElementType, BTreeSet<String>>,
    pub assumed_units: BTreeMap<ParameterFamily, String>,
    pub target_units: BTreeMap<ParameterFamily, String>,
    /// Explicit parameter to family assignments, bypassing keyword matching
    pub family_overrides: BTreeMap<String, ParameterFamily>,
    pub output_format: OutputFormat,
    pub combine_mode: CombineMode,
    /// `None` writes next to each source file
    pub output_dir: Option<PathBuf>,
    pub prefix: String,
    pub suffix: String,
    pub templates: TemplateSet,
    pub short_names: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub time_format: String,
    pub float_format: FloatFormat,
}

impl SelectionState {
    /// Identifiers to iterate for a type. The `system` type collapses any
    /// non-empty selection to the single synthetic id.
    pub fn ids_for(&self, element_type: ElementType) -> Vec<String> {
        let ids = match self.ids_by_type.get(&element_type) {
            Some(ids) if !ids.is_empty() => ids,
            _ => return Vec::new(),
        };
        if element_type == ElementType::System {
            return vec![SYSTEM_ID.to_string()];
        }
        ids.iter().cloned().collect()
    }

    /// Parameters selected for a type, in sorted order
    pub fn params_for(&self, element_type: ElementType) -> Vec<String> {
        self.params_by_type
            .get(&element_type)
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Element types that have both ids and parameters selected
    pub fn active_types(&self) -> Vec<ElementType> {
        ElementType::ALL
            .iter()
            .copied()
            .filter(|t| !self.ids_for(*t).is_empty() && !self.params_for(*t).is_empty())
            .collect()
    }

    /// Number of (file, type, id, param) units a run will process
    pub fn total_units(&self) -> usize {
        let per_file: usize = self
            .active_types()
            .iter()
            .map(|t| self.ids_for(*t).len() * self.params_for(*t).len())
            .sum();
        per_file * self.files.len()
    }

    /// Unit the source data is stored in for a family
    pub fn assumed_unit(&self, family: ParameterFamily) -> Option<&str> {
        self.assumed_units.get(&family).map(String::as_str)
    }

    /// Desired output unit for a family, defaulting to the assumed unit
    pub fn target_unit(&self, family: ParameterFamily) -> Option<&str> {
        self.target_units
            .get(&family)
            .or_else(|| self.assumed_units.get(&family))
            .map(String::as_str)
            .filter(|u| !u.is_empty())
    }

    /// Abbreviation bound to `{short}`
    pub fn short_name<'a>(&'a self, param: &'a str) -> &'a str {
        self.short_names
            .get(param)
            .map(String::as_str)
            .unwrap_or(param)
    }

    /// Column label for a parameter
    pub fn label<'a>(&'a self, param: &'a str) -> &'a str {
        self.labels.get(param).map(String::as_str).unwrap_or(param)
    }
}

/// Builder that validates a [`SelectionState`]
#[derive(Debug, Clone)]
pub struct SelectionBuilder {
    state: SelectionState,
}

impl Default for SelectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionBuilder {
    pub fn new() -> Self {
        Self {
            state: SelectionState {
                files: Vec::new(),
                ids_by_type: BTreeMap::new(),
                params_by_type: BTreeMap::new(),
                assumed_units: ParameterFamily::default_assumed_units(),
                target_units: BTreeMap::new(),
                family_overrides: BTreeMap::new(),
                output_format: OutputFormat::default(),
                combine_mode: CombineMode::default(),
                output_dir: None,
                prefix: String::new(),
                suffix: String::new(),
                templates: TemplateSet::default(),
                short_names: BTreeMap::new(),
                labels: BTreeMap::new(),
                time_format: DEFAULT_TIME_FORMAT.to_string(),
                float_format: FloatFormat::default(),
            },
        }
    }

    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.state.files.push(path.as_ref().to_path_buf());
        self
    }

    pub fn files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.state
            .files
            .extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    pub fn ids<I, S>(mut self, element_type: ElementType, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .ids_by_type
            .entry(element_type)
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn params<I, S>(mut self, element_type: ElementType, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .params_by_type
            .entry(element_type)
            .or_default()
            .extend(params.into_iter().map(Into::into));
        self
    }

    pub fn assumed_unit(mut self, family: ParameterFamily, unit: &str) -> Self {
        self.state.assumed_units.insert(family, unit.to_string());
        self
    }

    pub fn target_unit(mut self, family: ParameterFamily, unit: &str) -> Self {
        self.state.target_units.insert(family, unit.to_string());
        self
    }

    pub fn family_override(mut self, param: &str, family: ParameterFamily) -> Self {
        self.state
            .family_overrides
            .insert(param.to_string(), family);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.state.output_format = format;
        self
    }

    pub fn combine_mode(mut self, mode: CombineMode) -> Self {
        self.state.combine_mode = mode;
        self
    }

    pub fn output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        let dir = dir.as_ref();
        self.state.output_dir = if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir.to_path_buf())
        };
        self
    }

    /// Set the prefix; a non-empty prefix always ends with `_`
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.state.prefix = normalize_prefix(prefix);
        self
    }

    /// Set the suffix; a non-empty suffix always starts with `_`
    pub fn suffix(mut self, suffix: &str) -> Self {
        self.state.suffix = normalize_suffix(suffix);
        self
    }

    pub fn templates(mut self, templates: TemplateSet) -> Self {
        self.state.templates = templates;
        self
    }

    /// Set the template slot that applies to the current format and mode
    pub fn template(mut self, template: &str) -> Self {
        let value = Some(template.trim().to_string()).filter(|t| !t.is_empty());
        let format = self.state.output_format;
        let mode = self.state.combine_mode;
        let templates = &mut self.state.templates;
        if format.is_tabular() {
            templates.tabular = value;
        } else if mode.groups_parameters() {
            templates.tsf_combined = value;
        } else {
            templates.tsf_separate = value;
        }
        self
    }

    pub fn short_name(mut self, param: &str, short: &str) -> Self {
        self.state
            .short_names
            .insert(param.to_string(), short.to_string());
        self
    }

    pub fn label(mut self, param: &str, label: &str) -> Self {
        self.state.labels.insert(param.to_string(), label.to_string());
        self
    }

    pub fn time_format(mut self, pattern: &str) -> Self {
        self.state.time_format = pattern.to_string();
        self
    }

    pub fn float_format(mut self, format: FloatFormat) -> Self {
        self.state.float_format = format;
        self
    }

    /// Validate and freeze the selection
    pub fn build(self) -> Result<SelectionState> {
        let state = self.state;

        if state.files.is_empty() {
            return Err(ExtractError::NoFiles);
        }
        if let Some(missing) = state.files.iter().find(|f| !f.exists()) {
            return Err(ExtractError::MissingFile(missing.clone()));
        }
        if state.total_units() == 0 {
            return Err(ExtractError::EmptySelection);
        }

        export::validate_time_format(&state.time_format)?;
        if state.combine_mode == CombineMode::MergeAcrossFiles
            && !export::check_time_round_trip(&state.time_format)?
        {
            warn!(
                "Time format '{}' drops part of each timestamp; rows that differ only there will merge",
                state.time_format
            );
        }

        for (family, unit) in state.assumed_units.iter().chain(state.target_units.iter()) {
            if !unit.is_empty() && !family.knows_unit(unit) {
                warn!(
                    "Unrecognized {} unit '{}' will be treated as {}",
                    family,
                    unit,
                    family.canonical_unit().unwrap_or("unitless")
                );
            }
        }

        Ok(state)
    }
}

/// Append `_` to a non-empty prefix unless present
pub fn normalize_prefix(prefix: &str) -> String {
    let p = prefix.trim();
    if p.is_empty() || p.ends_with('_') {
        p.to_string()
    } else {
        format!("{}_", p)
    }
}

/// Prepend `_` to a non-empty suffix unless present
pub fn normalize_suffix(suffix: &str) -> String {
    let s = suffix.trim();
    if s.is_empty() || s.starts_with('_') {
        s.to_string()
    } else {
        format!("_{}", s)
    }
}
