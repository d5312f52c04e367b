//! Extraction planning
//!
//! [`plan`] lists every output file a run would write, in the order the executor
//! processes them, without touching the filesystem or the reader. It backs the
//! dry-run preview and the overwrite pre-flight check, and the executor uses the
//! same [`OutputNaming`] so planned and written paths agree.

use crate::core::error::{ExtractError, Result};
use crate::core::executor::{column_name, family_for};
use crate::core::selection::{ElementType, OutputFormat, SelectionState};
use crate::core::template::{FilenameTemplate, TemplateContext};
use log::debug;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Subdirectory that receives cross-file merged outputs
pub const COMBINED_DIR: &str = "combined";

/// One planned output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    pub source_file: PathBuf,
    pub element_type: ElementType,
    pub id: String,
    /// Parameters written to this file, in column order
    pub params: Vec<String>,
    pub path: PathBuf,
}

/// Per-source subdirectory names, unique across the run. `None` for a single
/// source, whose outputs go straight into the output root.
pub fn output_subdirs(files: &[PathBuf]) -> Vec<Option<String>> {
    if files.len() <= 1 {
        return vec![None; files.len()];
    }

    let mut used: HashSet<String> = HashSet::new();
    files
        .iter()
        .map(|file| {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "source".to_string());
            let mut name = stem.clone();
            let mut n = 1;
            while used.contains(&name) {
                n += 1;
                name = format!("{}_{}", stem, n);
            }
            used.insert(name.clone());
            Some(name)
        })
        .collect()
}

/// Directory that receives the cross-file merged outputs
pub fn combined_dir(state: &SelectionState) -> PathBuf {
    let root = match &state.output_dir {
        Some(dir) => dir.clone(),
        None => state
            .files
            .first()
            .and_then(|f| f.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    root.join(COMBINED_DIR)
}

/// Parameter groups for a type: one group per parameter in `separate` mode,
/// otherwise a single group with every selected parameter.
pub fn param_groups(state: &SelectionState, element_type: ElementType) -> Vec<Vec<String>> {
    let params = state.params_for(element_type);
    if params.is_empty() {
        return Vec::new();
    }
    if state.combine_mode.groups_parameters() {
        vec![params]
    } else {
        params.into_iter().map(|p| vec![p]).collect()
    }
}

/// Resolves output paths for one selection
#[derive(Debug, Clone)]
pub struct OutputNaming<'a> {
    state: &'a SelectionState,
    template: FilenameTemplate,
    dirs: Vec<PathBuf>,
}

impl<'a> OutputNaming<'a> {
    /// Parse the template in effect and compute the per-source directories
    pub fn new(state: &'a SelectionState) -> Result<Self> {
        let template = FilenameTemplate::for_output(
            state
                .templates
                .for_output(state.output_format, state.combine_mode),
            state.output_format,
            state.combine_mode,
        )?;

        let dirs = state
            .files
            .iter()
            .zip(output_subdirs(&state.files))
            .map(|(file, subdir)| {
                let root = match &state.output_dir {
                    Some(dir) => dir.clone(),
                    None => file.parent().map(Path::to_path_buf).unwrap_or_default(),
                };
                match subdir {
                    Some(name) => root.join(name),
                    None => root,
                }
            })
            .collect();

        Ok(Self {
            state,
            template,
            dirs,
        })
    }

    /// Output directory for the source at `file_index`
    pub fn dir_for(&self, file_index: usize) -> &Path {
        self.dirs
            .get(file_index)
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Resolve the path of one output file
    pub fn path_for(
        &self,
        file_index: usize,
        element_type: ElementType,
        id: &str,
        params: &[String],
    ) -> Result<PathBuf> {
        let param = params.join("_");
        let short = params
            .iter()
            .map(|p| self.state.short_name(p))
            .collect::<Vec<_>>()
            .join("_");
        let ctx = TemplateContext::new(element_type, id)
            .with_affixes(&self.state.prefix, &self.state.suffix)
            .with_param(&param, &short);
        let name = self.template.render(&ctx)?;
        Ok(self.dir_for(file_index).join(name))
    }
}

/// Fail when two parameters written to the same file map to one column name
pub fn check_columns(state: &SelectionState, element_type: ElementType) -> Result<()> {
    for params in param_groups(state, element_type) {
        let mut columns: HashMap<String, &str> = HashMap::new();
        for param in &params {
            match columns.entry(column_name(state, param, family_for(state, param))) {
                Entry::Occupied(taken) => {
                    return Err(ExtractError::DuplicateColumn {
                        element_type,
                        column: taken.key().clone(),
                        first: taken.get().to_string(),
                        second: param.clone(),
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(param.as_str());
                }
            }
        }
    }
    Ok(())
}

/// List every output file a run would produce.
///
/// Iterates files, then element types, then ids, then parameter groups. Fails on
/// a template error, on colliding column names, or when two items resolve to
/// the same path.
pub fn plan(state: &SelectionState) -> Result<Vec<PlanItem>> {
    let naming = OutputNaming::new(state)?;
    for element_type in state.active_types() {
        check_columns(state, element_type)?;
    }

    let mut items = Vec::new();
    let mut seen = HashSet::new();

    for (file_index, file) in state.files.iter().enumerate() {
        for element_type in state.active_types() {
            let groups = param_groups(state, element_type);
            for id in state.ids_for(element_type) {
                for params in &groups {
                    let path = naming.path_for(file_index, element_type, &id, params)?;
                    if !seen.insert(path.clone()) {
                        return Err(ExtractError::DuplicateOutputPath(path));
                    }
                    items.push(PlanItem {
                        source_file: file.clone(),
                        element_type,
                        id: id.clone(),
                        params: params.clone(),
                        path,
                    });
                }
            }
        }
    }

    debug!("Planned {} output file(s)", items.len());
    Ok(items)
}

/// Planned directories that already hold files with the output extension, in
/// first-seen order
pub fn find_overwrite_conflicts(items: &[PlanItem], format: OutputFormat) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for item in items {
        let dir = item
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }

    dirs.into_iter()
        .filter(|dir| dir_has_extension(dir, format.extension()))
        .collect()
}

fn dir_has_extension(dir: &Path, extension: &str) -> bool {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return false,
    };
    entries.filter_map(|e| e.ok()).any(|entry| {
        let path = entry.path();
        path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
    })
}
