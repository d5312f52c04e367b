//! File-backed reader for JSON source files
//!
//! A JSON source holds, per element type, a map of identifier to parameter to a
//! list of `[timestamp, value]` pairs:
//!
//! ```json
//! {
//!   "elements": {
//!     "node": { "J1": { "Depth_above_invert": [["2024-01-01T00:00:00", 0.5]] } },
//!     "pollutant": { "TSS": { "Concentration": [["2024-01-01T00:00:00", 12.0]] } }
//!   }
//! }
//! ```
//!
//! Parsed files are cached per path so discovery and extraction over the same file
//! read it once.

use crate::core::error::{ExtractError, Result};
use crate::core::frame::{RawSeries, Timestamp};
use crate::core::selection::ElementType;
use crate::reader::traits::{SeriesReader, POLLUTANT_PARAMETER};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Series of one identifier, keyed by parameter
pub type ParameterSeries = BTreeMap<String, Vec<(Timestamp, f64)>>;

/// On-disk layout of a JSON source file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Free-form description of where the data came from
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub elements: BTreeMap<ElementType, BTreeMap<String, ParameterSeries>>,
}

impl SourceDocument {
    /// Add one series
    pub fn insert(
        &mut self,
        element_type: ElementType,
        id: &str,
        param: &str,
        points: Vec<(Timestamp, f64)>,
    ) {
        self.elements
            .entry(element_type)
            .or_default()
            .entry(id.to_string())
            .or_default()
            .insert(param.to_string(), points);
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| ExtractError::WriteError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, text).map_err(|e| ExtractError::WriteError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ExtractError::SourceError {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ExtractError::SourceError {
            file: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Reader over JSON source files
#[derive(Debug, Default)]
pub struct JsonSourceReader {
    cache: RwLock<HashMap<PathBuf, Arc<SourceDocument>>>,
}

impl JsonSourceReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn document(&self, file: &Path) -> Result<Arc<SourceDocument>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(doc) = cache.get(file) {
                return Ok(doc.clone());
            }
        }

        debug!("Loading source {}", file.display());
        let doc = Arc::new(SourceDocument::load(file)?);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(file.to_path_buf(), doc.clone());
        }
        Ok(doc)
    }
}

impl SeriesReader for JsonSourceReader {
    fn discover_ids(&self, file: &Path, element_type: ElementType) -> Result<BTreeSet<String>> {
        let doc = self.document(file)?;
        Ok(doc
            .elements
            .get(&element_type)
            .map(|ids| ids.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn list_possible_params(
        &self,
        file: &Path,
        element_type: ElementType,
    ) -> Result<BTreeSet<String>> {
        if element_type == ElementType::Pollutant {
            return Ok(BTreeSet::from([POLLUTANT_PARAMETER.to_string()]));
        }
        let doc = self.document(file)?;
        Ok(doc
            .elements
            .get(&element_type)
            .map(|ids| ids.values().flat_map(|p| p.keys().cloned()).collect())
            .unwrap_or_default())
    }

    fn extract_series(
        &self,
        file: &Path,
        element_type: ElementType,
        id: &str,
        param: &str,
    ) -> Result<RawSeries> {
        let doc = self.document(file)?;
        let not_found = |message: &str| ExtractError::SeriesNotFound {
            file: file.to_path_buf(),
            element_type,
            id: id.to_string(),
            param: param.to_string(),
            message: message.to_string(),
        };

        let params = doc
            .elements
            .get(&element_type)
            .and_then(|ids| ids.get(id))
            .ok_or_else(|| not_found("unknown identifier"))?;
        let points = params
            .get(param)
            .ok_or_else(|| not_found("unknown parameter"))?;
        Ok(RawSeries::new(points.clone()))
    }
}
