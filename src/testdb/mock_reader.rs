//! In-memory reader for tests
//!
//! A [`MockReader`] holds one [`SourceDocument`] per path and can be told to fail
//! specific series, fail discovery for whole files, or trip a cancellation token
//! after a number of extractions. Paths never have to exist unless the caller also
//! builds a [`crate::core::selection::SelectionState`] from them.

use crate::core::error::{ExtractError, Result};
use crate::core::frame::{RawSeries, Timestamp};
use crate::core::progress::CancellationToken;
use crate::core::selection::ElementType;
use crate::reader::{SeriesReader, SourceDocument, POLLUTANT_PARAMETER};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Simulated failures
#[derive(Debug, Clone, Default)]
pub struct MockReaderConfig {
    /// Series that fail to extract, as (file, type, id, param)
    pub failing_series: HashSet<(PathBuf, ElementType, String, String)>,
    /// Files whose discovery calls fail
    pub failing_files: HashSet<PathBuf>,
    /// Cancel this token once the given number of extractions have returned
    pub cancel_after: Option<(usize, CancellationToken)>,
}

/// Reader serving series from memory
#[derive(Debug, Default)]
pub struct MockReader {
    sources: RwLock<HashMap<PathBuf, SourceDocument>>,
    config: MockReaderConfig,
    extract_calls: AtomicUsize,
}

impl MockReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MockReaderConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Register a series for a file
    pub fn add_series<P: AsRef<Path>>(
        &self,
        file: P,
        element_type: ElementType,
        id: &str,
        param: &str,
        points: Vec<(Timestamp, f64)>,
    ) {
        if let Ok(mut sources) = self.sources.write() {
            sources
                .entry(file.as_ref().to_path_buf())
                .or_default()
                .insert(element_type, id, param, points);
        }
    }

    /// Register a whole document for a file
    pub fn add_document<P: AsRef<Path>>(&self, file: P, document: SourceDocument) {
        if let Ok(mut sources) = self.sources.write() {
            sources.insert(file.as_ref().to_path_buf(), document);
        }
    }

    /// Make one series fail on extraction
    pub fn fail_series<P: AsRef<Path>>(
        &mut self,
        file: P,
        element_type: ElementType,
        id: &str,
        param: &str,
    ) {
        self.config.failing_series.insert((
            file.as_ref().to_path_buf(),
            element_type,
            id.to_string(),
            param.to_string(),
        ));
    }

    /// Number of `extract_series` calls so far
    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    fn check_file(&self, file: &Path) -> Result<()> {
        if self.config.failing_files.contains(file) {
            return Err(ExtractError::SourceError {
                file: file.to_path_buf(),
                message: "simulated read failure".to_string(),
            });
        }
        Ok(())
    }
}

impl SeriesReader for MockReader {
    fn discover_ids(&self, file: &Path, element_type: ElementType) -> Result<BTreeSet<String>> {
        self.check_file(file)?;
        let sources = self
            .sources
            .read()
            .map_err(|e| ExtractError::IoError(e.to_string()))?;
        Ok(sources
            .get(file)
            .and_then(|doc| doc.elements.get(&element_type))
            .map(|ids| ids.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn list_possible_params(
        &self,
        file: &Path,
        element_type: ElementType,
    ) -> Result<BTreeSet<String>> {
        self.check_file(file)?;
        if element_type == ElementType::Pollutant {
            return Ok(BTreeSet::from([POLLUTANT_PARAMETER.to_string()]));
        }
        let sources = self
            .sources
            .read()
            .map_err(|e| ExtractError::IoError(e.to_string()))?;
        Ok(sources
            .get(file)
            .and_then(|doc| doc.elements.get(&element_type))
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
        let calls = self.extract_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.config.cancel_after {
            if calls >= *limit {
                token.cancel();
            }
        }

        let not_found = |message: &str| ExtractError::SeriesNotFound {
            file: file.to_path_buf(),
            element_type,
            id: id.to_string(),
            param: param.to_string(),
            message: message.to_string(),
        };

        let key = (
            file.to_path_buf(),
            element_type,
            id.to_string(),
            param.to_string(),
        );
        if self.config.failing_series.contains(&key) {
            return Err(not_found("simulated extraction failure"));
        }

        let sources = self
            .sources
            .read()
            .map_err(|e| ExtractError::IoError(e.to_string()))?;
        let points = sources
            .get(file)
            .and_then(|doc| doc.elements.get(&element_type))
            .and_then(|ids| ids.get(id))
            .and_then(|params| params.get(param))
            .ok_or_else(|| not_found("no such series"))?;
        Ok(RawSeries::new(points.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_serves_registered_series() {
        let reader = MockReader::new();
        reader.add_series("a.out", ElementType::Link, "C1", "Flow_rate", vec![(ts(0), 1.0)]);

        let ids = reader
            .discover_ids(Path::new("a.out"), ElementType::Link)
            .unwrap();
        assert!(ids.contains("C1"));
        let series = reader
            .extract_series(Path::new("a.out"), ElementType::Link, "C1", "Flow_rate")
            .unwrap();
        assert_eq!(series.values(), vec![1.0]);
        assert_eq!(reader.extract_calls(), 1);
    }

    #[test]
    fn test_simulated_failures() {
        let mut reader = MockReader::new();
        reader.add_series("a.out", ElementType::Node, "J1", "Depth", vec![(ts(0), 1.0)]);
        reader.fail_series("a.out", ElementType::Node, "J1", "Depth");

        let err = reader
            .extract_series(Path::new("a.out"), ElementType::Node, "J1", "Depth")
            .unwrap_err();
        assert!(matches!(err, ExtractError::SeriesNotFound { .. }));
    }

    #[test]
    fn test_cancel_after_extractions() {
        let token = CancellationToken::new();
        let reader = MockReader::with_config(MockReaderConfig {
            cancel_after: Some((2, token.clone())),
            ..Default::default()
        });
        let _ = reader.extract_series(Path::new("a.out"), ElementType::Node, "J1", "Depth");
        assert!(!token.is_cancelled());
        let _ = reader.extract_series(Path::new("a.out"), ElementType::Node, "J1", "Depth");
        assert!(token.is_cancelled());
    }
}
