//! Reader abstraction for simulation output files
//!
//! The extraction pipeline never parses simulation output itself. It talks to a
//! [`SeriesReader`], which can be backed by a binary-format library, by the
//! JSON source files in [`crate::reader::json`], or by the in-memory
//! [`crate::testdb::MockReader`] used in tests.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use swmm_timeseries_extractor::core::selection::ElementType;
//! use swmm_timeseries_extractor::reader::{JsonSourceReader, SeriesReader};
//! use std::path::Path;
//!
//! let reader = JsonSourceReader::new();
//! let file = Path::new("model.json");
//! for id in reader.discover_ids(file, ElementType::Node).unwrap() {
//!     let series = reader.extract_series(file, ElementType::Node, &id, "Depth_above_invert");
//!     println!("{}: {:?}", id, series.map(|s| s.len()));
//! }
//! ```

use crate::core::error::Result;
use crate::core::frame::RawSeries;
use crate::core::selection::ElementType;
use std::collections::BTreeSet;
use std::path::Path;

/// Parameter reported for every pollutant
pub const POLLUTANT_PARAMETER: &str = "Concentration";

/// Source of raw timeseries
///
/// Implementations must be shareable with a background worker thread.
pub trait SeriesReader: Send + Sync {
    /// Identifiers of one element type in a file. For pollutants these are the
    /// pollutant names.
    fn discover_ids(&self, file: &Path, element_type: ElementType) -> Result<BTreeSet<String>>;

    /// Parameter names available for an element type. Pollutants always report
    /// [`POLLUTANT_PARAMETER`].
    fn list_possible_params(
        &self,
        file: &Path,
        element_type: ElementType,
    ) -> Result<BTreeSet<String>>;

    /// One series; fails when the triple does not exist in the file
    fn extract_series(
        &self,
        file: &Path,
        element_type: ElementType,
        id: &str,
        param: &str,
    ) -> Result<RawSeries>;
}

impl<R: SeriesReader + ?Sized> SeriesReader for std::sync::Arc<R> {
    fn discover_ids(&self, file: &Path, element_type: ElementType) -> Result<BTreeSet<String>> {
        (**self).discover_ids(file, element_type)
    }

    fn list_possible_params(
        &self,
        file: &Path,
        element_type: ElementType,
    ) -> Result<BTreeSet<String>> {
        (**self).list_possible_params(file, element_type)
    }

    fn extract_series(
        &self,
        file: &Path,
        element_type: ElementType,
        id: &str,
        param: &str,
    ) -> Result<RawSeries> {
        (**self).extract_series(file, element_type, id, param)
    }
}
