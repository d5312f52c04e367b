//! Simulation output readers
//!
//! # Submodules
//!
//! - `traits` - the [`SeriesReader`] abstraction used by the pipeline
//! - `json` - a reader over JSON source files
//!
//! Both the JSON reader and the test mock implement the same trait, so the
//! planner, executor and discovery code work with either.

pub mod json;
pub mod traits;

pub use json::{JsonSourceReader, SourceDocument};
pub use traits::{SeriesReader, POLLUTANT_PARAMETER};
