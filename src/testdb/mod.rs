//! Test Database Module
//!
//! Doubles and fixtures for exercising the extraction pipeline without real
//! simulation output on disk.
//!
//! # Features
//!
//! - **Mock Reader**: An in-memory [`SeriesReader`](crate::reader::SeriesReader)
//!   with configurable failures, call counting and deterministic cancellation
//! - **Sample Generator**: Seeded synthetic source documents plus a matching
//!   report snippet, used by `ts-extract generate-sample`
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use swmm_timeseries_extractor::core::selection::ElementType;
//! use swmm_timeseries_extractor::testdb::{MockReader, SampleConfig, SampleGenerator};
//!
//! let reader = MockReader::new();
//! let doc = SampleGenerator::new(SampleConfig::default()).generate();
//! reader.add_document("model.json", doc);
//! ```

pub mod generator;
pub mod mock_reader;

pub use generator::{SampleConfig, SampleGenerator};
pub use mock_reader::{MockReader, MockReaderConfig};
