//! SWMM Timeseries Extractor Library
//!
//! Batch extraction of node, link, subcatchment, system and pollutant
//! timeseries from stormwater simulation output into `.tsf`, `.dat` and `.csv`
//! files, with unit normalization, template-driven file naming and optional
//! merging of outputs across source files.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Selection model, identifier discovery, unit conversion, filename
//!   templates, planning, batch execution, writers and cross-file combination
//! - [`reader`] - The [`reader::SeriesReader`] seam and a JSON-backed reader
//! - [`worker`] - Background discovery and run workers reporting over a channel
//! - [`cli`] - Command-line interface (only used by the binary)
//! - [`testdb`] - In-memory reader and seeded sample data for tests and demos
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use swmm_timeseries_extractor::core::config::Config;
//! use swmm_timeseries_extractor::core::executor::{BatchExecutor, ExecutorConfig};
//! use swmm_timeseries_extractor::core::selection::ElementType;
//! use swmm_timeseries_extractor::reader::JsonSourceReader;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let state = config
//!         .to_builder()
//!         .file("model.json")
//!         .ids(ElementType::Node, ["J1", "J2"])
//!         .params(ElementType::Node, ["Depth_above_invert"])
//!         .build()?;
//!
//!     let reader = JsonSourceReader::new();
//!     let outcome = BatchExecutor::new(&reader, ExecutorConfig::default()).run(&state)?;
//!     println!("{}", outcome.report());
//!     Ok(())
//! }
//! ```
//!
//! # Background Runs
//!
//! ```rust,no_run
//! use swmm_timeseries_extractor::core::selection::{ElementType, SelectionBuilder};
//! use swmm_timeseries_extractor::reader::JsonSourceReader;
//! use swmm_timeseries_extractor::worker::{WorkerController, WorkerEvent};
//! use std::sync::Arc;
//!
//! let controller = WorkerController::new(Arc::new(JsonSourceReader::new()));
//! let state = SelectionBuilder::new()
//!     .file("model.json")
//!     .ids(ElementType::Link, ["C1"])
//!     .params(ElementType::Link, ["Flow_rate"])
//!     .build()
//!     .unwrap();
//! controller.start_run(state, false).unwrap();
//!
//! for event in controller.events().iter() {
//!     match event {
//!         WorkerEvent::Progress(u) => println!("{}/{}", u.done, u.total),
//!         e if e.is_terminal() => break,
//!         _ => {}
//!     }
//! }
//! ```

pub mod cli;
pub mod core;
pub mod reader;
pub mod testdb;
pub mod worker;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
