//! Core functionality module
//!
//! Planning, unit normalization, execution and cross-file combination of
//! timeseries extraction runs.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and conversion into a selection
//! - `error` - Error types and result aliases
//! - `selection` - Element types, formats, combine modes and the run selection
//! - `units` - Parameter classification, unit conversion and unit detection
//! - `template` - Filename templates
//! - `discovery` - Identifier and parameter discovery across source files
//! - `planner` - Output planning and overwrite checks
//! - `frame` - Timeseries and outer-joined output frames
//! - `export` - tsf, dat and csv writers
//! - `progress` - Progress updates, cancellation and ETA
//! - `executor` - Batch execution
//! - `combiner` - Cross-file merging of written outputs

pub mod combiner;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod export;
pub mod frame;
pub mod planner;
pub mod progress;
pub mod selection;
pub mod template;
pub mod units;
