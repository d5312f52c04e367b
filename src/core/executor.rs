//! Batch execution
//!
//! The executor walks the planned outputs in order (files, element types, ids,
//! parameters), pulls each series from the reader, converts its units and
//! outer-joins it into the frame of the output file being built. A finished frame
//! is written once; an empty one is skipped.
//!
//! A unit that fails to extract is recorded and the batch moves on. Template,
//! duplicate-path and write errors abort the run. Cancellation is checked before
//! every unit and ends the run with [`RunOutcome::Cancelled`], keeping whatever was
//! already written.
//!
//! # Example
//!
//! ```rust,no_run
//! use swmm_timeseries_extractor::core::executor::{BatchExecutor, ExecutorConfig, RunOutcome};
//! use swmm_timeseries_extractor::core::selection::{ElementType, SelectionBuilder};
//! use swmm_timeseries_extractor::reader::JsonSourceReader;
//!
//! let state = SelectionBuilder::new()
//!     .file("model.json")
//!     .ids(ElementType::Link, ["C1"])
//!     .params(ElementType::Link, ["Flow_rate"])
//!     .build()
//!     .unwrap();
//!
//! let reader = JsonSourceReader::new();
//! let config = ExecutorConfig::default().with_progress(|u| println!("{}/{}", u.done, u.total));
//! match BatchExecutor::new(&reader, config).run(&state).unwrap() {
//!     RunOutcome::Completed(report) => println!("{}", report),
//!     RunOutcome::Cancelled(report) => println!("cancelled: {}", report),
//! }
//! ```

use crate::core::combiner::combine_across_files;
use crate::core::error::Result;
use crate::core::frame::OutputFrame;
use crate::core::planner::{combined_dir, plan, PlanItem};
use crate::core::progress::{CancellationToken, ProgressCallback, ProgressUpdate};
use crate::core::selection::{CombineMode, ElementType, SelectionState};
use crate::core::units::{self, ParameterFamily};
use crate::reader::SeriesReader;
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Receives human-readable run messages
pub type MessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

// =============================================================================
// Configuration
// =============================================================================

/// Options for one batch run
#[derive(Clone, Default)]
pub struct ExecutorConfig {
    /// Resolve output paths without extracting or writing
    pub plan_only: bool,
    pub progress_callback: Option<ProgressCallback>,
    pub message_callback: Option<MessageCallback>,
}

impl fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("plan_only", &self.plan_only)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field(
                "message_callback",
                &self.message_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ExecutorConfig {
    pub fn plan_only(mut self, value: bool) -> Self {
        self.plan_only = value;
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_messages<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.message_callback = Some(Arc::new(callback));
        self
    }
}

// =============================================================================
// Results
// =============================================================================

/// One unit that could not be extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub file: PathBuf,
    pub element_type: ElementType,
    pub id: String,
    pub param: String,
    pub message: String,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {},{},{}: {}",
            self.file.display(),
            self.element_type,
            self.id,
            self.param,
            self.message
        )
    }
}

/// What a run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Written paths, or planned paths for a plan-only run
    pub paths: Vec<PathBuf>,
    /// Cross-file merged outputs
    pub combined: Vec<PathBuf>,
    pub failures: Vec<FailureRecord>,
    /// Planned outputs left unwritten because every series failed or was empty
    pub skipped_empty: usize,
    pub units_done: usize,
    pub units_total: usize,
    pub duration_ms: u64,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s) written, {} failure(s), {} combined, {}/{} series, {:.2}s",
            self.paths.len(),
            self.failures.len(),
            self.combined.len(),
            self.units_done,
            self.units_total,
            self.duration_ms as f64 / 1000.0
        )
    }
}

/// Result of a run that did not hit a fatal error
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Stopped on request; files already written stay on disk
    Cancelled(RunReport),
}

impl RunOutcome {
    pub fn report(&self) -> &RunReport {
        match self {
            RunOutcome::Completed(report) | RunOutcome::Cancelled(report) => report,
        }
    }

    pub fn into_report(self) -> RunReport {
        match self {
            RunOutcome::Completed(report) | RunOutcome::Cancelled(report) => report,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled(_))
    }
}

/// Family of a parameter, honoring explicit overrides
pub fn family_for(state: &SelectionState, param: &str) -> ParameterFamily {
    state
        .family_overrides
        .get(param)
        .copied()
        .unwrap_or_else(|| units::classify(param))
}

/// Output column name: `{label}_{target_unit}`, or just the label when the
/// parameter has no unit
pub fn column_name(state: &SelectionState, param: &str, family: ParameterFamily) -> String {
    let label = state.label(param);
    match (family, state.target_unit(family)) {
        (ParameterFamily::Other, _) | (_, None) => label.to_string(),
        (_, Some(unit)) => format!("{}_{}", label, unit),
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Runs one selection against a reader
pub struct BatchExecutor<'a, R: SeriesReader + ?Sized> {
    reader: &'a R,
    config: ExecutorConfig,
    cancel: CancellationToken,
}

impl<'a, R: SeriesReader + ?Sized> BatchExecutor<'a, R> {
    pub fn new(reader: &'a R, config: ExecutorConfig) -> Self {
        Self {
            reader,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the caller
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the batch. Errors are fatal; per-unit failures are in the report.
    pub fn run(&self, state: &SelectionState) -> Result<RunOutcome> {
        let start = Instant::now();
        let items = plan(state)?;

        let mut report = RunReport {
            units_total: if self.config.plan_only {
                0
            } else {
                state.total_units()
            },
            ..Default::default()
        };

        let action = if self.config.plan_only {
            "Planning outputs"
        } else {
            "Starting extraction"
        };
        self.message(&format!("{} for {}", action, files_label(state.files.len())));

        let cancelled = if self.config.plan_only {
            self.plan_files(state, &items, &mut report);
            false
        } else {
            self.extract_files(state, &items, &mut report)?
        };

        if cancelled {
            report.duration_ms = start.elapsed().as_millis() as u64;
            info!("Run cancelled: {}", report);
            return Ok(RunOutcome::Cancelled(report));
        }

        if !self.config.plan_only
            && state.combine_mode == CombineMode::MergeAcrossFiles
            && !report.paths.is_empty()
        {
            self.message("Combining outputs across files");
            report.combined = combine_across_files(
                &report.paths,
                state.output_format,
                &combined_dir(state),
                &state.time_format,
                &state.float_format,
            )?;
            self.message("Finished combining outputs across files");
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!("Run complete: {}", report);
        Ok(RunOutcome::Completed(report))
    }

    fn plan_files(&self, state: &SelectionState, items: &[PlanItem], report: &mut RunReport) {
        for file in &state.files {
            let label = file_label(file);
            self.message(&format!("Planning {}", label));
            let planned: Vec<PathBuf> = items
                .iter()
                .filter(|i| &i.source_file == file)
                .map(|i| i.path.clone())
                .collect();
            if planned.is_empty() {
                self.message(&format!("Finished planning {} (no matching selections)", label));
            } else {
                self.message(&format!(
                    "Finished planning {} ({} planned outputs)",
                    label,
                    planned.len()
                ));
            }
            report.paths.extend(planned);
        }
    }

    /// Returns true when the run was cancelled
    fn extract_files(
        &self,
        state: &SelectionState,
        items: &[PlanItem],
        report: &mut RunReport,
    ) -> Result<bool> {
        let writer = state.output_format.writer();
        let mut remaining = items.iter().peekable();

        for file in &state.files {
            let label = file_label(file);
            self.message(&format!("Processing {}", label));
            let written_before = report.paths.len();
            let failures_before = report.failures.len();

            while let Some(item) = remaining.next_if(|i| &i.source_file == file) {
                let mut frame = OutputFrame::new();

                for param in &item.params {
                    if self.cancel.is_cancelled() {
                        info!(
                            "Cancellation requested after {} of {} series",
                            report.units_done, report.units_total
                        );
                        return Ok(true);
                    }
                    self.extract_unit(state, item, param, &mut frame, report);
                    report.units_done += 1;
                    self.progress(ProgressUpdate {
                        done: report.units_done,
                        total: report.units_total,
                        file: file.display().to_string(),
                        element_type: item.element_type,
                        id: item.id.clone(),
                        param: param.clone(),
                    });
                }

                if frame.is_empty() {
                    debug!("Nothing to write for {}", item.path.display());
                    report.skipped_empty += 1;
                    continue;
                }
                writer.write(
                    &frame,
                    &item.path,
                    &writer.id_header(&item.id),
                    &writer.column_header(&frame),
                    &state.time_format,
                    &state.float_format,
                )?;
                debug!("Wrote {}", item.path.display());
                report.paths.push(item.path.clone());
            }

            let written = report.paths.len() - written_before;
            let failed = report.failures.len() - failures_before;
            let mut summary = if written > 0 {
                format!("Finished processing {}: {} {}", label, written, plural(written, "file"))
            } else {
                format!("Finished processing {}: no files written", label)
            };
            if failed > 0 {
                summary.push_str(&format!(" ({} {})", failed, plural(failed, "failure")));
            }
            self.message(&summary);
        }

        Ok(false)
    }

    fn extract_unit(
        &self,
        state: &SelectionState,
        item: &PlanItem,
        param: &str,
        frame: &mut OutputFrame,
        report: &mut RunReport,
    ) {
        let series = match self.reader.extract_series(
            &item.source_file,
            item.element_type,
            &item.id,
            param,
        ) {
            Ok(series) => series,
            Err(e) => {
                warn!("{}", e);
                report.failures.push(FailureRecord {
                    file: item.source_file.clone(),
                    element_type: item.element_type,
                    id: item.id.clone(),
                    param: param.to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        let family = family_for(state, param);
        let converted = units::convert(
            &series,
            family,
            state.assumed_unit(family),
            state.target_unit(family),
        );
        let column = column_name(state, param, family);
        debug!(
            "{} {} {}: {} points as '{}'",
            item.element_type,
            item.id,
            param,
            converted.len(),
            column
        );
        frame.join_series(&column, &converted);
    }

    fn progress(&self, update: ProgressUpdate) {
        if let Some(callback) = &self.config.progress_callback {
            callback(update);
        }
    }

    fn message(&self, text: &str) {
        info!("{}", text);
        if let Some(callback) = &self.config.message_callback {
            callback(text);
        }
    }
}

fn files_label(count: usize) -> String {
    match count {
        0 => "no files".to_string(),
        1 => "1 file".to_string(),
        n => format!("{} files", n),
    }
}

fn file_label(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string())
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ExtractError;
    use crate::core::frame::Timestamp;
    use crate::core::selection::{OutputFormat, SelectionBuilder, SYSTEM_ID};
    use crate::testdb::{MockReader, MockReaderConfig};
    use chrono::NaiveDate;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn ts(hour: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn source(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    /// Two links with flow and depth on offset hours
    fn populate(reader: &MockReader, file: &Path) {
        for id in ["C1", "C2"] {
            reader.add_series(
                file,
                ElementType::Link,
                id,
                "Flow_rate",
                vec![(ts(0), 1.0), (ts(1), 2.0)],
            );
            reader.add_series(
                file,
                ElementType::Link,
                id,
                "Depth",
                vec![(ts(1), 0.5), (ts(2), 0.75)],
            );
        }
    }

    fn links(dir: &TempDir, files: &[PathBuf]) -> SelectionBuilder {
        SelectionBuilder::new()
            .files(files)
            .output_dir(dir.path().join("out"))
            .ids(ElementType::Link, ["C1", "C2"])
            .params(ElementType::Link, ["Depth", "Flow_rate"])
    }

    #[test]
    fn test_separate_mode_writes_one_file_per_unit() {
        let dir = TempDir::new().unwrap();
        let file = source(&dir, "model.out");
        let reader = MockReader::new();
        populate(&reader, &file);
        let state = links(&dir, &[file]).build().unwrap();

        let outcome = BatchExecutor::new(&reader, ExecutorConfig::default())
            .run(&state)
            .unwrap();
        let report = outcome.into_report();

        assert_eq!(report.paths.len(), 4);
        assert!(report.failures.is_empty());
        assert_eq!(report.units_done, 4);
        let text = fs::read_to_string(dir.path().join("out").join("linkC1Flow_rate.tsf")).unwrap();
        assert_eq!(
            text,
            "IDs:\tC1\nDate/Time\tFlow_rate_cfs\n01/01/2024 00:00\t1.000000\n01/01/2024 01:00\t2.000000\n"
        );
    }

    #[test]
    fn test_combined_mode_outer_joins_parameters() {
        let dir = TempDir::new().unwrap();
        let file = source(&dir, "model.out");
        let reader = MockReader::new();
        populate(&reader, &file);
        let state = links(&dir, &[file])
            .combine_mode(CombineMode::CombinedPerElement)
            .output_format(OutputFormat::Csv)
            .build()
            .unwrap();

        let report = BatchExecutor::new(&reader, ExecutorConfig::default())
            .run(&state)
            .unwrap()
            .into_report();
        assert_eq!(report.paths.len(), 2);

        // csv default name is {short}{id}, short joins the parameters
        let path = dir.path().join("out").join("Depth_Flow_rateC1.csv");
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "IDs,C1");
        assert_eq!(lines[1], "Date/Time,Depth_ft,Flow_rate_cfs");
        assert_eq!(lines[2], "01/01/2024 00:00,nan,1.000000");
        assert_eq!(lines[3], "01/01/2024 01:00,0.500000,2.000000");
        assert_eq!(lines[4], "01/01/2024 02:00,0.750000,nan");
    }

    #[test]
    fn test_units_converted_to_target() {
        let dir = TempDir::new().unwrap();
        let file = source(&dir, "model.out");
        let reader = MockReader::new();
        reader.add_series(
            &file,
            ElementType::Link,
            "C1",
            "Flow_rate",
            vec![(ts(0), 35.3146667)],
        );
        let state = SelectionBuilder::new()
            .file(&file)
            .output_dir(dir.path())
            .ids(ElementType::Link, ["C1"])
            .params(ElementType::Link, ["Flow_rate"])
            .target_unit(ParameterFamily::Flow, "cms")
            .label("Flow_rate", "Q")
            .build()
            .unwrap();

        BatchExecutor::new(&reader, ExecutorConfig::default())
            .run(&state)
            .unwrap();
        let text = fs::read_to_string(dir.path().join("linkC1Flow_rate.tsf")).unwrap();
        assert!(text.contains("Date/Time\tQ_cms\n"));
        assert!(text.contains("\t1.000000\n"));
    }

    #[test]
    fn test_failures_are_recorded_and_batch_continues() {
        let dir = TempDir::new().unwrap();
        let file = source(&dir, "model.out");
        let mut reader = MockReader::new();
        populate(&reader, &file);
        reader.fail_series(&file, ElementType::Link, "C1", "Flow_rate");
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        let state = links(&dir, &[file.clone()]).build().unwrap();

        let config =
            ExecutorConfig::default().with_messages(move |m| sink.lock().unwrap().push(m.to_string()));
        let report = BatchExecutor::new(&reader, config)
            .run(&state)
            .unwrap()
            .into_report();

        assert_eq!(report.paths.len(), 3);
        assert_eq!(report.skipped_empty, 1);
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.file, file);
        assert_eq!(failure.id, "C1");
        assert_eq!(failure.param, "Flow_rate");
        assert!(messages
            .lock()
            .unwrap()
            .contains(&"Finished processing model.out: 3 files (1 failure)".to_string()));
    }

    #[test]
    fn test_progress_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.out");
        let b = source(&dir, "b.out");
        let reader = MockReader::new();
        populate(&reader, &a);
        populate(&reader, &b);
        let state = links(&dir, &[a, b]).build().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        BatchExecutor::new(
            &reader,
            ExecutorConfig::default().with_progress(move |u| sink.lock().unwrap().push((u.done, u.total))),
        )
        .run(&state)
        .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 8);
        for (i, (done, total)) in seen.iter().enumerate() {
            assert_eq!(*done, i + 1);
            assert_eq!(*total, 8);
        }
    }

    #[test]
    fn test_cancellation_stops_after_in_flight_unit() {
        let dir = TempDir::new().unwrap();
        let file = source(&dir, "model.out");
        let token = CancellationToken::new();
        let reader = MockReader::with_config(MockReaderConfig {
            cancel_after: Some((3, token.clone())),
            ..Default::default()
        });
        populate(&reader, &file);
        let state = links(&dir, &[file]).build().unwrap();

        let outcome = BatchExecutor::new(&reader, ExecutorConfig::default())
            .with_cancellation(token)
            .run(&state)
            .unwrap();

        assert!(outcome.is_cancelled());
        assert_eq!(reader.extract_calls(), 3);
        let report = outcome.report();
        assert_eq!(report.units_done, 3);
        assert_eq!(report.paths.len(), 3);
        for path in &report.paths {
            let text = fs::read_to_string(path).unwrap();
            assert_eq!(text.lines().count(), 4);
        }
    }

    #[test]
    fn test_template_error_is_fatal_before_work() {
        let dir = TempDir::new().unwrap();
        let file = source(&dir, "model.out");
        let reader = MockReader::new();
        populate(&reader, &file);
        let state = links(&dir, &[file]).template("{prefix}{suffix}").build().unwrap();

        let err = BatchExecutor::new(&reader, ExecutorConfig::default())
            .run(&state)
            .unwrap_err();
        assert!(matches!(err, ExtractError::Template(_)));
        assert_eq!(reader.extract_calls(), 0);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_plan_only_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let file = source(&dir, "model.out");
        let reader = MockReader::new();
        let state = links(&dir, &[file]).build().unwrap();

        let report = BatchExecutor::new(&reader, ExecutorConfig::default().plan_only(true))
            .run(&state)
            .unwrap()
            .into_report();
        assert_eq!(report.paths, plan(&state).unwrap().into_iter().map(|i| i.path).collect::<Vec<_>>());
        assert_eq!(reader.extract_calls(), 0);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_merge_across_files_combines() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.out");
        let b = source(&dir, "b.out");
        let reader = MockReader::new();
        reader.add_series(&a, ElementType::Node, "J1", "Depth_above_invert", vec![(ts(0), 1.0)]);
        reader.add_series(&b, ElementType::Node, "J1", "Depth_above_invert", vec![(ts(1), 2.0)]);
        let state = SelectionBuilder::new()
            .files([&a, &b])
            .output_dir(dir.path().join("out"))
            .ids(ElementType::Node, ["J1"])
            .params(ElementType::Node, ["Depth_above_invert"])
            .combine_mode(CombineMode::MergeAcrossFiles)
            .build()
            .unwrap();

        let report = BatchExecutor::new(&reader, ExecutorConfig::default())
            .run(&state)
            .unwrap()
            .into_report();
        assert_eq!(report.paths.len(), 2);
        assert_eq!(
            report.combined,
            vec![dir.path().join("out").join("combined").join("nodeJ1.tsf")]
        );
        let text = fs::read_to_string(&report.combined[0]).unwrap();
        assert_eq!(
            text,
            "IDs:\tJ1\nDate/Time\tDepth_above_invert_ft\n01/01/2024 00:00\t1.000000\n01/01/2024 01:00\t2.000000\n"
        );
    }

    #[test]
    fn test_merge_across_files_with_date_only_format() {
        let dir = TempDir::new().unwrap();
        let a = source(&dir, "a.out");
        let b = source(&dir, "b.out");
        let next_day = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let reader = MockReader::new();
        reader.add_series(&a, ElementType::Node, "J1", "Depth_above_invert", vec![(ts(0), 1.0)]);
        reader.add_series(&b, ElementType::Node, "J1", "Depth_above_invert", vec![(next_day, 2.0)]);
        let state = SelectionBuilder::new()
            .files([&a, &b])
            .output_dir(dir.path().join("out"))
            .ids(ElementType::Node, ["J1"])
            .params(ElementType::Node, ["Depth_above_invert"])
            .combine_mode(CombineMode::MergeAcrossFiles)
            .time_format("%Y-%m-%d")
            .build()
            .unwrap();

        let report = BatchExecutor::new(&reader, ExecutorConfig::default())
            .run(&state)
            .unwrap()
            .into_report();
        assert_eq!(report.combined.len(), 1);
        let text = fs::read_to_string(&report.combined[0]).unwrap();
        assert_eq!(
            text,
            "IDs:\tJ1\nDate/Time\tDepth_above_invert_ft\n2024-01-01\t1.000000\n2024-01-02\t2.000000\n"
        );
    }

    #[test]
    fn test_colliding_column_labels_fail_before_work() {
        let dir = TempDir::new().unwrap();
        let file = source(&dir, "model.out");
        let reader = MockReader::new();
        reader.add_series(&file, ElementType::Link, "C1", "Flow_rate", vec![(ts(0), 1.0)]);
        reader.add_series(&file, ElementType::Link, "C1", "Max_flow", vec![(ts(0), 9.0)]);
        let state = SelectionBuilder::new()
            .file(&file)
            .output_dir(dir.path().join("out"))
            .ids(ElementType::Link, ["C1"])
            .params(ElementType::Link, ["Flow_rate", "Max_flow"])
            .label("Flow_rate", "Q")
            .label("Max_flow", "Q")
            .combine_mode(CombineMode::CombinedPerElement)
            .build()
            .unwrap();

        let err = BatchExecutor::new(&reader, ExecutorConfig::default())
            .run(&state)
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, ExtractError::DuplicateColumn { ref column, .. } if column == "Q_cfs"));
        assert_eq!(reader.extract_calls(), 0);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_system_uses_synthetic_id() {
        let dir = TempDir::new().unwrap();
        let file = source(&dir, "model.out");
        let reader = MockReader::new();
        reader.add_series(&file, ElementType::System, SYSTEM_ID, "Rainfall", vec![(ts(0), 0.1)]);
        let state = SelectionBuilder::new()
            .file(&file)
            .output_dir(dir.path())
            .ids(ElementType::System, ["anything", "else"])
            .params(ElementType::System, ["Rainfall"])
            .build()
            .unwrap();

        let report = BatchExecutor::new(&reader, ExecutorConfig::default())
            .run(&state)
            .unwrap()
            .into_report();
        assert_eq!(report.units_total, 1);
        assert_eq!(report.paths, vec![dir.path().join("systemSYSTEMRainfall.tsf")]);
        let text = fs::read_to_string(&report.paths[0]).unwrap();
        assert!(text.starts_with("IDs:\tSYSTEM\nDate/Time\tRainfall\n"));
    }
}
