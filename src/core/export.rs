//! Output writers for the tsf, dat and csv formats
//!
//! All three formats share one layout: two header rows (an identifier row and a
//! column-name row) followed by one delimited data row per timestamp. They differ
//! only in delimiter and in the marker that opens the identifier row. Missing cells
//! are written as `nan`.
//!
//! The writer for a run is picked once from the [`OutputFormat`] and reused for
//! every file.

use crate::core::error::{ExtractError, Result};
use crate::core::frame::{OutputFrame, Timestamp};
use crate::core::selection::OutputFormat;
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime, ParseError};
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Write as _};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;

/// Label opening the column-name row
pub const TIME_COLUMN_LABEL: &str = "Date/Time";

/// Text written for a missing cell
pub const MISSING_CELL: &str = "nan";

/// Fixed-point float rendering, parsed from a printf-style `%.Nf`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FloatFormat {
    precision: usize,
}

impl FloatFormat {
    pub fn with_precision(precision: usize) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Render a cell; `None` and NaN render as `nan`
    pub fn render(&self, value: Option<f64>) -> String {
        match value {
            Some(v) if !v.is_nan() => format!("{:.*}", self.precision, v),
            _ => MISSING_CELL.to_string(),
        }
    }
}

impl Default for FloatFormat {
    fn default() -> Self {
        Self { precision: 6 }
    }
}

impl FromStr for FloatFormat {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        let spec = s.trim();
        let invalid = || ExtractError::InvalidFloatFormat(s.to_string());
        let body = spec
            .strip_prefix('%')
            .and_then(|rest| rest.strip_suffix('f'))
            .ok_or_else(invalid)?;
        if body.is_empty() {
            return Ok(Self::default());
        }
        let digits = body.strip_prefix('.').ok_or_else(invalid)?;
        let precision = digits.parse::<usize>().map_err(|_| invalid())?;
        Ok(Self { precision })
    }
}

impl Display for FloatFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%.{}f", self.precision)
    }
}

impl TryFrom<String> for FloatFormat {
    type Error = ExtractError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FloatFormat> for String {
    fn from(value: FloatFormat) -> Self {
        value.to_string()
    }
}

/// Render a timestamp, failing instead of panicking on a pattern chrono cannot
/// apply
pub fn format_timestamp(
    timestamp: &Timestamp,
    pattern: &str,
) -> std::result::Result<String, fmt::Error> {
    let mut out = String::new();
    write!(out, "{}", timestamp.format(pattern))?;
    Ok(out)
}

/// Parse a timestamp written with `pattern`. Date-only patterns read as midnight.
pub fn parse_timestamp(
    text: &str,
    pattern: &str,
) -> std::result::Result<Timestamp, ParseError> {
    NaiveDateTime::parse_from_str(text, pattern).or_else(|err| {
        NaiveDate::parse_from_str(text, pattern)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or(err)
    })
}

fn sample_timestamp() -> Option<Timestamp> {
    NaiveDate::from_ymd_opt(2024, 12, 31).and_then(|d| d.and_hms_opt(23, 45, 0))
}

/// Check that a strftime pattern is well formed and can render a timestamp
pub fn validate_time_format(pattern: &str) -> Result<()> {
    let invalid = |message: &str| ExtractError::InvalidTimeFormat {
        pattern: pattern.to_string(),
        message: message.to_string(),
    };

    if pattern.trim().is_empty() {
        return Err(invalid("pattern is empty"));
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(invalid("unrecognized format specifier"));
    }
    let sample = sample_timestamp().ok_or_else(|| invalid("no sample timestamp"))?;
    format_timestamp(&sample, pattern)
        .map_err(|_| invalid("pattern cannot be applied to a date and time"))?;
    Ok(())
}

/// Check that timestamps written with `pattern` parse back. Returns `false` when
/// they parse but lose precision (e.g. a date-only pattern).
pub fn check_time_round_trip(pattern: &str) -> Result<bool> {
    validate_time_format(pattern)?;
    let invalid = |message: String| ExtractError::InvalidTimeFormat {
        pattern: pattern.to_string(),
        message,
    };

    let sample = sample_timestamp().ok_or_else(|| invalid("no sample timestamp".to_string()))?;
    let text = format_timestamp(&sample, pattern)
        .map_err(|_| invalid("pattern cannot be applied to a date and time".to_string()))?;
    let parsed = parse_timestamp(&text, pattern).map_err(|e| {
        invalid(format!("written timestamps such as '{}' cannot be read back: {}", text, e))
    })?;
    Ok(parsed == sample)
}

/// Writes and reads back one output format
pub trait FrameWriter: Send + Sync {
    /// Field delimiter
    fn delimiter(&self) -> u8;

    /// First cell of the identifier row
    fn id_marker(&self) -> &'static str;

    /// Identifier row for an element
    fn id_header(&self, id: &str) -> Vec<String> {
        vec![self.id_marker().to_string(), id.to_string()]
    }

    /// Column-name row for a frame
    fn column_header(&self, frame: &OutputFrame) -> Vec<String> {
        std::iter::once(TIME_COLUMN_LABEL.to_string())
            .chain(frame.columns().iter().cloned())
            .collect()
    }

    /// Write two header rows and one row per timestamp
    fn write(
        &self,
        frame: &OutputFrame,
        path: &Path,
        header1: &[String],
        header2: &[String],
        time_format: &str,
        float_format: &FloatFormat,
    ) -> Result<()> {
        write_delimited(
            self.delimiter(),
            frame,
            path,
            header1,
            header2,
            time_format,
            float_format,
        )
    }

    /// Parse a file written by [`FrameWriter::write`], returning the identifier row
    /// and the frame.
    fn read(&self, path: &Path, time_format: &str) -> Result<(Vec<String>, OutputFrame)> {
        read_delimited(self.delimiter(), path, time_format)
    }
}

/// Tab-separated timeseries file
#[derive(Debug, Clone, Copy, Default)]
pub struct TsfWriter;

/// Tab-separated flat table
#[derive(Debug, Clone, Copy, Default)]
pub struct DatWriter;

/// Comma-separated flat table
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvWriter;

impl FrameWriter for TsfWriter {
    fn delimiter(&self) -> u8 {
        b'\t'
    }

    fn id_marker(&self) -> &'static str {
        "IDs:"
    }
}

impl FrameWriter for DatWriter {
    fn delimiter(&self) -> u8 {
        b'\t'
    }

    fn id_marker(&self) -> &'static str {
        "IDs:"
    }
}

impl FrameWriter for CsvWriter {
    fn delimiter(&self) -> u8 {
        b','
    }

    fn id_marker(&self) -> &'static str {
        "IDs"
    }
}

impl OutputFormat {
    /// Writer for this format
    pub fn writer(&self) -> &'static dyn FrameWriter {
        match self {
            OutputFormat::Tsf => &TsfWriter,
            OutputFormat::Dat => &DatWriter,
            OutputFormat::Csv => &CsvWriter,
        }
    }
}

fn write_error(path: &Path, err: impl Display) -> ExtractError {
    ExtractError::WriteError {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn write_delimited(
    delimiter: u8,
    frame: &OutputFrame,
    path: &Path,
    header1: &[String],
    header2: &[String],
    time_format: &str,
    float_format: &FloatFormat,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
    }

    let file = File::create(path).map_err(|e| write_error(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(BufWriter::new(file));

    writer
        .write_record(header1)
        .map_err(|e| write_error(path, e))?;
    writer
        .write_record(header2)
        .map_err(|e| write_error(path, e))?;

    for (timestamp, cells) in frame.rows() {
        let stamp = format_timestamp(timestamp, time_format).map_err(|_| {
            write_error(
                path,
                format!("cannot format {} with time format '{}'", timestamp, time_format),
            )
        })?;
        let record = std::iter::once(stamp).chain(cells.iter().map(|c| float_format.render(*c)));
        writer
            .write_record(record)
            .map_err(|e| write_error(path, e))?;
    }

    writer.flush().map_err(|e| write_error(path, e))?;
    trace!("Wrote {} rows to {}", frame.row_count(), path.display());
    Ok(())
}

fn read_delimited(
    delimiter: u8,
    path: &Path,
    time_format: &str,
) -> Result<(Vec<String>, OutputFrame)> {
    let malformed = |message: String| ExtractError::MalformedOutput {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| malformed(e.to_string()))?;

    let mut records = reader.records();
    let mut next_row = |what: &str| -> Result<Vec<String>> {
        match records.next() {
            Some(Ok(record)) => Ok(record.iter().map(String::from).collect()),
            Some(Err(e)) => Err(malformed(e.to_string())),
            None => Err(malformed(format!("missing {}", what))),
        }
    };

    let header1 = next_row("identifier row")?;
    let header2 = next_row("column-name row")?;
    let columns: Vec<String> = header2.into_iter().skip(1).collect();

    let mut frame = OutputFrame::new();
    for (line, record) in records.enumerate() {
        let record = record.map_err(|e| malformed(e.to_string()))?;
        let mut fields = record.iter();
        let stamp = fields
            .next()
            .ok_or_else(|| malformed(format!("empty data row {}", line + 3)))?;
        let timestamp = parse_timestamp(stamp, time_format)
            .map_err(|e| malformed(format!("bad timestamp '{}': {}", stamp, e)))?;

        for (column, raw) in columns.iter().zip(fields) {
            let value = parse_cell(raw)
                .ok_or_else(|| malformed(format!("bad value '{}' in column {}", raw, column)))?;
            frame.set(timestamp, column, value);
        }
    }

    // columns with no rows still belong to the frame
    for column in &columns {
        if frame.columns().iter().all(|c| c != column) {
            frame.join_series(column, &Default::default());
        }
    }

    Ok((header1, frame))
}

/// `Some(None)` for a missing cell, `None` when the text is not a number
fn parse_cell(raw: &str) -> Option<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(MISSING_CELL) {
        return Some(None);
    }
    raw.parse::<f64>().ok().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::RawSeries;
    use tempfile::TempDir;

    fn ts(hour: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn flow_frame() -> OutputFrame {
        let mut frame = OutputFrame::new();
        frame.join_series("flow", &RawSeries::new(vec![(ts(0), 1.0), (ts(1), 2.5)]));
        frame
    }

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_float_format_parsing() {
        assert_eq!("%.3f".parse::<FloatFormat>().unwrap().precision(), 3);
        assert_eq!("%f".parse::<FloatFormat>().unwrap().precision(), 6);
        assert_eq!(" %.0f ".parse::<FloatFormat>().unwrap().precision(), 0);
        assert!("%.3e".parse::<FloatFormat>().is_err());
        assert!("3".parse::<FloatFormat>().is_err());
        assert!("%.xf".parse::<FloatFormat>().is_err());
        assert_eq!(FloatFormat::with_precision(2).to_string(), "%.2f");
    }

    #[test]
    fn test_float_rendering() {
        let fmt = "%.3f".parse::<FloatFormat>().unwrap();
        assert_eq!(fmt.render(Some(1.23456)), "1.235");
        assert_eq!(fmt.render(None), "nan");
        assert_eq!(fmt.render(Some(f64::NAN)), "nan");
        assert_eq!(FloatFormat::default().render(Some(1.0)), "1.000000");
    }

    #[test]
    fn test_all_formats_write_two_headers_then_rows() {
        let dir = TempDir::new().unwrap();
        let frame = flow_frame();
        let fmt = "%.3f".parse::<FloatFormat>().unwrap();

        let cases = [
            (OutputFormat::Tsf, "IDs:\tflow", "Date/Time\tflow", "01/01/2024 00:00\t1.000"),
            (OutputFormat::Dat, "IDs:\tflow", "Date/Time\tflow", "01/01/2024 00:00\t1.000"),
            (OutputFormat::Csv, "IDs,flow", "Date/Time,flow", "01/01/2024 00:00,1.000"),
        ];

        for (format, h1, h2, first_row) in cases {
            let writer = format.writer();
            let path = dir.path().join(format!("plain.{}", format.extension()));
            writer
                .write(
                    &frame,
                    &path,
                    &writer.id_header("flow"),
                    &writer.column_header(&frame),
                    "%m/%d/%Y %H:%M",
                    &fmt,
                )
                .unwrap();

            let text = fs::read_to_string(&path).unwrap();
            let lines: Vec<&str> = text.lines().collect();
            assert_eq!(lines.len(), 4, "{}", format);
            assert_eq!(lines[0], h1);
            assert_eq!(lines[1], h2);
            assert_eq!(lines[2], first_row);
            assert!(lines[3].ends_with("2.500"));
        }
    }

    #[test]
    fn test_missing_cells_written_as_nan() {
        let dir = TempDir::new().unwrap();
        let mut frame = flow_frame();
        frame.join_series("depth", &RawSeries::new(vec![(ts(2), 0.5)]));

        let path = dir.path().join("gaps.csv");
        let writer = OutputFormat::Csv.writer();
        writer
            .write(
                &frame,
                &path,
                &strings(&["IDs", "J1"]),
                &writer.column_header(&frame),
                "%Y-%m-%d %H:%M",
                &FloatFormat::with_precision(1),
            )
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "Date/Time,flow,depth");
        assert_eq!(lines[2], "2024-01-01 00:00,1.0,nan");
        assert_eq!(lines[4], "2024-01-01 02:00,nan,0.5");
    }

    #[test]
    fn test_read_back_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut frame = flow_frame();
        frame.join_series("depth", &RawSeries::new(vec![(ts(1), 0.25)]));
        let path = dir.path().join("node_J1.tsf");
        let writer = OutputFormat::Tsf.writer();
        writer
            .write(
                &frame,
                &path,
                &writer.id_header("J1"),
                &writer.column_header(&frame),
                "%m/%d/%Y %H:%M",
                &FloatFormat::default(),
            )
            .unwrap();

        let (header1, read) = writer.read(&path, "%m/%d/%Y %H:%M").unwrap();
        assert_eq!(header1, strings(&["IDs:", "J1"]));
        assert_eq!(read, frame);
    }

    #[test]
    fn test_read_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "IDs,J1\nDate/Time,flow\nyesterday,1.0\n").unwrap();
        let err = OutputFormat::Csv
            .writer()
            .read(&path, "%m/%d/%Y %H:%M")
            .unwrap_err();
        assert!(matches!(err, ExtractError::MalformedOutput { .. }));

        fs::write(&path, "IDs,J1\n").unwrap();
        assert!(OutputFormat::Csv
            .writer()
            .read(&path, "%m/%d/%Y %H:%M")
            .is_err());
    }

    #[test]
    fn test_time_format_validation() {
        assert!(validate_time_format("%m/%d/%Y %H:%M").is_ok());
        assert!(validate_time_format("%Y-%m-%d").is_ok());

        let err = validate_time_format("%Q").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidTimeFormat { .. }));
        assert!(err.is_configuration());
        assert!(validate_time_format("  ").is_err());
        assert!(format_timestamp(&ts(0), "%Q").is_err());
    }

    #[test]
    fn test_bad_time_format_is_a_write_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node_J1.tsf");
        let writer = OutputFormat::Tsf.writer();
        let frame = flow_frame();
        let err = writer
            .write(
                &frame,
                &path,
                &writer.id_header("J1"),
                &writer.column_header(&frame),
                "%Q",
                &FloatFormat::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ExtractError::WriteError { .. }));
    }

    #[test]
    fn test_time_round_trip_check() {
        assert!(check_time_round_trip("%m/%d/%Y %H:%M:%S").unwrap());
        assert!(check_time_round_trip("%m/%d/%Y %H:%M").unwrap());
        assert!(!check_time_round_trip("%Y-%m-%d").unwrap());
        assert!(matches!(
            check_time_round_trip("%H:%M").unwrap_err(),
            ExtractError::InvalidTimeFormat { .. }
        ));
    }

    #[test]
    fn test_read_back_date_only_pattern() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node_J1.dat");
        let writer = OutputFormat::Dat.writer();
        let mut frame = OutputFrame::new();
        frame.join_series("flow", &RawSeries::new(vec![(ts(0), 1.0)]));
        writer
            .write(
                &frame,
                &path,
                &writer.id_header("J1"),
                &writer.column_header(&frame),
                "%Y-%m-%d",
                &FloatFormat::default(),
            )
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("2024-01-01\t1.000000"));
        let (_, read) = writer.read(&path, "%Y-%m-%d").unwrap();
        assert_eq!(read, frame);
    }
}
