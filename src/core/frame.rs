//! Timeseries containers
//!
//! [`RawSeries`] is what the reader hands back for one (file, type, id, param).
//! [`OutputFrame`] accumulates several named columns over a shared timestamp axis
//! using outer-join semantics: the axis is the union of every timestamp seen, and
//! cells nobody provided stay empty.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Timestamp type used throughout the crate
pub type Timestamp = NaiveDateTime;

/// One extracted series, timestamps strictly increasing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSeries {
    points: Vec<(Timestamp, f64)>,
}

impl RawSeries {
    /// Build a series, sorting by timestamp and keeping the last value for a
    /// repeated timestamp.
    pub fn new(mut points: Vec<(Timestamp, f64)>) -> Self {
        points.sort_by_key(|(t, _)| *t);
        let mut deduped: Vec<(Timestamp, f64)> = Vec::with_capacity(points.len());
        for (t, v) in points {
            match deduped.last_mut() {
                Some(last) if last.0 == t => last.1 = v,
                _ => deduped.push((t, v)),
            }
        }
        Self { points: deduped }
    }

    pub fn points(&self) -> &[(Timestamp, f64)] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// New series with every value transformed
    pub fn map_values<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        Self {
            points: self.points.iter().map(|(t, v)| (*t, f(*v))).collect(),
        }
    }
}

/// Named value columns over a shared, sorted timestamp axis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputFrame {
    columns: Vec<String>,
    rows: BTreeMap<Timestamp, Vec<Option<f64>>>,
}

impl OutputFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in timestamp order; each row has one cell per column
    pub fn rows(&self) -> impl Iterator<Item = (&Timestamp, &[Option<f64>])> {
        self.rows.iter().map(|(t, cells)| (t, cells.as_slice()))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// A frame with no rows writes nothing
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell lookup by timestamp and column name
    pub fn value(&self, at: &Timestamp, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(at).and_then(|cells| cells[idx])
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Return the index of `column`, adding it (empty in every existing row) if new
    fn ensure_column(&mut self, column: &str) -> usize {
        if let Some(idx) = self.column_index(column) {
            return idx;
        }
        self.columns.push(column.to_string());
        for cells in self.rows.values_mut() {
            cells.push(None);
        }
        self.columns.len() - 1
    }

    /// Set one cell, growing the timestamp axis when needed
    pub fn set(&mut self, at: Timestamp, column: &str, value: Option<f64>) {
        let idx = self.ensure_column(column);
        let width = self.columns.len();
        let cells = self.rows.entry(at).or_insert_with(|| vec![None; width]);
        cells[idx] = value;
    }

    /// Outer-join a series as a new column
    pub fn join_series(&mut self, column: &str, series: &RawSeries) {
        self.ensure_column(column);
        for (t, v) in series.points() {
            self.set(*t, column, Some(*v));
        }
    }

    /// Outer-join another frame, matching columns by name. Cells present in
    /// `other` overwrite cells already here.
    pub fn merge(&mut self, other: &OutputFrame) {
        for column in &other.columns {
            self.ensure_column(column);
        }
        for (t, cells) in &other.rows {
            for (column, cell) in other.columns.iter().zip(cells) {
                if cell.is_some() {
                    self.set(*t, column, *cell);
                } else if !self.rows.contains_key(t) {
                    self.set(*t, column, None);
                }
            }
        }
    }
}
