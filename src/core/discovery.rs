//! Identifier and parameter discovery
//!
//! Discovery asks the reader which identifiers each source file holds per element
//! type, filters them through optional include/exclude patterns and reduces the
//! per-file sets to one sorted set per type by union or intersection.
//!
//! Patterns are compiled before any file is opened so a typo fails immediately
//! rather than after a long scan.

use crate::core::error::{ExtractError, Result};
use crate::core::progress::{CancellationToken, ProgressCallback, ProgressUpdate};
use crate::core::selection::ElementType;
use crate::reader::SeriesReader;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// How per-file identifier sets are reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetMode {
    /// Identifiers present in at least one file
    #[default]
    Union,
    /// Identifiers present in every file
    Intersection,
}

impl Display for SetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetMode::Union => f.write_str("union"),
            SetMode::Intersection => f.write_str("intersection"),
        }
    }
}

impl FromStr for SetMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "union" | "any" => Ok(SetMode::Union),
            "intersection" | "all" => Ok(SetMode::Intersection),
            other => Err(format!(
                "Unknown discovery mode '{}' (expected union or intersection)",
                other
            )),
        }
    }
}

/// Include/exclude filter over identifiers
#[derive(Debug, Clone, Default)]
pub struct IdFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl IdFilter {
    /// Compile the patterns; empty patterns are ignored
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self> {
        Ok(Self {
            include: compile("include", include)?,
            exclude: compile("exclude", exclude)?,
        })
    }

    /// An id is kept when the include pattern matches somewhere in it (or there
    /// is none) and the exclude pattern does not.
    pub fn matches(&self, id: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(id) {
                return false;
            }
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_match(id),
            None => true,
        }
    }

    pub fn apply(&self, ids: BTreeSet<String>) -> BTreeSet<String> {
        ids.into_iter().filter(|id| self.matches(id)).collect()
    }
}

fn compile(kind: &'static str, pattern: Option<&str>) -> Result<Option<Regex>> {
    match pattern.filter(|p| !p.is_empty()) {
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|source| ExtractError::InvalidRegex {
                kind,
                pattern: p.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Reduce per-file sets. Intersection over zero sets is empty.
pub fn combine_sets(sets: &[BTreeSet<String>], mode: SetMode) -> BTreeSet<String> {
    match mode {
        SetMode::Union => sets.iter().flatten().cloned().collect(),
        SetMode::Intersection => {
            let mut iter = sets.iter();
            let first = match iter.next() {
                Some(first) => first.clone(),
                None => return BTreeSet::new(),
            };
            iter.fold(first, |acc, set| acc.intersection(set).cloned().collect())
        }
    }
}

/// Result of a discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryResult {
    pub ids_by_type: BTreeMap<ElementType, BTreeSet<String>>,
    /// Set when the pass stopped early; the sets then only cover the files scanned
    pub cancelled: bool,
}

/// Discovers identifiers across files
pub struct IdentifierResolver<'a, R: SeriesReader + ?Sized> {
    reader: &'a R,
    filter: IdFilter,
    mode: SetMode,
    progress_callback: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl<'a, R: SeriesReader + ?Sized> IdentifierResolver<'a, R> {
    /// Build a resolver; fails if either pattern does not compile
    pub fn new(
        reader: &'a R,
        include: Option<&str>,
        exclude: Option<&str>,
        mode: SetMode,
    ) -> Result<Self> {
        Ok(Self {
            reader,
            filter: IdFilter::new(include, exclude)?,
            mode,
            progress_callback: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Identifiers of one file and type after filtering. Reader errors are
    /// logged and give an empty set.
    pub fn discover_file(&self, file: &Path, element_type: ElementType) -> BTreeSet<String> {
        match self.reader.discover_ids(file, element_type) {
            Ok(ids) => self.filter.apply(ids),
            Err(e) => {
                warn!(
                    "Discovery of {} ids in '{}' failed: {}",
                    element_type,
                    file.display(),
                    e
                );
                BTreeSet::new()
            }
        }
    }

    /// Discover every listed type across every file.
    ///
    /// Progress is reported once per (file, type) pair out of
    /// `files.len() * types.len()`.
    pub fn discover(&self, files: &[PathBuf], types: &[ElementType]) -> DiscoveryResult {
        let total = files.len() * types.len();
        let mut per_type: BTreeMap<ElementType, Vec<BTreeSet<String>>> = BTreeMap::new();
        let mut done = 0;
        let mut cancelled = false;

        info!(
            "Discovering ids in {} file(s) ({} mode)",
            files.len(),
            self.mode
        );

        'files: for file in files {
            for &element_type in types {
                if self.cancel.is_cancelled() {
                    info!("Discovery cancelled after {} of {} steps", done, total);
                    cancelled = true;
                    break 'files;
                }

                let ids = self.discover_file(file, element_type);
                debug!(
                    "{}: {} {} id(s)",
                    file.display(),
                    ids.len(),
                    element_type
                );
                per_type.entry(element_type).or_default().push(ids);

                done += 1;
                self.report(ProgressUpdate {
                    done,
                    total,
                    file: file.display().to_string(),
                    element_type,
                    id: String::new(),
                    param: String::new(),
                });
            }
        }

        let ids_by_type = types
            .iter()
            .map(|t| {
                let sets = per_type.remove(t).unwrap_or_default();
                (*t, combine_sets(&sets, self.mode))
            })
            .collect();

        DiscoveryResult {
            ids_by_type,
            cancelled,
        }
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(callback) = &self.progress_callback {
            callback(update);
        }
    }
}

/// Union of the parameters every file offers for a type
pub fn discover_params<R: SeriesReader + ?Sized>(
    reader: &R,
    files: &[PathBuf],
    element_type: ElementType,
) -> BTreeSet<String> {
    let mut params = BTreeSet::new();
    for file in files {
        match reader.list_possible_params(file, element_type) {
            Ok(found) => params.extend(found),
            Err(e) => warn!(
                "Listing {} parameters in '{}' failed: {}",
                element_type,
                file.display(),
                e
            ),
        }
    }
    params
}

/// Parse a pasted list of ids, one per line.
///
/// A line of the form `type:ID` names its element type; any other line belongs to
/// `active_type`. Blank lines are skipped. A prefix that is not an element type is
/// kept as part of the id, so `C:1` stays an id of the active type.
pub fn parse_pasted_ids(
    text: &str,
    active_type: ElementType,
) -> BTreeMap<ElementType, BTreeSet<String>> {
    let mut parsed: BTreeMap<ElementType, BTreeSet<String>> = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (element_type, id) = match line.split_once(':') {
            Some((prefix, rest)) => match prefix.parse::<ElementType>() {
                Ok(t) if !rest.trim().is_empty() => (t, rest.trim()),
                _ => (active_type, line),
            },
            None => (active_type, line),
        };
        parsed
            .entry(element_type)
            .or_default()
            .insert(id.to_string());
    }
    parsed
}

/// Ids from `wanted` that a file does not contain, per file and type
pub type MissingIds = BTreeMap<PathBuf, BTreeMap<ElementType, BTreeSet<String>>>;

/// Check pasted ids against every source file
pub fn find_missing_ids<R: SeriesReader + ?Sized>(
    reader: &R,
    files: &[PathBuf],
    wanted: &BTreeMap<ElementType, BTreeSet<String>>,
) -> MissingIds {
    let mut missing = MissingIds::new();
    for file in files {
        for (element_type, ids) in wanted {
            if ids.is_empty() {
                continue;
            }
            let available = match reader.discover_ids(file, *element_type) {
                Ok(available) => available,
                Err(e) => {
                    warn!(
                        "Could not validate {} ids against '{}': {}",
                        element_type,
                        file.display(),
                        e
                    );
                    BTreeSet::new()
                }
            };
            let absent: BTreeSet<String> = ids.difference(&available).cloned().collect();
            if !absent.is_empty() {
                missing
                    .entry(file.clone())
                    .or_default()
                    .insert(*element_type, absent);
            }
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdb::{MockReader, MockReaderConfig};
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn reader_with(files: &[(&str, &[&str])]) -> MockReader {
        let reader = MockReader::new();
        for (file, ids) in files {
            for id in *ids {
                reader.add_series(*file, ElementType::Node, id, "Depth", Vec::new());
            }
        }
        reader
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_union_and_intersection() {
        let reader = reader_with(&[("a.out", &["1", "2"]), ("b.out", &["2", "3"])]);
        let files = paths(&["a.out", "b.out"]);

        let union = IdentifierResolver::new(&reader, None, None, SetMode::Union)
            .unwrap()
            .discover(&files, &[ElementType::Node]);
        assert_eq!(union.ids_by_type[&ElementType::Node], set(&["1", "2", "3"]));

        let inter = IdentifierResolver::new(&reader, None, None, SetMode::Intersection)
            .unwrap()
            .discover(&files, &[ElementType::Node]);
        assert_eq!(inter.ids_by_type[&ElementType::Node], set(&["2"]));
    }

    #[test]
    fn test_intersection_of_no_files_is_empty() {
        assert!(combine_sets(&[], SetMode::Intersection).is_empty());
        assert!(combine_sets(&[], SetMode::Union).is_empty());
    }

    #[test]
    fn test_include_and_exclude_filters() {
        let reader = reader_with(&[("a.out", &["J1", "J2", "OUT1", "J10"])]);
        let files = paths(&["a.out"]);
        let result = IdentifierResolver::new(&reader, Some("^J"), Some("0$"), SetMode::Union)
            .unwrap()
            .discover(&files, &[ElementType::Node]);
        assert_eq!(result.ids_by_type[&ElementType::Node], set(&["J1", "J2"]));
    }

    #[test]
    fn test_bad_pattern_fails_before_scanning() {
        let reader = reader_with(&[("a.out", &["J1"])]);
        let err = IdentifierResolver::new(&reader, Some("(unclosed"), None, SetMode::Union)
            .err()
            .unwrap();
        assert!(matches!(err, ExtractError::InvalidRegex { kind: "include", .. }));
        assert!(err.is_configuration());
        assert_eq!(reader.extract_calls(), 0);
    }

    #[test]
    fn test_progress_per_file_and_type() {
        let reader = reader_with(&[("a.out", &["1"]), ("b.out", &["2"])]);
        let files = paths(&["a.out", "b.out"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        IdentifierResolver::new(&reader, None, None, SetMode::Union)
            .unwrap()
            .with_progress(move |u| sink.lock().unwrap().push((u.done, u.total)))
            .discover(&files, &ElementType::ALL);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen.first(), Some(&(1, 10)));
        assert_eq!(seen.last(), Some(&(10, 10)));
    }

    #[test]
    fn test_failed_file_empties_intersection() {
        let mut failing = HashSet::new();
        failing.insert(PathBuf::from("b.out"));
        let reader = MockReader::with_config(MockReaderConfig {
            failing_files: failing,
            ..Default::default()
        });
        reader.add_series("a.out", ElementType::Node, "1", "Depth", Vec::new());
        let files = paths(&["a.out", "b.out"]);

        let inter = IdentifierResolver::new(&reader, None, None, SetMode::Intersection)
            .unwrap()
            .discover(&files, &[ElementType::Node]);
        assert!(inter.ids_by_type[&ElementType::Node].is_empty());

        let union = IdentifierResolver::new(&reader, None, None, SetMode::Union)
            .unwrap()
            .discover(&files, &[ElementType::Node]);
        assert_eq!(union.ids_by_type[&ElementType::Node], set(&["1"]));
    }

    #[test]
    fn test_cancelled_discovery_stops() {
        let reader = reader_with(&[("a.out", &["1"])]);
        let token = CancellationToken::new();
        token.cancel();
        let result = IdentifierResolver::new(&reader, None, None, SetMode::Union)
            .unwrap()
            .with_cancellation(token)
            .discover(&paths(&["a.out"]), &[ElementType::Node]);
        assert!(result.cancelled);
        assert!(result.ids_by_type[&ElementType::Node].is_empty());
    }

    #[test]
    fn test_discover_params_is_union() {
        let reader = MockReader::new();
        reader.add_series("a.out", ElementType::Link, "C1", "Flow_rate", Vec::new());
        reader.add_series("b.out", ElementType::Link, "C1", "Velocity", Vec::new());
        let params = discover_params(&reader, &paths(&["a.out", "b.out"]), ElementType::Link);
        assert_eq!(params, set(&["Flow_rate", "Velocity"]));

        let pollutant = discover_params(&reader, &paths(&["a.out"]), ElementType::Pollutant);
        assert_eq!(pollutant, set(&["Concentration"]));
    }

    #[test]
    fn test_parse_pasted_ids() {
        let text = "J1\n\n  link:C1 \nsubcatchment:S1\nC:1\nJ2\n";
        let parsed = parse_pasted_ids(text, ElementType::Node);
        assert_eq!(parsed[&ElementType::Node], set(&["C:1", "J1", "J2"]));
        assert_eq!(parsed[&ElementType::Link], set(&["C1"]));
        assert_eq!(parsed[&ElementType::Subcatchment], set(&["S1"]));
    }

    #[test]
    fn test_find_missing_ids_per_file() {
        let reader = reader_with(&[("a.out", &["J1", "J2"]), ("b.out", &["J1"])]);
        let wanted = parse_pasted_ids("J1\nJ2\nJ3", ElementType::Node);
        let missing = find_missing_ids(&reader, &paths(&["a.out", "b.out"]), &wanted);

        assert_eq!(
            missing[&PathBuf::from("a.out")][&ElementType::Node],
            set(&["J3"])
        );
        assert_eq!(
            missing[&PathBuf::from("b.out")][&ElementType::Node],
            set(&["J2", "J3"])
        );
    }
}
