//! Parameter classification and unit conversion
//!
//! Parameters are sorted into physical families by keyword, and each family has a
//! fixed table of factors to its canonical unit (cfs, ft, ft/s). Conversion
//! multiplies every value by `factor(from) / factor(to)`.
//!
//! Unknown unit strings deliberately map to a factor of 1.0, i.e. they are treated
//! as already canonical. This keeps a typo in a unit name from stopping a batch,
//! at the cost of silently unconverted values; callers get a warning from
//! [`crate::core::selection::SelectionBuilder::build`].

use crate::core::frame::RawSeries;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Flow units, factor to cfs
const FLOW_TO_CFS: &[(&str, f64)] = &[
    ("cfs", 1.0),
    ("cms", 35.3146667),
    ("mgd", 1.54722865),
    ("gpm", 0.00222800926),
    ("l/s", 0.0353146667),
];

/// Length units (depth and head), factor to ft
const LENGTH_TO_FT: &[(&str, f64)] = &[
    ("ft", 1.0),
    ("m", 3.2808399),
    ("in", 1.0 / 12.0),
    ("cm", 0.032808399),
];

/// Velocity units, factor to ft/s
const VELOCITY_TO_FTPS: &[(&str, f64)] = &[("ft/s", 1.0), ("m/s", 3.2808399)];

/// Keywords matched case-insensitively against parameter names, checked in order
const FAMILY_KEYWORDS: &[(ParameterFamily, &[&str])] = &[
    (ParameterFamily::Flow, &["flow", "discharge"]),
    (ParameterFamily::Depth, &["depth"]),
    (ParameterFamily::Head, &["head"]),
    (ParameterFamily::Velocity, &["vel"]),
];

/// Physical quantity group of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterFamily {
    Flow,
    Depth,
    Head,
    Velocity,
    Other,
}

impl ParameterFamily {
    /// Families that carry units
    pub const CONVERTIBLE: [ParameterFamily; 4] = [
        ParameterFamily::Flow,
        ParameterFamily::Depth,
        ParameterFamily::Head,
        ParameterFamily::Velocity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterFamily::Flow => "flow",
            ParameterFamily::Depth => "depth",
            ParameterFamily::Head => "head",
            ParameterFamily::Velocity => "velocity",
            ParameterFamily::Other => "other",
        }
    }

    fn table(&self) -> &'static [(&'static str, f64)] {
        match self {
            ParameterFamily::Flow => FLOW_TO_CFS,
            ParameterFamily::Depth | ParameterFamily::Head => LENGTH_TO_FT,
            ParameterFamily::Velocity => VELOCITY_TO_FTPS,
            ParameterFamily::Other => &[],
        }
    }

    /// Unit tokens accepted for this family
    pub fn units(&self) -> Vec<&'static str> {
        self.table().iter().map(|(u, _)| *u).collect()
    }

    /// Canonical unit of the family's factor table
    pub fn canonical_unit(&self) -> Option<&'static str> {
        self.table().first().map(|(u, _)| *u)
    }

    /// Whether `unit` appears in the family's table
    pub fn knows_unit(&self, unit: &str) -> bool {
        self.table().iter().any(|(u, _)| *u == unit)
    }

    /// Factor from `unit` to the canonical unit; unknown units give 1.0
    pub fn factor(&self, unit: &str) -> f64 {
        self.table()
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, f)| *f)
            .unwrap_or(1.0)
    }

    /// Units the source files are assumed to be stored in when nothing is configured
    pub fn default_assumed_units() -> BTreeMap<ParameterFamily, String> {
        ParameterFamily::CONVERTIBLE
            .iter()
            .filter_map(|f| f.canonical_unit().map(|u| (*f, u.to_string())))
            .collect()
    }
}

impl FromStr for ParameterFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        ParameterFamily::CONVERTIBLE
            .iter()
            .chain(std::iter::once(&ParameterFamily::Other))
            .copied()
            .find(|f| f.as_str() == name)
            .ok_or_else(|| {
                format!(
                    "Unknown parameter family '{}' (expected flow, depth, head, velocity or other)",
                    s
                )
            })
    }
}

impl Display for ParameterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a parameter name to its physical family
pub fn classify(parameter: &str) -> ParameterFamily {
    let lower = parameter.to_lowercase();
    FAMILY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(family, _)| *family)
        .unwrap_or(ParameterFamily::Other)
}

/// Convert a series between two units of a family.
///
/// Returns an unchanged copy when the family is `other`, either unit is missing or
/// empty, or both units are equal.
pub fn convert(
    series: &RawSeries,
    family: ParameterFamily,
    from_unit: Option<&str>,
    to_unit: Option<&str>,
) -> RawSeries {
    let (from, to) = match (from_unit, to_unit) {
        (Some(f), Some(t)) if !f.is_empty() && !t.is_empty() => (f, t),
        _ => return series.clone(),
    };
    if family == ParameterFamily::Other || from == to {
        return series.clone();
    }

    let factor = family.factor(from) / family.factor(to);
    debug!("Converting {} {} -> {} (x{})", family, from, to, factor);
    series.map_values(|v| v * factor)
}

// =============================================================================
// Unit detection from simulation reports
// =============================================================================

/// Units found in a simulation report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedUnits {
    pub flow: Option<String>,
    pub length: Option<String>,
    pub velocity: Option<String>,
}

impl DetectedUnits {
    pub fn is_empty(&self) -> bool {
        self.flow.is_none() && self.length.is_none() && self.velocity.is_none()
    }

    /// Assumed-unit map for the families that were detected. Depth and head share
    /// the length unit; velocity follows length when the report does not state it.
    pub fn assumed_units(&self) -> BTreeMap<ParameterFamily, String> {
        let mut units = BTreeMap::new();
        if let Some(flow) = &self.flow {
            units.insert(ParameterFamily::Flow, flow.clone());
        }
        if let Some(length) = &self.length {
            units.insert(ParameterFamily::Depth, length.clone());
            units.insert(ParameterFamily::Head, length.clone());
        }
        let velocity = self.velocity.clone().or_else(|| {
            self.length
                .as_deref()
                .map(|l| if l == "ft" { "ft/s" } else { "m/s" }.to_string())
        });
        if let Some(velocity) = velocity {
            units.insert(ParameterFamily::Velocity, velocity);
        }
        units
    }
}

impl Display for DetectedUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let parts: Vec<String> = self
            .assumed_units()
            .iter()
            .map(|(family, unit)| format!("{} {}", family, unit))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Locate the report belonging to a source file: same stem with `.rpt`, else the
/// first `.rpt` in the same directory.
pub fn find_report_for(source: &Path) -> Option<PathBuf> {
    let sibling = source.with_extension("rpt");
    if sibling.is_file() {
        return Some(sibling);
    }
    let dir = source.parent().filter(|d| !d.as_os_str().is_empty())?;
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("rpt"))
                    .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Read the `FLOW UNITS`, `LENGTH UNITS` and `VELOCITY UNITS` lines of a report
pub fn detect_units_from_report(report: &Path) -> DetectedUnits {
    let bytes = match fs::read(report) {
        Ok(b) => b,
        Err(e) => {
            debug!("Could not read report '{}': {}", report.display(), e);
            return DetectedUnits::default();
        }
    };
    detect_units_from_text(&String::from_utf8_lossy(&bytes))
}

/// Unit detection over report text
pub fn detect_units_from_text(text: &str) -> DetectedUnits {
    let mut detected = DetectedUnits::default();

    for line in text.lines() {
        let upper = line.trim().to_uppercase();
        let value = match upper.split_whitespace().last() {
            Some(v) => v,
            None => continue,
        };

        if upper.starts_with("FLOW UNITS") {
            detected.flow = match value {
                "CFS" => Some("cfs"),
                "CMS" => Some("cms"),
                "MGD" => Some("mgd"),
                "GPM" => Some("gpm"),
                "LPS" | "L/S" => Some("l/s"),
                _ => None,
            }
            .map(String::from)
            .or(detected.flow);
        } else if upper.starts_with("LENGTH UNITS") {
            detected.length = match value {
                "FEET" | "FT" => Some("ft"),
                "METERS" | "METRES" | "M" => Some("m"),
                "INCHES" | "IN" => Some("in"),
                "CENTIMETERS" | "CENTIMETRES" | "CM" => Some("cm"),
                _ => None,
            }
            .map(String::from)
            .or(detected.length);
        } else if upper.starts_with("VELOCITY UNITS") {
            detected.velocity = match value {
                "FT/S" | "FT/SEC" | "FPS" => Some("ft/s"),
                "M/S" | "MPS" => Some("m/s"),
                _ => None,
            }
            .map(String::from)
            .or(detected.velocity);
        }
    }

    detected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(values: &[f64]) -> RawSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        RawSeries::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + chrono::Duration::hours(i as i64), *v))
                .collect(),
        )
    }

    fn assert_values_close(actual: &RawSeries, expected: &[f64]) {
        let values = actual.values();
        assert_eq!(values.len(), expected.len());
        for (a, e) in values.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{} != {}", a, e);
        }
    }

    #[test]
    fn test_classify_keywords() {
        assert_eq!(classify("Flow_rate"), ParameterFamily::Flow);
        assert_eq!(classify("Total_inflow"), ParameterFamily::Flow);
        assert_eq!(classify("DISCHARGE"), ParameterFamily::Flow);
        assert_eq!(classify("Depth_above_invert"), ParameterFamily::Depth);
        assert_eq!(classify("Hydraulic_head"), ParameterFamily::Head);
        assert_eq!(classify("Flow_velocity"), ParameterFamily::Flow);
        assert_eq!(classify("Velocity"), ParameterFamily::Velocity);
        assert_eq!(classify("Volume"), ParameterFamily::Other);
        assert_eq!(classify(""), ParameterFamily::Other);
    }

    #[test]
    fn test_flow_cfs_and_cms() {
        let to_cms = convert(
            &series(&[35.3146667, 70.6293334]),
            ParameterFamily::Flow,
            Some("cfs"),
            Some("cms"),
        );
        assert_values_close(&to_cms, &[1.0, 2.0]);

        let to_cfs = convert(
            &series(&[1.0, 2.0]),
            ParameterFamily::Flow,
            Some("cms"),
            Some("cfs"),
        );
        assert_values_close(&to_cfs, &[35.3146667, 70.6293334]);
    }

    #[test]
    fn test_flow_cfs_and_mgd() {
        let to_mgd = convert(
            &series(&[1.0, 2.0]),
            ParameterFamily::Flow,
            Some("cfs"),
            Some("mgd"),
        );
        assert_values_close(&to_mgd, &[0.646316889, 1.292633778]);
    }

    #[test]
    fn test_head_and_velocity_metric() {
        let to_m = convert(
            &series(&[3.2808399, 6.5616798]),
            ParameterFamily::Head,
            Some("ft"),
            Some("m"),
        );
        assert_values_close(&to_m, &[1.0, 2.0]);

        let to_mps = convert(
            &series(&[3.2808399, 6.5616798]),
            ParameterFamily::Velocity,
            Some("ft/s"),
            Some("m/s"),
        );
        assert_values_close(&to_mps, &[1.0, 2.0]);
    }

    #[test]
    fn test_round_trip_every_known_pair() {
        let original = series(&[1.0, 2.0, 0.125]);
        for family in ParameterFamily::CONVERTIBLE {
            for a in family.units() {
                for b in family.units() {
                    let there = convert(&original, family, Some(a), Some(b));
                    let back = convert(&there, family, Some(b), Some(a));
                    assert_values_close(&back, &[1.0, 2.0, 0.125]);
                }
            }
        }
    }

    #[test]
    fn test_identity_and_missing_units_are_exact() {
        let original = series(&[1.0, 2.0]);
        let same = convert(&original, ParameterFamily::Flow, Some("cfs"), Some("cfs"));
        assert_eq!(same, original);

        let missing = convert(&original, ParameterFamily::Flow, None, None);
        assert_eq!(missing, original);

        let empty = convert(&original, ParameterFamily::Depth, Some(""), Some("m"));
        assert_eq!(empty, original);

        let other = convert(&original, ParameterFamily::Other, Some("cfs"), Some("cms"));
        assert_eq!(other, original);
    }

    #[test]
    fn test_unknown_unit_is_treated_as_canonical() {
        // "cfz" is not a flow unit, so it behaves like cfs
        let converted = convert(
            &series(&[35.3146667]),
            ParameterFamily::Flow,
            Some("cfz"),
            Some("cms"),
        );
        assert_values_close(&converted, &[1.0]);

        let untouched = convert(
            &series(&[2.0]),
            ParameterFamily::Depth,
            Some("ft"),
            Some("furlong"),
        );
        assert_values_close(&untouched, &[2.0]);
        assert!(!ParameterFamily::Depth.knows_unit("furlong"));
    }

    #[test]
    fn test_detect_units_from_text() {
        let report = "\
  *************
  Analysis Options
  *************
  Flow Units ............... CMS
  Process Models:
  Length Units ............. METERS
";
        let detected = detect_units_from_text(report);
        assert_eq!(detected.flow.as_deref(), Some("cms"));
        assert_eq!(detected.length.as_deref(), Some("m"));
        assert_eq!(detected.velocity, None);

        let assumed = detected.assumed_units();
        assert_eq!(assumed[&ParameterFamily::Depth], "m");
        assert_eq!(assumed[&ParameterFamily::Head], "m");
        assert_eq!(assumed[&ParameterFamily::Velocity], "m/s");
    }

    #[test]
    fn test_detect_units_none() {
        let detected = detect_units_from_text("nothing useful here\n");
        assert!(detected.is_empty());
        assert_eq!(detected.to_string(), "none");
        assert!(detected.assumed_units().is_empty());
    }

    #[test]
    fn test_find_report_prefers_sibling() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("model.out");
        fs::write(&source, b"").unwrap();
        fs::write(dir.path().join("aaa.rpt"), b"").unwrap();
        assert_eq!(find_report_for(&source), Some(dir.path().join("aaa.rpt")));

        fs::write(dir.path().join("model.rpt"), b"  Flow Units ...... GPM\n").unwrap();
        let report = find_report_for(&source).unwrap();
        assert_eq!(report, dir.path().join("model.rpt"));
        assert_eq!(
            detect_units_from_report(&report).flow.as_deref(),
            Some("gpm")
        );
    }
}
