//! Sample data generator
//!
//! Produces a [`SourceDocument`] with plausible node, link, subcatchment, system
//! and pollutant series from a seed, plus a matching report snippet so unit
//! detection has something to read. The same seed always yields the same data.

use crate::core::frame::Timestamp;
use crate::core::selection::{ElementType, SYSTEM_ID};
use crate::reader::{SourceDocument, POLLUTANT_PARAMETER};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::fs;
use std::io;
use std::path::Path;

pub const NODE_PARAMS: &[&str] = &["Depth_above_invert", "Hydraulic_head", "Lateral_inflow", "Volume"];
pub const LINK_PARAMS: &[&str] = &["Capacity", "Flow_depth", "Flow_rate", "Flow_velocity"];
pub const SUBCATCHMENT_PARAMS: &[&str] = &["Rainfall", "Runoff_rate"];
pub const SYSTEM_PARAMS: &[&str] = &["Rainfall", "Total_inflow", "Flooding"];
pub const POLLUTANTS: &[&str] = &["TSS", "TN"];

/// Size and shape of the generated data
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub seed: u64,
    pub nodes: usize,
    pub links: usize,
    pub subcatchments: usize,
    /// Number of reporting steps
    pub steps: usize,
    pub step_minutes: i64,
    pub start: Timestamp,
    /// Skip this many leading steps on links, giving irregular series
    pub link_offset: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            nodes: 3,
            links: 2,
            subcatchments: 2,
            steps: 24,
            step_minutes: 60,
            start: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            link_offset: 0,
        }
    }
}

/// Seeded generator of sample sources
pub struct SampleGenerator {
    config: SampleConfig,
    rng: StdRng,
}

impl SampleGenerator {
    pub fn new(config: SampleConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    fn timestamps(&self, skip: usize) -> Vec<Timestamp> {
        (skip..self.config.steps)
            .map(|i| self.config.start + Duration::minutes(self.config.step_minutes * i as i64))
            .collect()
    }

    /// A storm-shaped hydrograph with noise
    fn series(&mut self, peak: f64, skip: usize) -> Vec<(Timestamp, f64)> {
        let steps = self.config.steps.max(1) as f64;
        let phase = self.rng.gen_range(0.0..0.5);
        self.timestamps(skip)
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let x = (i + skip) as f64 / steps;
                let shape = (PI * (x + phase).min(1.0)).sin().max(0.0);
                let noise = self.rng.gen_range(0.95..1.05);
                (t, (peak * shape * noise * 1000.0).round() / 1000.0)
            })
            .collect()
    }

    /// Build a full document
    pub fn generate(&mut self) -> SourceDocument {
        let mut doc = SourceDocument {
            title: format!("Sample data (seed {})", self.config.seed),
            ..Default::default()
        };

        for n in 1..=self.config.nodes {
            let id = format!("J{}", n);
            let invert = self.rng.gen_range(90.0..110.0);
            let peak = self.rng.gen_range(1.0..5.0);
            let depth = self.series(peak, 0);
            let head = depth.iter().map(|(t, d)| (*t, d + invert)).collect();
            doc.insert(ElementType::Node, &id, "Depth_above_invert", depth);
            doc.insert(ElementType::Node, &id, "Hydraulic_head", head);
            let peak = self.rng.gen_range(5.0..50.0);
            let inflow = self.series(peak, 0);
            doc.insert(ElementType::Node, &id, "Lateral_inflow", inflow);
            let peak = self.rng.gen_range(100.0..1000.0);
            let volume = self.series(peak, 0);
            doc.insert(ElementType::Node, &id, "Volume", volume);
        }

        let offset = self.config.link_offset;
        for n in 1..=self.config.links {
            let id = format!("C{}", n);
            for (param, peak) in [
                ("Capacity", 1.0),
                ("Flow_depth", 3.0),
                ("Flow_rate", 40.0),
                ("Flow_velocity", 6.0),
            ] {
                let series = self.series(peak, offset);
                doc.insert(ElementType::Link, &id, param, series);
            }
        }

        for n in 1..=self.config.subcatchments {
            let id = format!("S{}", n);
            let peak = self.rng.gen_range(0.5..2.0);
            let rain = self.series(peak, 0);
            doc.insert(ElementType::Subcatchment, &id, "Rainfall", rain);
            let peak = self.rng.gen_range(2.0..20.0);
            let runoff = self.series(peak, 0);
            doc.insert(ElementType::Subcatchment, &id, "Runoff_rate", runoff);
        }

        for (param, peak) in [("Rainfall", 1.5), ("Total_inflow", 120.0), ("Flooding", 4.0)] {
            let series = self.series(peak, 0);
            doc.insert(ElementType::System, SYSTEM_ID, param, series);
        }

        for pollutant in POLLUTANTS {
            let peak = self.rng.gen_range(10.0..200.0);
            let series = self.series(peak, 0);
            doc.insert(ElementType::Pollutant, pollutant, POLLUTANT_PARAMETER, series);
        }

        doc
    }

    /// Report text declaring US customary units
    pub fn report_text() -> String {
        [
            "  *************",
            "  Analysis Options",
            "  *************",
            "  Flow Units ............... CFS",
            "  Length Units ............. FEET",
            "  Velocity Units ........... FT/SEC",
            "",
        ]
        .join("\n")
    }

    /// Write `<path>` as JSON and `<path stem>.rpt` next to it
    pub fn write_sample(&mut self, path: &Path) -> io::Result<()> {
        let doc = self.generate();
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        fs::write(path.with_extension("rpt"), Self::report_text())?;
        Ok(())
    }
}
