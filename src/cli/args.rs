//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Extract element timeseries from stormwater simulation output into tsf, dat or csv files
#[derive(Parser, Debug)]
#[command(name = "ts-extract")]
#[command(version)]
#[command(about = "Batch-extract node, link, subcatchment, system and pollutant timeseries from simulation output", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

/// Which series to extract and how to write them
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Source file (repeat for several)
    #[arg(short = 'f', long = "file", value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Element ids as type:ID, comma-separated or repeated (e.g. node:J1,link:C2)
    #[arg(long, value_name = "TYPE:ID", value_delimiter = ',')]
    pub ids: Vec<String>,

    /// File with one id per line; `type:ID` lines name their type
    #[arg(long, value_name = "FILE")]
    pub ids_file: Option<PathBuf>,

    /// Element type for untyped lines in --ids-file
    #[arg(long, value_name = "TYPE", default_value = "node")]
    pub ids_type: String,

    /// Parameters as type:PARAM, comma-separated or repeated (e.g. link:Flow_rate)
    #[arg(short, long, value_name = "TYPE:PARAM", value_delimiter = ',', required = true)]
    pub params: Vec<String>,

    /// Select every discovered id of each type that has parameters
    #[arg(long)]
    pub all_ids: bool,

    /// Output format: tsf, dat, csv (overrides config)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Combine mode: separate, combined-per-element, merge-across-files (overrides config)
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Output root directory (overrides config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub prefix: Option<String>,

    #[arg(long)]
    pub suffix: Option<String>,

    /// Filename template for the current format and mode
    /// (placeholders: {prefix} {suffix} {type} {id} {param} {short})
    #[arg(short, long)]
    pub template: Option<String>,

    /// Unit the source stores a family in, as family=unit (e.g. flow=cms)
    #[arg(long, value_name = "FAMILY=UNIT", value_delimiter = ',')]
    pub assumed_unit: Vec<String>,

    /// Unit to write a family in, as family=unit (e.g. flow=cfs)
    #[arg(long, value_name = "FAMILY=UNIT", value_delimiter = ',')]
    pub target_unit: Vec<String>,

    /// Read assumed units from the report file next to the first source
    #[arg(long)]
    pub detect_units: bool,

    /// Regex an id must match for --all-ids (overrides config)
    #[arg(long, value_name = "REGEX")]
    pub include: Option<String>,

    /// Regex that drops an id for --all-ids (overrides config)
    #[arg(long, value_name = "REGEX")]
    pub exclude: Option<String>,

    /// How --all-ids combines files: union or intersection (overrides config)
    #[arg(long, value_name = "MODE")]
    pub set_mode: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract the selected series and write output files
    Run {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Overwrite existing outputs without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the files a run would write and which already exist
    Plan {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the element ids (and optionally parameters) in source files
    Discover {
        /// Source file (repeat for several)
        #[arg(short = 'f', long = "file", value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Element types to scan (defaults to all)
        #[arg(long = "type", value_name = "TYPE", value_delimiter = ',')]
        types: Vec<String>,

        /// Regex an id must match (overrides config)
        #[arg(long, value_name = "REGEX")]
        include: Option<String>,

        /// Regex that drops an id (overrides config)
        #[arg(long, value_name = "REGEX")]
        exclude: Option<String>,

        /// union or intersection across files (overrides config)
        #[arg(long, value_name = "MODE")]
        set_mode: Option<String>,

        /// Also list the parameters of each type
        #[arg(long)]
        params: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a pasted id list against every source file
    CheckIds {
        /// Source file (repeat for several)
        #[arg(short = 'f', long = "file", value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// File with one id per line; `type:ID` lines name their type
        #[arg(long, value_name = "FILE")]
        ids_file: PathBuf,

        /// Element type for untyped lines
        #[arg(long, value_name = "TYPE", default_value = "node")]
        ids_type: String,
    },

    /// Show the units declared in the report next to a source file
    DetectUnits {
        /// Source file whose report is read
        file: PathBuf,
    },

    /// Write a seeded sample source file (and report) for trying the tool
    GenerateSample {
        /// Output path of the JSON source
        #[arg(short, long, default_value = "sample.json")]
        output: PathBuf,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "3")]
        nodes: usize,

        #[arg(long, default_value = "2")]
        links: usize,

        /// Number of hourly steps
        #[arg(long, default_value = "24")]
        steps: usize,
    },

    /// Show the configuration file path, or reset it to defaults
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\swmm_timeseries_extractor\config.toml
    /// - Linux: ~/.config/swmm_timeseries_extractor/config.toml
    /// - macOS: ~/Library/Application Support/swmm_timeseries_extractor/config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,
}
