//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    print_error, print_header, print_info, print_success, print_warning, DiscoveryProgress,
    RunProgress,
};
use crate::cli::{Args, Commands, SelectionArgs};
use crate::core::config::{get_config_path, init_config, Config};
use crate::core::discovery::{
    discover_params, find_missing_ids, parse_pasted_ids, IdentifierResolver, SetMode,
};
use crate::core::executor::RunReport;
use crate::core::planner::{find_overwrite_conflicts, plan, PlanItem};
use crate::core::progress::CancellationToken;
use crate::core::selection::{ElementType, SelectionState, SYSTEM_ID};
use crate::core::units::{detect_units_from_report, find_report_for, ParameterFamily};
use crate::reader::{JsonSourceReader, SeriesReader};
use crate::testdb::{SampleConfig, SampleGenerator};
use crate::worker::{DiscoveryRequest, WorkerController, WorkerEvent};
use anyhow::{bail, Context, Result};
use dialoguer::Confirm;
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Selections parsed from `type:value` arguments
type TypedSelection = BTreeMap<ElementType, BTreeSet<String>>;

/// Run the command specified in args
pub fn run_command(args: &Args, config: &Config, cancel: CancellationToken) -> Result<()> {
    match &args.command {
        Commands::Run { selection, yes } => {
            run_extraction(config, selection, *yes, cancel)?;
        }
        Commands::Plan { selection, json } => {
            preview_plan(config, selection, *json, cancel)?;
        }
        Commands::Discover {
            files,
            types,
            include,
            exclude,
            set_mode,
            params,
            json,
        } => {
            let request = discovery_request(
                config,
                files,
                types,
                include.as_deref(),
                exclude.as_deref(),
                set_mode.as_deref(),
            )?;
            discover(request, *params, *json, cancel)?;
        }
        Commands::CheckIds {
            files,
            ids_file,
            ids_type,
        } => {
            check_ids(files, ids_file, ids_type)?;
        }
        Commands::DetectUnits { file } => {
            detect_units(file);
        }
        Commands::GenerateSample {
            output,
            seed,
            nodes,
            links,
            steps,
        } => {
            generate_sample(
                output,
                SampleConfig {
                    seed: *seed,
                    nodes: *nodes,
                    links: *links,
                    steps: *steps,
                    ..Default::default()
                },
            )?;
        }
        Commands::Config { path, reset } => {
            handle_config_command(*path, *reset)?;
        }
        Commands::GenerateConfig { output } => {
            generate_config_file(output.clone())?;
        }
        Commands::ShowConfig => {
            show_config(config)?;
        }
    }

    Ok(())
}

// ============================================================================
// Selection assembly
// ============================================================================

/// Parse `type:value` entries into per-type sets
pub fn parse_typed(entries: &[String], what: &str) -> Result<TypedSelection> {
    let mut parsed = TypedSelection::new();
    for entry in entries.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
        let (kind, value) = match entry.split_once(':') {
            Some((kind, value)) if !value.trim().is_empty() => (kind, value.trim()),
            _ => bail!("Expected TYPE:{} but got '{}'", what, entry),
        };
        let element_type: ElementType = kind.parse()?;
        parsed
            .entry(element_type)
            .or_default()
            .insert(value.to_string());
    }
    Ok(parsed)
}

/// Parse `family=unit` entries
pub fn parse_family_units(entries: &[String]) -> Result<Vec<(ParameterFamily, String)>> {
    entries
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .map(|entry| -> Result<(ParameterFamily, String)> {
            let (family, unit) = entry
                .split_once('=')
                .with_context(|| format!("Expected FAMILY=UNIT but got '{}'", entry))?;
            let family: ParameterFamily = family.parse().map_err(anyhow::Error::msg)?;
            Ok((family, unit.trim().to_string()))
        })
        .collect()
}

fn parse_set_mode(value: Option<&str>, fallback: SetMode) -> Result<SetMode> {
    match value {
        Some(mode) => mode.parse().map_err(anyhow::Error::msg),
        None => Ok(fallback),
    }
}

/// Combine the config file and command-line flags into a frozen selection.
///
/// With `--all-ids` every type that has parameters is discovered across the
/// source files, using the include/exclude filters and set mode.
pub fn build_selection<R: SeriesReader + ?Sized>(
    config: &Config,
    args: &SelectionArgs,
    reader: &R,
) -> Result<SelectionState> {
    config.validate()?;

    let mut builder = config.to_builder().files(&args.files);
    if let Some(format) = &args.format {
        builder = builder.output_format(format.parse()?);
    }
    if let Some(mode) = &args.mode {
        builder = builder.combine_mode(mode.parse()?);
    }
    if let Some(dir) = &args.output {
        builder = builder.output_dir(dir);
    }
    if let Some(prefix) = &args.prefix {
        builder = builder.prefix(prefix);
    }
    if let Some(suffix) = &args.suffix {
        builder = builder.suffix(suffix);
    }
    // Format and mode must be final before the template picks its slot
    if let Some(template) = &args.template {
        builder = builder.template(template);
    }

    if args.detect_units {
        if let Some(first) = args.files.first() {
            match find_report_for(first) {
                Some(report) => {
                    let detected = detect_units_from_report(&report);
                    info!("Units in '{}': {}", report.display(), detected);
                    for (family, unit) in detected.assumed_units() {
                        builder = builder.assumed_unit(family, &unit);
                    }
                }
                None => warn!(
                    "No report found for '{}'; keeping configured units",
                    first.display()
                ),
            }
        }
    }
    for (family, unit) in parse_family_units(&args.assumed_unit)? {
        builder = builder.assumed_unit(family, &unit);
    }
    for (family, unit) in parse_family_units(&args.target_unit)? {
        builder = builder.target_unit(family, &unit);
    }

    let params = parse_typed(&args.params, "PARAM")?;
    let mut ids = parse_typed(&args.ids, "ID")?;

    if let Some(path) = &args.ids_file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read id list '{}'", path.display()))?;
        let active: ElementType = args.ids_type.parse()?;
        for (element_type, pasted) in parse_pasted_ids(&text, active) {
            ids.entry(element_type).or_default().extend(pasted);
        }
    }

    if args.all_ids {
        let include = args.include.as_deref().or(config.discovery.include());
        let exclude = args.exclude.as_deref().or(config.discovery.exclude());
        let mode = parse_set_mode(args.set_mode.as_deref(), config.discovery.mode)?;
        let types: Vec<ElementType> = params.keys().copied().collect();
        let result = IdentifierResolver::new(reader, include, exclude, mode)?
            .discover(&args.files, &types);
        for (element_type, found) in result.ids_by_type {
            ids.entry(element_type).or_default().extend(found);
        }
    }

    // The system type has a single implicit id
    if params.contains_key(&ElementType::System) {
        ids.entry(ElementType::System)
            .or_default()
            .insert(SYSTEM_ID.to_string());
    }

    for (element_type, selected) in params {
        builder = builder.params(element_type, selected);
    }
    for (element_type, selected) in ids {
        builder = builder.ids(element_type, selected);
    }

    Ok(builder.build()?)
}

// ============================================================================
// Run and plan
// ============================================================================

fn print_report(report: &RunReport) {
    print_success(&report.to_string());
    for path in &report.combined {
        print_info(&format!("Combined: {}", path.display()));
    }
    if report.skipped_empty > 0 {
        print_info(&format!(
            "{} output(s) not written because no series had data",
            report.skipped_empty
        ));
    }
    for failure in &report.failures {
        print_warning(&failure.to_string());
    }
}

/// Ask before writing into directories that already hold outputs
fn confirm_overwrite(conflicts: &[PathBuf], extension: &str) -> Result<bool> {
    print_warning(&format!(
        "{} output director{} already contain .{} files:",
        conflicts.len(),
        if conflicts.len() == 1 { "y" } else { "ies" },
        extension
    ));
    for dir in conflicts {
        print_info(&dir.display().to_string());
    }
    Confirm::new()
        .with_prompt("Existing files with the same names will be overwritten. Continue?")
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

/// Extract the selection on a worker thread with a progress bar
pub fn run_extraction(
    config: &Config,
    args: &SelectionArgs,
    yes: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let reader = Arc::new(JsonSourceReader::new());
    let state = build_selection(config, args, reader.as_ref())?;

    let items = plan(&state)?;
    let conflicts = find_overwrite_conflicts(&items, state.output_format);
    if !conflicts.is_empty() && !yes && !confirm_overwrite(&conflicts, state.output_format.extension())? {
        info!("Run aborted before writing anything");
        return Ok(());
    }

    print_header("Extracting Timeseries");
    print_info(&format!(
        "{} series from {} source file(s) into {} output file(s)",
        state.total_units(),
        state.files.len(),
        items.len()
    ));

    let controller = WorkerController::new(reader).with_cancellation(cancel);
    let events = controller.events();
    let progress = RunProgress::new(state.total_units() as u64);
    controller.start_run(state, false)?;

    let mut failure = None;
    for event in events.iter() {
        match event {
            WorkerEvent::Progress(update) => progress.update(&update),
            WorkerEvent::Message(message) => progress.log(&message),
            WorkerEvent::RunFinished(report) => {
                progress.finish();
                print_report(&report);
                break;
            }
            WorkerEvent::Cancelled(report) => {
                progress.finish_with_error("Cancelled");
                print_report(&report);
                print_warning("Run cancelled; files already written were kept");
                break;
            }
            WorkerEvent::Failed { message, .. } => {
                progress.finish_with_error(&message);
                failure = Some(message);
                break;
            }
            WorkerEvent::DiscoveryProgress(_) | WorkerEvent::DiscoveryFinished(_) => {}
        }
    }
    controller.wait()?;

    match failure {
        Some(message) => bail!("Run failed: {}", message),
        None => Ok(()),
    }
}

/// Planned outputs plus the directories that already hold outputs
#[derive(Debug, Serialize)]
struct PlanPreview<'a> {
    outputs: &'a [PlanItem],
    existing_output_dirs: &'a [PathBuf],
}

/// Show what a run would write without extracting anything
pub fn preview_plan(
    config: &Config,
    args: &SelectionArgs,
    json: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let reader = Arc::new(JsonSourceReader::new());
    let state = build_selection(config, args, reader.as_ref())?;
    let items = plan(&state)?;
    let conflicts = find_overwrite_conflicts(&items, state.output_format);
    let extension = state.output_format.extension();

    if json {
        let preview = PlanPreview {
            outputs: &items,
            existing_output_dirs: &conflicts,
        };
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    print_header("Extraction Plan");
    let controller = WorkerController::new(reader).with_cancellation(cancel);
    let events = controller.events();
    controller.start_run(state, true)?;
    for event in events.iter() {
        match event {
            WorkerEvent::Message(message) => print_info(&message),
            WorkerEvent::RunFinished(report) | WorkerEvent::Cancelled(report) => {
                println!();
                for path in &report.paths {
                    println!("  {}", path.display());
                }
                println!();
                print_success(&format!("{} output file(s) planned", report.paths.len()));
                break;
            }
            WorkerEvent::Failed { message, .. } => {
                controller.wait()?;
                bail!("Planning failed: {}", message);
            }
            _ => {}
        }
    }
    controller.wait()?;

    for dir in &conflicts {
        print_warning(&format!(
            "'{}' already contains .{} files",
            dir.display(),
            extension
        ));
    }
    Ok(())
}

// ============================================================================
// Discovery
// ============================================================================

/// Build a discovery request from flags, falling back to the config
pub fn discovery_request(
    config: &Config,
    files: &[PathBuf],
    types: &[String],
    include: Option<&str>,
    exclude: Option<&str>,
    set_mode: Option<&str>,
) -> Result<DiscoveryRequest> {
    let types = if types.is_empty() {
        ElementType::ALL.to_vec()
    } else {
        types
            .iter()
            .map(|t| t.parse::<ElementType>())
            .collect::<std::result::Result<Vec<_>, _>>()?
    };
    Ok(DiscoveryRequest {
        files: files.to_vec(),
        types,
        include: include.or(config.discovery.include()).map(str::to_string),
        exclude: exclude.or(config.discovery.exclude()).map(str::to_string),
        mode: parse_set_mode(set_mode, config.discovery.mode)?,
    })
}

#[derive(Debug, Serialize)]
struct DiscoveryOutput<'a> {
    ids: &'a TypedSelection,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<TypedSelection>,
    cancelled: bool,
}

/// List ids (and optionally parameters) per element type
pub fn discover(
    request: DiscoveryRequest,
    with_params: bool,
    json: bool,
    cancel: CancellationToken,
) -> Result<()> {
    if let Some(missing) = request.files.iter().find(|f| !f.exists()) {
        bail!("Source file not found: {}", missing.display());
    }

    let reader = Arc::new(JsonSourceReader::new());
    let controller = WorkerController::new(reader.clone()).with_cancellation(cancel);
    let events = controller.events();
    let files = request.files.clone();
    let progress = (!json).then(DiscoveryProgress::new);
    controller.start_discovery(request)?;

    let mut result = None;
    for event in events.iter() {
        match event {
            WorkerEvent::DiscoveryProgress(update) => {
                if let Some(p) = &progress {
                    p.update(&update);
                }
            }
            WorkerEvent::DiscoveryFinished(found) => {
                result = Some(found);
                break;
            }
            WorkerEvent::Failed { message, .. } => {
                if let Some(p) = &progress {
                    p.finish_with_error(&message);
                }
                controller.wait()?;
                bail!("Discovery failed: {}", message);
            }
            _ => {}
        }
    }
    controller.wait()?;

    let result = result.context("Discovery worker stopped without a result")?;
    let params = with_params.then(|| {
        result
            .ids_by_type
            .keys()
            .map(|t| (*t, discover_params(reader.as_ref(), &files, *t)))
            .collect::<TypedSelection>()
    });

    if json {
        let output = DiscoveryOutput {
            ids: &result.ids_by_type,
            params,
            cancelled: result.cancelled,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(p) = &progress {
        let total = result.ids_by_type.values().map(|s| s.len()).sum();
        p.finish(total, result.cancelled);
    }
    println!();
    for (element_type, ids) in &result.ids_by_type {
        println!("{} ({}):", element_type, ids.len());
        if !ids.is_empty() {
            println!("  {}", ids.iter().cloned().collect::<Vec<_>>().join(", "));
        }
        if let Some(found) = params.as_ref().and_then(|p| p.get(element_type)) {
            println!(
                "  parameters: {}",
                found.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
    }
    if result.cancelled {
        print_warning("Discovery was cancelled; lists cover only the files scanned");
    }
    Ok(())
}

/// Validate a pasted id list against every source file
pub fn check_ids(files: &[PathBuf], ids_file: &Path, ids_type: &str) -> Result<()> {
    let text = fs::read_to_string(ids_file)
        .with_context(|| format!("Failed to read id list '{}'", ids_file.display()))?;
    let active: ElementType = ids_type.parse()?;
    let wanted = parse_pasted_ids(&text, active);
    let count: usize = wanted.values().map(|s| s.len()).sum();

    let reader = JsonSourceReader::new();
    let missing = find_missing_ids(&reader, files, &wanted);
    if missing.is_empty() {
        print_success(&format!(
            "All {} id(s) found in {} file(s)",
            count,
            files.len()
        ));
        return Ok(());
    }

    for (file, by_type) in &missing {
        print_error(&format!("Missing in {}:", file.display()));
        for (element_type, ids) in by_type {
            println!(
                "      {}: {}",
                element_type,
                ids.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
    }
    Ok(())
}

// ============================================================================
// Units and sample data
// ============================================================================

/// Show the units declared in the report belonging to a source file
pub fn detect_units(file: &Path) {
    match find_report_for(file) {
        Some(report) => {
            let detected = detect_units_from_report(&report);
            print_info(&format!("Report: {}", report.display()));
            if detected.is_empty() {
                print_warning("No unit declarations found");
            } else {
                for (family, unit) in detected.assumed_units() {
                    println!("  {:<10} {}", family.to_string(), unit);
                }
            }
        }
        None => print_warning(&format!("No report file found for '{}'", file.display())),
    }
}

/// Write a seeded sample source and its report
pub fn generate_sample(output: &Path, config: SampleConfig) -> Result<()> {
    SampleGenerator::new(config)
        .write_sample(output)
        .with_context(|| format!("Failed to write sample to '{}'", output.display()))?;

    print_success(&format!("Sample source written to {}", output.display()));
    print_info(&format!(
        "Try: ts-extract run -f {} --all-ids --params link:Flow_rate",
        output.display()
    ));
    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

/// Print the config path, reset it, or create it if missing
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                fs::remove_file(&config_path)?;
                info!("Removed existing config file");
            }
        }
        let path = init_config()?;
        info!("Created fresh config file at: {}", path.display());
        return Ok(());
    }

    if show_path {
        let path = Config::active_path()
            .or_else(get_config_path)
            .context("Could not determine the configuration directory")?;
        println!("{}", path.display());
        return Ok(());
    }

    let path = init_config()?;
    info!("Config file: {}", path.display());
    info!("Edit this file to change the default output, naming and unit settings.");
    info!("Run 'ts-extract show-config' to verify your settings.");
    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            fs::write(&path, Config::generate_default_config())
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to customize the extraction settings.");
    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) -> Result<()> {
    match Config::active_path() {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("(Using default settings - no config file found)"),
    }
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
