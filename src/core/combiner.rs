//! Cross-file combination
//!
//! In `merge-across-files` mode each source writes its own outputs first. This
//! step reads those files back, groups them by file name (the same element named
//! the same way in every per-source subdirectory) and outer-joins each group into
//! one file under the `combined` directory. Column sets may differ between
//! sources; cells no source provided are written as `nan`.

use crate::core::error::Result;
use crate::core::export::FloatFormat;
use crate::core::frame::OutputFrame;
use crate::core::selection::OutputFormat;
use log::{debug, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Group written paths by file name, keeping first-seen group order and the
/// written order inside each group
pub fn group_by_name(written: &[PathBuf]) -> Vec<(OsString, Vec<PathBuf>)> {
    let mut groups: Vec<(OsString, Vec<PathBuf>)> = Vec::new();
    for path in written {
        let name = match path.file_name() {
            Some(name) => name.to_os_string(),
            None => continue,
        };
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, paths)) => paths.push(path.clone()),
            None => groups.push((name, vec![path.clone()])),
        }
    }
    groups
}

/// Merge per-source outputs into `combined_dir`, one file per group.
///
/// Returns the combined paths in group order. Files are merged in written order,
/// so on a (timestamp, column) collision the later file's value is kept.
pub fn combine_across_files(
    written: &[PathBuf],
    format: OutputFormat,
    combined_dir: &Path,
    time_format: &str,
    float_format: &FloatFormat,
) -> Result<Vec<PathBuf>> {
    let writer = format.writer();
    let groups = group_by_name(written);
    let mut combined = Vec::with_capacity(groups.len());

    info!(
        "Combining {} output(s) into {} file(s) in {}",
        written.len(),
        groups.len(),
        combined_dir.display()
    );

    for (name, paths) in groups {
        let mut header1: Option<Vec<String>> = None;
        let mut frame = OutputFrame::new();

        for path in &paths {
            let (ids, part) = writer.read(path, time_format)?;
            debug!(
                "Merging {} ({} rows, {} columns)",
                path.display(),
                part.row_count(),
                part.columns().len()
            );
            if header1.is_none() {
                header1 = Some(ids);
            }
            frame.merge(&part);
        }

        let header1 = header1.unwrap_or_else(|| writer.id_header(""));
        let header2 = writer.column_header(&frame);
        let target = combined_dir.join(&name);
        writer.write(&frame, &target, &header1, &header2, time_format, float_format)?;
        combined.push(target);
    }

    Ok(combined)
}
