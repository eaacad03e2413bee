use crate::photokepler_core::error::Result;
use crate::photokepler_core::fields::ExportMode;
use crate::photokepler_core::filter::select_for_export;
use crate::photokepler_core::photo::PhotoRecord;
use crate::photokepler_core::writer::write_export_file;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Default name of the export file, written to the working directory.
pub const DEFAULT_OUTPUT_FILE: &str = "photo_metadata.csv";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub mode: ExportMode,
    pub output: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            mode: ExportMode::default(),
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
        }
    }
}

/// Counts reported after an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub photos_found: usize,
    pub rows_written: usize,
    pub skipped: usize,
    pub output: PathBuf,
}

/// Progress bar style shared by every long-running phase.
pub fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Filter, sort and write `records` according to `options`.
///
/// `progress` is advanced once per written row and has its length set to the
/// number of rows that will be written.
pub fn export_records(
    records: Vec<PhotoRecord>,
    options: &ExportOptions,
    progress: &ProgressBar,
) -> Result<ExportSummary> {
    let photos_found = records.len();
    let selected = select_for_export(records);

    progress.set_length(selected.len() as u64);
    progress.set_message("Extracting photo metadata");
    let rows_written = write_export_file(&options.output, options.mode, &selected, progress)?;
    progress.finish_with_message("Metadata written");

    Ok(ExportSummary {
        photos_found,
        rows_written,
        skipped: photos_found - rows_written,
        output: options.output.clone(),
    })
}
