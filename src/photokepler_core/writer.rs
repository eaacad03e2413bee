use crate::photokepler_core::error::{ExportError, Result};
use crate::photokepler_core::fields::{ExportMode, to_row};
use crate::photokepler_core::photo::PhotoRecord;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use indicatif::ProgressBar;
use std::io;
use std::path::Path;

fn builder() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder
        .delimiter(b',')
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'));
    builder
}

/// Write the header and one row per record, advancing `progress` once per row.
pub fn write_rows<W: io::Write>(
    out: W,
    mode: ExportMode,
    records: &[PhotoRecord],
    progress: &ProgressBar,
) -> csv::Result<usize> {
    let mut writer = builder().from_writer(out);
    writer.write_record(mode.header())?;

    for record in records {
        writer.write_record(to_row(record, mode))?;
        progress.inc(1);
    }

    writer.flush()?;
    Ok(records.len())
}

/// Create (or truncate) `path` and write the export into it.
///
/// The file is closed when this returns, whether or not writing succeeded.
pub fn write_export_file(
    path: &Path,
    mode: ExportMode,
    records: &[PhotoRecord],
    progress: &ProgressBar,
) -> Result<usize> {
    log::info!("Writing {} rows to {}", records.len(), path.display());

    let to_write_error = |source: csv::Error| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::create(path).map_err(|e| to_write_error(e.into()))?;
    write_rows(file, mode, records, progress).map_err(to_write_error)
}
