use crate::photokepler_core::export::{DEFAULT_OUTPUT_FILE, ExportOptions};
use crate::photokepler_core::fields::ExportMode;
use crate::photokepler_core::library::LibraryOptions;
use clap::Parser;
use simplelog::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Export dated, geotagged photo metadata from a Photos library to CSV for Kepler.gl"
)]
pub struct Cli {
    /// Path to the Photos library (e.g. ~/Pictures/Photos Library.photoslibrary)
    #[arg(required = true)]
    pub library_path: PathBuf,

    /// Export every catalogue attribute and embedded camera metadata instead of
    /// just filename, date and coordinates
    #[arg(long)]
    pub extended: bool,

    /// File to write the export to
    #[arg(long, short, default_value = DEFAULT_OUTPUT_FILE)]
    pub output: PathBuf,

    /// Include photos that are in the library's trash
    #[arg(long)]
    pub include_trashed: bool,

    /// Read EXIF, IPTC and XMP tags from original files with exiftool
    #[arg(long)]
    pub exiftool: bool,

    /// Enable file logging to photokepler.log
    #[arg(long = "log", global = true)]
    pub log: bool,

    /// Log level for file logging (debug, info, warn, error)
    #[arg(long, default_value_t = LevelFilter::Debug, global = true)]
    pub log_level: LevelFilter,
}

impl Cli {
    pub fn mode(&self) -> ExportMode {
        if self.extended {
            ExportMode::Extended
        } else {
            ExportMode::Compact
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            mode: self.mode(),
            output: self.output.clone(),
        }
    }

    pub fn library_options(&self) -> LibraryOptions {
        LibraryOptions {
            include_trashed: self.include_trashed,
            read_embedded_metadata: self.exiftool,
        }
    }
}
