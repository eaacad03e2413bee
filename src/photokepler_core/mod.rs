pub mod cli;
pub mod database;
pub mod error;
pub mod exif;
pub mod export;
pub mod fields;
pub mod filter;
pub mod library;
pub mod photo;
pub mod writer;

pub use cli::Cli;
pub use database::Database;
pub use error::ExportError;
pub use export::{ExportOptions, ExportSummary, export_records};
pub use fields::{ExportMode, OutputRow, to_row};
pub use filter::{has_valid_location, is_exportable, select_for_export};
pub use library::{LibraryOptions, PhotoSource, PhotosLibrary};
pub use photo::{MediaType, PhotoRecord, PlaceInfo, ScoreInfo};
