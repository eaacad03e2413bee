use crate::photokepler_core::photo::PhotoRecord;
use std::fmt::Display;
use std::path::Path;
use time::OffsetDateTime;

/// Date format written to every date column.
pub const OUTPUT_DATE_FORMAT: &[time::format_description::FormatItem] =
    time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Placeholder for absent identity, text and categorical values.
pub const NOT_AVAILABLE: &str = "N/A";

pub const COMPACT_HEADER: [&str; 4] = ["Filename", "DateTime", "Latitude", "Longitude"];

pub const EXTENDED_HEADER: [&str; 50] = [
    "UUID",
    "Filename",
    "OriginalFilename",
    "Path",
    "PathEdited",
    "FileSize",
    "FileFormat",
    "MediaType",
    "DateTime",
    "DateAdded",
    "DateModified",
    "DateTrashed",
    "TimezoneOffset",
    "Latitude",
    "Longitude",
    "PlaceName",
    "PlaceAddress",
    "PlaceCountryCode",
    "Title",
    "Description",
    "Keywords",
    "Persons",
    "Albums",
    "Favorite",
    "Hidden",
    "Shared",
    "Burst",
    "BurstSelected",
    "Live",
    "Portrait",
    "HDR",
    "HasAdjustments",
    "ScoreOverall",
    "ScoreCuration",
    "ScorePromotion",
    "ScoreHighlight",
    "ScoreAesthetic",
    "ScoreContent",
    "Moment",
    "OriginalWidth",
    "OriginalHeight",
    "Width",
    "Height",
    "Orientation",
    "IsCloud",
    "InCloud",
    "CloudStatus",
    "ExternalEdit",
    "Project",
    "MetadataVersion",
];

/// Embedded metadata columns: (column header, group-qualified tag name).
pub const EXIF_COLUMNS: [(&str, &str); 12] = [
    ("Make", "EXIF:Make"),
    ("Model", "EXIF:Model"),
    ("LensModel", "EXIF:LensModel"),
    ("FocalLength", "EXIF:FocalLength"),
    ("FNumber", "EXIF:FNumber"),
    ("ExposureTime", "EXIF:ExposureTime"),
    ("ISO", "EXIF:ISO"),
    ("Orientation(EXIF)", "EXIF:Orientation"),
    ("Keywords(IPTC)", "IPTC:Keywords"),
    ("Caption", "IPTC:Caption-Abstract"),
    ("TagsList", "XMP:TagsList"),
    ("Subject", "XMP:Subject"),
];

/// One serialized output line, in header order.
pub type OutputRow = Vec<String>;

/// Which column set to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Filename, date and coordinates only.
    #[default]
    Compact,
    /// Every catalogue attribute plus embedded camera metadata.
    Extended,
}

impl ExportMode {
    pub fn header(&self) -> Vec<&'static str> {
        match self {
            ExportMode::Compact => COMPACT_HEADER.to_vec(),
            ExportMode::Extended => EXTENDED_HEADER
                .iter()
                .copied()
                .chain(EXIF_COLUMNS.iter().map(|(column, _)| *column))
                .collect(),
        }
    }

    pub fn column_count(&self) -> usize {
        match self {
            ExportMode::Compact => COMPACT_HEADER.len(),
            ExportMode::Extended => EXTENDED_HEADER.len() + EXIF_COLUMNS.len(),
        }
    }
}

/// Build the output row for a record.
pub fn to_row(record: &PhotoRecord, mode: ExportMode) -> OutputRow {
    match mode {
        ExportMode::Compact => compact_row(record),
        ExportMode::Extended => extended_row(record),
    }
}

fn compact_row(record: &PhotoRecord) -> OutputRow {
    vec![
        text_or_na(record.display_filename()),
        date_or_na(record.date.as_ref()),
        coordinate_or_na(record.latitude),
        coordinate_or_na(record.longitude),
    ]
}

fn extended_row(record: &PhotoRecord) -> OutputRow {
    let score = &record.score;
    let mut row = vec![
        text_or_na(record.uuid.as_deref()),
        text_or_na(record.filename.as_deref()),
        text_or_na(record.original_filename.as_deref()),
        path_or_na(record.path.as_deref()),
        path_or_na(record.path_edited.as_deref()),
        number_or_zero(record.original_filesize),
        text_or_na(record.uti.as_deref()),
        text_or_na(record.media_type.map(|m| m.as_str())),
        date_or_na(record.date.as_ref()),
        date_or_na(record.date_added.as_ref()),
        date_or_na(record.date_modified.as_ref()),
        date_or_na(record.date_trashed.as_ref()),
        number_or_zero(record.tz_offset),
        coordinate_or_na(record.latitude),
        coordinate_or_na(record.longitude),
        text_or_na(record.place.name.as_deref()),
        text_or_na(record.place.address.as_deref()),
        text_or_na(record.place.country_code.as_deref()),
        text_or_empty(record.title.as_deref()),
        text_or_empty(record.description.as_deref()),
        joined(&record.keywords),
        joined(&record.persons),
        joined(&record.albums),
        flag(record.favorite),
        flag(record.hidden),
        flag(record.shared),
        flag(record.burst),
        flag(record.burst_selected),
        flag(record.live),
        flag(record.portrait),
        flag(record.hdr),
        flag(record.has_adjustments),
        score_or_zero(score.overall),
        score_or_zero(score.curation),
        score_or_zero(score.promotion),
        score_or_zero(score.highlight),
        score_or_zero(score.aesthetic),
        score_or_zero(score.content),
        text_or_na(record.moment.as_deref()),
        number_or_zero(record.original_width),
        number_or_zero(record.original_height),
        number_or_zero(record.width),
        number_or_zero(record.height),
        number_or_zero(record.orientation),
        flag(record.is_cloud),
        flag(record.in_cloud),
        text_or_na(record.cloud_status.as_deref()),
        flag(record.external_edit),
        text_or_na(record.project.as_deref()),
        text_or_na(record.metadata_version.as_deref()),
    ];

    row.extend(
        EXIF_COLUMNS
            .iter()
            .map(|(_, key)| text_or_na(record.exif.get(*key).map(String::as_str))),
    );
    row
}

/// Format a date in its stored offset, without converting to another zone.
pub fn format_date(date: &OffsetDateTime) -> Option<String> {
    date.format(OUTPUT_DATE_FORMAT).ok()
}

fn date_or_na(date: Option<&OffsetDateTime>) -> String {
    date.and_then(format_date)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn text_or_na(value: Option<&str>) -> String {
    value.unwrap_or(NOT_AVAILABLE).to_string()
}

fn text_or_empty(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn path_or_na(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn number_or_zero<T: Display + Default>(value: Option<T>) -> String {
    value.unwrap_or_default().to_string()
}

fn coordinate_or_na(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Scores keep a decimal point even when whole, so `0` prints as `0.0`.
fn score_or_zero(value: Option<f64>) -> String {
    let v = value.unwrap_or(0.0);
    if v.is_finite() && v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

fn flag(value: Option<bool>) -> String {
    value.unwrap_or(false).to_string()
}

fn joined(values: &[String]) -> String {
    values.join(";")
}
