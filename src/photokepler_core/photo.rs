use std::collections::BTreeMap;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Kind of asset stored in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Photo,
    Video,
}

impl MediaType {
    /// Map the catalogue's `ZKIND` value.
    pub fn from_kind(kind: i64) -> Option<Self> {
        match kind {
            0 => Some(MediaType::Photo),
            1 => Some(MediaType::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Photo => "photo",
            MediaType::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reverse-geocoded place information.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceInfo {
    pub name: Option<String>,
    pub address: Option<String>,
    pub country_code: Option<String>,
}

/// Quality scores computed by the library's media analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreInfo {
    pub overall: Option<f64>,
    pub curation: Option<f64>,
    pub promotion: Option<f64>,
    pub highlight: Option<f64>,
    pub aesthetic: Option<f64>,
    pub content: Option<f64>,
}

/// One photo's metadata as read from the library.
///
/// Which attributes are populated depends on the library's schema version,
/// so everything except the multi-value collections is optional.
#[derive(Debug, Clone, Default)]
pub struct PhotoRecord {
    pub uuid: Option<String>,
    pub filename: Option<String>,
    pub original_filename: Option<String>,
    pub path: Option<PathBuf>,
    pub path_edited: Option<PathBuf>,
    pub original_filesize: Option<u64>,
    pub uti: Option<String>,
    pub media_type: Option<MediaType>,

    pub date: Option<OffsetDateTime>,
    pub date_added: Option<OffsetDateTime>,
    pub date_modified: Option<OffsetDateTime>,
    pub date_trashed: Option<OffsetDateTime>,
    /// Offset from UTC in seconds.
    pub tz_offset: Option<i32>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place: PlaceInfo,

    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub persons: Vec<String>,
    pub albums: Vec<String>,

    pub favorite: Option<bool>,
    pub hidden: Option<bool>,
    pub shared: Option<bool>,
    pub burst: Option<bool>,
    pub burst_selected: Option<bool>,
    pub live: Option<bool>,
    pub portrait: Option<bool>,
    pub hdr: Option<bool>,
    pub has_adjustments: Option<bool>,

    pub score: ScoreInfo,
    pub moment: Option<String>,

    pub original_width: Option<i64>,
    pub original_height: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub orientation: Option<i64>,

    pub is_cloud: Option<bool>,
    pub in_cloud: Option<bool>,
    pub cloud_status: Option<String>,
    pub external_edit: Option<bool>,
    pub project: Option<String>,
    pub metadata_version: Option<String>,

    /// Embedded metadata keyed by group-qualified tag name, e.g. `EXIF:Make`.
    pub exif: BTreeMap<String, String>,
}

impl PhotoRecord {
    /// The name the user knows the photo by.
    pub fn display_filename(&self) -> Option<&str> {
        self.original_filename
            .as_deref()
            .or(self.filename.as_deref())
    }

    pub fn location(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}
