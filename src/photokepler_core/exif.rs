use crate::photokepler_core::error::{ExportError, Result};
use exiftool::ExifTool;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Embedded tags read from an original file with `exiftool -G`.
///
/// Values vary between strings, numbers and lists depending on the file, so
/// they are kept as raw JSON values until rendered.
#[derive(Deserialize, Debug, Default)]
struct RawEmbeddedInfo {
    #[serde(rename = "EXIF:Make", default)]
    make: Option<Value>,
    #[serde(rename = "EXIF:Model", default)]
    model: Option<Value>,
    #[serde(rename = "EXIF:LensModel", default)]
    lens_model: Option<Value>,
    #[serde(rename = "EXIF:FocalLength", default)]
    focal_length: Option<Value>, // "4.2 mm" or 4.2
    #[serde(rename = "EXIF:FNumber", default)]
    f_number: Option<Value>,
    #[serde(rename = "EXIF:ExposureTime", default)]
    exposure_time: Option<Value>, // "1/250" or 0.004
    #[serde(rename = "EXIF:ISO", default)]
    iso: Option<Value>,
    #[serde(rename = "EXIF:Orientation", default)]
    orientation: Option<Value>,
    #[serde(rename = "IPTC:Keywords", default)]
    keywords: Option<Value>, // string or list
    #[serde(rename = "IPTC:Caption-Abstract", default)]
    caption: Option<Value>,
    #[serde(rename = "XMP:TagsList", default)]
    tags_list: Option<Value>,
    #[serde(rename = "XMP:Subject", default)]
    subject: Option<Value>,
}

impl RawEmbeddedInfo {
    fn into_map(self) -> BTreeMap<String, String> {
        let exposure = self.exposure_time.as_ref().and_then(exposure_to_string);
        let fields = [
            ("EXIF:Make", self.make.as_ref().and_then(value_to_string)),
            ("EXIF:Model", self.model.as_ref().and_then(value_to_string)),
            ("EXIF:LensModel", self.lens_model.as_ref().and_then(value_to_string)),
            ("EXIF:FocalLength", self.focal_length.as_ref().and_then(value_to_string)),
            ("EXIF:FNumber", self.f_number.as_ref().and_then(value_to_string)),
            ("EXIF:ExposureTime", exposure),
            ("EXIF:ISO", self.iso.as_ref().and_then(value_to_string)),
            ("EXIF:Orientation", self.orientation.as_ref().and_then(value_to_string)),
            ("IPTC:Keywords", self.keywords.as_ref().and_then(value_to_string)),
            ("IPTC:Caption-Abstract", self.caption.as_ref().and_then(value_to_string)),
            ("XMP:TagsList", self.tags_list.as_ref().and_then(value_to_string)),
            ("XMP:Subject", self.subject.as_ref().and_then(value_to_string)),
        ];

        fields
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect()
    }
}

/// Helper to render a tag value for a CSV cell; lists are joined with `;`.
pub fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_to_string).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(";"))
            }
        }
        _ => None,
    }
}

/// Exposure times below one second read better as a fraction.
pub fn exposure_to_string(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => n.as_f64().map(format_exposure),
        other => value_to_string(other),
    }
}

pub fn format_exposure(seconds: f64) -> String {
    if seconds > 0.0 && seconds < 1.0 {
        let denom = (1.0 / seconds).round() as i64;
        format!("1/{}", denom)
    } else {
        format!("{}", seconds)
    }
}

/// Reads embedded metadata from original files through a persistent exiftool process.
pub struct EmbeddedMetadataReader {
    exiftool: ExifTool,
}

impl EmbeddedMetadataReader {
    pub fn new() -> Result<Self> {
        let exiftool = ExifTool::new().map_err(|e| ExportError::Exiftool(e.to_string()))?;
        Ok(EmbeddedMetadataReader { exiftool })
    }

    /// Read the embedded tags exported in the EXIF columns.
    pub fn read(&mut self, path: &Path) -> Result<BTreeMap<String, String>> {
        let raw: RawEmbeddedInfo = self
            .exiftool
            .read_metadata(path, &["-G"])
            .map_err(|e| ExportError::Exiftool(format!("{}: {}", path.display(), e)))?;
        Ok(raw.into_map())
    }
}

/// Check if exiftool is available on the system.
pub fn exiftool_available() -> bool {
    std::process::Command::new("exiftool")
        .arg("-ver")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
