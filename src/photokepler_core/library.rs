use crate::photokepler_core::database::{Database, Schema};
use crate::photokepler_core::error::{ExportError, Result};
use crate::photokepler_core::exif::{EmbeddedMetadataReader, exiftool_available, format_exposure};
use crate::photokepler_core::export::progress_style;
use crate::photokepler_core::photo::{MediaType, PhotoRecord, PlaceInfo, ScoreInfo};
use indicatif::ProgressBar;
use rusqlite::OptionalExtension;
use rusqlite::types::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime, UtcOffset};

/// Location of the catalogue inside a `.photoslibrary` bundle.
pub const DB_RELATIVE_PATH: &str = "database/Photos.sqlite";

/// Core Data timestamps count seconds from 2001-01-01T00:00:00Z.
const CORE_DATA_EPOCH: i64 = 978_307_200;

/// Latitude and longitude both set to this mean "no location".
const NO_LOCATION: f64 = -180.0;

const ALBUM_KIND: i64 = 2;
const PROJECT_KIND: i64 = 1508;
const LIVE_PHOTO_SUBTYPE: i64 = 2;
const BURST_SELECTED_MASK: i64 = 8 | 16;
const APPLE_ADJUSTMENT_FORMAT: &str = "com.apple.photo";

/// Candidate asset tables, newest layout first.
const ASSET_TABLES: [&str; 2] = ["ZASSET", "ZGENERICASSET"];

/// Columns read for every asset, as (table alias, column).
const COLUMNS: &[(&str, &str)] = &[
    ("a", "Z_PK"),
    ("a", "ZUUID"),
    ("a", "ZFILENAME"),
    ("a", "ZDIRECTORY"),
    ("a", "ZDATECREATED"),
    ("a", "ZADDEDDATE"),
    ("a", "ZMODIFICATIONDATE"),
    ("a", "ZTRASHEDDATE"),
    ("a", "ZLATITUDE"),
    ("a", "ZLONGITUDE"),
    ("a", "ZFAVORITE"),
    ("a", "ZHIDDEN"),
    ("a", "ZKIND"),
    ("a", "ZKINDSUBTYPE"),
    ("a", "ZDEPTHTYPE"),
    ("a", "ZHDRTYPE"),
    ("a", "ZAVALANCHEUUID"),
    ("a", "ZAVALANCHEPICKTYPE"),
    ("a", "ZHASADJUSTMENTS"),
    ("a", "ZWIDTH"),
    ("a", "ZHEIGHT"),
    ("a", "ZORIENTATION"),
    ("a", "ZUNIFORMTYPEIDENTIFIER"),
    ("a", "ZCLOUDASSETGUID"),
    ("a", "ZCLOUDLOCALSTATE"),
    ("a", "ZCLOUDBATCHPUBLISHDATE"),
    ("a", "ZOVERALLAESTHETICSCORE"),
    ("a", "ZCURATIONSCORE"),
    ("a", "ZPROMOTIONSCORE"),
    ("a", "ZHIGHLIGHTVISIBILITYSCORE"),
    ("aa", "Z_PK"),
    ("aa", "ZORIGINALFILENAME"),
    ("aa", "ZTITLE"),
    ("aa", "ZTIMEZONEOFFSET"),
    ("aa", "ZORIGINALWIDTH"),
    ("aa", "ZORIGINALHEIGHT"),
    ("aa", "ZORIGINALFILESIZE"),
    ("d", "ZLONGDESCRIPTION"),
    ("m", "ZUUID"),
    ("m", "ZTITLE"),
    ("m", "ZSUBTITLE"),
    ("c", "ZPLEASANTCOMPOSITIONSCORE"),
    ("c", "ZINTERESTINGSUBJECTSCORE"),
    ("x", "ZCAMERAMAKE"),
    ("x", "ZCAMERAMODEL"),
    ("x", "ZLENSMODEL"),
    ("x", "ZFOCALLENGTH"),
    ("x", "ZAPERTURE"),
    ("x", "ZSHUTTERSPEED"),
    ("x", "ZISO"),
    ("u", "ZADJUSTMENTFORMATIDENTIFIER"),
];

/// Anything that can hand over the full set of photo records.
pub trait PhotoSource {
    fn photos(&mut self) -> Result<Vec<PhotoRecord>>;
}

#[derive(Debug, Clone, Default)]
pub struct LibraryOptions {
    /// Also return assets that are in the library's trash.
    pub include_trashed: bool,
    /// Run exiftool over each original to fill the embedded metadata map.
    pub read_embedded_metadata: bool,
}

/// A Photos library opened read-only.
pub struct PhotosLibrary {
    path: PathBuf,
    root: Option<PathBuf>,
    db: Database,
    options: LibraryOptions,
}

impl PhotosLibrary {
    /// Open a `.photoslibrary` bundle, or a `Photos.sqlite` file directly.
    pub fn open(path: &Path, options: LibraryOptions) -> Result<Self> {
        if !path.exists() {
            return Err(ExportError::library_access(path, "path does not exist"));
        }

        let (db_path, root) = if path.is_dir() {
            (path.join(DB_RELATIVE_PATH), Some(path.to_path_buf()))
        } else {
            (path.to_path_buf(), bundle_root(path))
        };

        if !db_path.is_file() {
            return Err(ExportError::library_access(
                path,
                format!("missing database at {}", db_path.display()),
            ));
        }

        log::info!("Opening catalogue {}", db_path.display());
        let db = Database::open_read_only(&db_path)
            .map_err(|e| ExportError::library_access(path, e))?;

        Ok(PhotosLibrary {
            path: path.to_path_buf(),
            root,
            db,
            options,
        })
    }

    fn read_records(&self) -> Result<Vec<PhotoRecord>> {
        let schema = self.db.schema()?;
        let asset_table = ASSET_TABLES
            .into_iter()
            .find(|table| schema.has_table(table))
            .ok_or_else(|| {
                ExportError::library_access(&self.path, "no asset table; not a Photos 5 or later library")
            })?;
        log::debug!("Using asset table {}", asset_table);

        let mut query = AssetQuery::new(&schema, asset_table);
        query.join("ZADDITIONALASSETATTRIBUTES", "aa", "ZASSET", "a", "Z_PK");
        query.join("ZASSETDESCRIPTION", "d", "Z_PK", "aa", "ZASSETDESCRIPTION");
        query.join("ZMOMENT", "m", "Z_PK", "a", "ZMOMENT");
        query.join("ZCOMPUTEDASSETATTRIBUTES", "c", "ZASSET", "a", "Z_PK");
        query.join("ZEXTENDEDATTRIBUTES", "x", "ZASSET", "a", "Z_PK");
        query.join("ZUNMANAGEDADJUSTMENT", "u", "Z_PK", "aa", "ZUNMANAGEDADJUSTMENT");

        let sql = query.sql(self.options.include_trashed);
        log::debug!("Asset query: {}", sql);

        let lookups = Lookups {
            keywords: self.read_keywords(&schema)?,
            persons: self.read_persons(&schema)?,
            albums: self.read_albums(&schema, ALBUM_KIND)?,
            projects: self.read_albums(&schema, PROJECT_KIND)?,
            metadata_version: self.read_metadata_version(&schema)?,
        };

        let index = column_index();
        let mut stmt = self.db.connection().prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            (0..COLUMNS.len())
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map(|values| AssetRow {
                    values,
                    index: &index,
                })
        })?;

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for row in rows {
            let row = row?;
            if let Some(pk) = row.int("a", "Z_PK") {
                // A left join with a duplicated child row must not duplicate the asset
                if !seen.insert(pk) {
                    continue;
                }
            }
            records.push(self.to_record(&row, &lookups));
        }

        log::info!("Read {} assets from {}", records.len(), self.path.display());
        Ok(records)
    }

    fn to_record(&self, row: &AssetRow, lookups: &Lookups) -> PhotoRecord {
        let asset_pk = row.int("a", "Z_PK");
        let attributes_pk = row.int("aa", "Z_PK");

        let tz_offset = row
            .int("aa", "ZTIMEZONEOFFSET")
            .and_then(|s| i32::try_from(s).ok());
        let offset = tz_offset
            .and_then(|s| UtcOffset::from_whole_seconds(s).ok())
            .unwrap_or(UtcOffset::UTC);
        let date_at = |column: &'static str| row.real("a", column).and_then(|s| core_data_date(s, offset));

        let (latitude, longitude) = match (row.real("a", "ZLATITUDE"), row.real("a", "ZLONGITUDE")) {
            (Some(lat), Some(lon)) if lat == NO_LOCATION && lon == NO_LOCATION => (None, None),
            pair => pair,
        };

        let uuid = row.text("a", "ZUUID");
        let filename = row.text("a", "ZFILENAME");
        let directory = row.text("a", "ZDIRECTORY");
        let media_type = row.int("a", "ZKIND").and_then(MediaType::from_kind);
        let has_adjustments = row.flag("a", "ZHASADJUSTMENTS");

        let path = match (&self.root, &directory, &filename) {
            (Some(root), Some(dir), Some(name)) => {
                Some(root.join("originals").join(dir).join(name)).filter(|p| p.exists())
            }
            _ => None,
        };
        let path_edited = match (&self.root, &directory, &uuid, has_adjustments) {
            (Some(root), Some(dir), Some(uuid), Some(true)) => {
                let render = match media_type {
                    Some(MediaType::Video) => format!("{}_2_0_a.mov", uuid),
                    _ => format!("{}_1_201_a.jpeg", uuid),
                };
                Some(root.join("resources").join("renders").join(dir).join(render))
                    .filter(|p| p.exists())
            }
            _ => None,
        };

        let is_cloud = row.text("a", "ZCLOUDASSETGUID").map(|_| true);
        let in_cloud = row.int("a", "ZCLOUDLOCALSTATE").map(|state| state == 1);
        let cloud_status = is_cloud.map(|_| match in_cloud {
            Some(true) => "synced".to_string(),
            _ => "not synced".to_string(),
        });

        let mut exif = BTreeMap::new();
        let camera = [
            ("EXIF:Make", row.text("x", "ZCAMERAMAKE")),
            ("EXIF:Model", row.text("x", "ZCAMERAMODEL")),
            ("EXIF:LensModel", row.text("x", "ZLENSMODEL")),
            ("EXIF:FocalLength", row.real("x", "ZFOCALLENGTH").map(|v| v.to_string())),
            ("EXIF:FNumber", row.real("x", "ZAPERTURE").map(|v| v.to_string())),
            ("EXIF:ExposureTime", row.real("x", "ZSHUTTERSPEED").map(format_exposure)),
            ("EXIF:ISO", row.int("x", "ZISO").map(|v| v.to_string())),
        ];
        for (key, value) in camera {
            if let Some(value) = value {
                exif.insert(key.to_string(), value);
            }
        }

        let collected = |map: &HashMap<i64, Vec<String>>, pk: Option<i64>| {
            pk.and_then(|pk| map.get(&pk).cloned()).unwrap_or_default()
        };
        let projects = collected(&lookups.projects, asset_pk);

        PhotoRecord {
            original_filename: row.text("aa", "ZORIGINALFILENAME"),
            path,
            path_edited,
            original_filesize: row
                .int("aa", "ZORIGINALFILESIZE")
                .and_then(|size| u64::try_from(size).ok()),
            uti: row.text("a", "ZUNIFORMTYPEIDENTIFIER"),
            media_type,

            date: date_at("ZDATECREATED"),
            date_added: date_at("ZADDEDDATE"),
            date_modified: date_at("ZMODIFICATIONDATE"),
            date_trashed: date_at("ZTRASHEDDATE"),
            tz_offset,

            latitude,
            longitude,
            place: PlaceInfo {
                name: row.text("m", "ZTITLE"),
                address: row.text("m", "ZSUBTITLE"),
                country_code: None,
            },

            title: row.text("aa", "ZTITLE"),
            description: row.text("d", "ZLONGDESCRIPTION"),
            keywords: collected(&lookups.keywords, attributes_pk),
            persons: collected(&lookups.persons, asset_pk),
            albums: collected(&lookups.albums, asset_pk),

            favorite: row.flag("a", "ZFAVORITE"),
            hidden: row.flag("a", "ZHIDDEN"),
            shared: row.real("a", "ZCLOUDBATCHPUBLISHDATE").map(|_| true),
            burst: row.text("a", "ZAVALANCHEUUID").map(|_| true),
            burst_selected: row
                .int("a", "ZAVALANCHEPICKTYPE")
                .map(|pick| pick & BURST_SELECTED_MASK != 0),
            live: row
                .int("a", "ZKINDSUBTYPE")
                .map(|subtype| subtype == LIVE_PHOTO_SUBTYPE),
            portrait: row.flag("a", "ZDEPTHTYPE"),
            hdr: row.flag("a", "ZHDRTYPE"),
            has_adjustments,

            score: ScoreInfo {
                overall: row.real("a", "ZOVERALLAESTHETICSCORE"),
                curation: row.real("a", "ZCURATIONSCORE"),
                promotion: row.real("a", "ZPROMOTIONSCORE"),
                highlight: row.real("a", "ZHIGHLIGHTVISIBILITYSCORE"),
                aesthetic: row.real("c", "ZPLEASANTCOMPOSITIONSCORE"),
                content: row.real("c", "ZINTERESTINGSUBJECTSCORE"),
            },
            moment: row.text("m", "ZUUID"),

            original_width: row.int("aa", "ZORIGINALWIDTH"),
            original_height: row.int("aa", "ZORIGINALHEIGHT"),
            width: row.int("a", "ZWIDTH"),
            height: row.int("a", "ZHEIGHT"),
            orientation: row.int("a", "ZORIENTATION"),

            is_cloud,
            in_cloud,
            cloud_status,
            external_edit: row
                .text("u", "ZADJUSTMENTFORMATIDENTIFIER")
                .map(|format| format != APPLE_ADJUSTMENT_FORMAT),
            project: (!projects.is_empty()).then(|| projects.join(";")),
            metadata_version: lookups.metadata_version.clone(),

            exif,
            uuid,
            filename,
        }
    }

    /// Keyword titles keyed by the additional-attributes row.
    fn read_keywords(&self, schema: &Schema) -> Result<HashMap<i64, Vec<String>>> {
        if !schema.has_column("ZKEYWORD", "ZTITLE") {
            return Ok(HashMap::new());
        }
        let Some((table, attributes, keyword)) =
            schema.find_join_table("KEYWORDS", "ASSETATTRIBUTES", "KEYWORDS")
        else {
            log::debug!("No keyword join table");
            return Ok(HashMap::new());
        };

        let sql = format!(
            "SELECT j.{attributes}, k.ZTITLE FROM {table} j
             JOIN ZKEYWORD k ON k.Z_PK = j.{keyword}
             WHERE k.ZTITLE IS NOT NULL AND k.ZTITLE != ''
             ORDER BY j.{attributes}, k.ZTITLE"
        );
        self.group_names(&sql, [])
    }

    /// Named people keyed by asset.
    fn read_persons(&self, schema: &Schema) -> Result<HashMap<i64, Vec<String>>> {
        let asset = schema.first_column("ZDETECTEDFACE", &["ZASSETFORFACE", "ZASSET"]);
        let person = schema.first_column("ZDETECTEDFACE", &["ZPERSONFORFACE", "ZPERSON"]);
        let (Some(asset), Some(person)) = (asset, person) else {
            return Ok(HashMap::new());
        };
        if !schema.has_column("ZPERSON", "ZFULLNAME") {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT f.{asset}, p.ZFULLNAME FROM ZDETECTEDFACE f
             JOIN ZPERSON p ON p.Z_PK = f.{person}
             WHERE p.ZFULLNAME IS NOT NULL AND p.ZFULLNAME != ''
             ORDER BY f.{asset}, p.ZFULLNAME"
        );
        self.group_names(&sql, [])
    }

    /// Titles of albums of the given kind, keyed by asset.
    fn read_albums(&self, schema: &Schema, kind: i64) -> Result<HashMap<i64, Vec<String>>> {
        if !schema.has_column("ZGENERICALBUM", "ZTITLE") || !schema.has_column("ZGENERICALBUM", "ZKIND") {
            return Ok(HashMap::new());
        }
        let Some((table, album, asset)) = schema.find_join_table("ASSETS", "ALBUMS", "ASSETS") else {
            log::debug!("No album join table");
            return Ok(HashMap::new());
        };

        let not_trashed = if schema.has_column("ZGENERICALBUM", "ZTRASHEDSTATE") {
            "AND COALESCE(g.ZTRASHEDSTATE, 0) = 0"
        } else {
            ""
        };
        let sql = format!(
            "SELECT j.{asset}, g.ZTITLE FROM {table} j
             JOIN ZGENERICALBUM g ON g.Z_PK = j.{album}
             WHERE g.ZKIND = ?1 AND g.ZTITLE IS NOT NULL {not_trashed}
             ORDER BY j.{asset}, g.ZTITLE"
        );
        self.group_names(&sql, [kind])
    }

    fn read_metadata_version(&self, schema: &Schema) -> Result<Option<String>> {
        if !schema.has_column("Z_METADATA", "Z_VERSION") {
            return Ok(None);
        }
        let version = self
            .db
            .connection()
            .query_row("SELECT Z_VERSION FROM Z_METADATA LIMIT 1", [], |row| {
                row.get::<_, Value>(0)
            })
            .optional()?;
        Ok(version.as_ref().and_then(|v| value_text(v, "Z_VERSION")))
    }

    fn group_names<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<HashMap<i64, Vec<String>>> {
        let mut stmt = self.db.connection().prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut grouped: HashMap<i64, Vec<String>> = HashMap::new();
        for row in rows {
            let (Some(pk), name) = row? else {
                continue;
            };
            let names = grouped.entry(pk).or_default();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(grouped)
    }

    fn read_embedded(&self, records: &mut [PhotoRecord]) -> Result<()> {
        if !exiftool_available() {
            return Err(ExportError::Exiftool("exiftool was not found on PATH".to_string()));
        }
        let mut reader = EmbeddedMetadataReader::new()?;

        let with_files = records.iter().filter(|r| r.path.is_some()).count();
        log::info!("Reading embedded metadata from {} originals", with_files);

        let bar = ProgressBar::new(with_files as u64).with_style(progress_style());
        bar.set_message("Reading embedded metadata");

        for record in records.iter_mut() {
            let Some(path) = record.path.as_deref() else {
                continue;
            };
            match reader.read(path) {
                Ok(tags) => record.exif.extend(tags),
                Err(e) => log::warn!("{}", e),
            }
            bar.inc(1);
        }

        bar.finish_with_message("Embedded metadata read");
        Ok(())
    }
}

impl PhotoSource for PhotosLibrary {
    fn photos(&mut self) -> Result<Vec<PhotoRecord>> {
        let mut records = self.read_records().map_err(|e| match e {
            ExportError::LibraryAccess { .. } => e,
            other => ExportError::library_access(&self.path, other),
        })?;

        if self.options.read_embedded_metadata {
            self.read_embedded(&mut records)?;
        }
        Ok(records)
    }
}

/// `<bundle>` for a catalogue at `<bundle>/database/Photos.sqlite`.
fn bundle_root(db_path: &Path) -> Option<PathBuf> {
    db_path
        .parent()
        .filter(|dir| dir.file_name().is_some_and(|name| name == "database"))
        .and_then(Path::parent)
        .map(Path::to_path_buf)
}

/// Convert a Core Data timestamp into a date-time at `offset`.
fn core_data_date(seconds: f64, offset: UtcOffset) -> Option<OffsetDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as i64;
    let unix = (whole as i64).checked_add(CORE_DATA_EPOCH)?;

    OffsetDateTime::from_unix_timestamp(unix)
        .ok()?
        .checked_add(Duration::nanoseconds(nanos))?
        .checked_to_offset(offset)
}

/// Log a recovered per-attribute problem and fall back to "absent".
fn recovered<T>(err: ExportError) -> Option<T> {
    log::debug!("{}", err);
    None
}

fn value_text(value: &Value, column: &'static str) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) if s.is_empty() => None,
        Value::Text(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Blob(_) => recovered(ExportError::AttributeAccess {
            attribute: column,
            reason: "binary value where text was expected".to_string(),
        }),
    }
}

/// Builds the asset SELECT from whichever tables and columns exist.
struct AssetQuery<'a> {
    schema: &'a Schema,
    asset_table: &'a str,
    tables: Vec<(&'static str, &'static str)>,
    joins: Vec<String>,
}

impl<'a> AssetQuery<'a> {
    fn new(schema: &'a Schema, asset_table: &'a str) -> Self {
        AssetQuery {
            schema,
            asset_table,
            tables: Vec::new(),
            joins: Vec::new(),
        }
    }

    fn table_of(&self, alias: &str) -> Option<&str> {
        if alias == "a" {
            return Some(self.asset_table);
        }
        self.tables
            .iter()
            .find(|(a, _)| *a == alias)
            .map(|(_, table)| *table)
    }

    /// LEFT JOIN `table` when both sides of the join condition exist.
    fn join(
        &mut self,
        table: &'static str,
        alias: &'static str,
        column: &str,
        parent: &str,
        parent_column: &str,
    ) {
        let joinable = self
            .table_of(parent)
            .is_some_and(|parent_table| self.schema.has_column(parent_table, parent_column))
            && self.schema.has_column(table, column);
        if !joinable {
            log::debug!("Skipping join of {}", table);
            return;
        }

        self.joins.push(format!(
            "LEFT JOIN {table} {alias} ON {alias}.{column} = {parent}.{parent_column}"
        ));
        self.tables.push((alias, table));
    }

    fn column(&self, alias: &str, column: &str) -> String {
        match self.table_of(alias) {
            Some(table) if self.schema.has_column(table, column) => format!("{alias}.{column}"),
            _ => "NULL".to_string(),
        }
    }

    fn sql(&self, include_trashed: bool) -> String {
        let columns: Vec<String> = COLUMNS
            .iter()
            .map(|(alias, column)| self.column(alias, column))
            .collect();

        let mut sql = format!(
            "SELECT {} FROM {} a {}",
            columns.join(", "),
            self.asset_table,
            self.joins.join(" ")
        );
        if !include_trashed && self.schema.has_column(self.asset_table, "ZTRASHEDSTATE") {
            sql.push_str(" WHERE COALESCE(a.ZTRASHEDSTATE, 0) = 0");
        }
        if self.schema.has_column(self.asset_table, "Z_PK") {
            sql.push_str(" ORDER BY a.Z_PK");
        }
        sql
    }
}

/// Multi-valued attributes and library-wide values resolved before the asset scan.
struct Lookups {
    keywords: HashMap<i64, Vec<String>>,
    persons: HashMap<i64, Vec<String>>,
    albums: HashMap<i64, Vec<String>>,
    projects: HashMap<i64, Vec<String>>,
    metadata_version: Option<String>,
}

static NULL_VALUE: Value = Value::Null;

/// Position of each (alias, column) pair in the asset query's select list.
type ColumnIndex = HashMap<(&'static str, &'static str), usize>;

fn column_index() -> ColumnIndex {
    COLUMNS
        .iter()
        .enumerate()
        .map(|(i, &(alias, column))| ((alias, column), i))
        .collect()
}

/// One result row of the asset query, in `COLUMNS` order.
struct AssetRow<'a> {
    values: Vec<Value>,
    index: &'a ColumnIndex,
}

impl AssetRow<'_> {
    fn value(&self, alias: &'static str, column: &'static str) -> &Value {
        self.index
            .get(&(alias, column))
            .and_then(|&i| self.values.get(i))
            .unwrap_or(&NULL_VALUE)
    }

    fn text(&self, alias: &'static str, column: &'static str) -> Option<String> {
        value_text(self.value(alias, column), column)
    }

    fn real(&self, alias: &'static str, column: &'static str) -> Option<f64> {
        match self.value(alias, column) {
            Value::Null => None,
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) if f.is_finite() => Some(*f),
            Value::Real(f) => recovered(ExportError::AttributeAccess {
                attribute: column,
                reason: format!("{} is not a finite number", f),
            }),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .or_else(|| {
                    recovered(ExportError::AttributeAccess {
                        attribute: column,
                        reason: format!("'{}' is not a finite number", s),
                    })
                }),
            Value::Blob(_) => recovered(ExportError::AttributeAccess {
                attribute: column,
                reason: "binary value where a number was expected".to_string(),
            }),
        }
    }

    fn int(&self, alias: &'static str, column: &'static str) -> Option<i64> {
        match self.value(alias, column) {
            Value::Integer(i) => Some(*i),
            Value::Real(f) if f.is_finite() => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok().or_else(|| {
                recovered(ExportError::AttributeAccess {
                    attribute: column,
                    reason: format!("'{}' is not an integer", s),
                })
            }),
            _ => None,
        }
    }

    fn flag(&self, alias: &'static str, column: &'static str) -> Option<bool> {
        self.int(alias, column).map(|v| v != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use rusqlite::{Connection, params};

    /// Seconds from the Core Data epoch to 2021-01-01T00:00:00Z.
    const JAN_1_2021: f64 = 631_152_000.0;

    fn create_catalogue(dir: &Path) -> PathBuf {
        let bundle = dir.join("Test.photoslibrary");
        std::fs::create_dir_all(bundle.join("database")).unwrap();
        let conn = Connection::open(bundle.join(DB_RELATIVE_PATH)).unwrap();
        conn.execute_batch(
            "CREATE TABLE ZASSET (
                Z_PK INTEGER PRIMARY KEY, ZUUID TEXT, ZFILENAME TEXT, ZDIRECTORY TEXT,
                ZDATECREATED TIMESTAMP, ZADDEDDATE TIMESTAMP, ZTRASHEDSTATE INTEGER,
                ZLATITUDE FLOAT, ZLONGITUDE FLOAT, ZFAVORITE INTEGER, ZKIND INTEGER,
                ZKINDSUBTYPE INTEGER, ZAVALANCHEPICKTYPE INTEGER, ZCURATIONSCORE FLOAT);
             CREATE TABLE ZADDITIONALASSETATTRIBUTES (
                Z_PK INTEGER PRIMARY KEY, ZASSET INTEGER, ZORIGINALFILENAME TEXT,
                ZTITLE TEXT, ZTIMEZONEOFFSET INTEGER, ZASSETDESCRIPTION INTEGER);
             CREATE TABLE ZASSETDESCRIPTION (Z_PK INTEGER PRIMARY KEY, ZLONGDESCRIPTION TEXT);
             CREATE TABLE ZKEYWORD (Z_PK INTEGER PRIMARY KEY, ZTITLE TEXT);
             CREATE TABLE Z_1KEYWORDS (Z_1ASSETATTRIBUTES INTEGER, Z_52KEYWORDS INTEGER);
             CREATE TABLE ZGENERICALBUM (Z_PK INTEGER PRIMARY KEY, ZTITLE TEXT, ZKIND INTEGER);
             CREATE TABLE Z_28ASSETS (Z_28ALBUMS INTEGER, Z_3ASSETS INTEGER);
             CREATE TABLE ZPERSON (Z_PK INTEGER PRIMARY KEY, ZFULLNAME TEXT);
             CREATE TABLE ZDETECTEDFACE (Z_PK INTEGER PRIMARY KEY, ZASSETFORFACE INTEGER, ZPERSONFORFACE INTEGER);
             CREATE TABLE Z_METADATA (Z_VERSION INTEGER, Z_UUID TEXT);
             CREATE TABLE ZMOMENT (Z_PK INTEGER PRIMARY KEY, ZUUID TEXT, ZTITLE TEXT, ZSUBTITLE TEXT);
             CREATE TABLE ZCOMPUTEDASSETATTRIBUTES (
                Z_PK INTEGER PRIMARY KEY, ZASSET INTEGER,
                ZPLEASANTCOMPOSITIONSCORE FLOAT, ZINTERESTINGSUBJECTSCORE FLOAT);
             CREATE TABLE ZEXTENDEDATTRIBUTES (
                Z_PK INTEGER PRIMARY KEY, ZASSET INTEGER, ZCAMERAMAKE TEXT, ZCAMERAMODEL TEXT,
                ZLENSMODEL TEXT, ZFOCALLENGTH FLOAT, ZAPERTURE FLOAT, ZSHUTTERSPEED FLOAT, ZISO INTEGER);
             CREATE TABLE ZUNMANAGEDADJUSTMENT (Z_PK INTEGER PRIMARY KEY, ZADJUSTMENTFORMATIDENTIFIER TEXT);
             INSERT INTO Z_METADATA VALUES (1, 'lib');",
        )
        .unwrap();

        conn.execute(
            "INSERT INTO ZASSET VALUES (1, 'UUID-1', 'UUID-1.jpeg', 'U', ?1, ?1, 0, 35.0, 139.5, 1, 0, 2, 8, 0.5)",
            params![JAN_1_2021 + 3600.0],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO ZASSET VALUES (2, 'UUID-2', 'UUID-2.mov', 'U', ?1, NULL, 0, -180.0, -180.0, 0, 1, 0, 0, NULL)",
            params![JAN_1_2021],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO ZASSET VALUES (3, 'UUID-3', 'UUID-3.jpeg', 'U', ?1, NULL, 1, 1.0, 1.0, 0, 0, 0, 0, NULL)",
            params![JAN_1_2021],
        )
        .unwrap();
        conn.execute_batch(
            "INSERT INTO ZASSETDESCRIPTION VALUES (1, 'Shibuya crossing');
             INSERT INTO ZADDITIONALASSETATTRIBUTES VALUES (10, 1, 'IMG_0001.HEIC', 'Tokyo', 32400, 1);
             INSERT INTO ZADDITIONALASSETATTRIBUTES VALUES (20, 2, 'IMG_0002.MOV', NULL, NULL, NULL);
             INSERT INTO ZKEYWORD VALUES (1, 'travel');
             INSERT INTO ZKEYWORD VALUES (2, 'city');
             INSERT INTO Z_1KEYWORDS VALUES (10, 1);
             INSERT INTO Z_1KEYWORDS VALUES (10, 2);
             INSERT INTO ZGENERICALBUM VALUES (1, 'Japan 2021', 2);
             INSERT INTO ZGENERICALBUM VALUES (2, 'Photo Book', 1508);
             INSERT INTO Z_28ASSETS VALUES (1, 1);
             INSERT INTO Z_28ASSETS VALUES (2, 1);
             INSERT INTO ZPERSON VALUES (1, 'Kenji');
             INSERT INTO ZPERSON VALUES (2, '');
             INSERT INTO ZDETECTEDFACE VALUES (1, 1, 1);
             INSERT INTO ZDETECTEDFACE VALUES (2, 1, 1);
             INSERT INTO ZDETECTEDFACE VALUES (3, 1, 2);
             ALTER TABLE ZASSET ADD COLUMN ZMOMENT INTEGER;
             ALTER TABLE ZASSET ADD COLUMN ZHDRTYPE INTEGER;
             ALTER TABLE ZASSET ADD COLUMN ZDEPTHTYPE INTEGER;
             ALTER TABLE ZASSET ADD COLUMN ZCLOUDASSETGUID TEXT;
             ALTER TABLE ZASSET ADD COLUMN ZCLOUDLOCALSTATE INTEGER;
             ALTER TABLE ZADDITIONALASSETATTRIBUTES ADD COLUMN ZUNMANAGEDADJUSTMENT INTEGER;
             INSERT INTO ZMOMENT VALUES (1, 'MOMENT-1', 'Shibuya', 'Tokyo, Japan');
             INSERT INTO ZCOMPUTEDASSETATTRIBUTES VALUES (1, 1, 0.5, 0.25);
             INSERT INTO ZCOMPUTEDASSETATTRIBUTES VALUES (2, 1, 0.5, 0.25);
             INSERT INTO ZEXTENDEDATTRIBUTES VALUES
                (1, 1, 'Apple', 'iPhone 12', 'iPhone 12 back camera', 4.2, 1.6, 0.008, 64);
             INSERT INTO ZUNMANAGEDADJUSTMENT VALUES (1, 'com.adobe.lightroom');
             UPDATE ZADDITIONALASSETATTRIBUTES SET ZUNMANAGEDADJUSTMENT = 1 WHERE Z_PK = 10;
             UPDATE ZASSET SET ZMOMENT = 1, ZHDRTYPE = 3, ZDEPTHTYPE = 0,
                ZCLOUDASSETGUID = 'GUID-1', ZCLOUDLOCALSTATE = 1
                WHERE Z_PK = 1;
             UPDATE ZASSET SET ZCLOUDASSETGUID = 'GUID-2', ZCLOUDLOCALSTATE = 0 WHERE Z_PK = 2;",
        )
        .unwrap();
        bundle
    }

    #[test]
    fn test_open_missing_path() {
        let err = PhotosLibrary::open(Path::new("/nonexistent/Photos.photoslibrary"), LibraryOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ExportError::LibraryAccess { .. }));
    }

    #[test]
    fn test_open_directory_without_database() {
        let temp_dir = TempDir::new().unwrap();
        let err = PhotosLibrary::open(temp_dir.path(), LibraryOptions::default())
            .err()
            .unwrap();
        assert!(err.details().contains("missing database"));
    }

    #[test]
    fn test_non_database_file_is_library_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Photos.sqlite");
        std::fs::write(&path, "this is not sqlite, just some text padding it out a little").unwrap();

        let result = PhotosLibrary::open(&path, LibraryOptions::default())
            .and_then(|mut lib| lib.photos());
        assert!(matches!(result, Err(ExportError::LibraryAccess { .. })));
    }

    #[test]
    fn test_database_without_asset_table() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Photos.sqlite");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE RKVERSION (modelId INTEGER);")
            .unwrap();

        let mut lib = PhotosLibrary::open(&path, LibraryOptions::default()).unwrap();
        let err = lib.photos().unwrap_err();
        assert!(err.details().contains("no asset table"));
    }

    #[test]
    fn test_read_records() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = create_catalogue(temp_dir.path());

        let mut lib = PhotosLibrary::open(&bundle, LibraryOptions::default()).unwrap();
        let records = lib.photos().unwrap();
        // Asset 3 is in the trash
        assert_eq!(records.len(), 2);

        let tokyo = &records[0];
        assert_eq!(tokyo.uuid.as_deref(), Some("UUID-1"));
        assert_eq!(tokyo.original_filename.as_deref(), Some("IMG_0001.HEIC"));
        assert_eq!(tokyo.title.as_deref(), Some("Tokyo"));
        assert_eq!(tokyo.description.as_deref(), Some("Shibuya crossing"));
        assert_eq!(tokyo.tz_offset, Some(32400));
        assert_eq!(tokyo.latitude, Some(35.0));
        assert_eq!(tokyo.longitude, Some(139.5));
        assert_eq!(tokyo.media_type, Some(MediaType::Photo));
        assert_eq!(tokyo.favorite, Some(true));
        assert_eq!(tokyo.live, Some(true));
        assert_eq!(tokyo.burst_selected, Some(true));
        assert_eq!(tokyo.score.curation, Some(0.5));
        assert_eq!(tokyo.score.overall, None);
        assert_eq!(tokyo.keywords, vec!["city", "travel"]);
        assert_eq!(tokyo.albums, vec!["Japan 2021"]);
        assert_eq!(tokyo.project.as_deref(), Some("Photo Book"));
        assert_eq!(tokyo.persons, vec!["Kenji"]);
        assert_eq!(tokyo.metadata_version.as_deref(), Some("1"));
        // The original file is not on disk
        assert_eq!(tokyo.path, None);

        // 01:00 UTC shown at +09:00
        let date = tokyo.date.unwrap();
        assert_eq!(date.offset().whole_seconds(), 32400);
        assert_eq!((date.hour(), date.minute()), (10, 0));
        assert_eq!(date.date(), time::macros::date!(2021 - 01 - 01));

        let video = &records[1];
        assert_eq!(video.media_type, Some(MediaType::Video));
        assert_eq!(video.location(), None);
        assert!(video.keywords.is_empty());
        assert_eq!(video.date.unwrap().offset(), UtcOffset::UTC);
    }

    #[test]
    fn test_read_catalogue_attributes() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = create_catalogue(temp_dir.path());

        let mut lib = PhotosLibrary::open(&bundle, LibraryOptions::default()).unwrap();
        let records = lib.photos().unwrap();

        // Two computed-attribute rows for asset 1 must not duplicate it
        assert_eq!(records.len(), 2);
        let uuids: Vec<_> = records.iter().map(|r| r.uuid.as_deref().unwrap()).collect();
        assert_eq!(uuids, vec!["UUID-1", "UUID-2"]);

        let tokyo = &records[0];
        assert_eq!(tokyo.place.name.as_deref(), Some("Shibuya"));
        assert_eq!(tokyo.place.address.as_deref(), Some("Tokyo, Japan"));
        assert_eq!(tokyo.place.country_code, None);
        assert_eq!(tokyo.moment.as_deref(), Some("MOMENT-1"));
        assert_eq!(tokyo.score.aesthetic, Some(0.5));
        assert_eq!(tokyo.score.content, Some(0.25));
        assert_eq!(tokyo.hdr, Some(true));
        assert_eq!(tokyo.portrait, Some(false));
        assert_eq!(tokyo.is_cloud, Some(true));
        assert_eq!(tokyo.in_cloud, Some(true));
        assert_eq!(tokyo.cloud_status.as_deref(), Some("synced"));
        assert_eq!(tokyo.external_edit, Some(true));

        let exif = |key: &str| tokyo.exif.get(key).map(String::as_str);
        assert_eq!(exif("EXIF:Make"), Some("Apple"));
        assert_eq!(exif("EXIF:Model"), Some("iPhone 12"));
        assert_eq!(exif("EXIF:LensModel"), Some("iPhone 12 back camera"));
        assert_eq!(exif("EXIF:FocalLength"), Some("4.2"));
        assert_eq!(exif("EXIF:FNumber"), Some("1.6"));
        assert_eq!(exif("EXIF:ExposureTime"), Some("1/125"));
        assert_eq!(exif("EXIF:ISO"), Some("64"));
        assert_eq!(exif("IPTC:Keywords"), None);

        let video = &records[1];
        assert_eq!(video.moment, None);
        assert_eq!(video.place.name, None);
        assert_eq!(video.score.aesthetic, None);
        assert_eq!(video.hdr, None);
        assert_eq!(video.is_cloud, Some(true));
        assert_eq!(video.in_cloud, Some(false));
        assert_eq!(video.cloud_status.as_deref(), Some("not synced"));
        assert_eq!(video.external_edit, None);
        assert!(video.exif.is_empty());
    }

    #[test]
    fn test_include_trashed() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = create_catalogue(temp_dir.path());

        let options = LibraryOptions {
            include_trashed: true,
            ..Default::default()
        };
        let mut lib = PhotosLibrary::open(&bundle, options).unwrap();
        assert_eq!(lib.photos().unwrap().len(), 3);
    }

    #[test]
    fn test_open_catalogue_file_directly() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = create_catalogue(temp_dir.path());

        let db_path = bundle.join(DB_RELATIVE_PATH);
        assert_eq!(bundle_root(&db_path), Some(bundle.clone()));

        let mut lib = PhotosLibrary::open(&db_path, LibraryOptions::default()).unwrap();
        assert_eq!(lib.photos().unwrap().len(), 2);
    }

    #[test]
    fn test_original_path_reported_when_present() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = create_catalogue(temp_dir.path());
        let original = bundle.join("originals").join("U").join("UUID-1.jpeg");
        std::fs::create_dir_all(original.parent().unwrap()).unwrap();
        std::fs::write(&original, b"jpeg").unwrap();

        let mut lib = PhotosLibrary::open(&bundle, LibraryOptions::default()).unwrap();
        let records = lib.photos().unwrap();
        assert_eq!(records[0].path.as_deref(), Some(original.as_path()));
    }

    #[test]
    fn test_core_data_date() {
        let date = core_data_date(JAN_1_2021, UtcOffset::UTC).unwrap();
        assert_eq!(date.unix_timestamp(), 1_609_459_200);

        let offset = UtcOffset::from_whole_seconds(-18000).unwrap();
        let date = core_data_date(JAN_1_2021 + 0.75, offset).unwrap();
        assert_eq!(date.unix_timestamp(), 1_609_459_200);
        assert_eq!(date.hour(), 19);

        assert!(core_data_date(f64::NAN, UtcOffset::UTC).is_none());
    }

    #[test]
    fn test_asset_query_skips_missing_columns() {
        let schema = Schema::from_tables(&[
            ("ZGENERICASSET", &["Z_PK", "ZUUID", "ZLATITUDE"][..]),
            ("ZADDITIONALASSETATTRIBUTES", &["Z_PK", "ZASSET", "ZTITLE"][..]),
        ]);
        let mut query = AssetQuery::new(&schema, "ZGENERICASSET");
        query.join("ZADDITIONALASSETATTRIBUTES", "aa", "ZASSET", "a", "Z_PK");
        query.join("ZMOMENT", "m", "Z_PK", "a", "ZMOMENT");

        let sql = query.sql(false);
        assert!(sql.contains("a.ZUUID"));
        assert!(sql.contains("aa.ZTITLE"));
        assert!(sql.contains("LEFT JOIN ZADDITIONALASSETATTRIBUTES aa"));
        assert!(!sql.contains("ZMOMENT"));
        assert!(!sql.contains("a.ZLONGITUDE"));
        assert!(!sql.contains("WHERE"));
        assert!(sql.ends_with("ORDER BY a.Z_PK"));
    }

    fn coordinate_row<'a>(index: &'a ColumnIndex, latitude: &str, longitude: &str) -> AssetRow<'a> {
        AssetRow {
            values: COLUMNS
                .iter()
                .map(|(_, column)| match *column {
                    "ZLATITUDE" => Value::Text(latitude.to_string()),
                    "ZLONGITUDE" => Value::Text(longitude.to_string()),
                    _ => Value::Null,
                })
                .collect(),
            index,
        }
    }

    #[test]
    fn test_text_coordinates_are_absent() {
        let index = column_index();
        let row = coordinate_row(&index, "unknown", " 12.5 ");
        assert_eq!(row.real("a", "ZLATITUDE"), None);
        assert_eq!(row.real("a", "ZLONGITUDE"), Some(12.5));
        assert_eq!(row.text("a", "ZUUID"), None);

        for (latitude, longitude) in [("NaN", "inf"), ("-infinity", "nan"), ("Infinity", "-inf")] {
            let row = coordinate_row(&index, latitude, longitude);
            assert_eq!(row.real("a", "ZLATITUDE"), None, "{latitude}");
            assert_eq!(row.real("a", "ZLONGITUDE"), None, "{longitude}");
        }
    }

    #[test]
    fn test_column_index_covers_every_column() {
        let index = column_index();
        assert_eq!(index.len(), COLUMNS.len());
        assert_eq!(index[&("a", "Z_PK")], 0);
        assert_eq!(index[&("aa", "Z_PK")], 30);
        assert!(!index.contains_key(&("a", "ZNOSUCHCOLUMN")));
    }
}
