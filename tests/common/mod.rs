use assert_fs::TempDir;
use assert_fs::fixture::ChildPath;
use assert_fs::prelude::PathChild;
use rusqlite::{Connection, params};

/// Seconds from the Core Data epoch (2001-01-01T00:00:00Z) to 2021-01-01T00:00:00Z.
pub const JAN_1_2021: f64 = 631_152_000.0;
pub const DAY: f64 = 86_400.0;

/// A minimal Photos catalogue inside a `.photoslibrary` bundle.
pub struct TestLibrary {
    pub bundle: ChildPath,
    conn: Connection,
}

impl TestLibrary {
    pub fn create(temp_dir: &TempDir) -> Self {
        let bundle = temp_dir.child("Test Library.photoslibrary");
        std::fs::create_dir_all(bundle.path().join("database")).unwrap();

        let conn = Connection::open(bundle.path().join("database/Photos.sqlite")).unwrap();
        conn.execute_batch(
            "CREATE TABLE ZASSET (
                Z_PK INTEGER PRIMARY KEY, ZUUID TEXT, ZFILENAME TEXT, ZDIRECTORY TEXT,
                ZDATECREATED TIMESTAMP, ZTRASHEDSTATE INTEGER, ZLATITUDE FLOAT,
                ZLONGITUDE FLOAT, ZKIND INTEGER, ZFAVORITE INTEGER);
             CREATE TABLE ZADDITIONALASSETATTRIBUTES (
                Z_PK INTEGER PRIMARY KEY, ZASSET INTEGER, ZORIGINALFILENAME TEXT,
                ZTITLE TEXT, ZTIMEZONEOFFSET INTEGER);",
        )
        .unwrap();

        TestLibrary { bundle, conn }
    }

    pub fn add_photo(
        &self,
        pk: i64,
        original_filename: &str,
        date: Option<f64>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) {
        self.conn
            .execute(
                "INSERT INTO ZASSET VALUES (?1, ?2, ?3, 'A', ?4, 0, ?5, ?6, 0, 0)",
                params![
                    pk,
                    format!("UUID-{pk}"),
                    format!("UUID-{pk}.jpeg"),
                    date,
                    latitude,
                    longitude
                ],
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO ZADDITIONALASSETATTRIBUTES VALUES (?1, ?1, ?2, NULL, 0)",
                params![pk, original_filename],
            )
            .unwrap();
    }

    pub fn set_title(&self, pk: i64, title: &str) {
        self.conn
            .execute(
                "UPDATE ZADDITIONALASSETATTRIBUTES SET ZTITLE = ?1 WHERE ZASSET = ?2",
                params![title, pk],
            )
            .unwrap();
    }
}
