use crate::photokepler_core::error::Result;
use rusqlite::{Connection, OpenFlags};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Read-only connection to a Photos catalogue.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the catalogue at `path` without write access.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?; // Photos.app may hold the write lock

        Ok(Database { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Read every table and its column names.
    pub fn schema(&self) -> Result<Schema> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tables = HashMap::new();
        for name in names {
            let mut info = self
                .conn
                .prepare(&format!("PRAGMA table_info(\"{}\")", name.replace('"', "\"\"")))?;
            let columns = info
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            tables.insert(name, columns);
        }

        log::debug!("Catalogue has {} tables", tables.len());
        Ok(Schema { tables })
    }
}

/// Table and column names present in a catalogue.
///
/// Core Data renumbers join tables and renames columns between Photos
/// releases, so queries are assembled from what is actually there.
#[derive(Debug, Default, Clone)]
pub struct Schema {
    tables: HashMap<String, HashSet<String>>,
}

impl Schema {
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|columns| columns.contains(column))
    }

    /// First of `candidates` that exists in `table`.
    pub fn first_column<'a>(&self, table: &str, candidates: &[&'a str]) -> Option<&'a str> {
        candidates
            .iter()
            .copied()
            .find(|column| self.has_column(table, column))
    }

    /// Find a many-to-many table named `Z_<n><suffix>` with columns ending in
    /// `left` and `right`. Returns the table and both column names.
    pub fn find_join_table(
        &self,
        suffix: &str,
        left: &str,
        right: &str,
    ) -> Option<(String, String, String)> {
        let mut names: Vec<&String> = self.tables.keys().collect();
        names.sort();

        names.into_iter().find_map(|name| {
            let number = name.strip_prefix("Z_")?.strip_suffix(suffix)?;
            if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let columns = &self.tables[name];
            let pick = |ending: &str| {
                let mut matches: Vec<&String> = columns
                    .iter()
                    .filter(|c| {
                        c.starts_with("Z_") && !c.starts_with("Z_FOK_") && c.ends_with(ending)
                    })
                    .collect();
                matches.sort();
                matches.first().map(|c| c.to_string())
            };
            Some((name.clone(), pick(left)?, pick(right)?))
        })
    }

    #[cfg(test)]
    pub fn from_tables(tables: &[(&str, &[&str])]) -> Self {
        Schema {
            tables: tables
                .iter()
                .map(|(name, columns)| {
                    (
                        name.to_string(),
                        columns.iter().map(|c| c.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}
