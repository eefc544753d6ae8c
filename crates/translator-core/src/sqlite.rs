//! SQLite lookup source
//!
//! Every round trip opens its own connection to the database file and closes
//! it when the query is done.

use crate::lookup::{LookupConnection, LookupSource};
use crate::param::Param;
use rusqlite::types::ValueRef;
use rusqlite::{OpenFlags, params_from_iter};
use std::path::{Path, PathBuf};
use translator_common::{Error, Result};

/// Lookup source reading from a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteLookup {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteLookup {
    /// Open `path` read-only on every round trip
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            flags: OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        }
    }

    /// Use custom open flags
    #[must_use]
    pub const fn with_flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LookupSource for SqliteLookup {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn connect(&self) -> Result<Box<dyn LookupConnection + '_>> {
        let connection = rusqlite::Connection::open_with_flags(&self.path, self.flags)
            .map_err(|e| Error::connection(format!("{}: {e}", self.path.display())))?;
        Ok(Box::new(SqliteConnection { connection }))
    }
}

struct SqliteConnection {
    connection: rusqlite::Connection,
}

impl LookupConnection for SqliteConnection {
    fn query_first(&mut self, sql: &str, params: &[Param]) -> Result<Option<String>> {
        let mut statement = self
            .connection
            .prepare(sql)
            .map_err(|e| Error::lookup(e.to_string()))?;
        let mut rows = statement
            .query(params_from_iter(params.iter()))
            .map_err(|e| Error::lookup(e.to_string()))?;

        let Some(row) = rows.next().map_err(|e| Error::lookup(e.to_string()))? else {
            return Ok(None);
        };
        let value = row.get_ref(0).map_err(|e| Error::lookup(e.to_string()))?;
        Ok(match value {
            ValueRef::Null => None,
            ValueRef::Integer(i) => Some(i.to_string()),
            ValueRef::Real(r) => Some(r.to_string()),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
        })
    }
}
