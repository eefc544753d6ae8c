//! Lookup source abstraction
//!
//! A lookup source hands out one connection per round trip. The connection
//! runs a single parametrized query and is released when it goes out of
//! scope, whether the query succeeded or not.

use crate::param::Param;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use translator_common::{Error, Result};

/// A connection borrowed for one round trip
pub trait LookupConnection {
    /// Run `sql` with `params` bound positionally and return the first column
    /// of the first row, or `None` when no row (or a null column) comes back
    fn query_first(&mut self, sql: &str, params: &[Param]) -> Result<Option<String>>;
}

/// Where display values come from
pub trait LookupSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Acquire a connection exclusively for one round trip
    fn connect(&self) -> Result<Box<dyn LookupConnection + '_>>;
}

/// Run one query on a fresh connection, released before this returns
pub fn fetch_first(
    source: &dyn LookupSource,
    sql: &str,
    params: &[Param],
) -> Result<Option<String>> {
    let mut connection = source.connect()?;
    connection.query_first(sql, params)
}

/// Failure injected into a [`MemoryLookup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFailure {
    Connect,
    Query,
}

struct MemoryRow {
    needle: String,
    params: Vec<String>,
    value: Option<String>,
}

/// In-memory lookup source
///
/// A row answers every query whose text contains the row's `needle` and whose
/// rendered parameters equal the row's parameters.
#[derive(Default)]
pub struct MemoryLookup {
    rows: RwLock<Vec<MemoryRow>>,
    failure: RwLock<Option<MemoryFailure>>,
    queries: AtomicU64,
    open: AtomicUsize,
}

impl MemoryLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row; a `None` value models a row whose column is null
    pub fn insert<I, S>(&self, needle: &str, params: I, value: Option<&str>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.write().push(MemoryRow {
            needle: needle.to_string(),
            params: params.into_iter().map(Into::into).collect(),
            value: value.map(str::to_string),
        });
    }

    /// Make every following round trip fail, or stop failing with `None`
    pub fn set_failure(&self, failure: Option<MemoryFailure>) {
        *self.failure.write() = failure;
    }

    /// Number of queries executed so far
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Number of connections currently checked out
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::Relaxed)
    }
}

impl LookupSource for MemoryLookup {
    fn name(&self) -> &str {
        "memory"
    }

    fn connect(&self) -> Result<Box<dyn LookupConnection + '_>> {
        if *self.failure.read() == Some(MemoryFailure::Connect) {
            return Err(Error::connection("memory lookup unavailable"));
        }
        self.open.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MemoryConnection { source: self }))
    }
}

struct MemoryConnection<'a> {
    source: &'a MemoryLookup,
}

impl LookupConnection for MemoryConnection<'_> {
    fn query_first(&mut self, sql: &str, params: &[Param]) -> Result<Option<String>> {
        self.source.queries.fetch_add(1, Ordering::Relaxed);
        if *self.source.failure.read() == Some(MemoryFailure::Query) {
            return Err(Error::lookup("injected query failure"));
        }

        let rendered: Vec<String> = params.iter().map(ToString::to_string).collect();
        Ok(self
            .source
            .rows
            .read()
            .iter()
            .find(|row| sql.contains(&row.needle) && row.params == rendered)
            .and_then(|row| row.value.clone()))
    }
}

impl Drop for MemoryConnection<'_> {
    fn drop(&mut self) {
        self.source.open.fetch_sub(1, Ordering::Relaxed);
    }
}
