//! Cache tiers
//!
//! Resolution consults, in order:
//!
//! - the call-scoped cache ([`CallCache`]), private to one `run`
//! - the shared cache ([`SharedCache`]), process-local or distributed
//! - the lookup source
//!
//! Both cache tiers store [`Cached`] entries so that a lookup that found
//! nothing is remembered as such.

pub mod chain;
pub mod local;

pub use chain::{CacheChain, ChainStats};
pub use local::LocalCache;

use std::collections::HashMap;

/// A cached lookup outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cached {
    /// The lookup returned this display text
    Value(String),
    /// The lookup returned no row
    Missing,
}

impl Cached {
    #[must_use]
    pub fn into_value(self) -> Option<String> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing => None,
        }
    }
}

impl From<Option<String>> for Cached {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Missing, Self::Value)
    }
}

/// Where a shared cache keeps its entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    /// Same process; a call-scoped tier on top would only duplicate it
    Local,
    /// Remote store; a call-scoped tier saves round trips within one run
    Distributed,
}

/// Shared cache backend
///
/// Implementations are used concurrently by independent runs without
/// coordination. Backend failures are absorbed by the implementation: a
/// failed `get` reports `None`, a failed `put` is dropped.
pub trait SharedCache: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Cached outcome for `key`; `None` when never looked up or expired
    fn get(&self, key: &str) -> Option<Cached>;

    /// Store the outcome for `key`
    fn put(&self, key: &str, value: Cached);

    fn locality(&self) -> Locality;
}

/// Cache private to one `run`
#[derive(Debug, Default)]
pub struct CallCache {
    entries: HashMap<String, Cached>,
}

impl CallCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Cached> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: &str, value: Cached) {
        self.entries.insert(key.to_string(), value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
