//! Per-field translation
//!
//! A [`FieldTranslator`] reads the association values of one object, builds
//! the cache key, resolves the display value through the cache chain and
//! writes it into the target field.

use crate::cache::{CacheChain, CallCache};
use crate::declare::{ParentLink, ReadFn, WriteFn, read_fn, write_fn};
use crate::error::AccessError;
use crate::param::Param;
use crate::query::CompiledQuery;
use std::any::Any;
use std::sync::Arc;
use tracing::{error, trace};

/// Cache key: `prefix` followed by the association values joined with `:`
#[must_use]
pub fn cache_key(prefix: &str, values: &[Param]) -> String {
    let mut key = String::from(prefix);
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            key.push(':');
        }
        key.push_str(&value.to_string());
    }
    key
}

/// Translator for one target field of one type
#[derive(Clone)]
pub struct FieldTranslator {
    owner: &'static str,
    target: &'static str,
    sources: Vec<(&'static str, ReadFn)>,
    write: WriteFn,
    query: Arc<CompiledQuery>,
}

impl FieldTranslator {
    pub(crate) fn new(
        owner: &'static str,
        target: &'static str,
        sources: Vec<(&'static str, ReadFn)>,
        write: WriteFn,
        query: CompiledQuery,
    ) -> Self {
        Self {
            owner,
            target,
            sources,
            write,
            query: Arc::new(query),
        }
    }

    /// Type that declared the field
    #[must_use]
    pub const fn owner(&self) -> &'static str {
        self.owner
    }

    #[must_use]
    pub const fn target(&self) -> &'static str {
        self.target
    }

    /// Association field names in parameter order
    pub fn associations(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sources.iter().map(|(name, _)| *name)
    }

    #[must_use]
    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }

    /// Same translator, reached through the parent projection of `link`
    pub(crate) fn lift(&self, link: &ParentLink) -> Self {
        let parent = link.descriptor.type_name();

        let sources = self
            .sources
            .iter()
            .map(|(name, read)| {
                let read = Arc::clone(read);
                let project = Arc::clone(&link.project);
                let lifted = read_fn(move |obj| {
                    let base = project(obj).ok_or(AccessError::Projection { parent })?;
                    read(base)
                });
                (*name, lifted)
            })
            .collect();

        let write = Arc::clone(&self.write);
        let project_mut = Arc::clone(&link.project_mut);
        let write = write_fn(move |obj, value| {
            let base = project_mut(obj).ok_or(AccessError::Projection { parent })?;
            write(base, value)
        });

        Self {
            owner: self.owner,
            target: self.target,
            sources,
            write,
            query: Arc::clone(&self.query),
        }
    }

    /// Translate the target field of `object`.
    ///
    /// Leaves the target untouched when an association value is null or
    /// blank, when an accessor fails, or when nothing is found.
    pub(crate) fn apply(
        &self,
        object: &mut dyn Any,
        chain: &CacheChain,
        scope: Option<&mut CallCache>,
    ) {
        let mut values = Vec::with_capacity(self.sources.len());
        for (name, read) in &self.sources {
            match read(&*object) {
                Ok(Some(value)) if !value.is_blank() => values.push(value),
                Ok(_) => {
                    trace!(
                        owner = self.owner,
                        field = self.target,
                        association = *name,
                        "Association value empty, skipping"
                    );
                    return;
                }
                Err(e) => {
                    error!(
                        owner = self.owner,
                        field = self.target,
                        association = *name,
                        error = %e,
                        "Failed to read association value"
                    );
                    return;
                }
            }
        }

        let key = cache_key(&self.query.prefix, &values);
        let Some(display) = chain.resolve(&key, &self.query.sql, &values, scope) else {
            return;
        };
        if let Err(e) = (self.write)(object, display) {
            error!(
                owner = self.owner,
                field = self.target,
                error = %e,
                "Failed to write translated value"
            );
        }
    }
}
