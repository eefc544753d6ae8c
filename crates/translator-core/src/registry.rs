//! Metadata registry
//!
//! Computes, once per concrete type, the field translators and nested fields
//! the traversal needs, including those inherited from an embedded parent
//! record. Entries are never evicted.
//!
//! Each type owns a `OnceLock` cell in a `DashMap`. The map shard is locked
//! only to fetch or insert the cell; the build itself runs in
//! `OnceLock::get_or_init`, so concurrent first accessors of one type wait
//! for a single build while other types are unaffected, and a parent
//! registered from inside a child's build never re-enters a held map lock.

use crate::declare::{DeclaredType, Descriptor, NestedFn, ParentLink, Record, nested_fn};
use crate::error::{AccessError, DeclarationError};
use crate::field::FieldTranslator;
use crate::graph::Enrich;
use crate::query::{DictTemplates, FieldSpec, compile};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// A field whose value is traversed after its owner's translations
#[derive(Clone)]
pub struct NestedRef {
    owner: &'static str,
    name: &'static str,
    access: NestedFn,
}

impl NestedRef {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn owner(&self) -> &'static str {
        self.owner
    }

    /// Current value of the field in `object`
    pub(crate) fn get<'a>(
        &self,
        object: &'a mut dyn Any,
    ) -> Result<&'a mut dyn Enrich, AccessError> {
        (self.access)(object)
    }

    fn lift(&self, link: &ParentLink) -> Self {
        let parent = link.descriptor.type_name();
        let access = Arc::clone(&self.access);
        let project_mut = Arc::clone(&link.project_mut);
        Self {
            owner: self.owner,
            name: self.name,
            access: nested_fn(move |obj| {
                let base = project_mut(obj).ok_or(AccessError::Projection { parent })?;
                access(base)
            }),
        }
    }
}

/// Translation metadata of one concrete type
pub struct TypeMetadata {
    type_name: &'static str,
    translators: Vec<FieldTranslator>,
    nested: Vec<NestedRef>,
}

impl TypeMetadata {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Own translators first, then inherited ones
    #[must_use]
    pub fn translators(&self) -> &[FieldTranslator] {
        &self.translators
    }

    /// Own nested fields first, then inherited ones
    #[must_use]
    pub fn nested(&self) -> &[NestedRef] {
        &self.nested
    }
}

/// Process-wide registry of [`TypeMetadata`]
pub struct Registry {
    types: DashMap<TypeId, Arc<OnceLock<Arc<TypeMetadata>>>>,
    templates: DictTemplates,
}

impl Registry {
    #[must_use]
    pub fn new(templates: DictTemplates) -> Self {
        Self {
            types: DashMap::new(),
            templates,
        }
    }

    #[must_use]
    pub const fn templates(&self) -> &DictTemplates {
        &self.templates
    }

    /// Metadata for the described type, built on first use
    pub fn ensure_registered(&self, descriptor: &Descriptor) -> Arc<TypeMetadata> {
        let id = descriptor.type_id();
        if let Some(metadata) = self.types.get(&id).and_then(|cell| cell.value().get().cloned()) {
            return metadata;
        }

        let cell = Arc::clone(&self.types.entry(id).or_default());
        Arc::clone(cell.get_or_init(|| Arc::new(self.build(descriptor))))
    }

    /// Register `T` ahead of its first use
    pub fn register<T: Record>(&self) -> Arc<TypeMetadata> {
        self.ensure_registered(&Descriptor::of::<T>())
    }

    #[must_use]
    pub fn metadata<T: Record>(&self) -> Option<Arc<TypeMetadata>> {
        self.types
            .get(&TypeId::of::<T>())
            .and_then(|cell| cell.value().get().cloned())
    }

    #[must_use]
    pub fn is_registered<T: Record>(&self) -> bool {
        self.metadata::<T>().is_some()
    }

    /// Number of registered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.iter().filter(|cell| cell.value().get().is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn build(&self, descriptor: &Descriptor) -> TypeMetadata {
        let type_name = descriptor.type_name();
        let declared = descriptor.declared();

        let parent = match &declared.parent {
            Some(link) if link.descriptor.type_id() == descriptor.type_id() => {
                warn!(type_name, "Type declares itself as its parent, ignoring");
                None
            }
            other => other.clone(),
        };
        let inherited = parent
            .as_ref()
            .map(|link| (link, self.ensure_registered(&link.descriptor)));

        let mut translators = Vec::with_capacity(declared.translations.len());
        for (target, spec) in &declared.translations {
            match self.register_field(type_name, *target, spec, &declared) {
                Ok(translator) => translators.push(translator),
                Err(e) => warn!(
                    type_name,
                    field = *target,
                    error = %e,
                    "Field will not be translated"
                ),
            }
        }

        let mut nested: Vec<NestedRef> = declared
            .nested
            .iter()
            .map(|(name, access)| NestedRef {
                owner: type_name,
                name: *name,
                access: Arc::clone(access),
            })
            .collect();

        if let Some((link, metadata)) = inherited {
            translators.extend(metadata.translators.iter().map(|t| t.lift(link)));
            nested.extend(metadata.nested.iter().map(|n| n.lift(link)));
        }

        debug!(
            type_name,
            translators = translators.len(),
            nested = nested.len(),
            "Registered translation metadata"
        );
        TypeMetadata {
            type_name,
            translators,
            nested,
        }
    }

    fn register_field(
        &self,
        owner: &'static str,
        target: &'static str,
        spec: &FieldSpec,
        declared: &DeclaredType,
    ) -> Result<FieldTranslator, DeclarationError> {
        let write = declared
            .writers
            .get(target)
            .cloned()
            .ok_or_else(|| DeclarationError::MissingTarget {
                field: target.to_string(),
            })?;

        let sources = spec
            .associations()
            .iter()
            .map(|association| {
                declared
                    .readers
                    .get_key_value(association.as_str())
                    .map(|(name, read)| (*name, Arc::clone(read)))
                    .ok_or_else(|| DeclarationError::MissingAssociation {
                        field: target.to_string(),
                        association: association.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let query = compile(target, spec, &self.templates)?;
        if query.prefix.is_empty() {
            warn!(
                owner,
                field = target,
                "No cache key prefix, keys may collide with other queries"
            );
        }

        Ok(FieldTranslator::new(owner, target, sources, write, query))
    }
}
