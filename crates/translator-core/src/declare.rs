//! Per-type declarations
//!
//! A type takes part in translation by implementing [`Record`]. Its
//! [`Record::declare`] names the readable properties (association sources),
//! the writable properties (translation targets), the translated fields, the
//! nested fields to recurse into and, optionally, an embedded parent record
//! whose declarations are inherited.
//!
//! The typed closures given to [`Declaration`] are erased to operate on
//! `&dyn Any` right away, so the registry can hold metadata for every type in
//! one map.
//!
//! ```rust,ignore
//! impl Record for Order {
//!     fn declare(decl: &mut Declaration<Self>) {
//!         decl.read("status_code", |o| o.status_code.clone())
//!             .write("status_display", |o, v| o.status_display = Some(v))
//!             .translate(
//!                 "status_display",
//!                 FieldSpec::associated(["status_code"]).dict_code("ORDER_STATUS"),
//!             )
//!             .nested("lines", |o| &mut o.lines);
//!     }
//! }
//! ```

use crate::error::AccessError;
use crate::graph::Enrich;
use crate::param::{IntoParam, Param};
use crate::query::FieldSpec;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type whose fields can be translated
pub trait Record: Any {
    /// Describe the type's fields. Called once per process per type.
    fn declare(decl: &mut Declaration<Self>)
    where
        Self: Sized;
}

pub(crate) type ReadFn =
    Arc<dyn Fn(&dyn Any) -> Result<Option<Param>, AccessError> + Send + Sync>;
pub(crate) type WriteFn =
    Arc<dyn Fn(&mut dyn Any, String) -> Result<(), AccessError> + Send + Sync>;
pub(crate) type NestedFn =
    Arc<dyn Fn(&mut dyn Any) -> Result<&mut dyn Enrich, AccessError> + Send + Sync>;
pub(crate) type ProjectFn = Arc<dyn Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync>;
pub(crate) type ProjectMutFn = Arc<dyn Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync>;

pub(crate) fn read_fn<F>(f: F) -> ReadFn
where
    F: Fn(&dyn Any) -> Result<Option<Param>, AccessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn write_fn<F>(f: F) -> WriteFn
where
    F: Fn(&mut dyn Any, String) -> Result<(), AccessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn nested_fn<F>(f: F) -> NestedFn
where
    F: Fn(&mut dyn Any) -> Result<&mut dyn Enrich, AccessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn project_fn<F>(f: F) -> ProjectFn
where
    F: Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn project_mut_fn<F>(f: F) -> ProjectMutFn
where
    F: Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Identity and declaration entry point of a [`Record`] type
#[derive(Clone, Copy)]
pub struct Descriptor {
    type_id: TypeId,
    type_name: &'static str,
    declare: fn() -> DeclaredType,
}

impl Descriptor {
    /// Descriptor of `T`
    #[must_use]
    pub fn of<T: Record>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            declare: declare_erased::<T>,
        }
    }

    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn declared(&self) -> DeclaredType {
        (self.declare)()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

fn declare_erased<T: Record>() -> DeclaredType {
    let mut decl = Declaration::<T>::new();
    T::declare(&mut decl);
    decl.inner
}

/// Link from a type to the parent record embedded in it
#[derive(Clone)]
pub(crate) struct ParentLink {
    pub(crate) descriptor: Descriptor,
    pub(crate) project: ProjectFn,
    pub(crate) project_mut: ProjectMutFn,
}

/// Erased result of one `Record::declare` call
#[derive(Default)]
pub(crate) struct DeclaredType {
    pub(crate) readers: HashMap<&'static str, ReadFn>,
    pub(crate) writers: HashMap<&'static str, WriteFn>,
    pub(crate) translations: Vec<(&'static str, FieldSpec)>,
    pub(crate) nested: Vec<(&'static str, NestedFn)>,
    pub(crate) parent: Option<ParentLink>,
}

/// Builder handed to [`Record::declare`]
pub struct Declaration<T> {
    inner: DeclaredType,
    _marker: PhantomData<fn(T)>,
}

impl<T: Record> Declaration<T> {
    fn new() -> Self {
        Self {
            inner: DeclaredType::default(),
            _marker: PhantomData,
        }
    }

    /// Declare a readable property, usable as an association field
    pub fn read<V, F>(&mut self, name: &'static str, getter: F) -> &mut Self
    where
        V: IntoParam,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let read = read_fn(move |obj| {
            obj.downcast_ref::<T>()
                .map(|target| getter(target).into_param())
                .ok_or(AccessError::TypeMismatch {
                    field: name,
                    expected: type_name::<T>(),
                })
        });
        self.inner.readers.insert(name, read);
        self
    }

    /// Declare a writable property, usable as a translation target
    pub fn write<F>(&mut self, name: &'static str, setter: F) -> &mut Self
    where
        F: Fn(&mut T, String) + Send + Sync + 'static,
    {
        let write = write_fn(move |obj, value| {
            let target = obj.downcast_mut::<T>().ok_or(AccessError::TypeMismatch {
                field: name,
                expected: type_name::<T>(),
            })?;
            setter(target, value);
            Ok(())
        });
        self.inner.writers.insert(name, write);
        self
    }

    /// Mark `target` as translatable
    pub fn translate(&mut self, target: &'static str, spec: FieldSpec) -> &mut Self {
        self.inner.translations.push((target, spec));
        self
    }

    /// Declare a field whose value is traversed after this object's own
    /// translations: a nested record, a collection or a map.
    pub fn nested<N, F>(&mut self, name: &'static str, field: F) -> &mut Self
    where
        N: Enrich + 'static,
        F: Fn(&mut T) -> &mut N + Send + Sync + 'static,
    {
        let access = nested_fn(move |obj| match obj.downcast_mut::<T>() {
            Some(target) => Ok(field(target) as &mut dyn Enrich),
            None => Err(AccessError::TypeMismatch {
                field: name,
                expected: type_name::<T>(),
            }),
        });
        self.inner.nested.push((name, access));
        self
    }

    /// Inherit the declarations of the parent record `P` embedded in `T`
    pub fn extends<P, F, G>(&mut self, project: F, project_mut: G) -> &mut Self
    where
        P: Record,
        F: Fn(&T) -> &P + Send + Sync + 'static,
        G: Fn(&mut T) -> &mut P + Send + Sync + 'static,
    {
        self.inner.parent = Some(ParentLink {
            descriptor: Descriptor::of::<P>(),
            project: project_fn(move |obj| {
                obj.downcast_ref::<T>().map(|target| project(target) as &dyn Any)
            }),
            project_mut: project_mut_fn(move |obj| {
                obj.downcast_mut::<T>()
                    .map(|target| project_mut(target) as &mut dyn Any)
            }),
        });
        self
    }
}
