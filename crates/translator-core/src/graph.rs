//! Shapes of the values the traversal visits
//!
//! Every value handed to the engine reports itself as a leaf, a group of
//! children (collections, map values) or a declared record.

use crate::declare::{Descriptor, Record};
use std::any::Any;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A value the traversal can walk
pub trait Enrich {
    fn node(&mut self) -> Node<'_>;
}

/// What the traversal sees when it visits a value
pub enum Node<'a> {
    /// Nothing to translate: null, scalars, text
    Leaf,
    /// Children visited in order: collection elements or map values
    Many(Vec<&'a mut dyn Enrich>),
    /// A declared record
    Record(RecordRef<'a>),
}

/// A live record together with its type descriptor
pub struct RecordRef<'a> {
    pub(crate) descriptor: Descriptor,
    pub(crate) target: &'a mut dyn Any,
}

impl<T: Record> Enrich for T {
    fn node(&mut self) -> Node<'_> {
        Node::Record(RecordRef {
            descriptor: Descriptor::of::<T>(),
            target: self,
        })
    }
}

macro_rules! leaf {
    ($($ty:ty),*) => {
        $(
            impl Enrich for $ty {
                fn node(&mut self) -> Node<'_> {
                    Node::Leaf
                }
            }
        )*
    };
}

leaf!(
    (), bool, char, String, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32,
    f64
);

impl<T: Enrich> Enrich for Option<T> {
    fn node(&mut self) -> Node<'_> {
        match self {
            Some(inner) => inner.node(),
            None => Node::Leaf,
        }
    }
}

impl<T: Enrich> Enrich for Vec<T> {
    fn node(&mut self) -> Node<'_> {
        Node::Many(self.iter_mut().map(|e| e as &mut dyn Enrich).collect())
    }
}

impl<T: Enrich> Enrich for VecDeque<T> {
    fn node(&mut self) -> Node<'_> {
        Node::Many(self.iter_mut().map(|e| e as &mut dyn Enrich).collect())
    }
}

impl<T: Enrich, const N: usize> Enrich for [T; N] {
    fn node(&mut self) -> Node<'_> {
        Node::Many(self.iter_mut().map(|e| e as &mut dyn Enrich).collect())
    }
}

impl<K, V: Enrich, S> Enrich for HashMap<K, V, S> {
    fn node(&mut self) -> Node<'_> {
        Node::Many(self.values_mut().map(|v| v as &mut dyn Enrich).collect())
    }
}

impl<K, V: Enrich> Enrich for BTreeMap<K, V> {
    fn node(&mut self) -> Node<'_> {
        Node::Many(self.values_mut().map(|v| v as &mut dyn Enrich).collect())
    }
}
