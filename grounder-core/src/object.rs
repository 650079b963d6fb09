//! Interned, globally-indexed constants
//!
//! An [`Object`] is comparable by index alone (it is a `Copy` newtype over
//! `u32`); the backing string lives once in an [`ObjectTable`] and is
//! looked up only when rendering output.

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// An interned constant. `Object`s from different [`ObjectTable`]s must
/// never be compared; there is no tag to catch that at runtime. This
/// lineage favors a bare dense index over a checked generational handle
/// for anything on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Object(u32);

impl Object {
    /// The raw dense index. Stable for the lifetime of the owning table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interns object names to dense [`Object`] handles.
///
/// Same `get_or_create` / index-view shape as [`crate::repository::Repository`],
/// specialized to `String` keys since object identity is purely
/// name-based and objects are never retracted.
#[derive(Debug, Default)]
pub struct ObjectTable {
    names: Vec<Box<str>>,
    index: AHashMap<Box<str>, Object>,
}

impl ObjectTable {
    /// An empty table.
    pub fn new() -> Self {
        ObjectTable::default()
    }

    /// Interns `name`, returning its existing [`Object`] if already
    /// present or creating a new one otherwise.
    pub fn intern(&mut self, name: &str) -> Object {
        if let Some(&obj) = self.index.get(name) {
            return obj;
        }
        let obj = Object(self.names.len() as u32);
        let boxed: Box<str> = name.into();
        self.names.push(boxed.clone());
        self.index.insert(boxed, obj);
        obj
    }

    /// Looks up an already-interned object by name without creating one.
    pub fn get(&self, name: &str) -> Option<Object> {
        self.index.get(name).copied()
    }

    /// The name backing an interned object.
    pub fn name(&self, obj: Object) -> &str {
        &self.names[obj.index()]
    }

    /// Number of distinct objects interned so far.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Every interned object, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Object> + '_ {
        (0..self.names.len()).map(|i| Object(i as u32))
    }
}
