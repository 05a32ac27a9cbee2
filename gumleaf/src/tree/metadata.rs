//! Auxiliary per-node annotations.
//!
//! Metadata rides along with a node but is invisible to hashing,
//! isomorphism, matching and edit script generation.

use core::any::Any;
use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key under which generators store a human-readable identity string,
/// e.g. `"Method foo( int String)"`.
pub const IDENTITY_KEY: &str = "id";

/// Opaque value stored in [`Metadata`].
pub type MetadataValue = Arc<dyn Any + Send + Sync>;

/// String-keyed bag of opaque values attached to a node.
#[derive(Clone, Default)]
pub struct Metadata {
    entries: BTreeMap<String, MetadataValue>,
}

impl Metadata {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, returning the previous value if any.
    pub fn insert<V: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        value: V,
    ) -> Option<MetadataValue> {
        self.entries.insert(key.into(), Arc::new(value))
    }

    /// Typed lookup. Returns `None` when the key is absent or holds another type.
    pub fn get<V: Any>(&self, key: &str) -> Option<&V> {
        self.entries.get(key)?.downcast_ref::<V>()
    }

    /// Untyped lookup.
    pub fn get_raw(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.get(key)
    }

    /// Remove and return the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.entries.remove(key)
    }

    /// The identity string stored under [`IDENTITY_KEY`], if it is a `String`.
    pub fn identity(&self) -> Option<&str> {
        self.get::<String>(IDENTITY_KEY).map(String::as_str)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.entries {
            match value.downcast_ref::<String>() {
                Some(s) => map.entry(key, s),
                None => map.entry(key, &"<opaque>"),
            };
        }
        map.finish()
    }
}
