//! Typed sparse property bags attached to pipeline ports.
//!
//! An `Information` object maps interned key ids to tagged values. One bag
//! is owned by every output port and persists across update cycles; data
//! objects carry a second bag recording what request produced them.

pub mod behavior;
pub mod key;
pub mod keys;

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::extent::Extent;
use crate::information::key::{key_name, Key, KeyId, KeyValue};

/// A tagged value stored in an information bag.
///
/// Doubles are wrapped in `OrderedFloat` so bags stay comparable and
/// hashable.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub enum InfoValue {
    Int(i64),
    Double(OrderedFloat<f64>),
    IntVec6(Extent),
    DoubleVec(Vec<OrderedFloat<f64>>),
    Str(String),
}

/// A sparse key/value bag.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct Information {
    entries: HashMap<KeyId, InfoValue>,
}

impl Information {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: KeyValue>(&self, key: Key<T>) -> Option<T> {
        self.entries.get(&key.id()).and_then(T::from_value)
    }

    pub fn set<T: KeyValue>(&mut self, key: Key<T>, value: T) {
        self.entries.insert(key.id(), value.into_value());
    }

    pub fn has<T: KeyValue>(&self, key: Key<T>) -> bool {
        self.entries.contains_key(&key.id())
    }

    pub fn has_id(&self, id: KeyId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn remove<T: KeyValue>(&mut self, key: Key<T>) {
        self.entries.remove(&key.id());
    }

    pub fn remove_id(&mut self, id: KeyId) {
        self.entries.remove(&id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy one entry from `from`. If `from` does not carry the key, the
    /// entry is removed here as well.
    pub fn copy_entry(&mut self, from: &Information, id: KeyId) {
        match from.entries.get(&id) {
            Some(value) => {
                self.entries.insert(id, value.clone());
            }
            None => {
                self.entries.remove(&id);
            }
        }
    }

    /// Merge all entries from `other` into this bag; `other` wins per key.
    pub fn append(&mut self, other: &Information) {
        for (id, value) in &other.entries {
            self.entries.insert(*id, value.clone());
        }
    }

    /// The ids of all keys present, in stable (id) order.
    pub fn keys(&self) -> Vec<KeyId> {
        let mut ids: Vec<KeyId> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    /// A name-keyed JSON snapshot of the bag, for diagnostics and tests.
    pub fn to_json(&self) -> Result<serde_json::Value, PipelineError> {
        let mut map = serde_json::Map::new();
        for id in self.keys() {
            let value = serde_json::to_value(&self.entries[&id])?;
            map.insert(key_name(id), value);
        }
        Ok(serde_json::Value::Object(map))
    }
}
