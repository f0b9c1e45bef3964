//! Key registry: process-wide interning of typed information keys.
//!
//! Keys are identity-unique per name. A key's value kind is fixed when the
//! key is first interned; interning the same name again with a different
//! kind is a programming error and panics. Typed `Key<T>` handles make
//! wrong-kind reads impossible at the call site.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::extent::Extent;
use crate::information::behavior::KeyBehavior;
use crate::information::InfoValue;

/// Interned key identity. Stable for the lifetime of the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct KeyId(u32);

/// The value kind a key is allowed to carry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueKind {
    Int,
    Double,
    IntVec6,
    DoubleVec,
    Str,
}

struct KeyEntry {
    name: String,
    kind: ValueKind,
    behavior: Option<Arc<dyn KeyBehavior + Send + Sync>>,
}

#[derive(Default)]
struct Registry {
    by_name: HashMap<String, KeyId>,
    entries: Vec<KeyEntry>,
}

fn registry() -> MutexGuard<'static, Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    // A kind-conflict panic fires while the lock is held, before any
    // mutation, so a poisoned registry is still consistent.
    REGISTRY
        .get_or_init(|| Mutex::new(Registry::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Intern `name` with the given kind, returning its stable id.
///
/// Panics if `name` was previously interned with a different kind.
pub fn intern(name: &str, kind: ValueKind) -> KeyId {
    let mut reg = registry();
    if let Some(&id) = reg.by_name.get(name) {
        let existing = reg.entries[id.0 as usize].kind;
        assert!(
            existing == kind,
            "key '{}' already registered with kind {:?}, requested {:?}",
            name,
            existing,
            kind
        );
        return id;
    }
    let id = KeyId(reg.entries.len() as u32);
    reg.entries.push(KeyEntry {
        name: name.to_string(),
        kind,
        behavior: None,
    });
    reg.by_name.insert(name.to_string(), id);
    id
}

/// Attach a behavior to a key. Keys without a behavior are plain values.
pub fn register_behavior(id: KeyId, behavior: Arc<dyn KeyBehavior + Send + Sync>) {
    let mut reg = registry();
    reg.entries[id.0 as usize].behavior = Some(behavior);
}

/// The behavior attached to a key, if any.
pub fn behavior(id: KeyId) -> Option<Arc<dyn KeyBehavior + Send + Sync>> {
    let reg = registry();
    reg.entries[id.0 as usize].behavior.clone()
}

/// The name a key was interned under.
pub fn key_name(id: KeyId) -> String {
    let reg = registry();
    reg.entries[id.0 as usize].name.clone()
}

/// The value kind fixed at interning time.
pub fn key_kind(id: KeyId) -> ValueKind {
    let reg = registry();
    reg.entries[id.0 as usize].kind
}

/// Conversion between a key's Rust type and the stored variant.
pub trait KeyValue: Sized {
    const KIND: ValueKind;
    fn into_value(self) -> InfoValue;
    fn from_value(value: &InfoValue) -> Option<Self>;
}

impl KeyValue for i64 {
    const KIND: ValueKind = ValueKind::Int;
    fn into_value(self) -> InfoValue {
        InfoValue::Int(self)
    }
    fn from_value(value: &InfoValue) -> Option<Self> {
        match value {
            InfoValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl KeyValue for f64 {
    const KIND: ValueKind = ValueKind::Double;
    fn into_value(self) -> InfoValue {
        InfoValue::Double(self.into())
    }
    fn from_value(value: &InfoValue) -> Option<Self> {
        match value {
            InfoValue::Double(v) => Some(v.into_inner()),
            _ => None,
        }
    }
}

impl KeyValue for Extent {
    const KIND: ValueKind = ValueKind::IntVec6;
    fn into_value(self) -> InfoValue {
        InfoValue::IntVec6(self)
    }
    fn from_value(value: &InfoValue) -> Option<Self> {
        match value {
            InfoValue::IntVec6(v) => Some(*v),
            _ => None,
        }
    }
}

impl KeyValue for Vec<f64> {
    const KIND: ValueKind = ValueKind::DoubleVec;
    fn into_value(self) -> InfoValue {
        InfoValue::DoubleVec(self.into_iter().map(Into::into).collect())
    }
    fn from_value(value: &InfoValue) -> Option<Self> {
        match value {
            InfoValue::DoubleVec(v) => Some(v.iter().map(|x| x.into_inner()).collect()),
            _ => None,
        }
    }
}

impl KeyValue for String {
    const KIND: ValueKind = ValueKind::Str;
    fn into_value(self) -> InfoValue {
        InfoValue::Str(self)
    }
    fn from_value(value: &InfoValue) -> Option<Self> {
        match value {
            InfoValue::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// A typed handle to an interned key.
pub struct Key<T> {
    id: KeyId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> std::fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", key_name(self.id))
    }
}

impl<T: KeyValue> Key<T> {
    /// Intern (or look up) the key with this name and `T`'s value kind.
    pub fn new(name: &str) -> Self {
        Key {
            id: intern(name, T::KIND),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn name(&self) -> String {
        key_name(self.id)
    }
}
