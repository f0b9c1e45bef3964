//! Per-key participation in pipeline decisions.
//!
//! Keys that need to influence scheduling implement `KeyBehavior` and
//! register it alongside the key. The executive consults the behavior
//! table generically, so new scheduling dimensions (ensemble members,
//! exact-integer requests) are added without touching the executive.

use std::sync::Arc;

use crate::information::key::{self, Key, KeyId};
use crate::information::Information;
use crate::request::{Request, RequestKind};

/// Hooks a key may implement to take part in the three pipeline decisions.
///
/// The default implementations make a key a plain value: never copied by
/// the executive, never voting for re-execution, never stored back.
pub trait KeyBehavior {
    /// Conditionally copy this key's entry from `from` to `to` while the
    /// executive propagates default information for `request`.
    fn copy_default_information(&self, request: &Request, from: &Information, to: &mut Information) {
        let _ = (request, from, to);
    }

    /// Vote on whether the value requested on the port differs from what
    /// the produced data object records.
    fn need_to_execute(&self, port_info: &Information, data_info: &Information) -> bool {
        let _ = (port_info, data_info);
        false
    }

    /// Write back, onto the data object's information, the request value
    /// that was just satisfied.
    fn store_meta_data(&self, request: &Request, port_info: &Information, data_info: &mut Information) {
        let _ = (request, port_info, data_info);
    }
}

/// An integer request key paired with a data-side key.
///
/// The port-side key carries what a consumer asks for; the data-side key
/// records what the last execution satisfied. A mismatch between the two
/// forces re-execution, and a successful execution copies requested to
/// stored.
#[derive(Clone, Copy, Debug)]
pub struct IntRequestKey {
    key: Key<i64>,
    data_key: Key<i64>,
}

impl IntRequestKey {
    /// Intern both keys and attach the request behavior to the port-side
    /// key. Idempotent for a given name pair.
    pub fn register(name: &str, data_name: &str) -> Self {
        let key = Key::new(name);
        let data_key = Key::new(data_name);
        key::register_behavior(key.id(), Arc::new(IntRequestBehavior { key, data_key }));
        IntRequestKey { key, data_key }
    }

    /// The port-side (requested value) key.
    pub fn key(&self) -> Key<i64> {
        self.key
    }

    /// The data-side (satisfied value) key.
    pub fn data_key(&self) -> Key<i64> {
        self.data_key
    }
}

struct IntRequestBehavior {
    key: Key<i64>,
    data_key: Key<i64>,
}

impl KeyBehavior for IntRequestBehavior {
    fn copy_default_information(&self, request: &Request, from: &Information, to: &mut Information) {
        if request.kind == RequestKind::UpdateExtent {
            to.copy_entry(from, self.key.id());
        }
    }

    fn need_to_execute(&self, port_info: &Information, data_info: &Information) -> bool {
        match (port_info.get(self.key), data_info.get(self.data_key)) {
            (Some(requested), Some(stored)) => requested != stored,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn store_meta_data(&self, _request: &Request, port_info: &Information, data_info: &mut Information) {
        if let Some(requested) = port_info.get(self.key) {
            data_info.set(self.data_key, requested);
        }
    }
}

/// Behavior for metadata keys: copy themselves downstream only during the
/// information pass, so stale metadata never survives an upstream change.
struct MetaDataBehavior {
    id: KeyId,
}

impl KeyBehavior for MetaDataBehavior {
    fn copy_default_information(&self, request: &Request, from: &Information, to: &mut Information) {
        if request.kind == RequestKind::Information {
            to.copy_entry(from, self.id);
        }
    }
}

/// Intern a key that propagates downstream during the information pass.
pub fn metadata_key<T: key::KeyValue>(name: &str) -> Key<T> {
    let k = Key::<T>::new(name);
    key::register_behavior(k.id(), Arc::new(MetaDataBehavior { id: k.id() }));
    k
}
