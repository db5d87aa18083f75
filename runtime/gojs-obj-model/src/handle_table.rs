use std::collections::HashMap;
use std::sync::Arc;

use crate::object::global;
use crate::value::{HostValue, Ref, Value};

/// Per-session mapping from guest-visible handles to host values.
///
/// Handles are dense indices into `values`. The first [`Ref::RESERVED`]
/// entries are bound once at construction; everything after them is appended
/// and never removed, so a handle handed to the guest stays valid for the
/// whole session. There is no collection: a session that keeps minting new
/// host values grows the table until the session is dropped.
pub struct HandleTable {
    values: Vec<Value>,
    identity_to_handle: HashMap<usize, Ref>,
}

impl HandleTable {
    pub fn new() -> Self {
        let global = Arc::new(global());
        let reserved = [
            (Ref::NAN, HostValue::NaN),
            (Ref::UNDEFINED, HostValue::Undefined),
            (Ref::NULL, HostValue::Null),
            (Ref::TRUE, HostValue::Bool(true)),
            (Ref::FALSE, HostValue::Bool(false)),
            (Ref::GLOBAL, HostValue::Object(Arc::clone(&global))),
            (Ref::MEMORY, HostValue::Memory),
            (Ref::INSTANCE, HostValue::Instance),
        ];
        let mut values = Vec::with_capacity(64);
        for (id, value) in reserved {
            debug_assert_eq!(id.get() as usize, values.len());
            values.push(Value::new(id, value));
        }
        let mut identity_to_handle = HashMap::new();
        identity_to_handle.insert(Arc::as_ptr(&global) as usize, Ref::GLOBAL);
        Self {
            values,
            identity_to_handle,
        }
    }

    /// Binds `value` to the next unused handle.
    pub fn allocate(&mut self, value: HostValue) -> Ref {
        debug_assert!(self.values.len() < u32::MAX as usize, "handle space exhausted");
        let id = Ref::new(self.values.len() as u32);
        if let Some(identity) = value.identity() {
            self.identity_to_handle.entry(identity).or_insert(id);
        }
        self.values.push(Value::new(id, value));
        id
    }

    /// Handle for `value`, reusing the existing one when the same shared
    /// object or function has crossed the boundary before.
    pub fn intern(&mut self, value: HostValue) -> Ref {
        if let Some(existing) = value
            .identity()
            .and_then(|identity| self.identity_to_handle.get(&identity).copied())
        {
            return existing;
        }
        self.allocate(value)
    }

    /// Unknown handles read as `undefined`, the way an out-of-range property
    /// read behaves on the guest's side.
    pub fn lookup(&self, id: Ref) -> &Value {
        self.values
            .get(id.get() as usize)
            .unwrap_or(&self.values[Ref::UNDEFINED.get() as usize])
    }

    pub fn undefined(&self) -> &Value {
        self.lookup(Ref::UNDEFINED)
    }

    pub fn null(&self) -> &Value {
        self.lookup(Ref::NULL)
    }

    pub fn global(&self) -> &Value {
        self.lookup(Ref::GLOBAL)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Never true: the reserved entries are always present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{HostObject, JsError};
    use proptest::prelude::*;

    #[test]
    fn test_reserved_entries() {
        let table = HandleTable::new();
        assert_eq!(table.len(), Ref::RESERVED as usize);
        assert!(matches!(table.lookup(Ref::NAN).get(), HostValue::NaN));
        assert!(matches!(table.lookup(Ref::UNDEFINED).get(), HostValue::Undefined));
        assert!(matches!(table.lookup(Ref::NULL).get(), HostValue::Null));
        assert!(matches!(table.lookup(Ref::TRUE).get(), HostValue::Bool(true)));
        assert!(matches!(table.lookup(Ref::FALSE).get(), HostValue::Bool(false)));
        assert_eq!(table.global().get().kind(), "Object");
        assert!(matches!(table.lookup(Ref::MEMORY).get(), HostValue::Memory));
        assert!(matches!(table.lookup(Ref::INSTANCE).get(), HostValue::Instance));
    }

    #[test]
    fn test_out_of_range_lookup_is_undefined() {
        let mut table = HandleTable::new();
        let id = table.allocate(HostValue::string("x"));
        assert_eq!(id, Ref::new(8));
        assert_eq!(table.lookup(id).id(), id);
        assert_eq!(table.lookup(Ref::new(9)).id(), Ref::UNDEFINED);
        assert_eq!(table.lookup(Ref::new(u32::MAX)).id(), Ref::UNDEFINED);
    }

    #[test]
    fn test_intern_reuses_shared_objects() {
        let mut table = HandleTable::new();
        let obj = HostValue::object(HostObject::Error(JsError::new("e")));
        let first = table.intern(obj.clone());
        let second = table.intern(obj);
        assert_eq!(first, second);
        assert_eq!(table.len(), 9);

        let global = table.global().get().clone();
        assert_eq!(table.intern(global), Ref::GLOBAL);
    }

    #[test]
    fn test_intern_allocates_fresh_strings() {
        let mut table = HandleTable::new();
        let a = table.intern(HostValue::string("same"));
        let b = table.intern(HostValue::string("same"));
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn allocation_is_monotonic_and_keeps_reserved(
            strings in proptest::collection::vec(".{0,8}", 1..64)
        ) {
            let mut table = HandleTable::new();
            let mut last = Ref::new(Ref::RESERVED - 1);
            for s in strings {
                let id = table.allocate(HostValue::string(s.as_str()));
                prop_assert!(id > last);
                prop_assert!(!id.is_reserved());
                last = id;
            }
            for raw in 0..Ref::RESERVED {
                prop_assert_eq!(table.lookup(Ref::new(raw)).id(), Ref::new(raw));
            }
            prop_assert!(matches!(table.lookup(Ref::TRUE).get(), HostValue::Bool(true)));
        }
    }
}
