use std::fmt;
use std::sync::Arc;

use crate::object::{Constructible, HostObject, PropertySource};
use crate::slot::TypeFlag;

/// Opaque handle a guest holds in place of a host value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Ref(u32);

impl Ref {
    pub const NAN: Ref = Ref(0);
    pub const UNDEFINED: Ref = Ref(1);
    pub const NULL: Ref = Ref(2);
    pub const TRUE: Ref = Ref(3);
    pub const FALSE: Ref = Ref(4);
    pub const GLOBAL: Ref = Ref(5);
    /// The guest's own linear memory object.
    pub const MEMORY: Ref = Ref(6);
    /// The host-side runtime instance driving the guest.
    pub const INSTANCE: Ref = Ref(7);

    /// Number of permanently bound handles at the bottom of every table.
    pub const RESERVED: u32 = 8;

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn is_reserved(self) -> bool {
        self.0 < Self::RESERVED
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type NativeFn = dyn Fn(&[Value]) -> Result<SlotValue, String> + Send + Sync;

/// A host function the guest can receive, pass around and call.
#[derive(Clone)]
pub struct HostFunction {
    name: Arc<str>,
    call: Arc<NativeFn>,
}

impl HostFunction {
    pub fn new<F>(name: &str, call: F) -> Self
    where
        F: Fn(&[Value]) -> Result<SlotValue, String> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            call: Arc::new(call),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<SlotValue, String> {
        (self.call)(args)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.call).cast::<()>() as usize
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({})", self.name)
    }
}

/// The host datum behind a handle.
#[derive(Clone, Debug)]
pub enum HostValue {
    NaN,
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Function(HostFunction),
    Object(Arc<HostObject>),
    Memory,
    Instance,
}

impl HostValue {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        HostValue::String(s.into())
    }

    pub fn object(obj: HostObject) -> Self {
        HostValue::Object(Arc::new(obj))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::NaN | HostValue::Number(_) => "number",
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::String(_) => "string",
            HostValue::Function(_) => "function",
            HostValue::Object(obj) => obj.kind(),
            HostValue::Memory => "WebAssembly.Memory",
            HostValue::Instance => "Go",
        }
    }

    pub fn type_flag(&self) -> TypeFlag {
        match self {
            HostValue::String(_) => TypeFlag::String,
            HostValue::Function(_) => TypeFlag::Function,
            _ => TypeFlag::Object,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            HostValue::NaN => Some(f64::NAN),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_property_source(&self) -> Option<&dyn PropertySource> {
        match self {
            HostValue::Object(obj) => obj.as_property_source(),
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_constructible(&self) -> Option<&dyn Constructible> {
        match self {
            HostValue::Object(obj) => obj.as_constructible(),
            _ => None,
        }
    }

    /// Key used to give one shared host allocation one handle.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            HostValue::Object(obj) => Some(Arc::as_ptr(obj) as usize),
            HostValue::Function(f) => Some(f.identity()),
            _ => None,
        }
    }
}

/// A host datum bound to the handle the guest knows it by.
#[derive(Clone, Debug)]
pub struct Value {
    id: Ref,
    value: HostValue,
}

impl Value {
    pub(crate) fn new(id: Ref, value: HostValue) -> Self {
        Self { id, value }
    }

    pub fn id(&self) -> Ref {
        self.id
    }

    pub fn get(&self) -> &HostValue {
        &self.value
    }
}

/// Handles are the identity; two values with one handle are the same value.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Value {}

/// What can be written into, or read out of, a slot: either a host datum
/// that may still need a handle, or a value that already has one.
#[derive(Clone, Debug)]
pub enum SlotValue {
    Host(HostValue),
    Value(Value),
}

impl SlotValue {
    pub fn host(&self) -> &HostValue {
        match self {
            SlotValue::Host(v) => v,
            SlotValue::Value(v) => v.get(),
        }
    }

    pub fn handle(&self) -> Option<Ref> {
        match self {
            SlotValue::Host(_) => None,
            SlotValue::Value(v) => Some(v.id()),
        }
    }
}

impl From<HostValue> for SlotValue {
    fn from(v: HostValue) -> Self {
        SlotValue::Host(v)
    }
}

impl From<Value> for SlotValue {
    fn from(v: Value) -> Self {
        SlotValue::Value(v)
    }
}

impl From<&Value> for SlotValue {
    fn from(v: &Value) -> Self {
        SlotValue::Value(v.clone())
    }
}

impl From<f64> for SlotValue {
    fn from(n: f64) -> Self {
        SlotValue::Host(HostValue::Number(n))
    }
}

impl From<bool> for SlotValue {
    fn from(b: bool) -> Self {
        SlotValue::Host(HostValue::Bool(b))
    }
}

impl From<&str> for SlotValue {
    fn from(s: &str) -> Self {
        SlotValue::Host(HostValue::string(s))
    }
}

impl From<String> for SlotValue {
    fn from(s: String) -> Self {
        SlotValue::Host(HostValue::string(s))
    }
}

impl From<HostObject> for SlotValue {
    fn from(obj: HostObject) -> Self {
        SlotValue::Host(HostValue::object(obj))
    }
}

impl From<HostFunction> for SlotValue {
    fn from(f: HostFunction) -> Self {
        SlotValue::Host(HostValue::Function(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_equality_is_by_handle() {
        let a = Value::new(Ref::new(9), HostValue::string("a"));
        let b = Value::new(Ref::new(9), HostValue::string("b"));
        let c = Value::new(Ref::new(10), HostValue::string("a"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_type_flags() {
        assert_eq!(HostValue::string("x").type_flag(), TypeFlag::String);
        let f = HostFunction::new("f", |_| Ok(SlotValue::from(1.0)));
        assert_eq!(HostValue::Function(f).type_flag(), TypeFlag::Function);
        assert_eq!(HostValue::Bool(true).type_flag(), TypeFlag::Object);
    }

    #[test]
    fn test_function_identity_survives_clone() {
        let f = HostFunction::new("f", |_| Ok(SlotValue::from(1.0)));
        let g = f.clone();
        let h = HostFunction::new("f", |_| Ok(SlotValue::from(1.0)));
        assert_eq!(f.identity(), g.identity());
        assert_ne!(f.identity(), h.identity());
    }
}
