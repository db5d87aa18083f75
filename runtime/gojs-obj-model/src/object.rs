//! Stand-in host objects and the two capabilities the guest protocol needs.
//!
//! Capabilities are independent: an object may answer property reads, be
//! constructible, or both. Callers ask for the capability they need and must
//! treat its absence as a failure of the operation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::value::{HostFunction, HostValue, SlotValue, Value};

/// Can yield a value for a string key.
pub trait PropertySource {
    fn property(&self, name: &str) -> SlotValue;
}

/// Can produce a new value from an ordered argument list.
pub trait Constructible {
    fn construct(&self, args: &[Value]) -> HostValue;
}

#[derive(Debug)]
pub enum HostObject {
    Namespace(Namespace),
    Error(JsError),
    Array(JsArray),
    Bytes(ByteArray),
}

impl HostObject {
    pub fn kind(&self) -> &'static str {
        match self {
            HostObject::Namespace(_) => "Object",
            HostObject::Error(_) => "Error",
            HostObject::Array(_) => "Array",
            HostObject::Bytes(bytes) => bytes.kind().name(),
        }
    }

    pub fn as_property_source(&self) -> Option<&dyn PropertySource> {
        match self {
            HostObject::Namespace(ns) => Some(ns),
            HostObject::Error(err) => Some(err),
            HostObject::Array(array) => Some(array),
            HostObject::Bytes(bytes) => Some(bytes),
        }
    }

    pub fn as_constructible(&self) -> Option<&dyn Constructible> {
        match self {
            HostObject::Array(array) => Some(array),
            HostObject::Bytes(bytes) => Some(bytes),
            HostObject::Namespace(_) | HostObject::Error(_) => None,
        }
    }
}

/// The global object seen by the guest at the reserved global handle.
pub fn global() -> HostObject {
    let mut ns = Namespace::new();
    ns.insert("Array", HostObject::Array(JsArray::default()));
    ns.insert("Int8Array", HostObject::Bytes(ByteArray::new(ByteKind::Int8, Vec::new())));
    ns.insert("Uint8Array", HostObject::Bytes(ByteArray::new(ByteKind::Uint8, Vec::new())));
    HostObject::Namespace(ns)
}

/// Plain string-keyed object. Missing keys read as `undefined`.
#[derive(Debug, Default)]
pub struct Namespace {
    entries: BTreeMap<String, SlotValue>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SlotValue>) {
        self.entries.insert(key.into(), value.into());
    }
}

impl PropertySource for Namespace {
    fn property(&self, name: &str) -> SlotValue {
        self.entries
            .get(name)
            .cloned()
            .unwrap_or(SlotValue::Host(HostValue::Undefined))
    }
}

/// Error handed back to the guest when a host operation fails recoverably.
#[derive(Debug, Clone)]
pub struct JsError {
    message: String,
}

impl JsError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.message)
    }
}

impl PropertySource for JsError {
    fn property(&self, name: &str) -> SlotValue {
        match name {
            "message" => SlotValue::from(self.message.as_str()),
            "name" => SlotValue::from("Error"),
            _ => SlotValue::Host(HostValue::Undefined),
        }
    }
}

impl PropertySource for HostFunction {
    fn property(&self, name: &str) -> SlotValue {
        match name {
            "name" => SlotValue::from(self.name()),
            _ => SlotValue::Host(HostValue::Undefined),
        }
    }
}

/// Generic array. Doubles as its own constructor, the way the global
/// `Array` entry is used by the guest.
#[derive(Debug, Clone, Default)]
pub struct JsArray {
    elements: Arc<[Value]>,
}

impl JsArray {
    pub fn new(elements: Vec<Value>) -> Self {
        Self {
            elements: elements.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.elements.get(index)
    }

    fn at(&self) -> HostFunction {
        let elements = Arc::clone(&self.elements);
        HostFunction::new("at", move |args| {
            let len = elements.len() as f64;
            let mut index = args
                .first()
                .map(|arg| to_integer(to_number(arg.get())))
                .unwrap_or(0.0);
            if index < 0.0 {
                index += len;
            }
            if index < 0.0 || index >= len {
                return Ok(SlotValue::Host(HostValue::Undefined));
            }
            Ok(SlotValue::Value(elements[index as usize].clone()))
        })
    }
}

impl PropertySource for JsArray {
    fn property(&self, name: &str) -> SlotValue {
        if let Some(index) = array_index(name) {
            return match self.elements.get(index) {
                Some(element) => SlotValue::Value(element.clone()),
                None => SlotValue::Host(HostValue::Undefined),
            };
        }
        match name {
            "length" => SlotValue::from(self.elements.len() as f64),
            "at" => SlotValue::from(self.at()),
            _ => SlotValue::Host(HostValue::Undefined),
        }
    }
}

impl Constructible for JsArray {
    fn construct(&self, args: &[Value]) -> HostValue {
        HostValue::object(HostObject::Array(JsArray::new(args.to_vec())))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteKind {
    Int8,
    Uint8,
}

impl ByteKind {
    pub fn name(self) -> &'static str {
        match self {
            ByteKind::Int8 => "Int8Array",
            ByteKind::Uint8 => "Uint8Array",
        }
    }
}

/// Typed byte array; construction converts each argument to a byte.
#[derive(Debug, Clone)]
pub struct ByteArray {
    kind: ByteKind,
    bytes: Vec<u8>,
}

impl ByteArray {
    pub fn new(kind: ByteKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    pub fn kind(&self) -> ByteKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn element(&self, byte: u8) -> f64 {
        match self.kind {
            ByteKind::Int8 => byte as i8 as f64,
            ByteKind::Uint8 => byte as f64,
        }
    }
}

impl PropertySource for ByteArray {
    fn property(&self, name: &str) -> SlotValue {
        if let Some(index) = array_index(name) {
            return match self.bytes.get(index) {
                Some(&byte) => SlotValue::from(self.element(byte)),
                None => SlotValue::Host(HostValue::Undefined),
            };
        }
        match name {
            "length" => SlotValue::from(self.bytes.len() as f64),
            _ => SlotValue::Host(HostValue::Undefined),
        }
    }
}

impl Constructible for ByteArray {
    fn construct(&self, args: &[Value]) -> HostValue {
        let bytes = args.iter().map(|arg| to_uint8(to_number(arg.get()))).collect();
        HostValue::object(HostObject::Bytes(ByteArray::new(self.kind, bytes)))
    }
}

/// Canonical array index: digits only, no leading zero unless it is "0".
fn array_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

fn to_number(value: &HostValue) -> f64 {
    match value {
        HostValue::Number(n) => *n,
        HostValue::Bool(true) => 1.0,
        HostValue::Bool(false) | HostValue::Null => 0.0,
        HostValue::String(s) => string_to_number(s),
        _ => f64::NAN,
    }
}

/// JS string-to-number: radix literals, signed `Infinity`, or a decimal
/// literal. Anything else is NaN.
fn string_to_number(s: &str) -> f64 {
    let s = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if s.is_empty() {
        return 0.0;
    }
    let radix = match s.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &s[2..];
        if digits.is_empty() {
            return f64::NAN;
        }
        return digits
            .chars()
            .try_fold(0.0, |acc, c| c.to_digit(radix).map(|d| acc * radix as f64 + d as f64))
            .unwrap_or(f64::NAN);
    }
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned == "Infinity" {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    if !is_decimal_literal(unsigned) {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

fn is_decimal_literal(s: &str) -> bool {
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(at) => (&s[..at], Some(&s[at + 1..])),
        None => (s, None),
    };
    let mut digits = 0;
    let mut dots = 0;
    for c in mantissa.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    if digits == 0 || dots > 1 {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && exp.bytes().all(|b| b.is_ascii_digit())
        }
    }
}

fn to_integer(n: f64) -> f64 {
    if n.is_nan() { 0.0 } else { n.trunc() }
}

fn to_uint8(n: f64) -> u8 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(256.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Ref;

    fn number(id: u32, n: f64) -> Value {
        Value::new(Ref::new(id), HostValue::Number(n))
    }

    #[test]
    fn test_global_has_constructors() {
        let global = global();
        let source = global.as_property_source().expect("global is a property source");
        assert!(global.as_constructible().is_none());
        for name in ["Array", "Int8Array", "Uint8Array"] {
            let entry = source.property(name);
            assert!(entry.host().as_constructible().is_some(), "{name}");
        }
        assert!(matches!(source.property("nope").host(), HostValue::Undefined));
    }

    #[test]
    fn test_array_construct_and_index() {
        let ctor = JsArray::default();
        let built = ctor.construct(&[number(8, 1.0), number(9, 2.0)]);
        let source = built.as_property_source().expect("array");
        assert_eq!(source.property("0").host().as_number(), Some(1.0));
        assert_eq!(source.property("1").host().as_number(), Some(2.0));
        assert_eq!(source.property("0").handle(), Some(Ref::new(8)));
        assert!(matches!(source.property("2").host(), HostValue::Undefined));
        assert!(matches!(source.property("01").host(), HostValue::Undefined));
        assert_eq!(source.property("length").host().as_number(), Some(2.0));

        let HostValue::Object(obj) = &built else {
            panic!("expected object");
        };
        let HostObject::Array(array) = obj.as_ref() else {
            panic!("expected array");
        };
        assert_eq!(array.len(), 2);
        assert!(!array.is_empty());
        assert_eq!(array.get(1).map(Value::id), Some(Ref::new(9)));
        assert!(array.get(2).is_none());
    }

    #[test]
    fn test_array_at_counts_from_end() {
        let array = JsArray::new(vec![number(8, 1.0), number(9, 2.0)]);
        let at = array.property("at");
        let at = at.host().as_function().expect("at is a function");
        let last = at.call(&[number(10, -1.0)]).expect("at(-1)");
        assert_eq!(last.handle(), Some(Ref::new(9)));
        let missing = at.call(&[number(11, 5.0)]).expect("at(5)");
        assert!(matches!(missing.host(), HostValue::Undefined));
    }

    #[test]
    fn test_byte_array_wraps_like_js() {
        let ctor = ByteArray::new(ByteKind::Int8, Vec::new());
        let built = ctor.construct(&[number(8, 200.0), number(9, -1.0), number(10, f64::NAN)]);
        let HostValue::Object(obj) = &built else {
            panic!("expected object");
        };
        let HostObject::Bytes(bytes) = obj.as_ref() else {
            panic!("expected byte array");
        };
        assert_eq!(bytes.bytes(), &[200, 255, 0]);
        assert_eq!(bytes.property("0").host().as_number(), Some(-56.0));
        assert_eq!(bytes.property("1").host().as_number(), Some(-1.0));
    }

    #[test]
    fn test_string_to_number_follows_js() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number("0O17"), 15.0);
        assert_eq!(string_to_number("0b101"), 5.0);
        assert_eq!(string_to_number("-1.5e2"), -150.0);
        assert_eq!(string_to_number(".5"), 0.5);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        for junk in ["inf", "infinity", "nan", "NaN", "0x", "-0x10", "0b2", "1e", ".", "1..2", "12px"] {
            assert!(string_to_number(junk).is_nan(), "{junk:?}");
        }
    }

    #[test]
    fn test_uint8_array_from_hex_string() {
        let ctor = ByteArray::new(ByteKind::Uint8, Vec::new());
        let arg = Value::new(Ref::new(8), HostValue::string("0x10"));
        let HostValue::Object(obj) = ctor.construct(&[arg]) else {
            panic!("expected object");
        };
        let HostObject::Bytes(bytes) = obj.as_ref() else {
            panic!("expected byte array");
        };
        assert_eq!(bytes.bytes(), &[16]);
    }

    #[test]
    fn test_function_exposes_name() {
        let f = HostValue::Function(HostFunction::new("at", |_| Ok(SlotValue::from(0.0))));
        let source = f.as_property_source().expect("function has properties");
        assert_eq!(source.property("name").host().as_str(), Some("at"));
        assert!(matches!(source.property("length").host(), HostValue::Undefined));
        assert!(f.as_constructible().is_none());
    }

    #[test]
    fn test_error_is_not_constructible() {
        let err = HostObject::Error(JsError::new("boom"));
        assert!(err.as_constructible().is_none());
        let source = err.as_property_source().expect("error");
        assert_eq!(source.property("message").host().as_str(), Some("boom"));
    }
}
