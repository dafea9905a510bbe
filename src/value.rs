//! The host object model that objgraph serializes.
//!
//! [`Value`] is a dynamically-typed value. Most variants are owned data: two
//! arrays that look alike are simply two arrays. Plain records ([`RecordRef`])
//! and class instances ([`InstanceRef`]) are shared handles instead, so a graph
//! built from them can alias and can contain cycles. Those two are the only
//! reference-bearing kinds the serializer tracks by identity.
//!
//! # Example
//!
//! ```
//! use objgraph::{RecordRef, Value};
//!
//! let record = RecordRef::new();
//! record.set("name", "Alice");
//! record.set("tags", Value::Array(vec!["a".into(), "b".into()]));
//!
//! // Aliasing: both values point at the same record.
//! let first = Value::from(record.clone());
//! let second = Value::from(record);
//! assert!(first.same_value_zero(&second));
//! ```

use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::error::{GraphError, Result};

/// Ordered own-property mapping of a record or an instance.
pub type Properties = IndexMap<String, Value>;

/// A dynamically-typed value.
///
/// | Variant | Wire tag | Tracked by identity |
/// |---------|----------|---------------------|
/// | `Undefined` | `undefined` | no |
/// | `Null`, `Bool`, `Number`, `String` | (bare scalar) | no |
/// | `BigInt` | `BigInt` | no |
/// | `Date` | `Date` | no |
/// | `RegExp` | `RegExp` | no |
/// | `Error` | `Error` | no |
/// | `TypedArray` | `TypedArray` | no |
/// | `Array` | `Array` | no |
/// | `Map` | `Map` | no |
/// | `Set` | `Set` | no |
/// | `Record` | `Object` | yes |
/// | `Instance` | `Serializable` | yes |
/// | `Function`, `Foreign` | none, unencodable | - |
#[derive(Clone)]
pub enum Value {
    /// Explicit "no value", distinct from `Null`.
    Undefined,
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Double-precision number.
    Number(f64),
    /// UTF-8 string.
    String(String),
    /// Arbitrary-precision integer.
    BigInt(BigInt),
    /// Point in time with millisecond precision. [`Value::from`] truncates
    /// finer timestamps; the wire format cannot carry them.
    Date(DateTime<Utc>),
    /// Regular expression source and flags.
    RegExp(Pattern),
    /// Error object.
    Error(Fault),
    /// Fixed-element numeric buffer.
    TypedArray(TypedArray),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// Insertion-ordered key/value pairs with unique keys. Build through
    /// [`Value::map`]; duplicate keys are collapsed on encode.
    Map(Vec<(Value, Value)>),
    /// Insertion-ordered unique items. Build through [`Value::set`];
    /// duplicates are dropped on encode.
    Set(Vec<Value>),
    /// Plain key/value record.
    Record(RecordRef),
    /// Instance of a registered class.
    Instance(InstanceRef),
    /// A callable. Carries the function name for diagnostics.
    Function(String),
    /// A host object with no encoding. Carries its runtime type name.
    Foreign(String),
}

impl Value {
    /// Builds a `Map`, keeping the first position of each key and the last
    /// value written for it.
    pub fn map<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        let mut pairs: Vec<(Value, Value)> = Vec::new();
        for (key, value) in entries {
            match pairs.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
                Some(slot) => slot.1 = value,
                None => pairs.push((key, value)),
            }
        }
        Self::Map(pairs)
    }

    /// Builds a `Set`, dropping later duplicates.
    pub fn set<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.iter().any(|u| u.same_value_zero(&item)) {
                unique.push(item);
            }
        }
        Self::Set(unique)
    }

    /// Runtime kind name, used in diagnostics.
    pub fn kind_name(&self) -> String {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(_) => "boolean".into(),
            Self::Number(_) => "number".into(),
            Self::String(_) => "string".into(),
            Self::BigInt(_) => "BigInt".into(),
            Self::Date(_) => "Date".into(),
            Self::RegExp(_) => "RegExp".into(),
            Self::Error(f) => f.name.clone(),
            Self::TypedArray(t) => t.element().name().into(),
            Self::Array(_) => "Array".into(),
            Self::Map(_) => "Map".into(),
            Self::Set(_) => "Set".into(),
            Self::Record(_) => "Object".into(),
            Self::Instance(i) => i.class_name(),
            Self::Function(_) => "Function".into(),
            Self::Foreign(name) => name.clone(),
        }
    }

    /// Identity key of a reference-bearing value, `None` for everything else.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Self::Record(r) => Some(r.addr()),
            Self::Instance(i) => Some(i.addr()),
            _ => None,
        }
    }

    /// Returns `true` for `Undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns `true` for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number if this is a `Number`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the elements if this is an `Array`.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the record handle if this is a `Record`.
    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the instance handle if this is an `Instance`.
    pub fn as_instance(&self) -> Option<&InstanceRef> {
        match self {
            Self::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// Key equality used by `Map` and `Set`: identity for records and
    /// instances, `NaN` equal to itself, and structural equality otherwise.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Record(a), Self::Record(b)) => a.ptr_eq(b),
            (Self::Instance(a), Self::Instance(b)) => a.ptr_eq(b),
            (Self::Record(_) | Self::Instance(_), _) | (_, Self::Record(_) | Self::Instance(_)) => {
                false
            }
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality. Cycles are compared coinductively, so two cyclic
    /// graphs of the same shape are equal.
    fn eq(&self, other: &Self) -> bool {
        StructuralEq::default().values(self, other)
    }
}

/// Pairs of handles assumed equal while a comparison is in flight.
#[derive(Default, Clone)]
struct StructuralEq {
    assumed: HashSet<(usize, usize)>,
}

impl StructuralEq {
    fn values(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
            (Value::String(x), Value::String(y)) => x == y,
            (Value::BigInt(x), Value::BigInt(y)) => x == y,
            (Value::Date(x), Value::Date(y)) => x == y,
            (Value::RegExp(x), Value::RegExp(y)) => x == y,
            (Value::Error(x), Value::Error(y)) => x == y,
            (Value::TypedArray(x), Value::TypedArray(y)) => x == y,
            (Value::Function(x), Value::Function(y)) => x == y,
            (Value::Foreign(x), Value::Foreign(y)) => x == y,
            (Value::Array(x), Value::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(l, r)| self.values(l, r))
            }
            (Value::Map(x), Value::Map(y)) => {
                x.len() == y.len()
                    && x
                        .iter()
                        .zip(y)
                        .all(|((lk, lv), (rk, rv))| self.values(lk, rk) && self.values(lv, rv))
            }
            (Value::Set(x), Value::Set(y)) => {
                x.len() == y.len() && x.iter().all(|item| self.contains(y, item))
            }
            (Value::Record(x), Value::Record(y)) => {
                if x.ptr_eq(y) || !self.assume(x.addr(), y.addr()) {
                    return true;
                }
                let (lhs, rhs) = (x.borrow(), y.borrow());
                self.properties(&lhs, &rhs)
            }
            (Value::Instance(x), Value::Instance(y)) => {
                if x.ptr_eq(y) || !self.assume(x.addr(), y.addr()) {
                    return true;
                }
                let (lhs, rhs) = (x.borrow(), y.borrow());
                lhs.class_name == rhs.class_name
                    && lhs.init_args.len() == rhs.init_args.len()
                    && lhs
                        .init_args
                        .iter()
                        .zip(&rhs.init_args)
                        .all(|(l, r)| self.values(l, r))
                    && self.properties(&lhs.properties, &rhs.properties)
            }
            _ => false,
        }
    }

    /// Records the pair as assumed-equal. Returns `false` if it already was.
    fn assume(&mut self, a: usize, b: usize) -> bool {
        self.assumed.insert((a, b))
    }

    fn properties(&mut self, lhs: &Properties, rhs: &Properties) -> bool {
        lhs.len() == rhs.len()
            && lhs
                .iter()
                .all(|(key, l)| rhs.get(key).is_some_and(|r| self.values(l, r)))
    }

    /// Set membership. Failed candidates must not leak assumptions.
    fn contains(&mut self, haystack: &[Value], needle: &Value) -> bool {
        for candidate in haystack {
            let mut trial = self.clone();
            if trial.values(needle, candidate) {
                *self = trial;
                return true;
            }
        }
        false
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::BigInt(n) => write!(f, "BigInt({n})"),
            Self::Date(d) => write!(f, "Date({})", d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::RegExp(p) => write!(f, "RegExp({p})"),
            Self::Error(e) => write!(f, "Error({}: {})", e.name, e.message),
            Self::TypedArray(t) => f.debug_tuple(t.element().name()).field(&t.values).finish(),
            Self::Array(items) => f.debug_list().entries(items).finish(),
            Self::Map(pairs) => f.debug_map().entries(pairs.iter().map(|(k, v)| (k, v))).finish(),
            Self::Set(items) => f.debug_set().entries(items).finish(),
            Self::Record(r) => r.fmt(f),
            Self::Instance(i) => i.fmt(f),
            Self::Function(name) => write!(f, "Function({name})"),
            Self::Foreign(name) => write!(f, "Foreign({name})"),
        }
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Self::Number(f64::from(n))
                }
            }
        )*
    }
}

impl_from_number!(f64, f32, i32, u32, i16, u16, i8, u8);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Self::BigInt(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d.trunc_subsecs(3))
    }
}

impl From<Pattern> for Value {
    fn from(p: Pattern) -> Self {
        Self::RegExp(p)
    }
}

impl From<Fault> for Value {
    fn from(f: Fault) -> Self {
        Self::Error(f)
    }
}

impl From<TypedArray> for Value {
    fn from(t: TypedArray) -> Self {
        Self::TypedArray(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<RecordRef> for Value {
    fn from(r: RecordRef) -> Self {
        Self::Record(r)
    }
}

impl From<InstanceRef> for Value {
    fn from(i: InstanceRef) -> Self {
        Self::Instance(i)
    }
}

// --- Records ---

/// Shared handle to a plain key/value record.
///
/// Cloning the handle aliases the record. Collecting an iterator of fields
/// builds an independent one.
#[derive(Clone, Default)]
pub struct RecordRef(Rc<RefCell<Properties>>);

impl RecordRef {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a field.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    /// Writes a field, keeping its position if it already exists.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().insert(key.into(), value.into());
    }

    /// Removes a field, preserving the order of the others.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().shift_remove(key)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Borrows the field map.
    pub fn borrow(&self) -> Ref<'_, Properties> {
        self.0.borrow()
    }

    /// Returns `true` if both handles point at the same record.
    pub fn ptr_eq(&self, other: &RecordRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl FromIterator<(String, Value)> for RecordRef {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(Rc::new(RefCell::new(iter.into_iter().collect())))
    }
}

impl fmt::Debug for RecordRef {
    // Shallow: records may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(fields) => write!(f, "Record@{:#x}{:?}", self.addr(), fields.keys().collect::<Vec<_>>()),
            Err(_) => write!(f, "Record@{:#x}(borrowed)", self.addr()),
        }
    }
}

// --- Instances ---

/// A constructed instance of a registered class.
#[derive(Debug)]
pub struct Instance {
    pub(crate) class_name: String,
    pub(crate) init_args: Vec<Value>,
    pub(crate) properties: Properties,
}

impl Instance {
    /// Name of the class this instance was constructed from.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Arguments captured at construction time.
    pub fn init_args(&self) -> &[Value] {
        &self.init_args
    }

    /// Current own properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// Shared handle to an [`Instance`].
///
/// Instances are created through [`crate::TypeRegistry`]; the handle only
/// exposes property access afterwards.
#[derive(Clone)]
pub struct InstanceRef(Rc<RefCell<Instance>>);

impl InstanceRef {
    pub(crate) fn from_parts(class_name: String, init_args: Vec<Value>, properties: Properties) -> Self {
        Self(Rc::new(RefCell::new(Instance {
            class_name,
            init_args,
            properties,
        })))
    }

    /// Name of the class this instance was constructed from.
    pub fn class_name(&self) -> String {
        self.0.borrow().class_name.clone()
    }

    /// Arguments captured at construction time.
    pub fn init_args(&self) -> Vec<Value> {
        self.0.borrow().init_args.clone()
    }

    /// Reads a property.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().properties.get(key).cloned()
    }

    /// Writes a property, keeping its position if it already exists.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().properties.insert(key.into(), value.into());
    }

    /// Borrows the instance.
    pub fn borrow(&self) -> Ref<'_, Instance> {
        self.0.borrow()
    }

    /// Returns `true` if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &InstanceRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(inner) => write!(f, "{}@{:#x}", inner.class_name, self.addr()),
            Err(_) => write!(f, "Instance@{:#x}(borrowed)", self.addr()),
        }
    }
}

// --- Patterns ---

/// Regular expression flags in canonical order.
const PATTERN_FLAGS: &str = "dgimsuvy";

/// A regular expression as source text plus flags.
///
/// Flags are validated and stored in canonical order, so `"gi"` and `"ig"`
/// produce equal patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    source: String,
    flags: String,
}

impl Pattern {
    /// Creates a pattern, rejecting unknown or repeated flags.
    pub fn new(source: impl Into<String>, flags: &str) -> Result<Self> {
        for (i, c) in flags.char_indices() {
            if !PATTERN_FLAGS.contains(c) {
                return Err(GraphError::malformed(format!("invalid regular expression flag {c:?}")));
            }
            if flags[..i].contains(c) {
                return Err(GraphError::malformed(format!("duplicate regular expression flag {c:?}")));
            }
        }
        let flags = PATTERN_FLAGS.chars().filter(|c| flags.contains(*c)).collect();
        Ok(Self {
            source: source.into(),
            flags,
        })
    }

    /// Pattern source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Flags in canonical order.
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Compiles the pattern with the `regex` crate.
    ///
    /// `i`, `m` and `s` become inline flags. The remaining flags only affect
    /// matching state (`g`, `y`, `d`) or unicode mode, which `regex` always has.
    pub fn to_regex(&self) -> Result<regex::Regex> {
        let inline: String = self.flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
        let source = if inline.is_empty() {
            self.source.clone()
        } else {
            format!("(?{inline}){}", self.source)
        };
        regex::Regex::new(&source).map_err(|e| GraphError::malformed(e.to_string()))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

// --- Faults ---

/// An error object: name, message and an optional stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Error class name, e.g. `TypeError`.
    pub name: String,
    /// Human-readable message.
    pub message: String,
    /// Captured stack trace, if any.
    pub stack: Option<String>,
}

impl Fault {
    /// Creates a fault without a stack trace.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Attaches a stack trace.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

// --- Typed arrays ---

/// Element type of a [`TypedArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 8-bit signed integers.
    Int8,
    /// 8-bit unsigned integers.
    Uint8,
    /// 8-bit unsigned integers, clamped on write.
    Uint8Clamped,
    /// 16-bit signed integers.
    Int16,
    /// 16-bit unsigned integers.
    Uint16,
    /// 32-bit signed integers.
    Int32,
    /// 32-bit unsigned integers.
    Uint32,
    /// 32-bit floats.
    Float32,
    /// 64-bit floats.
    Float64,
}

impl ElementType {
    /// All element types.
    pub const ALL: [ElementType; 9] = [
        Self::Int8,
        Self::Uint8,
        Self::Uint8Clamped,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Float32,
        Self::Float64,
    ];

    /// Constructor name written on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int8 => "Int8Array",
            Self::Uint8 => "Uint8Array",
            Self::Uint8Clamped => "Uint8ClampedArray",
            Self::Int16 => "Int16Array",
            Self::Uint16 => "Uint16Array",
            Self::Int32 => "Int32Array",
            Self::Uint32 => "Uint32Array",
            Self::Float32 => "Float32Array",
            Self::Float64 => "Float64Array",
        }
    }

    /// Looks up an element type by constructor name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Converts a number to what this element type would store.
    pub fn coerce(self, v: f64) -> f64 {
        match self {
            Self::Int8 => wrap_integer(v, 8, true),
            Self::Uint8 => wrap_integer(v, 8, false),
            Self::Uint8Clamped => clamp_u8(v),
            Self::Int16 => wrap_integer(v, 16, true),
            Self::Uint16 => wrap_integer(v, 16, false),
            Self::Int32 => wrap_integer(v, 32, true),
            Self::Uint32 => wrap_integer(v, 32, false),
            Self::Float32 => f64::from(v as f32),
            Self::Float64 => v,
        }
    }
}

/// Modular integer conversion; non-finite input stores 0.
fn wrap_integer(v: f64, bits: i32, signed: bool) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    let modulus = 2f64.powi(bits);
    let mut int = v.trunc() % modulus;
    if int < 0.0 {
        int += modulus;
    }
    if signed && int >= modulus / 2.0 {
        int -= modulus;
    }
    // normalizes -0
    int + 0.0
}

/// Clamp to 0..=255, rounding half to even.
fn clamp_u8(v: f64) -> f64 {
    if v.is_nan() || v <= 0.0 {
        return 0.0;
    }
    if v >= 255.0 {
        return 255.0;
    }
    let floor = v.floor();
    let diff = v - floor;
    if diff > 0.5 || (diff == 0.5 && floor % 2.0 != 0.0) {
        floor + 1.0
    } else {
        floor
    }
}

/// A numeric buffer with a fixed element type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedArray {
    element: ElementType,
    values: Vec<f64>,
}

impl TypedArray {
    /// Creates a buffer, coercing every value to the element type.
    pub fn new(element: ElementType, values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            element,
            values: values.into_iter().map(|v| element.coerce(v)).collect(),
        }
    }

    /// Element type.
    pub fn element(&self) -> ElementType {
        self.element
    }

    /// Stored values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_records_compare_structurally() {
        let a = RecordRef::new();
        a.set("self", a.clone());
        let b = RecordRef::new();
        b.set("self", b.clone());
        assert_eq!(Value::from(a), Value::from(b));
    }

    #[test]
    fn sets_ignore_order_but_arrays_do_not() {
        let s1 = Value::set(vec![1.into(), 2.into(), 3.into()]);
        let s2 = Value::set(vec![3.into(), 1.into(), 2.into()]);
        assert_eq!(s1, s2);

        let a1 = Value::Array(vec![1.into(), 2.into()]);
        let a2 = Value::Array(vec![2.into(), 1.into()]);
        assert_ne!(a1, a2);
    }

    #[test]
    fn set_and_map_deduplicate_keys() {
        let set = Value::set(vec!["a".into(), "a".into(), f64::NAN.into(), f64::NAN.into()]);
        assert_eq!(set, Value::Set(vec!["a".into(), f64::NAN.into()]));

        let map = Value::map(vec![
            ("k".into(), 1.into()),
            ("j".into(), 2.into()),
            ("k".into(), 3.into()),
        ]);
        assert_eq!(map, Value::Map(vec![("k".into(), 3.into()), ("j".into(), 2.into())]));
    }

    #[test]
    fn distinct_records_are_distinct_set_members() {
        let r1 = RecordRef::new();
        let r2 = RecordRef::new();
        let set = Value::set(vec![r1.clone().into(), r2.into(), r1.into()]);
        assert!(matches!(set, Value::Set(ref items) if items.len() == 2));
    }

    #[test]
    fn pattern_flags_are_canonical_and_validated() -> Result<()> {
        let p = Pattern::new("a+b", "ig")?;
        assert_eq!(p.flags(), "gi");
        assert_eq!(p, Pattern::new("a+b", "gi")?);
        assert!(Pattern::new("x", "gg").is_err());
        assert!(Pattern::new("x", "q").is_err());

        let re = Pattern::new("hello", "i")?.to_regex()?;
        assert!(re.is_match("HeLLo"));
        Ok(())
    }

    #[test]
    fn typed_arrays_coerce_like_their_element_type() {
        let i8s = TypedArray::new(ElementType::Int8, [127.0, 128.0, -129.0, 3.7, f64::NAN]);
        assert_eq!(i8s.values(), &[127.0, -128.0, 127.0, 3.0, 0.0]);

        let clamped = TypedArray::new(ElementType::Uint8Clamped, [-5.0, 300.0, 1.5, 2.5, 2.6]);
        assert_eq!(clamped.values(), &[0.0, 255.0, 2.0, 2.0, 3.0]);

        let u16s = TypedArray::new(ElementType::Uint16, [-1.0, 65536.0]);
        assert_eq!(u16s.values(), &[65535.0, 0.0]);

        assert_eq!(ElementType::from_name("Float32Array"), Some(ElementType::Float32));
        assert_eq!(ElementType::from_name("BigInt64Array"), None);
    }

    #[test]
    fn dates_keep_millisecond_precision() {
        use chrono::TimeZone;

        let fine = Utc
            .timestamp_opt(1_700_000_000, 123_456_789)
            .single()
            .expect("timestamp is in range");
        assert!(matches!(
            Value::from(fine),
            Value::Date(stored) if stored.timestamp_subsec_nanos() == 123_000_000
        ));
        assert_eq!(format!("{:?}", Value::Date(fine)), "Date(2023-11-14T22:13:20.123456789Z)");
    }

    #[test]
    fn debug_output_survives_cycles() {
        let r = RecordRef::new();
        r.set("me", r.clone());
        let rendered = format!("{:?}", Value::from(r));
        assert!(rendered.starts_with("Record@"));
    }
}
