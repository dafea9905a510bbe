//! Encoding and decoding of values, one codec per [`SupportedKind`].
//!
//! [`Encoder`] walks a value graph depth-first in a fixed order: init args in
//! order, then properties in insertion order. Before dispatching on kind it
//! asks its [`EncodeTracker`] whether a reference-bearing value was already
//! written; if so it emits a `ref` node and stops.
//!
//! [`Decoder`] mirrors the walk. A reference-bearing node is bound to its id
//! as soon as its shell exists (an empty record, or a freshly constructed
//! instance) and before its children are decoded, so children may point back
//! at it. A `ref` to an id that has not been bound yet is dangling.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::BigInt;
use serde_json::Value as Json;

use crate::error::{GraphError, Result};
use crate::format::{
    self, Envelope, EnvelopeView, JsonObject, array_field, field, id_field, node_tag, object_field,
    str_field,
};
use crate::kind::{REF_TAG, SupportedKind};
use crate::registry::{self, TypeRegistry};
use crate::tracker::{DecodeTracker, EncodeTracker, RefId, Visit};
use crate::value::{ElementType, Fault, InstanceRef, Pattern, RecordRef, TypedArray, Value};

type EncodeFn = fn(&mut Encoder, &Value) -> Result<Json>;
type DecodeFn = fn(&mut Decoder<'_>, &Json) -> Result<Value>;

/// The encode/decode pair of one kind.
pub(crate) struct KindCodec {
    pub(crate) kind: SupportedKind,
    pub(crate) encode: EncodeFn,
    pub(crate) decode: DecodeFn,
}

/// Codec table, laid out in [`SupportedKind::PRECEDENCE`] order.
pub(crate) static CODECS: [KindCodec; 12] = [
    KindCodec { kind: SupportedKind::Instance, encode: encode_instance, decode: decode_instance },
    KindCodec { kind: SupportedKind::Sequence, encode: encode_sequence, decode: decode_sequence },
    KindCodec { kind: SupportedKind::KeyedMap, encode: encode_map, decode: decode_map },
    KindCodec { kind: SupportedKind::UniqueSet, encode: encode_set, decode: decode_set },
    KindCodec { kind: SupportedKind::ByteBuffer, encode: encode_typed_array, decode: decode_typed_array },
    KindCodec { kind: SupportedKind::Timestamp, encode: encode_date, decode: decode_date },
    KindCodec { kind: SupportedKind::Pattern, encode: encode_pattern, decode: decode_pattern },
    KindCodec { kind: SupportedKind::Fault, encode: encode_fault, decode: decode_fault },
    KindCodec { kind: SupportedKind::BigInteger, encode: encode_bigint, decode: decode_bigint },
    KindCodec { kind: SupportedKind::Absent, encode: encode_absent, decode: decode_absent },
    KindCodec { kind: SupportedKind::Scalar, encode: encode_scalar, decode: decode_scalar },
    KindCodec { kind: SupportedKind::PlainRecord, encode: encode_record, decode: decode_record },
];

/// Looks up the codec of `kind`.
pub(crate) fn codec(kind: SupportedKind) -> &'static KindCodec {
    let entry = &CODECS[kind.index()];
    debug_assert_eq!(entry.kind, kind);
    entry
}

/// Payload arm of a codec received a value of another kind. Only reachable
/// if the table and the classifier disagree.
fn mismatch(kind: SupportedKind, value: &Value) -> GraphError {
    GraphError::unsupported(format!("{} routed to the {kind:?} codec", value.kind_name()))
}

// --- Encoding ---

/// Serializes one graph. Owns the id allocation for the whole document.
#[derive(Debug, Default)]
pub struct Encoder {
    tracker: EncodeTracker,
}

impl Encoder {
    /// Creates an encoder with a fresh tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids assigned so far.
    pub fn ids_assigned(&self) -> usize {
        self.tracker.len()
    }

    /// Encodes the root instance. The root takes id 0, so nodes inside it may
    /// refer back to it.
    pub fn encode_root(&mut self, root: &InstanceRef) -> Result<Envelope> {
        self.tracker.visit(root.addr());
        self.encode_envelope(root)
    }

    fn encode_envelope(&mut self, instance: &InstanceRef) -> Result<Envelope> {
        let inner = instance.borrow();

        let serialize_init_args = inner
            .init_args
            .iter()
            .map(|arg| self.encode_value(arg))
            .collect::<Result<Vec<_>>>()?;

        let mut properties = JsonObject::new();
        for (key, value) in &inner.properties {
            properties.insert(key.clone(), self.encode_value(value)?);
        }

        Ok(Envelope {
            class_name: inner.class_name.clone(),
            serialize_init_args,
            properties,
        })
    }

    /// Encodes any value reachable from the root.
    pub fn encode_value(&mut self, value: &Value) -> Result<Json> {
        if let Some(id) = value.identity().and_then(|addr| self.tracker.lookup(addr)) {
            return Ok(format::ref_node(id));
        }
        let kind = SupportedKind::classify(value)
            .ok_or_else(|| GraphError::unsupported(value.kind_name()))?;
        (codec(kind).encode)(self, value)
    }

    /// Assigns the id of a reference-bearing value on its first visit.
    fn first_visit(&mut self, addr: usize) -> RefId {
        match self.tracker.visit(addr) {
            Visit::First(id) | Visit::Seen(id) => id,
        }
    }

    fn encode_list(&mut self, items: &[Value]) -> Result<Json> {
        items
            .iter()
            .map(|item| self.encode_value(item))
            .collect::<Result<Vec<_>>>()
            .map(Json::Array)
    }
}

fn tagged_data(kind: SupportedKind, data: Json) -> Json {
    let mut node = format::tagged(kind.tag().unwrap_or_default());
    node.insert("data".to_owned(), data);
    Json::Object(node)
}

fn encode_instance(enc: &mut Encoder, value: &Value) -> Result<Json> {
    let Value::Instance(instance) = value else {
        return Err(mismatch(SupportedKind::Instance, value));
    };
    let id = enc.first_visit(instance.addr());
    let envelope = enc.encode_envelope(instance)?;
    let mut node = format::tagged_with_id("Serializable", id);
    node.insert("data".to_owned(), envelope.into_json());
    Ok(Json::Object(node))
}

fn encode_record(enc: &mut Encoder, value: &Value) -> Result<Json> {
    let Value::Record(record) = value else {
        return Err(mismatch(SupportedKind::PlainRecord, value));
    };
    let id = enc.first_visit(record.addr());
    let fields = record.borrow();

    let mut data = JsonObject::new();
    for (key, field) in fields.iter() {
        if let Value::Function(name) = field {
            tracing::warn!(field = %key, function = %name, "dropping function-valued record field");
            continue;
        }
        data.insert(key.clone(), enc.encode_value(field)?);
    }

    let mut node = format::tagged_with_id("Object", id);
    node.insert("data".to_owned(), Json::Object(data));
    Ok(Json::Object(node))
}

fn encode_sequence(enc: &mut Encoder, value: &Value) -> Result<Json> {
    let Value::Array(items) = value else {
        return Err(mismatch(SupportedKind::Sequence, value));
    };
    Ok(tagged_data(SupportedKind::Sequence, enc.encode_list(items)?))
}

fn encode_map(enc: &mut Encoder, value: &Value) -> Result<Json> {
    let Value::Map(pairs) = value else {
        return Err(mismatch(SupportedKind::KeyedMap, value));
    };
    let entries = unique_pairs(pairs)
        .into_iter()
        .map(|(k, v)| Ok(Json::Array(vec![enc.encode_value(k)?, enc.encode_value(v)?])))
        .collect::<Result<Vec<_>>>()?;
    Ok(tagged_data(SupportedKind::KeyedMap, Json::Array(entries)))
}

fn encode_set(enc: &mut Encoder, value: &Value) -> Result<Json> {
    let Value::Set(items) = value else {
        return Err(mismatch(SupportedKind::UniqueSet, value));
    };
    let data = unique_items(items)
        .into_iter()
        .map(|item| enc.encode_value(item))
        .collect::<Result<Vec<_>>>()?;
    Ok(tagged_data(SupportedKind::UniqueSet, Json::Array(data)))
}

/// Map entries with duplicate keys collapsed, as [`Value::map`] would build
/// them. The variant itself does not enforce it.
fn unique_pairs(pairs: &[(Value, Value)]) -> Vec<(&Value, &Value)> {
    let mut unique: Vec<(&Value, &Value)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        match unique.iter_mut().find(|(k, _)| k.same_value_zero(key)) {
            Some(slot) => slot.1 = value,
            None => unique.push((key, value)),
        }
    }
    unique
}

/// Set items without later duplicates, as [`Value::set`] would build them.
fn unique_items(items: &[Value]) -> Vec<&Value> {
    let mut unique: Vec<&Value> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.iter().any(|u| u.same_value_zero(item)) {
            unique.push(item);
        }
    }
    unique
}

fn encode_typed_array(_: &mut Encoder, value: &Value) -> Result<Json> {
    let Value::TypedArray(buffer) = value else {
        return Err(mismatch(SupportedKind::ByteBuffer, value));
    };
    let mut node = format::tagged("TypedArray");
    node.insert("constructor".to_owned(), Json::from(buffer.element().name()));
    node.insert(
        "data".to_owned(),
        Json::Array(buffer.values().iter().copied().map(format::number_to_json).collect()),
    );
    Ok(Json::Object(node))
}

fn encode_date(_: &mut Encoder, value: &Value) -> Result<Json> {
    let Value::Date(date) = value else {
        return Err(mismatch(SupportedKind::Timestamp, value));
    };
    let iso = date.to_rfc3339_opts(SecondsFormat::Millis, true);
    Ok(tagged_data(SupportedKind::Timestamp, Json::from(iso)))
}

fn encode_pattern(_: &mut Encoder, value: &Value) -> Result<Json> {
    let Value::RegExp(pattern) = value else {
        return Err(mismatch(SupportedKind::Pattern, value));
    };
    let mut node = format::tagged("RegExp");
    node.insert("source".to_owned(), Json::from(pattern.source()));
    node.insert("flags".to_owned(), Json::from(pattern.flags()));
    Ok(Json::Object(node))
}

fn encode_fault(_: &mut Encoder, value: &Value) -> Result<Json> {
    let Value::Error(fault) = value else {
        return Err(mismatch(SupportedKind::Fault, value));
    };
    let mut node = format::tagged("Error");
    node.insert("name".to_owned(), Json::from(fault.name.as_str()));
    node.insert("message".to_owned(), Json::from(fault.message.as_str()));
    if let Some(stack) = &fault.stack {
        node.insert("stack".to_owned(), Json::from(stack.as_str()));
    }
    Ok(Json::Object(node))
}

fn encode_bigint(_: &mut Encoder, value: &Value) -> Result<Json> {
    let Value::BigInt(n) = value else {
        return Err(mismatch(SupportedKind::BigInteger, value));
    };
    Ok(tagged_data(SupportedKind::BigInteger, Json::from(n.to_string())))
}

fn encode_absent(_: &mut Encoder, _: &Value) -> Result<Json> {
    Ok(Json::Object(format::tagged("undefined")))
}

fn encode_scalar(_: &mut Encoder, value: &Value) -> Result<Json> {
    match value {
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Number(n) => Ok(format::number_to_json(*n)),
        Value::String(s) => Ok(Json::from(s.as_str())),
        other => Err(mismatch(SupportedKind::Scalar, other)),
    }
}

// --- Decoding ---

/// Deserializes one document against a registry.
#[derive(Debug)]
pub struct Decoder<'r> {
    registry: &'r TypeRegistry,
    tracker: DecodeTracker,
}

impl<'r> Decoder<'r> {
    /// Creates a decoder with a fresh resolution map.
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            tracker: DecodeTracker::new(),
        }
    }

    /// Number of ids materialized so far.
    pub fn ids_defined(&self) -> usize {
        self.tracker.len()
    }

    /// Decodes the root envelope, binding the root under id 0.
    pub fn decode_root(&mut self, envelope: EnvelopeView<'_>) -> Result<InstanceRef> {
        self.decode_envelope(RefId::ROOT, envelope)
    }

    fn decode_envelope(&mut self, id: RefId, envelope: EnvelopeView<'_>) -> Result<InstanceRef> {
        let constructor = self.registry.resolve(envelope.class_name)?;

        let args = envelope
            .serialize_init_args
            .iter()
            .map(|node| self.decode_value(node))
            .collect::<Result<Vec<_>>>()?;

        let instance = registry::build(envelope.class_name, &constructor, args)?;
        self.tracker.define(id, Value::Instance(instance.clone()))?;

        for (key, node) in envelope.properties {
            let value = self.decode_value(node)?;
            instance.set(key.clone(), value);
        }
        Ok(instance)
    }

    /// Decodes any node.
    pub fn decode_value(&mut self, node: &Json) -> Result<Value> {
        match node {
            Json::Object(object) => {
                let tag = node_tag(object)?;
                if tag == REF_TAG {
                    return self.tracker.resolve(id_field(object)?);
                }
                let kind = SupportedKind::from_tag(tag)
                    .ok_or_else(|| GraphError::malformed(format!("unknown node tag {tag:?}")))?;
                (codec(kind).decode)(self, node)
            }
            Json::Array(_) => Err(GraphError::malformed("untagged array node")),
            _ => (codec(SupportedKind::Scalar).decode)(self, node),
        }
    }

    fn decode_list(&mut self, items: &[Json]) -> Result<Vec<Value>> {
        items.iter().map(|item| self.decode_value(item)).collect()
    }
}

fn as_tagged(node: &Json) -> Result<&JsonObject> {
    node.as_object()
        .ok_or_else(|| GraphError::malformed(format!("expected a tagged node, found {}", format::json_kind(node))))
}

fn decode_instance(dec: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    let object = as_tagged(node)?;
    let id = id_field(object)?;
    let payload = format::nested_payload(field(object, "data")?)?;
    dec.decode_envelope(id, EnvelopeView::new(&payload)?).map(Value::Instance)
}

fn decode_record(dec: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    let object = as_tagged(node)?;
    let id = id_field(object)?;
    let data = object_field(object, "data")?;

    let record = RecordRef::new();
    dec.tracker.define(id, Value::Record(record.clone()))?;
    for (key, field) in data {
        let value = dec.decode_value(field)?;
        record.set(key.clone(), value);
    }
    Ok(Value::Record(record))
}

fn decode_sequence(dec: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    let items = array_field(as_tagged(node)?, "data")?;
    dec.decode_list(items).map(Value::Array)
}

fn decode_map(dec: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    let entries = array_field(as_tagged(node)?, "data")?;
    let mut pairs = Vec::with_capacity(entries.len());
    for entry in entries {
        let (key, value) = format::map_entry(entry)?;
        pairs.push((dec.decode_value(key)?, dec.decode_value(value)?));
    }
    Ok(Value::map(pairs))
}

fn decode_set(dec: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    let items = array_field(as_tagged(node)?, "data")?;
    dec.decode_list(items).map(Value::set)
}

fn decode_typed_array(_: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    let object = as_tagged(node)?;
    let name = str_field(object, "constructor")?;
    let element = ElementType::from_name(name)
        .ok_or_else(|| GraphError::malformed(format!("unknown typed array constructor {name:?}")))?;
    let values = array_field(object, "data")?
        .iter()
        .map(|n| match n {
            // the grammar writes NaN and infinities as null; the typed array
            // constructor reads null as 0
            Json::Null => Ok(0.0),
            other => other
                .as_f64()
                .ok_or_else(|| GraphError::malformed("typed array data must be numeric")),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::TypedArray(TypedArray::new(element, values)))
}

fn decode_date(_: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    let iso = str_field(as_tagged(node)?, "data")?;
    let date = DateTime::parse_from_rfc3339(iso)
        .map_err(|e| GraphError::malformed(format!("invalid timestamp {iso:?}: {e}")))?;
    Ok(Value::from(date.with_timezone(&Utc)))
}

fn decode_pattern(_: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    let object = as_tagged(node)?;
    let pattern = Pattern::new(str_field(object, "source")?, str_field(object, "flags")?)?;
    Ok(Value::RegExp(pattern))
}

fn decode_fault(_: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    let object = as_tagged(node)?;
    let mut fault = Fault::new(str_field(object, "name")?, str_field(object, "message")?);
    match object.get("stack") {
        None | Some(Json::Null) => {}
        Some(Json::String(stack)) => fault.stack = Some(stack.clone()),
        Some(_) => return Err(GraphError::malformed("field \"stack\" must be a string")),
    }
    Ok(Value::Error(fault))
}

fn decode_bigint(_: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    let digits = str_field(as_tagged(node)?, "data")?;
    BigInt::from_str(digits)
        .map(Value::BigInt)
        .map_err(|e| GraphError::malformed(format!("invalid big integer {digits:?}: {e}")))
}

fn decode_absent(_: &mut Decoder<'_>, _: &Json) -> Result<Value> {
    Ok(Value::Undefined)
}

fn decode_scalar(_: &mut Decoder<'_>, node: &Json) -> Result<Value> {
    match node {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => n
            .as_f64()
            .map(Value::Number)
            .ok_or_else(|| GraphError::malformed(format!("number {n} out of range"))),
        Json::String(s) => Ok(Value::String(s.clone())),
        other => Err(GraphError::malformed(format!(
            "expected a scalar, found {}",
            format::json_kind(other)
        ))),
    }
}
