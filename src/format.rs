//! The textual layout of a serialized graph.
//!
//! A document is one JSON object, the *envelope* of the root instance:
//!
//! ```text
//! { "className": "...", "serializeInitArgs": [node, ...], "properties": { "key": node, ... } }
//! ```
//!
//! A *node* is either a bare JSON scalar (string, number, boolean, null) or an
//! object carrying a `__type` discriminator:
//!
//! ```text
//! {"__type":"ref","id":3}
//! {"__type":"Serializable","id":1,"data":<envelope>}
//! {"__type":"Object","id":2,"data":{"key":node}}
//! {"__type":"Array","data":[node]}
//! {"__type":"Map","data":[[node,node]]}
//! {"__type":"Set","data":[node]}
//! {"__type":"TypedArray","constructor":"Uint8Array","data":[1,2]}
//! {"__type":"Date","data":"2024-01-01T00:00:00.000Z"}
//! {"__type":"RegExp","source":"a+","flags":"gi"}
//! {"__type":"Error","name":"TypeError","message":"...","stack":"..."}
//! {"__type":"BigInt","data":"123456789012345678901234567890"}
//! {"__type":"undefined"}
//! ```
//!
//! Nested `Serializable` payloads are full envelopes. Producers that embed
//! them as a JSON *string* holding the envelope are accepted on read.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as Json};

use crate::error::{GraphError, Result};
use crate::kind::{REF_TAG, TYPE_FIELD};
use crate::tracker::RefId;

/// JSON object type used for tagged nodes.
pub type JsonObject = Map<String, Json>;

/// Largest integer a double represents exactly.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Parses document text into a node tree.
///
/// Nesting is not capped, matching the encoder. Depth is bounded by the
/// native stack only.
pub fn parse_document(text: &str) -> Result<Json> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let json = Json::deserialize(&mut de)?;
    de.end()?;
    Ok(json)
}

/// The serialized form of one instance, as produced by the encoder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Registered class name.
    pub class_name: String,
    /// Encoded constructor arguments.
    pub serialize_init_args: Vec<Json>,
    /// Encoded own properties, in insertion order.
    pub properties: JsonObject,
}

impl Envelope {
    /// Converts into a JSON object, moving the encoded children.
    pub fn into_json(self) -> Json {
        let mut object = JsonObject::new();
        object.insert("className".to_owned(), Json::String(self.class_name));
        object.insert("serializeInitArgs".to_owned(), Json::Array(self.serialize_init_args));
        object.insert("properties".to_owned(), Json::Object(self.properties));
        Json::Object(object)
    }
}

/// A borrowed envelope read out of a parsed document.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeView<'a> {
    /// Registered class name.
    pub class_name: &'a str,
    /// Encoded constructor arguments.
    pub serialize_init_args: &'a [Json],
    /// Encoded own properties, in document order.
    pub properties: &'a JsonObject,
}

impl<'a> EnvelopeView<'a> {
    /// Reads the envelope fields of `json`.
    pub fn new(json: &'a Json) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            GraphError::malformed(format!(
                "expected an envelope object, found {}",
                json_kind(json)
            ))
        })?;
        Ok(Self {
            class_name: str_field(object, "className")?,
            serialize_init_args: array_field(object, "serializeInitArgs")?,
            properties: object_field(object, "properties")?,
        })
    }
}

/// The envelope tree carried in a `Serializable` node's `data`. Inline
/// objects are borrowed; a string holding an envelope is parsed.
pub fn nested_payload(data: &Json) -> Result<Cow<'_, Json>> {
    match data {
        Json::String(text) => parse_document(text).map(Cow::Owned),
        other => Ok(Cow::Borrowed(other)),
    }
}

/// Starts a tagged node.
pub fn tagged(tag: &str) -> JsonObject {
    let mut node = JsonObject::new();
    node.insert(TYPE_FIELD.to_owned(), Json::from(tag));
    node
}

/// Starts a tagged node that carries an id.
pub fn tagged_with_id(tag: &str, id: RefId) -> JsonObject {
    let mut node = tagged(tag);
    node.insert("id".to_owned(), Json::from(id.as_u32()));
    node
}

/// A back-reference node.
pub fn ref_node(id: RefId) -> Json {
    Json::Object(tagged_with_id(REF_TAG, id))
}

/// Reads the `__type` of a tagged node.
pub fn node_tag(node: &JsonObject) -> Result<&str> {
    node.get(TYPE_FIELD)
        .and_then(Json::as_str)
        .ok_or_else(|| GraphError::malformed(format!("object node without a {TYPE_FIELD} tag")))
}

/// Reads a required field.
pub fn field<'a>(node: &'a JsonObject, name: &str) -> Result<&'a Json> {
    node.get(name)
        .ok_or_else(|| GraphError::malformed(format!("node is missing field {name:?}")))
}

/// Reads a required string field.
pub fn str_field<'a>(node: &'a JsonObject, name: &str) -> Result<&'a str> {
    field(node, name)?
        .as_str()
        .ok_or_else(|| GraphError::malformed(format!("field {name:?} must be a string")))
}

/// Reads a required array field.
pub fn array_field<'a>(node: &'a JsonObject, name: &str) -> Result<&'a Vec<Json>> {
    field(node, name)?
        .as_array()
        .ok_or_else(|| GraphError::malformed(format!("field {name:?} must be an array")))
}

/// Reads a required object field.
pub fn object_field<'a>(node: &'a JsonObject, name: &str) -> Result<&'a JsonObject> {
    field(node, name)?
        .as_object()
        .ok_or_else(|| GraphError::malformed(format!("field {name:?} must be an object")))
}

/// Reads the `id` of a `ref`, `Serializable` or `Object` node.
pub fn id_field(node: &JsonObject) -> Result<RefId> {
    field(node, "id")?
        .as_u64()
        .and_then(|id| u32::try_from(id).ok())
        .map(RefId::new)
        .ok_or_else(|| GraphError::malformed("field \"id\" must be a non-negative integer"))
}

/// Splits a `Map` entry into its key and value nodes.
pub fn map_entry(entry: &Json) -> Result<(&Json, &Json)> {
    match entry.as_array().map(Vec::as_slice) {
        Some([key, value]) => Ok((key, value)),
        _ => Err(GraphError::malformed("map entries must be [key, value] pairs")),
    }
}

/// Writes a number the way the standard grammar does: integral values without
/// a fraction, non-finite values as `null`.
pub fn number_to_json(n: f64) -> Json {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        // exact: |n| <= 2^53
        Json::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

/// Short JSON kind name for error messages.
pub fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
