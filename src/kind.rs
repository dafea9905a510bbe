//! Value classification.
//!
//! Every encodable [`Value`] belongs to exactly one [`SupportedKind`]. The
//! kinds are checked in the fixed order of [`SupportedKind::PRECEDENCE`]; the
//! first kind that matches wins. Each kind owns one wire tag (bare scalars
//! have none) and one encode/decode pair in the codec table.

use crate::value::Value;

/// Name of the discriminator field carried by every tagged node.
pub const TYPE_FIELD: &str = "__type";

/// Tag of a back-reference node. Not a kind: refs are produced by the tracker.
pub const REF_TAG: &str = "ref";

/// The closed set of value kinds with a wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SupportedKind {
    /// Class instance, tag `Serializable`.
    Instance,
    /// Ordered collection, tag `Array`.
    Sequence,
    /// Map-like collection, tag `Map`.
    KeyedMap,
    /// Set-like collection, tag `Set`.
    UniqueSet,
    /// Fixed-size numeric view, tag `TypedArray`.
    ByteBuffer,
    /// Point in time, tag `Date`.
    Timestamp,
    /// Regular expression, tag `RegExp`.
    Pattern,
    /// Error object, tag `Error`.
    Fault,
    /// Arbitrary-precision integer, tag `BigInt`.
    BigInteger,
    /// Explicit "no value", tag `undefined`.
    Absent,
    /// Null, boolean, number or string. Written bare.
    Scalar,
    /// Plain key/value record, tag `Object`.
    PlainRecord,
}

impl SupportedKind {
    /// Classification order. Also the layout of the codec table.
    pub const PRECEDENCE: [SupportedKind; 12] = [
        Self::Instance,
        Self::Sequence,
        Self::KeyedMap,
        Self::UniqueSet,
        Self::ByteBuffer,
        Self::Timestamp,
        Self::Pattern,
        Self::Fault,
        Self::BigInteger,
        Self::Absent,
        Self::Scalar,
        Self::PlainRecord,
    ];

    /// Returns the first kind in precedence order that accepts `value`, or
    /// `None` if the value has no encoding.
    pub fn classify(value: &Value) -> Option<Self> {
        Self::PRECEDENCE.into_iter().find(|kind| kind.matches(value))
    }

    /// Returns `true` if this kind accepts `value`.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Instance => matches!(value, Value::Instance(_)),
            Self::Sequence => matches!(value, Value::Array(_)),
            Self::KeyedMap => matches!(value, Value::Map(_)),
            Self::UniqueSet => matches!(value, Value::Set(_)),
            Self::ByteBuffer => matches!(value, Value::TypedArray(_)),
            Self::Timestamp => matches!(value, Value::Date(_)),
            Self::Pattern => matches!(value, Value::RegExp(_)),
            Self::Fault => matches!(value, Value::Error(_)),
            Self::BigInteger => matches!(value, Value::BigInt(_)),
            Self::Absent => matches!(value, Value::Undefined),
            Self::Scalar => matches!(
                value,
                Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
            ),
            Self::PlainRecord => matches!(value, Value::Record(_)),
        }
    }

    /// Wire tag written in the `__type` field. `None` for bare scalars.
    pub fn tag(self) -> Option<&'static str> {
        Some(match self {
            Self::Instance => "Serializable",
            Self::Sequence => "Array",
            Self::KeyedMap => "Map",
            Self::UniqueSet => "Set",
            Self::ByteBuffer => "TypedArray",
            Self::Timestamp => "Date",
            Self::Pattern => "RegExp",
            Self::Fault => "Error",
            Self::BigInteger => "BigInt",
            Self::Absent => "undefined",
            Self::PlainRecord => "Object",
            Self::Scalar => return None,
        })
    }

    /// Looks up a kind by wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::PRECEDENCE
            .into_iter()
            .find(|kind| kind.tag() == Some(tag))
    }

    /// Instances and plain records get ids and can be referenced.
    pub fn is_reference_bearing(self) -> bool {
        matches!(self, Self::Instance | Self::PlainRecord)
    }

    /// Position in [`Self::PRECEDENCE`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Fault, RecordRef};
    use num_bigint::BigInt;

    #[test]
    fn precedence_matches_declaration_order() {
        for (i, kind) in SupportedKind::PRECEDENCE.into_iter().enumerate() {
            assert_eq!(kind.index(), i, "{kind:?} out of place");
        }
    }

    #[test]
    fn each_value_lands_in_one_kind() {
        let cases = [
            (Value::Array(vec![]), SupportedKind::Sequence),
            (Value::map(vec![]), SupportedKind::KeyedMap),
            (Value::set(vec![]), SupportedKind::UniqueSet),
            (Value::Error(Fault::new("TypeError", "boom")), SupportedKind::Fault),
            (Value::BigInt(BigInt::from(7)), SupportedKind::BigInteger),
            (Value::Undefined, SupportedKind::Absent),
            (Value::Null, SupportedKind::Scalar),
            (Value::from("text"), SupportedKind::Scalar),
            (Value::from(RecordRef::new()), SupportedKind::PlainRecord),
        ];
        for (value, expected) in cases {
            assert_eq!(SupportedKind::classify(&value), Some(expected), "{value:?}");
            let hits = SupportedKind::PRECEDENCE
                .into_iter()
                .filter(|k| k.matches(&value))
                .count();
            assert_eq!(hits, 1);
        }
    }

    #[test]
    fn unencodable_values_have_no_kind() {
        assert_eq!(SupportedKind::classify(&Value::Function("f".into())), None);
        assert_eq!(SupportedKind::classify(&Value::Foreign("WeakMap".into())), None);
    }

    #[test]
    fn tags_round_trip_and_stay_unique() {
        for kind in SupportedKind::PRECEDENCE {
            match kind.tag() {
                Some(tag) => {
                    assert_eq!(SupportedKind::from_tag(tag), Some(kind));
                    assert_ne!(tag, REF_TAG);
                }
                None => assert_eq!(kind, SupportedKind::Scalar),
            }
        }
        assert_eq!(SupportedKind::from_tag("Symbol"), None);
    }

    #[test]
    fn only_instances_and_records_are_tracked() {
        let tracked: Vec<_> = SupportedKind::PRECEDENCE
            .into_iter()
            .filter(|k| k.is_reference_bearing())
            .collect();
        assert_eq!(tracked, [SupportedKind::Instance, SupportedKind::PlainRecord]);
    }
}
