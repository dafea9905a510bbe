//! Identity tracking for one serialize or deserialize call.
//!
//! On the encode side, [`EncodeTracker`] hands out a [`RefId`] the first time a
//! reference-bearing value is visited and reports the same id on every later
//! visit. On the decode side, [`DecodeTracker`] maps ids back to materialized
//! values in document order. Trackers are created per top-level call and are
//! never shared, so ids only mean something inside one document.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use crate::error::{GraphError, Result};
use crate::value::Value;

/// Identifier of a reference-bearing node within one document.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(u32);

impl RefId {
    /// Id of the root instance of every document.
    pub const ROOT: RefId = RefId(0);

    /// Wraps a raw id read from a document.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefId({})", self.0)
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of visiting a reference-bearing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// First visit: encode the value in full under this id.
    First(RefId),
    /// Already encoded: emit a `ref` to this id.
    Seen(RefId),
}

/// Assigns ids during serialization. Counter starts at 0.
#[derive(Debug, Default)]
pub struct EncodeTracker {
    ids: HashMap<usize, RefId>,
}

impl EncodeTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Visits the value with identity key `addr`.
    pub fn visit(&mut self, addr: usize) -> Visit {
        let next = RefId(u32::try_from(self.ids.len()).unwrap_or(u32::MAX));
        match self.ids.entry(addr) {
            Entry::Occupied(slot) => Visit::Seen(*slot.get()),
            Entry::Vacant(slot) => Visit::First(*slot.insert(next)),
        }
    }

    /// Id already assigned to `addr`, if any.
    pub fn lookup(&self, addr: usize) -> Option<RefId> {
        self.ids.get(&addr).copied()
    }

    /// Number of ids handed out.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if no id has been assigned.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolves ids during deserialization.
#[derive(Debug, Default)]
pub struct DecodeTracker {
    values: HashMap<RefId, Value>,
}

impl DecodeTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `id` to a materialized value. Ids are unique per document.
    pub fn define(&mut self, id: RefId, value: Value) -> Result<()> {
        match self.values.entry(id) {
            Entry::Occupied(_) => Err(GraphError::malformed(format!("id {id} is defined twice"))),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    /// Returns the value bound to `id`.
    ///
    /// # Errors
    /// [`GraphError::DanglingReference`] if nothing earlier in the document
    /// defined `id`.
    pub fn resolve(&self, id: RefId) -> Result<Value> {
        self.values
            .get(&id)
            .cloned()
            .ok_or(GraphError::DanglingReference(id.as_u32()))
    }

    /// Number of ids defined so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing has been defined.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_assigned_once_in_visit_order() {
        let mut tracker = EncodeTracker::new();
        assert_eq!(tracker.visit(0x10), Visit::First(RefId::ROOT));
        assert_eq!(tracker.visit(0x20), Visit::First(RefId::new(1)));
        assert_eq!(tracker.visit(0x10), Visit::Seen(RefId::ROOT));
        assert_eq!(tracker.lookup(0x20), Some(RefId::new(1)));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn unknown_ids_dangle() {
        let tracker = DecodeTracker::new();
        assert!(matches!(
            tracker.resolve(RefId::new(99)),
            Err(GraphError::DanglingReference(99))
        ));
    }

    #[test]
    fn redefining_an_id_is_malformed() -> Result<()> {
        let mut tracker = DecodeTracker::new();
        tracker.define(RefId::new(3), Value::Null)?;
        assert!(matches!(
            tracker.define(RefId::new(3), Value::Null),
            Err(GraphError::MalformedInput(_))
        ));
        assert!(tracker.resolve(RefId::new(3))?.is_null());
        Ok(())
    }
}
