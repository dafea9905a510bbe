//! # objgraph
//!
//! Serialization of object graphs to self-describing JSON text, with
//! reference tracking and class-name based reconstruction.
//!
//! ## Overview
//!
//! A graph is rooted at an instance of a registered class. Instances hold the
//! arguments they were constructed with and a mapping of own properties; both
//! may contain scalars, collections, dates, patterns, errors, big integers,
//! typed numeric buffers, plain records and other instances.
//!
//! ### Key Features
//!
//! *   **Cycle Safety:** Instances and plain records are tracked by identity.
//!     The first visit writes the value in full under an id; every later visit
//!     writes a back-reference. Cyclic graphs serialize in finite space and come
//!     back with the same shape.
//! *   **Identity Preservation:** Two properties that pointed at the same
//!     instance point at the same reconstructed instance after decoding.
//! *   **Polymorphic Reconstruction:** Documents name classes; the
//!     [`TypeRegistry`] maps names back to constructors.
//! *   **Closed Kind Dispatch:** Every encodable value belongs to exactly one
//!     [`SupportedKind`], checked in a fixed precedence order, each with one
//!     encode/decode pair.
//!
//! ## Architecture
//!
//! ### The Value Model
//!
//! [`Value`] covers every kind the wire format knows. Collections are owned;
//! [`RecordRef`] and [`InstanceRef`] are shared handles and the only values
//! with identity. Collections are therefore never collapsed into references:
//! an array reachable twice is written twice.
//!
//! ### Document Format
//!
//! ```text
//! {"className":"Point","serializeInitArgs":[1,2],"properties":{"x":1,"y":2,"label":{"__type":"undefined"}}}
//! ```
//!
//! See [`format`] for the full node grammar.
//!
//! ### Reference Tracking
//!
//! Each top-level call owns its trackers (see [`tracker`]). The root instance
//! takes id 0 and ids are unique across the whole document, including nested
//! instance payloads. Decoding is order dependent: a reference must follow the
//! node that defines its id.
//!
//! ## Usage
//!
//! ```rust
//! use objgraph::{ClassDef, GraphSerializer, Properties, TypeRegistry, Value};
//!
//! let registry = TypeRegistry::new();
//! let node = ClassDef::new("Node", |args| {
//!     let mut props = Properties::new();
//!     props.insert("label".into(), args.first().cloned().unwrap_or(Value::Undefined));
//!     Ok(props)
//! });
//!
//! let a = registry.instantiate(&node, vec!["a".into()])?;
//! let b = registry.instantiate(&node, vec!["b".into()])?;
//! a.set("next", b.clone());
//! b.set("next", a.clone());
//!
//! let serializer = GraphSerializer::new(&registry);
//! let text = serializer.serialize(&a)?;
//! let back = serializer.deserialize(&text)?;
//!
//! let next = back.get("next").and_then(|v| v.as_instance().cloned());
//! let round = next.and_then(|b| b.get("next")).and_then(|v| v.as_instance().cloned());
//! assert!(round.is_some_and(|a2| a2.ptr_eq(&back)));
//! # Ok::<(), objgraph::GraphError>(())
//! ```
//!
//! ## Threading
//!
//! Everything is synchronous and single-threaded. Values use `Rc` handles and
//! the registry uses `RefCell`; neither is `Send`.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod codec;
pub mod error;
pub mod format;
pub mod inspector;
pub mod kind;
pub mod registry;
pub mod tracker;
pub mod value;

// --- RE-EXPORTS ---

pub use api::{GraphSerializer, SerializerBuilder, SerializerOptions};
pub use error::{GraphError, Result};
pub use inspector::{DocumentReport, GraphInspector};
pub use kind::SupportedKind;
pub use registry::{ClassDef, Constructor, TypeRegistry};
pub use tracker::RefId;
pub use value::{ElementType, Fault, Instance, InstanceRef, Pattern, Properties, RecordRef, TypedArray, Value};
