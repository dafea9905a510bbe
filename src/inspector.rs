//! Tools for inspecting the structure of serialized documents.
//! Useful for debugging reference layout without constructing anything.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use serde_json::Value as Json;

use crate::error::{GraphError, Result};
use crate::format::{
    EnvelopeView, array_field, field, id_field, map_entry, nested_payload, node_tag, parse_document,
};
use crate::kind::{REF_TAG, SupportedKind};
use crate::tracker::RefId;

/// Counter key for bare scalar nodes.
const SCALAR_KEY: &str = "scalar";

/// A structural report of a document.
#[derive(Debug, Default, Serialize)]
pub struct DocumentReport {
    /// Class name of the root instance.
    pub root_class: String,
    /// Number of nodes per wire tag; bare scalars are counted under `scalar`.
    pub node_counts: BTreeMap<String, usize>,
    /// Class names of every nested `Serializable` payload, in document order.
    pub nested_classes: Vec<String>,
    /// Ids defined by `Serializable` and `Object` nodes, root id 0 included.
    pub defined_ids: BTreeSet<u32>,
    /// Ids targeted by `ref` nodes.
    pub referenced_ids: BTreeSet<u32>,
    /// Ids referenced before (or without) their definition. Decoding such a
    /// document fails with a dangling reference.
    pub unresolved_refs: BTreeSet<u32>,
    /// Deepest node nesting below the root envelope.
    pub max_depth: usize,
}

impl DocumentReport {
    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.node_counts.values().sum()
    }

    /// Number of nodes with the given wire tag (or `scalar`).
    pub fn count(&self, tag: &str) -> usize {
        self.node_counts.get(tag).copied().unwrap_or(0)
    }

    /// Returns `true` if every `ref` points at an earlier definition.
    pub fn is_resolvable(&self) -> bool {
        self.unresolved_refs.is_empty()
    }
}

/// The document inspector.
#[derive(Debug)]
pub struct GraphInspector;

impl GraphInspector {
    /// Analyzes document text and returns a structural report.
    pub fn inspect(text: &str) -> Result<DocumentReport> {
        let document = parse_document(text)?;
        let envelope = EnvelopeView::new(&document)?;
        let mut report = DocumentReport {
            root_class: envelope.class_name.to_owned(),
            ..DocumentReport::default()
        };
        Self::inspect_envelope(envelope, RefId::ROOT, 0, &mut report)?;
        tracing::debug!(nodes = report.node_count(), depth = report.max_depth, "inspected document");
        Ok(report)
    }

    /// Analyzes a document file.
    pub fn inspect_file<P: AsRef<Path>>(path: P) -> Result<DocumentReport> {
        let text = std::fs::read_to_string(path)?;
        Self::inspect(&text)
    }

    /// An instance id becomes resolvable once its init args are decoded, the
    /// same point at which the decoder binds it.
    fn inspect_envelope(
        envelope: EnvelopeView<'_>,
        id: RefId,
        depth: usize,
        report: &mut DocumentReport,
    ) -> Result<()> {
        for node in envelope.serialize_init_args {
            Self::inspect_node(node, depth + 1, report)?;
        }
        report.defined_ids.insert(id.as_u32());
        for node in envelope.properties.values() {
            Self::inspect_node(node, depth + 1, report)?;
        }
        Ok(())
    }

    fn inspect_node(node: &Json, depth: usize, report: &mut DocumentReport) -> Result<()> {
        report.max_depth = report.max_depth.max(depth);

        let object = match node {
            Json::Object(object) => object,
            Json::Array(_) => return Err(GraphError::malformed("untagged array node")),
            _ => {
                *report.node_counts.entry(SCALAR_KEY.to_owned()).or_default() += 1;
                return Ok(());
            }
        };

        let tag = node_tag(object)?;
        *report.node_counts.entry(tag.to_owned()).or_default() += 1;

        if tag == REF_TAG {
            let id = id_field(object)?.as_u32();
            report.referenced_ids.insert(id);
            if !report.defined_ids.contains(&id) {
                report.unresolved_refs.insert(id);
            }
            return Ok(());
        }

        let kind = SupportedKind::from_tag(tag)
            .ok_or_else(|| GraphError::malformed(format!("unknown node tag {tag:?}")))?;

        let children: Option<Vec<&Json>> = match kind {
            SupportedKind::Instance => {
                let id = id_field(object)?;
                let payload = nested_payload(field(object, "data")?)?;
                let nested = EnvelopeView::new(&payload)?;
                report.nested_classes.push(nested.class_name.to_owned());
                return Self::inspect_envelope(nested, id, depth, report);
            }
            SupportedKind::PlainRecord => {
                report.defined_ids.insert(id_field(object)?.as_u32());
                field(object, "data")?
                    .as_object()
                    .map(|fields| fields.values().collect())
            }
            SupportedKind::Sequence | SupportedKind::UniqueSet => field(object, "data")?
                .as_array()
                .map(|items| items.iter().collect()),
            SupportedKind::KeyedMap => {
                let mut nodes = Vec::new();
                for entry in array_field(object, "data")? {
                    let (key, value) = map_entry(entry)?;
                    nodes.extend([key, value]);
                }
                Some(nodes)
            }
            _ => return Ok(()),
        };

        let children = children
            .ok_or_else(|| GraphError::malformed(format!("{tag} node has a malformed data field")))?;
        for child in children {
            Self::inspect_node(child, depth + 1, report)?;
        }
        Ok(())
    }
}
