//! Public entry points: [`GraphSerializer`] and its builder.

use std::fs;
use std::path::Path;

use crate::codec::{Decoder, Encoder};
use crate::error::Result;
use crate::format::{EnvelopeView, parse_document};
use crate::registry::TypeRegistry;
use crate::value::InstanceRef;

/// Output options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializerOptions {
    /// Indent the JSON output.
    pub pretty: bool,
}

/// The main entry point: serializes instance graphs to text and back.
///
/// Deserialization reconstructs classes by name, so it needs the registry the
/// classes were registered in. Serialization only needs the graph.
#[derive(Debug, Clone, Copy)]
pub struct GraphSerializer<'r> {
    registry: &'r TypeRegistry,
    options: SerializerOptions,
}

impl<'r> GraphSerializer<'r> {
    /// Creates a serializer with default options.
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            options: SerializerOptions::default(),
        }
    }

    /// Starts a serializer with custom options.
    pub fn builder(registry: &'r TypeRegistry) -> SerializerBuilder<'r> {
        SerializerBuilder {
            registry,
            options: SerializerOptions::default(),
        }
    }

    /// The registry used for reconstruction.
    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// The active options.
    pub fn options(&self) -> SerializerOptions {
        self.options
    }

    /// Serializes the graph rooted at `root`.
    ///
    /// Ids are unique within the returned document. Serializing the same
    /// graph twice yields identical text, but identity is not shared between
    /// the two documents.
    ///
    /// # Errors
    /// [`crate::GraphError::UnsupportedType`] if a reachable value has no encoding.
    pub fn serialize(&self, root: &InstanceRef) -> Result<String> {
        render(root, self.options)
    }

    /// Reconstructs the graph described by `text`.
    ///
    /// # Errors
    /// * [`crate::GraphError::MalformedInput`] if `text` is not a document.
    /// * [`crate::GraphError::UnknownType`] if it names an unregistered class.
    /// * [`crate::GraphError::DanglingReference`] if a `ref` precedes its target.
    pub fn deserialize(&self, text: &str) -> Result<InstanceRef> {
        let document = parse_document(text)?;
        let envelope = EnvelopeView::new(&document)?;
        let mut decoder = Decoder::new(self.registry);
        let root = decoder.decode_root(envelope)?;
        tracing::debug!(
            class = %envelope.class_name,
            ids = decoder.ids_defined(),
            "deserialized object graph"
        );
        Ok(root)
    }

    /// Serializes `root` into a file.
    pub fn save<P: AsRef<Path>>(&self, path: P, root: &InstanceRef) -> Result<()> {
        let text = self.serialize(root)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Reads and deserializes a file written by [`Self::save`].
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<InstanceRef> {
        let text = fs::read_to_string(path)?;
        self.deserialize(&text)
    }
}

/// Builder for [`GraphSerializer`].
#[derive(Debug, Clone, Copy)]
pub struct SerializerBuilder<'r> {
    registry: &'r TypeRegistry,
    options: SerializerOptions,
}

impl<'r> SerializerBuilder<'r> {
    /// Enables indented output.
    #[must_use]
    pub fn pretty(mut self, enable: bool) -> Self {
        self.options.pretty = enable;
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> GraphSerializer<'r> {
        GraphSerializer {
            registry: self.registry,
            options: self.options,
        }
    }
}

impl InstanceRef {
    /// Serializes the graph rooted at this instance with default options.
    pub fn serialize(&self) -> Result<String> {
        render(self, SerializerOptions::default())
    }
}

fn render(root: &InstanceRef, options: SerializerOptions) -> Result<String> {
    let mut encoder = Encoder::new();
    let envelope = encoder.encode_root(root)?;
    let text = if options.pretty {
        serde_json::to_string_pretty(&envelope)?
    } else {
        serde_json::to_string(&envelope)?
    };
    tracing::debug!(
        class = %envelope.class_name,
        ids = encoder.ids_assigned(),
        bytes = text.len(),
        "serialized object graph"
    );
    Ok(text)
}
