//! Class registry.
//!
//! Maps class names to constructors so that a document naming `"Point"` can be
//! turned back into a `Point` instance. The registry is an ordinary value that
//! the caller creates and hands to every [`crate::GraphSerializer`]; there is
//! no hidden global.
//!
//! Registration is append-only and first-wins: registering a name twice keeps
//! the first constructor. Constructing an instance through a [`ClassDef`]
//! registers the class as a side effect, so explicit registration is only
//! needed for classes that are reconstructed before they are ever built.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::{GraphError, Result};
use crate::value::{InstanceRef, Properties, Value};

/// A class constructor: receives the init args and returns the initial own
/// properties of the new instance, or rejects the arguments.
pub type Constructor = Rc<dyn Fn(&[Value]) -> Result<Properties>>;

/// A named class definition.
#[derive(Clone)]
pub struct ClassDef {
    name: String,
    constructor: Constructor,
}

impl ClassDef {
    /// Defines a class.
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Properties> + 'static,
    {
        Self {
            name: name.into(),
            constructor: Rc::new(constructor),
        }
    }

    /// Defines a class whose constructor sets no properties.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, |_| Ok(Properties::new()))
    }

    /// Class name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassDef({})", self.name)
    }
}

/// Centralized registry of constructible classes.
///
/// Single-threaded: it uses `RefCell` for interior mutability, so it can be
/// shared by reference while classes keep registering themselves.
#[derive(Default)]
pub struct TypeRegistry {
    types: RefCell<IndexMap<String, Constructor>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under `name`.
    ///
    /// A name that is already registered keeps its first constructor and the
    /// call is a no-op.
    ///
    /// # Errors
    /// [`GraphError::InvalidRegistration`] if `name` is empty.
    pub fn register<F>(&self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn(&[Value]) -> Result<Properties> + 'static,
    {
        self.insert(name, Rc::new(constructor))
    }

    /// Registers a class definition under its own name.
    pub fn register_class(&self, class: &ClassDef) -> Result<()> {
        self.insert(&class.name, Rc::clone(&class.constructor))
    }

    fn insert(&self, name: &str, constructor: Constructor) -> Result<()> {
        if name.trim().is_empty() {
            return Err(GraphError::InvalidRegistration(
                "class name must not be empty".into(),
            ));
        }
        match self.types.borrow_mut().entry(name.to_owned()) {
            Entry::Occupied(_) => {
                tracing::trace!(class = name, "class already registered, keeping first");
            }
            Entry::Vacant(slot) => {
                tracing::trace!(class = name, "registered class");
                slot.insert(constructor);
            }
        }
        Ok(())
    }

    /// Retrieves the constructor registered under `name`.
    ///
    /// # Errors
    /// [`GraphError::UnknownType`] if `name` is not registered.
    pub fn resolve(&self, name: &str) -> Result<Constructor> {
        self.types
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::UnknownType(name.to_owned()))
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.borrow().contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.types.borrow().keys().cloned().collect()
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.types.borrow().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.borrow().is_empty()
    }

    /// Constructs an instance of `class`, registering the class first.
    pub fn instantiate(&self, class: &ClassDef, args: Vec<Value>) -> Result<InstanceRef> {
        self.register_class(class)?;
        build(&class.name, &class.constructor, args)
    }

    /// Constructs an instance of the class registered under `name`.
    pub fn construct(&self, name: &str, args: Vec<Value>) -> Result<InstanceRef> {
        let constructor = self.resolve(name)?;
        build(name, &constructor, args)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.names())
            .finish()
    }
}

/// Validates the arguments, runs the constructor and captures the args.
pub(crate) fn build(name: &str, constructor: &Constructor, args: Vec<Value>) -> Result<InstanceRef> {
    validate_args(name, &args)?;
    let properties = constructor(&args)?;
    Ok(InstanceRef::from_parts(name.to_owned(), args, properties))
}

/// Best-effort check that every constructor argument can be serialized later.
///
/// Functions stored as record fields only warn: the encoder drops them.
/// Functions anywhere else and foreign host objects are rejected.
pub(crate) fn validate_args(class: &str, args: &[Value]) -> Result<()> {
    let mut visited = HashSet::new();
    for (position, arg) in args.iter().enumerate() {
        if let Err(kind) = check_encodable(arg, false, &mut visited) {
            return Err(GraphError::UnsupportedConstructorArgument {
                class: class.to_owned(),
                position,
                kind,
            });
        }
    }
    Ok(())
}

fn check_encodable(
    value: &Value,
    in_record_field: bool,
    visited: &mut HashSet<usize>,
) -> std::result::Result<(), String> {
    match value {
        Value::Function(name) if in_record_field => {
            tracing::warn!(function = %name, "constructor argument holds a function in a record field; it will not be serialized");
            Ok(())
        }
        Value::Function(_) | Value::Foreign(_) => Err(value.kind_name()),
        Value::Array(items) | Value::Set(items) => items
            .iter()
            .try_for_each(|item| check_encodable(item, false, visited)),
        Value::Map(pairs) => pairs.iter().try_for_each(|(k, v)| {
            check_encodable(k, false, visited)?;
            check_encodable(v, false, visited)
        }),
        Value::Record(record) => {
            if !visited.insert(record.addr()) {
                return Ok(());
            }
            record
                .borrow()
                .values()
                .try_for_each(|field| check_encodable(field, true, visited))
        }
        // Instances were validated when they were constructed.
        _ => Ok(()),
    }
}
