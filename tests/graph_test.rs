#![allow(missing_docs)]

use objgraph::{
    ClassDef, GraphError, GraphSerializer, InstanceRef, Properties, RecordRef, TypeRegistry, Value,
};
use serde_json::{Value as Json, json};

// --- FIXTURES ---

fn node_class() -> ClassDef {
    ClassDef::new("Node", |args| {
        let mut props = Properties::new();
        props.insert("label".into(), args.first().cloned().unwrap_or(Value::Undefined));
        Ok(props)
    })
}

fn holder_class() -> ClassDef {
    // Keeps its first argument as a property, aliasing it.
    ClassDef::new("Holder", |args| {
        let mut props = Properties::new();
        props.insert("config".into(), args.first().cloned().unwrap_or(Value::Null));
        Ok(props)
    })
}

fn instance_prop(instance: &InstanceRef, key: &str) -> Option<InstanceRef> {
    instance.get(key).and_then(|v| v.as_instance().cloned())
}

fn parse(text: &str) -> Json {
    serde_json::from_str(text).expect("serializer output must be valid JSON")
}

// --- TESTS ---

/// Cycle Safety
/// `a.prop = b`, `b.prop = a` serializes finitely and decodes to the same shape.
#[test]
fn test_two_instance_cycle() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    let node = node_class();
    let a = registry.instantiate(&node, vec!["a".into()])?;
    let b = registry.instantiate(&node, vec!["b".into()])?;
    a.set("prop", b.clone());
    b.set("prop", a.clone());

    let serializer = GraphSerializer::new(&registry);
    let text = serializer.serialize(&a)?;

    let doc = parse(&text);
    assert_eq!(doc["properties"]["prop"]["__type"], "Serializable");
    assert_eq!(
        doc["properties"]["prop"]["data"]["properties"]["prop"],
        json!({"__type": "ref", "id": 0})
    );

    let back = serializer.deserialize(&text)?;
    let b2 = instance_prop(&back, "prop").expect("a.prop must be an instance");
    let a2 = instance_prop(&b2, "prop").expect("b.prop must be an instance");
    assert!(a2.ptr_eq(&back));
    assert_eq!(b2.get("label"), Some(Value::from("b")));
    assert_eq!(Value::from(a), Value::from(back));
    Ok(())
}

/// Shared-Reference Collapsing
/// One `Serializable` node for `n`, a `ref` at the second occurrence, and
/// identity restored on decode.
#[test]
fn test_shared_instance_collapses() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    let node = node_class();
    let a = registry.instantiate(&node, vec!["root".into()])?;
    let n = registry.instantiate(&node, vec!["shared".into()])?;
    a.set("x", n.clone());
    a.set("y", n);

    let serializer = GraphSerializer::new(&registry);
    let text = serializer.serialize(&a)?;

    assert_eq!(text.matches("\"Serializable\"").count(), 1);
    let doc = parse(&text);
    assert_eq!(doc["properties"]["x"]["id"], 1);
    assert_eq!(doc["properties"]["y"], json!({"__type": "ref", "id": 1}));

    let back = serializer.deserialize(&text)?;
    let x = instance_prop(&back, "x").expect("x must be an instance");
    let y = instance_prop(&back, "y").expect("y must be an instance");
    assert!(x.ptr_eq(&y));
    Ok(())
}

/// Ids are unique across nested payloads of one document.
#[test]
fn test_ids_unique_across_nesting() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    let node = node_class();
    let root = registry.instantiate(&node, vec!["root".into()])?;
    let mid = registry.instantiate(&node, vec!["mid".into()])?;
    let leaf = registry.instantiate(&node, vec!["leaf".into()])?;
    let record = RecordRef::new();
    record.set("leaf", leaf.clone());
    mid.set("record", record.clone());
    mid.set("leaf", leaf);
    root.set("mid", mid);
    root.set("record", record);

    let text = GraphSerializer::new(&registry).serialize(&root)?;
    let report = objgraph::GraphInspector::inspect(&text)?;
    assert_eq!(report.defined_ids.len(), 4);
    assert_eq!(report.count("Serializable"), 2);
    assert_eq!(report.count("Object"), 1);
    assert_eq!(report.count("ref"), 2);
    assert!(report.is_resolvable());
    Ok(())
}

/// Identity shared between an init argument and a property survives.
#[test]
fn test_init_arg_aliasing() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    let config = RecordRef::new();
    config.set("verbose", true);
    let holder = registry.instantiate(&holder_class(), vec![config.into()])?;

    let serializer = GraphSerializer::new(&registry);
    let text = serializer.serialize(&holder)?;
    let doc = parse(&text);
    assert_eq!(doc["serializeInitArgs"][0]["__type"], "Object");
    assert_eq!(doc["properties"]["config"]["__type"], "ref");

    let back = serializer.deserialize(&text)?;
    let arg = back.init_args()[0].as_record().cloned().expect("arg must be a record");
    let prop = back.get("config").and_then(|v| v.as_record().cloned()).expect("config must be a record");
    assert!(arg.ptr_eq(&prop));
    assert_eq!(prop.get("verbose"), Some(Value::Bool(true)));
    Ok(())
}

/// Self-referencing plain record inside an instance.
#[test]
fn test_record_cycle() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    let bag = registry.instantiate(&ClassDef::empty("Bag"), vec![])?;
    let record = RecordRef::new();
    record.set("name", "loop");
    record.set("self", record.clone());
    record.set("owner", bag.clone());
    bag.set("record", record);

    let serializer = GraphSerializer::new(&registry);
    let back = serializer.deserialize(&serializer.serialize(&bag)?)?;

    let r = back.get("record").and_then(|v| v.as_record().cloned()).expect("record");
    let again = r.get("self").and_then(|v| v.as_record().cloned()).expect("self");
    assert!(again.ptr_eq(&r));
    let owner = r.get("owner").and_then(|v| v.as_instance().cloned()).expect("owner");
    assert!(owner.ptr_eq(&back));
    Ok(())
}

/// Arrays are owned values: a repeated array is written twice, never as a ref.
#[test]
fn test_arrays_are_not_reference_tracked() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    let bag = registry.instantiate(&ClassDef::empty("Bag"), vec![])?;
    let shared = Value::Array(vec![1.into(), 2.into()]);
    bag.set("first", shared.clone());
    bag.set("second", shared);

    let text = GraphSerializer::new(&registry).serialize(&bag)?;
    let doc = parse(&text);
    assert_eq!(doc["properties"]["first"], doc["properties"]["second"]);
    assert!(!text.contains("\"ref\""));
    Ok(())
}

/// Identity is per call: two documents never share ids.
#[test]
fn test_calls_do_not_share_identity() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    let node = node_class();
    let shared = registry.instantiate(&node, vec!["shared".into()])?;
    let first = registry.instantiate(&node, vec!["first".into()])?;
    let second = registry.instantiate(&node, vec!["second".into()])?;
    first.set("child", shared.clone());
    second.set("child", shared);

    let serializer = GraphSerializer::new(&registry);
    let d1 = parse(&serializer.serialize(&first)?);
    let d2 = parse(&serializer.serialize(&second)?);
    assert_eq!(d1["properties"]["child"]["__type"], "Serializable");
    assert_eq!(d2["properties"]["child"]["__type"], "Serializable");
    assert_eq!(d1["properties"]["child"]["id"], d2["properties"]["child"]["id"]);
    Ok(())
}

/// Dangling Reference
#[test]
fn test_dangling_reference() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    registry.register_class(&ClassDef::empty("Bag"))?;
    let text = r#"{"className":"Bag","serializeInitArgs":[],"properties":{"a":{"__type":"ref","id":99}}}"#;

    let err = GraphSerializer::new(&registry)
        .deserialize(text)
        .expect_err("id 99 is never defined");
    assert!(matches!(err, GraphError::DanglingReference(99)));
    Ok(())
}

/// A ref inside the root's own init args precedes the root's construction.
#[test]
fn test_root_ref_in_init_args_dangles() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    registry.register_class(&ClassDef::empty("Bag"))?;
    let text = r#"{"className":"Bag","serializeInitArgs":[{"__type":"ref","id":0}],"properties":{}}"#;
    assert!(matches!(
        GraphSerializer::new(&registry).deserialize(text),
        Err(GraphError::DanglingReference(0))
    ));
    Ok(())
}

/// Duplicate ids in one document are malformed.
#[test]
fn test_duplicate_ids_rejected() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    registry.register_class(&ClassDef::empty("Bag"))?;
    let text = r#"{"className":"Bag","serializeInitArgs":[],"properties":{
        "a":{"__type":"Object","id":1,"data":{}},
        "b":{"__type":"Object","id":1,"data":{}}
    }}"#;
    assert!(matches!(
        GraphSerializer::new(&registry).deserialize(text),
        Err(GraphError::MalformedInput(_))
    ));
    Ok(())
}

/// Builds `length` instances linked through `next`, returning the head.
fn instance_chain(registry: &TypeRegistry, length: usize) -> objgraph::Result<InstanceRef> {
    let class = ClassDef::empty("Link");
    let head = registry.instantiate(&class, vec![])?;
    let mut tail = head.clone();
    for _ in 1..length {
        let next = registry.instantiate(&class, vec![])?;
        tail.set("next", next.clone());
        tail = next;
    }
    Ok(head)
}

/// Long chains nest far past the JSON parser's default depth and still read back.
#[test]
fn test_long_instance_chain_round_trips() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    let head = instance_chain(&registry, 120)?;

    let serializer = GraphSerializer::new(&registry);
    let text = serializer.serialize(&head)?;
    let back = serializer.deserialize(&text)?;

    let mut length = 1;
    let mut cursor = back;
    while let Some(next) = instance_prop(&cursor, "next") {
        cursor = next;
        length += 1;
    }
    assert_eq!(length, 120);

    let report = objgraph::GraphInspector::inspect(&text)?;
    assert_eq!(report.count("Serializable"), 119);
    assert!(report.max_depth >= 119);
    Ok(())
}

#[test]
fn test_long_record_chain_round_trips() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    let bag = registry.instantiate(&ClassDef::empty("Bag"), vec![])?;
    let head = RecordRef::new();
    let mut tail = head.clone();
    for depth in 1..100 {
        let next = RecordRef::new();
        next.set("depth", depth);
        tail.set("next", next.clone());
        tail = next;
    }
    tail.set("head", head.clone());
    bag.set("chain", head);

    let serializer = GraphSerializer::new(&registry);
    let back = serializer.deserialize(&serializer.serialize(&bag)?)?;

    let first = back.get("chain").and_then(|v| v.as_record().cloned()).expect("chain");
    let mut cursor = first.clone();
    let mut hops = 0;
    while let Some(next) = cursor.get("next").and_then(|v| v.as_record().cloned()) {
        cursor = next;
        hops += 1;
    }
    assert_eq!(hops, 99);
    assert_eq!(cursor.get("depth"), Some(Value::from(99)));
    let loop_back = cursor.get("head").and_then(|v| v.as_record().cloned()).expect("head");
    assert!(loop_back.ptr_eq(&first));
    Ok(())
}
