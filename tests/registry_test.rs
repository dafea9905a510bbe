#![allow(missing_docs)]

use objgraph::{ClassDef, GraphError, GraphSerializer, Properties, TypeRegistry, Value};

fn counter_class() -> ClassDef {
    ClassDef::new("Counter", |args| {
        let start = match args.first() {
            Some(Value::Number(n)) => *n,
            Some(other) => {
                return Err(GraphError::construction(
                    "Counter",
                    format!("start must be a number, got {}", other.kind_name()),
                ));
            }
            None => 0.0,
        };
        let mut props = Properties::new();
        props.insert("count".into(), Value::from(start));
        Ok(props)
    })
}

#[test]
fn test_explicit_registration_enables_decoding() -> objgraph::Result<()> {
    let text = r#"{"className":"Counter","serializeInitArgs":[5],"properties":{"count":9}}"#;

    let registry = TypeRegistry::new();
    registry.register_class(&counter_class())?;
    let counter = GraphSerializer::new(&registry).deserialize(text)?;

    // Constructor ran with the init args, then stored properties overwrote.
    assert_eq!(counter.init_args(), vec![Value::from(5)]);
    assert_eq!(counter.get("count"), Some(Value::from(9)));
    Ok(())
}

#[test]
fn test_constructor_rejection_surfaces_on_decode() -> objgraph::Result<()> {
    let text = r#"{"className":"Counter","serializeInitArgs":["five"],"properties":{}}"#;

    let registry = TypeRegistry::new();
    registry.register_class(&counter_class())?;
    let err = GraphSerializer::new(&registry)
        .deserialize(text)
        .expect_err("a string start is rejected");
    assert!(matches!(err, GraphError::Construction { ref class, .. } if class == "Counter"));
    Ok(())
}

#[test]
fn test_registry_is_shared_between_serializers() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    let counter = registry.instantiate(&counter_class(), vec![1.into()])?;
    let text = GraphSerializer::new(&registry).serialize(&counter)?;

    let pretty = GraphSerializer::builder(&registry).pretty(true).build();
    let back = pretty.deserialize(&text)?;
    assert_eq!(back.class_name(), "Counter");
    assert_eq!(registry.names(), vec!["Counter".to_owned()]);
    Ok(())
}

#[test]
fn test_nested_payload_as_string() -> objgraph::Result<()> {
    let registry = TypeRegistry::new();
    registry.register_class(&counter_class())?;
    registry.register_class(&ClassDef::empty("Bag"))?;
    let text = r#"{"className":"Bag","serializeInitArgs":[],"properties":{
        "inner":{"__type":"Serializable","id":1,
                 "data":"{\"className\":\"Counter\",\"serializeInitArgs\":[2],\"properties\":{}}"}
    }}"#;

    let bag = GraphSerializer::new(&registry).deserialize(text)?;
    let inner = bag
        .get("inner")
        .and_then(|v| v.as_instance().cloned())
        .expect("inner must be an instance");
    assert_eq!(inner.class_name(), "Counter");
    assert_eq!(inner.get("count"), Some(Value::from(2)));
    Ok(())
}
