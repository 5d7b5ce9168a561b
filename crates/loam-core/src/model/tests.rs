use crate::{
    model::{FieldKind, RecordShape, SchemaConfig, SchemaError, SchemaRegistry},
    test_fixtures::{Author, DoubleKeyed, Manuscript, Order, Person, Tag, TreeNode},
    value::{Value, ValueKind},
};
use std::{
    sync::{Arc, Barrier, mpsc},
    time::Duration,
};

// ----------------------------------------------------------------------
// registry
// ----------------------------------------------------------------------

#[test]
fn schema_of_is_built_once_per_type() {
    let registry = SchemaRegistry::new();

    let first = registry.schema_of::<Person>().expect("person schema");
    let builds = registry.build_count();
    let second = registry.schema_of::<Person>().expect("person schema");

    // Person + its embedded Address
    assert_eq!(builds, 2);
    assert_eq!(registry.build_count(), builds);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn nested_shapes_are_shared_between_owners() {
    let registry = SchemaRegistry::new();

    let order = registry.schema_of::<Order>().expect("order schema");
    let person = registry.shape_of::<Person>().expect("person shape");

    let owner = order.field("owner").expect("owner field");
    let FieldKind::SubEntity(shape) = &owner.kind else {
        panic!("owner should be a sub-entity, got {:?}", owner.kind);
    };
    assert!(Arc::ptr_eq(shape, &person));
}

#[test]
fn multiple_ids_fail_the_build() {
    let registry = SchemaRegistry::new();

    let err = registry
        .schema_of::<DoubleKeyed>()
        .expect_err("two ids must fail");

    assert_eq!(
        err,
        SchemaError::MultipleIds {
            entity: "DoubleKeyed".to_string(),
            fields: vec!["id".to_string(), "code".to_string()],
        }
    );
    assert_eq!(registry.build_count(), 0);
}

#[test]
fn missing_id_is_only_an_error_when_required() {
    let registry = SchemaRegistry::new();

    let schema = registry.schema_of::<Tag>().expect("tag schema");
    assert!(schema.id_field().is_none());
    assert_eq!(
        schema.require_id().map(|f| f.declared_name),
        Err(SchemaError::MissingId {
            entity: "Tag".to_string()
        })
    );
}

#[test]
fn self_nesting_reports_recursive_mapping() {
    let registry = SchemaRegistry::new();

    let err = registry.schema_of::<TreeNode>().expect_err("recursive");
    assert!(matches!(err, SchemaError::RecursiveMapping { .. }));

    // the failure is cached
    let again = registry.schema_of::<TreeNode>().expect_err("recursive");
    assert_eq!(err, again);
    assert_eq!(registry.build_count(), 0);
}

#[test]
fn concurrent_first_lookups_share_one_schema() {
    let registry = Arc::new(SchemaRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.schema_of::<Order>().expect("order schema"))
        })
        .collect();
    let schemas: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();

    assert!(schemas.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    // Order, Person, Address, Line
    assert_eq!(registry.build_count(), 4);
}

#[test]
fn crossed_first_lookups_do_not_deadlock() {
    let registry = Arc::new(SchemaRegistry::new());
    let start = Arc::new(Barrier::new(2));
    let (tx, rx) = mpsc::channel();

    let spawn = |lookup: fn(&SchemaRegistry) -> bool| {
        let registry = Arc::clone(&registry);
        let start = Arc::clone(&start);
        let tx = tx.clone();
        std::thread::spawn(move || {
            start.wait();
            let _ = tx.send(lookup(&registry));
        })
    };
    spawn(|r| r.schema_of::<Author>().is_err());
    spawn(|r| r.schema_of::<Manuscript>().is_err());

    for _ in 0..2 {
        let failed = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("lookup finished");
        assert!(failed, "mutual nesting is a recursive mapping");
    }
    assert_eq!(registry.build_count(), 0);
}

// ----------------------------------------------------------------------
// classification
// ----------------------------------------------------------------------

fn kind(shape: &RecordShape, name: &str) -> FieldKind {
    shape.field(name).expect("field").kind.clone()
}

#[test]
fn fields_are_classified_by_priority() {
    let registry = SchemaRegistry::new();
    let person = registry.schema_of::<Person>().expect("person schema");
    let order = registry.schema_of::<Order>().expect("order schema");

    assert!(matches!(kind(&person, "name"), FieldKind::Default));
    assert!(kind(&person, "address").is_embedded());
    assert!(matches!(
        kind(&person, "tags"),
        FieldKind::Collection {
            element: None,
            embeddable: false
        }
    ));
    assert!(matches!(kind(&order, "owner"), FieldKind::SubEntity(_)));
    assert!(matches!(
        kind(&order, "lines"),
        FieldKind::Collection {
            element: Some(_),
            embeddable: true
        }
    ));
    assert!(matches!(kind(&order, "attrs"), FieldKind::Map));

    let status = order.field("status").expect("status");
    assert!(matches!(status.kind, FieldKind::Default));
    assert!(status.converter.is_some());
    assert_eq!(status.value_kind, ValueKind::Text);
}

// ----------------------------------------------------------------------
// storage names and paths
// ----------------------------------------------------------------------

#[test]
fn id_storage_name_defaults_to_sentinel_unless_overridden() {
    let registry = SchemaRegistry::new();
    let person = registry.schema_of::<Person>().expect("person schema");
    let order = registry.schema_of::<Order>().expect("order schema");

    assert_eq!(person.require_id().expect("id").storage_name, "_id");
    assert_eq!(order.require_id().expect("id").storage_name, "order_id");
}

#[test]
fn configured_id_storage_name_applies_to_every_entity() {
    let config: SchemaConfig =
        serde_json::from_str(r#"{ "id_storage_name": "pk" }"#).expect("config");
    let registry = SchemaRegistry::with_config(config);

    let person = registry.schema_of::<Person>().expect("person schema");
    assert_eq!(person.require_id().expect("id").storage_name, "pk");
    assert_eq!(person.storage_path("id"), Some("pk"));
}

#[test]
fn empty_config_deserializes_to_defaults() {
    let config: SchemaConfig = serde_json::from_str("{}").expect("config");

    assert_eq!(config, SchemaConfig::default());
    assert_eq!(config.id_storage_name, "_id");
}

#[test]
fn path_table_flattens_embedded_and_nests_sub_entities() {
    let registry = SchemaRegistry::new();
    let person = registry.schema_of::<Person>().expect("person schema");
    let order = registry.schema_of::<Order>().expect("order schema");

    assert_eq!(person.storage_path("address.city"), Some("city"));
    assert_eq!(person.storage_path("address.zip"), Some("postal_code"));
    assert_eq!(order.storage_path("owner.name"), Some("owner.name"));
    assert_eq!(order.storage_path("owner.id"), Some("owner._id"));
    assert_eq!(order.storage_path("owner.address.city"), Some("owner.city"));
    assert_eq!(order.storage_path("lines.sku"), Some("lines.sku"));

    // a flattened owner has no column
    assert_eq!(person.storage_path("address"), None);
    assert_eq!(order.storage_path("owner.address"), None);

    // unmapped paths pass through
    assert_eq!(person.storage_path("shoe_size"), None);
    assert_eq!(person.resolve_path("shoe_size"), "shoe_size");
}

#[test]
fn field_at_path_walks_nested_shapes() {
    let registry = SchemaRegistry::new();
    let order = registry.schema_of::<Order>().expect("order schema");

    let zip = order.field_at_path("owner.address.zip").expect("zip");
    assert_eq!(zip.storage_name, "postal_code");
    assert!(order.field_at_path("owner.missing").is_none());
    assert!(order.field_at_path("status.inner").is_none());
}

#[test]
fn columns_expand_embedded_fields_in_place() {
    let registry = SchemaRegistry::new();
    let person = registry.schema_of::<Person>().expect("person schema");

    assert_eq!(
        person.columns(),
        vec!["_id", "name", "age", "city", "postal_code", "tags", "nickname"]
    );
}

#[test]
fn id_value_is_none_for_null_ids() {
    let registry = SchemaRegistry::new();
    let schema = registry.schema_of::<Person>().expect("person schema");

    let mut person = Person::new(7, "Ada", 36);
    assert_eq!(schema.id_value(&person), Some(Value::Uint(7)));

    person.id = None;
    assert_eq!(schema.id_value(&person), None);
}
