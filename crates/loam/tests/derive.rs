use loam::{
    db::convert::ConvertError,
    model::{AttributeConverter, FieldKind, schema_of},
    prelude::*,
    traits::Mapped,
};
use std::collections::BTreeMap;

///
/// Cents
/// Stores prices as integer cents.
///

#[derive(Debug, Default)]
struct Cents;

impl AttributeConverter for Cents {
    fn to_storage(&self, value: Value) -> Result<Value, ConvertError> {
        match value {
            Value::Float(price) => Ok(Value::Int((price * 100.0).round() as i64)),
            other => Err(ConvertError::converter(format!("not a price: {other}"))),
        }
    }

    fn to_entity(&self, value: Value) -> Result<Value, ConvertError> {
        match value {
            Value::Int(cents) => Ok(Value::Float(cents as f64 / 100.0)),
            other => Err(ConvertError::converter(format!("not cents: {other}"))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Embeddable)]
struct Address {
    city: String,
    #[field(name = "postal_code")]
    zip: String,
}

#[derive(Clone, Debug, Default, PartialEq, Embeddable)]
#[embeddable(name = "line")]
struct Line {
    sku: String,
    qty: u32,
    #[field(converter = Cents)]
    price: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Entity)]
#[entity(name = "Customer")]
struct Customer {
    #[field(id)]
    id: Option<u64>,
    name: String,
    #[field(embedded)]
    address: Address,
    tags: Vec<String>,
    #[field(skip)]
    session: String,
}

#[derive(Clone, Debug, Default, PartialEq, Entity)]
#[entity(name = "purchase")]
struct Purchase {
    #[field(id, name = "purchase_id")]
    id: u64,
    #[field(entity)]
    buyer: Option<Customer>,
    #[field(embeddable)]
    lines: Vec<Line>,
    notes: BTreeMap<String, String>,
}

fn customer() -> Customer {
    Customer {
        id: Some(7),
        name: "Ada".to_string(),
        address: Address {
            city: "London".to_string(),
            zip: "N1".to_string(),
        },
        tags: vec!["vip".to_string()],
        session: "scratch".to_string(),
    }
}

#[test]
fn names_and_field_kinds() {
    assert_eq!(Customer::NAME, "Customer");
    assert_eq!(Line::NAME, "line");
    assert_eq!(Address::NAME, "Address");

    let schema = schema_of::<Purchase>().expect("schema");
    let kinds: Vec<_> = schema
        .fields()
        .iter()
        .map(|f| (f.declared_name, f.kind.clone()))
        .collect();

    assert_eq!(kinds.len(), 4);
    assert!(matches!(kinds[1], ("buyer", FieldKind::SubEntity(_))));
    assert!(matches!(
        kinds[2],
        ("lines", FieldKind::Collection { embeddable: true, .. })
    ));
    assert!(matches!(kinds[3], ("notes", FieldKind::Map)));
    assert_eq!(
        schema.require_id().expect("id").storage_name,
        "purchase_id"
    );
}

#[test]
fn skipped_fields_are_not_mapped() {
    let schema = schema_of::<Customer>().expect("schema");

    assert!(schema.field("session").is_none());
    assert_eq!(schema.columns(), vec!["_id", "name", "city", "postal_code", "tags"]);
}

#[test]
fn embedded_fields_flatten_into_the_record() {
    let converter = EntityConverter::<Customer>::global().expect("converter");
    let record = converter.to_record(&customer()).expect("record");

    assert_eq!(record.get("_id"), Some(&Value::Uint(7)));
    assert_eq!(record.get("city"), Some(&Value::from("London")));
    assert_eq!(record.get("postal_code"), Some(&Value::from("N1")));
    assert!(record.get("address").is_none());
    assert!(record.get("session").is_none());

    let back = converter.from_record(&record).expect("entity");
    assert_eq!(back.address, customer().address);
    assert_eq!(back.session, "");
}

#[test]
fn nested_entities_collections_and_converters() {
    let purchase = Purchase {
        id: 1,
        buyer: Some(customer()),
        lines: vec![Line {
            sku: "tea".to_string(),
            qty: 2,
            price: 3.5,
        }],
        notes: BTreeMap::from([("gift".to_string(), "yes".to_string())]),
    };

    let converter = EntityConverter::<Purchase>::global().expect("converter");
    let record = converter.to_record(&purchase).expect("record");

    let Some(Value::Record(buyer)) = record.get("buyer") else {
        panic!("buyer should nest as a record: {record:?}");
    };
    assert_eq!(buyer.get("city"), Some(&Value::from("London")));

    let Some(Value::List(lines)) = record.get("lines") else {
        panic!("lines should be a list: {record:?}");
    };
    let Some(Value::Record(line)) = lines.first() else {
        panic!("line should be a record");
    };
    assert_eq!(line.get("price"), Some(&Value::Int(350)));

    let back = converter.from_record(&record).expect("entity");
    assert_eq!(back.lines, purchase.lines);
    assert_eq!(back.notes, purchase.notes);
    assert_eq!(back.buyer.map(|b| b.name), Some("Ada".to_string()));
}
