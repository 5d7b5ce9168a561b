//! Hand-written mapped types shared by unit tests.

use crate::{
    accessor,
    db::convert::ConvertError,
    impl_mapped_field_value,
    model::{
        AttributeConverter, EntityDescriptor, FieldDescriptor, Nested, converter,
    },
    traits::{EmbeddableKind, EntityKind, Mapped},
    value::{Value, ValueKind},
};
use std::collections::BTreeMap;
use ulid::Ulid;

///
/// Address
/// Embeddable; flattened into its owner.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Address {
    pub city: String,
    pub zip: String,
}

impl Mapped for Address {
    const NAME: &'static str = "Address";

    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::new(vec![
            FieldDescriptor::new("city", ValueKind::Text, accessor!(Address, city)),
            FieldDescriptor::new("zip", ValueKind::Text, accessor!(Address, zip))
                .storage_name("postal_code"),
        ])
    }
}

impl EmbeddableKind for Address {}

///
/// Person
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Person {
    pub id: Option<u64>,
    pub name: String,
    pub age: u32,
    pub address: Address,
    pub tags: Vec<String>,
    pub nickname: Option<String>,
}

impl Person {
    pub(crate) fn new(id: u64, name: &str, age: u32) -> Self {
        Self {
            id: Some(id),
            name: name.to_string(),
            age,
            ..Self::default()
        }
    }

    pub(crate) fn living_in(mut self, city: &str) -> Self {
        self.address.city = city.to_string();
        self
    }

    pub(crate) fn tagged(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(ToString::to_string).collect();
        self
    }
}

impl Mapped for Person {
    const NAME: &'static str = "Person";

    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::new(vec![
            FieldDescriptor::new("id", ValueKind::Uint, accessor!(Person, id)).id(),
            FieldDescriptor::new("name", ValueKind::Text, accessor!(Person, name)),
            FieldDescriptor::new("age", ValueKind::Uint, accessor!(Person, age)),
            FieldDescriptor::new("address", ValueKind::Record, accessor!(Person, address))
                .embedded(Nested::embeddable::<Address>()),
            FieldDescriptor::new("tags", ValueKind::List, accessor!(Person, tags))
                .sequence(None),
            FieldDescriptor::new("nickname", ValueKind::Text, accessor!(Person, nickname)),
        ])
    }
}

impl EntityKind for Person {}

///
/// Line
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Line {
    pub sku: String,
    pub qty: u32,
}

impl Mapped for Line {
    const NAME: &'static str = "Line";

    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::new(vec![
            FieldDescriptor::new("sku", ValueKind::Text, accessor!(Line, sku)),
            FieldDescriptor::new("qty", ValueKind::Uint, accessor!(Line, qty)),
        ])
    }
}

impl EmbeddableKind for Line {}

///
/// StatusConverter
/// Stores order status names as small integers.
///

#[derive(Debug, Default)]
pub(crate) struct StatusConverter;

impl AttributeConverter for StatusConverter {
    fn to_storage(&self, value: Value) -> Result<Value, ConvertError> {
        match value.as_text() {
            Some("open") => Ok(Value::Int(1)),
            Some("closed") => Ok(Value::Int(2)),
            _ => Err(ConvertError::converter(format!("unknown status {value}"))),
        }
    }

    fn to_entity(&self, value: Value) -> Result<Value, ConvertError> {
        match value {
            Value::Int(1) => Ok(Value::from("open")),
            Value::Int(2) => Ok(Value::from("closed")),
            other => Err(ConvertError::converter(format!("unknown status {other}"))),
        }
    }
}

///
/// Order
/// Sub-entity, embeddable collection, map, converter, overridden id name.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Order {
    pub id: Ulid,
    pub owner: Option<Person>,
    pub lines: Vec<Line>,
    pub attrs: BTreeMap<String, String>,
    pub status: String,
}

impl Mapped for Order {
    const NAME: &'static str = "Order";

    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::new(vec![
            FieldDescriptor::new("id", ValueKind::Ulid, accessor!(Order, id))
                .id()
                .storage_name("order_id"),
            FieldDescriptor::new("owner", ValueKind::Record, accessor!(Order, owner))
                .nested(Nested::entity::<Person>()),
            FieldDescriptor::new("lines", ValueKind::List, accessor!(Order, lines))
                .sequence(Some(Nested::embeddable::<Line>())),
            FieldDescriptor::new("attrs", ValueKind::Map, accessor!(Order, attrs)).map(),
            FieldDescriptor::new("status", ValueKind::Text, accessor!(Order, status))
                .converter(converter::<StatusConverter>()),
        ])
    }
}

impl EntityKind for Order {}

///
/// Tag
/// No id field.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Tag {
    pub label: String,
}

impl Mapped for Tag {
    const NAME: &'static str = "Tag";

    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::new(vec![FieldDescriptor::new(
            "label",
            ValueKind::Text,
            accessor!(Tag, label),
        )])
    }
}

impl EntityKind for Tag {}

///
/// DoubleKeyed
/// Two id fields; never builds.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct DoubleKeyed {
    pub id: u64,
    pub code: String,
}

impl Mapped for DoubleKeyed {
    const NAME: &'static str = "DoubleKeyed";

    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::new(vec![
            FieldDescriptor::new("id", ValueKind::Uint, accessor!(DoubleKeyed, id)).id(),
            FieldDescriptor::new("code", ValueKind::Text, accessor!(DoubleKeyed, code)).id(),
        ])
    }
}

impl EntityKind for DoubleKeyed {}

///
/// TreeNode
/// Maps itself through `parent`.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TreeNode {
    pub id: u64,
    pub parent: Option<Box<TreeNode>>,
}

impl Mapped for TreeNode {
    const NAME: &'static str = "TreeNode";

    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::new(vec![
            FieldDescriptor::new("id", ValueKind::Uint, accessor!(TreeNode, id)).id(),
            FieldDescriptor::new("parent", ValueKind::Record, accessor!(TreeNode, parent))
                .nested(Nested::entity::<TreeNode>()),
        ])
    }
}

impl EntityKind for TreeNode {}

///
/// Author / Manuscript
/// Map each other; descriptors are slow so concurrent first lookups overlap.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Author {
    pub id: u64,
    pub latest: Option<Box<Manuscript>>,
}

impl Mapped for Author {
    const NAME: &'static str = "Author";

    fn descriptor() -> EntityDescriptor<Self> {
        std::thread::sleep(std::time::Duration::from_millis(50));
        EntityDescriptor::new(vec![
            FieldDescriptor::new("id", ValueKind::Uint, accessor!(Author, id)).id(),
            FieldDescriptor::new("latest", ValueKind::Record, accessor!(Author, latest))
                .nested(Nested::entity::<Manuscript>()),
        ])
    }
}

impl EntityKind for Author {}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Manuscript {
    pub id: u64,
    pub author: Option<Box<Author>>,
}

impl Mapped for Manuscript {
    const NAME: &'static str = "Manuscript";

    fn descriptor() -> EntityDescriptor<Self> {
        std::thread::sleep(std::time::Duration::from_millis(50));
        EntityDescriptor::new(vec![
            FieldDescriptor::new("id", ValueKind::Uint, accessor!(Manuscript, id)).id(),
            FieldDescriptor::new("author", ValueKind::Record, accessor!(Manuscript, author))
                .nested(Nested::entity::<Author>()),
        ])
    }
}

impl EntityKind for Manuscript {}

impl_mapped_field_value!(Address, Person, Line, TreeNode, Author, Manuscript);
