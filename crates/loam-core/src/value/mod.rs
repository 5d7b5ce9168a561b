mod coerce;
mod compare;


use crate::db::record::Record;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use ulid::Ulid;

// re-exports
pub use coerce::coerce;
pub use compare::{canonical_cmp, strict_ordering};

///
/// Value
///
/// Runtime value carried by records, query operands, and bound parameters.
///
/// Null   → the field holds no value (absent `Option`, SQL NULL).
/// Record → a nested storage record (sub-entity or embeddable element).
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Blob(Vec<u8>),
    Bool(bool),
    Float(f64),
    Int(i64),
    /// Ordered list of values.
    /// Used for collections and for multi-slot operands (`BETWEEN`, `IN`).
    List(Vec<Self>),
    /// String-keyed map; key order is canonical.
    Map(BTreeMap<String, Self>),
    #[default]
    Null,
    Record(Record),
    Text(String),
    Uint(u64),
    Ulid(Ulid),
}

impl Value {
    ///
    /// CONSTRUCTION
    ///

    /// Build a `Value::List` from anything convertible into values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    ///
    /// INSPECTION
    ///

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Blob(_) => ValueKind::Blob,
            Self::Bool(_) => ValueKind::Bool,
            Self::Float(_) => ValueKind::Float,
            Self::Int(_) => ValueKind::Int,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
            Self::Null => ValueKind::Any,
            Self::Record(_) => ValueKind::Record,
            Self::Text(_) => ValueKind::Text,
            Self::Uint(_) => ValueKind::Uint,
            Self::Ulid(_) => ValueKind::Ulid,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Returns true when the value already has the shape a field of `kind`
    /// stores, so no conversion is needed.
    #[must_use]
    pub fn matches_kind(&self, kind: ValueKind) -> bool {
        match kind {
            ValueKind::Any => true,
            _ => self.is_null() || self.kind() == kind,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob(bytes) => write!(f, "blob({})", bytes.len()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::Null => write!(f, "null"),
            Self::Record(record) => write!(f, "{record}"),
            Self::Text(text) => write!(f, "'{text}'"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Ulid(v) => write!(f, "{v}"),
        }
    }
}

// impl_value_from
macro_rules! impl_value_from {
    ( $( $type:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$type> for Value {
                fn from(v: $type) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Uint,
    u16 => Uint,
    u32 => Uint,
    u64 => Uint,
    f32 => Float,
    f64 => Float,
    String => Text,
    Ulid => Ulid,
    Record => Record,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<Self>> for Value {
    fn from(v: Vec<Self>) -> Self {
        Self::List(v)
    }
}

///
/// ValueKind
///
/// Declared storage type of a field.
/// `Any` accepts every value without conversion.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ValueKind {
    Any,
    Blob,
    Bool,
    Float,
    Int,
    List,
    Map,
    Record,
    Text,
    Uint,
    Ulid,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Any => "any",
            Self::Blob => "blob",
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Int => "int",
            Self::List => "list",
            Self::Map => "map",
            Self::Record => "record",
            Self::Text => "text",
            Self::Uint => "uint",
            Self::Ulid => "ulid",
        };
        write!(f, "{label}")
    }
}
