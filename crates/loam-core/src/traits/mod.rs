use crate::{
    model::EntityDescriptor,
    value::{Value, ValueKind},
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};
use ulid::Ulid;

// ============================================================================
// MAPPED KINDS
// ============================================================================
//
// These traits describe *what a mapped type is*; the registry turns their
// descriptors into runtime schemas.
//

///
/// Mapped
///
/// A type with an ahead-of-time field descriptor.
/// Implemented by `#[derive(Entity)]` / `#[derive(Embeddable)]` or by hand.
///

pub trait Mapped: Default + Send + Sync + Sized + 'static {
    /// Storage name of the record this type maps to.
    const NAME: &'static str;

    /// Describe every mapped field, in declaration order.
    fn descriptor() -> EntityDescriptor<Self>;
}

/// Marker for top-level persistent entities.
pub trait EntityKind: Mapped {}

/// Marker for value types whose fields are flattened into their owner.
pub trait EmbeddableKind: Mapped {}

// ============================================================================
// FIELD VALUES
// ============================================================================

///
/// FieldValue
///
/// Conversion boundary between Rust field types and runtime `Value`s.
/// `kind` is the declared storage type used by the binder.
///

pub trait FieldValue {
    fn kind() -> ValueKind
    where
        Self: Sized;

    fn to_value(&self) -> Value;

    #[must_use]
    fn from_value(value: &Value) -> Option<Self>
    where
        Self: Sized;
}

impl FieldValue for String {
    fn kind() -> ValueKind {
        ValueKind::Text
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FieldValue for Ulid {
    fn kind() -> ValueKind {
        ValueKind::Ulid
    }

    fn to_value(&self) -> Value {
        Value::Ulid(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Ulid(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for f64 {
    fn kind() -> ValueKind {
        ValueKind::Float
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for f32 {
    fn kind() -> ValueKind {
        ValueKind::Float
    }

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    #[expect(clippy::cast_possible_truncation)]
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v as Self),
            _ => None,
        }
    }
}

impl FieldValue for Value {
    fn kind() -> ValueKind {
        ValueKind::Any
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn kind() -> ValueKind {
        T::kind()
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        if matches!(value, Value::Null) {
            return Some(None);
        }

        T::from_value(value).map(Some)
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    fn kind() -> ValueKind {
        T::kind()
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn from_value(value: &Value) -> Option<Self> {
        T::from_value(value).map(Self::new)
    }
}

// ----------------------------------------------------------------------
// collections
// ----------------------------------------------------------------------

impl<T: FieldValue> FieldValue for Vec<T> {
    fn kind() -> ValueKind {
        ValueKind::List
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        let Value::List(items) = value else {
            return None;
        };

        items.iter().map(T::from_value).collect()
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn kind() -> ValueKind {
        ValueKind::List
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        let Value::List(items) = value else {
            return None;
        };

        items.iter().map(T::from_value).collect()
    }
}

impl<T, S> FieldValue for HashSet<T, S>
where
    T: FieldValue + Eq + Hash,
    S: BuildHasher + Default,
{
    fn kind() -> ValueKind {
        ValueKind::List
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        let Value::List(items) = value else {
            return None;
        };

        items.iter().map(T::from_value).collect()
    }
}

impl<T: FieldValue> FieldValue for BTreeMap<String, T> {
    fn kind() -> ValueKind {
        ValueKind::Map
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(key, value)| (key.clone(), value.to_value()))
                .collect(),
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        let Value::Map(entries) = value else {
            return None;
        };

        entries
            .iter()
            .map(|(key, value)| T::from_value(value).map(|v| (key.clone(), v)))
            .collect()
    }
}

impl<T, S> FieldValue for HashMap<String, T, S>
where
    T: FieldValue,
    S: BuildHasher + Default,
{
    fn kind() -> ValueKind {
        ValueKind::Map
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(key, value)| (key.clone(), value.to_value()))
                .collect(),
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        let Value::Map(entries) = value else {
            return None;
        };

        entries
            .iter()
            .map(|(key, value)| T::from_value(value).map(|v| (key.clone(), v)))
            .collect()
    }
}

// impl_field_value
#[macro_export]
macro_rules! impl_field_value {
    ( $( $type:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl $crate::traits::FieldValue for $type {
                fn kind() -> $crate::value::ValueKind {
                    $crate::value::ValueKind::$variant
                }

                fn to_value(&self) -> $crate::value::Value {
                    $crate::value::Value::$variant((*self).into())
                }

                fn from_value(value: &$crate::value::Value) -> Option<Self> {
                    match value {
                        $crate::value::Value::$variant(v) => (*v).try_into().ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_field_value!(
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Uint,
    u16 => Uint,
    u32 => Uint,
    u64 => Uint,
    bool => Bool,
);

/// `FieldValue` for mapped types: values travel as `Value::Record`
/// converted through the global registry.
#[macro_export]
macro_rules! impl_mapped_field_value {
    ( $( $type:ty ),* $(,)? ) => {
        $(
            impl $crate::traits::FieldValue for $type {
                fn kind() -> $crate::value::ValueKind {
                    $crate::value::ValueKind::Record
                }

                fn to_value(&self) -> $crate::value::Value {
                    $crate::db::convert::to_record_value(self)
                }

                fn from_value(value: &$crate::value::Value) -> Option<Self> {
                    $crate::db::convert::from_record_value(value)
                }
            }
        )*
    };
}

// ============================================================================
// ACCESSORS
// ============================================================================

/// Build a read/write [`Accessor`](crate::model::Accessor) for one struct field.
///
/// ```ignore
/// accessor!(Person, name)
/// ```
#[macro_export]
macro_rules! accessor {
    ($entity:ty, $field:ident) => {
        $crate::model::Accessor::<$entity> {
            read: |entity: &$entity| $crate::traits::FieldValue::to_value(&entity.$field),
            write: |entity: &mut $entity,
                    value: $crate::value::Value|
             -> ::std::result::Result<(), $crate::db::convert::ConvertError> {
                entity.$field = $crate::traits::FieldValue::from_value(&value).ok_or_else(|| {
                    $crate::db::convert::ConvertError::FieldValue {
                        entity: <$entity as $crate::traits::Mapped>::NAME.to_string(),
                        field: stringify!($field).to_string(),
                        value,
                    }
                })?;
                Ok(())
            },
        }
    };
}

///
/// TESTS
///
