use crate::{
    db::record::Record,
    error::ErrorClass,
    model::{EntitySchema, FieldKind, SchemaError, SchemaRegistry},
    traits::Mapped,
    value::Value,
};
use std::sync::Arc;
use thiserror::Error as ThisError;

///
/// ConvertError
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ConvertError {
    #[error("cannot assign {value} to field '{entity}.{field}'")]
    FieldValue {
        entity: String,
        field: String,
        value: Value,
    },

    #[error("converter failed: {0}")]
    Converter(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ConvertError {
    /// Failure raised from inside an `AttributeConverter`.
    pub fn converter(message: impl Into<String>) -> Self {
        Self::Converter(message.into())
    }

    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::FieldValue { .. } | Self::Converter(_) => ErrorClass::Unsupported,
            Self::Schema(err) => err.class(),
        }
    }
}

///
/// EntityConverter
///
/// Schema-driven conversion between an entity and its storage record.
///
/// - embedded fields are flattened into the owner record
/// - sub-entities and embeddable collection elements nest as records
/// - maps and opaque collections are stored as-is
/// - per-field converters run in both directions
/// - null values are omitted from records
///

pub struct EntityConverter<E> {
    schema: Arc<EntitySchema<E>>,
}

impl<E> Clone for EntityConverter<E> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
        }
    }
}

impl<E: Mapped> EntityConverter<E> {
    #[must_use]
    pub const fn new(schema: Arc<EntitySchema<E>>) -> Self {
        Self { schema }
    }

    /// Converter over the global registry's schema for `E`.
    pub fn global() -> Result<Self, SchemaError> {
        SchemaRegistry::global().schema_of::<E>().map(Self::new)
    }

    #[must_use]
    pub const fn schema(&self) -> &Arc<EntitySchema<E>> {
        &self.schema
    }

    pub fn to_record(&self, entity: &E) -> Result<Record, ConvertError> {
        let mut record = Record::new(self.schema.name());

        for (i, field) in self.schema.fields().iter().enumerate() {
            let value = self.schema.read(entity, i);
            if value.is_null() {
                continue;
            }

            let value = match &field.converter {
                Some(converter) => converter.to_storage(value)?,
                None => value,
            };

            match (&field.kind, value) {
                (_, Value::Null) => {}
                (FieldKind::Embedded(_), Value::Record(nested)) => {
                    for (name, value) in nested.fields {
                        record.set(name, value);
                    }
                }
                (_, value) => record.set(field.storage_name.clone(), value),
            }
        }

        Ok(record)
    }

    pub fn from_record(&self, record: &Record) -> Result<E, ConvertError> {
        let mut entity = E::default();

        for (i, field) in self.schema.fields().iter().enumerate() {
            let value = match &field.kind {
                FieldKind::Embedded(shape) => {
                    let mut nested = Record::new(shape.name());
                    for column in shape.columns() {
                        if let Some(value) = record.get(column) {
                            nested.set(column, value.clone());
                        }
                    }
                    if nested.is_empty() {
                        continue;
                    }

                    Value::Record(nested)
                }
                _ => match record.get(&field.storage_name) {
                    Some(value) => value.clone(),
                    None => continue,
                },
            };

            let value = match &field.converter {
                Some(converter) if !value.is_null() => converter.to_entity(value)?,
                _ => value,
            };

            self.schema.write(&mut entity, i, value)?;
        }

        Ok(entity)
    }

    pub fn from_records(&self, records: Vec<Record>) -> Result<Vec<E>, ConvertError> {
        records.iter().map(|record| self.from_record(record)).collect()
    }
}

///
/// Nested value bridge
///
/// `FieldValue` for mapped types (generated by the derives) goes through
/// these helpers, using the global registry.
///

/// Convert a mapped value into `Value::Record`.
///
/// Conversion failures surface as `Value::Null`, which the owner's converter
/// then omits from its record.
#[must_use]
pub fn to_record_value<M: Mapped>(value: &M) -> Value {
    EntityConverter::<M>::global()
        .map_err(ConvertError::from)
        .and_then(|converter| converter.to_record(value))
        .map_or(Value::Null, Value::Record)
}

/// Rebuild a mapped value from `Value::Record`.
#[must_use]
pub fn from_record_value<M: Mapped>(value: &Value) -> Option<M> {
    let record = value.as_record()?;

    EntityConverter::<M>::global()
        .ok()?
        .from_record(record)
        .ok()
}

///
/// TESTS
///
