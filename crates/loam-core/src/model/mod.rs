//! Runtime data model definitions.
//!
//! Descriptors (`EntityDescriptor`, `FieldDescriptor`) are the ahead-of-time
//! declarations a mapped type hands over; the registry classifies them once
//! into immutable schemas (`EntitySchema`, `RecordShape`, `FieldSchema`) that
//! derivation, binding, and conversion read at runtime.
//!
//! In general:
//! - Derive / hand-written code defines *what exists*
//! - `model` defines *what runs*

pub mod convert;
pub mod entity;
pub mod field;
pub mod registry;

#[cfg(test)]
mod tests;

use crate::error::ErrorClass;
use thiserror::Error as ThisError;

// re-exports
pub use convert::{AttributeConverter, ConverterRef, converter};
pub use entity::{Accessor, EntityDescriptor, EntitySchema, RecordShape};
pub use field::{
    Container, FieldDeclaration, FieldDescriptor, FieldKind, FieldSchema, Nested, NestedKind,
    ShapeFn,
};
pub use registry::{SchemaConfig, SchemaRegistry, schema_of};

///
/// SchemaError
///
/// Failures raised while building a schema, or by callers that need
/// schema facts (an id field) the entity does not declare.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SchemaError {
    #[error("entity '{entity}' declares more than one id field: {}", .fields.join(", "))]
    MultipleIds { entity: String, fields: Vec<String> },

    #[error("entity '{entity}' declares no id field")]
    MissingId { entity: String },

    #[error("entity '{entity}' maps itself through a nested field")]
    RecursiveMapping { entity: String },
}

impl SchemaError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::MultipleIds { .. } | Self::MissingId { .. } => ErrorClass::InvariantViolation,
            Self::RecursiveMapping { .. } => ErrorClass::Unsupported,
        }
    }
}
