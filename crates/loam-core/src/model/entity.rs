use crate::{
    db::convert::ConvertError,
    model::{FieldDescriptor, FieldKind, FieldSchema, SchemaError},
    value::Value,
};
use derive_more::Deref;
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

///
/// Accessor
///
/// Read/write capability for one field of `E`.
/// Usually produced by the `accessor!` macro.
///

pub struct Accessor<E> {
    pub read: fn(&E) -> Value,
    pub write: fn(&mut E, Value) -> Result<(), ConvertError>,
}

impl<E> Clone for Accessor<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Accessor<E> {}

///
/// EntityDescriptor
///
/// Field list of a mapped type, in declaration order.
///

pub struct EntityDescriptor<E> {
    pub fields: Vec<FieldDescriptor<E>>,
}

impl<E> EntityDescriptor<E> {
    #[must_use]
    pub const fn new(fields: Vec<FieldDescriptor<E>>) -> Self {
        Self { fields }
    }
}

///
/// RecordShape
///
/// Type-erased part of a schema: field metadata, id position, name lookup,
/// and the `declared_path -> storage_path` table for nested fields.
/// Nested shapes are shared between owners through `Arc`.
///

pub struct RecordShape {
    name: &'static str,
    fields: Vec<FieldSchema>,
    id: Option<usize>,
    by_name: HashMap<&'static str, usize>,
    paths: BTreeMap<String, String>,
}

impl RecordShape {
    pub(crate) fn new(name: &'static str, fields: Vec<FieldSchema>) -> Self {
        let id = fields.iter().position(|field| field.is_id);
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.declared_name, i))
            .collect();
        let paths = build_paths(&fields);

        Self {
            name,
            fields,
            id,
            by_name,
            paths,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, declared_name: &str) -> Option<&FieldSchema> {
        self.by_name.get(declared_name).map(|&i| &self.fields[i])
    }

    /// Position of a field in declaration order.
    #[must_use]
    pub fn position(&self, declared_name: &str) -> Option<usize> {
        self.by_name.get(declared_name).copied()
    }

    /// The id field, if the entity declares one.
    #[must_use]
    pub fn id_field(&self) -> Option<&FieldSchema> {
        self.id.map(|i| &self.fields[i])
    }

    #[must_use]
    pub const fn id_position(&self) -> Option<usize> {
        self.id
    }

    /// The id field, for callers that cannot proceed without one.
    pub fn require_id(&self) -> Result<&FieldSchema, SchemaError> {
        self.id_field().ok_or_else(|| SchemaError::MissingId {
            entity: self.name.to_string(),
        })
    }

    /// Field reached by a dot-joined declared path (`address.city`).
    #[must_use]
    pub fn field_at_path(&self, path: &str) -> Option<&FieldSchema> {
        match path.split_once('.') {
            None => self.field(path),
            Some((head, rest)) => self
                .field(head)?
                .kind
                .nested_shape()?
                .field_at_path(rest),
        }
    }

    /// Storage path for a declared path, if the path is mapped.
    #[must_use]
    pub fn storage_path(&self, declared_path: &str) -> Option<&str> {
        self.paths.get(declared_path).map(String::as_str)
    }

    /// Storage path for a declared path; unmapped paths pass through unchanged.
    #[must_use]
    pub fn resolve_path(&self, declared_path: &str) -> String {
        self.storage_path(declared_path)
            .map_or_else(|| declared_path.to_string(), ToString::to_string)
    }

    /// All `(declared_path, storage_path)` pairs.
    pub fn paths(&self) -> impl Iterator<Item = (&str, &str)> {
        self.paths.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Top-level record columns written for this shape, with embedded
    /// fields expanded in place.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match &field.kind {
                FieldKind::Embedded(shape) => out.extend(shape.columns()),
                _ => out.push(field.storage_name.as_str()),
            }
        }

        out
    }
}

impl fmt::Debug for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordShape")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// Embedded fields keep their own storage names (flattened) and the owner gets
// no entry; nested records are addressed through their owner's storage name.
fn build_paths(fields: &[FieldSchema]) -> BTreeMap<String, String> {
    let mut paths = BTreeMap::new();

    for field in fields {
        let declared = field.declared_name;
        let storage = field.storage_name.as_str();
        if !field.kind.is_embedded() {
            paths.insert(declared.to_string(), storage.to_string());
        }

        match &field.kind {
            FieldKind::Embedded(shape) => {
                for (path, target) in shape.paths() {
                    paths.insert(format!("{declared}.{path}"), target.to_string());
                }
            }
            FieldKind::SubEntity(shape)
            | FieldKind::Collection {
                element: Some(shape),
                ..
            } => {
                for (path, target) in shape.paths() {
                    paths.insert(format!("{declared}.{path}"), format!("{storage}.{target}"));
                }
            }
            _ => {}
        }
    }

    paths
}

///
/// EntitySchema
///
/// Built, immutable schema for `E`: the shared record shape plus one
/// accessor per field (same order as `fields()`).
///

#[derive(Deref)]
pub struct EntitySchema<E> {
    #[deref]
    shape: Arc<RecordShape>,
    accessors: Vec<Accessor<E>>,
}

impl<E> EntitySchema<E> {
    pub(crate) const fn new(shape: Arc<RecordShape>, accessors: Vec<Accessor<E>>) -> Self {
        Self { shape, accessors }
    }

    #[must_use]
    pub const fn shape(&self) -> &Arc<RecordShape> {
        &self.shape
    }

    /// Read the field at `index` from an instance.
    #[must_use]
    pub fn read(&self, entity: &E, index: usize) -> Value {
        (self.accessors[index].read)(entity)
    }

    /// Write the field at `index` on an instance.
    pub fn write(&self, entity: &mut E, index: usize, value: Value) -> Result<(), ConvertError> {
        (self.accessors[index].write)(entity, value)
    }

    /// Read a field by declared name.
    #[must_use]
    pub fn read_field(&self, entity: &E, declared_name: &str) -> Option<Value> {
        self.position(declared_name).map(|i| self.read(entity, i))
    }

    /// Id value of an instance; `None` when there is no id field or it is null.
    #[must_use]
    pub fn id_value(&self, entity: &E) -> Option<Value> {
        let value = self.read(entity, self.id_position()?);

        (!value.is_null()).then_some(value)
    }
}

impl<E> fmt::Debug for EntitySchema<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.shape, f)
    }
}
