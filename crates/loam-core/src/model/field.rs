use crate::{
    model::{Accessor, ConverterRef, RecordShape, SchemaError, SchemaRegistry},
    traits::{EmbeddableKind, EntityKind},
    value::ValueKind,
};
use std::sync::Arc;

/// Resolves the shape of a nested mapped type against a registry.
pub type ShapeFn = fn(&SchemaRegistry) -> Result<Arc<RecordShape>, SchemaError>;

///
/// NestedKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NestedKind {
    Embeddable,
    Entity,
}

///
/// Nested
///
/// Reference to a mapped type used as a field value (or collection element).
///

#[derive(Clone, Copy)]
pub struct Nested {
    pub kind: NestedKind,
    pub shape: ShapeFn,
}

impl Nested {
    #[must_use]
    pub fn embeddable<M: EmbeddableKind>() -> Self {
        Self {
            kind: NestedKind::Embeddable,
            shape: SchemaRegistry::shape_of::<M>,
        }
    }

    #[must_use]
    pub fn entity<M: EntityKind>() -> Self {
        Self {
            kind: NestedKind::Entity,
            shape: SchemaRegistry::shape_of::<M>,
        }
    }
}

///
/// Container
///
/// Outer shape of the declared field type.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Container {
    #[default]
    Single,
    Sequence,
    Map,
}

///
/// FieldDeclaration
///
/// What the descriptor knows about a field's type, before classification.
///

#[derive(Clone, Copy, Default)]
pub struct FieldDeclaration {
    /// Explicitly declared as flattened into the owner.
    pub flatten: bool,
    pub nested: Option<Nested>,
    pub container: Container,
}

impl FieldDeclaration {
    /// Classify in priority order: embedded, sub-entity, collection, map, default.
    pub(crate) fn classify(&self, registry: &SchemaRegistry) -> Result<FieldKind, SchemaError> {
        let nested = |n: &Nested| (n.shape)(registry);

        match (self.container, self.nested) {
            (Container::Single, Some(n)) if self.flatten || n.kind == NestedKind::Embeddable => {
                Ok(FieldKind::Embedded(nested(&n)?))
            }
            (Container::Single, Some(n)) => Ok(FieldKind::SubEntity(nested(&n)?)),
            (Container::Sequence, Some(n)) => Ok(FieldKind::Collection {
                element: Some(nested(&n)?),
                embeddable: true,
            }),
            (Container::Sequence, None) => Ok(FieldKind::Collection {
                element: None,
                embeddable: false,
            }),
            (Container::Map, _) => Ok(FieldKind::Map),
            (Container::Single, None) => Ok(FieldKind::Default),
        }
    }
}

///
/// FieldDescriptor
///
/// Ahead-of-time declaration of one mapped field.
///

pub struct FieldDescriptor<E> {
    pub name: &'static str,
    pub storage_name: Option<&'static str>,
    pub id: bool,
    pub value_kind: ValueKind,
    pub declaration: FieldDeclaration,
    pub converter: Option<ConverterRef>,
    pub accessor: Accessor<E>,
}

impl<E> FieldDescriptor<E> {
    #[must_use]
    pub fn new(name: &'static str, value_kind: ValueKind, accessor: Accessor<E>) -> Self {
        Self {
            name,
            storage_name: None,
            id: false,
            value_kind,
            declaration: FieldDeclaration::default(),
            converter: None,
            accessor,
        }
    }

    #[must_use]
    pub fn id(mut self) -> Self {
        self.id = true;
        self
    }

    #[must_use]
    pub fn storage_name(mut self, name: &'static str) -> Self {
        self.storage_name = Some(name);
        self
    }

    /// Flatten a nested embeddable into the owner record.
    #[must_use]
    pub fn embedded(mut self, nested: Nested) -> Self {
        self.declaration.flatten = true;
        self.declaration.nested = Some(nested);
        self
    }

    /// Nested mapped value (entity or embeddable).
    #[must_use]
    pub fn nested(mut self, nested: Nested) -> Self {
        self.declaration.nested = Some(nested);
        self
    }

    /// Sequence or set; `element` is set when elements are mapped types.
    #[must_use]
    pub fn sequence(mut self, element: Option<Nested>) -> Self {
        self.declaration.container = Container::Sequence;
        self.declaration.nested = element;
        self
    }

    #[must_use]
    pub fn map(mut self) -> Self {
        self.declaration.container = Container::Map;
        self
    }

    #[must_use]
    pub fn converter(mut self, converter: ConverterRef) -> Self {
        self.converter = Some(converter);
        self
    }
}

///
/// FieldKind
///
/// Classified storage behaviour of a field.
///

#[derive(Clone, Debug)]
pub enum FieldKind {
    Default,
    /// Flattened into the owner record, no wrapper.
    Embedded(Arc<RecordShape>),
    /// Nested record, not flattened.
    SubEntity(Arc<RecordShape>),
    Collection {
        element: Option<Arc<RecordShape>>,
        embeddable: bool,
    },
    Map,
}

impl FieldKind {
    /// Shape reachable through this field, if any.
    #[must_use]
    pub fn nested_shape(&self) -> Option<&Arc<RecordShape>> {
        match self {
            Self::Embedded(shape) | Self::SubEntity(shape) => Some(shape),
            Self::Collection { element, .. } => element.as_ref(),
            Self::Default | Self::Map => None,
        }
    }

    #[must_use]
    pub const fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }
}

///
/// FieldSchema
///
/// Runtime metadata for one field of a built schema.
///

#[derive(Clone, Debug)]
pub struct FieldSchema {
    pub declared_name: &'static str,
    pub storage_name: String,
    pub kind: FieldKind,
    pub is_id: bool,
    pub value_kind: ValueKind,
    pub converter: Option<ConverterRef>,
}
