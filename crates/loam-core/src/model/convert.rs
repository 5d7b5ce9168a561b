use crate::{db::convert::ConvertError, value::Value};
use std::{fmt, sync::Arc};

///
/// AttributeConverter
///
/// Per-field conversion between the entity-side value and the value the
/// backend stores. Applied by the entity converter in both directions and by
/// the parameter binder before any generic coercion.
///

pub trait AttributeConverter: fmt::Debug + Send + Sync {
    fn to_storage(&self, value: Value) -> Result<Value, ConvertError>;

    fn to_entity(&self, value: Value) -> Result<Value, ConvertError>;
}

/// Shared handle to a registered converter.
pub type ConverterRef = Arc<dyn AttributeConverter>;

/// Instantiate a converter type for a field descriptor.
#[must_use]
pub fn converter<C>() -> ConverterRef
where
    C: AttributeConverter + Default + 'static,
{
    Arc::new(C::default())
}
