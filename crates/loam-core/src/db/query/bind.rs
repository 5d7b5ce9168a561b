use crate::{
    db::query::{BindError, ParamBindings, ParamPlaceholder, SlotArity},
    model::{FieldSchema, RecordShape},
    obs::sink::{MetricsEvent, record},
    value::{Value, ValueKind, coerce},
};

///
/// BindOutcome
///
/// How one parameter value reached its bound form.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BindOutcome {
    /// Already had the field's storage type.
    Passed,
    /// Ran through the field's converter.
    Converted,
    /// Generic coercion (text → number, widening, ...).
    Coerced,
    /// No schema field; bound as given.
    Raw,
}

/// Bind positional values to placeholders, converting each to the storage
/// type of the field it targets.
///
/// A `Between` placeholder consumes two values and binds a two-element list;
/// an `In` placeholder consumes one sequence. The total count is checked
/// before anything is converted.
pub fn bind(
    placeholders: &[ParamPlaceholder],
    values: &[Value],
    shape: &RecordShape,
) -> Result<ParamBindings, BindError> {
    let expected: usize = placeholders.iter().map(|p| p.arity.width()).sum();
    if values.len() != expected {
        return Err(BindError::ArityMismatch {
            expected,
            found: values.len(),
        });
    }

    let mut bindings = ParamBindings::new();
    let mut values = values.iter().cloned();

    for placeholder in placeholders {
        let field = shape.field_at_path(&placeholder.declared_path);
        let raw = match placeholder.arity {
            SlotArity::One | SlotArity::Many => values.next().unwrap_or_default(),
            SlotArity::Two => Value::list([
                values.next().unwrap_or_default(),
                values.next().unwrap_or_default(),
            ]),
        };

        let bound = match placeholder.arity {
            SlotArity::One => convert(shape, field, &placeholder.declared_path, raw)?,
            SlotArity::Two | SlotArity::Many => {
                convert_each(shape, field, &placeholder.declared_path, raw)?
            }
        };
        bindings.insert(placeholder.name.clone(), bound);
    }

    Ok(bindings)
}

/// Bind named values (literal queries). Names resolve as declared paths;
/// lists are converted element-wise.
pub fn bind_named<I, K>(named: I, shape: &RecordShape) -> Result<ParamBindings, BindError>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let mut bindings = ParamBindings::new();

    for (name, value) in named {
        let name = name.into();
        let field = shape.field_at_path(&name);
        let bound = match value {
            Value::List(_) if !field.is_some_and(|f| value.matches_kind(f.value_kind)) => {
                convert_each(shape, field, &name, value)?
            }
            value => convert(shape, field, &name, value)?,
        };
        bindings.insert(name, bound);
    }

    Ok(bindings)
}

// ----------------------------------------------------------------------
// conversion
// ----------------------------------------------------------------------

fn convert_each(
    shape: &RecordShape,
    field: Option<&FieldSchema>,
    path: &str,
    value: Value,
) -> Result<Value, BindError> {
    let items = match value {
        Value::List(items) => items,
        scalar => vec![scalar],
    };

    items
        .into_iter()
        .map(|item| convert(shape, field, path, item))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

// converter → pass-through → generic coercion
fn convert(
    shape: &RecordShape,
    field: Option<&FieldSchema>,
    path: &str,
    value: Value,
) -> Result<Value, BindError> {
    let (bound, outcome) = match field {
        None => (value, BindOutcome::Raw),
        Some(FieldSchema {
            converter: Some(converter),
            ..
        }) => {
            let converted = converter
                .to_storage(value)
                .map_err(|err| BindError::Converter {
                    field: path.to_string(),
                    message: err.to_string(),
                })?;
            (converted, BindOutcome::Converted)
        }
        Some(field) if value.matches_kind(field.value_kind) => (value, BindOutcome::Passed),
        // a scalar against a list field is a membership test
        Some(field) if field.value_kind == ValueKind::List => (value, BindOutcome::Passed),
        Some(field) => match coerce(&value, field.value_kind) {
            Some(coerced) => (coerced, BindOutcome::Coerced),
            None => {
                return Err(BindError::Unconvertible {
                    field: path.to_string(),
                    value,
                    target: field.value_kind,
                });
            }
        },
    };

    record(MetricsEvent::Bind {
        entity: shape.name(),
        outcome,
    });

    Ok(bound)
}
