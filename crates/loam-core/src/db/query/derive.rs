use crate::{
    db::query::{
        Comparison, ConditionNode, ConditionSpec, Connective, DeleteQuery, Operand, Pagination,
        ParamPlaceholder, QueryDerivationError, Sort, StructuredQuery, Term,
    },
    model::RecordShape,
    obs::sink::{MetricsEvent, record},
    value::Value,
};
use std::collections::HashMap;

///
/// CallArg
///
/// Positional argument as seen by derivation: a value filling a placeholder
/// slot, or a sort / pagination marker.
///

#[derive(Clone, Debug, PartialEq)]
pub enum CallArg {
    Value(Value),
    Sort(Sort),
    Page(Pagination),
}

impl CallArg {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }
}

impl From<Value> for CallArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Sort> for CallArg {
    fn from(sort: Sort) -> Self {
        Self::Sort(sort)
    }
}

impl From<Pagination> for CallArg {
    fn from(page: Pagination) -> Self {
        Self::Page(page)
    }
}

///
/// DerivedQuery
///
/// Output of derivation: the query with placeholder operands, the
/// placeholders in slot order, and the positional values that fill them.
///

#[derive(Clone, Debug)]
pub struct DerivedQuery<Q> {
    pub query: Q,
    pub placeholders: Vec<ParamPlaceholder>,
    pub arguments: Vec<Value>,
}

/// Build a select from a parsed method name.
pub fn derive_select(
    spec: &ConditionSpec,
    shape: &RecordShape,
    args: &[CallArg],
) -> Result<DerivedQuery<StructuredQuery>, QueryDerivationError> {
    let parts = derive_parts(spec, shape, args)?;

    let mut query = StructuredQuery::all(shape.name());
    query.condition = parts.condition;
    query.sorts = spec
        .orderings
        .iter()
        .map(|order| Sort {
            field: shape.resolve_path(&order.path),
            direction: order.direction,
        })
        .chain(parts.sorts)
        .collect();
    if let Some(page) = parts.page {
        query.skip = page.skip;
        query.limit = page.limit;
    }

    record(MetricsEvent::QueryDerived {
        entity: shape.name(),
        fingerprint: query.fingerprint(),
        placeholders: parts.placeholders.len() as u64,
    });

    Ok(DerivedQuery {
        query,
        placeholders: parts.placeholders,
        arguments: parts.arguments,
    })
}

/// Build a delete from a parsed method name. Markers are ignored.
pub fn derive_delete(
    spec: &ConditionSpec,
    shape: &RecordShape,
    args: &[CallArg],
) -> Result<DerivedQuery<DeleteQuery>, QueryDerivationError> {
    let parts = derive_parts(spec, shape, args)?;

    let query = DeleteQuery {
        source_entity: shape.name().to_string(),
        condition: parts.condition,
    };

    record(MetricsEvent::QueryDerived {
        entity: shape.name(),
        fingerprint: query.fingerprint(),
        placeholders: parts.placeholders.len() as u64,
    });

    Ok(DerivedQuery {
        query,
        placeholders: parts.placeholders,
        arguments: parts.arguments,
    })
}

// ----------------------------------------------------------------------
// shared derivation
// ----------------------------------------------------------------------

struct Parts {
    condition: Option<ConditionNode>,
    placeholders: Vec<ParamPlaceholder>,
    arguments: Vec<Value>,
    sorts: Vec<Sort>,
    page: Option<Pagination>,
}

fn derive_parts(
    spec: &ConditionSpec,
    shape: &RecordShape,
    args: &[CallArg],
) -> Result<Parts, QueryDerivationError> {
    // an embedded owner has no column of its own
    if let Some(term) = spec.terms.iter().find(|term| {
        shape
            .field_at_path(&term.path)
            .is_some_and(|field| field.kind.is_embedded())
    }) {
        return Err(QueryDerivationError::FlattenedField {
            field: term.path.clone(),
        });
    }

    // split markers from slot values; extra values are ignored
    let expected = spec.slot_count();
    let mut arguments = Vec::with_capacity(expected);
    let mut sorts = Vec::new();
    let mut page = None;
    let mut found = 0;

    for arg in args {
        match arg {
            CallArg::Value(value) => {
                found += 1;
                if arguments.len() < expected {
                    arguments.push(value.clone());
                }
            }
            CallArg::Sort(sort) => sorts.push(Sort {
                field: shape.resolve_path(&sort.field),
                direction: sort.direction,
            }),
            CallArg::Page(p) => page = Some(*p),
        }
    }

    if found < expected {
        return Err(QueryDerivationError::ArityMismatch { expected, found });
    }

    let mut names = PlaceholderNames::default();
    let mut placeholders = Vec::with_capacity(spec.terms.len());
    let mut nodes = Vec::with_capacity(spec.terms.len());

    for term in &spec.terms {
        let placeholder = placeholder_for(term, shape, &mut names);
        nodes.push(comparison_for(term, &placeholder));
        placeholders.push(placeholder);
    }

    Ok(Parts {
        condition: fold(nodes, &spec.connectives),
        placeholders,
        arguments,
        sorts,
        page,
    })
}

fn placeholder_for(
    term: &Term,
    shape: &RecordShape,
    names: &mut PlaceholderNames,
) -> ParamPlaceholder {
    ParamPlaceholder {
        name: names.next(&term.path),
        declared_path: term.path.clone(),
        storage_path: shape.resolve_path(&term.path),
        arity: term.op.slots(),
    }
}

fn comparison_for(term: &Term, placeholder: &ParamPlaceholder) -> ConditionNode {
    ConditionNode::Compare(Comparison {
        field: placeholder.storage_path.clone(),
        op: term.op,
        negated: term.negated,
        operand: Operand::Param(placeholder.name.clone()),
    })
}

// Strict left-to-right fold: ((t0 c0 t1) c1 t2) ...
fn fold(nodes: Vec<ConditionNode>, connectives: &[Connective]) -> Option<ConditionNode> {
    let mut nodes = nodes.into_iter();
    let first = nodes.next()?;

    Some(
        nodes
            .zip(connectives)
            .fold(first, |acc, (node, connective)| match connective {
                Connective::And => acc.and(node),
                Connective::Or => acc.or(node),
            }),
    )
}

///
/// PlaceholderNames
///
/// Names placeholders after their declared path; repeats get `_1`, `_2`, ...
///

#[derive(Default)]
struct PlaceholderNames {
    seen: HashMap<String, usize>,
}

impl PlaceholderNames {
    fn next(&mut self, path: &str) -> String {
        let count = self.seen.entry(path.to_string()).or_insert(0);
        let name = match *count {
            0 => path.to_string(),
            n => format!("{path}_{n}"),
        };
        *count += 1;

        name
    }
}
