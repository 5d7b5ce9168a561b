use crate::db::{record::Record, repository::DispatchError};
use std::{collections::VecDeque, fmt, vec};

///
/// ReturnShape
///
/// Result shape a repository method declares.
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ReturnShape {
    Unit,
    Bool,
    Count,
    /// One entity or none; more than one is an error.
    Scalar,
    Optional,
    #[default]
    List,
    Iterable,
    Collection,
    /// Duplicate records collapse to one.
    Set,
    /// First in, first out.
    Queue,
    /// Single traversal.
    Stream,
}

impl fmt::Display for ReturnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unit => "unit",
            Self::Bool => "bool",
            Self::Count => "count",
            Self::Scalar => "scalar",
            Self::Optional => "optional",
            Self::List => "list",
            Self::Iterable => "iterable",
            Self::Collection => "collection",
            Self::Set => "set",
            Self::Queue => "queue",
            Self::Stream => "stream",
        };
        write!(f, "{label}")
    }
}

///
/// Returned
///
/// A call's result in its declared shape.
///

#[derive(Debug)]
pub enum Returned<E> {
    Unit,
    Bool(bool),
    Count(u64),
    Text(String),
    Single(Option<E>),
    Optional(Option<E>),
    List(Vec<E>),
    Set(Vec<E>),
    Queue(VecDeque<E>),
    Stream(vec::IntoIter<E>),
}

impl<E> Returned<E> {
    /// Rows carried, for dispatch accounting.
    #[must_use]
    pub fn rows(&self) -> u64 {
        let rows = match self {
            Self::Unit | Self::Bool(_) | Self::Text(_) => 0,
            Self::Count(n) => return *n,
            Self::Single(found) | Self::Optional(found) => usize::from(found.is_some()),
            Self::List(items) | Self::Set(items) => items.len(),
            Self::Queue(items) => items.len(),
            Self::Stream(items) => items.len(),
        };

        rows as u64
    }

    /// Entities carried, in result order; empty for non-entity shapes.
    #[must_use]
    pub fn into_entities(self) -> Vec<E> {
        match self {
            Self::Single(found) | Self::Optional(found) => found.into_iter().collect(),
            Self::List(items) | Self::Set(items) => items,
            Self::Queue(items) => items.into(),
            Self::Stream(items) => items.collect(),
            Self::Unit | Self::Bool(_) | Self::Count(_) | Self::Text(_) => Vec::new(),
        }
    }

    /// First entity carried, if any.
    #[must_use]
    pub fn into_single(self) -> Option<E> {
        match self {
            Self::Single(found) | Self::Optional(found) => found,
            other => other.into_entities().into_iter().next(),
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------
// reshaping
// ----------------------------------------------------------------------

/// At most one entity; more is `NonUniqueResult`.
pub(crate) fn single<E>(mut found: Vec<E>, context: &str) -> Result<Option<E>, DispatchError> {
    match found.len() {
        0 | 1 => Ok(found.pop()),
        count => Err(DispatchError::NonUniqueResult {
            context: context.to_string(),
            count,
        }),
    }
}

/// Drop repeated records, keeping the first occurrence.
pub(crate) fn dedupe(records: Vec<Record>) -> Vec<Record> {
    let mut out: Vec<Record> = Vec::with_capacity(records.len());
    for record in records {
        if !out.contains(&record) {
            out.push(record);
        }
    }

    out
}

/// Shape a list of entities.
pub(crate) fn entities<E>(
    found: Vec<E>,
    shape: ReturnShape,
    method: &str,
) -> Result<Returned<E>, DispatchError> {
    Ok(match shape {
        ReturnShape::Scalar => Returned::Single(single(found, method)?),
        ReturnShape::Optional => Returned::Optional(single(found, method)?),
        ReturnShape::List | ReturnShape::Iterable | ReturnShape::Collection => {
            Returned::List(found)
        }
        ReturnShape::Set => Returned::Set(found),
        ReturnShape::Queue => Returned::Queue(found.into()),
        ReturnShape::Stream => Returned::Stream(found.into_iter()),
        ReturnShape::Unit => Returned::Unit,
        ReturnShape::Bool => Returned::Bool(!found.is_empty()),
        ReturnShape::Count => Returned::Count(found.len() as u64),
    })
}

/// Reject a shape that cannot carry a row count.
/// Delete paths call this before touching the backend.
pub(crate) fn check_tally(shape: ReturnShape, method: &str) -> Result<(), DispatchError> {
    match shape {
        ReturnShape::Unit | ReturnShape::Count | ReturnShape::Bool => Ok(()),
        other => Err(mismatch(method, other)),
    }
}

/// Reject writing `count` entities into a single-entity shape.
pub(crate) fn check_written(
    count: usize,
    shape: ReturnShape,
    method: &str,
) -> Result<(), DispatchError> {
    match shape {
        ReturnShape::Scalar | ReturnShape::Optional if count > 1 => {
            Err(DispatchError::NonUniqueResult {
                context: method.to_string(),
                count,
            })
        }
        _ => Ok(()),
    }
}

/// Shape an affected-row count.
pub(crate) fn tally<E>(
    count: u64,
    shape: ReturnShape,
    method: &str,
) -> Result<Returned<E>, DispatchError> {
    check_tally(shape, method)?;

    Ok(match shape {
        ReturnShape::Count => Returned::Count(count),
        ReturnShape::Bool => Returned::Bool(count > 0),
        _ => Returned::Unit,
    })
}

pub(crate) fn flag<E>(
    value: bool,
    shape: ReturnShape,
    method: &str,
) -> Result<Returned<E>, DispatchError> {
    match shape {
        ReturnShape::Unit => Ok(Returned::Unit),
        ReturnShape::Bool => Ok(Returned::Bool(value)),
        other => Err(mismatch(method, other)),
    }
}

fn mismatch(method: &str, shape: ReturnShape) -> DispatchError {
    DispatchError::ShapeMismatch {
        method: method.to_string(),
        shape,
    }
}

///
/// TESTS
///
