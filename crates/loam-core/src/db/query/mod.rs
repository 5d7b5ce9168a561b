//! Structured queries and the derived-query pipeline.
//!
//! grammar (method name → `ConditionSpec`) → derive (spec + schema + args →
//! `StructuredQuery` with placeholders) → bind (placeholders + args →
//! `ParamBindings`).

pub mod bind;
pub mod builder;
pub mod condition;
pub mod derive;
pub mod grammar;

#[cfg(test)]
mod tests;

use crate::{
    error::ErrorClass,
    value::{Value, ValueKind},
};
use derive_more::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, fmt};
use thiserror::Error as ThisError;

// re-exports
pub use bind::{BindOutcome, bind, bind_named};
pub use builder::{DeleteBuilder, QueryBuilder, delete, select};
pub use condition::{CompareOp, Comparison, ConditionNode, Operand, SlotArity};
pub use derive::{CallArg, DerivedQuery, derive_delete, derive_select};
pub use grammar::{ConditionSpec, Connective, OrderSpec, Term, parse};

///
/// Direction
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

///
/// Sort
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

///
/// Pagination
///
/// `limit == 0` means unbounded.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Pagination {
    pub skip: u64,
    pub limit: u64,
}

impl Pagination {
    #[must_use]
    pub const fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit }
    }

    /// One-based page of `size` records.
    #[must_use]
    pub const fn page(page: u64, size: u64) -> Self {
        Self {
            skip: page.saturating_sub(1).saturating_mul(size),
            limit: size,
        }
    }
}

///
/// StructuredQuery
///
/// Backend-agnostic select. Built per call; never shared.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StructuredQuery {
    pub source_entity: String,
    pub condition: Option<ConditionNode>,
    pub sorts: Vec<Sort>,
    pub skip: u64,
    pub limit: u64,
}

impl StructuredQuery {
    /// Unconditioned query over a whole entity.
    #[must_use]
    pub fn all(source_entity: impl Into<String>) -> Self {
        Self {
            source_entity: source_entity.into(),
            condition: None,
            sorts: Vec::new(),
            skip: 0,
            limit: 0,
        }
    }

    #[must_use]
    pub fn with_condition(mut self, condition: ConditionNode) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub fn bind(mut self, bindings: &ParamBindings) -> Self {
        self.condition = self.condition.map(|c| c.bind(bindings));
        self
    }

    #[must_use]
    pub const fn pagination(&self) -> Pagination {
        Pagination::new(self.skip, self.limit)
    }

    /// Stable 64-bit fingerprint of the query text.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        fingerprint(&self.to_string())
    }
}

impl fmt::Display for StructuredQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select * from {}", self.source_entity)?;
        if let Some(condition) = &self.condition {
            write!(f, " where {condition}")?;
        }
        for (i, sort) in self.sorts.iter().enumerate() {
            let lead = if i == 0 { " order by" } else { "," };
            write!(f, "{lead} {} {}", sort.field, sort.direction)?;
        }
        if self.skip > 0 {
            write!(f, " skip {}", self.skip)?;
        }
        if self.limit > 0 {
            write!(f, " limit {}", self.limit)?;
        }

        Ok(())
    }
}

///
/// DeleteQuery
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DeleteQuery {
    pub source_entity: String,
    pub condition: Option<ConditionNode>,
}

impl DeleteQuery {
    #[must_use]
    pub fn all(source_entity: impl Into<String>) -> Self {
        Self {
            source_entity: source_entity.into(),
            condition: None,
        }
    }

    #[must_use]
    pub fn with_condition(mut self, condition: ConditionNode) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub fn bind(mut self, bindings: &ParamBindings) -> Self {
        self.condition = self.condition.map(|c| c.bind(bindings));
        self
    }

    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        fingerprint(&self.to_string())
    }
}

impl fmt::Display for DeleteQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delete from {}", self.source_entity)?;
        if let Some(condition) = &self.condition {
            write!(f, " where {condition}")?;
        }

        Ok(())
    }
}

pub(crate) fn fingerprint(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);

    u64::from_be_bytes(head)
}

///
/// ParamPlaceholder
///
/// Generated placeholder name bound to a schema field and a slot arity.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParamPlaceholder {
    pub name: String,
    /// Declared path (`address.city`), used for converter lookup.
    pub declared_path: String,
    /// Resolved storage path used in the condition.
    pub storage_path: String,
    pub arity: SlotArity,
}

///
/// ParamBindings
///
/// Placeholder name → converted value. Fresh per call.
///

#[derive(Clone, Debug, Default, Deref, IntoIterator, PartialEq)]
pub struct ParamBindings(BTreeMap<String, Value>);

impl ParamBindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }
}

impl FromIterator<(String, Value)> for ParamBindings {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

///
/// QueryDerivationError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryDerivationError {
    #[error("method '{method}' has no predicate after its prefix")]
    EmptyPredicate { method: String },

    #[error("derived query expects {expected} argument(s), found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("term '{term}' names no field before its operator")]
    UnknownOperatorSuffix { term: String },

    #[error("field '{field}' is flattened into its owner; compare one of its fields")]
    FlattenedField { field: String },
}

impl QueryDerivationError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::EmptyPredicate { .. }
            | Self::UnknownOperatorSuffix { .. }
            | Self::FlattenedField { .. } => ErrorClass::Unsupported,
            Self::ArityMismatch { .. } => ErrorClass::InvariantViolation,
        }
    }
}

///
/// BindError
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum BindError {
    #[error("expected {expected} parameter value(s), found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("cannot convert {value} for field '{field}' to {target}")]
    Unconvertible {
        field: String,
        value: Value,
        target: ValueKind,
    },

    #[error("converter rejected value for field '{field}': {message}")]
    Converter { field: String, message: String },
}

impl BindError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::ArityMismatch { .. } => ErrorClass::InvariantViolation,
            Self::Unconvertible { .. } | Self::Converter { .. } => ErrorClass::Unsupported,
        }
    }
}
