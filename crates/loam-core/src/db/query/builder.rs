//! Fluent construction of structured queries.
//!
//! ```ignore
//! let query = select("Person")
//!     .filter(eq("name", "Ada").and(between("age", 10, 20)))
//!     .order_by_desc("age")
//!     .limit(10)
//!     .build();
//! ```

use crate::{
    db::query::{CompareOp, ConditionNode, DeleteQuery, Operand, Sort, StructuredQuery},
    model::RecordShape,
    value::Value,
};
use std::sync::Arc;

// ----------------------------------------------------------------------
// condition helpers
// ----------------------------------------------------------------------

fn cmp(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> ConditionNode {
    ConditionNode::compare(field, op, Operand::Value(value.into()))
}

#[must_use]
pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> ConditionNode {
    cmp(field, CompareOp::Eq, value)
}

#[must_use]
pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> ConditionNode {
    cmp(field, CompareOp::Ne, value)
}

#[must_use]
pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> ConditionNode {
    cmp(field, CompareOp::Gt, value)
}

#[must_use]
pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> ConditionNode {
    cmp(field, CompareOp::Gte, value)
}

#[must_use]
pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> ConditionNode {
    cmp(field, CompareOp::Lt, value)
}

#[must_use]
pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> ConditionNode {
    cmp(field, CompareOp::Lte, value)
}

/// `%` matches any run of characters, `_` exactly one.
#[must_use]
pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> ConditionNode {
    cmp(field, CompareOp::Like, Value::Text(pattern.into()))
}

/// Inclusive range.
#[must_use]
pub fn between(
    field: impl Into<String>,
    low: impl Into<Value>,
    high: impl Into<Value>,
) -> ConditionNode {
    cmp(field, CompareOp::Between, Value::list([low.into(), high.into()]))
}

#[must_use]
pub fn in_<I, T>(field: impl Into<String>, values: I) -> ConditionNode
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    cmp(field, CompareOp::In, Value::list(values))
}

#[must_use]
pub fn not(condition: ConditionNode) -> ConditionNode {
    condition.negate()
}

/// Comparison against a named parameter, bound later.
#[must_use]
pub fn param(field: impl Into<String>, op: CompareOp, name: impl Into<String>) -> ConditionNode {
    ConditionNode::compare(field, op, Operand::Param(name.into()))
}

// ----------------------------------------------------------------------
// builders
// ----------------------------------------------------------------------

/// Start a select over `entity`.
#[must_use]
pub fn select(entity: impl Into<String>) -> QueryBuilder {
    QueryBuilder {
        query: StructuredQuery::all(entity),
        shape: None,
    }
}

/// Start a delete over `entity`.
#[must_use]
pub fn delete(entity: impl Into<String>) -> DeleteBuilder {
    DeleteBuilder {
        query: DeleteQuery::all(entity),
        shape: None,
    }
}

///
/// QueryBuilder
///
/// In schema-mapped mode (`mapped`) field names are declared paths and are
/// resolved to storage paths when the query is built.
///

#[derive(Clone, Debug)]
pub struct QueryBuilder {
    query: StructuredQuery,
    shape: Option<Arc<RecordShape>>,
}

impl QueryBuilder {
    /// Select over a mapped shape, resolving declared names at build time.
    #[must_use]
    pub fn mapped(shape: Arc<RecordShape>) -> Self {
        Self {
            query: StructuredQuery::all(shape.name()),
            shape: Some(shape),
        }
    }

    /// Add a condition; repeated calls are joined with `and`.
    #[must_use]
    pub fn filter(mut self, condition: ConditionNode) -> Self {
        self.query.condition = Some(match self.query.condition.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Join `condition` to the current one with `or`.
    #[must_use]
    pub fn or_filter(mut self, condition: ConditionNode) -> Self {
        self.query.condition = Some(match self.query.condition.take() {
            Some(existing) => existing.or(condition),
            None => condition,
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.query.sorts.push(Sort::asc(field));
        self
    }

    #[must_use]
    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.query.sorts.push(Sort::desc(field));
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.query.skip = skip;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit = limit;
        self
    }

    #[must_use]
    pub fn build(self) -> StructuredQuery {
        let Some(shape) = self.shape else {
            return self.query;
        };

        let resolve = |field: &str| shape.resolve_path(field);
        let mut query = self.query;
        query.condition = query.condition.map(|c| c.map_fields(&resolve));
        for sort in &mut query.sorts {
            sort.field = resolve(&sort.field);
        }

        query
    }
}

///
/// DeleteBuilder
///

#[derive(Clone, Debug)]
pub struct DeleteBuilder {
    query: DeleteQuery,
    shape: Option<Arc<RecordShape>>,
}

impl DeleteBuilder {
    #[must_use]
    pub fn mapped(shape: Arc<RecordShape>) -> Self {
        Self {
            query: DeleteQuery::all(shape.name()),
            shape: Some(shape),
        }
    }

    #[must_use]
    pub fn filter(mut self, condition: ConditionNode) -> Self {
        self.query.condition = Some(match self.query.condition.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    #[must_use]
    pub fn build(self) -> DeleteQuery {
        let Some(shape) = self.shape else {
            return self.query;
        };

        let resolve = |field: &str| shape.resolve_path(field);
        let mut query = self.query;
        query.condition = query.condition.map(|c| c.map_fields(&resolve));

        query
    }
}
