use crate::{
    db::{
        query::{CallArg, DeleteQuery, Pagination, Sort, StructuredQuery},
        repository::ReturnShape,
    },
    value::Value,
};

///
/// Arg
///
/// One argument of a repository call.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Arg<E> {
    /// Positional value filling a derived-query slot.
    Value(Value),
    Sort(Sort),
    Page(Pagination),
    Query(StructuredQuery),
    Delete(DeleteQuery),
    /// Named literal-query parameter.
    Named(String, Value),
    Entity(E),
    Entities(Vec<E>),
}

impl<E> Arg<E> {
    /// Positional form seen by derivation; `None` for arguments derivation
    /// does not consume.
    pub(crate) fn positional(&self) -> Option<CallArg> {
        match self {
            Self::Value(value) => Some(CallArg::Value(value.clone())),
            Self::Sort(sort) => Some(CallArg::Sort(sort.clone())),
            Self::Page(page) => Some(CallArg::Page(*page)),
            _ => None,
        }
    }
}

///
/// MethodCall
///
/// A repository method invocation: name, arguments, optional literal query
/// text, and the declared return shape (defaults to a list).
///

#[derive(Clone, Debug)]
pub struct MethodCall<E> {
    pub name: String,
    pub args: Vec<Arg<E>>,
    pub literal: Option<String>,
    pub shape: ReturnShape,
}

impl<E> MethodCall<E> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            literal: None,
            shape: ReturnShape::List,
        }
    }

    #[must_use]
    pub fn push(mut self, arg: Arg<E>) -> Self {
        self.args.push(arg);
        self
    }

    #[must_use]
    pub fn arg(self, value: impl Into<Value>) -> Self {
        self.push(Arg::Value(value.into()))
    }

    #[must_use]
    pub fn named(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Arg::Named(name.into(), value.into()))
    }

    #[must_use]
    pub fn sort(self, sort: Sort) -> Self {
        self.push(Arg::Sort(sort))
    }

    #[must_use]
    pub fn page(self, page: Pagination) -> Self {
        self.push(Arg::Page(page))
    }

    #[must_use]
    pub fn query(self, query: StructuredQuery) -> Self {
        self.push(Arg::Query(query))
    }

    #[must_use]
    pub fn delete_query(self, query: DeleteQuery) -> Self {
        self.push(Arg::Delete(query))
    }

    #[must_use]
    pub fn entity(self, entity: E) -> Self {
        self.push(Arg::Entity(entity))
    }

    #[must_use]
    pub fn entities(self, entities: Vec<E>) -> Self {
        self.push(Arg::Entities(entities))
    }

    /// Attach literal query text; the call then dispatches as a literal
    /// query unless it is a built-in or carries a pre-built query.
    #[must_use]
    pub fn literal(mut self, text: impl Into<String>) -> Self {
        self.literal = Some(text.into());
        self
    }

    #[must_use]
    pub const fn returning(mut self, shape: ReturnShape) -> Self {
        self.shape = shape;
        self
    }

    pub(crate) fn find_query(&self) -> Option<&StructuredQuery> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Query(query) => Some(query),
            _ => None,
        })
    }

    pub(crate) fn find_delete(&self) -> Option<&DeleteQuery> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Delete(query) => Some(query),
            _ => None,
        })
    }

    /// First positional value.
    pub(crate) fn first_value(&self) -> Option<&Value> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Value(value) => Some(value),
            _ => None,
        })
    }

    pub(crate) fn positional(&self) -> Vec<CallArg> {
        self.args.iter().filter_map(Arg::positional).collect()
    }

    pub(crate) fn named_values(&self) -> Vec<(String, Value)> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                Arg::Named(name, value) => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Move every entity argument out, in order.
    pub(crate) fn take_entities(&mut self) -> Vec<E> {
        let mut out = Vec::new();
        for arg in std::mem::take(&mut self.args) {
            match arg {
                Arg::Entity(entity) => out.push(entity),
                Arg::Entities(entities) => out.extend(entities),
                other => self.args.push(other),
            }
        }

        out
    }
}
