//! Derived-method name grammar.
//!
//! ```text
//! method    := prefix predicate? ("OrderBy" order)*
//! predicate := term (("And" | "Or") term)*
//! term      := "Not"? Identifier suffix?
//! order     := Identifier ("Asc" | "Desc")?
//! ```
//!
//! Identifiers are PascalCase; `_` separates nested path segments.

use crate::db::query::{CompareOp, Direction, QueryDerivationError};
use convert_case::{Case, Casing};

const ORDER_BY: &str = "OrderBy";

// Longest first: `GreaterThanEqual` must win over `GreaterThan`, `NotIn`
// over `In`, `NotEquals` over `Not`.
const SUFFIXES: &[(&str, CompareOp, bool)] = &[
    ("Between", CompareOp::Between, false),
    ("GreaterThanEqual", CompareOp::Gte, false),
    ("GreaterThan", CompareOp::Gt, false),
    ("LessThanEqual", CompareOp::Lte, false),
    ("LessThan", CompareOp::Lt, false),
    ("Like", CompareOp::Like, false),
    ("NotIn", CompareOp::In, true),
    ("In", CompareOp::In, false),
    ("NotEquals", CompareOp::Ne, false),
    ("Not", CompareOp::Eq, true),
];

///
/// Connective
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Connective {
    And,
    Or,
}

///
/// Term
///
/// One named predicate. `path` is the declared field path (`address.city`).
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Term {
    pub path: String,
    pub op: CompareOp,
    pub negated: bool,
}

///
/// OrderSpec
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderSpec {
    pub path: String,
    pub direction: Direction,
}

///
/// ConditionSpec
///
/// Parsed method name. `connectives[i]` joins the running condition with
/// `terms[i + 1]`; folding is strictly left to right.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConditionSpec {
    pub method: String,
    pub terms: Vec<Term>,
    pub connectives: Vec<Connective>,
    pub orderings: Vec<OrderSpec>,
}

impl ConditionSpec {
    /// Positional arguments the predicate consumes.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.terms.iter().map(|term| term.op.slots().width()).sum()
    }
}

/// Parse `method` after stripping `prefix` (`findBy`, `deleteBy`, ...).
///
/// A method without `prefix` is parsed whole.
pub fn parse(method: &str, prefix: &str) -> Result<ConditionSpec, QueryDerivationError> {
    let body = method.strip_prefix(prefix).unwrap_or(method);
    if body.is_empty() {
        return Err(QueryDerivationError::EmptyPredicate {
            method: method.to_string(),
        });
    }

    let (predicate, ordering) = match body.find(ORDER_BY) {
        Some(pos) => (&body[..pos], Some(&body[pos + ORDER_BY.len()..])),
        None => (body, None),
    };

    let (terms, connectives) = if predicate.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        parse_predicate(predicate)?
    };

    let orderings = match ordering {
        Some(segment) => segment
            .split(ORDER_BY)
            .map(parse_order)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    if terms.is_empty() && orderings.is_empty() {
        return Err(QueryDerivationError::EmptyPredicate {
            method: method.to_string(),
        });
    }

    Ok(ConditionSpec {
        method: method.to_string(),
        terms,
        connectives,
        orderings,
    })
}

// ----------------------------------------------------------------------
// predicate
// ----------------------------------------------------------------------

fn parse_predicate(
    predicate: &str,
) -> Result<(Vec<Term>, Vec<Connective>), QueryDerivationError> {
    let mut terms = Vec::new();
    let mut connectives = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < predicate.len() {
        let rest = &predicate[i..];
        let connective = if i > start && at_token(rest, "And") {
            Some((Connective::And, 3))
        } else if i > start && at_token(rest, "Or") {
            Some((Connective::Or, 2))
        } else {
            None
        };

        match connective {
            Some((connective, len)) => {
                terms.push(parse_term(&predicate[start..i])?);
                connectives.push(connective);
                i += len;
                start = i;
            }
            None => i += rest.chars().next().map_or(1, char::len_utf8),
        }
    }
    terms.push(parse_term(&predicate[start..])?);

    Ok((terms, connectives))
}

// `token` followed by the start of the next PascalCase word.
fn at_token(rest: &str, token: &str) -> bool {
    rest.strip_prefix(token)
        .and_then(|after| after.chars().next())
        .is_some_and(char::is_uppercase)
}

fn parse_term(term: &str) -> Result<Term, QueryDerivationError> {
    let (negated_prefix, body) = match term.strip_prefix("Not") {
        Some(rest) if rest.chars().next().is_some_and(char::is_uppercase) => (true, rest),
        _ => (false, term),
    };

    let (field, op, negated_suffix) = SUFFIXES
        .iter()
        .find_map(|(suffix, op, negated)| {
            body.strip_suffix(suffix)
                .map(|field| (field, *op, *negated))
        })
        .unwrap_or((body, CompareOp::Eq, false));

    if field.is_empty() {
        return Err(QueryDerivationError::UnknownOperatorSuffix {
            term: term.to_string(),
        });
    }

    Ok(Term {
        path: field_path(field),
        op,
        negated: negated_prefix ^ negated_suffix,
    })
}

// ----------------------------------------------------------------------
// ordering
// ----------------------------------------------------------------------

fn parse_order(segment: &str) -> Result<OrderSpec, QueryDerivationError> {
    let (field, direction) = if let Some(field) = segment.strip_suffix("Desc") {
        (field, Direction::Desc)
    } else if let Some(field) = segment.strip_suffix("Asc") {
        (field, Direction::Asc)
    } else {
        (segment, Direction::Asc)
    };

    if field.is_empty() {
        return Err(QueryDerivationError::UnknownOperatorSuffix {
            term: segment.to_string(),
        });
    }

    Ok(OrderSpec {
        path: field_path(field),
        direction,
    })
}

/// `FirstName` → `first_name`; `Address_City` → `address.city`.
#[must_use]
pub fn field_path(identifier: &str) -> String {
    identifier
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_case(Case::Snake))
        .collect::<Vec<_>>()
        .join(".")
}
