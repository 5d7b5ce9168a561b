//! Condition evaluation, ordering, and windowing over in-memory records.

use crate::{
    db::{
        query::{CompareOp, Comparison, ConditionNode, Direction, Operand, Sort},
        record::Record,
        template::TemplateError,
    },
    value::{Value, canonical_cmp, strict_ordering},
};
use std::cmp::Ordering;

/// Does `record` satisfy `condition`? Unbound placeholders are an error.
pub(crate) fn matches(record: &Record, condition: &ConditionNode) -> Result<bool, TemplateError> {
    match condition {
        ConditionNode::Compare(cmp) => compare(record, cmp),
        ConditionNode::And(left, right) => Ok(matches(record, left)? && matches(record, right)?),
        ConditionNode::Or(left, right) => Ok(matches(record, left)? || matches(record, right)?),
    }
}

fn compare(record: &Record, cmp: &Comparison) -> Result<bool, TemplateError> {
    let operand = match &cmp.operand {
        Operand::Value(value) => value,
        Operand::Param(name) => return Err(TemplateError::UnboundParameter(name.clone())),
    };
    let actual = record.get_path(&cmp.field).unwrap_or(&Value::Null);

    let hit = match cmp.op {
        CompareOp::Eq => equals(actual, operand),
        CompareOp::Ne => !equals(actual, operand),
        CompareOp::Gt => ordered(actual, operand, Ordering::is_gt),
        CompareOp::Gte => ordered(actual, operand, Ordering::is_ge),
        CompareOp::Lt => ordered(actual, operand, Ordering::is_lt),
        CompareOp::Lte => ordered(actual, operand, Ordering::is_le),
        CompareOp::Like => match (actual, operand) {
            (Value::Text(text), Value::Text(pattern)) => like(text, pattern),
            _ => false,
        },
        CompareOp::Between => match operand.as_list() {
            Some([low, high]) => {
                ordered(actual, low, Ordering::is_ge) && ordered(actual, high, Ordering::is_le)
            }
            _ => false,
        },
        CompareOp::In => match operand {
            Value::List(items) => items.iter().any(|item| equals(actual, item)),
            single => equals(actual, single),
        },
    };

    Ok(hit != cmp.negated)
}

// A list field equals a scalar it contains.
fn equals(actual: &Value, expected: &Value) -> bool {
    if actual.is_null() || expected.is_null() {
        return actual.is_null() && expected.is_null();
    }

    match (actual, expected) {
        (Value::List(items), scalar) if !matches!(scalar, Value::List(_)) => {
            items.iter().any(|item| equals(item, scalar))
        }
        _ => strict_ordering(actual, expected).map_or(actual == expected, Ordering::is_eq),
    }
}

fn ordered(actual: &Value, bound: &Value, accept: fn(Ordering) -> bool) -> bool {
    strict_ordering(actual, bound).is_some_and(accept)
}

/// SQL-style pattern: `%` matches any run, `_` exactly one character.
pub(crate) fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // reach[j]: pattern[..i] matches text[..j]
    let mut reach = vec![false; text.len() + 1];
    reach[0] = true;

    for &p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen |= reach[j];
                    next[j] = seen;
                }
            }
            _ => {
                for j in 0..text.len() {
                    next[j + 1] = reach[j] && (p == '_' || p == text[j]);
                }
            }
        }
        reach = next;
    }

    reach[text.len()]
}

/// Stable sort by each key in turn; missing fields sort as null.
pub(crate) fn sort(records: &mut [Record], sorts: &[Sort]) {
    if sorts.is_empty() {
        return;
    }

    records.sort_by(|a, b| {
        sorts
            .iter()
            .map(|sort| {
                let left = a.get_path(&sort.field).unwrap_or(&Value::Null);
                let right = b.get_path(&sort.field).unwrap_or(&Value::Null);
                let ord = canonical_cmp(left, right);

                match sort.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// Apply skip / limit; a zero limit is unbounded.
pub(crate) fn window(records: Vec<Record>, skip: u64, limit: u64) -> Vec<Record> {
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let limit = match limit {
        0 => usize::MAX,
        n => usize::try_from(n).unwrap_or(usize::MAX),
    };

    records.into_iter().skip(skip).take(limit).collect()
}

///
/// TESTS
///
