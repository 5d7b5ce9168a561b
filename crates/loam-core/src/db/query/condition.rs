use crate::{db::query::ParamBindings, value::Value};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    /// Two operand slots, inclusive on both ends.
    Between,
    /// Operand is a sequence.
    In,
}

impl CompareOp {
    /// Number of positional arguments one comparison consumes.
    #[must_use]
    pub const fn slots(self) -> SlotArity {
        match self {
            Self::Between => SlotArity::Two,
            Self::In => SlotArity::Many,
            _ => SlotArity::One,
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "like",
            Self::Between => "between",
            Self::In => "in",
        }
    }
}

///
/// SlotArity
///
/// How many positional arguments a placeholder consumes.
/// `Many` consumes one argument holding a sequence.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SlotArity {
    One,
    Two,
    Many,
}

impl SlotArity {
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::One | Self::Many => 1,
            Self::Two => 2,
        }
    }
}

///
/// Operand
///
/// Right-hand side of a comparison: a named placeholder awaiting binding,
/// or a concrete value. `Between` operands are two-element lists.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Operand {
    Param(String),
    Value(Value),
}

impl Operand {
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Param(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(name) => write!(f, "@{name}"),
            Self::Value(value) => write!(f, "{value}"),
        }
    }
}

///
/// Comparison
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Comparison {
    pub field: String,
    pub op: CompareOp,
    pub negated: bool,
    pub operand: Operand,
}

impl Comparison {
    #[must_use]
    pub fn new(field: impl Into<String>, op: CompareOp, operand: Operand) -> Self {
        Self {
            field: field.into(),
            op,
            negated: false,
            operand,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "not ")?;
        }

        match (&self.op, &self.operand) {
            (CompareOp::Between, Operand::Value(Value::List(bounds))) if bounds.len() == 2 => {
                write!(f, "{} between {} and {}", self.field, bounds[0], bounds[1])
            }
            (op, operand) => write!(f, "{} {} {operand}", self.field, op.symbol()),
        }
    }
}

///
/// ConditionNode
///
/// Condition tree. Connectives fold strictly left to right, so
/// `a AND b OR c` is `Or(And(a, b), c)`.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum ConditionNode {
    Compare(Comparison),
    And(Box<Self>, Box<Self>),
    Or(Box<Self>, Box<Self>),
}

impl ConditionNode {
    #[must_use]
    pub fn compare(field: impl Into<String>, op: CompareOp, operand: Operand) -> Self {
        Self::Compare(Comparison::new(field, op, operand))
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Logical negation; pushed down to comparisons (De Morgan).
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Compare(mut cmp) => {
                cmp.negated = !cmp.negated;
                Self::Compare(cmp)
            }
            Self::And(left, right) => left.negate().or(right.negate()),
            Self::Or(left, right) => left.negate().and(right.negate()),
        }
    }

    /// Comparisons in left-to-right order.
    #[must_use]
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            Self::Compare(cmp) => out.push(cmp),
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect(out);
                right.collect(out);
            }
        }
    }

    /// Placeholder names still awaiting a value.
    #[must_use]
    pub fn params(&self) -> Vec<&str> {
        self.comparisons()
            .into_iter()
            .filter_map(|cmp| match &cmp.operand {
                Operand::Param(name) => Some(name.as_str()),
                Operand::Value(_) => None,
            })
            .collect()
    }

    /// Replace bound placeholders with their values; unbound ones stay.
    #[must_use]
    pub fn bind(self, bindings: &ParamBindings) -> Self {
        match self {
            Self::Compare(mut cmp) => {
                if let Operand::Param(name) = &cmp.operand
                    && let Some(value) = bindings.get(name)
                {
                    cmp.operand = Operand::Value(value.clone());
                }
                Self::Compare(cmp)
            }
            Self::And(left, right) => left.bind(bindings).and(right.bind(bindings)),
            Self::Or(left, right) => left.bind(bindings).or(right.bind(bindings)),
        }
    }

    /// Rewrite every comparison's field name.
    #[must_use]
    pub fn map_fields(self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Self::Compare(mut cmp) => {
                cmp.field = f(&cmp.field);
                Self::Compare(cmp)
            }
            Self::And(left, right) => left.map_fields(f).and(right.map_fields(f)),
            Self::Or(left, right) => left.map_fields(f).or(right.map_fields(f)),
        }
    }
}

impl From<Comparison> for ConditionNode {
    fn from(cmp: Comparison) -> Self {
        Self::Compare(cmp)
    }
}

impl fmt::Display for ConditionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare(cmp) => write!(f, "{cmp}"),
            Self::And(left, right) => write!(f, "({left} and {right})"),
            Self::Or(left, right) => write!(f, "({left} or {right})"),
        }
    }
}
