//! Store-agnostic description of a conditional write.
//!
//! A write is a [`MutationList`] (what to change) plus a [`Predicate`] (what must
//! hold on the record *before* the change). Adapters either interpret both
//! directly (in-memory) or compile them to their native query language
//! (Postgres), so the transition logic never builds query strings.
//!
//! # Example
//!
//! ```
//! use prize_inventory_core::mutation::{MutationList, Predicate};
//! use prize_inventory_core::record::Record;
//!
//! let mut record = Record::new();
//! record.set("total_available", 5_i64);
//!
//! let guard = Predicate::at_least("total_available", 2);
//! let mutation = MutationList::new()
//!     .decrement("total_available", 2)
//!     .increment("total_reserved", 2);
//!
//! assert!(guard.evaluate(&record));
//! mutation.apply_to(&mut record);
//! assert_eq!(record.number("total_available"), Some(3));
//! assert_eq!(record.number("total_reserved"), Some(2));
//! ```

use crate::record::{AttributeValue, Record};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Operation applied to a single attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Overwrite the attribute.
    Set(AttributeValue),
    /// Add to the attribute, treating a missing attribute as zero.
    Increment(i64),
    /// Subtract from the attribute, treating a missing attribute as zero.
    Decrement(i64),
    /// Delete the attribute.
    Remove,
}

/// One entry of a mutation list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOp {
    /// Attribute name.
    pub field: String,
    /// Operation to apply.
    pub op: Op,
}

/// Ordered list of attribute operations applied atomically by the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationList {
    ops: SmallVec<[FieldOp; 4]>,
}

impl MutationList {
    /// Create an empty mutation list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary operation.
    #[must_use]
    pub fn push(mut self, field: impl Into<String>, op: Op) -> Self {
        self.ops.push(FieldOp {
            field: field.into(),
            op,
        });
        self
    }

    /// Overwrite `field` with `value`.
    #[must_use]
    pub fn set(self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.push(field, Op::Set(value.into()))
    }

    /// Add `amount` to `field` (missing reads as zero).
    #[must_use]
    pub fn increment(self, field: impl Into<String>, amount: i64) -> Self {
        self.push(field, Op::Increment(amount))
    }

    /// Subtract `amount` from `field` (missing reads as zero).
    #[must_use]
    pub fn decrement(self, field: impl Into<String>, amount: i64) -> Self {
        self.push(field, Op::Decrement(amount))
    }

    /// Delete `field`.
    #[must_use]
    pub fn remove(self, field: impl Into<String>) -> Self {
        self.push(field, Op::Remove)
    }

    /// Operations in application order.
    #[must_use]
    pub fn ops(&self) -> &[FieldOp] {
        &self.ops
    }

    /// Whether the list contains no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every operation to `record` in order.
    ///
    /// The caller is responsible for having checked the predicate against the
    /// same pre-image under whatever exclusion its store provides.
    pub fn apply_to(&self, record: &mut Record) {
        for FieldOp { field, op } in &self.ops {
            match op {
                Op::Set(value) => record.set(field.clone(), value.clone()),
                Op::Increment(n) => {
                    let current = record.number(field).unwrap_or(0);
                    record.set(field.clone(), current.saturating_add(*n));
                }
                Op::Decrement(n) => {
                    let current = record.number(field).unwrap_or(0);
                    record.set(field.clone(), current.saturating_sub(*n));
                }
                Op::Remove => {
                    record.remove(field);
                }
            }
        }
    }
}

/// Comparison operator used by [`Predicate::Compare`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparison {
    const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering.is_eq(),
            Self::Ne => ordering.is_ne(),
            Self::Lt => ordering.is_lt(),
            Self::Le => ordering.is_le(),
            Self::Gt => ordering.is_gt(),
            Self::Ge => ordering.is_ge(),
        }
    }

    /// SQL spelling of the operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Boolean condition evaluated against a record's pre-image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Always true.
    Always,
    /// The attribute exists.
    Exists(String),
    /// The attribute does not exist.
    NotExists(String),
    /// Compare an attribute with a constant. False when the attribute is
    /// missing or of a different type.
    Compare {
        /// Attribute name.
        field: String,
        /// Operator.
        cmp: Comparison,
        /// Right-hand side.
        value: AttributeValue,
    },
    /// All sub-predicates hold (true when empty).
    And(Vec<Predicate>),
    /// At least one sub-predicate holds (false when empty).
    Or(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

impl Predicate {
    /// `field <cmp> value`
    #[must_use]
    pub fn compare(field: impl Into<String>, cmp: Comparison, value: impl Into<AttributeValue>) -> Self {
        Self::Compare {
            field: field.into(),
            cmp,
            value: value.into(),
        }
    }

    /// `attribute_exists(field) AND field >= amount`
    #[must_use]
    pub fn at_least(field: impl Into<String>, amount: i64) -> Self {
        let field = field.into();
        Self::And(vec![
            Self::Exists(field.clone()),
            Self::compare(field, Comparison::Ge, amount),
        ])
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Always, p) | (p, Self::Always) => p,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), p) => {
                left.push(p);
                Self::And(left)
            }
            (p, Self::And(mut right)) => {
                right.insert(0, p);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }

    /// Evaluate against a record.
    #[must_use]
    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            Self::Always => true,
            Self::Exists(field) => record.contains(field),
            Self::NotExists(field) => !record.contains(field),
            Self::Compare { field, cmp, value } => record
                .get(field)
                .and_then(|current| compare_values(current, value))
                .is_some_and(|ordering| cmp.accepts(ordering)),
            Self::And(all) => all.iter().all(|p| p.evaluate(record)),
            Self::Or(any) => any.iter().any(|p| p.evaluate(record)),
            Self::Not(inner) => !inner.evaluate(record),
        }
    }
}

fn compare_values(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::Number(a), AttributeValue::Number(b)) => Some(a.cmp(b)),
        (AttributeValue::Bool(a), AttributeValue::Bool(b)) => Some(a.cmp(b)),
        (AttributeValue::Text(a), AttributeValue::Text(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
