//! Compiles mutation lists, predicates and key conditions to SQL over the
//! `attributes` JSONB column.
//!
//! Every caller-supplied value, attribute names included, travels as a bound
//! parameter. Only the attribute-name constants of the secondary indexes are
//! inlined, so the planner can match the partial indexes of the migration.

use prize_inventory_core::mutation::{Comparison, MutationList, Op, Predicate};
use prize_inventory_core::prize::attr;
use prize_inventory_core::record::AttributeValue;
use prize_inventory_core::store::{KeyCondition, StoreError};
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

/// Attribute document of the row being read or written.
pub(crate) const ATTRIBUTES: &str = "prizes.attributes";

/// A value bound to a positional parameter.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Bind {
    Text(String),
    BigInt(i64),
    Bool(bool),
    Json(serde_json::Value),
}

/// Accumulates bound values and hands out their placeholders.
#[derive(Debug, Default)]
pub(crate) struct SqlBuilder {
    binds: Vec<Bind>,
}

impl SqlBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bind `value` and return its placeholder, e.g. `$3`.
    pub(crate) fn bind(&mut self, value: Bind) -> String {
        self.binds.push(value);
        format!("${}", self.binds.len())
    }

    fn bind_text(&mut self, value: &str) -> String {
        format!("{}::text", self.bind(Bind::Text(value.to_string())))
    }

    pub(crate) fn into_binds(self) -> Vec<Bind> {
        self.binds
    }

    /// Boolean SQL expression equivalent to `predicate` evaluated on the pre-image.
    pub(crate) fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Always => "TRUE".to_string(),
            Predicate::Exists(field) => format!("({ATTRIBUTES} ? {})", self.bind_text(field)),
            Predicate::NotExists(field) => {
                format!("(NOT ({ATTRIBUTES} ? {}))", self.bind_text(field))
            }
            Predicate::Compare { field, cmp, value } => {
                let field = self.bind_text(field);
                self.comparison(&field, *cmp, value)
            }
            Predicate::And(all) if all.is_empty() => "TRUE".to_string(),
            Predicate::And(all) => self.join(all, " AND "),
            Predicate::Or(any) if any.is_empty() => "FALSE".to_string(),
            Predicate::Or(any) => self.join(any, " OR "),
            Predicate::Not(inner) => format!("(NOT {})", self.predicate(inner)),
        }
    }

    fn join(&mut self, predicates: &[Predicate], separator: &str) -> String {
        let parts: Vec<String> = predicates.iter().map(|p| self.predicate(p)).collect();
        format!("({})", parts.join(separator))
    }

    /// A comparison with a missing or differently typed attribute is false.
    fn comparison(&mut self, field: &str, cmp: Comparison, value: &AttributeValue) -> String {
        let op = cmp.as_sql();
        let (json_type, lhs, rhs) = match value {
            AttributeValue::Number(n) => (
                "number",
                format!("({ATTRIBUTES} ->> {field})::bigint"),
                format!("{}::bigint", self.bind(Bind::BigInt(*n))),
            ),
            AttributeValue::Bool(b) => (
                "boolean",
                format!("({ATTRIBUTES} ->> {field})::boolean"),
                format!("{}::boolean", self.bind(Bind::Bool(*b))),
            ),
            AttributeValue::Text(s) => (
                "string",
                format!("({ATTRIBUTES} ->> {field}) COLLATE \"C\""),
                self.bind_text(s),
            ),
            AttributeValue::TextList(_) => return "FALSE".to_string(),
        };
        format!(
            "(CASE WHEN jsonb_typeof({ATTRIBUTES} -> {field}) = '{json_type}' THEN {lhs} {op} {rhs} ELSE FALSE END)"
        )
    }

    /// JSONB expression producing the post-image.
    ///
    /// Increments and decrements read the pre-image, so a list must not touch
    /// the same counter twice. None of the engine's builders do.
    pub(crate) fn mutation(&mut self, mutation: &MutationList) -> Result<String, StoreError> {
        let mut expr = ATTRIBUTES.to_string();
        for field_op in mutation.ops() {
            let field = self.bind_text(&field_op.field);
            expr = match &field_op.op {
                Op::Set(value) => {
                    let json = serde_json::to_value(value)
                        .map_err(|e| StoreError::Corrupt(format!("{}: {e}", field_op.field)))?;
                    let value = self.bind(Bind::Json(json));
                    format!("({expr} || jsonb_build_object({field}, {value}::jsonb))")
                }
                Op::Increment(n) => self.counter_op(&expr, &field, "+", *n),
                Op::Decrement(n) => self.counter_op(&expr, &field, "-", *n),
                Op::Remove => format!("({expr} - {field})"),
            };
        }
        Ok(expr)
    }

    fn counter_op(&mut self, expr: &str, field: &str, sign: &str, amount: i64) -> String {
        let amount = self.bind(Bind::BigInt(amount));
        format!(
            "({expr} || jsonb_build_object({field}, COALESCE(({ATTRIBUTES} ->> {field})::bigint, 0) {sign} {amount}::bigint))"
        )
    }

    /// Row selection for a key condition.
    pub(crate) fn key_condition(&mut self, condition: &KeyCondition) -> String {
        match condition {
            KeyCondition::Configuration(id) => {
                format!("prizes.configuration_id = {}", self.bind_text(id.as_str()))
            }
            KeyCondition::PrizeId(id) => format!("prizes.prize_id = {}", self.bind_text(id.as_str())),
            KeyCondition::AutoUploadVouchers => {
                format!("{ATTRIBUTES} -> '{}' = 'true'::jsonb", attr::AUTO_UPLOAD_VOUCHERS)
            }
            KeyCondition::EndDateBefore(t) => {
                let end = format!("'{}'", attr::END_DATE);
                let before = self.comparison(&end, Comparison::Lt, &AttributeValue::Number(*t));
                format!("{ATTRIBUTES} -> '{}' = 'true'::jsonb AND {before}", attr::HAS_END_DATE)
            }
            KeyCondition::EndDateFlagged => {
                format!("{ATTRIBUTES} -> '{}' = 'true'::jsonb", attr::HAS_END_DATE)
            }
        }
    }
}

/// Attach `binds` to `query` in placeholder order.
pub(crate) fn bind_all(
    mut query: Query<'_, Postgres, PgArguments>,
    binds: Vec<Bind>,
) -> Query<'_, Postgres, PgArguments> {
    for bind in binds {
        query = match bind {
            Bind::Text(s) => query.bind(s),
            Bind::BigInt(n) => query.bind(n),
            Bind::Bool(b) => query.bind(b),
            Bind::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}
