//! Property-based testing utilities using proptest.
//!
//! Strategies for the inputs the engine accepts, so property tests can drive
//! arbitrary sequences of legal operations against a store.

use prize_inventory_core::counter::{Counter, Edge};
use proptest::prelude::*;
use proptest::sample::select;
use std::collections::BTreeMap;

/// One engine call in a generated sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Top up by the amount.
    TopUp(i64),
    /// Move the amount along the edge.
    Transition(Edge, i64),
    /// Expire from the listed sources.
    Expire(BTreeMap<Counter, i64>),
}

/// Any legal edge.
pub fn arb_edge() -> impl Strategy<Value = Edge> {
    select(Edge::ALL.to_vec())
}

/// Positive amounts small enough to exhaust balances often.
pub fn arb_amount() -> impl Strategy<Value = i64> {
    1_i64..=20
}

/// Non-empty expiration map over the expirable counters.
pub fn arb_expiration() -> impl Strategy<Value = BTreeMap<Counter, i64>> {
    prop::collection::btree_map(
        select(vec![Counter::Available, Counter::Reserved, Counter::Claimed]),
        arb_amount(),
        1..=3,
    )
}

/// A single step, weighted towards transitions.
pub fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => arb_amount().prop_map(Step::TopUp),
        6 => (arb_edge(), arb_amount()).prop_map(|(edge, amount)| Step::Transition(edge, amount)),
        2 => arb_expiration().prop_map(Step::Expire),
    ]
}

/// A sequence of up to `max_len` steps.
pub fn arb_steps(max_len: usize) -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(arb_step(), 1..=max_len)
}
