//! # Aggregation Engine
//!
//! Recursive evaluation of a predicate tree into the matching row set.
//!
//! `UNARY` leaves are resolved by the caller-supplied `fetch` function:
//! the registry wires it to either lazily-read-locked index cells (the
//! aggregate path) or to the write guards it already holds (the delete
//! path); the algebra here is identical for both.
//!
//! `AND`/`OR` combine branch results by intersection/union. A `None` branch
//! means "no constraint" and is the identity of both operators:
//! `AND(None, x) = OR(None, x) = x`, `AND(None, None) = None`.
//!
//! Intersection builds into the evaluation's scratch set (cleared before
//! every reuse, owned by one evaluation at a time), then swaps storage with
//! a drained operand, so steady-state evaluation allocates nothing.

use super::predicate::{Predicate, UnaryPredicate};
use crate::rows::RowSet;
use eyre::Result;

/// Evaluates a predicate tree, resolving leaves through `fetch`.
pub fn evaluate<F>(
    pred: &Predicate<'_>,
    fetch: &mut F,
    scratch: &mut RowSet,
) -> Result<Option<RowSet>>
where
    F: FnMut(&UnaryPredicate) -> Result<RowSet>,
{
    match pred {
        Predicate::Unary(unary) => Ok(Some(fetch(unary)?)),
        Predicate::And(left, right) => {
            let left = evaluate(left, fetch, scratch)?;
            let right = evaluate(right, fetch, scratch)?;
            Ok(combine_and(left, right, scratch))
        }
        Predicate::Or(left, right) => {
            let left = evaluate(left, fetch, scratch)?;
            let right = evaluate(right, fetch, scratch)?;
            Ok(combine_or(left, right))
        }
    }
}

/// Set intersection with `None` as "no constraint".
pub fn combine_and(
    left: Option<RowSet>,
    right: Option<RowSet>,
    scratch: &mut RowSet,
) -> Option<RowSet> {
    match (left, right) {
        (None, other) | (other, None) => other,
        (Some(mut a), Some(mut b)) => {
            if a.len() > b.len() {
                std::mem::swap(&mut a, &mut b);
            }
            scratch.clear();
            scratch.extend(a.drain().filter(|row| b.contains(row)));
            // hand the result out, keep the drained storage as scratch
            std::mem::swap(scratch, &mut a);
            Some(a)
        }
    }
}

/// Set union with `None` as "no constraint".
pub fn combine_or(left: Option<RowSet>, right: Option<RowSet>) -> Option<RowSet> {
    match (left, right) {
        (None, other) | (other, None) => other,
        (Some(mut a), Some(mut b)) => {
            if a.len() < b.len() {
                std::mem::swap(&mut a, &mut b);
            }
            a.extend(b.drain());
            Some(a)
        }
    }
}
