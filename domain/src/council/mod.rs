//! Council logic: blind labels, ranking parsing and aggregation
//!
//! These are pure functions over juror text — no I/O, no session management,
//! just pattern matching and arithmetic.

pub mod aggregate;
pub mod catalog;
pub mod cost;
pub mod label;
pub mod ranking;
pub mod stage;
