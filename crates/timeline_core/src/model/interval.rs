//! Half-open interval predicate.
//!
//! # Invariants
//! - This is the only definition of "two intervals conflict". SQL paths reach
//!   it through the `overlaps` scalar function registered in `db::functions`.
//! - Intervals touching at a boundary do not overlap.

/// Returns whether `[a_start, a_end)` and `[b_start, b_end)` intersect.
pub fn overlaps(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    a_start < b_end && a_end > b_start
}
