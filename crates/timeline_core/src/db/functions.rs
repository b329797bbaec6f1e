//! Application-defined SQL functions.
//!
//! # Invariants
//! - `overlaps(a_start, a_end, b_start, b_end)` delegates to
//!   `model::interval::overlaps`; SQL never spells out the comparison itself.
//! - Registration is idempotent; re-registering replaces the previous binding.

use crate::model::interval::overlaps;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// SQL name of the interval predicate.
pub const OVERLAPS_FN: &str = "overlaps";

/// Registers every SQL function the schema and queries depend on.
pub fn register_sql_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        OVERLAPS_FN,
        4,
        FunctionFlags::SQLITE_UTF8
            | FunctionFlags::SQLITE_DETERMINISTIC
            | FunctionFlags::SQLITE_INNOCUOUS,
        |ctx| {
            let a_start: i64 = ctx.get(0)?;
            let a_end: i64 = ctx.get(1)?;
            let b_start: i64 = ctx.get(2)?;
            let b_end: i64 = ctx.get(3)?;
            Ok(overlaps(a_start, a_end, b_start, b_end))
        },
    )
}
