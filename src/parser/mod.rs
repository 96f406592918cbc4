//! Script payload parsing and record extraction
//!
//! Upstream pages embed their data as array literals assigned to script
//! variables. [`literal`] parses that literal subset without evaluating
//! anything; [`areas`] and [`seasons`] map the parsed values onto typed records.

pub mod areas;
pub mod literal;
pub mod seasons;

pub use literal::{parse_literal, Literal};
