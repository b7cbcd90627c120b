//! Line protocol handling.
//!
//! One command per line on stdin, replies on stdout. Replies start with `ok`
//! or `error`; informational lines (awards, lapses) come before the final
//! `ok` of the command that produced them.

pub mod parser;

pub use parser::{parse_command, Command, ReleaseKind};
