//! A packrat execution engine for parsing expression grammars.
//!
//! A grammar is a table of named rules, each an ordered list of alternatives
//! over [`Atom`](grammar::Atom)s. The engine matches ordered choices with
//! PEG commit semantics, memoizing every `(position, rule)` result, and the
//! textual grammar language is bootstrapped through the engine itself.

pub mod engine;
pub mod grammar;
pub mod parser;
pub mod syntax;

mod memo;
mod types;
