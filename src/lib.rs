//! Compiles byte-alphabet regular expressions into minimized DFAs.
//!
//! Two independent front ends reach the same [`dfa::Dfa`] shape: the direct
//! builder ([`dfa::dfa_from_ast`]) goes straight from the parsed [`ast::Re`]
//! via leaf-position construction, while [`nfa::nfa_from_ast`] /
//! [`nfa::nfa_from_patterns`] build a Thompson NFA first and
//! [`dfa::dfa_from_nfa`] determinizes it by subset construction. The second
//! path is also how several patterns are unioned into one lexer automaton,
//! each keeping its own `terminal_id` with lowest-rule-index priority on
//! simultaneous acceptance. [`Dfa::minimize`][dfa::Dfa::minimize] and
//! [`Dfa::remove_dead_states`][dfa::Dfa::remove_dead_states] work on a
//! `Dfa` regardless of which front end produced it.
//!
//! ```
//! use refa::dfa::Dfa;
//! use refa::error::Limits;
//!
//! let dfa = Dfa::from_pattern(b"[a-z]+", 0, &Limits::default()).unwrap();
//! assert_eq!(dfa.accept(b"hello"), Some(0));
//! assert_eq!(dfa.accept(b"HELLO"), None);
//! ```

pub mod ast;
pub mod dfa;
pub mod dot;
pub mod error;
pub mod minimize;
pub mod nfa;
pub mod parser;

pub use ast::{annotate, Re};
pub use dfa::{dfa_from_ast, dfa_from_nfa, Dfa};
pub use error::{BuildError, CompileError, Limits, ParseError};
pub use nfa::{nfa_from_ast, nfa_from_patterns, Nfa};
pub use parser::parse;
