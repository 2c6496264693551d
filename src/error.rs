//! Error taxonomies and size limits for the compilation pipeline.
//!
//! Two kinds of failure are distinguished, per the crate's design: a
//! [`ParseError`] identifies a problem with the *pattern itself*, while a
//! [`BuildError`] identifies an automaton that grew past the configured
//! [`Limits`] during construction. Neither ever leaves a partially built
//! value behind for the caller to inspect.

use std::fmt;

/// A byte pattern, kept around on errors so the message can point back into it.
///
/// Patterns are arbitrary byte sequences (§1: "the alphabet is exactly the
/// 256 byte values"), so this is not `String`.
#[derive(Clone, PartialEq, Eq)]
pub struct Pattern(pub Box<[u8]>);

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&[u8]> for Pattern {
    fn from(bytes: &[u8]) -> Self {
        Pattern(bytes.into())
    }
}

/// Errors raised while parsing a pattern into an [`crate::ast::Re`].
///
/// Every variant carries the original pattern and a byte offset so the
/// caller can point a user at the exact offending position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unterminated '[' starting at byte {pos} in {pattern:?}")]
    UnterminatedBracket { pattern: Pattern, pos: usize },

    #[error("unterminated '(' starting at byte {pos} in {pattern:?}")]
    UnterminatedParen { pattern: Pattern, pos: usize },

    #[error("stray ']' at byte {pos} in {pattern:?}")]
    StrayCloseBracket { pattern: Pattern, pos: usize },

    #[error("stray ')' at byte {pos} in {pattern:?}")]
    StrayCloseParen { pattern: Pattern, pos: usize },

    #[error("'*', '+' or '?' with no preceding atom at byte {pos} in {pattern:?}")]
    EmptyQuantifier { pattern: Pattern, pos: usize },

    #[error("trailing '\\' with no escaped byte at byte {pos} in {pattern:?}")]
    IncompleteEscape { pattern: Pattern, pos: usize },

    #[error("unknown escape '\\{byte}' ({byte:#04x}) at byte {pos} in {pattern:?}", byte = *.byte as char)]
    UnknownEscape { pattern: Pattern, pos: usize, byte: u8 },

    #[error("unsupported metacharacter '{byte}' ({byte:#04x}) inside brackets at byte {pos} in {pattern:?}", byte = *.byte as char)]
    UnsupportedMetaInClass { pattern: Pattern, pos: usize, byte: u8 },

    #[error("invalid range {a}-{b} inside brackets at byte {pos} in {pattern:?}")]
    InvalidRange { pattern: Pattern, pos: usize, a: u8, b: u8 },
}

/// Errors raised while building an automaton whose state count exceeds the
/// configured [`Limits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("NFA grew to {0} states, above the configured limit")]
    TooLargeNfa(usize),

    #[error("DFA grew to {0} states, above the configured limit")]
    TooLargeDfa(usize),
}

/// Either half of the pipeline failing: a malformed pattern, or an
/// automaton that outgrew its [`Limits`] during construction. Convenience
/// wrapper for callers that just want `pattern -> Dfa` in one call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Size bounds enforced during subset construction (§4.5) and minimization
/// (§4.7). Exceeding either fails synchronously with a [`BuildError`] rather
/// than continuing to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest NFA state count `dfa_from_nfa` will subset-construct from.
    pub max_nfa_states: usize,
    /// Largest DFA state count the minimizer will partition-refine.
    pub max_dfa_states: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_nfa_states: 1 << 16,
            max_dfa_states: 1 << 16,
        }
    }
}
