//! Recursive-descent parser for the byte-regex grammar (§4.1).
//!
//! Three routines, matching the spec one-to-one: [`parse`] splits on
//! top-level `|`, `parse_concat` (the spec's `parse_without_pipe`) walks a
//! stack of atoms applying postfix operators, and `parse_brackets` builds a
//! character class. Top-level `|`/`(`/`[` matching is done by a single
//! linear scan that counts bracket/paren depth and skips escaped bytes —
//! the `parsergen` C++ this was distilled from instead does a naive
//! delimiter split with no depth awareness, which mis-parses any pattern
//! with a parenthesized alternation (`(a|b)c`); the depth-aware scan below
//! is the pinned, correct behavior.

use crate::ast::Re;
use crate::error::ParseError;

/// Parses a byte pattern into a regex AST (§4.1, top `parse` entry point).
pub fn parse(pattern: &[u8]) -> Result<Re, ParseError> {
    parse_at(pattern, 0, pattern)
}

fn parse_at(s: &[u8], base: usize, whole: &[u8]) -> Result<Re, ParseError> {
    let alts = top_level_splits(s, base, whole, b'|')?;
    if alts.len() == 1 {
        let (lo, hi) = alts[0];
        parse_concat(&s[lo..hi], base + lo, whole)
    } else {
        let mut inners = Vec::with_capacity(alts.len());
        for (lo, hi) in alts {
            inners.push(parse_concat(&s[lo..hi], base + lo, whole)?);
        }
        Ok(Re::disjunction(inners))
    }
}

/// `parse_without_pipe`: scans left to right maintaining a stack of atoms.
fn parse_concat(s: &[u8], base: usize, whole: &[u8]) -> Result<Re, ParseError> {
    let mut stack: Vec<Re> = Vec::new();
    let mut i = 0usize;

    while i < s.len() {
        match s[i] {
            b'\\' => {
                let (atom, consumed) = parse_escape_atom(s, i, base, whole)?;
                stack.push(atom);
                i += consumed;
            }
            b'*' => {
                let inner = pop_atom(&mut stack, base + i, whole)?;
                stack.push(Re::kleene(inner));
                i += 1;
            }
            b'+' => {
                let inner = pop_atom(&mut stack, base + i, whole)?;
                let repeated = inner.clone();
                stack.push(Re::concat(vec![inner, Re::kleene(repeated)]));
                i += 1;
            }
            b'?' => {
                let inner = pop_atom(&mut stack, base + i, whole)?;
                stack.push(Re::disjunction(vec![inner, Re::eps()]));
                i += 1;
            }
            b'.' => {
                stack.push(Re::disjunction((0u8..=255).map(Re::char).collect()));
                i += 1;
            }
            b'[' => {
                let close = find_matching_bracket(s, i)
                    .ok_or(ParseError::UnterminatedBracket { pattern: whole.into(), pos: base + i })?;
                let inner = parse_brackets(&s[i + 1..close], base + i + 1, whole)?;
                stack.push(inner);
                i = close + 1;
            }
            b']' => {
                return Err(ParseError::StrayCloseBracket { pattern: whole.into(), pos: base + i });
            }
            b'(' => {
                let close = find_matching_paren(s, i)
                    .ok_or(ParseError::UnterminatedParen { pattern: whole.into(), pos: base + i })?;
                let inner = parse_at(&s[i + 1..close], base + i + 1, whole)?;
                stack.push(inner);
                i = close + 1;
            }
            b')' => {
                return Err(ParseError::StrayCloseParen { pattern: whole.into(), pos: base + i });
            }
            b => {
                stack.push(Re::char(b));
                i += 1;
            }
        }
    }

    Ok(Re::concat(stack))
}

fn pop_atom(stack: &mut Vec<Re>, pos: usize, whole: &[u8]) -> Result<Re, ParseError> {
    stack
        .pop()
        .ok_or(ParseError::EmptyQuantifier { pattern: whole.into(), pos })
}

/// Parses `\c` (or a multi-byte escape like `\w`) starting at `s[at]` into
/// an atom, returning it along with the number of bytes consumed from `s`.
fn parse_escape_atom(s: &[u8], at: usize, base: usize, whole: &[u8]) -> Result<(Re, usize), ParseError> {
    if at + 1 >= s.len() {
        return Err(ParseError::IncompleteEscape { pattern: whole.into(), pos: base + at });
    }
    let bytes = escape_bytes(s[at + 1], base + at, whole)?;
    let atom = if bytes.len() == 1 {
        Re::char(bytes[0])
    } else {
        Re::disjunction(bytes.into_iter().map(Re::char).collect())
    };
    Ok((atom, 2))
}

/// The escape table from §4.1.
fn escape_bytes(c: u8, escape_pos: usize, whole: &[u8]) -> Result<Vec<u8>, ParseError> {
    Ok(match c {
        b'\\' | b'(' | b')' | b'[' | b']' | b'.' | b'|' | b'*' | b'+' | b'?' | b'{' | b'}' | b'^' | b'$' => {
            vec![c]
        }
        b'n' => vec![b'\n'],
        b't' => vec![b'\t'],
        b's' => vec![b'\n', b'\t', b'\r', b' '],
        b'w' => {
            let mut v: Vec<u8> = (b'A'..=b'Z').chain(b'a'..=b'z').chain(b'0'..=b'9').collect();
            v.push(b'_');
            v
        }
        b'd' => (b'0'..=b'9').collect(),
        other => {
            return Err(ParseError::UnknownEscape { pattern: whole.into(), pos: escape_pos, byte: other });
        }
    })
}

const REJECTED_IN_CLASS: &[u8] = b"()[]|{}^$";

/// `parse_brackets`: builds the byte set named by a class's interior (the
/// bytes strictly between `[` and `]`), honoring leading `^` negation and
/// `a-b` ranges, and returns it as a `Disjunction` of `Char` nodes.
fn parse_brackets(s: &[u8], base: usize, whole: &[u8]) -> Result<Re, ParseError> {
    let mut present = [false; 256];
    let negate = s.first() == Some(&b'^');
    if negate {
        present = [true; 256];
    }
    let mut mark = |present: &mut [bool; 256], b: u8| {
        present[b as usize] = !negate;
    };

    let mut i = if negate { 1 } else { 0 };
    while i < s.len() {
        if i + 2 < s.len()
            && s[i].is_ascii_alphanumeric()
            && s[i + 1] == b'-'
            && s[i + 2].is_ascii_alphanumeric()
        {
            let (a, b) = (s[i], s[i + 2]);
            if a > b {
                return Err(ParseError::InvalidRange { pattern: whole.into(), pos: base + i, a, b });
            }
            for c in a..=b {
                mark(&mut present, c);
            }
            i += 3;
            continue;
        }

        match s[i] {
            b'\\' => {
                if i + 1 >= s.len() {
                    return Err(ParseError::IncompleteEscape { pattern: whole.into(), pos: base + i });
                }
                for b in escape_bytes(s[i + 1], base + i, whole)? {
                    mark(&mut present, b);
                }
                i += 2;
            }
            b'-' => {
                mark(&mut present, b'-');
                i += 1;
            }
            b if REJECTED_IN_CLASS.contains(&b) => {
                return Err(ParseError::UnsupportedMetaInClass { pattern: whole.into(), pos: base + i, byte: b });
            }
            b => {
                mark(&mut present, b);
                i += 1;
            }
        }
    }

    Ok(Re::disjunction(
        (0u8..=255).filter(|&b| present[b as usize]).map(Re::char).collect(),
    ))
}

/// Finds the index of the `]` matching `[` at `open`, skipping escaped
/// bytes. Brackets do not nest.
fn find_matching_bracket(s: &[u8], open: usize) -> Option<usize> {
    let mut k = open + 1;
    while k < s.len() {
        match s[k] {
            b'\\' => k += 2,
            b']' => return Some(k),
            _ => k += 1,
        }
    }
    None
}

/// Finds the index of the `)` matching `(` at `open`, skipping escaped
/// bytes and entire `[...]` classes (whose own `(`/`)` are literal, not
/// nesting).
fn find_matching_paren(s: &[u8], open: usize) -> Option<usize> {
    let mut k = open + 1;
    let mut depth = 1usize;
    while k < s.len() {
        match s[k] {
            b'\\' => k += 2,
            b'[' => match find_matching_bracket(s, k) {
                Some(close) => k = close + 1,
                None => return None,
            },
            b'(' => {
                depth += 1;
                k += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(k);
                }
                k += 1;
            }
            _ => k += 1,
        }
    }
    None
}

/// Splits `s` on occurrences of `delim` that appear outside any `[...]` or
/// `(...)` nesting, returning `(start, end)` ranges relative to `s`.
fn top_level_splits(
    s: &[u8],
    base: usize,
    whole: &[u8],
    delim: u8,
) -> Result<Vec<(usize, usize)>, ParseError> {
    let mut ranges = Vec::new();
    let mut start = 0usize;
    let mut k = 0usize;
    while k < s.len() {
        match s[k] {
            b'\\' => k += 2,
            b'[' => {
                let close = find_matching_bracket(s, k)
                    .ok_or(ParseError::UnterminatedBracket { pattern: whole.into(), pos: base + k })?;
                k = close + 1;
            }
            b'(' => {
                let close = find_matching_paren(s, k)
                    .ok_or(ParseError::UnterminatedParen { pattern: whole.into(), pos: base + k })?;
                k = close + 1;
            }
            b if b == delim => {
                ranges.push((start, k));
                k += 1;
                start = k;
            }
            _ => k += 1,
        }
    }
    ranges.push((start, s.len()));
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{annotate, ReKind};
    use crate::dfa::Dfa;

    fn matches(pattern: &[u8], input: &[u8]) -> bool {
        Dfa::from_pattern(pattern, 0, &crate::error::Limits::default()).unwrap().accept(input).is_some()
    }

    #[test]
    fn single_char() {
        assert!(matches(b"a", b"a"));
        assert!(!matches(b"a", b"b"));
        assert!(!matches(b"a", b""));
        assert!(!matches(b"a", b"aa"));
    }

    #[test]
    fn plus_repeats_and_requires_one() {
        assert!(matches(b"a+", b"a"));
        assert!(matches(b"a+", b"aa"));
        assert!(matches(b"a+", b"aaa"));
        assert!(!matches(b"a+", b""));
        assert!(!matches(b"a+", b"b"));
    }

    #[test]
    fn digit_class() {
        for c in b'0'..=b'9' {
            assert!(matches(b"[0-9]", &[c]));
        }
        assert!(!matches(b"[0-9]", b"a"));
    }

    #[test]
    fn nested_alternation_inside_group() {
        // A naive delimiter-split on '|' would mis-parse this as "(a" / "b)c".
        let mut re = parse(b"(a|b)c").unwrap();
        annotate(&mut re);
        assert!(matches(b"(a|b)c", b"ac"));
        assert!(matches(b"(a|b)c", b"bc"));
        assert!(!matches(b"(a|b)c", b"c"));
        match re.kind {
            ReKind::Concat(_) => {}
            other => panic!("expected a top-level Concat, got {other:?}"),
        }
    }

    #[test]
    fn integer_literal() {
        assert!(matches(b"[1-9][0-9]*", b"1"));
        assert!(matches(b"[1-9][0-9]*", b"10"));
        assert!(matches(b"[1-9][0-9]*", b"2147483647"));
        assert!(!matches(b"[1-9][0-9]*", b"0"));
        assert!(!matches(b"[1-9][0-9]*", b"01"));
        assert!(!matches(b"[1-9][0-9]*", b"abc"));
    }

    #[test]
    fn identifier() {
        assert!(matches(b"[_A-Za-z]\\w*", b"x"));
        assert!(matches(b"[_A-Za-z]\\w*", b"_1"));
        assert!(matches(b"[_A-Za-z]\\w*", b"name9"));
        assert!(!matches(b"[_A-Za-z]\\w*", b"1a"));
        assert!(!matches(b"[_A-Za-z]\\w*", b""));
    }

    #[test]
    fn float_literal() {
        let p: &[u8] = b"[-+]?[0-9]*[.][0-9]*([eE][-+]?[0-9]+)?";
        assert!(matches(p, b"1.0"));
        assert!(matches(p, b"-.5e10"));
        assert!(matches(p, b"+0.0E-7"));
        assert!(!matches(p, b"1"));
    }

    #[test]
    fn unterminated_bracket_is_an_error() {
        assert!(matches!(parse(b"[abc"), Err(ParseError::UnterminatedBracket { .. })));
    }

    #[test]
    fn unterminated_paren_is_an_error() {
        assert!(matches!(parse(b"(abc"), Err(ParseError::UnterminatedParen { .. })));
    }

    #[test]
    fn stray_close_bracket_is_an_error() {
        assert!(matches!(parse(b"a]"), Err(ParseError::StrayCloseBracket { .. })));
    }

    #[test]
    fn stray_close_paren_is_an_error() {
        assert!(matches!(parse(b"a)"), Err(ParseError::StrayCloseParen { .. })));
    }

    #[test]
    fn empty_quantifier_is_an_error() {
        assert!(matches!(parse(b"*"), Err(ParseError::EmptyQuantifier { .. })));
        assert!(matches!(parse(b"(a)*+"), Ok(_)));
    }

    #[test]
    fn incomplete_escape_is_an_error() {
        assert!(matches!(parse(b"a\\"), Err(ParseError::IncompleteEscape { .. })));
    }

    #[test]
    fn unknown_escape_is_an_error() {
        assert!(matches!(parse(b"\\z"), Err(ParseError::UnknownEscape { byte: b'z', .. })));
    }

    #[test]
    fn unsupported_meta_in_class_is_an_error() {
        assert!(matches!(
            parse(b"[a(b]"),
            Err(ParseError::UnsupportedMetaInClass { byte: b'(', .. })
        ));
    }

    #[test]
    fn reversed_range_is_an_error() {
        assert!(matches!(parse(b"[9-0]"), Err(ParseError::InvalidRange { a: b'9', b: b'0', .. })));
    }

    #[test]
    fn negated_class() {
        assert!(matches(b"[^0-9]", b"a"));
        assert!(!matches(b"[^0-9]", b"5"));
    }

    #[test]
    fn empty_class_matches_nothing() {
        let mut re = parse(b"[]").unwrap();
        annotate(&mut re);
        assert!(!matches(b"[]", b""));
        assert!(!matches(b"[]", b"a"));
    }
}
