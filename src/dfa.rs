//! Deterministic automata: the direct position-construction builder
//! (Aho §3.9.5), subset construction from an [`Nfa`] (Aho Alg. 3.20), and
//! matching (§4.8).
//!
//! Minimization and dead-state removal live in [`crate::minimize`] — they
//! operate purely on the [`Dfa`] shape defined here and don't care which
//! builder produced it.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};

use log::{debug, trace};

use crate::ast::{annotate, LeafId, PosSet, Re};
use crate::dot::{Edge as DotEdge, Family, GraphWriter, Node as DotNode};
use crate::error::{BuildError, CompileError, Limits};
use crate::nfa::Nfa;
use crate::parser::parse;

/// A single DFA state: at most one target per byte (§3.4), and a
/// `terminal_id` if it accepts.
#[derive(Debug, Clone, Default)]
pub struct DfaNode {
    pub edges: HashMap<u8, usize>,
    pub terminal_id: Option<u32>,
}

/// A deterministic finite automaton over the byte alphabet. State 0 is
/// always the start state (mirrors [`Nfa::start`] even though it is always
/// 0 here, to keep the two types' APIs parallel).
#[derive(Debug, Clone)]
pub struct Dfa {
    pub nodes: Vec<DfaNode>,
    pub start: usize,
}

/// Never appears in a real edge — see [`dfa_from_ast`].
const END_MARKER: u8 = 0;

/// Direct DFA construction from a regex AST (§4.3), for a single pattern.
///
/// Augments the tree with a synthetic trailing [`END_MARKER`] leaf so that
/// `nullable`/`firstpos`/`lastpos`/`followpos` (§3.9.4) can identify
/// accepting states as exactly those whose position set contains the
/// marker leaf. The marker's own byte value is never used as an edge label
/// — it exists purely to be found in a position set, which is why its
/// value doesn't matter and can safely collide with a real byte.
pub fn dfa_from_ast(re: &Re, terminal_id: u32, limits: &Limits) -> Result<Dfa, BuildError> {
    let mut augmented = Re::concat(vec![re.clone(), Re::char(END_MARKER)]);
    let tables = annotate(&mut augmented);
    let end_leaf: LeafId = tables.leaf_count() as LeafId - 1;

    let start_set: PosSet = augmented.attrs.firstpos.clone();

    let mut states: Vec<PosSet> = vec![start_set.clone()];
    let mut edges: Vec<HashMap<u8, usize>> = vec![HashMap::new()];
    let mut index: HashMap<PosSet, usize> = HashMap::new();
    index.insert(start_set, 0);
    let mut worklist: VecDeque<usize> = VecDeque::from([0]);

    while let Some(s_idx) = worklist.pop_front() {
        let positions = states[s_idx].clone();
        let mut by_byte: HashMap<u8, PosSet> = HashMap::new();
        for &pos in &positions {
            if pos == end_leaf {
                continue;
            }
            let byte = tables.byte_at(pos);
            by_byte.entry(byte).or_default().extend(tables.followpos(pos).iter().copied());
        }
        // The end marker never labels a real edge, even if some other leaf's
        // actual byte value happens to collide with it (e.g. a literal NUL).
        by_byte.remove(&END_MARKER);

        for (byte, target) in by_byte {
            let target_idx = *index.entry(target.clone()).or_insert_with(|| {
                states.push(target);
                edges.push(HashMap::new());
                let id = states.len() - 1;
                worklist.push_back(id);
                id
            });
            edges[s_idx].insert(byte, target_idx);
        }

        if states.len() > limits.max_dfa_states {
            return Err(BuildError::TooLargeDfa(states.len()));
        }
    }

    let nodes = states
        .into_iter()
        .zip(edges)
        .map(|(positions, edges)| DfaNode {
            edges,
            terminal_id: positions.contains(&end_leaf).then_some(terminal_id),
        })
        .collect();

    trace!("dfa_from_ast: {} states", nodes.len());
    Ok(Dfa { nodes, start: 0 })
}

/// Subset construction (Aho Alg. 3.20): determinizes an [`Nfa`], which may
/// carry several patterns' `terminal_id`s (lexer mode).
pub fn dfa_from_nfa(nfa: &Nfa, limits: &Limits) -> Result<Dfa, BuildError> {
    if nfa.nodes.len() > limits.max_nfa_states {
        return Err(BuildError::TooLargeNfa(nfa.nodes.len()));
    }

    let start_set = nfa.epsilon_closure(&std::iter::once(nfa.start).collect());

    let mut states: Vec<std::collections::BTreeSet<usize>> = vec![start_set.clone()];
    let mut edges: Vec<HashMap<u8, usize>> = vec![HashMap::new()];
    let mut index = HashMap::new();
    index.insert(start_set, 0usize);
    let mut worklist = VecDeque::from([0usize]);

    while let Some(s_idx) = worklist.pop_front() {
        let set = states[s_idx].clone();
        let bytes: std::collections::BTreeSet<u8> =
            set.iter().flat_map(|&s| nfa.nodes[s].edges.iter().map(|&(b, _)| b)).collect();

        for byte in bytes {
            let moved = nfa.step(&set, byte);
            let target = nfa.epsilon_closure(&moved);
            if target.is_empty() {
                continue;
            }
            let target_idx = *index.entry(target.clone()).or_insert_with(|| {
                states.push(target);
                edges.push(HashMap::new());
                let id = states.len() - 1;
                worklist.push_back(id);
                id
            });
            edges[s_idx].insert(byte, target_idx);
        }

        if states.len() > limits.max_dfa_states {
            return Err(BuildError::TooLargeDfa(states.len()));
        }
    }

    let nodes = states
        .iter()
        .zip(edges)
        .map(|(set, edges)| DfaNode { edges, terminal_id: nfa.accepting_terminal(set) })
        .collect();

    debug!("dfa_from_nfa: {} nfa states -> {} dfa states", nfa.nodes.len(), states.len());
    Dfa { nodes, start: 0 }.minimize(limits)
}

impl Dfa {
    /// Parses and compiles a single pattern straight to a DFA, composing
    /// the parser and the direct builder. A convenience entry point for
    /// the common case of "I have one pattern, give me its DFA."
    pub fn from_pattern(pattern: &[u8], terminal_id: u32, limits: &Limits) -> Result<Dfa, CompileError> {
        let re = parse(pattern)?;
        let dfa = dfa_from_ast(&re, terminal_id, limits)?;
        Ok(dfa.minimize(limits)?)
    }

    /// Runs `input` through the automaton from the start state (§4.8).
    /// Returns the `terminal_id` of the state reached if the whole input
    /// is consumed and that state accepts, `None` otherwise (including on
    /// an undefined transition, which is equivalent to transitioning into
    /// an implicit dead state).
    pub fn accept(&self, input: &[u8]) -> Option<u32> {
        let mut state = self.start;
        for &b in input {
            state = *self.nodes[state].edges.get(&b)?;
        }
        self.nodes[state].terminal_id
    }

    pub fn write_dot<W: Write>(&self, out: W) -> io::Result<()> {
        let mut writer = GraphWriter::new(out, Family::Directed, None)?;
        for (idx, node) in self.nodes.iter().enumerate() {
            let peripheries = node.terminal_id.map(|_| 2);
            let label = node
                .terminal_id
                .map(|id| format!("{idx}\\n#{id}"))
                .unwrap_or_else(|| idx.to_string());
            writer.node(idx.into(), Some(DotNode { label: Some(label.into()), peripheries }))?;
            for (&b, &target) in &node.edges {
                let label = format!("{:?}", b as char);
                writer.segment([idx, target], Some(DotEdge { label: Some(label.into()) }))?;
            }
        }
        writer.end_into_inner().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::{nfa_from_ast, nfa_from_patterns};

    fn limits() -> Limits {
        Limits::default()
    }

    #[test]
    fn direct_and_thompson_paths_agree() {
        for pattern in [&b"a"[..], b"a*", b"a+", b"a|b", b"(a|b)c", b"[0-9]+", b"a?b"] {
            let re = parse(pattern).unwrap();
            let direct = dfa_from_ast(&re, 0, &limits()).unwrap();
            let nfa = nfa_from_ast(&re, 0);
            let via_nfa = dfa_from_nfa(&nfa, &limits()).unwrap();

            for input in [&b""[..], b"a", b"b", b"c", b"aa", b"ab", b"ac", b"bc", b"0", b"123"] {
                assert_eq!(
                    direct.accept(input).is_some(),
                    via_nfa.accept(input).is_some(),
                    "pattern {:?} disagreed on input {:?}",
                    String::from_utf8_lossy(pattern),
                    String::from_utf8_lossy(input),
                );
            }
        }
    }

    #[test]
    fn lexer_mode_prefers_lowest_rule_index() {
        let a = parse(b"a+").unwrap();
        let anything = parse(b"[a-z]+").unwrap();
        let nfa = nfa_from_patterns(&[a, anything]);
        let dfa = dfa_from_nfa(&nfa, &limits()).unwrap();
        assert_eq!(dfa.accept(b"aaa"), Some(0));
        assert_eq!(dfa.accept(b"xyz"), Some(1));
    }

    #[test]
    fn rejects_undefined_transitions() {
        let dfa = Dfa::from_pattern(b"ab", 0, &limits()).unwrap();
        assert_eq!(dfa.accept(b"ab"), Some(0));
        assert_eq!(dfa.accept(b"ac"), None);
        assert_eq!(dfa.accept(b"a"), None);
        assert_eq!(dfa.accept(b"abc"), None);
    }

    #[test]
    fn too_small_a_limit_fails_construction() {
        let tiny = Limits { max_dfa_states: 1, max_nfa_states: 1 << 16 };
        let re = parse(b"a|b|c").unwrap();
        assert!(matches!(dfa_from_ast(&re, 0, &tiny), Err(BuildError::TooLargeDfa(_))));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        // A small recursive grammar (literal a/b/c, concatenation,
        // alternation, Kleene star) over a bounded depth, used to
        // differentially test the direct builder against Thompson +
        // subset construction on randomly generated patterns.
        fn pattern_strategy() -> impl Strategy<Value = Vec<u8>> {
            let leaf = prop_oneof![Just(b"a".to_vec()), Just(b"b".to_vec()), Just(b"c".to_vec())];
            leaf.prop_recursive(4, 64, 8, |inner| {
                prop_oneof![
                    inner.clone().prop_map(|mut p| {
                        p.push(b'*');
                        p
                    }),
                    (inner.clone(), inner.clone()).prop_map(|(mut a, b)| {
                        a.extend(b);
                        a
                    }),
                    (inner.clone(), inner).prop_map(|(a, b)| {
                        let mut v = vec![b'('];
                        v.extend(a);
                        v.push(b'|');
                        v.extend(b);
                        v.push(b')');
                        v
                    }),
                ]
            })
        }

        fn input_strategy() -> impl Strategy<Value = Vec<u8>> {
            prop::collection::vec(prop_oneof![Just(b'a'), Just(b'b'), Just(b'c')], 0..6)
        }

        proptest! {
            #[test]
            fn direct_and_thompson_paths_always_agree(pattern in pattern_strategy(), input in input_strategy()) {
                let re = parse(&pattern).expect("generated patterns are always well-formed");
                let direct = dfa_from_ast(&re, 0, &limits()).unwrap();
                let nfa = nfa_from_ast(&re, 0);
                let via_nfa = dfa_from_nfa(&nfa, &limits()).unwrap();
                prop_assert_eq!(direct.accept(&input).is_some(), via_nfa.accept(&input).is_some());
            }

            #[test]
            fn minimized_dfa_preserves_language(pattern in pattern_strategy(), input in input_strategy()) {
                let re = parse(&pattern).expect("generated patterns are always well-formed");
                let direct = dfa_from_ast(&re, 0, &limits()).unwrap();
                let minimized = direct.minimize(&limits()).unwrap();
                prop_assert_eq!(direct.accept(&input).is_some(), minimized.accept(&input).is_some());
            }
        }
    }
}
