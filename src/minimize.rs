//! Dead-state removal (§4.6) and Hopcroft-style DFA minimization (Aho Alg.
//! 3.39, §4.7).
//!
//! The `parsergen` C++ this crate was distilled from represents a DFA as a
//! dense total transition table and therefore needs a real dead-sink state
//! to keep every row total; minimization there runs partition refinement
//! directly over that table. [`crate::dfa::Dfa`] is sparse (a missing edge
//! already means reject), so the minimizer below adds one synthetic dead
//! state only for the duration of partition refinement, then drops it with
//! the same dead-state removal pass used standalone.

use std::collections::HashMap;

use log::debug;

use crate::dfa::{Dfa, DfaNode};
use crate::error::{BuildError, Limits};

impl Dfa {
    /// Removes states that are unreachable from the start state, or from
    /// which no accepting state can be reached, and reindexes what's left
    /// starting at 0. A DFA with no live states collapses to a single
    /// dead, non-accepting state (the automaton that rejects everything).
    pub fn remove_dead_states(&self) -> Dfa {
        let reachable = reachable_from(self, self.start);
        let co_reachable = co_reachable_with_accept(self);

        let mut live: Vec<usize> =
            reachable.into_iter().filter(|s| co_reachable.contains(s)).collect();
        live.sort_unstable();

        if live.is_empty() {
            debug!("remove_dead_states: no live states, collapsing to a single dead state");
            return Dfa { nodes: vec![DfaNode::default()], start: 0 };
        }

        let new_index: HashMap<usize, usize> =
            live.iter().enumerate().map(|(new_idx, &old_idx)| (old_idx, new_idx)).collect();

        let nodes = live
            .iter()
            .map(|&old_idx| {
                let node = &self.nodes[old_idx];
                let edges = node
                    .edges
                    .iter()
                    .filter_map(|(&b, &target)| new_index.get(&target).map(|&t| (b, t)))
                    .collect();
                DfaNode { edges, terminal_id: node.terminal_id }
            })
            .collect();

        debug!("remove_dead_states: {} -> {} states", self.nodes.len(), live.len());
        Dfa { nodes, start: new_index[&self.start] }
    }

    /// Hopcroft-style partition refinement: repeatedly splits blocks of
    /// states until every pair of states left in the same block agrees on
    /// every byte's target block, starting from an initial partition by
    /// `terminal_id` (so lexer-mode patterns are never merged with each
    /// other or with the non-accepting block). Ends with a dead-state
    /// removal pass, so the returned DFA carries no unreachable or
    /// never-accepting states.
    pub fn minimize(&self, limits: &Limits) -> Result<Dfa, BuildError> {
        if self.nodes.len() > limits.max_dfa_states {
            return Err(BuildError::TooLargeDfa(self.nodes.len()));
        }

        let dead = self.nodes.len();
        let total = dead + 1;

        let target = |state: usize, byte: u8| -> usize {
            if state == dead {
                dead
            } else {
                *self.nodes[state].edges.get(&byte).unwrap_or(&dead)
            }
        };
        let terminal_of = |state: usize| -> Option<u32> {
            if state == dead { None } else { self.nodes[state].terminal_id }
        };

        let mut blocks: Vec<Vec<usize>> = Vec::new();
        let mut block_of: Vec<usize> = vec![0; total];
        {
            let mut by_terminal: HashMap<Option<u32>, usize> = HashMap::new();
            for state in 0..total {
                let key = terminal_of(state);
                let idx = *by_terminal.entry(key).or_insert_with(|| {
                    blocks.push(Vec::new());
                    blocks.len() - 1
                });
                blocks[idx].push(state);
                block_of[state] = idx;
            }
        }

        loop {
            let mut next_blocks: Vec<Vec<usize>> = Vec::new();
            let mut next_block_of = vec![0usize; total];
            let mut changed = false;

            for block in &blocks {
                let mut groups: HashMap<Vec<usize>, Vec<usize>> = HashMap::new();
                for &state in block {
                    let signature: Vec<usize> =
                        (0u16..256).map(|b| block_of[target(state, b as u8)]).collect();
                    groups.entry(signature).or_default().push(state);
                }
                if groups.len() > 1 {
                    changed = true;
                }
                for group in groups.into_values() {
                    let idx = next_blocks.len();
                    for &state in &group {
                        next_block_of[state] = idx;
                    }
                    next_blocks.push(group);
                }
            }

            blocks = next_blocks;
            block_of = next_block_of;

            if blocks.len() > limits.max_dfa_states {
                return Err(BuildError::TooLargeDfa(blocks.len()));
            }
            if !changed {
                break;
            }
        }

        let dead_block = block_of[dead];
        let nodes: Vec<DfaNode> = blocks
            .iter()
            .map(|block| {
                let rep = block[0];
                let terminal_id = terminal_of(rep);
                debug_assert!(
                    block.iter().all(|&s| terminal_of(s) == terminal_id),
                    "minimizer merged states with disagreeing terminal ids"
                );
                let mut edges = HashMap::new();
                for b in 0u16..256 {
                    let b = b as u8;
                    let target_block = block_of[target(rep, b)];
                    if target_block != dead_block {
                        edges.insert(b, target_block);
                    }
                }
                DfaNode { edges, terminal_id }
            })
            .collect();

        let start = block_of[self.start];
        debug!("minimize: {} -> {} blocks before dead-state removal", total, blocks.len());
        Ok(Dfa { nodes, start }.remove_dead_states())
    }
}

fn reachable_from(dfa: &Dfa, start: usize) -> std::collections::HashSet<usize> {
    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![start];
    seen.insert(start);
    while let Some(s) = stack.pop() {
        for &target in dfa.nodes[s].edges.values() {
            if seen.insert(target) {
                stack.push(target);
            }
        }
    }
    seen
}

fn co_reachable_with_accept(dfa: &Dfa) -> std::collections::HashSet<usize> {
    let mut reverse: HashMap<usize, Vec<usize>> = HashMap::new();
    for (from, node) in dfa.nodes.iter().enumerate() {
        for &target in node.edges.values() {
            reverse.entry(target).or_default().push(from);
        }
    }

    let mut seen = std::collections::HashSet::new();
    let mut stack: Vec<usize> = Vec::new();
    for (idx, node) in dfa.nodes.iter().enumerate() {
        if node.terminal_id.is_some() && seen.insert(idx) {
            stack.push(idx);
        }
    }
    while let Some(s) = stack.pop() {
        if let Some(preds) = reverse.get(&s) {
            for &p in preds {
                if seen.insert(p) {
                    stack.push(p);
                }
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn limits() -> Limits {
        Limits::default()
    }

    #[test]
    fn minimize_is_idempotent() {
        let re = parse(b"(a|b)*abb").unwrap();
        let dfa = crate::dfa::dfa_from_ast(&re, 0, &limits()).unwrap();
        let once = dfa.minimize(&limits()).unwrap();
        let twice = once.minimize(&limits()).unwrap();
        assert_eq!(once.nodes.len(), twice.nodes.len());
    }

    #[test]
    fn minimize_has_no_dead_states() {
        let re = parse(b"a(b|c)d").unwrap();
        let dfa = crate::dfa::dfa_from_ast(&re, 0, &limits()).unwrap();
        let minimized = dfa.minimize(&limits()).unwrap();
        let removed_again = minimized.remove_dead_states();
        assert_eq!(minimized.nodes.len(), removed_again.nodes.len());
    }

    #[test]
    fn minimize_preserves_language() {
        let re = parse(b"(a|b)*abb").unwrap();
        let dfa = crate::dfa::dfa_from_ast(&re, 0, &limits()).unwrap();
        let minimized = dfa.minimize(&limits()).unwrap();
        for input in [&b"abb"[..], b"aababb", b"bbbabb", b"ab", b"", b"abbb", b"aaab"] {
            assert_eq!(dfa.accept(input), minimized.accept(input), "disagreed on {input:?}");
        }
    }

    #[test]
    fn minimize_keeps_lexer_terminal_ids_distinct() {
        let patterns = [parse(b"if").unwrap(), parse(b"[a-z]+").unwrap()];
        let nfa = crate::nfa::nfa_from_patterns(&patterns);
        let dfa = crate::dfa::dfa_from_nfa(&nfa, &limits()).unwrap();
        let minimized = dfa.minimize(&limits()).unwrap();
        assert_eq!(minimized.accept(b"if"), Some(0));
        assert_eq!(minimized.accept(b"ifx"), Some(1));
        assert_eq!(minimized.accept(b"for"), Some(1));
    }

    #[test]
    fn dead_states_are_dropped() {
        // The branch matching 'z' can never be reached after minimization
        // folds unreachable structure, but a literal dead state can also
        // arise directly: an automaton for a pattern that can never match
        // anything once past a point still shouldn't retain a node for it.
        let re = parse(b"ab").unwrap();
        let dfa = crate::dfa::dfa_from_ast(&re, 0, &limits()).unwrap();
        let minimized = dfa.minimize(&limits()).unwrap();
        // a, b: two live non-accepting states plus the accepting state.
        assert_eq!(minimized.nodes.len(), 3);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

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

        proptest! {
            #[test]
            fn minimization_is_idempotent(pattern in pattern_strategy()) {
                let re = parse(&pattern).expect("generated patterns are always well-formed");
                let dfa = crate::dfa::dfa_from_ast(&re, 0, &limits()).unwrap();
                let once = dfa.minimize(&limits()).unwrap();
                let twice = once.minimize(&limits()).unwrap();
                prop_assert_eq!(once.nodes.len(), twice.nodes.len());
            }

            #[test]
            fn minimized_dfa_has_only_live_states(pattern in pattern_strategy()) {
                let re = parse(&pattern).expect("generated patterns are always well-formed");
                let dfa = crate::dfa::dfa_from_ast(&re, 0, &limits()).unwrap();
                let minimized = dfa.minimize(&limits()).unwrap();
                let reachable = reachable_from(&minimized, minimized.start);
                prop_assert_eq!(reachable.len(), minimized.nodes.len());
            }
        }
    }
}
