//! Thompson construction (Aho Alg. 3.23): builds an NFA with epsilon edges
//! directly from a regex AST, one fragment per node, without consulting
//! leaf positions at all. This is the alternative front-end to the direct
//! DFA builder in [`crate::dfa`] — the two are required to accept the same
//! language for every pattern.

use std::collections::BTreeSet;
use std::io::{self, Write};

use fixedbitset::FixedBitSet;
use log::trace;

use crate::ast::{Re, ReKind};
use crate::dot::{Edge as DotEdge, Family, GraphWriter, Node as DotNode};

/// A single NFA state: its epsilon edges, its byte-labeled edges (possibly
/// several per byte, since this is nondeterministic), and — if it is an
/// accepting state for some pattern — that pattern's `terminal_id`.
#[derive(Debug, Clone, Default)]
pub struct NfaNode {
    pub eps_edges: Vec<usize>,
    pub edges: Vec<(u8, usize)>,
    pub terminal_id: Option<u32>,
}

/// A nondeterministic finite automaton with epsilon transitions over the
/// byte alphabet (§3.3). State `start` is always the single start state;
/// multiple start states (as used by lexer-mode union) are represented by
/// epsilon edges out of it.
#[derive(Debug, Clone)]
pub struct Nfa {
    pub nodes: Vec<NfaNode>,
    pub start: usize,
}

struct Fragment {
    start: usize,
    accept: usize,
}

fn new_node(nodes: &mut Vec<NfaNode>) -> usize {
    nodes.push(NfaNode::default());
    nodes.len() - 1
}

fn build_fragment(re: &Re, nodes: &mut Vec<NfaNode>) -> Fragment {
    match &re.kind {
        ReKind::Eps => {
            let s = new_node(nodes);
            let a = new_node(nodes);
            nodes[s].eps_edges.push(a);
            Fragment { start: s, accept: a }
        }
        ReKind::Char(b) => {
            let s = new_node(nodes);
            let a = new_node(nodes);
            nodes[s].edges.push((*b, a));
            Fragment { start: s, accept: a }
        }
        ReKind::Kleene(inner) => {
            let s = new_node(nodes);
            let f = build_fragment(inner, nodes);
            let a = new_node(nodes);
            nodes[s].eps_edges.push(f.start);
            nodes[s].eps_edges.push(a);
            nodes[f.accept].eps_edges.push(f.start);
            nodes[f.accept].eps_edges.push(a);
            Fragment { start: s, accept: a }
        }
        ReKind::Concat(children) => {
            if children.is_empty() {
                return build_fragment(&Re::eps(), nodes);
            }
            let frags: Vec<Fragment> = children.iter().map(|c| build_fragment(c, nodes)).collect();
            for pair in frags.windows(2) {
                nodes[pair[0].accept].eps_edges.push(pair[1].start);
            }
            Fragment { start: frags[0].start, accept: frags[frags.len() - 1].accept }
        }
        ReKind::Disjunction(children) => {
            let s = new_node(nodes);
            let frags: Vec<Fragment> = children.iter().map(|c| build_fragment(c, nodes)).collect();
            let a = new_node(nodes);
            for f in &frags {
                nodes[s].eps_edges.push(f.start);
                nodes[f.accept].eps_edges.push(a);
            }
            Fragment { start: s, accept: a }
        }
    }
}

/// Builds an NFA for a single pattern; its (only) accepting state is given
/// `terminal_id`.
pub fn nfa_from_ast(re: &Re, terminal_id: u32) -> Nfa {
    let mut nodes = Vec::new();
    let frag = build_fragment(re, &mut nodes);
    nodes[frag.accept].terminal_id = Some(terminal_id);
    trace!("nfa_from_ast: {} states", nodes.len());
    Nfa { nodes, start: frag.start }
}

/// Builds a lexer-mode NFA unioning several patterns, each keeping its own
/// `terminal_id` (its index in `patterns`) on its accepting state. A fresh
/// start state gets an epsilon edge into each pattern's own start.
pub fn nfa_from_patterns(patterns: &[Re]) -> Nfa {
    let mut nodes = Vec::new();
    let start = new_node(&mut nodes);
    for (i, re) in patterns.iter().enumerate() {
        let frag = build_fragment(re, &mut nodes);
        nodes[start].eps_edges.push(frag.start);
        nodes[frag.accept].terminal_id = Some(i as u32);
    }
    trace!("nfa_from_patterns: {} patterns, {} states", patterns.len(), nodes.len());
    Nfa { nodes, start }
}

impl Nfa {
    /// The epsilon closure of a set of states.
    ///
    /// Membership is tracked in a bitset sized to the NFA's state count
    /// (the same role the `parsergen` original's compile-time-dispatched
    /// `std::bitset<N>` plays in its subset construction, here sized at
    /// runtime instead of instantiated per width); the result is returned
    /// as a `BTreeSet` since that's what the subset-construction worklist
    /// interns states by.
    pub fn epsilon_closure(&self, states: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut seen = FixedBitSet::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = Vec::new();
        for &s in states {
            if !seen.put(s) {
                stack.push(s);
            }
        }
        while let Some(s) = stack.pop() {
            for &next in &self.nodes[s].eps_edges {
                if !seen.put(next) {
                    stack.push(next);
                }
            }
        }
        seen.ones().collect()
    }

    /// States reachable from `states` by consuming exactly one byte `b`
    /// (before taking any further epsilon closure).
    pub fn step(&self, states: &BTreeSet<usize>, b: u8) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        for &s in states {
            for &(edge_byte, target) in &self.nodes[s].edges {
                if edge_byte == b {
                    out.insert(target);
                }
            }
        }
        out
    }

    /// The lowest `terminal_id` among accepting states in `states`, per the
    /// lexer priority rule (lowest rule index wins on simultaneous accept).
    pub fn accepting_terminal(&self, states: &BTreeSet<usize>) -> Option<u32> {
        states.iter().filter_map(|&s| self.nodes[s].terminal_id).min()
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
            for &target in &node.eps_edges {
                writer.segment([idx, target], Some(DotEdge { label: Some("eps".into()) }))?;
            }
            for &(b, target) in &node.edges {
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
    use crate::ast::Re;

    #[test]
    fn single_char_has_one_step_accept() {
        let nfa = nfa_from_ast(&Re::char(b'a'), 0);
        let closure = nfa.epsilon_closure(&BTreeSet::from([nfa.start]));
        assert_eq!(nfa.accepting_terminal(&closure), None);
        let after_a = nfa.epsilon_closure(&nfa.step(&closure, b'a'));
        assert_eq!(nfa.accepting_terminal(&after_a), Some(0));
        let after_b = nfa.epsilon_closure(&nfa.step(&closure, b'b'));
        assert_eq!(nfa.accepting_terminal(&after_b), None);
    }

    #[test]
    fn lexer_union_keeps_separate_terminal_ids() {
        let nfa = nfa_from_patterns(&[Re::char(b'a'), Re::char(b'b')]);
        let start_closure = nfa.epsilon_closure(&BTreeSet::from([nfa.start]));
        let after_a = nfa.epsilon_closure(&nfa.step(&start_closure, b'a'));
        assert_eq!(nfa.accepting_terminal(&after_a), Some(0));
        let after_b = nfa.epsilon_closure(&nfa.step(&start_closure, b'b'));
        assert_eq!(nfa.accepting_terminal(&after_b), Some(1));
    }

    #[test]
    fn kleene_star_accepts_empty() {
        let nfa = nfa_from_ast(&Re::kleene(Re::char(b'a')), 0);
        let closure = nfa.epsilon_closure(&BTreeSet::from([nfa.start]));
        assert_eq!(nfa.accepting_terminal(&closure), Some(0));
    }
}
