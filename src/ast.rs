//! Regex abstract syntax tree and the McNaughton-Yamada-Thompson position
//! annotator (Aho §3.9.4-3.9.5).
//!
//! The tree has exactly five node kinds (§3.1) and owns its children
//! exclusively; there is no node sharing; subtrees that the source
//! expression logically reuses (`+` expansion) are deep-cloned instead,
//! which `#[derive(Clone)]` gives us for free (see `parser::expand_plus`).

use std::collections::BTreeSet;
use std::io::{self, Write};

use crate::dot::{Edge as DotEdge, Family, GraphWriter, Node as DotNode};

/// Identifies a `Char` leaf by its left-to-right position in the augmented
/// tree (§3.2). Assigned by [`annotate`].
pub type LeafId = u32;

/// A set of leaf positions, as used by `firstpos`/`lastpos`/`followpos`.
///
/// `BTreeSet` gives canonical, hashable, orderable set equality for free,
/// which both the direct DFA builder (state interning) and the annotator
/// rely on.
pub type PosSet = BTreeSet<LeafId>;

/// A regex AST node together with the attributes the position annotator
/// fills in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Re {
    pub kind: ReKind,
    pub attrs: Attrs,
}

/// The five node kinds from §3.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReKind {
    /// Matches the empty byte sequence.
    Eps,
    /// Matches exactly the byte `b`.
    Char(u8),
    /// Matches zero or more concatenations of the child.
    Kleene(Box<Re>),
    /// Matches the children in order.
    Concat(Vec<Re>),
    /// Matches any one of the children.
    Disjunction(Vec<Re>),
}

/// `nullable`/`firstpos`/`lastpos`, populated by [`annotate`].
///
/// Before annotation these are all empty/`false`; reading them before
/// calling `annotate` on the containing tree is a logic error (though not
/// unsafe — you'll just see an empty set).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attrs {
    pub nullable: bool,
    pub firstpos: PosSet,
    pub lastpos: PosSet,
    /// Set only on `Char` leaves: the [`LeafId`] assigned to this leaf.
    pub leaf_id: Option<LeafId>,
}

impl Re {
    pub fn eps() -> Re {
        Re { kind: ReKind::Eps, attrs: Attrs::default() }
    }

    pub fn char(b: u8) -> Re {
        Re { kind: ReKind::Char(b), attrs: Attrs::default() }
    }

    pub fn kleene(inner: Re) -> Re {
        Re { kind: ReKind::Kleene(Box::new(inner)), attrs: Attrs::default() }
    }

    pub fn concat(inners: Vec<Re>) -> Re {
        Re { kind: ReKind::Concat(inners), attrs: Attrs::default() }
    }

    pub fn disjunction(inners: Vec<Re>) -> Re {
        Re { kind: ReKind::Disjunction(inners), attrs: Attrs::default() }
    }

    /// Writes this tree to a `dot` graph. When `verbose` is set, each node's
    /// label also carries its `nullable`/`firstpos`/`lastpos` (and, for
    /// leaves, `followpos` if `tables` is given) — this backs the CLI's
    /// `--verbose` flag (spec §6).
    pub fn write_dot<W: Write>(
        &self,
        out: W,
        verbose: bool,
        tables: Option<&PositionTables>,
    ) -> io::Result<()> {
        let mut writer = GraphWriter::new(out, Family::Directed, None)?;
        let mut next_id = 0usize;
        self.write_dot_node(&mut writer, &mut next_id, verbose, tables)?;
        writer.end_into_inner().1
    }

    fn write_dot_node<W: Write>(
        &self,
        writer: &mut GraphWriter<W>,
        next_id: &mut usize,
        verbose: bool,
        tables: Option<&PositionTables>,
    ) -> io::Result<usize> {
        let me = *next_id;
        *next_id += 1;

        let label = if verbose {
            format!(
                "{}\\nnullable={} first={:?} last={:?}{}",
                self.node_text(),
                self.attrs.nullable,
                self.attrs.firstpos,
                self.attrs.lastpos,
                self.attrs
                    .leaf_id
                    .zip(tables)
                    .map(|(id, t)| format!(" follow={:?}", t.followpos(id)))
                    .unwrap_or_default(),
            )
        } else {
            self.node_text()
        };

        writer.node(me.into(), Some(DotNode { label: Some(label.into()), ..DotNode::none() }))?;

        let children: &[Re] = match &self.kind {
            ReKind::Eps | ReKind::Char(_) => &[],
            ReKind::Kleene(inner) => std::slice::from_ref(inner.as_ref()),
            ReKind::Concat(cs) | ReKind::Disjunction(cs) => cs.as_slice(),
        };

        for child in children {
            let child_id = child.write_dot_node(writer, next_id, verbose, tables)?;
            writer.segment([me, child_id], Some(DotEdge::none()))?;
        }

        Ok(me)
    }

    fn node_text(&self) -> String {
        match &self.kind {
            ReKind::Eps => "eps".to_string(),
            ReKind::Char(b) => format!("{:?}", *b as char),
            ReKind::Kleene(_) => "*".to_string(),
            ReKind::Concat(_) => "concat".to_string(),
            ReKind::Disjunction(_) => "|".to_string(),
        }
    }
}

/// `leafpos_map`/`followpos`, the side tables built by [`annotate`] (§3.2).
#[derive(Debug, Clone, Default)]
pub struct PositionTables {
    /// `leafpos_map[id]` is the byte labeling leaf `id`.
    leafpos_map: Vec<u8>,
    /// `followpos[id]` is the set of positions that may immediately follow
    /// leaf `id` in a match.
    followpos: Vec<PosSet>,
}

impl PositionTables {
    pub fn leaf_count(&self) -> usize {
        self.leafpos_map.len()
    }

    pub fn byte_at(&self, id: LeafId) -> u8 {
        self.leafpos_map[id as usize]
    }

    pub fn followpos(&self, id: LeafId) -> &PosSet {
        &self.followpos[id as usize]
    }

    fn new_leaf(&mut self, byte: u8) -> LeafId {
        let id = self.leafpos_map.len() as LeafId;
        self.leafpos_map.push(byte);
        self.followpos.push(PosSet::new());
        id
    }

    fn add_followpos(&mut self, from: LeafId, into: &PosSet) {
        self.followpos[from as usize].extend(into.iter().copied());
    }
}

/// Recurrences from §3.1/§3.2, run bottom-up (post-order) over the tree.
///
/// After this returns, `re.attrs` holds `nullable`/`firstpos`/`lastpos` for
/// every node (in particular the root), and the returned [`PositionTables`]
/// holds `leafpos_map`/`followpos` for every `Char` leaf.
pub fn annotate(re: &mut Re) -> PositionTables {
    let mut tables = PositionTables::default();
    annotate_node(re, &mut tables);
    tables
}

fn annotate_node(re: &mut Re, tables: &mut PositionTables) {
    match &mut re.kind {
        ReKind::Eps => {
            re.attrs = Attrs { nullable: true, ..Attrs::default() };
        }
        ReKind::Char(b) => {
            let id = tables.new_leaf(*b);
            let mut firstpos = PosSet::new();
            firstpos.insert(id);
            re.attrs = Attrs {
                nullable: false,
                firstpos: firstpos.clone(),
                lastpos: firstpos,
                leaf_id: Some(id),
            };
        }
        ReKind::Kleene(inner) => {
            annotate_node(inner, tables);
            for &pos in &inner.attrs.lastpos {
                tables.add_followpos(pos, &inner.attrs.firstpos);
            }
            re.attrs = Attrs {
                nullable: true,
                firstpos: inner.attrs.firstpos.clone(),
                lastpos: inner.attrs.lastpos.clone(),
                leaf_id: None,
            };
        }
        ReKind::Concat(children) => {
            for child in children.iter_mut() {
                annotate_node(child, tables);
            }

            let mut nullable = true;
            let mut firstpos = PosSet::new();
            for child in children.iter() {
                nullable = nullable && child.attrs.nullable;
            }
            let mut stop = false;
            for child in children.iter() {
                if stop {
                    break;
                }
                firstpos.extend(child.attrs.firstpos.iter().copied());
                if !child.attrs.nullable {
                    stop = true;
                }
            }

            let mut lastpos = PosSet::new();
            stop = false;
            for child in children.iter().rev() {
                if stop {
                    break;
                }
                lastpos.extend(child.attrs.lastpos.iter().copied());
                if !child.attrs.nullable {
                    stop = true;
                }
            }

            // followpos: for every adjacent pair, leaves in lastpos(c_i)
            // (inherited through nullable suffixes) gain firstpos(c_{i+1}).
            for i in 0..children.len().saturating_sub(1) {
                let mut trailing = PosSet::new();
                let mut j = i;
                loop {
                    trailing.extend(children[j].attrs.lastpos.iter().copied());
                    if children[j].attrs.nullable && j > 0 {
                        j -= 1;
                    } else {
                        break;
                    }
                }
                for &pos in &trailing {
                    tables.add_followpos(pos, &children[i + 1].attrs.firstpos);
                }
            }

            re.attrs = Attrs { nullable, firstpos, lastpos, leaf_id: None };
        }
        ReKind::Disjunction(children) => {
            for child in children.iter_mut() {
                annotate_node(child, tables);
            }

            let mut nullable = false;
            let mut firstpos = PosSet::new();
            let mut lastpos = PosSet::new();
            for child in children.iter() {
                nullable = nullable || child.attrs.nullable;
                firstpos.extend(child.attrs.firstpos.iter().copied());
                lastpos.extend(child.attrs.lastpos.iter().copied());
            }

            re.attrs = Attrs { nullable, firstpos, lastpos, leaf_id: None };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_leaf_is_never_nullable() {
        let mut re = Re::char(b'a');
        annotate(&mut re);
        assert!(!re.attrs.nullable);
        assert_eq!(re.attrs.firstpos.len(), 1);
        assert_eq!(re.attrs.firstpos, re.attrs.lastpos);
    }

    #[test]
    fn eps_is_nullable_with_empty_positions() {
        let mut re = Re::eps();
        annotate(&mut re);
        assert!(re.attrs.nullable);
        assert!(re.attrs.firstpos.is_empty());
        assert!(re.attrs.lastpos.is_empty());
    }

    #[test]
    fn kleene_is_nullable_and_self_follows() {
        // a*
        let mut re = Re::kleene(Re::char(b'a'));
        let tables = annotate(&mut re);
        assert!(re.attrs.nullable);
        let a_leaf = *re.attrs.firstpos.iter().next().unwrap();
        assert_eq!(tables.followpos(a_leaf), &re.attrs.lastpos);
    }

    #[test]
    fn concat_followpos_chains_leaves() {
        // ab
        let mut re = Re::concat(vec![Re::char(b'a'), Re::char(b'b')]);
        let tables = annotate(&mut re);
        assert!(!re.attrs.nullable);
        let a_leaf = match &re.kind {
            ReKind::Concat(cs) => cs[0].attrs.leaf_id.unwrap(),
            _ => unreachable!(),
        };
        let b_leaf = match &re.kind {
            ReKind::Concat(cs) => cs[1].attrs.leaf_id.unwrap(),
            _ => unreachable!(),
        };
        assert!(tables.followpos(a_leaf).contains(&b_leaf));
    }

    #[test]
    fn disjunction_unions_first_and_last() {
        // a|b
        let mut re = Re::disjunction(vec![Re::char(b'a'), Re::char(b'b')]);
        annotate(&mut re);
        assert!(!re.attrs.nullable);
        assert_eq!(re.attrs.firstpos.len(), 2);
        assert_eq!(re.attrs.lastpos.len(), 2);
    }
}
