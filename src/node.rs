//! Hash-consed symbolic regex nodes.
//!
//! Nodes are immutable and shared through [`Arc`]. Every node except a
//! top-level disjunction is interned by its [`SymbolicRegexBuilder`], so
//! structurally equal nodes are the same allocation and equality is a
//! pointer comparison. Disjunctions fall back to comparing their sets.
//!
//! [`SymbolicRegexBuilder`]: crate::builder::SymbolicRegexBuilder

use std::collections::hash_map::DefaultHasher;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use crate::char_kind::{CharKind, Context};
use crate::info::RegexInfo;

/// Upper bound of an unbounded loop.
pub const INFINITE: u32 = u32::MAX;

const UNKNOWN: u8 = 0;
const NOT_NULLABLE: u8 = 1;
const NULLABLE: u8 = 2;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SetKind {
    Or,
    And,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum NodeKind<S> {
    Epsilon,
    /// `\A`
    StartAnchor,
    /// `\z`
    EndAnchor,
    /// `\Z`: end of input, or before a final `\n`.
    EndAnchorZ,
    /// Reverse of `\Z`: start of input, or after a first `\n`.
    EndAnchorZRev,
    /// `^` in multiline mode.
    BolAnchor,
    /// `$` in multiline mode.
    EolAnchor,
    /// `\b`
    WbAnchor,
    /// `\B`
    NwbAnchor,
    /// Zero-width marker carrying the length of a fixed-length match.
    WatchDog(u32),
    Singleton(S),
    Loop {
        body: Node<S>,
        lower: u32,
        upper: u32,
        lazy: bool,
    },
    Concat(Node<S>, Node<S>),
    Or(NodeSet<S>),
    And(NodeSet<S>),
    Not(Node<S>),
}

impl<S> NodeKind<S> {
    fn tag(&self) -> u8 {
        match self {
            NodeKind::Epsilon => 0,
            NodeKind::StartAnchor => 1,
            NodeKind::EndAnchor => 2,
            NodeKind::EndAnchorZ => 3,
            NodeKind::EndAnchorZRev => 4,
            NodeKind::BolAnchor => 5,
            NodeKind::EolAnchor => 6,
            NodeKind::WbAnchor => 7,
            NodeKind::NwbAnchor => 8,
            NodeKind::WatchDog(_) => 9,
            NodeKind::Singleton(_) => 10,
            NodeKind::Loop { .. } => 11,
            NodeKind::Concat(..) => 12,
            NodeKind::Or(_) => 13,
            NodeKind::And(_) => 14,
            NodeKind::Not(_) => 15,
        }
    }
}

pub(crate) struct NodeData<S> {
    kind: NodeKind<S>,
    info: RegexInfo,
    hash: u64,
    depth: usize,
    internalized: AtomicBool,
    nullability: [AtomicU8; Context::COUNT],
    start_set: OnceLock<S>,
}

/// Shared handle to an immutable regex node.
pub struct Node<S>(Arc<NodeData<S>>);

impl<S> Clone for Node<S> {
    fn clone(&self) -> Self {
        Node(Arc::clone(&self.0))
    }
}

impl<S: Hash> Node<S> {
    pub(crate) fn new(kind: NodeKind<S>, info: RegexInfo) -> Self {
        let hash = structural_hash(&kind, info);
        let depth = match &kind {
            // Concatenations are right-nested chains, which every traversal walks iteratively.
            NodeKind::Concat(left, right) => (left.depth() + 1).max(right.depth()),
            NodeKind::Loop { body, .. } => body.depth() + 1,
            NodeKind::Not(inner) => inner.depth() + 1,
            NodeKind::Or(set) | NodeKind::And(set) => 1 + set.iter().map(|e| e.depth()).max().unwrap_or(0),
            _ => 1,
        };
        Node(Arc::new(NodeData {
            kind,
            info,
            hash,
            depth,
            internalized: AtomicBool::new(false),
            nullability: std::array::from_fn(|_| AtomicU8::new(UNKNOWN)),
            start_set: OnceLock::new(),
        }))
    }
}

fn structural_hash<S: Hash>(kind: &NodeKind<S>, info: RegexInfo) -> u64 {
    let mut h = DefaultHasher::new();
    kind.tag().hash(&mut h);
    match kind {
        NodeKind::WatchDog(length) => length.hash(&mut h),
        NodeKind::Singleton(set) => set.hash(&mut h),
        NodeKind::Loop {
            body,
            lower,
            upper,
            lazy,
        } => {
            body.0.hash.hash(&mut h);
            lower.hash(&mut h);
            upper.hash(&mut h);
            lazy.hash(&mut h);
        }
        NodeKind::Concat(left, right) => {
            left.0.hash.hash(&mut h);
            right.0.hash.hash(&mut h);
        }
        NodeKind::Or(set) | NodeKind::And(set) => set.hash.hash(&mut h),
        NodeKind::Not(inner) => inner.0.hash.hash(&mut h),
        _ => {}
    }
    info.bits().hash(&mut h);
    h.finish()
}

impl<S> Node<S> {
    pub fn kind(&self) -> &NodeKind<S> {
        &self.0.kind
    }

    pub fn info(&self) -> RegexInfo {
        self.0.info
    }

    /// Nesting depth; concatenation chains count once.
    pub fn depth(&self) -> usize {
        self.0.depth
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn is_internalized(&self) -> bool {
        self.0.internalized.load(Ordering::Acquire)
    }

    pub(crate) fn start_set_cell(&self) -> &OnceLock<S> {
        &self.0.start_set
    }

    pub(crate) fn mark_internalized(&self) {
        self.0.internalized.store(true, Ordering::Release);
    }

    pub fn is_nullable(&self) -> bool {
        self.0.info.is_nullable()
    }
    pub fn can_be_nullable(&self) -> bool {
        self.0.info.can_be_nullable()
    }
    pub fn is_lazy(&self) -> bool {
        self.0.info.is_lazy()
    }

    pub fn is_epsilon(&self) -> bool {
        matches!(self.0.kind, NodeKind::Epsilon)
    }
    pub fn is_or(&self) -> bool {
        matches!(self.0.kind, NodeKind::Or(_))
    }
    pub fn is_star(&self) -> bool {
        matches!(self.0.kind, NodeKind::Loop { lower: 0, upper: INFINITE, .. })
    }
    pub fn is_plus(&self) -> bool {
        matches!(self.0.kind, NodeKind::Loop { lower: 1, upper: INFINITE, .. })
    }
    pub fn is_maybe(&self) -> bool {
        matches!(self.0.kind, NodeKind::Loop { lower: 0, upper: 1, .. })
    }
    pub fn is_bounded_loop(&self) -> bool {
        matches!(self.0.kind, NodeKind::Loop { upper, .. } if upper != INFINITE)
    }

    /// Elements of a concatenation chain, or the node itself.
    pub fn concat_elems(&self) -> Vec<Node<S>> {
        let mut res = Vec::new();
        let mut current = self;
        while let NodeKind::Concat(left, right) = &current.0.kind {
            res.push(left.clone());
            current = right;
        }
        res.push(current.clone());
        res
    }

    /// Length of every match, if all matches have the same length.
    pub fn fixed_length(&self) -> Option<u32> {
        match &self.0.kind {
            NodeKind::Singleton(_) => Some(1),
            NodeKind::Loop {
                body, lower, upper, ..
            } => {
                if lower == upper {
                    body.fixed_length().and_then(|n| n.checked_mul(*lower))
                } else {
                    None
                }
            }
            NodeKind::Concat(..) => self
                .concat_elems()
                .iter()
                .try_fold(0u32, |acc, e| e.fixed_length().and_then(|n| acc.checked_add(n))),
            NodeKind::Or(set) => set.fixed_length(),
            NodeKind::And(_) | NodeKind::Not(_) => None,
            _ => Some(0),
        }
    }

    /// Whether some match can start with a bounded loop whose upper bound exceeds `upper_bound_lowest`.
    pub fn starts_with_loop(&self, upper_bound_lowest: u32) -> bool {
        let mut current = self;
        loop {
            match &current.0.kind {
                NodeKind::Loop { upper, .. } => return *upper != INFINITE && *upper > upper_bound_lowest,
                NodeKind::Concat(left, right) => {
                    if left.starts_with_loop(upper_bound_lowest) {
                        return true;
                    }
                    if !left.is_nullable() {
                        return false;
                    }
                    current = right;
                }
                NodeKind::Or(set) => return set.iter().any(|e| e.starts_with_loop(upper_bound_lowest)),
                _ => return false,
            }
        }
    }

    /// Length recorded by a watchdog, or the longest one among disjuncts.
    pub fn watchdog(&self) -> Option<u32> {
        match &self.0.kind {
            NodeKind::WatchDog(length) => Some(*length),
            NodeKind::Or(set) => set.watchdog(),
            _ => None,
        }
    }

    /// Whether the empty word matches in `context`.
    pub fn is_nullable_for(&self, context: Context) -> bool {
        let info = self.0.info;
        if !info.starts_with_some_anchor() {
            return info.is_nullable();
        }
        if !info.can_be_nullable() {
            return false;
        }

        let slot = &self.0.nullability[context.index()];
        match slot.load(Ordering::Relaxed) {
            NULLABLE => return true,
            NOT_NULLABLE => return false,
            _ => {}
        }

        let prev = context.prev();
        let next = context.next();
        let res = match &self.0.kind {
            NodeKind::Loop { body, lower, .. } => *lower == 0 || body.is_nullable_for(context),
            NodeKind::Concat(..) => self.concat_elems().iter().all(|e| e.is_nullable_for(context)),
            NodeKind::Or(set) | NodeKind::And(set) => set.is_nullable_for(context),
            NodeKind::Not(inner) => !inner.is_nullable_for(context),
            NodeKind::StartAnchor => prev == CharKind::StartStop,
            NodeKind::EndAnchor => next == CharKind::StartStop,
            // Either bit may be set, both for the first or last `\n`.
            NodeKind::BolAnchor => prev.is_start_stop() || prev.is_newline(),
            NodeKind::EolAnchor => next.is_start_stop() || next.is_newline(),
            NodeKind::WbAnchor => prev.is_word_letter() != next.is_word_letter(),
            NodeKind::NwbAnchor => prev.is_word_letter() == next.is_word_letter(),
            NodeKind::EndAnchorZ => next.is_start_stop(),
            NodeKind::EndAnchorZRev => prev.is_start_stop(),
            _ => info.is_nullable(),
        };

        // Racing writers store the same value.
        slot.store(if res { NULLABLE } else { NOT_NULLABLE }, Ordering::Relaxed);
        res
    }
}

impl<S: PartialEq> PartialEq for Node<S> {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (&self.0.kind, &other.0.kind) {
            (NodeKind::Or(a), NodeKind::Or(b)) => {
                // Two distinct interned disjunctions are never equal.
                if self.is_internalized() && other.is_internalized() {
                    return false;
                }
                self.0.hash == other.0.hash && self.0.info == other.0.info && a == b
            }
            _ => false,
        }
    }
}

impl<S: Eq> Eq for Node<S> {}

impl<S> Hash for Node<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl<S: Debug> Debug for Node<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.0.kind)
            .field("info", &self.0.info)
            .finish()
    }
}

/// Canonical set of alternatives of a disjunction or conjunction.
///
/// Elements are distinct and ordered by structural hash, so equal sets
/// iterate in the same order.
#[derive(Clone)]
pub struct NodeSet<S> {
    kind: SetKind,
    elems: Arc<[Node<S>]>,
    watchdog: Option<u32>,
    hash: u64,
}

impl<S: Hash + PartialEq> NodeSet<S> {
    /// Set of the distinct `elems`; no flattening or absorption happens here.
    pub(crate) fn new(kind: SetKind, elems: Vec<Node<S>>) -> Self {
        let mut distinct: Vec<Node<S>> = Vec::with_capacity(elems.len());
        for e in elems {
            if !distinct.contains(&e) {
                distinct.push(e);
            }
        }
        distinct.sort_by_key(|e| e.0.hash);

        let watchdog = match kind {
            SetKind::Or => distinct
                .iter()
                .filter_map(|e| match e.kind() {
                    NodeKind::WatchDog(length) => Some(*length),
                    _ => None,
                })
                .max(),
            // Undefined for conjunctions.
            SetKind::And => None,
        };

        // Order independent, so hash ties do not matter.
        let hash = distinct
            .iter()
            .fold(kind as u64 + 1, |acc, e| acc.wrapping_add(e.0.hash.rotate_left(7)));

        Self {
            kind,
            elems: distinct.into(),
            watchdog,
            hash,
        }
    }
}

impl<S> NodeSet<S> {
    pub fn kind(&self) -> SetKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// The empty disjunction.
    pub fn is_nothing(&self) -> bool {
        self.kind == SetKind::Or && self.elems.is_empty()
    }

    /// The empty conjunction.
    pub fn is_everything(&self) -> bool {
        self.kind == SetKind::And && self.elems.is_empty()
    }

    pub fn singleton(&self) -> Option<&Node<S>> {
        match &*self.elems {
            [single] => Some(single),
            _ => None,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node<S>> {
        self.elems.iter()
    }

    pub fn watchdog(&self) -> Option<u32> {
        self.watchdog
    }

    pub fn is_nullable_for(&self, context: Context) -> bool {
        match self.kind {
            SetKind::Or => self.elems.iter().any(|e| e.is_nullable_for(context)),
            SetKind::And => self.elems.iter().all(|e| e.is_nullable_for(context)),
        }
    }

    /// Common fixed length of all elements.
    pub fn fixed_length(&self) -> Option<u32> {
        let mut length = None;
        for e in self.elems.iter() {
            let n = e.fixed_length()?;
            match length {
                None => length = Some(n),
                Some(m) if m != n => return None,
                Some(_) => {}
            }
        }
        length
    }
}

impl<'a, S> IntoIterator for &'a NodeSet<S> {
    type Item = &'a Node<S>;
    type IntoIter = std::slice::Iter<'a, Node<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.elems.iter()
    }
}

impl<S: PartialEq> PartialEq for NodeSet<S> {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind || self.hash != other.hash || self.elems.len() != other.elems.len() {
            return false;
        }
        if Arc::ptr_eq(&self.elems, &other.elems) {
            return true;
        }
        self.elems.iter().all(|e| other.elems.contains(e))
    }
}

impl<S: Eq> Eq for NodeSet<S> {}

impl<S> Hash for NodeSet<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl<S: Debug> Debug for NodeSet<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSet")
            .field("kind", &self.kind)
            .field("elems", &self.elems)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::info::InfoFlags;

    fn leaf(c: u32) -> Node<u32> {
        let info = RegexInfo::mk(InfoFlags {
            contains_some_character: true,
            ..Default::default()
        });
        Node::new(NodeKind::Singleton(c), info)
    }

    fn epsilon() -> Node<u32> {
        let info = RegexInfo::mk(InfoFlags {
            is_always_nullable: true,
            can_be_nullable: true,
            ..Default::default()
        });
        Node::new(NodeKind::Epsilon, info)
    }

    #[test]
    fn test_set_is_canonical() {
        let a = leaf(1);
        let b = leaf(2);
        let s1 = NodeSet::new(SetKind::Or, vec![a.clone(), b.clone(), a.clone()]);
        let s2 = NodeSet::new(SetKind::Or, vec![b.clone(), a.clone()]);
        assert_eq!(s1.len(), 2);
        assert_eq!(s1, s2);
        assert!(s1.iter().zip(s2.iter()).all(|(x, y)| x.ptr_eq(y)));

        let s3 = NodeSet::new(SetKind::And, vec![a, b]);
        assert_ne!(s1, s3);
    }

    #[test]
    fn test_or_nodes_compare_structurally() {
        let a = leaf(1);
        let b = leaf(2);
        let info = RegexInfo::or([a.info(), b.info()]);
        let x = Node::new(NodeKind::Or(NodeSet::new(SetKind::Or, vec![a.clone(), b.clone()])), info);
        let y = Node::new(NodeKind::Or(NodeSet::new(SetKind::Or, vec![b, a])), info);
        assert!(!x.ptr_eq(&y));
        assert_eq!(x, y);

        x.mark_internalized();
        y.mark_internalized();
        assert_ne!(x, y);
    }

    #[test]
    fn test_fixed_length() {
        let a = leaf(1);
        let info = RegexInfo::concat(a.info(), a.info());
        let aa = Node::new(NodeKind::Concat(a.clone(), a.clone()), info);
        assert_eq!(aa.fixed_length(), Some(2));
        assert_eq!(aa.concat_elems().len(), 2);

        let looped = Node::new(
            NodeKind::Loop {
                body: aa.clone(),
                lower: 3,
                upper: 3,
                lazy: false,
            },
            RegexInfo::looped(aa.info(), 3, false),
        );
        assert_eq!(looped.fixed_length(), Some(6));
        assert!(looped.starts_with_loop(1));

        let star = Node::new(
            NodeKind::Loop {
                body: a.clone(),
                lower: 0,
                upper: INFINITE,
                lazy: false,
            },
            RegexInfo::looped(a.info(), 0, false),
        );
        assert!(star.is_star());
        assert_eq!(star.fixed_length(), None);
        assert!(!star.starts_with_loop(1));
        assert_eq!(epsilon().fixed_length(), Some(0));
    }

    #[test]
    fn test_watchdog_of_disjunction() {
        let info = RegexInfo::mk(InfoFlags {
            is_always_nullable: true,
            can_be_nullable: true,
            ..Default::default()
        });
        let w2 = Node::new(NodeKind::WatchDog(2), info);
        let w3 = Node::new(NodeKind::WatchDog(3), info);
        let set = NodeSet::new(SetKind::Or, vec![w2.clone(), w3, leaf(1)]);
        assert_eq!(set.watchdog(), Some(3));
        assert_eq!(w2.watchdog(), Some(2));
        assert_eq!(NodeSet::new(SetKind::And, vec![w2]).watchdog(), None);
    }

    #[test]
    fn test_anchor_nullability() {
        let info = RegexInfo::mk(InfoFlags {
            starts_with_boundary_anchor: true,
            can_be_nullable: true,
            contains_some_anchor: true,
            ..Default::default()
        });
        let wb = Node::<u32>::new(NodeKind::WbAnchor, info);
        let nwb = Node::<u32>::new(NodeKind::NwbAnchor, info);
        let across = Context::new(CharKind::WordLetter, CharKind::General);
        let inside = Context::new(CharKind::WordLetter, CharKind::WordLetter);
        assert!(wb.is_nullable_for(across));
        assert!(!wb.is_nullable_for(inside));
        assert!(nwb.is_nullable_for(inside));
        assert!(!nwb.is_nullable_for(across));
        // Memoized answers agree.
        assert!(wb.is_nullable_for(across));
        assert!(!leaf(7).is_nullable_for(across));
        assert!(epsilon().is_nullable_for(inside));
    }
}
