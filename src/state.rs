//! Lazily derived automaton states.
//!
//! A state is a regex paired with the kind of the character that led to it.
//! States are numbered in creation order; the numbers index a transition
//! table filled on demand when the algebra comes with a fixed partition.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use log::{debug, info};

use crate::algebra::CharAlgebra;
use crate::builder::SymbolicRegexBuilder;
use crate::char_kind::{CharKind, Context};
use crate::node::{Node, NodeKind};
use crate::utils::{read, write};

#[derive(Debug)]
pub struct DfaState<S> {
    id: usize,
    node: Node<S>,
    prev_kind: CharKind,
}

impl<S> DfaState<S> {
    pub fn id(&self) -> usize {
        self.id
    }
    pub fn node(&self) -> &Node<S> {
        &self.node
    }
    pub fn prev_kind(&self) -> CharKind {
        self.prev_kind
    }
}

/// A numbered state, or a disjunction of states kept apart in Antimirov mode.
#[derive(Debug)]
pub enum MatchingState<S> {
    Cached(Arc<DfaState<S>>),
    Ephemeral { node: Node<S>, prev_kind: CharKind },
}

impl<S> Clone for MatchingState<S> {
    fn clone(&self) -> Self {
        match self {
            MatchingState::Cached(state) => MatchingState::Cached(state.clone()),
            MatchingState::Ephemeral { node, prev_kind } => MatchingState::Ephemeral {
                node: node.clone(),
                prev_kind: *prev_kind,
            },
        }
    }
}

impl<S> MatchingState<S> {
    pub fn node(&self) -> &Node<S> {
        match self {
            MatchingState::Cached(state) => &state.node,
            MatchingState::Ephemeral { node, .. } => node,
        }
    }

    pub fn prev_kind(&self) -> CharKind {
        match self {
            MatchingState::Cached(state) => state.prev_kind,
            MatchingState::Ephemeral { prev_kind, .. } => *prev_kind,
        }
    }

    pub fn id(&self) -> Option<usize> {
        match self {
            MatchingState::Cached(state) => Some(state.id),
            MatchingState::Ephemeral { .. } => None,
        }
    }

    /// Whether the input read so far is accepted when followed by a character of kind `next`.
    pub fn is_nullable(&self, next: CharKind) -> bool {
        self.node().is_nullable_for(Context::new(self.prev_kind(), next))
    }

    pub fn watchdog(&self) -> Option<u32> {
        self.node().watchdog()
    }

    /// No input leads out of this state to acceptance.
    pub fn is_deadend(&self) -> bool {
        matches!(self.node().kind(), NodeKind::Singleton(_)) && !self.node().info().contains_some_character()
    }

    pub fn is_lazy(&self) -> bool {
        self.node().is_lazy()
    }
}

impl<S: PartialEq> PartialEq for MatchingState<S> {
    fn eq(&self, other: &Self) -> bool {
        self.prev_kind() == other.prev_kind() && self.node() == other.node()
    }
}

pub(crate) struct StateStore<S> {
    map: HashMap<(Node<S>, CharKind), Arc<DfaState<S>>>,
    states: Vec<Arc<DfaState<S>>>,
    /// Successor ids, `id << stride_bits | atom`; the last atom slot is the final `\n`.
    delta: Vec<Option<usize>>,
    stride_bits: Option<u32>,
    capacity: usize,
    growth: usize,
}

impl<S> StateStore<S> {
    /// Store for `atom_count` atoms, or without a transition table.
    pub(crate) fn new(atom_count: Option<usize>, growth: usize) -> Self {
        // One more slot than atoms, for the final `\n`.
        let stride_bits = atom_count.map(|n| usize::BITS - n.leading_zeros());
        let growth = growth.max(1);
        let delta = match stride_bits {
            Some(bits) => vec![None; growth << bits],
            None => Vec::new(),
        };
        Self {
            map: HashMap::new(),
            states: Vec::with_capacity(growth),
            delta,
            stride_bits,
            capacity: growth,
            growth,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn get_by_id(&self, id: usize) -> Option<Arc<DfaState<S>>> {
        self.states.get(id).cloned()
    }

    fn slot(&self, id: usize, atom: usize) -> Option<usize> {
        self.stride_bits.map(|bits| id << bits | atom)
    }

    fn delta(&self, id: usize, atom: usize) -> Option<usize> {
        self.slot(id, atom).and_then(|slot| self.delta.get(slot).copied().flatten())
    }

    fn set_delta(&mut self, id: usize, atom: usize, next: usize) {
        if let Some(slot) = self.slot(id, atom) {
            if let Some(entry) = self.delta.get_mut(slot) {
                *entry = Some(next);
            }
        }
    }
}

impl<S: Eq + std::hash::Hash> StateStore<S> {
    fn get(&self, node: &Node<S>, prev: CharKind) -> Option<Arc<DfaState<S>>> {
        self.map.get(&(node.clone(), prev)).cloned()
    }

    fn insert(&mut self, node: Node<S>, prev: CharKind) -> Arc<DfaState<S>> {
        if let Some(state) = self.get(&node, prev) {
            return state;
        }

        let id = self.states.len();
        if id == self.capacity {
            self.capacity += self.growth;
            if let Some(bits) = self.stride_bits {
                self.delta.resize(self.capacity << bits, None);
            }
            info!("state table grown to {} states", self.capacity);
        }

        let state = Arc::new(DfaState {
            id,
            node: node.clone(),
            prev_kind: prev,
        });
        debug!("new state {} (prev = {:?}, depth = {})", id, prev, node.depth());
        self.states.push(state.clone());
        self.map.insert((node, prev), state.clone());
        state
    }
}

impl<S> Debug for StateStore<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("states", &self.states.len())
            .field("capacity", &self.capacity)
            .field("stride_bits", &self.stride_bits)
            .finish()
    }
}

impl<A: CharAlgebra> SymbolicRegexBuilder<A> {
    /// The state for `node` reached after a character of kind `prev`.
    ///
    /// Anchors that cannot hold are pruned first, so regexes that differ only
    /// in such anchors share a state.
    pub fn mk_state(&self, node: &Node<A::Set>, prev: CharKind) -> MatchingState<A::Set> {
        let solver = self.solver();
        let wl = self.word_letter_predicate();
        let start = self.start_set(node);
        let cont_wl = node.can_be_nullable() || solver.is_satisfiable(solver.and(wl, start));
        let cont_nwl = node.can_be_nullable() || solver.is_satisfiable(solver.and(solver.not(wl), start));
        let pruned = self.prune_anchors(node, prev, cont_wl, cont_nwl);

        if let Some(state) = read(&self.states).get(&pruned, prev) {
            return MatchingState::Cached(state);
        }
        if self.config().antimirov && pruned.is_or() {
            return MatchingState::Ephemeral {
                node: pruned,
                prev_kind: prev,
            };
        }
        MatchingState::Cached(write(&self.states).insert(pruned, prev))
    }

    /// Number of numbered states.
    pub fn state_count(&self) -> usize {
        read(&self.states).len()
    }

    pub fn state(&self, id: usize) -> Option<Arc<DfaState<A::Set>>> {
        read(&self.states).get_by_id(id)
    }

    fn next_kind(&self, prev: CharKind, atom: A::Set) -> CharKind {
        let solver = self.solver();
        let newline = self.newline_predicate();
        if solver.is_satisfiable(newline) && atom == newline {
            if prev == CharKind::StartStop {
                CharKind::NewlineS
            } else {
                CharKind::Newline
            }
        } else if solver.is_satisfiable(solver.and(self.word_letter_predicate(), atom)) {
            CharKind::WordLetter
        } else {
            CharKind::General
        }
    }

    fn step(&self, state: &MatchingState<A::Set>, atom: A::Set, next: CharKind) -> MatchingState<A::Set> {
        let context = Context::new(state.prev_kind(), next);
        let deriv = self.derivative(atom, state.node(), context);
        self.mk_state(&deriv, next)
    }

    /// Successor of `state` on the atom `atom`.
    pub fn next_state(&self, state: &MatchingState<A::Set>, atom: A::Set) -> MatchingState<A::Set> {
        let next = self.next_kind(state.prev_kind(), atom);
        self.step(state, atom, next)
    }

    /// Successor of `state` on the `\n` that ends the input.
    pub fn next_final_newline(&self, state: &MatchingState<A::Set>) -> MatchingState<A::Set> {
        self.step(state, self.newline_predicate(), CharKind::NewlineS)
    }

    /// Successor of `state` on the `index`-th atom of the partition, or on the
    /// final `\n` when `index` equals the number of atoms.
    ///
    /// Numbered successors are remembered in the transition table.
    pub fn transition(&self, state: &MatchingState<A::Set>, index: usize) -> Option<MatchingState<A::Set>> {
        let atoms = self.atoms()?;
        let final_newline = index == atoms.len();
        if index > atoms.len() {
            return None;
        }

        if let MatchingState::Cached(s) = state {
            let store = read(&self.states);
            if let Some(next) = store.delta(s.id, index).and_then(|id| store.get_by_id(id)) {
                return Some(MatchingState::Cached(next));
            }
        }

        let next = if final_newline {
            self.next_final_newline(state)
        } else {
            self.next_state(state, atoms[index])
        };

        if let (MatchingState::Cached(s), Some(id)) = (state, next.id()) {
            write(&self.states).set_delta(s.id, index, id);
        }
        Some(next)
    }

    /// Anchored matcher for `root`.
    pub fn matcher(&self, root: Node<A::Set>) -> Matcher<'_, A> {
        Matcher::new(self, root)
    }
}

/// Number of code units classified by table.
const ASCII_COUNT: u16 = 128;

/// Runs the lazily built automaton of one regex over whole inputs.
pub struct Matcher<'a, A: CharAlgebra> {
    builder: &'a SymbolicRegexBuilder<A>,
    root: Node<A::Set>,
    atoms: Vec<A::Set>,
    ascii: Vec<Option<usize>>,
    /// Atoms are the partition of the algebra, so the transition table applies.
    use_delta: bool,
}

impl<'a, A: CharAlgebra> Matcher<'a, A> {
    fn new(builder: &'a SymbolicRegexBuilder<A>, root: Node<A::Set>) -> Self {
        let (atoms, use_delta) = match builder.atoms() {
            Some(atoms) => (atoms.to_vec(), true),
            None => (builder.minterms(&root), false),
        };
        debug!("Matcher::new(atoms = {}, use_delta = {})", atoms.len(), use_delta);
        let solver = builder.solver();
        let ascii = (0..ASCII_COUNT).map(|c| solver.classify(&atoms, c)).collect();
        Self {
            builder,
            root,
            atoms,
            ascii,
            use_delta,
        }
    }

    pub fn root(&self) -> &Node<A::Set> {
        &self.root
    }

    pub fn atoms(&self) -> &[A::Set] {
        &self.atoms
    }

    fn classify(&self, c: u16) -> Option<usize> {
        match self.ascii.get(c as usize) {
            Some(&id) => id,
            None => self.builder.solver().classify(&self.atoms, c),
        }
    }

    fn advance(&self, state: &MatchingState<A::Set>, index: usize) -> MatchingState<A::Set> {
        if self.use_delta {
            if let Some(next) = self.builder.transition(state, index) {
                return next;
            }
        }
        if index == self.atoms.len() {
            self.builder.next_final_newline(state)
        } else {
            self.builder.next_state(state, self.atoms[index])
        }
    }

    /// Whether the whole of `input` matches.
    pub fn accepts(&self, input: &str) -> bool {
        let units: Vec<u16> = input.encode_utf16().collect();
        let track_newline = self.builder.solver().is_satisfiable(self.builder.newline_predicate());

        let mut state = self.builder.mk_state(&self.root, CharKind::StartStop);
        for (i, &c) in units.iter().enumerate() {
            if state.is_deadend() {
                return false;
            }
            let index = if track_newline && c == b'\n' as u16 && i + 1 == units.len() {
                self.atoms.len()
            } else {
                match self.classify(c) {
                    Some(index) => index,
                    None => return false,
                }
            };
            state = self.advance(&state, index);
        }
        state.is_nullable(CharKind::StartStop)
    }
}

impl<'a, A: CharAlgebra> Debug for Matcher<'a, A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("root", &self.root)
            .field("atoms", &self.atoms.len())
            .field("use_delta", &self.use_delta)
            .finish()
    }
}
