//! Construction of canonical symbolic regexes.
//!
//! Every `mk_*` method applies the algebraic identities of its operator
//! before the node is interned, so the node cache never holds a shape that
//! simplifies further.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use log::debug;

use crate::algebra::CharAlgebra;
use crate::ast::Anchor;
use crate::error::{Error, Result};
use crate::info::{InfoFlags, RegexInfo};
use crate::node::{Node, NodeKind, NodeSet, SetKind, INFINITE};
use crate::state::StateStore;
use crate::transition::{TransitionKind, TransitionRegex};
use crate::utils::lock;

#[derive(Debug, Copy, Clone)]
pub struct BuilderConfig {
    /// Keep disjunctive derivatives apart as separate, uncached states.
    pub antimirov: bool,
    /// Deepest node nesting accepted from a pattern or a serialized regex.
    pub max_depth: usize,
    /// Number of state slots added whenever the state table is full.
    pub state_growth: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            antimirov: false,
            max_depth: 1000,
            state_growth: 1024,
        }
    }
}

impl BuilderConfig {
    pub fn with_antimirov(mut self, antimirov: bool) -> Self {
        self.antimirov = antimirov;
        self
    }
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
    pub fn with_state_growth(mut self, state_growth: usize) -> Self {
        self.state_growth = state_growth;
        self
    }
}

type NodeCache<S> = HashMap<NodeKind<S>, Node<S>>;

/// Shares a disjunction that is about to become the child of another node.
fn internalize<S: Copy + Eq + std::hash::Hash>(cache: &mut NodeCache<S>, node: Node<S>) -> Node<S> {
    if !node.is_or() || node.is_internalized() {
        return node;
    }
    if let Some(existing) = cache.get(node.kind()) {
        return existing.clone();
    }
    node.mark_internalized();
    cache.insert(node.kind().clone(), node.clone());
    node
}

fn intern<S: Copy + Eq + std::hash::Hash>(cache: &mut NodeCache<S>, kind: NodeKind<S>, info: RegexInfo) -> Node<S> {
    if let NodeKind::Or(_) = kind {
        // Top-level disjunctions stay distinct, one per derivation path.
        return Node::new(kind, info);
    }

    let kind = match kind {
        NodeKind::Loop {
            body,
            lower,
            upper,
            lazy,
        } => NodeKind::Loop {
            body: internalize(cache, body),
            lower,
            upper,
            lazy,
        },
        NodeKind::Concat(left, right) => NodeKind::Concat(internalize(cache, left), internalize(cache, right)),
        NodeKind::Not(inner) => NodeKind::Not(internalize(cache, inner)),
        kind => kind,
    };

    if let Some(node) = cache.get(&kind) {
        return node.clone();
    }
    let node = Node::new(kind.clone(), info);
    cache.insert(kind, node.clone());
    node
}

fn anchor_info(boundary: bool) -> RegexInfo {
    RegexInfo::mk(InfoFlags {
        starts_with_line_anchor: !boundary,
        starts_with_boundary_anchor: boundary,
        can_be_nullable: true,
        ..Default::default()
    })
}

/// Factory and owner of the symbolic regexes over one character algebra.
///
/// Nodes, transition regexes and matching states are interned here; the
/// builder is meant to be shared between threads behind an [`Arc`].
pub struct SymbolicRegexBuilder<A: CharAlgebra> {
    solver: Arc<A>,
    config: BuilderConfig,
    nodes: Mutex<NodeCache<A::Set>>,
    pub(crate) transitions: Mutex<HashMap<TransitionKind<A::Set>, TransitionRegex<A::Set>>>,
    pub(crate) states: RwLock<StateStore<A::Set>>,
    atoms: Option<Vec<A::Set>>,
    uses_newline: AtomicBool,
    uses_word_letter: AtomicBool,

    pub(crate) epsilon: Node<A::Set>,
    pub(crate) nothing: Node<A::Set>,
    pub(crate) dot: Node<A::Set>,
    pub(crate) dot_star: Node<A::Set>,
    pub(crate) eager_empty_loop: Node<A::Set>,
    pub(crate) start_anchor: Node<A::Set>,
    pub(crate) end_anchor: Node<A::Set>,
    pub(crate) end_anchor_z: Node<A::Set>,
    pub(crate) end_anchor_z_rev: Node<A::Set>,
    pub(crate) bol_anchor: Node<A::Set>,
    pub(crate) eol_anchor: Node<A::Set>,
    pub(crate) wb_anchor: Node<A::Set>,
    pub(crate) nwb_anchor: Node<A::Set>,
}

impl<A: CharAlgebra> SymbolicRegexBuilder<A> {
    pub fn new(solver: Arc<A>) -> Self {
        Self::with_config(solver, BuilderConfig::default())
    }

    pub fn with_config(solver: Arc<A>, config: BuilderConfig) -> Self {
        debug!("SymbolicRegexBuilder::with_config(config = {:?})", config);

        let mut cache = NodeCache::new();
        let always_nullable = RegexInfo::mk(InfoFlags {
            is_always_nullable: true,
            ..Default::default()
        });

        let epsilon = intern(&mut cache, NodeKind::Epsilon, always_nullable);
        let nothing = intern(&mut cache, NodeKind::Singleton(solver.empty()), RegexInfo::mk(InfoFlags::default()));
        let dot = intern(
            &mut cache,
            NodeKind::Singleton(solver.full()),
            RegexInfo::mk(InfoFlags {
                contains_some_character: true,
                ..Default::default()
            }),
        );
        let dot_star = intern(
            &mut cache,
            NodeKind::Loop {
                body: dot.clone(),
                lower: 0,
                upper: INFINITE,
                lazy: false,
            },
            RegexInfo::looped(dot.info(), 0, false),
        );
        let eager_empty_loop = intern(
            &mut cache,
            NodeKind::Loop {
                body: epsilon.clone(),
                lower: 0,
                upper: 0,
                lazy: false,
            },
            RegexInfo::mk(InfoFlags {
                is_always_nullable: true,
                is_lazy: false,
                ..Default::default()
            }),
        );

        let start_anchor = intern(&mut cache, NodeKind::StartAnchor, anchor_info(false));
        let end_anchor = intern(&mut cache, NodeKind::EndAnchor, anchor_info(false));
        let end_anchor_z = intern(&mut cache, NodeKind::EndAnchorZ, anchor_info(false));
        let end_anchor_z_rev = intern(&mut cache, NodeKind::EndAnchorZRev, anchor_info(false));
        let bol_anchor = intern(&mut cache, NodeKind::BolAnchor, anchor_info(false));
        let eol_anchor = intern(&mut cache, NodeKind::EolAnchor, anchor_info(false));
        let wb_anchor = intern(&mut cache, NodeKind::WbAnchor, anchor_info(true));
        let nwb_anchor = intern(&mut cache, NodeKind::NwbAnchor, anchor_info(true));

        let atoms = solver.partition();
        let states = StateStore::new(atoms.as_ref().map(|a| a.len()), config.state_growth);

        Self {
            solver,
            config,
            nodes: Mutex::new(cache),
            transitions: Mutex::new(HashMap::new()),
            states: RwLock::new(states),
            atoms,
            uses_newline: AtomicBool::new(false),
            uses_word_letter: AtomicBool::new(false),
            epsilon,
            nothing,
            dot,
            dot_star,
            eager_empty_loop,
            start_anchor,
            end_anchor,
            end_anchor_z,
            end_anchor_z_rev,
            bol_anchor,
            eol_anchor,
            wb_anchor,
            nwb_anchor,
        }
    }

    pub fn solver(&self) -> &A {
        &self.solver
    }

    pub fn solver_arc(&self) -> Arc<A> {
        self.solver.clone()
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// The fixed alphabet partition of the algebra, if any.
    pub fn atoms(&self) -> Option<&[A::Set]> {
        self.atoms.as_deref()
    }

    /// Number of interned nodes.
    pub fn node_count(&self) -> usize {
        lock(&self.nodes).len()
    }

    fn create(&self, kind: NodeKind<A::Set>, info: RegexInfo) -> Node<A::Set> {
        intern(&mut lock(&self.nodes), kind, info)
    }

    /// Fails when `node` nests deeper than the configured bound.
    pub(crate) fn check_depth(&self, node: Node<A::Set>) -> Result<Node<A::Set>> {
        if node.depth() > self.config.max_depth {
            debug!("check_depth: {} > {}", node.depth(), self.config.max_depth);
            return Err(Error::PatternTooComplex {
                depth: self.config.max_depth,
            });
        }
        Ok(node)
    }

    /// `\n` once a line anchor is in use, empty otherwise.
    pub fn newline_predicate(&self) -> A::Set {
        if self.uses_newline.load(Ordering::Acquire) {
            self.solver.newline()
        } else {
            self.solver.empty()
        }
    }

    /// `\w` once a word-boundary anchor is in use, empty otherwise.
    pub fn word_letter_predicate(&self) -> A::Set {
        if self.uses_word_letter.load(Ordering::Acquire) {
            self.solver.word_letter()
        } else {
            self.solver.empty()
        }
    }

    pub fn epsilon(&self) -> Node<A::Set> {
        self.epsilon.clone()
    }
    pub fn nothing(&self) -> Node<A::Set> {
        self.nothing.clone()
    }
    pub fn dot(&self) -> Node<A::Set> {
        self.dot.clone()
    }
    pub fn dot_star(&self) -> Node<A::Set> {
        self.dot_star.clone()
    }

    pub fn is_nothing(&self, node: &Node<A::Set>) -> bool {
        node.ptr_eq(&self.nothing)
    }
    pub fn is_dot_star(&self, node: &Node<A::Set>) -> bool {
        node.ptr_eq(&self.dot_star)
    }

    /// The anchor node; line and boundary anchors switch on the matching character context.
    pub fn mk_anchor(&self, anchor: Anchor) -> Node<A::Set> {
        match anchor {
            Anchor::Start => self.start_anchor.clone(),
            Anchor::End => self.end_anchor.clone(),
            Anchor::EndZ | Anchor::EndZRev | Anchor::Bol | Anchor::Eol => {
                self.uses_newline.store(true, Ordering::Release);
                match anchor {
                    Anchor::EndZ => self.end_anchor_z.clone(),
                    Anchor::EndZRev => self.end_anchor_z_rev.clone(),
                    Anchor::Bol => self.bol_anchor.clone(),
                    _ => self.eol_anchor.clone(),
                }
            }
            Anchor::WordBoundary | Anchor::NonWordBoundary => {
                self.uses_word_letter.store(true, Ordering::Release);
                if anchor == Anchor::WordBoundary {
                    self.wb_anchor.clone()
                } else {
                    self.nwb_anchor.clone()
                }
            }
        }
    }

    pub fn mk_singleton(&self, set: A::Set) -> Node<A::Set> {
        let info = RegexInfo::mk(InfoFlags {
            contains_some_character: set != self.solver.empty(),
            ..Default::default()
        });
        self.create(NodeKind::Singleton(set), info)
    }

    pub fn mk_watchdog(&self, length: u32) -> Node<A::Set> {
        let info = RegexInfo::mk(InfoFlags {
            is_always_nullable: true,
            ..Default::default()
        });
        self.create(NodeKind::WatchDog(length), info)
    }

    pub fn mk_concat(&self, left: Node<A::Set>, right: Node<A::Set>) -> Node<A::Set> {
        // concat(nothing, R) => nothing, concat(R, nothing) => nothing
        if self.is_nothing(&left) || self.is_nothing(&right) {
            return self.nothing();
        }
        // concat(eps, R) => R
        if left.is_epsilon() {
            return right;
        }
        // concat(R, eps) => R
        if right.is_epsilon() {
            return left;
        }

        // Keep chains right-nested: concat(AB, C) => A(BC).
        let mut concat = right;
        for elem in left.concat_elems().into_iter().rev() {
            let info = RegexInfo::concat(elem.info(), concat.info());
            concat = self.create(NodeKind::Concat(elem, concat), info);
        }
        concat
    }

    /// Concatenation of `regexes`; a top-level sequence with a fixed length ends in a watchdog.
    pub fn mk_concat_all(&self, regexes: &[Node<A::Set>], top_level: bool) -> Node<A::Set> {
        if regexes.is_empty() {
            return self.epsilon();
        }

        let mut res = self.epsilon();
        if top_level {
            let length = regexes
                .iter()
                .try_fold(0u32, |acc, r| r.fixed_length().and_then(|n| acc.checked_add(n)));
            if let Some(length) = length {
                res = self.mk_watchdog(length);
            }
        }

        for r in regexes.iter().rev() {
            if self.is_nothing(r) {
                return self.nothing();
            }
            res = self.mk_concat(r.clone(), res);
        }
        res
    }

    /// One singleton per predicate, in order.
    pub fn mk_sequence(&self, seq: &[A::Set], top_level: bool) -> Node<A::Set> {
        let singletons: Vec<_> = seq.iter().map(|&set| self.mk_singleton(set)).collect();
        self.mk_concat_all(&singletons, top_level)
    }

    /// `body{lower,upper}`, lazy or eager; `upper` may be [`INFINITE`].
    pub fn mk_loop(&self, body: Node<A::Set>, lazy: bool, lower: u32, upper: u32) -> Result<Node<A::Set>> {
        if lower > upper {
            return Err(Error::InvalidArgument(format!(
                "loop lower bound {} exceeds upper bound {}",
                lower, upper
            )));
        }
        Ok(self.repeat(body, lazy, lower, upper))
    }

    pub(crate) fn repeat(&self, body: Node<A::Set>, lazy: bool, lower: u32, upper: u32) -> Node<A::Set> {
        debug_assert!(lower <= upper);
        // R{1,1} => R
        if lower == 1 && upper == 1 {
            return body;
        }
        // R{0,0} => eps, kept apart as an eager marker when eager
        if lower == 0 && upper == 0 {
            return if lazy { self.epsilon() } else { self.eager_empty_loop.clone() };
        }
        // .* stays unique
        if !lazy && lower == 0 && upper == INFINITE {
            if let NodeKind::Singleton(set) = body.kind() {
                if self.solver.are_equivalent(*set, self.solver.full()) {
                    return self.dot_star();
                }
            }
        }
        let info = RegexInfo::looped(body.info(), lower, lazy);
        self.create(
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            },
            info,
        )
    }

    /// Canonical set of `elems`: nested sets of the same kind are flattened,
    /// identities dropped and absorbing elements short-circuit.
    pub fn create_multi(&self, elems: impl IntoIterator<Item = Node<A::Set>>, kind: SetKind) -> NodeSet<A::Set> {
        let mut res = Vec::new();
        for elem in elems {
            if self.is_dot_star(&elem) {
                // or(.*, R) => .*
                if kind == SetKind::Or {
                    return NodeSet::new(SetKind::And, Vec::new());
                }
            } else if self.is_nothing(&elem) {
                // and(nothing, R) => nothing
                if kind == SetKind::And {
                    return NodeSet::new(SetKind::Or, Vec::new());
                }
            } else {
                match elem.kind() {
                    NodeKind::Or(inner) if kind == SetKind::Or => res.extend(inner.iter().cloned()),
                    NodeKind::And(inner) if kind == SetKind::And => res.extend(inner.iter().cloned()),
                    _ => res.push(elem),
                }
            }
        }
        NodeSet::new(kind, res)
    }

    fn mk_collection(&self, set: NodeSet<A::Set>) -> Node<A::Set> {
        if set.is_nothing() {
            return self.nothing();
        }
        if set.is_everything() {
            return self.dot_star();
        }
        if let Some(single) = set.singleton() {
            return single.clone();
        }
        match set.kind() {
            SetKind::Or => {
                let info = RegexInfo::or(set.iter().map(|e| e.info()));
                self.create(NodeKind::Or(set), info)
            }
            SetKind::And => {
                let info = RegexInfo::and(set.iter().map(|e| e.info()));
                self.create(NodeKind::And(set), info)
            }
        }
    }

    pub fn mk_or(&self, regexes: &[Node<A::Set>]) -> Node<A::Set> {
        self.mk_collection(self.create_multi(regexes.iter().cloned(), SetKind::Or))
    }

    pub fn mk_and(&self, regexes: &[Node<A::Set>]) -> Node<A::Set> {
        self.mk_collection(self.create_multi(regexes.iter().cloned(), SetKind::And))
    }

    /// Node of an already canonical set; the kind of the set decides the operator.
    pub fn mk_set(&self, set: NodeSet<A::Set>) -> Node<A::Set> {
        self.mk_collection(set)
    }

    pub fn mk_or2(&self, x: Node<A::Set>, y: Node<A::Set>) -> Node<A::Set> {
        // or(.*, R) => .*
        if self.is_dot_star(&x) || self.is_dot_star(&y) {
            return self.dot_star();
        }
        // or(nothing, R) => R
        if self.is_nothing(&x) {
            return y;
        }
        if self.is_nothing(&y) {
            return x;
        }
        self.mk_or(&[x, y])
    }

    pub fn mk_not(&self, node: Node<A::Set>) -> Node<A::Set> {
        let info = RegexInfo::not(node.info());
        self.create(NodeKind::Not(node), info)
    }
}

impl<A: CharAlgebra + Debug> Debug for SymbolicRegexBuilder<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolicRegexBuilder")
            .field("solver", &self.solver)
            .field("config", &self.config)
            .field("nodes", &self.node_count())
            .field("uses_newline", &self.uses_newline.load(Ordering::Relaxed))
            .field("uses_word_letter", &self.uses_word_letter.load(Ordering::Relaxed))
            .finish()
    }
}
