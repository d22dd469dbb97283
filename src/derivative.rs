//! Derivatives and the structural queries used to drive them.

use std::collections::BTreeSet;

use log::debug;

use crate::algebra::CharAlgebra;
use crate::ast::Anchor;
use crate::builder::SymbolicRegexBuilder;
use crate::char_kind::{CharKind, Context};
use crate::node::{Node, NodeKind, INFINITE};

/// Longest prefix reported by [`SymbolicRegexBuilder::prefix`].
pub const MAX_PREFIX_LENGTH: usize = 1000;

impl<A: CharAlgebra> SymbolicRegexBuilder<A> {
    /// Derivative of `node` with respect to `elem`, a minterm of the predicates
    /// of the whole regex or a single character, in the character context `context`.
    pub fn derivative(&self, elem: A::Set, node: &Node<A::Set>, context: Context) -> Node<A::Set> {
        if self.is_dot_star(node) || self.is_nothing(node) {
            return node.clone();
        }

        match node.kind() {
            NodeKind::Singleton(set) => {
                if self.solver().is_satisfiable(self.solver().and(elem, *set)) {
                    self.epsilon()
                } else {
                    self.nothing()
                }
            }
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            } => {
                // d(a, R*) = d(a, R)R*
                let step = self.derivative(elem, body, context);
                if self.is_nothing(&step) || *upper == 0 {
                    return self.nothing();
                }
                if node.is_star() {
                    return self.mk_concat(step, node.clone());
                }
                let rest = if node.is_plus() {
                    self.repeat(body.clone(), *lazy, 0, INFINITE)
                } else {
                    let upper = if *upper == INFINITE { INFINITE } else { *upper - 1 };
                    self.repeat(body.clone(), *lazy, lower.saturating_sub(1), upper)
                };
                self.mk_concat(step, rest)
            }
            NodeKind::Concat(..) => {
                // d(a, AB) = d(a, A)B | (if A is nullable then d(a, B))
                let mut terms = Vec::new();
                let mut cur = node.clone();
                loop {
                    let NodeKind::Concat(left, right) = cur.kind() else {
                        terms.push(self.derivative(elem, &cur, context));
                        break;
                    };
                    let left_d = self.derivative(elem, left, context);
                    let first = match left_d.kind() {
                        NodeKind::Or(set) if self.config().antimirov => {
                            let alts: Vec<_> = set.iter().map(|d| self.mk_concat(d.clone(), right.clone())).collect();
                            self.mk_or(&alts)
                        }
                        _ => self.mk_concat(left_d, right.clone()),
                    };
                    terms.push(first);
                    if !left.is_nullable_for(context) {
                        break;
                    }
                    let next = right.clone();
                    cur = next;
                }
                let mut res = terms.pop().unwrap_or_else(|| self.nothing());
                while let Some(term) = terms.pop() {
                    res = self.mk_or2(term, res);
                }
                res
            }
            NodeKind::Or(set) | NodeKind::And(set) => {
                let derivs = set.iter().map(|e| self.derivative(elem, e, context));
                self.mk_set(self.create_multi(derivs, set.kind()))
            }
            NodeKind::Not(inner) => self.mk_not(self.derivative(elem, inner, context)),
            _ => self.nothing(),
        }
    }

    /// Union of the characters that make progress in `node`.
    pub fn start_set(&self, node: &Node<A::Set>) -> A::Set {
        *node.start_set_cell().get_or_init(|| {
            let solver = self.solver();
            match node.kind() {
                NodeKind::Singleton(set) => *set,
                NodeKind::Loop { body, .. } => self.start_set(body),
                // The right side is not inspected.
                NodeKind::Concat(left, _) if left.can_be_nullable() => solver.full(),
                NodeKind::Concat(left, _) => self.start_set(left),
                NodeKind::Or(set) => solver.or_all(set.iter().map(|e| self.start_set(e))),
                NodeKind::And(set) => solver.and_all(set.iter().map(|e| self.start_set(e))),
                NodeKind::Not(_) => solver.full(),
                _ => solver.empty(),
            }
        })
    }

    /// Drops leading anchors that cannot hold after a character of kind `prev`.
    ///
    /// `cont_wl` and `cont_nwl` tell whether a word letter, respectively a
    /// non-word letter, may follow.
    pub fn prune_anchors(&self, node: &Node<A::Set>, prev: CharKind, cont_wl: bool, cont_nwl: bool) -> Node<A::Set> {
        if !node.info().starts_with_some_anchor() {
            return node.clone();
        }

        match node.kind() {
            NodeKind::StartAnchor if prev != CharKind::StartStop => self.nothing(),
            NodeKind::EndAnchorZRev if !prev.is_start_stop() => self.nothing(),
            NodeKind::WbAnchor => {
                let keep = if prev == CharKind::WordLetter { cont_nwl } else { cont_wl };
                if keep {
                    node.clone()
                } else {
                    self.nothing()
                }
            }
            NodeKind::NwbAnchor => {
                let keep = if prev == CharKind::WordLetter { cont_wl } else { cont_nwl };
                if keep {
                    node.clone()
                } else {
                    self.nothing()
                }
            }
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            } => {
                let pruned = self.prune_anchors(body, prev, cont_wl, cont_nwl);
                if pruned.ptr_eq(body) {
                    node.clone()
                } else {
                    self.repeat(pruned, *lazy, *lower, *upper)
                }
            }
            NodeKind::Concat(..) => {
                // The right side is pruned only behind an always nullable left side.
                let mut pairs = Vec::new();
                let mut cur = node.clone();
                let (tail, tail_changed) = loop {
                    let NodeKind::Concat(left, right) = cur.kind() else {
                        let pruned = self.prune_anchors(&cur, prev, cont_wl, cont_nwl);
                        let changed = !pruned.ptr_eq(&cur);
                        break (pruned, changed);
                    };
                    pairs.push((left.clone(), self.prune_anchors(left, prev, cont_wl, cont_nwl)));
                    if !left.is_nullable() {
                        break (right.clone(), false);
                    }
                    let next = right.clone();
                    cur = next;
                };
                if !tail_changed && pairs.iter().all(|(old, new)| old.ptr_eq(new)) {
                    return node.clone();
                }
                pairs
                    .into_iter()
                    .rev()
                    .fold(tail, |acc, (_, left)| self.mk_concat(left, acc))
            }
            NodeKind::Or(set) => {
                let elems: Vec<_> = set.iter().map(|e| self.prune_anchors(e, prev, cont_wl, cont_nwl)).collect();
                self.mk_or(&elems)
            }
            _ => node.clone(),
        }
    }

    /// Distinct predicates of `node`, anchor predicates included, in order.
    ///
    /// A regex without any predicate reports the full set.
    pub fn predicates(&self, node: &Node<A::Set>) -> Vec<A::Set> {
        let mut preds = BTreeSet::new();
        let mut stack = vec![node.clone()];
        while let Some(node) = stack.pop() {
            match node.kind() {
                NodeKind::Singleton(set) => {
                    preds.insert(*set);
                }
                NodeKind::BolAnchor | NodeKind::EolAnchor | NodeKind::EndAnchorZ | NodeKind::EndAnchorZRev => {
                    preds.insert(self.newline_predicate());
                }
                NodeKind::WbAnchor | NodeKind::NwbAnchor => {
                    preds.insert(self.word_letter_predicate());
                }
                NodeKind::Loop { body, .. } => stack.push(body.clone()),
                NodeKind::Concat(left, right) => {
                    stack.push(right.clone());
                    stack.push(left.clone());
                }
                NodeKind::Or(set) | NodeKind::And(set) => stack.extend(set.iter().cloned()),
                NodeKind::Not(inner) => stack.push(inner.clone()),
                _ => {}
            }
        }
        if preds.is_empty() {
            preds.insert(self.solver().full());
        }
        preds.into_iter().collect()
    }

    /// Sorted minterms of the predicates of `node`.
    pub fn minterms(&self, node: &Node<A::Set>) -> Vec<A::Set> {
        let preds = self.predicates(node);
        let mut minterms: Vec<_> = self.solver().generate_minterms(&preds).into_iter().map(|m| m.1).collect();
        minterms.sort();
        debug!("minterms: {} predicates => {} minterms", preds.len(), minterms.len());
        minterms
    }

    /// Regex matching the reversals of the strings matched by `node`.
    pub fn reverse(&self, node: &Node<A::Set>) -> Node<A::Set> {
        match node.kind() {
            NodeKind::WatchDog(_) => self.epsilon(),
            NodeKind::StartAnchor => self.mk_anchor(Anchor::End),
            NodeKind::EndAnchor => self.mk_anchor(Anchor::Start),
            NodeKind::BolAnchor => self.mk_anchor(Anchor::Eol),
            NodeKind::EolAnchor => self.mk_anchor(Anchor::Bol),
            NodeKind::EndAnchorZ => self.mk_anchor(Anchor::EndZRev),
            NodeKind::EndAnchorZRev => self.mk_anchor(Anchor::EndZ),
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            } => self.repeat(self.reverse(body), *lazy, *lower, *upper),
            NodeKind::Concat(..) => node
                .concat_elems()
                .iter()
                .fold(self.epsilon(), |acc, e| self.mk_concat(self.reverse(e), acc)),
            NodeKind::Or(set) | NodeKind::And(set) => {
                let elems = set.iter().map(|e| self.reverse(e));
                self.mk_set(self.create_multi(elems, set.kind()))
            }
            NodeKind::Not(inner) => self.mk_not(self.reverse(inner)),
            _ => node.clone(),
        }
    }

    /// `node` with every predicate intersected with `pred`.
    pub fn restrict(&self, node: &Node<A::Set>, pred: A::Set) -> Node<A::Set> {
        match node.kind() {
            NodeKind::Singleton(set) => self.mk_singleton(self.solver().and(*set, pred)),
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            } => self.repeat(self.restrict(body, pred), *lazy, *lower, *upper),
            NodeKind::Concat(..) => node
                .concat_elems()
                .iter()
                .rev()
                .fold(self.epsilon(), |acc, e| self.mk_concat(self.restrict(e, pred), acc)),
            NodeKind::Or(set) | NodeKind::And(set) => {
                let elems = set.iter().map(|e| self.restrict(e, pred));
                self.mk_set(self.create_multi(elems, set.kind()))
            }
            NodeKind::Not(inner) => self.mk_not(self.restrict(inner, pred)),
            _ => node.clone(),
        }
    }

    /// The same regex in the builder `target`, predicates mapped by `f`.
    pub fn transform<B, F>(&self, node: &Node<A::Set>, target: &SymbolicRegexBuilder<B>, f: &F) -> Node<B::Set>
    where
        B: CharAlgebra,
        F: Fn(A::Set) -> B::Set,
    {
        match node.kind() {
            NodeKind::Epsilon => target.epsilon(),
            NodeKind::WatchDog(length) => target.mk_watchdog(*length),
            NodeKind::StartAnchor => target.mk_anchor(Anchor::Start),
            NodeKind::EndAnchor => target.mk_anchor(Anchor::End),
            NodeKind::EndAnchorZ => target.mk_anchor(Anchor::EndZ),
            NodeKind::EndAnchorZRev => target.mk_anchor(Anchor::EndZRev),
            NodeKind::BolAnchor => target.mk_anchor(Anchor::Bol),
            NodeKind::EolAnchor => target.mk_anchor(Anchor::Eol),
            NodeKind::WbAnchor => target.mk_anchor(Anchor::WordBoundary),
            NodeKind::NwbAnchor => target.mk_anchor(Anchor::NonWordBoundary),
            NodeKind::Singleton(set) => target.mk_singleton(f(*set)),
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            } => target.repeat(self.transform(body, target, f), *lazy, *lower, *upper),
            NodeKind::Concat(..) => node
                .concat_elems()
                .iter()
                .rev()
                .fold(target.epsilon(), |acc, e| target.mk_concat(self.transform(e, target, f), acc)),
            NodeKind::Or(set) | NodeKind::And(set) => {
                let elems = set.iter().map(|e| self.transform(e, target, f));
                target.mk_set(target.create_multi(elems, set.kind()))
            }
            NodeKind::Not(inner) => target.mk_not(self.transform(inner, target, f)),
        }
    }

    /// Predicates every match of `node` starts with, at most [`MAX_PREFIX_LENGTH`] of them.
    pub fn prefix(&self, node: &Node<A::Set>) -> Vec<A::Set> {
        self.prefix_bounded(node, MAX_PREFIX_LENGTH)
    }

    fn prefix_bounded(&self, node: &Node<A::Set>, bound: usize) -> Vec<A::Set> {
        let mut pref = Vec::new();
        let mut cur = node.clone();
        while pref.len() < bound {
            match cur.kind() {
                NodeKind::Singleton(set) => {
                    pref.push(*set);
                    break;
                }
                NodeKind::Concat(left, right) => {
                    let NodeKind::Singleton(set) = left.kind() else {
                        break;
                    };
                    pref.push(*set);
                    let next = right.clone();
                    cur = next;
                }
                NodeKind::Or(set) | NodeKind::And(set) => {
                    let bound = bound - pref.len();
                    let mut elems = set.iter();
                    let mut common = match elems.next() {
                        Some(e) => self.prefix_bounded(e, bound),
                        None => Vec::new(),
                    };
                    for e in elems {
                        if common.is_empty() {
                            break;
                        }
                        let p = self.prefix_bounded(e, bound);
                        let n = common.iter().zip(&p).take_while(|(x, y)| x == y).count();
                        common.truncate(n);
                    }
                    pref.extend(common);
                    break;
                }
                _ => break,
            }
        }
        pref
    }

    /// The literal text every match of `node` starts with.
    pub fn fixed_prefix(&self, node: &Node<A::Set>) -> String {
        let solver = self.solver().solver();
        let units: Vec<u16> = self
            .prefix(node)
            .into_iter()
            .map(|p| self.solver().to_char_set(p))
            .take_while(|&set| solver.is_singleton(set))
            .filter_map(|set| solver.to_ranges(set).first().map(|r| r.0))
            .collect();
        String::from_utf16_lossy(&units)
    }
}
