//! Transition regexes: derivatives as decision trees over character predicates.
//!
//! A transition regex describes the derivative of a regex for every character
//! at once, branching on arbitrary predicates instead of a global partition of
//! the alphabet.

use std::collections::hash_map::DefaultHasher;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use log::debug;

use crate::algebra::CharAlgebra;
use crate::builder::SymbolicRegexBuilder;
use crate::char_kind::Context;
use crate::node::{Node, NodeKind, INFINITE};
use crate::utils::lock;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum TransitionKind<S> {
    Leaf(Node<S>),
    /// `if(test, then, otherwise)`.
    Conditional {
        test: S,
        then: TransitionRegex<S>,
        otherwise: TransitionRegex<S>,
    },
    Union(TransitionRegex<S>, TransitionRegex<S>),
}

struct TransitionData<S> {
    kind: TransitionKind<S>,
    hash: u64,
}

/// Interned transition regex; equal handles are the same tree.
pub struct TransitionRegex<S>(Arc<TransitionData<S>>);

impl<S> Clone for TransitionRegex<S> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<S> TransitionRegex<S> {
    pub fn kind(&self) -> &TransitionKind<S> {
        &self.0.kind
    }

    pub fn leaf(&self) -> Option<&Node<S>> {
        match &self.0.kind {
            TransitionKind::Leaf(node) => Some(node),
            _ => None,
        }
    }
}

impl<S> PartialEq for TransitionRegex<S> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<S> Eq for TransitionRegex<S> {}

impl<S> Hash for TransitionRegex<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl<S: Debug> Debug for TransitionRegex<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0.kind {
            TransitionKind::Leaf(node) => write!(f, "{:?}", node),
            TransitionKind::Conditional { test, then, otherwise } => {
                write!(f, "if({:?},{:?},{:?})", test, then, otherwise)
            }
            TransitionKind::Union(first, second) => write!(f, "{:?}|{:?}", first, second),
        }
    }
}

impl<A: CharAlgebra> SymbolicRegexBuilder<A> {
    fn tr_create(&self, kind: TransitionKind<A::Set>) -> TransitionRegex<A::Set> {
        let mut cache = lock(&self.transitions);
        if let Some(tr) = cache.get(&kind) {
            return tr.clone();
        }
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        let tr = TransitionRegex(Arc::new(TransitionData {
            kind: kind.clone(),
            hash: hasher.finish(),
        }));
        cache.insert(kind, tr.clone());
        tr
    }

    fn tr_is_nothing(&self, tr: &TransitionRegex<A::Set>) -> bool {
        tr.leaf().is_some_and(|node| self.is_nothing(node))
    }

    fn tr_is_dot_star(&self, tr: &TransitionRegex<A::Set>) -> bool {
        tr.leaf().is_some_and(|node| self.is_dot_star(node))
    }

    pub fn tr_leaf(&self, node: Node<A::Set>) -> TransitionRegex<A::Set> {
        self.tr_create(TransitionKind::Leaf(node))
    }

    pub fn tr_if(
        &self,
        test: A::Set,
        then: TransitionRegex<A::Set>,
        otherwise: TransitionRegex<A::Set>,
    ) -> TransitionRegex<A::Set> {
        let solver = self.solver();
        // if(φ, t, t) => t, if(⊤, t, e) => t
        if then == otherwise || solver.are_equivalent(test, solver.full()) {
            return then;
        }
        // if(⊥, t, e) => e
        if !solver.is_satisfiable(test) {
            return otherwise;
        }
        self.tr_create(TransitionKind::Conditional { test, then, otherwise })
    }

    pub fn tr_union(&self, one: TransitionRegex<A::Set>, two: TransitionRegex<A::Set>) -> TransitionRegex<A::Set> {
        if self.tr_is_nothing(&one) || self.tr_is_dot_star(&two) || one == two {
            return two;
        }
        if self.tr_is_nothing(&two) || self.tr_is_dot_star(&one) {
            return one;
        }
        if let (
            TransitionKind::Conditional {
                test: t1,
                then: a1,
                otherwise: b1,
            },
            TransitionKind::Conditional {
                test: t2,
                then: a2,
                otherwise: b2,
            },
        ) = (one.kind(), two.kind())
        {
            // if(φ, a, b) | if(φ, c, d) => if(φ, a|c, b|d)
            if t1 == t2 {
                let then = self.tr_union(a1.clone(), a2.clone());
                let otherwise = self.tr_union(b1.clone(), b2.clone());
                return self.tr_if(*t1, then, otherwise);
            }
            // if(φ, t, []) | if(ψ, t, []) => if(φ|ψ, t, [])
            if self.tr_is_nothing(b1) && self.tr_is_nothing(b2) && a1 == a2 {
                return self.tr_if(self.solver().or(*t1, *t2), a1.clone(), b1.clone());
            }
        }
        self.tr_create(TransitionKind::Union(one, two))
    }

    pub fn tr_intersect(&self, one: TransitionRegex<A::Set>, two: TransitionRegex<A::Set>) -> TransitionRegex<A::Set> {
        if self.tr_is_nothing(&one) || self.tr_is_dot_star(&two) || one == two {
            return one;
        }
        if self.tr_is_nothing(&two) || self.tr_is_dot_star(&one) {
            return two;
        }
        self.tr_intersect_with(&one, &two, self.solver().full())
    }

    /// Intersection of `one` and `two` for the characters in `path`.
    fn tr_intersect_with(
        &self,
        one: &TransitionRegex<A::Set>,
        two: &TransitionRegex<A::Set>,
        path: A::Set,
    ) -> TransitionRegex<A::Set> {
        let solver = self.solver();
        match (one.kind(), two.kind()) {
            (TransitionKind::Conditional { test, then, otherwise }, _) => {
                let then_path = solver.and(path, *test);
                let else_path = solver.and(path, solver.not(*test));
                if !solver.is_satisfiable(then_path) {
                    return self.tr_intersect_with(otherwise, two, else_path);
                }
                if !solver.is_satisfiable(else_path) {
                    return self.tr_intersect_with(then, two, then_path);
                }
                let then = self.tr_intersect_with(then, two, then_path);
                let otherwise = self.tr_intersect_with(otherwise, two, else_path);
                self.tr_if(*test, then, otherwise)
            }
            (_, TransitionKind::Conditional { .. }) => self.tr_intersect_with(two, one, path),
            (TransitionKind::Union(first, second), _) => {
                let first = self.tr_intersect_with(first, two, path);
                let second = self.tr_intersect_with(second, two, path);
                self.tr_union(first, second)
            }
            (_, TransitionKind::Union(..)) => self.tr_intersect_with(two, one, path),
            (TransitionKind::Leaf(a), TransitionKind::Leaf(b)) => self.tr_leaf(self.mk_and(&[a.clone(), b.clone()])),
        }
    }

    pub fn tr_complement(&self, tr: &TransitionRegex<A::Set>) -> TransitionRegex<A::Set> {
        match tr.kind() {
            TransitionKind::Leaf(node) => self.tr_leaf(self.mk_not(node.clone())),
            TransitionKind::Conditional { test, then, otherwise } => {
                let then = self.tr_complement(then);
                let otherwise = self.tr_complement(otherwise);
                self.tr_if(*test, then, otherwise)
            }
            // ~(a|b) => ~a & ~b
            TransitionKind::Union(first, second) => {
                let first = self.tr_complement(first);
                let second = self.tr_complement(second);
                self.tr_intersect(first, second)
            }
        }
    }

    /// Every leaf of `tr` followed by `node`.
    pub fn tr_concat(&self, tr: &TransitionRegex<A::Set>, node: &Node<A::Set>) -> TransitionRegex<A::Set> {
        match tr.kind() {
            TransitionKind::Leaf(leaf) => self.tr_leaf(self.mk_concat(leaf.clone(), node.clone())),
            TransitionKind::Conditional { test, then, otherwise } => {
                let then = self.tr_concat(then, node);
                let otherwise = self.tr_concat(otherwise, node);
                self.tr_if(*test, then, otherwise)
            }
            TransitionKind::Union(first, second) => {
                let first = self.tr_concat(first, node);
                let second = self.tr_concat(second, node);
                self.tr_union(first, second)
            }
        }
    }

    /// Symbolic derivative of `node` in the character context `context`.
    pub fn transition_regex(&self, node: &Node<A::Set>, context: Context) -> TransitionRegex<A::Set> {
        if self.is_dot_star(node) || self.is_nothing(node) {
            return self.tr_leaf(node.clone());
        }

        match node.kind() {
            NodeKind::Singleton(set) => self.tr_if(*set, self.tr_leaf(self.epsilon()), self.tr_leaf(self.nothing())),
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            } => {
                if *upper == 0 {
                    return self.tr_leaf(self.nothing());
                }
                let step = self.transition_regex(body, context);
                let rest = if node.is_star() {
                    node.clone()
                } else if node.is_plus() {
                    self.repeat(body.clone(), *lazy, 0, INFINITE)
                } else {
                    let upper = if *upper == INFINITE { INFINITE } else { *upper - 1 };
                    self.repeat(body.clone(), *lazy, lower.saturating_sub(1), upper)
                };
                self.tr_concat(&step, &rest)
            }
            NodeKind::Concat(..) => {
                let mut terms = Vec::new();
                let mut cur = node.clone();
                loop {
                    let NodeKind::Concat(left, right) = cur.kind() else {
                        terms.push(self.transition_regex(&cur, context));
                        break;
                    };
                    terms.push(self.tr_concat(&self.transition_regex(left, context), right));
                    if !left.is_nullable_for(context) {
                        break;
                    }
                    let next = right.clone();
                    cur = next;
                }
                let mut res = terms.pop().unwrap_or_else(|| self.tr_leaf(self.nothing()));
                while let Some(term) = terms.pop() {
                    res = self.tr_union(term, res);
                }
                res
            }
            NodeKind::Or(set) => set.iter().fold(self.tr_leaf(self.nothing()), |acc, e| {
                let tr = self.transition_regex(e, context);
                self.tr_union(acc, tr)
            }),
            NodeKind::And(set) => set.iter().fold(self.tr_leaf(self.dot_star()), |acc, e| {
                let tr = self.transition_regex(e, context);
                self.tr_intersect(acc, tr)
            }),
            NodeKind::Not(inner) => self.tr_complement(&self.transition_regex(inner, context)),
            _ => self.tr_leaf(self.nothing()),
        }
    }

    /// Outgoing transitions of `tr` as `(path condition, target)` pairs.
    ///
    /// Paths ending in `nothing` or with an unsatisfiable condition are skipped.
    pub fn enumerate_paths(&self, tr: &TransitionRegex<A::Set>) -> Vec<(A::Set, Node<A::Set>)> {
        let solver = self.solver();
        let mut paths = Vec::new();
        let mut stack = vec![(tr.clone(), solver.full())];
        while let Some((tr, path)) = stack.pop() {
            if !solver.is_satisfiable(path) {
                continue;
            }
            match tr.kind() {
                TransitionKind::Leaf(node) => {
                    if !self.is_nothing(node) {
                        paths.push((path, node.clone()));
                    }
                }
                TransitionKind::Conditional { test, then, otherwise } => {
                    stack.push((otherwise.clone(), solver.and(path, solver.not(*test))));
                    stack.push((then.clone(), solver.and(path, *test)));
                }
                TransitionKind::Union(first, second) => {
                    stack.push((second.clone(), path));
                    stack.push((first.clone(), path));
                }
            }
        }
        debug!("enumerate_paths: {} paths", paths.len());
        paths
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_log::test;

    use super::*;
    use crate::ast::Regex;
    use crate::bdd::Bdd;
    use crate::builder::BuilderConfig;
    use crate::char_kind::CharKind;
    use crate::charset::CharSetSolver;

    fn ctx() -> Context {
        Context::new(CharKind::General, CharKind::General)
    }

    /// Checks that the paths of the transition regex agree with the derivative on every char of `chars`.
    fn check_against_derivative(b: &SymbolicRegexBuilder<CharSetSolver>, node: &Node<Bdd>, chars: &str) {
        let solver = b.solver();
        let paths = b.enumerate_paths(&b.transition_regex(node, ctx()));
        for c in chars.encode_utf16() {
            let set = solver.mk_char(c);
            let leaves: Vec<_> = paths
                .iter()
                .filter(|(cond, _)| solver.is_satisfiable(solver.and(*cond, set)))
                .map(|(_, n)| n.clone())
                .collect();
            assert_eq!(b.mk_or(&leaves), b.derivative(set, node, ctx()), "char {:?}", c);
        }
    }

    #[test]
    fn test_interning() {
        let b = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
        let a = b.solver().mk_char('a' as u16);
        let t1 = b.tr_if(a, b.tr_leaf(b.epsilon()), b.tr_leaf(b.nothing()));
        let t2 = b.tr_if(a, b.tr_leaf(b.epsilon()), b.tr_leaf(b.nothing()));
        assert_eq!(t1, t2);
        let leaf = b.tr_leaf(b.epsilon());
        assert_eq!(b.tr_if(a, leaf.clone(), leaf.clone()), leaf);
        assert_eq!(b.tr_if(Bdd::TRUE, leaf.clone(), b.tr_leaf(b.nothing())), leaf);
        assert_eq!(b.tr_if(Bdd::FALSE, b.tr_leaf(b.nothing()), leaf.clone()), leaf);
    }

    #[test]
    fn test_union_rules() {
        let b = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
        let solver = b.solver();
        let a = solver.mk_char('a' as u16);
        let c = solver.mk_char('c' as u16);
        let eps = b.tr_leaf(b.epsilon());
        let nothing = b.tr_leaf(b.nothing());

        assert_eq!(b.tr_union(nothing.clone(), eps.clone()), eps);
        assert_eq!(b.tr_union(eps.clone(), b.tr_leaf(b.dot_star())), b.tr_leaf(b.dot_star()));

        let ta = b.tr_if(a, eps.clone(), nothing.clone());
        let tc = b.tr_if(c, eps.clone(), nothing.clone());
        let merged = b.tr_union(ta, tc);
        match merged.kind() {
            TransitionKind::Conditional { test, then, otherwise } => {
                assert_eq!(*test, solver.or(a, c));
                assert_eq!(*then, eps);
                assert_eq!(*otherwise, nothing);
            }
            _ => panic!("expected a conditional"),
        }
    }

    #[test]
    fn test_paths_agree_with_derivative() {
        let b = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
        let r = b
            .compile(&Regex::concat([Regex::star(Regex::literal("a")), Regex::literal("b")]))
            .unwrap();
        check_against_derivative(&b, &r, "abx");
        let paths = b.enumerate_paths(&b.transition_regex(&r, ctx()));
        assert_eq!(paths.len(), 2);

        let r = b
            .compile(&Regex::intersect([
                Regex::star(Regex::range('a', 'z')),
                Regex::complement(Regex::literal("ab")),
            ]))
            .unwrap();
        check_against_derivative(&b, &r, "abz1");
    }

    #[test]
    fn test_paths_agree_with_antimirov_derivative() {
        let b = SymbolicRegexBuilder::with_config(
            Arc::new(CharSetSolver::new()),
            BuilderConfig::default().with_antimirov(true),
        );
        let r = b
            .compile(&Regex::concat([
                Regex::alternate([Regex::literal("ab"), Regex::literal("ac")]),
                Regex::literal("d"),
            ]))
            .unwrap();
        check_against_derivative(&b, &r, "abd");
    }

    #[test]
    fn test_nothing_leaves_are_skipped() {
        let b = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
        assert!(b.enumerate_paths(&b.transition_regex(&b.nothing(), ctx())).is_empty());
        assert!(b.enumerate_paths(&b.transition_regex(&b.epsilon(), ctx())).is_empty());
        let paths = b.enumerate_paths(&b.transition_regex(&b.dot_star(), ctx()));
        assert_eq!(paths, vec![(Bdd::TRUE, b.dot_star())]);
    }
}
