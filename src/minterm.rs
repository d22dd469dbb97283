//! Minterm generation by partition refinement.
//!
//! Each distinct predicate refines every leaf of a binary partition tree:
//! the left child is the part inside the predicate, the right child the part
//! outside. A leaf that lies entirely on one side gets a single child, so the
//! depth of every leaf equals the number of distinct predicates.

use log::debug;

use crate::algebra::{CharAlgebra, Minterm};

struct Part<S> {
    parent: Option<usize>,
    /// Index of the predicate that created this node; `-1` for the root.
    level: i32,
    phi: S,
    left: Option<usize>,
    right: Option<usize>,
}

struct PartitionTree<'a, A: CharAlgebra> {
    alg: &'a A,
    parts: Vec<Part<A::Set>>,
}

impl<'a, A: CharAlgebra> PartitionTree<'a, A> {
    fn new(alg: &'a A) -> Self {
        let root = Part {
            parent: None,
            level: -1,
            phi: alg.full(),
            left: None,
            right: None,
        };
        Self {
            alg,
            parts: vec![root],
        }
    }

    fn child(&mut self, parent: usize, phi: A::Set) -> usize {
        let level = self.parts[parent].level + 1;
        self.parts.push(Part {
            parent: Some(parent),
            level,
            phi,
            left: None,
            right: None,
        });
        self.parts.len() - 1
    }

    fn refine(&mut self, index: usize, psi: A::Set) {
        let (phi, left, right) = {
            let p = &self.parts[index];
            (p.phi, p.left, p.right)
        };

        match (left, right) {
            (None, None) => {
                let inside = self.alg.and(phi, psi);
                if self.alg.is_satisfiable(inside) {
                    let outside = self.alg.and(phi, self.alg.not(psi));
                    if self.alg.is_satisfiable(outside) {
                        let l = self.child(index, inside);
                        let r = self.child(index, outside);
                        self.parts[index].left = Some(l);
                        self.parts[index].right = Some(r);
                    } else {
                        // phi is inside psi
                        let l = self.child(index, phi);
                        self.parts[index].left = Some(l);
                    }
                } else {
                    // phi is outside psi
                    let r = self.child(index, phi);
                    self.parts[index].right = Some(r);
                }
            }
            (None, Some(r)) => self.refine(r, psi),
            (Some(l), None) => self.refine(l, psi),
            (Some(l), Some(r)) => {
                let inside = self.alg.and(phi, psi);
                if self.alg.is_satisfiable(inside) {
                    let outside = self.alg.and(phi, self.alg.not(psi));
                    if self.alg.is_satisfiable(outside) {
                        self.refine(l, psi);
                        self.refine(r, psi);
                    } else {
                        self.extend(l, true);
                        self.extend(r, true);
                    }
                } else {
                    self.extend(l, false);
                    self.extend(r, false);
                }
            }
        }
    }

    /// Push every leaf below `index` one level down without splitting it.
    fn extend(&mut self, index: usize, inside: bool) {
        let (phi, left, right) = {
            let p = &self.parts[index];
            (p.phi, p.left, p.right)
        };
        match (left, right) {
            (None, None) => {
                let c = self.child(index, phi);
                if inside {
                    self.parts[index].left = Some(c);
                } else {
                    self.parts[index].right = Some(c);
                }
            }
            (None, Some(r)) => self.extend(r, inside),
            (Some(l), None) => self.extend(l, inside),
            (Some(l), Some(r)) => {
                self.extend(l, inside);
                self.extend(r, inside);
            }
        }
    }

    fn leaves(&self) -> Vec<usize> {
        let mut res = Vec::new();
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            let p = &self.parts[i];
            match (p.left, p.right) {
                (None, None) => res.push(i),
                (l, r) => {
                    // Right first, so that left leaves come out first.
                    stack.extend(r);
                    stack.extend(l);
                }
            }
        }
        res
    }

    /// Levels of the predicates that hold on the path from the root to `index`.
    fn path(&self, index: usize) -> Vec<usize> {
        let mut res = Vec::new();
        let mut current = index;
        while let Some(parent) = self.parts[current].parent {
            if self.parts[parent].left == Some(current) {
                res.push(self.parts[current].level as usize);
            }
            current = parent;
        }
        res
    }
}

pub(crate) fn generate_minterms<A: CharAlgebra>(alg: &A, preds: &[A::Set]) -> Vec<Minterm<A::Set>> {
    debug!("generate_minterms(preds = {})", preds.len());

    if preds.is_empty() {
        return vec![(Vec::new(), alg.full())];
    }

    // Group equivalent predicates; `members[k]` lists the inputs equivalent to `distinct[k]`.
    let mut distinct: Vec<A::Set> = Vec::new();
    let mut members: Vec<Vec<usize>> = Vec::new();
    for (i, &pred) in preds.iter().enumerate() {
        match distinct.iter().position(|&d| alg.are_equivalent(d, pred)) {
            Some(k) => members[k].push(i),
            None => {
                distinct.push(pred);
                members.push(vec![i]);
            }
        }
    }

    let mut tree = PartitionTree::new(alg);
    for &psi in &distinct {
        tree.refine(0, psi);
    }

    let minterms: Vec<Minterm<A::Set>> = tree
        .leaves()
        .into_iter()
        .map(|leaf| {
            let mut characteristic = vec![false; preds.len()];
            for k in tree.path(leaf) {
                for &n in &members[k] {
                    characteristic[n] = true;
                }
            }
            (characteristic, tree.parts[leaf].phi)
        })
        .collect();

    debug!("generate_minterms: {} minterms", minterms.len());
    minterms
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::bdd::Bdd;
    use crate::charset::CharSetSolver;

    #[test]
    fn test_no_predicates() {
        let solver = CharSetSolver::new();
        let minterms = solver.generate_minterms(&[]);
        assert_eq!(minterms, vec![(vec![], Bdd::TRUE)]);
    }

    #[test]
    fn test_digit_and_letter() {
        let solver = CharSetSolver::new();
        let digit = solver.digit();
        let letter = solver.or(
            solver.mk_range('a' as u16, 'z' as u16),
            solver.mk_range('A' as u16, 'Z' as u16),
        );
        let minterms = solver.generate_minterms(&[digit, letter]);
        assert_eq!(minterms.len(), 3);

        let rest = solver.not(solver.or(digit, letter));
        assert!(minterms.contains(&(vec![true, false], digit)));
        assert!(minterms.contains(&(vec![false, true], letter)));
        assert!(minterms.contains(&(vec![false, false], rest)));
    }

    #[test]
    fn test_overlapping() {
        let solver = CharSetSolver::new();
        let a = solver.mk_range('a' as u16, 'm' as u16);
        let b = solver.mk_range('h' as u16, 'z' as u16);
        let minterms = solver.generate_minterms(&[a, b]);
        assert_eq!(minterms.len(), 4);
        let both = solver.mk_range('h' as u16, 'm' as u16);
        assert!(minterms.contains(&(vec![true, true], both)));
    }

    #[test]
    fn test_equivalent_predicates_share_columns() {
        let solver = CharSetSolver::new();
        let d = solver.digit();
        let minterms = solver.generate_minterms(&[d, Bdd::TRUE, d]);
        assert_eq!(minterms.len(), 2);
        assert!(minterms.contains(&(vec![true, true, true], d)));
        assert!(minterms.contains(&(vec![false, true, false], solver.not(d))));
    }
}
