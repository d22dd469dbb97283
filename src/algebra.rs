use std::fmt::Debug;
use std::hash::Hash;

use crate::bdd::Bdd;
use crate::charset::CharSetSolver;
use crate::error::Result;
use crate::minterm;

/// A minterm: which input predicates hold, and the set where exactly those hold.
pub type Minterm<S> = (Vec<bool>, S);

/// Effective Boolean algebra of character sets.
///
/// Symbolic regexes are generic over this trait. Implementations must be
/// shareable between threads; any internal caches are synchronized.
pub trait CharAlgebra: Send + Sync {
    type Set: Copy + Eq + Hash + Ord + Debug + Send + Sync + 'static;

    fn full(&self) -> Self::Set;
    fn empty(&self) -> Self::Set;

    fn and(&self, a: Self::Set, b: Self::Set) -> Self::Set;
    fn or(&self, a: Self::Set, b: Self::Set) -> Self::Set;
    fn not(&self, a: Self::Set) -> Self::Set;

    fn and_all(&self, sets: impl IntoIterator<Item = Self::Set>) -> Self::Set
    where
        Self: Sized,
    {
        sets.into_iter().fold(self.full(), |acc, s| self.and(acc, s))
    }

    fn or_all(&self, sets: impl IntoIterator<Item = Self::Set>) -> Self::Set
    where
        Self: Sized,
    {
        sets.into_iter().fold(self.empty(), |acc, s| self.or(acc, s))
    }

    fn is_satisfiable(&self, a: Self::Set) -> bool;

    fn are_equivalent(&self, a: Self::Set, b: Self::Set) -> bool;

    /// Coarsest partition of the alphabet that respects every predicate in `preds`.
    fn generate_minterms(&self, preds: &[Self::Set]) -> Vec<Minterm<Self::Set>>
    where
        Self: Sized,
    {
        minterm::generate_minterms(self, preds)
    }

    fn serialize_predicate(&self, set: Self::Set, out: &mut String) -> Result<()>;
    fn deserialize_predicate(&self, s: &str) -> Result<Self::Set>;

    /// Regex-like rendering of a set, such as `[a-z]` or `\d`.
    fn pretty_print(&self, set: Self::Set) -> String;

    /// The set containing only `\n`.
    fn newline(&self) -> Self::Set;

    /// The word-letter class `\w`.
    fn word_letter(&self) -> Self::Set;

    /// The set containing only the UTF-16 code unit `c`.
    fn char_set(&self, c: u16) -> Self::Set;

    /// The character solver backing this algebra.
    fn solver(&self) -> &CharSetSolver;

    /// The same set expressed as a BDD over 16-bit characters.
    fn to_char_set(&self, set: Self::Set) -> Bdd;

    /// The set covering `set`, a BDD over 16-bit characters.
    fn from_char_set(&self, set: Bdd) -> Self::Set;

    /// Fixed partition of the alphabet, if the algebra is built over one.
    fn partition(&self) -> Option<Vec<Self::Set>> {
        None
    }

    /// Position of the atom in `atoms` that contains the code unit `c`.
    fn classify(&self, atoms: &[Self::Set], c: u16) -> Option<usize> {
        let set = self.char_set(c);
        atoms.iter().position(|&a| self.is_satisfiable(self.and(a, set)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use test_log::test;

    use super::*;
    use crate::bitvector::BitVectorAlgebra;

    /// Laws every algebra must satisfy, checked over a few sample sets.
    pub(crate) fn check_algebra_laws<A: CharAlgebra>(alg: &A, samples: &[A::Set]) {
        let full = alg.full();
        let empty = alg.empty();
        assert!(alg.is_satisfiable(full));
        assert!(!alg.is_satisfiable(empty));
        assert_eq!(alg.not(full), empty);

        for &a in samples {
            assert_eq!(alg.and(a, full), a);
            assert_eq!(alg.or(a, empty), a);
            assert_eq!(alg.and(a, alg.not(a)), empty);
            assert_eq!(alg.or(a, alg.not(a)), full);
            assert!(alg.are_equivalent(alg.not(alg.not(a)), a));

            let mut s = String::new();
            alg.serialize_predicate(a, &mut s).unwrap();
            assert_eq!(alg.deserialize_predicate(&s), Ok(a));

            for &b in samples {
                assert_eq!(alg.and(a, b), alg.and(b, a));
                assert_eq!(alg.or(a, b), alg.or(b, a));
                assert!(alg.are_equivalent(
                    alg.not(alg.and(a, b)),
                    alg.or(alg.not(a), alg.not(b))
                ));
            }
        }

        // Minterms are pairwise disjoint, cover the alphabet and refine every sample.
        let minterms = alg.generate_minterms(samples);
        assert_eq!(alg.or_all(minterms.iter().map(|m| m.1)), full);
        for (i, (_, m1)) in minterms.iter().enumerate() {
            assert!(alg.is_satisfiable(*m1));
            for (_, m2) in &minterms[i + 1..] {
                assert!(!alg.is_satisfiable(alg.and(*m1, *m2)));
            }
        }
        for (vector, m) in &minterms {
            for (k, &a) in samples.iter().enumerate() {
                let inside = alg.and(*m, a) == *m;
                let outside = !alg.is_satisfiable(alg.and(*m, a));
                assert!(inside || outside);
                assert_eq!(vector[k], inside);
            }
        }
    }

    #[test]
    fn test_charset_laws() {
        let solver = CharSetSolver::new();
        let samples = [
            solver.digit(),
            solver.word_letter(),
            solver.mk_range('a' as u16, 'f' as u16),
            solver.newline(),
        ];
        check_algebra_laws(&solver, &samples);
    }

    #[test]
    fn test_bitvector_laws() {
        let solver = Arc::new(CharSetSolver::new());
        let digit = solver.digit();
        let hex = solver.mk_range('a' as u16, 'f' as u16);
        let word = solver.word_letter();
        let minterms: Vec<Bdd> = solver
            .generate_minterms(&[digit, hex, word])
            .into_iter()
            .map(|m| m.1)
            .collect();
        let bv = BitVectorAlgebra::new(solver.clone(), &minterms).unwrap();

        let samples = [bv.from_char_set(digit), bv.from_char_set(hex), bv.from_char_set(word)];
        check_algebra_laws(&bv, &samples);
    }
}
