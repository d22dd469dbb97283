use std::sync::Arc;

use log::debug;

use crate::algebra::CharAlgebra;
use crate::base64;
use crate::bdd::Bdd;
use crate::charset::CharSetSolver;
use crate::classifier::PartitionClassifier;
use crate::error::{malformed, Error, Result};

/// Boolean algebra of bitvectors over at most 64 minterms.
///
/// Bit `i` stands for the `i`-th minterm of a fixed partition of the alphabet,
/// so every operation is a single machine instruction.
#[derive(Debug)]
pub struct BitVectorAlgebra {
    solver: Arc<CharSetSolver>,
    minterms: Vec<Bdd>,
    cardinalities: Vec<u64>,
    classifier: PartitionClassifier,
    full: u64,
}

impl BitVectorAlgebra {
    pub const MAX_MINTERMS: usize = 64;

    /// Algebra over `minterms`, which must partition the alphabet.
    pub fn new(solver: Arc<CharSetSolver>, minterms: &[Bdd]) -> Result<Self> {
        debug!("BitVectorAlgebra::new(minterms = {})", minterms.len());
        if minterms.is_empty() || minterms.len() > Self::MAX_MINTERMS {
            return Err(Error::InvalidArgument(format!(
                "bitvector algebra needs 1..={} minterms, got {}",
                Self::MAX_MINTERMS,
                minterms.len()
            )));
        }

        let cardinalities = minterms
            .iter()
            .map(|&m| solver.compute_domain_size(m))
            .collect::<Result<Vec<_>>>()?;
        let classifier = PartitionClassifier::new(solver.clone(), minterms)?;
        let full = u64::MAX >> (Self::MAX_MINTERMS - minterms.len());

        Ok(Self {
            solver,
            minterms: minterms.to_vec(),
            cardinalities,
            classifier,
            full,
        })
    }

    pub fn minterm_count(&self) -> usize {
        self.minterms.len()
    }

    /// One singleton bitvector per minterm.
    pub fn get_partition(&self) -> Vec<u64> {
        (0..self.minterms.len()).map(|i| 1u64 << i).collect()
    }

    /// Number of code units in `set`.
    pub fn compute_domain_size(&self, set: u64) -> u64 {
        self.cardinalities
            .iter()
            .enumerate()
            .filter(|&(i, _)| set & (1 << i) != 0)
            .map(|(_, &c)| c)
            .sum()
    }

    pub fn classifier(&self) -> &PartitionClassifier {
        &self.classifier
    }
}

impl CharAlgebra for BitVectorAlgebra {
    type Set = u64;

    fn full(&self) -> u64 {
        self.full
    }
    fn empty(&self) -> u64 {
        0
    }

    fn and(&self, a: u64, b: u64) -> u64 {
        a & b
    }
    fn or(&self, a: u64, b: u64) -> u64 {
        a | b
    }
    fn not(&self, a: u64) -> u64 {
        // Unused high bits must stay clear.
        self.full & !a
    }

    fn is_satisfiable(&self, a: u64) -> bool {
        a != 0
    }
    fn are_equivalent(&self, a: u64, b: u64) -> bool {
        a == b
    }

    fn serialize_predicate(&self, set: u64, out: &mut String) -> Result<()> {
        base64::encode_u64(set, out);
        Ok(())
    }
    fn deserialize_predicate(&self, s: &str) -> Result<u64> {
        let set = base64::decode_u64(s)?;
        if set & !self.full != 0 {
            return malformed(format!("bitvector {:#x} exceeds {} minterms", set, self.minterms.len()));
        }
        Ok(set)
    }

    fn pretty_print(&self, set: u64) -> String {
        self.solver.pretty_print(self.to_char_set(set))
    }

    fn newline(&self) -> u64 {
        self.from_char_set(self.solver.newline_set())
    }
    fn word_letter(&self) -> u64 {
        self.from_char_set(self.solver.word_letter_set())
    }
    fn char_set(&self, c: u16) -> u64 {
        1 << self.classifier.find(c)
    }

    fn solver(&self) -> &CharSetSolver {
        &self.solver
    }
    fn to_char_set(&self, set: u64) -> Bdd {
        let alg = self.solver.algebra();
        self.minterms
            .iter()
            .enumerate()
            .filter(|&(i, _)| set & (1 << i) != 0)
            .fold(Bdd::FALSE, |acc, (_, &m)| alg.or(acc, m))
    }

    /// Set of the minterms that intersect `set`.
    fn from_char_set(&self, set: Bdd) -> u64 {
        let alg = self.solver.algebra();
        self.minterms
            .iter()
            .enumerate()
            .filter(|&(_, &m)| alg.is_satisfiable(alg.and(m, set)))
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }

    fn partition(&self) -> Option<Vec<u64>> {
        Some(self.get_partition())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn setup() -> (Arc<CharSetSolver>, BitVectorAlgebra) {
        let solver = Arc::new(CharSetSolver::new());
        let digit = solver.digit();
        let lower = solver.mk_range('a' as u16, 'z' as u16);
        let minterms: Vec<Bdd> = solver
            .generate_minterms(&[digit, lower])
            .into_iter()
            .map(|m| m.1)
            .collect();
        let bv = BitVectorAlgebra::new(solver.clone(), &minterms).unwrap();
        (solver, bv)
    }

    #[test]
    fn test_conversion() {
        let (solver, bv) = setup();
        assert_eq!(bv.minterm_count(), 3);
        let digit = bv.from_char_set(solver.digit());
        assert_eq!(digit.count_ones(), 1);
        assert_eq!(bv.to_char_set(digit), solver.digit());
        assert_eq!(bv.full(), 0b111);
        assert_eq!(bv.not(bv.full()), 0);
        assert_eq!(bv.char_set('7' as u16), digit);
        assert_eq!(bv.get_partition(), vec![1, 2, 4]);
    }

    #[test]
    fn test_domain_size() {
        let (solver, bv) = setup();
        let lower = bv.from_char_set(solver.mk_range('a' as u16, 'z' as u16));
        assert_eq!(bv.compute_domain_size(lower), 26);
        assert_eq!(bv.compute_domain_size(bv.full()), 0x10000);
    }

    #[test]
    fn test_pretty_print() {
        let (solver, bv) = setup();
        assert_eq!(bv.pretty_print(bv.from_char_set(solver.digit())), "\\d");
        assert_eq!(bv.pretty_print(bv.full()), ".");
    }

    #[test]
    fn test_invalid() {
        let (solver, bv) = setup();
        assert!(bv.deserialize_predicate("8").is_err());
        // Minterms must cover the alphabet without overlapping.
        assert!(BitVectorAlgebra::new(solver.clone(), &[solver.digit()]).is_err());
        assert!(BitVectorAlgebra::new(solver.clone(), &[solver.digit(), Bdd::TRUE]).is_err());
        assert!(BitVectorAlgebra::new(solver, &[]).is_err());
    }
}
