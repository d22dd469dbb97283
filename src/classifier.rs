//! Constant-time character classification.

use std::sync::Arc;

use log::debug;

use crate::base64;
use crate::bdd::Bdd;
use crate::charset::{CharSetSolver, CHAR_MAX_BIT};
use crate::error::{malformed, Error, Result};

/// Number of code units answered from a lookup table.
const PRECOMPUTE_COUNT: usize = 128;

/// Maps every code unit to the index of the minterm containing it.
///
/// ASCII is answered from a table, everything else by walking a
/// multi-terminal BDD whose leaves are minterm indices.
#[derive(Debug, Clone)]
pub struct PartitionClassifier {
    solver: Arc<CharSetSolver>,
    parts: usize,
    precomputed: Vec<i32>,
    mtbdd: Bdd,
}

impl PartitionClassifier {
    /// Build a classifier for `partition`, which must be pairwise disjoint and cover the alphabet.
    pub fn new(solver: Arc<CharSetSolver>, partition: &[Bdd]) -> Result<Self> {
        debug!("PartitionClassifier::new(parts = {})", partition.len());
        let alg = solver.algebra();

        let mut union = Bdd::FALSE;
        for (i, &part) in partition.iter().enumerate() {
            if alg.and(union, part) != Bdd::FALSE {
                return Err(Error::InvalidArgument(format!("part {} overlaps an earlier part", i)));
            }
            union = alg.or(union, part);
        }
        if union != Bdd::TRUE {
            return Err(Error::InvalidArgument(format!(
                "{} parts do not cover the alphabet",
                partition.len()
            )));
        }

        if partition.len() == 1 {
            // Trivial partition, everything maps to 0.
            return Ok(Self {
                parts: 1,
                precomputed: Vec::new(),
                mtbdd: alg.replace_true(Bdd::TRUE, 0),
                solver,
            });
        }

        // Parts are disjoint, so the union never combines two different terminals.
        let mut mtbdd = Bdd::FALSE;
        for (i, &part) in partition.iter().enumerate() {
            mtbdd = alg.or(mtbdd, alg.replace_true(part, i as i32));
        }

        let precomputed = (0..PRECOMPUTE_COUNT as u64).map(|c| alg.find(mtbdd, c)).collect();

        // The table answers ASCII, so only the non-ASCII part of the MTBDD is needed.
        let mut mtbdd = alg.and(mtbdd, solver.non_ascii());
        if let Some(terminal) = alg.is_essentially_boolean(mtbdd) {
            mtbdd = terminal;
        }

        Ok(Self {
            solver,
            parts: partition.len(),
            precomputed,
            mtbdd,
        })
    }

    /// Number of parts of the partition.
    pub fn parts(&self) -> usize {
        self.parts
    }

    pub fn find(&self, c: u16) -> usize {
        let id = match self.precomputed.get(c as usize) {
            Some(&id) => id,
            None => self.solver.algebra().find(self.mtbdd, c as u64),
        };
        // Construction checks that every code unit reaches a part.
        debug_assert!(id >= 0 && (id as usize) < self.parts, "code unit {:#x} classified as {}", c, id);
        id as usize
    }

    /// `precomputed ',' mtbdd`; neither part uses `,`.
    pub fn serialize(&self, out: &mut String) -> Result<()> {
        base64::encode_i32_array(&self.precomputed, out);
        out.push(',');
        self.solver.algebra().serialize_to(self.mtbdd, out)
    }

    /// Inverse of [`serialize`](Self::serialize) for a partition of `parts` parts.
    pub fn deserialize(solver: Arc<CharSetSolver>, parts: usize, s: &str) -> Result<Self> {
        debug!("PartitionClassifier::deserialize(parts = {})", parts);
        let Some((table, bdd)) = s.split_once(',') else {
            return malformed(format!("classifier {:?} lacks ','", s));
        };
        if bdd.contains(',') {
            return malformed(format!("classifier {:?} has more than one ','", s));
        }

        let precomputed = base64::decode_i32_array(table)?;
        if !precomputed.is_empty() && precomputed.len() != PRECOMPUTE_COUNT {
            return malformed(format!(
                "classifier table has {} entries, expected 0 or {}",
                precomputed.len(),
                PRECOMPUTE_COUNT
            ));
        }
        if let Some(&id) = precomputed.iter().find(|&&id| id < 0 || id as usize >= parts) {
            return malformed(format!("minterm id {} in classifier table is not below {}", id, parts));
        }

        let alg = solver.algebra();
        let mtbdd = alg.deserialize_str(bdd)?;
        if mtbdd == Bdd::TRUE {
            return malformed("classifier MTBDD has a Boolean true leaf");
        }
        for node in alg.topological_sort(mtbdd) {
            if alg.is_leaf(node) {
                if alg.ordinal(node) as usize >= parts {
                    return malformed(format!("minterm id {} in classifier MTBDD is not below {}", alg.ordinal(node), parts));
                }
            } else if alg.one(node) == Bdd::TRUE || alg.zero(node) == Bdd::TRUE {
                return malformed("classifier MTBDD has a Boolean true leaf");
            }
        }

        // Code units past the table must all reach a minterm id.
        let start = precomputed.len() as u32;
        let covered = alg
            .all_ranges(mtbdd, CHAR_MAX_BIT)
            .iter()
            .any(|&(lo, hi)| lo <= start && hi == u16::MAX as u32);
        if !covered {
            return malformed(format!("classifier MTBDD does not cover the code units from {:#x}", start));
        }

        Ok(Self {
            solver,
            parts,
            precomputed,
            mtbdd,
        })
    }
}

/// Membership test for a single predicate, ASCII by table.
#[derive(Debug, Clone)]
pub struct BooleanClassifier {
    solver: Arc<CharSetSolver>,
    ascii: [bool; PRECOMPUTE_COUNT],
    non_ascii: Bdd,
}

impl BooleanClassifier {
    pub fn new(solver: Arc<CharSetSolver>, set: Bdd) -> Self {
        let mut ascii = [false; PRECOMPUTE_COUNT];
        for (c, slot) in ascii.iter_mut().enumerate() {
            *slot = solver.contains(set, c as u16);
        }
        let non_ascii = solver.algebra().and(set, solver.non_ascii());
        Self {
            solver,
            ascii,
            non_ascii,
        }
    }

    pub fn contains(&self, c: u16) -> bool {
        match self.ascii.get(c as usize) {
            Some(&b) => b,
            None => self.solver.contains(self.non_ascii, c),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::algebra::CharAlgebra;

    fn letters_digits_rest(solver: &CharSetSolver) -> Vec<Bdd> {
        let letter = solver.or(
            solver.mk_range('a' as u16, 'z' as u16),
            solver.mk_range(0x0100, 0x017F),
        );
        let digit = solver.digit();
        let rest = solver.not(solver.or(letter, digit));
        vec![letter, digit, rest]
    }

    #[test]
    fn test_find() {
        let solver = Arc::new(CharSetSolver::new());
        let parts = letters_digits_rest(&solver);
        let classifier = PartitionClassifier::new(solver.clone(), &parts).unwrap();
        assert_eq!(classifier.find('q' as u16), 0);
        assert_eq!(classifier.find('5' as u16), 1);
        assert_eq!(classifier.find(' ' as u16), 2);
        assert_eq!(classifier.find(0x0101), 0);
        assert_eq!(classifier.find(0x4E00), 2);
    }

    #[test]
    fn test_trivial_partition() {
        let solver = Arc::new(CharSetSolver::new());
        let classifier = PartitionClassifier::new(solver, &[Bdd::TRUE]).unwrap();
        assert_eq!(classifier.find('a' as u16), 0);
        assert_eq!(classifier.find(0xFFFF), 0);
    }

    #[test]
    fn test_roundtrip() {
        let solver = Arc::new(CharSetSolver::new());
        let parts = letters_digits_rest(&solver);
        let classifier = PartitionClassifier::new(solver.clone(), &parts).unwrap();
        let mut s = String::new();
        classifier.serialize(&mut s).unwrap();
        assert_eq!(s.matches(',').count(), 1);

        let restored = PartitionClassifier::deserialize(Arc::new(CharSetSolver::new()), 3, &s).unwrap();
        for c in [0u16, 'a' as u16, '0' as u16, '~' as u16, 0x0100, 0x0180, 0xFFFF] {
            assert_eq!(restored.find(c), classifier.find(c));
        }

        assert!(PartitionClassifier::deserialize(solver.clone(), 3, "1.2").is_err());
        assert!(PartitionClassifier::deserialize(solver, 3, "1,1,1").is_err());
    }

    #[test]
    fn test_deserialize_checks() {
        let solver = Arc::new(CharSetSolver::new());
        let parts = letters_digits_rest(&solver);
        let classifier = PartitionClassifier::new(solver.clone(), &parts).unwrap();
        let mut s = String::new();
        classifier.serialize(&mut s).unwrap();
        let (table, bdd) = s.split_once(',').unwrap();
        let rejected = |text: &str, parts: usize| {
            matches!(
                PartitionClassifier::deserialize(solver.clone(), parts, text),
                Err(Error::Deserialization(_))
            )
        };

        // Ids 0..3 do not fit a partition of two.
        assert!(rejected(&s, 2));
        // A short table would leave ASCII to the non-ASCII MTBDD.
        let mut short = String::new();
        base64::encode_i32_array(&[0, 1, 2], &mut short);
        assert!(rejected(&format!("{},{}", short, bdd), 3));
        // Without a table, the MTBDD restricted to non-ASCII leaves ASCII unclassified.
        assert!(rejected(&format!(",{}", bdd), 3));
        // A Boolean MTBDD carries no ids.
        let mut boolean = String::new();
        solver.algebra().serialize_to(solver.non_ascii(), &mut boolean).unwrap();
        assert!(rejected(&format!("{},{}", table, boolean), 3));

        assert!(PartitionClassifier::deserialize(solver, 3, &s).is_ok());
    }

    #[test]
    fn test_invalid_partition() {
        let solver = Arc::new(CharSetSolver::new());
        let digit = solver.digit();
        let letter = solver.mk_range('a' as u16, 'z' as u16);
        assert!(PartitionClassifier::new(solver.clone(), &[]).is_err());
        assert!(PartitionClassifier::new(solver.clone(), &[digit, letter]).is_err());
        let overlapping = [digit, solver.not(letter), letter];
        assert!(PartitionClassifier::new(solver.clone(), &overlapping).is_err());
        let rest = solver.not(solver.or(digit, letter));
        assert_eq!(PartitionClassifier::new(solver, &[digit, letter, rest]).map(|c| c.parts()), Ok(3));
    }

    #[test]
    fn test_boolean_classifier() {
        let solver = Arc::new(CharSetSolver::new());
        let set = solver.or(solver.digit(), solver.mk_char(0x20AC));
        let classifier = BooleanClassifier::new(solver, set);
        assert!(classifier.contains('3' as u16));
        assert!(classifier.contains(0x20AC));
        assert!(!classifier.contains('x' as u16));
        assert!(!classifier.contains(0x20AD));
    }
}
