//! Dense `i64` encoding of BDDs.
//!
//! `arcs[0]` and `arcs[1]` hold the number of bits used for ordinals and node
//! ids; ids `0` and `1` denote `False` and `True`. Every following entry is a
//! node in topological order: either a non-positive number (a negated
//! multi-terminal leaf) or `ordinal | one << ordinal_bits | zero << (ordinal_bits + node_bits)`.
//! The root is the last entry.

use std::collections::HashMap;

use log::debug;

use crate::base64;
use crate::bdd::{Bdd, BddAlgebra};
use crate::error::{malformed, Error, Result};

/// Maximal number of nodes that fit the encoding.
pub const MAX_SERIALIZED_NODES: usize = 1 << 24;

/// Highest ordinal of an inner node, see [`BddAlgebra`].
const MAX_ORDINAL: i64 = 31;

struct BitLayout {
    ordinal_shift: u32,
    one_shift: u32,
    zero_shift: u32,
    ordinal_mask: i64,
    node_mask: i64,
}

impl BitLayout {
    fn new(ordinal_bits: u32, node_bits: u32) -> Self {
        Self {
            ordinal_shift: 0,
            one_shift: ordinal_bits,
            zero_shift: ordinal_bits + node_bits,
            ordinal_mask: (1i64 << ordinal_bits) - 1,
            node_mask: (1i64 << node_bits) - 1,
        }
    }
}

impl BddAlgebra {
    pub fn serialize(&self, set: Bdd) -> Result<Vec<i64>> {
        debug!("serialize(set = {})", set);

        match set {
            Bdd::FALSE => return Ok(vec![0]),
            Bdd::TRUE => return Ok(vec![1]),
            _ => {}
        }
        if self.is_leaf(set) {
            return Ok(vec![0, 0, -(self.ordinal(set) as i64)]);
        }

        let nodes = self.topological_sort(set);
        debug_assert_eq!(nodes.last(), Some(&set));
        if nodes.len() > MAX_SERIALIZED_NODES {
            return Err(Error::SerializationLimitExceeded(format!(
                "{} nodes exceed the limit of {}",
                nodes.len(),
                MAX_SERIALIZED_NODES
            )));
        }

        let root_ordinal = self.ordinal(set);
        let mut ordinal_bits = 4;
        while root_ordinal >= (1 << ordinal_bits) {
            ordinal_bits += 1;
        }
        let mut node_bits = 2;
        while nodes.len() >= (1 << node_bits) {
            node_bits += 1;
        }
        let layout = BitLayout::new(ordinal_bits, node_bits);

        let mut ids: HashMap<Bdd, i64> = HashMap::with_capacity(nodes.len() + 2);
        ids.insert(Bdd::FALSE, 0);
        ids.insert(Bdd::TRUE, 1);

        let mut arcs = Vec::with_capacity(nodes.len() + 2);
        arcs.push(ordinal_bits as i64);
        arcs.push(node_bits as i64);

        for (i, &node) in nodes.iter().enumerate() {
            ids.insert(node, i as i64 + 2);
            if self.is_leaf(node) {
                arcs.push(-(self.ordinal(node) as i64));
            } else {
                // Children precede parents, so their ids are known.
                let one = ids[&self.one(node)];
                let zero = ids[&self.zero(node)];
                arcs.push(
                    ((self.ordinal(node) as i64) << layout.ordinal_shift)
                        | (one << layout.one_shift)
                        | (zero << layout.zero_shift),
                );
            }
        }

        Ok(arcs)
    }

    pub fn deserialize(&self, arcs: &[i64]) -> Result<Bdd> {
        debug!("deserialize(arcs = {:?})", arcs);

        match arcs {
            [] => return malformed("empty BDD encoding"),
            [0] => return Ok(Bdd::FALSE),
            [1] => return Ok(Bdd::TRUE),
            [x] => return malformed(format!("invalid Boolean BDD encoding {}", x)),
            [_, _] => return malformed("BDD encoding without nodes"),
            _ => {}
        }

        let (ordinal_bits, node_bits) = (arcs[0], arcs[1]);
        if !(0..=32).contains(&ordinal_bits) || !(0..=26).contains(&node_bits) {
            return malformed(format!(
                "invalid bit layout ({}, {})",
                ordinal_bits, node_bits
            ));
        }
        let layout = BitLayout::new(ordinal_bits as u32, node_bits as u32);

        let mut nodes: Vec<Bdd> = Vec::with_capacity(arcs.len());
        nodes.push(Bdd::FALSE);
        nodes.push(Bdd::TRUE);

        for (i, &arc) in arcs.iter().enumerate().skip(2) {
            let node = if arc <= 0 {
                let terminal = arc
                    .checked_neg()
                    .and_then(|t| i32::try_from(t).ok())
                    .map_or_else(|| malformed(format!("terminal of arc {} out of range", arc)), Ok)?;
                self.mk_leaf(terminal)
            } else {
                let ordinal = (arc >> layout.ordinal_shift) & layout.ordinal_mask;
                if !(0..=MAX_ORDINAL).contains(&ordinal) {
                    return malformed(format!("node {} has ordinal {} outside 0..={}", i, ordinal, MAX_ORDINAL));
                }
                let ordinal = ordinal as i32;
                let one_id = ((arc >> layout.one_shift) & layout.node_mask) as usize;
                let zero_id = ((arc >> layout.zero_shift) & layout.node_mask) as usize;
                if one_id >= i || zero_id >= i {
                    return malformed(format!(
                        "node {} refers to a child ({}, {}) that is not yet defined",
                        i, one_id, zero_id
                    ));
                }
                if one_id == zero_id {
                    return malformed(format!("node {} has equal children {}", i, one_id));
                }
                let (one, zero) = (nodes[one_id], nodes[zero_id]);
                for child in [one, zero] {
                    if !self.is_leaf(child) && self.ordinal(child) >= ordinal {
                        return malformed(format!(
                            "node {} with ordinal {} has a child with ordinal {}",
                            i,
                            ordinal,
                            self.ordinal(child)
                        ));
                    }
                }
                self.mk_node(ordinal, one, zero)
            };
            nodes.push(node);
        }

        Ok(nodes[nodes.len() - 1])
    }

    /// Append the base-64 form of `set` to `out`.
    pub fn serialize_to(&self, set: Bdd, out: &mut String) -> Result<()> {
        let arcs = self.serialize(set)?;
        base64::encode_i64_array(&arcs, out);
        Ok(())
    }

    pub fn deserialize_str(&self, s: &str) -> Result<Bdd> {
        let arcs = base64::decode_i64_array(s)?;
        self.deserialize(&arcs)
    }
}
