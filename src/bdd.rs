use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Mutex;

use log::debug;
use num_bigint::BigUint;

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::table::Table;
use crate::utils::{lock, pairing3, zigzag, MyHash};

/// Ordinal of the `False` leaf.
pub const FALSE_ORDINAL: i32 = -1;
/// Ordinal of the `True` leaf.
pub const TRUE_ORDINAL: i32 = -2;

/// Handle of a hash-consed BDD node owned by a [`BddAlgebra`].
///
/// Two handles from the same algebra are equal iff they denote the same
/// `(ordinal, one, zero)` node. Index `0` is the storage sentry and is used
/// as the "no child" marker of leaves.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Bdd(u32);

impl Bdd {
    pub const FALSE: Bdd = Bdd(1);
    pub const TRUE: Bdd = Bdd(2);
    const NONE: Bdd = Bdd(0);

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn is_false(self) -> bool {
        self == Self::FALSE
    }
    pub fn is_true(self) -> bool {
        self == Self::TRUE
    }
}

impl Display for Bdd {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Bdd::FALSE => write!(f, "F"),
            Bdd::TRUE => write!(f, "T"),
            Bdd(i) => write!(f, "@{}", i),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct BddNode {
    ordinal: i32,
    one: Bdd,
    zero: Bdd,
}

#[allow(clippy::derivable_impls)]
impl Default for BddNode {
    fn default() -> Self {
        Self {
            ordinal: 0,
            one: Bdd::NONE,
            zero: Bdd::NONE,
        }
    }
}

impl BddNode {
    fn is_leaf(&self) -> bool {
        self.one == Bdd::NONE
    }
}

impl MyHash for BddNode {
    fn hash(&self) -> u64 {
        pairing3(zigzag(self.ordinal), self.one.0 as u64, self.zero.0 as u64)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum BoolOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum OpKey {
    Bin(BoolOp, Bdd, Bdd),
    Not(Bdd),
}

impl OpKey {
    /// Binary operations are commutative, so operands are stored ordered.
    fn bin(op: BoolOp, a: Bdd, b: Bdd) -> Self {
        if a <= b {
            OpKey::Bin(op, a, b)
        } else {
            OpKey::Bin(op, b, a)
        }
    }
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        match *self {
            OpKey::Bin(op, a, b) => pairing3(op as u64 + 1, a.0 as u64, b.0 as u64),
            OpKey::Not(a) => pairing3(0, a.0 as u64, 0),
        }
    }
}

/// Sizing of the BDD node storage and the operation cache.
#[derive(Debug, Copy, Clone)]
pub struct AlgebraConfig {
    pub storage_bits: usize,
    pub cache_bits: usize,
}

impl Default for AlgebraConfig {
    fn default() -> Self {
        Self {
            storage_bits: 20,
            cache_bits: 16,
        }
    }
}

impl AlgebraConfig {
    pub fn with_storage_bits(mut self, storage_bits: usize) -> Self {
        self.storage_bits = storage_bits;
        self
    }
    pub fn with_cache_bits(mut self, cache_bits: usize) -> Self {
        self.cache_bits = cache_bits;
        self
    }
}

/// Boolean algebra of (multi-terminal) BDDs over bit positions `0..=31`.
///
/// Nodes are hash-consed in a [`Table`], so structurally equal BDDs share one
/// handle and equality is O(1). The storage and the operation cache are each
/// guarded by their own mutex; no lock is held across a recursive call.
pub struct BddAlgebra {
    storage: Mutex<Table<BddNode>>,
    cache: Mutex<Cache<OpKey, Bdd>>,
}

impl BddAlgebra {
    pub fn new(storage_bits: usize) -> Self {
        Self::with_config(AlgebraConfig::default().with_storage_bits(storage_bits))
    }

    pub fn with_config(config: AlgebraConfig) -> Self {
        assert!(
            config.storage_bits <= 31,
            "Storage bits should be in the range 0..=31"
        );

        let mut storage = Table::new(config.storage_bits);

        // Allocate the two Boolean leaves:
        let f = storage.put(BddNode {
            ordinal: FALSE_ORDINAL,
            one: Bdd::NONE,
            zero: Bdd::NONE,
        });
        let t = storage.put(BddNode {
            ordinal: TRUE_ORDINAL,
            one: Bdd::NONE,
            zero: Bdd::NONE,
        });
        assert_eq!(f, Bdd::FALSE.0 as usize);
        assert_eq!(t, Bdd::TRUE.0 as usize);

        Self {
            storage: Mutex::new(storage),
            cache: Mutex::new(Cache::new(config.cache_bits)),
        }
    }
}

impl Default for BddAlgebra {
    fn default() -> Self {
        BddAlgebra::with_config(AlgebraConfig::default())
    }
}

impl Debug for BddAlgebra {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let storage = lock(&self.storage);
        let cache = lock(&self.cache);
        f.debug_struct("BddAlgebra")
            .field("capacity", &storage.capacity())
            .field("size", &storage.size())
            .field("cache_hits", &cache.hits())
            .field("cache_misses", &cache.misses())
            .finish()
    }
}

impl BddAlgebra {
    fn node(&self, set: Bdd) -> BddNode {
        *lock(&self.storage).value(set.0 as usize)
    }

    /// Number of nodes allocated so far, including the two Boolean leaves.
    pub fn size(&self) -> usize {
        lock(&self.storage).size()
    }

    pub fn ordinal(&self, set: Bdd) -> i32 {
        self.node(set).ordinal
    }
    pub fn one(&self, set: Bdd) -> Bdd {
        self.node(set).one
    }
    pub fn zero(&self, set: Bdd) -> Bdd {
        self.node(set).zero
    }

    /// Leaves are `True`, `False` and the multi-terminal leaves.
    pub fn is_leaf(&self, set: Bdd) -> bool {
        self.node(set).is_leaf()
    }

    /// Get or create the node `(ordinal, one, zero)`. No reduction is applied.
    pub fn mk_node(&self, ordinal: i32, one: Bdd, zero: Bdd) -> Bdd {
        debug_assert!(ordinal >= 0, "Ordinal of an inner node must be non-negative");
        debug_assert!(one != Bdd::NONE && zero != Bdd::NONE);
        let i = lock(&self.storage).put(BddNode { ordinal, one, zero });
        Bdd(i as u32)
    }

    /// Get or create the multi-terminal leaf carrying `terminal`.
    pub fn mk_leaf(&self, terminal: i32) -> Bdd {
        assert!(terminal >= 0, "Terminal must be non-negative");
        let i = lock(&self.storage).put(BddNode {
            ordinal: terminal,
            one: Bdd::NONE,
            zero: Bdd::NONE,
        });
        Bdd(i as u32)
    }

    fn cached(&self, key: &OpKey) -> Option<Bdd> {
        lock(&self.cache).get(key).copied()
    }

    fn remember(&self, key: OpKey, res: Bdd) {
        lock(&self.cache).insert(key, res);
    }

    /// Combination rule for two multi-terminal leaves.
    fn combine_terminals(op: BoolOp, t1: i32, t2: i32) -> i32 {
        match op {
            BoolOp::Or | BoolOp::Xor => t1.max(t2),
            BoolOp::And => t1.min(t2),
        }
    }

    pub fn and(&self, a: Bdd, b: Bdd) -> Bdd {
        self.apply(BoolOp::And, a, b)
    }

    pub fn or(&self, a: Bdd, b: Bdd) -> Bdd {
        self.apply(BoolOp::Or, a, b)
    }

    pub fn xor(&self, a: Bdd, b: Bdd) -> Bdd {
        self.apply(BoolOp::Xor, a, b)
    }

    pub fn and_all(&self, sets: impl IntoIterator<Item = Bdd>) -> Bdd {
        sets.into_iter().fold(Bdd::TRUE, |acc, s| self.and(acc, s))
    }

    pub fn or_all(&self, sets: impl IntoIterator<Item = Bdd>) -> Bdd {
        sets.into_iter().fold(Bdd::FALSE, |acc, s| self.or(acc, s))
    }

    pub fn not(&self, a: Bdd) -> Bdd {
        debug!("not(a = {})", a);

        match a {
            Bdd::FALSE => return Bdd::TRUE,
            Bdd::TRUE => return Bdd::FALSE,
            _ => {}
        }

        let key = OpKey::Not(a);
        if let Some(res) = self.cached(&key) {
            debug!("cache: not({}) -> {}", a, res);
            return res;
        }

        let node = self.node(a);
        // Complement is not defined on a multi-terminal leaf; it is kept as is.
        let res = if node.is_leaf() {
            a
        } else {
            let one = self.not(node.one);
            let zero = self.not(node.zero);
            self.mk_node(node.ordinal, one, zero)
        };

        self.remember(key, res);
        res
    }

    fn apply(&self, op: BoolOp, a: Bdd, b: Bdd) -> Bdd {
        debug!("apply(op = {:?}, a = {}, b = {})", op, a, b);

        match op {
            BoolOp::Or => {
                // or(0,b) => b
                if a == Bdd::FALSE {
                    return b;
                }
                // or(a,0) => a
                if b == Bdd::FALSE {
                    return a;
                }
                // or(1,b) => 1
                if a == Bdd::TRUE || b == Bdd::TRUE {
                    return Bdd::TRUE;
                }
                // or(a,a) => a
                if a == b {
                    return a;
                }
            }
            BoolOp::And => {
                // and(1,b) => b
                if a == Bdd::TRUE {
                    return b;
                }
                // and(a,1) => a
                if b == Bdd::TRUE {
                    return a;
                }
                // and(0,b) => 0
                if a == Bdd::FALSE || b == Bdd::FALSE {
                    return Bdd::FALSE;
                }
                // and(a,a) => a
                if a == b {
                    return a;
                }
            }
            BoolOp::Xor => {
                if a == Bdd::FALSE {
                    return b;
                }
                if b == Bdd::FALSE {
                    return a;
                }
                // xor(a,a) => 0
                if a == b {
                    return Bdd::FALSE;
                }
                // xor(1,b) => ~b
                if a == Bdd::TRUE {
                    return self.not(b);
                }
                if b == Bdd::TRUE {
                    return self.not(a);
                }
            }
        }

        let key = OpKey::bin(op, a, b);
        if let Some(res) = self.cached(&key) {
            debug!("cache: {:?}({}, {}) -> {}", op, a, b, res);
            return res;
        }

        let na = self.node(a);
        let nb = self.node(b);

        let res = if na.is_leaf() && nb.is_leaf() {
            // Both are multi-terminal leaves here.
            self.mk_leaf(Self::combine_terminals(op, na.ordinal, nb.ordinal))
        } else if na.is_leaf() || (!nb.is_leaf() && nb.ordinal > na.ordinal) {
            let t = self.apply(op, a, nb.one);
            let f = self.apply(op, a, nb.zero);
            if t == f {
                t
            } else {
                self.mk_node(nb.ordinal, t, f)
            }
        } else if nb.is_leaf() || na.ordinal > nb.ordinal {
            let t = self.apply(op, na.one, b);
            let f = self.apply(op, na.zero, b);
            if t == f {
                t
            } else {
                self.mk_node(na.ordinal, t, f)
            }
        } else {
            let t = self.apply(op, na.one, nb.one);
            let f = self.apply(op, na.zero, nb.zero);
            if t == f {
                t
            } else {
                self.mk_node(na.ordinal, t, f)
            }
        };

        self.remember(key, res);
        res
    }

    pub fn is_satisfiable(&self, set: Bdd) -> bool {
        set != Bdd::FALSE
    }

    pub fn are_equivalent(&self, a: Bdd, b: Bdd) -> bool {
        self.xor(a, b) == Bdd::FALSE
    }
}

impl BddAlgebra {
    /// Set of all values whose bits `0..=max_bit` lie in `[m, n]`.
    pub fn mk_set_from_range(&self, m: u32, n: u32, max_bit: u32) -> Bdd {
        debug!("mk_set_from_range(m = {}, n = {}, max_bit = {})", m, n, max_bit);
        assert!(max_bit <= 31, "max_bit should be in the range 0..=31");

        if n < m {
            return Bdd::FALSE;
        }

        let mask = 1u64 << max_bit;
        let filter = (mask << 1) - 1;
        let m = m as u64 & filter;
        let n = n as u64 & filter;

        self.interval(mask, max_bit as i32, m, n)
    }

    /// Set of all values whose bits `0..=max_bit` equal `n`.
    pub fn mk_set_from(&self, n: u32, max_bit: u32) -> Bdd {
        self.mk_set_from_range(n, n, max_bit)
    }

    fn interval(&self, mask: u64, bit: i32, m: u64, n: u64) -> Bdd {
        if mask == 1 {
            return if n == 0 {
                self.mk_node(bit, Bdd::FALSE, Bdd::TRUE)
            } else if m == 1 {
                self.mk_node(bit, Bdd::TRUE, Bdd::FALSE)
            } else {
                Bdd::TRUE
            };
        }

        // Full interval
        if m == 0 && n == (mask << 1) - 1 {
            return Bdd::TRUE;
        }

        let mb = m & mask;
        let nb = n & mask;

        if nb == 0 {
            // 1-branch is empty
            let zero = self.interval(mask >> 1, bit - 1, m, n);
            self.mk_node(bit, Bdd::FALSE, zero)
        } else if mb == mask {
            // 0-branch is empty
            let one = self.interval(mask >> 1, bit - 1, m & !mask, n & !mask);
            self.mk_node(bit, one, Bdd::FALSE)
        } else {
            let zero = self.interval(mask >> 1, bit - 1, m, mask - 1);
            let one = self.interval(mask >> 1, bit - 1, 0, n & !mask);
            self.mk_node(bit, one, zero)
        }
    }

    /// Shift every element `k` bits to the left.
    pub fn shift_left(&self, set: Bdd, k: u32) -> Bdd {
        self.shift(&mut HashMap::new(), set, k as i32)
    }

    /// Shift every element `k` bits to the right, dropping the low bits.
    pub fn shift_right(&self, set: Bdd, k: u32) -> Bdd {
        self.shift(&mut HashMap::new(), set, -(k as i32))
    }

    fn shift(&self, memo: &mut HashMap<Bdd, Bdd>, set: Bdd, k: i32) -> Bdd {
        let node = self.node(set);
        if node.is_leaf() || k == 0 {
            return set;
        }

        let ordinal = node.ordinal + k;
        if ordinal < 0 {
            return Bdd::TRUE;
        }

        if let Some(&res) = memo.get(&set) {
            return res;
        }

        let zero = self.shift(memo, node.zero, k);
        let one = self.shift(memo, node.one, k);
        let res = if zero == one {
            zero
        } else {
            self.mk_node(ordinal, one, zero)
        };
        memo.insert(set, res);
        res
    }

    /// Replace the `True` leaf with the multi-terminal leaf `terminal`.
    pub fn replace_true(&self, set: Bdd, terminal: i32) -> Bdd {
        debug!("replace_true(set = {}, terminal = {})", set, terminal);
        let leaf = self.mk_leaf(terminal);
        self.replace_true_rec(&mut HashMap::new(), set, leaf)
    }

    fn replace_true_rec(&self, memo: &mut HashMap<Bdd, Bdd>, set: Bdd, leaf: Bdd) -> Bdd {
        if set == Bdd::TRUE {
            return leaf;
        }
        let node = self.node(set);
        if node.is_leaf() {
            return set;
        }
        if let Some(&res) = memo.get(&set) {
            return res;
        }
        let one = self.replace_true_rec(memo, node.one, leaf);
        let zero = self.replace_true_rec(memo, node.zero, leaf);
        let res = self.mk_node(node.ordinal, one, zero);
        memo.insert(set, res);
        res
    }

    /// Follow `input` down to a leaf and return the leaf's ordinal.
    pub fn find(&self, set: Bdd, input: u64) -> i32 {
        let mut node = self.node(set);
        while !node.is_leaf() {
            let next = if input & (1u64 << node.ordinal) == 0 {
                node.zero
            } else {
                node.one
            };
            node = self.node(next);
        }
        node.ordinal
    }

    pub fn contains(&self, set: Bdd, input: u64) -> bool {
        self.find(set, input) == TRUE_ORDINAL
    }

    /// Smallest element of a non-empty set.
    pub fn get_min(&self, set: Bdd) -> Result<u64> {
        if set == Bdd::FALSE {
            return Err(Error::EmptySet);
        }
        let mut res = 0u64;
        let mut node = self.node(set);
        while !node.is_leaf() {
            if node.zero == Bdd::FALSE {
                res |= 1u64 << node.ordinal;
                node = self.node(node.one);
            } else {
                node = self.node(node.zero);
            }
        }
        Ok(res)
    }

    /// Number of elements of `set` among the values of bits `0..=max_bit`.
    pub fn compute_domain_size(&self, set: Bdd, max_bit: u32) -> Result<BigUint> {
        let node = self.node(set);
        if set != Bdd::FALSE && set != Bdd::TRUE {
            if node.is_leaf() {
                return Err(Error::InvalidArgument(
                    "domain size of a multi-terminal BDD".to_string(),
                ));
            }
            if node.ordinal > max_bit as i32 {
                return Err(Error::InvalidArgument(format!(
                    "max_bit {} is below the ordinal {}",
                    max_bit, node.ordinal
                )));
            }
        }
        self.size_below(&mut HashMap::new(), set, max_bit as i32 + 1)
    }

    /// Count of assignments to the `bits` lowest bits that are in `set`.
    fn size_below(&self, memo: &mut HashMap<Bdd, BigUint>, set: Bdd, bits: i32) -> Result<BigUint> {
        match set {
            Bdd::FALSE => return Ok(BigUint::from(0u32)),
            Bdd::TRUE => return Ok(BigUint::from(1u32) << bits as usize),
            _ => {}
        }
        let node = self.node(set);
        if node.is_leaf() {
            return Err(Error::InvalidArgument(
                "domain size of a multi-terminal BDD".to_string(),
            ));
        }
        let own = match memo.get(&set) {
            Some(size) => size.clone(),
            None => {
                let size = self.size_below(memo, node.one, node.ordinal)?
                    + self.size_below(memo, node.zero, node.ordinal)?;
                memo.insert(set, size.clone());
                size
            }
        };
        Ok(own << (bits - 1 - node.ordinal) as usize)
    }

    /// All non-Boolean nodes reachable from `set`, children before parents.
    ///
    /// Multi-terminal leaves come first, then inner nodes by increasing ordinal,
    /// so the root is last.
    pub fn topological_sort(&self, set: Bdd) -> Vec<Bdd> {
        if set == Bdd::FALSE || set == Bdd::TRUE {
            return Vec::new();
        }
        let root = self.node(set);
        if root.is_leaf() {
            return vec![set];
        }

        let mut sorted = Vec::new();
        let mut by_ordinal: Vec<Vec<Bdd>> = vec![Vec::new(); root.ordinal as usize + 1];
        let mut to_visit = vec![set];
        let mut visited = HashSet::new();
        visited.insert(set);

        while let Some(current) = to_visit.pop() {
            if current == Bdd::FALSE || current == Bdd::TRUE {
                continue;
            }
            let node = self.node(current);
            if node.is_leaf() {
                sorted.push(current);
            } else {
                by_ordinal[node.ordinal as usize].push(current);
                for child in [node.zero, node.one] {
                    if visited.insert(child) {
                        to_visit.push(child);
                    }
                }
            }
        }

        sorted.extend(by_ordinal.into_iter().flatten());
        sorted
    }

    /// If the only non-`False` leaf of `set` is a single multi-terminal leaf,
    /// return that leaf.
    pub fn is_essentially_boolean(&self, set: Bdd) -> Option<Bdd> {
        if set == Bdd::FALSE || set == Bdd::TRUE {
            return None;
        }

        let mut leaf = None;
        let mut to_visit = vec![set];
        let mut visited = HashSet::new();

        while let Some(current) = to_visit.pop() {
            match current {
                Bdd::FALSE => continue,
                Bdd::TRUE => return None,
                _ => {}
            }
            let node = self.node(current);
            if node.is_leaf() {
                match leaf {
                    None => leaf = Some(current),
                    Some(l) if l != current => return None,
                    Some(_) => {}
                }
            } else {
                for child in [node.zero, node.one] {
                    if visited.insert(child) {
                        to_visit.push(child);
                    }
                }
            }
        }

        leaf
    }
}
