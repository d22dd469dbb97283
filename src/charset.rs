use std::fmt::Write;
use std::sync::OnceLock;

use log::debug;

use crate::algebra::CharAlgebra;
use crate::bdd::{AlgebraConfig, Bdd, BddAlgebra};
use crate::error::{Error, Result};

/// Highest bit of a UTF-16 code unit.
pub const CHAR_MAX_BIT: u32 = 15;

/// BDD algebra specialized to 16-bit characters.
///
/// Bit `i` of a code unit is BDD ordinal `i`. Predicates for the ASCII
/// characters are built eagerly; the Unicode classes lazily on first use.
pub struct CharSetSolver {
    algebra: BddAlgebra,
    ascii: Vec<Bdd>,
    non_ascii: Bdd,
    word_letter: OnceLock<Bdd>,
    whitespace: OnceLock<Bdd>,
}

impl CharSetSolver {
    pub fn new() -> Self {
        Self::with_config(AlgebraConfig::default())
    }

    pub fn with_config(config: AlgebraConfig) -> Self {
        let algebra = BddAlgebra::with_config(config);
        let ascii = (0..128).map(|c| algebra.mk_set_from(c, CHAR_MAX_BIT)).collect();
        let non_ascii = algebra.mk_set_from_range(0x80, 0xFFFF, CHAR_MAX_BIT);
        Self {
            algebra,
            ascii,
            non_ascii,
            word_letter: OnceLock::new(),
            whitespace: OnceLock::new(),
        }
    }

    /// The underlying BDD manager.
    pub fn algebra(&self) -> &BddAlgebra {
        &self.algebra
    }

    pub fn mk_char(&self, c: u16) -> Bdd {
        match self.ascii.get(c as usize) {
            Some(&set) => set,
            None => self.algebra.mk_set_from(c as u32, CHAR_MAX_BIT),
        }
    }

    pub fn mk_range(&self, lo: u16, hi: u16) -> Bdd {
        if lo == hi {
            return self.mk_char(lo);
        }
        self.algebra.mk_set_from_range(lo as u32, hi as u32, CHAR_MAX_BIT)
    }

    pub fn mk_char_set_from_ranges(&self, ranges: &[(u16, u16)]) -> Bdd {
        self.algebra
            .or_all(ranges.iter().map(|&(lo, hi)| self.mk_range(lo, hi)))
    }

    /// Union of all code units satisfying `pred`, scanned once over the whole range.
    fn mk_from_predicate(&self, pred: impl Fn(char) -> bool) -> Bdd {
        let mut ranges: Vec<(u16, u16)> = Vec::new();
        for u in 0..=0xFFFFu16 {
            let holds = char::from_u32(u as u32).map_or(false, &pred);
            if !holds {
                continue;
            }
            if let Some(last) = ranges.last_mut() {
                if last.1 + 1 == u {
                    last.1 = u;
                    continue;
                }
            }
            ranges.push((u, u));
        }
        self.mk_char_set_from_ranges(&ranges)
    }

    pub fn newline_set(&self) -> Bdd {
        self.mk_char(b'\n' as u16)
    }

    /// `\w`: alphanumeric characters and `_`.
    pub fn word_letter_set(&self) -> Bdd {
        *self.word_letter.get_or_init(|| {
            debug!("computing word-letter predicate");
            self.mk_from_predicate(|c| c.is_alphanumeric() || c == '_')
        })
    }

    /// `\s`
    pub fn whitespace(&self) -> Bdd {
        *self
            .whitespace
            .get_or_init(|| self.mk_from_predicate(char::is_whitespace))
    }

    /// `\d` restricted to ASCII digits.
    pub fn digit(&self) -> Bdd {
        self.mk_range(b'0' as u16, b'9' as u16)
    }

    pub fn ascii(&self) -> Bdd {
        self.algebra.not(self.non_ascii)
    }

    pub fn non_ascii(&self) -> Bdd {
        self.non_ascii
    }

    pub fn contains(&self, set: Bdd, c: u16) -> bool {
        self.algebra.contains(set, c as u64)
    }

    pub fn to_ranges(&self, set: Bdd) -> Vec<(u16, u16)> {
        self.algebra
            .all_ranges(set, CHAR_MAX_BIT)
            .into_iter()
            .map(|(lo, hi)| (lo as u16, hi as u16))
            .collect()
    }

    /// Number of code units in `set`; fails on a multi-terminal BDD.
    pub fn compute_domain_size(&self, set: Bdd) -> Result<u64> {
        let size = self.algebra.compute_domain_size(set, CHAR_MAX_BIT)?;
        u64::try_from(&size).map_err(|_| Error::InvalidArgument(format!("domain size {} exceeds u64", size)))
    }

    pub fn is_singleton(&self, set: Bdd) -> bool {
        matches!(self.to_ranges(set)[..], [(lo, hi)] if lo == hi)
    }

    /// All code units of `set`, ascending or descending.
    pub fn generate_all_characters(&self, set: Bdd, reverse: bool) -> Vec<u16> {
        let ranges = self.to_ranges(set);
        let mut res: Vec<u16> = ranges.into_iter().flat_map(|(lo, hi)| lo..=hi).collect();
        if reverse {
            res.reverse();
        }
        res
    }

    fn represent_ranges(&self, ranges: &[(u16, u16)]) -> String {
        let mut s = String::new();
        for &(lo, hi) in ranges {
            escape(lo, &mut s);
            if hi.checked_sub(lo) == Some(1) {
                escape(hi, &mut s);
            } else if hi > lo {
                s.push('-');
                escape(hi, &mut s);
            }
        }
        s
    }
}

impl Default for CharSetSolver {
    fn default() -> Self {
        CharSetSolver::new()
    }
}

impl std::fmt::Debug for CharSetSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharSetSolver")
            .field("algebra", &self.algebra)
            .finish()
    }
}

/// Append `c` escaped for use inside or outside a character class.
pub(crate) fn escape(c: u16, out: &mut String) {
    match c {
        0x0A => out.push_str("\\n"),
        0x0D => out.push_str("\\r"),
        0x09 => out.push_str("\\t"),
        0x0C => out.push_str("\\f"),
        0x0B => out.push_str("\\v"),
        0x07 => out.push_str("\\a"),
        0x1B => out.push_str("\\e"),
        _ => match char::from_u32(c as u32) {
            Some(ch) if "\\.[]{}()*+?|^$-".contains(ch) => {
                out.push('\\');
                out.push(ch);
            }
            Some(ch) if (0x20..0x7F).contains(&c) => out.push(ch),
            _ => {
                let _ = write!(out, "\\u{:04X}", c);
            }
        },
    }
}

impl CharAlgebra for CharSetSolver {
    type Set = Bdd;

    fn full(&self) -> Bdd {
        Bdd::TRUE
    }
    fn empty(&self) -> Bdd {
        Bdd::FALSE
    }

    fn and(&self, a: Bdd, b: Bdd) -> Bdd {
        self.algebra.and(a, b)
    }
    fn or(&self, a: Bdd, b: Bdd) -> Bdd {
        self.algebra.or(a, b)
    }
    fn not(&self, a: Bdd) -> Bdd {
        self.algebra.not(a)
    }

    fn is_satisfiable(&self, a: Bdd) -> bool {
        self.algebra.is_satisfiable(a)
    }
    fn are_equivalent(&self, a: Bdd, b: Bdd) -> bool {
        self.algebra.are_equivalent(a, b)
    }

    fn serialize_predicate(&self, set: Bdd, out: &mut String) -> Result<()> {
        self.algebra.serialize_to(set, out)
    }
    fn deserialize_predicate(&self, s: &str) -> Result<Bdd> {
        self.algebra.deserialize_str(s)
    }

    fn pretty_print(&self, set: Bdd) -> String {
        if set == Bdd::FALSE {
            return "[]".to_string();
        }
        if set == Bdd::TRUE {
            return ".".to_string();
        }

        let w = self.word_letter_set();
        let s = self.whitespace();
        let d = self.digit();
        for (class, name) in [(w, "\\w"), (s, "\\s"), (d, "\\d")] {
            if set == class {
                return name.to_string();
            }
        }
        for (class, name) in [(w, "\\W"), (s, "\\S"), (d, "\\D")] {
            if set == self.algebra.not(class) {
                return name.to_string();
            }
        }

        let ranges = self.to_ranges(set);
        if let [(lo, hi)] = ranges[..] {
            if lo == hi {
                let mut out = String::new();
                escape(lo, &mut out);
                return out;
            }
        }

        let direct = format!("[{}]", self.represent_ranges(&ranges));
        let complement = format!("[^{}]", self.represent_ranges(&self.to_ranges(self.algebra.not(set))));
        if direct.len() <= complement.len() {
            direct
        } else {
            complement
        }
    }

    fn newline(&self) -> Bdd {
        self.newline_set()
    }
    fn word_letter(&self) -> Bdd {
        self.word_letter_set()
    }
    fn char_set(&self, c: u16) -> Bdd {
        self.mk_char(c)
    }

    fn solver(&self) -> &CharSetSolver {
        self
    }
    fn to_char_set(&self, set: Bdd) -> Bdd {
        set
    }
    fn from_char_set(&self, set: Bdd) -> Bdd {
        set
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_chars() {
        let solver = CharSetSolver::new();
        let a = solver.mk_char('a' as u16);
        assert_eq!(a, solver.mk_range('a' as u16, 'a' as u16));
        assert!(solver.contains(a, 'a' as u16));
        assert!(!solver.contains(a, 'b' as u16));
        assert!(solver.is_singleton(a));
        let euro = solver.mk_char(0x20AC);
        assert!(solver.contains(euro, 0x20AC));
        assert!(solver.contains(solver.non_ascii(), 0x20AC));
        assert!(!solver.contains(solver.ascii(), 0x20AC));
    }

    #[test]
    fn test_classes() {
        let solver = CharSetSolver::new();
        let w = solver.word_letter_set();
        assert!(solver.contains(w, 'x' as u16));
        assert!(solver.contains(w, '_' as u16));
        assert!(solver.contains(w, '7' as u16));
        assert!(solver.contains(w, 0x00E9)); // é
        assert!(!solver.contains(w, ' ' as u16));
        assert!(!solver.contains(w, '-' as u16));

        let s = solver.whitespace();
        assert!(solver.contains(s, ' ' as u16));
        assert!(solver.contains(s, '\n' as u16));
        assert!(!solver.contains(s, 'a' as u16));

        assert_eq!(solver.compute_domain_size(solver.digit()), Ok(10));
        let mt = solver.algebra().replace_true(solver.digit(), 3);
        assert!(solver.compute_domain_size(mt).is_err());
    }

    #[test]
    fn test_generate_all_characters() {
        let solver = CharSetSolver::new();
        let set = solver.mk_char_set_from_ranges(&[('a' as u16, 'c' as u16), ('x' as u16, 'x' as u16)]);
        let chars = solver.generate_all_characters(set, false);
        assert_eq!(chars, vec!['a' as u16, 'b' as u16, 'c' as u16, 'x' as u16]);
        let rev = solver.generate_all_characters(set, true);
        assert_eq!(rev, vec!['x' as u16, 'c' as u16, 'b' as u16, 'a' as u16]);
        assert!(solver.generate_all_characters(Bdd::FALSE, false).is_empty());
    }

    #[test]
    fn test_pretty_print() {
        let solver = CharSetSolver::new();
        assert_eq!(solver.pretty_print(Bdd::TRUE), ".");
        assert_eq!(solver.pretty_print(Bdd::FALSE), "[]");
        assert_eq!(solver.pretty_print(solver.digit()), "\\d");
        assert_eq!(solver.pretty_print(solver.not(solver.word_letter_set())), "\\W");
        assert_eq!(solver.pretty_print(solver.mk_char('a' as u16)), "a");
        assert_eq!(solver.pretty_print(solver.mk_char('.' as u16)), "\\.");
        assert_eq!(solver.pretty_print(solver.newline_set()), "\\n");
        assert_eq!(solver.pretty_print(solver.mk_range('a' as u16, 'z' as u16)), "[a-z]");
        assert_eq!(solver.pretty_print(solver.mk_range('a' as u16, 'b' as u16)), "[ab]");
        assert_eq!(solver.pretty_print(solver.not(solver.newline_set())), "[^\\n]");
    }

    #[test]
    fn test_pretty_print_top_of_range() {
        let solver = CharSetSolver::new();
        let top = solver.mk_char(0xFFFF);
        assert_eq!(solver.pretty_print(top), "\\uFFFF");
        assert_eq!(solver.pretty_print(solver.not(top)), "[^\\uFFFF]");
        assert!(solver.is_singleton(top));
        assert!(!solver.is_singleton(solver.not(top)));
        assert_eq!(solver.pretty_print(solver.mk_range(0xFFFE, 0xFFFF)), "[\\uFFFE\\uFFFF]");

        let surrogates = solver.mk_range(0xD800, 0xDFFF);
        assert_eq!(solver.pretty_print(surrogates), "[\\uD800-\\uDFFF]");
        assert_eq!(solver.to_ranges(solver.not(surrogates)), vec![(0, 0xD7FF), (0xE000, 0xFFFF)]);
    }

    #[test]
    fn test_digit_range_roundtrip() {
        let solver = CharSetSolver::new();
        let mut s = String::new();
        solver.serialize_predicate(solver.digit(), &mut s).unwrap();
        let restored = solver.deserialize_predicate(&s).unwrap();
        assert!(solver.contains(restored, '5' as u16));
        assert!(!solver.contains(restored, 'a' as u16));
    }
}
