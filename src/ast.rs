//! Parsed regex trees, the input of [`SymbolicRegexBuilder::compile`].

use log::debug;

use crate::algebra::CharAlgebra;
use crate::builder::SymbolicRegexBuilder;
use crate::error::{Error, Result};
use crate::node::{Node, INFINITE};

/// Zero-width assertions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Anchor {
    /// `\A`, start of input.
    Start,
    /// `\z`, end of input.
    End,
    /// `\Z`, end of input or before a final `\n`.
    EndZ,
    /// Mirror of `\Z`, used by reversed regexes.
    EndZRev,
    /// `^` in multiline mode.
    Bol,
    /// `$` in multiline mode.
    Eol,
    /// `\b`.
    WordBoundary,
    /// `\B`.
    NonWordBoundary,
}

/// Predefined character classes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ClassKind {
    Digit,
    Word,
    Space,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Regex {
    /// Matches the empty string.
    Empty,
    /// Matches nothing.
    Nothing,
    /// A sequence of UTF-16 code units.
    Literal(Vec<u16>),
    /// Inclusive code unit ranges, optionally negated.
    Set { ranges: Vec<(u16, u16)>, negated: bool },
    Class { kind: ClassKind, negated: bool },
    /// Any code unit, `\n` included only when `newline` is set.
    Any { newline: bool },
    Concat(Vec<Regex>),
    Alternate(Vec<Regex>),
    Intersect(Vec<Regex>),
    Complement(Box<Regex>),
    Repeat {
        body: Box<Regex>,
        lower: u32,
        upper: Option<u32>,
        lazy: bool,
    },
    Anchor(Anchor),
    Group(Box<Regex>),
}

impl Regex {
    pub fn literal(s: &str) -> Self {
        Regex::Literal(s.encode_utf16().collect())
    }

    pub fn range(lo: char, hi: char) -> Self {
        Regex::Set {
            ranges: vec![(lo as u16, hi as u16)],
            negated: false,
        }
    }

    pub fn class(kind: ClassKind) -> Self {
        Regex::Class { kind, negated: false }
    }

    pub fn concat(items: impl IntoIterator<Item = Regex>) -> Self {
        Regex::Concat(items.into_iter().collect())
    }

    pub fn alternate(items: impl IntoIterator<Item = Regex>) -> Self {
        Regex::Alternate(items.into_iter().collect())
    }

    pub fn intersect(items: impl IntoIterator<Item = Regex>) -> Self {
        Regex::Intersect(items.into_iter().collect())
    }

    pub fn complement(value: Self) -> Self {
        match value {
            Regex::Complement(inner) => *inner,
            _ => Regex::Complement(Box::new(value)),
        }
    }

    pub fn repeat(body: Self, lower: u32, upper: Option<u32>) -> Self {
        Regex::Repeat {
            body: Box::new(body),
            lower,
            upper,
            lazy: false,
        }
    }

    pub fn lazy(body: Self, lower: u32, upper: Option<u32>) -> Self {
        Regex::Repeat {
            body: Box::new(body),
            lower,
            upper,
            lazy: true,
        }
    }

    pub fn star(body: Self) -> Self {
        Self::repeat(body, 0, None)
    }

    pub fn plus(body: Self) -> Self {
        Self::repeat(body, 1, None)
    }

    pub fn maybe(body: Self) -> Self {
        Self::repeat(body, 0, Some(1))
    }

    pub fn anchor(anchor: Anchor) -> Self {
        Regex::Anchor(anchor)
    }

    pub fn group(value: Self) -> Self {
        Regex::Group(Box::new(value))
    }
}

impl<A: CharAlgebra> SymbolicRegexBuilder<A> {
    /// Canonical node of `regex`.
    ///
    /// Using a line or word-boundary anchor switches on the matching character
    /// context tracking of this builder.
    pub fn compile(&self, regex: &Regex) -> Result<Node<A::Set>> {
        debug!("compile(regex = {:?})", regex);
        let node = self.convert(regex, true, 0)?;
        self.check_depth(node)
    }

    fn class_set(&self, kind: ClassKind, negated: bool) -> A::Set {
        let solver = self.solver().solver();
        let set = match kind {
            ClassKind::Digit => solver.digit(),
            ClassKind::Word => solver.word_letter_set(),
            ClassKind::Space => solver.whitespace(),
        };
        let set = if negated { solver.algebra().not(set) } else { set };
        self.solver().from_char_set(set)
    }

    fn convert(&self, regex: &Regex, top_level: bool, depth: usize) -> Result<Node<A::Set>> {
        if depth > self.config().max_depth {
            return Err(Error::PatternTooComplex {
                depth: self.config().max_depth,
            });
        }
        let depth = depth + 1;

        let node = match regex {
            Regex::Empty => self.epsilon(),
            Regex::Nothing => self.nothing(),
            Regex::Literal(units) => {
                let solver = self.solver();
                let seq: Vec<_> = units.iter().map(|&c| solver.char_set(c)).collect();
                self.mk_sequence(&seq, top_level)
            }
            Regex::Set { ranges, negated } => {
                let solver = self.solver().solver();
                let mut set = solver.mk_char_set_from_ranges(ranges);
                if *negated {
                    set = solver.algebra().not(set);
                }
                self.mk_singleton(self.solver().from_char_set(set))
            }
            Regex::Class { kind, negated } => self.mk_singleton(self.class_set(*kind, *negated)),
            Regex::Any { newline: true } => self.dot(),
            Regex::Any { newline: false } => {
                let solver = self.solver();
                self.mk_singleton(solver.not(solver.newline()))
            }
            Regex::Concat(_) => {
                let mut flat = Vec::new();
                flatten_concat(regex, &mut flat);
                let elems = flat
                    .into_iter()
                    .map(|r| self.convert(r, false, depth))
                    .collect::<Result<Vec<_>>>()?;
                self.mk_concat_all(&elems, top_level)
            }
            Regex::Alternate(items) => {
                let elems = items
                    .iter()
                    .map(|r| self.convert(r, top_level, depth))
                    .collect::<Result<Vec<_>>>()?;
                self.mk_or(&elems)
            }
            Regex::Intersect(items) => {
                let elems = items
                    .iter()
                    .map(|r| self.convert(r, false, depth))
                    .collect::<Result<Vec<_>>>()?;
                self.mk_and(&elems)
            }
            Regex::Complement(inner) => {
                let inner = self.convert(inner, false, depth)?;
                self.mk_not(inner)
            }
            Regex::Repeat {
                body,
                lower,
                upper,
                lazy,
            } => {
                let body = self.convert(body, false, depth)?;
                self.mk_loop(body, *lazy, *lower, upper.unwrap_or(INFINITE))?
            }
            Regex::Anchor(anchor) => self.mk_anchor(*anchor),
            Regex::Group(inner) => self.convert(inner, top_level, depth)?,
        };
        Ok(node)
    }
}

/// Elements of nested concatenations, groups around them included, in order.
fn flatten_concat<'a>(regex: &'a Regex, out: &mut Vec<&'a Regex>) {
    let mut stack = vec![regex];
    while let Some(current) = stack.pop() {
        match current {
            Regex::Concat(items) => stack.extend(items.iter().rev()),
            Regex::Group(inner) if matches!(**inner, Regex::Concat(_)) => stack.push(inner),
            _ => out.push(current),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_log::test;

    use super::*;
    use crate::builder::BuilderConfig;
    use crate::charset::CharSetSolver;
    use crate::node::NodeKind;

    fn setup() -> SymbolicRegexBuilder<CharSetSolver> {
        SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()))
    }

    #[test]
    fn test_smart_constructors() {
        let r = Regex::literal("ab");
        assert_eq!(Regex::complement(Regex::complement(r.clone())), r);
        assert_eq!(
            Regex::star(Regex::range('a', 'z')),
            Regex::Repeat {
                body: Box::new(Regex::range('a', 'z')),
                lower: 0,
                upper: None,
                lazy: false,
            }
        );
    }

    #[test]
    fn test_compile_literal() {
        let b = setup();
        let node = b.compile(&Regex::literal("ab")).unwrap();
        // a, b and the watchdog of length 2
        let elems = node.concat_elems();
        assert_eq!(elems.len(), 3);
        assert_eq!(elems[2].watchdog(), Some(2));
        assert_eq!(node.fixed_length(), Some(2));

        let inner = b.compile(&Regex::star(Regex::literal("ab"))).unwrap();
        assert!(inner.is_star());
        match inner.kind() {
            NodeKind::Loop { body, .. } => assert_eq!(body.concat_elems().len(), 2),
            _ => panic!("expected a loop"),
        }
    }

    #[test]
    fn test_compile_concat_is_flat() {
        let b = setup();
        let regex = Regex::concat([
            Regex::literal("a"),
            Regex::group(Regex::concat([Regex::literal("b"), Regex::class(ClassKind::Digit)])),
            Regex::Empty,
        ]);
        let node = b.compile(&regex).unwrap();
        assert_eq!(node.concat_elems().len(), 4);
        assert_eq!(node.concat_elems()[3].watchdog(), Some(3));
    }

    #[test]
    fn test_compile_sets() {
        let b = setup();
        let solver = b.solver();
        let node = b.compile(&Regex::range('0', '9')).unwrap();
        match node.kind() {
            NodeKind::Singleton(set) => {
                assert!(solver.contains(*set, '5' as u16));
                assert!(!solver.contains(*set, 'a' as u16));
            }
            _ => panic!("expected a singleton"),
        }
        assert!(b.compile(&Regex::Any { newline: true }).unwrap().ptr_eq(&b.dot()));
        assert!(b.compile(&Regex::Nothing).unwrap().ptr_eq(&b.nothing()));
        assert!(b.compile(&Regex::Empty).unwrap().ptr_eq(&b.epsilon()));
        let negated = Regex::Set {
            ranges: vec![(0, 0xFFFF)],
            negated: true,
        };
        assert!(b.compile(&negated).unwrap().ptr_eq(&b.nothing()));
    }

    #[test]
    fn test_compile_anchors_enable_context() {
        let b = setup();
        assert_eq!(b.word_letter_predicate(), b.solver().empty());
        assert_eq!(b.newline_predicate(), b.solver().empty());
        b.compile(&Regex::anchor(Anchor::WordBoundary)).unwrap();
        assert_eq!(b.word_letter_predicate(), b.solver().word_letter());
        assert_eq!(b.newline_predicate(), b.solver().empty());
        b.compile(&Regex::anchor(Anchor::Bol)).unwrap();
        assert_eq!(b.newline_predicate(), b.solver().newline());
    }

    #[test]
    fn test_compile_errors() {
        let b = setup();
        let bad = Regex::repeat(Regex::literal("a"), 3, Some(2));
        assert!(matches!(b.compile(&bad), Err(Error::InvalidArgument(_))));

        let b = SymbolicRegexBuilder::with_config(
            Arc::new(CharSetSolver::new()),
            BuilderConfig::default().with_max_depth(10),
        );
        let mut deep = Regex::literal("a");
        for _ in 0..20 {
            deep = Regex::complement(Regex::group(deep));
        }
        assert_eq!(b.compile(&deep), Err(Error::PatternTooComplex { depth: 10 }));
    }

    #[test]
    fn test_compile_nested_concat() {
        let mut nested = Regex::literal("a");
        for _ in 0..200 {
            nested = Regex::concat([Regex::literal("b"), Regex::group(nested)]);
        }

        let node = setup().compile(&nested).unwrap();
        let elems = node.concat_elems();
        assert_eq!(elems.len(), 202);
        assert_eq!(elems[201].watchdog(), Some(201));

        // Chains count once towards the depth bound, however deeply the input nests them.
        assert!(node.depth() < 10);
        let b = SymbolicRegexBuilder::with_config(
            Arc::new(CharSetSolver::new()),
            BuilderConfig::default().with_max_depth(10),
        );
        assert!(b.compile(&nested).is_ok());
    }
}
