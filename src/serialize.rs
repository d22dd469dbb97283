//! Textual serialization of symbolic regexes.
//!
//! Grammar, with predicates in the format of the algebra:
//!
//! ```text
//! R ::= '.' | '[' pred ']' | 'E' | 'W(' n ')'
//!     | 'L(' n ',' (n | '*') ',' R ')' | 'l(' n ',' (n | '*') ',' R ')'
//!     | 'S(' R (',' R)* ')' | 'D(' R (',' R)* ')' | 'C(' R (',' R)* ')' | 'N' R
//!     | 'A' | 'z' | 'Z' | 'a' | '^' | '$' | 'b' | 'B'
//! ```
//!
//! Set elements are written in sorted order, so equal regexes serialize equally.

use log::debug;

use crate::algebra::CharAlgebra;
use crate::ast::Anchor;
use crate::builder::SymbolicRegexBuilder;
use crate::error::{malformed, Error, Result};
use crate::node::{Node, NodeKind, INFINITE};

impl<A: CharAlgebra> SymbolicRegexBuilder<A> {
    pub fn serialize(&self, node: &Node<A::Set>) -> Result<String> {
        let mut out = String::new();
        self.serialize_to(node, &mut out)?;
        Ok(out)
    }

    pub fn serialize_to(&self, node: &Node<A::Set>, out: &mut String) -> Result<()> {
        match node.kind() {
            NodeKind::Singleton(set) => {
                if *set == self.solver().full() {
                    out.push('.');
                } else {
                    out.push('[');
                    self.solver().serialize_predicate(*set, out)?;
                    out.push(']');
                }
            }
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            } => {
                out.push_str(if *lazy { "l(" } else { "L(" });
                out.push_str(&lower.to_string());
                out.push(',');
                if *upper == INFINITE {
                    out.push('*');
                } else {
                    out.push_str(&upper.to_string());
                }
                out.push(',');
                self.serialize_to(body, out)?;
                out.push(')');
            }
            NodeKind::Concat(..) => {
                out.push_str("S(");
                for (i, elem) in node.concat_elems().iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.serialize_to(elem, out)?;
                }
                out.push(')');
            }
            NodeKind::Or(set) | NodeKind::And(set) => {
                let mut elems = set.iter().map(|e| self.serialize(e)).collect::<Result<Vec<_>>>()?;
                elems.sort();
                out.push_str(if matches!(node.kind(), NodeKind::Or(_)) { "D(" } else { "C(" });
                out.push_str(&elems.join(","));
                out.push(')');
            }
            NodeKind::Not(inner) => {
                out.push('N');
                self.serialize_to(inner, out)?;
            }
            NodeKind::WatchDog(length) => {
                out.push_str(&format!("W({})", length));
            }
            NodeKind::Epsilon => out.push('E'),
            NodeKind::StartAnchor => out.push('A'),
            NodeKind::EndAnchor => out.push('z'),
            NodeKind::EndAnchorZ => out.push('Z'),
            NodeKind::EndAnchorZRev => out.push('a'),
            NodeKind::BolAnchor => out.push('^'),
            NodeKind::EolAnchor => out.push('$'),
            NodeKind::WbAnchor => out.push('b'),
            NodeKind::NwbAnchor => out.push('B'),
        }
        Ok(())
    }

    /// Inverse of [`serialize`](Self::serialize).
    pub fn deserialize(&self, s: &str) -> Result<Node<A::Set>> {
        debug!("deserialize(len = {})", s.len());
        let mut parser = Parser {
            builder: self,
            s,
            pos: 0,
        };
        let node = parser.parse(0)?;
        if parser.pos != s.len() {
            return malformed(format!("trailing input at {} in {:?}", parser.pos, s));
        }
        self.check_depth(node)
    }
}

struct Parser<'a, A: CharAlgebra> {
    builder: &'a SymbolicRegexBuilder<A>,
    s: &'a str,
    pos: usize,
}

impl<'a, A: CharAlgebra> Parser<'a, A> {
    fn peek(&self) -> Option<u8> {
        self.s.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<u8> {
        match self.peek() {
            Some(c) => {
                self.pos += 1;
                Ok(c)
            }
            None => malformed(format!("unexpected end of {:?}", self.s)),
        }
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        let pos = self.pos;
        let c = self.bump()?;
        if c != expected {
            return malformed(format!("expected {:?} at {}, found {:?}", expected as char, pos, c as char));
        }
        Ok(())
    }

    fn number(&mut self) -> Result<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = &self.s[start..self.pos];
        digits
            .parse()
            .map_err(|_| Error::Deserialization(format!("bad number {:?} at {}", digits, start)))
    }

    /// `R (',' R)* ')'`, the opening parenthesis already consumed.
    fn sequence(&mut self, depth: usize) -> Result<Vec<Node<A::Set>>> {
        let mut nodes = vec![self.parse(depth)?];
        loop {
            match self.bump()? {
                b',' => nodes.push(self.parse(depth)?),
                b')' => return Ok(nodes),
                c => return malformed(format!("expected ',' or ')' at {}, found {:?}", self.pos - 1, c as char)),
            }
        }
    }

    fn parse(&mut self, depth: usize) -> Result<Node<A::Set>> {
        let max_depth = self.builder.config().max_depth;
        if depth > max_depth {
            return Err(Error::PatternTooComplex { depth: max_depth });
        }
        let depth = depth + 1;
        let b = self.builder;

        let node = match self.bump()? {
            b'.' => b.dot(),
            b'[' => {
                let start = self.pos;
                let Some(len) = self.s[start..].find(']') else {
                    return malformed(format!("unterminated predicate at {}", start));
                };
                self.pos = start + len + 1;
                let set = b.solver().deserialize_predicate(&self.s[start..start + len])?;
                b.mk_singleton(set)
            }
            b'E' => b.epsilon(),
            b'W' => {
                self.expect(b'(')?;
                let length = self.number()?;
                self.expect(b')')?;
                b.mk_watchdog(length)
            }
            c @ (b'L' | b'l') => {
                self.expect(b'(')?;
                let lower = self.number()?;
                self.expect(b',')?;
                let upper = if self.peek() == Some(b'*') {
                    self.pos += 1;
                    INFINITE
                } else {
                    self.number()?
                };
                self.expect(b',')?;
                if lower > upper {
                    return malformed(format!("loop bounds {}..{} are reversed", lower, upper));
                }
                let body = self.parse(depth)?;
                self.expect(b')')?;
                b.repeat(body, c == b'l', lower, upper)
            }
            b'S' => {
                self.expect(b'(')?;
                let nodes = self.sequence(depth)?;
                b.mk_concat_all(&nodes, false)
            }
            b'D' => {
                self.expect(b'(')?;
                b.mk_or(&self.sequence(depth)?)
            }
            b'C' => {
                self.expect(b'(')?;
                b.mk_and(&self.sequence(depth)?)
            }
            b'N' => {
                let inner = self.parse(depth)?;
                b.mk_not(inner)
            }
            b'A' => b.mk_anchor(Anchor::Start),
            b'z' => b.mk_anchor(Anchor::End),
            b'Z' => b.mk_anchor(Anchor::EndZ),
            b'a' => b.mk_anchor(Anchor::EndZRev),
            b'^' => b.mk_anchor(Anchor::Bol),
            b'$' => b.mk_anchor(Anchor::Eol),
            b'b' => b.mk_anchor(Anchor::WordBoundary),
            b'B' => b.mk_anchor(Anchor::NonWordBoundary),
            c => return malformed(format!("unexpected {:?} at {}", c as char, self.pos - 1)),
        };
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_log::test;

    use super::*;
    use crate::ast::{ClassKind, Regex};
    use crate::bitvector::BitVectorAlgebra;
    use crate::builder::BuilderConfig;
    use crate::charset::CharSetSolver;

    fn sample() -> Regex {
        Regex::alternate([
            Regex::concat([
                Regex::anchor(Anchor::WordBoundary),
                Regex::lazy(Regex::class(ClassKind::Digit), 2, Some(5)),
                Regex::anchor(Anchor::EndZ),
            ]),
            Regex::intersect([
                Regex::star(Regex::Any { newline: true }),
                Regex::complement(Regex::literal("ab")),
            ]),
            Regex::concat([Regex::anchor(Anchor::Bol), Regex::plus(Regex::range('a', 'f'))]),
        ])
    }

    #[test]
    fn test_fixed_forms() {
        let b = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
        assert_eq!(b.serialize(&b.dot()).unwrap(), ".");
        assert_eq!(b.serialize(&b.dot_star()).unwrap(), "L(0,*,.)");
        assert_eq!(b.serialize(&b.epsilon()).unwrap(), "E");
        assert_eq!(b.serialize(&b.mk_watchdog(7)).unwrap(), "W(7)");
        let seq = b.compile(&Regex::concat([Regex::anchor(Anchor::Start), Regex::Any { newline: true }])).unwrap();
        assert_eq!(b.serialize(&seq).unwrap(), "S(A,.,W(1))");
        assert!(b.deserialize("L(0,*,.)").unwrap().ptr_eq(&b.dot_star()));
    }

    #[test]
    fn test_roundtrip() {
        let b = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
        let node = b.compile(&sample()).unwrap();
        let s = b.serialize(&node).unwrap();
        let restored = b.deserialize(&s).unwrap();
        assert_eq!(restored, node);
        assert_eq!(b.serialize(&restored).unwrap(), s);

        // A fresh builder rebuilds the same text.
        let fresh = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
        let other = fresh.deserialize(&s).unwrap();
        assert_eq!(fresh.serialize(&other).unwrap(), s);
        assert_eq!(fresh.newline_predicate(), fresh.solver().newline());
    }

    #[test]
    fn test_roundtrip_bitvector() {
        let cb = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
        let node = cb.compile(&sample()).unwrap();
        let bv = BitVectorAlgebra::new(cb.solver_arc(), &cb.minterms(&node)).unwrap();
        let b = SymbolicRegexBuilder::new(Arc::new(bv));
        let node = cb.transform(&node, &b, &|set| b.solver().from_char_set(set));
        let s = b.serialize(&node).unwrap();
        assert_eq!(b.serialize(&b.deserialize(&s).unwrap()).unwrap(), s);
    }

    #[test]
    fn test_malformed() {
        let b = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
        for s in ["", "S(", "S(E", "L(3,2,.)", "L(1,.)", "W(x)", "Q", "[", "E)", "D(.;E)"] {
            assert!(
                matches!(b.deserialize(s), Err(Error::Deserialization(_))),
                "{:?} should be rejected",
                s
            );
        }
    }

    #[test]
    fn test_depth_bound() {
        let b = SymbolicRegexBuilder::with_config(
            Arc::new(CharSetSolver::new()),
            BuilderConfig::default().with_max_depth(8),
        );
        let deep = format!("{}.", "N".repeat(20));
        assert_eq!(b.deserialize(&deep), Err(Error::PatternTooComplex { depth: 8 }));
        assert!(b.deserialize("NNN.").is_ok());
    }
}
