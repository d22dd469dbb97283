//! Regex-like rendering of symbolic regexes, for logs and diagnostics.

use crate::algebra::CharAlgebra;
use crate::builder::SymbolicRegexBuilder;
use crate::node::{Node, NodeKind};

/// Matches nothing; `[]` is not a valid class in most regex dialects.
const EMPTY_CLASS: &str = "[0-[0]]";

impl<A: CharAlgebra> SymbolicRegexBuilder<A> {
    /// Renders `node` in .NET regex syntax; intersection and complement use conditionals.
    pub fn pretty_print(&self, node: &Node<A::Set>) -> String {
        let mut out = String::new();
        self.print_to(node, &mut out);
        out
    }

    fn print_loop_body(&self, body: &Node<A::Set>, out: &mut String) {
        if let NodeKind::Singleton(_) = body.kind() {
            self.print_to(body, out);
        } else {
            out.push('(');
            self.print_to(body, out);
            out.push(')');
        }
    }

    fn print_to(&self, node: &Node<A::Set>, out: &mut String) {
        match node.kind() {
            NodeKind::EndAnchor => out.push_str("\\z"),
            NodeKind::StartAnchor => out.push_str("\\A"),
            NodeKind::BolAnchor => out.push('^'),
            NodeKind::EolAnchor => out.push('$'),
            NodeKind::WbAnchor => out.push_str("\\b"),
            NodeKind::NwbAnchor => out.push_str("\\B"),
            NodeKind::EndAnchorZ => out.push_str("\\Z"),
            NodeKind::EndAnchorZRev => out.push_str("\\a"),
            NodeKind::Epsilon | NodeKind::WatchDog(_) => {}
            NodeKind::Singleton(set) => out.push_str(&self.solver().pretty_print(*set)),
            NodeKind::Concat(..) => {
                for elem in node.concat_elems() {
                    self.print_to(&elem, out);
                }
            }
            NodeKind::Or(set) | NodeKind::And(set) => {
                let mut elems: Vec<String> = set.iter().map(|e| self.pretty_print(e)).collect();
                elems.sort();
                if matches!(node.kind(), NodeKind::Or(_)) {
                    out.push('(');
                    out.push_str(&elems.join("|"));
                    out.push(')');
                } else if let Some(last) = elems.pop() {
                    // (?(A)(B)|[0-[0]]) stands for A & B
                    let res = elems
                        .into_iter()
                        .rev()
                        .fold(last, |acc, e| format!("(?({})({})|{})", e, acc, EMPTY_CLASS));
                    out.push_str(&res);
                }
            }
            NodeKind::Not(inner) => {
                out.push_str("(?(");
                self.print_to(inner, out);
                out.push_str(")[]|.*)");
            }
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            } => {
                let lazy = if *lazy { "?" } else { "" };
                if self.is_dot_star(node) {
                    out.push_str(".*");
                } else if node.is_maybe() {
                    self.print_loop_body(body, out);
                    out.push('?');
                } else if node.is_star() {
                    self.print_loop_body(body, out);
                    out.push('*');
                    out.push_str(lazy);
                } else if node.is_plus() {
                    self.print_loop_body(body, out);
                    out.push('+');
                    out.push_str(lazy);
                } else if *lower == 0 && *upper == 0 {
                    out.push_str("()");
                } else if !node.is_bounded_loop() {
                    self.print_loop_body(body, out);
                    out.push_str(&format!("{{{},}}{}", lower, lazy));
                } else if lower == upper {
                    self.print_loop_body(body, out);
                    out.push_str(&format!("{{{}}}{}", lower, lazy));
                } else {
                    self.print_loop_body(body, out);
                    out.push_str(&format!("{{{},{}}}{}", lower, upper, lazy));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_log::test;

    use super::*;
    use crate::ast::{Anchor, ClassKind, Regex};
    use crate::charset::CharSetSolver;

    fn print(regex: Regex) -> String {
        let b = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
        let node = b.compile(&regex).unwrap();
        b.pretty_print(&node)
    }

    #[test]
    fn test_print_basic() {
        assert_eq!(print(Regex::literal("ab")), "ab");
        assert_eq!(print(Regex::star(Regex::Any { newline: true })), ".*");
        assert_eq!(print(Regex::plus(Regex::class(ClassKind::Digit))), "\\d+");
        assert_eq!(print(Regex::lazy(Regex::literal("ab"), 0, None)), "(ab)*?");
        assert_eq!(print(Regex::maybe(Regex::literal("a"))), "a?");
        assert_eq!(print(Regex::repeat(Regex::literal("a"), 2, None)), "a{2,}");
        assert_eq!(print(Regex::repeat(Regex::literal("a"), 3, Some(3))), "a{3}");
        assert_eq!(print(Regex::lazy(Regex::literal("a"), 2, Some(4))), "a{2,4}?");
        assert_eq!(print(Regex::repeat(Regex::literal("a"), 0, Some(0))), "()");
    }

    #[test]
    fn test_print_anchors_and_sets() {
        let r = Regex::concat([
            Regex::anchor(Anchor::Start),
            Regex::anchor(Anchor::WordBoundary),
            Regex::literal("x"),
            Regex::anchor(Anchor::EndZ),
        ]);
        assert_eq!(print(r), "\\A\\bx\\Z");
        assert_eq!(print(Regex::alternate([Regex::literal("b"), Regex::literal("a")])), "(a|b)");
        assert_eq!(
            print(Regex::intersect([Regex::literal("a"), Regex::star(Regex::range('a', 'b'))])),
            "(?([ab]*)(a)|[0-[0]])"
        );
        assert_eq!(print(Regex::complement(Regex::literal("a"))), "(?(a)[]|.*)");
    }
}
