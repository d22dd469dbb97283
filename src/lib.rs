//! # symbolic-regex: derivative-based regular expressions over character algebras
//!
//! **`symbolic-regex`** represents regular expressions as hash-consed symbolic terms whose
//! character classes are predicates of an effective Boolean algebra. Matching states are
//! computed lazily as Brzozowski (or Antimirov) derivatives and cached per builder.
//!
//! ## Character algebras
//!
//! Every regex is generic over a [`CharAlgebra`][crate::algebra::CharAlgebra]:
//!
//! - [`CharSetSolver`][crate::charset::CharSetSolver]: BDDs over the 16 bits of a UTF-16 code unit,
//!   built on the hash-consed [`BddAlgebra`][crate::bdd::BddAlgebra].
//! - [`BitVectorAlgebra`][crate::bitvector::BitVectorAlgebra]: sets as 64-bit masks over a fixed
//!   partition (the minterms of a regex), with a classifier mapping characters to atoms.
//!
//! A regex built over BDDs is moved into the bitvector algebra with
//! [`transform`][crate::builder::SymbolicRegexBuilder::transform].
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use symbolic_regex::ast::{ClassKind, Regex};
//! use symbolic_regex::builder::SymbolicRegexBuilder;
//! use symbolic_regex::charset::CharSetSolver;
//!
//! let builder = SymbolicRegexBuilder::new(Arc::new(CharSetSolver::new()));
//!
//! // a\d+
//! let regex = Regex::concat([Regex::literal("a"), Regex::plus(Regex::class(ClassKind::Digit))]);
//! let root = builder.compile(&regex).unwrap();
//!
//! let matcher = builder.matcher(root.clone());
//! assert!(matcher.accepts("a42"));
//! assert!(!matcher.accepts("a"));
//!
//! // Terms can be printed and serialized.
//! assert_eq!(builder.pretty_print(&root), "a\\d+");
//! let text = builder.serialize(&root).unwrap();
//! assert_eq!(builder.deserialize(&text).unwrap(), root);
//! ```
//!
//! ## Core Components
//!
//! - **[`builder`]**: The [`SymbolicRegexBuilder`][crate::builder::SymbolicRegexBuilder] owning the node cache and smart constructors.
//! - **[`derivative`]**: Derivatives, anchor pruning, start sets, minterms, reversal and prefixes.
//! - **[`state`]**: Cached DFA states, the transition table and a simple [`Matcher`][crate::state::Matcher].
//! - **[`transition`]**: Transition regexes, the symbolic form of all derivatives at once.
//! - **[`serialize`]** and **[`print`]**: Textual forms of regexes.

pub mod algebra;
pub mod ast;
pub mod base64;
pub mod bdd;
pub mod bdd_serialize;
pub mod bitvector;
pub mod builder;
pub mod cache;
pub mod char_kind;
pub mod charset;
pub mod classifier;
pub mod derivative;
pub mod error;
pub mod info;
pub mod minterm;
pub mod node;
pub mod print;
pub mod ranges;
pub mod serialize;
pub mod state;
pub mod table;
pub mod transition;
pub mod utils;
