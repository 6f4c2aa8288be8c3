//! Parser infrastructure for Formulang source files.
//!
//! # Architecture
//!
//! This parser produces a lossless concrete syntax tree (CST) via Rowan's green tree builder.
//! Key design decisions borrowed from rust-analyzer, rnix-parser, and taplo:
//!
//! - Zero-copy parsing: tokens carry spans, text sliced only when building tree nodes
//! - Trivia buffering: whitespace/comments collected, then attached as leading trivia
//! - Checkpoint-based wrapping: retroactively wrap nodes once enough lookahead exists
//!   (used to tell a composition reference apart from a plain expression)
//! - Explicit recovery sets: per-production sets determine when to bail vs consume diagnostics
//!
//! # Recovery Strategy
//!
//! The parser is resilient — it always produces a tree. Recovery follows these rules:
//!
//! 1. Unknown tokens get wrapped in `SyntaxKind::Error` nodes and consumed
//! 2. Missing expected tokens emit a diagnostic but don't consume (parent may handle)
//! 3. Recovery sets define "synchronization points" per production
//! 4. On recursion limit, parsing aborts with a hard `Error` rather than looping forever
//!
//! However, fuel exhaustion (`exec_fuel`) and recursion depth (`recursion_limit`) return an
//! actual error immediately rather than a diagnostic, since they indicate the parser itself
//! is no longer making bounded progress.

pub mod ast;
mod cst;
mod lexer;

mod core;
mod grammar;

pub use cst::{SyntaxKind, SyntaxNode, SyntaxToken, token_sets};

pub use ast::{
    unescape_string, Bounds, CompositionRef, CompositionRefKind, ConstraintItem, Decl, Expr,
    FormulaDecl, GroupDecl, ImportBinding, ImportDecl, IngredientDecl, IngredientsBlock, Module,
    NameList, NutrientDecl, NutrientsBlock, PropAssign, Root,
};

pub use core::{ParseResult, Parser, ParserConfig};

pub use grammar::parse;

pub use lexer::{Token, lex, token_text};
