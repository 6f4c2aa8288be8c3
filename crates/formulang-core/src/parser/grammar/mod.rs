//! Recursive-descent grammar for Formulang source files.
//!
//! One function per production, composed top-down: [`items::parse_root`]
//! drives module-level declarations, which hand off to [`blocks`] for
//! `nutrients`/`ingredients` bodies and [`expr`] for arithmetic. Every
//! production is resilient: on a malformed token it emits a diagnostic,
//! wraps the offending span in an `Error` node, and resynchronizes at a
//! `TokenSet` appropriate to where it was (see `cst::token_sets`), so one
//! mistake never aborts the whole parse.

mod blocks;
mod expr;
mod items;

use crate::parser::core::{ParseResult, Parser, ParserConfig};
use crate::Error;

pub use expr::parse_expr;

/// Parses a complete Formulang source file into a lossless green tree plus
/// diagnostics. Returns `Err` only for fuel/recursion exhaustion; malformed
/// input is always represented in the tree and reported as a diagnostic.
pub fn parse(source: &str, config: ParserConfig) -> Result<ParseResult, Error> {
    let mut parser = Parser::new(source, config);
    items::parse_root(&mut parser)?;
    Ok(parser.finish())
}
