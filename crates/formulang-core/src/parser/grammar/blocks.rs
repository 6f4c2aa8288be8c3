//! `nutrients`/`ingredients` block bodies: composition references and
//! constraint items.
//!
//! The tricky part is telling the two apart. Both start with an identifier
//! and may contain dots; the rule (see the composition reference section of
//! the language design) is to read the dotted path first and look at how it
//! ends:
//!
//! - `.min` / `.max` tail               -> `CompositionRef` (single bound pull)
//! - `.[` tail, 2 leading segments      -> `CompositionRef` (subset pull)
//! - `.[` tail, 1 leading segment       -> `CompositionRef` (group subset)
//! - bare `nutrients`/`ingredients` tail -> `CompositionRef` (whole block pull)
//! - anything else                      -> an ordinary `Expr`, which becomes
//!   the left-hand side of a `ConstraintItem` with optional `min`/`max`
//!   bounds.
//!
//! A bare single identifier with no bounds at all (`corn` alone in an
//! `ingredients` block) is just a `ConstraintItem` with empty `Bounds`; the
//! resolver later tells an ingredient mention apart from a group mention by
//! what the name resolves to.

use super::expr::{self, starts_expr};
use crate::diagnostics::DiagnosticCode;
use crate::parser::core::Parser;
use crate::parser::cst::token_sets::{BLOCK_ITEM_RECOVERY, ITEM_SEPARATORS};
use crate::parser::cst::SyntaxKind::{self, *};
use crate::Error;

pub fn parse_nutrients_block(p: &mut Parser) -> Result<(), Error> {
    parse_block(p, NutrientsBlock)
}

pub fn parse_ingredients_block(p: &mut Parser) -> Result<(), Error> {
    parse_block(p, IngredientsBlock)
}

fn parse_block(p: &mut Parser, kind: SyntaxKind) -> Result<(), Error> {
    p.start_node(kind);
    p.bump()?; // the `nutrients`/`nuts`/`ingredients`/`ings` keyword (contextual Id)
    p.expect(BraceOpen)?;
    skip_separators(p)?;
    while !p.at(BraceClose) && !p.at_eof() {
        parse_block_item(p)?;
        skip_separators(p)?;
    }
    p.expect(BraceClose)?;
    p.finish_node();
    Ok(())
}

fn skip_separators(p: &mut Parser) -> Result<(), Error> {
    while p.at_set(ITEM_SEPARATORS) {
        p.bump()?;
    }
    Ok(())
}

/// Identifier text that marks a dotted path's terminal segment as a
/// whole-block composition pull (`base.nutrients`, `base.ings`, ...).
fn is_block_kind_word(text: &str) -> bool {
    matches!(text, "nutrients" | "nuts" | "ingredients" | "ings")
}

fn parse_block_item(p: &mut Parser) -> Result<(), Error> {
    if !starts_expr(p.current()) {
        p.error_and_bump("expected a constraint or composition reference")?;
        return Ok(());
    }

    let cp = p.checkpoint();

    if !p.at(Id) {
        // Can't be a composition reference; parse a plain expression.
        expr::parse_expr(p)?;
        parse_constraint_tail(p, cp)?;
        return Ok(());
    }

    // Walk the dotted path ourselves so we can inspect how it ends before
    // deciding what kind of node it becomes.
    let mut segments = 0u32;
    let mut last_text = String::new();
    let mut ended_in_bound = false;
    let mut ended_in_list = false;

    loop {
        let range = p.current_range();
        last_text = p.source()[std::ops::Range::<usize>::from(range)].to_string();
        p.bump()?; // Id
        segments += 1;

        if !p.at(Dot) {
            break;
        }
        p.bump()?; // '.'

        match p.current() {
            KwMin | KwMax => {
                p.bump()?;
                ended_in_bound = true;
                break;
            }
            BracketOpen => {
                p.bump()?; // '['
                parse_name_list_until(p, BracketClose)?;
                p.expect(BracketClose)?;
                ended_in_list = true;
                break;
            }
            Id => continue,
            _ => {
                let range = p.current_range();
                p.diagnostics_mut()
                    .error(
                        DiagnosticCode::ParseUnexpectedToken,
                        "expected a name, 'min'/'max', or '[' after '.'",
                        range,
                    )
                    .emit();
                break;
            }
        }
    }

    let is_composition_ref =
        ended_in_bound || ended_in_list || (segments >= 1 && is_block_kind_word(&last_text));

    if is_composition_ref {
        p.start_node_at(cp, CompositionRef);
        p.finish_node();
        return Ok(());
    }

    // Not a composition reference after all: the path we just walked is a
    // plain reference expression, possibly the left operand of `+ - * /`.
    p.start_node_at(cp, ExprRef);
    p.finish_node();
    expr::continue_additive(p, cp)?;
    parse_constraint_tail(p, cp)?;
    Ok(())
}

/// Parses the optional `min`/`max` bounds after an expression and wraps the
/// whole thing (expression + bounds, starting at `cp`) as a `ConstraintItem`.
fn parse_constraint_tail(p: &mut Parser, cp: rowan::Checkpoint) -> Result<(), Error> {
    if matches!(p.current(), KwMin | KwMax) {
        let bounds_cp = p.checkpoint();
        while matches!(p.current(), KwMin | KwMax) {
            p.bump()?; // 'min' / 'max'
            expr::parse_expr(p)?;
        }
        p.start_node_at(bounds_cp, Bounds);
        p.finish_node();
    }
    p.start_node_at(cp, ConstraintItem);
    p.finish_node();
    Ok(())
}

/// Parses a comma/newline separated list of identifiers, wrapped as a
/// `NameList` node. Used for bracketed subset lists and group bodies.
pub fn parse_name_list_until(p: &mut Parser, end: SyntaxKind) -> Result<(), Error> {
    p.start_node(NameList);
    skip_separators(p)?;
    while !p.at(end) && !p.at_eof() {
        if p.at(Id) {
            p.bump()?;
        } else {
            p.recover_until(BLOCK_ITEM_RECOVERY.union(crate::parser::cst::TokenSet::single(end)))?;
            break;
        }
        skip_separators(p)?;
    }
    p.finish_node();
    Ok(())
}
