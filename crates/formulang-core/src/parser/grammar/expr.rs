//! Expression and dotted-path grammar.
//!
//! Precedence, low to high: `+ -`, then `* /`, then unary `-` (numbers
//! only), then parens/atoms. A dotted path (`base.protein`) is always a
//! single atom; it is never itself a binary operand-within-operand.

use crate::diagnostics::DiagnosticCode;
use crate::parser::core::Parser;
use crate::parser::cst::SyntaxKind::{self, *};
use crate::Error;
use rowan::Checkpoint;

/// Parses a full arithmetic expression (`+ -` then `* /` then atom).
pub fn parse_expr(p: &mut Parser) -> Result<(), Error> {
    p.enter()?;
    let cp = p.checkpoint();
    parse_atom(p)?;
    let r = continue_additive(p, cp);
    p.exit();
    r
}

/// Finishes an expression whose leftmost atom has already been parsed and
/// sits at `cp` (used by the composition-reference/constraint disambiguator
/// in `grammar::blocks`, which must parse the leading dotted path itself
/// before it knows whether it's an atom or a composition reference).
pub fn continue_additive(p: &mut Parser, cp: Checkpoint) -> Result<(), Error> {
    continue_multiplicative(p, cp)?;
    while matches!(p.current(), Plus | Minus) {
        p.bump()?; // operator
        let rhs_cp = p.checkpoint();
        parse_atom(p)?;
        continue_multiplicative(p, rhs_cp)?;
        p.start_node_at(cp, ExprBinary);
        p.finish_node();
    }
    Ok(())
}

fn continue_multiplicative(p: &mut Parser, cp: Checkpoint) -> Result<(), Error> {
    while matches!(p.current(), Star | Slash) {
        p.bump()?; // operator
        parse_atom(p)?;
        p.start_node_at(cp, ExprBinary);
        p.finish_node();
    }
    Ok(())
}

fn parse_atom(p: &mut Parser) -> Result<(), Error> {
    match p.current() {
        Number => {
            p.start_node(ExprNum);
            p.bump()?;
            p.finish_node();
            Ok(())
        }
        PercentNumber => {
            p.start_node(ExprPercent);
            p.bump()?;
            p.finish_node();
            Ok(())
        }
        Minus => {
            // Unary minus on a number literal only; fold into ExprNum span.
            p.start_node(ExprNum);
            p.bump()?; // '-'
            if p.at(Number) {
                p.bump()?;
            } else {
                let range = p.current_range();
                p.diagnostics_mut()
                    .error(
                        DiagnosticCode::ParseUnexpectedToken,
                        "unary '-' is only allowed on a number literal",
                        range,
                    )
                    .emit();
            }
            p.finish_node();
            Ok(())
        }
        ParenOpen => {
            p.start_node(ExprParen);
            p.bump()?; // '('
            parse_expr(p)?;
            p.expect(ParenClose)?;
            p.finish_node();
            Ok(())
        }
        Id => {
            parse_path_ref(p)?;
            Ok(())
        }
        _ => {
            let range = p.current_range();
            p.diagnostics_mut()
                .error(
                    DiagnosticCode::ParseUnexpectedToken,
                    format!("expected an expression, found {:?}", p.current()),
                    range,
                )
                .emit();
            // Don't consume; caller's recovery set will resynchronize.
            Ok(())
        }
    }
}

/// Parses a dotted reference path (`Id (. Id)*`) as a single `ExprRef` atom.
pub fn parse_path_ref(p: &mut Parser) -> Result<(), Error> {
    p.start_node(ExprRef);
    p.expect(Id)?;
    while p.at(Dot) {
        p.bump()?; // '.'
        if p.at(Id) {
            p.bump()?;
        } else {
            break;
        }
    }
    p.finish_node();
    Ok(())
}

/// Returns true if `kind` can start an expression (used for recovery and
/// for block-item dispatch).
pub fn starts_expr(kind: SyntaxKind) -> bool {
    matches!(kind, ParenOpen | Minus | Number | PercentNumber | Id)
}
