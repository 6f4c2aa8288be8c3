//! Top-level declarations: imports, nutrients, ingredients, groups, and
//! formulas.

use super::blocks::{parse_ingredients_block, parse_name_list_until, parse_nutrients_block};
use super::expr::parse_expr;
use crate::diagnostics::DiagnosticCode;
use crate::parser::core::Parser;
use crate::parser::cst::token_sets::{DECL_FIRST, MODULE_RECOVERY};
use crate::parser::cst::SyntaxKind::*;
use crate::Error;

pub fn parse_root(p: &mut Parser) -> Result<(), Error> {
    p.start_node(Root);
    p.start_node(Module);
    while !p.at_eof() {
        if p.at(KwImport) {
            parse_import(p)?;
        } else if p.at_set(DECL_FIRST) {
            parse_decl(p)?;
        } else {
            p.error_and_bump("expected a declaration")?;
            p.recover_until(MODULE_RECOVERY)?;
        }
    }
    p.finish_node(); // Module
    p.finish_node(); // Root
    Ok(())
}

fn parse_decl(p: &mut Parser) -> Result<(), Error> {
    match p.current() {
        KwTemplate | KwFormula => parse_formula_decl(p),
        KwNutrient => parse_nutrient_decl(p),
        KwIngredient => parse_ingredient_decl(p),
        KwGroup => parse_group_decl(p),
        _ => unreachable!("caller already checked DECL_FIRST"),
    }
}

fn parse_import(p: &mut Parser) -> Result<(), Error> {
    p.start_node(ImportDecl);
    p.expect(KwImport)?;
    parse_string_literal(p)?;

    if p.at(KwAs) {
        p.start_node(ImportBindingAlias);
        p.bump()?; // 'as'
        p.expect(Id)?;
        p.finish_node();
    } else if p.at(BraceOpen) {
        // Peek: `{ * }` is a wildcard, anything else is an explicit list.
        let cp = p.checkpoint();
        p.bump()?; // '{'
        if p.at(Star) {
            p.bump()?;
            p.expect(BraceClose)?;
            p.start_node_at(cp, ImportBindingWildcard);
            p.finish_node();
        } else {
            parse_name_list_until(p, BraceClose)?;
            p.expect(BraceClose)?;
            p.start_node_at(cp, ImportBindingList);
            p.finish_node();
        }
    } else {
        // Implicit namespace binding: no tokens to consume, but an empty
        // node keeps the AST shape uniform.
        p.start_node(ImportBindingNamespace);
        p.finish_node();
    }

    p.finish_node(); // ImportDecl
    Ok(())
}

/// Consumes a `"..."` string literal. Quotes and content are separate
/// tokens from the lexer; this just bumps through them.
fn parse_string_literal(p: &mut Parser) -> Result<(), Error> {
    if !p.expect(DoubleQuote)? {
        return Ok(());
    }
    if p.at(StrVal) {
        p.bump()?;
    }
    p.expect(DoubleQuote)?;
    Ok(())
}

fn parse_nutrient_decl(p: &mut Parser) -> Result<(), Error> {
    p.start_node(NutrientDecl);
    p.bump()?; // 'nutrient'
    p.expect(Id)?;
    if p.at(BraceOpen) {
        parse_prop_block(p)?;
    }
    p.finish_node();
    Ok(())
}

fn parse_ingredient_decl(p: &mut Parser) -> Result<(), Error> {
    p.start_node(IngredientDecl);
    p.bump()?; // 'ingredient'
    p.expect(Id)?;
    if p.at(BraceOpen) {
        parse_prop_block(p)?;
    } else {
        p.diagnostics_mut()
            .error(
                DiagnosticCode::ParseMissingBlock,
                "expected '{' to start the ingredient body",
                p.current_range(),
            )
            .emit();
    }
    p.finish_node();
    Ok(())
}

fn parse_group_decl(p: &mut Parser) -> Result<(), Error> {
    p.start_node(GroupDecl);
    p.bump()?; // 'group'
    p.expect(Id)?;
    p.expect(BraceOpen)?;
    parse_name_list_until(p, BraceClose)?;
    p.expect(BraceClose)?;
    p.finish_node();
    Ok(())
}

fn parse_formula_decl(p: &mut Parser) -> Result<(), Error> {
    p.start_node(FormulaDecl);
    if p.at(KwTemplate) {
        p.bump()?; // 'template'
    }
    p.expect(KwFormula)?;
    p.expect(Id)?;
    p.expect(BraceOpen)?;

    while !p.at(BraceClose) && !p.at_eof() {
        match block_keyword(p) {
            Some(BlockKeyword::Nutrients) => parse_nutrients_block(p)?,
            Some(BlockKeyword::Ingredients) => parse_ingredients_block(p)?,
            None if p.at(Id) => parse_prop_assign(p)?,
            None => {
                p.error_and_bump("expected a property, 'nutrients' block, or 'ingredients' block")?;
            }
        }
    }
    p.expect(BraceClose)?;
    p.finish_node();
    Ok(())
}

enum BlockKeyword {
    Nutrients,
    Ingredients,
}

/// Formula bodies dispatch on the *text* of a leading identifier
/// (`nutrients`/`nuts` vs `ingredients`/`ings`) rather than a reserved
/// keyword, since both forms double as ordinary property names nowhere
/// else in the grammar.
fn block_keyword(p: &Parser) -> Option<BlockKeyword> {
    if !p.at(Id) {
        return None;
    }
    match p.source()[std::ops::Range::<usize>::from(p.current_range())].as_ref() {
        "nutrients" | "nuts" => Some(BlockKeyword::Nutrients),
        "ingredients" | "ings" => Some(BlockKeyword::Ingredients),
        _ => None,
    }
}

fn parse_prop_block(p: &mut Parser) -> Result<(), Error> {
    p.expect(BraceOpen)?;
    while !p.at(BraceClose) && !p.at_eof() {
        if p.at(Id) {
            parse_prop_assign(p)?;
        } else {
            p.error_and_bump("expected a property")?;
        }
    }
    p.expect(BraceClose)?;
    Ok(())
}

/// `name value` or the legacy `name: value` form. The value is a number,
/// percent literal, or string; ingredient bodies also use this production
/// for nutrient value pairs (`protein 8.5`) since the grammar can't tell a
/// property from a nutrient reference without name resolution.
fn parse_prop_assign(p: &mut Parser) -> Result<(), Error> {
    p.start_node(PropAssign);
    p.expect(Id)?;
    if p.at(Colon) {
        p.bump()?;
    }
    match p.current() {
        Number | PercentNumber => {
            parse_expr(p)?;
        }
        DoubleQuote => {
            parse_string_literal(p)?;
        }
        _ => {
            p.diagnostics_mut()
                .error(
                    DiagnosticCode::ParseUnexpectedToken,
                    "expected a number, percent, or string value",
                    p.current_range(),
                )
                .emit();
        }
    }
    p.finish_node();
    Ok(())
}
