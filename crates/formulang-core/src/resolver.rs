//! Semantic resolver: binds every reference inside a formula's blocks to a
//! declaration, enforcing block-context typing (nutrient vs. ingredient
//! meaning) along the way.
//!
//! The module linker ([`crate::loader`]) already produced a flat [`Program`]
//! of declarations and a per-module [`ScopeTable`]; this pass walks each
//! formula's `nutrients`/`ingredients` block CST and fills in
//! [`FormulaDef::nutrient_items`]/[`FormulaDef::ingredient_items`] with
//! resolved [`RawBlockItem`]s. Nothing here mutates another declaration —
//! only a formula's own item lists are populated, so formulas can be
//! resolved independently and in any order.

use formulang_base::{Interner, SourceId, Symbol};

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::loader::{span_of, LinkedBundle};
use crate::model::{BinOp, BlockKind, CompositionRef, Constraint, Bounds, Program, RawBlockItem, ResolvedExpr};
use crate::parser::ast::{self, BlockItem, Expr, FormulaDecl};
use crate::parser::{SyntaxKind, SyntaxToken};
use crate::symbols::{qualify, DeclKind, ScopeTable};

struct ResolveCtx<'a> {
    interner: &'a mut Interner,
    scopes: &'a ScopeTable,
    source_id: SourceId,
    diagnostics: &'a mut Diagnostics,
}

/// Resolves every formula in a linked bundle, returning the program with
/// each formula's block items filled in.
pub fn resolve(
    bundle: &LinkedBundle,
    interner: &mut Interner,
    diagnostics: &mut Diagnostics,
) -> Program {
    let mut program = bundle.program.clone();

    for (&formula_sym, (source_id, decl)) in bundle.formula_nodes.iter() {
        let mut ctx = ResolveCtx {
            interner,
            scopes: &bundle.scopes,
            source_id: *source_id,
            diagnostics,
        };

        let nutrient_items = decl
            .nutrients_block()
            .map(|b| resolve_items(&mut ctx, b.items(), BlockKind::Nutrients))
            .unwrap_or_default();
        let ingredient_items = decl
            .ingredients_block()
            .map(|b| resolve_items(&mut ctx, b.items(), BlockKind::Ingredients))
            .unwrap_or_default();

        if let Some(def) = program.formulas.get_mut(&formula_sym) {
            def.nutrient_items = nutrient_items;
            def.ingredient_items = ingredient_items;
        }
    }

    for (&group_sym, (source_id, decl)) in bundle.group_nodes.iter() {
        let mut ctx = ResolveCtx {
            interner,
            scopes: &bundle.scopes,
            source_id: *source_id,
            diagnostics,
        };
        let Some(names) = decl.members() else { continue };
        let members: Vec<Symbol> = names
            .names()
            .filter_map(|tok| resolve_bare(&mut ctx, &tok, &[DeclKind::Ingredient]).map(|(_, sym)| sym))
            .collect();
        if let Some(def) = program.groups.get_mut(&group_sym) {
            def.members = members;
        }
    }

    program
}

/// Resolves a single formula in isolation, for the query service (hover,
/// validate) where only one formula's worth of context is needed and a
/// whole-program resolve would be wasted work.
pub fn resolve_formula(
    bundle: &LinkedBundle,
    decl: &FormulaDecl,
    source_id: SourceId,
    interner: &mut Interner,
    diagnostics: &mut Diagnostics,
) -> (Vec<RawBlockItem>, Vec<RawBlockItem>) {
    let mut ctx = ResolveCtx {
        interner,
        scopes: &bundle.scopes,
        source_id,
        diagnostics,
    };
    let nutrient_items = decl
        .nutrients_block()
        .map(|b| resolve_items(&mut ctx, b.items(), BlockKind::Nutrients))
        .unwrap_or_default();
    let ingredient_items = decl
        .ingredients_block()
        .map(|b| resolve_items(&mut ctx, b.items(), BlockKind::Ingredients))
        .unwrap_or_default();
    (nutrient_items, ingredient_items)
}

fn resolve_items(
    ctx: &mut ResolveCtx,
    items: impl Iterator<Item = BlockItem>,
    block: BlockKind,
) -> Vec<RawBlockItem> {
    let mut out = Vec::new();
    for item in items {
        match item {
            BlockItem::Constraint(c) => {
                if let Some(constraint) = resolve_constraint(ctx, &c, block) {
                    out.push(RawBlockItem::Constraint(constraint));
                }
            }
            BlockItem::Composition(c) => {
                if let Some(comp) = resolve_composition_ref(ctx, &c, block) {
                    out.push(RawBlockItem::Composition(comp));
                }
            }
        }
    }
    out
}

fn resolve_constraint(
    ctx: &mut ResolveCtx,
    item: &ast::ConstraintItem,
    block: BlockKind,
) -> Option<Constraint> {
    let span = span_of(item.as_cst().text_range());
    let lhs = resolve_expr(ctx, &item.lhs()?, block)?;
    let bounds = match item.bounds() {
        Some(b) => Bounds {
            min: b.min().and_then(|e| resolve_expr(ctx, &e, block)),
            max: b.max().and_then(|e| resolve_expr(ctx, &e, block)),
        },
        None => Bounds { min: None, max: None },
    };
    Some(Constraint { lhs, bounds, span })
}

fn resolve_expr(ctx: &mut ResolveCtx, expr: &Expr, block: BlockKind) -> Option<ResolvedExpr> {
    match expr {
        Expr::Num(n) => parse_node_number(n.as_cst()).map(ResolvedExpr::Num),
        Expr::Percent(n) => {
            let value = parse_node_percent(n.as_cst())?;
            if block != BlockKind::Ingredients {
                ctx.diagnostics
                    .error(
                        DiagnosticCode::TypePercentOutsideIngredients,
                        "'%' literals are only allowed inside an ingredients block",
                        n.as_cst().text_range(),
                    )
                    .emit();
                return None;
            }
            Some(ResolvedExpr::Percent(value))
        }
        Expr::Ref(r) => resolve_ref_expr(ctx, r, block),
        Expr::Paren(p) => resolve_expr(ctx, &p.inner()?, block),
        Expr::Binary(b) => {
            let op = bin_op_of(b.operator()?.kind())?;
            let lhs = resolve_expr(ctx, &b.lhs()?, block)?;
            let rhs = resolve_expr(ctx, &b.rhs()?, block)?;
            Some(ResolvedExpr::Binary(op, Box::new(lhs), Box::new(rhs)))
        }
    }
}

fn bin_op_of(kind: SyntaxKind) -> Option<BinOp> {
    match kind {
        SyntaxKind::Plus => Some(BinOp::Add),
        SyntaxKind::Minus => Some(BinOp::Sub),
        SyntaxKind::Star => Some(BinOp::Mul),
        SyntaxKind::Slash => Some(BinOp::Div),
        _ => None,
    }
}

fn parse_node_number(node: &crate::parser::SyntaxNode) -> Option<f64> {
    strip_ws(&node.text().to_string()).parse().ok()
}

fn parse_node_percent(node: &crate::parser::SyntaxNode) -> Option<f64> {
    let text = strip_ws(&node.text().to_string());
    text.trim_end_matches('%').parse().ok()
}

fn strip_ws(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// The kinds an expression reference may resolve to in a given block.
fn allowed_kinds(block: BlockKind) -> &'static [DeclKind] {
    match block {
        BlockKind::Nutrients => &[DeclKind::Nutrient],
        BlockKind::Ingredients => &[DeclKind::Ingredient, DeclKind::Group],
    }
}

fn resolve_ref_expr(ctx: &mut ResolveCtx, r: &ast::ExprRef, block: BlockKind) -> Option<ResolvedExpr> {
    let segments: Vec<SyntaxToken> = r.segments().collect();
    let (kind, sym) = resolve_name_path(ctx, &segments, allowed_kinds(block))?;
    Some(match kind {
        DeclKind::Nutrient => ResolvedExpr::Nutrient(sym),
        DeclKind::Ingredient => ResolvedExpr::Ingredient(sym),
        DeclKind::Group => ResolvedExpr::Group(sym),
        DeclKind::Formula => unreachable!("formulas are never an allowed expression kind"),
    })
}

/// Resolves a dotted path (one or two segments) against one of `allowed`
/// declaration kinds, reporting ambiguity, wrong-kind, or unknown-name
/// diagnostics as appropriate. Returns the resolving kind plus the
/// declaration's qualified symbol.
fn resolve_name_path(
    ctx: &mut ResolveCtx,
    segments: &[SyntaxToken],
    allowed: &[DeclKind],
) -> Option<(DeclKind, Symbol)> {
    match segments.len() {
        1 => resolve_bare(ctx, &segments[0], allowed),
        2 => resolve_namespaced(ctx, &segments[0], &segments[1], allowed),
        0 => None,
        _ => {
            let range = segments[0].text_range().cover(segments[segments.len() - 1].text_range());
            ctx.diagnostics
                .error(
                    DiagnosticCode::NameUnknownIdentifier,
                    "references may have at most one namespace segment",
                    range,
                )
                .emit();
            None
        }
    }
}

const ALL_KINDS: [DeclKind; 4] = [
    DeclKind::Nutrient,
    DeclKind::Ingredient,
    DeclKind::Group,
    DeclKind::Formula,
];

fn resolve_bare(
    ctx: &mut ResolveCtx,
    tok: &SyntaxToken,
    allowed: &[DeclKind],
) -> Option<(DeclKind, Symbol)> {
    let text = tok.text().to_string();
    let name = ctx.interner.intern(&text);
    let range = tok.text_range();

    if ctx.scopes.is_ambiguous(ctx.source_id, name) {
        ctx.diagnostics
            .error(
                DiagnosticCode::NameAmbiguousWildcard,
                format!("'{text}' is ambiguous: bound by two or more wildcard imports"),
                range,
            )
            .emit();
        return None;
    }

    for &kind in allowed {
        if let Some(module) = ctx.scopes.resolve_bare(ctx.source_id, kind, name) {
            let stem = ctx.scopes.get(module)?.stem;
            return Some((kind, qualify(ctx.interner, stem, name)));
        }
    }
    for &kind in ALL_KINDS.iter().filter(|k| !allowed.contains(k)) {
        if ctx.scopes.resolve_bare(ctx.source_id, kind, name).is_some() {
            ctx.diagnostics
                .error(
                    DiagnosticCode::TypeWrongKindReference,
                    format!("'{text}' names a {kind:?}, which isn't valid here"),
                    range,
                )
                .emit();
            return None;
        }
    }
    ctx.diagnostics
        .error(
            DiagnosticCode::NameUnknownIdentifier,
            format!("unknown identifier '{text}'"),
            range,
        )
        .emit();
    None
}

fn resolve_namespaced(
    ctx: &mut ResolveCtx,
    ns_tok: &SyntaxToken,
    name_tok: &SyntaxToken,
    allowed: &[DeclKind],
) -> Option<(DeclKind, Symbol)> {
    let ns_text = ns_tok.text().to_string();
    let name_text = name_tok.text().to_string();
    let ns_sym = ctx.interner.intern(&ns_text);
    let name_sym = ctx.interner.intern(&name_text);

    let has_namespace = ctx
        .scopes
        .get(ctx.source_id)
        .is_some_and(|s| s.namespaces.contains_key(&ns_sym));
    if !has_namespace {
        ctx.diagnostics
            .error(
                DiagnosticCode::NameUnknownIdentifier,
                format!("unknown namespace '{ns_text}'"),
                ns_tok.text_range(),
            )
            .emit();
        return None;
    }

    for &kind in allowed {
        if let Some(module) = ctx.scopes.resolve_namespaced(ctx.source_id, ns_sym, kind, name_sym) {
            let stem = ctx.scopes.get(module)?.stem;
            return Some((kind, qualify(ctx.interner, stem, name_sym)));
        }
    }
    for &kind in ALL_KINDS.iter().filter(|k| !allowed.contains(k)) {
        if ctx
            .scopes
            .resolve_namespaced(ctx.source_id, ns_sym, kind, name_sym)
            .is_some()
        {
            ctx.diagnostics
                .error(
                    DiagnosticCode::TypeWrongKindReference,
                    format!("'{ns_text}.{name_text}' names a {kind:?}, which isn't valid here"),
                    name_tok.text_range(),
                )
                .emit();
            return None;
        }
    }
    ctx.diagnostics
        .error(
            DiagnosticCode::NameUnknownIdentifier,
            format!("'{name_text}' is not exported by '{ns_text}'"),
            name_tok.text_range(),
        )
        .emit();
    None
}

fn resolve_composition_ref(
    ctx: &mut ResolveCtx,
    node: &ast::CompositionRef,
    block: BlockKind,
) -> Option<CompositionRef> {
    let span = span_of(node.as_cst().text_range());
    let segments: Vec<SyntaxToken> = node.path_segments();

    match node.kind() {
        ast::CompositionRefKind::AllOf => {
            if segments.len() < 2 {
                return composition_path_error(ctx, &segments);
            }
            let (formula_path, block_tok) = segments.split_at(segments.len() - 1);
            let ref_block = block_word(&block_tok[0])?;
            check_block_match(ctx, &block_tok[0], ref_block, block)?;
            let (_, formula) = resolve_name_path(ctx, formula_path, &[DeclKind::Formula])?;
            Some(CompositionRef::AllOf { formula, block: ref_block, span })
        }
        ast::CompositionRefKind::Subset => {
            if segments.len() < 2 {
                return composition_path_error(ctx, &segments);
            }
            let (formula_path, block_tok) = segments.split_at(segments.len() - 1);
            let ref_block = block_word(&block_tok[0])?;
            check_block_match(ctx, &block_tok[0], ref_block, block)?;
            let (_, formula) = resolve_name_path(ctx, formula_path, &[DeclKind::Formula])?;
            let subset_kind = match ref_block {
                BlockKind::Nutrients => &[DeclKind::Nutrient][..],
                BlockKind::Ingredients => &[DeclKind::Ingredient, DeclKind::Group][..],
            };
            let names = node
                .name_list()?
                .names()
                .filter_map(|t| resolve_bare(ctx, &t, subset_kind).map(|(_, sym)| sym))
                .collect();
            Some(CompositionRef::Subset { formula, block: ref_block, names, span })
        }
        ast::CompositionRefKind::SingleBound { is_max } => {
            if segments.len() < 3 {
                return composition_path_error(ctx, &segments);
            }
            let name_tok = &segments[segments.len() - 1];
            let block_tok = &segments[segments.len() - 2];
            let formula_path = &segments[..segments.len() - 2];
            let ref_block = block_word(block_tok)?;
            check_block_match(ctx, block_tok, ref_block, block)?;
            let (_, formula) = resolve_name_path(ctx, formula_path, &[DeclKind::Formula])?;
            let name = ctx.interner.intern(&name_tok.text().to_string());
            Some(CompositionRef::SingleBound { formula, block: ref_block, name, is_max, span })
        }
        ast::CompositionRefKind::GroupSelect => {
            if segments.is_empty() {
                return composition_path_error(ctx, &segments);
            }
            let (_, group) = resolve_name_path(ctx, &segments, &[DeclKind::Group])?;
            let members = node
                .name_list()?
                .names()
                .filter_map(|t| resolve_bare(ctx, &t, &[DeclKind::Ingredient]).map(|(_, sym)| sym))
                .collect();
            Some(CompositionRef::GroupSelect { group, members, span })
        }
    }
}

fn composition_path_error(ctx: &mut ResolveCtx, segments: &[SyntaxToken]) -> Option<CompositionRef> {
    let range = segments
        .first()
        .map(|t| t.text_range())
        .unwrap_or_else(|| rowan::TextRange::empty(0.into()));
    ctx.diagnostics
        .error(
            DiagnosticCode::ParseUnexpectedToken,
            "malformed composition reference",
            range,
        )
        .emit();
    None
}

fn block_word(tok: &SyntaxToken) -> Option<BlockKind> {
    match tok.text() {
        "nutrients" | "nuts" => Some(BlockKind::Nutrients),
        "ingredients" | "ings" => Some(BlockKind::Ingredients),
        _ => None,
    }
}

/// A composition reference's block selector must agree with the block it
/// appears in — `base.ingredients` can't be pulled into a `nutrients`
/// block. This is the same family of error as a wrong-kind expression
/// reference.
fn check_block_match(
    ctx: &mut ResolveCtx,
    tok: &SyntaxToken,
    referenced: BlockKind,
    actual: BlockKind,
) -> Option<()> {
    if referenced == actual {
        Some(())
    } else {
        ctx.diagnostics
            .error(
                DiagnosticCode::TypeWrongKindReference,
                "a nutrients-block composition reference can't be used inside an ingredients block, or vice versa",
                tok.text_range(),
            )
            .emit();
        None
    }
}
