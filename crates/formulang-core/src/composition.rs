//! Composition engine: expands the `CompositionRef`s inside a formula's
//! blocks into flat, override-resolved constraint maps.
//!
//! A block is a sequence of items read top to bottom; a later item whose
//! left-hand side is structurally identical to an earlier one replaces it
//! as a whole (bounds are not merged field-by-field), and a composition
//! reference expands in place as if its source formula's already-composed
//! items had been written out inline at that point. Expansion is memoized
//! per `(formula, block)` pair and guarded against cycles the same way the
//! module linker guards against import cycles: a stack of in-progress keys,
//! walked to report the full chain when a formula is found revisiting
//! itself.

use std::collections::HashSet;

use formulang_base::{Interner, Symbol};
use indexmap::IndexMap;

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::model::{
    BlockKind, CanonicalLhs, CompositionRef, ComposedFormula, Constraint, Program, RawBlockItem,
    ResolvedExpr,
};

fn range_of(span: formulang_base::Span) -> rowan::TextRange {
    rowan::TextRange::new(span.start.into(), span.end.into())
}

/// Reduces a resolved expression to the structural key used for override
/// matching. Two expressions with the same shape and the same operand
/// symbols in the same order canonicalize equal regardless of how they were
/// written.
fn canonicalize(expr: &ResolvedExpr) -> CanonicalLhs {
    match expr {
        ResolvedExpr::Nutrient(s) => CanonicalLhs::Nutrient(*s),
        ResolvedExpr::Ingredient(s) => CanonicalLhs::Ingredient(*s),
        ResolvedExpr::Group(s) => CanonicalLhs::Group(*s),
        ResolvedExpr::Binary(op, l, r) => {
            CanonicalLhs::Binary(*op, Box::new(canonicalize(l)), Box::new(canonicalize(r)))
        }
        ResolvedExpr::Num(n) => CanonicalLhs::Opaque(n.to_bits()),
        ResolvedExpr::Percent(n) => CanonicalLhs::Opaque(n.to_bits() ^ 0x5045_5243),
    }
}

/// A bare reference's symbol, if `expr` is exactly `Nutrient(s)` or
/// `Ingredient(s)` — the only shapes a `Subset`/`SingleBound` selector can
/// match against.
fn bare_symbol(expr: &ResolvedExpr) -> Option<Symbol> {
    match expr {
        ResolvedExpr::Nutrient(s) | ResolvedExpr::Ingredient(s) => Some(*s),
        _ => None,
    }
}

fn note_ingredient(sym: Symbol, order: &mut Vec<Symbol>, seen: &mut HashSet<Symbol>) {
    if seen.insert(sym) {
        order.push(sym);
    }
}

/// Walks a resolved expression collecting every ingredient it mentions,
/// expanding group references to their member list, in first-seen order.
fn collect_ingredients(
    expr: &ResolvedExpr,
    program: &Program,
    order: &mut Vec<Symbol>,
    seen: &mut HashSet<Symbol>,
) {
    match expr {
        ResolvedExpr::Ingredient(sym) => note_ingredient(*sym, order, seen),
        ResolvedExpr::Group(sym) => {
            if let Some(group) = program.groups.get(sym) {
                for member in &group.members {
                    note_ingredient(*member, order, seen);
                }
            }
        }
        ResolvedExpr::Binary(_, l, r) => {
            collect_ingredients(l, program, order, seen);
            collect_ingredients(r, program, order, seen);
        }
        ResolvedExpr::Num(_) | ResolvedExpr::Percent(_) | ResolvedExpr::Nutrient(_) => {}
    }
}

/// A block's expansion result: its override-resolved constraints, keyed by
/// canonical left-hand side, plus the ingredients it mentions in
/// first-seen order.
#[derive(Debug, Clone, Default)]
struct Expansion {
    constraints: IndexMap<CanonicalLhs, Constraint>,
    ingredient_order: Vec<Symbol>,
}

impl Expansion {
    fn push(&mut self, program: &Program, constraint: Constraint) {
        let mut seen: HashSet<Symbol> = self.ingredient_order.iter().copied().collect();
        collect_ingredients(&constraint.lhs, program, &mut self.ingredient_order, &mut seen);
        let key = canonicalize(&constraint.lhs);
        self.constraints.shift_remove(&key);
        self.constraints.insert(key, constraint);
    }

    fn merge(&mut self, program: &Program, other: Expansion) {
        let mut seen: HashSet<Symbol> = self.ingredient_order.iter().copied().collect();
        for (key, constraint) in other.constraints {
            self.constraints.shift_remove(&key);
            self.constraints.insert(key, constraint);
        }
        for sym in other.ingredient_order {
            note_ingredient(sym, &mut self.ingredient_order, &mut seen);
        }
        let _ = program;
    }
}

struct Composer<'a> {
    program: &'a Program,
    interner: &'a Interner,
    diagnostics: &'a mut Diagnostics,
    memo: IndexMap<(Symbol, BlockKind), Option<Expansion>>,
    stack: Vec<(Symbol, BlockKind)>,
}

/// Expands a formula's nutrients and ingredients blocks into their final,
/// override-resolved form. Returns `None` only when the formula itself is
/// unknown (the caller asked for a symbol that isn't in `program`); a
/// composition cycle or missing bound is reported as a diagnostic and
/// degrades to an empty contribution rather than failing the whole build.
pub fn compose(
    program: &Program,
    interner: &Interner,
    formula: Symbol,
    diagnostics: &mut Diagnostics,
) -> Option<ComposedFormula> {
    if !program.formulas.contains_key(&formula) {
        return None;
    }
    let mut composer = Composer {
        program,
        interner,
        diagnostics,
        memo: IndexMap::new(),
        stack: Vec::new(),
    };
    let nutrients = composer.expand(formula, BlockKind::Nutrients).unwrap_or_default();
    let ingredients = composer.expand(formula, BlockKind::Ingredients).unwrap_or_default();

    let mut ingredient_order = ingredients.ingredient_order;
    let mut seen: HashSet<Symbol> = ingredient_order.iter().copied().collect();
    for sym in &nutrients.ingredient_order {
        note_ingredient(*sym, &mut ingredient_order, &mut seen);
    }

    Some(ComposedFormula {
        nutrients: nutrients.constraints,
        ingredients: ingredients.constraints,
        ingredient_order,
    })
}

impl<'a> Composer<'a> {
    fn expand(&mut self, formula: Symbol, block: BlockKind) -> Option<Expansion> {
        let key = (formula, block);
        if let Some(cached) = self.memo.get(&key) {
            return cached.clone();
        }
        if let Some(pos) = self.stack.iter().position(|k| *k == key) {
            let chain: Vec<String> = self.stack[pos..]
                .iter()
                .map(|(f, b)| format!("{}.{}", self.name_of(*f), block_word(*b)))
                .collect();
            let def = self.program.formulas.get(&formula);
            let span = def.map(|d| d.span).unwrap_or_default();
            self.diagnostics
                .error(
                    DiagnosticCode::CompositionCycle,
                    format!("composition cycle: {} -> {}", chain.join(" -> "), self.name_of(formula)),
                    range_of(span),
                )
                .emit();
            self.memo.insert(key, None);
            return None;
        }

        self.stack.push(key);
        let result = self.expand_uncached(formula, block);
        self.stack.pop();
        self.memo.insert(key, result.clone());
        result
    }

    fn expand_uncached(&mut self, formula: Symbol, block: BlockKind) -> Option<Expansion> {
        let def = self.program.formulas.get(&formula)?;
        let items = match block {
            BlockKind::Nutrients => &def.nutrient_items,
            BlockKind::Ingredients => &def.ingredient_items,
        };

        let mut out = Expansion::default();
        for item in items.clone() {
            match item {
                RawBlockItem::Constraint(c) => out.push(self.program, c),
                RawBlockItem::Composition(cref) => {
                    if let Some(expanded) = self.expand_composition_ref(&cref, block) {
                        out.merge(self.program, expanded);
                    }
                }
            }
        }
        Some(out)
    }

    fn expand_composition_ref(&mut self, cref: &CompositionRef, _block: BlockKind) -> Option<Expansion> {
        match cref {
            CompositionRef::AllOf { formula, block, .. } => self.expand(*formula, *block),
            CompositionRef::Subset { formula, block, names, .. } => {
                let base = self.expand(*formula, *block)?;
                let wanted: HashSet<Symbol> = names.iter().copied().collect();
                let mut out = Expansion::default();
                for (key, constraint) in base.constraints {
                    if bare_symbol(&constraint.lhs).is_some_and(|s| wanted.contains(&s)) {
                        out.constraints.insert(key, constraint.clone());
                        let mut seen: HashSet<Symbol> = out.ingredient_order.iter().copied().collect();
                        collect_ingredients(&constraint.lhs, self.program, &mut out.ingredient_order, &mut seen);
                    }
                }
                Some(out)
            }
            CompositionRef::SingleBound { formula, block, name, is_max, span } => {
                let base = self.expand(*formula, *block)?;
                let found = base
                    .constraints
                    .values()
                    .find(|c| bare_symbol(&c.lhs) == Some(*name));

                let Some(found) = found else {
                    self.diagnostics
                        .warning(
                            DiagnosticCode::CompositionMissingBound,
                            format!(
                                "'{}' has no declared bound to pull a {} from",
                                self.name_of(*name),
                                if *is_max { "max" } else { "min" }
                            ),
                            range_of(*span),
                        )
                        .emit();
                    return Some(Expansion::default());
                };

                let bound_expr = if *is_max { found.bounds.max.clone() } else { found.bounds.min.clone() };
                let Some(bound_expr) = bound_expr else {
                    self.diagnostics
                        .warning(
                            DiagnosticCode::CompositionMissingBound,
                            format!(
                                "'{}' has no {} bound to pull in",
                                self.name_of(*name),
                                if *is_max { "max" } else { "min" }
                            ),
                            range_of(*span),
                        )
                        .emit();
                    return Some(Expansion::default());
                };

                let lhs = found.lhs.clone();
                let bounds = if *is_max {
                    crate::model::Bounds { min: None, max: Some(bound_expr) }
                } else {
                    crate::model::Bounds { min: Some(bound_expr), max: None }
                };
                let mut out = Expansion::default();
                out.push(self.program, Constraint { lhs, bounds, span: *span });
                Some(out)
            }
            CompositionRef::GroupSelect { group, members, span } => {
                let mut out = Expansion::default();
                let group_members: HashSet<Symbol> = self
                    .program
                    .groups
                    .get(group)
                    .map(|g| g.members.iter().copied().collect())
                    .unwrap_or_default();
                for &member in members {
                    if !group_members.contains(&member) {
                        self.diagnostics
                            .warning(
                                DiagnosticCode::NameUnknownIdentifier,
                                format!("'{}' is not a member of group '{}'", self.name_of(member), self.name_of(*group)),
                                range_of(*span),
                            )
                            .emit();
                        continue;
                    }
                    out.push(
                        self.program,
                        Constraint {
                            lhs: ResolvedExpr::Ingredient(member),
                            bounds: crate::model::Bounds { min: None, max: None },
                            span: *span,
                        },
                    );
                }
                Some(out)
            }
        }
    }

    fn name_of(&self, sym: Symbol) -> String {
        self.interner.try_resolve(sym).unwrap_or("<unknown>").to_string()
    }
}

fn block_word(block: BlockKind) -> &'static str {
    match block {
        BlockKind::Nutrients => "nutrients",
        BlockKind::Ingredients => "ingredients",
    }
}

#[cfg(test)]
#[path = "composition_tests.rs"]
mod composition_tests;
