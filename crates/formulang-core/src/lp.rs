//! LP builder: lowers a composed formula into a backend-neutral linear
//! program — variables with bounds, a cost-minimizing objective, and a row
//! per composed constraint. [`crate::solver`] is the only consumer; keeping
//! this IR free of any `good_lp` type means the backend can be swapped at
//! the solver boundary without touching this module.

use formulang_base::{Span, Symbol};
use indexmap::IndexMap;

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::model::{BinOp, ComposedFormula, Constraint, FormulaDef, Program, ResolvedExpr};

/// A linear combination of ingredient variables plus a constant term.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    pub coeffs: IndexMap<Symbol, f64>,
    pub constant: f64,
}

impl LinExpr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(c: f64) -> Self {
        Self { coeffs: IndexMap::new(), constant: c }
    }

    pub fn add_term(&mut self, sym: Symbol, coeff: f64) {
        *self.coeffs.entry(sym).or_insert(0.0) += coeff;
    }

    pub fn add_constant(&mut self, c: f64) {
        self.constant += c;
    }

    pub fn scale(&mut self, k: f64) {
        for v in self.coeffs.values_mut() {
            *v *= k;
        }
        self.constant *= k;
    }

    pub fn add_assign(&mut self, other: &LinExpr) {
        for (&sym, &coeff) in &other.coeffs {
            self.add_term(sym, coeff);
        }
        self.constant += other.constant;
    }

    pub fn sub_assign(&mut self, other: &LinExpr) {
        for (&sym, &coeff) in &other.coeffs {
            self.add_term(sym, -coeff);
        }
        self.constant -= other.constant;
    }

    /// True if this expression carries no variable terms — a plain number.
    pub fn is_constant(&self) -> bool {
        self.coeffs.values().all(|&c| c == 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Ge,
    Le,
    Eq,
}

/// What a constraint row is "about", for attaching violations and shadow
/// prices to a human-readable subject in the solve report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSubject {
    Nutrient(Symbol),
    Ingredient(Symbol),
    NutrientRatio,
    Batch,
    Other,
}

/// One row of the LP: `expr (op) 0`, i.e. `expr.constant` already carries
/// the right-hand side moved to the left.
#[derive(Debug, Clone)]
pub struct LpConstraint {
    pub expr: LinExpr,
    pub op: ConstraintOp,
    pub subject: ConstraintSubject,
    pub label: String,
    pub span: Span,
}

impl LpConstraint {
    /// A `Ge` row is a relaxable "min" bound in the solver's infeasible
    /// fallback; batch closure and `max` bounds are never relaxed.
    pub fn is_relaxable_min(&self) -> bool {
        self.op == ConstraintOp::Ge && !matches!(self.subject, ConstraintSubject::Batch)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LpModel {
    /// Ingredient variables in stable emission order.
    pub ingredients: Vec<Symbol>,
    pub lower: IndexMap<Symbol, f64>,
    pub upper: IndexMap<Symbol, f64>,
    pub cost: IndexMap<Symbol, f64>,
    pub constraints: Vec<LpConstraint>,
    pub batch_size: f64,
}

/// Reduces a literal expression tree (numbers, percents, and arithmetic
/// over them) to a single value. Returns `(value, was_percent)` — the flag
/// distinguishes `corn max 500` from `corn max 50%` for ingredient bounds;
/// nutrient bounds ignore it; see `eval_nutrient_bound`/`eval_ingredient_bound`.
fn fold_literal(expr: &ResolvedExpr) -> Option<(f64, bool)> {
    match expr {
        ResolvedExpr::Num(n) => Some((*n, false)),
        ResolvedExpr::Percent(p) => Some((*p, true)),
        ResolvedExpr::Binary(op, l, r) => {
            let (lv, lp) = fold_literal(l)?;
            let (rv, _) = fold_literal(r)?;
            let v = match op {
                BinOp::Add => lv + rv,
                BinOp::Sub => lv - rv,
                BinOp::Mul => lv * rv,
                BinOp::Div => lv / rv,
            };
            Some((v, lp))
        }
        _ => None,
    }
}

/// Nutrient requirement values are percent-of-batch regardless of whether
/// they were written as `20` or `20%` — both mean "20% of the batch".
fn eval_nutrient_bound(expr: &ResolvedExpr, batch_size: f64) -> Option<f64> {
    fold_literal(expr).map(|(v, _)| v * batch_size / 100.0)
}

/// Ingredient bounds only scale when written with a trailing `%`; a bare
/// number is already an absolute amount.
fn eval_ingredient_bound(expr: &ResolvedExpr, batch_size: f64) -> Option<f64> {
    fold_literal(expr).map(|(v, is_percent)| if is_percent { v * batch_size / 100.0 } else { v })
}

/// Lowers a resolved expression into a linear combination of ingredient
/// variables. `Nutrient(n)` substitutes `Σ_i content(i, n) · x_i`;
/// `Ingredient(i)` is the bare variable; `Group(g)` is the sum of its
/// members. Multiplication/division require one side to reduce to a plain
/// constant — anything else is nonlinear and reported, then treated as a
/// zero contribution so the rest of the formula can still be built.
fn lower_expr(expr: &ResolvedExpr, program: &Program, span: Span, diagnostics: &mut Diagnostics) -> LinExpr {
    match expr {
        ResolvedExpr::Num(n) => LinExpr::constant(*n),
        ResolvedExpr::Percent(p) => LinExpr::constant(*p),
        ResolvedExpr::Nutrient(sym) => {
            let mut e = LinExpr::zero();
            for (&ing, def) in &program.ingredients {
                // Declared content is percent-of-ingredient; x_i is an absolute
                // amount, so the absolute nutrient mass contributed is content/100 · x_i.
                let content = def.nutrient_values.get(sym).copied().unwrap_or(0.0) / 100.0;
                if content != 0.0 {
                    e.add_term(ing, content);
                }
            }
            e
        }
        ResolvedExpr::Ingredient(sym) => {
            let mut e = LinExpr::zero();
            e.add_term(*sym, 1.0);
            e
        }
        ResolvedExpr::Group(sym) => {
            let mut e = LinExpr::zero();
            if let Some(group) = program.groups.get(sym) {
                for &member in &group.members {
                    e.add_term(member, 1.0);
                }
            }
            e
        }
        ResolvedExpr::Binary(op, l, r) => {
            let le = lower_expr(l, program, span, diagnostics);
            let re = lower_expr(r, program, span, diagnostics);
            match op {
                BinOp::Add => {
                    let mut out = le;
                    out.add_assign(&re);
                    out
                }
                BinOp::Sub => {
                    let mut out = le;
                    out.sub_assign(&re);
                    out
                }
                BinOp::Mul | BinOp::Div => {
                    let (scalar, mut variable, invert) = if le.is_constant() {
                        (le.constant, re, *op == BinOp::Div)
                    } else if re.is_constant() {
                        (re.constant, le, false)
                    } else {
                        diagnostics
                            .error(
                                DiagnosticCode::TypeWrongKindReference,
                                "only one side of '*' or '/' may reference ingredients or nutrients",
                                range_of(span),
                            )
                            .emit();
                        return LinExpr::zero();
                    };
                    if invert {
                        // `V / expr` — dividing a constant by a variable expression
                        // is nonlinear; only `expr / V` (handled below) is legal.
                        diagnostics
                            .error(
                                DiagnosticCode::TypeWrongKindReference,
                                "cannot divide a constant by an ingredient or nutrient expression",
                                range_of(span),
                            )
                            .emit();
                        return LinExpr::zero();
                    }
                    let factor = if *op == BinOp::Div { 1.0 / scalar } else { scalar };
                    variable.scale(factor);
                    variable
                }
            }
        }
    }
}

fn range_of(span: Span) -> rowan::TextRange {
    rowan::TextRange::new(span.start.into(), span.end.into())
}

fn subject_of(lhs: &ResolvedExpr) -> ConstraintSubject {
    match lhs {
        ResolvedExpr::Nutrient(sym) => ConstraintSubject::Nutrient(*sym),
        ResolvedExpr::Ingredient(sym) => ConstraintSubject::Ingredient(*sym),
        _ => ConstraintSubject::Other,
    }
}

fn nutrient_rows(
    constraint: &Constraint,
    program: &Program,
    batch_size: f64,
    diagnostics: &mut Diagnostics,
) -> Vec<LpConstraint> {
    let mut out = Vec::new();

    if let ResolvedExpr::Binary(BinOp::Div, numer, denom) = &constraint.lhs {
        let numer_expr = lower_expr(numer, program, constraint.span, diagnostics);
        let denom_expr = lower_expr(denom, program, constraint.span, diagnostics);
        if let Some(min) = &constraint.bounds.min {
            if let Some((v, _)) = fold_literal(min) {
                let mut row = numer_expr.clone();
                let mut scaled = denom_expr.clone();
                scaled.scale(v);
                row.sub_assign(&scaled);
                out.push(LpConstraint {
                    expr: row,
                    op: ConstraintOp::Ge,
                    subject: ConstraintSubject::NutrientRatio,
                    label: "ratio min".to_string(),
                    span: constraint.span,
                });
            }
        }
        if let Some(max) = &constraint.bounds.max {
            if let Some((v, _)) = fold_literal(max) {
                let mut row = numer_expr.clone();
                let mut scaled = denom_expr.clone();
                scaled.scale(v);
                row.sub_assign(&scaled);
                out.push(LpConstraint {
                    expr: row,
                    op: ConstraintOp::Le,
                    subject: ConstraintSubject::NutrientRatio,
                    label: "ratio max".to_string(),
                    span: constraint.span,
                });
            }
        }
        return out;
    }

    let expr = lower_expr(&constraint.lhs, program, constraint.span, diagnostics);
    let subject = subject_of(&constraint.lhs);
    if let Some(min) = &constraint.bounds.min {
        match eval_nutrient_bound(min, batch_size) {
            Some(v) => {
                let mut row = expr.clone();
                row.add_constant(-v);
                out.push(LpConstraint { expr: row, op: ConstraintOp::Ge, subject, label: "min".to_string(), span: constraint.span });
            }
            None => emit_non_literal_bound(diagnostics, constraint.span),
        }
    }
    if let Some(max) = &constraint.bounds.max {
        match eval_nutrient_bound(max, batch_size) {
            Some(v) => {
                let mut row = expr.clone();
                row.add_constant(-v);
                out.push(LpConstraint { expr: row, op: ConstraintOp::Le, subject, label: "max".to_string(), span: constraint.span });
            }
            None => emit_non_literal_bound(diagnostics, constraint.span),
        }
    }
    out
}

fn emit_non_literal_bound(diagnostics: &mut Diagnostics, span: Span) {
    diagnostics
        .error(
            DiagnosticCode::TypeWrongKindReference,
            "a constraint bound must reduce to a plain number or percent literal",
            range_of(span),
        )
        .emit();
}

fn apply_ingredient_constraint(
    model: &mut LpModel,
    program: &Program,
    constraint: &Constraint,
    batch_size: f64,
    diagnostics: &mut Diagnostics,
) {
    if let ResolvedExpr::Ingredient(sym) = &constraint.lhs {
        if let Some(min) = &constraint.bounds.min {
            match eval_ingredient_bound(min, batch_size) {
                Some(v) => {
                    model.lower.insert(*sym, v);
                }
                None => emit_non_literal_bound(diagnostics, constraint.span),
            }
        }
        if let Some(max) = &constraint.bounds.max {
            match eval_ingredient_bound(max, batch_size) {
                Some(v) => {
                    model.upper.insert(*sym, v);
                }
                None => emit_non_literal_bound(diagnostics, constraint.span),
            }
        }
        return;
    }

    let expr = lower_expr(&constraint.lhs, program, constraint.span, diagnostics);
    let subject = subject_of(&constraint.lhs);
    if let Some(min) = &constraint.bounds.min {
        match eval_ingredient_bound(min, batch_size) {
            Some(v) => {
                let mut row = expr.clone();
                row.add_constant(-v);
                model.constraints.push(LpConstraint { expr: row, op: ConstraintOp::Ge, subject, label: "min".to_string(), span: constraint.span });
            }
            None => emit_non_literal_bound(diagnostics, constraint.span),
        }
    }
    if let Some(max) = &constraint.bounds.max {
        match eval_ingredient_bound(max, batch_size) {
            Some(v) => {
                let mut row = expr.clone();
                row.add_constant(-v);
                model.constraints.push(LpConstraint { expr: row, op: ConstraintOp::Le, subject, label: "max".to_string(), span: constraint.span });
            }
            None => emit_non_literal_bound(diagnostics, constraint.span),
        }
    }
}

/// Builds the neutral LP for a composed, non-template formula. Returns
/// `None` only when the formula has no declared batch size — the loader
/// already reported `SemanticMissingBatchSize` for that case, so this is a
/// quiet bail, not a new diagnostic.
pub fn build(
    program: &Program,
    formula: &FormulaDef,
    composed: &ComposedFormula,
    diagnostics: &mut Diagnostics,
) -> Option<LpModel> {
    let batch_size = formula.batch_size?;

    let mut model = LpModel {
        ingredients: composed.ingredient_order.clone(),
        batch_size,
        ..Default::default()
    };
    for &ing in &model.ingredients {
        model.lower.insert(ing, 0.0);
        model.upper.insert(ing, batch_size);
        let cost = program.ingredients.get(&ing).and_then(|d| d.cost).unwrap_or(0.0);
        model.cost.insert(ing, cost);
    }

    for constraint in composed.ingredients.values() {
        apply_ingredient_constraint(&mut model, program, constraint, batch_size, diagnostics);
    }

    for constraint in composed.nutrients.values() {
        model.constraints.extend(nutrient_rows(constraint, program, batch_size, diagnostics));
    }

    let mut batch_expr = LinExpr::zero();
    for &ing in &model.ingredients {
        batch_expr.add_term(ing, 1.0);
    }
    batch_expr.add_constant(-batch_size);
    model.constraints.push(LpConstraint {
        expr: batch_expr,
        op: ConstraintOp::Eq,
        subject: ConstraintSubject::Batch,
        label: "batch".to_string(),
        span: formula.span,
    });

    Some(model)
}

#[cfg(test)]
#[path = "lp_tests.rs"]
mod lp_tests;
