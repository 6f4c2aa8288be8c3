//! Solver adapter: translates a neutral [`LpModel`] into `good_lp`'s
//! pure-Rust `microlp` backend, classifies the outcome, and builds the
//! user-facing solve report.
//!
//! `good_lp` exposes no portable dual-value query for the `microlp`
//! backend, so shadow prices here are computed by finite difference:
//! perturb a binding constraint's bound by one unit, re-solve, and take the
//! change in total cost. More re-solves than a native dual read, but it
//! only touches the primal API every backend in this crate's dependency
//! tree actually implements.

use good_lp::{variable, Expression, ResolutionError, Solution, SolverModel, Variable};
use indexmap::IndexMap;

use formulang_base::{Interner, Symbol};

use crate::lp::{ConstraintOp, ConstraintSubject, LinExpr, LpConstraint, LpModel};
use crate::model::{FormulaDef, Program};

/// Large per-unit penalty applied to relaxation slacks when a formula is
/// infeasible as stated. Large enough to dominate any realistic ingredient
/// cost, so the solver only uses slack when there is truly no feasible
/// point without it.
const BIG_M: f64 = 1.0e7;
const BINDING_EPSILON: f64 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Error,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IngredientLine {
    pub name: String,
    pub amount: f64,
    pub percentage: f64,
    pub unit_cost: f64,
    pub cost: f64,
    pub cost_percentage: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct NutrientLine {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Violation {
    pub subject: String,
    pub required: f64,
    pub actual: f64,
    pub gap: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ShadowPrice {
    pub constraint: String,
    pub value: f64,
    pub interpretation: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Analysis {
    pub binding_constraints: Vec<String>,
    pub shadow_prices: Vec<ShadowPrice>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub formula: String,
    pub formula_name: Option<String>,
    pub formula_code: Option<String>,
    pub description: Option<String>,
    pub batch_size: f64,
    pub total_cost: f64,
    pub ingredients: Vec<IngredientLine>,
    pub nutrients: Vec<NutrientLine>,
    pub analysis: Option<Analysis>,
    pub violations: Vec<Violation>,
    pub message: Option<String>,
}

fn name_of(interner: &Interner, sym: Symbol) -> String {
    interner.try_resolve(sym).unwrap_or("<unknown>").to_string()
}

fn to_expression(expr: &LinExpr, vars: &IndexMap<Symbol, Variable>) -> Expression {
    let mut out = Expression::from(0.0);
    for (&sym, &coeff) in &expr.coeffs {
        if coeff == 0.0 {
            continue;
        }
        if let Some(&v) = vars.get(&sym) {
            out += coeff * v;
        }
    }
    out
}

fn to_constraint(expr: Expression, op: ConstraintOp, rhs: f64) -> good_lp::Constraint {
    match op {
        ConstraintOp::Ge => expr.geq(rhs),
        ConstraintOp::Le => expr.leq(rhs),
        ConstraintOp::Eq => expr.eq(rhs),
    }
}

fn eval_expr(expr: &LinExpr, values: &IndexMap<Symbol, f64>) -> f64 {
    let mut total = expr.constant;
    for (&sym, &coeff) in &expr.coeffs {
        total += coeff * values.get(&sym).copied().unwrap_or(0.0);
    }
    total
}

struct Solved {
    values: IndexMap<Symbol, f64>,
    objective: f64,
}

/// Builds the `good_lp` problem for `model`, with `constraints` standing in
/// for `model.constraints` (the relaxed fallback swaps this out) and solves
/// it once.
fn solve_model(model: &LpModel, constraints: &[LpConstraint]) -> Result<Solved, ResolutionError> {
    let mut problem = good_lp::ProblemVariables::new();
    let mut vars: IndexMap<Symbol, Variable> = IndexMap::new();
    for &ing in &model.ingredients {
        let lo = model.lower.get(&ing).copied().unwrap_or(0.0);
        let hi = model.upper.get(&ing).copied().unwrap_or(model.batch_size);
        let v = problem.add(variable().min(lo).max(hi));
        vars.insert(ing, v);
    }

    let mut cost_expr = LinExpr::zero();
    for &ing in &model.ingredients {
        let cost = model.cost.get(&ing).copied().unwrap_or(0.0);
        cost_expr.add_term(ing, cost);
    }
    let objective = to_expression(&cost_expr, &vars);

    let mut solver = problem.minimise(objective.clone()).using(good_lp::microlp);
    for row in constraints {
        let expr = to_expression(&row.expr, &vars);
        solver = solver.with(to_constraint(expr, row.op, -row.expr.constant));
    }

    let solution = solver.solve()?;
    let values: IndexMap<Symbol, f64> = vars.iter().map(|(&sym, &v)| (sym, solution.value(v))).collect();
    let objective_value = eval_expr(&cost_expr, &values);
    Ok(Solved { values, objective: objective_value })
}

/// Rebuilds the LP with a non-negative slack added to every relaxable
/// `min` row (see [`LpConstraint::is_relaxable_min`]) and penalizes the
/// slacks' sum in the objective, so the solve always prefers the least
/// total shortfall rather than failing outright.
fn solve_relaxed(model: &LpModel) -> Result<(Solved, IndexMap<usize, f64>), ResolutionError> {
    let mut problem = good_lp::ProblemVariables::new();
    let mut vars: IndexMap<Symbol, Variable> = IndexMap::new();
    for &ing in &model.ingredients {
        let lo = model.lower.get(&ing).copied().unwrap_or(0.0);
        let hi = model.upper.get(&ing).copied().unwrap_or(model.batch_size);
        let v = problem.add(variable().min(lo).max(hi));
        vars.insert(ing, v);
    }

    let mut slacks: IndexMap<usize, Variable> = IndexMap::new();
    for (idx, row) in model.constraints.iter().enumerate() {
        if row.is_relaxable_min() {
            slacks.insert(idx, problem.add(variable().min(0.0)));
        }
    }

    let mut cost_expr = Expression::from(0.0);
    for &ing in &model.ingredients {
        let cost = model.cost.get(&ing).copied().unwrap_or(0.0);
        if cost != 0.0 {
            cost_expr += cost * vars[&ing];
        }
    }
    let mut objective = cost_expr.clone();
    for &s in slacks.values() {
        objective += BIG_M * s;
    }

    let mut solver = problem.minimise(objective).using(good_lp::microlp);
    for (idx, row) in model.constraints.iter().enumerate() {
        let base = to_expression(&row.expr, &vars);
        let expr = match slacks.get(&idx) {
            Some(&s) => base + s,
            None => base,
        };
        solver = solver.with(to_constraint(expr, row.op, -row.expr.constant));
    }

    let solution = solver.solve()?;
    let values: IndexMap<Symbol, f64> = vars.iter().map(|(&sym, &v)| (sym, solution.value(v))).collect();
    let slack_values: IndexMap<usize, f64> = slacks.iter().map(|(&idx, &v)| (idx, solution.value(v))).collect();

    let mut raw_cost = LinExpr::zero();
    for &ing in &model.ingredients {
        raw_cost.add_term(ing, model.cost.get(&ing).copied().unwrap_or(0.0));
    }
    let objective_value = eval_expr(&raw_cost, &values);

    Ok((Solved { values, objective: objective_value }, slack_values))
}

fn required_value(row: &LpConstraint) -> f64 {
    -row.expr.constant
}

fn subject_name(interner: &Interner, subject: ConstraintSubject) -> String {
    match subject {
        ConstraintSubject::Nutrient(sym) => name_of(interner, sym),
        ConstraintSubject::Ingredient(sym) => name_of(interner, sym),
        ConstraintSubject::NutrientRatio => "ratio".to_string(),
        ConstraintSubject::Batch => "batch".to_string(),
        ConstraintSubject::Other => "constraint".to_string(),
    }
}

/// Perturbs a single binding row's bound by one unit (relaxing direction)
/// and re-solves from scratch, returning the new objective value.
fn resolve_relaxed_by_one(model: &LpModel, row_index: usize) -> Option<f64> {
    let mut constraints = model.constraints.clone();
    let row = constraints.get_mut(row_index)?;
    row.expr.constant = match row.op {
        ConstraintOp::Ge => row.expr.constant + 1.0,
        ConstraintOp::Le => row.expr.constant - 1.0,
        ConstraintOp::Eq => return None,
    };
    solve_model(model, &constraints).ok().map(|s| s.objective)
}

fn build_analysis(model: &LpModel, interner: &Interner, base: &Solved) -> Analysis {
    let mut binding = Vec::new();
    let mut shadow_prices = Vec::new();

    for (idx, row) in model.constraints.iter().enumerate() {
        if matches!(row.op, ConstraintOp::Eq) {
            continue;
        }
        let value = eval_expr(&row.expr, &base.values);
        if value.abs() > BINDING_EPSILON {
            continue;
        }
        let label = format!("{} {}", subject_name(interner, row.subject), row.label);
        binding.push(label.clone());

        if let Some(new_objective) = resolve_relaxed_by_one(model, idx) {
            let saved = base.objective - new_objective;
            let direction = if row.op == ConstraintOp::Ge { "lower bound" } else { "upper bound" };
            shadow_prices.push(ShadowPrice {
                constraint: label,
                value: saved,
                interpretation: format!(
                    "relaxing this {direction} by one unit would reduce total cost by {:.4}",
                    saved
                ),
            });
        }
    }

    Analysis { binding_constraints: binding, shadow_prices }
}

fn build_report(
    program: &Program,
    interner: &Interner,
    formula: &FormulaDef,
    formula_sym: Symbol,
    model: &LpModel,
    status: SolveStatus,
    solved: Option<&Solved>,
    violations: Vec<Violation>,
    analysis: Option<Analysis>,
    message: Option<String>,
) -> SolveResult {
    let total_cost = solved.map(|s| s.objective).unwrap_or(0.0);
    let mut ingredients = Vec::new();
    if let Some(solved) = solved {
        for &ing in &model.ingredients {
            let amount = solved.values.get(&ing).copied().unwrap_or(0.0);
            let unit_cost = model.cost.get(&ing).copied().unwrap_or(0.0);
            let cost = unit_cost * amount;
            ingredients.push(IngredientLine {
                name: name_of(interner, ing),
                amount,
                percentage: if model.batch_size != 0.0 { amount / model.batch_size * 100.0 } else { 0.0 },
                unit_cost,
                cost,
                cost_percentage: if total_cost != 0.0 { cost / total_cost * 100.0 } else { 0.0 },
            });
        }
    }

    let mut nutrients = Vec::new();
    if let Some(solved) = solved {
        for &nutrient in program.nutrients.keys() {
            let mut total = 0.0;
            for &ing in &model.ingredients {
                // Declared content is percent-of-ingredient; divide to the same
                // absolute-mass basis `lp::lower_expr` uses for the LP's own rows.
                let content = program
                    .ingredients
                    .get(&ing)
                    .and_then(|d| d.nutrient_values.get(&nutrient).copied())
                    .unwrap_or(0.0)
                    / 100.0;
                total += content * solved.values.get(&ing).copied().unwrap_or(0.0);
            }
            if model.batch_size != 0.0 {
                nutrients.push(NutrientLine { name: name_of(interner, nutrient), value: total / model.batch_size * 100.0 });
            }
        }
    }

    SolveResult {
        status,
        formula: name_of(interner, formula_sym),
        formula_name: formula.display_name.clone(),
        formula_code: formula.code.clone(),
        description: formula.description.clone(),
        batch_size: model.batch_size,
        total_cost,
        ingredients,
        nutrients,
        analysis,
        violations,
        message,
    }
}

/// Solves `model` and builds the user-facing report. Never returns `Err`:
/// every failure mode the backend can produce is mapped to a `status`.
pub fn solve(
    program: &Program,
    interner: &Interner,
    formula: &FormulaDef,
    formula_sym: Symbol,
    model: &LpModel,
) -> SolveResult {
    match solve_model(model, &model.constraints) {
        Ok(solved) => {
            let analysis = build_analysis(model, interner, &solved);
            build_report(program, interner, formula, formula_sym, model, SolveStatus::Optimal, Some(&solved), Vec::new(), Some(analysis), None)
        }
        Err(ResolutionError::Infeasible) => match solve_relaxed(model) {
            Ok((solved, slacks)) => {
                let mut violations = Vec::new();
                for (&idx, &slack) in &slacks {
                    if slack <= BINDING_EPSILON {
                        continue;
                    }
                    let row = &model.constraints[idx];
                    let required = required_value(row);
                    // `row.expr` doesn't know about the slack variable, so
                    // evaluating it at the relaxed solution still yields the
                    // true (unrelaxed) left-hand side: `A - V`.
                    let actual = eval_expr(&row.expr, &solved.values) + required;
                    let gap = required - actual;
                    violations.push(Violation {
                        subject: subject_name(interner, row.subject),
                        required,
                        actual,
                        gap,
                    });
                }
                build_report(program, interner, formula, formula_sym, model, SolveStatus::Infeasible, Some(&solved), violations, None, None)
            }
            Err(err) => build_report(program, interner, formula, formula_sym, model, SolveStatus::Error, None, Vec::new(), None, Some(err.to_string())),
        },
        Err(err) => build_report(program, interner, formula, formula_sym, model, SolveStatus::Error, None, Vec::new(), None, Some(err.to_string())),
    }
}

#[cfg(test)]
#[path = "solver_tests.rs"]
mod solver_tests;
