use super::*;
use crate::model::{Bounds, FormulaDef, IngredientDef};
use formulang_base::{Interner, Span};

fn ingredient(cost: f64, nutrients: &[(Symbol, f64)]) -> IngredientDef {
    IngredientDef {
        name: Symbol::default(),
        cost: Some(cost),
        description: None,
        nutrient_values: nutrients.iter().copied().collect(),
        span: Span::default(),
    }
}

fn bare(lhs: ResolvedExpr, min: Option<ResolvedExpr>, max: Option<ResolvedExpr>) -> Constraint {
    Constraint { lhs, bounds: Bounds { min, max }, span: Span::default() }
}

fn minimal_formula(batch_size: f64) -> FormulaDef {
    FormulaDef {
        name: Symbol::default(),
        is_template: false,
        batch_size: Some(batch_size),
        nutrient_items: vec![],
        ingredient_items: vec![],
        span: Span::default(),
        ..Default::default()
    }
}

#[test]
fn implicit_bounds_span_zero_to_batch_size() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let corn = interner.intern("feed.corn");
    program.ingredients.insert(corn, ingredient(150.0, &[]));

    let formula = minimal_formula(1000.0);
    let composed = ComposedFormula { ingredient_order: vec![corn], ..Default::default() };

    let mut diagnostics = Diagnostics::new();
    let model = build(&program, &formula, &composed, &mut diagnostics).unwrap();
    assert_eq!(model.lower[&corn], 0.0);
    assert_eq!(model.upper[&corn], 1000.0);
    assert_eq!(model.cost[&corn], 150.0);
}

#[test]
fn percent_and_absolute_ingredient_bounds_agree() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let corn = interner.intern("feed.corn");
    program.ingredients.insert(corn, ingredient(150.0, &[]));
    let formula = minimal_formula(1000.0);

    let mut percent = IndexMap::new();
    percent.insert(
        CanonicalLhs::Ingredient(corn),
        bare(ResolvedExpr::Ingredient(corn), None, Some(ResolvedExpr::Percent(50.0))),
    );
    let composed_percent = ComposedFormula { ingredients: percent, ingredient_order: vec![corn], ..Default::default() };

    let mut absolute = IndexMap::new();
    absolute.insert(
        CanonicalLhs::Ingredient(corn),
        bare(ResolvedExpr::Ingredient(corn), None, Some(ResolvedExpr::Num(500.0))),
    );
    let composed_absolute = ComposedFormula { ingredients: absolute, ingredient_order: vec![corn], ..Default::default() };

    let mut diagnostics = Diagnostics::new();
    let model_percent = build(&program, &formula, &composed_percent, &mut diagnostics).unwrap();
    let model_absolute = build(&program, &formula, &composed_absolute, &mut diagnostics).unwrap();
    assert_eq!(model_percent.upper[&corn], model_absolute.upper[&corn]);
    assert_eq!(model_percent.upper[&corn], 500.0);
}

#[test]
fn nutrient_bound_substitutes_content_sum_and_scales_by_batch() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let protein = interner.intern("feed.protein");
    let corn = interner.intern("feed.corn");
    let soy = interner.intern("feed.soy");
    program.ingredients.insert(corn, ingredient(150.0, &[(protein, 8.5)]));
    program.ingredients.insert(soy, ingredient(450.0, &[(protein, 48.0)]));
    let formula = minimal_formula(1000.0);

    let mut nutrients = IndexMap::new();
    nutrients.insert(
        CanonicalLhs::Nutrient(protein),
        bare(ResolvedExpr::Nutrient(protein), Some(ResolvedExpr::Num(20.0)), None),
    );
    let composed = ComposedFormula {
        nutrients,
        ingredient_order: vec![corn, soy],
        ..Default::default()
    };

    let mut diagnostics = Diagnostics::new();
    let model = build(&program, &formula, &composed, &mut diagnostics).unwrap();
    assert!(diagnostics.is_empty());
    let row = model.constraints.iter().find(|c| c.op == ConstraintOp::Ge && c.subject == ConstraintSubject::Nutrient(protein)).unwrap();
    assert_eq!(row.expr.coeffs[&corn], 8.5);
    assert_eq!(row.expr.coeffs[&soy], 48.0);
    // 20% of a 1000 batch -> constant term is -200.
    assert_eq!(row.expr.constant, -200.0);
}

#[test]
fn ratio_constraint_linearizes_without_batch_scaling() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let calcium = interner.intern("feed.calcium");
    let phosphorus = interner.intern("feed.phosphorus");
    let corn = interner.intern("feed.corn");
    program.ingredients.insert(corn, ingredient(150.0, &[(calcium, 2.0), (phosphorus, 1.0)]));
    let formula = minimal_formula(1000.0);

    let ratio_lhs = ResolvedExpr::Binary(
        BinOp::Div,
        Box::new(ResolvedExpr::Nutrient(calcium)),
        Box::new(ResolvedExpr::Nutrient(phosphorus)),
    );
    let mut nutrients = IndexMap::new();
    nutrients.insert(
        CanonicalLhs::Binary(BinOp::Div, Box::new(CanonicalLhs::Nutrient(calcium)), Box::new(CanonicalLhs::Nutrient(phosphorus))),
        bare(ratio_lhs, Some(ResolvedExpr::Num(1.5)), Some(ResolvedExpr::Num(2.0))),
    );
    let composed = ComposedFormula { nutrients, ingredient_order: vec![corn], ..Default::default() };

    let mut diagnostics = Diagnostics::new();
    let model = build(&program, &formula, &composed, &mut diagnostics).unwrap();
    assert!(diagnostics.is_empty());
    let rows: Vec<_> = model.constraints.iter().filter(|c| c.subject == ConstraintSubject::NutrientRatio).collect();
    assert_eq!(rows.len(), 2);
    // min row: calcium - 1.5*phosphorus >= 0 -> coeff on corn is 2.0 - 1.5*1.0
    let min_row = rows.iter().find(|c| c.op == ConstraintOp::Ge).unwrap();
    assert!((min_row.expr.coeffs[&corn] - 0.5).abs() < 1e-9);
    assert_eq!(min_row.expr.constant, 0.0);
}

#[test]
fn batch_constraint_sums_to_batch_size() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let corn = interner.intern("feed.corn");
    let soy = interner.intern("feed.soy");
    program.ingredients.insert(corn, ingredient(150.0, &[]));
    program.ingredients.insert(soy, ingredient(450.0, &[]));
    let formula = minimal_formula(1000.0);
    let composed = ComposedFormula { ingredient_order: vec![corn, soy], ..Default::default() };

    let mut diagnostics = Diagnostics::new();
    let model = build(&program, &formula, &composed, &mut diagnostics).unwrap();
    let batch_row = model.constraints.iter().find(|c| c.subject == ConstraintSubject::Batch).unwrap();
    assert_eq!(batch_row.op, ConstraintOp::Eq);
    assert_eq!(batch_row.expr.coeffs[&corn], 1.0);
    assert_eq!(batch_row.expr.coeffs[&soy], 1.0);
    assert_eq!(batch_row.expr.constant, -1000.0);
}

#[test]
fn missing_batch_size_yields_no_model() {
    let program = Program::default();
    let mut formula = minimal_formula(1000.0);
    formula.batch_size = None;
    let composed = ComposedFormula::default();
    let mut diagnostics = Diagnostics::new();
    assert!(build(&program, &formula, &composed, &mut diagnostics).is_none());
}
