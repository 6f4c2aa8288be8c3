use super::*;
use crate::model::{FormulaDef, IngredientDef, NutrientDef, Program};
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

fn formula_def(batch_size: f64) -> FormulaDef {
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

/// Scenario 1: a feasible minimal formula, corn and soybean meal meeting a
/// 20% protein floor.
#[test]
fn minimal_feasible_formula_solves_optimal() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let protein = interner.intern("feed.protein");
    let corn = interner.intern("feed.corn");
    let soy = interner.intern("feed.soybean_meal");
    program.nutrients.insert(protein, NutrientDef { name: protein, ..Default::default() });
    program.ingredients.insert(corn, ingredient(150.0, &[(protein, 8.5)]));
    program.ingredients.insert(soy, ingredient(450.0, &[(protein, 48.0)]));

    let formula = formula_def(1000.0);
    let mut composed_nutrients = indexmap::IndexMap::new();
    composed_nutrients.insert(
        crate::model::CanonicalLhs::Nutrient(protein),
        crate::model::Constraint {
            lhs: crate::model::ResolvedExpr::Nutrient(protein),
            bounds: crate::model::Bounds { min: Some(crate::model::ResolvedExpr::Num(20.0)), max: None },
            span: Span::default(),
        },
    );
    let composed = crate::model::ComposedFormula {
        nutrients: composed_nutrients,
        ingredients: indexmap::IndexMap::new(),
        ingredient_order: vec![corn, soy],
    };

    let mut diagnostics = crate::diagnostics::Diagnostics::new();
    let model = crate::lp::build(&program, &formula, &composed, &mut diagnostics).unwrap();
    assert!(diagnostics.is_empty());

    let formula_sym = interner.intern("feed.f");
    let report = solve(&program, &interner, &formula, formula_sym, &model);
    assert_eq!(report.status, SolveStatus::Optimal);
    assert!((report.batch_size - 1000.0).abs() < 1e-9);
    let total_amount: f64 = report.ingredients.iter().map(|i| i.amount).sum();
    assert!((total_amount - 1000.0).abs() < 1e-3);
    // Soy is the binding-constraint ingredient (corn alone can't meet the
    // floor), but soy costs more per ton than corn, so the optimum uses just
    // enough soy to hit the floor exactly rather than more: x_soy = 115/0.395.
    let soy_line = report.ingredients.iter().find(|i| i.name == "feed.soybean_meal").unwrap();
    assert!((soy_line.amount - 291.139_240_506_329).abs() < 1e-3);
    let protein_line = report.nutrients.iter().find(|n| n.name == "feed.protein").unwrap();
    assert!((protein_line.value - 20.0).abs() < 1e-3);
}

/// Scenario 5: an unmeetable protein floor degrades to a best-effort
/// report with a reported violation, not a hard failure.
#[test]
fn unreachable_protein_floor_reports_infeasible_with_violation() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let protein = interner.intern("feed.protein");
    let soy = interner.intern("feed.soybean_meal");
    program.nutrients.insert(protein, NutrientDef { name: protein, ..Default::default() });
    program.ingredients.insert(soy, ingredient(450.0, &[(protein, 48.0)]));

    let formula = formula_def(1000.0);
    let mut composed_nutrients = indexmap::IndexMap::new();
    composed_nutrients.insert(
        crate::model::CanonicalLhs::Nutrient(protein),
        crate::model::Constraint {
            lhs: crate::model::ResolvedExpr::Nutrient(protein),
            bounds: crate::model::Bounds { min: Some(crate::model::ResolvedExpr::Num(60.0)), max: None },
            span: Span::default(),
        },
    );
    let composed = crate::model::ComposedFormula {
        nutrients: composed_nutrients,
        ingredients: indexmap::IndexMap::new(),
        ingredient_order: vec![soy],
    };

    let mut diagnostics = crate::diagnostics::Diagnostics::new();
    let model = crate::lp::build(&program, &formula, &composed, &mut diagnostics).unwrap();

    let formula_sym = interner.intern("feed.f");
    let report = solve(&program, &interner, &formula, formula_sym, &model);
    assert_eq!(report.status, SolveStatus::Infeasible);
    assert!(!report.violations.is_empty());
    let violation = &report.violations[0];
    assert!((violation.required - 600.0).abs() < 1e-6);
    // Soy is the only ingredient, so the relaxed solve is forced to 1000 tons
    // of it: actual protein mass is exactly 0.48 * 1000 = 480, gap = 120.
    assert!((violation.actual - 480.0).abs() < 1e-3);
    assert!((violation.gap - 120.0).abs() < 1e-3);
    let total_amount: f64 = report.ingredients.iter().map(|i| i.amount).sum();
    assert!((total_amount - 1000.0).abs() < 1e-3);
}

/// Scenario 1, driven end to end from source text through `crate::solve`
/// rather than a hand-built `ComposedFormula` — exercises
/// `resolver::resolve` and `composition::compose` too, which the
/// hand-built tests above skip entirely.
#[test]
fn minimal_feasible_formula_solves_end_to_end_from_source() {
    let source = r#"
nutrient protein

ingredient corn {
    cost: 150
    protein: 8.5
}

ingredient soybean_meal {
    cost: 450
    protein: 48
}

formula starter {
    batch_size: 1000
    nutrients {
        protein min 20
    }
    ingredients {
        corn
        soybean_meal
    }
}
"#;
    let report = crate::solve(source, "starter").expect("starter should solve");
    assert_eq!(report.status, SolveStatus::Optimal);

    let soy_share = report
        .ingredients
        .iter()
        .find(|i| i.name.ends_with("soybean_meal"))
        .unwrap()
        .amount
        / report.batch_size;
    assert!((soy_share - 0.291_139_240_506_329).abs() < 1e-3);

    let protein = report.nutrients.iter().find(|n| n.name.ends_with("protein")).unwrap();
    assert!((protein.value - 20.0).abs() < 1e-3);

    assert!((report.total_cost - 237_341.772_152).abs() < 1e-2);
}

/// A host embedding the core round-trips `SolveResult` as JSON (§5's
/// serializable-value-types requirement); assert on the wire shape rather
/// than just that serialization doesn't panic, since field renames/drops
/// are exactly what a JSON-shape test should catch.
#[test]
fn solve_result_serializes_to_the_documented_json_shape() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let protein = interner.intern("feed.protein");
    let corn = interner.intern("feed.corn");
    program.nutrients.insert(protein, NutrientDef { name: protein, ..Default::default() });
    program.ingredients.insert(corn, ingredient(150.0, &[(protein, 8.5)]));

    let formula = formula_def(1000.0);
    let composed = crate::model::ComposedFormula {
        nutrients: indexmap::IndexMap::new(),
        ingredients: indexmap::IndexMap::new(),
        ingredient_order: vec![corn],
    };

    let mut diagnostics = crate::diagnostics::Diagnostics::new();
    let model = crate::lp::build(&program, &formula, &composed, &mut diagnostics).unwrap();
    let formula_sym = interner.intern("feed.f");
    let report = solve(&program, &interner, &formula, formula_sym, &model);

    let value = serde_json::to_value(&report).expect("SolveResult must serialize");
    assert_eq!(value["status"], serde_json::json!("optimal"));
    assert!((value["batch_size"].as_f64().unwrap() - 1000.0).abs() < 1e-9);
    let ingredients = value["ingredients"].as_array().expect("ingredients is a JSON array");
    assert_eq!(ingredients.len(), 1);
    assert_eq!(ingredients[0]["name"], serde_json::json!("feed.corn"));
    assert!(ingredients[0].get("amount").is_some());
}
