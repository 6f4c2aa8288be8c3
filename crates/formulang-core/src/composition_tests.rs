use super::*;
use crate::model::{Bounds, FormulaDef, GroupDef};
use formulang_base::Span;

fn sym(interner: &mut Interner, s: &str) -> Symbol {
    interner.intern(s)
}

fn bare(lhs: ResolvedExpr, min: Option<f64>, max: Option<f64>) -> Constraint {
    Constraint {
        lhs,
        bounds: Bounds {
            min: min.map(ResolvedExpr::Num),
            max: max.map(ResolvedExpr::Num),
        },
        span: Span::default(),
    }
}

fn formula(nutrient_items: Vec<RawBlockItem>, ingredient_items: Vec<RawBlockItem>) -> FormulaDef {
    FormulaDef {
        name: Symbol::default(),
        is_template: false,
        batch_size: Some(1000.0),
        nutrient_items,
        ingredient_items,
        span: Span::default(),
        ..Default::default()
    }
}

fn all_of(formula: Symbol, block: BlockKind) -> RawBlockItem {
    RawBlockItem::Composition(CompositionRef::AllOf { formula, block, span: Span::default() })
}

#[test]
fn all_of_pulls_in_base_constraints_and_ingredient_order() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let corn = sym(&mut interner, "feed.corn");
    let protein = sym(&mut interner, "feed.protein");
    let base = sym(&mut interner, "feed.base");
    let child = sym(&mut interner, "feed.child");

    program.formulas.insert(
        base,
        formula(
            vec![RawBlockItem::Constraint(bare(ResolvedExpr::Nutrient(protein), Some(18.0), None))],
            vec![RawBlockItem::Constraint(bare(ResolvedExpr::Ingredient(corn), None, Some(500.0)))],
        ),
    );
    program.formulas.insert(
        child,
        formula(
            vec![all_of(base, BlockKind::Nutrients)],
            vec![all_of(base, BlockKind::Ingredients)],
        ),
    );

    let mut diagnostics = Diagnostics::new();
    let composed = compose(&program, &interner, child, &mut diagnostics).unwrap();
    assert!(diagnostics.is_empty());
    assert_eq!(composed.nutrients.len(), 1);
    assert_eq!(composed.ingredients.len(), 1);
    assert_eq!(composed.ingredient_order, vec![corn]);
}

#[test]
fn later_constraint_with_same_lhs_replaces_the_earlier_one_as_a_whole() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let protein = sym(&mut interner, "feed.protein");
    let base = sym(&mut interner, "feed.base");
    let child = sym(&mut interner, "feed.child");

    program.formulas.insert(
        base,
        formula(
            vec![RawBlockItem::Constraint(bare(ResolvedExpr::Nutrient(protein), Some(18.0), Some(22.0)))],
            vec![],
        ),
    );
    program.formulas.insert(
        child,
        formula(
            vec![
                all_of(base, BlockKind::Nutrients),
                RawBlockItem::Constraint(bare(ResolvedExpr::Nutrient(protein), Some(20.0), None)),
            ],
            vec![],
        ),
    );

    let mut diagnostics = Diagnostics::new();
    let composed = compose(&program, &interner, child, &mut diagnostics).unwrap();
    assert_eq!(composed.nutrients.len(), 1);
    let key = CanonicalLhs::Nutrient(protein);
    let constraint = composed.nutrients.get(&key).unwrap();
    // The override replaces the whole bound set, not just `min`: the base's
    // `max 22` must not survive.
    assert_eq!(constraint.bounds.min, Some(ResolvedExpr::Num(20.0)));
    assert!(constraint.bounds.max.is_none());
}

#[test]
fn composition_cycle_is_reported_and_does_not_infinite_loop() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let a = sym(&mut interner, "feed.a");
    let b = sym(&mut interner, "feed.b");

    program
        .formulas
        .insert(a, formula(vec![all_of(b, BlockKind::Nutrients)], vec![]));
    program
        .formulas
        .insert(b, formula(vec![all_of(a, BlockKind::Nutrients)], vec![]));

    let mut diagnostics = Diagnostics::new();
    let composed = compose(&program, &interner, a, &mut diagnostics).unwrap();
    assert!(diagnostics.has_errors());
    assert!(composed.nutrients.is_empty());
}

#[test]
fn single_bound_pulls_only_the_requested_bound() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let protein = sym(&mut interner, "feed.protein");
    let base = sym(&mut interner, "feed.base");
    let child = sym(&mut interner, "feed.child");

    program.formulas.insert(
        base,
        formula(
            vec![RawBlockItem::Constraint(bare(ResolvedExpr::Nutrient(protein), Some(18.0), Some(22.0)))],
            vec![],
        ),
    );
    program.formulas.insert(
        child,
        formula(
            vec![RawBlockItem::Composition(CompositionRef::SingleBound {
                formula: base,
                block: BlockKind::Nutrients,
                name: protein,
                is_max: false,
                span: Span::default(),
            })],
            vec![],
        ),
    );

    let mut diagnostics = Diagnostics::new();
    let composed = compose(&program, &interner, child, &mut diagnostics).unwrap();
    assert!(diagnostics.is_empty());
    let constraint = composed.nutrients.get(&CanonicalLhs::Nutrient(protein)).unwrap();
    assert_eq!(constraint.bounds.min, Some(ResolvedExpr::Num(18.0)));
    assert!(constraint.bounds.max.is_none());
}

#[test]
fn single_bound_missing_on_base_warns_and_contributes_nothing() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let protein = sym(&mut interner, "feed.protein");
    let base = sym(&mut interner, "feed.base");
    let child = sym(&mut interner, "feed.child");

    program.formulas.insert(
        base,
        formula(
            vec![RawBlockItem::Constraint(bare(ResolvedExpr::Nutrient(protein), Some(18.0), None))],
            vec![],
        ),
    );
    program.formulas.insert(
        child,
        formula(
            vec![RawBlockItem::Composition(CompositionRef::SingleBound {
                formula: base,
                block: BlockKind::Nutrients,
                name: protein,
                is_max: true,
                span: Span::default(),
            })],
            vec![],
        ),
    );

    let mut diagnostics = Diagnostics::new();
    let composed = compose(&program, &interner, child, &mut diagnostics).unwrap();
    assert!(!diagnostics.has_errors());
    assert_eq!(diagnostics.len(), 1);
    assert!(composed.nutrients.is_empty());
}

#[test]
fn group_select_expands_to_bare_ingredient_mentions() {
    let mut interner = Interner::new();
    let mut program = Program::default();
    let corn = sym(&mut interner, "feed.corn");
    let soy = sym(&mut interner, "feed.soy");
    let grains = sym(&mut interner, "feed.grains");
    let child = sym(&mut interner, "feed.child");

    program.groups.insert(
        grains,
        GroupDef { name: grains, members: vec![corn, soy], span: Span::default() },
    );
    program.formulas.insert(
        child,
        formula(
            vec![],
            vec![RawBlockItem::Composition(CompositionRef::GroupSelect {
                group: grains,
                members: vec![corn],
                span: Span::default(),
            })],
        ),
    );

    let mut diagnostics = Diagnostics::new();
    let composed = compose(&program, &interner, child, &mut diagnostics).unwrap();
    assert!(diagnostics.is_empty());
    assert_eq!(composed.ingredients.len(), 1);
    assert!(composed.ingredients.contains_key(&CanonicalLhs::Ingredient(corn)));
    assert_eq!(composed.ingredient_order, vec![corn]);
}

#[test]
fn unknown_formula_returns_none() {
    let interner = Interner::new();
    let program = Program::default();
    let mut diagnostics = Diagnostics::new();
    assert!(compose(&program, &interner, Symbol::default(), &mut diagnostics).is_none());
}
