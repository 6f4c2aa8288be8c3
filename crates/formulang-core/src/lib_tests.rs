use super::*;
use crate::solver::SolveStatus;

const MINIMAL: &str = r#"
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

#[test]
fn minimal_feasible_formula_solves_end_to_end() {
    let report = solve(MINIMAL, "starter").expect("starter should solve");
    assert_eq!(report.status, SolveStatus::Optimal);
    let total: f64 = report.ingredients.iter().map(|i| i.amount).sum();
    assert!((total - 1000.0).abs() < 1e-3);
    let protein = report.nutrients.iter().find(|n| n.name.ends_with("protein")).unwrap();
    // Cheapest feasible blend binds the protein floor exactly, rather than
    // overshooting it: corn alone can't reach 20%, so enough (but only
    // enough) soy is blended in to land exactly on the floor.
    assert!((protein.value - 20.0).abs() < 1e-3);
    let soy = report.ingredients.iter().find(|i| i.name.ends_with("soybean_meal")).unwrap();
    assert!((soy.amount - 291.139_240_506_329).abs() < 1e-3);
}

fn capped_corn_source(bound: &str) -> String {
    format!(
        r#"
ingredient corn {{
    cost: 150
}}

ingredient soybean_meal {{
    cost: 450
}}

formula starter {{
    batch_size: 1000
    ingredients {{
        corn max {bound}
        soybean_meal
    }}
}}
"#
    )
}

#[test]
fn percent_and_absolute_ingredient_caps_agree_end_to_end() {
    let percent = solve(&capped_corn_source("50%"), "starter").expect("solves");
    let absolute = solve(&capped_corn_source("500"), "starter").expect("solves");
    assert_eq!(percent.status, SolveStatus::Optimal);
    assert_eq!(absolute.status, SolveStatus::Optimal);

    let corn_percent = percent.ingredients.iter().find(|i| i.name.ends_with("corn")).unwrap().amount;
    let corn_absolute = absolute.ingredients.iter().find(|i| i.name.ends_with("corn")).unwrap().amount;
    assert!((corn_percent - corn_absolute).abs() < 1e-6);
    assert!((corn_percent - 500.0).abs() < 1e-3);
}

const OVERRIDE_SOURCE: &str = r#"
nutrient protein

ingredient corn {
    cost: 150
    protein: 8.5
}

ingredient soybean_meal {
    cost: 450
    protein: 48
}

template formula base {
    nutrients {
        protein min 20
        protein max 22
    }
    ingredients {
        corn
        soybean_meal
    }
}

formula starter {
    batch_size: 1000
    nutrients {
        base.nutrients
        protein min 25
    }
    ingredients {
        base.ingredients
    }
}
"#;

#[test]
fn later_override_of_a_composed_bound_wins_end_to_end() {
    let report = solve(OVERRIDE_SOURCE, "starter").expect("starter should solve");
    assert_eq!(report.status, SolveStatus::Optimal);
    // `protein min 25` replaced the pulled-in `min 20`/`max 22` pair as a
    // whole, so the realized value tracks the new floor, not the old cap.
    let protein = report.nutrients.iter().find(|n| n.name.ends_with("protein")).unwrap();
    assert!(protein.value >= 25.0 - 1e-3);
}

#[test]
fn solve_rejects_a_template_formula() {
    let err = solve(OVERRIDE_SOURCE, "base").unwrap_err();
    assert!(matches!(err, SolveError::TemplateFormula(_)));
}

#[test]
fn solve_rejects_an_unknown_formula_name() {
    let err = solve(MINIMAL, "nope").unwrap_err();
    assert!(matches!(err, SolveError::UnknownFormula(_)));
}

const INFEASIBLE: &str = r#"
nutrient protein

ingredient soybean_meal {
    cost: 450
    protein: 48
}

formula starter {
    batch_size: 1000
    nutrients {
        protein min 60
    }
    ingredients {
        soybean_meal
    }
}
"#;

#[test]
fn infeasible_formula_reports_a_best_effort_result_end_to_end() {
    let report = solve(INFEASIBLE, "starter").expect("infeasible still returns a report");
    assert_eq!(report.status, SolveStatus::Infeasible);
    assert!(!report.violations.is_empty());
}

#[test]
fn solve_surfaces_hard_errors_before_attempting_to_build_a_model() {
    let source = r#"
ingredient corn { }

formula starter {
    batch_size: 1000
    ingredients {
        corn
    }
}
"#;
    let err = solve(source, "starter").unwrap_err();
    assert!(matches!(err, SolveError::HasErrors(_)));
}
