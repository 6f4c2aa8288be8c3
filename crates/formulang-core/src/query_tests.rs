use super::*;

const SOURCE: &str = r#"
nutrient protein { unit: "%" }

ingredient corn {
    cost: 150
    protein: 8.5
}

formula starter {
    batch_size: 1000
    nutrients {
        protein min 20
    }
    ingredients {
        corn
    }
}
"#;

#[test]
fn validate_reports_no_diagnostics_for_well_formed_source() {
    let diagnostics = validate(SOURCE);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
}

#[test]
fn validate_reports_missing_cost_but_not_missing_imports() {
    let source = r#"
import "shared.fm"
ingredient soy { }
"#;
    let diagnostics = validate(source);
    assert!(diagnostics.iter().any(|d| d.code == DiagnosticCode::SemanticMissingCost));
    assert!(!diagnostics.iter().any(|d| d.code == DiagnosticCode::ImportFileNotFound));
}

#[test]
fn get_formulas_lists_declared_formulas_with_template_flag() {
    let source = r#"
formula base { template }
formula starter {
    batch_size: 500
}
"#;
    let formulas = get_formulas(source);
    assert_eq!(formulas.len(), 2);
    assert_eq!(formulas[0].name, "base");
    assert!(formulas[0].is_template);
    assert_eq!(formulas[1].name, "starter");
    assert!(!formulas[1].is_template);
}

#[test]
fn hover_on_ingredient_reference_reports_its_cost() {
    let offset = SOURCE.find("corn\n    }").unwrap() as u32;
    let hover = get_hover(SOURCE, offset).expect("hover over ingredient reference");
    assert!(hover.contents.contains("ingredient corn"));
    assert!(hover.contents.contains("cost: 150"));
}

#[test]
fn hover_outside_any_identifier_is_none() {
    let offset = SOURCE.find("batch_size").unwrap() as u32 - 1;
    assert!(get_hover(SOURCE, offset).is_none());
}

#[test]
fn completions_inside_a_block_include_bound_keywords_and_declared_names() {
    let offset = SOURCE.find("protein min 20").unwrap() as u32;
    let items = get_completions(SOURCE, offset);
    assert!(items.iter().any(|i| i.label == "min" && i.kind == CompletionKind::Keyword));
    assert!(items.iter().any(|i| i.label == "protein" && i.kind == CompletionKind::Nutrient));
    assert!(items.iter().any(|i| i.label == "corn" && i.kind == CompletionKind::Ingredient));
}

#[test]
fn completions_at_top_level_include_declaration_keywords() {
    let items = get_completions(SOURCE, 0);
    assert!(items.iter().any(|i| i.label == "formula" && i.kind == CompletionKind::Keyword));
}

#[test]
fn completions_after_a_formula_dot_offer_block_names() {
    let source = r#"
formula base { template nutrients { } }
formula child {
    batch_size: 1000
    nutrients {
        base.
    }
}
"#;
    let offset = source.find("base.").unwrap() as u32 + "base.".len() as u32;
    let items = get_completions(source, offset);
    assert!(items.iter().any(|i| i.label == "nutrients"));
    assert!(items.iter().any(|i| i.label == "ingredients"));
}
