use super::*;
use crate::diagnostics::Diagnostics;
use crate::symbols::qualify;
use formulang_base::{Interner, SourceMap};

fn link_source(src: &str) -> (Program, Interner) {
    let source_map = SourceMap::root_only(src);
    let mut interner = Interner::new();
    let mut diagnostics = Diagnostics::new();
    let bundle = link(&source_map, &mut interner, ParserConfig::default(), &mut diagnostics)
        .expect("parse should succeed");
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
    (bundle.program, interner)
}

#[test]
fn ingredient_nutrient_value_key_matches_nutrient_declaration_symbol() {
    let (program, mut interner) = link_source(
        r#"
nutrient protein

ingredient corn {
    cost: 150
    protein: 8.5
}
"#,
    );
    let protein_name = interner.intern("protein");
    let nutrient_sym = *program.nutrients.keys().next().expect("one nutrient declared");
    assert_eq!(interner.try_resolve(nutrient_sym), Some("<root>.protein".to_string()));

    let corn = program.ingredients.values().next().expect("one ingredient declared");
    let stem = interner.intern("<root>");
    let expected = qualify(&mut interner, stem, protein_name);
    assert_eq!(
        corn.nutrient_values.get(&expected).copied(),
        Some(8.5),
        "ingredient's nutrient-value key must equal the qualified symbol the resolver binds references to"
    );
}

#[test]
fn string_properties_decode_escapes() {
    let (program, _interner) = link_source(
        r#"
nutrient protein {
    desc: "Crude \"protein\"\ncontent"
}

ingredient corn {
    cost: 150
    desc: "tab\there"
}
"#,
    );
    let nutrient = program.nutrients.values().next().unwrap();
    assert_eq!(nutrient.description.as_deref(), Some("Crude \"protein\"\ncontent"));

    let ingredient = program.ingredients.values().next().unwrap();
    assert_eq!(ingredient.description.as_deref(), Some("tab\there"));
}

#[test]
fn formula_string_properties_decode_hex_and_unicode_escapes() {
    let (program, _interner) = link_source(
        r#"
formula starter {
    batch_size: 1000
    name: "batch\x41B"
    ingredients {
    }
}
"#,
    );
    let formula = program.formulas.values().next().unwrap();
    assert_eq!(formula.display_name.as_deref(), Some("batchAB"));
}
