use super::*;
use crate::parser::cst::SyntaxKind::*;

fn kinds(src: &str) -> Vec<SyntaxKind> {
    lex(src).into_iter().map(|t| t.kind).collect()
}

#[test]
fn lexes_keywords_and_identifiers() {
    assert_eq!(
        kinds("nutrient protein"),
        vec![KwNutrient, Whitespace, Id]
    );
}

#[test]
fn lexes_numbers_and_percent() {
    assert_eq!(kinds("20"), vec![Number]);
    assert_eq!(kinds("-1.5"), vec![Number]);
    assert_eq!(kinds("50%"), vec![PercentNumber]);
}

#[test]
fn span_roundtrip() {
    let src = "formula f { batch 1000 }";
    for tok in lex(src) {
        let text = token_text(src, &tok);
        assert_eq!(&src[Range::<usize>::from(tok.span)], text);
    }
}

#[test]
fn splits_string_literal() {
    let src = r#""hello""#;
    let toks = lex(src);
    assert_eq!(
        toks.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![DoubleQuote, StrVal, DoubleQuote]
    );
    assert_eq!(token_text(src, &toks[1]), "hello");
}

#[test]
fn empty_string_literal_has_no_strval() {
    let src = r#""""#;
    let toks = lex(src);
    assert_eq!(
        toks.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![DoubleQuote, DoubleQuote]
    );
}

#[test]
fn string_literal_keeps_escapes_raw() {
    // The lexer only splits quotes from content; it never decodes escapes,
    // so a backslash-quote pair stays inside the StrVal span rather than
    // closing the literal early.
    let src = r#""a\"b\nc""#;
    let toks = lex(src);
    assert_eq!(
        toks.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![DoubleQuote, StrVal, DoubleQuote]
    );
    assert_eq!(token_text(src, &toks[1]), r#"a\"b\nc"#);
}

#[test]
fn coalesces_garbage_runs() {
    let toks = lex("@@@");
    assert_eq!(toks.len(), 1);
    assert_eq!(toks[0].kind, Garbage);
}

#[test]
fn comments_are_tokenized_not_dropped() {
    assert_eq!(kinds("// hi\n"), vec![LineComment, Newline]);
    assert_eq!(kinds("/* hi */"), vec![BlockComment]);
}

#[test]
fn dot_path_tokenizes_as_id_dot_id() {
    assert_eq!(kinds("base.nutrients"), vec![Id, Dot, Id]);
}
