use super::*;
use rowan::TextRange;

fn range(start: u32, end: u32) -> TextRange {
    TextRange::new(start.into(), end.into())
}

#[test]
fn emit_records_the_message() {
    let mut diags = Diagnostics::new();
    diags
        .error(DiagnosticCode::NameUnknownIdentifier, "unknown name 'x'", range(0, 1))
        .emit();

    assert_eq!(diags.len(), 1);
    assert!(diags.has_errors());
}

#[test]
fn builder_does_nothing_until_emit() {
    let mut diags = Diagnostics::new();
    let _builder = diags.warning(DiagnosticCode::CompositionMissingBound, "no lower bound", range(0, 1));
    assert!(diags.is_empty());
}

#[test]
fn related_and_fix_are_attached() {
    let mut diags = Diagnostics::new();
    diags
        .error(DiagnosticCode::NameRedeclaration, "duplicate name", range(10, 14))
        .related_to("first declared here", range(0, 4))
        .fix("rename the second declaration", "protein2")
        .emit();

    let d = diags.iter().next().unwrap();
    assert_eq!(d.related.len(), 1);
    assert!(d.fix.is_some());
}

#[test]
fn printer_render_includes_code_and_message() {
    let mut diags = Diagnostics::new();
    diags
        .error(DiagnosticCode::TypeWrongKindReference, "expected a nutrient", range(4, 8))
        .emit();

    let rendered = diags.printer("prot min 1").render();
    assert!(rendered.contains("E-TYPE-001"));
    assert!(rendered.contains("expected a nutrient"));
}

#[test]
fn error_count_ignores_warnings() {
    let mut diags = Diagnostics::new();
    diags
        .warning(DiagnosticCode::CompositionMissingBound, "warn", range(0, 1))
        .emit();
    diags
        .error(DiagnosticCode::ImportCycle, "cycle", range(0, 1))
        .emit();

    assert_eq!(diags.error_count(), 1);
    assert_eq!(diags.len(), 2);
}
