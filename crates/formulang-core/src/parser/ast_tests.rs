use super::unescape_string;

#[test]
fn passes_through_plain_text() {
    assert_eq!(unescape_string("corn meal"), "corn meal");
}

#[test]
fn decodes_quote_and_backslash() {
    assert_eq!(unescape_string(r#"say \"hi\""#), r#"say "hi""#);
    assert_eq!(unescape_string(r"a\\b"), r"a\b");
}

#[test]
fn decodes_whitespace_escapes() {
    assert_eq!(unescape_string(r"line1\nline2"), "line1\nline2");
    assert_eq!(unescape_string(r"a\tb"), "a\tb");
    assert_eq!(unescape_string(r"a\rb"), "a\rb");
}

#[test]
fn decodes_hex_byte_escape() {
    assert_eq!(unescape_string(r"\x41BC"), "ABC");
}

#[test]
fn decodes_unicode_escape() {
    let raw = "deg\\u00b0F";
    assert_eq!(unescape_string(raw), "deg\u{00b0}F");
}

#[test]
fn leaves_unknown_escape_untouched() {
    assert_eq!(unescape_string(r"\q"), r"\q");
}

#[test]
fn trailing_backslash_is_preserved() {
    assert_eq!(unescape_string(r"abc\"), r"abc\");
}

#[test]
fn malformed_hex_escape_passes_through() {
    assert_eq!(unescape_string(r"\xZZ"), r"\xZZ");
}
