//! Syntax kinds for the Formulang surface grammar.
//!
//! `SyntaxKind` serves dual roles: token kinds (from the lexer) and node kinds
//! (from the parser). Logos derives token recognition; node kinds lack
//! token/regex attributes. `FmLang` implements Rowan's `Language` trait for
//! tree construction.

#![allow(dead_code)]

use logos::Logos;
use rowan::Language;

/// All token and node kinds. Tokens first, then nodes, then `__LAST` sentinel.
/// `#[repr(u16)]` enables safe transmute in `kind_from_raw`.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum SyntaxKind {
    #[token("(")]
    ParenOpen = 0,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,

    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[token("nutrient")]
    KwNutrient,
    #[token("ingredient")]
    KwIngredient,
    #[token("formula")]
    KwFormula,
    #[token("template")]
    KwTemplate,
    #[token("import")]
    KwImport,
    #[token("as")]
    KwAs,
    #[token("min")]
    KwMin,
    #[token("max")]
    KwMax,
    #[token("group")]
    KwGroup,

    /// Percent-suffixed number, e.g. `50%`. Matched before plain `Number` so
    /// the longer match wins.
    #[regex(r"-?[0-9]+(\.[0-9]+)?%")]
    PercentNumber,

    #[regex(r"-?[0-9]+(\.[0-9]+)?")]
    Number,

    #[regex(r#""(?:[^"\\]|\\.)*""#)]
    #[doc(hidden)]
    StringLiteral, // lexer-internal only, split into quote/content/quote

    DoubleQuote,
    /// String content between quotes (escape processing happens at the
    /// point of use, not in the lexer).
    StrVal,

    /// Identifier. Defined after keywords so they take precedence.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Id,

    #[regex(r"[ \t]+")]
    Whitespace,

    #[token("\n")]
    #[token("\r\n")]
    Newline,

    #[regex(r"//[^\n]*", allow_greedy = true)]
    LineComment,

    #[regex(r"/\*(?:[^*]|\*[^/])*\*/")]
    BlockComment,

    /// Coalesced unrecognized characters.
    Garbage,
    Error,

    // --- Node kinds (non-terminals) ---
    Root,
    Module,
    ImportDecl,
    ImportBindingNamespace,
    ImportBindingAlias,
    ImportBindingList,
    ImportBindingWildcard,
    NutrientDecl,
    IngredientDecl,
    GroupDecl,
    FormulaDecl,
    PropAssign,
    NutrientValue,
    NutrientsBlock,
    IngredientsBlock,
    ConstraintItem,
    Bounds,
    CompositionRef,
    PathExpr,
    NameList,
    ExprBinary,
    ExprParen,
    ExprNum,
    ExprPercent,
    ExprRef,

    // Must be last — used for bounds checking in `kind_from_raw`.
    #[doc(hidden)]
    __LAST,
}

use SyntaxKind::*;

impl SyntaxKind {
    #[inline]
    pub fn is_trivia(self) -> bool {
        matches!(self, Whitespace | Newline | LineComment | BlockComment)
    }

    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, Error | Garbage)
    }

    #[inline]
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            KwNutrient
                | KwIngredient
                | KwFormula
                | KwTemplate
                | KwImport
                | KwAs
                | KwMin
                | KwMax
                | KwGroup
        )
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    #[inline]
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

/// Language tag for Rowan's tree types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FmLang {}

impl Language for FmLang {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        assert!(raw.0 < __LAST as u16);
        // SAFETY: bounds checked above, and SyntaxKind is repr(u16).
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

pub type SyntaxNode = rowan::SyntaxNode<FmLang>;
pub type SyntaxToken = rowan::SyntaxToken<FmLang>;
pub type SyntaxElement = rowan::NodeOrToken<SyntaxNode, SyntaxToken>;

/// 64-bit bitset of `SyntaxKind`s for O(1) membership testing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TokenSet(u64);

impl TokenSet {
    pub const EMPTY: TokenSet = TokenSet(0);

    #[inline]
    pub const fn new(kinds: &[SyntaxKind]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < kinds.len() {
            let kind = kinds[i] as u16;
            assert!(kind < 64, "SyntaxKind value exceeds TokenSet capacity");
            bits |= 1 << kind;
            i += 1;
        }
        TokenSet(bits)
    }

    #[inline]
    pub const fn single(kind: SyntaxKind) -> Self {
        let kind = kind as u16;
        assert!(kind < 64, "SyntaxKind value exceeds TokenSet capacity");
        TokenSet(1 << kind)
    }

    #[inline]
    pub const fn contains(&self, kind: SyntaxKind) -> bool {
        let kind = kind as u16;
        if kind >= 64 {
            return false;
        }
        self.0 & (1 << kind) != 0
    }

    #[inline]
    pub const fn union(self, other: TokenSet) -> TokenSet {
        TokenSet(self.0 | other.0)
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_set();
        for i in 0..64u16 {
            if self.0 & (1 << i) != 0 && i < __LAST as u16 {
                let kind: SyntaxKind = unsafe { std::mem::transmute(i) };
                list.entry(&kind);
            }
        }
        list.finish()
    }
}

/// Pre-defined token sets for the parser.
pub mod token_sets {
    use super::*;

    pub const TRIVIA: TokenSet = TokenSet::new(&[Whitespace, Newline, LineComment, BlockComment]);

    pub const ITEM_SEPARATORS: TokenSet = TokenSet::new(&[Comma, Newline]);

    /// FIRST set of a top-level declaration.
    pub const DECL_FIRST: TokenSet = TokenSet::new(&[
        KwNutrient,
        KwIngredient,
        KwFormula,
        KwTemplate,
        KwGroup,
        KwImport,
    ]);

    /// Recovery set for a malformed top-level item: resync at the next
    /// declaration keyword.
    pub const MODULE_RECOVERY: TokenSet = DECL_FIRST;

    /// FIRST set of an expression.
    pub const EXPR_FIRST: TokenSet = TokenSet::new(&[ParenOpen, Minus, Number, PercentNumber, Id]);

    /// Recovery set inside a `nutrients`/`ingredients` block: resync at the
    /// next brace boundary or item separator.
    pub const BLOCK_ITEM_RECOVERY: TokenSet =
        TokenSet::new(&[BraceClose, Comma, Newline, BracketOpen, Id]);
}
