//! Typed AST wrappers over CST nodes.
//!
//! Each struct wraps a `SyntaxNode` and provides typed accessors. Cast is
//! infallible for a matching `SyntaxKind`; malformed trees (missing
//! children) surface as `None` from the individual accessors rather than
//! failing the cast, since the parser always produces a tree even for
//! invalid input.

use super::cst::{SyntaxKind, SyntaxNode, SyntaxToken};

macro_rules! ast_node {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(SyntaxNode);

        impl $name {
            pub fn cast(node: SyntaxNode) -> Option<Self> {
                (node.kind() == SyntaxKind::$kind).then(|| Self(node))
            }

            pub fn as_cst(&self) -> &SyntaxNode {
                &self.0
            }
        }
    };
}

ast_node!(Root, Root);
ast_node!(Module, Module);
ast_node!(ImportDecl, ImportDecl);
ast_node!(ImportBindingNamespace, ImportBindingNamespace);
ast_node!(ImportBindingAlias, ImportBindingAlias);
ast_node!(ImportBindingList, ImportBindingList);
ast_node!(ImportBindingWildcard, ImportBindingWildcard);
ast_node!(NutrientDecl, NutrientDecl);
ast_node!(IngredientDecl, IngredientDecl);
ast_node!(GroupDecl, GroupDecl);
ast_node!(FormulaDecl, FormulaDecl);
ast_node!(PropAssign, PropAssign);
ast_node!(NutrientsBlock, NutrientsBlock);
ast_node!(IngredientsBlock, IngredientsBlock);
ast_node!(ConstraintItem, ConstraintItem);
ast_node!(Bounds, Bounds);
ast_node!(CompositionRef, CompositionRef);
ast_node!(NameList, NameList);
ast_node!(ExprBinary, ExprBinary);
ast_node!(ExprParen, ExprParen);
ast_node!(ExprNum, ExprNum);
ast_node!(ExprPercent, ExprPercent);
ast_node!(ExprRef, ExprRef);

/// Any arithmetic expression: a number/percent literal, a dotted
/// reference, a parenthesized sub-expression, or a binary operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Num(ExprNum),
    Percent(ExprPercent),
    Ref(ExprRef),
    Paren(ExprParen),
    Binary(ExprBinary),
}

impl Expr {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            SyntaxKind::ExprNum => ExprNum::cast(node).map(Expr::Num),
            SyntaxKind::ExprPercent => ExprPercent::cast(node).map(Expr::Percent),
            SyntaxKind::ExprRef => ExprRef::cast(node).map(Expr::Ref),
            SyntaxKind::ExprParen => ExprParen::cast(node).map(Expr::Paren),
            SyntaxKind::ExprBinary => ExprBinary::cast(node).map(Expr::Binary),
            _ => None,
        }
    }

    pub fn as_cst(&self) -> &SyntaxNode {
        match self {
            Expr::Num(n) => n.as_cst(),
            Expr::Percent(n) => n.as_cst(),
            Expr::Ref(n) => n.as_cst(),
            Expr::Paren(n) => n.as_cst(),
            Expr::Binary(n) => n.as_cst(),
        }
    }
}

/// A top-level declaration: an import or one of the four named kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Decl {
    Import(ImportDecl),
    Nutrient(NutrientDecl),
    Ingredient(IngredientDecl),
    Group(GroupDecl),
    Formula(FormulaDecl),
}

impl Decl {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            SyntaxKind::ImportDecl => ImportDecl::cast(node).map(Decl::Import),
            SyntaxKind::NutrientDecl => NutrientDecl::cast(node).map(Decl::Nutrient),
            SyntaxKind::IngredientDecl => IngredientDecl::cast(node).map(Decl::Ingredient),
            SyntaxKind::GroupDecl => GroupDecl::cast(node).map(Decl::Group),
            SyntaxKind::FormulaDecl => FormulaDecl::cast(node).map(Decl::Formula),
            _ => None,
        }
    }

    pub fn as_cst(&self) -> &SyntaxNode {
        match self {
            Decl::Import(n) => n.as_cst(),
            Decl::Nutrient(n) => n.as_cst(),
            Decl::Ingredient(n) => n.as_cst(),
            Decl::Group(n) => n.as_cst(),
            Decl::Formula(n) => n.as_cst(),
        }
    }
}

/// How an import binds the imported module's names into scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportBinding {
    /// `import "base.fm"` — bound under the file-stem namespace.
    Namespace(ImportBindingNamespace),
    /// `import "base.fm" as b` — bound under an explicit namespace.
    Alias(ImportBindingAlias),
    /// `import "base.fm" { protein, fat }` — bound directly, unqualified.
    List(ImportBindingList),
    /// `import "base.fm" { * }` — every exported name bound unqualified.
    Wildcard(ImportBindingWildcard),
}

impl ImportBinding {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            SyntaxKind::ImportBindingNamespace => {
                ImportBindingNamespace::cast(node).map(ImportBinding::Namespace)
            }
            SyntaxKind::ImportBindingAlias => {
                ImportBindingAlias::cast(node).map(ImportBinding::Alias)
            }
            SyntaxKind::ImportBindingList => ImportBindingList::cast(node).map(ImportBinding::List),
            SyntaxKind::ImportBindingWildcard => {
                ImportBindingWildcard::cast(node).map(ImportBinding::Wildcard)
            }
            _ => None,
        }
    }
}

impl Root {
    pub fn module(&self) -> Option<Module> {
        self.0.children().find_map(Module::cast)
    }
}

impl Module {
    pub fn decls(&self) -> impl Iterator<Item = Decl> + '_ {
        self.0.children().filter_map(Decl::cast)
    }

    pub fn imports(&self) -> impl Iterator<Item = ImportDecl> + '_ {
        self.0.children().filter_map(ImportDecl::cast)
    }
}

impl ImportDecl {
    /// The quoted module path token. Its text is the raw source between the
    /// quotes; run it through [`unescape_string`] before using it as a path.
    pub fn path_text(&self) -> Option<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .find(|t| t.kind() == SyntaxKind::StrVal)
    }

    pub fn binding(&self) -> Option<ImportBinding> {
        self.0.children().find_map(ImportBinding::cast)
    }
}

impl ImportBindingAlias {
    pub fn alias(&self) -> Option<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .filter(|t| t.kind() == SyntaxKind::Id)
            .last()
    }
}

impl ImportBindingList {
    pub fn names(&self) -> Option<NameList> {
        self.0.children().find_map(NameList::cast)
    }
}

impl NutrientDecl {
    pub fn name(&self) -> Option<SyntaxToken> {
        first_id_token(&self.0)
    }

    pub fn props(&self) -> impl Iterator<Item = PropAssign> + '_ {
        self.0.children().filter_map(PropAssign::cast)
    }
}

impl IngredientDecl {
    pub fn name(&self) -> Option<SyntaxToken> {
        first_id_token(&self.0)
    }

    pub fn props(&self) -> impl Iterator<Item = PropAssign> + '_ {
        self.0.children().filter_map(PropAssign::cast)
    }
}

impl GroupDecl {
    pub fn name(&self) -> Option<SyntaxToken> {
        first_id_token(&self.0)
    }

    pub fn members(&self) -> Option<NameList> {
        self.0.children().find_map(NameList::cast)
    }
}

impl FormulaDecl {
    /// Whether this declaration started with the `template` keyword.
    /// Template formulas are parsed and checked but never solved.
    pub fn is_template(&self) -> bool {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .any(|t| t.kind() == SyntaxKind::KwTemplate)
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        first_id_token(&self.0)
    }

    pub fn props(&self) -> impl Iterator<Item = PropAssign> + '_ {
        self.0.children().filter_map(PropAssign::cast)
    }

    pub fn nutrients_block(&self) -> Option<NutrientsBlock> {
        self.0.children().find_map(NutrientsBlock::cast)
    }

    pub fn ingredients_block(&self) -> Option<IngredientsBlock> {
        self.0.children().find_map(IngredientsBlock::cast)
    }
}

/// An item in a `nutrients`/`ingredients` block body: either a constraint
/// on an expression, or a reference that composes bounds in from elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockItem {
    Constraint(ConstraintItem),
    Composition(CompositionRef),
}

impl BlockItem {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            SyntaxKind::ConstraintItem => ConstraintItem::cast(node).map(BlockItem::Constraint),
            SyntaxKind::CompositionRef => CompositionRef::cast(node).map(BlockItem::Composition),
            _ => None,
        }
    }
}

impl NutrientsBlock {
    pub fn items(&self) -> impl Iterator<Item = BlockItem> + '_ {
        self.0.children().filter_map(BlockItem::cast)
    }
}

impl IngredientsBlock {
    pub fn items(&self) -> impl Iterator<Item = BlockItem> + '_ {
        self.0.children().filter_map(BlockItem::cast)
    }
}

impl ConstraintItem {
    pub fn lhs(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.0.children().find_map(Bounds::cast)
    }
}

impl Bounds {
    /// `(min, max)`, each `None` if that bound wasn't given.
    pub fn min(&self) -> Option<Expr> {
        self.bound_after(SyntaxKind::KwMin)
    }

    pub fn max(&self) -> Option<Expr> {
        self.bound_after(SyntaxKind::KwMax)
    }

    fn bound_after(&self, keyword: SyntaxKind) -> Option<Expr> {
        let mut seen_keyword = false;
        for el in self.0.children_with_tokens() {
            match el {
                rowan::NodeOrToken::Token(t) if t.kind() == keyword => seen_keyword = true,
                rowan::NodeOrToken::Token(t) if t.kind().is_trivia() => {}
                rowan::NodeOrToken::Token(_) => seen_keyword = false,
                rowan::NodeOrToken::Node(n) => {
                    if seen_keyword {
                        if let Some(expr) = Expr::cast(n) {
                            return Some(expr);
                        }
                    }
                    seen_keyword = false;
                }
            }
        }
        None
    }
}

/// The resolved shape of a composition reference; see the path-dispatch
/// logic in `grammar::blocks` for the token patterns each corresponds to.
/// Determining which variant a given `CompositionRef` is requires walking
/// its tokens, since the grammar builds a single node shape for all of
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompositionRefKind {
    /// `base.nutrients` / `base.ingredients` — pulls the whole block.
    AllOf,
    /// `base.nutrients.[protein, fat]` — pulls a named subset.
    Subset,
    /// `base.nutrients.protein.min` / `...max` — pulls a single bound.
    SingleBound { is_max: bool },
    /// `mygroup.[corn, soy]` — pulls a subset of a group's members.
    GroupSelect,
}

impl CompositionRef {
    /// The leading dotted identifier segments (everything before a
    /// trailing `.min`/`.max`/`.[...]`, or the whole path for `AllOf`).
    pub fn path_segments(&self) -> Vec<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .filter(|t| t.kind() == SyntaxKind::Id)
            .collect()
    }

    pub fn name_list(&self) -> Option<NameList> {
        self.0.children().find_map(NameList::cast)
    }

    pub fn kind(&self) -> CompositionRefKind {
        let tokens: Vec<_> = self
            .0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .filter(|t| !t.kind().is_trivia())
            .collect();

        if let Some(last) = tokens.last() {
            match last.kind() {
                SyntaxKind::KwMin => return CompositionRefKind::SingleBound { is_max: false },
                SyntaxKind::KwMax => return CompositionRefKind::SingleBound { is_max: true },
                _ => {}
            }
        }

        if self.0.children().any(|n| n.kind() == SyntaxKind::NameList) {
            let segments = self.path_segments();
            if segments.len() <= 1 {
                CompositionRefKind::GroupSelect
            } else {
                CompositionRefKind::Subset
            }
        } else {
            CompositionRefKind::AllOf
        }
    }
}

impl NameList {
    pub fn names(&self) -> impl Iterator<Item = SyntaxToken> + '_ {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .filter(|t| t.kind() == SyntaxKind::Id)
    }
}

impl PropAssign {
    pub fn key(&self) -> Option<SyntaxToken> {
        first_id_token(&self.0)
    }

    pub fn value_expr(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }

    /// The raw string content, for properties whose value is a string
    /// (`desc`, `unit`, ...) rather than a number. Run through
    /// [`unescape_string`] before use; escapes are not decoded here.
    pub fn value_str(&self) -> Option<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .find(|t| t.kind() == SyntaxKind::StrVal)
    }
}

impl ExprRef {
    pub fn segments(&self) -> impl Iterator<Item = SyntaxToken> + '_ {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .filter(|t| t.kind() == SyntaxKind::Id)
    }
}

impl ExprNum {
    pub fn token(&self) -> Option<SyntaxToken> {
        self.0.first_token()
    }
}

impl ExprPercent {
    pub fn token(&self) -> Option<SyntaxToken> {
        self.0.first_token()
    }
}

impl ExprParen {
    pub fn inner(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }
}

impl ExprBinary {
    pub fn lhs(&self) -> Option<Expr> {
        self.0.children().filter_map(Expr::cast).next()
    }

    pub fn rhs(&self) -> Option<Expr> {
        self.0.children().filter_map(Expr::cast).nth(1)
    }

    pub fn operator(&self) -> Option<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .find(|t| {
                matches!(
                    t.kind(),
                    SyntaxKind::Plus | SyntaxKind::Minus | SyntaxKind::Star | SyntaxKind::Slash
                )
            })
    }
}

fn first_id_token(node: &SyntaxNode) -> Option<SyntaxToken> {
    node.children_with_tokens()
        .filter_map(|it| it.into_token())
        .find(|t| t.kind() == SyntaxKind::Id)
}

/// Decodes `\" \\ \n \t \r \xHH \uHHHH` escapes in a string literal's raw
/// content (the text between the quotes, as returned by [`PropAssign::value_str`]
/// or [`ImportDecl::path_text`]). An unrecognized escape is passed through
/// unchanged, backslash included.
pub fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(byte) => out.push(byte as char),
                    Err(_) => {
                        out.push_str("\\x");
                        out.push_str(&hex);
                    }
                }
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
#[path = "ast_tests.rs"]
mod ast_tests;
