//! Resolved semantic model: the output of linking + resolution, consumed by
//! the composition engine and LP builder.
//!
//! Unlike the CST/AST (a view over source bytes), these types own their
//! data — names are interned `Symbol`s, values are `f64`, and every node
//! still carries its originating `Span` for diagnostics.

use formulang_base::{Span, Symbol};
use indexmap::IndexMap;

/// Which of the two block kinds an expression or reference lives in.
/// Threaded through resolution so the same syntax means "nutrient content
/// sum" in one context and "ingredient amount sum" in the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Nutrients,
    Ingredients,
}

#[derive(Debug, Clone, Default)]
pub struct NutrientDef {
    pub name: Symbol,
    pub code: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct IngredientDef {
    pub name: Symbol,
    pub cost: Option<f64>,
    pub description: Option<String>,
    /// Declared nutrient content, in percent-of-ingredient. Absent nutrients
    /// are treated as zero.
    pub nutrient_values: IndexMap<Symbol, f64>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct GroupDef {
    pub name: Symbol,
    pub members: Vec<Symbol>,
    pub span: Span,
}

/// A resolved arithmetic expression. References have already been bound to
/// a symbol and tagged with what kind of thing they name, so the
/// composition engine and LP builder never need to re-resolve names.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedExpr {
    Num(f64),
    /// A literal written with a trailing `%`; the raw numeric value before
    /// any batch-size scaling (e.g. `50%` carries `50.0`).
    Percent(f64),
    Nutrient(Symbol),
    Ingredient(Symbol),
    Group(Symbol),
    Binary(BinOp, Box<ResolvedExpr>, Box<ResolvedExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone)]
pub struct Bounds {
    pub min: Option<ResolvedExpr>,
    pub max: Option<ResolvedExpr>,
}

/// A single resolved constraint: `lhs (min V)? (max V)?`.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub lhs: ResolvedExpr,
    pub bounds: Bounds,
    pub span: Span,
}

/// The canonical form of a constraint's left-hand side, used as the
/// override key in the composition engine. Structural, not textual: two
/// ASTs with the same operators and operand symbols in the same order
/// produce equal keys regardless of surface whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalLhs {
    Nutrient(Symbol),
    Ingredient(Symbol),
    Group(Symbol),
    Binary(BinOp, Box<CanonicalLhs>, Box<CanonicalLhs>),
    /// A constant or otherwise non-reference LHS; each occurrence is its
    /// own key since there is nothing meaningful to override by identity.
    Opaque(u64),
}

/// A raw (pre-expansion) item in a `nutrients`/`ingredients` block: either
/// a plain constraint, or a reference that pulls constraints in from
/// elsewhere in the composition graph.
#[derive(Debug, Clone)]
pub enum RawBlockItem {
    Constraint(Constraint),
    Composition(CompositionRef),
}

/// See the `CompositionRef` variants in the language design; `path` is the
/// resolved formula (for the nutrient/ingredient forms) or group symbol.
#[derive(Debug, Clone)]
pub enum CompositionRef {
    AllOf {
        formula: Symbol,
        block: BlockKind,
        span: Span,
    },
    Subset {
        formula: Symbol,
        block: BlockKind,
        names: Vec<Symbol>,
        span: Span,
    },
    SingleBound {
        formula: Symbol,
        block: BlockKind,
        name: Symbol,
        is_max: bool,
        span: Span,
    },
    GroupSelect {
        group: Symbol,
        members: Vec<Symbol>,
        span: Span,
    },
}

#[derive(Debug, Clone, Default)]
pub struct FormulaDef {
    pub name: Symbol,
    pub is_template: bool,
    /// The `name` property: a display label distinct from the declaration
    /// identifier, e.g. `name "Starter Ration"` on a formula called `f1`.
    pub display_name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub batch_size: Option<f64>,
    pub nutrient_items: Vec<RawBlockItem>,
    pub ingredient_items: Vec<RawBlockItem>,
    pub span: Span,
}

/// A formula's fully-composed, override-resolved constraint lists — the
/// direct input to the LP builder.
#[derive(Debug, Clone, Default)]
pub struct ComposedFormula {
    pub nutrients: IndexMap<CanonicalLhs, Constraint>,
    pub ingredients: IndexMap<CanonicalLhs, Constraint>,
    /// Ingredients in first-seen order after expansion; drives deterministic
    /// variable emission in the LP builder.
    pub ingredient_order: Vec<Symbol>,
}

/// The fully linked and resolved program: every module merged into one
/// flat set of declarations, ready for composition and LP building.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub nutrients: IndexMap<Symbol, NutrientDef>,
    pub ingredients: IndexMap<Symbol, IngredientDef>,
    pub groups: IndexMap<Symbol, GroupDef>,
    pub formulas: IndexMap<Symbol, FormulaDef>,
}
