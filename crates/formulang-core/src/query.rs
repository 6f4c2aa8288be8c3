//! Diagnostics/query service: best-effort analysis over a single
//! in-progress source, the shape an editor integration wants (validate as
//! you type, hover, completions, formula listing) rather than the batch
//! `solve` pipeline.
//!
//! Every entry point links and resolves the given source on its own,
//! against a one-module [`SourceMap`] built via [`SourceMap::root_only`].
//! Imports are parsed but never followed — there is no project to resolve
//! them against — so an `import` line never raises a missing-file
//! diagnostic here; [`validate`] strips that code rather than reporting it
//! as broken input. Everything else (lex/parse errors, unknown names,
//! missing properties) still surfaces normally, scoped to what the single
//! buffer itself declares.

use formulang_base::{Interner, SourceMap, Symbol};
use indexmap::IndexMap;
use rowan::TextSize;

use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::loader;
use crate::model::Program;
use crate::parser::{ParserConfig, SyntaxKind, SyntaxNode, SyntaxToken};
use crate::resolver;
use crate::symbols::DeclKind;

struct Compiled {
    interner: Interner,
    program: Program,
    root: Option<SyntaxNode>,
    names: IndexMap<String, (DeclKind, Symbol)>,
    diagnostics: Vec<Diagnostic>,
}

/// The bare, as-declared name for a qualified `stem.name` symbol. Query
/// mode always links a single module, so stripping up to the last `.`
/// recovers exactly what the user typed (identifiers never contain `.`).
fn short_name(interner: &Interner, sym: Symbol) -> Option<String> {
    interner
        .try_resolve(sym)
        .and_then(|full| full.rsplit_once('.').map(|(_, name)| name.to_string()))
}

fn index_names(interner: &Interner, program: &Program) -> IndexMap<String, (DeclKind, Symbol)> {
    let mut names = IndexMap::new();
    for &sym in program.nutrients.keys() {
        if let Some(name) = short_name(interner, sym) {
            names.insert(name, (DeclKind::Nutrient, sym));
        }
    }
    for &sym in program.ingredients.keys() {
        if let Some(name) = short_name(interner, sym) {
            names.insert(name, (DeclKind::Ingredient, sym));
        }
    }
    for &sym in program.groups.keys() {
        if let Some(name) = short_name(interner, sym) {
            names.insert(name, (DeclKind::Group, sym));
        }
    }
    for &sym in program.formulas.keys() {
        if let Some(name) = short_name(interner, sym) {
            names.insert(name, (DeclKind::Formula, sym));
        }
    }
    names
}

fn compile(source: &str) -> Compiled {
    let source_map = SourceMap::root_only(source);
    let mut interner = Interner::new();
    let mut diagnostics = Diagnostics::new();

    let bundle = match loader::link(&source_map, &mut interner, ParserConfig::default(), &mut diagnostics) {
        Ok(bundle) => bundle,
        Err(_) => {
            return Compiled {
                interner,
                program: Program::default(),
                root: None,
                names: IndexMap::new(),
                diagnostics: diagnostics.into_vec(),
            };
        }
    };

    let source_id = source_map.iter().next().map(|s| s.id);
    let root = source_id.and_then(|id| bundle.modules.get(&id)).map(|r| r.as_cst().clone());

    let program = resolver::resolve(&bundle, &mut interner, &mut diagnostics);
    let names = index_names(&interner, &program);
    let messages = diagnostics
        .into_vec()
        .into_iter()
        .filter(|d| d.code != DiagnosticCode::ImportFileNotFound)
        .collect();

    Compiled { interner, program, root, names, diagnostics: messages }
}

fn pick_token(root: &SyntaxNode, offset: TextSize) -> Option<SyntaxToken> {
    match root.token_at_offset(offset) {
        rowan::TokenAtOffset::None => None,
        rowan::TokenAtOffset::Single(t) => Some(t),
        rowan::TokenAtOffset::Between(l, r) => Some(if l.kind() == SyntaxKind::Id { l } else { r }),
    }
}

/// Syntax and semantic diagnostics for `source`, analyzed standalone.
pub fn validate(source: &str) -> Vec<Diagnostic> {
    compile(source).diagnostics
}

#[derive(Debug, Clone)]
pub struct HoverInfo {
    pub contents: String,
    pub range: rowan::TextRange,
}

/// Hover text for whatever declaration the identifier at `offset` names,
/// or `None` if `offset` doesn't land on a known name.
pub fn get_hover(source: &str, offset: u32) -> Option<HoverInfo> {
    let compiled = compile(source);
    let root = compiled.root.as_ref()?;
    let token = pick_token(root, TextSize::from(offset))?;
    if token.kind() != SyntaxKind::Id {
        return None;
    }
    let &(kind, sym) = compiled.names.get(token.text())?;
    let contents = describe(&compiled.program, kind, sym, token.text())?;
    Some(HoverInfo { contents, range: token.text_range() })
}

fn describe(program: &Program, kind: DeclKind, sym: Symbol, name: &str) -> Option<String> {
    Some(match kind {
        DeclKind::Nutrient => {
            let def = program.nutrients.get(&sym)?;
            let mut s = format!("nutrient {name}");
            if let Some(unit) = &def.unit {
                s.push_str(&format!(" ({unit})"));
            }
            if let Some(desc) = &def.description {
                s.push('\n');
                s.push_str(desc);
            }
            s
        }
        DeclKind::Ingredient => {
            let def = program.ingredients.get(&sym)?;
            let mut s = format!("ingredient {name}");
            if let Some(cost) = def.cost {
                s.push_str(&format!("\ncost: {cost}"));
            }
            if let Some(desc) = &def.description {
                s.push('\n');
                s.push_str(desc);
            }
            s
        }
        DeclKind::Group => {
            let def = program.groups.get(&sym)?;
            let suffix = if def.members.len() == 1 { "" } else { "s" };
            format!("group {name} ({} member{suffix})", def.members.len())
        }
        DeclKind::Formula => {
            let def = program.formulas.get(&sym)?;
            let mut s = if def.is_template {
                format!("template formula {name}")
            } else {
                format!("formula {name}")
            };
            if let Some(batch) = def.batch_size {
                s.push_str(&format!("\nbatch_size: {batch}"));
            }
            if let Some(desc) = &def.description {
                s.push('\n');
                s.push_str(desc);
            }
            s
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Nutrient,
    Ingredient,
    Group,
    Formula,
    Keyword,
}

#[derive(Debug, Clone)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: Option<String>,
    /// Editor-ready insert text; differs from `label` for snippets like
    /// `min ` that want a trailing placeholder position.
    pub insert_text: String,
}

impl CompletionItem {
    fn plain(label: &str, kind: CompletionKind) -> Self {
        Self { label: label.to_string(), kind, detail: None, insert_text: label.to_string() }
    }
}

const BLOCK_KEYWORDS: [&str; 2] = ["min", "max"];
const TOP_LEVEL_KEYWORDS: [&str; 6] = ["nutrient", "ingredient", "group", "formula", "template", "import"];
const COMPOSITION_BLOCK_WORDS: [&str; 2] = ["nutrients", "ingredients"];
const SINGLE_BOUND_WORDS: [&str; 2] = ["min", "max"];

/// Where in the grammar `offset` falls, coarse enough to pick a keyword set
/// without a full parse: whether it sits right after a `.`, inside a
/// `nutrients`/`ingredients` block body, right after `import`, or plain
/// top-level.
enum Context {
    AfterDot { head: Option<(DeclKind, Symbol)> },
    AfterImport,
    InBlock,
    TopLevel,
}

fn token_before(root: &SyntaxNode, offset: TextSize) -> Option<SyntaxToken> {
    let mut t = pick_token(root, offset)?;
    // `pick_token` favors the token starting at `offset`; walk back to the
    // previous non-trivia token when that's what immediately precedes the
    // cursor instead of containing it.
    if t.text_range().start() >= offset {
        t = t.prev_token()?;
    }
    Some(t)
}

fn classify_context(compiled: &Compiled, offset: TextSize) -> Context {
    let Some(root) = compiled.root.as_ref() else { return Context::TopLevel };

    if let Some(before) = token_before(root, offset) {
        if before.kind() == SyntaxKind::Dot {
            let head = before
                .prev_token()
                .filter(|t| t.kind() == SyntaxKind::Id)
                .and_then(|t| compiled.names.get(t.text()).copied());
            return Context::AfterDot { head };
        }
        if before.kind() == SyntaxKind::KwImport {
            return Context::AfterImport;
        }
    }

    let in_block = pick_token(root, offset)
        .and_then(|token| token.parent())
        .is_some_and(|node| {
            node.ancestors()
                .any(|n| matches!(n.kind(), SyntaxKind::NutrientsBlock | SyntaxKind::IngredientsBlock))
        });
    if in_block { Context::InBlock } else { Context::TopLevel }
}

/// Completion candidates at `offset`: declared names plus the keyword set
/// appropriate to the grammatical context — `nutrients`/`ingredients` or
/// `min`/`max` right after a `base.` dot, nothing but free text after
/// `import`, `min`/`max` inside a block body, and the declaration keywords
/// everywhere else.
pub fn get_completions(source: &str, offset: u32) -> Vec<CompletionItem> {
    let compiled = compile(source);
    let offset = TextSize::from(offset);

    match classify_context(&compiled, offset) {
        Context::AfterImport => Vec::new(),
        Context::AfterDot { head } => match head {
            Some((DeclKind::Formula, _)) => COMPOSITION_BLOCK_WORDS
                .iter()
                .map(|w| CompletionItem::plain(w, CompletionKind::Keyword))
                .collect(),
            Some((DeclKind::Nutrient, _)) => SINGLE_BOUND_WORDS
                .iter()
                .map(|w| CompletionItem::plain(w, CompletionKind::Keyword))
                .collect(),
            _ => names_as_completions(&compiled),
        },
        Context::InBlock => {
            let mut items = names_as_completions(&compiled);
            items.extend(BLOCK_KEYWORDS.iter().map(|kw| CompletionItem {
                label: kw.to_string(),
                kind: CompletionKind::Keyword,
                detail: None,
                insert_text: format!("{kw} "),
            }));
            items
        }
        Context::TopLevel => {
            let mut items = names_as_completions(&compiled);
            items.extend(
                TOP_LEVEL_KEYWORDS.iter().map(|kw| CompletionItem::plain(kw, CompletionKind::Keyword)),
            );
            items
        }
    }
}

fn names_as_completions(compiled: &Compiled) -> Vec<CompletionItem> {
    compiled
        .names
        .iter()
        .map(|(label, &(kind, _))| {
            CompletionItem::plain(
                label,
                match kind {
                    DeclKind::Nutrient => CompletionKind::Nutrient,
                    DeclKind::Ingredient => CompletionKind::Ingredient,
                    DeclKind::Group => CompletionKind::Group,
                    DeclKind::Formula => CompletionKind::Formula,
                },
            )
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct FormulaSummary {
    pub name: String,
    pub is_template: bool,
    pub description: Option<String>,
}

/// Every formula declared in `source`, in declaration order.
pub fn get_formulas(source: &str) -> Vec<FormulaSummary> {
    let compiled = compile(source);
    compiled
        .program
        .formulas
        .values()
        .map(|def| FormulaSummary {
            name: short_name(&compiled.interner, def.name).unwrap_or_default(),
            is_template: def.is_template,
            description: def.description.clone(),
        })
        .collect()
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod query_tests;
