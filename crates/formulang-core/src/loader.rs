//! Module linker: parses every source in a bundle, merges declarations into
//! one [`Program`], and builds the per-module [`ScopeTable`] that the
//! resolver uses to bind names.
//!
//! The deployed core never touches a filesystem (see the concurrency
//! design): the caller hands in a [`SourceMap`] already populated with the
//! root module plus every transitively imported module, keyed by the
//! canonical path each `import` statement's string should match against
//! (extension-implied: `"base"` and `"base.fm"` both match a module stored
//! under `"base.fm"`). This module's job is purely graph construction over
//! that pre-supplied set: cycle detection and namespace merging, not path
//! resolution against a real directory.

use std::collections::HashSet;

use formulang_base::{Interner, Span, SourceId, SourceMap};
use indexmap::IndexMap;
use rowan::TextRange;

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::model::{
    GroupDef, IngredientDef, NutrientDef, FormulaDef, Program,
};
use crate::parser::ast::{unescape_string, Decl, ImportBinding, Root};
use crate::parser::{self, ParserConfig};
use crate::symbols::{qualify, DeclKind, ModuleScope, ScopeTable};

pub(crate) fn span_of(range: TextRange) -> Span {
    Span::new(range.start().into(), range.end().into())
}

/// A parsed module: its CST root plus the typed `Module` view over it.
struct ParsedModule {
    source_id: SourceId,
    stem: formulang_base::Symbol,
    root: Root,
}

/// The result of linking a bundle: the merged declaration set plus the
/// per-module scopes the resolver needs, and every parsed module's CST
/// (for the resolver to walk).
pub struct LinkedBundle {
    pub program: Program,
    pub scopes: ScopeTable,
    pub modules: IndexMap<SourceId, Root>,
    /// Each formula's declaring module and AST node, needed by the
    /// resolver to walk its blocks in the right scope.
    pub formula_nodes: IndexMap<formulang_base::Symbol, (SourceId, crate::parser::FormulaDecl)>,
    /// Each group's declaring module and AST node, needed by the resolver
    /// to qualify its (bare, as-written) member names into ingredient
    /// declarations.
    pub group_nodes: IndexMap<formulang_base::Symbol, (SourceId, crate::parser::ast::GroupDecl)>,
}

/// Resolves an import's literal path string against the bundle's canonical
/// paths, accepting the extension-implied form.
fn resolve_import_path(source_map: &SourceMap, raw: &str) -> Option<SourceId> {
    if let Some(id) = source_map.id_of(raw) {
        return Some(id);
    }
    if !raw.ends_with(".fm") {
        return source_map.id_of(&format!("{raw}.fm"));
    }
    None
}

/// Default namespace for an imported module: its filename stem, without
/// directories or the `.fm` extension.
fn path_stem(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    base.strip_suffix(".fm").unwrap_or(base)
}

pub fn link(
    source_map: &SourceMap,
    interner: &mut Interner,
    config: ParserConfig,
    diagnostics: &mut Diagnostics,
) -> Result<LinkedBundle, crate::Error> {
    let mut modules = IndexMap::new();
    let mut parsed = Vec::new();

    for source in source_map.iter() {
        let result = parser::parse(source.content, config)?;
        diagnostics.extend(result.diagnostics);
        let cst = parser::SyntaxNode::new_root(result.green);
        let root = Root::cast(cst).expect("grammar always produces a Root node");
        let stem = interner.intern(path_stem(source.path));
        modules.insert(source.id, root.clone());
        parsed.push(ParsedModule {
            source_id: source.id,
            stem,
            root,
        });
    }

    check_import_cycles(source_map, &parsed, diagnostics);

    let mut scopes = ScopeTable::new();
    let mut program = Program::default();
    let mut formula_nodes = IndexMap::new();
    let mut group_nodes = IndexMap::new();

    // Pass 1: collect local declarations and assign each one its qualified
    // global symbol (`module_stem.decl_name`).
    for pm in &parsed {
        let mut scope = ModuleScope::new(pm.source_id, pm.stem);
        let Some(module) = pm.root.module() else {
            scopes.insert(pm.source_id, scope);
            continue;
        };

        for decl in module.decls() {
            match &decl {
                Decl::Formula(d) => {
                    if let Some(name_tok) = d.name() {
                        let name = interner.intern(name_tok.text());
                        let qualified = qualify(interner, pm.stem, name);
                        formula_nodes.insert(qualified, (pm.source_id, d.clone()));
                    }
                }
                Decl::Group(d) => {
                    if let Some(name_tok) = d.name() {
                        let name = interner.intern(name_tok.text());
                        let qualified = qualify(interner, pm.stem, name);
                        group_nodes.insert(qualified, (pm.source_id, d.clone()));
                    }
                }
                _ => {}
            }
            collect_decl(interner, pm.stem, &mut scope, &mut program, decl, diagnostics);
        }

        scopes.insert(pm.source_id, scope);
    }

    // Pass 2: bind import namespaces and direct/wildcard names. Modules
    // were parsed in bundle order, which is not necessarily a topological
    // order of the import DAG, so resolve each import's direct/wildcard
    // names by re-deriving them from the target's own locals (acyclic by
    // construction once cycles are rejected above).
    for pm in &parsed {
        let Some(module) = pm.root.module() else {
            continue;
        };
        for import in module.imports() {
            bind_import(source_map, interner, &mut scopes, pm.source_id, pm.stem, &import, diagnostics);
        }
    }

    Ok(LinkedBundle {
        program,
        scopes,
        modules,
        formula_nodes,
        group_nodes,
    })
}

fn collect_decl(
    interner: &mut Interner,
    stem: formulang_base::Symbol,
    scope: &mut ModuleScope,
    program: &mut Program,
    decl: Decl,
    diagnostics: &mut Diagnostics,
) {
    match decl {
        Decl::Import(_) => {}
        Decl::Nutrient(d) => {
            let Some(name_tok) = d.name() else { return };
            let name = interner.intern(name_tok.text());
            if !scope.declare(DeclKind::Nutrient, name) {
                diagnostics
                    .error(
                        DiagnosticCode::NameRedeclaration,
                        format!("nutrient '{}' is already declared in this module", name_tok.text()),
                        name_tok.text_range(),
                    )
                    .emit();
                return;
            }
            let qualified = qualify(interner, stem, name);
            let mut def = NutrientDef {
                name: qualified,
                span: span_of(d.as_cst().text_range()),
                ..Default::default()
            };
            for prop in d.props() {
                apply_nutrient_prop(&prop, &mut def);
            }
            program.nutrients.insert(qualified, def);
        }
        Decl::Ingredient(d) => {
            let Some(name_tok) = d.name() else { return };
            let name = interner.intern(name_tok.text());
            if !scope.declare(DeclKind::Ingredient, name) {
                diagnostics
                    .error(
                        DiagnosticCode::NameRedeclaration,
                        format!("ingredient '{}' is already declared in this module", name_tok.text()),
                        name_tok.text_range(),
                    )
                    .emit();
                return;
            }
            let qualified = qualify(interner, stem, name);
            let mut def = IngredientDef {
                name: qualified,
                span: span_of(d.as_cst().text_range()),
                ..Default::default()
            };
            for prop in d.props() {
                apply_ingredient_prop(interner, stem, &prop, &mut def);
            }
            if def.cost.is_none() {
                diagnostics
                    .error(
                        DiagnosticCode::SemanticMissingCost,
                        format!("ingredient '{}' has no 'cost' property", name_tok.text()),
                        name_tok.text_range(),
                    )
                    .emit();
            }
            program.ingredients.insert(qualified, def);
        }
        Decl::Group(d) => {
            let Some(name_tok) = d.name() else { return };
            let name = interner.intern(name_tok.text());
            if !scope.declare(DeclKind::Group, name) {
                diagnostics
                    .error(
                        DiagnosticCode::NameRedeclaration,
                        format!("group '{}' is already declared in this module", name_tok.text()),
                        name_tok.text_range(),
                    )
                    .emit();
                return;
            }
            let qualified = qualify(interner, stem, name);
            let members = d
                .members()
                .map(|list| list.names().map(|t| interner.intern(t.text())).collect())
                .unwrap_or_default();
            program.groups.insert(
                qualified,
                GroupDef {
                    name: qualified,
                    members,
                    span: span_of(d.as_cst().text_range()),
                },
            );
        }
        Decl::Formula(d) => {
            let Some(name_tok) = d.name() else { return };
            let name = interner.intern(name_tok.text());
            if !scope.declare(DeclKind::Formula, name) {
                diagnostics
                    .error(
                        DiagnosticCode::NameRedeclaration,
                        format!("formula '{}' is already declared in this module", name_tok.text()),
                        name_tok.text_range(),
                    )
                    .emit();
                return;
            }
            let qualified = qualify(interner, stem, name);
            let is_template = d.is_template();
            let mut batch_size = None;
            let mut display_name = None;
            let mut code = None;
            let mut description = None;
            for prop in d.props() {
                let Some(key) = prop.key() else { continue };
                match key.text() {
                    "batch_size" | "batch" => {
                        batch_size = prop_number(&prop);
                    }
                    "name" => {
                        display_name = prop.value_str().map(|t| unescape_string(t.text()));
                    }
                    "code" => {
                        code = prop.value_str().map(|t| unescape_string(t.text()));
                    }
                    "desc" | "description" => {
                        description = prop.value_str().map(|t| unescape_string(t.text()));
                    }
                    _ => {}
                }
            }
            if batch_size.is_none() && !is_template {
                diagnostics
                    .error(
                        DiagnosticCode::SemanticMissingBatchSize,
                        format!("formula '{}' has no 'batch_size'/'batch' property", name_tok.text()),
                        name_tok.text_range(),
                    )
                    .emit();
            }
            program.formulas.insert(
                qualified,
                FormulaDef {
                    name: qualified,
                    is_template,
                    display_name,
                    code,
                    description,
                    batch_size,
                    nutrient_items: Vec::new(),
                    ingredient_items: Vec::new(),
                    span: span_of(d.as_cst().text_range()),
                },
            );
        }
    }
}

fn apply_nutrient_prop(prop: &crate::parser::PropAssign, def: &mut NutrientDef) {
    let Some(key) = prop.key() else { return };
    match key.text() {
        "code" => def.code = prop.value_str().map(|t| unescape_string(t.text())),
        "desc" | "description" => def.description = prop.value_str().map(|t| unescape_string(t.text())),
        "unit" => def.unit = prop.value_str().map(|t| unescape_string(t.text())),
        _ => {}
    }
}

fn apply_ingredient_prop(
    interner: &mut Interner,
    stem: formulang_base::Symbol,
    prop: &crate::parser::PropAssign,
    def: &mut IngredientDef,
) {
    let Some(key) = prop.key() else { return };
    match key.text() {
        "cost" => def.cost = prop_number(prop),
        "desc" | "description" => def.description = prop.value_str().map(|t| unescape_string(t.text())),
        "name" | "unit" => {}
        other => {
            // Anything else is a nutrient reference/value pair; key it by the
            // same qualified `stem.name` symbol `resolve_bare`/`resolve_namespaced`
            // produce for a `Nutrient` reference, so `lp.rs`/`solver.rs` lookups hit.
            if let Some(value) = prop_number(prop) {
                let name = interner.intern(other);
                let sym = qualify(interner, stem, name);
                def.nutrient_values.insert(sym, value);
            }
        }
    }
}

fn prop_number(prop: &crate::parser::PropAssign) -> Option<f64> {
    use crate::parser::Expr;
    match prop.value_expr()? {
        Expr::Num(n) => strip_ws(&n.as_cst().text().to_string()).parse().ok(),
        Expr::Percent(n) => {
            let text = strip_ws(&n.as_cst().text().to_string());
            text.trim_end_matches('%').parse().ok()
        }
        _ => None,
    }
}

fn strip_ws(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn bind_import(
    source_map: &SourceMap,
    interner: &mut Interner,
    scopes: &mut ScopeTable,
    importer: SourceId,
    importer_stem: formulang_base::Symbol,
    import: &crate::parser::ImportDecl,
    diagnostics: &mut Diagnostics,
) {
    let Some(path_tok) = import.path_text() else { return };
    let raw_path = unescape_string(path_tok.text());
    let Some(target) = resolve_import_path(source_map, &raw_path) else {
        diagnostics
            .error(
                DiagnosticCode::ImportFileNotFound,
                format!("no module found for import path '{raw_path}'"),
                path_tok.text_range(),
            )
            .emit();
        return;
    };

    let target_stem = {
        let path = source_map.path(target);
        interner.intern(path_stem(path))
    };

    match import.binding() {
        Some(ImportBinding::Alias(a)) => {
            let Some(alias_tok) = a.alias() else { return };
            let alias = interner.intern(alias_tok.text());
            if let Some(scope) = scopes.get_mut(importer) {
                scope.namespaces.insert(alias, target);
            }
        }
        Some(ImportBinding::List(l)) => {
            let Some(names) = l.names() else { return };
            let wanted: Vec<_> = names.names().map(|t| (t.text().to_string(), t.text_range())).collect();
            for (name_text, range) in wanted {
                let name = interner.intern(&name_text);
                let declared = declares_any_kind(scopes, target, name)
                    .or_else(|| scopes.get(target).and_then(|s| s.directs.get(&name).copied()));
                match declared {
                    Some(declaring) => {
                        if let Some(scope) = scopes.get_mut(importer) {
                            scope.directs.insert(name, declaring);
                        }
                    }
                    None => {
                        diagnostics
                            .error(
                                DiagnosticCode::NameUnknownIdentifier,
                                format!("'{name_text}' is not exported by '{raw_path}'"),
                                range,
                            )
                            .emit();
                    }
                }
            }
        }
        Some(ImportBinding::Wildcard(_)) => {
            if let Some(scope) = scopes.get_mut(importer) {
                scope.has_wildcard_import = true;
            }
            let target_names = wildcard_names(scopes, target);
            if let Some(scope) = scopes.get_mut(importer) {
                for (name, declaring) in target_names {
                    scope.merge_wildcard_name(name, declaring);
                }
            }
        }
        Some(ImportBinding::Namespace(_)) | None => {
            if let Some(scope) = scopes.get_mut(importer) {
                scope.namespaces.insert(target_stem, target);
            }
        }
    }
}

/// All names `target` exposes under wildcard export: its own locals plus
/// whatever it has itself merged in from wildcard imports (propagating the
/// re-export transitively).
fn wildcard_names(scopes: &ScopeTable, target: SourceId) -> Vec<(formulang_base::Symbol, SourceId)> {
    let Some(scope) = scopes.get(target) else { return Vec::new() };
    let mut out = Vec::new();
    for table in scope.locals.values() {
        for name in table.keys() {
            out.push((*name, target));
        }
    }
    for (&name, &declaring) in &scope.directs {
        out.push((name, declaring));
    }
    out
}

fn declares_any_kind(scopes: &ScopeTable, module: SourceId, name: formulang_base::Symbol) -> Option<SourceId> {
    let scope = scopes.get(module)?;
    for kind in [
        DeclKind::Nutrient,
        DeclKind::Ingredient,
        DeclKind::Group,
        DeclKind::Formula,
    ] {
        if scope.has_local(kind, name) {
            return Some(module);
        }
    }
    None
}

fn check_import_cycles(source_map: &SourceMap, parsed: &[ParsedModule], diagnostics: &mut Diagnostics) {
    let mut edges: IndexMap<SourceId, Vec<(SourceId, String, TextRange)>> = IndexMap::new();
    for pm in parsed {
        let Some(module) = pm.root.module() else { continue };
        let mut list = Vec::new();
        for import in module.imports() {
            let Some(path_tok) = import.path_text() else { continue };
            let raw = unescape_string(path_tok.text());
            if let Some(target) = resolve_import_path(source_map, &raw) {
                list.push((target, raw, path_tok.text_range()));
            }
        }
        edges.insert(pm.source_id, list);
    }

    let mut visited = HashSet::new();
    for pm in parsed {
        if visited.contains(&pm.source_id) {
            continue;
        }
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();
        detect_cycle(pm.source_id, &edges, &mut stack, &mut on_stack, &mut visited, source_map, diagnostics);
    }
}

fn detect_cycle(
    node: SourceId,
    edges: &IndexMap<SourceId, Vec<(SourceId, String, TextRange)>>,
    stack: &mut Vec<SourceId>,
    on_stack: &mut HashSet<SourceId>,
    visited: &mut HashSet<SourceId>,
    source_map: &SourceMap,
    diagnostics: &mut Diagnostics,
) {
    if on_stack.contains(&node) {
        let cycle: Vec<_> = stack
            .iter()
            .skip_while(|&&id| id != node)
            .map(|&id| source_map.path(id).to_string())
            .collect();
        let last_edge = edges
            .get(stack.last().copied().as_ref().unwrap_or(&node))
            .and_then(|v| v.iter().find(|(t, _, _)| *t == node));
        let range = last_edge.map(|(_, _, r)| *r).unwrap_or(TextRange::empty(0.into()));
        diagnostics
            .error(
                DiagnosticCode::ImportCycle,
                format!("import cycle: {}", cycle.join(" -> ")),
                range,
            )
            .emit();
        return;
    }
    if visited.contains(&node) {
        return;
    }
    visited.insert(node);
    stack.push(node);
    on_stack.insert(node);
    if let Some(targets) = edges.get(&node) {
        for &(target, _, _) in targets {
            detect_cycle(target, edges, stack, on_stack, visited, source_map, diagnostics);
        }
    }
    on_stack.remove(&node);
    stack.pop();
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod loader_tests;
