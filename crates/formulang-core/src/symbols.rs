//! Per-module scopes: local declarations, import namespaces, and the
//! direct/wildcard names merged unqualified into a module's local scope.
//!
//! Declaration identity is global and keyed by *qualified* name -
//! `module_stem.decl_name`, interned as one `Symbol` - so that a name
//! reached through two different import chains (a re-export) still points
//! at one declaration. Collection (building each module's local scope) and
//! resolution (following namespaces and re-export chains) are deliberately
//! separate passes, with per-module namespaces rather than one flat table.

use formulang_base::{Interner, Symbol};
use formulang_base::SourceId;
use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Nutrient,
    Ingredient,
    Group,
    Formula,
}

/// What a module exposes and can see: its own declarations, the namespaces
/// bound by its imports, and the names merged unqualified into its scope
/// by direct-list or wildcard imports.
#[derive(Debug, Clone, Default)]
pub struct ModuleScope {
    pub source_id: Option<SourceId>,
    pub stem: Symbol,
    /// Locally declared names per kind, in declaration order.
    pub locals: IndexMap<DeclKind, IndexMap<Symbol, ()>>,
    /// `namespace name -> imported module`, from `as` aliases or the
    /// default filename-stem binding.
    pub namespaces: IndexMap<Symbol, SourceId>,
    /// Names merged unqualified into this module's scope by `{ a, b }` or
    /// `{ * }` imports, resolved to the module that actually declares them
    /// (after following any re-export chain).
    pub directs: IndexMap<Symbol, SourceId>,
    /// Names that two or more wildcard imports bound to different
    /// declaring modules. Resolving one of these is an error raised at the
    /// point of use, not at the import site (mirrors `directs`, which only
    /// ever holds one candidate).
    pub ambiguous: IndexSet<Symbol>,
    /// True if this module itself wildcard-imports at least one other
    /// module, which makes its own `directs` eligible for propagation to
    /// modules that wildcard-import *it*.
    pub has_wildcard_import: bool,
}

impl ModuleScope {
    pub fn new(source_id: SourceId, stem: Symbol) -> Self {
        Self {
            source_id: Some(source_id),
            stem,
            locals: IndexMap::new(),
            namespaces: IndexMap::new(),
            directs: IndexMap::new(),
            ambiguous: IndexSet::new(),
            has_wildcard_import: false,
        }
    }

    /// Merges a wildcard-imported name into this scope. If a different
    /// module already bound that name through an earlier wildcard import,
    /// the name becomes ambiguous instead of silently picking the last
    /// writer.
    pub fn merge_wildcard_name(&mut self, name: Symbol, declaring: SourceId) {
        match self.directs.get(&name) {
            Some(&existing) if existing != declaring => {
                self.ambiguous.insert(name);
            }
            Some(_) => {}
            None => {
                self.directs.insert(name, declaring);
            }
        }
    }

    pub fn declare(&mut self, kind: DeclKind, name: Symbol) -> bool {
        let table = self.locals.entry(kind).or_default();
        if table.contains_key(&name) {
            false
        } else {
            table.insert(name, ());
            true
        }
    }

    pub fn has_local(&self, kind: DeclKind, name: Symbol) -> bool {
        self.locals.get(&kind).is_some_and(|t| t.contains_key(&name))
    }
}

/// Builds the qualified symbol `module_stem.decl_name` used as a
/// declaration's global identity.
pub fn qualify(interner: &mut Interner, stem: Symbol, name: Symbol) -> Symbol {
    let qualified = format!("{}.{}", interner.resolve(stem), interner.resolve(name));
    interner.intern_owned(qualified)
}

/// Registry of every module's scope, keyed by `SourceId`, plus a lookup
/// helper that follows namespaces and re-export chains.
#[derive(Debug, Clone, Default)]
pub struct ScopeTable {
    scopes: IndexMap<SourceId, ModuleScope>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: SourceId, scope: ModuleScope) {
        self.scopes.insert(id, scope);
    }

    pub fn get(&self, id: SourceId) -> Option<&ModuleScope> {
        self.scopes.get(&id)
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut ModuleScope> {
        self.scopes.get_mut(&id)
    }

    /// Resolves a bare (unqualified) name used inside `module` against that
    /// module's own declarations, then its direct/wildcard imports.
    /// Returns the module that declares it, or `None` if unresolved.
    pub fn resolve_bare(&self, module: SourceId, kind: DeclKind, name: Symbol) -> Option<SourceId> {
        let scope = self.scopes.get(&module)?;
        if scope.has_local(kind, name) {
            return Some(module);
        }
        let declaring = *scope.directs.get(&name)?;
        // `directs` only records *that* a name was imported, not its kind, so a
        // wrong-kind reference to an imported name must fall through to `None`
        // here rather than resolve against the wrong declaration.
        self.scopes.get(&declaring)?.has_local(kind, name).then_some(declaring)
    }

    /// True if `name`, used bare inside `module`, is ambiguous (bound by two
    /// or more wildcard imports to different declaring modules) and has no
    /// local declaration shadowing the ambiguity.
    pub fn is_ambiguous(&self, module: SourceId, name: Symbol) -> bool {
        let Some(scope) = self.scopes.get(&module) else {
            return false;
        };
        scope.ambiguous.contains(&name)
            && ![DeclKind::Nutrient, DeclKind::Ingredient, DeclKind::Group, DeclKind::Formula]
                .into_iter()
                .any(|kind| scope.has_local(kind, name))
    }

    /// Resolves `namespace.name` used inside `module`.
    pub fn resolve_namespaced(
        &self,
        module: SourceId,
        namespace: Symbol,
        kind: DeclKind,
        name: Symbol,
    ) -> Option<SourceId> {
        let scope = self.scopes.get(&module)?;
        let target = *scope.namespaces.get(&namespace)?;
        self.resolve_bare(target, kind, name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceId, &ModuleScope)> {
        self.scopes.iter()
    }
}
