//! Formulang: a compiler and linear-program formulation engine for a
//! declarative least-cost feed-formulation language.
//!
//! The pipeline: [`parser`] lexes and parses one source into a lossless
//! concrete syntax tree, [`loader`] links a bundle of parsed modules into
//! one flat [`model::Program`] and builds per-module scopes, [`resolver`]
//! binds every reference inside a formula's blocks to a declaration,
//! [`composition`] expands composition references into override-resolved
//! constraint maps, [`lp`] lowers a composed formula into a backend-neutral
//! linear program, and [`solver`] hands that model to `good_lp` and builds
//! the user-facing report. [`query`] wraps the front half of that pipeline
//! for editor-style, single-file analysis (hover, completions, validation)
//! that never needs a full project to link.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod composition;
pub mod diagnostics;
pub mod loader;
pub mod lp;
pub mod model;
pub mod parser;
pub mod query;
pub mod resolver;
pub mod solver;
pub mod symbols;

use formulang_base::{Interner, SourceMap};

pub use query::{get_completions, get_formulas, get_hover, validate};
pub use solver::{SolveResult, SolveStatus};

/// Errors that abort a pipeline stage outright rather than degrading to a
/// diagnostic: fuel/recursion exhaustion in the parser, the only failure
/// modes that indicate the compiler itself is no longer making bounded
/// progress (see [`parser`]'s recovery strategy).
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("execution limit exceeded")]
    ExecFuelExhausted,

    #[error("recursion limit exceeded")]
    RecursionLimitExceeded,
}

/// Failure modes specific to [`solve`], layered on top of [`Error`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum SolveError {
    #[error(transparent)]
    Parse(#[from] Error),

    #[error("no formula named '{0}' is declared in this source")]
    UnknownFormula(String),

    #[error("'{0}' is a template formula and cannot be solved directly")]
    TemplateFormula(String),

    #[error("'{0}' has no resolved batch size")]
    MissingBatchSize(String),

    #[error("source has {0} diagnostic error(s); see `validate` for details")]
    HasErrors(usize),
}

/// Parses, links, resolves, composes, and solves `formula_name` out of a
/// single standalone source.
///
/// This is the one-shot batch entry point, for a source with no
/// unresolved imports — an editor integration that wants incremental,
/// partial-input analysis over a single in-progress buffer should use the
/// [`query`] functions instead.
pub fn solve(source: &str, formula_name: &str) -> Result<SolveResult, SolveError> {
    let source_map = SourceMap::root_only(source);
    let mut interner = Interner::new();
    let mut diag = diagnostics::Diagnostics::new();

    let bundle = loader::link(&source_map, &mut interner, parser::ParserConfig::default(), &mut diag)?;
    let program = resolver::resolve(&bundle, &mut interner, &mut diag);

    if diag.has_errors() {
        return Err(SolveError::HasErrors(diag.error_count()));
    }

    let formula_sym = program
        .formulas
        .keys()
        .copied()
        .find(|&sym| {
            interner
                .try_resolve(sym)
                .and_then(|full| full.rsplit_once('.'))
                .is_some_and(|(_, name)| name == formula_name)
        })
        .ok_or_else(|| SolveError::UnknownFormula(formula_name.to_string()))?;

    let formula = &program.formulas[&formula_sym];
    if formula.is_template {
        return Err(SolveError::TemplateFormula(formula_name.to_string()));
    }

    let composed = composition::compose(&program, &interner, formula_sym, &mut diag)
        .expect("formula_sym was just looked up in program.formulas");
    let model = lp::build(&program, formula, &composed, &mut diag)
        .ok_or_else(|| SolveError::MissingBatchSize(formula_name.to_string()))?;

    Ok(solver::solve(&program, &interner, formula, formula_sym, &model))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod lib_tests;
