#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures shared across the Formulang compiler.
//!
//! - [`interner`]: string interning for cheap symbol comparison
//! - [`span`]: half-open byte ranges used by every diagnostic and AST node
//! - [`source_map`]: arena-backed storage for multi-module compilation units

pub mod interner;
pub mod source_map;
pub mod span;

pub use interner::{Interner, Symbol};
pub use source_map::{Source, SourceId, SourceMap};
pub use span::Span;
