//! Core library for the MBEL localization language.
//!
//! The pipeline is roughly:
//!
//!   source .mbel
//!     -> lexer     (tokens)
//!     -> parser    (AST + annotations + diagnostics)
//!     -> compiler  (flat key/value table, JSON-serializable)
//!     -> runtime   (lookups with plural rules and interpolation)
//!
//! Higher-level tools (the `mbel` CLI, services embedding translations)
//! should depend on this crate rather than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Compilation: single files and multi-file builds
// ---------------------------------------------------------------------

pub mod table;
pub mod compiler;
pub mod build;

// ---------------------------------------------------------------------
// Runtime: plural rules, resolution, locale management
// ---------------------------------------------------------------------

pub mod plural;
pub mod runtime;
pub mod repository;
pub mod manager;

// ---------------------------------------------------------------------
// Tooling
// ---------------------------------------------------------------------

pub mod format;
pub mod lint;
pub mod sourcemap;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use build::{BuildOutput, SourceUnit, UnitFailure, compile_units, derive_namespace, discover_files};
pub use compiler::{compile, compile_source};
pub use diagnostic::{Diagnostic, Severity};
pub use error::CoreError;
pub use manager::{Manager, ManagerConfig, WatchHandle};
pub use parser::{ParseOutput, parse};
pub use plural::{PluralCategory, PluralRule, plural_category};
pub use repository::{FileRepository, Repository};
pub use runtime::{Args, Runtime, Value, Vars};
pub use table::{CompiledTable, CompiledValue, LogicBlock};
