//! Name-resolution, type-inference and validation engine for a dynamically
//! typed scripting language with optional static type annotations.
//!
//! The crate is organized leaves-first, mirroring the way the checker itself
//! runs: [`types`] has no internal dependents of its own, [`reflection`]
//! builds on it, [`context`] builds on both, and [`loader`] /
//! [`class_resolver`] / [`prescan`] / [`typer`] / [`validator`] compose them
//! into the two-pass analysis described in the crate's design documents.

pub mod ast;
pub mod checker;
pub mod class_resolver;
pub mod cli;
pub mod context;
pub mod diagnostics;
pub mod loader;
pub mod name;
pub mod prescan;
pub mod reflection;
pub mod typer;
pub mod types;
pub mod validator;

pub use checker::{CheckerConfig, CheckerOutcome, run_checker};
pub use diagnostics::{AnalysisError, Diagnostic, Severity};
