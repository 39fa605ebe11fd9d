//! Analysis engines for threat scanning.

pub mod ast;

pub use ast::{AstAnalyzer, ParserConfig};
