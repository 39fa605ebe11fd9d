//! # codesentry
//!
//! Static threat scanner for TypeScript and JavaScript source trees.
//!
//! Files are discovered under depth and size bounds, read under a memory
//! ceiling, parsed into flat syntax trees and matched against a rule table
//! for runtime code evaluation, shell execution and dynamic module loading.
//! Results are aggregated into a [`ScanSession`] with an overall status.

pub mod adapters;
pub mod analyzers;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod reader;
pub mod reporters;
pub mod rules;
pub mod scanner;
pub mod session;
pub mod types;

pub use adapters::{AcquireRequest, LocalSource, RepositoryMetadata, RepositorySource};
pub use analyzers::{AstAnalyzer, ParserConfig};
pub use config::{generate_default_config, ScanConfig};
pub use discovery::{DiscoveryConfig, FileRecord, FileWalker};
pub use error::{Result, ScanError};
pub use reader::{ContentReader, MemoryMonitor, ReadOptions};
pub use rules::{PatternRule, RuleSet};
pub use scanner::{CancellationToken, Scanner};
pub use session::{ScanReport, ScanSession};
pub use types::{Finding, FindingCategory, OverallStatus, Severity, Value};
