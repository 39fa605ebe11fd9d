//! AST-based analysis of TypeScript and JavaScript.
//!
//! Source is parsed with tree-sitter, flattened into a [`SyntaxTree`] arena
//! and walked once in pre-order. Each node is offered to the detectors whose
//! rule targets its kind, so findings come out in source order.

pub mod builder;
pub mod config;
pub mod detectors;
pub mod dynamism;
pub mod excerpt;
pub mod node;

pub use builder::SyntaxTreeBuilder;
pub use config::{EcmaVersion, ParserConfig, SourceType};
pub use detectors::{Detector, DetectorSet, FileContext};
pub use node::{NodeId, NodeKind, SyntaxNode, SyntaxTree};

use crate::error::ParseError;
use crate::reader::{Content, ContentUnit};
use crate::rules::RuleSet;
use crate::types::Finding;
use std::path::Path;

/// Parser plus the detectors built from one rule table.
pub struct AstAnalyzer {
    builder: SyntaxTreeBuilder,
    detectors: DetectorSet,
}

impl AstAnalyzer {
    /// Analyzer with the built-in rules.
    pub fn new(config: ParserConfig) -> Self {
        Self::with_rules(config, &RuleSet::builtin())
    }

    pub fn with_rules(config: ParserConfig, rules: &RuleSet) -> Self {
        Self {
            builder: SyntaxTreeBuilder::new(config),
            detectors: DetectorSet::from_rules(rules),
        }
    }

    pub fn builder(&self) -> &SyntaxTreeBuilder {
        &self.builder
    }

    pub fn detectors(&self) -> &DetectorSet {
        &self.detectors
    }

    /// Parse and scan one source text. `path` selects the dialect, `file` is
    /// the name reported on findings.
    pub fn analyze_source(
        &self,
        source: &str,
        path: &Path,
        file: &str,
    ) -> Result<Vec<Finding>, ParseError> {
        let tree = self.builder.build(source, path)?;
        Ok(self.scan_tree(&tree, &FileContext { file, source }))
    }

    /// Parse and scan a content unit read from disk.
    pub fn analyze_unit(&self, unit: &ContentUnit) -> Result<Vec<Finding>, ParseError> {
        let tree = self.builder.build_unit(unit)?;
        let file = unit.record.display_path();
        let source = match &unit.content {
            Content::Text(text) => text.as_str(),
            Content::Bytes(_) => "",
        };
        Ok(self.scan_tree(&tree, &FileContext { file: &file, source }))
    }

    /// Walk the tree in node order. A detector fault is logged and skipped;
    /// the remaining detectors and nodes still run.
    pub fn scan_tree(&self, tree: &SyntaxTree, ctx: &FileContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (id, node) in tree.iter() {
            for detector in self.detectors.for_kind(&node.kind) {
                match detector.analyze(id, tree, ctx) {
                    Ok(Some(finding)) => findings.push(finding),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            rule = %detector.rule().id,
                            file = ctx.file,
                            "Detector failed: {}",
                            e
                        );
                    }
                }
            }
        }

        tracing::debug!(file = ctx.file, findings = findings.len(), "Scanned syntax tree");
        findings
    }
}

impl Default for AstAnalyzer {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}
