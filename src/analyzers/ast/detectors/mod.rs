//! Structural detectors.
//!
//! Each detector is built from one [`PatternRule`] and inspects nodes of the
//! rule's target kind in a flattened [`SyntaxTree`].

mod dynamic_import;
mod eval;
mod function_constructor;
mod shell_execution;
mod timer_string;

pub use dynamic_import::DynamicImportDetector;
pub use eval::EvalDetector;
pub use function_constructor::FunctionConstructorDetector;
pub use shell_execution::ShellExecutionDetector;
pub use timer_string::TimerStringDetector;

use super::excerpt::{excerpt, CONTEXT_LINES};
use super::node::{CalleeName, NodeId, NodeKind, NodePayload, SyntaxNode, SyntaxTree};
use crate::error::DetectorError;
use crate::rules::{DetectorKind, PatternRule, RuleSet};
use crate::types::Finding;

/// The file being scanned.
#[derive(Debug, Clone, Copy)]
pub struct FileContext<'a> {
    /// Path relative to the scan root, as reported on findings.
    pub file: &'a str,
    pub source: &'a str,
}

/// A detector that analyzes nodes for one rule.
pub trait Detector: Send + Sync {
    fn rule(&self) -> &PatternRule;

    /// Check if this detector should analyze a given node kind.
    fn handles(&self, kind: &NodeKind) -> bool {
        self.rule().target().matches(kind)
    }

    /// Analyze a node and return a finding if it matches.
    fn analyze(
        &self,
        id: NodeId,
        tree: &SyntaxTree,
        ctx: &FileContext<'_>,
    ) -> Result<Option<Finding>, DetectorError>;
}

/// Collection of detectors built from a rule table.
pub struct DetectorSet {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorSet {
    /// One detector per enabled rule, in table order.
    pub fn from_rules(rules: &RuleSet) -> Self {
        let detectors = rules
            .enabled()
            .map(|rule| -> Box<dyn Detector> {
                let rule = rule.clone();
                match rule.detector {
                    DetectorKind::Eval => Box::new(EvalDetector::new(rule)),
                    DetectorKind::FunctionConstructor => {
                        Box::new(FunctionConstructorDetector::new(rule))
                    }
                    DetectorKind::DynamicImport => Box::new(DynamicImportDetector::new(rule)),
                    DetectorKind::TimerString => Box::new(TimerStringDetector::new(rule)),
                    DetectorKind::ShellExecution => Box::new(ShellExecutionDetector::new(rule)),
                }
            })
            .collect();
        Self { detectors }
    }

    /// Detectors that handle a node kind.
    pub fn for_kind<'s>(&'s self, kind: &'s NodeKind) -> impl Iterator<Item = &'s dyn Detector> {
        self.detectors
            .iter()
            .filter(move |d| d.handles(kind))
            .map(|d| d.as_ref())
    }

    /// Get all detectors.
    pub fn all(&self) -> &[Box<dyn Detector>] {
        &self.detectors
    }
}

impl Default for DetectorSet {
    fn default() -> Self {
        Self::from_rules(&RuleSet::builtin())
    }
}

/// Callee and arguments of a call or `new` node.
fn call_parts<'t>(
    rule: &PatternRule,
    id: NodeId,
    node: &'t SyntaxNode,
) -> Result<(Option<NodeId>, &'t [NodeId]), DetectorError> {
    match &node.payload {
        NodePayload::Call { callee, arguments } => Ok((*callee, arguments)),
        _ => Err(DetectorError::UnexpectedShape {
            rule: rule.id.clone(),
            expected: "call payload",
            node: id.index(),
        }),
    }
}

/// The callee, if it satisfies the rule's name predicate. Member calls on an
/// unresolved object (`/re/.exec(s)`, `a.b.exec()`) never match.
fn matched_callee<'t>(
    rule: &PatternRule,
    tree: &'t SyntaxTree,
    callee: Option<NodeId>,
) -> Option<CalleeName<'t>> {
    callee
        .and_then(|c| tree.callee_name(c))
        .filter(|c| !(c.member && c.receiver.is_none()))
        .filter(|c| rule.matches_callee(c.name, c.receiver))
}

/// Finding carrying the rule's naming, the node's line and a code excerpt.
fn rule_finding(
    rule: &PatternRule,
    node: &SyntaxNode,
    ctx: &FileContext<'_>,
    description: String,
) -> Finding {
    let mut finding = Finding::new(
        rule.category.clone(),
        rule.subcategory.clone(),
        rule.severity,
        description,
        ctx.file,
    );
    if let Some(line) = node.line() {
        finding = finding.with_line(line);
        if let Some(code) = excerpt(ctx.source, line, CONTEXT_LINES) {
            finding = finding.with_code(code);
        }
    }
    finding
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::analyzers::ast::builder::SyntaxTreeBuilder;
    use std::path::Path;

    /// Run every built-in detector over `source`, in node order.
    pub fn scan(source: &str, file: &str) -> Vec<Finding> {
        let tree = SyntaxTreeBuilder::default()
            .build(source, Path::new(file))
            .unwrap();
        let set = DetectorSet::default();
        let ctx = FileContext { file, source };
        let mut findings = Vec::new();
        for (id, node) in tree.iter() {
            for detector in set.for_kind(&node.kind) {
                if let Some(f) = detector.analyze(id, &tree, &ctx).unwrap() {
                    findings.push(f);
                }
            }
        }
        findings
    }

    pub fn scan_for(source: &str, subcategory: &str) -> Vec<Finding> {
        scan(source, "test.ts")
            .into_iter()
            .filter(|f| f.subcategory == subcategory)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_has_one_detector_per_rule() {
        let set = DetectorSet::default();
        assert_eq!(set.all().len(), 5);
        assert_eq!(set.for_kind(&NodeKind::CallExpression).count(), 3);
        assert_eq!(set.for_kind(&NodeKind::NewExpression).count(), 1);
        assert_eq!(set.for_kind(&NodeKind::ImportExpression).count(), 1);
        assert_eq!(set.for_kind(&NodeKind::Identifier).count(), 0);
    }

    #[test]
    fn test_wrong_payload_is_detector_error() {
        let set = DetectorSet::default();
        let tree = SyntaxTree::from_nodes(vec![SyntaxNode {
            kind: NodeKind::CallExpression,
            span: None,
            parent: None,
            children: Vec::new(),
            payload: NodePayload::None,
        }]);
        let ctx = FileContext {
            file: "a.ts",
            source: "",
        };
        let detector = set.for_kind(&NodeKind::CallExpression).next().unwrap();
        assert!(detector.analyze(NodeId(0), &tree, &ctx).is_err());
    }
}
