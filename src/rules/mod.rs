//! Structural detection rules.
//!
//! A rule pairs a detector kind (which fixes the node shape and how arguments
//! are classified) with callee names, severity and naming. The table is built
//! once and handed to the analyzer; nothing here is global.

pub mod loader;
pub mod patterns;

use crate::analyzers::ast::node::NodeKind;
use crate::error::RuleLoadError;
use crate::types::{FindingCategory, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Node shape a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    Call,
    New,
    Import,
}

impl RuleTarget {
    pub fn matches(&self, kind: &NodeKind) -> bool {
        let target = match kind {
            NodeKind::CallExpression => RuleTarget::Call,
            NodeKind::NewExpression => RuleTarget::New,
            NodeKind::ImportExpression => RuleTarget::Import,
            NodeKind::Program
            | NodeKind::MemberExpression
            | NodeKind::Identifier
            | NodeKind::StringLiteral
            | NodeKind::TemplateLiteral
            | NodeKind::NumberLiteral
            | NodeKind::BooleanLiteral
            | NodeKind::NullLiteral
            | NodeKind::RegexLiteral
            | NodeKind::BinaryExpression
            | NodeKind::ParenthesizedExpression
            | NodeKind::ArrowFunction
            | NodeKind::FunctionExpression
            | NodeKind::FunctionDeclaration
            | NodeKind::VariableDeclaration
            | NodeKind::VariableDeclarator
            | NodeKind::ImportDeclaration
            | NodeKind::ExportDeclaration
            | NodeKind::JsxElement
            | NodeKind::Comment
            | NodeKind::Other(_) => return false,
        };
        target == *self
    }
}

impl fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTarget::Call => write!(f, "CallExpression"),
            RuleTarget::New => write!(f, "NewExpression"),
            RuleTarget::Import => write!(f, "ImportExpression"),
        }
    }
}

/// Which detector implementation evaluates the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Eval,
    FunctionConstructor,
    DynamicImport,
    TimerString,
    ShellExecution,
}

impl DetectorKind {
    pub fn target(&self) -> RuleTarget {
        match self {
            DetectorKind::Eval | DetectorKind::TimerString | DetectorKind::ShellExecution => {
                RuleTarget::Call
            }
            DetectorKind::FunctionConstructor => RuleTarget::New,
            DetectorKind::DynamicImport => RuleTarget::Import,
        }
    }

    /// `import(...)` has no callee name to match.
    pub fn needs_callees(&self) -> bool {
        !matches!(self, DetectorKind::DynamicImport)
    }
}

/// A structural detection rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Unique identifier for this rule.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Specific pattern name reported on findings, e.g. `eval_usage`.
    pub subcategory: String,
    pub category: FindingCategory,
    pub severity: Severity,
    pub detector: DetectorKind,
    /// Exact callee names that trigger the rule.
    #[serde(default)]
    pub callees: Vec<String>,
    /// Objects through which a member call still counts (`child_process.exec`).
    #[serde(default)]
    pub receivers: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl PatternRule {
    pub fn target(&self) -> RuleTarget {
        self.detector.target()
    }

    /// Whether a resolved callee satisfies this rule's name predicate.
    pub fn matches_callee(&self, name: &str, receiver: Option<&str>) -> bool {
        if !self.callees.iter().any(|c| c == name) {
            return false;
        }
        match receiver {
            None => true,
            Some(r) => self.receivers.iter().any(|allowed| allowed == r),
        }
    }

    fn validate(&self) -> Result<(), RuleLoadError> {
        let invalid = |reason: &str| RuleLoadError::Invalid {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if self.subcategory.trim().is_empty() {
            return Err(invalid("empty subcategory"));
        }
        if self.detector.needs_callees() && self.callees.is_empty() {
            return Err(invalid("no callee names"));
        }
        Ok(())
    }
}

/// The rule table handed to the analyzer.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<PatternRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        Self {
            rules: patterns::builtin_rules(),
        }
    }

    /// Validate and wrap a custom table. Ids must be unique.
    pub fn from_rules(rules: Vec<PatternRule>) -> Result<Self, RuleLoadError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.id.clone()) {
                return Err(RuleLoadError::Invalid {
                    id: rule.id.clone(),
                    reason: "duplicate id".to_string(),
                });
            }
        }
        Ok(Self { rules })
    }

    /// Add a custom rule.
    pub fn add_rule(&mut self, rule: PatternRule) -> Result<(), RuleLoadError> {
        rule.validate()?;
        if self.rules.iter().any(|r| r.id == rule.id) {
            return Err(RuleLoadError::Invalid {
                id: rule.id,
                reason: "duplicate id".to_string(),
            });
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Get all rules.
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn enabled(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter().filter(|r| r.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_rule() -> PatternRule {
        PatternRule {
            id: "test-001".to_string(),
            title: "Test Rule".to_string(),
            subcategory: "shell_execution".to_string(),
            category: FindingCategory::ShellExecution,
            severity: Severity::Critical,
            detector: DetectorKind::ShellExecution,
            callees: vec!["exec".to_string()],
            receivers: vec!["child_process".to_string()],
            enabled: true,
        }
    }

    #[test]
    fn test_callee_predicate() {
        let rule = shell_rule();
        assert!(rule.matches_callee("exec", None));
        assert!(rule.matches_callee("exec", Some("child_process")));
        assert!(!rule.matches_callee("exec", Some("regex")));
        assert!(!rule.matches_callee("execute", None));
    }

    #[test]
    fn test_target_matching() {
        assert!(RuleTarget::Call.matches(&NodeKind::CallExpression));
        assert!(!RuleTarget::Call.matches(&NodeKind::NewExpression));
        assert!(RuleTarget::Import.matches(&NodeKind::ImportExpression));
        assert!(!RuleTarget::New.matches(&NodeKind::Other("new")));
    }

    #[test]
    fn test_from_rules_rejects_duplicates_and_empty_callees() {
        assert!(RuleSet::from_rules(vec![shell_rule(), shell_rule()]).is_err());

        let mut rule = shell_rule();
        rule.callees.clear();
        assert!(RuleSet::from_rules(vec![rule]).is_err());

        let mut set = RuleSet::new();
        set.add_rule(shell_rule()).unwrap();
        assert!(set.add_rule(shell_rule()).is_err());
        assert_eq!(set.rules().len(), 1);
    }

    #[test]
    fn test_disabled_rules_are_filtered() {
        let mut rule = shell_rule();
        rule.enabled = false;
        let set = RuleSet::from_rules(vec![rule]).unwrap();
        assert_eq!(set.enabled().count(), 0);
    }
}
