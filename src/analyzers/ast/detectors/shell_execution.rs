//! Detector for child process spawning.
//!
//! Detects patterns like:
//! - `exec(cmd)` after destructuring from `child_process`
//! - `child_process.execSync('ls')`
//! - `require('child_process').spawn(bin, args)`

use super::{call_parts, matched_callee, rule_finding, Detector, FileContext};
use crate::analyzers::ast::dynamism::classify_argument;
use crate::analyzers::ast::node::{NodeId, SyntaxTree};
use crate::error::DetectorError;
use crate::rules::PatternRule;
use crate::types::Finding;

pub struct ShellExecutionDetector {
    rule: PatternRule,
}

impl ShellExecutionDetector {
    pub fn new(rule: PatternRule) -> Self {
        Self { rule }
    }
}

impl Detector for ShellExecutionDetector {
    fn rule(&self) -> &PatternRule {
        &self.rule
    }

    fn analyze(
        &self,
        id: NodeId,
        tree: &SyntaxTree,
        ctx: &FileContext<'_>,
    ) -> Result<Option<Finding>, DetectorError> {
        let node = tree.node(id)?;
        let (callee, arguments) = call_parts(&self.rule, id, node)?;

        let callee = match matched_callee(&self.rule, tree, callee) {
            Some(c) => c,
            None => return Ok(None),
        };

        let class = classify_argument(tree, arguments.first().copied());
        let description = if class.is_dynamic() {
            format!(
                "{}() runs a command built from a {} argument.",
                callee.name, class.argument_type
            )
        } else {
            format!("{}() runs a fixed system command.", callee.name)
        };

        let mut finding = rule_finding(&self.rule, node, ctx, description)
            .with_detail("function", callee.name)
            .with_detail("isDynamic", class.is_dynamic())
            .with_detail("riskLevel", class.risk());
        if let Some(receiver) = callee.receiver {
            finding = finding.with_detail("receiver", receiver);
        }
        Ok(Some(finding))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::scan_for;
    use crate::types::{Severity, Value};

    #[test]
    fn test_each_function_reported_once() {
        for name in ["exec", "spawn", "execSync", "spawnSync"] {
            let source = format!("{name}(cmd);");
            let findings = scan_for(&source, "shell_execution");
            assert_eq!(findings.len(), 1, "{source}");
            assert_eq!(findings[0].severity, Severity::Critical);
            assert_eq!(
                findings[0].detail("function").and_then(Value::as_str),
                Some(name)
            );
            assert_eq!(findings[0].detail("receiver"), None, "{source}");
        }
    }

    #[test]
    fn test_module_receivers() {
        let source = "const cp = require('child_process');\n\
                      cp.execSync('ls');\n\
                      require('child_process').spawn(bin, args);\n\
                      child_process.exec(`rm -rf ${dir}`);";
        let findings = scan_for(source, "shell_execution");
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].line, Some(2));
        assert_eq!(findings[0].detail("isDynamic"), Some(&Value::Bool(false)));
        assert_eq!(
            findings[1].detail("receiver").and_then(Value::as_str),
            Some("child_process")
        );
        assert_eq!(findings[2].detail("riskLevel").and_then(Value::as_str), Some("high"));
    }

    #[test]
    fn test_regex_exec_ignored() {
        let source = "const m = /a+/.exec(s);\nconst r = pattern.exec(s);\nthis.db.exec(sql);";
        assert!(scan_for(source, "shell_execution").is_empty());
    }
}
