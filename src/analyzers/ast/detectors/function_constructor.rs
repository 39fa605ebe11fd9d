//! Detector for the `Function` constructor.
//!
//! Detects patterns like:
//! - `new Function("return 1")` - static body
//! - `new Function("a", body)` - body built at runtime

use super::{call_parts, matched_callee, rule_finding, Detector, FileContext};
use crate::analyzers::ast::dynamism::{classify_argument, ArgumentClass, Dynamism};
use crate::analyzers::ast::node::{NodeId, SyntaxTree};
use crate::error::DetectorError;
use crate::rules::PatternRule;
use crate::types::Finding;

pub struct FunctionConstructorDetector {
    rule: PatternRule,
}

impl FunctionConstructorDetector {
    pub fn new(rule: PatternRule) -> Self {
        Self { rule }
    }

    /// Every argument is code (parameter names and body), so one dynamic
    /// argument makes the whole construction dynamic.
    fn classify_all(tree: &SyntaxTree, arguments: &[NodeId]) -> ArgumentClass {
        let classes: Vec<ArgumentClass> = arguments
            .iter()
            .map(|a| classify_argument(tree, Some(*a)))
            .collect();
        classes
            .iter()
            .find(|c| c.is_dynamic())
            .or_else(|| classes.last())
            .copied()
            .unwrap_or_else(|| classify_argument(tree, None))
    }
}

impl Detector for FunctionConstructorDetector {
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

        if matched_callee(&self.rule, tree, callee).is_none() {
            return Ok(None);
        }

        let class = Self::classify_all(tree, arguments);
        let (injection_risk, description) = match (class.dynamism, arguments.is_empty()) {
            (Dynamism::Dynamic, _) => (
                "variable_based_code",
                format!(
                    "Function constructor builds code from a {} argument. The function body is \
                    decided at runtime.",
                    class.argument_type
                ),
            ),
            (Dynamism::Static, false) => (
                "static_string",
                "Function constructor compiles a fixed string into code at runtime.".to_string(),
            ),
            (Dynamism::Static, true) => (
                "no_arguments",
                "Function constructor called without a body.".to_string(),
            ),
        };

        Ok(Some(
            rule_finding(&self.rule, node, ctx, description)
                .with_detail("injectionRisk", injection_risk)
                .with_detail("isDynamic", class.is_dynamic())
                .with_detail("riskLevel", class.risk())
                .with_detail("argumentCount", arguments.len()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::scan_for;
    use crate::types::{Severity, Value};

    fn injection_risk(source: &str) -> String {
        let findings = scan_for(source, "function_constructor");
        assert_eq!(findings.len(), 1, "{source}");
        assert_eq!(findings[0].severity, Severity::Warning);
        findings[0]
            .detail("injectionRisk")
            .and_then(Value::as_str)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_static_body() {
        assert_eq!(injection_risk("new Function(\"return 1\");"), "static_string");
        assert_eq!(injection_risk("new Function('a', 'b', 'return a + b');"), "static_string");
    }

    #[test]
    fn test_variable_body() {
        assert_eq!(injection_risk("new Function(body);"), "variable_based_code");
        assert_eq!(injection_risk("new Function('a', body);"), "variable_based_code");
        assert_eq!(injection_risk("new Function(`return ${x}`);"), "variable_based_code");
    }

    #[test]
    fn test_no_arguments() {
        let findings = scan_for("const f = new Function();", "function_constructor");
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].detail("argumentCount").and_then(Value::as_f64),
            Some(0.0)
        );
    }

    #[test]
    fn test_other_constructors_ignored() {
        assert!(scan_for("new Map(); new Date(x);", "function_constructor").is_empty());
        // Calling Function without `new` is a different node shape.
        assert!(scan_for("Function('return 1');", "function_constructor").is_empty());
    }
}
