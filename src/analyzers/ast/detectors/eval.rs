//! Detector for `eval(...)` calls.
//!
//! Detects patterns like:
//! - `eval("alert(1)")` - static string, medium risk
//! - `eval(userInput)` - dynamic argument, high risk
//! - `window['eval'](code)` - reached through a global object

use super::{call_parts, matched_callee, rule_finding, Detector, FileContext};
use crate::analyzers::ast::dynamism::classify_argument;
use crate::analyzers::ast::node::{NodeId, SyntaxTree};
use crate::error::DetectorError;
use crate::rules::PatternRule;
use crate::types::Finding;

pub struct EvalDetector {
    rule: PatternRule,
}

impl EvalDetector {
    pub fn new(rule: PatternRule) -> Self {
        Self { rule }
    }
}

impl Detector for EvalDetector {
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
                "{}() evaluates a dynamic {} argument. The executed code is decided at runtime \
                and may be attacker-controlled.",
                callee.name, class.argument_type
            )
        } else {
            format!(
                "{}() evaluates a fixed string. The code is static but still executed dynamically, \
                which hides it from review and tooling.",
                callee.name
            )
        };

        Ok(Some(
            rule_finding(&self.rule, node, ctx, description)
                .with_detail("isDynamic", class.is_dynamic())
                .with_detail("riskLevel", class.risk())
                .with_detail("argumentType", class.argument_type),
        ))
    }
}
