//! Detector for string-based timers.
//!
//! `setTimeout("code", 100)` and `setInterval("code", 100)` evaluate their
//! first argument as code. Function callbacks are not reported.

use super::{call_parts, matched_callee, rule_finding, Detector, FileContext};
use crate::analyzers::ast::dynamism::is_literal_string;
use crate::analyzers::ast::node::{NodeId, SyntaxTree};
use crate::error::DetectorError;
use crate::rules::PatternRule;
use crate::types::{Finding, RiskLevel};

pub struct TimerStringDetector {
    rule: PatternRule,
}

impl TimerStringDetector {
    pub fn new(rule: PatternRule) -> Self {
        Self { rule }
    }
}

impl Detector for TimerStringDetector {
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
        if !is_literal_string(tree, arguments.first().copied()) {
            return Ok(None);
        }

        let description = format!(
            "{}() is given a string, which is evaluated as code when the timer fires.",
            callee.name
        );

        Ok(Some(
            rule_finding(&self.rule, node, ctx, description)
                .with_detail("function", callee.name)
                .with_detail("riskLevel", RiskLevel::Medium),
        ))
    }
}
