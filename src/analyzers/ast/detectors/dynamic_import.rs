//! Detector for dynamic `import(...)` expressions.

use super::{rule_finding, Detector, FileContext};
use crate::analyzers::ast::dynamism::classify_argument;
use crate::analyzers::ast::node::{NodeId, NodePayload, SyntaxTree};
use crate::error::DetectorError;
use crate::rules::PatternRule;
use crate::types::Finding;

pub struct DynamicImportDetector {
    rule: PatternRule,
}

impl DynamicImportDetector {
    pub fn new(rule: PatternRule) -> Self {
        Self { rule }
    }
}

impl Detector for DynamicImportDetector {
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
        let source = match &node.payload {
            NodePayload::Import { source, .. } => *source,
            _ => {
                return Err(DetectorError::UnexpectedShape {
                    rule: self.rule.id.clone(),
                    expected: "import payload",
                    node: id.index(),
                })
            }
        };

        let class = classify_argument(tree, source);
        let specifier = source.and_then(|s| tree.string_value(s));

        let description = match specifier {
            Some(module) if !class.is_dynamic() => {
                format!("Module '{}' is loaded at runtime via import().", module)
            }
            _ => format!(
                "import() loads a module from a {} specifier. Which code runs is decided at runtime.",
                class.argument_type
            ),
        };

        Ok(Some(
            rule_finding(&self.rule, node, ctx, description)
                .with_detail("isDynamic", class.is_dynamic())
                .with_detail("riskLevel", class.risk())
                .with_detail("specifier", specifier),
        ))
    }
}
