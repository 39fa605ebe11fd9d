//! Static/dynamic classification of call arguments.
//!
//! A heuristic on the argument's node kind only, one level deep. It says
//! nothing about whether a dynamic value is attacker-controlled.

use super::node::{NodeId, NodeKind, NodePayload, SyntaxTree};
use crate::types::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dynamism {
    Static,
    Dynamic,
}

/// Classification of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentClass {
    pub dynamism: Dynamism,
    /// Type tag of the argument node, `"none"` when absent.
    pub argument_type: &'static str,
}

impl ArgumentClass {
    pub fn is_dynamic(&self) -> bool {
        self.dynamism == Dynamism::Dynamic
    }

    pub fn risk(&self) -> RiskLevel {
        match self.dynamism {
            Dynamism::Static => RiskLevel::Medium,
            Dynamism::Dynamic => RiskLevel::High,
        }
    }
}

/// Classify an argument. A missing argument is static.
pub fn classify_argument(tree: &SyntaxTree, argument: Option<NodeId>) -> ArgumentClass {
    let node = match argument.and_then(|id| tree.get(id)) {
        Some(node) => node,
        None => {
            return ArgumentClass {
                dynamism: Dynamism::Static,
                argument_type: "none",
            }
        }
    };

    let dynamism = match node.kind {
        NodeKind::StringLiteral
        | NodeKind::NumberLiteral
        | NodeKind::BooleanLiteral
        | NodeKind::NullLiteral
        | NodeKind::RegexLiteral => Dynamism::Static,
        NodeKind::TemplateLiteral => match &node.payload {
            NodePayload::Template { substitutions } if substitutions.is_empty() => Dynamism::Static,
            _ => Dynamism::Dynamic,
        },
        // `("code")` is still a literal.
        NodeKind::ParenthesizedExpression => match &node.payload {
            NodePayload::Parenthesized { expression } => {
                return ArgumentClass {
                    argument_type: node.kind.as_str(),
                    ..classify_argument(tree, *expression)
                };
            }
            _ => Dynamism::Dynamic,
        },
        NodeKind::Identifier
        | NodeKind::BinaryExpression
        | NodeKind::CallExpression
        | NodeKind::NewExpression
        | NodeKind::ImportExpression
        | NodeKind::MemberExpression => Dynamism::Dynamic,
        // Anything else is derived from some other expression.
        NodeKind::Program
        | NodeKind::ArrowFunction
        | NodeKind::FunctionExpression
        | NodeKind::FunctionDeclaration
        | NodeKind::VariableDeclaration
        | NodeKind::VariableDeclarator
        | NodeKind::ImportDeclaration
        | NodeKind::ExportDeclaration
        | NodeKind::JsxElement
        | NodeKind::Comment
        | NodeKind::Other(_) => Dynamism::Dynamic,
    };

    ArgumentClass {
        dynamism,
        argument_type: node.kind.as_str(),
    }
}

/// True for a plain string: a string literal or a template without substitutions,
/// possibly wrapped in parentheses.
pub fn is_literal_string(tree: &SyntaxTree, argument: Option<NodeId>) -> bool {
    let node = match argument.and_then(|id| tree.get(id)) {
        Some(node) => node,
        None => return false,
    };
    match (&node.kind, &node.payload) {
        (NodeKind::StringLiteral, _) => true,
        (NodeKind::TemplateLiteral, NodePayload::Template { substitutions }) => {
            substitutions.is_empty()
        }
        (NodeKind::ParenthesizedExpression, NodePayload::Parenthesized { expression }) => {
            is_literal_string(tree, *expression)
        }
        _ => false,
    }
}
