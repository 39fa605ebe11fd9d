//! Flattened syntax tree: an arena of nodes in depth-first pre-order.
//!
//! Parent/child links and payload references are indices into the arena, so
//! scanners can jump from a call to its callee or arguments without walking.

use crate::error::DetectorError;

/// Index of a node in its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Line is 1-based, column is a 0-based byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// Node kinds the scanners care about. Everything else keeps its raw grammar name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,
    CallExpression,
    NewExpression,
    ImportExpression,
    MemberExpression,
    Identifier,
    StringLiteral,
    TemplateLiteral,
    NumberLiteral,
    BooleanLiteral,
    NullLiteral,
    RegexLiteral,
    BinaryExpression,
    ParenthesizedExpression,
    ArrowFunction,
    FunctionExpression,
    FunctionDeclaration,
    VariableDeclaration,
    VariableDeclarator,
    ImportDeclaration,
    ExportDeclaration,
    JsxElement,
    Comment,
    Other(&'static str),
}

impl NodeKind {
    /// Map a tree-sitter node kind. Dynamic `import(...)` is decided by the builder.
    pub fn from_grammar(kind: &'static str) -> Self {
        match kind {
            "program" => NodeKind::Program,
            "call_expression" => NodeKind::CallExpression,
            "new_expression" => NodeKind::NewExpression,
            "member_expression" | "subscript_expression" => NodeKind::MemberExpression,
            "identifier" => NodeKind::Identifier,
            "string" => NodeKind::StringLiteral,
            "template_string" => NodeKind::TemplateLiteral,
            "number" => NodeKind::NumberLiteral,
            "true" | "false" => NodeKind::BooleanLiteral,
            "null" => NodeKind::NullLiteral,
            "regex" => NodeKind::RegexLiteral,
            "binary_expression" => NodeKind::BinaryExpression,
            "parenthesized_expression" => NodeKind::ParenthesizedExpression,
            "arrow_function" => NodeKind::ArrowFunction,
            "function_expression" | "function" | "generator_function" => {
                NodeKind::FunctionExpression
            }
            "function_declaration" | "generator_function_declaration" => {
                NodeKind::FunctionDeclaration
            }
            "variable_declaration" | "lexical_declaration" => NodeKind::VariableDeclaration,
            "variable_declarator" => NodeKind::VariableDeclarator,
            "import_statement" => NodeKind::ImportDeclaration,
            "export_statement" => NodeKind::ExportDeclaration,
            "jsx_element" | "jsx_self_closing_element" => NodeKind::JsxElement,
            "comment" | "html_comment" => NodeKind::Comment,
            other => NodeKind::Other(other),
        }
    }

    /// ESTree-style type tag, or the raw grammar name for `Other`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Program => "Program",
            NodeKind::CallExpression => "CallExpression",
            NodeKind::NewExpression => "NewExpression",
            NodeKind::ImportExpression => "ImportExpression",
            NodeKind::MemberExpression => "MemberExpression",
            NodeKind::Identifier => "Identifier",
            NodeKind::StringLiteral => "StringLiteral",
            NodeKind::TemplateLiteral => "TemplateLiteral",
            NodeKind::NumberLiteral => "NumericLiteral",
            NodeKind::BooleanLiteral => "BooleanLiteral",
            NodeKind::NullLiteral => "NullLiteral",
            NodeKind::RegexLiteral => "RegExpLiteral",
            NodeKind::BinaryExpression => "BinaryExpression",
            NodeKind::ParenthesizedExpression => "ParenthesizedExpression",
            NodeKind::ArrowFunction => "ArrowFunctionExpression",
            NodeKind::FunctionExpression => "FunctionExpression",
            NodeKind::FunctionDeclaration => "FunctionDeclaration",
            NodeKind::VariableDeclaration => "VariableDeclaration",
            NodeKind::VariableDeclarator => "VariableDeclarator",
            NodeKind::ImportDeclaration => "ImportDeclaration",
            NodeKind::ExportDeclaration => "ExportDeclaration",
            NodeKind::JsxElement => "JSXElement",
            NodeKind::Comment => "Comment",
            NodeKind::Other(kind) => *kind,
        }
    }
}

/// Kind-specific references into the arena.
#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    None,
    /// Call and `new` expressions.
    Call {
        callee: Option<NodeId>,
        arguments: Vec<NodeId>,
    },
    /// `import(source, options?)`.
    Import {
        source: Option<NodeId>,
        arguments: Vec<NodeId>,
    },
    Member {
        object: Option<NodeId>,
        property: Option<NodeId>,
        /// `obj.name` or `obj['name']`; `None` for non-literal computed access.
        property_name: Option<String>,
        computed: bool,
    },
    Identifier {
        name: String,
    },
    String {
        value: String,
    },
    Template {
        substitutions: Vec<NodeId>,
    },
    Binary {
        operator: String,
        left: Option<NodeId>,
        right: Option<NodeId>,
    },
    Parenthesized {
        expression: Option<NodeId>,
    },
    VariableDeclaration {
        /// `var`, `let` or `const`.
        kind: String,
        declarations: Vec<NodeId>,
    },
    VariableDeclarator {
        name: Option<NodeId>,
        init: Option<NodeId>,
    },
    /// Function declarations, function expressions and arrow functions.
    Function {
        name: Option<String>,
        params: Vec<NodeId>,
        body: Option<NodeId>,
    },
    ImportDeclaration {
        source: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub span: Option<Span>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub payload: NodePayload,
}

impl SyntaxNode {
    pub fn line(&self) -> Option<usize> {
        self.span.map(|s| s.start.line)
    }
}

/// Name of a called function, plus the object it was reached through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalleeName<'t> {
    pub name: &'t str,
    /// `child_process` in `child_process.exec(...)`, `require('x')` resolves to `x`.
    pub receiver: Option<&'t str>,
    /// Reached through a member access, even when the receiver is unresolved.
    pub member: bool,
}

/// A parsed file as a flat, pre-ordered node arena.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    pub(crate) fn from_nodes(nodes: Vec<SyntaxNode>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&SyntaxNode> {
        self.nodes.get(id.0)
    }

    /// Like [`get`](Self::get) but as a detector error.
    pub fn node(&self, id: NodeId) -> Result<&SyntaxNode, DetectorError> {
        self.get(id).ok_or(DetectorError::DanglingNode(id.0))
    }

    /// Nodes in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SyntaxNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn kinds(&self) -> impl Iterator<Item = NodeKind> + '_ {
        self.nodes.iter().map(|n| n.kind)
    }

    pub fn identifier_name(&self, id: NodeId) -> Option<&str> {
        match &self.get(id)?.payload {
            NodePayload::Identifier { name } => Some(name),
            _ => None,
        }
    }

    pub fn string_value(&self, id: NodeId) -> Option<&str> {
        match &self.get(id)?.payload {
            NodePayload::String { value } => Some(value),
            _ => None,
        }
    }

    /// Resolve the callee of a call or `new` expression.
    pub fn callee_name(&self, callee: NodeId) -> Option<CalleeName<'_>> {
        let node = self.get(callee)?;
        match &node.payload {
            NodePayload::Identifier { name } => Some(CalleeName {
                name,
                receiver: None,
                member: false,
            }),
            NodePayload::Member {
                object,
                property_name: Some(name),
                ..
            } => Some(CalleeName {
                name,
                receiver: object.and_then(|o| self.receiver_name(o)),
                member: true,
            }),
            NodePayload::Parenthesized {
                expression: Some(inner),
            } => self.callee_name(*inner),
            _ => None,
        }
    }

    fn receiver_name(&self, object: NodeId) -> Option<&str> {
        let node = self.get(object)?;
        match (&node.kind, &node.payload) {
            (_, NodePayload::Identifier { name }) => Some(name),
            (NodeKind::Other("this"), _) => Some("this"),
            (
                NodeKind::CallExpression,
                NodePayload::Call {
                    callee: Some(callee),
                    arguments,
                },
            ) if self.identifier_name(*callee) == Some("require") => {
                arguments.first().and_then(|a| self.string_value(*a))
            }
            _ => None,
        }
    }
}
