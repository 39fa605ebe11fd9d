//! Syntax-tree builder: tree-sitter parse, then flatten into a [`SyntaxTree`].

use super::config::{EcmaVersion, ParserConfig, SourceType};
use super::node::{NodeId, NodeKind, NodePayload, Position, Span, SyntaxNode, SyntaxTree};
use crate::error::ParseError;
use crate::reader::{Content, ContentUnit};
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Language, Node, Parser, Tree};

/// Grammar dialect, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
}

impl Dialect {
    pub fn from_path(path: &Path, jsx_enabled: bool) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let dialect = match ext.as_str() {
            "ts" | "mts" | "cts" => Dialect::TypeScript,
            "tsx" => Dialect::Tsx,
            "js" | "mjs" | "cjs" => Dialect::JavaScript,
            "jsx" => Dialect::Jsx,
            _ => return None,
        };
        if dialect.is_jsx() && !jsx_enabled {
            return None;
        }
        Some(dialect)
    }

    pub fn is_jsx(&self) -> bool {
        matches!(self, Dialect::Tsx | Dialect::Jsx)
    }

    fn language(&self) -> Language {
        match self {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            // The JavaScript grammar parses JSX natively.
            Dialect::JavaScript | Dialect::Jsx => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

/// Builds flattened syntax trees.
///
/// Holds only configuration; a fresh `Parser` is created per call since
/// tree-sitter parsers are `!Send`. The builder itself is `Send + Sync`.
#[derive(Debug, Clone, Default)]
pub struct SyntaxTreeBuilder {
    config: ParserConfig,
}

impl SyntaxTreeBuilder {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Build from a content unit. Raw (non-UTF-8) content is rejected as non-text.
    pub fn build_unit(&self, unit: &ContentUnit) -> Result<SyntaxTree, ParseError> {
        let path = unit.record.relative_path.as_path();
        match &unit.content {
            Content::Text(text) => self.build(text, path),
            Content::Bytes(_) => {
                self.dialect_for(path)?;
                Err(ParseError::InvalidContent {
                    path: path.display().to_string(),
                    reason: "content is not valid UTF-8 text".to_string(),
                })
            }
        }
    }

    /// Parse `source`. `path` only selects the grammar dialect.
    pub fn build(&self, source: &str, path: &Path) -> Result<SyntaxTree, ParseError> {
        let dialect = self.dialect_for(path)?;
        let display = path.display().to_string();

        if source.is_empty() {
            return Err(ParseError::InvalidContent {
                path: display,
                reason: "empty content".to_string(),
            });
        }
        if source.contains('\0') {
            return Err(ParseError::InvalidContent {
                path: display,
                reason: "content contains NUL bytes (binary data)".to_string(),
            });
        }

        let tree = self.parse(dialect, source, &display)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(syntax_error(root, source, display));
        }

        Flattener::new(&self.config, source, &display).flatten(root)
    }

    fn dialect_for(&self, path: &Path) -> Result<Dialect, ParseError> {
        Dialect::from_path(path, self.config.jsx).ok_or_else(|| ParseError::UnsupportedFileType {
            path: path.display().to_string(),
        })
    }

    fn parse(&self, dialect: Dialect, source: &str, display: &str) -> Result<Tree, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&dialect.language())
            .map_err(|e| ParseError::Language(e.to_string()))?;
        if self.config.timeout_micros > 0 {
            parser.set_timeout_micros(self.config.timeout_micros);
        }
        parser.parse(source, None).ok_or_else(|| ParseError::Aborted {
            path: display.to_string(),
        })
    }
}

/// Locate the first ERROR or MISSING node.
fn syntax_error(root: Node, source: &str, path: String) -> ParseError {
    let culprit = preorder(root)
        .into_iter()
        .find(|n| n.is_error() || n.is_missing())
        .unwrap_or(root);
    let position = culprit.start_position();

    let message = if culprit.is_missing() {
        format!("missing `{}`", culprit.kind())
    } else {
        let text = culprit.utf8_text(source.as_bytes()).unwrap_or("");
        let snippet: String = text.chars().take(30).collect();
        if snippet.trim().is_empty() {
            "unexpected input".to_string()
        } else {
            format!("unexpected `{}`", snippet.trim())
        }
    };

    ParseError::Syntax {
        path,
        line: position.row + 1,
        column: position.column,
        message,
    }
}

/// All nodes (named and anonymous) in depth-first pre-order, without recursion.
fn preorder(root: Node) -> Vec<Node> {
    let mut out = Vec::new();
    let mut cursor = root.walk();
    loop {
        out.push(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return out;
            }
        }
    }
}

/// Minimum language version for syntax introduced after ES5.
fn required_version(node: Node, source: &str) -> Option<(&'static str, EcmaVersion)> {
    match node.kind() {
        "arrow_function" => Some(("Arrow function", EcmaVersion::Es2015)),
        "template_string" => Some(("Template literal", EcmaVersion::Es2015)),
        "class_declaration" | "class" => Some(("Class", EcmaVersion::Es2015)),
        "lexical_declaration" => Some(("let/const declaration", EcmaVersion::Es2015)),
        "await_expression" => Some(("await expression", EcmaVersion::Es2017)),
        "optional_chain" => Some(("Optional chaining", EcmaVersion::Es2020)),
        "field_definition" | "public_field_definition" => {
            Some(("Class field", EcmaVersion::Es2022))
        }
        "call_expression" if is_dynamic_import(node) => {
            Some(("Dynamic import", EcmaVersion::Es2020))
        }
        "binary_expression" => {
            let op = node.child_by_field_name("operator")?;
            (op.utf8_text(source.as_bytes()).ok()? == "??")
                .then_some(("Nullish coalescing", EcmaVersion::Es2020))
        }
        _ => None,
    }
}

fn is_dynamic_import(node: Node) -> bool {
    node.child_by_field_name("function")
        .is_some_and(|f| f.kind() == "import")
}

fn unquote(text: &str) -> String {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(a), Some(b)) if a == b && matches!(a, '"' | '\'' | '`') => chars.as_str().to_string(),
        _ => text.to_string(),
    }
}

/// Second pass: turn tree-sitter nodes into arena nodes with index references.
struct Flattener<'a> {
    config: &'a ParserConfig,
    source: &'a str,
    path: &'a str,
    index: HashMap<usize, NodeId>,
}

impl<'a> Flattener<'a> {
    fn new(config: &'a ParserConfig, source: &'a str, path: &'a str) -> Self {
        Self {
            config,
            source,
            path,
            index: HashMap::new(),
        }
    }

    fn flatten(mut self, root: Node) -> Result<SyntaxTree, ParseError> {
        let named: Vec<Node> = preorder(root).into_iter().filter(|n| n.is_named()).collect();
        for (i, node) in named.iter().enumerate() {
            self.index.insert(node.id(), NodeId(i));
        }

        let mut nodes: Vec<SyntaxNode> = Vec::with_capacity(named.len());
        for (i, node) in named.iter().enumerate() {
            self.check_syntax_level(*node)?;

            let parent = self.named_parent(*node);
            if let Some(p) = parent {
                nodes[p.0].children.push(NodeId(i));
            }

            let kind = if node.kind() == "call_expression" && is_dynamic_import(*node) {
                NodeKind::ImportExpression
            } else {
                NodeKind::from_grammar(node.kind())
            };

            nodes.push(SyntaxNode {
                kind,
                span: Some(span_of(*node)),
                parent,
                children: Vec::new(),
                payload: self.payload(kind, *node),
            });
        }

        Ok(SyntaxTree::from_nodes(nodes))
    }

    fn check_syntax_level(&self, node: Node) -> Result<(), ParseError> {
        if self.config.source_type == SourceType::Script
            && matches!(node.kind(), "import_statement" | "export_statement")
            && node.parent().is_some_and(|p| p.kind() == "program")
        {
            return Err(ParseError::ModuleSyntaxInScript {
                path: self.path.to_string(),
                line: node.start_position().row + 1,
            });
        }

        if let Some((feature, required)) = required_version(node, self.source) {
            if required > self.config.ecma_version {
                return Err(ParseError::UnsupportedSyntax {
                    path: self.path.to_string(),
                    feature,
                    required,
                    ceiling: self.config.ecma_version,
                    line: node.start_position().row + 1,
                });
            }
        }
        Ok(())
    }

    fn named_parent(&self, node: Node) -> Option<NodeId> {
        let mut current = node.parent();
        while let Some(p) = current {
            if let Some(id) = self.index.get(&p.id()) {
                return Some(*id);
            }
            current = p.parent();
        }
        None
    }

    fn id(&self, node: Option<Node>) -> Option<NodeId> {
        node.and_then(|n| self.index.get(&n.id()).copied())
    }

    fn field(&self, node: Node, name: &str) -> Option<NodeId> {
        self.id(node.child_by_field_name(name))
    }

    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Named, non-comment children.
    fn operands(&self, node: Node) -> Vec<NodeId> {
        let mut cursor = node.walk();
        let children: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|c| !matches!(c.kind(), "comment" | "html_comment"))
            .collect();
        children.into_iter().filter_map(|c| self.id(Some(c))).collect()
    }

    fn arguments(&self, node: Node) -> Vec<NodeId> {
        match node.child_by_field_name("arguments") {
            Some(args) if args.kind() == "arguments" => self.operands(args),
            // Tagged template: the template itself is the argument.
            Some(other) => self.id(Some(other)).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn payload(&self, kind: NodeKind, node: Node) -> NodePayload {
        match kind {
            NodeKind::CallExpression => NodePayload::Call {
                callee: self.field(node, "function"),
                arguments: self.arguments(node),
            },
            NodeKind::NewExpression => NodePayload::Call {
                callee: self.field(node, "constructor"),
                arguments: self.arguments(node),
            },
            NodeKind::ImportExpression => {
                let arguments = self.arguments(node);
                NodePayload::Import {
                    source: arguments.first().copied(),
                    arguments,
                }
            }
            NodeKind::MemberExpression => {
                if node.kind() == "subscript_expression" {
                    let index = node.child_by_field_name("index");
                    let property_name = index
                        .filter(|i| i.kind() == "string")
                        .map(|i| unquote(self.text(i)));
                    NodePayload::Member {
                        object: self.field(node, "object"),
                        property: self.id(index),
                        property_name,
                        computed: true,
                    }
                } else {
                    let property = node.child_by_field_name("property");
                    NodePayload::Member {
                        object: self.field(node, "object"),
                        property: self.id(property),
                        property_name: property.map(|p| self.text(p).to_string()),
                        computed: false,
                    }
                }
            }
            NodeKind::Identifier => NodePayload::Identifier {
                name: self.text(node).to_string(),
            },
            NodeKind::StringLiteral => NodePayload::String {
                value: unquote(self.text(node)),
            },
            NodeKind::TemplateLiteral => {
                let mut cursor = node.walk();
                let substitutions: Vec<Node> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "template_substitution")
                    .collect();
                NodePayload::Template {
                    substitutions: substitutions
                        .into_iter()
                        .filter_map(|c| self.id(Some(c)))
                        .collect(),
                }
            }
            NodeKind::BinaryExpression => NodePayload::Binary {
                operator: node
                    .child_by_field_name("operator")
                    .map(|op| self.text(op).to_string())
                    .unwrap_or_default(),
                left: self.field(node, "left"),
                right: self.field(node, "right"),
            },
            NodeKind::ParenthesizedExpression => NodePayload::Parenthesized {
                expression: self.operands(node).into_iter().next(),
            },
            NodeKind::VariableDeclaration => {
                let mut cursor = node.walk();
                let declarators: Vec<Node> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "variable_declarator")
                    .collect();
                NodePayload::VariableDeclaration {
                    kind: node
                        .child(0)
                        .map(|k| self.text(k).to_string())
                        .unwrap_or_default(),
                    declarations: declarators
                        .into_iter()
                        .filter_map(|c| self.id(Some(c)))
                        .collect(),
                }
            }
            NodeKind::VariableDeclarator => NodePayload::VariableDeclarator {
                name: self.field(node, "name"),
                init: self.field(node, "value"),
            },
            NodeKind::ArrowFunction
            | NodeKind::FunctionExpression
            | NodeKind::FunctionDeclaration => {
                let params = match node.child_by_field_name("parameters") {
                    Some(p) => self.operands(p),
                    // `x => ...` has a single bare parameter.
                    None => self.field(node, "parameter").into_iter().collect(),
                };
                NodePayload::Function {
                    name: node
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string()),
                    params,
                    body: self.field(node, "body"),
                }
            }
            NodeKind::ImportDeclaration => NodePayload::ImportDeclaration {
                source: node
                    .child_by_field_name("source")
                    .map(|s| unquote(self.text(s))),
            },
            NodeKind::Program
            | NodeKind::NumberLiteral
            | NodeKind::BooleanLiteral
            | NodeKind::NullLiteral
            | NodeKind::RegexLiteral
            | NodeKind::ExportDeclaration
            | NodeKind::JsxElement
            | NodeKind::Comment
            | NodeKind::Other(_) => NodePayload::None,
        }
    }
}

fn span_of(node: Node) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start: Position {
            line: start.row + 1,
            column: start.column,
        },
        end: Position {
            line: end.row + 1,
            column: end.column,
        },
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(source: &str, file: &str) -> Result<SyntaxTree, ParseError> {
        SyntaxTreeBuilder::default().build(source, Path::new(file))
    }

    fn find(tree: &SyntaxTree, kind: NodeKind) -> Vec<NodeId> {
        tree.iter()
            .filter(|(_, n)| n.kind == kind)
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn test_dialect_selection() {
        assert_eq!(Dialect::from_path(Path::new("a.ts"), true), Some(Dialect::TypeScript));
        assert_eq!(Dialect::from_path(Path::new("a.TSX"), true), Some(Dialect::Tsx));
        assert_eq!(Dialect::from_path(Path::new("a.cjs"), true), Some(Dialect::JavaScript));
        assert_eq!(Dialect::from_path(Path::new("a.jsx"), false), None);
        assert_eq!(Dialect::from_path(Path::new("a.py"), true), None);
        assert_eq!(Dialect::from_path(Path::new("Makefile"), true), None);
    }

    #[test]
    fn test_unsupported_extension_fails_fast() {
        let err = build("", "notes.md").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFileType { .. }));
    }

    #[test]
    fn test_empty_and_binary_content() {
        assert!(matches!(
            build("", "a.ts").unwrap_err(),
            ParseError::InvalidContent { .. }
        ));
        assert!(matches!(
            build("let a\0 = 1;", "a.js").unwrap_err(),
            ParseError::InvalidContent { .. }
        ));
    }

    #[test]
    fn test_malformed_source_is_typed_error() {
        let err = build("function (\n  {{{ ", "bad.ts").unwrap_err();
        match err {
            ParseError::Syntax { path, line, .. } => {
                assert_eq!(path, "bad.ts");
                assert!(line >= 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_call_payload_references_arguments() {
        let tree = build("eval(userInput, 'x');", "a.ts").unwrap();
        assert_eq!(tree.get(NodeId(0)).unwrap().kind, NodeKind::Program);

        let calls = find(&tree, NodeKind::CallExpression);
        assert_eq!(calls.len(), 1);
        let call = tree.get(calls[0]).unwrap();
        assert_eq!(call.line(), Some(1));
        match &call.payload {
            NodePayload::Call { callee, arguments } => {
                let callee = tree.callee_name(callee.unwrap()).unwrap();
                assert_eq!(callee.name, "eval");
                assert_eq!(callee.receiver, None);
                assert_eq!(arguments.len(), 2);
                assert_eq!(tree.get(arguments[0]).unwrap().kind, NodeKind::Identifier);
                assert_eq!(tree.string_value(arguments[1]), Some("x"));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_preorder_and_parent_links() {
        let tree = build("const f = () => `${eval(a)}`;", "a.js").unwrap();
        let kinds: Vec<NodeKind> = tree.kinds().collect();
        let pos = |k: NodeKind| kinds.iter().position(|x| *x == k).unwrap();

        assert!(pos(NodeKind::VariableDeclaration) < pos(NodeKind::ArrowFunction));
        assert!(pos(NodeKind::ArrowFunction) < pos(NodeKind::TemplateLiteral));
        assert!(pos(NodeKind::TemplateLiteral) < pos(NodeKind::CallExpression));

        for (id, node) in tree.iter().skip(1) {
            let parent = node.parent.unwrap();
            assert!(parent < id);
            assert!(tree.get(parent).unwrap().children.contains(&id));
        }

        let template = find(&tree, NodeKind::TemplateLiteral)[0];
        match &tree.get(template).unwrap().payload {
            NodePayload::Template { substitutions } => assert_eq!(substitutions.len(), 1),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_jsx_subtrees_are_visited() {
        let source = "const el = <div onClick={() => eval(code)}>hi</div>;";
        let tree = build(source, "a.jsx").unwrap();
        assert!(!find(&tree, NodeKind::JsxElement).is_empty());
        assert_eq!(find(&tree, NodeKind::CallExpression).len(), 1);

        let tree = build(source.replace("const el", "const el: any").as_str(), "a.tsx").unwrap();
        assert_eq!(find(&tree, NodeKind::CallExpression).len(), 1);
    }

    #[test]
    fn test_dynamic_import_and_declarations() {
        let source = "import fs from 'fs';\nfunction load(name) { return import('./' + name); }\nnew Function('return 1');";
        let tree = build(source, "a.mjs").unwrap();

        let imports = find(&tree, NodeKind::ImportExpression);
        assert_eq!(imports.len(), 1);
        match &tree.get(imports[0]).unwrap().payload {
            NodePayload::Import { source, .. } => {
                let kind = tree.get(source.unwrap()).unwrap().kind;
                assert_eq!(kind, NodeKind::BinaryExpression);
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        let decl = find(&tree, NodeKind::ImportDeclaration)[0];
        assert_eq!(
            tree.get(decl).unwrap().payload,
            NodePayload::ImportDeclaration {
                source: Some("fs".to_string())
            }
        );

        let func = find(&tree, NodeKind::FunctionDeclaration)[0];
        match &tree.get(func).unwrap().payload {
            NodePayload::Function { name, params, .. } => {
                assert_eq!(name.as_deref(), Some("load"));
                assert_eq!(params.len(), 1);
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        let new_expr = find(&tree, NodeKind::NewExpression)[0];
        match &tree.get(new_expr).unwrap().payload {
            NodePayload::Call { callee, arguments } => {
                assert_eq!(tree.callee_name(callee.unwrap()).unwrap().name, "Function");
                assert_eq!(arguments.len(), 1);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_member_callee_receivers() {
        let source = "child_process.exec(cmd);\nwindow['eval'](x);\nrequire('child_process').spawn(y);";
        let tree = build(source, "a.js").unwrap();
        let names: Vec<(String, Option<String>)> = find(&tree, NodeKind::CallExpression)
            .into_iter()
            .filter_map(|id| match &tree.get(id).unwrap().payload {
                NodePayload::Call { callee, .. } => tree.callee_name((*callee)?),
                _ => None,
            })
            .map(|c| (c.name.to_string(), c.receiver.map(str::to_string)))
            .collect();

        assert!(names.contains(&("exec".to_string(), Some("child_process".to_string()))));
        assert!(names.contains(&("eval".to_string(), Some("window".to_string()))));
        assert!(names.contains(&("spawn".to_string(), Some("child_process".to_string()))));
        assert!(names.contains(&("require".to_string(), None)));
    }

    #[test]
    fn test_version_ceiling() {
        let builder = SyntaxTreeBuilder::new(ParserConfig {
            ecma_version: EcmaVersion::Es2017,
            ..Default::default()
        });
        assert!(builder.build("const a = b?.c;", Path::new("a.js")).is_err());
        assert!(builder.build("const a = b ?? c;", Path::new("a.js")).is_err());
        assert!(builder.build("const a = (x) => x;", Path::new("a.js")).is_ok());

        let es5 = SyntaxTreeBuilder::new(ParserConfig {
            ecma_version: EcmaVersion::Es5,
            ..Default::default()
        });
        match es5.build("var f = () => 1;", Path::new("a.js")).unwrap_err() {
            ParseError::UnsupportedSyntax { required, .. } => {
                assert_eq!(required, EcmaVersion::Es2015)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_script_mode_rejects_module_syntax() {
        let builder = SyntaxTreeBuilder::new(ParserConfig {
            source_type: SourceType::Script,
            ..Default::default()
        });
        let err = builder
            .build("import x from 'y';\nx();", Path::new("a.js"))
            .unwrap_err();
        assert!(matches!(err, ParseError::ModuleSyntaxInScript { line: 1, .. }));
        assert!(builder.build("var x = 1;", Path::new("a.js")).is_ok());
    }

    #[test]
    fn test_comment_only_file_parses() {
        let tree = build("// just a comment\n/* and another */\n\n", "a.ts").unwrap();
        assert!(find(&tree, NodeKind::CallExpression).is_empty());
        assert_eq!(find(&tree, NodeKind::Comment).len(), 2);
    }
}
