//! tree-sitter-php adapter.
//!
//! Converts the tree-sitter concrete syntax tree into the crate-owned AST.
//! The parser is configured for the full PHP grammar (HTML-mixed source);
//! syntactic errors are collected as diagnostics and the conversion proceeds
//! on whatever tree came back — the analysis never fails on a broken input
//! file, it analyzes what it can recognize.

use tree_sitter::{Node as TsNode, Parser};

use crate::features::parsing::domain::ast::{self, Node, NodeKind};
use crate::features::parsing::domain::{
    AssignOp, BinaryOp, CastKind, IncludeKind, NameForm, UnaryOp,
};
use crate::shared::models::{IrError, Span};

/// One collected syntax diagnostic.
#[derive(Debug, Clone)]
pub struct ParseDiagnostic {
    pub message: String,
    pub span: Span,
}

/// Result of parsing one file: top-level statements plus diagnostics.
#[derive(Debug)]
pub struct ParseOutcome {
    pub stmts: Vec<Node>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// Parse PHP source into the crate AST.
pub fn parse_php(source: &[u8], file: &str) -> Result<ParseOutcome, IrError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_php::language_php())
        .map_err(|e| IrError::Parse {
            file: file.to_string(),
            message: format!("cannot load PHP grammar: {e}"),
        })?;

    let tree = parser.parse(source, None).ok_or_else(|| IrError::Parse {
        file: file.to_string(),
        message: "parser returned no tree".to_string(),
    })?;

    let mut conv = Converter {
        source,
        diagnostics: Vec::new(),
    };
    let stmts = conv.statements(tree.root_node());
    Ok(ParseOutcome {
        stmts,
        diagnostics: conv.diagnostics,
    })
}

struct Converter<'s> {
    source: &'s [u8],
    diagnostics: Vec<ParseDiagnostic>,
}

fn span_of(node: TsNode) -> Span {
    Span::new(
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
        node.start_byte() as u32,
        node.end_byte() as u32,
    )
}

impl<'s> Converter<'s> {
    fn text(&self, node: TsNode) -> &'s str {
        node.utf8_text(self.source).ok().unwrap_or_default()
    }

    fn diagnose(&mut self, node: TsNode, message: impl Into<String>) {
        self.diagnostics.push(ParseDiagnostic {
            message: message.into(),
            span: span_of(node),
        });
    }

    fn named_children<'t>(&self, node: TsNode<'t>) -> Vec<TsNode<'t>> {
        let mut cursor = node.walk();
        let out: Vec<_> = node.named_children(&mut cursor).collect();
        out
    }

    fn children_by_field<'t>(&self, node: TsNode<'t>, field: &str) -> Vec<TsNode<'t>> {
        let mut cursor = node.walk();
        node.children_by_field_name(field, &mut cursor).collect()
    }

    fn has_token(&self, node: TsNode, token: &str) -> bool {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == token {
                return true;
            }
        }
        false
    }

    // ── statements ────────────────────────────────────────────────────

    fn statements(&mut self, node: TsNode<'_>) -> Vec<Node> {
        let mut out = Vec::new();
        for child in self.named_children(node) {
            if let Some(stmt) = self.statement(child) {
                out.push(stmt);
            }
        }
        out
    }

    fn statement(&mut self, node: TsNode<'_>) -> Option<Node> {
        let span = span_of(node);
        let kind = match node.kind() {
            "php_tag" | "comment" | "?>" | "text_interpolation" | "text" => {
                return Some(Node::new(NodeKind::StmtInlineHtml, span));
            }
            "empty_statement" => NodeKind::StmtNop,
            "compound_statement" => NodeKind::StmtList {
                stmts: self.statements(node),
            },
            "expression_statement" => {
                let inner = self.named_children(node).into_iter().next()?;
                if inner.kind() == "throw_expression" {
                    let expr = self
                        .named_children(inner)
                        .into_iter()
                        .next()
                        .map(|c| self.expression(c))
                        .unwrap_or_else(|| self.unknown(inner, "throw without operand"));
                    NodeKind::StmtThrow {
                        expr: Box::new(expr),
                    }
                } else {
                    NodeKind::StmtExpression {
                        expr: Box::new(self.expression(inner)),
                    }
                }
            }
            "echo_statement" => {
                let mut exprs = Vec::new();
                for child in self.named_children(node) {
                    self.flatten_sequence(child, &mut exprs);
                }
                NodeKind::StmtEcho { exprs }
            }
            "unset_statement" => NodeKind::StmtUnset {
                vars: self
                    .named_children(node)
                    .into_iter()
                    .map(|c| self.expression(c))
                    .collect(),
            },
            "exit_statement" => {
                let expr = self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|c| Box::new(self.expression(c)));
                NodeKind::StmtExpression {
                    expr: Box::new(Node::new(NodeKind::ExprExit { expr }, span)),
                }
            }
            "if_statement" => self.if_statement(node),
            "while_statement" => {
                let cond = self.condition_field(node);
                let stmt = self.body_field(node, span);
                NodeKind::StmtWhile {
                    cond: Box::new(cond),
                    stmt: Box::new(stmt),
                }
            }
            "do_statement" => {
                let stmt = self.body_field(node, span);
                let cond = self.condition_field(node);
                NodeKind::StmtDo {
                    stmt: Box::new(stmt),
                    cond: Box::new(cond),
                }
            }
            "for_statement" => self.for_statement(node, span),
            "foreach_statement" => self.foreach_statement(node, span)?,
            "switch_statement" => self.switch_statement(node),
            "break_statement" => NodeKind::StmtBreak {
                level: self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|c| Box::new(self.expression(c))),
            },
            "continue_statement" => NodeKind::StmtContinue {
                level: self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|c| Box::new(self.expression(c))),
            },
            "return_statement" => NodeKind::StmtReturn {
                expr: self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|c| Box::new(self.expression(c))),
            },
            "goto_statement" => {
                let label = self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|c| self.text(c).to_string())
                    .unwrap_or_default();
                NodeKind::StmtGoto { label }
            }
            "named_label_statement" => {
                let name = self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|c| self.text(c).to_string())
                    .unwrap_or_default();
                NodeKind::StmtLabel { name }
            }
            "function_definition" => self.function_definition(node),
            "class_declaration" => self.class_declaration(node),
            "interface_declaration" => self.interface_declaration(node),
            "trait_declaration" => self.trait_declaration(node),
            "namespace_definition" => self.namespace_definition(node),
            "namespace_use_declaration" => self.namespace_use(node),
            "global_declaration" => NodeKind::StmtGlobal {
                vars: self
                    .named_children(node)
                    .into_iter()
                    .map(|c| self.expression(c))
                    .collect(),
            },
            "function_static_declaration" => {
                let mut vars = Vec::new();
                for decl in self.named_children(node) {
                    if decl.kind() != "static_variable_declaration" {
                        continue;
                    }
                    let dspan = span_of(decl);
                    let kids = self.named_children(decl);
                    let var = kids
                        .first()
                        .map(|c| self.expression(*c))
                        .unwrap_or_else(|| self.unknown(decl, "static var without name"));
                    let default = kids.get(1).map(|c| Box::new(self.expression(*c)));
                    vars.push(Node::new(
                        NodeKind::StmtStaticVar {
                            var: Box::new(var),
                            default,
                        },
                        dspan,
                    ));
                }
                NodeKind::StmtStatic { vars }
            }
            "const_declaration" => NodeKind::StmtConstList {
                consts: self.const_elements(node),
            },
            "try_statement" => self.try_statement(node, span),
            "ERROR" => {
                self.diagnose(node, "syntax error");
                NodeKind::StmtNop
            }
            other => {
                self.diagnose(node, format!("unrecognized statement '{other}'"));
                NodeKind::StmtNop
            }
        };
        Some(Node::new(kind, span))
    }

    /// `$a, $b, $c` — tree-sitter models comma lists as `sequence_expression`.
    fn flatten_sequence(&mut self, node: TsNode<'_>, out: &mut Vec<Node>) {
        if node.kind() == "sequence_expression" {
            for child in self.named_children(node) {
                self.flatten_sequence(child, out);
            }
        } else {
            out.push(self.expression(node));
        }
    }

    fn condition_field(&mut self, node: TsNode<'_>) -> Node {
        match node.child_by_field_name("condition") {
            Some(cond) => self.expression(cond),
            None => self.unknown(node, "missing condition"),
        }
    }

    /// Loop/branch bodies are normalized into a `StmtList` so downstream
    /// passes can append synthetic labels without caring about the shape.
    fn body_field(&mut self, node: TsNode<'_>, span: Span) -> Node {
        let body = node.child_by_field_name("body");
        let stmts = match body {
            Some(b) if b.kind() == "compound_statement" || b.kind() == "colon_block" => {
                self.statements(b)
            }
            Some(b) => self.statement(b).into_iter().collect(),
            None => Vec::new(),
        };
        ast::stmt_list(stmts, span)
    }

    fn if_statement(&mut self, node: TsNode<'_>) -> NodeKind {
        let span = span_of(node);
        let cond = self.condition_field(node);
        let stmt = self.body_field(node, span);
        let mut elseifs = Vec::new();
        let mut else_stmt = None;
        for alt in self.children_by_field(node, "alternative") {
            let aspan = span_of(alt);
            match alt.kind() {
                "else_if_clause" => {
                    let c = self.condition_field(alt);
                    let s = self.body_field(alt, aspan);
                    elseifs.push(Node::new(
                        NodeKind::StmtElseIf {
                            cond: Box::new(c),
                            stmt: Box::new(s),
                        },
                        aspan,
                    ));
                }
                "else_clause" => {
                    let s = self.body_field(alt, aspan);
                    else_stmt = Some(Box::new(Node::new(
                        NodeKind::StmtElse { stmt: Box::new(s) },
                        aspan,
                    )));
                }
                _ => {}
            }
        }
        NodeKind::StmtIf {
            cond: Box::new(cond),
            stmt: Box::new(stmt),
            elseifs,
            else_stmt,
        }
    }

    fn for_statement(&mut self, node: TsNode<'_>, span: Span) -> NodeKind {
        let mut init = Vec::new();
        let mut cond = Vec::new();
        let mut step = Vec::new();
        for c in self.children_by_field(node, "initialize") {
            self.flatten_sequence(c, &mut init);
        }
        for c in self.children_by_field(node, "condition") {
            self.flatten_sequence(c, &mut cond);
        }
        for c in self.children_by_field(node, "update") {
            self.flatten_sequence(c, &mut step);
        }
        let stmt = self.body_field(node, span);
        NodeKind::StmtFor {
            init,
            cond,
            step,
            stmt: Box::new(stmt),
        }
    }

    fn foreach_statement(&mut self, node: TsNode<'_>, span: Span) -> Option<NodeKind> {
        let body = self.body_field(node, span);
        let kids: Vec<_> = self
            .named_children(node)
            .into_iter()
            .filter(|c| Some(*c) != node.child_by_field_name("body"))
            .collect();
        let subject = kids.first().copied()?;
        let expr = self.expression(subject);

        let mut key = None;
        let mut by_ref = false;
        let mut var = None;
        for target in kids.iter().skip(1) {
            match target.kind() {
                "pair" => {
                    let pair_kids = self.named_children(*target);
                    if let Some(k) = pair_kids.first() {
                        key = Some(Box::new(self.expression(*k)));
                    }
                    if let Some(v) = pair_kids.get(1) {
                        let (node, r) = self.foreach_value(*v);
                        by_ref = r;
                        var = Some(node);
                    }
                }
                "compound_statement" | "colon_block" => {}
                _ => {
                    let (node, r) = self.foreach_value(*target);
                    by_ref = r;
                    var = Some(node);
                }
            }
        }
        let var = var.unwrap_or_else(|| self.unknown(node, "foreach without target"));
        Some(NodeKind::StmtForeach {
            expr: Box::new(expr),
            key,
            by_ref,
            var: Box::new(var),
            stmt: Box::new(body),
        })
    }

    fn foreach_value(&mut self, node: TsNode<'_>) -> (Node, bool) {
        if node.kind() == "by_ref" {
            let inner = self
                .named_children(node)
                .into_iter()
                .next()
                .map(|c| self.expression(c))
                .unwrap_or_else(|| self.unknown(node, "by-ref without target"));
            (inner, true)
        } else {
            (self.expression(node), false)
        }
    }

    fn switch_statement(&mut self, node: TsNode<'_>) -> NodeKind {
        let cond = self.condition_field(node);
        let mut cases = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for case in self.named_children(body) {
                let cspan = span_of(case);
                match case.kind() {
                    "case_statement" => {
                        let value = case
                            .child_by_field_name("value")
                            .map(|v| self.expression(v))
                            .unwrap_or_else(|| self.unknown(case, "case without value"));
                        let stmts = self
                            .named_children(case)
                            .into_iter()
                            .filter(|c| Some(*c) != case.child_by_field_name("value"))
                            .filter_map(|c| self.statement(c))
                            .collect();
                        cases.push(Node::new(
                            NodeKind::StmtCase {
                                cond: Box::new(value),
                                stmts,
                            },
                            cspan,
                        ));
                    }
                    "default_statement" => {
                        let stmts = self
                            .named_children(case)
                            .into_iter()
                            .filter_map(|c| self.statement(c))
                            .collect();
                        cases.push(Node::new(NodeKind::StmtDefault { stmts }, cspan));
                    }
                    _ => {}
                }
            }
        }
        NodeKind::StmtSwitch {
            cond: Box::new(cond),
            cases,
        }
    }

    fn function_definition(&mut self, node: TsNode<'_>) -> NodeKind {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let by_ref = self.has_token(node, "reference_modifier") || self.has_token(node, "&");
        let params = self.parameters(node);
        let return_type = self.return_type(node);
        let stmts = node
            .child_by_field_name("body")
            .map(|b| self.statements(b))
            .unwrap_or_default();
        NodeKind::StmtFunction {
            name,
            by_ref,
            params,
            return_type,
            stmts,
        }
    }

    fn parameters(&mut self, node: TsNode<'_>) -> Vec<Node> {
        let Some(list) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for p in self.named_children(list) {
            let pspan = span_of(p);
            match p.kind() {
                "simple_parameter" | "variadic_parameter" | "property_promotion_parameter" => {
                    let name = p
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let ty = p
                        .child_by_field_name("type")
                        .map(|t| Box::new(self.type_node(t)));
                    let default = p
                        .child_by_field_name("default_value")
                        .map(|d| Box::new(self.expression(d)));
                    let by_ref = self.has_token(p, "reference_modifier") || self.has_token(p, "&");
                    out.push(Node::new(
                        NodeKind::Param {
                            name,
                            by_ref,
                            variadic: p.kind() == "variadic_parameter",
                            ty,
                            default,
                        },
                        pspan,
                    ));
                }
                _ => {}
            }
        }
        out
    }

    fn return_type(&mut self, node: TsNode<'_>) -> Option<Box<Node>> {
        node.child_by_field_name("return_type")
            .map(|t| Box::new(self.type_node(t)))
    }

    fn type_node(&mut self, node: TsNode<'_>) -> Node {
        let span = span_of(node);
        match node.kind() {
            "optional_type" => {
                let inner = self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|c| self.type_node(c))
                    .unwrap_or_else(|| self.unknown(node, "empty nullable type"));
                Node::new(
                    NodeKind::TypeNullable {
                        ty: Box::new(inner),
                    },
                    span,
                )
            }
            "union_type" => {
                let types = self
                    .named_children(node)
                    .into_iter()
                    .map(|c| self.type_node(c))
                    .collect();
                Node::new(NodeKind::TypeUnion { types }, span)
            }
            "named_type" => {
                let inner = self.named_children(node).into_iter().next();
                match inner {
                    Some(c) => self.name_node(c),
                    None => self.name_from_text(node),
                }
            }
            "primitive_type" => Node::new(
                NodeKind::Identifier {
                    value: self.text(node).to_string(),
                },
                span,
            ),
            "name" | "qualified_name" => self.name_node(node),
            _ => self.name_from_text(node),
        }
    }

    fn name_from_text(&mut self, node: TsNode<'_>) -> Node {
        Node::new(
            NodeKind::Identifier {
                value: self.text(node).to_string(),
            },
            span_of(node),
        )
    }

    fn modifiers(&mut self, node: TsNode<'_>) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "abstract_modifier" | "final_modifier" | "readonly_modifier"
                | "static_modifier" | "visibility_modifier" | "var_modifier" => {
                    out.push(self.text(child).to_lowercase());
                }
                _ => {}
            }
        }
        out
    }

    fn class_declaration(&mut self, node: TsNode<'_>) -> NodeKind {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let modifiers = self.modifiers(node);
        let mut extends = None;
        let mut implements = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "base_clause" => {
                    extends = self
                        .named_children(child)
                        .into_iter()
                        .next()
                        .map(|c| Box::new(self.name_node(c)));
                }
                "class_interface_clause" => {
                    implements = self
                        .named_children(child)
                        .into_iter()
                        .map(|c| self.name_node(c))
                        .collect();
                }
                _ => {}
            }
        }
        let stmts = node
            .child_by_field_name("body")
            .map(|b| self.class_members(b))
            .unwrap_or_default();
        NodeKind::StmtClass {
            name,
            modifiers,
            extends,
            implements,
            stmts,
        }
    }

    fn interface_declaration(&mut self, node: TsNode<'_>) -> NodeKind {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let mut extends = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "base_clause" {
                extends = self
                    .named_children(child)
                    .into_iter()
                    .map(|c| self.name_node(c))
                    .collect();
            }
        }
        let stmts = node
            .child_by_field_name("body")
            .map(|b| self.class_members(b))
            .unwrap_or_default();
        NodeKind::StmtInterface {
            name,
            extends,
            stmts,
        }
    }

    fn trait_declaration(&mut self, node: TsNode<'_>) -> NodeKind {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let stmts = node
            .child_by_field_name("body")
            .map(|b| self.class_members(b))
            .unwrap_or_default();
        NodeKind::StmtTrait { name, stmts }
    }

    fn class_members(&mut self, body: TsNode<'_>) -> Vec<Node> {
        let mut out = Vec::new();
        for member in self.named_children(body) {
            let span = span_of(member);
            let kind = match member.kind() {
                "method_declaration" => {
                    let name = member
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let modifiers = self.modifiers(member);
                    let by_ref = self.has_token(member, "reference_modifier");
                    let params = self.parameters(member);
                    let return_type = self.return_type(member);
                    let stmts = member
                        .child_by_field_name("body")
                        .map(|b| self.statements(b))
                        .unwrap_or_default();
                    NodeKind::StmtClassMethod {
                        name,
                        modifiers,
                        by_ref,
                        params,
                        return_type,
                        stmts,
                    }
                }
                "property_declaration" => {
                    let modifiers = self.modifiers(member);
                    let ty = member
                        .child_by_field_name("type")
                        .map(|t| Box::new(self.type_node(t)));
                    let mut props = Vec::new();
                    for elem in self.named_children(member) {
                        if elem.kind() != "property_element" {
                            continue;
                        }
                        let espan = span_of(elem);
                        let name = elem
                            .child_by_field_name("name")
                            .or_else(|| self.named_children(elem).into_iter().next())
                            .map(|n| self.text(n).to_string())
                            .unwrap_or_default();
                        let default = self
                            .named_children(elem)
                            .into_iter()
                            .find(|c| c.kind() != "variable_name")
                            .map(|c| Box::new(self.expression(c)));
                        props.push(Node::new(NodeKind::PropertyElement { name, default }, espan));
                    }
                    NodeKind::StmtPropertyList {
                        modifiers,
                        ty,
                        props,
                    }
                }
                "const_declaration" => NodeKind::StmtConstList {
                    consts: self.const_elements(member),
                },
                "use_declaration" => self.trait_use(member),
                "ERROR" => {
                    self.diagnose(member, "syntax error in class body");
                    continue;
                }
                _ => {
                    if let Some(stmt) = self.statement(member) {
                        out.push(stmt);
                    }
                    continue;
                }
            };
            out.push(Node::new(kind, span));
        }
        out
    }

    fn const_elements(&mut self, node: TsNode<'_>) -> Vec<Node> {
        let mut out = Vec::new();
        for elem in self.named_children(node) {
            if elem.kind() != "const_element" {
                continue;
            }
            let espan = span_of(elem);
            let kids = self.named_children(elem);
            let name = kids
                .first()
                .map(|n| self.text(*n).to_string())
                .unwrap_or_default();
            let expr = kids
                .get(1)
                .map(|c| self.expression(*c))
                .unwrap_or_else(|| self.unknown(elem, "const without value"));
            out.push(Node::new(
                NodeKind::StmtConstant {
                    name,
                    expr: Box::new(expr),
                },
                espan,
            ));
        }
        out
    }

    fn trait_use(&mut self, node: TsNode<'_>) -> NodeKind {
        let mut traits = Vec::new();
        let mut adaptations = Vec::new();
        for child in self.named_children(node) {
            match child.kind() {
                "name" | "qualified_name" => traits.push(self.name_node(child)),
                "use_list" => {
                    for clause in self.named_children(child) {
                        let cspan = span_of(clause);
                        match clause.kind() {
                            "use_as_clause" => {
                                let kids = self.named_children(clause);
                                let (trait_name, method) = self.trait_method_ref(kids.first());
                                let mut alias = None;
                                let mut modifier = None;
                                for extra in kids.iter().skip(1) {
                                    if extra.kind() == "visibility_modifier" {
                                        modifier = Some(self.text(*extra).to_lowercase());
                                    } else {
                                        alias = Some(self.text(*extra).to_string());
                                    }
                                }
                                adaptations.push(Node::new(
                                    NodeKind::TraitUseAlias {
                                        trait_name,
                                        method,
                                        alias,
                                        modifier,
                                    },
                                    cspan,
                                ));
                            }
                            "use_instead_of_clause" => {
                                let kids = self.named_children(clause);
                                let (trait_name, method) = self.trait_method_ref(kids.first());
                                let insteadof = kids
                                    .iter()
                                    .skip(1)
                                    .map(|c| self.name_node(*c))
                                    .collect();
                                adaptations.push(Node::new(
                                    NodeKind::TraitUsePrecedence {
                                        trait_name,
                                        method,
                                        insteadof,
                                    },
                                    cspan,
                                ));
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
        NodeKind::StmtTraitUse {
            traits,
            adaptations,
        }
    }

    /// `Trait::method` or a bare `method` on the left of a use adaptation.
    fn trait_method_ref(&mut self, node: Option<&TsNode<'_>>) -> (Option<Box<Node>>, String) {
        let Some(node) = node else {
            return (None, String::new());
        };
        if node.kind() == "class_constant_access_expression" {
            let kids = self.named_children(*node);
            let trait_name = kids.first().map(|c| Box::new(self.name_node(*c)));
            let method = kids
                .get(1)
                .map(|c| self.text(*c).to_string())
                .unwrap_or_default();
            (trait_name, method)
        } else {
            (None, self.text(*node).to_string())
        }
    }

    fn namespace_definition(&mut self, node: TsNode<'_>) -> NodeKind {
        let name = node
            .child_by_field_name("name")
            .map(|n| Box::new(self.name_node(n)));
        let stmts = node
            .child_by_field_name("body")
            .map(|b| self.statements(b))
            .unwrap_or_default();
        NodeKind::StmtNamespace { name, stmts }
    }

    fn namespace_use(&mut self, node: TsNode<'_>) -> NodeKind {
        let use_type = if self.has_token(node, "function") {
            Some("function".to_string())
        } else if self.has_token(node, "const") {
            Some("const".to_string())
        } else {
            None
        };

        let mut group_prefix = None;
        let mut uses = Vec::new();
        for child in self.named_children(node) {
            match child.kind() {
                "namespace_use_clause" => {
                    uses.push(self.use_clause(child, use_type.clone()));
                }
                "namespace_use_group" => {
                    for clause in self.named_children(child) {
                        if clause.kind() == "namespace_use_group_clause"
                            || clause.kind() == "namespace_use_clause"
                        {
                            uses.push(self.use_clause(clause, use_type.clone()));
                        }
                    }
                }
                "name" | "qualified_name" | "namespace_name" => {
                    group_prefix = Some(Box::new(self.name_node(child)));
                }
                _ => {}
            }
        }

        match group_prefix {
            Some(prefix) => NodeKind::StmtGroupUse {
                use_type,
                prefix,
                uses,
            },
            None => NodeKind::StmtUse { use_type, uses },
        }
    }

    fn use_clause(&mut self, node: TsNode<'_>, use_type: Option<String>) -> Node {
        let span = span_of(node);
        let kids = self.named_children(node);
        let name = kids
            .first()
            .map(|c| self.name_node(*c))
            .unwrap_or_else(|| self.unknown(node, "use clause without name"));
        let mut alias = None;
        for extra in kids.iter().skip(1) {
            if extra.kind() == "namespace_aliasing_clause" {
                alias = self
                    .named_children(*extra)
                    .into_iter()
                    .next()
                    .map(|c| self.text(c).to_string());
            }
        }
        Node::new(
            NodeKind::UseClause {
                use_type,
                name: Box::new(name),
                alias,
            },
            span,
        )
    }

    fn try_statement(&mut self, node: TsNode<'_>, span: Span) -> NodeKind {
        let stmts = node
            .child_by_field_name("body")
            .map(|b| self.statements(b))
            .unwrap_or_default();
        let mut catches = Vec::new();
        let mut finally = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "catch_clause" => {
                    let cspan = span_of(child);
                    let types = child
                        .child_by_field_name("type")
                        .map(|t| {
                            self.named_children(t)
                                .into_iter()
                                .map(|c| self.name_node(c))
                                .collect()
                        })
                        .unwrap_or_default();
                    let var = child
                        .child_by_field_name("name")
                        .map(|v| Box::new(self.expression(v)));
                    let body = child
                        .child_by_field_name("body")
                        .map(|b| self.statements(b))
                        .unwrap_or_default();
                    catches.push(Node::new(
                        NodeKind::StmtCatch {
                            types,
                            var,
                            stmts: body,
                        },
                        cspan,
                    ));
                }
                "finally_clause" => {
                    finally = child
                        .child_by_field_name("body")
                        .map(|b| self.statements(b))
                        .unwrap_or_default();
                }
                _ => {}
            }
        }
        let _ = span;
        NodeKind::StmtTry {
            stmts,
            catches,
            finally,
        }
    }

    // ── names ─────────────────────────────────────────────────────────

    fn name_node(&mut self, node: TsNode<'_>) -> Node {
        let span = span_of(node);
        match node.kind() {
            "qualified_name" => {
                let text = self.text(node);
                let form = if text.starts_with('\\') {
                    NameForm::FullyQualified
                } else if text.to_lowercase().starts_with("namespace\\") {
                    NameForm::Relative
                } else {
                    NameForm::Normal
                };
                let trimmed = text.trim_start_matches('\\');
                let trimmed = match form {
                    NameForm::Relative => &trimmed["namespace\\".len()..],
                    _ => trimmed,
                };
                Node::new(
                    NodeKind::Name {
                        parts: ast::name_parts(trimmed),
                        form,
                    },
                    span,
                )
            }
            "relative_scope" | "name" => Node::new(
                NodeKind::Name {
                    parts: vec![self.text(node).to_string()],
                    form: NameForm::Normal,
                },
                span,
            ),
            _ => Node::new(
                NodeKind::Name {
                    parts: vec![self.text(node).to_string()],
                    form: NameForm::Normal,
                },
                span,
            ),
        }
    }

    // ── expressions ───────────────────────────────────────────────────

    fn unknown(&mut self, node: TsNode<'_>, why: &str) -> Node {
        self.diagnose(node, why.to_string());
        Node::new(
            NodeKind::ExprUnknown {
                construct: node.kind().to_string(),
            },
            span_of(node),
        )
    }

    fn expression(&mut self, node: TsNode<'_>) -> Node {
        let span = span_of(node);
        let kind = match node.kind() {
            "parenthesized_expression" => {
                return self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|c| self.expression(c))
                    .unwrap_or_else(|| self.unknown(node, "empty parentheses"));
            }
            "variable_name" => NodeKind::ExprVariable {
                name: Box::new(Node::new(
                    NodeKind::Identifier {
                        value: self.text(node).to_string(),
                    },
                    span,
                )),
            },
            "dynamic_variable_name" => {
                let inner = self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|c| self.expression(c))
                    .unwrap_or_else(|| self.unknown(node, "dynamic variable without name"));
                NodeKind::ExprVariable {
                    name: Box::new(inner),
                }
            }
            "assignment_expression" => {
                let var = self.field_expr(node, "left");
                let expr = self.field_expr(node, "right");
                if self.has_token(node, "&") {
                    NodeKind::ExprAssignRef {
                        var: Box::new(var),
                        expr: Box::new(expr),
                    }
                } else {
                    NodeKind::ExprAssign {
                        var: Box::new(var),
                        expr: Box::new(expr),
                    }
                }
            }
            "reference_assignment_expression" => NodeKind::ExprAssignRef {
                var: Box::new(self.field_expr(node, "left")),
                expr: Box::new(self.field_expr(node, "right")),
            },
            "augmented_assignment_expression" => {
                let op_text = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o).to_string())
                    .unwrap_or_default();
                let Some(op) = assign_op(&op_text) else {
                    return self.unknown(node, "unknown augmented assignment");
                };
                NodeKind::ExprAssignOp {
                    op,
                    var: Box::new(self.field_expr(node, "left")),
                    expr: Box::new(self.field_expr(node, "right")),
                }
            }
            "binary_expression" => {
                let op_text = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o).to_string())
                    .unwrap_or_default();
                if op_text == "instanceof" {
                    NodeKind::ExprInstanceOf {
                        expr: Box::new(self.field_expr(node, "left")),
                        class: Box::new(self.field_name_or_expr(node, "right")),
                    }
                } else {
                    let Some(op) = binary_op(&op_text) else {
                        return self.unknown(node, "unknown binary operator");
                    };
                    NodeKind::ExprBinary {
                        op,
                        left: Box::new(self.field_expr(node, "left")),
                        right: Box::new(self.field_expr(node, "right")),
                    }
                }
            }
            "unary_op_expression" => {
                let expr = self
                    .named_children(node)
                    .into_iter()
                    .last()
                    .map(|c| self.expression(c))
                    .unwrap_or_else(|| self.unknown(node, "unary without operand"));
                let op_text = node
                    .child(0)
                    .map(|c| self.text(c).to_string())
                    .unwrap_or_default();
                let op = match op_text.as_str() {
                    "!" => UnaryOp::BooleanNot,
                    "-" => UnaryOp::Minus,
                    "+" => UnaryOp::Plus,
                    "~" => UnaryOp::BitwiseNot,
                    _ => return self.unknown(node, "unknown unary operator"),
                };
                NodeKind::ExprUnary {
                    op,
                    expr: Box::new(expr),
                }
            }
            "update_expression" => {
                let var = self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|c| self.expression(c))
                    .unwrap_or_else(|| self.unknown(node, "update without operand"));
                let prefix = node
                    .child(0)
                    .map(|c| c.kind() == "++" || c.kind() == "--")
                    .unwrap_or(false);
                let inc = self.has_token(node, "++");
                match (prefix, inc) {
                    (true, true) => NodeKind::ExprPreInc { var: Box::new(var) },
                    (true, false) => NodeKind::ExprPreDec { var: Box::new(var) },
                    (false, true) => NodeKind::ExprPostInc { var: Box::new(var) },
                    (false, false) => NodeKind::ExprPostDec { var: Box::new(var) },
                }
            }
            "conditional_expression" => NodeKind::ExprTernary {
                cond: Box::new(self.field_expr(node, "condition")),
                if_true: node
                    .child_by_field_name("body")
                    .map(|b| Box::new(self.expression(b))),
                if_false: Box::new(self.field_expr(node, "alternative")),
            },
            "cast_expression" => {
                let ty = node
                    .child_by_field_name("type")
                    .map(|t| self.text(t).to_lowercase())
                    .unwrap_or_default();
                let Some(kind) = cast_kind(&ty) else {
                    return self.unknown(node, "unknown cast type");
                };
                NodeKind::ExprCast {
                    kind,
                    expr: Box::new(self.field_expr(node, "value")),
                }
            }
            "subscript_expression" => {
                let kids = self.named_children(node);
                let var = kids
                    .first()
                    .map(|c| self.expression(*c))
                    .unwrap_or_else(|| self.unknown(node, "subscript without base"));
                let dim = kids.get(1).map(|c| Box::new(self.expression(*c)));
                NodeKind::ExprArrayDimFetch {
                    var: Box::new(var),
                    dim,
                }
            }
            "member_access_expression" | "nullsafe_member_access_expression" => {
                NodeKind::ExprPropertyFetch {
                    var: Box::new(self.field_expr(node, "object")),
                    prop: Box::new(self.field_name_or_expr(node, "name")),
                    nullsafe: node.kind() == "nullsafe_member_access_expression",
                }
            }
            "scoped_property_access_expression" => NodeKind::ExprStaticPropertyFetch {
                class: Box::new(self.field_name_or_expr(node, "scope")),
                prop: Box::new(self.field_name_or_expr(node, "name")),
            },
            "class_constant_access_expression" => {
                let kids = self.named_children(node);
                let class = kids
                    .first()
                    .map(|c| self.field_name_like(*c))
                    .unwrap_or_else(|| self.unknown(node, "class const without class"));
                let name = kids
                    .get(1)
                    .map(|c| self.field_name_like(*c))
                    .unwrap_or_else(|| self.unknown(node, "class const without name"));
                NodeKind::ExprClassConstFetch {
                    class: Box::new(class),
                    name: Box::new(name),
                }
            }
            "function_call_expression" => {
                let function = self.field_name_or_expr(node, "function");
                let args = self.arguments(node);
                return self.intrinsic_or_call(function, args, span);
            }
            "member_call_expression" | "nullsafe_member_call_expression" => {
                NodeKind::ExprMethodCall {
                    var: Box::new(self.field_expr(node, "object")),
                    method: Box::new(self.field_name_or_expr(node, "name")),
                    args: self.arguments(node),
                    nullsafe: node.kind() == "nullsafe_member_call_expression",
                }
            }
            "scoped_call_expression" => NodeKind::ExprStaticCall {
                class: Box::new(self.field_name_or_expr(node, "scope")),
                call: Box::new(self.field_name_or_expr(node, "name")),
                args: self.arguments(node),
            },
            "object_creation_expression" => {
                let class = self
                    .named_children(node)
                    .into_iter()
                    .find(|c| c.kind() != "arguments")
                    .map(|c| self.field_name_like(c))
                    .unwrap_or_else(|| self.unknown(node, "new without class"));
                NodeKind::ExprNew {
                    class: Box::new(class),
                    args: self.arguments(node),
                }
            }
            "anonymous_function_creation_expression" | "anonymous_function" => {
                let is_static = self.has_token(node, "static");
                let by_ref = self.has_token(node, "reference_modifier");
                let params = self.parameters(node);
                let return_type = self.return_type(node);
                let mut uses = Vec::new();
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "anonymous_function_use_clause" {
                        for v in self.named_children(child) {
                            let vspan = span_of(v);
                            let (var, by_ref) = self.foreach_value(v);
                            uses.push(Node::new(
                                NodeKind::ClosureUse {
                                    var: Box::new(var),
                                    by_ref,
                                },
                                vspan,
                            ));
                        }
                    }
                }
                let stmts = node
                    .child_by_field_name("body")
                    .map(|b| self.statements(b))
                    .unwrap_or_default();
                NodeKind::ExprClosure {
                    is_static,
                    by_ref,
                    params,
                    uses,
                    return_type,
                    stmts,
                }
            }
            "arrow_function" => NodeKind::ExprArrowFunction {
                is_static: self.has_token(node, "static"),
                by_ref: self.has_token(node, "reference_modifier"),
                params: self.parameters(node),
                return_type: self.return_type(node),
                expr: Box::new(self.field_expr(node, "body")),
            },
            "array_creation_expression" => NodeKind::ExprArray {
                items: self.array_items(node),
            },
            "list_literal" => NodeKind::ExprList {
                items: self.array_items(node),
            },
            "include_expression" => self.include(node, IncludeKind::Include),
            "include_once_expression" => self.include(node, IncludeKind::IncludeOnce),
            "require_expression" => self.include(node, IncludeKind::Require),
            "require_once_expression" => self.include(node, IncludeKind::RequireOnce),
            "clone_expression" => NodeKind::ExprClone {
                expr: Box::new(self.first_child_expr(node)),
            },
            "error_suppression_expression" => NodeKind::ExprErrorSuppress {
                expr: Box::new(self.first_child_expr(node)),
            },
            "print_intrinsic" => NodeKind::ExprPrint {
                expr: Box::new(self.first_child_expr(node)),
            },
            "shell_command_expression" => NodeKind::ExprShellExec {
                parts: self.encapsed_parts(node),
            },
            "yield_expression" => {
                if self.has_token(node, "from") {
                    return self.unknown(node, "yield from is not lowered");
                }
                let kids = self.named_children(node);
                match kids.len() {
                    0 => NodeKind::ExprYield {
                        key: None,
                        value: None,
                    },
                    1 => NodeKind::ExprYield {
                        key: None,
                        value: Some(Box::new(self.expression(kids[0]))),
                    },
                    _ => NodeKind::ExprYield {
                        key: Some(Box::new(self.expression(kids[0]))),
                        value: Some(Box::new(self.expression(kids[1]))),
                    },
                }
            }
            "throw_expression" => return self.unknown(node, "throw in expression position"),
            "match_expression" => return self.unknown(node, "match is not lowered"),
            "integer" | "float" => NodeKind::ScalarNumber {
                raw: self.text(node).to_string(),
            },
            "boolean" => {
                return self.const_name(span, self.text(node).to_lowercase());
            }
            "null" => {
                return self.const_name(span, "null".to_string());
            }
            "string" | "nowdoc" => NodeKind::ScalarString {
                value: strip_quotes(self.text(node)),
            },
            "encapsed_string" => NodeKind::ScalarEncapsed {
                parts: self.encapsed_parts(node),
            },
            "heredoc" => {
                let body = self
                    .named_children(node)
                    .into_iter()
                    .find(|c| c.kind() == "heredoc_body");
                let parts = match body {
                    Some(b) => self.encapsed_parts(b),
                    None => Vec::new(),
                };
                NodeKind::ScalarHeredoc { parts }
            }
            "name" | "qualified_name" | "relative_scope" => {
                let name = self.name_node(node);
                if let NodeKind::Name { parts, .. } = &name.kind {
                    if parts.len() == 1 && is_magic_constant(&parts[0]) {
                        return Node::new(
                            NodeKind::ScalarMagicConstant {
                                name: parts[0].clone(),
                            },
                            span,
                        );
                    }
                }
                NodeKind::ExprConstFetch {
                    name: Box::new(name),
                }
            }
            "ERROR" => return self.unknown(node, "syntax error"),
            _ => return self.unknown(node, "unrecognized expression"),
        };
        Node::new(kind, span)
    }

    fn const_name(&mut self, span: Span, name: String) -> Node {
        Node::new(
            NodeKind::ExprConstFetch {
                name: Box::new(Node::new(
                    NodeKind::Name {
                        parts: vec![name],
                        form: NameForm::Normal,
                    },
                    span,
                )),
            },
            span,
        )
    }

    fn include(&mut self, node: TsNode<'_>, kind: IncludeKind) -> NodeKind {
        NodeKind::ExprInclude {
            kind,
            expr: Box::new(self.first_child_expr(node)),
        }
    }

    fn first_child_expr(&mut self, node: TsNode<'_>) -> Node {
        self.named_children(node)
            .into_iter()
            .next()
            .map(|c| self.expression(c))
            .unwrap_or_else(|| self.unknown(node, "missing operand"))
    }

    fn field_expr(&mut self, node: TsNode<'_>, field: &str) -> Node {
        match node.child_by_field_name(field) {
            Some(c) => self.expression(c),
            None => self.unknown(node, "missing field"),
        }
    }

    /// Fields that hold either a plain name or an arbitrary expression
    /// (callee names, member names, class designators).
    fn field_name_or_expr(&mut self, node: TsNode<'_>, field: &str) -> Node {
        match node.child_by_field_name(field) {
            Some(c) => self.field_name_like(c),
            None => self.unknown(node, "missing field"),
        }
    }

    fn field_name_like(&mut self, node: TsNode<'_>) -> Node {
        match node.kind() {
            "name" | "qualified_name" | "relative_scope" => self.name_node(node),
            _ => self.expression(node),
        }
    }

    /// `isset`, `empty`, `eval`, `exit` and `die` parse as ordinary calls
    /// but lower to dedicated nodes.
    fn intrinsic_or_call(&mut self, function: Node, args: Vec<Node>, span: Span) -> Node {
        let callee = match &function.kind {
            NodeKind::Name { parts, .. } if parts.len() == 1 => parts[0].to_lowercase(),
            _ => String::new(),
        };
        let arg_expr = |arg: &Node| -> Option<Box<Node>> {
            match &arg.kind {
                NodeKind::Argument { expr } => Some(expr.clone()),
                _ => None,
            }
        };
        let kind = match callee.as_str() {
            "isset" => NodeKind::ExprIsset {
                vars: args
                    .iter()
                    .filter_map(|a| arg_expr(a).map(|b| *b))
                    .collect(),
            },
            "empty" => match args.first().and_then(arg_expr) {
                Some(expr) => NodeKind::ExprEmpty { expr },
                None => return self.missing_arg(span, "empty"),
            },
            "eval" => match args.first().and_then(arg_expr) {
                Some(expr) => NodeKind::ExprEval { expr },
                None => return self.missing_arg(span, "eval"),
            },
            "exit" | "die" => NodeKind::ExprExit {
                expr: args.first().and_then(arg_expr),
            },
            _ => NodeKind::ExprFunctionCall {
                function: Box::new(function),
                args,
            },
        };
        Node::new(kind, span)
    }

    fn missing_arg(&mut self, span: Span, construct: &str) -> Node {
        self.diagnostics.push(ParseDiagnostic {
            message: format!("{construct} without argument"),
            span,
        });
        Node::new(
            NodeKind::ExprUnknown {
                construct: construct.to_string(),
            },
            span,
        )
    }

    fn arguments(&mut self, node: TsNode<'_>) -> Vec<Node> {
        // `new C(...)` holds its argument list as a plain child
        let list = node.child_by_field_name("arguments").or_else(|| {
            self.named_children(node)
                .into_iter()
                .find(|c| c.kind() == "arguments")
        });
        let Some(list) = list else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for arg in self.named_children(list) {
            let aspan = span_of(arg);
            match arg.kind() {
                "argument" => {
                    // named-argument labels are ignored; the value is the
                    // last expression child
                    let expr = self
                        .named_children(arg)
                        .into_iter()
                        .last()
                        .map(|c| self.expression(c))
                        .unwrap_or_else(|| self.unknown(arg, "empty argument"));
                    out.push(Node::new(
                        NodeKind::Argument {
                            expr: Box::new(expr),
                        },
                        aspan,
                    ));
                }
                "variadic_unpacking" => {
                    let expr = self.first_child_expr(arg);
                    out.push(Node::new(
                        NodeKind::Argument {
                            expr: Box::new(expr),
                        },
                        aspan,
                    ));
                }
                _ => {
                    let expr = self.expression(arg);
                    out.push(Node::new(
                        NodeKind::Argument {
                            expr: Box::new(expr),
                        },
                        aspan,
                    ));
                }
            }
        }
        out
    }

    fn array_items(&mut self, node: TsNode<'_>) -> Vec<Node> {
        let mut out = Vec::new();
        for item in self.named_children(node) {
            let ispan = span_of(item);
            match item.kind() {
                "array_element_initializer" => {
                    let by_ref = self.has_token(item, "&");
                    let kids: Vec<_> = self
                        .named_children(item)
                        .into_iter()
                        .filter(|c| c.kind() != "by_ref")
                        .collect();
                    let (key, value) = if self.has_token(item, "=>") && kids.len() >= 2 {
                        (
                            Some(Box::new(self.expression(kids[0]))),
                            Some(Box::new(self.expression(kids[1]))),
                        )
                    } else {
                        (
                            None,
                            kids.first().map(|c| Box::new(self.expression(*c))),
                        )
                    };
                    out.push(Node::new(
                        NodeKind::ArrayItem { key, value, by_ref },
                        ispan,
                    ));
                }
                _ => {
                    let value = self.expression(item);
                    out.push(Node::new(
                        NodeKind::ArrayItem {
                            key: None,
                            value: Some(Box::new(value)),
                            by_ref: false,
                        },
                        ispan,
                    ));
                }
            }
        }
        out
    }

    fn encapsed_parts(&mut self, node: TsNode<'_>) -> Vec<Node> {
        let mut parts = Vec::new();
        for child in self.named_children(node) {
            let cspan = span_of(child);
            match child.kind() {
                "string_content" => parts.push(Node::new(
                    NodeKind::ScalarEncapsedPart {
                        value: self.text(child).to_string(),
                    },
                    cspan,
                )),
                "escape_sequence" => parts.push(Node::new(
                    NodeKind::ScalarEncapsedPart {
                        value: unescape(self.text(child)),
                    },
                    cspan,
                )),
                _ => parts.push(self.expression(child)),
            }
        }
        parts
    }
}

fn assign_op(op: &str) -> Option<AssignOp> {
    Some(match op {
        "+=" => AssignOp::Plus,
        "-=" => AssignOp::Minus,
        "*=" => AssignOp::Mul,
        "/=" => AssignOp::Div,
        "%=" => AssignOp::Mod,
        "**=" => AssignOp::Pow,
        ".=" => AssignOp::Concat,
        "&=" => AssignOp::BitwiseAnd,
        "|=" => AssignOp::BitwiseOr,
        "^=" => AssignOp::BitwiseXor,
        "<<=" => AssignOp::ShiftLeft,
        ">>=" => AssignOp::ShiftRight,
        "??=" => AssignOp::Coalesce,
        _ => return None,
    })
}

fn binary_op(op: &str) -> Option<BinaryOp> {
    Some(match op {
        "&&" => BinaryOp::BooleanAnd,
        "||" => BinaryOp::BooleanOr,
        "and" => BinaryOp::LogicalAnd,
        "or" => BinaryOp::LogicalOr,
        "xor" => BinaryOp::LogicalXor,
        "??" => BinaryOp::Coalesce,
        "." => BinaryOp::Concat,
        "==" => BinaryOp::Equal,
        "!=" | "<>" => BinaryOp::NotEqual,
        "===" => BinaryOp::Identical,
        "!==" => BinaryOp::NotIdentical,
        "<" => BinaryOp::Smaller,
        "<=" => BinaryOp::SmallerOrEqual,
        ">" => BinaryOp::Greater,
        ">=" => BinaryOp::GreaterOrEqual,
        "<=>" => BinaryOp::Spaceship,
        "+" => BinaryOp::Plus,
        "-" => BinaryOp::Minus,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Mod,
        "**" => BinaryOp::Pow,
        "<<" => BinaryOp::ShiftLeft,
        ">>" => BinaryOp::ShiftRight,
        "&" => BinaryOp::BitwiseAnd,
        "|" => BinaryOp::BitwiseOr,
        "^" => BinaryOp::BitwiseXor,
        _ => return None,
    })
}

fn cast_kind(ty: &str) -> Option<CastKind> {
    Some(match ty {
        "int" | "integer" => CastKind::Int,
        "bool" | "boolean" => CastKind::Bool,
        "float" | "double" | "real" => CastKind::Double,
        "string" | "binary" => CastKind::String,
        "array" => CastKind::Array,
        "object" => CastKind::Object,
        "unset" => CastKind::Unset,
        _ => return None,
    })
}

fn is_magic_constant(name: &str) -> bool {
    matches!(
        name,
        "__CLASS__"
            | "__TRAIT__"
            | "__NAMESPACE__"
            | "__FUNCTION__"
            | "__METHOD__"
            | "__LINE__"
            | "__FILE__"
            | "__DIR__"
    )
}

fn strip_quotes(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'\'' || bytes[0] == b'"') && bytes[bytes.len() - 1] == bytes[0]
    {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.to_string()
    }
}

fn unescape(seq: &str) -> String {
    match seq {
        "\\n" => "\n".to_string(),
        "\\t" => "\t".to_string(),
        "\\r" => "\r".to_string(),
        "\\\"" => "\"".to_string(),
        "\\\\" => "\\".to_string(),
        "\\$" => "$".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_stmts(src: &str) -> Vec<Node> {
        let out = parse_php(src.as_bytes(), "test.php").unwrap();
        out.stmts
            .into_iter()
            .filter(|n| !matches!(n.kind, NodeKind::StmtInlineHtml))
            .collect()
    }

    #[test]
    fn parses_echo_of_superglobal_fetch() {
        let stmts = parse_stmts("<?php echo $_GET['x']; ?>");
        assert_eq!(stmts.len(), 1);
        let NodeKind::StmtEcho { exprs } = &stmts[0].kind else {
            panic!("expected echo, got {}", stmts[0].kind_name());
        };
        assert_eq!(exprs.len(), 1);
        let NodeKind::ExprArrayDimFetch { var, dim } = &exprs[0].kind else {
            panic!("expected dim fetch, got {}", exprs[0].kind_name());
        };
        let NodeKind::ExprVariable { name } = &var.kind else {
            panic!("expected variable base");
        };
        assert_eq!(
            ast::name_to_string(name).as_deref(),
            Some("$_GET"),
            "variable names keep their sigil"
        );
        let dim = dim.as_ref().expect("string key");
        assert_eq!(
            dim.kind,
            NodeKind::ScalarString {
                value: "x".to_string()
            }
        );
    }

    #[test]
    fn parses_assignment_and_call() {
        let stmts = parse_stmts("<?php $a = htmlspecialchars($b, ENT_QUOTES); ?>");
        let NodeKind::StmtExpression { expr } = &stmts[0].kind else {
            panic!("expected expression statement");
        };
        let NodeKind::ExprAssign { expr: rhs, .. } = &expr.kind else {
            panic!("expected assignment");
        };
        let NodeKind::ExprFunctionCall { function, args } = &rhs.kind else {
            panic!("expected call, got {}", rhs.kind_name());
        };
        assert_eq!(ast::name_to_string(function).as_deref(), Some("htmlspecialchars"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn spans_are_one_based_lines_and_byte_offsets() {
        let src = "<?php\necho $x;\n";
        let stmts = parse_stmts(src);
        let echo = &stmts[0];
        assert_eq!(echo.span.start_line, 2);
        assert_eq!(
            &src[echo.span.start_byte as usize..echo.span.end_byte as usize],
            "echo $x;"
        );
    }

    #[test]
    fn loop_bodies_become_statement_lists() {
        let stmts = parse_stmts("<?php while ($a) echo $a; ?>");
        let NodeKind::StmtWhile { stmt, .. } = &stmts[0].kind else {
            panic!("expected while");
        };
        assert!(matches!(stmt.kind, NodeKind::StmtList { .. }));
    }

    #[test]
    fn collects_diagnostics_instead_of_failing() {
        let out = parse_php(b"<?php if ( { ?>", "broken.php").unwrap();
        assert!(!out.diagnostics.is_empty());
    }
}
