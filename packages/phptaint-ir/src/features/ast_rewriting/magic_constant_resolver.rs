//! Magic-constant folding.
//!
//! `__CLASS__`, `__TRAIT__`, `__NAMESPACE__`, `__FUNCTION__`, `__METHOD__`
//! become string literals of the innermost enclosing scope (empty outside);
//! `__LINE__` becomes the node's start line, `__FILE__` the file name,
//! `__DIR__` its parent directory. `self` and `parent` names rewrite to
//! fully-qualified names of the enclosing class and its parent.

use std::path::Path;

use crate::features::ast_rewriting::traverser::{NodeRewriter, Rewrite};
use crate::features::parsing::domain::ast::{name_parts, Node};
use crate::features::parsing::domain::{NameForm, NodeKind};
use crate::shared::models::IrError;

pub struct MagicConstantResolver {
    class_stack: Vec<String>,
    parent_stack: Vec<String>,
    function_stack: Vec<String>,
    method_stack: Vec<String>,
    curr_namespace: String,
    filename: String,
}

impl MagicConstantResolver {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            class_stack: Vec::new(),
            parent_stack: Vec::new(),
            function_stack: Vec::new(),
            method_stack: Vec::new(),
            curr_namespace: String::new(),
            filename: filename.into(),
        }
    }

    fn string_node(span: crate::shared::models::Span, value: String) -> Node {
        Node::new(NodeKind::ScalarString { value }, span)
    }
}

impl NodeRewriter for MagicConstantResolver {
    fn enter(&mut self, node: &mut Node) -> Result<Rewrite, IrError> {
        let span = node.span;
        match &node.kind {
            NodeKind::StmtClass { name, extends, .. } => {
                self.class_stack.push(name.clone());
                let parent = extends
                    .as_deref()
                    .and_then(|e| match &e.kind {
                        NodeKind::Name { parts, .. } => Some(parts.join("\\")),
                        _ => None,
                    })
                    .unwrap_or_default();
                self.parent_stack.push(parent);
            }
            NodeKind::StmtTrait { name, .. } | NodeKind::StmtInterface { name, .. } => {
                self.class_stack.push(name.clone());
                self.parent_stack.push(String::new());
            }
            NodeKind::StmtClassMethod { name, .. } => {
                self.function_stack.push(name.clone());
                let class = self.class_stack.last().cloned().unwrap_or_default();
                self.method_stack.push(format!("{class}::{name}"));
            }
            NodeKind::StmtFunction { name, .. } => {
                self.function_stack.push(name.clone());
            }
            NodeKind::StmtNamespace { name, .. } => {
                self.curr_namespace = name
                    .as_deref()
                    .and_then(|n| match &n.kind {
                        NodeKind::Name { parts, .. } => Some(parts.join("\\")),
                        _ => None,
                    })
                    .unwrap_or_default();
            }
            NodeKind::Name { parts, .. } if parts.len() == 1 => {
                let part = parts[0].to_lowercase();
                if part == "self" {
                    let class = self.class_stack.last().cloned().unwrap_or_default();
                    return Ok(Rewrite::Replace(Node::new(
                        NodeKind::Name {
                            parts: name_parts(&class),
                            form: NameForm::FullyQualified,
                        },
                        span,
                    )));
                } else if part == "parent" {
                    let parent = self.parent_stack.last().cloned().unwrap_or_default();
                    return Ok(Rewrite::Replace(Node::new(
                        NodeKind::Name {
                            parts: name_parts(&parent),
                            form: NameForm::FullyQualified,
                        },
                        span,
                    )));
                }
            }
            NodeKind::ScalarMagicConstant { name } => {
                let replacement = match name.as_str() {
                    "__CLASS__" | "__TRAIT__" => Self::string_node(
                        span,
                        self.class_stack.last().cloned().unwrap_or_default(),
                    ),
                    "__NAMESPACE__" => Self::string_node(span, self.curr_namespace.clone()),
                    "__FUNCTION__" => Self::string_node(
                        span,
                        self.function_stack.last().cloned().unwrap_or_default(),
                    ),
                    "__METHOD__" => Self::string_node(
                        span,
                        self.method_stack.last().cloned().unwrap_or_default(),
                    ),
                    "__LINE__" => Node::new(
                        NodeKind::ScalarNumber {
                            raw: span.start_line.to_string(),
                        },
                        span,
                    ),
                    "__FILE__" => Self::string_node(span, self.filename.clone()),
                    "__DIR__" => {
                        let dir = Path::new(&self.filename)
                            .parent()
                            .map(|p| p.to_string_lossy().into_owned())
                            .filter(|p| !p.is_empty())
                            .unwrap_or_else(|| ".".to_string());
                        Self::string_node(span, dir)
                    }
                    other => {
                        tracing::warn!(constant = other, "unrecognized magic constant");
                        return Ok(Rewrite::Keep);
                    }
                };
                return Ok(Rewrite::Replace(replacement));
            }
            _ => {}
        }
        Ok(Rewrite::Keep)
    }

    fn leave(&mut self, node: &mut Node) -> Result<Rewrite, IrError> {
        match &node.kind {
            NodeKind::StmtClass { .. }
            | NodeKind::StmtTrait { .. }
            | NodeKind::StmtInterface { .. } => {
                self.class_stack.pop();
                self.parent_stack.pop();
            }
            NodeKind::StmtFunction { .. } => {
                self.function_stack.pop();
            }
            NodeKind::StmtClassMethod { .. } => {
                self.function_stack.pop();
                self.method_stack.pop();
            }
            NodeKind::StmtNamespace { stmts, .. } => {
                if !stmts.is_empty() {
                    self.curr_namespace.clear();
                }
            }
            _ => {}
        }
        Ok(Rewrite::Keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast_rewriting::AstTraverser;
    use crate::features::parsing::infrastructure::parse_php;

    fn rewrite(src: &str) -> Vec<Node> {
        let mut stmts = parse_php(src.as_bytes(), "dir/file.php").unwrap().stmts;
        let mut t = AstTraverser::new();
        t.add_rewriter(Box::new(MagicConstantResolver::new("dir/file.php")));
        t.traverse(&mut stmts).unwrap();
        stmts
    }

    fn first_echo_value(nodes: &[Node]) -> Option<Node> {
        for n in nodes {
            match &n.kind {
                NodeKind::StmtEcho { exprs } => return exprs.first().cloned(),
                NodeKind::StmtFunction { stmts, .. } => {
                    if let Some(v) = first_echo_value(stmts) {
                        return Some(v);
                    }
                }
                _ => {}
            }
        }
        None
    }

    #[test]
    fn line_becomes_number() {
        let stmts = rewrite("<?php\necho __LINE__;\n");
        let value = first_echo_value(&stmts).unwrap();
        assert_eq!(
            value.kind,
            NodeKind::ScalarNumber {
                raw: "2".to_string()
            }
        );
    }

    #[test]
    fn file_and_dir_fold_to_strings() {
        let stmts = rewrite("<?php echo __FILE__; ?>");
        let value = first_echo_value(&stmts).unwrap();
        assert_eq!(
            value.kind,
            NodeKind::ScalarString {
                value: "dir/file.php".to_string()
            }
        );
        let stmts = rewrite("<?php echo __DIR__; ?>");
        let value = first_echo_value(&stmts).unwrap();
        assert_eq!(
            value.kind,
            NodeKind::ScalarString {
                value: "dir".to_string()
            }
        );
    }

    #[test]
    fn function_scope_tracks_the_stack() {
        let stmts = rewrite("<?php function f() { echo __FUNCTION__; } ?>");
        let value = first_echo_value(&stmts).unwrap();
        assert_eq!(
            value.kind,
            NodeKind::ScalarString {
                value: "f".to_string()
            }
        );
    }
}
