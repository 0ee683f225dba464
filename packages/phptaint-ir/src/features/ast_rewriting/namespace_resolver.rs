//! Namespace resolution pass.
//!
//! Rewrites every name node into fully-qualified form against the current
//! namespace context and stamps class/function/const declarations with
//! their namespaced name. One-part builtins (`self`, `int`, the recognized
//! type predicates and filter-input functions, …) pass through unresolved —
//! downstream classifiers match them by their bare name.

use crate::features::ast_rewriting::namespace::Namespace;
use crate::features::ast_rewriting::traverser::{NodeRewriter, Rewrite};
use crate::features::parsing::domain::ast::{name_parts, Node};
use crate::features::parsing::domain::{NameForm, NodeKind};
use crate::shared::models::IrError;

pub struct NamespaceResolver {
    ctx: Namespace,
    anon_class_counter: u32,
}

impl NamespaceResolver {
    pub fn new() -> Self {
        Self {
            ctx: Namespace::new(""),
            anon_class_counter: 0,
        }
    }

    fn resolve_name_node(&self, node: &mut Node, alias_type: &str) {
        if let NodeKind::Name { parts, form } = &mut node.kind {
            let resolved = self.ctx.resolve_name(parts, *form, alias_type);
            *parts = name_parts(&resolved);
        }
    }

    fn resolve_opt(&self, node: &mut Option<Box<Node>>, alias_type: &str) {
        if let Some(n) = node {
            self.resolve_name_node(n, alias_type);
        }
    }

    fn resolve_type(&self, node: &mut Node) {
        match &mut node.kind {
            NodeKind::TypeNullable { ty } => self.resolve_type(ty),
            NodeKind::TypeUnion { types } => {
                for t in types {
                    self.resolve_type(t);
                }
            }
            NodeKind::Name { .. } => self.resolve_name_node(node, ""),
            _ => {}
        }
    }

    fn resolve_signature(
        &self,
        params: &mut [Node],
        return_type: &mut Option<Box<Node>>,
    ) {
        for param in params.iter_mut() {
            if let NodeKind::Param { ty: Some(ty), .. } = &mut param.kind {
                self.resolve_type(ty);
            }
        }
        if let Some(rt) = return_type {
            self.resolve_type(rt);
        }
    }
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRewriter for NamespaceResolver {
    fn enter(&mut self, node: &mut Node) -> Result<Rewrite, IrError> {
        match &mut node.kind {
            NodeKind::StmtNamespace { name, .. } => {
                let ns = name
                    .as_deref()
                    .and_then(|n| match &n.kind {
                        NodeKind::Name { parts, .. } => Some(parts.join("\\")),
                        _ => None,
                    })
                    .unwrap_or_default();
                self.ctx = Namespace::new(ns);
            }
            NodeKind::StmtUse { use_type, uses } => {
                let stmt_type = use_type.clone().unwrap_or_default();
                for clause in uses.iter() {
                    if let NodeKind::UseClause {
                        use_type,
                        name,
                        alias,
                    } = &clause.kind
                    {
                        if let NodeKind::Name { parts, .. } = &name.kind {
                            let ty = use_type.clone().unwrap_or_else(|| stmt_type.clone());
                            let full = parts.join("\\");
                            let alias = alias
                                .clone()
                                .or_else(|| parts.last().cloned())
                                .unwrap_or_default();
                            self.ctx.add_alias(&ty, &full, &alias);
                        }
                    }
                }
            }
            NodeKind::StmtGroupUse {
                use_type,
                prefix,
                uses,
            } => {
                let stmt_type = use_type.clone().unwrap_or_default();
                let prefix_str = match &prefix.kind {
                    NodeKind::Name { parts, .. } => parts.join("\\"),
                    _ => String::new(),
                };
                for clause in uses.iter() {
                    if let NodeKind::UseClause {
                        use_type,
                        name,
                        alias,
                    } = &clause.kind
                    {
                        if let NodeKind::Name { parts, .. } = &name.kind {
                            let ty = use_type.clone().unwrap_or_else(|| stmt_type.clone());
                            let full = format!("{}\\{}", prefix_str, parts.join("\\"));
                            let alias = alias
                                .clone()
                                .or_else(|| parts.last().cloned())
                                .unwrap_or_default();
                            self.ctx.add_alias(&ty, &full, &alias);
                        }
                    }
                }
            }
            NodeKind::StmtClass {
                name,
                extends,
                implements,
                ..
            } => {
                if let Some(e) = extends {
                    self.resolve_name_node(e, "");
                }
                for i in implements.iter_mut() {
                    self.resolve_name_node(i, "");
                }
                if name.is_empty() {
                    *name = format!("{{anonymousClass}}#{}", self.anon_class_counter);
                    self.anon_class_counter += 1;
                }
                *name = self.ctx.qualify(name);
            }
            NodeKind::StmtInterface { name, extends, .. } => {
                for e in extends.iter_mut() {
                    self.resolve_name_node(e, "");
                }
                *name = self.ctx.qualify(name);
            }
            NodeKind::StmtTrait { name, .. } => {
                *name = self.ctx.qualify(name);
            }
            NodeKind::StmtFunction {
                name,
                params,
                return_type,
                ..
            } => {
                *name = self.ctx.qualify(name);
                self.resolve_signature(params, return_type);
            }
            NodeKind::StmtClassMethod {
                params,
                return_type,
                ..
            } => {
                self.resolve_signature(params, return_type);
            }
            NodeKind::ExprClosure {
                params,
                return_type,
                ..
            }
            | NodeKind::ExprArrowFunction {
                params,
                return_type,
                ..
            } => {
                self.resolve_signature(params, return_type);
            }
            NodeKind::StmtPropertyList { ty, .. } => {
                if let Some(t) = ty {
                    self.resolve_type(t);
                }
            }
            NodeKind::StmtConstList { consts } => {
                for c in consts.iter_mut() {
                    if let NodeKind::StmtConstant { name, .. } = &mut c.kind {
                        *name = self.ctx.qualify(name);
                    }
                }
            }
            NodeKind::ExprStaticCall { class, .. }
            | NodeKind::ExprStaticPropertyFetch { class, .. }
            | NodeKind::ExprClassConstFetch { class, .. }
            | NodeKind::ExprNew { class, .. }
            | NodeKind::ExprInstanceOf { class, .. } => {
                self.resolve_name_node(class, "");
            }
            NodeKind::StmtCatch { types, .. } => {
                for t in types.iter_mut() {
                    self.resolve_name_node(t, "");
                }
            }
            NodeKind::ExprFunctionCall { function, .. } => {
                self.resolve_name_node(function, "function");
            }
            NodeKind::ExprConstFetch { name } => {
                self.resolve_name_node(name, "const");
            }
            NodeKind::StmtTraitUse {
                traits,
                adaptations,
            } => {
                for t in traits.iter_mut() {
                    self.resolve_name_node(t, "");
                }
                for a in adaptations.iter_mut() {
                    match &mut a.kind {
                        NodeKind::TraitUseAlias { trait_name, .. } => {
                            self.resolve_opt(trait_name, "")
                        }
                        NodeKind::TraitUsePrecedence {
                            trait_name,
                            insteadof,
                            ..
                        } => {
                            self.resolve_opt(trait_name, "");
                            for i in insteadof.iter_mut() {
                                self.resolve_name_node(i, "");
                            }
                        }
                        _ => {}
                    }
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

    fn resolved(src: &str) -> Vec<Node> {
        let mut out = parse_php(src.as_bytes(), "t.php").unwrap().stmts;
        let mut t = AstTraverser::new();
        t.add_rewriter(Box::new(NamespaceResolver::new()));
        t.traverse(&mut out).unwrap();
        out
    }

    fn find_call_name(nodes: &[Node]) -> Option<String> {
        for n in nodes {
            match &n.kind {
                NodeKind::StmtExpression { expr } => {
                    if let NodeKind::ExprFunctionCall { function, .. } = &expr.kind {
                        if let NodeKind::Name { parts, .. } = &function.kind {
                            return Some(parts.join("\\"));
                        }
                    }
                }
                NodeKind::StmtNamespace { stmts, .. } => {
                    if let Some(found) = find_call_name(stmts) {
                        return Some(found);
                    }
                }
                _ => {}
            }
        }
        None
    }

    #[test]
    fn qualifies_calls_inside_namespace() {
        let stmts = resolved("<?php namespace App; helper(); ?>");
        assert_eq!(find_call_name(&stmts).as_deref(), Some("App\\helper"));
    }

    #[test]
    fn type_predicates_stay_unqualified() {
        let stmts = resolved("<?php namespace App; is_int($x); ?>");
        assert_eq!(find_call_name(&stmts).as_deref(), Some("is_int"));
    }

    #[test]
    fn use_alias_applies_to_function_calls() {
        let stmts = resolved("<?php use function Vendor\\Lib\\esc; esc(); ?>");
        assert_eq!(find_call_name(&stmts).as_deref(), Some("Vendor\\Lib\\esc"));
    }
}
