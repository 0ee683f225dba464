//! Generic AST rewrite traverser.
//!
//! Rewriters are stacked and run in a single depth-first walk with enter and
//! leave hooks. A hook can replace the current node or, when leaving a node
//! that sits in a statement list, insert a new node after it. Replacement is
//! only accepted when old and new node agree on the statement/expression
//! classification; a mismatch is a fatal error.

use crate::features::parsing::domain::ast::Node;
use crate::features::parsing::domain::NodeKind;
use crate::shared::models::IrError;

/// Outcome of an enter/leave hook.
pub enum Rewrite {
    Keep,
    Replace(Node),
    InsertAfter(Node),
}

pub trait NodeRewriter {
    fn enter(&mut self, node: &mut Node) -> Result<Rewrite, IrError> {
        let _ = node;
        Ok(Rewrite::Keep)
    }

    fn leave(&mut self, node: &mut Node) -> Result<Rewrite, IrError> {
        let _ = node;
        Ok(Rewrite::Keep)
    }
}

pub struct AstTraverser {
    rewriters: Vec<Box<dyn NodeRewriter>>,
}

impl AstTraverser {
    pub fn new() -> Self {
        Self {
            rewriters: Vec::new(),
        }
    }

    pub fn add_rewriter(&mut self, rewriter: Box<dyn NodeRewriter>) {
        self.rewriters.push(rewriter);
    }

    pub fn traverse(&mut self, stmts: &mut Vec<Node>) -> Result<(), IrError> {
        self.walk_nodes(stmts)
    }

    fn replace(old: &mut Node, new: Node) -> Result<(), IrError> {
        if old.is_statement() != new.is_statement() {
            return Err(IrError::InvalidReplacement {
                old: old.kind_name(),
                new: new.kind_name(),
            });
        }
        *old = new;
        Ok(())
    }

    /// Walk a node outside any list context: insertion is invalid here.
    fn walk_node(&mut self, node: &mut Node) -> Result<(), IrError> {
        for i in 0..self.rewriters.len() {
            match self.rewriters[i].enter(node)? {
                Rewrite::Keep => {}
                Rewrite::Replace(new) => return Self::replace(node, new),
                Rewrite::InsertAfter(_) => {
                    return Err(IrError::InvalidInsertion {
                        node: node.kind_name(),
                    })
                }
            }
        }
        self.walk_children(node)?;
        for i in 0..self.rewriters.len() {
            match self.rewriters[i].leave(node)? {
                Rewrite::Keep => {}
                Rewrite::Replace(new) => return Self::replace(node, new),
                Rewrite::InsertAfter(_) => {
                    return Err(IrError::InvalidInsertion {
                        node: node.kind_name(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Walk a node list; leave hooks may insert new nodes after the current
    /// one. Insertions land after the whole sweep so indices stay stable.
    fn walk_nodes(&mut self, nodes: &mut Vec<Node>) -> Result<(), IrError> {
        let mut inserted: Vec<(usize, Node)> = Vec::new();
        for idx in 0..nodes.len() {
            let mut replaced = false;
            for i in 0..self.rewriters.len() {
                match self.rewriters[i].enter(&mut nodes[idx])? {
                    Rewrite::Keep => {}
                    Rewrite::Replace(new) => {
                        Self::replace(&mut nodes[idx], new)?;
                        replaced = true;
                        break;
                    }
                    Rewrite::InsertAfter(_) => {
                        return Err(IrError::InvalidInsertion {
                            node: nodes[idx].kind_name(),
                        })
                    }
                }
            }
            if replaced {
                continue;
            }
            self.walk_children(&mut nodes[idx])?;
            for i in 0..self.rewriters.len() {
                match self.rewriters[i].leave(&mut nodes[idx])? {
                    Rewrite::Keep => {}
                    Rewrite::Replace(new) => {
                        Self::replace(&mut nodes[idx], new)?;
                        break;
                    }
                    Rewrite::InsertAfter(new) => inserted.push((idx, new)),
                }
            }
        }
        for (idx, node) in inserted.into_iter().rev() {
            if idx + 1 <= nodes.len() {
                nodes.insert(idx + 1, node);
            } else {
                nodes.push(node);
            }
        }
        Ok(())
    }

    fn walk_opt(&mut self, node: &mut Option<Box<Node>>) -> Result<(), IrError> {
        if let Some(n) = node {
            self.walk_node(n)?;
        }
        Ok(())
    }

    fn walk_children(&mut self, node: &mut Node) -> Result<(), IrError> {
        use NodeKind::*;
        match &mut node.kind {
            Identifier { .. }
            | Name { .. }
            | ScalarString { .. }
            | ScalarNumber { .. }
            | ScalarEncapsedPart { .. }
            | ScalarMagicConstant { .. }
            | ExprUnknown { .. }
            | StmtBreak { level: None }
            | StmtContinue { level: None }
            | StmtGoto { .. }
            | StmtLabel { .. }
            | StmtNop
            | StmtInlineHtml => Ok(()),

            ScalarEncapsed { parts } | ScalarHeredoc { parts } | ExprShellExec { parts } => {
                self.walk_nodes(parts)
            }

            ExprVariable { name } => self.walk_node(name),
            ExprAssign { var, expr }
            | ExprAssignRef { var, expr }
            | ExprAssignOp { var, expr, .. } => {
                self.walk_node(var)?;
                self.walk_node(expr)
            }
            ExprBinary { left, right, .. } => {
                self.walk_node(left)?;
                self.walk_node(right)
            }
            ExprUnary { expr, .. }
            | ExprCast { expr, .. }
            | ExprEmpty { expr }
            | ExprEval { expr }
            | ExprInclude { expr, .. }
            | ExprClone { expr }
            | ExprErrorSuppress { expr }
            | ExprPrint { expr } => self.walk_node(expr),
            ExprPreInc { var } | ExprPreDec { var } | ExprPostInc { var } | ExprPostDec { var } => {
                self.walk_node(var)
            }
            ExprTernary {
                cond,
                if_true,
                if_false,
            } => {
                self.walk_node(cond)?;
                self.walk_opt(if_true)?;
                self.walk_node(if_false)
            }
            ExprArray { items } | ExprList { items } => self.walk_nodes(items),
            ArrayItem { key, value, .. } => {
                self.walk_opt(key)?;
                self.walk_opt(value)
            }
            ExprArrayDimFetch { var, dim } => {
                self.walk_node(var)?;
                self.walk_opt(dim)
            }
            ExprPropertyFetch { var, prop, .. } => {
                self.walk_node(var)?;
                self.walk_node(prop)
            }
            ExprStaticPropertyFetch { class, prop } => {
                self.walk_node(class)?;
                self.walk_node(prop)
            }
            ExprFunctionCall { function, args } => {
                self.walk_node(function)?;
                self.walk_nodes(args)
            }
            ExprMethodCall {
                var, method, args, ..
            } => {
                self.walk_node(var)?;
                self.walk_node(method)?;
                self.walk_nodes(args)
            }
            ExprStaticCall { class, call, args } => {
                self.walk_node(class)?;
                self.walk_node(call)?;
                self.walk_nodes(args)
            }
            Argument { expr } => self.walk_node(expr),
            ExprNew { class, args } => {
                self.walk_node(class)?;
                self.walk_nodes(args)
            }
            ExprClosure {
                params,
                uses,
                return_type,
                stmts,
                ..
            } => {
                self.walk_nodes(params)?;
                self.walk_nodes(uses)?;
                self.walk_opt(return_type)?;
                self.walk_nodes(stmts)
            }
            ClosureUse { var, .. } => self.walk_node(var),
            ExprArrowFunction {
                params,
                return_type,
                expr,
                ..
            } => {
                self.walk_nodes(params)?;
                self.walk_opt(return_type)?;
                self.walk_node(expr)
            }
            ExprIsset { vars } => self.walk_nodes(vars),
            ExprExit { expr } => self.walk_opt(expr),
            ExprInstanceOf { expr, class } => {
                self.walk_node(expr)?;
                self.walk_node(class)
            }
            ExprConstFetch { name } => self.walk_node(name),
            ExprClassConstFetch { class, name } => {
                self.walk_node(class)?;
                self.walk_node(name)
            }
            ExprYield { key, value } => {
                self.walk_opt(key)?;
                self.walk_opt(value)
            }
            TypeNullable { ty } => self.walk_node(ty),
            TypeUnion { types } => self.walk_nodes(types),

            StmtList { stmts } => self.walk_nodes(stmts),
            StmtExpression { expr } => self.walk_node(expr),
            StmtEcho { exprs } => self.walk_nodes(exprs),
            StmtIf {
                cond,
                stmt,
                elseifs,
                else_stmt,
            } => {
                self.walk_node(cond)?;
                self.walk_node(stmt)?;
                self.walk_nodes(elseifs)?;
                self.walk_opt(else_stmt)
            }
            StmtElseIf { cond, stmt } => {
                self.walk_node(cond)?;
                self.walk_node(stmt)
            }
            StmtElse { stmt } => self.walk_node(stmt),
            StmtWhile { cond, stmt } => {
                self.walk_node(cond)?;
                self.walk_node(stmt)
            }
            StmtDo { stmt, cond } => {
                self.walk_node(stmt)?;
                self.walk_node(cond)
            }
            StmtFor {
                init,
                cond,
                step,
                stmt,
            } => {
                self.walk_nodes(init)?;
                self.walk_nodes(cond)?;
                self.walk_nodes(step)?;
                self.walk_node(stmt)
            }
            StmtForeach {
                expr,
                key,
                var,
                stmt,
                ..
            } => {
                self.walk_node(expr)?;
                self.walk_opt(key)?;
                self.walk_node(var)?;
                self.walk_node(stmt)
            }
            StmtSwitch { cond, cases } => {
                self.walk_node(cond)?;
                self.walk_nodes(cases)
            }
            StmtCase { cond, stmts } => {
                self.walk_node(cond)?;
                self.walk_nodes(stmts)
            }
            StmtDefault { stmts } => self.walk_nodes(stmts),
            StmtBreak { level } | StmtContinue { level } => self.walk_opt(level),
            StmtReturn { expr } => self.walk_opt(expr),
            StmtThrow { expr } => self.walk_node(expr),
            StmtFunction {
                params,
                return_type,
                stmts,
                ..
            }
            | StmtClassMethod {
                params,
                return_type,
                stmts,
                ..
            } => {
                self.walk_nodes(params)?;
                self.walk_opt(return_type)?;
                self.walk_nodes(stmts)
            }
            Param { ty, default, .. } => {
                self.walk_opt(ty)?;
                self.walk_opt(default)
            }
            StmtClass {
                extends,
                implements,
                stmts,
                ..
            } => {
                self.walk_opt(extends)?;
                self.walk_nodes(implements)?;
                self.walk_nodes(stmts)
            }
            StmtInterface { extends, stmts, .. } => {
                self.walk_nodes(extends)?;
                self.walk_nodes(stmts)
            }
            StmtTrait { stmts, .. } => self.walk_nodes(stmts),
            StmtPropertyList { ty, props, .. } => {
                self.walk_opt(ty)?;
                self.walk_nodes(props)
            }
            PropertyElement { default, .. } => self.walk_opt(default),
            StmtConstList { consts } => self.walk_nodes(consts),
            StmtConstant { expr, .. } => self.walk_node(expr),
            StmtTraitUse {
                traits,
                adaptations,
            } => {
                self.walk_nodes(traits)?;
                self.walk_nodes(adaptations)
            }
            TraitUseAlias { trait_name, .. } => self.walk_opt(trait_name),
            TraitUsePrecedence {
                trait_name,
                insteadof,
                ..
            } => {
                self.walk_opt(trait_name)?;
                self.walk_nodes(insteadof)
            }
            StmtGlobal { vars } | StmtStatic { vars } | StmtUnset { vars } => {
                self.walk_nodes(vars)
            }
            StmtStaticVar { var, default } => {
                self.walk_node(var)?;
                self.walk_opt(default)
            }
            StmtNamespace { name, stmts } => {
                self.walk_opt(name)?;
                self.walk_nodes(stmts)
            }
            StmtUse { uses, .. } => self.walk_nodes(uses),
            UseClause { name, .. } => self.walk_node(name),
            StmtGroupUse { prefix, uses, .. } => {
                self.walk_node(prefix)?;
                self.walk_nodes(uses)
            }
            StmtTry {
                stmts,
                catches,
                finally,
            } => {
                self.walk_nodes(stmts)?;
                self.walk_nodes(catches)?;
                self.walk_nodes(finally)
            }
            StmtCatch { types, var, stmts } => {
                self.walk_nodes(types)?;
                self.walk_opt(var)?;
                self.walk_nodes(stmts)
            }
        }
    }
}

impl Default for AstTraverser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::parsing::domain::NameForm;
    use crate::shared::models::Span;

    fn sp() -> Span {
        Span::new(1, 1, 0, 0)
    }

    /// Replaces every `StmtBreak` with a goto, inserts a label after loops.
    struct FakeLoopPass;

    impl NodeRewriter for FakeLoopPass {
        fn enter(&mut self, node: &mut Node) -> Result<Rewrite, IrError> {
            if matches!(node.kind, NodeKind::StmtBreak { .. }) {
                return Ok(Rewrite::Replace(Node::new(
                    NodeKind::StmtGoto {
                        label: "l".to_string(),
                    },
                    node.span,
                )));
            }
            Ok(Rewrite::Keep)
        }

        fn leave(&mut self, node: &mut Node) -> Result<Rewrite, IrError> {
            if matches!(node.kind, NodeKind::StmtWhile { .. }) {
                return Ok(Rewrite::InsertAfter(Node::new(
                    NodeKind::StmtLabel {
                        name: "l".to_string(),
                    },
                    node.span,
                )));
            }
            Ok(Rewrite::Keep)
        }
    }

    #[test]
    fn replaces_in_lists_and_inserts_after() {
        let body = Node::new(
            NodeKind::StmtList {
                stmts: vec![Node::new(NodeKind::StmtBreak { level: None }, sp())],
            },
            sp(),
        );
        let cond = Node::new(
            NodeKind::ExprConstFetch {
                name: Box::new(Node::new(
                    NodeKind::Name {
                        parts: vec!["true".into()],
                        form: NameForm::Normal,
                    },
                    sp(),
                )),
            },
            sp(),
        );
        let mut stmts = vec![Node::new(
            NodeKind::StmtWhile {
                cond: Box::new(cond),
                stmt: Box::new(body),
            },
            sp(),
        )];

        let mut t = AstTraverser::new();
        t.add_rewriter(Box::new(FakeLoopPass));
        t.traverse(&mut stmts).unwrap();

        assert_eq!(stmts.len(), 2, "label inserted after the loop");
        assert!(matches!(stmts[1].kind, NodeKind::StmtLabel { .. }));
        let NodeKind::StmtWhile { stmt, .. } = &stmts[0].kind else {
            unreachable!()
        };
        let NodeKind::StmtList { stmts: body } = &stmt.kind else {
            unreachable!()
        };
        assert!(matches!(body[0].kind, NodeKind::StmtGoto { .. }));
    }

    #[test]
    fn rejects_statement_for_expression_swap() {
        struct Bad;
        impl NodeRewriter for Bad {
            fn enter(&mut self, node: &mut Node) -> Result<Rewrite, IrError> {
                if matches!(node.kind, NodeKind::ScalarString { .. }) {
                    return Ok(Rewrite::Replace(Node::new(NodeKind::StmtNop, node.span)));
                }
                Ok(Rewrite::Keep)
            }
        }
        let mut stmts = vec![Node::new(
            NodeKind::StmtExpression {
                expr: Box::new(Node::new(
                    NodeKind::ScalarString {
                        value: "s".to_string(),
                    },
                    sp(),
                )),
            },
            sp(),
        )];
        let mut t = AstTraverser::new();
        t.add_rewriter(Box::new(Bad));
        assert!(t.traverse(&mut stmts).is_err());
    }
}
