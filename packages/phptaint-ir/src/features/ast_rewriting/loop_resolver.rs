//! Loop control-flow desugaring.
//!
//! `break` and `continue` become gotos targeting synthetic labels. Each loop
//! pushes a break label and a continue label; `switch` pushes a single label
//! onto both stacks so `break` and `continue` leave it the same way. On
//! leave, the continue label lands at the end of the loop body and the break
//! label is inserted after the loop statement.
//!
//! `break N;` / `continue N;` target the N-th label from the stack top; the
//! operand must be a positive integer within the nesting depth.

use crate::features::ast_rewriting::traverser::{NodeRewriter, Rewrite};
use crate::features::parsing::domain::ast::Node;
use crate::features::parsing::domain::NodeKind;
use crate::shared::models::IrError;

pub struct LoopResolver {
    label_counter: u32,
    break_stack: Vec<String>,
    cont_stack: Vec<String>,
}

impl LoopResolver {
    pub fn new() -> Self {
        Self {
            label_counter: 0,
            break_stack: Vec::new(),
            cont_stack: Vec::new(),
        }
    }

    fn fresh_label(&mut self) -> String {
        let label = format!("compiled_label_{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    fn goto_for(
        stack: &[String],
        level: &Option<Box<Node>>,
        construct: &'static str,
        span: crate::shared::models::Span,
    ) -> Result<Node, IrError> {
        let depth = match level {
            None => 1,
            Some(node) => match &node.kind {
                NodeKind::ScalarNumber { raw } => {
                    let n = raw.parse::<i64>().map_err(|_| IrError::BadLoopLevel {
                        construct,
                    })?;
                    if n <= 0 {
                        return Err(IrError::BadLoopLevel { construct });
                    }
                    n as usize
                }
                _ => return Err(IrError::BadLoopLevel { construct }),
            },
        };
        if depth > stack.len() {
            return Err(IrError::LoopLevelTooDeep {
                construct,
                level: depth as u32,
            });
        }
        let label = stack[stack.len() - depth].clone();
        Ok(Node::new(NodeKind::StmtGoto { label }, span))
    }
}

impl Default for LoopResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRewriter for LoopResolver {
    fn enter(&mut self, node: &mut Node) -> Result<Rewrite, IrError> {
        match &node.kind {
            NodeKind::StmtBreak { level } => {
                let goto = Self::goto_for(&self.break_stack, level, "break", node.span)?;
                Ok(Rewrite::Replace(goto))
            }
            NodeKind::StmtContinue { level } => {
                let goto = Self::goto_for(&self.cont_stack, level, "continue", node.span)?;
                Ok(Rewrite::Replace(goto))
            }
            NodeKind::StmtWhile { .. }
            | NodeKind::StmtDo { .. }
            | NodeKind::StmtFor { .. }
            | NodeKind::StmtForeach { .. } => {
                let brk = self.fresh_label();
                let cont = self.fresh_label();
                self.break_stack.push(brk);
                self.cont_stack.push(cont);
                Ok(Rewrite::Keep)
            }
            NodeKind::StmtSwitch { .. } => {
                // switch shares one label between break and continue
                let label = self.fresh_label();
                self.break_stack.push(label.clone());
                self.cont_stack.push(label);
                Ok(Rewrite::Keep)
            }
            _ => Ok(Rewrite::Keep),
        }
    }

    fn leave(&mut self, node: &mut Node) -> Result<Rewrite, IrError> {
        let span = node.span;
        match &mut node.kind {
            NodeKind::StmtWhile { stmt, .. }
            | NodeKind::StmtDo { stmt, .. }
            | NodeKind::StmtFor { stmt, .. }
            | NodeKind::StmtForeach { stmt, .. } => {
                let Some(cont) = self.cont_stack.pop() else {
                    return Ok(Rewrite::Keep);
                };
                let Some(brk) = self.break_stack.pop() else {
                    return Ok(Rewrite::Keep);
                };
                if let NodeKind::StmtList { stmts } = &mut stmt.kind {
                    stmts.push(Node::new(NodeKind::StmtLabel { name: cont }, span));
                }
                Ok(Rewrite::InsertAfter(Node::new(
                    NodeKind::StmtLabel { name: brk },
                    span,
                )))
            }
            NodeKind::StmtSwitch { .. } => {
                self.cont_stack.pop();
                match self.break_stack.pop() {
                    Some(brk) => Ok(Rewrite::InsertAfter(Node::new(
                        NodeKind::StmtLabel { name: brk },
                        span,
                    ))),
                    None => Ok(Rewrite::Keep),
                }
            }
            _ => Ok(Rewrite::Keep),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast_rewriting::AstTraverser;
    use crate::features::parsing::infrastructure::parse_php;

    fn rewrite(src: &str) -> Result<Vec<Node>, IrError> {
        let mut stmts = parse_php(src.as_bytes(), "t.php").unwrap().stmts;
        let mut t = AstTraverser::new();
        t.add_rewriter(Box::new(LoopResolver::new()));
        t.traverse(&mut stmts)?;
        Ok(stmts)
    }

    fn count_kind(nodes: &[Node], pred: &dyn Fn(&Node) -> bool) -> usize {
        let mut n = 0;
        for node in nodes {
            if pred(node) {
                n += 1;
            }
            if let NodeKind::StmtWhile { stmt, .. }
            | NodeKind::StmtFor { stmt, .. }
            | NodeKind::StmtForeach { stmt, .. }
            | NodeKind::StmtDo { stmt, .. } = &node.kind
            {
                if let NodeKind::StmtList { stmts } = &stmt.kind {
                    n += count_kind(stmts, pred);
                }
            }
            if let NodeKind::StmtIf { stmt, .. } = &node.kind {
                if let NodeKind::StmtList { stmts } = &stmt.kind {
                    n += count_kind(stmts, pred);
                }
            }
        }
        n
    }

    #[test]
    fn break_becomes_goto_and_labels_are_placed() {
        let stmts =
            rewrite("<?php for ($i=0;$i<10;$i++){ if ($i==5) break; } echo $x; ?>").unwrap();
        let gotos = count_kind(&stmts, &|n| matches!(n.kind, NodeKind::StmtGoto { .. }));
        assert_eq!(gotos, 1);
        let labels = count_kind(&stmts, &|n| matches!(n.kind, NodeKind::StmtLabel { .. }));
        assert_eq!(labels, 2, "continue label in body, break label after loop");
    }

    #[test]
    fn break_too_deep_is_an_error() {
        let err = rewrite("<?php while ($a) { break 2; } ?>").unwrap_err();
        assert!(matches!(err, IrError::LoopLevelTooDeep { .. }));
    }

    #[test]
    fn break_zero_is_an_error() {
        let err = rewrite("<?php while ($a) { break 0; } ?>").unwrap_err();
        assert!(matches!(err, IrError::BadLoopLevel { .. }));
    }
}
