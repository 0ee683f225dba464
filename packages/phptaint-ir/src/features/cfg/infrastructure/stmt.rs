//! Statement lowering: AST statements into blocks and ops.

use crate::features::cfg::domain::{
    BinaryOpKind, BlockId, Func, FuncFlags, OpKind, OperandId, OperandKind, UnaryOpKind,
    VarScope,
};
use crate::features::parsing::domain::ast::Node;
use crate::features::parsing::domain::NodeKind;
use crate::shared::models::IrError;

use super::builder::{CfgBuilder, ParserMode};

/// View a lowered body as a statement slice: rewritten bodies are
/// `StmtList`s, anything else counts as a single statement.
fn stmt_slice(node: &Node) -> &[Node] {
    match &node.kind {
        NodeKind::StmtList { stmts } => stmts,
        _ => std::slice::from_ref(node),
    }
}

impl CfgBuilder {
    /// Lower a statement list into `block`, returning the block the control
    /// flow ends in.
    pub(crate) fn parse_stmt_nodes(
        &mut self,
        nodes: &[Node],
        block: BlockId,
    ) -> Result<BlockId, IrError> {
        let saved = std::mem::replace(&mut self.current_block, block);
        for node in nodes {
            self.parse_stmt_node(node)?;
        }
        let end = std::mem::replace(&mut self.current_block, saved);
        Ok(end)
    }

    pub(crate) fn parse_stmt_node(&mut self, node: &Node) -> Result<(), IrError> {
        match &node.kind {
            NodeKind::StmtExpression { expr } => {
                self.parse_expr_node(expr)?;
            }
            NodeKind::StmtEcho { exprs } => {
                for expr in exprs {
                    let oper = self.parse_expr_node(expr)?;
                    let oper = self.read_variable(oper)?;
                    let op = self.new_op(OpKind::Echo { expr: oper }, Some(node.span));
                    self.append_to_current(op);
                }
            }
            NodeKind::StmtIf { .. } => {
                let end_block = self.script.new_block();
                self.parse_if(node, end_block)?;
                self.current_block = end_block;
            }
            NodeKind::StmtWhile { cond, stmt } => self.parse_stmt_while(node, cond, stmt)?,
            NodeKind::StmtDo { stmt, cond } => self.parse_stmt_do(node, stmt, cond)?,
            NodeKind::StmtFor {
                init,
                cond,
                step,
                stmt,
            } => self.parse_stmt_for(node, init, cond, step, stmt)?,
            NodeKind::StmtForeach {
                expr,
                key,
                by_ref,
                var,
                stmt,
            } => self.parse_stmt_foreach(node, expr, key.as_deref(), *by_ref, var, stmt)?,
            NodeKind::StmtSwitch { cond, cases } => self.parse_stmt_switch(node, cond, cases)?,
            NodeKind::StmtReturn { expr } => {
                let oper = match expr {
                    Some(e) => {
                        let oper = self.parse_expr_node(e)?;
                        Some(self.read_variable(oper)?)
                    }
                    None => None,
                };
                let op = self.new_op(OpKind::Return { expr: oper }, Some(node.span));
                self.append_to_current(op);
                self.start_dead_block();
            }
            NodeKind::StmtThrow { expr } => {
                let oper = self.parse_expr_node(expr)?;
                let oper = self.read_variable(oper)?;
                let op = self.new_op(OpKind::Throw { expr: oper }, Some(node.span));
                self.append_to_current(op);
                self.start_dead_block();
            }
            NodeKind::StmtGoto { label } => self.parse_stmt_goto(label, node),
            NodeKind::StmtLabel { name } => self.parse_stmt_label(name, node),
            NodeKind::StmtGlobal { vars } => {
                for var in vars {
                    let parsed = self.parse_expr_node(var)?;
                    let oper = self.write_variable(parsed)?;
                    let op = self.new_op(OpKind::GlobalVar { var: oper }, Some(var.span));
                    self.append_to_current(op);
                }
            }
            NodeKind::StmtStatic { vars } => {
                for var in vars {
                    self.parse_stmt_node(var)?;
                }
            }
            NodeKind::StmtStaticVar { var, default } => {
                self.parse_stmt_static_var(node, var, default.as_deref())?
            }
            NodeKind::StmtUnset { vars } => {
                let exprs = self.parse_expr_list(vars, ParserMode::Write)?;
                let op = self.new_op(OpKind::Unset { exprs }, Some(node.span));
                self.append_to_current(op);
            }
            NodeKind::StmtConstList { consts } => {
                for c in consts {
                    self.parse_stmt_node(c)?;
                }
            }
            NodeKind::StmtConstant { name, expr } => self.parse_stmt_const(node, name, expr)?,
            NodeKind::StmtFunction {
                name,
                by_ref,
                params,
                return_type,
                stmts,
            } => self.parse_stmt_function(node, name, *by_ref, params, return_type.as_deref(), stmts)?,
            NodeKind::StmtClass {
                name,
                modifiers,
                extends,
                implements,
                stmts,
            } => self.parse_stmt_class(node, name, modifiers, extends.as_deref(), implements, stmts)?,
            NodeKind::StmtInterface {
                name,
                extends,
                stmts,
            } => self.parse_stmt_interface(node, name, extends, stmts)?,
            NodeKind::StmtTrait { name, stmts } => self.parse_stmt_trait(node, name, stmts)?,
            NodeKind::StmtClassMethod {
                name,
                modifiers,
                by_ref,
                params,
                return_type,
                stmts,
            } => self.parse_stmt_class_method(
                node,
                name,
                modifiers,
                *by_ref,
                params,
                return_type.as_deref(),
                stmts,
            )?,
            NodeKind::StmtPropertyList {
                modifiers,
                ty,
                props,
            } => self.parse_stmt_property_list(modifiers, ty.as_deref(), props)?,
            NodeKind::StmtTraitUse {
                traits,
                adaptations,
            } => self.parse_stmt_trait_use(node, traits, adaptations)?,
            NodeKind::StmtNamespace { name, stmts } => {
                if let Some(name) = name {
                    if let NodeKind::Name { parts, .. } = &name.kind {
                        self.curr_namespace = parts.join("\\");
                    }
                }
                self.current_block = self.parse_stmt_nodes(stmts, self.current_block)?;
            }
            NodeKind::StmtTry { stmts, .. } => {
                self.current_block = self.parse_stmt_nodes(stmts, self.current_block)?;
            }
            // handled by their parents or rewritten away
            NodeKind::StmtList { .. }
            | NodeKind::StmtCase { .. }
            | NodeKind::StmtDefault { .. }
            | NodeKind::StmtElseIf { .. }
            | NodeKind::StmtElse { .. }
            | NodeKind::StmtBreak { .. }
            | NodeKind::StmtContinue { .. }
            | NodeKind::StmtUse { .. }
            | NodeKind::StmtGroupUse { .. }
            | NodeKind::StmtCatch { .. }
            | NodeKind::StmtNop
            | NodeKind::StmtInlineHtml => {}
            _ => {
                // expressions in statement position still get lowered
                if !node.is_statement() {
                    self.parse_expr_node(node)?;
                }
            }
        }
        Ok(())
    }

    /// Code after return/throw/exit/goto continues in a fresh dead block.
    pub(crate) fn start_dead_block(&mut self) {
        let block = self.script.new_block();
        self.script.block_mut(block).dead = true;
        self.current_block = block;
    }

    /// Allocate a boolean-not over `cond` (not placed in any block); its
    /// result feeds negated path conditions.
    pub(crate) fn negation_of(&mut self, cond: OperandId) -> OperandId {
        let result = self.script.new_temporary(None);
        self.new_op(
            OpKind::Unary {
                op: UnaryOpKind::BooleanNot,
                expr: cond,
                result,
            },
            None,
        );
        result
    }

    fn parse_if(&mut self, node: &Node, end_block: BlockId) -> Result<(), IrError> {
        let (cond_node, stmt_node) = match &node.kind {
            NodeKind::StmtIf { cond, stmt, .. } => (cond.as_ref(), stmt.as_ref()),
            NodeKind::StmtElseIf { cond, stmt } => (cond.as_ref(), stmt.as_ref()),
            other => {
                return Err(IrError::MalformedNode {
                    construct: "StmtIf",
                    message: format!("unexpected node in if chain: {other:?}"),
                })
            }
        };
        let cond_parsed = self.parse_expr_node(cond_node)?;
        let cond = self.read_variable(cond_parsed)?;

        let if_block = self.script.new_block();
        self.script.block_mut(if_block).add_predecessor(self.current_block);
        let else_block = self.script.new_block();
        self.script
            .block_mut(else_block)
            .add_predecessor(self.current_block);

        let jmp_if = self.new_op(
            OpKind::JumpIf {
                cond,
                if_block,
                else_block,
            },
            Some(cond_node.span),
        );
        self.append_to_current(jmp_if);
        self.script.block_mut(self.current_block).is_conditional = true;
        self.process_assertion(cond, if_block, else_block)?;

        self.ctx.push_cond(cond);
        let conds = self.ctx.curr_conds.clone();
        self.script.set_block_condition(if_block, &conds);
        self.current_block = self.parse_stmt_nodes(stmt_slice(stmt_node), if_block)?;
        self.ctx.pop_cond();

        let jmp = self.new_op(OpKind::Jump { target: end_block }, Some(node.span));
        self.append_to_current(jmp);
        self.script
            .block_mut(end_block)
            .add_predecessor(self.current_block);
        self.current_block = else_block;

        if let NodeKind::StmtIf {
            elseifs, else_stmt, ..
        } = &node.kind
        {
            for elseif in elseifs {
                self.parse_if(elseif, end_block)?;
            }
            if let Some(else_node) = else_stmt {
                if let NodeKind::StmtElse { stmt } = &else_node.kind {
                    if matches!(stmt.kind, NodeKind::StmtIf { .. }) {
                        self.parse_if(stmt, end_block)?;
                        return Ok(());
                    }
                    let negated = self.negation_of(cond);
                    self.ctx.push_cond(negated);
                    let conds = self.ctx.curr_conds.clone();
                    self.script.set_block_condition(else_block, &conds);
                    self.current_block =
                        self.parse_stmt_nodes(stmt_slice(stmt), self.current_block)?;
                    self.ctx.pop_cond();
                }
            }
            let jmp = self.new_op(OpKind::Jump { target: end_block }, Some(node.span));
            self.append_to_current(jmp);
            self.script
                .block_mut(end_block)
                .add_predecessor(self.current_block);
        }
        Ok(())
    }

    fn parse_stmt_while(&mut self, node: &Node, cond: &Node, stmt: &Node) -> Result<(), IrError> {
        let init_block = self.script.new_block();
        let body_block = self.script.new_block();
        let end_block = self.script.new_block();

        let jmp = self.new_op(OpKind::Jump { target: init_block }, Some(node.span));
        self.append_to_current(jmp);
        self.script
            .block_mut(init_block)
            .add_predecessor(self.current_block);
        self.current_block = init_block;

        let parsed = self.parse_expr_node(cond)?;
        let cond_oper = self.read_variable(parsed)?;
        let jmp_if = self.new_op(
            OpKind::JumpIf {
                cond: cond_oper,
                if_block: body_block,
                else_block: end_block,
            },
            Some(cond.span),
        );
        self.append_to_current(jmp_if);
        self.script.block_mut(self.current_block).is_conditional = true;
        self.script
            .block_mut(body_block)
            .add_predecessor(self.current_block);
        self.script
            .block_mut(end_block)
            .add_predecessor(self.current_block);

        self.ctx.push_cond(cond_oper);
        let conds = self.ctx.curr_conds.clone();
        self.script.set_block_condition(body_block, &conds);
        self.current_block = self.parse_stmt_nodes(stmt_slice(stmt), body_block)?;
        self.ctx.pop_cond();

        let back = self.new_op(OpKind::Jump { target: init_block }, Some(node.span));
        self.append_to_current(back);
        self.script
            .block_mut(init_block)
            .add_predecessor(self.current_block);

        let negated = self.negation_of(cond_oper);
        self.ctx.push_cond(negated);
        let conds = self.ctx.curr_conds.clone();
        self.script.set_block_condition(end_block, &conds);
        self.ctx.pop_cond();
        self.current_block = end_block;
        Ok(())
    }

    fn parse_stmt_do(&mut self, node: &Node, stmt: &Node, cond: &Node) -> Result<(), IrError> {
        let body_block = self.script.new_block();
        self.script
            .block_mut(body_block)
            .add_predecessor(self.current_block);
        let end_block = self.script.new_block();
        let jmp = self.new_op(OpKind::Jump { target: body_block }, Some(node.span));
        self.append_to_current(jmp);

        // the body always runs once, so no condition is pushed for it
        self.current_block = self.parse_stmt_nodes(stmt_slice(stmt), body_block)?;
        let parsed = self.parse_expr_node(cond)?;
        let cond_oper = self.read_variable(parsed)?;
        let jmp_if = self.new_op(
            OpKind::JumpIf {
                cond: cond_oper,
                if_block: body_block,
                else_block: end_block,
            },
            Some(cond.span),
        );
        self.append_to_current(jmp_if);
        self.script.block_mut(self.current_block).is_conditional = true;
        self.process_assertion(cond_oper, body_block, end_block)?;
        self.script
            .block_mut(body_block)
            .add_predecessor(self.current_block);
        self.script
            .block_mut(end_block)
            .add_predecessor(self.current_block);

        let negated = self.negation_of(cond_oper);
        self.ctx.push_cond(negated);
        let conds = self.ctx.curr_conds.clone();
        self.script.set_block_condition(end_block, &conds);
        self.ctx.pop_cond();
        self.current_block = end_block;
        Ok(())
    }

    fn parse_stmt_for(
        &mut self,
        node: &Node,
        init: &[Node],
        cond: &[Node],
        step: &[Node],
        stmt: &Node,
    ) -> Result<(), IrError> {
        self.parse_expr_list(init, ParserMode::Read)?;
        let init_block = self.script.new_block();
        let body_block = self.script.new_block();
        let end_block = self.script.new_block();

        let jmp = self.new_op(OpKind::Jump { target: init_block }, Some(node.span));
        self.append_to_current(jmp);
        self.script
            .block_mut(init_block)
            .add_predecessor(self.current_block);
        self.current_block = init_block;

        let cond_oper = if cond.is_empty() {
            self.script.new_bool(true)
        } else {
            let parsed = self.parse_expr_list(cond, ParserMode::None)?;
            let last = *parsed.last().ok_or_else(|| IrError::MalformedNode {
                construct: "StmtFor",
                message: "empty condition list".to_string(),
            })?;
            self.read_variable(last)?
        };
        let jmp_if = self.new_op(
            OpKind::JumpIf {
                cond: cond_oper,
                if_block: body_block,
                else_block: end_block,
            },
            Some(node.span),
        );
        self.append_to_current(jmp_if);
        self.script.block_mut(self.current_block).is_conditional = true;
        self.process_assertion(cond_oper, body_block, end_block)?;
        self.script
            .block_mut(body_block)
            .add_predecessor(self.current_block);
        self.script
            .block_mut(end_block)
            .add_predecessor(self.current_block);

        self.ctx.push_cond(cond_oper);
        let conds = self.ctx.curr_conds.clone();
        self.script.set_block_condition(body_block, &conds);
        self.current_block = self.parse_stmt_nodes(stmt_slice(stmt), body_block)?;
        self.ctx.pop_cond();

        self.parse_expr_list(step, ParserMode::Read)?;
        let back = self.new_op(OpKind::Jump { target: init_block }, Some(node.span));
        self.append_to_current(back);
        self.script
            .block_mut(init_block)
            .add_predecessor(self.current_block);

        let negated = self.negation_of(cond_oper);
        self.ctx.push_cond(negated);
        let conds = self.ctx.curr_conds.clone();
        self.script.set_block_condition(end_block, &conds);
        self.ctx.pop_cond();
        self.current_block = end_block;
        Ok(())
    }

    fn parse_stmt_foreach(
        &mut self,
        node: &Node,
        expr: &Node,
        key: Option<&Node>,
        by_ref: bool,
        var: &Node,
        stmt: &Node,
    ) -> Result<(), IrError> {
        let parsed = self.parse_expr_node(expr)?;
        let iterable = self.read_variable(parsed)?;
        let reset_result = self.script.new_temporary(None);
        let reset = self.new_op(
            OpKind::IterReset {
                var: iterable,
                result: reset_result,
            },
            Some(expr.span),
        );
        self.append_to_current(reset);

        let init_block = self.script.new_block();
        let body_block = self.script.new_block();
        let end_block = self.script.new_block();

        let jmp = self.new_op(OpKind::Jump { target: init_block }, Some(node.span));
        self.append_to_current(jmp);
        self.script
            .block_mut(init_block)
            .add_predecessor(self.current_block);

        let valid_result = self.script.new_temporary(None);
        let valid = self.new_op(
            OpKind::IterValid {
                var: iterable,
                result: valid_result,
            },
            None,
        );
        self.script.append_op(init_block, valid);
        let jmp_if = self.new_op(
            OpKind::JumpIf {
                cond: valid_result,
                if_block: body_block,
                else_block: end_block,
            },
            Some(node.span),
        );
        self.script.append_op(init_block, jmp_if);
        self.script.block_mut(init_block).is_conditional = true;
        self.process_assertion(valid_result, body_block, end_block)?;
        self.script.block_mut(body_block).add_predecessor(init_block);
        self.script.block_mut(end_block).add_predecessor(init_block);

        self.current_block = body_block;
        if let Some(key_node) = key {
            let key_result = self.script.new_temporary(None);
            let key_op = self.new_op(
                OpKind::IterKey {
                    var: iterable,
                    result: key_result,
                },
                Some(key_node.span),
            );
            let parsed_key = self.parse_expr_node(key_node)?;
            let key_var = self.read_variable(parsed_key)?;
            self.append_to_current(key_op);
            let assign_result = self.script.new_temporary(None);
            let assign = self.new_op(
                OpKind::Assign {
                    var: key_var,
                    expr: key_result,
                    result: assign_result,
                },
                Some(key_node.span),
            );
            self.append_to_current(assign);
        }

        let value_result = self.script.new_temporary(None);
        let value_op = self.new_op(
            OpKind::IterValue {
                var: iterable,
                by_ref,
                result: value_result,
            },
            Some(var.span),
        );
        self.append_to_current(value_op);

        match &var.kind {
            NodeKind::ExprList { items } | NodeKind::ExprArray { items } => {
                self.parse_assign_list(items, value_result, None)?;
            }
            _ => {
                let parsed_var = self.parse_expr_node(var)?;
                let target = self.read_variable(parsed_var)?;
                let result = self.script.new_temporary(None);
                let kind = if by_ref {
                    OpKind::AssignRef {
                        var: target,
                        expr: value_result,
                        result,
                    }
                } else {
                    OpKind::Assign {
                        var: target,
                        expr: value_result,
                        result,
                    }
                };
                let assign = self.new_op(kind, Some(var.span));
                self.append_to_current(assign);
            }
        }

        self.current_block = self.parse_stmt_nodes(stmt_slice(stmt), self.current_block)?;
        let back = self.new_op(OpKind::Jump { target: init_block }, Some(node.span));
        self.append_to_current(back);
        self.script
            .block_mut(init_block)
            .add_predecessor(self.current_block);

        self.current_block = end_block;
        Ok(())
    }

    fn parse_stmt_switch(
        &mut self,
        node: &Node,
        cond: &Node,
        cases: &[Node],
    ) -> Result<(), IrError> {
        let jump_table = cases.iter().all(|case| match &case.kind {
            NodeKind::StmtCase { cond, .. } => matches!(
                cond.kind,
                NodeKind::ScalarString { .. } | NodeKind::ScalarNumber { .. }
            ),
            _ => true,
        });

        if jump_table {
            let parsed = self.parse_expr_node(cond)?;
            let cond_oper = self.read_variable(parsed)?;
            let mut case_values = Vec::new();
            let mut targets = Vec::new();
            let end_block = self.script.new_block();
            let mut default_block = end_block;
            let mut prev_block: Option<BlockId> = None;

            for case in cases {
                let case_block = self.script.new_block();
                self.script
                    .block_mut(case_block)
                    .add_predecessor(self.current_block);
                if let Some(prev) = prev_block {
                    if !self.script.block(prev).dead {
                        // fall through from the previous case body
                        let jmp = self.new_op(OpKind::Jump { target: case_block }, Some(case.span));
                        self.script.append_op(prev, jmp);
                        self.script.block_mut(case_block).add_predecessor(prev);
                    }
                }
                match &case.kind {
                    NodeKind::StmtCase { cond: cnode, stmts } => {
                        let case_value = self.parse_expr_node(cnode)?;
                        let case_cond = self.script.new_temporary(None);
                        self.new_op(
                            OpKind::Binary {
                                op: BinaryOpKind::Equal,
                                left: cond_oper,
                                right: case_value,
                                result: case_cond,
                            },
                            Some(cnode.span),
                        );
                        self.ctx.push_cond(case_cond);
                        let conds = self.ctx.curr_conds.clone();
                        self.script.set_block_condition(case_block, &conds);
                        targets.push(case_block);
                        case_values.push(case_value);
                        prev_block = Some(self.parse_stmt_nodes(stmts, case_block)?);
                        self.ctx.pop_cond();
                    }
                    NodeKind::StmtDefault { stmts } => {
                        default_block = case_block;
                        prev_block = Some(self.parse_stmt_nodes(stmts, case_block)?);
                    }
                    other => {
                        return Err(IrError::MalformedNode {
                            construct: "StmtSwitch",
                            message: format!("invalid case node {other:?}"),
                        })
                    }
                }
            }

            let switch_op = self.new_op(
                OpKind::Switch {
                    cond: cond_oper,
                    cases: case_values,
                    targets,
                    default_block,
                },
                Some(node.span),
            );
            self.append_to_current(switch_op);

            if let Some(prev) = prev_block {
                if !self.script.block(prev).dead {
                    let jmp = self.new_op(OpKind::Jump { target: end_block }, Some(node.span));
                    self.script.append_op(prev, jmp);
                    self.script.block_mut(end_block).add_predecessor(prev);
                }
            }
            self.current_block = end_block;
        } else {
            // sequential compare-and-jump chain
            let cond_oper = self.parse_expr_node(cond)?;
            let end_block = self.script.new_block();
            let mut default_block = end_block;
            let mut prev_block: Option<BlockId> = None;

            for case in cases {
                let if_block = self.script.new_block();
                if let Some(prev) = prev_block {
                    if !self.script.block(prev).dead {
                        let jmp = self.new_op(OpKind::Jump { target: if_block }, Some(case.span));
                        self.script.append_op(prev, jmp);
                        self.script.block_mut(if_block).add_predecessor(prev);
                    }
                }
                match &case.kind {
                    NodeKind::StmtCase { cond: cnode, stmts } => {
                        let case_expr = self.parse_expr_node(cnode)?;
                        let left = self.read_variable(cond_oper)?;
                        let right = self.read_variable(case_expr)?;
                        let eq_result = self.script.new_temporary(None);
                        let eq = self.new_op(
                            OpKind::Binary {
                                op: BinaryOpKind::Equal,
                                left,
                                right,
                                result: eq_result,
                            },
                            Some(cnode.span),
                        );
                        self.append_to_current(eq);

                        let else_block = self.script.new_block();
                        let jmp_if = self.new_op(
                            OpKind::JumpIf {
                                cond: eq_result,
                                if_block,
                                else_block,
                            },
                            Some(cnode.span),
                        );
                        self.append_to_current(jmp_if);
                        self.script.block_mut(self.current_block).is_conditional = true;
                        self.script
                            .block_mut(if_block)
                            .add_predecessor(self.current_block);
                        self.script
                            .block_mut(else_block)
                            .add_predecessor(self.current_block);
                        self.current_block = else_block;

                        self.ctx.push_cond(eq_result);
                        let conds = self.ctx.curr_conds.clone();
                        self.script.set_block_condition(if_block, &conds);
                        prev_block = Some(self.parse_stmt_nodes(stmts, if_block)?);
                        self.ctx.pop_cond();
                    }
                    NodeKind::StmtDefault { stmts } => {
                        default_block = if_block;
                        prev_block = Some(self.parse_stmt_nodes(stmts, if_block)?);
                    }
                    other => {
                        return Err(IrError::MalformedNode {
                            construct: "StmtSwitch",
                            message: format!("invalid case node {other:?}"),
                        })
                    }
                }
            }

            if let Some(prev) = prev_block {
                if !self.script.block(prev).dead {
                    let jmp = self.new_op(OpKind::Jump { target: end_block }, Some(node.span));
                    self.script.append_op(prev, jmp);
                    self.script.block_mut(end_block).add_predecessor(prev);
                }
            }
            let jmp = self.new_op(
                OpKind::Jump {
                    target: default_block,
                },
                Some(node.span),
            );
            self.append_to_current(jmp);
            self.script
                .block_mut(default_block)
                .add_predecessor(self.current_block);
            self.current_block = end_block;
        }
        Ok(())
    }

    fn parse_stmt_goto(&mut self, label: &str, node: &Node) {
        if let Some(target) = self.ctx.labels.get(label).copied() {
            let jmp = self.new_op(OpKind::Jump { target }, Some(node.span));
            self.append_to_current(jmp);
            self.script
                .block_mut(target)
                .add_predecessor(self.current_block);
        } else {
            self.ctx
                .unresolved_gotos
                .entry(label.to_string())
                .or_default()
                .push(self.current_block);
        }
        self.start_dead_block();
    }

    fn parse_stmt_label(&mut self, name: &str, node: &Node) {
        if self.ctx.labels.contains_key(name) {
            tracing::warn!(label = name, "label defined twice, keeping the first");
            return;
        }
        let label_block = self.script.new_block();
        let jmp = self.new_op(
            OpKind::Jump {
                target: label_block,
            },
            Some(node.span),
        );
        self.append_to_current(jmp);
        self.script
            .block_mut(label_block)
            .add_predecessor(self.current_block);

        let conds = self.ctx.curr_conds.clone();
        self.script.set_block_condition(label_block, &conds);

        if let Some(waiting) = self.ctx.unresolved_gotos.remove(name) {
            for goto_block in waiting {
                let jmp = self.new_op(
                    OpKind::Jump {
                        target: label_block,
                    },
                    None,
                );
                self.script.append_op(goto_block, jmp);
                self.script.block_mut(label_block).add_predecessor(goto_block);
            }
        }

        self.ctx.labels.insert(name.to_string(), label_block);
        self.current_block = label_block;
    }

    fn parse_stmt_static_var(
        &mut self,
        node: &Node,
        var: &Node,
        default: Option<&Node>,
    ) -> Result<(), IrError> {
        let mut default_var = None;
        let mut default_block = None;
        if let Some(default) = default {
            let saved = self.current_block;
            let block = self.script.new_block();
            self.current_block = block;
            default_var = Some(self.parse_expr_node(default)?);
            self.current_block = saved;
            default_block = Some(block);
        }

        let parsed = self.parse_expr_node(var)?;
        let null = self.script.new_null();
        let bound = self.script.new_operand(OperandKind::BoundVariable {
            name: parsed,
            value: Some(null),
            scope: VarScope::Function,
            by_ref: true,
            extra: None,
        });
        let vr = self.write_variable(bound)?;
        let op = self.new_op(
            OpKind::StaticVar {
                var: vr,
                default_var,
                default_block,
            },
            Some(node.span),
        );
        self.append_to_current(op);
        Ok(())
    }

    fn parse_stmt_const(&mut self, node: &Node, name: &str, expr: &Node) -> Result<(), IrError> {
        let saved = self.current_block;
        let value_block = self.script.new_block();
        self.current_block = value_block;
        let value = self.parse_expr_node(expr)?;
        self.current_block = saved;

        let name_oper = self.script.new_string(name);
        let op = self.new_op(
            OpKind::ConstDecl {
                name: name_oper,
                value,
                value_block: Some(value_block),
            },
            Some(node.span),
        );
        self.append_to_current(op);

        if self.current_func == self.script.main {
            self.consts_def.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn parse_stmt_function(
        &mut self,
        node: &Node,
        name: &str,
        by_ref: bool,
        params: &[Node],
        return_type: Option<&Node>,
        stmts: &[Node],
    ) -> Result<(), IrError> {
        let mut flags = FuncFlags::empty();
        if by_ref {
            flags |= FuncFlags::RETURNS_REF;
        }
        let return_type = self.parse_type_node(return_type);
        let entry = self.script.new_block();
        let func = self
            .script
            .add_func(Func::new(name, flags, return_type, entry, Some(node.span)));
        self.script.register_func(func);

        self.parse_func(func, params, stmts)?;
        let op = self.new_op(OpKind::StmtFunc { func }, Some(node.span));
        self.append_to_current(op);
        self.script.func_mut(func).callable_op = Some(op);
        Ok(())
    }

    fn parse_stmt_class(
        &mut self,
        node: &Node,
        name: &str,
        modifiers: &[String],
        extends: Option<&Node>,
        implements: &[Node],
        stmts: &[Node],
    ) -> Result<(), IrError> {
        let name_oper = self.script.new_string(name);
        let prev_class = self.curr_class.replace(name_oper);

        let class_block = self.script.new_block();
        let stmts_block = self.parse_stmt_nodes(stmts, class_block)?;
        let flags = self.parse_class_modifiers(modifiers);
        let extends = match extends {
            Some(e) => Some(self.parse_expr_node(e)?),
            None => None,
        };
        let implements = self.parse_expr_list(implements, ParserMode::None)?;

        let op = self.new_op(
            OpKind::StmtClass {
                name: name_oper,
                stmts: stmts_block,
                flags,
                extends,
                implements,
            },
            Some(node.span),
        );
        self.append_to_current(op);
        self.curr_class = prev_class;
        Ok(())
    }

    fn parse_stmt_interface(
        &mut self,
        node: &Node,
        name: &str,
        extends: &[Node],
        stmts: &[Node],
    ) -> Result<(), IrError> {
        let name_oper = self.script.new_string(name);
        let prev_class = self.curr_class.replace(name_oper);

        let extends = self.parse_expr_list(extends, ParserMode::None)?;
        let stmts_block = self.parse_stmt_nodes(stmts, self.current_block)?;
        let op = self.new_op(
            OpKind::StmtInterface {
                name: name_oper,
                stmts: stmts_block,
                extends,
            },
            Some(node.span),
        );
        self.append_to_current(op);
        self.curr_class = prev_class;
        Ok(())
    }

    fn parse_stmt_trait(&mut self, node: &Node, name: &str, stmts: &[Node]) -> Result<(), IrError> {
        let name_oper = self.script.new_string(name);
        let prev_class = self.curr_class.replace(name_oper);
        let trait_block = self.script.new_block();
        let stmts_block = self.parse_stmt_nodes(stmts, trait_block)?;
        let op = self.new_op(
            OpKind::StmtTrait {
                name: name_oper,
                stmts: stmts_block,
            },
            Some(node.span),
        );
        self.append_to_current(op);
        self.curr_class = prev_class;
        Ok(())
    }

    fn parse_stmt_class_method(
        &mut self,
        node: &Node,
        name: &str,
        modifiers: &[String],
        by_ref: bool,
        params: &[Node],
        return_type: Option<&Node>,
        stmts: &[Node],
    ) -> Result<(), IrError> {
        let Some(class_oper) = self.curr_class else {
            return Err(IrError::Cfg {
                file: self.script.file_path.clone(),
                message: "method declaration outside a class".to_string(),
            });
        };
        let class_name = self
            .script
            .string_value(class_oper)
            .unwrap_or_default()
            .to_string();

        let flags = self.parse_func_modifiers(modifiers, by_ref);
        let return_type = self.parse_type_node(return_type);
        let entry = self.script.new_block();
        let func = self.script.add_func(Func::new_method(
            name,
            flags,
            return_type,
            entry,
            class_name,
            Some(node.span),
        ));
        self.script.register_func(func);

        self.parse_func(func, params, stmts)?;

        let f = self.script.func(func);
        let visibility = f.visibility();
        let is_static = f.is_static();
        let is_final = f.flags.contains(FuncFlags::FINAL);
        let is_abstract = f.flags.contains(FuncFlags::ABSTRACT);
        let op = self.new_op(
            OpKind::StmtClassMethod {
                func,
                visibility,
                is_static,
                is_final,
                is_abstract,
            },
            Some(node.span),
        );
        self.append_to_current(op);
        self.script.func_mut(func).callable_op = Some(op);
        Ok(())
    }

    fn parse_stmt_property_list(
        &mut self,
        modifiers: &[String],
        ty: Option<&Node>,
        props: &[Node],
    ) -> Result<(), IrError> {
        let declared_type = self.parse_type_node(ty);
        let mut visibility = crate::features::cfg::domain::ClassFlags::PUBLIC;
        let mut is_static = false;
        let mut is_readonly = false;
        for m in modifiers {
            match m.as_str() {
                "public" => visibility = crate::features::cfg::domain::ClassFlags::PUBLIC,
                "protected" => visibility = crate::features::cfg::domain::ClassFlags::PROTECTED,
                "private" => visibility = crate::features::cfg::domain::ClassFlags::PRIVATE,
                "static" => is_static = true,
                "readonly" => is_readonly = true,
                _ => {}
            }
        }

        for prop in props {
            let NodeKind::PropertyElement { name, default } = &prop.kind else {
                continue;
            };
            let mut default_var = None;
            let mut default_block = None;
            if let Some(default) = default {
                let saved = self.current_block;
                let block = self.script.new_block();
                self.current_block = block;
                default_var = Some(self.parse_expr_node(default)?);
                self.current_block = saved;
                default_block = Some(block);
                if let Some(dv) = default_var {
                    if self.script.operand(dv).tainted {
                        self.script.func_mut(self.current_func).has_taint = true;
                        self.script.block_mut(self.current_block).has_tainted = true;
                    }
                }
            }
            let name_oper = self.script.new_string(name.clone());
            let op = self.new_op(
                OpKind::StmtProperty {
                    name: name_oper,
                    visibility,
                    is_static,
                    is_readonly,
                    default_var,
                    default_block,
                    declared_type: declared_type.clone(),
                },
                Some(prop.span),
            );
            self.append_to_current(op);
        }
        Ok(())
    }

    fn parse_stmt_trait_use(
        &mut self,
        node: &Node,
        traits: &[Node],
        adaptations: &[Node],
    ) -> Result<(), IrError> {
        let mut trait_opers = Vec::with_capacity(traits.len());
        for t in traits {
            let name = crate::features::parsing::domain::ast::name_to_string(t)
                .ok_or_else(|| IrError::MalformedNode {
                    construct: "StmtTraitUse",
                    message: "trait reference without a name".to_string(),
                })?;
            trait_opers.push(self.script.new_string(name));
        }

        let mut adaptation_ops = Vec::with_capacity(adaptations.len());
        for adaptation in adaptations {
            match &adaptation.kind {
                NodeKind::TraitUseAlias {
                    trait_name,
                    method,
                    alias,
                    modifier,
                } => {
                    let trait_oper = match trait_name {
                        Some(t) => crate::features::parsing::domain::ast::name_to_string(t)
                            .map(|n| self.script.new_string(n)),
                        None => None,
                    };
                    let method_oper = self.script.new_string(method.clone());
                    let new_name = alias.as_ref().map(|a| self.script.new_string(a.clone()));
                    let new_modifier = match modifier {
                        Some(m) => self.parse_class_modifiers(std::slice::from_ref(m)),
                        None => Default::default(),
                    };
                    let op = self.new_op(
                        OpKind::Alias {
                            trait_name: trait_oper,
                            method: method_oper,
                            new_name,
                            new_modifier,
                        },
                        Some(adaptation.span),
                    );
                    adaptation_ops.push(op);
                }
                NodeKind::TraitUsePrecedence {
                    trait_name,
                    method,
                    insteadof,
                } => {
                    let trait_oper = match trait_name {
                        Some(t) => crate::features::parsing::domain::ast::name_to_string(t)
                            .map(|n| self.script.new_string(n)),
                        None => None,
                    };
                    let method_oper = self.script.new_string(method.clone());
                    let mut insteadof_opers = Vec::with_capacity(insteadof.len());
                    for i in insteadof {
                        if let Some(n) = crate::features::parsing::domain::ast::name_to_string(i) {
                            insteadof_opers.push(self.script.new_string(n));
                        }
                    }
                    let op = self.new_op(
                        OpKind::Precedence {
                            trait_name: trait_oper,
                            method: method_oper,
                            insteadof: insteadof_opers,
                        },
                        Some(adaptation.span),
                    );
                    adaptation_ops.push(op);
                }
                _ => {}
            }
        }

        let op = self.new_op(
            OpKind::StmtTraitUse {
                traits: trait_opers,
                adaptations: adaptation_ops,
            },
            Some(node.span),
        );
        self.append_to_current(op);
        Ok(())
    }
}
