//! Expression lowering: AST expressions into ops and operands.

use crate::features::cfg::domain::{
    Assertion, AssertionMode, BinaryOpKind, CastOpKind, Func, FuncFlags, IncludeOpKind, OpKind,
    OperandId, OperandKind, UnaryOpKind, VarScope,
};
use crate::features::parsing::domain::ast::{name_to_string, Node};
use crate::features::parsing::domain::{
    AssignOp, BinaryOp, CastKind, IncludeKind, NodeKind, UnaryOp,
};
use crate::shared::models::IrError;

use super::builder::{type_assert_name, CfgBuilder, ParserMode};

fn binary_op_kind(op: BinaryOp) -> BinaryOpKind {
    match op {
        BinaryOp::BitwiseAnd => BinaryOpKind::BitwiseAnd,
        BinaryOp::BitwiseOr => BinaryOpKind::BitwiseOr,
        BinaryOp::BitwiseXor => BinaryOpKind::BitwiseXor,
        // short-circuit forms share the logical op kinds
        BinaryOp::BooleanAnd | BinaryOp::LogicalAnd => BinaryOpKind::LogicalAnd,
        BinaryOp::BooleanOr | BinaryOp::LogicalOr => BinaryOpKind::LogicalOr,
        BinaryOp::LogicalXor => BinaryOpKind::LogicalXor,
        BinaryOp::Coalesce => BinaryOpKind::Coalesce,
        BinaryOp::Concat => BinaryOpKind::Concat,
        BinaryOp::Div => BinaryOpKind::Div,
        BinaryOp::Equal => BinaryOpKind::Equal,
        BinaryOp::Greater => BinaryOpKind::Greater,
        BinaryOp::GreaterOrEqual => BinaryOpKind::GreaterOrEqual,
        BinaryOp::Identical => BinaryOpKind::Identical,
        BinaryOp::Minus => BinaryOpKind::Minus,
        BinaryOp::Mod => BinaryOpKind::Mod,
        BinaryOp::Mul => BinaryOpKind::Mul,
        BinaryOp::NotEqual => BinaryOpKind::NotEqual,
        BinaryOp::NotIdentical => BinaryOpKind::NotIdentical,
        BinaryOp::Plus => BinaryOpKind::Plus,
        BinaryOp::Pow => BinaryOpKind::Pow,
        BinaryOp::ShiftLeft => BinaryOpKind::ShiftLeft,
        BinaryOp::ShiftRight => BinaryOpKind::ShiftRight,
        BinaryOp::Smaller => BinaryOpKind::Smaller,
        BinaryOp::SmallerOrEqual => BinaryOpKind::SmallerOrEqual,
        BinaryOp::Spaceship => BinaryOpKind::Spaceship,
    }
}

fn assign_binary_kind(op: AssignOp) -> BinaryOpKind {
    match op {
        AssignOp::BitwiseAnd => BinaryOpKind::BitwiseAnd,
        AssignOp::BitwiseOr => BinaryOpKind::BitwiseOr,
        AssignOp::BitwiseXor => BinaryOpKind::BitwiseXor,
        AssignOp::Coalesce => BinaryOpKind::Coalesce,
        AssignOp::Concat => BinaryOpKind::Concat,
        AssignOp::Div => BinaryOpKind::Div,
        AssignOp::Minus => BinaryOpKind::Minus,
        AssignOp::Mod => BinaryOpKind::Mod,
        AssignOp::Mul => BinaryOpKind::Mul,
        AssignOp::Plus => BinaryOpKind::Plus,
        AssignOp::Pow => BinaryOpKind::Pow,
        AssignOp::ShiftLeft => BinaryOpKind::ShiftLeft,
        AssignOp::ShiftRight => BinaryOpKind::ShiftRight,
    }
}

fn cast_op_kind(kind: CastKind) -> CastOpKind {
    match kind {
        CastKind::Array => CastOpKind::Array,
        CastKind::Bool => CastOpKind::Bool,
        CastKind::Double => CastOpKind::Double,
        CastKind::Int => CastOpKind::Int,
        CastKind::Object => CastOpKind::Object,
        CastKind::String => CastOpKind::String,
        CastKind::Unset => CastOpKind::Unset,
    }
}

fn include_op_kind(kind: IncludeKind) -> IncludeOpKind {
    match kind {
        IncludeKind::Include => IncludeOpKind::Include,
        IncludeKind::IncludeOnce => IncludeOpKind::IncludeOnce,
        IncludeKind::Require => IncludeOpKind::Require,
        IncludeKind::RequireOnce => IncludeOpKind::RequireOnce,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }
    raw.parse::<f64>().ok()
}

impl CfgBuilder {
    pub(crate) fn parse_expr_list(
        &mut self,
        exprs: &[Node],
        mode: ParserMode,
    ) -> Result<Vec<OperandId>, IrError> {
        let mut out = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let parsed = self.parse_expr_node(expr)?;
            let oper = match mode {
                ParserMode::Read => self.read_variable(parsed)?,
                ParserMode::Write => self.write_variable(parsed)?,
                ParserMode::None => parsed,
            };
            out.push(oper);
        }
        Ok(out)
    }

    pub(crate) fn parse_expr_node(&mut self, node: &Node) -> Result<OperandId, IrError> {
        let span = Some(node.span);
        match &node.kind {
            NodeKind::ScalarNumber { raw } => {
                let val = parse_number(raw).ok_or_else(|| IrError::MalformedNode {
                    construct: "ScalarNumber",
                    message: format!("cannot parse number literal '{raw}'"),
                })?;
                Ok(self.script.new_number(val))
            }
            NodeKind::ScalarString { value } | NodeKind::ScalarEncapsedPart { value } => {
                Ok(self.script.new_string(value.clone()))
            }
            NodeKind::Name { .. } | NodeKind::Identifier { .. } => {
                let name = name_to_string(node).unwrap_or_default();
                Ok(self.script.new_string(name))
            }
            NodeKind::ScalarMagicConstant { .. } => Ok(self.script.new_string("")),
            NodeKind::ScalarEncapsed { parts } | NodeKind::ScalarHeredoc { parts } => {
                let list = self.parse_expr_list(parts, ParserMode::Read)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(OpKind::ConcatList { list, result }, span);
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprVariable { name } => match &name.kind {
                NodeKind::Identifier { value } => {
                    let name_oper = self.script.new_string(value.clone());
                    let value = value.clone();
                    Ok(self.variable_operand(name_oper, &value))
                }
                _ => {
                    let name_oper = self.parse_expr_node(name)?;
                    Ok(self.script.new_variable(name_oper, None))
                }
            },
            NodeKind::Argument { expr } => {
                let parsed = self.parse_expr_node(expr)?;
                self.read_variable(parsed)
            }
            NodeKind::ExprAssign { var, expr } => self.parse_expr_assign(node, var, expr),
            NodeKind::ExprAssignRef { var, expr } => {
                let parsed_var = self.parse_expr_node(var)?;
                let left = self.write_variable(parsed_var)?;
                let parsed_expr = self.parse_expr_node(expr)?;
                let right = self.read_variable(parsed_expr)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::AssignRef {
                        var: left,
                        expr: right,
                        result,
                    },
                    span,
                );
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprAssignOp { op, var, expr } => {
                let parsed_var = self.parse_expr_node(var)?;
                let read = self.read_variable(parsed_var)?;
                let write = self.write_variable(parsed_var)?;
                let rhs = self.parse_expr_node(expr)?;
                let bin_result = self.script.new_temporary(None);
                let bin = self.new_op(
                    OpKind::Binary {
                        op: assign_binary_kind(*op),
                        left: read,
                        right: rhs,
                        result: bin_result,
                    },
                    span,
                );
                self.append_to_current(bin);
                let assign_result = self.script.new_temporary(None);
                let assign = self.new_op(
                    OpKind::Assign {
                        var: write,
                        expr: bin_result,
                        result: assign_result,
                    },
                    span,
                );
                self.append_to_current(assign);
                Ok(bin_result)
            }
            NodeKind::ExprBinary { op, left, right } => {
                let parsed_left = self.parse_expr_node(left)?;
                let left_oper = self.read_variable(parsed_left)?;
                let parsed_right = self.parse_expr_node(right)?;
                let right_oper = self.read_variable(parsed_right)?;
                let result = self.script.new_temporary(None);
                let bin = self.new_op(
                    OpKind::Binary {
                        op: binary_op_kind(*op),
                        left: left_oper,
                        right: right_oper,
                        result,
                    },
                    span,
                );
                self.append_to_current(bin);
                Ok(result)
            }
            NodeKind::ExprUnary { op, expr } => {
                let parsed = self.parse_expr_node(expr)?;
                let oper = self.read_variable(parsed)?;
                let kind = match op {
                    UnaryOp::Plus => UnaryOpKind::Plus,
                    UnaryOp::Minus => UnaryOpKind::Minus,
                    UnaryOp::BooleanNot => UnaryOpKind::BooleanNot,
                    UnaryOp::BitwiseNot => UnaryOpKind::BitwiseNot,
                };
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::Unary {
                        op: kind,
                        expr: oper,
                        result,
                    },
                    span,
                );
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprCast { kind, expr } => {
                let parsed = self.parse_expr_node(expr)?;
                let oper = self.read_variable(parsed)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::Cast {
                        kind: cast_op_kind(*kind),
                        expr: oper,
                        result,
                    },
                    span,
                );
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprPostInc { var } => self.parse_incdec(node, var, BinaryOpKind::Plus, false),
            NodeKind::ExprPostDec { var } => {
                self.parse_incdec(node, var, BinaryOpKind::Minus, false)
            }
            NodeKind::ExprPreInc { var } => self.parse_incdec(node, var, BinaryOpKind::Plus, true),
            NodeKind::ExprPreDec { var } => self.parse_incdec(node, var, BinaryOpKind::Minus, true),
            NodeKind::ExprTernary {
                cond,
                if_true,
                if_false,
            } => self.parse_expr_ternary(node, cond, if_true.as_deref(), if_false),
            NodeKind::ExprArray { items } => {
                let (keys, values, by_ref) = self.parse_array_items(items)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::ArrayLit {
                        keys,
                        values,
                        by_ref,
                        result,
                    },
                    span,
                );
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprArrayDimFetch { var, dim } => {
                let parsed_var = self.parse_expr_node(var)?;
                let var_oper = self.read_variable(parsed_var)?;
                let dim_oper = match dim {
                    Some(d) => {
                        let parsed = self.parse_expr_node(d)?;
                        self.read_variable(parsed)?
                    }
                    None => self.script.new_null(),
                };
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::ArrayDimFetch {
                        var: var_oper,
                        dim: dim_oper,
                        result,
                    },
                    span,
                );
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprPropertyFetch {
                var,
                prop,
                nullsafe,
            } => self.parse_property_fetch(node, var, prop, *nullsafe),
            NodeKind::ExprStaticPropertyFetch { class, prop } => {
                self.parse_static_property_fetch(node, class, prop)
            }
            NodeKind::ExprFunctionCall { function, args } => {
                self.parse_expr_func_call(node, function, args)
            }
            NodeKind::ExprMethodCall {
                var,
                method,
                args,
                nullsafe,
            } => {
                let parsed_var = self.parse_expr_node(var)?;
                let var_oper = self.read_variable(parsed_var)?;
                let parsed_name = self.parse_expr_node(method)?;
                let name_oper = self.read_variable(parsed_name)?;
                let args = self.parse_expr_list(args, ParserMode::Read)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::MethodCall {
                        var: var_oper,
                        name: name_oper,
                        args,
                        nullsafe: *nullsafe,
                        result,
                    },
                    span,
                );
                self.append_to_current(op);
                let func = self.current_func;
                self.script.func_mut(func).calls.push(op);
                Ok(result)
            }
            NodeKind::ExprStaticCall { class, call, args } => {
                let parsed_class = self.parse_expr_node(class)?;
                let class_oper = self.read_variable(parsed_class)?;
                let parsed_name = self.parse_expr_node(call)?;
                let name_oper = self.read_variable(parsed_name)?;
                let args = self.parse_expr_list(args, ParserMode::Read)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::StaticCall {
                        class: class_oper,
                        name: name_oper,
                        args,
                        result,
                    },
                    span,
                );
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprNew { class, args } => self.parse_expr_new(node, class, args),
            NodeKind::ExprClosure {
                is_static,
                by_ref,
                params,
                uses,
                return_type,
                stmts,
            } => self.parse_expr_closure(
                node,
                *is_static,
                *by_ref,
                params,
                uses,
                return_type.as_deref(),
                stmts,
            ),
            NodeKind::ExprArrowFunction {
                is_static,
                by_ref,
                params,
                return_type,
                expr,
            } => {
                let stmt = Node::new(
                    NodeKind::StmtExpression { expr: expr.clone() },
                    expr.span,
                );
                self.parse_expr_closure(
                    node,
                    *is_static,
                    *by_ref,
                    params,
                    &[],
                    return_type.as_deref(),
                    std::slice::from_ref(&stmt),
                )
            }
            NodeKind::ExprIsset { vars } => {
                let vars = self.parse_expr_list(vars, ParserMode::Read)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(OpKind::Isset { vars, result }, span);
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprEmpty { expr } => {
                let parsed = self.parse_expr_node(expr)?;
                let oper = self.read_variable(parsed)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(OpKind::Empty { expr: oper, result }, span);
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprEval { expr } => {
                let parsed = self.parse_expr_node(expr)?;
                let oper = self.read_variable(parsed)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(OpKind::Eval { expr: oper, result }, span);
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprExit { expr } => {
                let oper = match expr {
                    Some(e) => {
                        let parsed = self.parse_expr_node(e)?;
                        Some(self.read_variable(parsed)?)
                    }
                    None => None,
                };
                let op = self.new_op(OpKind::Exit { expr: oper }, span);
                self.append_to_current(op);
                self.start_dead_block();
                Ok(self.script.new_number(1.0))
            }
            NodeKind::ExprInclude { kind, expr } => {
                let parsed = self.parse_expr_node(expr)?;
                let oper = self.read_variable(parsed)?;
                if let Some(path) = self.script.string_value(oper).map(str::to_string) {
                    self.script.include_files.push(path);
                }
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::Include {
                        kind: include_op_kind(*kind),
                        expr: oper,
                        result,
                    },
                    span,
                );
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprInstanceOf { expr, class } => {
                let parsed = self.parse_expr_node(expr)?;
                let oper = self.read_variable(parsed)?;
                let parsed_class = self.parse_expr_node(class)?;
                let class_oper = self.read_variable(parsed_class)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::InstanceOf {
                        expr: oper,
                        class: class_oper,
                        result,
                    },
                    span,
                );
                self.script.add_assertion(
                    result,
                    oper,
                    Assertion::type_assert(class_oper, false),
                    AssertionMode::Intersection,
                );
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprClone { expr } => {
                let parsed = self.parse_expr_node(expr)?;
                let oper = self.read_variable(parsed)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(OpKind::Clone { expr: oper, result }, span);
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprErrorSuppress { expr } => self.parse_error_suppress(node, expr),
            NodeKind::ExprPrint { expr } => {
                let parsed = self.parse_expr_node(expr)?;
                let oper = self.read_variable(parsed)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(OpKind::Print { expr: oper, result }, span);
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprShellExec { parts } => {
                let list = self.parse_expr_list(parts, ParserMode::Read)?;
                let concat_result = self.script.new_temporary(None);
                let concat = self.new_op(
                    OpKind::ConcatList {
                        list,
                        result: concat_result,
                    },
                    span,
                );
                self.append_to_current(concat);
                let name = self.script.new_string("shell_exec");
                let call_result = self.script.new_temporary(None);
                let call = self.new_op(
                    OpKind::FunctionCall {
                        name,
                        args: vec![concat_result],
                        result: call_result,
                    },
                    span,
                );
                self.append_to_current(call);
                Ok(concat_result)
            }
            NodeKind::ExprConstFetch { name } => self.parse_expr_const_fetch(node, name),
            NodeKind::ExprClassConstFetch { class, name } => {
                let parsed_class = self.parse_expr_node(class)?;
                let class_oper = self.read_variable(parsed_class)?;
                let parsed_name = self.parse_expr_node(name)?;
                let name_oper = self.read_variable(parsed_name)?;
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::ClassConstFetch {
                        class: class_oper,
                        name: name_oper,
                        result,
                    },
                    span,
                );
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprYield { key, value } => {
                let key_oper = match key {
                    Some(k) => {
                        let parsed = self.parse_expr_node(k)?;
                        Some(self.read_variable(parsed)?)
                    }
                    None => None,
                };
                let value_oper = match value {
                    Some(v) => {
                        let parsed = self.parse_expr_node(v)?;
                        Some(self.read_variable(parsed)?)
                    }
                    None => None,
                };
                let result = self.script.new_temporary(None);
                let op = self.new_op(
                    OpKind::Yield {
                        value: value_oper,
                        key: key_oper,
                        result,
                    },
                    span,
                );
                self.append_to_current(op);
                Ok(result)
            }
            NodeKind::ExprList { .. } => {
                tracing::warn!("list() outside assignment context");
                Ok(self.script.new_temporary(None))
            }
            NodeKind::ExprUnknown { construct } => {
                tracing::warn!(construct = construct.as_str(), "unlowered expression");
                Ok(self.script.new_temporary(None))
            }
            other => Err(IrError::MalformedNode {
                construct: "expression",
                message: format!("cannot lower {other:?} in expression position"),
            }),
        }
    }

    fn parse_incdec(
        &mut self,
        node: &Node,
        var: &Node,
        op: BinaryOpKind,
        prefix: bool,
    ) -> Result<OperandId, IrError> {
        let parsed = self.parse_expr_node(var)?;
        let read = self.read_variable(parsed)?;
        let write = self.write_variable(parsed)?;
        let one = self.script.new_number(1.0);
        let bin_result = self.script.new_temporary(None);
        let bin = self.new_op(
            OpKind::Binary {
                op,
                left: read,
                right: one,
                result: bin_result,
            },
            Some(node.span),
        );
        let assign_result = self.script.new_temporary(None);
        let assign = self.new_op(
            OpKind::Assign {
                var: write,
                expr: bin_result,
                result: assign_result,
            },
            Some(node.span),
        );
        self.append_to_current(bin);
        self.append_to_current(assign);
        Ok(if prefix { bin_result } else { read })
    }

    fn parse_expr_assign(
        &mut self,
        node: &Node,
        var: &Node,
        expr: &Node,
    ) -> Result<OperandId, IrError> {
        let parsed_expr = self.parse_expr_node(expr)?;
        let right = self.read_variable(parsed_expr)?;

        // list($a, $b) = $e and [$a, $b] = $e destructure element-wise
        match &var.kind {
            NodeKind::ExprList { items } | NodeKind::ExprArray { items } => {
                self.parse_assign_list(items, right, Some(node.span))?;
                return Ok(right);
            }
            _ => {}
        }

        let parsed_var = self.parse_expr_node(var)?;
        let left = self.write_variable(parsed_var)?;
        let result = self.script.new_temporary(None);
        let op = self.new_op(
            OpKind::Assign {
                var: left,
                expr: right,
                result,
            },
            Some(node.span),
        );
        self.append_to_current(op);

        // literal values flow into the variable's value slot
        if let Some(value) = self.script.operand_value(right) {
            let propagate = matches!(
                self.script.operand(value).kind,
                OperandKind::Number { .. }
                    | OperandKind::String { .. }
                    | OperandKind::Bool { .. }
                    | OperandKind::Symbolic { .. }
                    | OperandKind::Object { .. }
            );
            if propagate {
                self.script.op_mut(op).change_var("Result", value);
                self.script.add_write_ref(op, value);
                self.script.set_operand_value(left, value);
                return Ok(value);
            }
        }
        Ok(result)
    }

    pub(crate) fn parse_assign_list(
        &mut self,
        items: &[Node],
        arr_var: OperandId,
        span: Option<crate::shared::models::Span>,
    ) -> Result<(), IrError> {
        let mut counter = 0f64;
        for item in items {
            let NodeKind::ArrayItem { key, value, .. } = &item.kind else {
                continue;
            };
            let Some(value) = value else {
                continue;
            };
            let key_oper = match key {
                Some(k) => {
                    let parsed = self.parse_expr_node(k)?;
                    self.read_variable(parsed)?
                }
                None => {
                    let k = self.script.new_number(counter);
                    counter += 1.0;
                    k
                }
            };

            let fetch_result = self.script.new_temporary(None);
            let fetch = self.new_op(
                OpKind::ArrayDimFetch {
                    var: arr_var,
                    dim: key_oper,
                    result: fetch_result,
                },
                span,
            );
            self.append_to_current(fetch);

            match &value.kind {
                NodeKind::ExprList { items } | NodeKind::ExprArray { items } => {
                    self.parse_assign_list(items, fetch_result, Some(value.span))?;
                    continue;
                }
                _ => {}
            }

            let parsed = self.parse_expr_node(value)?;
            let left = self.write_variable(parsed)?;
            let assign_result = self.script.new_temporary(None);
            let assign = self.new_op(
                OpKind::Assign {
                    var: left,
                    expr: fetch_result,
                    result: assign_result,
                },
                Some(value.span),
            );
            self.append_to_current(assign);
        }
        Ok(())
    }

    fn parse_expr_ternary(
        &mut self,
        node: &Node,
        cond: &Node,
        if_true: Option<&Node>,
        if_false: &Node,
    ) -> Result<OperandId, IrError> {
        let parsed = self.parse_expr_node(cond)?;
        let cond_oper = self.read_variable(parsed)?;

        let if_block = self.script.new_block();
        let else_block = self.script.new_block();
        let end_block = self.script.new_block();

        let jmp_if = self.new_op(
            OpKind::JumpIf {
                cond: cond_oper,
                if_block,
                else_block,
            },
            Some(node.span),
        );
        self.append_to_current(jmp_if);
        self.script.block_mut(self.current_block).is_conditional = true;
        self.process_assertion(cond_oper, if_block, else_block)?;
        self.script
            .block_mut(if_block)
            .add_predecessor(self.current_block);
        self.script
            .block_mut(else_block)
            .add_predecessor(self.current_block);

        self.ctx.push_cond(cond_oper);
        let conds = self.ctx.curr_conds.clone();
        self.script.set_block_condition(if_block, &conds);
        self.current_block = if_block;
        let if_var = self.script.new_temporary(None);
        let if_val = match if_true {
            Some(t) => {
                let parsed = self.parse_expr_node(t)?;
                self.read_variable(parsed)?
            }
            // `$c ?: $e` evaluates to a truthy marker on the short arm
            None => self.script.new_number(1.0),
        };
        let if_assign_result = self.script.new_temporary(None);
        let if_assign = self.new_op(
            OpKind::Assign {
                var: if_var,
                expr: if_val,
                result: if_assign_result,
            },
            Some(node.span),
        );
        self.append_to_current(if_assign);
        let jmp = self.new_op(OpKind::Jump { target: end_block }, Some(node.span));
        self.append_to_current(jmp);
        self.script
            .block_mut(end_block)
            .add_predecessor(self.current_block);
        self.ctx.pop_cond();

        let negated = self.negation_of(cond_oper);
        self.ctx.push_cond(negated);
        let conds = self.ctx.curr_conds.clone();
        self.script.set_block_condition(else_block, &conds);
        self.current_block = else_block;
        let else_var = self.script.new_temporary(None);
        let parsed_else = self.parse_expr_node(if_false)?;
        let else_val = self.read_variable(parsed_else)?;
        let else_assign_result = self.script.new_temporary(None);
        let else_assign = self.new_op(
            OpKind::Assign {
                var: else_var,
                expr: else_val,
                result: else_assign_result,
            },
            Some(node.span),
        );
        self.append_to_current(else_assign);
        let jmp = self.new_op(OpKind::Jump { target: end_block }, Some(node.span));
        self.append_to_current(jmp);
        self.script
            .block_mut(end_block)
            .add_predecessor(self.current_block);
        self.ctx.pop_cond();

        self.current_block = end_block;
        let result = self.script.new_temporary(None);
        let phi = self.new_op(
            OpKind::Phi {
                vars: Vec::new(),
                result,
                block: end_block,
            },
            Some(node.span),
        );
        self.script.op_mut(phi).block = Some(end_block);
        self.script.phi_add_operand(phi, if_var);
        self.script.phi_add_operand(phi, else_var);
        self.script.block_mut(end_block).add_phi(phi);
        Ok(result)
    }

    fn parse_array_items(
        &mut self,
        items: &[Node],
    ) -> Result<(Vec<OperandId>, Vec<OperandId>, Vec<bool>), IrError> {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        let mut by_refs = Vec::new();
        for item in items {
            let NodeKind::ArrayItem { key, value, by_ref } = &item.kind else {
                return Err(IrError::MalformedNode {
                    construct: "ExprArray",
                    message: format!("unexpected {} in array literal", item.kind_name()),
                });
            };
            let Some(value) = value else { continue };
            let key_oper = match key {
                Some(k) => {
                    let parsed = self.parse_expr_node(k)?;
                    self.read_variable(parsed)?
                }
                None => self.script.new_null(),
            };
            keys.push(key_oper);
            let parsed = self.parse_expr_node(value)?;
            values.push(self.read_variable(parsed)?);
            by_refs.push(*by_ref);
        }
        Ok((keys, values, by_refs))
    }

    fn parse_property_fetch(
        &mut self,
        node: &Node,
        var: &Node,
        prop: &Node,
        nullsafe: bool,
    ) -> Result<OperandId, IrError> {
        let parsed_var = self.parse_expr_node(var)?;
        let var_oper = self.read_variable(parsed_var)?;
        let parsed_prop = self.parse_expr_node(prop)?;
        let prop_oper = self.read_variable(parsed_prop)?;
        let result = self.script.new_temporary(None);
        let op = self.new_op(
            OpKind::PropertyFetch {
                var: var_oper,
                prop: prop_oper,
                nullsafe,
                result,
            },
            Some(node.span),
        );

        // give the fetch a named result so chained accesses share a carrier
        let var_name = self.script.operand_name(var_oper);
        let prop_name = self
            .script
            .operand_value(prop_oper)
            .and_then(|v| self.script.string_value(v).map(str::to_string));
        if let (Some(var_name), Some(prop_name)) = (var_name, prop_name) {
            let fetch_name = format!(
                "<propfetch>{}->{}",
                var_name.trim_start_matches('$'),
                prop_name
            );
            let name_oper = self.script.new_string(fetch_name);
            let named = self.script.new_variable(name_oper, None);
            self.script.op_mut(op).change_var("Result", named);
            self.script.add_write_ref(op, named);
            self.append_to_current(op);
            return Ok(named);
        }

        self.append_to_current(op);
        Ok(result)
    }

    fn parse_static_property_fetch(
        &mut self,
        node: &Node,
        class: &Node,
        prop: &Node,
    ) -> Result<OperandId, IrError> {
        let parsed_class = self.parse_expr_node(class)?;
        let class_oper = self.read_variable(parsed_class)?;
        let parsed_prop = self.parse_expr_node(prop)?;
        let prop_oper = self.read_variable(parsed_prop)?;
        let result = self.script.new_temporary(None);
        let op = self.new_op(
            OpKind::StaticPropertyFetch {
                class: class_oper,
                prop: prop_oper,
                result,
            },
            Some(node.span),
        );

        let class_name = self.script.operand_name(class_oper);
        let prop_name = self
            .script
            .operand_value(prop_oper)
            .and_then(|v| self.script.string_value(v).map(str::to_string));
        if let (Some(class_name), Some(prop_name)) = (class_name, prop_name) {
            let fetch_name = format!(
                "<staticpropfetch>{}->{}",
                class_name.trim_start_matches('$'),
                prop_name
            );
            let name_oper = self.script.new_string(fetch_name);
            let named = self.script.new_variable(name_oper, None);
            self.script.op_mut(op).change_var("Result", named);
            self.script.add_write_ref(op, named);
            self.append_to_current(op);
            return Ok(named);
        }

        self.append_to_current(op);
        Ok(result)
    }

    fn parse_expr_func_call(
        &mut self,
        node: &Node,
        function: &Node,
        args: &[Node],
    ) -> Result<OperandId, IrError> {
        let args = self.parse_expr_list(args, ParserMode::Read)?;
        let parsed_name = self.parse_expr_node(function)?;
        let name_oper = self.read_variable(parsed_name)?;
        let result = self.script.new_temporary(None);
        let op = self.new_op(
            OpKind::FunctionCall {
                name: name_oper,
                args: args.clone(),
                result,
            },
            Some(node.span),
        );

        if let Some(name) = self.script.string_value(name_oper).map(str::to_string) {
            if let Some(asserted) = type_assert_name(&name) {
                if let Some(first) = args.first().copied() {
                    let type_oper = self.script.new_string(asserted);
                    self.script.add_assertion(
                        result,
                        first,
                        Assertion::type_assert(type_oper, false),
                        AssertionMode::Intersection,
                    );
                }
            } else if name == "settype" {
                self.rewrite_settype(&args)?;
            }
        }

        self.append_to_current(op);
        let func = self.current_func;
        self.script.func_mut(func).calls.push(op);
        Ok(result)
    }

    /// `settype($v, "int")` becomes an explicit cast plus assignment so the
    /// coercion is visible to downstream passes.
    fn rewrite_settype(&mut self, args: &[OperandId]) -> Result<(), IrError> {
        let (Some(&target), Some(&type_arg)) = (args.first(), args.get(1)) else {
            return Ok(());
        };
        let read = self.read_variable(target)?;
        let write = self.write_variable(target)?;
        let type_name = self
            .script
            .operand_value(type_arg)
            .and_then(|v| self.script.string_value(v).map(str::to_string));
        let Some(type_name) = type_name else {
            return Ok(());
        };
        let cast_kind = match type_name.as_str() {
            "boolean" | "bool" => CastOpKind::Bool,
            "integer" | "int" => CastOpKind::Int,
            "float" | "double" => CastOpKind::Double,
            "string" => CastOpKind::String,
            "array" => CastOpKind::Array,
            "object" => CastOpKind::Object,
            "null" => CastOpKind::Unset,
            _ => return Ok(()),
        };
        let cast_result = self.script.new_temporary(None);
        let cast = self.new_op(
            OpKind::Cast {
                kind: cast_kind,
                expr: read,
                result: cast_result,
            },
            None,
        );
        self.append_to_current(cast);
        let assign_result = self.script.new_temporary(None);
        let assign = self.new_op(
            OpKind::Assign {
                var: write,
                expr: cast_result,
                result: assign_result,
            },
            None,
        );
        self.append_to_current(assign);
        Ok(())
    }

    fn parse_expr_new(
        &mut self,
        node: &Node,
        class: &Node,
        args: &[Node],
    ) -> Result<OperandId, IrError> {
        let class_oper = self.parse_expr_node(class)?;
        let args = self.parse_expr_list(args, ParserMode::Read)?;
        let result = self.script.new_temporary(None);
        let op = self.new_op(
            OpKind::New {
                class: class_oper,
                args,
                result,
            },
            Some(node.span),
        );
        self.append_to_current(op);

        // literal class names type the construction result
        if let Some(class_name) = self.script.string_value(class_oper).map(str::to_string) {
            let object = self.script.new_operand(OperandKind::Object {
                class_name,
            });
            self.script.op_mut(op).change_var("Result", object);
            self.script.add_write_ref(op, object);
            return Ok(object);
        }
        Ok(result)
    }

    fn parse_expr_closure(
        &mut self,
        node: &Node,
        is_static: bool,
        by_ref: bool,
        params: &[Node],
        uses: &[Node],
        return_type: Option<&Node>,
        stmts: &[Node],
    ) -> Result<OperandId, IrError> {
        let mut use_vars = Vec::with_capacity(uses.len());
        for use_node in uses {
            let NodeKind::ClosureUse { var, by_ref } = &use_node.kind else {
                continue;
            };
            let parsed = self.parse_expr_node(var)?;
            let name_var = self.read_variable(parsed)?;
            let null = self.script.new_null();
            // rebinding inside the closure must not touch the outer value
            let bound = self.script.new_operand(OperandKind::BoundVariable {
                name: name_var,
                value: Some(null),
                scope: VarScope::Local,
                by_ref: *by_ref,
                extra: None,
            });
            use_vars.push(bound);
        }

        let anon_id = self.script.next_anon_id();
        let name = format!("{{anonymous}}#{anon_id}");
        let mut flags = FuncFlags::CLOSURE;
        if by_ref {
            flags |= FuncFlags::RETURNS_REF;
        }
        if is_static {
            flags |= FuncFlags::STATIC;
        }
        let return_type = self.parse_type_node(return_type);
        let entry = self.script.new_block();
        let func = self
            .script
            .add_func(Func::new(name, flags, return_type, entry, Some(node.span)));

        self.parse_func(func, params, stmts)?;
        self.script.register_func(func);

        let result = self.script.new_temporary(None);
        let closure = self.new_op(
            OpKind::Closure {
                func,
                use_vars,
                result,
            },
            Some(node.span),
        );
        self.script.func_mut(func).callable_op = Some(closure);
        self.append_to_current(closure);
        Ok(result)
    }

    fn parse_error_suppress(&mut self, node: &Node, expr: &Node) -> Result<OperandId, IrError> {
        let suppress_block = self.script.new_block();
        let jmp = self.new_op(
            OpKind::Jump {
                target: suppress_block,
            },
            Some(node.span),
        );
        self.append_to_current(jmp);
        self.script
            .block_mut(suppress_block)
            .add_predecessor(self.current_block);
        self.current_block = suppress_block;

        let result = self.parse_expr_node(expr)?;

        let end_block = self.script.new_block();
        let jmp = self.new_op(OpKind::Jump { target: end_block }, Some(node.span));
        self.append_to_current(jmp);
        self.script
            .block_mut(end_block)
            .add_predecessor(self.current_block);
        self.current_block = end_block;
        Ok(result)
    }

    fn parse_expr_const_fetch(&mut self, node: &Node, name: &Node) -> Result<OperandId, IrError> {
        let name_str = name_to_string(name).unwrap_or_default();
        match name_str.to_lowercase().as_str() {
            "null" => return Ok(self.script.new_null()),
            "true" => return Ok(self.script.new_bool(true)),
            "false" => return Ok(self.script.new_bool(false)),
            _ => {}
        }

        let name_oper = self.parse_expr_node(name)?;
        let result = self.script.new_temporary(None);
        let op = self.new_op(
            OpKind::ConstFetch {
                name: name_oper,
                result,
            },
            Some(node.span),
        );
        self.append_to_current(op);

        if let Some(value) = self.consts_def.get(&name_str).copied() {
            self.script.op_mut(op).change_var("Result", value);
            self.script.add_write_ref(op, value);
            return Ok(value);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cfg::infrastructure::build_cfg;

    #[test]
    fn number_parsing_accepts_hex() {
        assert_eq!(parse_number("0x10"), Some(16.0));
        assert_eq!(parse_number("2"), Some(2.0));
        assert_eq!(parse_number("1.5"), Some(1.5));
        assert_eq!(parse_number("zz"), None);
    }

    #[test]
    fn ternary_lowers_to_phi_with_two_operands() {
        let script = build_cfg(b"<?php $a = $c ? 'x' : 'y'; ?>", "t.php").unwrap();
        let phi = script
            .ops
            .iter()
            .find_map(|op| op.phi_vars())
            .expect("ternary phi");
        assert_eq!(phi.len(), 2);
    }

    #[test]
    fn compound_assign_lowers_to_binary_plus_assign() {
        let script = build_cfg(b"<?php $a = 'x'; $a .= $b; ?>", "t.php").unwrap();
        let has_concat = script.ops.iter().any(|op| {
            matches!(
                op.kind,
                OpKind::Binary {
                    op: BinaryOpKind::Concat,
                    ..
                }
            )
        });
        assert!(has_concat);
    }

    #[test]
    fn settype_rewrites_to_cast_and_assign() {
        let script = build_cfg(b"<?php settype($v, 'int'); ?>", "t.php").unwrap();
        let has_cast = script.ops.iter().any(|op| {
            matches!(
                op.kind,
                OpKind::Cast {
                    kind: CastOpKind::Int,
                    ..
                }
            )
        });
        assert!(has_cast);
    }

    #[test]
    fn includes_record_literal_paths() {
        let script = build_cfg(b"<?php include 'lib.php'; ?>", "t.php").unwrap();
        assert_eq!(script.include_files, vec!["lib.php".to_string()]);
    }

    #[test]
    fn closures_register_anonymous_functions() {
        let script =
            build_cfg(b"<?php $f = function ($x) use ($y) { return $x; }; ?>", "t.php").unwrap();
        assert!(script.funcs.keys().any(|k| k.starts_with("{anonymous}#")));
    }
}
