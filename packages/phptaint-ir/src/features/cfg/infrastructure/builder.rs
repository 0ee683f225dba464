//! CFG/SSA builder core.
//!
//! `build_cfg` parses and rewrites a file, then lowers the normalized AST
//! into a [`Script`]: one synthetic main function for the top-level code and
//! one function per declaration. SSA form is built on the fly — variable
//! reads go through the protocol in `ssa.rs`, which creates incomplete φ
//! nodes while the CFG is still growing and completes them when the
//! function's body is done.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use indexmap::IndexMap;

use crate::features::ast_rewriting::{
    AstTraverser, LoopResolver, MagicConstantResolver, NamespaceResolver,
};
use crate::features::cfg::domain::{
    is_builtin_type, BlockId, ClassFlags, Func, FuncFlags, FuncId, Op, OpId, OpKind, OperandId,
    Script, TypeInfo,
};
use crate::features::parsing::domain::ast::{name_to_string, Node};
use crate::features::parsing::domain::NodeKind;
use crate::features::parsing::infrastructure::parse_php;
use crate::shared::models::IrError;

/// How an expression list is consumed: each element read through the SSA
/// protocol, written as a destination, or passed through raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParserMode {
    None,
    Read,
    Write,
}

/// Per-function build state.
pub(crate) struct FuncContext {
    pub labels: FxHashMap<String, BlockId>,
    pub unresolved_gotos: FxHashMap<String, Vec<BlockId>>,
    pub local_variables: FxHashMap<(BlockId, String), OperandId>,
    /// Incomplete φs per block, ordered for deterministic completion.
    pub incomplete_phis: IndexMap<BlockId, IndexMap<String, OpId>>,
    /// Path-condition stack for the blocks currently being built.
    pub curr_conds: Vec<OperandId>,
    pub is_complete: bool,
}

impl FuncContext {
    pub fn new() -> Self {
        Self {
            labels: FxHashMap::default(),
            unresolved_gotos: FxHashMap::default(),
            local_variables: FxHashMap::default(),
            incomplete_phis: IndexMap::new(),
            curr_conds: Vec::new(),
            is_complete: false,
        }
    }

    pub fn local_var(&self, block: BlockId, name: &str) -> Option<OperandId> {
        self.local_variables.get(&(block, name.to_string())).copied()
    }

    pub fn set_local_var(&mut self, block: BlockId, name: &str, value: OperandId) {
        self.local_variables.insert((block, name.to_string()), value);
    }

    pub fn add_incomplete_phi(&mut self, block: BlockId, name: &str, phi: OpId) {
        self.incomplete_phis
            .entry(block)
            .or_default()
            .insert(name.to_string(), phi);
    }

    pub fn push_cond(&mut self, cond: OperandId) {
        self.curr_conds.push(cond);
    }

    pub fn pop_cond(&mut self) {
        self.curr_conds.pop();
    }
}

pub struct CfgBuilder {
    pub(crate) script: Script,
    pub(crate) ctx: FuncContext,
    pub(crate) variable_names: FxHashSet<String>,
    /// Constant definitions collected at top level, keyed by resolved name.
    pub(crate) consts_def: FxHashMap<String, OperandId>,
    /// String operand of the enclosing class name, when inside one.
    pub(crate) curr_class: Option<OperandId>,
    pub(crate) curr_namespace: String,
    pub(crate) current_block: BlockId,
    pub(crate) current_func: FuncId,
}

/// Parse, rewrite and lower one file.
pub fn build_cfg(source: &[u8], file_path: &str) -> Result<Script, IrError> {
    let file_name = Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.to_string());

    let outcome = parse_php(source, file_path)?;
    for diag in &outcome.diagnostics {
        tracing::debug!(
            file = file_path,
            line = diag.span.start_line,
            "parse diagnostic: {}",
            diag.message
        );
    }

    let mut stmts = outcome.stmts;
    let mut rewriter = AstTraverser::new();
    rewriter.add_rewriter(Box::new(NamespaceResolver::new()));
    rewriter.add_rewriter(Box::new(LoopResolver::new()));
    rewriter.add_rewriter(Box::new(MagicConstantResolver::new(file_name)));
    rewriter.traverse(&mut stmts)?;

    let mut script = Script::empty(file_path);
    let entry = script.new_block();
    let main = script.add_func(Func::new(
        "{main}",
        FuncFlags::PUBLIC,
        TypeInfo::Void,
        entry,
        None,
    ));
    script.main = main;

    let mut builder = CfgBuilder {
        script,
        ctx: FuncContext::new(),
        variable_names: FxHashSet::default(),
        consts_def: FxHashMap::default(),
        curr_class: None,
        curr_namespace: String::new(),
        current_block: entry,
        current_func: main,
    };
    builder.parse_func(main, &[], &stmts)?;
    Ok(builder.script)
}

impl CfgBuilder {
    pub(crate) fn append_to_current(&mut self, op: OpId) {
        self.script.append_op(self.current_block, op);
    }

    /// Allocate an op with a span, without appending it anywhere.
    pub(crate) fn new_op(&mut self, kind: OpKind, span: Option<crate::shared::models::Span>) -> OpId {
        self.script.add_op(Op::new(kind, span))
    }

    /// Lower a function body: parameters into the entry block, then the
    /// statements; finish by completing every recorded incomplete φ.
    pub(crate) fn parse_func(
        &mut self,
        func: FuncId,
        params: &[Node],
        stmts: &[Node],
    ) -> Result<(), IrError> {
        let prev_func = std::mem::replace(&mut self.current_func, func);
        let prev_ctx = std::mem::replace(&mut self.ctx, FuncContext::new());
        let entry = self.script.func(func).entry_block;
        let prev_block = std::mem::replace(&mut self.current_block, entry);

        for param in params {
            let NodeKind::Param {
                name,
                by_ref,
                variadic,
                ty,
                default,
            } = &param.kind
            else {
                return Err(IrError::MalformedNode {
                    construct: "Param",
                    message: format!("unexpected {} in parameter list", param.kind_name()),
                });
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
            }
            let declared_type = self.parse_type_node(ty.as_deref());
            let name_oper = self.script.new_string(name.clone());
            let var = self.script.new_variable(name_oper, None);
            let result = self.script.new_temporary(Some(var));
            let op = self.new_op(
                OpKind::Param {
                    name: name_oper,
                    by_ref: *by_ref,
                    variadic: *variadic,
                    default_var,
                    default_block,
                    declared_type,
                    result,
                },
                Some(param.span),
            );
            self.script.func_mut(func).params.push(op);
            self.write_variable_name(name, result, entry);
            self.script.append_op(entry, op);
        }

        let end_block = self.parse_stmt_nodes(stmts, entry)?;
        self.current_block = prev_block;
        if self.script.block(end_block).dead {
            let ret = self.new_op(OpKind::Return { expr: None }, None);
            self.script.append_op(end_block, ret);
        }

        self.ctx.is_complete = true;
        let incomplete = std::mem::take(&mut self.ctx.incomplete_phis);
        for (block, phis) in incomplete {
            for (name, phi) in phis {
                let preds = self.script.block(block).preds.clone();
                for pred in preds {
                    if !self.script.block(pred).dead {
                        let vr = self.read_variable_name(&name, pred);
                        self.script.phi_add_operand(phi, vr);
                    }
                }
                self.script.block_mut(block).add_phi(phi);
            }
        }

        self.current_func = prev_func;
        self.ctx = prev_ctx;
        Ok(())
    }

    /// Declared-type lowering. Unknown names become references; `?T` sets
    /// the nullable flag.
    pub(crate) fn parse_type_node(&mut self, node: Option<&Node>) -> TypeInfo {
        let Some(node) = node else {
            return TypeInfo::Mixed;
        };
        match &node.kind {
            NodeKind::Name { .. } | NodeKind::Identifier { .. } => {
                let name = name_to_string(node).unwrap_or_default();
                match name.as_str() {
                    "mixed" => TypeInfo::Mixed,
                    "void" => TypeInfo::Void,
                    _ if is_builtin_type(&name) => TypeInfo::Literal {
                        name,
                        nullable: false,
                    },
                    _ => TypeInfo::Reference {
                        name,
                        nullable: false,
                    },
                }
            }
            NodeKind::TypeNullable { ty } => match self.parse_type_node(Some(ty)) {
                TypeInfo::Literal { name, .. } => TypeInfo::Literal {
                    name,
                    nullable: true,
                },
                TypeInfo::Reference { name, .. } => TypeInfo::Reference {
                    name,
                    nullable: true,
                },
                other => other,
            },
            NodeKind::TypeUnion { types } => TypeInfo::Union(
                types
                    .iter()
                    .map(|t| self.parse_type_node(Some(t)))
                    .collect(),
            ),
            _ => TypeInfo::Mixed,
        }
    }

    pub(crate) fn parse_func_modifiers(&self, modifiers: &[String], is_ref: bool) -> FuncFlags {
        let mut flags = FuncFlags::empty();
        if is_ref {
            flags |= FuncFlags::RETURNS_REF;
        }
        for m in modifiers {
            match m.as_str() {
                "public" => flags |= FuncFlags::PUBLIC,
                "protected" => flags |= FuncFlags::PROTECTED,
                "private" => flags |= FuncFlags::PRIVATE,
                "static" => flags |= FuncFlags::STATIC,
                "abstract" => flags |= FuncFlags::ABSTRACT,
                "final" => flags |= FuncFlags::FINAL,
                other => {
                    tracing::warn!(modifier = other, "unknown function modifier");
                }
            }
        }
        flags
    }

    pub(crate) fn parse_class_modifiers(&self, modifiers: &[String]) -> ClassFlags {
        let mut flags = ClassFlags::empty();
        for m in modifiers {
            match m.as_str() {
                "public" => flags |= ClassFlags::PUBLIC,
                "protected" => flags |= ClassFlags::PROTECTED,
                "private" => flags |= ClassFlags::PRIVATE,
                "static" => flags |= ClassFlags::STATIC,
                "abstract" => flags |= ClassFlags::ABSTRACT,
                "final" => flags |= ClassFlags::FINAL,
                "readonly" => flags |= ClassFlags::READONLY,
                "var" => flags |= ClassFlags::PUBLIC,
                other => {
                    tracing::warn!(modifier = other, "unknown class modifier");
                }
            }
        }
        flags
    }
}

/// `is_*` predicates and value coercion helpers that assert a type on their
/// first argument.
pub(crate) fn type_assert_name(func_name: &str) -> Option<&'static str> {
    let lower = func_name.to_lowercase();
    Some(match lower.as_str() {
        "is_array" => "array",
        "is_bool" => "bool",
        "is_callable" => "callable",
        "is_double" | "is_float" | "is_real" => "float",
        "is_int" | "is_integer" | "is_long" => "int",
        "is_null" => "null",
        "is_numeric" => "numeric",
        "is_object" => "object",
        "is_string" => "string",
        "is_resource" => "resource",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(src: &str) -> Script {
        build_cfg(src.as_bytes(), "test.php").unwrap()
    }

    #[test]
    fn builds_main_with_echo_sink() {
        let script = build("<?php echo $_GET['x']; ?>");
        let main = script.func(script.main);
        assert!(main.has_taint, "superglobal read marks the function");
        let entry = script.block(main.entry_block);
        assert!(entry.has_tainted);
        let kinds: Vec<_> = entry
            .ops
            .iter()
            .map(|op| script.op(*op).kind_name())
            .collect();
        assert!(kinds.contains(&"ExprArrayDimFetch"));
        assert!(kinds.contains(&"Echo"));
    }

    #[test]
    fn named_functions_are_registered_with_scoped_names() {
        let script = build("<?php function f() {} class C { public function m() {} } ?>");
        assert!(script.funcs.contains_key("f"));
        assert!(script.funcs.contains_key("C::m"));
    }

    #[test]
    fn read_write_read_in_one_block_is_stable() {
        let script = build("<?php $a = 1; echo $a; echo $a; ?>");
        let main = script.func(script.main);
        let entry = script.block(main.entry_block);
        let echo_exprs: Vec<_> = entry
            .ops
            .iter()
            .filter_map(|op| match &script.op(*op).kind {
                OpKind::Echo { expr } => Some(*expr),
                _ => None,
            })
            .collect();
        assert_eq!(echo_exprs.len(), 2);
        assert_eq!(echo_exprs[0], echo_exprs[1], "same SSA value on both reads");
    }

    #[test]
    fn break_outside_loop_depth_fails_the_build() {
        let err = build_cfg(b"<?php for (;;) { break 2; } ?>", "test.php").unwrap_err();
        assert!(matches!(err, IrError::LoopLevelTooDeep { .. }));
    }

    #[test]
    fn use_def_web_is_consistent_after_build() {
        let script = build(
            "<?php $a = $_POST['y']; $b = $a . 'x'; if ($b) { echo $b; } else { print $a; } ?>",
        );
        for (idx, op) in script.ops.iter().enumerate() {
            let id = OpId(idx as u32);
            for (slot, oper) in op.vars() {
                let operand = script.operand(oper);
                if op.is_write_var(slot) {
                    assert!(
                        operand.writers.contains(&id),
                        "writer list missing op for slot {slot}"
                    );
                } else {
                    assert!(
                        operand.users.contains(&id),
                        "user list missing op for slot {slot}"
                    );
                }
            }
            for (_, list) in op.list_vars() {
                for oper in list {
                    assert!(script.operand(oper).users.contains(&id));
                }
            }
        }
    }

    #[test]
    fn phi_results_are_written_only_by_their_phi() {
        let script = build("<?php if ($c) { $a = 1; } else { $a = 2; } echo $a; ?>");
        for (idx, op) in script.ops.iter().enumerate() {
            if let OpKind::Phi { result, .. } = op.kind {
                let writers = &script.operand(result).writers;
                assert_eq!(writers, &vec![OpId(idx as u32)]);
            }
        }
        // the merged read reaches the echo through a φ
        let has_phi = script.ops.iter().any(|op| matches!(op.kind, OpKind::Phi { .. }));
        assert!(has_phi);
    }

    #[test]
    fn reachable_blocks_have_predecessors() {
        let script = build("<?php while ($x) { $y = 1; } echo $y; ?>");
        let main = script.func(script.main);
        let mut seen = vec![main.entry_block];
        let mut queue = vec![main.entry_block];
        while let Some(block) = queue.pop() {
            for op in script.block(block).ops.clone() {
                for (_, sub) in script.op(op).sub_blocks() {
                    if !seen.contains(&sub) {
                        seen.push(sub);
                        queue.push(sub);
                    }
                }
            }
        }
        for block in seen {
            if block == main.entry_block {
                continue;
            }
            let b = script.block(block);
            assert!(
                !b.preds.is_empty() || b.dead,
                "reachable live block without predecessors"
            );
        }
    }

    #[test]
    fn constants_fold_into_const_fetches() {
        let script = build("<?php const GREETING = 'hi'; $a = GREETING; ?>");
        let found = script.ops.iter().any(|op| {
            matches!(&op.kind, OpKind::ConstFetch { result, .. }
                if script.string_value(*result) == Some("hi"))
        });
        assert!(found, "const fetch resolves to the recorded literal");
    }
}
