//! On-the-fly SSA: the variable read/write protocol.
//!
//! Reads of a named variable consult the block-local definition map first,
//! then the superglobal table, then recurse through predecessors. While the
//! CFG is incomplete a read plants an incomplete φ and returns its result;
//! once complete, single-predecessor blocks forward the query and join
//! blocks grow a φ fed from every live predecessor (Braun et al.).

use crate::features::cfg::domain::{
    Assertion, BlockId, OpKind, OperandId, OperandKind, VarScope,
};
use crate::shared::models::IrError;

use super::builder::CfgBuilder;

/// Superglobals and the symbolic names their reads produce.
pub(crate) fn superglobal_symbolic_name(var: &str) -> Option<&'static str> {
    Some(match var {
        "$_GET" => "globalgets",
        "$_POST" => "globalposts",
        "$_REQUEST" => "globalrequest",
        "$_FILES" => "globalfiles",
        "$_COOKIE" => "globalcookie",
        "$_SERVERS" => "globalservers",
        _ => return None,
    })
}

impl CfgBuilder {
    /// Resolve an operand to its current SSA value.
    pub(crate) fn read_variable(&mut self, oper: OperandId) -> Result<OperandId, IrError> {
        match self.script.operand(oper).kind.clone() {
            OperandKind::BoundVariable { .. } => Ok(oper),
            OperandKind::Variable { name, .. } => match self.script.operand(name).kind.clone() {
                OperandKind::String { val } => {
                    Ok(self.read_variable_name(&val, self.current_block))
                }
                OperandKind::Variable { .. } | OperandKind::Temporary { .. } => {
                    // variable-variable: resolve the name, keep the carrier
                    self.read_variable(name)?;
                    Ok(oper)
                }
                other => Err(IrError::Cfg {
                    file: self.script.file_path.clone(),
                    message: format!("cannot read variable named by {other:?}"),
                }),
            },
            OperandKind::Temporary {
                original: Some(orig),
            } => self.read_variable(orig),
            _ => Ok(oper),
        }
    }

    /// Current definition of `name` as seen from `block`.
    pub(crate) fn read_variable_name(&mut self, name: &str, block: BlockId) -> OperandId {
        if let Some(val) = self.ctx.local_var(block, name) {
            return val;
        }
        if let Some(oper) = self.create_global_symbolic(name) {
            return oper;
        }
        self.read_variable_recursive(name, block)
    }

    fn read_variable_recursive(&mut self, name: &str, block: BlockId) -> OperandId {
        if !self.ctx.is_complete {
            // CFG still growing: plant an incomplete φ and return its result
            let tvar = self.fresh_named_temporary(name);
            let phi = self.new_op(
                OpKind::Phi {
                    vars: Vec::new(),
                    result: tvar,
                    block,
                },
                None,
            );
            self.script.op_mut(phi).block = Some(block);
            self.ctx.add_incomplete_phi(block, name, phi);
            self.write_variable_name(name, tvar, block);
            return tvar;
        }

        let preds = self.script.block(block).preds.clone();
        let single_live = preds.len() == 1 && !self.script.block(preds[0]).dead;
        if single_live {
            let tvar = self.read_variable_name(name, preds[0]);
            self.write_variable_name(name, tvar, block);
            return tvar;
        }

        // join block: create the φ first so recursion through loops
        // terminates, then fill it from every live predecessor
        let tvar = self.fresh_named_temporary(name);
        let phi = self.new_op(
            OpKind::Phi {
                vars: Vec::new(),
                result: tvar,
                block,
            },
            None,
        );
        self.script.op_mut(phi).block = Some(block);
        self.script.block_mut(block).add_phi(phi);
        self.write_variable_name(name, tvar, block);
        for pred in preds {
            if !self.script.block(pred).dead {
                let oper = self.read_variable_name(name, pred);
                self.script.phi_add_operand(phi, oper);
            }
        }
        tvar
    }

    fn fresh_named_temporary(&mut self, name: &str) -> OperandId {
        let name_oper = self.script.new_string(name);
        let var = self.script.new_variable(name_oper, None);
        self.script.new_temporary(Some(var))
    }

    /// Reads of superglobals produce fresh tainted symbolic operands and
    /// mark the surrounding block and function.
    pub(crate) fn create_global_symbolic(&mut self, name: &str) -> Option<OperandId> {
        let symbolic = superglobal_symbolic_name(name)?;
        self.script.func_mut(self.current_func).has_taint = true;
        self.script.block_mut(self.current_block).has_tainted = true;
        Some(self.script.new_symbolic(symbolic, true))
    }

    /// Begin a new definition of a named variable: unwrap temporaries to the
    /// original variable, wrap it in a fresh temporary and record it as the
    /// current definition in this block.
    pub(crate) fn write_variable(&mut self, oper: OperandId) -> Result<OperandId, IrError> {
        let mut vr = oper;
        loop {
            match self.script.operand(vr).kind {
                OperandKind::Temporary {
                    original: Some(orig),
                } => vr = orig,
                _ => break,
            }
        }

        if let OperandKind::Variable { name, .. } = self.script.operand(vr).kind {
            match self.script.operand(name).kind.clone() {
                OperandKind::Variable { .. } => {
                    self.read_variable(name)?;
                }
                OperandKind::String { val } => {
                    let fresh = self.script.new_temporary(Some(vr));
                    self.write_variable_name(&val, fresh, self.current_block);
                    return Ok(fresh);
                }
                _ => {}
            }
        }
        Ok(vr)
    }

    pub(crate) fn write_variable_name(&mut self, name: &str, val: OperandId, block: BlockId) {
        self.variable_names.insert(name.to_string());
        self.ctx.set_local_var(block, name, val);
    }

    /// Materialize the assertions attached to a branch condition: assert on
    /// the true edge, the negation on the false edge. Each asserted variable
    /// is re-read and re-written so the def-use chain stays intact.
    pub(crate) fn process_assertion(
        &mut self,
        oper: OperandId,
        if_block: BlockId,
        else_block: BlockId,
    ) -> Result<(), IrError> {
        let saved = self.current_block;
        let asserts = self.script.operand(oper).assertions.clone();
        for assert in asserts {
            self.current_block = if_block;
            let read = self.read_variable(assert.var)?;
            let write = self.write_variable(assert.var)?;
            let assertion = self.read_assertion(&assert.assertion)?;
            let op = self.new_op(
                OpKind::Assertion {
                    expr: read,
                    assertion,
                    result: write,
                },
                None,
            );
            self.append_to_current(op);

            self.current_block = else_block;
            let read = self.read_variable(assert.var)?;
            let write = self.write_variable(assert.var)?;
            let assertion = self.read_assertion(&assert.assertion)?.negation();
            let op = self.new_op(
                OpKind::Assertion {
                    expr: read,
                    assertion,
                    result: write,
                },
                None,
            );
            self.append_to_current(op);
        }
        self.current_block = saved;
        Ok(())
    }

    /// Re-read the operands inside an assertion in the current block.
    fn read_assertion(&mut self, assertion: &Assertion) -> Result<Assertion, IrError> {
        match assertion {
            Assertion::Type(t) => {
                let oper = self.read_variable(t.operand)?;
                Ok(Assertion::type_assert(oper, t.negated))
            }
            Assertion::Composite(c) => {
                let mut list = Vec::with_capacity(c.list.len());
                for child in &c.list {
                    list.push(self.read_assertion(child)?);
                }
                Ok(Assertion::composite(list, c.mode, c.negated))
            }
        }
    }

    /// `$this` binds to the enclosing object; everything else is a plain
    /// named variable carrier.
    pub(crate) fn variable_operand(&mut self, name_oper: OperandId, name: &str) -> OperandId {
        if name == "$this" {
            return self.script.new_operand(OperandKind::BoundVariable {
                name: name_oper,
                value: None,
                scope: VarScope::Object,
                by_ref: false,
                extra: self.curr_class,
            });
        }
        self.script.new_variable(name_oper, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cfg::domain::Script;
    use crate::features::cfg::infrastructure::build_cfg;

    #[test]
    fn superglobal_table_is_pure_and_closed() {
        for var in ["$_GET", "$_POST", "$_REQUEST", "$_FILES", "$_COOKIE", "$_SERVERS"] {
            assert!(superglobal_symbolic_name(var).is_some());
            assert_eq!(
                superglobal_symbolic_name(var),
                superglobal_symbolic_name(var)
            );
        }
        assert_eq!(superglobal_symbolic_name("$_SESSION"), None);
        assert_eq!(superglobal_symbolic_name("$_COOKIE"), Some("globalcookie"));
    }

    fn count_phis(script: &Script) -> usize {
        script
            .ops
            .iter()
            .filter(|op| matches!(op.kind, OpKind::Phi { .. }))
            .count()
    }

    #[test]
    fn loop_reads_terminate_through_incomplete_phis() {
        let script = build_cfg(
            b"<?php $i = 0; while ($i < 10) { $i = $i + 1; } echo $i; ?>",
            "t.php",
        )
        .unwrap();
        assert!(count_phis(&script) > 0, "loop-carried variable needs a phi");
    }

    #[test]
    fn unknown_variable_read_yields_unwritten_temporary() {
        let script = build_cfg(b"<?php echo $never; ?>", "t.php").unwrap();
        let echo_expr = script
            .ops
            .iter()
            .find_map(|op| match &op.kind {
                OpKind::Echo { expr } => Some(*expr),
                _ => None,
            })
            .unwrap();
        // the carrier exists but nothing ever defines it besides its phi
        let oper = script.operand(echo_expr);
        assert!(matches!(oper.kind, OperandKind::Temporary { .. }));
    }
}
