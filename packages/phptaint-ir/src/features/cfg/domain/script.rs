//! Script: the per-file analysis unit and the arena behind it.
//!
//! All operands, ops, blocks and functions of one file live in vectors owned
//! by the `Script`; ids are plain indices. The use/def web is therefore
//! rewritable in place: passes swap ids inside op slots and patch the
//! affected operand's user/writer lists through the methods here.

use indexmap::IndexMap;

use super::assertion::{Assertion, AssertionMode};
use super::block::{Block, BlockId};
use super::func::{Func, FuncId};
use super::op::{Op, OpId, OpKind};
use super::operand::{Operand, OperandId, OperandKind, VarAssert};

#[derive(Debug)]
pub struct Script {
    pub file_path: String,
    pub main: FuncId,
    /// Named functions by scoped name (`f`, `Class::m`, `{anonymous}#N`).
    pub funcs: IndexMap<String, FuncId>,
    /// Include/require paths seen as string literals.
    pub include_files: Vec<String>,

    pub operands: Vec<Operand>,
    pub ops: Vec<Op>,
    pub blocks: Vec<Block>,
    pub functions: Vec<Func>,

    anon_counter: u32,
}

impl Script {
    /// An empty script whose `main` points at function 0; the builder
    /// allocates that function first.
    pub fn empty(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            main: FuncId(0),
            funcs: IndexMap::new(),
            include_files: Vec::new(),
            operands: Vec::new(),
            ops: Vec::new(),
            blocks: Vec::new(),
            functions: Vec::new(),
            anon_counter: 0,
        }
    }

    pub fn next_anon_id(&mut self) -> u32 {
        let id = self.anon_counter;
        self.anon_counter += 1;
        id
    }

    // ── operand arena ─────────────────────────────────────────────────

    pub fn new_operand(&mut self, kind: OperandKind) -> OperandId {
        let id = OperandId(self.operands.len() as u32);
        self.operands.push(Operand::new(kind));
        id
    }

    pub fn new_string(&mut self, val: impl Into<String>) -> OperandId {
        self.new_operand(OperandKind::String { val: val.into() })
    }

    pub fn new_number(&mut self, val: f64) -> OperandId {
        self.new_operand(OperandKind::Number { val })
    }

    pub fn new_bool(&mut self, val: bool) -> OperandId {
        self.new_operand(OperandKind::Bool { val })
    }

    pub fn new_null(&mut self) -> OperandId {
        self.new_operand(OperandKind::Null)
    }

    pub fn new_temporary(&mut self, original: Option<OperandId>) -> OperandId {
        self.new_operand(OperandKind::Temporary { original })
    }

    /// A named variable; its value defaults to a fresh null operand.
    pub fn new_variable(&mut self, name: OperandId, value: Option<OperandId>) -> OperandId {
        let value = match value {
            Some(v) => v,
            None => self.new_null(),
        };
        self.new_operand(OperandKind::Variable { name, value })
    }

    pub fn new_symbolic(&mut self, name: impl Into<String>, tainted: bool) -> OperandId {
        let id = OperandId(self.operands.len() as u32);
        self.operands.push(Operand::with_taint(
            OperandKind::Symbolic { name: name.into() },
            tainted,
        ));
        id
    }

    pub fn operand(&self, id: OperandId) -> &Operand {
        &self.operands[id.0 as usize]
    }

    pub fn operand_mut(&mut self, id: OperandId) -> &mut Operand {
        &mut self.operands[id.0 as usize]
    }

    // ── block arena ───────────────────────────────────────────────────

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new());
        id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    // ── function arena ────────────────────────────────────────────────

    pub fn add_func(&mut self, func: Func) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(func);
        id
    }

    /// Register an already-allocated function under its scoped name.
    pub fn register_func(&mut self, id: FuncId) {
        let name = self.functions[id.0 as usize].scoped_name();
        self.funcs.insert(name, id);
    }

    pub fn func(&self, id: FuncId) -> &Func {
        &self.functions[id.0 as usize]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Func {
        &mut self.functions[id.0 as usize]
    }

    /// Main first, then named functions in registration order.
    pub fn all_funcs(&self) -> Vec<FuncId> {
        let mut out = vec![self.main];
        for id in self.funcs.values() {
            if *id != self.main && !out.contains(id) {
                out.push(*id);
            }
        }
        out
    }

    // ── op arena ──────────────────────────────────────────────────────

    /// Allocate an op and wire its operand slots into the use/def web.
    pub fn add_op(&mut self, op: Op) -> OpId {
        let id = OpId(self.ops.len() as u32);
        self.ops.push(op);
        self.register_refs(id);
        id
    }

    pub fn op(&self, id: OpId) -> &Op {
        &self.ops[id.0 as usize]
    }

    pub fn op_mut(&mut self, id: OpId) -> &mut Op {
        &mut self.ops[id.0 as usize]
    }

    /// Append an op to a block and record the owning block on the op.
    pub fn append_op(&mut self, block: BlockId, op: OpId) {
        self.ops[op.0 as usize].block = Some(block);
        self.blocks[block.0 as usize].ops.push(op);
    }

    fn register_refs(&mut self, id: OpId) {
        let vars = self.ops[id.0 as usize].vars();
        for (slot, oper) in vars {
            if self.ops[id.0 as usize].is_write_var(slot) {
                self.add_write_ref(id, oper);
            } else {
                self.add_read_ref(id, oper);
            }
        }
        // parameters both read and define their name operand
        if let OpKind::Param { name, .. } = self.ops[id.0 as usize].kind {
            self.add_write_ref(id, name);
        }
        let lists = self.ops[id.0 as usize].list_vars();
        for (_, opers) in lists {
            for oper in opers {
                self.add_read_ref(id, oper);
            }
        }
    }

    pub fn add_read_ref(&mut self, op: OpId, oper: OperandId) {
        self.operands[oper.0 as usize].add_user(op);
    }

    pub fn add_write_ref(&mut self, op: OpId, oper: OperandId) {
        self.operands[oper.0 as usize].add_writer(op);
    }

    // ── φ maintenance ─────────────────────────────────────────────────

    /// Add an operand to a φ, skipping its own result and duplicates.
    pub fn phi_add_operand(&mut self, phi: OpId, oper: OperandId) {
        let OpKind::Phi { vars, result, .. } = &self.ops[phi.0 as usize].kind else {
            return;
        };
        if *result == oper || vars.contains(&oper) {
            return;
        }
        if let OpKind::Phi { vars, .. } = &mut self.ops[phi.0 as usize].kind {
            vars.push(oper);
        }
        self.add_read_ref(phi, oper);
    }

    pub fn phi_remove_operand(&mut self, phi: OpId, oper: OperandId) {
        let OpKind::Phi { vars, .. } = &mut self.ops[phi.0 as usize].kind else {
            return;
        };
        let before = vars.len();
        vars.retain(|v| *v != oper);
        if vars.len() != before {
            self.operands[oper.0 as usize].remove_user(phi);
        }
    }

    pub fn phi_has_operand(&self, phi: OpId, oper: OperandId) -> bool {
        match &self.ops[phi.0 as usize].kind {
            OpKind::Phi { vars, .. } => vars.contains(&oper),
            _ => false,
        }
    }

    // ── operand inspection ────────────────────────────────────────────

    /// Name of a name-carrying operand (bound variable, variable, string,
    /// temporary via its original).
    pub fn operand_name(&self, id: OperandId) -> Option<String> {
        match &self.operand(id).kind {
            OperandKind::BoundVariable { name, .. } => self.operand_name(*name),
            OperandKind::Variable { name, .. } => self.operand_name(*name),
            OperandKind::String { val } => Some(val.clone()),
            OperandKind::Temporary {
                original: Some(orig),
            } => self.operand_name(*orig),
            _ => None,
        }
    }

    /// The string-name operand of a temporary wrapping a named variable.
    pub fn named_variable(&self, id: OperandId) -> Option<OperandId> {
        if let OperandKind::Temporary {
            original: Some(orig),
        } = self.operand(id).kind
        {
            if let OperandKind::Variable { name, .. } = self.operand(orig).kind {
                if matches!(self.operand(name).kind, OperandKind::String { .. }) {
                    return Some(name);
                }
            }
        }
        None
    }

    /// Deepest value of an operand: scalars, symbolics and objects resolve
    /// to themselves; variables and temporaries chase their value chain.
    pub fn operand_value(&self, id: OperandId) -> Option<OperandId> {
        match &self.operand(id).kind {
            OperandKind::String { .. }
            | OperandKind::Number { .. }
            | OperandKind::Bool { .. }
            | OperandKind::Null
            | OperandKind::Object { .. }
            | OperandKind::Symbolic { .. } => Some(id),
            OperandKind::Variable { value, .. } => self.operand_value(*value),
            OperandKind::BoundVariable { value, .. } => {
                value.and_then(|v| self.operand_value(v))
            }
            OperandKind::Temporary { original } => {
                original.and_then(|orig| self.operand_value(orig))
            }
        }
    }

    /// Write through temporaries into the wrapped variable's value slot.
    pub fn set_operand_value(&mut self, id: OperandId, val: OperandId) {
        match self.operand(id).kind {
            OperandKind::Temporary {
                original: Some(orig),
            } => self.set_operand_value(orig, val),
            OperandKind::Variable { .. } => {
                if let OperandKind::Variable { value, .. } =
                    &mut self.operand_mut(id).kind
                {
                    *value = val;
                }
            }
            OperandKind::BoundVariable { .. } => {
                if let OperandKind::BoundVariable { value, .. } =
                    &mut self.operand_mut(id).kind
                {
                    *value = Some(val);
                }
            }
            _ => {}
        }
    }

    pub fn string_value(&self, id: OperandId) -> Option<&str> {
        match &self.operand(id).kind {
            OperandKind::String { val } => Some(val),
            _ => None,
        }
    }

    // ── assertions and conditions ─────────────────────────────────────

    /// Attach `(var, assertion)` to `target`; a second assertion over the
    /// same variable folds both into a composite with the given mode.
    pub fn add_assertion(
        &mut self,
        target: OperandId,
        var: OperandId,
        assertion: Assertion,
        mode: AssertionMode,
    ) {
        let var_name = self.named_variable(var);
        let existing = self.operand(target).assertions.clone();
        for (i, entry) in existing.iter().enumerate() {
            let same = entry.var == var
                || (var_name.is_some() && self.named_variable(entry.var) == var_name);
            if same {
                let merged = Assertion::composite(
                    vec![entry.assertion.clone(), assertion],
                    mode,
                    false,
                );
                self.operand_mut(target).assertions[i].assertion = merged;
                return;
            }
        }
        self.operand_mut(target)
            .assertions
            .push(VarAssert { var, assertion });
    }

    /// Record the path conditions under which `block` is entered.
    pub fn set_block_condition(&mut self, block: BlockId, conds: &[OperandId]) {
        for cond in conds {
            self.operand_mut(*cond).add_cond_usage(block);
        }
        self.block_mut(block).conditions = conds.to_vec();
    }

    // ── derived strings ───────────────────────────────────────────────

    /// Textual form of an array-dim fetch (`$arr[key]`), chasing fetches
    /// through the base's defining op. Empty bases and non-string dims
    /// yield `None`.
    pub fn dim_fetch_string(&self, op: OpId) -> Option<String> {
        let OpKind::ArrayDimFetch { var, dim, .. } = self.op(op).kind else {
            return None;
        };
        let dim_str = self.operand_name(dim)?;
        if let Some(var_name) = self.operand_name(var) {
            return Some(format!("{var_name}[{dim_str}]"));
        }
        let writer = self.operand(var).writer()?;
        if matches!(self.op(writer).kind, OpKind::ArrayDimFetch { .. }) {
            let base = self.dim_fetch_string(writer)?;
            return Some(format!("{base}[{dim_str}]"));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_op_registers_use_and_def_refs() {
        let mut s = Script::empty("t.php");
        let name = s.new_string("$a");
        let var = s.new_variable(name, None);
        let lhs = s.new_temporary(Some(var));
        let rhs = s.new_string("v");
        let result = s.new_temporary(None);
        let op = s.add_op(Op::new(
            OpKind::Assign {
                var: lhs,
                expr: rhs,
                result,
            },
            None,
        ));
        assert!(s.operand(lhs).writers.contains(&op));
        assert!(s.operand(rhs).users.contains(&op));
        assert!(s.operand(result).writers.contains(&op));
    }

    #[test]
    fn phi_skips_self_and_duplicates() {
        let mut s = Script::empty("t.php");
        let result = s.new_temporary(None);
        let a = s.new_temporary(None);
        let block = s.new_block();
        let phi = s.add_op(Op::new(
            OpKind::Phi {
                vars: Vec::new(),
                result,
                block,
            },
            None,
        ));
        s.phi_add_operand(phi, a);
        s.phi_add_operand(phi, a);
        s.phi_add_operand(phi, result);
        assert_eq!(s.op(phi).phi_vars().map(Vec::len), Some(1));
        assert!(s.operand(a).users.contains(&phi));
        s.phi_remove_operand(phi, a);
        assert!(!s.operand(a).users.contains(&phi));
    }

    #[test]
    fn operand_value_chases_variable_chain() {
        let mut s = Script::empty("t.php");
        let name = s.new_string("$a");
        let lit = s.new_string("payload");
        let var = s.new_variable(name, None);
        s.set_operand_value(var, lit);
        let temp = s.new_temporary(Some(var));
        assert_eq!(s.operand_value(temp), Some(lit));
    }

    #[test]
    fn dim_fetch_string_nests_through_writers() {
        let mut s = Script::empty("t.php");
        let base_name = s.new_string("$arr");
        let base_var = s.new_variable(base_name, None);
        let base = s.new_temporary(Some(base_var));
        let dim0 = s.new_string("a");
        let r0 = s.new_temporary(None);
        let fetch0 = s.add_op(Op::new(
            OpKind::ArrayDimFetch {
                var: base,
                dim: dim0,
                result: r0,
            },
            None,
        ));
        let dim1 = s.new_string("b");
        let r1 = s.new_temporary(None);
        let fetch1 = s.add_op(Op::new(
            OpKind::ArrayDimFetch {
                var: r0,
                dim: dim1,
                result: r1,
            },
            None,
        ));
        assert_eq!(s.dim_fetch_string(fetch0).as_deref(), Some("$arr[a]"));
        assert_eq!(s.dim_fetch_string(fetch1).as_deref(), Some("$arr[a][b]"));
    }
}
