//! CFG simplifier.
//!
//! Two jobs, per function:
//!
//! * **Empty-jump splicing** — sub-blocks whose first instruction is an
//!   unconditional jump are bypassed: the owning slot is retargeted to the
//!   jump's destination and predecessor links move along. A bypassed block
//!   is collapsed only when every φ it holds is subsumed by a φ of the
//!   destination; its φ operands are absorbed there and the block dies.
//!   A guard set stops recursion through self-loops.
//! * **Trivial-φ removal** — a φ with at most one distinct operand is
//!   deleted and its result replaced everywhere by that operand. Removal is
//!   a worklist: every φ that contained the removed result becomes a new
//!   candidate. Replacing the RHS of a plain assignment with a literal also
//!   propagates the value into the result and the LHS variable.
//!
//! The pass also stamps every visited op with the script's file path so the
//! report can cite it.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::features::cfg::domain::{
    BlockId, FuncId, OpId, OpKind, OperandId, OperandKind, Script,
};
use crate::features::cfg_traversal::ports::BlockPass;

pub struct Simplifier {
    removed: FxHashSet<BlockId>,
    recursion_guard: FxHashSet<OpId>,
    triv_phi_candidates: IndexMap<OpId, BlockId>,
    file_path: String,
    /// Array fetches that appear as assignment targets, by textual form.
    arr_vars: IndexMap<OpId, String>,
    /// Array fetches awaiting a matching assignment target.
    unresolved_arrs: IndexMap<OpId, String>,
}

impl Simplifier {
    pub fn new() -> Self {
        Self {
            removed: FxHashSet::default(),
            recursion_guard: FxHashSet::default(),
            triv_phi_candidates: IndexMap::new(),
            file_path: String::new(),
            arr_vars: IndexMap::new(),
            unresolved_arrs: IndexMap::new(),
        }
    }

    fn splice_jumps(&mut self, op: OpId, block: BlockId, script: &mut Script) {
        if self.recursion_guard.contains(&op) {
            return;
        }
        self.recursion_guard.insert(op);
        script.op_mut(op).file_path = Some(self.file_path.clone());

        for (slot, target) in script.op(op).sub_blocks() {
            if script.block(target).ops.is_empty() {
                continue;
            }
            let first = script.block(target).ops[0];
            let OpKind::Jump { target: jmp_target } = script.op(first).kind else {
                continue;
            };

            if self.removed.contains(&target) {
                script.op_mut(op).change_sub_block(slot, jmp_target);
                script.block_mut(jmp_target).add_predecessor(block);
                continue;
            }

            // simplify the chained jump first, then re-read its target
            self.splice_jumps(first, target, script);
            let OpKind::Jump { target: jmp_target } = script.op(first).kind else {
                continue;
            };
            if jmp_target == target {
                // tight self loop, leave it alone
                continue;
            }

            // the block may only be collapsed if each of its φs feeds a φ
            // of the destination
            let target_phis = script.block(target).phis.clone();
            let succ_phis = script.block(jmp_target).phis.clone();
            let mut pairs = Vec::with_capacity(target_phis.len());
            let mut all_subsumed = true;
            for phi in &target_phis {
                let Some(result) = script.op(*phi).result() else {
                    all_subsumed = false;
                    break;
                };
                match succ_phis
                    .iter()
                    .find(|succ| script.phi_has_operand(**succ, result))
                {
                    Some(succ) => pairs.push((*phi, *succ)),
                    None => {
                        all_subsumed = false;
                        break;
                    }
                }
            }
            if !all_subsumed {
                continue;
            }

            for (phi, succ_phi) in pairs {
                if let Some(result) = script.op(phi).result() {
                    script.phi_remove_operand(succ_phi, result);
                }
                let vars = script.op(phi).phi_vars().cloned().unwrap_or_default();
                for var in vars {
                    script.phi_add_operand(succ_phi, var);
                }
            }
            script.block_mut(target).phis.clear();
            self.removed.insert(target);
            script.block_mut(target).dead = true;
            script.block_mut(jmp_target).remove_predecessor(target);
            script.block_mut(jmp_target).add_predecessor(block);
            script.op_mut(op).change_sub_block(slot, jmp_target);
        }

        self.recursion_guard.remove(&op);
    }

    /// Link array fetches that alias a previously assigned fetch through a
    /// common textual prefix (`$a[x]` feeds `$a[x][y]`), in both discovery
    /// orders.
    fn link_array_aliases(&mut self, op: OpId, script: &mut Script) {
        match script.op(op).kind {
            OpKind::ArrayDimFetch { .. } => {
                let Some(repr) = script.dim_fetch_string(op) else {
                    return;
                };
                for (arr_op, arr_repr) in &self.arr_vars {
                    if *arr_op != op && repr.starts_with(arr_repr.as_str()) {
                        if let Some(result) = script.op(*arr_op).result() {
                            script.operand_mut(result).add_user(op);
                        }
                    }
                }
                self.unresolved_arrs.insert(op, repr);
            }
            OpKind::Assign { var, .. } => {
                let writers = script.operand(var).writers.clone();
                for writer in writers {
                    if !matches!(script.op(writer).kind, OpKind::ArrayDimFetch { .. }) {
                        continue;
                    }
                    let Some(left_repr) = script.dim_fetch_string(writer) else {
                        continue;
                    };
                    for (pending, pending_repr) in &self.unresolved_arrs {
                        if pending_repr.starts_with(left_repr.as_str()) {
                            if let Some(result) = script.op(writer).result() {
                                script.operand_mut(result).add_user(*pending);
                            }
                        }
                    }
                    self.arr_vars.insert(writer, left_repr);
                }
            }
            _ => {}
        }
    }

    fn remove_trivial_phis(&mut self, entry: BlockId, script: &mut Script) {
        let mut queue = vec![entry];
        let mut visited: FxHashSet<BlockId> = FxHashSet::default();
        while let Some(block) = queue.pop() {
            if !visited.insert(block) {
                continue;
            }
            for phi in script.block(block).phis.clone() {
                if self.try_remove_trivial_phi(phi, block, script) {
                    script.block_mut(block).remove_phi(phi);
                }
            }
            for op in script.block(block).ops.clone() {
                for (_, sub) in script.op(op).sub_blocks() {
                    if !visited.contains(&sub) {
                        queue.push(sub);
                    }
                }
            }
        }

        // replacing operands can strand more trivial φs; drain them
        while let Some((phi, block)) = self.triv_phi_candidates.shift_remove_index(0) {
            if self.try_remove_trivial_phi(phi, block, script) {
                script.block_mut(block).remove_phi(phi);
            }
        }
    }

    fn try_remove_trivial_phi(&mut self, phi: OpId, block: BlockId, script: &mut Script) -> bool {
        let Some(vars) = script.op(phi).phi_vars().cloned() else {
            return false;
        };
        if vars.len() > 1 {
            return false;
        }
        let Some(&only) = vars.first() else {
            return true;
        };
        if let Some(result) = script.op(phi).result() {
            self.replace_variables(result, only, block, script);
        }
        true
    }

    /// Replace `from` by `to` in every op and φ reachable from `block`.
    fn replace_variables(
        &mut self,
        from: OperandId,
        to: OperandId,
        block: BlockId,
        script: &mut Script,
    ) {
        let mut queue = vec![block];
        let mut visited: FxHashSet<BlockId> = FxHashSet::default();
        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                continue;
            }
            for phi in script.block(current).phis.clone() {
                if script.phi_has_operand(phi, from) {
                    // this φ may have just become trivial
                    self.triv_phi_candidates.insert(phi, current);
                    script.phi_remove_operand(phi, from);
                    script.phi_add_operand(phi, to);
                }
            }
            for op in script.block(current).ops.clone() {
                self.replace_op_variable(from, to, op, script);
                for (_, sub) in script.op(op).sub_blocks() {
                    if !visited.contains(&sub) {
                        queue.push(sub);
                    }
                }
                self.propagate_assign_value(op, script);
            }
        }
    }

    fn replace_op_variable(
        &mut self,
        from: OperandId,
        to: OperandId,
        op: OpId,
        script: &mut Script,
    ) {
        for (slot, var) in script.op(op).vars() {
            if var == from {
                script.op_mut(op).change_var(slot, to);
                script.operand_mut(from).remove_user(op);
                if script.op(op).is_write_var(slot) {
                    script.add_write_ref(op, to);
                } else {
                    script.add_read_ref(op, to);
                }
            }
        }
        for (slot, list) in script.op(op).list_vars() {
            if !list.contains(&from) {
                continue;
            }
            let new: Vec<OperandId> = list
                .iter()
                .map(|v| if *v == from { to } else { *v })
                .collect();
            script.operand_mut(from).remove_user(op);
            script.add_read_ref(op, to);
            script.op_mut(op).change_list_var(slot, new);
        }
    }

    /// When an assignment's RHS resolves to a literal (or a variable whose
    /// value is one), pin the result and the LHS variable's value to it.
    fn propagate_assign_value(&mut self, op: OpId, script: &mut Script) {
        let OpKind::Assign { var, expr, .. } = script.op(op).kind else {
            return;
        };
        let value = match script.operand(expr).kind {
            OperandKind::Bool { .. }
            | OperandKind::Number { .. }
            | OperandKind::Object { .. }
            | OperandKind::String { .. }
            | OperandKind::Symbolic { .. } => Some(expr),
            OperandKind::Variable { value, .. } => Some(value),
            OperandKind::Temporary {
                original: Some(orig),
            } => match script.operand(orig).kind {
                OperandKind::Variable { value, .. } => Some(value),
                _ => None,
            },
            _ => None,
        };
        let Some(value) = value else { return };
        script.op_mut(op).change_var("Result", value);
        script.add_write_ref(op, value);
        script.set_operand_value(var, value);
    }
}

impl Default for Simplifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockPass for Simplifier {
    fn enter_script(&mut self, script: &mut Script) {
        self.file_path = script.file_path.clone();
    }

    fn enter_func(&mut self, _func: FuncId, _script: &mut Script) {
        self.removed.clear();
        self.recursion_guard.clear();
        self.arr_vars.clear();
        self.unresolved_arrs.clear();
    }

    fn leave_func(&mut self, func: FuncId, script: &mut Script) {
        self.arr_vars.clear();
        self.unresolved_arrs.clear();
        self.triv_phi_candidates.clear();
        let entry = script.func(func).entry_block;
        self.remove_trivial_phis(entry, script);
    }

    fn enter_op(&mut self, op: OpId, block: BlockId, script: &mut Script) {
        self.splice_jumps(op, block, script);
        self.link_array_aliases(op, script);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cfg::infrastructure::build_cfg;
    use crate::features::cfg_traversal::infrastructure::traverser::CfgTraverser;

    fn simplified(src: &str) -> Script {
        let mut script = build_cfg(src.as_bytes(), "t.php").unwrap();
        let mut trav = CfgTraverser::new();
        trav.add_pass(Box::new(Simplifier::new()));
        trav.traverse(&mut script);
        script
    }

    fn phi_sizes(script: &Script) -> Vec<usize> {
        script
            .blocks
            .iter()
            .flat_map(|b| b.phis.iter())
            .filter_map(|phi| script.op(*phi).phi_vars().map(Vec::len))
            .collect()
    }

    #[test]
    fn no_trivial_phis_survive() {
        let script = simplified("<?php $a = 1; if ($c) { $b = 2; } echo $a; ?>");
        for size in phi_sizes(&script) {
            assert!(size >= 2, "trivial phi left behind (size {size})");
        }
    }

    #[test]
    fn ops_are_stamped_with_the_file_path() {
        let script = simplified("<?php echo $_GET['x']; ?>");
        let main = script.func(script.main);
        for op in &script.block(main.entry_block).ops {
            assert_eq!(script.op(*op).file_path.as_deref(), Some("t.php"));
        }
    }

    #[test]
    fn simplifying_twice_is_idempotent() {
        let src = "<?php $a = $_GET['q']; if ($a) { $b = $a; } else { $b = 'safe'; } echo $b; ?>";
        let mut once = build_cfg(src.as_bytes(), "t.php").unwrap();
        let mut trav = CfgTraverser::new();
        trav.add_pass(Box::new(Simplifier::new()));
        trav.traverse(&mut once);

        let snapshot: Vec<(usize, Vec<usize>)> = once
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (i, b.ops.iter().map(|o| o.0 as usize).collect()))
            .collect();
        let phi_snapshot = phi_sizes(&once);

        let mut trav = CfgTraverser::new();
        trav.add_pass(Box::new(Simplifier::new()));
        trav.traverse(&mut once);

        let again: Vec<(usize, Vec<usize>)> = once
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (i, b.ops.iter().map(|o| o.0 as usize).collect()))
            .collect();
        assert_eq!(snapshot, again, "second run changed the op layout");
        assert_eq!(phi_snapshot, phi_sizes(&once));
    }

    #[test]
    fn assign_value_propagates_literal_to_variable() {
        let script = simplified("<?php $a = 'lit'; $b = $a; echo $b; ?>");
        // after propagation the second assignment's result is the literal
        let found = script.ops.iter().any(|op| {
            matches!(&op.kind, OpKind::Assign { result, .. }
                if script.string_value(*result) == Some("lit"))
        });
        assert!(found);
    }
}
