//! Pass interface over the CFG.

use crate::features::cfg::domain::{BlockId, FuncId, OpId, Script};

/// Hooks invoked by the depth-first CFG traverser. Passes receive the whole
/// script mutably and may rewrite blocks and ops as they go.
pub trait BlockPass {
    fn enter_script(&mut self, script: &mut Script) {
        let _ = script;
    }
    fn leave_script(&mut self, script: &mut Script) {
        let _ = script;
    }
    fn enter_func(&mut self, func: FuncId, script: &mut Script) {
        let _ = (func, script);
    }
    fn leave_func(&mut self, func: FuncId, script: &mut Script) {
        let _ = (func, script);
    }
    fn enter_block(&mut self, block: BlockId, prior: Option<BlockId>, script: &mut Script) {
        let _ = (block, prior, script);
    }
    fn leave_block(&mut self, block: BlockId, prior: Option<BlockId>, script: &mut Script) {
        let _ = (block, prior, script);
    }
    /// Called instead of `enter_block` when the block was already visited.
    fn skip_block(&mut self, block: BlockId, prior: Option<BlockId>, script: &mut Script) {
        let _ = (block, prior, script);
    }
    fn enter_op(&mut self, op: OpId, block: BlockId, script: &mut Script) {
        let _ = (op, block, script);
    }
    fn leave_op(&mut self, op: OpId, block: BlockId, script: &mut Script) {
        let _ = (op, block, script);
    }
}
