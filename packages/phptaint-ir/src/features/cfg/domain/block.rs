//! Basic blocks.

use super::op::OpId;
use super::operand::OperandId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone)]
pub struct Block {
    /// Ordered instructions.
    pub ops: Vec<OpId>,
    /// φ set; ordered for deterministic traversal.
    pub phis: Vec<OpId>,
    pub preds: Vec<BlockId>,
    /// Dead blocks host unreachable code (after return/throw/exit) and
    /// blocks the simplifier spliced out.
    pub dead: bool,
    pub has_tainted: bool,
    /// Head of a two-way branch.
    pub is_conditional: bool,
    /// Path conditions under which the block is entered.
    pub conditions: Vec<OperandId>,
}

impl Block {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            phis: Vec::new(),
            preds: Vec::new(),
            dead: false,
            has_tainted: false,
            is_conditional: false,
            conditions: Vec::new(),
        }
    }

    pub fn add_op(&mut self, op: OpId) {
        self.ops.push(op);
    }

    pub fn add_predecessor(&mut self, block: BlockId) {
        if !self.preds.contains(&block) {
            self.preds.push(block);
        }
    }

    pub fn remove_predecessor(&mut self, block: BlockId) {
        self.preds.retain(|p| *p != block);
    }

    pub fn add_phi(&mut self, phi: OpId) {
        if !self.phis.contains(&phi) {
            self.phis.push(phi);
        }
    }

    pub fn remove_phi(&mut self, phi: OpId) {
        self.phis.retain(|p| *p != phi);
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}
