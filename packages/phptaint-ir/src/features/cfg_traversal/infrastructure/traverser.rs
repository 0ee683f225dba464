//! Depth-first CFG traverser.
//!
//! Walks main plus every named function, visiting each block once per
//! function (seen-set) and descending into op sub-blocks. Sub-block slots
//! are re-read after `enter_op`, so a pass that retargets them (the
//! simplifier) steers the walk.

use rustc_hash::FxHashSet;

use crate::features::cfg::domain::{BlockId, OpKind, Script};
use crate::features::cfg_traversal::ports::BlockPass;

pub struct CfgTraverser {
    passes: Vec<Box<dyn BlockPass>>,
    seen: FxHashSet<BlockId>,
}

impl CfgTraverser {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            seen: FxHashSet::default(),
        }
    }

    pub fn add_pass(&mut self, pass: Box<dyn BlockPass>) {
        self.passes.push(pass);
    }

    pub fn traverse(&mut self, script: &mut Script) {
        for pass in &mut self.passes {
            pass.enter_script(script);
        }
        for func in script.all_funcs() {
            self.seen.clear();
            for pass in &mut self.passes {
                pass.enter_func(func, script);
            }
            let entry = script.func(func).entry_block;
            self.traverse_block(entry, None, script);
            for pass in &mut self.passes {
                pass.leave_func(func, script);
            }
        }
        for pass in &mut self.passes {
            pass.leave_script(script);
        }
    }

    fn traverse_block(&mut self, block: BlockId, prior: Option<BlockId>, script: &mut Script) {
        if self.seen.contains(&block) {
            for pass in &mut self.passes {
                pass.skip_block(block, prior, script);
            }
            return;
        }
        self.seen.insert(block);
        for pass in &mut self.passes {
            pass.enter_block(block, prior, script);
        }

        let ops = script.block(block).ops.clone();
        for op in ops {
            for pass in &mut self.passes {
                pass.enter_op(op, block, script);
            }
            // slots may have been retargeted by the pass just now
            match script.op(op).kind {
                OpKind::JumpIf {
                    if_block,
                    else_block,
                    ..
                } => {
                    self.traverse_block(if_block, Some(block), script);
                    self.traverse_block(else_block, Some(block), script);
                }
                _ => {
                    for (_, sub) in script.op(op).sub_blocks() {
                        self.traverse_block(sub, Some(block), script);
                    }
                }
            }
            for pass in &mut self.passes {
                pass.leave_op(op, block, script);
            }
        }

        for pass in &mut self.passes {
            pass.leave_block(block, prior, script);
        }
    }
}

impl Default for CfgTraverser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cfg::domain::{FuncId, OpId};
    use crate::features::cfg::infrastructure::build_cfg;

    #[derive(Default)]
    struct Recorder {
        entered_blocks: Vec<BlockId>,
        entered_ops: Vec<OpId>,
        funcs: Vec<FuncId>,
    }

    struct RecordingPass(std::rc::Rc<std::cell::RefCell<Recorder>>);

    impl BlockPass for RecordingPass {
        fn enter_func(&mut self, func: FuncId, _script: &mut Script) {
            self.0.borrow_mut().funcs.push(func);
        }
        fn enter_block(&mut self, block: BlockId, _prior: Option<BlockId>, _script: &mut Script) {
            self.0.borrow_mut().entered_blocks.push(block);
        }
        fn enter_op(&mut self, op: OpId, _block: BlockId, _script: &mut Script) {
            self.0.borrow_mut().entered_ops.push(op);
        }
    }

    #[test]
    fn visits_each_block_once_even_with_loops() {
        let mut script = build_cfg(
            b"<?php while ($x) { $y = $y + 1; } function f() { return 1; } ?>",
            "t.php",
        )
        .unwrap();
        let recorder = std::rc::Rc::new(std::cell::RefCell::new(Recorder::default()));
        let mut trav = CfgTraverser::new();
        trav.add_pass(Box::new(RecordingPass(recorder.clone())));
        trav.traverse(&mut script);

        let rec = recorder.borrow();
        let mut sorted = rec.entered_blocks.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), rec.entered_blocks.len(), "no block re-entered");
        assert_eq!(rec.funcs.len(), 2, "main and f are both traversed");
        assert!(!rec.entered_ops.is_empty());
    }
}
