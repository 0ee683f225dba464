//! Source finder.
//!
//! Runs after simplification and records, per function, every op whose
//! result carries untrusted input: assignments of tainted symbolics, fetches
//! out of superglobals, unfiltered `filter_input` calls, header readers,
//! and any op holding a tainted symbolic in one of its slots.

use crate::features::cfg::domain::{
    BlockId, FuncId, OpId, OpKind, OperandId, OperandKind, Script,
};
use crate::features::cfg_traversal::ports::BlockPass;
use crate::features::taint::rules::{
    HEADER_SOURCE_FUNCTIONS, SANITIZING_FILTERS, SUPERGLOBAL_VARS, TAINTED_SYMBOLIC_NAMES,
};

pub struct SourceFinder {
    curr_func: Option<FuncId>,
}

impl SourceFinder {
    pub fn new() -> Self {
        Self { curr_func: None }
    }
}

impl Default for SourceFinder {
    fn default() -> Self {
        Self::new()
    }
}

fn is_tainted_symbolic(script: &Script, oper: OperandId) -> bool {
    match &script.operand(oper).kind {
        OperandKind::Symbolic { name } => TAINTED_SYMBOLIC_NAMES.contains(name.as_str()),
        _ => false,
    }
}

/// Does the filter argument name a sanitizing filter constant?
fn filter_argument_sanitizes(script: &Script, arg: OperandId) -> Option<bool> {
    let writer = script.operand(arg).writer()?;
    let OpKind::ConstFetch { name, .. } = script.op(writer).kind else {
        return None;
    };
    let const_name = script.operand_name(name)?;
    Some(SANITIZING_FILTERS.contains(const_name.as_str()))
}

pub fn is_source(script: &Script, op: OpId) -> bool {
    match &script.op(op).kind {
        OpKind::Assign { expr, .. } => is_tainted_symbolic(script, *expr),
        OpKind::FunctionCall { name, args, .. } => {
            let Some(name) = script.operand_name(*name) else {
                return false;
            };
            match name.as_str() {
                // no filter argument means raw input
                "filter_input_array" => match args.get(1) {
                    None => true,
                    Some(filter) => match filter_argument_sanitizes(script, *filter) {
                        Some(sanitizes) => !sanitizes,
                        None => false,
                    },
                },
                "filter_input" => match args.get(2) {
                    None => true,
                    Some(filter) => match filter_argument_sanitizes(script, *filter) {
                        Some(sanitizes) => !sanitizes,
                        None => false,
                    },
                },
                _ if HEADER_SOURCE_FUNCTIONS.contains(name.as_str()) => true,
                _ => false,
            }
        }
        OpKind::IterReset { .. } => false,
        OpKind::ArrayDimFetch { var, .. } => {
            if is_tainted_symbolic(script, *var) {
                return true;
            }
            // the base may resolve to a superglobal by name
            script
                .operand_value(*var)
                .and_then(|v| script.string_value(v))
                .map(|name| SUPERGLOBAL_VARS.contains(name))
                .unwrap_or(false)
        }
        _ => script
            .op(op)
            .vars()
            .iter()
            .any(|(_, oper)| is_tainted_symbolic(script, *oper)),
    }
}

impl BlockPass for SourceFinder {
    fn enter_func(&mut self, func: FuncId, _script: &mut Script) {
        self.curr_func = Some(func);
    }

    fn leave_func(&mut self, _func: FuncId, _script: &mut Script) {
        self.curr_func = None;
    }

    fn enter_op(&mut self, op: OpId, _block: BlockId, script: &mut Script) {
        if let Some(func) = self.curr_func {
            if is_source(script, op) {
                script.func_mut(func).sources.push(op);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cfg::infrastructure::build_cfg;
    use crate::features::cfg_traversal::infrastructure::simplifier::Simplifier;
    use crate::features::cfg_traversal::infrastructure::traverser::CfgTraverser;

    fn sources_of(src: &str) -> (Script, Vec<OpId>) {
        let mut script = build_cfg(src.as_bytes(), "t.php").unwrap();
        let mut trav = CfgTraverser::new();
        trav.add_pass(Box::new(Simplifier::new()));
        trav.traverse(&mut script);
        let mut trav = CfgTraverser::new();
        trav.add_pass(Box::new(SourceFinder::new()));
        trav.traverse(&mut script);
        let sources = script.func(script.main).sources.clone();
        (script, sources)
    }

    #[test]
    fn superglobal_fetch_is_a_source() {
        let (script, sources) = sources_of("<?php echo $_GET['x']; ?>");
        assert_eq!(sources.len(), 1);
        assert!(matches!(
            script.op(sources[0]).kind,
            OpKind::ArrayDimFetch { .. }
        ));
    }

    #[test]
    fn every_superglobal_is_a_source() {
        for var in ["$_GET", "$_POST", "$_REQUEST", "$_FILES", "$_COOKIE", "$_SERVERS"] {
            let src = format!("<?php echo {var}['k']; ?>");
            let (_, sources) = sources_of(&src);
            assert!(!sources.is_empty(), "{var} should be a source");
        }
    }

    #[test]
    fn sanitizing_filter_input_is_not_a_source() {
        let (_, sources) = sources_of(
            "<?php $a = filter_input(INPUT_GET, 'x', FILTER_SANITIZE_NUMBER_INT); echo $a; ?>",
        );
        assert!(sources.is_empty());
    }

    #[test]
    fn unfiltered_filter_input_is_a_source() {
        let (_, sources) = sources_of("<?php $a = filter_input(INPUT_GET, 'x'); echo $a; ?>");
        assert!(!sources.is_empty());
    }

    #[test]
    fn header_readers_are_sources() {
        let (_, sources) = sources_of("<?php $h = getallheaders(); echo $h['X']; ?>");
        assert!(!sources.is_empty());
    }

    #[test]
    fn classification_is_pure() {
        let (script, sources) = sources_of("<?php echo $_POST['y']; ?>");
        for s in &sources {
            assert_eq!(is_source(&script, *s), is_source(&script, *s));
        }
    }
}
