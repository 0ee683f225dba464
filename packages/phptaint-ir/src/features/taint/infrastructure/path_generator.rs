//! Source-to-sink path generation.
//!
//! Depth-first walk over the def-use web: start at each recorded source op,
//! follow the users of its tainted carrier, stop at sanitizers, emit a path
//! at every sink. The visited set is keyed on `(op, carrier)` so a cyclic
//! web terminates: an op is revisited only when the taint arrives through a
//! different operand.
//!
//! An emitted path holds the source op first, then each carrier user from
//! the second hop on, and the sink op exactly once at the end.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::features::cfg::domain::{
    BinaryOpKind, CastOpKind, FuncId, OpId, OpKind, OperandId, Script,
};
use crate::features::cfg::domain::Assertion;
use crate::features::taint::rules::{
    SANITIZER_FUNCTIONS, SANITIZING_ENT_FLAGS, SANITIZING_FILTERS, SANITIZING_TYPE_ASSERTS,
};

pub struct PathGenerator<'s> {
    script: &'s Script,
    paths: Vec<Vec<OpId>>,
    curr_path: Vec<OpId>,
    visited: FxHashMap<OpId, FxHashSet<OperandId>>,
}

/// All source→sink paths of one script.
pub fn generate_paths(script: &Script) -> Vec<Vec<OpId>> {
    let mut generator = PathGenerator {
        script,
        paths: Vec::new(),
        curr_path: Vec::new(),
        visited: FxHashMap::default(),
    };
    for func in script.all_funcs() {
        generator.traverse_func(func);
    }
    generator.paths
}

impl<'s> PathGenerator<'s> {
    fn traverse_func(&mut self, func: FuncId) {
        for source in self.script.func(func).sources.clone() {
            let Some(carrier) = tainted_var(self.script, source) else {
                continue;
            };
            self.curr_path = vec![source];
            for user in self.script.operand(carrier).users.clone() {
                self.trace(user, carrier);
            }
        }
    }

    fn trace(&mut self, user: OpId, tainted: OperandId) {
        if is_sink(self.script, user, tainted) {
            let mut path = self.curr_path.clone();
            if path.last() != Some(&user) {
                path.push(user);
            }
            self.paths.push(path);
            return;
        }
        if !is_propagated(self.script, user, tainted) {
            return;
        }
        if self
            .visited
            .get(&user)
            .map(|set| set.contains(&tainted))
            .unwrap_or(false)
        {
            return;
        }
        self.visited.entry(user).or_default().insert(tainted);

        let Some(carrier) = tainted_var(self.script, user) else {
            return;
        };
        for next in self.script.operand(carrier).users.clone() {
            self.curr_path.push(next);
            self.trace(next, carrier);
            self.curr_path.pop();
        }
    }
}

/// The operand an op hands taint onward through: the destination of an
/// assignment, otherwise the result.
pub fn tainted_var(script: &Script, op: OpId) -> Option<OperandId> {
    match &script.op(op).kind {
        OpKind::Assign { var, .. } => Some(*var),
        _ => script.op(op).result(),
    }
}

fn call_name(script: &Script, op: OpId) -> Option<String> {
    match &script.op(op).kind {
        OpKind::FunctionCall { name, .. } => script.operand_name(*name),
        _ => None,
    }
}

/// Does the second argument of an html escaper / filter call resolve to a
/// constant in `set`?
fn const_arg_in(
    script: &Script,
    args: &[OperandId],
    index: usize,
    set: &FxHashSet<&'static str>,
) -> bool {
    let Some(arg) = args.get(index) else {
        return false;
    };
    let Some(writer) = script.operand(*arg).writer() else {
        return false;
    };
    let OpKind::ConstFetch { name, .. } = script.op(writer).kind else {
        return false;
    };
    script
        .operand_name(name)
        .map(|n| set.contains(n.as_str()))
        .unwrap_or(false)
}

/// Whether taint flows through `op`. Sanitizers return false.
pub fn is_propagated(script: &Script, op: OpId, tainted: OperandId) -> bool {
    match &script.op(op).kind {
        OpKind::Cast { kind, .. } => !matches!(
            kind,
            CastOpKind::Bool | CastOpKind::Double | CastOpKind::Int | CastOpKind::Unset
        ),
        OpKind::Unset { .. } => false,
        OpKind::Assertion { assertion, .. } => {
            if let Assertion::Type(t) = assertion {
                if let Some(name) = script.string_value(t.operand) {
                    if SANITIZING_TYPE_ASSERTS.contains(name) {
                        return false;
                    }
                }
            }
            true
        }
        OpKind::ArrayDimFetch { dim, .. } => {
            // indexing *by* a tainted value does not taint the element
            *dim != tainted
        }
        OpKind::FunctionCall { args, .. } => {
            let Some(name) = call_name(script, op) else {
                return true;
            };
            if SANITIZER_FUNCTIONS.contains(name.as_str()) {
                return false;
            }
            match name.as_str() {
                "filter_var" => !const_arg_in(script, args, 1, &SANITIZING_FILTERS),
                "htmlentities" | "htmlspecialchars" => {
                    if args.len() < 2 {
                        // default flags escape quotes
                        return false;
                    }
                    !const_arg_in(script, args, 1, &SANITIZING_ENT_FLAGS)
                }
                _ => true,
            }
        }
        _ => true,
    }
}

/// Dangerous outputs: echo/print always, printf with a `%s` format literal,
/// header when the argument is tainted or a `Location`-prefixed concat.
pub fn is_sink(script: &Script, op: OpId, tainted: OperandId) -> bool {
    match &script.op(op).kind {
        OpKind::Echo { .. } | OpKind::Print { .. } => true,
        OpKind::FunctionCall { args, .. } => {
            let Some(name) = call_name(script, op) else {
                return false;
            };
            match name.as_str() {
                "printf" => args
                    .first()
                    .and_then(|a| script.string_value(*a))
                    .map(|fmt| fmt.contains("%s"))
                    .unwrap_or(false),
                "header" => {
                    let Some(&arg) = args.first() else {
                        return false;
                    };
                    if arg == tainted || script.operand(arg).tainted {
                        return true;
                    }
                    // `header("Location: " . $x)` — literal left operand
                    let Some(writer) = script.operand(arg).writer() else {
                        return false;
                    };
                    if let OpKind::Binary {
                        op: BinaryOpKind::Concat,
                        left,
                        ..
                    } = script.op(writer).kind
                    {
                        return script
                            .string_value(left)
                            .map(|s| s.contains("Location"))
                            .unwrap_or(false);
                    }
                    false
                }
                _ => false,
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cfg::infrastructure::build_cfg;
    use crate::features::cfg_traversal::infrastructure::{
        CfgTraverser, Simplifier, SourceFinder,
    };

    fn paths_of(src: &str) -> (Script, Vec<Vec<OpId>>) {
        let mut script = build_cfg(src.as_bytes(), "t.php").unwrap();
        let mut trav = CfgTraverser::new();
        trav.add_pass(Box::new(Simplifier::new()));
        trav.traverse(&mut script);
        let mut trav = CfgTraverser::new();
        trav.add_pass(Box::new(SourceFinder::new()));
        trav.traverse(&mut script);
        let paths = generate_paths(&script);
        (script, paths)
    }

    #[test]
    fn direct_echo_yields_one_path() {
        let (script, paths) = paths_of("<?php echo $_GET['x']; ?>");
        assert_eq!(paths.len(), 1);
        let path = &paths[0];
        assert!(matches!(
            script.op(path[0]).kind,
            OpKind::ArrayDimFetch { .. }
        ));
        assert!(matches!(
            script.op(*path.last().unwrap()).kind,
            OpKind::Echo { .. }
        ));
    }

    #[test]
    fn sanitizer_call_stops_propagation() {
        let (_, paths) = paths_of("<?php $a = intval($_GET['x']); echo $a; ?>");
        assert!(paths.is_empty());
    }

    #[test]
    fn html_escaping_with_quote_flags_stops_propagation() {
        let (_, paths) =
            paths_of("<?php $a = $_GET['x']; $b = htmlspecialchars($a, ENT_QUOTES); echo $b; ?>");
        assert!(paths.is_empty());
    }

    #[test]
    fn assignment_chain_is_recorded_between_source_and_sink() {
        let (script, paths) = paths_of("<?php $a = $_POST['y']; $b = $a; echo $b; ?>");
        assert_eq!(paths.len(), 1);
        let path = &paths[0];
        assert!(matches!(
            script.op(path[0]).kind,
            OpKind::ArrayDimFetch { .. }
        ));
        let assigns = path
            .iter()
            .filter(|op| matches!(script.op(**op).kind, OpKind::Assign { .. }))
            .count();
        assert_eq!(assigns, 1, "only the $b = $a hop appears in the path");
        assert!(matches!(
            script.op(*path.last().unwrap()).kind,
            OpKind::Echo { .. }
        ));
    }

    #[test]
    fn location_header_concat_is_a_sink() {
        let (script, paths) = paths_of("<?php header(\"Location: \" . $_GET['u']); ?>");
        assert_eq!(paths.len(), 1);
        let sink = *paths[0].last().unwrap();
        assert!(matches!(script.op(sink).kind, OpKind::FunctionCall { .. }));
    }

    #[test]
    fn taint_through_loops_terminates() {
        let (_, paths) = paths_of(
            "<?php $a = $_GET['x']; while ($c) { $a = $a . 'x'; } echo $a; ?>",
        );
        assert!(!paths.is_empty(), "loop-carried taint still reaches the sink");
    }

    #[test]
    fn dim_taint_does_not_taint_the_element() {
        let (_, paths) = paths_of("<?php $k = $_GET['x']; $v = $safe[$k]; echo $v; ?>");
        assert!(paths.is_empty());
    }
}
