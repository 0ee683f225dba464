//! phptaint-ir — static taint analysis core for PHP sources.
//!
//! The crate turns a directory of PHP files into an XSS vulnerability
//! report. Per file, the pipeline is:
//!
//! 1. parse the source with tree-sitter into a crate-owned AST
//!    ([`features::parsing`]),
//! 2. normalize the AST — resolve namespaces, rewrite `break`/`continue`
//!    into labeled gotos, fold magic constants
//!    ([`features::ast_rewriting`]),
//! 3. lower the AST into a control-flow graph in SSA form, built on the fly
//!    with Braun-style incomplete φ nodes ([`features::cfg`]),
//! 4. simplify the CFG and mark taint sources
//!    ([`features::cfg_traversal`]),
//! 5. walk the def-use web from sources to sinks, honoring sanitizers
//!    ([`features::taint`]),
//! 6. assemble the JSON report with verbatim source excerpts
//!    ([`features::reporting`]).
//!
//! Scripts own their operand/op/block/function arenas; all cross references
//! are stable indices, so the simplifier can rewrite the use/def web without
//! chasing pointers.

pub mod features;
pub mod shared;

pub use features::cfg::domain::{
    Block, BlockId, Func, FuncId, Op, OpId, OpKind, Operand, OperandId, OperandKind, Script,
};
pub use features::cfg::infrastructure::build_cfg;
pub use features::reporting::application::{find_php_files, scan};
pub use features::reporting::domain::ScanReport;
pub use shared::models::{IrError, Span};
