//! Unified error type for the analysis pipeline.
//!
//! Invariant violations during AST rewriting or CFG construction are fatal:
//! they bubble up to the scanner, which aborts the run with a diagnostic
//! naming the offending construct. Tolerated conditions (unknown variable
//! reads, unresolved gotos, parser diagnostics) never become an `IrError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IrError {
    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("invalid node replacement: {old} replaced by {new}")]
    InvalidReplacement { old: &'static str, new: &'static str },

    #[error("node insertion outside a statement list: {node}")]
    InvalidInsertion { node: &'static str },

    #[error("'{construct}' operator accepts only positive integers")]
    BadLoopLevel { construct: &'static str },

    #[error("cannot '{construct}' {level} levels")]
    LoopLevelTooDeep { construct: &'static str, level: u32 },

    #[error("malformed {construct} node: {message}")]
    MalformedNode {
        construct: &'static str,
        message: String,
    },

    #[error("CFG construction failed in {file}: {message}")]
    Cfg { file: String, message: String },

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
