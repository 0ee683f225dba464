pub mod ast;

pub use ast::{
    AssignOp, BinaryOp, CastKind, IncludeKind, NameForm, Node, NodeKind, UnaryOp,
};
