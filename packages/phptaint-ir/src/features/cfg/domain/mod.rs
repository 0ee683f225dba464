mod assertion;
mod block;
mod func;
mod op;
mod operand;
mod script;
mod types;

pub use assertion::{Assertion, AssertionMode, CompositeAssert, TypeAssert};
pub use block::{Block, BlockId};
pub use func::{ClassFlags, Func, FuncFlags, FuncId};
pub use op::{
    BinaryOpKind, CastOpKind, IncludeOpKind, Op, OpId, OpKind, SubBlockSlot, UnaryOpKind,
};
pub use operand::{Operand, OperandId, OperandKind, VarAssert, VarScope};
pub use script::Script;
pub use types::{is_builtin_type, TypeInfo};
