//! Function objects.

use bitflags::bitflags;

use super::block::BlockId;
use super::op::OpId;
use super::types::TypeInfo;
use crate::shared::models::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FuncFlags: u16 {
        const PUBLIC      = 1;
        const PROTECTED   = 1 << 1;
        const PRIVATE     = 1 << 2;
        const STATIC      = 1 << 3;
        const ABSTRACT    = 1 << 4;
        const FINAL       = 1 << 5;
        const RETURNS_REF = 1 << 6;
        const CLOSURE     = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClassFlags: u16 {
        const PUBLIC    = 1;
        const PROTECTED = 1 << 1;
        const PRIVATE   = 1 << 2;
        const STATIC    = 1 << 3;
        const ABSTRACT  = 1 << 4;
        const FINAL     = 1 << 5;
        const READONLY  = 1 << 6;
    }
}

#[derive(Debug, Clone)]
pub struct Func {
    pub name: String,
    pub flags: FuncFlags,
    pub return_type: TypeInfo,
    /// Owning class name for methods.
    pub class_name: Option<String>,
    /// Parameter ops, in declaration order.
    pub params: Vec<OpId>,
    pub entry_block: BlockId,
    /// The op that declared this function (stmt-func, method, closure).
    pub callable_op: Option<OpId>,
    pub span: Option<Span>,
    /// Set when the body reads a tainted superglobal.
    pub has_taint: bool,
    /// Ops classified as taint sources by the source finder.
    pub sources: Vec<OpId>,
    /// Call ops made from this function's body.
    pub calls: Vec<OpId>,
}

impl Func {
    pub fn new(
        name: impl Into<String>,
        flags: FuncFlags,
        return_type: TypeInfo,
        entry_block: BlockId,
        span: Option<Span>,
    ) -> Self {
        Self {
            name: name.into(),
            flags,
            return_type,
            class_name: None,
            params: Vec::new(),
            entry_block,
            callable_op: None,
            span,
            has_taint: false,
            sources: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn new_method(
        name: impl Into<String>,
        flags: FuncFlags,
        return_type: TypeInfo,
        entry_block: BlockId,
        class_name: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        let mut f = Self::new(name, flags, return_type, entry_block, span);
        f.class_name = Some(class_name.into());
        f
    }

    /// `Class::method` for methods, the plain name otherwise.
    pub fn scoped_name(&self) -> String {
        match &self.class_name {
            Some(class) => format!("{}::{}", class, self.name),
            None => self.name.clone(),
        }
    }

    pub fn is_closure(&self) -> bool {
        self.flags.contains(FuncFlags::CLOSURE)
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(FuncFlags::STATIC)
    }

    pub fn visibility(&self) -> FuncFlags {
        self.flags & (FuncFlags::PUBLIC | FuncFlags::PROTECTED | FuncFlags::PRIVATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_name_includes_class() {
        let f = Func::new_method(
            "render",
            FuncFlags::PUBLIC,
            TypeInfo::Mixed,
            BlockId(0),
            "View",
            None,
        );
        assert_eq!(f.scoped_name(), "View::render");
    }

    #[test]
    fn visibility_masks_other_flags() {
        let f = Func::new(
            "f",
            FuncFlags::PRIVATE | FuncFlags::STATIC | FuncFlags::FINAL,
            TypeInfo::Void,
            BlockId(0),
            None,
        );
        assert_eq!(f.visibility(), FuncFlags::PRIVATE);
        assert!(f.is_static());
    }
}
