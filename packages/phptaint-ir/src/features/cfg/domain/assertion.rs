//! Branch-induced type assertions.
//!
//! Negation is lazy: it flips a flag instead of rewriting children, so
//! composites distribute it through their mode only when queried and double
//! negation is an identity.

use super::operand::OperandId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionMode {
    None,
    Union,
    Intersection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAssert {
    pub operand: OperandId,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeAssert {
    pub list: Vec<Assertion>,
    pub mode: AssertionMode,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assertion {
    Type(TypeAssert),
    Composite(CompositeAssert),
}

impl Assertion {
    pub fn type_assert(operand: OperandId, negated: bool) -> Self {
        Assertion::Type(TypeAssert { operand, negated })
    }

    pub fn composite(list: Vec<Assertion>, mode: AssertionMode, negated: bool) -> Self {
        Assertion::Composite(CompositeAssert {
            list,
            mode,
            negated,
        })
    }

    pub fn negation(&self) -> Assertion {
        match self {
            Assertion::Type(t) => Assertion::Type(TypeAssert {
                operand: t.operand,
                negated: !t.negated,
            }),
            Assertion::Composite(c) => Assertion::Composite(CompositeAssert {
                list: c.list.clone(),
                mode: c.mode,
                negated: !c.negated,
            }),
        }
    }

    pub fn negated(&self) -> bool {
        match self {
            Assertion::Type(t) => t.negated,
            Assertion::Composite(c) => c.negated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_negation_is_identity() {
        let a = Assertion::composite(
            vec![Assertion::type_assert(OperandId(0), false)],
            AssertionMode::Intersection,
            false,
        );
        assert_eq!(a.negation().negation(), a);
    }

    #[test]
    fn negation_does_not_rewrite_children() {
        let leaf = Assertion::type_assert(OperandId(1), false);
        let comp = Assertion::composite(vec![leaf.clone()], AssertionMode::Union, false);
        let neg = comp.negation();
        let Assertion::Composite(c) = &neg else {
            unreachable!()
        };
        assert!(c.negated);
        assert_eq!(c.list[0], leaf, "children stay untouched");
    }
}
