//! Instructions.
//!
//! Each op is a shared header (span, owning file, owning block) plus a
//! kind-specific payload. Passes access operand slots uniformly: [`Op::vars`]
//! yields the named single slots, [`Op::list_vars`] the named list slots,
//! and [`Op::change_var`] / [`Op::change_list_var`] rewrite them. Slot roles
//! are encoded by [`OpKind::is_write_var`]: `Result` everywhere, plus `Var`
//! on plain/by-ref assignment and static-var declarations.

use super::assertion::Assertion;
use super::block::BlockId;
use super::func::{ClassFlags, FuncFlags, FuncId};
use super::operand::OperandId;
use super::types::TypeInfo;
use crate::shared::models::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOpKind {
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    Coalesce,
    Concat,
    Div,
    Equal,
    Greater,
    GreaterOrEqual,
    Identical,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    Minus,
    Mod,
    Mul,
    NotEqual,
    NotIdentical,
    Plus,
    Pow,
    ShiftLeft,
    ShiftRight,
    Smaller,
    SmallerOrEqual,
    Spaceship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpKind {
    Plus,
    Minus,
    BitwiseNot,
    BooleanNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOpKind {
    Array,
    Bool,
    Double,
    Int,
    Object,
    String,
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeOpKind {
    Include,
    IncludeOnce,
    Require,
    RequireOnce,
}

/// Sub-block slot identifiers, for the CFG traverser and the simplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubBlockSlot {
    DefaultBlock,
    Stmts,
    Target,
    If,
    Else,
    ValueBlock,
    SwitchTarget(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    // ── expression ops ────────────────────────────────────────────────
    Param {
        name: OperandId,
        by_ref: bool,
        variadic: bool,
        default_var: Option<OperandId>,
        default_block: Option<BlockId>,
        declared_type: TypeInfo,
        result: OperandId,
    },
    ConcatList {
        list: Vec<OperandId>,
        result: OperandId,
    },
    Assign {
        var: OperandId,
        expr: OperandId,
        result: OperandId,
    },
    AssignRef {
        var: OperandId,
        expr: OperandId,
        result: OperandId,
    },
    ArrayDimFetch {
        var: OperandId,
        dim: OperandId,
        result: OperandId,
    },
    Binary {
        op: BinaryOpKind,
        left: OperandId,
        right: OperandId,
        result: OperandId,
    },
    Unary {
        op: UnaryOpKind,
        expr: OperandId,
        result: OperandId,
    },
    Cast {
        kind: CastOpKind,
        expr: OperandId,
        result: OperandId,
    },
    ArrayLit {
        keys: Vec<OperandId>,
        values: Vec<OperandId>,
        by_ref: Vec<bool>,
        result: OperandId,
    },
    Closure {
        func: FuncId,
        use_vars: Vec<OperandId>,
        result: OperandId,
    },
    ClassConstFetch {
        class: OperandId,
        name: OperandId,
        result: OperandId,
    },
    Clone {
        expr: OperandId,
        result: OperandId,
    },
    ConstFetch {
        name: OperandId,
        result: OperandId,
    },
    Empty {
        expr: OperandId,
        result: OperandId,
    },
    Eval {
        expr: OperandId,
        result: OperandId,
    },
    FunctionCall {
        name: OperandId,
        args: Vec<OperandId>,
        result: OperandId,
    },
    Include {
        kind: IncludeOpKind,
        expr: OperandId,
        result: OperandId,
    },
    InstanceOf {
        expr: OperandId,
        class: OperandId,
        result: OperandId,
    },
    Isset {
        vars: Vec<OperandId>,
        result: OperandId,
    },
    MethodCall {
        var: OperandId,
        name: OperandId,
        args: Vec<OperandId>,
        nullsafe: bool,
        result: OperandId,
    },
    New {
        class: OperandId,
        args: Vec<OperandId>,
        result: OperandId,
    },
    Yield {
        value: Option<OperandId>,
        key: Option<OperandId>,
        result: OperandId,
    },
    Assertion {
        expr: OperandId,
        assertion: Assertion,
        result: OperandId,
    },
    Print {
        expr: OperandId,
        result: OperandId,
    },
    StaticCall {
        class: OperandId,
        name: OperandId,
        args: Vec<OperandId>,
        result: OperandId,
    },
    StaticPropertyFetch {
        class: OperandId,
        prop: OperandId,
        result: OperandId,
    },
    PropertyFetch {
        var: OperandId,
        prop: OperandId,
        nullsafe: bool,
        result: OperandId,
    },
    IterReset {
        var: OperandId,
        result: OperandId,
    },
    IterValid {
        var: OperandId,
        result: OperandId,
    },
    IterKey {
        var: OperandId,
        result: OperandId,
    },
    IterValue {
        var: OperandId,
        by_ref: bool,
        result: OperandId,
    },
    Phi {
        vars: Vec<OperandId>,
        result: OperandId,
        block: BlockId,
    },

    // ── statement ops ─────────────────────────────────────────────────
    Echo {
        expr: OperandId,
    },
    Exit {
        expr: Option<OperandId>,
    },
    Return {
        expr: Option<OperandId>,
    },
    Throw {
        expr: OperandId,
    },
    Unset {
        exprs: Vec<OperandId>,
    },
    GlobalVar {
        var: OperandId,
    },
    StaticVar {
        var: OperandId,
        default_var: Option<OperandId>,
        default_block: Option<BlockId>,
    },
    ConstDecl {
        name: OperandId,
        value: OperandId,
        value_block: Option<BlockId>,
    },
    StmtClass {
        name: OperandId,
        stmts: BlockId,
        flags: ClassFlags,
        extends: Option<OperandId>,
        implements: Vec<OperandId>,
    },
    StmtClassMethod {
        func: FuncId,
        visibility: FuncFlags,
        is_static: bool,
        is_final: bool,
        is_abstract: bool,
    },
    StmtFunc {
        func: FuncId,
    },
    StmtInterface {
        name: OperandId,
        stmts: BlockId,
        extends: Vec<OperandId>,
    },
    StmtTrait {
        name: OperandId,
        stmts: BlockId,
    },
    StmtTraitUse {
        traits: Vec<OperandId>,
        adaptations: Vec<OpId>,
    },
    Alias {
        trait_name: Option<OperandId>,
        method: OperandId,
        new_name: Option<OperandId>,
        new_modifier: ClassFlags,
    },
    Precedence {
        trait_name: Option<OperandId>,
        method: OperandId,
        insteadof: Vec<OperandId>,
    },
    StmtProperty {
        name: OperandId,
        visibility: ClassFlags,
        is_static: bool,
        is_readonly: bool,
        default_var: Option<OperandId>,
        default_block: Option<BlockId>,
        declared_type: TypeInfo,
    },
    Jump {
        target: BlockId,
    },
    JumpIf {
        cond: OperandId,
        if_block: BlockId,
        else_block: BlockId,
    },
    Switch {
        cond: OperandId,
        cases: Vec<OperandId>,
        targets: Vec<BlockId>,
        default_block: BlockId,
    },
}

#[derive(Debug, Clone)]
pub struct Op {
    pub kind: OpKind,
    pub span: Option<Span>,
    pub file_path: Option<String>,
    pub block: Option<BlockId>,
}

impl Op {
    pub fn new(kind: OpKind, span: Option<Span>) -> Self {
        Self {
            kind,
            span,
            file_path: None,
            block: None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        use OpKind::*;
        match &self.kind {
            Param { .. } => "ExprParam",
            ConcatList { .. } => "ExprConcatList",
            Assign { .. } => "ExprAssign",
            AssignRef { .. } => "ExprAssignRef",
            ArrayDimFetch { .. } => "ExprArrayDimFetch",
            Binary { .. } => "ExprBinary",
            Unary { .. } => "ExprUnary",
            Cast { .. } => "ExprCast",
            ArrayLit { .. } => "ExprArray",
            Closure { .. } => "ExprClosure",
            ClassConstFetch { .. } => "ExprClassConstFetch",
            Clone { .. } => "ExprClone",
            ConstFetch { .. } => "ExprConstFetch",
            Empty { .. } => "ExprEmpty",
            Eval { .. } => "ExprEval",
            FunctionCall { .. } => "ExprFunctionCall",
            Include { .. } => "ExprInclude",
            InstanceOf { .. } => "ExprInstanceOf",
            Isset { .. } => "ExprIsset",
            MethodCall { .. } => "ExprMethodCall",
            New { .. } => "ExprNew",
            Yield { .. } => "ExprYield",
            Assertion { .. } => "ExprAssertion",
            Print { .. } => "ExprPrint",
            StaticCall { .. } => "ExprStaticCall",
            StaticPropertyFetch { .. } => "ExprStaticPropertyFetch",
            PropertyFetch { .. } => "ExprPropertyFetch",
            IterReset { .. } => "Reset",
            IterValid { .. } => "ExprValid",
            IterKey { .. } => "ExprKey",
            IterValue { .. } => "ExprValue",
            Phi { .. } => "Phi",
            Echo { .. } => "Echo",
            Exit { .. } => "Exit",
            Return { .. } => "Return",
            Throw { .. } => "Throw",
            Unset { .. } => "Unset",
            GlobalVar { .. } => "GlobalVar",
            StaticVar { .. } => "StaticVar",
            ConstDecl { .. } => "Const",
            StmtClass { .. } => "StmtClass",
            StmtClassMethod { .. } => "StmtClassMethod",
            StmtFunc { .. } => "StmtFunc",
            StmtInterface { .. } => "StmtInterface",
            StmtTrait { .. } => "StmtTrait",
            StmtTraitUse { .. } => "StmtTraitUse",
            Alias { .. } => "Alias",
            Precedence { .. } => "Precedence",
            StmtProperty { .. } => "StmtProperty",
            Jump { .. } => "StmtJump",
            JumpIf { .. } => "StmtJumpIf",
            Switch { .. } => "StmtSwitch",
        }
    }

    /// Named single-operand slots. φ operands are list-like and live in
    /// [`Op::list_vars`]-free storage; only their result is exposed here,
    /// matching how passes treat φ nodes specially.
    pub fn vars(&self) -> Vec<(&'static str, OperandId)> {
        use OpKind::*;
        let mut out: Vec<(&'static str, OperandId)> = Vec::new();
        let mut push = |name: &'static str, id: OperandId| out.push((name, id));
        match &self.kind {
            Param {
                name,
                default_var,
                result,
                ..
            } => {
                push("Name", *name);
                if let Some(d) = default_var {
                    push("DefaultVar", *d);
                }
                push("Result", *result);
            }
            ConcatList { result, .. } => push("Result", *result),
            Assign { var, expr, result } | AssignRef { var, expr, result } => {
                push("Var", *var);
                push("Expr", *expr);
                push("Result", *result);
            }
            ArrayDimFetch { var, dim, result } => {
                push("Var", *var);
                push("Dim", *dim);
                push("Result", *result);
            }
            Binary {
                left,
                right,
                result,
                ..
            } => {
                push("Left", *left);
                push("Right", *right);
                push("Result", *result);
            }
            Unary { expr, result, .. }
            | Cast { expr, result, .. }
            | Clone { expr, result }
            | Empty { expr, result }
            | Eval { expr, result }
            | Include { expr, result, .. }
            | Print { expr, result }
            | Assertion { expr, result, .. } => {
                push("Expr", *expr);
                push("Result", *result);
            }
            ArrayLit { result, .. } => push("Result", *result),
            Closure { result, .. } => push("Result", *result),
            ClassConstFetch {
                class,
                name,
                result,
            } => {
                push("Class", *class);
                push("Name", *name);
                push("Result", *result);
            }
            ConstFetch { name, result } => {
                push("Name", *name);
                push("Result", *result);
            }
            FunctionCall { name, result, .. } => {
                push("Name", *name);
                push("Result", *result);
            }
            InstanceOf {
                expr,
                class,
                result,
            } => {
                push("Expr", *expr);
                push("Class", *class);
                push("Result", *result);
            }
            Isset { result, .. } => push("Result", *result),
            MethodCall {
                var, name, result, ..
            } => {
                push("Var", *var);
                push("Name", *name);
                push("Result", *result);
            }
            New { class, result, .. } => {
                push("Class", *class);
                push("Result", *result);
            }
            Yield {
                value,
                key,
                result,
            } => {
                if let Some(v) = value {
                    push("Value", *v);
                }
                if let Some(k) = key {
                    push("Key", *k);
                }
                push("Result", *result);
            }
            StaticCall {
                class,
                name,
                result,
                ..
            } => {
                push("Class", *class);
                push("Name", *name);
                push("Result", *result);
            }
            StaticPropertyFetch {
                class,
                prop,
                result,
            } => {
                push("Class", *class);
                push("Prop", *prop);
                push("Result", *result);
            }
            PropertyFetch {
                var, prop, result, ..
            } => {
                push("Var", *var);
                push("Prop", *prop);
                push("Result", *result);
            }
            IterReset { var, result }
            | IterValid { var, result }
            | IterKey { var, result }
            | IterValue { var, result, .. } => {
                push("Var", *var);
                push("Result", *result);
            }
            Phi { result, .. } => push("Result", *result),
            Echo { expr } | Throw { expr } => push("Expr", *expr),
            Exit { expr } | Return { expr } => {
                if let Some(e) = expr {
                    push("Expr", *e);
                }
            }
            Unset { .. } => {}
            GlobalVar { var } => push("Var", *var),
            StaticVar {
                var, default_var, ..
            } => {
                push("Var", *var);
                if let Some(d) = default_var {
                    push("DefaultVar", *d);
                }
            }
            ConstDecl { name, value, .. } => {
                push("Name", *name);
                push("Value", *value);
            }
            StmtClass { name, extends, .. } => {
                push("Name", *name);
                if let Some(e) = extends {
                    push("Extends", *e);
                }
            }
            StmtClassMethod { .. } | StmtFunc { .. } => {}
            StmtInterface { name, .. } | StmtTrait { name, .. } => push("Name", *name),
            StmtTraitUse { .. } => {}
            Alias {
                trait_name,
                method,
                new_name,
                ..
            } => {
                if let Some(t) = trait_name {
                    push("Trait", *t);
                }
                push("Method", *method);
                if let Some(n) = new_name {
                    push("NewName", *n);
                }
            }
            Precedence {
                trait_name, method, ..
            } => {
                if let Some(t) = trait_name {
                    push("Trait", *t);
                }
                push("Method", *method);
            }
            StmtProperty {
                name, default_var, ..
            } => {
                push("Name", *name);
                if let Some(d) = default_var {
                    push("DefaultVar", *d);
                }
            }
            Jump { .. } => {}
            JumpIf { cond, .. } => push("Cond", *cond),
            Switch { cond, .. } => push("Cond", *cond),
        }
        out
    }

    /// Named list slots.
    pub fn list_vars(&self) -> Vec<(&'static str, Vec<OperandId>)> {
        use OpKind::*;
        match &self.kind {
            ConcatList { list, .. } => vec![("List", list.clone())],
            ArrayLit { keys, values, .. } => {
                vec![("Keys", keys.clone()), ("Values", values.clone())]
            }
            Closure { use_vars, .. } => vec![("UseVars", use_vars.clone())],
            FunctionCall { args, .. } | MethodCall { args, .. } | StaticCall { args, .. }
            | New { args, .. } => vec![("Args", args.clone())],
            Isset { vars, .. } => vec![("Vars", vars.clone())],
            Unset { exprs } => vec![("Exprs", exprs.clone())],
            StmtTraitUse { traits, .. } => vec![("Traits", traits.clone())],
            Precedence { insteadof, .. } => vec![("InsteadOf", insteadof.clone())],
            StmtClass { implements, .. } => vec![("Implements", implements.clone())],
            StmtInterface { extends, .. } => vec![("Extends", extends.clone())],
            Switch { cases, .. } => vec![("Cases", cases.clone())],
            _ => Vec::new(),
        }
    }

    /// Replace the operand held in a named single slot.
    pub fn change_var(&mut self, slot: &str, new: OperandId) {
        use OpKind::*;
        match &mut self.kind {
            Param {
                name,
                default_var,
                result,
                ..
            } => match slot {
                "Name" => *name = new,
                "DefaultVar" => *default_var = Some(new),
                "Result" => *result = new,
                _ => {}
            },
            ConcatList { result, .. } => {
                if slot == "Result" {
                    *result = new;
                }
            }
            Assign { var, expr, result } | AssignRef { var, expr, result } => match slot {
                "Var" => *var = new,
                "Expr" => *expr = new,
                "Result" => *result = new,
                _ => {}
            },
            ArrayDimFetch { var, dim, result } => match slot {
                "Var" => *var = new,
                "Dim" => *dim = new,
                "Result" => *result = new,
                _ => {}
            },
            Binary {
                left,
                right,
                result,
                ..
            } => match slot {
                "Left" => *left = new,
                "Right" => *right = new,
                "Result" => *result = new,
                _ => {}
            },
            Unary { expr, result, .. }
            | Cast { expr, result, .. }
            | Clone { expr, result }
            | Empty { expr, result }
            | Eval { expr, result }
            | Include { expr, result, .. }
            | Print { expr, result }
            | Assertion { expr, result, .. } => match slot {
                "Expr" => *expr = new,
                "Result" => *result = new,
                _ => {}
            },
            ArrayLit { result, .. } | Isset { result, .. } | Closure { result, .. } => {
                if slot == "Result" {
                    *result = new;
                }
            }
            ClassConstFetch {
                class,
                name,
                result,
            } => match slot {
                "Class" => *class = new,
                "Name" => *name = new,
                "Result" => *result = new,
                _ => {}
            },
            ConstFetch { name, result } => match slot {
                "Name" => *name = new,
                "Result" => *result = new,
                _ => {}
            },
            FunctionCall { name, result, .. } => match slot {
                "Name" => *name = new,
                "Result" => *result = new,
                _ => {}
            },
            InstanceOf {
                expr,
                class,
                result,
            } => match slot {
                "Expr" => *expr = new,
                "Class" => *class = new,
                "Result" => *result = new,
                _ => {}
            },
            MethodCall {
                var, name, result, ..
            } => match slot {
                "Var" => *var = new,
                "Name" => *name = new,
                "Result" => *result = new,
                _ => {}
            },
            New { class, result, .. } => match slot {
                "Class" => *class = new,
                "Result" => *result = new,
                _ => {}
            },
            Yield {
                value,
                key,
                result,
            } => match slot {
                "Value" => *value = Some(new),
                "Key" => *key = Some(new),
                "Result" => *result = new,
                _ => {}
            },
            StaticCall {
                class,
                name,
                result,
                ..
            } => match slot {
                "Class" => *class = new,
                "Name" => *name = new,
                "Result" => *result = new,
                _ => {}
            },
            StaticPropertyFetch {
                class,
                prop,
                result,
            } => match slot {
                "Class" => *class = new,
                "Prop" => *prop = new,
                "Result" => *result = new,
                _ => {}
            },
            PropertyFetch {
                var, prop, result, ..
            } => match slot {
                "Var" => *var = new,
                "Prop" => *prop = new,
                "Result" => *result = new,
                _ => {}
            },
            IterReset { var, result }
            | IterValid { var, result }
            | IterKey { var, result }
            | IterValue { var, result, .. } => match slot {
                "Var" => *var = new,
                "Result" => *result = new,
                _ => {}
            },
            Phi { result, .. } => {
                if slot == "Result" {
                    *result = new;
                }
            }
            Echo { expr } | Throw { expr } => {
                if slot == "Expr" {
                    *expr = new;
                }
            }
            Exit { expr } | Return { expr } => {
                if slot == "Expr" {
                    *expr = Some(new);
                }
            }
            Unset { .. } => {}
            GlobalVar { var } => {
                if slot == "Var" {
                    *var = new;
                }
            }
            StaticVar {
                var, default_var, ..
            } => match slot {
                "Var" => *var = new,
                "DefaultVar" => *default_var = Some(new),
                _ => {}
            },
            ConstDecl { name, value, .. } => match slot {
                "Name" => *name = new,
                "Value" => *value = new,
                _ => {}
            },
            StmtClass { name, extends, .. } => match slot {
                "Name" => *name = new,
                "Extends" => *extends = Some(new),
                _ => {}
            },
            StmtClassMethod { .. } | StmtFunc { .. } | StmtTraitUse { .. } | Jump { .. } => {}
            StmtInterface { name, .. } | StmtTrait { name, .. } => {
                if slot == "Name" {
                    *name = new;
                }
            }
            Alias {
                trait_name,
                method,
                new_name,
                ..
            } => match slot {
                "Trait" => *trait_name = Some(new),
                "Method" => *method = new,
                "NewName" => *new_name = Some(new),
                _ => {}
            },
            Precedence {
                trait_name, method, ..
            } => match slot {
                "Trait" => *trait_name = Some(new),
                "Method" => *method = new,
                _ => {}
            },
            StmtProperty {
                name, default_var, ..
            } => match slot {
                "Name" => *name = new,
                "DefaultVar" => *default_var = Some(new),
                _ => {}
            },
            JumpIf { cond, .. } | Switch { cond, .. } => {
                if slot == "Cond" {
                    *cond = new;
                }
            }
        }
    }

    /// Replace a named list slot wholesale.
    pub fn change_list_var(&mut self, slot: &str, new: Vec<OperandId>) {
        use OpKind::*;
        match &mut self.kind {
            ConcatList { list, .. } => {
                if slot == "List" {
                    *list = new;
                }
            }
            ArrayLit { keys, values, .. } => match slot {
                "Keys" => *keys = new,
                "Values" => *values = new,
                _ => {}
            },
            Closure { use_vars, .. } => {
                if slot == "UseVars" {
                    *use_vars = new;
                }
            }
            FunctionCall { args, .. } | MethodCall { args, .. } | StaticCall { args, .. }
            | New { args, .. } => {
                if slot == "Args" {
                    *args = new;
                }
            }
            Isset { vars, .. } => {
                if slot == "Vars" {
                    *vars = new;
                }
            }
            Unset { exprs } => {
                if slot == "Exprs" {
                    *exprs = new;
                }
            }
            StmtTraitUse { traits, .. } => {
                if slot == "Traits" {
                    *traits = new;
                }
            }
            Precedence { insteadof, .. } => {
                if slot == "InsteadOf" {
                    *insteadof = new;
                }
            }
            StmtClass { implements, .. } => {
                if slot == "Implements" {
                    *implements = new;
                }
            }
            StmtInterface { extends, .. } => {
                if slot == "Extends" {
                    *extends = new;
                }
            }
            Switch { cases, .. } => {
                if slot == "Cases" {
                    *cases = new;
                }
            }
            _ => {}
        }
    }

    /// Sub-blocks owned by this op, in slot order.
    pub fn sub_blocks(&self) -> Vec<(SubBlockSlot, BlockId)> {
        use OpKind::*;
        match &self.kind {
            Param {
                default_block: Some(b),
                ..
            } => vec![(SubBlockSlot::DefaultBlock, *b)],
            StmtClass { stmts, .. } | StmtInterface { stmts, .. } | StmtTrait { stmts, .. } => {
                vec![(SubBlockSlot::Stmts, *stmts)]
            }
            Jump { target } => vec![(SubBlockSlot::Target, *target)],
            JumpIf {
                if_block,
                else_block,
                ..
            } => vec![
                (SubBlockSlot::If, *if_block),
                (SubBlockSlot::Else, *else_block),
            ],
            StmtProperty {
                default_block: Some(b),
                ..
            }
            | StaticVar {
                default_block: Some(b),
                ..
            } => vec![(SubBlockSlot::DefaultBlock, *b)],
            ConstDecl {
                value_block: Some(b),
                ..
            } => vec![(SubBlockSlot::ValueBlock, *b)],
            Switch { targets, .. } => targets
                .iter()
                .enumerate()
                .map(|(i, b)| (SubBlockSlot::SwitchTarget(i), *b))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Retarget a sub-block slot.
    pub fn change_sub_block(&mut self, slot: SubBlockSlot, new: BlockId) {
        use OpKind::*;
        match (&mut self.kind, slot) {
            (Param { default_block, .. }, SubBlockSlot::DefaultBlock) => {
                *default_block = Some(new)
            }
            (StmtClass { stmts, .. }, SubBlockSlot::Stmts)
            | (StmtInterface { stmts, .. }, SubBlockSlot::Stmts)
            | (StmtTrait { stmts, .. }, SubBlockSlot::Stmts) => *stmts = new,
            (Jump { target }, SubBlockSlot::Target) => *target = new,
            (JumpIf { if_block, .. }, SubBlockSlot::If) => *if_block = new,
            (JumpIf { else_block, .. }, SubBlockSlot::Else) => *else_block = new,
            (StmtProperty { default_block, .. }, SubBlockSlot::DefaultBlock)
            | (StaticVar { default_block, .. }, SubBlockSlot::DefaultBlock) => {
                *default_block = Some(new)
            }
            (ConstDecl { value_block, .. }, SubBlockSlot::ValueBlock) => *value_block = Some(new),
            (Switch { targets, .. }, SubBlockSlot::SwitchTarget(i)) => {
                if let Some(t) = targets.get_mut(i) {
                    *t = new;
                }
            }
            _ => {}
        }
    }

    /// Whether a named slot is a definition (writer) rather than a use.
    pub fn is_write_var(&self, slot: &str) -> bool {
        if slot == "Result" {
            return true;
        }
        if slot == "Var" {
            return matches!(
                self.kind,
                OpKind::Assign { .. } | OpKind::AssignRef { .. } | OpKind::StaticVar { .. }
            );
        }
        false
    }

    /// The op's result operand, when it has one.
    pub fn result(&self) -> Option<OperandId> {
        use OpKind::*;
        match &self.kind {
            Param { result, .. }
            | ConcatList { result, .. }
            | Assign { result, .. }
            | AssignRef { result, .. }
            | ArrayDimFetch { result, .. }
            | Binary { result, .. }
            | Unary { result, .. }
            | Cast { result, .. }
            | ArrayLit { result, .. }
            | Closure { result, .. }
            | ClassConstFetch { result, .. }
            | Clone { result, .. }
            | ConstFetch { result, .. }
            | Empty { result, .. }
            | Eval { result, .. }
            | FunctionCall { result, .. }
            | Include { result, .. }
            | InstanceOf { result, .. }
            | Isset { result, .. }
            | MethodCall { result, .. }
            | New { result, .. }
            | Yield { result, .. }
            | Assertion { result, .. }
            | Print { result, .. }
            | StaticCall { result, .. }
            | StaticPropertyFetch { result, .. }
            | PropertyFetch { result, .. }
            | IterReset { result, .. }
            | IterValid { result, .. }
            | IterKey { result, .. }
            | IterValue { result, .. }
            | Phi { result, .. } => Some(*result),
            _ => None,
        }
    }

    /// φ operand set, when this op is a φ.
    pub fn phi_vars(&self) -> Option<&Vec<OperandId>> {
        match &self.kind {
            OpKind::Phi { vars, .. } => Some(vars),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_slots_and_roles() {
        let op = Op::new(
            OpKind::Assign {
                var: OperandId(0),
                expr: OperandId(1),
                result: OperandId(2),
            },
            None,
        );
        let vars = op.vars();
        assert_eq!(
            vars,
            vec![
                ("Var", OperandId(0)),
                ("Expr", OperandId(1)),
                ("Result", OperandId(2)),
            ]
        );
        assert!(op.is_write_var("Var"));
        assert!(op.is_write_var("Result"));
        assert!(!op.is_write_var("Expr"));
    }

    #[test]
    fn change_var_rewrites_the_named_slot() {
        let mut op = Op::new(
            OpKind::Binary {
                op: BinaryOpKind::Concat,
                left: OperandId(0),
                right: OperandId(1),
                result: OperandId(2),
            },
            None,
        );
        op.change_var("Right", OperandId(9));
        assert_eq!(op.vars()[1], ("Right", OperandId(9)));
    }

    #[test]
    fn jump_if_exposes_both_arms() {
        let op = Op::new(
            OpKind::JumpIf {
                cond: OperandId(0),
                if_block: BlockId(1),
                else_block: BlockId(2),
            },
            None,
        );
        assert_eq!(
            op.sub_blocks(),
            vec![
                (SubBlockSlot::If, BlockId(1)),
                (SubBlockSlot::Else, BlockId(2)),
            ]
        );
    }

    #[test]
    fn dim_fetch_dim_is_a_read_slot() {
        let op = Op::new(
            OpKind::ArrayDimFetch {
                var: OperandId(0),
                dim: OperandId(1),
                result: OperandId(2),
            },
            None,
        );
        assert!(!op.is_write_var("Var"), "fetch reads its base");
        assert!(!op.is_write_var("Dim"));
    }
}
