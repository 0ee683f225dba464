//! Crate-owned PHP abstract syntax tree.
//!
//! The tree-sitter adapter produces this tree; the rewriter stack mutates it
//! in place; the CFG builder consumes it. Every node carries a [`Span`] with
//! 1-based lines and byte offsets into the source file.
//!
//! Rewriters may replace a node only by another node of the same kind class
//! (statement for statement, expression for expression); the traverser
//! enforces this with [`Node::is_statement`].

use crate::shared::models::Span;

/// How a name was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameForm {
    /// `Foo\Bar`
    Normal,
    /// `\Foo\Bar`
    FullyQualified,
    /// `namespace\Foo\Bar`
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    Coalesce,
    Concat,
    Div,
    Minus,
    Mod,
    Mul,
    Plus,
    Pow,
    ShiftLeft,
    ShiftRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BooleanAnd,
    BooleanOr,
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
pub enum UnaryOp {
    Plus,
    Minus,
    BooleanNot,
    BitwiseNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Array,
    Bool,
    Double,
    Int,
    Object,
    String,
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    Include,
    IncludeOnce,
    Require,
    RequireOnce,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // ── names and scalars ─────────────────────────────────────────────
    /// A bare identifier; for variables the value keeps its `$` prefix.
    Identifier { value: String },
    Name { parts: Vec<String>, form: NameForm },
    ScalarString { value: String },
    /// Numeric literal, raw source text (decimal or `0x…`).
    ScalarNumber { raw: String },
    ScalarEncapsed { parts: Vec<Node> },
    ScalarEncapsedPart { value: String },
    ScalarHeredoc { parts: Vec<Node> },
    ScalarMagicConstant { name: String },

    // ── expressions ───────────────────────────────────────────────────
    ExprVariable { name: Box<Node> },
    ExprAssign { var: Box<Node>, expr: Box<Node> },
    ExprAssignRef { var: Box<Node>, expr: Box<Node> },
    ExprAssignOp { op: AssignOp, var: Box<Node>, expr: Box<Node> },
    ExprBinary { op: BinaryOp, left: Box<Node>, right: Box<Node> },
    ExprUnary { op: UnaryOp, expr: Box<Node> },
    ExprCast { kind: CastKind, expr: Box<Node> },
    ExprPreInc { var: Box<Node> },
    ExprPreDec { var: Box<Node> },
    ExprPostInc { var: Box<Node> },
    ExprPostDec { var: Box<Node> },
    ExprTernary { cond: Box<Node>, if_true: Option<Box<Node>>, if_false: Box<Node> },
    ExprArray { items: Vec<Node> },
    ExprList { items: Vec<Node> },
    ArrayItem { key: Option<Box<Node>>, value: Option<Box<Node>>, by_ref: bool },
    ExprArrayDimFetch { var: Box<Node>, dim: Option<Box<Node>> },
    ExprPropertyFetch { var: Box<Node>, prop: Box<Node>, nullsafe: bool },
    ExprStaticPropertyFetch { class: Box<Node>, prop: Box<Node> },
    ExprFunctionCall { function: Box<Node>, args: Vec<Node> },
    ExprMethodCall { var: Box<Node>, method: Box<Node>, args: Vec<Node>, nullsafe: bool },
    ExprStaticCall { class: Box<Node>, call: Box<Node>, args: Vec<Node> },
    Argument { expr: Box<Node> },
    ExprNew { class: Box<Node>, args: Vec<Node> },
    ExprClosure {
        is_static: bool,
        by_ref: bool,
        params: Vec<Node>,
        uses: Vec<Node>,
        return_type: Option<Box<Node>>,
        stmts: Vec<Node>,
    },
    ClosureUse { var: Box<Node>, by_ref: bool },
    ExprArrowFunction {
        is_static: bool,
        by_ref: bool,
        params: Vec<Node>,
        return_type: Option<Box<Node>>,
        expr: Box<Node>,
    },
    ExprIsset { vars: Vec<Node> },
    ExprEmpty { expr: Box<Node> },
    ExprEval { expr: Box<Node> },
    ExprExit { expr: Option<Box<Node>> },
    ExprInclude { kind: IncludeKind, expr: Box<Node> },
    ExprInstanceOf { expr: Box<Node>, class: Box<Node> },
    ExprClone { expr: Box<Node> },
    ExprErrorSuppress { expr: Box<Node> },
    ExprPrint { expr: Box<Node> },
    ExprShellExec { parts: Vec<Node> },
    ExprConstFetch { name: Box<Node> },
    ExprClassConstFetch { class: Box<Node>, name: Box<Node> },
    ExprYield { key: Option<Box<Node>>, value: Option<Box<Node>> },
    /// A construct the adapter recognizes but the pipeline does not lower
    /// (`match`, `yield from`, …). Reads through it produce a fresh
    /// unwritten temporary.
    ExprUnknown { construct: String },

    // ── types ─────────────────────────────────────────────────────────
    TypeNullable { ty: Box<Node> },
    TypeUnion { types: Vec<Node> },

    // ── statements ────────────────────────────────────────────────────
    StmtList { stmts: Vec<Node> },
    StmtExpression { expr: Box<Node> },
    StmtEcho { exprs: Vec<Node> },
    StmtIf {
        cond: Box<Node>,
        stmt: Box<Node>,
        elseifs: Vec<Node>,
        else_stmt: Option<Box<Node>>,
    },
    StmtElseIf { cond: Box<Node>, stmt: Box<Node> },
    StmtElse { stmt: Box<Node> },
    StmtWhile { cond: Box<Node>, stmt: Box<Node> },
    StmtDo { stmt: Box<Node>, cond: Box<Node> },
    StmtFor {
        init: Vec<Node>,
        cond: Vec<Node>,
        step: Vec<Node>,
        stmt: Box<Node>,
    },
    StmtForeach {
        expr: Box<Node>,
        key: Option<Box<Node>>,
        by_ref: bool,
        var: Box<Node>,
        stmt: Box<Node>,
    },
    StmtSwitch { cond: Box<Node>, cases: Vec<Node> },
    StmtCase { cond: Box<Node>, stmts: Vec<Node> },
    StmtDefault { stmts: Vec<Node> },
    StmtBreak { level: Option<Box<Node>> },
    StmtContinue { level: Option<Box<Node>> },
    StmtReturn { expr: Option<Box<Node>> },
    StmtThrow { expr: Box<Node> },
    StmtGoto { label: String },
    StmtLabel { name: String },
    StmtFunction {
        name: String,
        by_ref: bool,
        params: Vec<Node>,
        return_type: Option<Box<Node>>,
        stmts: Vec<Node>,
    },
    Param {
        name: String,
        by_ref: bool,
        variadic: bool,
        ty: Option<Box<Node>>,
        default: Option<Box<Node>>,
    },
    StmtClass {
        name: String,
        modifiers: Vec<String>,
        extends: Option<Box<Node>>,
        implements: Vec<Node>,
        stmts: Vec<Node>,
    },
    StmtInterface { name: String, extends: Vec<Node>, stmts: Vec<Node> },
    StmtTrait { name: String, stmts: Vec<Node> },
    StmtClassMethod {
        name: String,
        modifiers: Vec<String>,
        by_ref: bool,
        params: Vec<Node>,
        return_type: Option<Box<Node>>,
        stmts: Vec<Node>,
    },
    StmtPropertyList {
        modifiers: Vec<String>,
        ty: Option<Box<Node>>,
        props: Vec<Node>,
    },
    PropertyElement { name: String, default: Option<Box<Node>> },
    StmtConstList { consts: Vec<Node> },
    StmtConstant { name: String, expr: Box<Node> },
    StmtTraitUse { traits: Vec<Node>, adaptations: Vec<Node> },
    TraitUseAlias {
        trait_name: Option<Box<Node>>,
        method: String,
        alias: Option<String>,
        modifier: Option<String>,
    },
    TraitUsePrecedence {
        trait_name: Option<Box<Node>>,
        method: String,
        insteadof: Vec<Node>,
    },
    StmtGlobal { vars: Vec<Node> },
    StmtStatic { vars: Vec<Node> },
    StmtStaticVar { var: Box<Node>, default: Option<Box<Node>> },
    StmtUnset { vars: Vec<Node> },
    StmtNamespace { name: Option<Box<Node>>, stmts: Vec<Node> },
    StmtUse { use_type: Option<String>, uses: Vec<Node> },
    UseClause {
        use_type: Option<String>,
        name: Box<Node>,
        alias: Option<String>,
    },
    StmtGroupUse {
        use_type: Option<String>,
        prefix: Box<Node>,
        uses: Vec<Node>,
    },
    StmtTry {
        stmts: Vec<Node>,
        catches: Vec<Node>,
        finally: Vec<Node>,
    },
    StmtCatch {
        types: Vec<Node>,
        var: Option<Box<Node>>,
        stmts: Vec<Node>,
    },
    StmtNop,
    StmtInlineHtml,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Short name of the node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        use NodeKind::*;
        match &self.kind {
            Identifier { .. } => "Identifier",
            Name { .. } => "Name",
            ScalarString { .. } => "ScalarString",
            ScalarNumber { .. } => "ScalarNumber",
            ScalarEncapsed { .. } => "ScalarEncapsed",
            ScalarEncapsedPart { .. } => "ScalarEncapsedPart",
            ScalarHeredoc { .. } => "ScalarHeredoc",
            ScalarMagicConstant { .. } => "ScalarMagicConstant",
            ExprVariable { .. } => "ExprVariable",
            ExprAssign { .. } => "ExprAssign",
            ExprAssignRef { .. } => "ExprAssignRef",
            ExprAssignOp { .. } => "ExprAssignOp",
            ExprBinary { .. } => "ExprBinary",
            ExprUnary { .. } => "ExprUnary",
            ExprCast { .. } => "ExprCast",
            ExprPreInc { .. } => "ExprPreInc",
            ExprPreDec { .. } => "ExprPreDec",
            ExprPostInc { .. } => "ExprPostInc",
            ExprPostDec { .. } => "ExprPostDec",
            ExprTernary { .. } => "ExprTernary",
            ExprArray { .. } => "ExprArray",
            ExprList { .. } => "ExprList",
            ArrayItem { .. } => "ArrayItem",
            ExprArrayDimFetch { .. } => "ExprArrayDimFetch",
            ExprPropertyFetch { .. } => "ExprPropertyFetch",
            ExprStaticPropertyFetch { .. } => "ExprStaticPropertyFetch",
            ExprFunctionCall { .. } => "ExprFunctionCall",
            ExprMethodCall { .. } => "ExprMethodCall",
            ExprStaticCall { .. } => "ExprStaticCall",
            Argument { .. } => "Argument",
            ExprNew { .. } => "ExprNew",
            ExprClosure { .. } => "ExprClosure",
            ClosureUse { .. } => "ClosureUse",
            ExprArrowFunction { .. } => "ExprArrowFunction",
            ExprIsset { .. } => "ExprIsset",
            ExprEmpty { .. } => "ExprEmpty",
            ExprEval { .. } => "ExprEval",
            ExprExit { .. } => "ExprExit",
            ExprInclude { .. } => "ExprInclude",
            ExprInstanceOf { .. } => "ExprInstanceOf",
            ExprClone { .. } => "ExprClone",
            ExprErrorSuppress { .. } => "ExprErrorSuppress",
            ExprPrint { .. } => "ExprPrint",
            ExprShellExec { .. } => "ExprShellExec",
            ExprConstFetch { .. } => "ExprConstFetch",
            ExprClassConstFetch { .. } => "ExprClassConstFetch",
            ExprYield { .. } => "ExprYield",
            ExprUnknown { .. } => "ExprUnknown",
            TypeNullable { .. } => "TypeNullable",
            TypeUnion { .. } => "TypeUnion",
            StmtList { .. } => "StmtList",
            StmtExpression { .. } => "StmtExpression",
            StmtEcho { .. } => "StmtEcho",
            StmtIf { .. } => "StmtIf",
            StmtElseIf { .. } => "StmtElseIf",
            StmtElse { .. } => "StmtElse",
            StmtWhile { .. } => "StmtWhile",
            StmtDo { .. } => "StmtDo",
            StmtFor { .. } => "StmtFor",
            StmtForeach { .. } => "StmtForeach",
            StmtSwitch { .. } => "StmtSwitch",
            StmtCase { .. } => "StmtCase",
            StmtDefault { .. } => "StmtDefault",
            StmtBreak { .. } => "StmtBreak",
            StmtContinue { .. } => "StmtContinue",
            StmtReturn { .. } => "StmtReturn",
            StmtThrow { .. } => "StmtThrow",
            StmtGoto { .. } => "StmtGoto",
            StmtLabel { .. } => "StmtLabel",
            StmtFunction { .. } => "StmtFunction",
            Param { .. } => "Param",
            StmtClass { .. } => "StmtClass",
            StmtInterface { .. } => "StmtInterface",
            StmtTrait { .. } => "StmtTrait",
            StmtClassMethod { .. } => "StmtClassMethod",
            StmtPropertyList { .. } => "StmtPropertyList",
            PropertyElement { .. } => "PropertyElement",
            StmtConstList { .. } => "StmtConstList",
            StmtConstant { .. } => "StmtConstant",
            StmtTraitUse { .. } => "StmtTraitUse",
            TraitUseAlias { .. } => "TraitUseAlias",
            TraitUsePrecedence { .. } => "TraitUsePrecedence",
            StmtGlobal { .. } => "StmtGlobal",
            StmtStatic { .. } => "StmtStatic",
            StmtStaticVar { .. } => "StmtStaticVar",
            StmtUnset { .. } => "StmtUnset",
            StmtNamespace { .. } => "StmtNamespace",
            StmtUse { .. } => "StmtUse",
            UseClause { .. } => "UseClause",
            StmtGroupUse { .. } => "StmtGroupUse",
            StmtTry { .. } => "StmtTry",
            StmtCatch { .. } => "StmtCatch",
            StmtNop => "StmtNop",
            StmtInlineHtml => "StmtInlineHtml",
        }
    }

    /// Kind classification used by the rewrite traverser: a statement may
    /// only be replaced by a statement, anything else by anything else.
    pub fn is_statement(&self) -> bool {
        use NodeKind::*;
        matches!(
            self.kind,
            StmtList { .. }
                | StmtExpression { .. }
                | StmtEcho { .. }
                | StmtIf { .. }
                | StmtElseIf { .. }
                | StmtElse { .. }
                | StmtWhile { .. }
                | StmtDo { .. }
                | StmtFor { .. }
                | StmtForeach { .. }
                | StmtSwitch { .. }
                | StmtCase { .. }
                | StmtDefault { .. }
                | StmtBreak { .. }
                | StmtContinue { .. }
                | StmtReturn { .. }
                | StmtThrow { .. }
                | StmtGoto { .. }
                | StmtLabel { .. }
                | StmtFunction { .. }
                | StmtClass { .. }
                | StmtInterface { .. }
                | StmtTrait { .. }
                | StmtClassMethod { .. }
                | StmtPropertyList { .. }
                | StmtConstList { .. }
                | StmtConstant { .. }
                | StmtTraitUse { .. }
                | StmtGlobal { .. }
                | StmtStatic { .. }
                | StmtStaticVar { .. }
                | StmtUnset { .. }
                | StmtNamespace { .. }
                | StmtUse { .. }
                | StmtGroupUse { .. }
                | StmtTry { .. }
                | StmtCatch { .. }
                | StmtNop
                | StmtInlineHtml
        )
    }
}

/// Joined string form of a name-ish node (`Name` parts joined with `\`,
/// or a bare identifier's value).
pub fn name_to_string(node: &Node) -> Option<String> {
    match &node.kind {
        NodeKind::Name { parts, .. } => Some(parts.join("\\")),
        NodeKind::Identifier { value } => Some(value.clone()),
        NodeKind::ScalarString { value } => Some(value.clone()),
        _ => None,
    }
}

/// Split a joined name back into parts.
pub fn name_parts(name: &str) -> Vec<String> {
    name.split('\\').map(str::to_owned).collect()
}

/// Wrap a list of statements into a `StmtList` spanning them all.
pub fn stmt_list(stmts: Vec<Node>, fallback: Span) -> Node {
    let span = stmts
        .iter()
        .map(|s| s.span)
        .reduce(|a, b| a.merge(&b))
        .unwrap_or(fallback);
    Node::new(NodeKind::StmtList { stmts }, span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp() -> Span {
        Span::new(1, 1, 0, 0)
    }

    #[test]
    fn statement_classification() {
        let goto = Node::new(
            NodeKind::StmtGoto {
                label: "l0".into(),
            },
            sp(),
        );
        let brk = Node::new(NodeKind::StmtBreak { level: None }, sp());
        let name = Node::new(
            NodeKind::Name {
                parts: vec!["Foo".into()],
                form: NameForm::Normal,
            },
            sp(),
        );
        assert!(goto.is_statement());
        assert!(brk.is_statement());
        assert!(!name.is_statement());
    }

    #[test]
    fn name_join_and_split() {
        let n = Node::new(
            NodeKind::Name {
                parts: vec!["A".into(), "B".into()],
                form: NameForm::Normal,
            },
            sp(),
        );
        assert_eq!(name_to_string(&n).as_deref(), Some("A\\B"));
        assert_eq!(name_parts("A\\B"), vec!["A".to_string(), "B".to_string()]);
    }
}
