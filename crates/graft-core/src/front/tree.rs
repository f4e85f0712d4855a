use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::diag::SourceSpan;
use crate::ir::{BinOp, PrimKind, UnaryOp};

use super::SymbolId;

/// The whole resolved program: one tree per compilation unit plus the
/// frontend-selected entry point methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedProgram {
    pub units: Vec<ResolvedUnit>,
    /// Method symbols whose reachability anchors the program.
    pub entry_points: Vec<SymbolId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedUnit {
    pub file: PathBuf,
    /// All types declared in the unit, nested and local types flattened
    /// alongside their enclosing type.
    pub types: Vec<TypeNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontTypeKind {
    Class { is_abstract: bool, is_final: bool },
    Interface,
    Enum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeNode {
    pub symbol: SymbolId,
    pub name: String,
    pub kind: FrontTypeKind,
    pub span: SourceSpan,
    pub superclass: Option<SymbolId>,
    pub interfaces: Vec<SymbolId>,
    /// The frontend failed to fully resolve this type; it gets no IR shell
    /// and references to it are unit-fatal.
    pub uninstantiable: bool,
    /// Direct or transitive subtype of the host-environment object root.
    pub host: bool,
    /// Anonymous classes become final named classes in the IR.
    pub anonymous: bool,
    /// For inner types, the symbol of the enclosing type whose instance is
    /// captured; `None` for static-nested and top-level types.
    pub enclosing_instance: Option<SymbolId>,
    /// Outer locals captured by a local/anonymous type, in capture order.
    pub captured_locals: Vec<CapturedLocal>,
    pub fields: Vec<FieldNode>,
    pub methods: Vec<MethodNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedLocal {
    pub symbol: SymbolId,
    pub name: String,
    pub ty: FrontType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontDisposition {
    None,
    Final,
    Volatile,
    CompileTimeConstant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldNode {
    pub symbol: SymbolId,
    pub name: String,
    pub span: SourceSpan,
    pub ty: FrontType,
    pub is_static: bool,
    pub disposition: FrontDisposition,
    /// Folded constant value, present iff the disposition is
    /// `CompileTimeConstant`.
    pub constant: Option<ConstValue>,
    pub initializer: Option<FrontExpr>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MethodFlags {
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_private: bool,
    pub is_native: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamNode {
    pub symbol: SymbolId,
    pub name: String,
    pub ty: FrontType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodNode {
    pub symbol: SymbolId,
    pub name: String,
    pub span: SourceSpan,
    pub is_ctor: bool,
    pub params: Vec<ParamNode>,
    pub return_ty: FrontType,
    pub flags: MethodFlags,
    /// Symbols of the methods this one directly overrides or implements.
    pub overrides: Vec<SymbolId>,
    pub thrown: Vec<SymbolId>,
    pub body: Option<FrontStmt>,
    /// Raw text of a native method declaration, still carrying the
    /// `/*-{ ... }-*/` delimiters; extracted and resolved by the builder.
    pub native_source: Option<String>,
}

/// A type as the frontend writes it: named types are still symbols, arrays
/// keep their element type structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrontType {
    Void,
    Prim(PrimKind),
    Named(SymbolId),
    Array(Box<FrontType>),
    Null,
}

/// A constant value folded by the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Bool(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Null,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontStmt {
    pub span: SourceSpan,
    pub kind: FrontStmtKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontCatch {
    pub symbol: SymbolId,
    pub name: String,
    /// One entry per caught type; more than one for a multi-catch clause.
    pub tys: Vec<SymbolId>,
    pub block: Vec<FrontStmt>,
}

/// The iterator protocol methods a for-each over a non-array desugars to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterProtocol {
    pub iterator: SymbolId,
    pub has_next: SymbolId,
    pub next: SymbolId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FrontStmtKind {
    Block(Vec<FrontStmt>),
    Expr(FrontExpr),
    If {
        cond: FrontExpr,
        then: Box<FrontStmt>,
        els: Option<Box<FrontStmt>>,
    },
    While {
        cond: FrontExpr,
        body: Box<FrontStmt>,
    },
    DoWhile {
        body: Box<FrontStmt>,
        cond: FrontExpr,
    },
    For {
        init: Vec<FrontStmt>,
        cond: Option<FrontExpr>,
        update: Vec<FrontExpr>,
        body: Box<FrontStmt>,
    },
    ForEach {
        elem_symbol: SymbolId,
        elem_name: String,
        elem_ty: FrontType,
        iterable: FrontExpr,
        /// `None` when iterating an array.
        protocol: Option<IterProtocol>,
        /// Cast inserted around `next()` when the element type is narrower
        /// than the iterator's declared element type.
        elem_cast: Option<FrontType>,
        body: Box<FrontStmt>,
    },
    Switch {
        selector: FrontExpr,
        body: Vec<FrontStmt>,
    },
    Case(Option<FrontExpr>),
    Try {
        block: Vec<FrontStmt>,
        catches: Vec<FrontCatch>,
        finally_block: Option<Vec<FrontStmt>>,
    },
    Return(Option<FrontExpr>),
    Throw(FrontExpr),
    Break(Option<String>),
    Continue(Option<String>),
    Labeled {
        label: String,
        body: Box<FrontStmt>,
    },
    Assert {
        test: FrontExpr,
        message: Option<FrontExpr>,
    },
    LocalDecl {
        symbol: SymbolId,
        name: String,
        ty: FrontType,
        init: Option<FrontExpr>,
    },
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontExpr {
    pub span: SourceSpan,
    pub ty: FrontType,
    /// Constant value if the frontend already folded this expression.
    pub folded: Option<ConstValue>,
    pub kind: FrontExprKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegateKind {
    This,
    Super,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FrontExprKind {
    Literal(ConstValue),
    Binary {
        op: BinOp,
        lhs: Box<FrontExpr>,
        rhs: Box<FrontExpr>,
    },
    Prefix {
        op: UnaryOp,
        arg: Box<FrontExpr>,
    },
    Postfix {
        op: UnaryOp,
        arg: Box<FrontExpr>,
    },
    Cast {
        ty: FrontType,
        expr: Box<FrontExpr>,
    },
    InstanceOf {
        ty: SymbolId,
        expr: Box<FrontExpr>,
    },
    FieldRef {
        field: SymbolId,
        instance: Option<Box<FrontExpr>>,
    },
    ArrayRef {
        array: Box<FrontExpr>,
        index: Box<FrontExpr>,
    },
    ArrayLength(Box<FrontExpr>),
    VarRef(SymbolId),
    This,
    /// Reference to an enclosing instance (`Outer.this`).
    Outer {
        target: SymbolId,
    },
    Call {
        method: SymbolId,
        instance: Option<Box<FrontExpr>>,
        args: Vec<FrontExpr>,
        /// Super-qualified call; dispatches statically.
        is_super: bool,
    },
    /// Constructor delegation (`this(...)` / `super(...)`) as the first
    /// statement of a constructor body.
    DelegateCall {
        kind: DelegateKind,
        ctor: SymbolId,
        args: Vec<FrontExpr>,
    },
    New {
        ctor: SymbolId,
        args: Vec<FrontExpr>,
    },
    NewArray {
        elem_ty: FrontType,
        dims: Vec<Option<FrontExpr>>,
        init: Option<Vec<FrontExpr>>,
    },
    Conditional {
        cond: Box<FrontExpr>,
        then: Box<FrontExpr>,
        els: Box<FrontExpr>,
    },
    /// Frontend marker: the wrapped primitive expression is auto-boxed here.
    Box {
        prim: PrimKind,
        expr: Box<FrontExpr>,
    },
    /// Frontend marker: the wrapped wrapper-typed expression is unboxed.
    Unbox {
        prim: PrimKind,
        expr: Box<FrontExpr>,
    },
    ClassLiteral(FrontType),
}
