//! The whole-program intermediate representation.
//!
//! Nodes live in arenas on [`Program`] and reference each other through
//! typed `u32` handles, so trees clone cheaply and passes can rewrite a
//! detached body while reading the rest of the program.

pub mod expr;
pub mod member;
pub mod printer;
pub mod program;
pub mod stmt;
pub mod ty;
pub mod visit;
pub mod xref;

pub use expr::{BinOp, Expr, Literal, UnaryOp};
pub use member::{
    Body, Field, FieldDisposition, FieldId, Local, LocalId, Method, MethodBody, MethodId,
    NativeFunc, NativeRef, NativeTarget, Param,
};
pub use printer::Printer;
pub use program::{Liveness, Program, WellKnown};
pub use stmt::{Block, Catch, Stmt};
pub use ty::{CaptureEntry, PrimKind, TypeDecl, TypeId, TypeKind, TypeRef};
pub use xref::{CrossRefTable, NodeRef};
