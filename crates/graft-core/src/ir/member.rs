use serde::{Deserialize, Serialize};

use crate::define_entity;
use crate::diag::SourceSpan;

use super::expr::Literal;
use super::stmt::Block;
use super::ty::{TypeId, TypeRef};

define_entity!(MethodId);
define_entity!(FieldId);
define_entity!(LocalId);

/// A method parameter. The parameter list is frozen when the method is
/// constructed; passes never append to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    /// True for compiler-inserted capture parameters.
    pub synthetic: bool,
}

/// A local variable slot, owned by the arena; membership in a method is
/// through `Body::locals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Local {
    pub name: String,
    pub ty: TypeRef,
}

/// A lowered method body: declared locals plus the statement tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Body {
    pub locals: Vec<LocalId>,
    pub block: Block,
}

/// The body of a method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MethodBody {
    /// Abstract methods and synthesized runtime helpers.
    Absent,
    Stmts(Body),
    /// A foreign-code block extracted from a native method.
    Native(NativeFunc),
}

impl MethodBody {
    pub fn as_stmts(&self) -> Option<&Body> {
        match self {
            MethodBody::Stmts(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_stmts_mut(&mut self) -> Option<&mut Body> {
        match self {
            MethodBody::Stmts(b) => Some(b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub owner: TypeId,
    pub params: Vec<Param>,
    pub return_ty: TypeRef,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_private: bool,
    pub is_native: bool,
    /// True for the synthesized constructor form of a frontend constructor:
    /// an instance method returning its owner type.
    pub is_ctor: bool,
    /// Compiler-synthesized ($clinit/$init/$new and capture plumbing).
    pub synthetic: bool,
    /// Methods this one directly overrides. Populated after construction,
    /// consumed by up-ref discovery and devirtualization.
    pub overrides: Vec<MethodId>,
    pub thrown: Vec<TypeId>,
    pub body: MethodBody,
    pub span: SourceSpan,
}

impl Method {
    /// Whether a call through this method may dispatch to an override.
    pub fn can_be_polymorphic(&self) -> bool {
        !self.is_static && !self.is_final && !self.is_private && !self.is_ctor
    }
}

/// Field disposition flags from the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldDisposition {
    None,
    Final,
    Volatile,
    CompileTimeConstant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub owner: TypeId,
    pub ty: TypeRef,
    pub is_static: bool,
    pub disposition: FieldDisposition,
    /// Pre-folded constant initializer, if the frontend supplied one.
    pub constant: Option<Literal>,
    /// True for synthetic capture fields of nested/local types.
    pub synthetic: bool,
    pub span: SourceSpan,
}

impl Field {
    pub fn is_compile_time_constant(&self) -> bool {
        self.disposition == FieldDisposition::CompileTimeConstant
    }
}

/// A foreign-code block: the opaque low-level function body of a native
/// method, with a synthetic parameter header derived from the enclosing
/// method's parameter names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeFunc {
    pub param_names: Vec<String>,
    /// The opaque body text between the marker delimiters.
    pub source: String,
    /// Resolved `@Type::member[(sig)]` references, in source order.
    pub refs: Vec<NativeRef>,
    /// Reference types that cross the runtime-to-managed boundary through
    /// this block (reference-typed parameters and return). Feeds global
    /// reachability as instantiation sources.
    pub boundary_types: Vec<TypeId>,
}

/// One resolved identifier inside a foreign-code block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeRef {
    /// The reference text as written.
    pub text: String,
    /// Byte offset into `NativeFunc::source`.
    pub offset: u32,
    /// Whether the use site writes through the reference.
    pub lvalue: bool,
    pub target: NativeTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NativeTarget {
    Field(FieldId),
    Method(MethodId),
    /// A compile-time-constant field reference, replaced inline with its
    /// literal value rather than a live reference.
    ConstantInlined(Literal),
}
