use serde::{Deserialize, Serialize};

use crate::define_entity;
use crate::diag::SourceSpan;

use super::member::{FieldId, MethodId};

define_entity!(TypeId);

/// The eight primitive kinds of the frontend language.
///
/// The target runtime has a single numeric kind; these survive in the IR so
/// the lowering passes can insert the right narrowing/rounding/long-emulation
/// helpers before emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimKind {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimKind {
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimKind::Byte | PrimKind::Char | PrimKind::Short | PrimKind::Int | PrimKind::Long
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, PrimKind::Float | PrimKind::Double)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimKind::Bool => "boolean",
            PrimKind::Byte => "byte",
            PrimKind::Char => "char",
            PrimKind::Short => "short",
            PrimKind::Int => "int",
            PrimKind::Long => "long",
            PrimKind::Float => "float",
            PrimKind::Double => "double",
        }
    }
}

/// A type as used by expressions, fields, parameters and signatures.
///
/// Reference types (classes, interfaces, enums, arrays) all live in the
/// program's type arena; `Null` is the bottom reference type produced by the
/// frontend for casts that can never succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    Void,
    Prim(PrimKind),
    Ref(TypeId),
    Null,
}

impl TypeRef {
    pub fn is_reference(self) -> bool {
        matches!(self, TypeRef::Ref(_) | TypeRef::Null)
    }

    pub fn as_prim(self) -> Option<PrimKind> {
        match self {
            TypeRef::Prim(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_ref_id(self) -> Option<TypeId> {
        match self {
            TypeRef::Ref(id) => Some(id),
            _ => None,
        }
    }
}

/// Declared type kind. Anonymous subclasses of enums are modeled as plain
/// final classes, never as enums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeKind {
    Class { is_abstract: bool, is_final: bool },
    Interface,
    Enum,
    /// Interned array type; supertype is always the root object type.
    Array { elem: TypeRef },
}

/// A synthetic capture slot threaded into a nested/local type's constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureEntry {
    pub field: FieldId,
    /// Frontend symbol of the captured outer local; `None` for the captured
    /// enclosing instance.
    pub local_symbol: Option<crate::front::SymbolId>,
}

/// A declared (or interned array) type in the IR.
///
/// Invariant: `methods[0]` is the `$clinit` initializer; classes and enums
/// additionally keep `$init` at `methods[1]`. These are never individually
/// removable — only pruned wholesale with the type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeKind,
    pub superclass: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    /// Synthetic capture fields of a nested/local type, in constructor
    /// parameter order (captured locals first, enclosing instance last).
    pub captures: Vec<CaptureEntry>,
    /// Set for the program-synthesized runtime helper and well-known types.
    pub synthetic: bool,
    pub span: SourceSpan,
}

impl TypeDecl {
    pub fn is_class(&self) -> bool {
        matches!(self.kind, TypeKind::Class { .. } | TypeKind::Enum)
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Class { is_abstract: true, .. })
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Class { is_final: true, .. } | TypeKind::Array { .. }
        )
    }
}
