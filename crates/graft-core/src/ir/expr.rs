use serde::{Deserialize, Serialize};

use super::member::{FieldId, LocalId, MethodId};
use super::program::Program;
use super::ty::{PrimKind, TypeId, TypeRef};

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
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
    /// A class-literal value of the named type.
    Class(TypeRef),
}

impl Literal {
    pub fn ty(&self, program: &Program) -> TypeRef {
        match self {
            Literal::Bool(_) => TypeRef::Prim(PrimKind::Bool),
            Literal::Byte(_) => TypeRef::Prim(PrimKind::Byte),
            Literal::Char(_) => TypeRef::Prim(PrimKind::Char),
            Literal::Short(_) => TypeRef::Prim(PrimKind::Short),
            Literal::Int(_) => TypeRef::Prim(PrimKind::Int),
            Literal::Long(_) => TypeRef::Prim(PrimKind::Long),
            Literal::Float(_) => TypeRef::Prim(PrimKind::Float),
            Literal::Double(_) => TypeRef::Prim(PrimKind::Double),
            Literal::String(_) => TypeRef::Ref(program.well.string),
            Literal::Null => TypeRef::Null,
            Literal::Class(_) => TypeRef::Ref(program.well.class_meta),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Binary operators, including assignment and the compound-assignment
/// family that the statement breaker later rewrites away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    /// Unsigned (zero-fill) right shift.
    Shru,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// String or numeric concatenation when typed as the string type.
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    ShlAssign,
    ShrAssign,
    ShruAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
}

impl BinOp {
    pub fn is_assignment(self) -> bool {
        self.non_assign_of().is_some() || self == BinOp::Assign
    }

    /// For a compound assignment, the underlying arithmetic operator.
    pub fn non_assign_of(self) -> Option<BinOp> {
        Some(match self {
            BinOp::AddAssign => BinOp::Add,
            BinOp::SubAssign => BinOp::Sub,
            BinOp::MulAssign => BinOp::Mul,
            BinOp::DivAssign => BinOp::Div,
            BinOp::RemAssign => BinOp::Rem,
            BinOp::ShlAssign => BinOp::Shl,
            BinOp::ShrAssign => BinOp::Shr,
            BinOp::ShruAssign => BinOp::Shru,
            BinOp::BitAndAssign => BinOp::BitAnd,
            BinOp::BitOrAssign => BinOp::BitOr,
            BinOp::BitXorAssign => BinOp::BitXor,
            _ => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Inc,
    Dec,
}

impl UnaryOp {
    pub fn is_modifying(self) -> bool {
        matches!(self, UnaryOp::Inc | UnaryOp::Dec)
    }
}

/// An expression tree node.
///
/// Expressions carry enough typing to answer [`Expr::ty`] without a
/// separate environment: binary/conditional nodes store their result type,
/// everything else derives it from the referenced declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    Binary {
        op: BinOp,
        /// Result type of the operation after numeric promotion.
        ty: TypeRef,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Prefix {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Postfix {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Cast {
        ty: TypeRef,
        expr: Box<Expr>,
    },
    InstanceOf {
        ty: TypeId,
        expr: Box<Expr>,
    },
    Field {
        field: FieldId,
        /// `None` for static references.
        instance: Option<Box<Expr>>,
    },
    ArrayRef {
        array: Box<Expr>,
        index: Box<Expr>,
        elem_ty: TypeRef,
    },
    Local(LocalId),
    Param {
        method: MethodId,
        index: u32,
    },
    This {
        ty: TypeId,
    },
    Call {
        target: MethodId,
        /// `None` for static calls.
        instance: Option<Box<Expr>>,
        args: Vec<Expr>,
        /// Suppresses dynamic dispatch (super calls, devirtualized sites).
        static_dispatch: bool,
        /// Overrides the declared return type, used when integral division
        /// is retyped through a narrowing helper.
        ty_override: Option<TypeRef>,
    },
    New {
        ctor: MethodId,
        ty: TypeId,
        args: Vec<Expr>,
    },
    NewArray {
        elem: TypeRef,
        arr_ty: TypeId,
        /// Outermost-first; `None` for unspecified trailing dimensions.
        dims: Vec<Option<Expr>>,
        init: Option<Vec<Expr>>,
    },
    Conditional {
        ty: TypeRef,
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    /// Comma-sequence of expressions; evaluates left to right, yields the
    /// last value. Produced by the desugaring passes.
    Multi(Vec<Expr>),
}

impl Expr {
    pub fn ty(&self, program: &Program) -> TypeRef {
        match self {
            Expr::Literal(lit) => lit.ty(program),
            Expr::Binary { ty, .. } => *ty,
            Expr::Prefix { arg, .. } | Expr::Postfix { arg, .. } => arg.ty(program),
            Expr::Cast { ty, .. } => *ty,
            Expr::InstanceOf { .. } => TypeRef::Prim(PrimKind::Bool),
            Expr::Field { field, .. } => program.fields[*field].ty,
            Expr::ArrayRef { elem_ty, .. } => *elem_ty,
            Expr::Local(local) => program.locals[*local].ty,
            Expr::Param { method, index } => {
                program.methods[*method].params[*index as usize].ty
            }
            Expr::This { ty } => TypeRef::Ref(*ty),
            Expr::Call {
                target, ty_override, ..
            } => ty_override.unwrap_or(program.methods[*target].return_ty),
            Expr::New { ty, .. } => TypeRef::Ref(*ty),
            Expr::NewArray { arr_ty, .. } => TypeRef::Ref(*arr_ty),
            Expr::Conditional { ty, .. } => *ty,
            Expr::Multi(exprs) => exprs
                .last()
                .map(|e| e.ty(program))
                .unwrap_or(TypeRef::Void),
        }
    }

    /// Conservative side-effect analysis used by the simplifier and the
    /// statement breaker. A static field reference has an effect exactly
    /// when touching it can trigger its owner's static initializer.
    pub fn has_side_effects(&self, program: &Program) -> bool {
        match self {
            Expr::Literal(_) | Expr::Local(_) | Expr::Param { .. } | Expr::This { .. } => false,
            Expr::Binary { op, lhs, rhs, .. } => {
                op.is_assignment()
                    || lhs.has_side_effects(program)
                    || rhs.has_side_effects(program)
            }
            Expr::Prefix { op, arg } | Expr::Postfix { op, arg } => {
                op.is_modifying() || arg.has_side_effects(program)
            }
            Expr::Cast { expr, .. } => expr.has_side_effects(program),
            Expr::InstanceOf { expr, .. } => expr.has_side_effects(program),
            Expr::Field { field, instance } => {
                let decl = &program.fields[*field];
                if decl.is_static {
                    !program.clinit_is_trivial(decl.owner)
                } else {
                    // Null-pointer faults are not modeled as effects; only
                    // the instance expression matters.
                    instance
                        .as_ref()
                        .map(|e| e.has_side_effects(program))
                        .unwrap_or(false)
                }
            }
            Expr::ArrayRef { array, index, .. } => {
                array.has_side_effects(program) || index.has_side_effects(program)
            }
            Expr::Call { .. } | Expr::New { .. } => true,
            Expr::NewArray { dims, init, .. } => {
                dims.iter()
                    .flatten()
                    .any(|d| d.has_side_effects(program))
                    || init
                        .iter()
                        .flatten()
                        .any(|e| e.has_side_effects(program))
            }
            Expr::Conditional {
                cond, then, els, ..
            } => {
                cond.has_side_effects(program)
                    || then.has_side_effects(program)
                    || els.has_side_effects(program)
            }
            Expr::Multi(exprs) => exprs.iter().any(|e| e.has_side_effects(program)),
        }
    }

    /// A place expression that can appear on the left of an assignment.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            Expr::Local(_) | Expr::Param { .. } | Expr::Field { .. } | Expr::ArrayRef { .. }
        )
    }

    pub fn bool_lit(value: bool) -> Expr {
        Expr::Literal(Literal::Bool(value))
    }

    pub fn int_lit(value: i32) -> Expr {
        Expr::Literal(Literal::Int(value))
    }

    pub fn null_lit() -> Expr {
        Expr::Literal(Literal::Null)
    }
}
