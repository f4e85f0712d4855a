//! Lowering from the resolved frontend tree into IR method bodies.
//!
//! Runs after the builder has declared every type and member. Each unit is
//! lowered independently; a unit that produced diagnostics during building
//! is skipped wholesale. Native method bodies are resolved last, once every
//! factory method exists.

mod body;
mod ctor;
mod native;

pub(crate) use body::LowerCtx;

use tracing::debug;

use crate::diag::DiagnosticSink;
use crate::error::{CoreError, ErrorContext};
use crate::front::{ResolvedProgram, ResolvedUnit, TypeNode};
use crate::ir::{BinOp, CrossRefTable, Expr, MethodBody, NodeRef, Program, Stmt, TypeRef};

/// Lower every method body and field initializer in the program.
pub fn lower(
    program: &mut Program,
    xref: &mut CrossRefTable,
    resolved: &ResolvedProgram,
    sink: &mut DiagnosticSink,
) -> Result<(), CoreError> {
    for unit in &resolved.units {
        if sink.unit_failed(&unit.file) {
            continue;
        }
        lower_unit(program, xref, unit, sink)?;
    }
    native::resolve_native_refs(program, xref, resolved, sink)?;
    debug!("lowered method bodies");
    Ok(())
}

fn lower_unit(
    program: &mut Program,
    xref: &mut CrossRefTable,
    unit: &ResolvedUnit,
    sink: &mut DiagnosticSink,
) -> Result<(), CoreError> {
    for ty_node in &unit.types {
        let Some(NodeRef::Type(ty)) = xref.get(ty_node.symbol) else {
            continue;
        };
        lower_initializers(program, xref, unit, ty_node, sink)
            .in_node(|| format!("type {}", ty_node.name))?;
        for node in &ty_node.methods {
            let Some(NodeRef::Method(method)) = xref.get(node.symbol) else {
                continue;
            };
            let mut ctx = LowerCtx {
                program,
                xref,
                sink,
                file: &unit.file,
                enclosing: ty,
                enclosing_node: ty_node,
                method,
                new_locals: Vec::new(),
            };
            let result = if node.is_ctor {
                ctor::lower_ctor(&mut ctx, node)
            } else {
                body::lower_method(&mut ctx, node)
            };
            result.in_node(|| format!("method {}.{}", ty_node.name, node.name))?;
        }
        if !program.types[ty].is_interface() {
            ctor::synthesize_factories(program, ty);
        }
    }
    Ok(())
}

/// Move field initializers into `$clinit` (statics) and `$init`
/// (instance fields). Compile-time constants are substituted at every use
/// instead and get no initializer statement.
fn lower_initializers(
    program: &mut Program,
    xref: &mut CrossRefTable,
    unit: &ResolvedUnit,
    ty_node: &TypeNode,
    sink: &mut DiagnosticSink,
) -> Result<(), CoreError> {
    let Some(NodeRef::Type(ty)) = xref.get(ty_node.symbol) else {
        return Ok(());
    };
    for field_node in &ty_node.fields {
        let Some(NodeRef::Field(field)) = xref.get(field_node.symbol) else {
            continue;
        };
        let Some(init) = &field_node.initializer else {
            continue;
        };
        if program.fields[field].is_compile_time_constant() {
            continue;
        }
        let is_static = program.fields[field].is_static;
        let target = if is_static {
            program.clinit_of(ty)
        } else {
            program.init_of(ty)
        };
        let mut ctx = LowerCtx {
            program,
            xref,
            sink,
            file: &unit.file,
            enclosing: ty,
            enclosing_node: ty_node,
            method: target,
            new_locals: Vec::new(),
        };
        let value = ctx.lower_expr(init)?;
        let new_locals = std::mem::take(&mut ctx.new_locals);
        let field_ty = program.fields[field].ty;
        let instance = if is_static {
            None
        } else {
            Some(Box::new(Expr::This { ty }))
        };
        let assign = Stmt::Expr(Expr::Binary {
            op: BinOp::Assign,
            ty: field_ty,
            lhs: Box::new(Expr::Field { field, instance }),
            rhs: Box::new(value),
        });
        let body = match &mut program.methods[target].body {
            MethodBody::Stmts(body) => body,
            _ => unreachable!("initializer methods always have statement bodies"),
        };
        body.locals.extend(new_locals);
        body.block.stmts.push(assign);
    }
    Ok(())
}

/// Resolve an array type with `dims` dimensions over `elem`.
pub(crate) fn array_type(program: &mut Program, elem: TypeRef, dims: usize) -> TypeRef {
    let mut ty = elem;
    for _ in 0..dims {
        ty = TypeRef::Ref(program.intern_array(ty));
    }
    ty
}
