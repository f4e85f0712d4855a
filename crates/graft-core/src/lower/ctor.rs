//! Constructor lowering and instantiation factories.
//!
//! A frontend constructor becomes an instance method that returns its
//! receiver. The lowered body always runs in the same order: trigger the
//! static initializer, delegate if the source delegated, store the capture
//! parameters, run the instance initializer, then the user statements, and
//! finally return `this`.

use crate::error::CoreError;
use crate::front::{DelegateKind, FrontExprKind, FrontStmt, FrontStmtKind, MethodNode};
use crate::ir::{
    BinOp, Block, Body, Expr, Method, MethodBody, Param, Program, Stmt, TypeId, TypeRef,
};
use crate::{ice, ir::NodeRef};

use super::body::LowerCtx;

pub(crate) fn lower_ctor(ctx: &mut LowerCtx<'_>, node: &MethodNode) -> Result<(), CoreError> {
    let stmts: &[FrontStmt] = match &node.body {
        Some(FrontStmt {
            kind: FrontStmtKind::Block(stmts),
            ..
        }) => stmts,
        Some(other) => std::slice::from_ref(other),
        None => &[],
    };

    let delegate = stmts.first().and_then(|s| match &s.kind {
        FrontStmtKind::Expr(e) => match &e.kind {
            FrontExprKind::DelegateCall { kind, ctor, args } => Some((*kind, *ctor, args)),
            _ => None,
        },
        _ => None,
    });

    let enclosing = ctx.enclosing;
    let mut out = Vec::new();

    out.push(Stmt::Expr(Expr::Call {
        target: ctx.program.clinit_of(enclosing),
        instance: None,
        args: Vec::new(),
        static_dispatch: true,
        ty_override: None,
    }));

    if let Some((_, ctor_sym, args)) = delegate {
        let target = match ctx.xref.get(ctor_sym) {
            Some(NodeRef::Method(m)) => m,
            _ => ice!("constructor delegation target was never built"),
        };
        let mut lowered_args = Vec::with_capacity(args.len());
        for arg in args {
            lowered_args.push(ctx.lower_expr(arg)?);
        }
        let owner = ctx.program.methods[target].owner;
        ctx.append_capture_args(owner, &mut lowered_args)?;
        out.push(Stmt::Expr(Expr::Call {
            target,
            instance: Some(Box::new(Expr::This { ty: enclosing })),
            args: lowered_args,
            static_dispatch: true,
            ty_override: None,
        }));
    }

    // A this() delegation already stored captures and ran $init in the
    // delegate; doing it again would double-run initializers.
    let delegated_to_self = matches!(delegate, Some((DelegateKind::This, _, _)));
    if !delegated_to_self {
        store_captures(ctx, &mut out)?;
        out.push(Stmt::Expr(Expr::Call {
            target: ctx.program.init_of(enclosing),
            instance: Some(Box::new(Expr::This { ty: enclosing })),
            args: Vec::new(),
            static_dispatch: true,
            ty_override: None,
        }));
    }

    let user_stmts = if delegate.is_some() { &stmts[1..] } else { stmts };
    for stmt in user_stmts {
        out.push(ctx.lower_stmt(stmt)?);
    }

    out.push(Stmt::Return(Some(Expr::This { ty: enclosing })));

    ctx.program.methods[ctx.method].body = MethodBody::Stmts(Body {
        locals: std::mem::take(&mut ctx.new_locals),
        block: Block::new(out),
    });
    Ok(())
}

/// Assign every synthetic capture parameter into its capture field.
fn store_captures(ctx: &mut LowerCtx<'_>, out: &mut Vec<Stmt>) -> Result<(), CoreError> {
    for entry in ctx.program.types[ctx.enclosing].captures.clone() {
        let field = entry.field;
        let name = ctx.program.fields[field].name.clone();
        let method = &ctx.program.methods[ctx.method];
        let Some(idx) = method
            .params
            .iter()
            .position(|p| p.synthetic && p.name == name)
        else {
            ice!(
                "constructor of {} is missing the capture parameter {name}",
                ctx.program.types[ctx.enclosing].name
            );
        };
        let ty = ctx.program.fields[field].ty;
        out.push(Stmt::Expr(Expr::Binary {
            op: BinOp::Assign,
            ty,
            lhs: Box::new(Expr::Field {
                field,
                instance: Some(Box::new(Expr::This { ty: ctx.enclosing })),
            }),
            rhs: Box::new(Expr::Param {
                method: ctx.method,
                index: idx as u32,
            }),
        }));
    }
    Ok(())
}

/// Synthesize one static `$new` factory per constructor of an
/// instantiable class. Factories are what foreign-code references to
/// `@Type::new` resolve to; unused ones are pruned with everything else.
pub(crate) fn synthesize_factories(program: &mut Program, ty: TypeId) {
    if program.types[ty].is_abstract() || program.types[ty].is_interface() {
        return;
    }
    let ctors: Vec<_> = program.types[ty]
        .methods
        .iter()
        .copied()
        .filter(|&m| program.methods[m].is_ctor)
        .collect();
    for ctor in ctors {
        let params: Vec<Param> = program.methods[ctor].params.clone();
        let span = program.methods[ctor].span;
        let factory = program.methods.next_key();
        let args: Vec<Expr> = (0..params.len())
            .map(|i| Expr::Param {
                method: factory,
                index: i as u32,
            })
            .collect();
        let body = Body {
            locals: Vec::new(),
            block: Block::new(vec![Stmt::Return(Some(Expr::New { ctor, ty, args }))]),
        };
        let pushed = program.methods.push(Method {
            name: "$new".into(),
            owner: ty,
            params,
            return_ty: TypeRef::Ref(ty),
            is_static: true,
            is_abstract: false,
            is_final: true,
            is_private: false,
            is_native: false,
            is_ctor: false,
            synthetic: true,
            overrides: Vec::new(),
            thrown: Vec::new(),
            body: MethodBody::Stmts(body),
            span,
        });
        debug_assert_eq!(pushed, factory);
        program.types[ty].methods.push(pushed);
    }
}
