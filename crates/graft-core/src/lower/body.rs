//! Statement and expression lowering for one method at a time.

use std::path::Path;

use crate::diag::DiagnosticSink;
use crate::error::{CoreError, InternalError};
use crate::front::{
    FrontExpr, FrontExprKind, FrontStmt, FrontStmtKind, FrontType, MethodNode, SymbolId, TypeNode,
};
use crate::ir::{
    BinOp, Block, Body, Catch, CrossRefTable, Expr, Literal, LocalId, MethodBody, MethodId,
    NodeRef, PrimKind, Program, Stmt, TypeId, TypeRef, UnaryOp,
};

use crate::build::const_to_literal;

pub(crate) struct LowerCtx<'a> {
    pub program: &'a mut Program,
    pub xref: &'a mut CrossRefTable,
    pub sink: &'a mut DiagnosticSink,
    pub file: &'a Path,
    pub enclosing: TypeId,
    pub enclosing_node: &'a TypeNode,
    pub method: MethodId,
    /// Locals created while lowering this method, appended to its body.
    pub new_locals: Vec<LocalId>,
}

pub(crate) fn lower_method(ctx: &mut LowerCtx<'_>, node: &MethodNode) -> Result<(), CoreError> {
    let Some(front_body) = &node.body else {
        return Ok(());
    };
    let stmt = ctx.lower_stmt(front_body)?;
    let block = match stmt {
        Stmt::Block(block) => block,
        other => Block::new(vec![other]),
    };
    ctx.program.methods[ctx.method].body = MethodBody::Stmts(Body {
        locals: std::mem::take(&mut ctx.new_locals),
        block,
    });
    Ok(())
}

impl LowerCtx<'_> {
    pub(crate) fn lower_stmt(&mut self, stmt: &FrontStmt) -> Result<Stmt, CoreError> {
        Ok(match &stmt.kind {
            FrontStmtKind::Block(stmts) => Stmt::Block(self.lower_block(stmts)?),
            FrontStmtKind::Expr(e) => Stmt::Expr(self.lower_expr(e)?),
            FrontStmtKind::If { cond, then, els } => Stmt::If {
                cond: self.lower_expr(cond)?,
                then: Box::new(self.lower_stmt(then)?),
                els: match els {
                    Some(els) => Some(Box::new(self.lower_stmt(els)?)),
                    None => None,
                },
            },
            FrontStmtKind::While { cond, body } => Stmt::While {
                cond: self.lower_expr(cond)?,
                body: Box::new(self.lower_stmt(body)?),
            },
            FrontStmtKind::DoWhile { body, cond } => Stmt::DoWhile {
                body: Box::new(self.lower_stmt(body)?),
                cond: self.lower_expr(cond)?,
            },
            FrontStmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let init = init
                    .iter()
                    .map(|s| self.lower_stmt(s))
                    .collect::<Result<_, _>>()?;
                let cond = match cond {
                    Some(cond) => Some(self.lower_expr(cond)?),
                    None => None,
                };
                let update = update
                    .iter()
                    .map(|e| self.lower_expr(e))
                    .collect::<Result<_, _>>()?;
                Stmt::For {
                    init,
                    cond,
                    update,
                    body: Box::new(self.lower_stmt(body)?),
                }
            }
            FrontStmtKind::ForEach { .. } => self.lower_for_each(stmt)?,
            FrontStmtKind::Switch { selector, body } => Stmt::Switch {
                selector: self.lower_expr(selector)?,
                body: self.lower_block(body)?,
            },
            FrontStmtKind::Case(e) => Stmt::Case(match e {
                Some(e) => Some(self.lower_expr(e)?),
                None => None,
            }),
            FrontStmtKind::Try {
                block,
                catches,
                finally_block,
            } => {
                let block = self.lower_block(block)?;
                let mut lowered = Vec::new();
                for catch in catches {
                    let ty = self.resolve_ty(&FrontType::Named(catch.tys[0]));
                    let first_ty = match ty.and_then(TypeRef::as_ref_id) {
                        Some(id) => id,
                        None => {
                            self.sink.error(
                                self.file,
                                stmt.span,
                                "catch clause names an unresolvable type".to_string(),
                            );
                            continue;
                        }
                    };
                    // A multi-catch local is typed at the shared throwable
                    // root; a single catch keeps its precise type.
                    let local_ty = if catch.tys.len() == 1 {
                        TypeRef::Ref(first_ty)
                    } else {
                        TypeRef::Ref(self.program.well.throwable)
                    };
                    let local = self.program.create_local(catch.name.clone(), local_ty);
                    self.new_locals.push(local);
                    self.xref.insert(catch.symbol, NodeRef::Local(local))?;
                    let body = self.lower_block(&catch.block)?;
                    // Multi-catch clauses split into one handler per type,
                    // sharing the local and the handler body.
                    for (i, &sym) in catch.tys.iter().enumerate() {
                        let ty = if i == 0 {
                            first_ty
                        } else {
                            match self
                                .resolve_ty(&FrontType::Named(sym))
                                .and_then(TypeRef::as_ref_id)
                            {
                                Some(id) => id,
                                None => {
                                    self.sink.error(
                                        self.file,
                                        stmt.span,
                                        "catch clause names an unresolvable type".to_string(),
                                    );
                                    continue;
                                }
                            }
                        };
                        lowered.push(Catch {
                            local,
                            ty,
                            block: body.clone(),
                        });
                    }
                }
                let finally_block = match finally_block {
                    Some(stmts) => Some(self.lower_block(stmts)?),
                    None => None,
                };
                Stmt::Try {
                    block,
                    catches: lowered,
                    finally_block,
                }
            }
            FrontStmtKind::Return(e) => Stmt::Return(match e {
                Some(e) => Some(self.lower_expr(e)?),
                None => None,
            }),
            FrontStmtKind::Throw(e) => Stmt::Throw(self.lower_expr(e)?),
            FrontStmtKind::Break(label) => Stmt::Break(label.clone()),
            FrontStmtKind::Continue(label) => Stmt::Continue(label.clone()),
            FrontStmtKind::Labeled { label, body } => Stmt::Labeled {
                label: label.clone(),
                body: Box::new(self.lower_stmt(body)?),
            },
            FrontStmtKind::Assert { test, message } => Stmt::Assert {
                test: self.lower_expr(test)?,
                message: match message {
                    Some(m) => Some(self.lower_expr(m)?),
                    None => None,
                },
            },
            FrontStmtKind::LocalDecl {
                symbol,
                name,
                ty,
                init,
            } => {
                let ty = self.resolve_or_null(ty, stmt);
                let local = self.program.create_local(name.clone(), ty);
                self.new_locals.push(local);
                self.xref.insert(*symbol, NodeRef::Local(local))?;
                Stmt::LocalDecl {
                    local,
                    init: match init {
                        Some(init) => Some(self.lower_expr(init)?),
                        None => None,
                    },
                }
            }
            FrontStmtKind::Empty => Stmt::Empty,
        })
    }

    fn lower_block(&mut self, stmts: &[FrontStmt]) -> Result<Block, CoreError> {
        let stmts = stmts
            .iter()
            .map(|s| self.lower_stmt(s))
            .collect::<Result<_, _>>()?;
        Ok(Block::new(stmts))
    }

    /// Desugar a for-each into a plain `for`. Arrays index directly; other
    /// iterables go through the resolved iterator protocol.
    fn lower_for_each(&mut self, stmt: &FrontStmt) -> Result<Stmt, CoreError> {
        let FrontStmtKind::ForEach {
            elem_symbol,
            elem_name,
            elem_ty,
            iterable,
            protocol,
            elem_cast,
            body,
        } = &stmt.kind
        else {
            unreachable!()
        };
        let elem_ty = self.resolve_or_null(elem_ty, stmt);
        let iterable_expr = self.lower_expr(iterable)?;
        let iterable_ty = iterable_expr.ty(self.program);

        let elem_local = self.program.create_local(elem_name.clone(), elem_ty);
        self.new_locals.push(elem_local);
        self.xref.insert(*elem_symbol, NodeRef::Local(elem_local))?;

        let cast_ty = match elem_cast {
            Some(ty) => Some(self.resolve_or_null(ty, stmt)),
            None => None,
        };
        let with_cast = |e: Expr| match cast_ty {
            Some(ty) => Expr::Cast {
                ty,
                expr: Box::new(e),
            },
            None => e,
        };

        match protocol {
            None => {
                let int = TypeRef::Prim(PrimKind::Int);
                let arr = self.fresh_local("arr$", iterable_ty);
                let i = self.fresh_local("i$", int);
                let n = self.fresh_local("n$", int);
                let init = vec![
                    Stmt::LocalDecl {
                        local: arr,
                        init: Some(iterable_expr),
                    },
                    Stmt::LocalDecl {
                        local: i,
                        init: Some(Expr::int_lit(0)),
                    },
                    Stmt::LocalDecl {
                        local: n,
                        init: Some(Expr::Field {
                            field: self.program.well.array_length,
                            instance: Some(Box::new(Expr::Local(arr))),
                        }),
                    },
                ];
                let elem_init = with_cast(Expr::ArrayRef {
                    array: Box::new(Expr::Local(arr)),
                    index: Box::new(Expr::Local(i)),
                    elem_ty,
                });
                let body = Stmt::Block(Block::new(vec![
                    Stmt::LocalDecl {
                        local: elem_local,
                        init: Some(elem_init),
                    },
                    self.lower_stmt(body)?,
                ]));
                Ok(Stmt::For {
                    init,
                    cond: Some(Expr::Binary {
                        op: BinOp::Lt,
                        ty: TypeRef::Prim(PrimKind::Bool),
                        lhs: Box::new(Expr::Local(i)),
                        rhs: Box::new(Expr::Local(n)),
                    }),
                    update: vec![Expr::Prefix {
                        op: UnaryOp::Inc,
                        arg: Box::new(Expr::Local(i)),
                    }],
                    body: Box::new(body),
                })
            }
            Some(proto) => {
                let iterator = self.xref.expect_method(proto.iterator)?;
                let has_next = self.xref.expect_method(proto.has_next)?;
                let next = self.xref.expect_method(proto.next)?;
                let it_ty = self.program.methods[iterator].return_ty;
                let it = self.fresh_local("it$", it_ty);
                let init = vec![Stmt::LocalDecl {
                    local: it,
                    init: Some(Expr::Call {
                        target: iterator,
                        instance: Some(Box::new(iterable_expr)),
                        args: Vec::new(),
                        static_dispatch: false,
                        ty_override: None,
                    }),
                }];
                let elem_init = with_cast(Expr::Call {
                    target: next,
                    instance: Some(Box::new(Expr::Local(it))),
                    args: Vec::new(),
                    static_dispatch: false,
                    ty_override: None,
                });
                let body = Stmt::Block(Block::new(vec![
                    Stmt::LocalDecl {
                        local: elem_local,
                        init: Some(elem_init),
                    },
                    self.lower_stmt(body)?,
                ]));
                Ok(Stmt::For {
                    init,
                    cond: Some(Expr::Call {
                        target: has_next,
                        instance: Some(Box::new(Expr::Local(it))),
                        args: Vec::new(),
                        static_dispatch: false,
                        ty_override: None,
                    }),
                    update: Vec::new(),
                    body: Box::new(body),
                })
            }
        }
    }

    pub(crate) fn lower_expr(&mut self, expr: &FrontExpr) -> Result<Expr, CoreError> {
        // Prefer the frontend's folded value. Field references only
        // substitute when the field is a compile-time constant; otherwise
        // the reference must stay to preserve initializer-order effects.
        if let Some(folded) = &expr.folded {
            let substitutable = match &expr.kind {
                FrontExprKind::FieldRef { field, .. } => matches!(
                    self.xref.get(*field),
                    Some(NodeRef::Field(f)) if self.program.fields[f].is_compile_time_constant()
                ),
                _ => true,
            };
            if substitutable {
                return Ok(Expr::Literal(const_to_literal(folded)));
            }
        }

        Ok(match &expr.kind {
            FrontExprKind::Literal(v) => Expr::Literal(const_to_literal(v)),
            FrontExprKind::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                ty: self.resolve_front_expr_ty(expr),
                lhs: Box::new(self.lower_expr(lhs)?),
                rhs: Box::new(self.lower_expr(rhs)?),
            },
            FrontExprKind::Prefix { op, arg } => Expr::Prefix {
                op: *op,
                arg: Box::new(self.lower_expr(arg)?),
            },
            FrontExprKind::Postfix { op, arg } => Expr::Postfix {
                op: *op,
                arg: Box::new(self.lower_expr(arg)?),
            },
            FrontExprKind::Cast { ty, expr: inner } => Expr::Cast {
                ty: self.resolve_or_null(ty, expr),
                expr: Box::new(self.lower_expr(inner)?),
            },
            FrontExprKind::InstanceOf { ty, expr: inner } => {
                let inner = self.lower_expr(inner)?;
                match self.xref.get(*ty) {
                    Some(NodeRef::Type(id)) => Expr::InstanceOf {
                        ty: id,
                        expr: Box::new(inner),
                    },
                    _ => {
                        self.error(expr, "instanceof names an unresolvable type");
                        Expr::bool_lit(false)
                    }
                }
            }
            FrontExprKind::FieldRef { field, instance } => {
                let instance = match instance {
                    Some(instance) => Some(Box::new(self.lower_expr(instance)?)),
                    None => None,
                };
                match self.xref.get(*field) {
                    Some(NodeRef::Field(field)) => {
                        let decl = &self.program.fields[field];
                        let instance = if decl.is_static {
                            None
                        } else {
                            instance.or_else(|| {
                                Some(Box::new(Expr::This { ty: self.enclosing }))
                            })
                        };
                        Expr::Field { field, instance }
                    }
                    _ => {
                        self.error(expr, "reference to a field of an unresolvable type");
                        Expr::null_lit()
                    }
                }
            }
            FrontExprKind::ArrayRef { array, index } => Expr::ArrayRef {
                array: Box::new(self.lower_expr(array)?),
                index: Box::new(self.lower_expr(index)?),
                elem_ty: self.resolve_front_expr_ty(expr),
            },
            FrontExprKind::ArrayLength(array) => Expr::Field {
                field: self.program.well.array_length,
                instance: Some(Box::new(self.lower_expr(array)?)),
            },
            FrontExprKind::VarRef(sym) => self.lower_var(*sym)?,
            FrontExprKind::This => Expr::This { ty: self.enclosing },
            FrontExprKind::Outer { target } => {
                let target = self.xref.expect_type(*target)?;
                self.outer_value(target)?
            }
            FrontExprKind::Call {
                method,
                instance,
                args,
                is_super,
            } => {
                let target = match self.xref.get(*method) {
                    Some(NodeRef::Method(m)) => m,
                    _ => {
                        self.error(expr, "call to a method of an unresolvable type");
                        return Ok(Expr::null_lit());
                    }
                };
                let mut lowered_args = Vec::with_capacity(args.len());
                for arg in args {
                    lowered_args.push(self.lower_expr(arg)?);
                }
                let decl = &self.program.methods[target];
                let instance = if decl.is_static {
                    None
                } else {
                    match instance {
                        Some(instance) => Some(Box::new(self.lower_expr(instance)?)),
                        None => Some(Box::new(Expr::This { ty: self.enclosing })),
                    }
                };
                Expr::Call {
                    target,
                    instance,
                    args: lowered_args,
                    static_dispatch: *is_super || self.program.methods[target].is_static,
                    ty_override: None,
                }
            }
            FrontExprKind::DelegateCall { .. } => {
                return Err(InternalError::new(
                    "constructor delegation outside a constructor body",
                )
                .into());
            }
            FrontExprKind::New { ctor, args } => {
                let ctor = match self.xref.get(*ctor) {
                    Some(NodeRef::Method(m)) => m,
                    _ => {
                        self.error(expr, "instantiation of an unresolvable type");
                        return Ok(Expr::null_lit());
                    }
                };
                let ty = self.program.methods[ctor].owner;
                let mut lowered_args = Vec::with_capacity(args.len());
                for arg in args {
                    lowered_args.push(self.lower_expr(arg)?);
                }
                self.append_capture_args(ty, &mut lowered_args)?;
                Expr::New {
                    ctor,
                    ty,
                    args: lowered_args,
                }
            }
            FrontExprKind::NewArray {
                elem_ty,
                dims,
                init,
            } => {
                let elem = self.resolve_or_null(elem_ty, expr);
                let full = super::array_type(self.program, elem, dims.len().max(1));
                let arr_ty = full
                    .as_ref_id()
                    .expect("array_type always returns a reference");
                let mut lowered_dims = Vec::with_capacity(dims.len());
                for dim in dims {
                    lowered_dims.push(match dim {
                        Some(dim) => Some(self.lower_expr(dim)?),
                        None => None,
                    });
                }
                let init = match init {
                    Some(init) => Some(
                        init.iter()
                            .map(|e| self.lower_expr(e))
                            .collect::<Result<_, _>>()?,
                    ),
                    None => None,
                };
                Expr::NewArray {
                    elem,
                    arr_ty,
                    dims: lowered_dims,
                    init,
                }
            }
            FrontExprKind::Conditional { cond, then, els } => Expr::Conditional {
                ty: self.resolve_front_expr_ty(expr),
                cond: Box::new(self.lower_expr(cond)?),
                then: Box::new(self.lower_expr(then)?),
                els: Box::new(self.lower_expr(els)?),
            },
            FrontExprKind::Box { prim, expr: inner } => {
                let helper = self
                    .program
                    .index_method(&format!("Boxing.box_{}", prim.name()))?;
                let ty_override = Some(self.resolve_front_expr_ty(expr));
                Expr::Call {
                    target: helper,
                    instance: None,
                    args: vec![self.lower_expr(inner)?],
                    static_dispatch: true,
                    ty_override,
                }
            }
            FrontExprKind::Unbox { prim, expr: inner } => {
                let helper = self
                    .program
                    .index_method(&format!("Boxing.unbox_{}", prim.name()))?;
                Expr::Call {
                    target: helper,
                    instance: None,
                    args: vec![self.lower_expr(inner)?],
                    static_dispatch: true,
                    ty_override: None,
                }
            }
            FrontExprKind::ClassLiteral(ty) => {
                let ty = self.resolve_or_null(ty, expr);
                Expr::Literal(Literal::Class(ty))
            }
        })
    }

    /// Resolve a variable reference: captured outer locals become reads of
    /// their capture field (or the matching synthetic constructor
    /// parameter), everything else resolves through the cross-ref table.
    fn lower_var(&mut self, sym: SymbolId) -> Result<Expr, CoreError> {
        let capture = self.program.types[self.enclosing]
            .captures
            .iter()
            .find(|c| c.local_symbol == Some(sym))
            .map(|c| c.field);
        if let Some(field) = capture {
            let method = &self.program.methods[self.method];
            if method.is_ctor {
                let name = &self.program.fields[field].name;
                if let Some(idx) = method
                    .params
                    .iter()
                    .position(|p| p.synthetic && p.name == *name)
                {
                    return Ok(Expr::Param {
                        method: self.method,
                        index: idx as u32,
                    });
                }
            }
            return Ok(Expr::Field {
                field,
                instance: Some(Box::new(Expr::This { ty: self.enclosing })),
            });
        }
        match self.xref.expect_var(sym)? {
            NodeRef::Local(local) => Ok(Expr::Local(local)),
            NodeRef::Param(method, index) => Ok(Expr::Param { method, index }),
            _ => unreachable!(),
        }
    }

    /// Build the value of an enclosing instance by chaining capture-field
    /// reads from `this` outwards until `target` is reached.
    pub(crate) fn outer_value(&mut self, target: TypeId) -> Result<Expr, CoreError> {
        let mut value = Expr::This {
            ty: self.enclosing,
        };
        let mut cur = self.enclosing;
        loop {
            if self.program.is_same_or_supertype(target, cur) {
                return Ok(value);
            }
            let Some(field) = self.program.types[cur]
                .captures
                .iter()
                .find(|c| c.local_symbol.is_none())
                .map(|c| c.field)
            else {
                return Err(InternalError::new(format!(
                    "no enclosing instance chain from {} to {}",
                    self.program.types[cur].name, self.program.types[target].name
                ))
                .into());
            };
            // Inside a constructor the enclosing instance arrives as a
            // synthetic parameter; the field is not assigned yet.
            if cur == self.enclosing {
                let method = &self.program.methods[self.method];
                if method.is_ctor {
                    let name = &self.program.fields[field].name;
                    if let Some(idx) = method
                        .params
                        .iter()
                        .position(|p| p.synthetic && p.name == *name)
                    {
                        value = Expr::Param {
                            method: self.method,
                            index: idx as u32,
                        };
                        cur = match self.program.fields[field].ty.as_ref_id() {
                            Some(id) => id,
                            None => unreachable!("capture fields hold references"),
                        };
                        continue;
                    }
                }
            }
            value = Expr::Field {
                field,
                instance: Some(Box::new(value)),
            };
            cur = match self.program.fields[field].ty.as_ref_id() {
                Some(id) => id,
                None => unreachable!("capture fields hold references"),
            };
        }
    }

    /// Append the synthetic capture arguments a constructor of `ty`
    /// expects, evaluated in the current scope.
    pub(crate) fn append_capture_args(
        &mut self,
        ty: TypeId,
        args: &mut Vec<Expr>,
    ) -> Result<(), CoreError> {
        for entry in self.program.types[ty].captures.clone() {
            let value = match entry.local_symbol {
                Some(sym) => self.lower_var(sym)?,
                None => {
                    let outer = self.program.fields[entry.field]
                        .ty
                        .as_ref_id()
                        .expect("capture fields hold references");
                    self.outer_value(outer)?
                }
            };
            args.push(value);
        }
        Ok(())
    }

    pub(crate) fn fresh_local(&mut self, hint: &str, ty: TypeRef) -> LocalId {
        let name = format!("{hint}{}", self.new_locals.len());
        let local = self.program.create_local(name, ty);
        self.new_locals.push(local);
        local
    }

    fn resolve_ty(&mut self, ty: &FrontType) -> Option<TypeRef> {
        resolve_front_ty(self.program, self.xref, ty)
    }

    /// Resolve a type, recovering with the bottom reference type after
    /// recording a diagnostic. The unit is already failed at that point.
    fn resolve_or_null(&mut self, ty: &FrontType, at: &dyn Spanned) -> TypeRef {
        match resolve_front_ty(self.program, self.xref, ty) {
            Some(ty) => ty,
            None => {
                self.sink
                    .error(self.file, at.span(), "reference to an unresolvable type");
                TypeRef::Null
            }
        }
    }

    fn resolve_front_expr_ty(&mut self, expr: &FrontExpr) -> TypeRef {
        self.resolve_or_null(&expr.ty.clone(), expr)
    }

    fn error(&mut self, at: &dyn Spanned, message: &str) {
        self.sink.error(self.file, at.span(), message.to_string());
    }
}

pub(crate) fn resolve_front_ty(
    program: &mut Program,
    xref: &CrossRefTable,
    ty: &FrontType,
) -> Option<TypeRef> {
    match ty {
        FrontType::Void => Some(TypeRef::Void),
        FrontType::Prim(kind) => Some(TypeRef::Prim(*kind)),
        FrontType::Null => Some(TypeRef::Null),
        FrontType::Named(symbol) => match xref.get(*symbol) {
            Some(NodeRef::Type(id)) => Some(TypeRef::Ref(id)),
            _ => None,
        },
        FrontType::Array(elem) => {
            let elem = resolve_front_ty(program, xref, elem)?;
            Some(TypeRef::Ref(program.intern_array(elem)))
        }
    }
}

trait Spanned {
    fn span(&self) -> crate::diag::SourceSpan;
}

impl Spanned for FrontExpr {
    fn span(&self) -> crate::diag::SourceSpan {
        self.span
    }
}

impl Spanned for FrontStmt {
    fn span(&self) -> crate::diag::SourceSpan {
        self.span
    }
}
