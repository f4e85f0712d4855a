//! Break compound assignments and increment/decrement operators into plain
//! assignments.
//!
//! `x op= y` becomes `x = x op y`, `++x` becomes `x = x + 1`, and a postfix
//! `x++` whose value is used becomes `(t = x, x = x + 1, t)`. When the
//! assigned place has effectful subexpressions they are hoisted into temps
//! first so the place is evaluated exactly once:
//!
//! ```text
//! a()[i()] += v   =>   (t0 = a(), t1 = i(), t0[t1] = t0[t1] + v)
//! ```
//!
//! Temps are pooled per type and reused across statements of the same
//! method.

use std::collections::HashMap;
use std::mem;

use crate::error::CoreError;
use crate::ir::visit;
use crate::ir::{
    BinOp, Expr, Literal, LocalId, MethodBody, MethodId, PrimKind, Program, Stmt, TypeRef, UnaryOp,
};
use crate::pipeline::{Pass, PassResult};

/// Decides which modifying operations get broken up. The default breaks
/// everything; a backend that can emit some compound forms directly can
/// narrow this.
pub trait BreakupPolicy {
    fn break_compound(&self, op: BinOp, ty: TypeRef) -> bool;
    fn break_crement(&self, op: UnaryOp, ty: TypeRef) -> bool;
}

#[derive(Default)]
pub struct BreakAll;

impl BreakupPolicy for BreakAll {
    fn break_compound(&self, _op: BinOp, _ty: TypeRef) -> bool {
        true
    }

    fn break_crement(&self, _op: UnaryOp, _ty: TypeRef) -> bool {
        true
    }
}

pub struct CompoundAssignBreaker<P: BreakupPolicy = BreakAll> {
    policy: P,
}

impl Default for CompoundAssignBreaker<BreakAll> {
    fn default() -> Self {
        Self { policy: BreakAll }
    }
}

impl<P: BreakupPolicy> CompoundAssignBreaker<P> {
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }
}

impl<P: BreakupPolicy> Pass for CompoundAssignBreaker<P> {
    fn name(&self) -> &'static str {
        "compound-assign"
    }

    fn apply(&mut self, mut program: Program) -> Result<PassResult, CoreError> {
        let methods: Vec<MethodId> = program.methods.keys().collect();
        let mut changed = false;
        for method in methods {
            let mut body =
                match mem::replace(&mut program.methods[method].body, MethodBody::Absent) {
                    MethodBody::Stmts(body) => body,
                    other => {
                        program.methods[method].body = other;
                        continue;
                    }
                };
            let mut breaker = Breaker {
                program: &mut program,
                policy: &self.policy,
                temps: TempTracker::default(),
                new_locals: Vec::new(),
                changed: false,
            };
            for stmt in &mut body.block.stmts {
                breaker.visit_stmt(stmt);
            }
            let Breaker {
                new_locals,
                changed: method_changed,
                ..
            } = breaker;
            body.locals.extend(new_locals);
            changed |= method_changed;
            program.methods[method].body = MethodBody::Stmts(body);
        }
        Ok(PassResult { program, changed })
    }
}

/// Per-type pools of temp locals. A temp is released back to its pool at
/// the end of the statement that allocated it; comma-sequence evaluation
/// never outlives a statement.
#[derive(Default)]
struct TempTracker {
    pools: HashMap<TypeRef, Pool>,
}

#[derive(Default)]
struct Pool {
    locals: Vec<LocalId>,
    next: usize,
}

impl TempTracker {
    fn release_all(&mut self) {
        for pool in self.pools.values_mut() {
            pool.next = 0;
        }
    }

    fn alloc(&mut self, program: &mut Program, ty: TypeRef, new_locals: &mut Vec<LocalId>) -> LocalId {
        let pool = self.pools.entry(ty).or_default();
        let local = if pool.next < pool.locals.len() {
            pool.locals[pool.next]
        } else {
            let local = program.create_local(format!("$t{}", new_locals.len()), ty);
            pool.locals.push(local);
            new_locals.push(local);
            local
        };
        pool.next += 1;
        local
    }
}

struct Breaker<'a, P: BreakupPolicy> {
    program: &'a mut Program,
    policy: &'a P,
    temps: TempTracker,
    new_locals: Vec<LocalId>,
    changed: bool,
}

impl<P: BreakupPolicy> Breaker<'_, P> {
    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        visit::walk_stmts_post(stmt, &mut |s| {
            // In statement position the value of x++ is discarded, so it
            // rewrites like the prefix form and needs no temp.
            if let Stmt::Expr(e) = s {
                demote_statement_postfix(e);
            }
            if let Stmt::For { update, .. } = s {
                for e in update.iter_mut() {
                    demote_statement_postfix(e);
                }
            }
            for expr in visit::stmt_exprs_mut(s) {
                rewrite_expr(self, expr);
            }
        });
        self.temps.release_all();
    }

    fn alloc_temp(&mut self, ty: TypeRef) -> LocalId {
        self.temps
            .alloc(self.program, ty, &mut self.new_locals)
    }
}

fn demote_statement_postfix(expr: &mut Expr) {
    if let Expr::Postfix { op, arg } = expr {
        let op = *op;
        let arg = mem::replace(arg, Box::new(Expr::null_lit()));
        *expr = Expr::Prefix { op, arg };
    }
}

fn rewrite_expr<P: BreakupPolicy>(breaker: &mut Breaker<'_, P>, expr: &mut Expr) {
    visit::walk_expr_post(expr, &mut |e| rewrite_one(breaker, e));
}

fn rewrite_one<P: BreakupPolicy>(breaker: &mut Breaker<'_, P>, expr: &mut Expr) {
    match expr {
        Expr::Binary { op, .. } if op.non_assign_of().is_some() => {
            let ty = match expr {
                Expr::Binary { ty, .. } => *ty,
                _ => unreachable!(),
            };
            let op = match expr {
                Expr::Binary { op, .. } => *op,
                _ => unreachable!(),
            };
            if !breaker.policy.break_compound(op, ty) {
                return;
            }
            let Expr::Binary { lhs, rhs, .. } =
                mem::replace(expr, Expr::null_lit())
            else {
                unreachable!()
            };
            *expr = expand_compound(breaker, op, ty, *lhs, *rhs);
            breaker.changed = true;
        }
        Expr::Prefix { op, .. } if op.is_modifying() => {
            let op = match expr {
                Expr::Prefix { op, .. } => *op,
                _ => unreachable!(),
            };
            let ty = match expr {
                Expr::Prefix { arg, .. } => arg.ty(breaker.program),
                _ => unreachable!(),
            };
            if !breaker.policy.break_crement(op, ty) {
                return;
            }
            let Expr::Prefix { arg, .. } = mem::replace(expr, Expr::null_lit()) else {
                unreachable!()
            };
            let bin = crement_op(op);
            *expr = expand_compound(breaker, assign_of(bin), ty, *arg, one_for(ty));
            breaker.changed = true;
        }
        Expr::Postfix { op, .. } if op.is_modifying() => {
            let op = match expr {
                Expr::Postfix { op, .. } => *op,
                _ => unreachable!(),
            };
            let ty = match expr {
                Expr::Postfix { arg, .. } => arg.ty(breaker.program),
                _ => unreachable!(),
            };
            if !breaker.policy.break_crement(op, ty) {
                return;
            }
            let Expr::Postfix { arg, .. } = mem::replace(expr, Expr::null_lit()) else {
                unreachable!()
            };
            // (t = x, x = x + 1, t), hoisting the place first so its
            // subexpressions run exactly once.
            let mut parts = Vec::new();
            let place = hoist_place(breaker, *arg, &mut parts);
            let temp = breaker.alloc_temp(ty);
            parts.push(Expr::Binary {
                op: BinOp::Assign,
                ty,
                lhs: Box::new(Expr::Local(temp)),
                rhs: Box::new(place.clone()),
            });
            parts.push(plain_compound(crement_op(op), ty, place, one_for(ty)));
            parts.push(Expr::Local(temp));
            *expr = Expr::Multi(parts);
            breaker.changed = true;
        }
        _ => {}
    }
}

/// Expand `place op= value` into `place = place op value`, hoisting
/// effectful or expensive place subexpressions into temps.
fn expand_compound<P: BreakupPolicy>(
    breaker: &mut Breaker<'_, P>,
    op: BinOp,
    ty: TypeRef,
    place: Expr,
    value: Expr,
) -> Expr {
    let non_assign = op
        .non_assign_of()
        .expect("expand_compound only sees compound operators");
    let mut prelude = Vec::new();
    let place = hoist_place(breaker, place, &mut prelude);
    let assign = plain_compound(non_assign, ty, place, value);
    if prelude.is_empty() {
        assign
    } else {
        prelude.push(assign);
        Expr::Multi(prelude)
    }
}

/// `place = place op value` for an already-hoisted place.
fn plain_compound(op: BinOp, ty: TypeRef, place: Expr, value: Expr) -> Expr {
    Expr::Binary {
        op: BinOp::Assign,
        ty,
        lhs: Box::new(place.clone()),
        rhs: Box::new(Expr::Binary {
            op,
            ty,
            lhs: Box::new(place),
            rhs: Box::new(value),
        }),
    }
}

/// Make a place safe to evaluate twice by moving anything that is not
/// trivially re-readable into a temp.
fn hoist_place<P: BreakupPolicy>(
    breaker: &mut Breaker<'_, P>,
    place: Expr,
    prelude: &mut Vec<Expr>,
) -> Expr {
    match place {
        Expr::Local(_) | Expr::Param { .. } => place,
        Expr::Field { field, instance } => {
            let instance = instance.map(|instance| {
                Box::new(hoist_operand(breaker, *instance, prelude))
            });
            Expr::Field { field, instance }
        }
        Expr::ArrayRef {
            array,
            index,
            elem_ty,
        } => {
            let array = hoist_operand(breaker, *array, prelude);
            let index = hoist_operand(breaker, *index, prelude);
            Expr::ArrayRef {
                array: Box::new(array),
                index: Box::new(index),
                elem_ty,
            }
        }
        other => other,
    }
}

fn hoist_operand<P: BreakupPolicy>(
    breaker: &mut Breaker<'_, P>,
    operand: Expr,
    prelude: &mut Vec<Expr>,
) -> Expr {
    if is_cheap(&operand) {
        return operand;
    }
    let ty = operand.ty(breaker.program);
    let temp = breaker.alloc_temp(ty);
    prelude.push(Expr::Binary {
        op: BinOp::Assign,
        ty,
        lhs: Box::new(Expr::Local(temp)),
        rhs: Box::new(operand),
    });
    Expr::Local(temp)
}

/// Safe to re-evaluate without a temp.
fn is_cheap(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Local(_) | Expr::Param { .. } | Expr::This { .. } | Expr::Literal(_)
    )
}

fn crement_op(op: UnaryOp) -> BinOp {
    match op {
        UnaryOp::Inc => BinOp::Add,
        UnaryOp::Dec => BinOp::Sub,
        _ => unreachable!("only inc/dec are modifying"),
    }
}

fn assign_of(op: BinOp) -> BinOp {
    match op {
        BinOp::Add => BinOp::AddAssign,
        BinOp::Sub => BinOp::SubAssign,
        _ => unreachable!(),
    }
}

/// The literal `1` at the width of the operand type.
fn one_for(ty: TypeRef) -> Expr {
    match ty.as_prim() {
        Some(PrimKind::Long) => Expr::Literal(Literal::Long(1)),
        Some(PrimKind::Float) => Expr::Literal(Literal::Float(1.0)),
        Some(PrimKind::Double) => Expr::Literal(Literal::Double(1.0)),
        _ => Expr::int_lit(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testutil::{add_class, add_method, body_of};
    use crate::ir::Block;

    fn int_local(program: &mut Program, name: &str) -> LocalId {
        program.create_local(name, TypeRef::Prim(PrimKind::Int))
    }

    /// `x += 2` becomes `x = x + 2`.
    #[test]
    fn compound_becomes_plain_assign() {
        let mut program = Program::new();
        let owner = add_class(&mut program, "C");
        let x = int_local(&mut program, "x");
        let body = Block::new(vec![Stmt::Expr(Expr::Binary {
            op: BinOp::AddAssign,
            ty: TypeRef::Prim(PrimKind::Int),
            lhs: Box::new(Expr::Local(x)),
            rhs: Box::new(Expr::int_lit(2)),
        })]);
        let method = add_method(&mut program, owner, "m", true, body);

        let result = CompoundAssignBreaker::default().apply(program).unwrap();
        assert!(result.changed);
        let program = result.program;
        let Stmt::Expr(Expr::Binary { op, rhs, .. }) = &body_of(&program, method).stmts[0]
        else {
            panic!("expected assignment");
        };
        assert_eq!(*op, BinOp::Assign);
        assert!(matches!(**rhs, Expr::Binary { op: BinOp::Add, .. }));
    }

    /// A postfix increment whose value is used saves the old value in a
    /// temp: `(t = x, x = x + 1, t)`.
    #[test]
    fn value_postfix_keeps_old_value() {
        let mut program = Program::new();
        let owner = add_class(&mut program, "C");
        let x = int_local(&mut program, "x");
        let y = int_local(&mut program, "y");
        let body = Block::new(vec![Stmt::Expr(Expr::Binary {
            op: BinOp::Assign,
            ty: TypeRef::Prim(PrimKind::Int),
            lhs: Box::new(Expr::Local(y)),
            rhs: Box::new(Expr::Postfix {
                op: UnaryOp::Inc,
                arg: Box::new(Expr::Local(x)),
            }),
        })]);
        let method = add_method(&mut program, owner, "m", true, body);

        let program = CompoundAssignBreaker::default()
            .apply(program)
            .unwrap()
            .program;
        let Stmt::Expr(Expr::Binary { rhs, .. }) = &body_of(&program, method).stmts[0] else {
            panic!();
        };
        let Expr::Multi(parts) = rhs.as_ref() else {
            panic!("expected a comma sequence");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[0], Expr::Binary { op: BinOp::Assign, .. }));
        assert!(matches!(parts[1], Expr::Binary { op: BinOp::Assign, .. }));
        assert!(matches!(parts[2], Expr::Local(_)));
    }

    /// A postfix increment in statement position needs no temp.
    #[test]
    fn statement_postfix_needs_no_temp() {
        let mut program = Program::new();
        let owner = add_class(&mut program, "C");
        let x = int_local(&mut program, "x");
        let body = Block::new(vec![Stmt::Expr(Expr::Postfix {
            op: UnaryOp::Inc,
            arg: Box::new(Expr::Local(x)),
        })]);
        let method = add_method(&mut program, owner, "m", true, body);

        let program = CompoundAssignBreaker::default()
            .apply(program)
            .unwrap()
            .program;
        let Stmt::Expr(Expr::Binary { op, .. }) = &body_of(&program, method).stmts[0] else {
            panic!("expected a plain assignment");
        };
        assert_eq!(*op, BinOp::Assign);
    }

    /// An effectful place is evaluated once: the base call is hoisted into
    /// a temp before the read-modify-write.
    #[test]
    fn effectful_place_hoisted_once() {
        let mut program = Program::new();
        let owner = add_class(&mut program, "C");
        let arr_ty = program.intern_array(TypeRef::Prim(PrimKind::Int));
        let supplier = add_method(&mut program, owner, "supply", true, Block::default());
        program.methods[supplier].return_ty = TypeRef::Ref(arr_ty);
        let body = Block::new(vec![Stmt::Expr(Expr::Binary {
            op: BinOp::AddAssign,
            ty: TypeRef::Prim(PrimKind::Int),
            lhs: Box::new(Expr::ArrayRef {
                array: Box::new(Expr::Call {
                    target: supplier,
                    instance: None,
                    args: Vec::new(),
                    static_dispatch: true,
                    ty_override: None,
                }),
                index: Box::new(Expr::int_lit(0)),
                elem_ty: TypeRef::Prim(PrimKind::Int),
            }),
            rhs: Box::new(Expr::int_lit(5)),
        })]);
        let method = add_method(&mut program, owner, "m", true, body);

        let program = CompoundAssignBreaker::default()
            .apply(program)
            .unwrap()
            .program;
        let Stmt::Expr(Expr::Multi(parts)) = &body_of(&program, method).stmts[0] else {
            panic!("expected a comma sequence with a hoisted base");
        };
        assert_eq!(parts.len(), 2);
        // Hoist, then the assignment reads the temp on both sides.
        let Expr::Binary { op: BinOp::Assign, rhs, .. } = &parts[0] else {
            panic!();
        };
        assert!(matches!(**rhs, Expr::Call { .. }));
        let Expr::Binary { lhs, .. } = &parts[1] else { panic!() };
        assert!(matches!(**lhs, Expr::ArrayRef { .. }));
    }

    /// Long-typed increments bump by a long literal so no implicit
    /// widening is introduced.
    #[test]
    fn long_increment_uses_long_one() {
        let mut program = Program::new();
        let owner = add_class(&mut program, "C");
        let x = program.create_local("x", TypeRef::Prim(PrimKind::Long));
        let body = Block::new(vec![Stmt::Expr(Expr::Prefix {
            op: UnaryOp::Inc,
            arg: Box::new(Expr::Local(x)),
        })]);
        let method = add_method(&mut program, owner, "m", true, body);

        let program = CompoundAssignBreaker::default()
            .apply(program)
            .unwrap()
            .program;
        let Stmt::Expr(Expr::Binary { rhs, .. }) = &body_of(&program, method).stmts[0] else {
            panic!();
        };
        let Expr::Binary { rhs: one, .. } = rhs.as_ref() else {
            panic!();
        };
        assert!(matches!(**one, Expr::Literal(Literal::Long(1))));
    }
}
