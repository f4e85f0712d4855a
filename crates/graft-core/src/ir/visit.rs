//! Free-function traversals over statement and expression trees.
//!
//! Passes that need to rewrite nodes in place detach the method body from
//! the arena first, then walk it with these helpers while keeping read
//! access to the rest of the program.

use super::expr::Expr;
use super::stmt::{Block, Stmt};

/// Visit every expression under `stmt`, children before parents.
pub fn walk_exprs_post(stmt: &mut Stmt, f: &mut impl FnMut(&mut Expr)) {
    walk_stmts_post(stmt, &mut |s| {
        for expr in stmt_exprs_mut(s) {
            walk_expr_post(expr, f);
        }
    });
}

/// Visit every expression under `expr`, children first, then `expr` itself.
pub fn walk_expr_post(expr: &mut Expr, f: &mut impl FnMut(&mut Expr)) {
    match expr {
        Expr::Literal(_) | Expr::Local(_) | Expr::Param { .. } | Expr::This { .. } => {}
        Expr::Binary { lhs, rhs, .. } => {
            walk_expr_post(lhs, f);
            walk_expr_post(rhs, f);
        }
        Expr::Prefix { arg, .. } | Expr::Postfix { arg, .. } => walk_expr_post(arg, f),
        Expr::Cast { expr: inner, .. } | Expr::InstanceOf { expr: inner, .. } => {
            walk_expr_post(inner, f)
        }
        Expr::Field { instance, .. } => {
            if let Some(instance) = instance {
                walk_expr_post(instance, f);
            }
        }
        Expr::ArrayRef { array, index, .. } => {
            walk_expr_post(array, f);
            walk_expr_post(index, f);
        }
        Expr::Call { instance, args, .. } => {
            if let Some(instance) = instance {
                walk_expr_post(instance, f);
            }
            for arg in args {
                walk_expr_post(arg, f);
            }
        }
        Expr::New { args, .. } => {
            for arg in args {
                walk_expr_post(arg, f);
            }
        }
        Expr::NewArray { dims, init, .. } => {
            for dim in dims.iter_mut().flatten() {
                walk_expr_post(dim, f);
            }
            for e in init.iter_mut().flatten() {
                walk_expr_post(e, f);
            }
        }
        Expr::Conditional {
            cond, then, els, ..
        } => {
            walk_expr_post(cond, f);
            walk_expr_post(then, f);
            walk_expr_post(els, f);
        }
        Expr::Multi(exprs) => {
            for e in exprs {
                walk_expr_post(e, f);
            }
        }
    }
    f(expr);
}

/// Visit every statement under `stmt`, children before parents.
pub fn walk_stmts_post(stmt: &mut Stmt, f: &mut impl FnMut(&mut Stmt)) {
    match stmt {
        Stmt::Block(block) => walk_block(block, f),
        Stmt::If { then, els, .. } => {
            walk_stmts_post(then, f);
            if let Some(els) = els {
                walk_stmts_post(els, f);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::Labeled { body, .. } => {
            walk_stmts_post(body, f)
        }
        Stmt::For { init, body, .. } => {
            for s in init.iter_mut() {
                walk_stmts_post(s, f);
            }
            walk_stmts_post(body, f);
        }
        Stmt::Switch { body, .. } => walk_block(body, f),
        Stmt::Try {
            block,
            catches,
            finally_block,
        } => {
            walk_block(block, f);
            for catch in catches {
                walk_block(&mut catch.block, f);
            }
            if let Some(finally_block) = finally_block {
                walk_block(finally_block, f);
            }
        }
        Stmt::Expr(_)
        | Stmt::Return(_)
        | Stmt::Throw(_)
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Case(_)
        | Stmt::Assert { .. }
        | Stmt::LocalDecl { .. }
        | Stmt::Empty => {}
    }
    f(stmt);
}

fn walk_block(block: &mut Block, f: &mut impl FnMut(&mut Stmt)) {
    for stmt in &mut block.stmts {
        walk_stmts_post(stmt, f);
    }
}

/// The expressions a statement holds directly (not through child
/// statements).
pub fn stmt_exprs_mut(stmt: &mut Stmt) -> Vec<&mut Expr> {
    match stmt {
        Stmt::Expr(e) | Stmt::Throw(e) => vec![e],
        Stmt::If { cond, .. }
        | Stmt::While { cond, .. }
        | Stmt::DoWhile { cond, .. }
        | Stmt::Switch { selector: cond, .. } => vec![cond],
        Stmt::For { cond, update, .. } => {
            let mut out: Vec<&mut Expr> = cond.iter_mut().collect();
            out.extend(update.iter_mut());
            out
        }
        Stmt::Case(e) | Stmt::Return(e) => e.iter_mut().collect(),
        Stmt::Assert { test, message } => {
            let mut out = vec![test];
            out.extend(message.iter_mut());
            out
        }
        Stmt::LocalDecl { init, .. } => init.iter_mut().collect(),
        Stmt::Block(_)
        | Stmt::Try { .. }
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Labeled { .. }
        | Stmt::Empty => Vec::new(),
    }
}

/// Read-only visit of every statement under `stmt`, parents before
/// children.
pub fn for_each_stmt(stmt: &Stmt, f: &mut impl FnMut(&Stmt)) {
    f(stmt);
    match stmt {
        Stmt::Block(block) | Stmt::Switch { body: block, .. } => {
            for s in &block.stmts {
                for_each_stmt(s, f);
            }
        }
        Stmt::If { then, els, .. } => {
            for_each_stmt(then, f);
            if let Some(els) = els {
                for_each_stmt(els, f);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::Labeled { body, .. } => {
            for_each_stmt(body, f)
        }
        Stmt::For { init, body, .. } => {
            for s in init {
                for_each_stmt(s, f);
            }
            for_each_stmt(body, f);
        }
        Stmt::Try {
            block,
            catches,
            finally_block,
        } => {
            for s in &block.stmts {
                for_each_stmt(s, f);
            }
            for catch in catches {
                for s in &catch.block.stmts {
                    for_each_stmt(s, f);
                }
            }
            for b in finally_block {
                for s in &b.stmts {
                    for_each_stmt(s, f);
                }
            }
        }
        _ => {}
    }
}

/// Read-only visit of every expression under `stmt`, including nested
/// subexpressions.
pub fn for_each_expr(stmt: &Stmt, f: &mut impl FnMut(&Expr)) {
    match stmt {
        Stmt::Block(block) => {
            for s in &block.stmts {
                for_each_expr(s, f);
            }
        }
        Stmt::Expr(e) | Stmt::Throw(e) => visit_expr(e, f),
        Stmt::If { cond, then, els } => {
            visit_expr(cond, f);
            for_each_expr(then, f);
            if let Some(els) = els {
                for_each_expr(els, f);
            }
        }
        Stmt::While { cond, body } => {
            visit_expr(cond, f);
            for_each_expr(body, f);
        }
        Stmt::DoWhile { body, cond } => {
            for_each_expr(body, f);
            visit_expr(cond, f);
        }
        Stmt::For {
            init,
            cond,
            update,
            body,
        } => {
            for s in init {
                for_each_expr(s, f);
            }
            if let Some(cond) = cond {
                visit_expr(cond, f);
            }
            for e in update {
                visit_expr(e, f);
            }
            for_each_expr(body, f);
        }
        Stmt::Switch { selector, body } => {
            visit_expr(selector, f);
            for s in &body.stmts {
                for_each_expr(s, f);
            }
        }
        Stmt::Case(e) | Stmt::Return(e) => {
            if let Some(e) = e {
                visit_expr(e, f);
            }
        }
        Stmt::Try {
            block,
            catches,
            finally_block,
        } => {
            for s in &block.stmts {
                for_each_expr(s, f);
            }
            for catch in catches {
                for s in &catch.block.stmts {
                    for_each_expr(s, f);
                }
            }
            for b in finally_block {
                for s in &b.stmts {
                    for_each_expr(s, f);
                }
            }
        }
        Stmt::Labeled { body, .. } => for_each_expr(body, f),
        Stmt::Assert { test, message } => {
            visit_expr(test, f);
            if let Some(message) = message {
                visit_expr(message, f);
            }
        }
        Stmt::LocalDecl { init, .. } => {
            if let Some(init) = init {
                visit_expr(init, f);
            }
        }
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty => {}
    }
}

/// Read-only post-order visit of an expression tree.
pub fn visit_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    match expr {
        Expr::Literal(_) | Expr::Local(_) | Expr::Param { .. } | Expr::This { .. } => {}
        Expr::Binary { lhs, rhs, .. } => {
            visit_expr(lhs, f);
            visit_expr(rhs, f);
        }
        Expr::Prefix { arg, .. } | Expr::Postfix { arg, .. } => visit_expr(arg, f),
        Expr::Cast { expr: inner, .. } | Expr::InstanceOf { expr: inner, .. } => {
            visit_expr(inner, f)
        }
        Expr::Field { instance, .. } => {
            if let Some(instance) = instance {
                visit_expr(instance, f);
            }
        }
        Expr::ArrayRef { array, index, .. } => {
            visit_expr(array, f);
            visit_expr(index, f);
        }
        Expr::Call { instance, args, .. } => {
            if let Some(instance) = instance {
                visit_expr(instance, f);
            }
            for arg in args {
                visit_expr(arg, f);
            }
        }
        Expr::New { args, .. } => {
            for arg in args {
                visit_expr(arg, f);
            }
        }
        Expr::NewArray { dims, init, .. } => {
            for dim in dims.iter().flatten() {
                visit_expr(dim, f);
            }
            for e in init.iter().flatten() {
                visit_expr(e, f);
            }
        }
        Expr::Conditional {
            cond, then, els, ..
        } => {
            visit_expr(cond, f);
            visit_expr(then, f);
            visit_expr(els, f);
        }
        Expr::Multi(exprs) => {
            for e in exprs {
                visit_expr(e, f);
            }
        }
    }
    f(expr);
}
