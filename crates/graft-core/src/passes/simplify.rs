//! Constant folding, branch pruning, and dead-statement removal.
//!
//! Runs each method body to a local fixed point: expression rewrites expose
//! statement rewrites (a folded condition makes a branch dead) and statement
//! rewrites expose expression rewrites, so the body is rewalked until a full
//! sweep changes nothing.

use std::mem;

use tracing::trace;

use crate::error::CoreError;
use crate::ir::visit;
use crate::ir::{BinOp, Block, Expr, Literal, MethodBody, MethodId, PrimKind, Program, Stmt,
    TypeId, TypeRef, UnaryOp};
use crate::pipeline::{Pass, PassResult};

#[derive(Default)]
pub struct Simplify;

impl Pass for Simplify {
    fn name(&self) -> &'static str {
        "simplify"
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
            loop {
                let mut sweep = false;
                for stmt in &mut body.block.stmts {
                    visit::walk_stmts_post(stmt, &mut |s| {
                        for expr in visit::stmt_exprs_mut(s) {
                            visit::walk_expr_post(expr, &mut |e| {
                                sweep |= fold_expr(&program, e);
                            });
                        }
                        sweep |= simplify_stmt(&program, s);
                    });
                }
                sweep |= clean_block(&program, &mut body.block);
                if !sweep {
                    break;
                }
                changed = true;
            }
            program.methods[method].body = MethodBody::Stmts(body);
        }
        if changed {
            trace!("simplifier made progress");
        }
        Ok(PassResult { program, changed })
    }
}

// ---------------------------------------------------------------------------
// Expressions

fn fold_expr(program: &Program, expr: &mut Expr) -> bool {
    match expr {
        Expr::Binary {
            op, ty, lhs, rhs, ..
        } => {
            if op.is_assignment() {
                return false;
            }
            if matches!(op, BinOp::And | BinOp::Or) {
                return fold_short_circuit(program, expr);
            }
            let (Expr::Literal(l), Expr::Literal(r)) = (lhs.as_ref(), rhs.as_ref()) else {
                return false;
            };
            if let Some(folded) = fold_binary(program, *op, *ty, l, r) {
                *expr = Expr::Literal(folded);
                return true;
            }
            false
        }
        Expr::Prefix { op, arg } => {
            let Expr::Literal(lit) = arg.as_ref() else {
                return false;
            };
            if let Some(folded) = fold_unary(*op, lit) {
                *expr = Expr::Literal(folded);
                return true;
            }
            false
        }
        Expr::Conditional {
            cond, then, els, ..
        } => {
            if let Expr::Literal(Literal::Bool(b)) = cond.as_ref() {
                let taken = if *b { then } else { els };
                *expr = mem::replace(taken.as_mut(), Expr::null_lit());
                return true;
            }
            match (then.as_ref(), els.as_ref()) {
                (Expr::Literal(Literal::Bool(true)), Expr::Literal(Literal::Bool(false))) => {
                    *expr = mem::replace(cond.as_mut(), Expr::null_lit());
                    true
                }
                (Expr::Literal(Literal::Bool(false)), Expr::Literal(Literal::Bool(true))) => {
                    let inner = mem::replace(cond.as_mut(), Expr::null_lit());
                    *expr = Expr::Prefix {
                        op: UnaryOp::Not,
                        arg: Box::new(inner),
                    };
                    true
                }
                _ => false,
            }
        }
        Expr::Multi(_) => flatten_multi(program, expr),
        _ => false,
    }
}

/// Short-circuit operators fold whenever one side is a literal, as long as
/// discarding the other side cannot drop an effect.
fn fold_short_circuit(program: &Program, expr: &mut Expr) -> bool {
    let Expr::Binary { op, lhs, rhs, .. } = expr else {
        return false;
    };
    let op = *op;
    if let Expr::Literal(Literal::Bool(l)) = lhs.as_ref() {
        let decided = match (op, *l) {
            (BinOp::And, false) => Some(false),
            (BinOp::Or, true) => Some(true),
            _ => None,
        };
        *expr = match decided {
            Some(value) => Expr::bool_lit(value),
            // `true && x` / `false || x` reduce to the right side.
            None => mem::replace(rhs.as_mut(), Expr::null_lit()),
        };
        return true;
    }
    if let Expr::Literal(Literal::Bool(r)) = rhs.as_ref() {
        let neutral = matches!((op, *r), (BinOp::And, true) | (BinOp::Or, false));
        if neutral {
            *expr = mem::replace(lhs.as_mut(), Expr::null_lit());
            return true;
        }
        if !lhs.has_side_effects(program) {
            *expr = Expr::bool_lit(matches!(op, BinOp::Or));
            return true;
        }
    }
    false
}

fn flatten_multi(program: &Program, expr: &mut Expr) -> bool {
    let Expr::Multi(exprs) = expr else {
        return false;
    };
    let mut out: Vec<Expr> = Vec::with_capacity(exprs.len());
    let mut changed = false;
    let last = exprs.len().saturating_sub(1);
    for (i, e) in mem::take(exprs).into_iter().enumerate() {
        match e {
            Expr::Multi(inner) => {
                changed = true;
                out.extend(inner);
            }
            e if i != last && !e.has_side_effects(program) => changed = true,
            e => out.push(e),
        }
    }
    if out.len() == 1 {
        *expr = out.pop().unwrap();
        return true;
    }
    *exprs = out;
    changed
}

fn fold_unary(op: UnaryOp, lit: &Literal) -> Option<Literal> {
    Some(match (op, lit) {
        (UnaryOp::Not, Literal::Bool(b)) => Literal::Bool(!b),
        (UnaryOp::Neg, Literal::Int(v)) => Literal::Int(v.wrapping_neg()),
        (UnaryOp::Neg, Literal::Long(v)) => Literal::Long(v.wrapping_neg()),
        (UnaryOp::Neg, Literal::Float(v)) => Literal::Float(-v),
        (UnaryOp::Neg, Literal::Double(v)) => Literal::Double(-v),
        (UnaryOp::BitNot, Literal::Int(v)) => Literal::Int(!v),
        (UnaryOp::BitNot, Literal::Long(v)) => Literal::Long(!v),
        _ => return None,
    })
}

fn fold_binary(
    program: &Program,
    op: BinOp,
    ty: TypeRef,
    lhs: &Literal,
    rhs: &Literal,
) -> Option<Literal> {
    // String-typed addition is concatenation, and concatenation renders its
    // operands as text: `'A' + 1` is "A1" here but 66 in an int context.
    if op == BinOp::Add && ty == TypeRef::Ref(program.well.string) {
        let (l, r) = (lit_text(lhs)?, lit_text(rhs)?);
        return Some(Literal::String(format!("{l}{r}")));
    }
    if let (Literal::Bool(l), Literal::Bool(r)) = (lhs, rhs) {
        return Some(Literal::Bool(match op {
            BinOp::Eq => l == r,
            BinOp::Ne => l != r,
            BinOp::BitAnd => l & r,
            BinOp::BitOr => l | r,
            BinOp::BitXor => l ^ r,
            _ => return None,
        }));
    }
    match (promote(lhs)?, promote(rhs)?) {
        (l, r) if l.is_double() || r.is_double() => fold_f64(op, l.as_f64(), r.as_f64()),
        (l, r) if l.is_float() || r.is_float() => fold_f32(op, l.as_f32(), r.as_f32()),
        (l, r) if l.is_long() || r.is_long() => fold_i64(op, l.as_i64(), r.as_i64()),
        (l, r) => fold_i32(op, l.as_i32()?, r.as_i32()?),
    }
}

/// Numeric promotion lattice: double > float > long > int, with the
/// sub-int types widening to int first.
#[derive(Clone, Copy)]
enum Num {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Num {
    fn is_double(self) -> bool {
        matches!(self, Num::Double(_))
    }
    fn is_float(self) -> bool {
        matches!(self, Num::Float(_))
    }
    fn is_long(self) -> bool {
        matches!(self, Num::Long(_))
    }
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Long(v) => v as f64,
            Num::Float(v) => v as f64,
            Num::Double(v) => v,
        }
    }
    fn as_f32(self) -> f32 {
        match self {
            Num::Int(v) => v as f32,
            Num::Long(v) => v as f32,
            Num::Float(v) => v,
            Num::Double(v) => v as f32,
        }
    }
    fn as_i64(self) -> i64 {
        match self {
            Num::Int(v) => v as i64,
            Num::Long(v) => v,
            Num::Float(v) => v as i64,
            Num::Double(v) => v as i64,
        }
    }
    fn as_i32(self) -> Option<i32> {
        match self {
            Num::Int(v) => Some(v),
            _ => None,
        }
    }
}

fn promote(lit: &Literal) -> Option<Num> {
    Some(match lit {
        Literal::Byte(v) => Num::Int(*v as i32),
        Literal::Char(v) => Num::Int(*v as i32),
        Literal::Short(v) => Num::Int(*v as i32),
        Literal::Int(v) => Num::Int(*v),
        Literal::Long(v) => Num::Long(*v),
        Literal::Float(v) => Num::Float(*v),
        Literal::Double(v) => Num::Double(*v),
        _ => return None,
    })
}

fn fold_i32(op: BinOp, l: i32, r: i32) -> Option<Literal> {
    Some(match op {
        BinOp::Add => Literal::Int(l.wrapping_add(r)),
        BinOp::Sub => Literal::Int(l.wrapping_sub(r)),
        BinOp::Mul => Literal::Int(l.wrapping_mul(r)),
        // Integral division by zero throws at runtime; leave it in place.
        BinOp::Div if r != 0 => Literal::Int(l.wrapping_div(r)),
        BinOp::Rem if r != 0 => Literal::Int(l.wrapping_rem(r)),
        BinOp::Shl => Literal::Int(l.wrapping_shl(r as u32 & 31)),
        BinOp::Shr => Literal::Int(l.wrapping_shr(r as u32 & 31)),
        BinOp::Shru => Literal::Int(((l as u32) >> (r as u32 & 31)) as i32),
        BinOp::BitAnd => Literal::Int(l & r),
        BinOp::BitOr => Literal::Int(l | r),
        BinOp::BitXor => Literal::Int(l ^ r),
        _ => return fold_cmp(op, l.partial_cmp(&r)),
    })
}

fn fold_i64(op: BinOp, l: i64, r: i64) -> Option<Literal> {
    Some(match op {
        BinOp::Add => Literal::Long(l.wrapping_add(r)),
        BinOp::Sub => Literal::Long(l.wrapping_sub(r)),
        BinOp::Mul => Literal::Long(l.wrapping_mul(r)),
        BinOp::Div if r != 0 => Literal::Long(l.wrapping_div(r)),
        BinOp::Rem if r != 0 => Literal::Long(l.wrapping_rem(r)),
        BinOp::Shl => Literal::Long(l.wrapping_shl(r as u32 & 63)),
        BinOp::Shr => Literal::Long(l.wrapping_shr(r as u32 & 63)),
        BinOp::Shru => Literal::Long(((l as u64) >> (r as u64 & 63)) as i64),
        BinOp::BitAnd => Literal::Long(l & r),
        BinOp::BitOr => Literal::Long(l | r),
        BinOp::BitXor => Literal::Long(l ^ r),
        _ => return fold_cmp(op, l.partial_cmp(&r)),
    })
}

fn fold_f32(op: BinOp, l: f32, r: f32) -> Option<Literal> {
    Some(match op {
        BinOp::Add => Literal::Float(l + r),
        BinOp::Sub => Literal::Float(l - r),
        BinOp::Mul => Literal::Float(l * r),
        BinOp::Div => Literal::Float(l / r),
        BinOp::Rem => Literal::Float(l % r),
        _ => return fold_cmp(op, l.partial_cmp(&r)),
    })
}

fn fold_f64(op: BinOp, l: f64, r: f64) -> Option<Literal> {
    Some(match op {
        BinOp::Add => Literal::Double(l + r),
        BinOp::Sub => Literal::Double(l - r),
        BinOp::Mul => Literal::Double(l * r),
        BinOp::Div => Literal::Double(l / r),
        BinOp::Rem => Literal::Double(l % r),
        _ => return fold_cmp(op, l.partial_cmp(&r)),
    })
}

fn fold_cmp(op: BinOp, ord: Option<std::cmp::Ordering>) -> Option<Literal> {
    let ord = ord?;
    Some(Literal::Bool(match op {
        BinOp::Eq => ord.is_eq(),
        BinOp::Ne => ord.is_ne(),
        BinOp::Lt => ord.is_lt(),
        BinOp::Le => ord.is_le(),
        BinOp::Gt => ord.is_gt(),
        BinOp::Ge => ord.is_ge(),
        _ => return None,
    }))
}

fn lit_text(lit: &Literal) -> Option<String> {
    Some(match lit {
        Literal::Bool(v) => v.to_string(),
        Literal::Byte(v) => v.to_string(),
        Literal::Char(v) => char::from_u32(*v as u32)?.to_string(),
        Literal::Short(v) => v.to_string(),
        Literal::Int(v) => v.to_string(),
        Literal::Long(v) => v.to_string(),
        Literal::Float(v) => v.to_string(),
        Literal::Double(v) => v.to_string(),
        Literal::String(v) => v.clone(),
        Literal::Null => "null".to_string(),
        Literal::Class(_) => return None,
    })
}

// ---------------------------------------------------------------------------
// Statements

fn simplify_stmt(program: &Program, stmt: &mut Stmt) -> bool {
    match stmt {
        Stmt::Expr(e) if !e.has_side_effects(program) => {
            *stmt = Stmt::Empty;
            true
        }
        Stmt::If { cond, then, els } => {
            let Expr::Literal(Literal::Bool(b)) = cond else {
                // Both arms empty: only the condition's effects remain.
                if is_empty_stmt(then)
                    && els.as_deref().map(is_empty_stmt).unwrap_or(true)
                {
                    *stmt = Stmt::Expr(mem::replace(cond, Expr::null_lit()));
                    return true;
                }
                return false;
            };
            *stmt = if *b {
                mem::replace(then.as_mut(), Stmt::Empty)
            } else {
                match els.take() {
                    Some(els) => *els,
                    None => Stmt::Empty,
                }
            };
            true
        }
        Stmt::While { cond, .. } => {
            if matches!(cond, Expr::Literal(Literal::Bool(false))) {
                *stmt = Stmt::Empty;
                return true;
            }
            false
        }
        Stmt::DoWhile { body, cond } => {
            // A do-while that runs exactly once is just its body, unless a
            // break or continue inside still needs the loop as a target.
            if matches!(cond, Expr::Literal(Literal::Bool(false)))
                && !body.has_control_exit()
            {
                *stmt = mem::replace(body.as_mut(), Stmt::Empty);
                return true;
            }
            false
        }
        Stmt::For { init, cond, .. } => {
            if matches!(cond, Some(Expr::Literal(Literal::Bool(false)))) {
                *stmt = Stmt::Block(Block::new(mem::take(init)));
                return true;
            }
            false
        }
        Stmt::Switch { .. } => simplify_switch(program, stmt),
        Stmt::Try {
            block,
            catches,
            finally_block,
        } => {
            // Once liveness is known, a clause for a type nothing
            // instantiates can never match.
            let before = catches.len();
            catches.retain(|c| catchable(program, c.ty));
            let dropped = catches.len() != before;
            if catches.is_empty() && finally_block.is_none() {
                *stmt = Stmt::Block(mem::take(block));
                return true;
            }
            if block.is_empty() {
                *stmt = match finally_block.take() {
                    Some(finally_block) => Stmt::Block(finally_block),
                    None => Stmt::Empty,
                };
                return true;
            }
            dropped
        }
        Stmt::Block(block) => clean_block(program, block),
        _ => false,
    }
}

fn simplify_switch(program: &Program, stmt: &mut Stmt) -> bool {
    let Stmt::Switch { selector, body } = stmt else {
        return false;
    };
    if body.stmts.iter().all(|s| matches!(s, Stmt::Empty))
        && !selector.has_side_effects(program)
    {
        *stmt = Stmt::Empty;
        return true;
    }
    // A switch with one non-default case is a plain equality test, provided
    // nothing inside still breaks out of the switch.
    let mut cases = body
        .stmts
        .iter()
        .filter(|s| matches!(s, Stmt::Case(_)));
    let (Some(Stmt::Case(Some(_))), None) = (cases.next(), cases.next()) else {
        return false;
    };
    let mut rest: Vec<Stmt> = body
        .stmts
        .iter()
        .filter(|s| !matches!(s, Stmt::Case(_)))
        .cloned()
        .collect();
    if matches!(rest.last(), Some(Stmt::Break(None))) {
        rest.pop();
    }
    if rest.iter().any(has_unlabeled_break) {
        return false;
    }
    let Some(Stmt::Case(Some(value))) = body
        .stmts
        .iter_mut()
        .find(|s| matches!(s, Stmt::Case(_)))
    else {
        return false;
    };
    let cond = Expr::Binary {
        op: BinOp::Eq,
        ty: TypeRef::Prim(PrimKind::Bool),
        lhs: Box::new(mem::replace(selector, Expr::null_lit())),
        rhs: Box::new(mem::replace(value, Expr::null_lit())),
    };
    *stmt = Stmt::If {
        cond,
        then: Box::new(Stmt::Block(Block::new(rest))),
        els: None,
    };
    true
}

/// Whether a catch clause's type can match at runtime. Before liveness is
/// computed every type is assumed catchable.
fn catchable(program: &Program, ty: TypeId) -> bool {
    if !program.liveness.computed {
        return true;
    }
    program
        .liveness
        .instantiated_types
        .iter()
        .any(|&t| program.is_same_or_supertype(ty, t))
}

fn is_empty_stmt(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Empty => true,
        Stmt::Block(b) => b.stmts.iter().all(is_empty_stmt),
        _ => false,
    }
}

fn has_unlabeled_break(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Break(None) => true,
        // Breaks inside a nested loop or switch target that construct.
        Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } | Stmt::Switch { .. } => {
            false
        }
        Stmt::Block(b) => b.stmts.iter().any(has_unlabeled_break),
        Stmt::If { then, els, .. } => {
            has_unlabeled_break(then)
                || els.as_deref().map(has_unlabeled_break).unwrap_or(false)
        }
        Stmt::Labeled { body, .. } => has_unlabeled_break(body),
        Stmt::Try {
            block,
            catches,
            finally_block,
        } => {
            block.stmts.iter().any(has_unlabeled_break)
                || catches
                    .iter()
                    .any(|c| c.block.stmts.iter().any(has_unlabeled_break))
                || finally_block
                    .iter()
                    .any(|b| b.stmts.iter().any(has_unlabeled_break))
        }
        _ => false,
    }
}

/// Drop empty statements and splice nested blocks that declare nothing.
fn clean_block(program: &Program, block: &mut Block) -> bool {
    let before = block.stmts.len();
    let mut out: Vec<Stmt> = Vec::with_capacity(before);
    let mut changed = false;
    for stmt in mem::take(&mut block.stmts) {
        match stmt {
            Stmt::Empty => changed = true,
            Stmt::Expr(e) if !e.has_side_effects(program) => changed = true,
            Stmt::Block(inner) if !inner.stmts.iter().any(Stmt::declares_locals) => {
                changed = true;
                out.extend(inner.stmts);
            }
            stmt => out.push(stmt),
        }
    }
    block.stmts = out;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Catch, TypeKind};
    use crate::passes::testutil::{add_class, add_method, body_of};

    fn run_on(program: Program, body: Block) -> (Program, MethodId) {
        let mut program = program;
        let owner = add_class(&mut program, "Holder");
        let method = add_method(&mut program, owner, "m", true, body);
        let program = Simplify.apply(program).unwrap().program;
        (program, method)
    }

    fn returned(program: &Program, method: MethodId) -> &Expr {
        let Stmt::Return(Some(e)) = &body_of(program, method).stmts[0] else {
            panic!("expected a returned expression");
        };
        e
    }

    fn int_binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            ty: TypeRef::Prim(PrimKind::Int),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Integral division truncates; floating division does not.
    #[test]
    fn division_respects_operand_types() {
        let program = Program::new();
        let body = Block::new(vec![
            Stmt::Return(Some(int_binary(
                BinOp::Div,
                Expr::int_lit(7),
                Expr::int_lit(2),
            ))),
        ]);
        let (program, method) = run_on(program, body);
        assert!(matches!(
            returned(&program, method),
            Expr::Literal(Literal::Int(3))
        ));

        let program2 = Program::new();
        let body = Block::new(vec![Stmt::Return(Some(Expr::Binary {
            op: BinOp::Div,
            ty: TypeRef::Prim(PrimKind::Double),
            lhs: Box::new(Expr::Literal(Literal::Double(7.0))),
            rhs: Box::new(Expr::int_lit(2)),
        }))]);
        let (program2, method2) = run_on(program2, body);
        assert!(matches!(
            returned(&program2, method2),
            Expr::Literal(Literal::Double(v)) if *v == 3.5
        ));
    }

    /// Division by integral zero throws at runtime and must survive.
    #[test]
    fn division_by_zero_not_folded() {
        let program = Program::new();
        let body = Block::new(vec![Stmt::Return(Some(int_binary(
            BinOp::Div,
            Expr::int_lit(7),
            Expr::int_lit(0),
        )))]);
        let (program, method) = run_on(program, body);
        assert!(matches!(returned(&program, method), Expr::Binary { .. }));
    }

    /// The same char-plus-int expression folds differently depending on
    /// whether it is typed as a string or as an int.
    #[test]
    fn char_addition_depends_on_context() {
        let mut program = Program::new();
        let string = program.well.string;
        let body = Block::new(vec![
            Stmt::Return(Some(Expr::Binary {
                op: BinOp::Add,
                ty: TypeRef::Ref(string),
                lhs: Box::new(Expr::Literal(Literal::Char('A' as u16))),
                rhs: Box::new(Expr::int_lit(1)),
            })),
        ]);
        let (program, method) = run_on(program, body);
        assert!(matches!(
            returned(&program, method),
            Expr::Literal(Literal::String(s)) if s == "A1"
        ));

        let program2 = Program::new();
        let body = Block::new(vec![Stmt::Return(Some(int_binary(
            BinOp::Add,
            Expr::Literal(Literal::Char('A' as u16)),
            Expr::int_lit(1),
        )))]);
        let (program2, method2) = run_on(program2, body);
        assert!(matches!(
            returned(&program2, method2),
            Expr::Literal(Literal::Int(66))
        ));
    }

    /// A literal condition collapses the branch, and the dead arm's
    /// statements disappear with it.
    #[test]
    fn dead_branch_removed() {
        let program = Program::new();
        let body = Block::new(vec![Stmt::If {
            cond: Expr::bool_lit(false),
            then: Box::new(Stmt::Return(Some(Expr::int_lit(1)))),
            els: Some(Box::new(Stmt::Return(Some(Expr::int_lit(2))))),
        }]);
        let (program, method) = run_on(program, body);
        let block = body_of(&program, method);
        assert_eq!(block.stmts.len(), 1);
        assert!(matches!(
            returned(&program, method),
            Expr::Literal(Literal::Int(2))
        ));
    }

    /// `do { ... } while (false)` runs once; the body is hoisted unless a
    /// break still targets the loop.
    #[test]
    fn do_while_false_hoists_only_without_exits() {
        let program = Program::new();
        let target = program.index_method("Exceptions.caught").unwrap();
        let body = Block::new(vec![Stmt::DoWhile {
            body: Box::new(Stmt::Expr(Expr::Call {
                target,
                instance: None,
                args: Vec::new(),
                static_dispatch: true,
                ty_override: None,
            })),
            cond: Expr::bool_lit(false),
        }]);
        let (program, method) = run_on(program, body);
        assert!(matches!(body_of(&program, method).stmts[0], Stmt::Expr(_)));

        let program2 = Program::new();
        let target = program2.index_method("Exceptions.caught").unwrap();
        let body = Block::new(vec![Stmt::DoWhile {
            body: Box::new(Stmt::Block(Block::new(vec![
                Stmt::Expr(Expr::Call {
                    target,
                    instance: None,
                    args: Vec::new(),
                    static_dispatch: true,
                    ty_override: None,
                }),
                Stmt::Break(None),
            ]))),
            cond: Expr::bool_lit(false),
        }]);
        let (program2, method2) = run_on(program2, body);
        assert!(matches!(
            body_of(&program2, method2).stmts[0],
            Stmt::DoWhile { .. }
        ));
    }

    /// A one-case switch becomes an equality test with the trailing break
    /// stripped.
    #[test]
    fn single_case_switch_becomes_if() {
        let program = Program::new();
        let target = program.index_method("Exceptions.caught").unwrap();
        let body = Block::new(vec![Stmt::Switch {
            selector: Expr::int_lit(5),
            body: Block::new(vec![
                Stmt::Case(Some(Expr::int_lit(3))),
                Stmt::Expr(Expr::Call {
                    target,
                    instance: None,
                    args: Vec::new(),
                    static_dispatch: true,
                    ty_override: None,
                }),
                Stmt::Break(None),
            ]),
        }]);
        let (program, method) = run_on(program, body);
        // Then the literal comparison folds and the branch dies.
        assert!(body_of(&program, method).stmts.is_empty());
    }

    /// Comma sequences flatten, and pure non-final elements drop out.
    #[test]
    fn multi_sequences_flatten() {
        let program = Program::new();
        let body = Block::new(vec![Stmt::Return(Some(Expr::Multi(vec![
            Expr::Multi(vec![Expr::int_lit(1), Expr::int_lit(2)]),
            Expr::int_lit(9),
        ])))]);
        let (program, method) = run_on(program, body);
        assert!(matches!(
            returned(&program, method),
            Expr::Literal(Literal::Int(9))
        ));
    }

    /// Once liveness is known, catch clauses for never-instantiated types
    /// are dropped, and a try with no surviving handlers and no finally
    /// dissolves into its body.
    #[test]
    fn dead_catch_clauses_dropped() {
        fn effect(target: MethodId) -> Stmt {
            Stmt::Expr(Expr::Call {
                target,
                instance: None,
                args: Vec::new(),
                static_dispatch: true,
                ty_override: None,
            })
        }
        fn fault_type(program: &mut Program, name: &str) -> TypeId {
            let throwable = program.well.throwable;
            program.create_type(
                name,
                TypeKind::Class {
                    is_abstract: false,
                    is_final: false,
                },
                Some(throwable),
                false,
            )
        }

        let mut program = Program::new();
        let live_ty = fault_type(&mut program, "LiveFault");
        let dead_ty = fault_type(&mut program, "DeadFault");
        program.liveness.computed = true;
        program.liveness.instantiated_types.insert(live_ty);
        let target = program.index_method("Exceptions.caught").unwrap();
        let e0 = program.create_local("e0", TypeRef::Ref(dead_ty));
        let e1 = program.create_local("e1", TypeRef::Ref(live_ty));
        let body = Block::new(vec![Stmt::Try {
            block: Block::new(vec![effect(target)]),
            catches: vec![
                Catch {
                    local: e0,
                    ty: dead_ty,
                    block: Block::default(),
                },
                Catch {
                    local: e1,
                    ty: live_ty,
                    block: Block::default(),
                },
            ],
            finally_block: None,
        }]);
        let (program, method) = run_on(program, body);
        let Stmt::Try { catches, .. } = &body_of(&program, method).stmts[0] else {
            panic!("a try with a live handler must survive");
        };
        assert_eq!(catches.len(), 1);
        assert_eq!(catches[0].ty, live_ty);

        let mut program2 = Program::new();
        let dead_ty = fault_type(&mut program2, "DeadFault");
        program2.liveness.computed = true;
        let target = program2.index_method("Exceptions.caught").unwrap();
        let e = program2.create_local("e", TypeRef::Ref(dead_ty));
        let body = Block::new(vec![Stmt::Try {
            block: Block::new(vec![effect(target)]),
            catches: vec![Catch {
                local: e,
                ty: dead_ty,
                block: Block::default(),
            }],
            finally_block: None,
        }]);
        let (program2, method2) = run_on(program2, body);
        assert!(matches!(
            body_of(&program2, method2).stmts[0],
            Stmt::Expr(Expr::Call { .. })
        ));
    }

    /// Running the pass on already-simplified input reports no change.
    #[test]
    fn idempotent() {
        let program = Program::new();
        let body = Block::new(vec![Stmt::Return(Some(Expr::int_lit(3)))]);
        let mut program = program;
        let owner = add_class(&mut program, "Holder");
        add_method(&mut program, owner, "m", true, body);
        let once = Simplify.apply(program).unwrap();
        assert!(!once.changed);
    }
}
