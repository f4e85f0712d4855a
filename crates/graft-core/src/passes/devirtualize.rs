//! Retarget polymorphic calls to the tightest override the receiver's
//! static type admits.
//!
//! When a call's receiver is statically typed at a class below the called
//! method's declaring type, the dispatch can start lower: if some class on
//! the receiver's superclass chain (below the declaring type) overrides the
//! method, the call is retargeted there. A call whose new target is final,
//! or declared on a final class, can additionally skip dynamic dispatch.

use std::mem;

use tracing::trace;

use crate::error::CoreError;
use crate::ir::visit;
use crate::ir::{Expr, MethodBody, MethodId, Program, TypeId};
use crate::pipeline::{Pass, PassResult};

#[derive(Default)]
pub struct Devirtualize;

impl Pass for Devirtualize {
    fn name(&self) -> &'static str {
        "devirtualize"
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
            for stmt in &mut body.block.stmts {
                visit::walk_exprs_post(stmt, &mut |e| {
                    changed |= tighten(&program, e);
                });
            }
            program.methods[method].body = MethodBody::Stmts(body);
        }
        Ok(PassResult { program, changed })
    }
}

fn tighten(program: &Program, expr: &mut Expr) -> bool {
    let Expr::Call {
        target,
        instance: Some(instance),
        static_dispatch: static_dispatch @ false,
        ..
    } = expr
    else {
        return false;
    };
    let declared = *target;
    if !program.methods[declared].can_be_polymorphic() {
        // Non-virtual targets just get their dispatch flag cleared.
        *static_dispatch = true;
        return true;
    }
    let Some(receiver) = instance.ty(program).as_ref_id() else {
        return false;
    };
    // Interface-typed receivers keep interface dispatch.
    if program.types[receiver].is_interface() || receiver == program.methods[declared].owner {
        return maybe_finalize(program, declared, receiver, static_dispatch);
    }
    let Some(found) = find_override(program, receiver, declared) else {
        return maybe_finalize(program, declared, receiver, static_dispatch);
    };
    trace!(
        from = %program.methods[declared].name,
        to = %program.types[program.methods[found].owner].name,
        "tightened call"
    );
    *target = found;
    maybe_finalize(program, found, receiver, static_dispatch);
    true
}

/// A call to a final method, or through a final receiver class, cannot be
/// overridden further and dispatches statically.
fn maybe_finalize(
    program: &Program,
    target: MethodId,
    receiver: TypeId,
    static_dispatch: &mut bool,
) -> bool {
    let decl = &program.methods[target];
    if decl.is_final || program.types[receiver].is_final() {
        *static_dispatch = true;
        return true;
    }
    false
}

/// Walk from `receiver` up the superclass chain, stopping before the
/// declaring type of `declared`, and return the lowest method that
/// overrides it.
fn find_override(program: &Program, receiver: TypeId, declared: MethodId) -> Option<MethodId> {
    let stop = program.methods[declared].owner;
    let mut cur = Some(receiver);
    while let Some(ty) = cur {
        if ty == stop {
            return None;
        }
        for &m in &program.types[ty].methods {
            if m == declared {
                continue;
            }
            let candidate = &program.methods[m];
            if candidate.name == program.methods[declared].name
                && candidate.params.len() == program.methods[declared].params.len()
                && overrides_transitively(program, m, declared)
            {
                return Some(m);
            }
        }
        cur = program.types[ty].superclass;
    }
    None
}

fn overrides_transitively(program: &Program, method: MethodId, target: MethodId) -> bool {
    let mut stack = vec![method];
    let mut seen = vec![];
    while let Some(m) = stack.pop() {
        if m == target {
            return true;
        }
        if seen.contains(&m) {
            continue;
        }
        seen.push(m);
        stack.extend(program.methods[m].overrides.iter().copied());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, Block, Stmt, TypeKind, TypeRef};
    use crate::passes::testutil::{add_class, add_method, body_of};

    struct Hierarchy {
        base_m: MethodId,
        sub_m: MethodId,
        sub: TypeId,
    }

    fn hierarchy(program: &mut Program) -> Hierarchy {
        let base = add_class(program, "Base");
        let sub = program.create_type(
            "Sub",
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(base),
            false,
        );
        let base_m = add_method(program, base, "run", false, Block::default());
        let sub_m = add_method(program, sub, "run", false, Block::default());
        program.methods[sub_m].overrides.push(base_m);
        Hierarchy { base_m, sub_m, sub }
    }

    fn call_through(program: &mut Program, target: MethodId, receiver: TypeId) -> MethodId {
        let main_ty = add_class(program, "Main");
        let receiver_local = program.create_local("r", TypeRef::Ref(receiver));
        let body = Block::new(vec![Stmt::Expr(Expr::Call {
            target,
            instance: Some(Box::new(Expr::Local(receiver_local))),
            args: Vec::new(),
            static_dispatch: false,
            ty_override: None,
        })]);
        add_method(program, main_ty, "main", true, body)
    }

    /// A receiver statically typed at the subclass dispatches straight to
    /// the override.
    #[test]
    fn call_retargeted_to_override() {
        let mut program = Program::new();
        let h = hierarchy(&mut program);
        let main = call_through(&mut program, h.base_m, h.sub);

        let result = Devirtualize.apply(program).unwrap();
        assert!(result.changed);
        let program = result.program;
        let Stmt::Expr(Expr::Call { target, .. }) = &body_of(&program, main).stmts[0] else {
            panic!();
        };
        assert_eq!(*target, h.sub_m);
    }

    /// A receiver typed at the declaring class is left alone.
    #[test]
    fn same_type_receiver_untouched() {
        let mut program = Program::new();
        let h = hierarchy(&mut program);
        let base = program.methods[h.base_m].owner;
        let main = call_through(&mut program, h.base_m, base);

        let result = Devirtualize.apply(program).unwrap();
        assert!(!result.changed);
        let program = result.program;
        let Stmt::Expr(Expr::Call { target, .. }) = &body_of(&program, main).stmts[0] else {
            panic!();
        };
        assert_eq!(*target, h.base_m);
    }

    /// Retargeting onto a final method also drops dynamic dispatch.
    #[test]
    fn final_override_dispatches_statically() {
        let mut program = Program::new();
        let h = hierarchy(&mut program);
        program.methods[h.sub_m].is_final = true;
        let main = call_through(&mut program, h.base_m, h.sub);

        let program = Devirtualize.apply(program).unwrap().program;
        let Stmt::Expr(Expr::Call {
            target,
            static_dispatch,
            ..
        }) = &body_of(&program, main).stmts[0]
        else {
            panic!();
        };
        assert_eq!(*target, h.sub_m);
        assert!(*static_dispatch);
    }

    /// Rewrites reach calls nested inside other expressions.
    #[test]
    fn nested_receiver_tightened() {
        let mut program = Program::new();
        let h = hierarchy(&mut program);
        let main_ty = add_class(&mut program, "Main");
        let r = program.create_local("r", TypeRef::Ref(h.sub));
        let flag = program.create_local("flag", TypeRef::Ref(h.sub));
        let body = Block::new(vec![Stmt::Expr(Expr::Binary {
            op: BinOp::Assign,
            ty: TypeRef::Ref(h.sub),
            lhs: Box::new(Expr::Local(flag)),
            rhs: Box::new(Expr::Call {
                target: h.base_m,
                instance: Some(Box::new(Expr::Local(r))),
                args: Vec::new(),
                static_dispatch: false,
                ty_override: None,
            }),
        })]);
        let main = add_method(&mut program, main_ty, "main", true, body);

        let program = Devirtualize.apply(program).unwrap().program;
        let Stmt::Expr(Expr::Binary { rhs, .. }) = &body_of(&program, main).stmts[0] else {
            panic!();
        };
        let Expr::Call { target, .. } = rhs.as_ref() else {
            panic!();
        };
        assert_eq!(*target, h.sub_m);
    }
}
