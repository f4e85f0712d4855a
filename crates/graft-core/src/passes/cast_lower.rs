//! Replace source-level casts and type tests with runtime helper calls.
//!
//! Reference casts compile to a query-id check: every type demanded by a
//! remaining cast or instanceof gets a small integer id, and every
//! instantiable type carries the sorted id set of the types it can be cast
//! to. Host-environment types bypass the id protocol and use the host-side
//! helpers instead. Primitive casts become narrowing, rounding, or
//! long-emulation calls; casts the type system already guarantees are
//! erased.
//!
//! Also wraps string-concatenation operands whose textual form differs from
//! the runtime's native rendering (char, emulated long), and narrows
//! integral division, whose runtime result is otherwise fractional.

use std::collections::HashSet;
use std::mem;

use tracing::debug;

use crate::error::CoreError;
use crate::ir::visit;
use crate::ir::{
    BinOp, Expr, MethodBody, MethodId, PrimKind, Program, TypeId, TypeRef,
};
use crate::pipeline::{Pass, PassResult};

#[derive(Default)]
pub struct CastLower;

impl Pass for CastLower {
    fn name(&self) -> &'static str {
        "cast-lower"
    }

    fn apply(&mut self, mut program: Program) -> Result<PassResult, CoreError> {
        let helpers = Helpers::find(&program)?;

        let demanded = collect_demanded(&program);
        assign_query_ids(&mut program, &demanded);
        build_cast_maps(&mut program);

        let methods: Vec<MethodId> = program.methods.keys().collect();
        let mut changed = !demanded.is_empty();
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
                    changed |= rewrite(&program, &helpers, e);
                });
            }
            program.methods[method].body = MethodBody::Stmts(body);
        }
        Ok(PassResult { program, changed })
    }
}

struct Helpers {
    dynamic_cast: MethodId,
    instance_of: MethodId,
    dynamic_cast_host: MethodId,
    instance_of_host: MethodId,
    throw_unless_null: MethodId,
    char_to_string: MethodId,
    long_to_string: MethodId,
    long_from_int: MethodId,
    long_to_int: MethodId,
    long_from_double: MethodId,
    long_to_double: MethodId,
    narrow_byte: MethodId,
    narrow_char: MethodId,
    narrow_short: MethodId,
    narrow_int: MethodId,
    round_byte: MethodId,
    round_char: MethodId,
    round_short: MethodId,
    round_int: MethodId,
}

impl Helpers {
    fn find(program: &Program) -> Result<Self, CoreError> {
        Ok(Helpers {
            dynamic_cast: program.index_method("Cast.dynamicCast")?,
            instance_of: program.index_method("Cast.instanceOf")?,
            dynamic_cast_host: program.index_method("Cast.dynamicCastHost")?,
            instance_of_host: program.index_method("Cast.instanceOfHost")?,
            throw_unless_null: program.index_method("Cast.throwClassCastExceptionUnlessNull")?,
            char_to_string: program.index_method("Cast.charToString")?,
            long_to_string: program.index_method("LongLib.toString")?,
            long_from_int: program.index_method("LongLib.fromInt")?,
            long_to_int: program.index_method("LongLib.toInt")?,
            long_from_double: program.index_method("LongLib.fromDouble")?,
            long_to_double: program.index_method("LongLib.toDouble")?,
            narrow_byte: program.index_method("Cast.narrow_byte")?,
            narrow_char: program.index_method("Cast.narrow_char")?,
            narrow_short: program.index_method("Cast.narrow_short")?,
            narrow_int: program.index_method("Cast.narrow_int")?,
            round_byte: program.index_method("Cast.round_byte")?,
            round_char: program.index_method("Cast.round_char")?,
            round_short: program.index_method("Cast.round_short")?,
            round_int: program.index_method("Cast.round_int")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Query ids

/// Reference types still demanded by a cast or instanceof that neither
/// erases nor takes the host path.
fn collect_demanded(program: &Program) -> HashSet<TypeId> {
    let mut demanded = HashSet::new();
    for method in program.methods.values() {
        let MethodBody::Stmts(body) = &method.body else {
            continue;
        };
        for stmt in &body.block.stmts {
            visit::for_each_expr(stmt, &mut |e| {
                let (ty, inner) = match e {
                    Expr::Cast {
                        ty: TypeRef::Ref(ty),
                        expr,
                    } => (*ty, expr),
                    Expr::InstanceOf { ty, expr } => (*ty, expr),
                    // A store into an array whose element type is not final
                    // needs a runtime element check: any compatible array
                    // could alias the lvalue.
                    Expr::Binary {
                        op: BinOp::Assign,
                        lhs,
                        ..
                    } => {
                        if let Expr::ArrayRef { elem_ty, .. } = lhs.as_ref() {
                            if let Some(elem) = elem_ty.as_ref_id() {
                                if !program.types[elem].is_final() {
                                    demanded.insert(elem);
                                }
                            }
                        }
                        return;
                    }
                    _ => return,
                };
                if program.can_trivially_cast(inner.ty(program), TypeRef::Ref(ty)) {
                    return;
                }
                if program.is_host_type(ty) {
                    return;
                }
                demanded.insert(ty);
            });
        }
    }
    demanded
}

/// Assign query ids: 0 is reserved for the root object type and never
/// emitted, the string type is always 1, host-family types are -1, and
/// everything else counts up from 2 with supertypes numbered before their
/// subtypes.
fn assign_query_ids(program: &mut Program, demanded: &HashSet<TypeId>) {
    program.query_ids.insert(program.well.object, 0);
    program.query_ids.insert(program.well.string, 1);

    let mut rest: Vec<TypeId> = demanded
        .iter()
        .copied()
        .filter(|&t| t != program.well.object && t != program.well.string)
        .collect();
    // A type always has more supertypes than any of its supertypes, so
    // ordering by supertype count numbers parents first.
    rest.sort_by_key(|&t| (program.supertypes_of(t).len(), t));

    let mut next = 2;
    for ty in rest {
        if program.is_host_type(ty) {
            program.query_ids.insert(ty, -1);
        } else {
            program.query_ids.insert(ty, next);
            next += 1;
        }
    }
    debug!(assigned = next - 2, "assigned cast query ids");
}

/// For every instantiated type, the sorted query ids of the types a value
/// of that type satisfies. Membership uses the trivial-cast oracle rather
/// than the supertype list so covariant array types are covered too. Ids
/// that are never emitted in checks (the object root, host types) are left
/// out.
fn build_cast_maps(program: &mut Program) {
    let mut instantiated: Vec<TypeId> =
        program.liveness.instantiated_types.iter().copied().collect();
    instantiated.sort();
    let with_ids: Vec<(TypeId, i32)> = program
        .query_ids
        .iter()
        .map(|(ty, &id)| (ty, id))
        .filter(|&(_, id)| id > 0)
        .collect();
    for ty in instantiated {
        let mut ids: Vec<i32> = with_ids
            .iter()
            .filter(|&&(candidate, _)| {
                program.can_trivially_cast(TypeRef::Ref(ty), TypeRef::Ref(candidate))
            })
            .map(|&(_, id)| id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        program.cast_maps.insert(ty, ids);
    }
}

// ---------------------------------------------------------------------------
// Rewrites

fn rewrite(program: &Program, helpers: &Helpers, expr: &mut Expr) -> bool {
    match expr {
        Expr::Binary { op, ty, .. } => match (*op, *ty) {
            (BinOp::Add, ty) if ty == TypeRef::Ref(program.well.string) => {
                wrap_concat_operands(program, helpers, expr)
            }
            (BinOp::Div, TypeRef::Prim(kind))
                if kind.is_integral() && kind != PrimKind::Long =>
            {
                narrow_division(helpers, expr, kind)
            }
            _ => false,
        },
        Expr::Cast { .. } => rewrite_cast(program, helpers, expr),
        Expr::InstanceOf { .. } => rewrite_instance_of(program, helpers, expr),
        _ => false,
    }
}

/// The runtime renders a char operand as a number and has no native long,
/// so both are stringified explicitly before concatenation.
fn wrap_concat_operands(program: &Program, helpers: &Helpers, expr: &mut Expr) -> bool {
    let Expr::Binary { lhs, rhs, .. } = expr else {
        return false;
    };
    let mut changed = false;
    for side in [lhs, rhs] {
        let target = match side.ty(program) {
            TypeRef::Prim(PrimKind::Char) => helpers.char_to_string,
            TypeRef::Prim(PrimKind::Long) => helpers.long_to_string,
            _ => continue,
        };
        let operand = mem::replace(side.as_mut(), Expr::null_lit());
        **side = helper_call(target, vec![operand], None);
        changed = true;
    }
    changed
}

/// Integral division produces a fractional runtime value; compute it as a
/// double and narrow the result back to the operand type.
fn narrow_division(helpers: &Helpers, expr: &mut Expr, kind: PrimKind) -> bool {
    let mut inner = mem::replace(expr, Expr::null_lit());
    let Expr::Binary { ty, .. } = &mut inner else {
        *expr = inner;
        return false;
    };
    *ty = TypeRef::Prim(PrimKind::Double);
    *expr = helper_call(
        narrow_helper(helpers, kind),
        vec![inner],
        Some(TypeRef::Prim(kind)),
    );
    true
}

fn rewrite_cast(program: &Program, helpers: &Helpers, expr: &mut Expr) -> bool {
    let Expr::Cast { ty: to, expr: inner } = expr else {
        return false;
    };
    let to = *to;
    let from = inner.ty(program);
    let take = |inner: &mut Box<Expr>| mem::replace(inner.as_mut(), Expr::null_lit());

    match (from, to) {
        (TypeRef::Prim(f), TypeRef::Prim(t)) => {
            let Some(replacement) = prim_conversion(helpers, f, t, take(inner)) else {
                return false;
            };
            *expr = replacement;
            true
        }
        // A cast to the null type can only succeed on null; anything else
        // faults at runtime.
        (_, TypeRef::Null) => {
            let arg = take(inner);
            *expr = helper_call(helpers.throw_unless_null, vec![arg], Some(TypeRef::Null));
            true
        }
        (_, TypeRef::Ref(to_id)) => {
            if program.can_trivially_cast(from, to) {
                *expr = take(inner);
                return true;
            }
            if program.is_host_type(to_id) {
                let arg = take(inner);
                *expr = helper_call(helpers.dynamic_cast_host, vec![arg], Some(to));
                return true;
            }
            let Some(&qid) = program.query_ids.get(to_id) else {
                return false;
            };
            let arg = take(inner);
            *expr = helper_call(
                helpers.dynamic_cast,
                vec![arg, Expr::int_lit(qid)],
                Some(to),
            );
            true
        }
        _ => false,
    }
}

fn rewrite_instance_of(program: &Program, helpers: &Helpers, expr: &mut Expr) -> bool {
    let Expr::InstanceOf { ty, expr: inner } = expr else {
        return false;
    };
    let ty = *ty;
    let from = inner.ty(program);
    let arg = mem::replace(inner.as_mut(), Expr::null_lit());

    // When the static type already guarantees a match, only nullness is
    // left to test.
    if program.can_trivially_cast(from, TypeRef::Ref(ty)) {
        *expr = Expr::Binary {
            op: BinOp::Ne,
            ty: TypeRef::Prim(PrimKind::Bool),
            lhs: Box::new(arg),
            rhs: Box::new(Expr::null_lit()),
        };
        return true;
    }
    if program.is_host_type(ty) {
        *expr = helper_call(helpers.instance_of_host, vec![arg], None);
        return true;
    }
    let Some(&qid) = program.query_ids.get(ty) else {
        *inner = Box::new(arg);
        return false;
    };
    *expr = helper_call(helpers.instance_of, vec![arg, Expr::int_lit(qid)], None);
    true
}

/// Primitive conversions that survive to the runtime. Conversions the
/// single numeric representation makes value-preserving are erased.
fn prim_conversion(
    helpers: &Helpers,
    from: PrimKind,
    to: PrimKind,
    arg: Expr,
) -> Option<Expr> {
    use PrimKind::*;
    Some(match (from, to) {
        (f, t) if f == t => arg,
        // Widenings that keep the value exactly.
        (Byte, Short | Int) | (Short | Char, Int) => arg,
        (Byte | Short | Char | Int, Float | Double) => arg,
        (Float, Double) | (Double, Float) => arg,
        // Long emulation boundary.
        (Byte | Short | Char | Int, Long) => {
            helper_call(helpers.long_from_int, vec![arg], None)
        }
        (Long, Int) => helper_call(helpers.long_to_int, vec![arg], None),
        (Long, Byte | Short | Char) => {
            let as_int = helper_call(helpers.long_to_int, vec![arg], None);
            helper_call(
                narrow_helper(helpers, to),
                vec![as_int],
                Some(TypeRef::Prim(to)),
            )
        }
        (Long, Float | Double) => helper_call(
            helpers.long_to_double,
            vec![arg],
            Some(TypeRef::Prim(to)),
        ),
        (Float | Double, Long) => helper_call(helpers.long_from_double, vec![arg], None),
        // Floating to integral rounds toward zero.
        (Float | Double, Byte | Short | Char | Int) => helper_call(
            round_helper(helpers, to),
            vec![arg],
            Some(TypeRef::Prim(to)),
        ),
        // Narrowing among the sub-long integrals.
        (Byte | Short | Char | Int, Byte | Short | Char | Int) => helper_call(
            narrow_helper(helpers, to),
            vec![arg],
            Some(TypeRef::Prim(to)),
        ),
        _ => return None,
    })
}

fn narrow_helper(helpers: &Helpers, kind: PrimKind) -> MethodId {
    match kind {
        PrimKind::Byte => helpers.narrow_byte,
        PrimKind::Char => helpers.narrow_char,
        PrimKind::Short => helpers.narrow_short,
        _ => helpers.narrow_int,
    }
}

fn round_helper(helpers: &Helpers, kind: PrimKind) -> MethodId {
    match kind {
        PrimKind::Byte => helpers.round_byte,
        PrimKind::Char => helpers.round_char,
        PrimKind::Short => helpers.round_short,
        _ => helpers.round_int,
    }
}

fn helper_call(target: MethodId, args: Vec<Expr>, ty_override: Option<TypeRef>) -> Expr {
    Expr::Call {
        target,
        instance: None,
        args,
        static_dispatch: true,
        ty_override,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, Literal, Stmt, TypeKind};
    use crate::passes::testutil::{add_class, add_method, body_of};

    fn class_under(program: &mut Program, name: &str, superclass: TypeId) -> TypeId {
        program.create_type(
            name,
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(superclass),
            false,
        )
    }

    fn run_body(program: Program, body: Block) -> (Program, MethodId) {
        let mut program = program;
        let owner = add_class(&mut program, "Holder");
        let method = add_method(&mut program, owner, "m", true, body);
        let program = CastLower::default().apply(program).unwrap().program;
        (program, method)
    }

    fn returned(program: &Program, method: MethodId) -> &Expr {
        let Stmt::Return(Some(e)) = &body_of(program, method).stmts[0] else {
            panic!("expected a returned expression");
        };
        e
    }

    fn local_of(program: &mut Program, ty: TypeRef) -> Expr {
        Expr::Local(program.create_local("v", ty))
    }

    /// Query ids: object 0, string 1, demanded types from 2 with
    /// supertypes numbered before subtypes.
    #[test]
    fn query_id_assignment_order() {
        let mut program = Program::new();
        let object = program.well.object;
        let base = class_under(&mut program, "Base", object);
        let sub = class_under(&mut program, "Sub", base);
        let obj_val = local_of(&mut program, TypeRef::Ref(object));
        let obj_val2 = local_of(&mut program, TypeRef::Ref(object));
        let body = Block::new(vec![
            Stmt::Expr(Expr::Cast {
                ty: TypeRef::Ref(sub),
                expr: Box::new(obj_val),
            }),
            Stmt::Expr(Expr::Cast {
                ty: TypeRef::Ref(base),
                expr: Box::new(obj_val2),
            }),
        ]);
        let (program, _) = run_body(program, body);

        assert_eq!(program.query_ids.get(program.well.object), Some(&0));
        assert_eq!(program.query_ids.get(program.well.string), Some(&1));
        let base_id = *program.query_ids.get(base).unwrap();
        let sub_id = *program.query_ids.get(sub).unwrap();
        assert_eq!(base_id, 2);
        assert!(base_id < sub_id);
    }

    /// Upcasts erase; downcasts call the dynamic-cast helper with the
    /// target's query id and keep the target as the expression type.
    #[test]
    fn reference_casts() {
        let mut program = Program::new();
        let object = program.well.object;
        let base = class_under(&mut program, "Base", object);
        let sub = class_under(&mut program, "Sub", base);
        let sub_val = local_of(&mut program, TypeRef::Ref(sub));
        let base_val = local_of(&mut program, TypeRef::Ref(base));
        let body = Block::new(vec![
            Stmt::Return(Some(Expr::Cast {
                ty: TypeRef::Ref(base),
                expr: Box::new(sub_val),
            })),
            Stmt::Expr(Expr::Cast {
                ty: TypeRef::Ref(sub),
                expr: Box::new(base_val),
            }),
        ]);
        let (program, method) = run_body(program, body);

        // The upcast erased to its operand.
        assert!(matches!(returned(&program, method), Expr::Local(_)));
        let Stmt::Expr(Expr::Call {
            target,
            args,
            ty_override,
            ..
        }) = &body_of(&program, method).stmts[1]
        else {
            panic!("downcast not lowered");
        };
        assert_eq!(*target, program.index_method("Cast.dynamicCast").unwrap());
        let qid = *program.query_ids.get(sub).unwrap();
        assert!(matches!(args[1], Expr::Literal(Literal::Int(v)) if v == qid));
        assert_eq!(*ty_override, Some(TypeRef::Ref(sub)));
    }

    /// A cast whose target is the null type can only pass on null.
    #[test]
    fn null_type_cast_throws_unless_null() {
        let mut program = Program::new();
        let object = program.well.object;
        let val = local_of(&mut program, TypeRef::Ref(object));
        let body = Block::new(vec![Stmt::Expr(Expr::Cast {
            ty: TypeRef::Null,
            expr: Box::new(val),
        })]);
        let (program, method) = run_body(program, body);
        let Stmt::Expr(Expr::Call { target, .. }) = &body_of(&program, method).stmts[0] else {
            panic!();
        };
        assert_eq!(
            *target,
            program
                .index_method("Cast.throwClassCastExceptionUnlessNull")
                .unwrap()
        );
    }

    /// Host-family targets bypass query ids entirely.
    #[test]
    fn host_casts_use_host_protocol() {
        let mut program = Program::new();
        let host_root = program.well.host_object;
        let object = program.well.object;
        let overlay = class_under(&mut program, "Overlay", host_root);
        let obj_val = local_of(&mut program, TypeRef::Ref(object));
        let obj_val2 = local_of(&mut program, TypeRef::Ref(object));
        let body = Block::new(vec![
            Stmt::Expr(Expr::Cast {
                ty: TypeRef::Ref(overlay),
                expr: Box::new(obj_val),
            }),
            Stmt::Expr(Expr::InstanceOf {
                ty: overlay,
                expr: Box::new(obj_val2),
            }),
        ]);
        let (program, method) = run_body(program, body);

        assert!(program.query_ids.get(overlay).is_none());
        let block = body_of(&program, method);
        let Stmt::Expr(Expr::Call { target, .. }) = &block.stmts[0] else {
            panic!();
        };
        assert_eq!(
            *target,
            program.index_method("Cast.dynamicCastHost").unwrap()
        );
        let Stmt::Expr(Expr::Call { target, .. }) = &block.stmts[1] else {
            panic!();
        };
        assert_eq!(
            *target,
            program.index_method("Cast.instanceOfHost").unwrap()
        );
    }

    /// An instanceof the static types already decide reduces to a null
    /// test.
    #[test]
    fn guaranteed_instance_of_becomes_null_check() {
        let mut program = Program::new();
        let object = program.well.object;
        let base = class_under(&mut program, "Base", object);
        let sub = class_under(&mut program, "Sub", base);
        let sub_val = local_of(&mut program, TypeRef::Ref(sub));
        let body = Block::new(vec![Stmt::Return(Some(Expr::InstanceOf {
            ty: base,
            expr: Box::new(sub_val),
        }))]);
        let (program, method) = run_body(program, body);
        let Expr::Binary { op, rhs, .. } = returned(&program, method) else {
            panic!("expected a null comparison");
        };
        assert_eq!(*op, BinOp::Ne);
        assert!(matches!(**rhs, Expr::Literal(Literal::Null)));
    }

    /// Primitive conversions: exact widenings erase, the rest go through
    /// the narrowing/rounding/long helpers.
    #[test]
    fn primitive_conversions() {
        let cases: &[(PrimKind, PrimKind, Option<&str>)] = &[
            (PrimKind::Byte, PrimKind::Int, None),
            (PrimKind::Float, PrimKind::Double, None),
            (PrimKind::Int, PrimKind::Byte, Some("Cast.narrow_byte")),
            (PrimKind::Int, PrimKind::Char, Some("Cast.narrow_char")),
            (PrimKind::Double, PrimKind::Int, Some("Cast.round_int")),
            (PrimKind::Int, PrimKind::Long, Some("LongLib.fromInt")),
            (PrimKind::Long, PrimKind::Int, Some("LongLib.toInt")),
            (PrimKind::Double, PrimKind::Long, Some("LongLib.fromDouble")),
            (PrimKind::Long, PrimKind::Double, Some("LongLib.toDouble")),
        ];
        for &(from, to, expect) in cases {
            let mut program = Program::new();
            let val = local_of(&mut program, TypeRef::Prim(from));
            let body = Block::new(vec![Stmt::Return(Some(Expr::Cast {
                ty: TypeRef::Prim(to),
                expr: Box::new(val),
            }))]);
            let (program, method) = run_body(program, body);
            match expect {
                None => assert!(
                    matches!(returned(&program, method), Expr::Local(_)),
                    "{from:?} -> {to:?} should erase"
                ),
                Some(helper) => {
                    let Expr::Call { target, .. } = returned(&program, method) else {
                        panic!("{from:?} -> {to:?} should call {helper}");
                    };
                    assert_eq!(*target, program.index_method(helper).unwrap());
                }
            }
        }
    }

    /// String concatenation stringifies char and long operands; the
    /// division narrower recomputes integral division as double.
    #[test]
    fn concat_wrapping_and_division_narrowing() {
        let mut program = Program::new();
        let string = program.well.string;
        let c = local_of(&mut program, TypeRef::Prim(PrimKind::Char));
        let body = Block::new(vec![
            Stmt::Return(Some(Expr::Binary {
                op: BinOp::Add,
                ty: TypeRef::Ref(string),
                lhs: Box::new(Expr::Literal(Literal::String("x".into()))),
                rhs: Box::new(c),
            })),
            Stmt::Expr(Expr::Binary {
                op: BinOp::Div,
                ty: TypeRef::Prim(PrimKind::Int),
                lhs: Box::new(Expr::int_lit(7)),
                rhs: Box::new(Expr::int_lit(2)),
            }),
        ]);
        let (program, method) = run_body(program, body);

        let Expr::Binary { rhs, .. } = returned(&program, method) else {
            panic!();
        };
        let Expr::Call { target, .. } = rhs.as_ref() else {
            panic!("char operand not wrapped");
        };
        assert_eq!(*target, program.index_method("Cast.charToString").unwrap());

        let Stmt::Expr(Expr::Call { target, args, .. }) = &body_of(&program, method).stmts[1]
        else {
            panic!("division not narrowed");
        };
        assert_eq!(*target, program.index_method("Cast.narrow_int").unwrap());
        assert!(
            matches!(&args[0], Expr::Binary { ty, .. } if *ty == TypeRef::Prim(PrimKind::Double))
        );
    }

    /// Cast maps list, per instantiated type, the sorted ids of the types
    /// it satisfies; the never-emitted object id stays out.
    #[test]
    fn cast_maps_cover_supertypes() {
        let mut program = Program::new();
        let object = program.well.object;
        let base = class_under(&mut program, "Base", object);
        let sub = class_under(&mut program, "Sub", base);
        program.liveness.instantiated_types.insert(sub);
        let obj_val = local_of(&mut program, TypeRef::Ref(object));
        let obj_val2 = local_of(&mut program, TypeRef::Ref(object));
        let body = Block::new(vec![
            Stmt::Expr(Expr::Cast {
                ty: TypeRef::Ref(base),
                expr: Box::new(obj_val),
            }),
            Stmt::Expr(Expr::Cast {
                ty: TypeRef::Ref(sub),
                expr: Box::new(obj_val2),
            }),
        ]);
        let (program, _) = run_body(program, body);

        let base_id = *program.query_ids.get(base).unwrap();
        let sub_id = *program.query_ids.get(sub).unwrap();
        let map = program.cast_maps.get(sub).unwrap();
        assert_eq!(map, &vec![base_id, sub_id]);
        assert!(!map.contains(&0));
    }
}
