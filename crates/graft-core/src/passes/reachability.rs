//! Whole-program reachability analysis and pruning.
//!
//! Starting from the entry points, a worklist walks every reachable method
//! body and classifies types as referenced (the type must exist in the
//! output) or instantiated (an instance of it can exist at runtime). The
//! distinction drives three things:
//!
//! * instance members of never-instantiated types are unreachable and get
//!   pruned, with their surviving call sites rewritten to evaluate the
//!   receiver and arguments for effect and yield `null`;
//! * an override becomes reachable only when some method it overrides is
//!   reachable *and* its declaring type is instantiated;
//! * interfaces of instantiated classes count as instantiated themselves,
//!   while an interface that is merely referenced keeps only its static
//!   initializer.

use std::collections::{HashSet, VecDeque};
use std::mem;

use tracing::debug;

use crate::error::CoreError;
use crate::ir::visit;
use crate::ir::{
    Expr, FieldId, Literal, Liveness, MethodBody, MethodId, Program, Stmt, TypeId, TypeRef,
};
use crate::pipeline::{Pass, PassResult};

#[derive(Default)]
pub struct Reachability;

impl Pass for Reachability {
    fn name(&self) -> &'static str {
        "reachability"
    }

    fn apply(&mut self, mut program: Program) -> Result<PassResult, CoreError> {
        let liveness = analyze(&program);
        let pruned = prune(&mut program, &liveness);
        let rewrote = cleanup_call_sites(&mut program, &liveness);
        debug!(
            referenced = liveness.referenced_types.len(),
            instantiated = liveness.instantiated_types.len(),
            live_methods = liveness.live_methods.len(),
            pruned,
            "reachability done"
        );
        program.liveness = liveness;
        Ok(PassResult {
            program,
            changed: pruned || rewrote,
        })
    }
}

struct Analyzer<'p> {
    program: &'p Program,
    referenced: HashSet<TypeId>,
    instantiated: HashSet<TypeId>,
    live_methods: HashSet<MethodId>,
    live_fields: HashSet<FieldId>,
    queue: VecDeque<MethodId>,
}

fn analyze(program: &Program) -> Liveness {
    let mut analyzer = Analyzer {
        program,
        referenced: HashSet::new(),
        instantiated: HashSet::new(),
        live_methods: HashSet::new(),
        live_fields: HashSet::new(),
        queue: VecDeque::new(),
    };

    // Runtime helper methods are not called from user code yet; later
    // lowering stages introduce calls to them, so they and the well-known
    // types are always rescued.
    for &helper in program.indexed.values() {
        analyzer.rescue_method(helper);
    }
    for ty in [
        program.well.object,
        program.well.string,
        program.well.class_meta,
        program.well.throwable,
        program.well.host_object,
    ] {
        analyzer.reference(TypeRef::Ref(ty));
    }

    for &entry in &program.entry_points {
        analyzer.rescue_method(entry);
        // An instance entry point implies something constructs the type.
        if !program.methods[entry].is_static {
            analyzer.instantiate(program.methods[entry].owner);
        }
    }

    loop {
        while let Some(method) = analyzer.queue.pop_front() {
            analyzer.process(method);
        }
        if !analyzer.rescue_overrides() {
            break;
        }
    }

    Liveness {
        computed: true,
        referenced_types: analyzer.referenced,
        instantiated_types: analyzer.instantiated,
        live_methods: analyzer.live_methods,
        live_fields: analyzer.live_fields,
    }
}

impl<'p> Analyzer<'p> {
    fn rescue_method(&mut self, method: MethodId) {
        if self.live_methods.insert(method) {
            self.queue.push_back(method);
        }
    }

    fn rescue_field(&mut self, field: FieldId) {
        let program: &'p Program = self.program;
        if self.live_fields.insert(field) {
            let decl = &program.fields[field];
            self.reference(TypeRef::Ref(decl.owner));
            self.reference(decl.ty);
        }
    }

    fn reference(&mut self, ty: TypeRef) {
        let program: &'p Program = self.program;
        let Some(id) = ty.as_ref_id() else { return };
        if self.referenced.insert(id) {
            // Making a type reachable makes its static initializer
            // reachable, and its supertypes must exist in the output.
            self.rescue_method(program.clinit_of(id));
            if let Some(sup) = program.types[id].superclass {
                self.reference(TypeRef::Ref(sup));
            }
            for &iface in &program.types[id].interfaces {
                self.reference(TypeRef::Ref(iface));
            }
        }
    }

    /// Mark a type and all its supertypes as instantiated: an instance of
    /// a subtype is an instance of every supertype.
    fn instantiate(&mut self, ty: TypeId) {
        let program: &'p Program = self.program;
        if self.instantiated.insert(ty) {
            self.reference(TypeRef::Ref(ty));
            if !program.types[ty].is_interface() {
                self.rescue_method(program.init_of(ty));
            }
            if let Some(sup) = program.types[ty].superclass {
                self.instantiate(sup);
            }
            for &iface in &program.types[ty].interfaces {
                self.instantiate(iface);
            }
        }
    }

    fn process(&mut self, method: MethodId) {
        let program: &'p Program = self.program;
        let decl = &program.methods[method];
        self.reference(TypeRef::Ref(decl.owner));
        self.reference(decl.return_ty);
        for param in &decl.params {
            self.reference(param.ty);
        }
        for &thrown in &decl.thrown {
            self.reference(TypeRef::Ref(thrown));
        }
        match &decl.body {
            MethodBody::Stmts(body) => {
                for &local in &body.locals {
                    self.reference(program.locals[local].ty);
                }
                for stmt in &body.block.stmts {
                    self.process_stmt(stmt);
                }
            }
            MethodBody::Native(native) => {
                for nref in &native.refs {
                    match &nref.target {
                        crate::ir::NativeTarget::Field(field) => self.rescue_field(*field),
                        crate::ir::NativeTarget::Method(m) => self.rescue_method(*m),
                        crate::ir::NativeTarget::ConstantInlined(_) => {}
                    }
                }
                // Values handed across the foreign boundary can be
                // constructed there.
                for &ty in &native.boundary_types {
                    self.instantiate(ty);
                }
            }
            MethodBody::Absent => {}
        }
    }

    fn process_stmt(&mut self, stmt: &'p Stmt) {
        visit::for_each_stmt(stmt, &mut |s| {
            if let Stmt::Try { catches, .. } = s {
                for catch in catches {
                    self.reference(TypeRef::Ref(catch.ty));
                }
            }
        });
        visit::for_each_expr(stmt, &mut |e| self.process_expr(e));
    }

    fn process_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call { target, .. } => self.rescue_method(*target),
            Expr::New { ctor, ty, .. } => {
                self.instantiate(*ty);
                self.rescue_method(*ctor);
            }
            Expr::Field { field, .. } => self.rescue_field(*field),
            Expr::InstanceOf { ty, .. } => self.reference(TypeRef::Ref(*ty)),
            Expr::Cast { ty, .. } => self.reference(*ty),
            // A string literal conjures an instance of the string type; a
            // class literal conjures an instance of the class metadata type
            // and names the type it describes.
            Expr::Literal(Literal::String(_)) => {
                let string = self.program.well.string;
                self.instantiate(string);
            }
            Expr::Literal(Literal::Class(ty)) => {
                let meta = self.program.well.class_meta;
                self.reference(*ty);
                self.instantiate(meta);
            }
            Expr::NewArray { arr_ty, elem, .. } => {
                self.instantiate(*arr_ty);
                self.reference(*elem);
            }
            Expr::This { ty } => self.reference(TypeRef::Ref(*ty)),
            _ => {}
        }
    }

    /// One round of override rescue: an unreachable method becomes live
    /// when it overrides a live method and its declaring type has
    /// instances. Returns whether anything new was rescued.
    fn rescue_overrides(&mut self) -> bool {
        let program: &'p Program = self.program;
        let mut progress = false;
        for (id, method) in program.methods.iter() {
            if self.live_methods.contains(&id) || method.is_static || method.is_ctor {
                continue;
            }
            if !self.instantiated.contains(&method.owner) {
                continue;
            }
            if method
                .overrides
                .iter()
                .any(|o| self.live_methods.contains(o))
            {
                self.rescue_method(id);
                progress = true;
            }
        }
        progress
    }
}

/// Remove everything the analysis did not reach. Arena entries stay; only
/// the declaration lists shrink.
fn prune(program: &mut Program, liveness: &Liveness) -> bool {
    let before_types = program.declared.len();
    let mut changed = false;

    program
        .declared
        .retain(|t| liveness.referenced_types.contains(t));
    changed |= program.declared.len() != before_types;

    for &ty in &program.declared.clone() {
        let instantiated = liveness.instantiated_types.contains(&ty);
        let is_interface = program.types[ty].is_interface();

        let fields = mem::take(&mut program.types[ty].fields);
        let fields_before = fields.len();
        let kept_fields: Vec<FieldId> = fields
            .into_iter()
            .filter(|f| liveness.live_fields.contains(f))
            .collect();
        changed |= kept_fields.len() != fields_before;
        let kept_set: HashSet<FieldId> = kept_fields.iter().copied().collect();
        program.types[ty]
            .captures
            .retain(|c| kept_set.contains(&c.field));
        program.types[ty].fields = kept_fields;

        let methods = mem::take(&mut program.types[ty].methods);
        let before = methods.len();
        let kept: Vec<MethodId> = methods
            .into_iter()
            .enumerate()
            .filter(|&(i, m)| {
                // Initializer slots are structural and never pruned alone.
                if i == 0 || (!is_interface && i == 1) {
                    return true;
                }
                if !liveness.live_methods.contains(&m) {
                    return false;
                }
                // Instance members of a type with no instances can never
                // be dispatched to; their call sites get rewritten.
                program.methods[m].is_static || instantiated
            })
            .map(|(_, m)| m)
            .collect();
        changed |= kept.len() != before;
        program.types[ty].methods = kept;
    }
    changed
}

/// Rewrite surviving calls to instance methods of never-instantiated
/// types: the receiver and arguments still evaluate, the result is `null`.
fn cleanup_call_sites(program: &mut Program, liveness: &Liveness) -> bool {
    let methods: Vec<MethodId> = program
        .declared
        .iter()
        .flat_map(|&t| program.types[t].methods.iter().copied())
        .collect();
    let mut changed = false;
    for method in methods {
        let mut body = match mem::replace(&mut program.methods[method].body, MethodBody::Absent) {
            MethodBody::Stmts(body) => body,
            other => {
                program.methods[method].body = other;
                continue;
            }
        };
        for stmt in &mut body.block.stmts {
            visit::walk_exprs_post(stmt, &mut |e| {
                let Expr::Call { target, .. } = e else { return };
                let decl = &program.methods[*target];
                if decl.is_static || liveness.instantiated_types.contains(&decl.owner) {
                    return;
                }
                let Expr::Call { instance, args, .. } =
                    mem::replace(e, Expr::null_lit())
                else {
                    unreachable!()
                };
                let mut parts: Vec<Expr> = Vec::new();
                if let Some(instance) = instance {
                    parts.push(*instance);
                }
                parts.extend(args);
                parts.push(Expr::null_lit());
                *e = Expr::Multi(parts);
                changed = true;
            });
        }
        program.methods[method].body = MethodBody::Stmts(body);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, TypeKind};
    use crate::passes::testutil::{add_class, add_method, body_of};

    fn call(target: MethodId) -> Expr {
        Expr::Call {
            target,
            instance: None,
            args: Vec::new(),
            static_dispatch: true,
            ty_override: None,
        }
    }

    /// Methods never called from an entry point are pruned; their types
    /// vanish when nothing references them.
    #[test]
    fn unreachable_code_pruned() {
        let mut program = Program::new();
        let live_ty = add_class(&mut program, "Live");
        let dead_ty = add_class(&mut program, "Dead");
        let helper = add_method(&mut program, live_ty, "helper", true, Block::default());
        let entry = add_method(
            &mut program,
            live_ty,
            "main",
            true,
            Block::new(vec![Stmt::Expr(call(helper))]),
        );
        let dead = add_method(&mut program, dead_ty, "unused", true, Block::default());
        program.entry_points.push(entry);

        let result = Reachability.apply(program).unwrap();
        assert!(result.changed);
        let program = result.program;
        assert!(program.declared.contains(&live_ty));
        assert!(!program.declared.contains(&dead_ty));
        assert!(program.types[live_ty].methods.contains(&helper));
        assert!(!program.types[live_ty].methods.contains(&dead));
        assert!(program.liveness.computed);
    }

    /// A second run over an already-pruned program changes nothing, so
    /// fixpoint pipelines terminate.
    #[test]
    fn idempotent_on_pruned_program() {
        let mut program = Program::new();
        let ty = add_class(&mut program, "Live");
        let entry = add_method(&mut program, ty, "main", true, Block::default());
        program.entry_points.push(entry);

        let program = Reachability.apply(program).unwrap().program;
        let result = Reachability.apply(program).unwrap();
        assert!(!result.changed);
    }

    /// An override is rescued only once its declaring type is known to be
    /// instantiated.
    #[test]
    fn override_needs_instantiated_owner() {
        let mut program = Program::new();
        let base = add_class(&mut program, "Base");
        let sub = program.create_type(
            "Sub",
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(base),
            false,
        );
        let base_m = add_method(&mut program, base, "run", false, Block::default());
        let sub_m = add_method(&mut program, sub, "run", false, Block::default());
        program.methods[sub_m].overrides.push(base_m);

        let base_ctor = add_method(&mut program, base, "Base", false, Block::default());
        program.methods[base_ctor].is_ctor = true;
        let entry_body = Block::new(vec![Stmt::Expr(Expr::Call {
            target: base_m,
            instance: Some(Box::new(Expr::New {
                ctor: base_ctor,
                ty: base,
                args: Vec::new(),
            })),
            args: Vec::new(),
            static_dispatch: false,
            ty_override: None,
        })]);
        let entry = add_method(&mut program, base, "main", true, entry_body);
        program.entry_points.push(entry);

        let program = Reachability.apply(program).unwrap().program;
        // Only Base is instantiated; Sub.run stays dead and Sub vanishes.
        assert!(program.liveness.live_methods.contains(&base_m));
        assert!(!program.liveness.live_methods.contains(&sub_m));
        assert!(!program.declared.contains(&sub));
    }

    /// Call sites of instance methods on never-instantiated types keep
    /// their argument effects and produce null.
    #[test]
    fn uninstantiated_call_site_rewritten() {
        let mut program = Program::new();
        let ty = add_class(&mut program, "Ghost");
        let ghost_m = add_method(&mut program, ty, "poke", false, Block::default());
        let main_ty = add_class(&mut program, "Main");
        let effect = add_method(&mut program, main_ty, "effect", true, Block::default());
        let entry_body = Block::new(vec![Stmt::Expr(Expr::Call {
            target: ghost_m,
            instance: Some(Box::new(Expr::null_lit())),
            args: vec![call(effect)],
            static_dispatch: false,
            ty_override: None,
        })]);
        let entry = add_method(&mut program, main_ty, "main", true, entry_body);
        program.entry_points.push(entry);

        let program = Reachability.apply(program).unwrap().program;
        let Stmt::Expr(Expr::Multi(parts)) = &body_of(&program, entry).stmts[0] else {
            panic!("call site should have been rewritten");
        };
        // receiver, argument, null
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[1], Expr::Call { .. }));
        assert!(matches!(parts[2], Expr::Literal(Literal::Null)));
    }

    /// Interfaces of instantiated classes count as instantiated; merely
    /// referenced interfaces keep only their static initializer.
    #[test]
    fn interface_instantiation_follows_implementors() {
        let mut program = Program::new();
        let iface = program.create_type("Port", TypeKind::Interface, None, false);
        let iface_m = add_method(&mut program, iface, "send", false, Block::default());
        program.methods[iface_m].is_abstract = true;
        let impl_ty = add_class(&mut program, "TcpPort");
        program.types[impl_ty].interfaces.push(iface);
        let impl_m = add_method(&mut program, impl_ty, "send", false, Block::default());
        program.methods[impl_m].overrides.push(iface_m);
        let ctor = add_method(&mut program, impl_ty, "TcpPort", false, Block::default());
        program.methods[ctor].is_ctor = true;

        let main_ty = add_class(&mut program, "Main");
        let entry_body = Block::new(vec![Stmt::Expr(Expr::Call {
            target: iface_m,
            instance: Some(Box::new(Expr::New {
                ctor,
                ty: impl_ty,
                args: Vec::new(),
            })),
            args: Vec::new(),
            static_dispatch: false,
            ty_override: None,
        })]);
        let entry = add_method(&mut program, main_ty, "main", true, entry_body);
        program.entry_points.push(entry);

        let program = Reachability.apply(program).unwrap().program;
        assert!(program.liveness.instantiated_types.contains(&iface));
        assert!(program.liveness.live_methods.contains(&impl_m));
        assert!(program.types[iface].methods.contains(&iface_m));
    }

    /// Runtime helper types stay declared even when nothing reaches them
    /// from an entry point: later lowering stages call into them.
    #[test]
    fn runtime_helpers_survive_pruning() {
        let mut program = Program::new();
        let ty = add_class(&mut program, "Main");
        let entry = add_method(&mut program, ty, "main", true, Block::default());
        program.entry_points.push(entry);

        let program = Reachability.apply(program).unwrap().program;
        let cast = program.find_type_by_name("Cast").unwrap();
        assert!(program.declared.contains(&cast));
        let dynamic_cast = program.index_method("Cast.dynamicCast").unwrap();
        assert!(program.liveness.live_methods.contains(&dynamic_cast));
        assert!(program.types[cast].methods.contains(&dynamic_cast));
    }

    /// String literals instantiate the string type; class literals
    /// instantiate the class metadata type and reference the named type.
    #[test]
    fn literals_rescue_their_runtime_types() {
        let mut program = Program::new();
        let ty = add_class(&mut program, "Main");
        let named = add_class(&mut program, "Named");
        let body = Block::new(vec![
            Stmt::Expr(Expr::Literal(Literal::String("hi".into()))),
            Stmt::Expr(Expr::Literal(Literal::Class(TypeRef::Ref(named)))),
        ]);
        let entry = add_method(&mut program, ty, "main", true, body);
        program.entry_points.push(entry);

        let program = Reachability.apply(program).unwrap().program;
        assert!(program
            .liveness
            .instantiated_types
            .contains(&program.well.string));
        assert!(program
            .liveness
            .instantiated_types
            .contains(&program.well.class_meta));
        assert!(program.liveness.referenced_types.contains(&named));
        assert!(!program.liveness.instantiated_types.contains(&named));
    }
}
