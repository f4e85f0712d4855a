//! Collapse the catch clauses of every try statement into one handler that
//! dispatches on the runtime type of the caught value.
//!
//! The collapsed handler catches at the throwable root, adapts the raw
//! thrown value through `Exceptions.caught`, then tests the original catch
//! types in declaration order:
//!
//! ```text
//! try { ... } catch ($e: Throwable) {
//!   $e = Exceptions.caught($e);
//!   if ($e instanceof T1) { e1 = (T1) $e; ... }
//!   else if ($e instanceof T2) { e2 = (T2) $e; ... }
//!   else throw $e;
//! }
//! ```
//!
//! A clause whose type is a throwable-root supertype catches everything and
//! ends the chain. Clauses for types that turn out never to be instantiated
//! are the simplifier's to drop once liveness is known.

use std::mem;

use tracing::trace;

use crate::error::CoreError;
use crate::ir::{
    BinOp, Block, Catch, Expr, LocalId, MethodBody, MethodId, Program, Stmt, TypeRef,
};
use crate::pipeline::{Pass, PassResult};

#[derive(Default)]
pub struct CatchCollapse;

impl Pass for CatchCollapse {
    fn name(&self) -> &'static str {
        "catch-collapse"
    }

    fn apply(&mut self, mut program: Program) -> Result<PassResult, CoreError> {
        let caught = program.index_method("Exceptions.caught")?;
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
            let mut collapser = Collapser {
                program: &mut program,
                caught,
                temps: Vec::new(),
                depth: 0,
                new_locals: Vec::new(),
                changed: false,
            };
            for stmt in &mut body.block.stmts {
                collapser.visit(stmt);
            }
            let Collapser {
                new_locals,
                changed: method_changed,
                ..
            } = collapser;
            body.locals.extend(new_locals);
            changed |= method_changed;
            program.methods[method].body = MethodBody::Stmts(body);
        }
        Ok(PassResult { program, changed })
    }
}

struct Collapser<'a> {
    program: &'a mut Program,
    caught: MethodId,
    /// One shared temp per try-nesting depth, created on demand.
    temps: Vec<LocalId>,
    depth: usize,
    new_locals: Vec<LocalId>,
    changed: bool,
}

impl Collapser<'_> {
    fn visit(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Try {
                block,
                catches,
                finally_block,
            } => {
                self.depth += 1;
                for s in &mut block.stmts {
                    self.visit(s);
                }
                for catch in catches.iter_mut() {
                    for s in &mut catch.block.stmts {
                        self.visit(s);
                    }
                }
                if let Some(finally_block) = finally_block {
                    for s in &mut finally_block.stmts {
                        self.visit(s);
                    }
                }
                let temp_index = self.depth - 1;
                self.depth -= 1;
                if !catches.is_empty() {
                    let temp = self.temp_at(temp_index);
                    let collapsed = self.collapse(mem::take(catches), temp);
                    *catches = collapsed;
                    self.changed = true;
                }
            }
            Stmt::Block(block) | Stmt::Switch { body: block, .. } => {
                for s in &mut block.stmts {
                    self.visit(s);
                }
            }
            Stmt::If { then, els, .. } => {
                self.visit(then);
                if let Some(els) = els {
                    self.visit(els);
                }
            }
            Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::Labeled { body, .. } => self.visit(body),
            Stmt::For { init, body, .. } => {
                for s in init.iter_mut() {
                    self.visit(s);
                }
                self.visit(body);
            }
            _ => {}
        }
    }

    fn temp_at(&mut self, index: usize) -> LocalId {
        while self.temps.len() <= index {
            let throwable = TypeRef::Ref(self.program.well.throwable);
            let local = self
                .program
                .create_local(format!("$e{}", self.temps.len()), throwable);
            self.temps.push(local);
            self.new_locals.push(local);
        }
        self.temps[index]
    }

    fn collapse(&mut self, catches: Vec<Catch>, temp: LocalId) -> Vec<Catch> {
        let throwable = self.program.well.throwable;

        let mut stmts = vec![Stmt::Expr(Expr::Binary {
            op: BinOp::Assign,
            ty: TypeRef::Ref(throwable),
            lhs: Box::new(Expr::Local(temp)),
            rhs: Box::new(Expr::Call {
                target: self.caught,
                instance: None,
                args: vec![Expr::Local(temp)],
                static_dispatch: true,
                ty_override: None,
            }),
        })];

        // Build the dispatch chain right to left so the first clause ends
        // up outermost. The fallthrough rethrows.
        let mut chain = Stmt::Throw(Expr::Local(temp));
        for catch in catches.into_iter().rev() {
            let body = self.clause_body(&catch, temp);
            if self.program.is_same_or_supertype(catch.ty, throwable) {
                // Catch-all clause; nothing below it can match.
                chain = Stmt::Block(body);
            } else {
                chain = Stmt::If {
                    cond: Expr::InstanceOf {
                        ty: catch.ty,
                        expr: Box::new(Expr::Local(temp)),
                    },
                    then: Box::new(Stmt::Block(body)),
                    els: Some(Box::new(chain)),
                };
            }
        }
        stmts.push(chain);

        trace!("collapsed catch clauses");
        vec![Catch {
            local: temp,
            ty: throwable,
            block: Block::new(stmts),
        }]
    }

    fn clause_body(&self, catch: &Catch, temp: LocalId) -> Block {
        let mut stmts = vec![Stmt::LocalDecl {
            local: catch.local,
            init: Some(Expr::Cast {
                ty: TypeRef::Ref(catch.ty),
                expr: Box::new(Expr::Local(temp)),
            }),
        }];
        stmts.extend(catch.block.stmts.clone());
        Block::new(stmts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::TypeId;
    use crate::passes::testutil::{add_class, add_method, body_of};

    fn try_with_catches(program: &mut Program, tys: &[TypeId]) -> (MethodId, Vec<LocalId>) {
        let owner = add_class(program, "Holder");
        let catches: Vec<Catch> = tys
            .iter()
            .enumerate()
            .map(|(i, &ty)| {
                let local = program.create_local(format!("e{i}"), TypeRef::Ref(ty));
                Catch {
                    local,
                    ty,
                    block: Block::new(vec![Stmt::Empty]),
                }
            })
            .collect();
        let locals = catches.iter().map(|c| c.local).collect();
        let body = Block::new(vec![Stmt::Try {
            block: Block::new(vec![Stmt::Empty]),
            catches,
            finally_block: None,
        }]);
        (add_method(program, owner, "m", true, body), locals)
    }

    /// Two catch clauses fold into one handler with an instanceof chain in
    /// declaration order and a rethrow fallthrough.
    #[test]
    fn collapses_to_dispatch_chain() {
        let mut program = Program::new();
        let throwable = program.well.throwable;
        let t1 = program.create_type(
            "IoFault",
            crate::ir::TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(throwable),
            false,
        );
        let t2 = program.create_type(
            "ParseFault",
            crate::ir::TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(throwable),
            false,
        );
        let (method, _) = try_with_catches(&mut program, &[t1, t2]);

        let result = CatchCollapse.apply(program).unwrap();
        assert!(result.changed);
        let program = result.program;

        let block = body_of(&program, method);
        let Stmt::Try { catches, .. } = &block.stmts[0] else {
            panic!("try statement vanished");
        };
        assert_eq!(catches.len(), 1);
        assert_eq!(catches[0].ty, program.well.throwable);

        let handler = &catches[0].block;
        // First the adapter call assignment.
        let Stmt::Expr(Expr::Binary { op, rhs, .. }) = &handler.stmts[0] else {
            panic!("missing adapter assignment");
        };
        assert_eq!(*op, BinOp::Assign);
        assert!(matches!(**rhs, Expr::Call { .. }));
        // Then the chain, first clause outermost, rethrow at the end.
        let Stmt::If { cond, els, .. } = &handler.stmts[1] else {
            panic!("missing dispatch chain");
        };
        assert!(matches!(cond, Expr::InstanceOf { ty, .. } if *ty == t1));
        let Some(els) = els else { panic!() };
        let Stmt::If { cond, els, .. } = els.as_ref() else {
            panic!("missing second clause");
        };
        assert!(matches!(cond, Expr::InstanceOf { ty, .. } if *ty == t2));
        assert!(matches!(els.as_deref(), Some(Stmt::Throw(_))));
    }

    /// A clause at the throwable root catches unconditionally and ends the
    /// chain without a rethrow.
    #[test]
    fn root_clause_is_unconditional() {
        let mut program = Program::new();
        let throwable = program.well.throwable;
        let (method, _) = try_with_catches(&mut program, &[throwable]);

        let program = CatchCollapse.apply(program).unwrap().program;
        let block = body_of(&program, method);
        let Stmt::Try { catches, .. } = &block.stmts[0] else {
            panic!();
        };
        let handler = &catches[0].block;
        assert!(matches!(handler.stmts[1], Stmt::Block(_)));
    }
}
