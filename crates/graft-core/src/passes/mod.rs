//! The optimization and lowering passes of the middle tier.

mod cast_lower;
mod catch_collapse;
mod compound_assign;
mod devirtualize;
mod reachability;
mod simplify;

pub use cast_lower::CastLower;
pub use catch_collapse::CatchCollapse;
pub use compound_assign::{BreakAll, BreakupPolicy, CompoundAssignBreaker};
pub use devirtualize::Devirtualize;
pub use reachability::Reachability;
pub use simplify::Simplify;

#[cfg(test)]
pub(crate) mod testutil {
    use crate::diag::SourceSpan;
    use crate::ir::{
        Block, Body, Method, MethodBody, MethodId, Program, TypeId, TypeKind, TypeRef,
    };

    pub(crate) fn add_class(program: &mut Program, name: &str) -> TypeId {
        let object = program.well.object;
        program.create_type(
            name,
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(object),
            false,
        )
    }

    pub(crate) fn add_method(
        program: &mut Program,
        owner: TypeId,
        name: &str,
        is_static: bool,
        block: Block,
    ) -> MethodId {
        let method = program.methods.push(Method {
            name: name.into(),
            owner,
            params: Vec::new(),
            return_ty: TypeRef::Void,
            is_static,
            is_abstract: false,
            is_final: false,
            is_private: false,
            is_native: false,
            is_ctor: false,
            synthetic: false,
            overrides: Vec::new(),
            thrown: Vec::new(),
            body: MethodBody::Stmts(Body {
                locals: Vec::new(),
                block,
            }),
            span: SourceSpan::default(),
        });
        program.types[owner].methods.push(method);
        method
    }

    pub(crate) fn body_of(program: &Program, method: MethodId) -> &Block {
        match &program.methods[method].body {
            MethodBody::Stmts(body) => &body.block,
            _ => panic!("method has no statement body"),
        }
    }
}
