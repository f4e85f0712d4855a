//! IR construction from the resolved frontend tree.
//!
//! Building runs in two passes over the whole program: the first declares a
//! shell for every type so forward references always resolve, the second
//! wires supertypes and declares fields, methods and capture slots. Method
//! bodies are not built here; lowering fills them in afterwards.

mod members;
mod types;

pub(crate) use members::const_to_literal;

use std::collections::HashMap;

use tracing::debug;

use crate::diag::DiagnosticSink;
use crate::error::CoreError;
use crate::front::{FrontType, ResolvedProgram, SymbolId};
use crate::ir::{CrossRefTable, NodeRef, Program, TypeRef};

pub struct Builder<'a> {
    pub program: Program,
    pub xref: CrossRefTable,
    pub sink: &'a mut DiagnosticSink,
    /// Names of types that got no IR shell, for reference diagnostics.
    skipped_types: HashMap<SymbolId, String>,
}

impl<'a> Builder<'a> {
    /// Resolve a frontend type to an IR type reference, interning array
    /// types on the way. `None` means the type references a skipped
    /// declaration; the caller records a diagnostic and fails the unit.
    pub fn resolve_ty(&mut self, ty: &FrontType) -> Option<TypeRef> {
        match ty {
            FrontType::Void => Some(TypeRef::Void),
            FrontType::Prim(kind) => Some(TypeRef::Prim(*kind)),
            FrontType::Null => Some(TypeRef::Null),
            FrontType::Named(symbol) => match self.xref.get(*symbol) {
                Some(NodeRef::Type(id)) => Some(TypeRef::Ref(id)),
                _ => None,
            },
            FrontType::Array(elem) => {
                let elem = self.resolve_ty(elem)?;
                Some(TypeRef::Ref(self.program.intern_array(elem)))
            }
        }
    }

    /// Human-readable name for a type symbol, even if it was skipped.
    pub fn describe_symbol(&self, symbol: SymbolId) -> String {
        if let Some(name) = self.skipped_types.get(&symbol) {
            return name.clone();
        }
        match self.xref.get(symbol) {
            Some(NodeRef::Type(id)) => self.program.types[id].name.clone(),
            _ => format!("<unknown symbol {}>", symbol.0),
        }
    }

    pub(crate) fn mark_skipped(&mut self, symbol: SymbolId, name: &str) {
        self.skipped_types.insert(symbol, name.to_string());
    }
}

/// Build the IR skeleton for a resolved program.
pub fn build(
    resolved: &ResolvedProgram,
    sink: &mut DiagnosticSink,
) -> Result<(Program, CrossRefTable), CoreError> {
    let mut builder = Builder {
        program: Program::new(),
        xref: CrossRefTable::new(),
        sink,
        skipped_types: HashMap::new(),
    };

    types::declare_types(&mut builder, resolved)?;
    members::build_members(&mut builder, resolved)?;

    for &entry in &resolved.entry_points {
        let method = builder.xref.expect_method(entry)?;
        builder.program.entry_points.push(method);
    }

    debug!(
        types = builder.program.declared.len(),
        methods = builder.program.methods.len(),
        fields = builder.program.fields.len(),
        "built IR skeleton"
    );
    Ok((builder.program, builder.xref))
}
