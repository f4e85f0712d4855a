use std::collections::HashMap;

use crate::error::{CoreError, InternalError};
use crate::front::SymbolId;

use super::member::{FieldId, LocalId, MethodId};
use super::ty::TypeId;

/// What a frontend symbol resolved to in the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Type(TypeId),
    Method(MethodId),
    Field(FieldId),
    Local(LocalId),
    Param(MethodId, u32),
}

/// Maps frontend symbols to the IR nodes built for them.
///
/// The table is write-once per symbol; a second registration for the same
/// symbol is an internal error, as is a lookup for a symbol that was never
/// registered. Both indicate a builder-phase bug, never bad user input.
#[derive(Debug, Default)]
pub struct CrossRefTable {
    entries: HashMap<SymbolId, NodeRef>,
}

impl CrossRefTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: SymbolId, node: NodeRef) -> Result<(), CoreError> {
        if let Some(prev) = self.entries.insert(symbol, node) {
            return Err(InternalError::new(format!(
                "symbol {symbol:?} registered twice: {prev:?} then {node:?}"
            ))
            .into());
        }
        Ok(())
    }

    pub fn get(&self, symbol: SymbolId) -> Option<NodeRef> {
        self.entries.get(&symbol).copied()
    }

    pub fn expect_type(&self, symbol: SymbolId) -> Result<TypeId, CoreError> {
        match self.get(symbol) {
            Some(NodeRef::Type(id)) => Ok(id),
            other => Err(miss(symbol, "type", other)),
        }
    }

    pub fn expect_method(&self, symbol: SymbolId) -> Result<MethodId, CoreError> {
        match self.get(symbol) {
            Some(NodeRef::Method(id)) => Ok(id),
            other => Err(miss(symbol, "method", other)),
        }
    }

    pub fn expect_field(&self, symbol: SymbolId) -> Result<FieldId, CoreError> {
        match self.get(symbol) {
            Some(NodeRef::Field(id)) => Ok(id),
            other => Err(miss(symbol, "field", other)),
        }
    }

    pub fn expect_var(&self, symbol: SymbolId) -> Result<NodeRef, CoreError> {
        match self.get(symbol) {
            Some(node @ (NodeRef::Local(_) | NodeRef::Param(..))) => Ok(node),
            other => Err(miss(symbol, "local or parameter", other)),
        }
    }
}

fn miss(symbol: SymbolId, wanted: &str, found: Option<NodeRef>) -> CoreError {
    match found {
        None => InternalError::new(format!("unresolved symbol {symbol:?}: no {wanted} was built"))
            .into(),
        Some(node) => InternalError::new(format!(
            "symbol {symbol:?} expected to be a {wanted}, found {node:?}"
        ))
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;

    /// Double registration of one symbol is a builder bug and must fail.
    #[test]
    fn rejects_double_insert() {
        let mut table = CrossRefTable::new();
        let sym = SymbolId(7);
        table.insert(sym, NodeRef::Type(TypeId::new(0))).unwrap();
        let err = table.insert(sym, NodeRef::Type(TypeId::new(1)));
        assert!(err.is_err());
    }

    /// Typed lookups distinguish "never registered" from "wrong kind".
    #[test]
    fn typed_lookup_mismatch() {
        let mut table = CrossRefTable::new();
        let sym = SymbolId(3);
        table.insert(sym, NodeRef::Field(FieldId::new(2))).unwrap();
        assert!(table.expect_field(sym).is_ok());
        assert!(table.expect_method(sym).is_err());
        assert!(table.expect_type(SymbolId(99)).is_err());
    }
}
