//! First builder pass: declare a shell for every resolvable type.

use tracing::trace;

use crate::error::CoreError;
use crate::front::{FrontTypeKind, ResolvedProgram};
use crate::ir::{NodeRef, TypeKind};

use super::Builder;

pub(super) fn declare_types(
    builder: &mut Builder<'_>,
    resolved: &ResolvedProgram,
) -> Result<(), CoreError> {
    for unit in &resolved.units {
        for ty in &unit.types {
            if ty.uninstantiable {
                // No shell; any later reference fails the referencing unit.
                builder.mark_skipped(ty.symbol, &ty.name);
                trace!(name = %ty.name, "skipping unresolvable type");
                continue;
            }
            let kind = match ty.kind {
                // Anonymous classes become ordinary final named classes.
                FrontTypeKind::Class { is_abstract, .. } if ty.anonymous => TypeKind::Class {
                    is_abstract,
                    is_final: true,
                },
                FrontTypeKind::Class {
                    is_abstract,
                    is_final,
                } => TypeKind::Class {
                    is_abstract,
                    is_final,
                },
                FrontTypeKind::Interface => TypeKind::Interface,
                FrontTypeKind::Enum => TypeKind::Enum,
            };
            let id = builder.program.create_type(&ty.name, kind, None, false);
            builder.program.types[id].span = ty.span;
            builder.xref.insert(ty.symbol, NodeRef::Type(id))?;
        }
    }
    Ok(())
}
