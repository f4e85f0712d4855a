//! Second builder pass: supertype wiring and member declaration.

use std::collections::HashSet;
use std::path::Path;

use crate::diag::SourceSpan;
use crate::error::CoreError;
use crate::front::{ConstValue, FrontDisposition, MethodNode, ResolvedProgram, TypeNode};
use crate::ir::{
    CaptureEntry, Field, FieldDisposition, Literal, Method, MethodBody, NativeFunc, NodeRef,
    Param, TypeId, TypeRef,
};

use super::Builder;

const NATIVE_OPEN: &str = "/*-{";
const NATIVE_CLOSE: &str = "}-*/";

pub(super) fn build_members(
    builder: &mut Builder<'_>,
    resolved: &ResolvedProgram,
) -> Result<(), CoreError> {
    for unit in &resolved.units {
        for ty_node in &unit.types {
            let Some(NodeRef::Type(id)) = builder.xref.get(ty_node.symbol) else {
                continue;
            };
            wire_supertypes(builder, &unit.file, ty_node, id);
            declare_fields(builder, &unit.file, ty_node, id)?;
            declare_captures(builder, &unit.file, ty_node, id)?;
            for method in &ty_node.methods {
                declare_method(builder, &unit.file, ty_node, method, id)?;
            }
        }
    }
    resolve_overrides(builder, resolved);
    Ok(())
}

fn wire_supertypes(builder: &mut Builder<'_>, file: &Path, node: &TypeNode, id: TypeId) {
    let superclass = match node.superclass {
        Some(sym) => match builder.xref.get(sym) {
            Some(NodeRef::Type(sup)) => Some(sup),
            _ => {
                let name = builder.describe_symbol(sym);
                builder.sink.error(
                    file,
                    node.span,
                    format!("type {} extends unresolvable type {name}", node.name),
                );
                return;
            }
        },
        // Classes root at the object type; host-family types whose
        // superclass lives outside the program root at the host object.
        None if builder.program.types[id].is_class() => Some(if node.host {
            builder.program.well.host_object
        } else {
            builder.program.well.object
        }),
        None => None,
    };
    builder.program.types[id].superclass = superclass;

    for &sym in &node.interfaces {
        match builder.xref.get(sym) {
            Some(NodeRef::Type(iface)) => builder.program.types[id].interfaces.push(iface),
            _ => {
                let name = builder.describe_symbol(sym);
                builder.sink.error(
                    file,
                    node.span,
                    format!("type {} implements unresolvable type {name}", node.name),
                );
            }
        }
    }
}

fn declare_fields(
    builder: &mut Builder<'_>,
    file: &Path,
    node: &TypeNode,
    owner: TypeId,
) -> Result<(), CoreError> {
    for field in &node.fields {
        let Some(ty) = builder.resolve_ty(&field.ty) else {
            builder.sink.error(
                file,
                field.span,
                format!("field {} has an unresolvable type", field.name),
            );
            continue;
        };
        let id = builder.program.fields.push(Field {
            name: field.name.clone(),
            owner,
            ty,
            is_static: field.is_static,
            disposition: disposition(field.disposition),
            constant: field.constant.as_ref().map(const_to_literal),
            synthetic: false,
            span: field.span,
        });
        builder.program.types[owner].fields.push(id);
        builder.xref.insert(field.symbol, NodeRef::Field(id))?;
    }
    Ok(())
}

/// Synthesize the capture fields of a local or inner type: one per captured
/// outer local, plus one for the enclosing instance, in constructor
/// parameter order.
fn declare_captures(
    builder: &mut Builder<'_>,
    file: &Path,
    node: &TypeNode,
    owner: TypeId,
) -> Result<(), CoreError> {
    let mut used: HashSet<String> = HashSet::new();
    for (i, captured) in node.captured_locals.iter().enumerate() {
        let Some(ty) = builder.resolve_ty(&captured.ty) else {
            builder.sink.error(
                file,
                node.span,
                format!("captured local {} has an unresolvable type", captured.name),
            );
            continue;
        };
        let mut name = format!("val${}", captured.name);
        if !used.insert(name.clone()) {
            name = format!("val${}_{i}", captured.name);
            used.insert(name.clone());
        }
        let field = push_capture_field(builder, owner, name, ty, node.span);
        builder.program.types[owner].captures.push(CaptureEntry {
            field,
            local_symbol: Some(captured.symbol),
        });
    }
    if let Some(enclosing) = node.enclosing_instance {
        match builder.xref.get(enclosing) {
            Some(NodeRef::Type(outer)) => {
                let field = push_capture_field(
                    builder,
                    owner,
                    "this$outer".to_string(),
                    TypeRef::Ref(outer),
                    node.span,
                );
                builder.program.types[owner].captures.push(CaptureEntry {
                    field,
                    local_symbol: None,
                });
            }
            _ => {
                let name = builder.describe_symbol(enclosing);
                builder.sink.error(
                    file,
                    node.span,
                    format!("type {} encloses unresolvable type {name}", node.name),
                );
            }
        }
    }
    Ok(())
}

fn push_capture_field(
    builder: &mut Builder<'_>,
    owner: TypeId,
    name: String,
    ty: TypeRef,
    span: SourceSpan,
) -> crate::ir::FieldId {
    let field = builder.program.fields.push(Field {
        name,
        owner,
        ty,
        is_static: false,
        disposition: FieldDisposition::Final,
        constant: None,
        synthetic: true,
        span,
    });
    builder.program.types[owner].fields.push(field);
    field
}

fn declare_method(
    builder: &mut Builder<'_>,
    file: &Path,
    ty_node: &TypeNode,
    node: &MethodNode,
    owner: TypeId,
) -> Result<(), CoreError> {
    let mut params = Vec::with_capacity(node.params.len());
    for p in &node.params {
        let Some(ty) = builder.resolve_ty(&p.ty) else {
            builder.sink.error(
                file,
                node.span,
                format!(
                    "parameter {} of {} has an unresolvable type",
                    p.name, node.name
                ),
            );
            return Ok(());
        };
        params.push(Param {
            name: p.name.clone(),
            ty,
            synthetic: false,
        });
    }

    // Constructors grow one synthetic trailing parameter per capture slot,
    // mirroring the capture field order.
    if node.is_ctor {
        for entry in builder.program.types[owner].captures.clone() {
            let field = &builder.program.fields[entry.field];
            params.push(Param {
                name: field.name.clone(),
                ty: field.ty,
                synthetic: true,
            });
        }
    }

    let return_ty = if node.is_ctor {
        TypeRef::Ref(owner)
    } else {
        match builder.resolve_ty(&node.return_ty) {
            Some(ty) => ty,
            None => {
                builder.sink.error(
                    file,
                    node.span,
                    format!("method {} has an unresolvable return type", node.name),
                );
                return Ok(());
            }
        }
    };

    let mut thrown = Vec::new();
    for &sym in &node.thrown {
        if let Some(NodeRef::Type(id)) = builder.xref.get(sym) {
            thrown.push(id);
        }
    }

    let body = if node.flags.is_native {
        match extract_native(node) {
            Some(source) => MethodBody::Native(NativeFunc {
                param_names: node.params.iter().map(|p| p.name.clone()).collect(),
                source,
                refs: Vec::new(),
                boundary_types: boundary_types(&params, return_ty),
            }),
            None => {
                builder.sink.error(
                    file,
                    node.span,
                    format!(
                        "native method {} is missing its {NATIVE_OPEN} ... {NATIVE_CLOSE} body",
                        node.name
                    ),
                );
                return Ok(());
            }
        }
    } else if node.flags.is_abstract || ty_node.kind == crate::front::FrontTypeKind::Interface {
        MethodBody::Absent
    } else {
        MethodBody::Stmts(Default::default())
    };

    let method = builder.program.methods.push(Method {
        name: node.name.clone(),
        owner,
        params,
        return_ty,
        is_static: node.flags.is_static,
        is_abstract: node.flags.is_abstract,
        is_final: node.flags.is_final || builder.program.types[owner].is_final(),
        is_private: node.flags.is_private,
        is_native: node.flags.is_native,
        is_ctor: node.is_ctor,
        synthetic: false,
        overrides: Vec::new(),
        thrown,
        body,
        span: node.span,
    });
    builder.program.types[owner].methods.push(method);
    builder.xref.insert(node.symbol, NodeRef::Method(method))?;
    for (i, p) in node.params.iter().enumerate() {
        builder
            .xref
            .insert(p.symbol, NodeRef::Param(method, i as u32))?;
    }
    Ok(())
}

/// The body text between the native-method delimiters, or `None` if the
/// delimiters are missing or inverted.
fn extract_native(node: &MethodNode) -> Option<String> {
    let source = node.native_source.as_deref()?;
    let open = source.find(NATIVE_OPEN)? + NATIVE_OPEN.len();
    let close = source[open..].find(NATIVE_CLOSE)? + open;
    Some(source[open..close].to_string())
}

/// Reference types crossing the managed boundary through a native method.
fn boundary_types(params: &[Param], return_ty: TypeRef) -> Vec<TypeId> {
    let mut out: Vec<TypeId> = params.iter().filter_map(|p| p.ty.as_ref_id()).collect();
    if let Some(id) = return_ty.as_ref_id() {
        out.push(id);
    }
    out
}

fn resolve_overrides(builder: &mut Builder<'_>, resolved: &ResolvedProgram) {
    for unit in &resolved.units {
        for ty_node in &unit.types {
            for node in &ty_node.methods {
                let Some(NodeRef::Method(method)) = builder.xref.get(node.symbol) else {
                    continue;
                };
                let overrides: Vec<_> = node
                    .overrides
                    .iter()
                    .filter_map(|&sym| match builder.xref.get(sym) {
                        Some(NodeRef::Method(m)) => Some(m),
                        _ => None,
                    })
                    .collect();
                builder.program.methods[method].overrides = overrides;
            }
        }
    }
}

fn disposition(d: FrontDisposition) -> FieldDisposition {
    match d {
        FrontDisposition::None => FieldDisposition::None,
        FrontDisposition::Final => FieldDisposition::Final,
        FrontDisposition::Volatile => FieldDisposition::Volatile,
        FrontDisposition::CompileTimeConstant => FieldDisposition::CompileTimeConstant,
    }
}

pub(crate) fn const_to_literal(value: &ConstValue) -> Literal {
    match value {
        ConstValue::Bool(v) => Literal::Bool(*v),
        ConstValue::Byte(v) => Literal::Byte(*v),
        ConstValue::Char(v) => Literal::Char(*v),
        ConstValue::Short(v) => Literal::Short(*v),
        ConstValue::Int(v) => Literal::Int(*v),
        ConstValue::Long(v) => Literal::Long(*v),
        ConstValue::Float(v) => Literal::Float(*v),
        ConstValue::Double(v) => Literal::Double(*v),
        ConstValue::String(v) => Literal::String(v.clone()),
        ConstValue::Null => Literal::Null,
    }
}
