//! Resolution of member references inside foreign-code method bodies.
//!
//! A foreign body may reference program members as `@Type::member` or call
//! methods as `@Type::method(sig)`, where `sig` lists parameter type names.
//! `@Type::new(sig)` resolves to the matching instantiation factory. Every
//! reference is resolved here so reachability can treat them as real uses.

use std::path::Path;

use crate::diag::{DiagnosticSink, SourceSpan};
use crate::error::CoreError;
use crate::front::ResolvedProgram;
use crate::ir::{
    CrossRefTable, MethodBody, MethodId, NativeRef, NativeTarget, NodeRef, Program, TypeId,
};

pub(super) fn resolve_native_refs(
    program: &mut Program,
    xref: &CrossRefTable,
    resolved: &ResolvedProgram,
    sink: &mut DiagnosticSink,
) -> Result<(), CoreError> {
    for unit in &resolved.units {
        if sink.unit_failed(&unit.file) {
            continue;
        }
        for ty_node in &unit.types {
            for node in &ty_node.methods {
                if !node.flags.is_native {
                    continue;
                }
                let Some(NodeRef::Method(method)) = xref.get(node.symbol) else {
                    continue;
                };
                let source = match &program.methods[method].body {
                    MethodBody::Native(native) => native.source.clone(),
                    _ => continue,
                };
                let refs = resolve_source(program, &source, &unit.file, node.span, sink);
                if let MethodBody::Native(native) = &mut program.methods[method].body {
                    native.refs = refs;
                }
            }
        }
    }
    Ok(())
}

fn resolve_source(
    program: &Program,
    source: &str,
    file: &Path,
    span: SourceSpan,
    sink: &mut DiagnosticSink,
) -> Vec<NativeRef> {
    let mut refs = Vec::new();
    let bytes = source.as_bytes();
    let mut pos = 0;
    while let Some(at) = source[pos..].find('@') {
        let start = pos + at;
        pos = start + 1;
        let Some(parsed) = parse_ref(source, start) else {
            continue;
        };
        let qualified = source[..start]
            .trim_end()
            .ends_with(|c: char| c == '.' || c == ')');
        let lvalue = {
            let rest = source[parsed.end..].trim_start();
            rest.starts_with('=') && !rest.starts_with("==")
        };
        let text = source[start..parsed.end].to_string();
        if let Some(target) =
            resolve_target(program, &parsed, qualified, lvalue, file, span, sink)
        {
            refs.push(NativeRef {
                text,
                offset: start as u32,
                lvalue,
                target,
            });
        }
        pos = parsed.end.max(pos);
        // Avoid quadratic rescans of a malformed tail.
        debug_assert!(pos <= bytes.len());
    }
    refs
}

struct ParsedRef {
    type_name: String,
    member: String,
    /// Parameter type names, present only when a signature was written.
    sig: Option<Vec<String>>,
    end: usize,
}

fn parse_ref(source: &str, start: usize) -> Option<ParsedRef> {
    let rest = &source[start + 1..];
    let sep = rest.find("::")?;
    let type_name = &rest[..sep];
    if type_name.is_empty()
        || !type_name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.' || c == '[' || c == ']')
    {
        return None;
    }
    let after = &rest[sep + 2..];
    let member_len = after
        .char_indices()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == '$')
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    if member_len == 0 {
        return None;
    }
    let member = &after[..member_len];
    let mut end = start + 1 + sep + 2 + member_len;
    let mut sig = None;
    if source[end..].starts_with('(') {
        if let Some(close) = source[end..].find(')') {
            let inner = &source[end + 1..end + close];
            sig = Some(
                inner
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
            end += close + 1;
        }
    }
    Some(ParsedRef {
        type_name: type_name.to_string(),
        member: member.to_string(),
        sig,
        end,
    })
}

#[allow(clippy::too_many_arguments)]
fn resolve_target(
    program: &Program,
    parsed: &ParsedRef,
    qualified: bool,
    lvalue: bool,
    file: &Path,
    span: SourceSpan,
    sink: &mut DiagnosticSink,
) -> Option<NativeTarget> {
    let Some(ty) = program.find_type_by_name(&parsed.type_name) else {
        sink.error(
            file,
            span,
            format!("foreign reference to unknown type {}", parsed.type_name),
        );
        return None;
    };

    if parsed.sig.is_none() && parsed.member != "new" {
        if let Some(field) = program.types[ty]
            .fields
            .iter()
            .copied()
            .find(|&f| program.fields[f].name == parsed.member)
        {
            let decl = &program.fields[field];
            if decl.is_static && qualified {
                sink.error(
                    file,
                    span,
                    format!("static field {} must not be qualified", parsed.member),
                );
                return None;
            }
            if !decl.is_static && !qualified {
                sink.error(
                    file,
                    span,
                    format!("instance field {} must be qualified", parsed.member),
                );
                return None;
            }
            if decl.is_compile_time_constant() {
                if lvalue {
                    sink.error(
                        file,
                        span,
                        format!("cannot assign to compile-time constant {}", parsed.member),
                    );
                    return None;
                }
                let constant = decl
                    .constant
                    .clone()
                    .expect("compile-time constants always carry a value");
                return Some(NativeTarget::ConstantInlined(constant));
            }
            return Some(NativeTarget::Field(field));
        }
    }

    let wanted = if parsed.member == "new" {
        "$new"
    } else {
        parsed.member.as_str()
    };
    let candidates: Vec<MethodId> = method_candidates(program, ty, wanted);
    if candidates.is_empty() {
        sink.error(
            file,
            span,
            format!(
                "foreign reference to unknown member {}::{}",
                parsed.type_name, parsed.member
            ),
        );
        return None;
    }

    let chosen = match &parsed.sig {
        Some(sig) => {
            let matched: Vec<MethodId> = candidates
                .iter()
                .copied()
                .filter(|&m| sig_matches(program, m, sig))
                .collect();
            match matched.as_slice() {
                [one] => *one,
                [] => {
                    let available: Vec<String> = candidates
                        .iter()
                        .map(|&m| describe_sig(program, m))
                        .collect();
                    sink.error(
                        file,
                        span,
                        format!(
                            "no overload of {}::{} matches ({}); candidates: {}",
                            parsed.type_name,
                            parsed.member,
                            sig.join(","),
                            available.join("; ")
                        ),
                    );
                    return None;
                }
                _ => {
                    sink.error(
                        file,
                        span,
                        format!(
                            "ambiguous foreign reference {}::{}",
                            parsed.type_name, parsed.member
                        ),
                    );
                    return None;
                }
            }
        }
        None => {
            if candidates.len() > 1 {
                sink.error(
                    file,
                    span,
                    format!(
                        "foreign reference {}::{} is overloaded and needs a signature",
                        parsed.type_name, parsed.member
                    ),
                );
                return None;
            }
            candidates[0]
        }
    };

    let decl = &program.methods[chosen];
    if decl.is_static && qualified {
        sink.error(
            file,
            span,
            format!("static method {} must not be qualified", parsed.member),
        );
        return None;
    }
    if !decl.is_static && !qualified {
        sink.error(
            file,
            span,
            format!("instance method {} must be qualified", parsed.member),
        );
        return None;
    }
    Some(NativeTarget::Method(chosen))
}

fn method_candidates(program: &Program, ty: TypeId, name: &str) -> Vec<MethodId> {
    program.types[ty]
        .methods
        .iter()
        .copied()
        .filter(|&m| program.methods[m].name == name)
        .collect()
}

/// Signatures match on the written names of the non-synthetic parameters;
/// capture parameters are invisible to foreign code.
fn sig_matches(program: &Program, method: MethodId, sig: &[String]) -> bool {
    let params: Vec<String> = program.methods[method]
        .params
        .iter()
        .filter(|p| !p.synthetic)
        .map(|p| program.display_type(p.ty))
        .collect();
    params.len() == sig.len() && params.iter().zip(sig).all(|(a, b)| a == b)
}

fn describe_sig(program: &Program, method: MethodId) -> String {
    let params: Vec<String> = program.methods[method]
        .params
        .iter()
        .filter(|p| !p.synthetic)
        .map(|p| program.display_type(p.ty))
        .collect();
    format!("({})", params.join(","))
}
