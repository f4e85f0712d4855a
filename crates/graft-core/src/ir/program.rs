use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::diag::SourceSpan;
use crate::entity::{EntityRef, PrimaryMap, SecondaryMap};
use crate::error::{CoreError, InternalError};

use super::member::{
    Field, FieldDisposition, FieldId, Local, LocalId, Method, MethodBody, MethodId, Param,
};
use super::stmt::Block;
use super::ty::{PrimKind, TypeDecl, TypeId, TypeKind, TypeRef};

/// Handles to the types and members every pass needs to reach directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellKnown {
    /// Root of the class hierarchy.
    pub object: TypeId,
    pub string: TypeId,
    /// The class-metadata type produced by class literals.
    pub class_meta: TypeId,
    pub throwable: TypeId,
    /// Root of the host-environment object family. Subtypes of this type
    /// use the host-side cast protocol instead of query ids.
    pub host_object: TypeId,
    /// The `length` pseudo-field shared by every array type.
    pub array_length: FieldId,
}

/// Results of the global reachability analysis, consumed by pruning and
/// by the cast lowerer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Liveness {
    /// False until the reachability pass has run at least once.
    pub computed: bool,
    pub referenced_types: HashSet<TypeId>,
    pub instantiated_types: HashSet<TypeId>,
    pub live_methods: HashSet<MethodId>,
    pub live_fields: HashSet<FieldId>,
}

/// The whole-program IR: arenas for every node kind plus the global side
/// tables the passes maintain.
///
/// Arenas are append-only. Pruning never removes arena entries; it removes
/// ids from `declared` and from the per-type member lists, so stale ids in
/// dead code stay decodable for error reporting.
#[derive(Debug, Serialize, Deserialize)]
pub struct Program {
    pub types: PrimaryMap<TypeId, TypeDecl>,
    pub methods: PrimaryMap<MethodId, Method>,
    pub fields: PrimaryMap<FieldId, Field>,
    pub locals: PrimaryMap<LocalId, Local>,
    /// Live declared types in declaration order. Pruning removes from here.
    pub declared: Vec<TypeId>,
    pub entry_points: Vec<MethodId>,
    pub well: WellKnown,
    /// Runtime helper methods addressable by "Type.method" name.
    pub indexed: BTreeMap<String, MethodId>,
    pub liveness: Liveness,
    /// Per-type query id for the runtime cast protocol. Assigned by the
    /// cast lowerer; 0 is reserved for the root object type.
    pub query_ids: SecondaryMap<TypeId, i32>,
    /// For each instantiated type, the sorted query ids of all its
    /// castable supertypes.
    pub cast_maps: SecondaryMap<TypeId, Vec<i32>>,
    #[serde(skip)]
    array_cache: HashMap<String, TypeId>,
}

impl Program {
    /// Create an empty program pre-seeded with the well-known types and the
    /// runtime helper methods.
    pub fn new() -> Self {
        let mut program = Program {
            types: PrimaryMap::new(),
            methods: PrimaryMap::new(),
            fields: PrimaryMap::new(),
            locals: PrimaryMap::new(),
            declared: Vec::new(),
            entry_points: Vec::new(),
            well: WellKnown {
                object: TypeId::new(0),
                string: TypeId::new(0),
                class_meta: TypeId::new(0),
                throwable: TypeId::new(0),
                host_object: TypeId::new(0),
                array_length: FieldId::new(0),
            },
            indexed: BTreeMap::new(),
            liveness: Liveness::default(),
            query_ids: SecondaryMap::new(),
            cast_maps: SecondaryMap::new(),
            array_cache: HashMap::new(),
        };

        let object = program.create_type(
            "Object",
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            None,
            true,
        );
        program.well.object = object;
        program.well.string = program.create_type(
            "String",
            TypeKind::Class {
                is_abstract: false,
                is_final: true,
            },
            Some(object),
            true,
        );
        program.well.class_meta = program.create_type(
            "Class",
            TypeKind::Class {
                is_abstract: false,
                is_final: true,
            },
            Some(object),
            true,
        );
        program.well.throwable = program.create_type(
            "Throwable",
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(object),
            true,
        );
        program.well.host_object = program.create_type(
            "HostObject",
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(object),
            true,
        );

        program.well.array_length = program.fields.push(Field {
            name: "length".into(),
            owner: object,
            ty: TypeRef::Prim(PrimKind::Int),
            is_static: false,
            disposition: FieldDisposition::Final,
            constant: None,
            synthetic: true,
            span: SourceSpan::default(),
        });

        program.seed_runtime_helpers();
        program
    }

    fn seed_runtime_helpers(&mut self) {
        let obj = TypeRef::Ref(self.well.object);
        let string = TypeRef::Ref(self.well.string);
        let throwable = TypeRef::Ref(self.well.throwable);
        let int = TypeRef::Prim(PrimKind::Int);
        let long = TypeRef::Prim(PrimKind::Long);
        let double = TypeRef::Prim(PrimKind::Double);
        let bool_ty = TypeRef::Prim(PrimKind::Bool);

        let cast = self.create_helper_type("Cast");
        self.add_helper(cast, "dynamicCast", &[("obj", obj), ("queryId", int)], obj);
        self.add_helper(cast, "instanceOf", &[("obj", obj), ("queryId", int)], bool_ty);
        self.add_helper(cast, "dynamicCastHost", &[("obj", obj)], obj);
        self.add_helper(cast, "instanceOfHost", &[("obj", obj)], bool_ty);
        self.add_helper(
            cast,
            "throwClassCastExceptionUnlessNull",
            &[("obj", obj)],
            obj,
        );
        for (name, kind) in [
            ("narrow_byte", PrimKind::Byte),
            ("narrow_char", PrimKind::Char),
            ("narrow_short", PrimKind::Short),
            ("narrow_int", PrimKind::Int),
        ] {
            self.add_helper(cast, name, &[("x", double)], TypeRef::Prim(kind));
        }
        for (name, kind) in [
            ("round_byte", PrimKind::Byte),
            ("round_char", PrimKind::Char),
            ("round_short", PrimKind::Short),
            ("round_int", PrimKind::Int),
        ] {
            self.add_helper(cast, name, &[("x", double)], TypeRef::Prim(kind));
        }
        self.add_helper(
            cast,
            "charToString",
            &[("c", TypeRef::Prim(PrimKind::Char))],
            string,
        );

        let long_lib = self.create_helper_type("LongLib");
        self.add_helper(long_lib, "toInt", &[("l", long)], int);
        self.add_helper(long_lib, "toDouble", &[("l", long)], double);
        self.add_helper(long_lib, "fromInt", &[("x", int)], long);
        self.add_helper(long_lib, "fromDouble", &[("x", double)], long);
        self.add_helper(long_lib, "toString", &[("l", long)], string);

        let exceptions = self.create_helper_type("Exceptions");
        self.add_helper(exceptions, "caught", &[("e", obj)], throwable);

        let boxing = self.create_helper_type("Boxing");
        for kind in [
            PrimKind::Bool,
            PrimKind::Byte,
            PrimKind::Char,
            PrimKind::Short,
            PrimKind::Int,
            PrimKind::Long,
            PrimKind::Float,
            PrimKind::Double,
        ] {
            let prim = TypeRef::Prim(kind);
            self.add_helper(boxing, &format!("box_{}", kind.name()), &[("x", prim)], obj);
            self.add_helper(
                boxing,
                &format!("unbox_{}", kind.name()),
                &[("x", obj)],
                prim,
            );
        }
    }

    fn create_helper_type(&mut self, name: &str) -> TypeId {
        self.create_type(
            name,
            TypeKind::Class {
                is_abstract: false,
                is_final: true,
            },
            Some(self.well.object),
            true,
        )
    }

    fn add_helper(
        &mut self,
        owner: TypeId,
        name: &str,
        params: &[(&str, TypeRef)],
        return_ty: TypeRef,
    ) {
        let method = self.methods.push(Method {
            name: name.into(),
            owner,
            params: params
                .iter()
                .map(|(n, ty)| Param {
                    name: (*n).into(),
                    ty: *ty,
                    synthetic: false,
                })
                .collect(),
            return_ty,
            is_static: true,
            is_abstract: false,
            is_final: true,
            is_private: false,
            is_native: true,
            is_ctor: false,
            synthetic: true,
            overrides: Vec::new(),
            thrown: Vec::new(),
            body: MethodBody::Absent,
            span: SourceSpan::default(),
        });
        self.types[owner].methods.push(method);
        let type_name = self.types[owner].name.clone();
        self.indexed.insert(format!("{type_name}.{name}"), method);
    }

    /// Create a declared type with its `$clinit` (and, for classes and
    /// enums, `$init`) slots pre-filled.
    pub fn create_type(
        &mut self,
        name: &str,
        kind: TypeKind,
        superclass: Option<TypeId>,
        synthetic: bool,
    ) -> TypeId {
        let id = self.types.push(TypeDecl {
            name: name.into(),
            kind,
            superclass,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            captures: Vec::new(),
            synthetic,
            span: SourceSpan::default(),
        });
        let clinit = self.create_initializer(id, "$clinit", true);
        self.types[id].methods.push(clinit);
        if self.types[id].is_class() {
            let init = self.create_initializer(id, "$init", false);
            self.types[id].methods.push(init);
        }
        self.declared.push(id);
        id
    }

    fn create_initializer(&mut self, owner: TypeId, name: &str, is_static: bool) -> MethodId {
        self.methods.push(Method {
            name: name.into(),
            owner,
            params: Vec::new(),
            return_ty: TypeRef::Void,
            is_static,
            is_abstract: false,
            is_final: true,
            is_private: false,
            is_native: false,
            is_ctor: false,
            synthetic: true,
            overrides: Vec::new(),
            thrown: Vec::new(),
            body: MethodBody::Stmts(Default::default()),
            span: SourceSpan::default(),
        })
    }

    /// Intern the array type for the given element, creating it on first
    /// use. Array types are final and extend the root object type.
    pub fn intern_array(&mut self, elem: TypeRef) -> TypeId {
        let name = format!("{}[]", self.display_type(elem));
        if let Some(&id) = self.array_cache.get(&name) {
            return id;
        }
        // After deserialization the cache is empty; fall back to a scan.
        if let Some(id) = self.find_type_by_name(&name) {
            self.array_cache.insert(name, id);
            return id;
        }
        let id = self.create_type(
            &name,
            TypeKind::Array { elem },
            Some(self.well.object),
            true,
        );
        self.array_cache.insert(name, id);
        id
    }

    /// Look up a seeded runtime helper method by its "Type.method" name.
    pub fn index_method(&self, name: &str) -> Result<MethodId, CoreError> {
        self.indexed
            .get(name)
            .copied()
            .ok_or_else(|| InternalError::new(format!("runtime helper {name} not seeded")).into())
    }

    pub fn create_local(&mut self, name: impl Into<String>, ty: TypeRef) -> LocalId {
        self.locals.push(Local {
            name: name.into(),
            ty,
        })
    }

    pub fn clinit_of(&self, ty: TypeId) -> MethodId {
        self.types[ty].methods[0]
    }

    /// Instance initializer of a class or enum. Callers must not ask for
    /// the initializer of an interface or array type.
    pub fn init_of(&self, ty: TypeId) -> MethodId {
        self.types[ty].methods[1]
    }

    /// Whether running the type's static initializer can have any
    /// observable effect.
    pub fn clinit_is_trivial(&self, ty: TypeId) -> bool {
        match &self.methods[self.clinit_of(ty)].body {
            MethodBody::Stmts(body) => body.block.is_empty(),
            _ => false,
        }
    }

    pub fn clinit_body_mut(&mut self, ty: TypeId) -> &mut Block {
        let clinit = self.clinit_of(ty);
        match &mut self.methods[clinit].body {
            MethodBody::Stmts(body) => &mut body.block,
            _ => unreachable!("$clinit always has a statement body"),
        }
    }

    pub fn find_type_by_name(&self, name: &str) -> Option<TypeId> {
        self.types.iter().find(|(_, t)| t.name == name).map(|(id, _)| id)
    }

    pub fn display_type(&self, ty: TypeRef) -> String {
        match ty {
            TypeRef::Void => "void".into(),
            TypeRef::Prim(kind) => kind.name().into(),
            TypeRef::Ref(id) => self.types[id].name.clone(),
            TypeRef::Null => "null".into(),
        }
    }

    /// Whether the type belongs to the host-object family, which uses the
    /// host-side cast protocol.
    pub fn is_host_type(&self, ty: TypeId) -> bool {
        let mut cur = Some(ty);
        while let Some(id) = cur {
            if id == self.well.host_object {
                return true;
            }
            cur = self.types[id].superclass;
        }
        false
    }

    /// All strict supertypes of a type: the superclass chain plus every
    /// transitively implemented interface, deduplicated.
    pub fn supertypes_of(&self, ty: TypeId) -> Vec<TypeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<TypeId> = Vec::new();
        if let Some(sup) = self.types[ty].superclass {
            stack.push(sup);
        }
        stack.extend(self.types[ty].interfaces.iter().copied());
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            if let Some(sup) = self.types[id].superclass {
                stack.push(sup);
            }
            stack.extend(self.types[id].interfaces.iter().copied());
        }
        out
    }

    pub fn is_same_or_supertype(&self, maybe_super: TypeId, ty: TypeId) -> bool {
        maybe_super == ty || self.supertypes_of(ty).contains(&maybe_super)
    }

    /// Whether a cast from `from` to `to` is statically known to succeed
    /// and can be erased.
    pub fn can_trivially_cast(&self, from: TypeRef, to: TypeRef) -> bool {
        match (from, to) {
            (TypeRef::Null, TypeRef::Ref(_) | TypeRef::Null) => true,
            (a, b) if a == b => true,
            (TypeRef::Ref(_), TypeRef::Ref(to_id)) if to_id == self.well.object => true,
            (TypeRef::Ref(from_id), TypeRef::Ref(to_id)) => {
                let (from_decl, to_decl) = (&self.types[from_id], &self.types[to_id]);
                match (&from_decl.kind, &to_decl.kind) {
                    // Covariant array casts are trivial when the element
                    // cast is trivial and both elements are references.
                    (
                        TypeKind::Array { elem: from_elem },
                        TypeKind::Array { elem: to_elem },
                    ) => {
                        from_elem.is_reference()
                            && to_elem.is_reference()
                            && self.can_trivially_cast(*from_elem, *to_elem)
                    }
                    _ => self.is_same_or_supertype(to_id, from_id),
                }
            }
            _ => false,
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Upcasts, identity casts and null casts are statically trivial;
    /// downcasts are not.
    #[test]
    fn trivial_cast_laws() {
        let mut p = Program::new();
        let object = p.well.object;
        let base = p.create_type(
            "Base",
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(object),
            false,
        );
        let sub = p.create_type(
            "Sub",
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(base),
            false,
        );
        assert!(p.can_trivially_cast(TypeRef::Ref(sub), TypeRef::Ref(base)));
        assert!(p.can_trivially_cast(TypeRef::Ref(sub), TypeRef::Ref(object)));
        assert!(p.can_trivially_cast(TypeRef::Ref(sub), TypeRef::Ref(sub)));
        assert!(p.can_trivially_cast(TypeRef::Null, TypeRef::Ref(sub)));
        assert!(!p.can_trivially_cast(TypeRef::Ref(base), TypeRef::Ref(sub)));
    }

    /// Interface supertypes are reached transitively through superclasses.
    #[test]
    fn transitive_interface_supertypes() {
        let mut p = Program::new();
        let object = p.well.object;
        let iface = p.create_type("I", TypeKind::Interface, None, false);
        let mid = p.create_type(
            "Mid",
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(object),
            false,
        );
        p.types[mid].interfaces.push(iface);
        let leaf = p.create_type(
            "Leaf",
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(mid),
            false,
        );
        assert!(p.can_trivially_cast(TypeRef::Ref(leaf), TypeRef::Ref(iface)));
    }

    /// Array interning returns the same id for the same element type.
    #[test]
    fn array_interning_is_stable() {
        let mut p = Program::new();
        let a = p.intern_array(TypeRef::Prim(PrimKind::Int));
        let b = p.intern_array(TypeRef::Prim(PrimKind::Int));
        let c = p.intern_array(TypeRef::Prim(PrimKind::Long));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(p.types[a].is_array());
        assert_eq!(p.types[a].name, "int[]");
    }

    /// Covariant reference-array casts erase; primitive arrays never do.
    #[test]
    fn array_cast_covariance() {
        let mut p = Program::new();
        let object = p.well.object;
        let string = p.well.string;
        let obj_arr = p.intern_array(TypeRef::Ref(object));
        let str_arr = p.intern_array(TypeRef::Ref(string));
        let int_arr = p.intern_array(TypeRef::Prim(PrimKind::Int));
        let long_arr = p.intern_array(TypeRef::Prim(PrimKind::Long));
        assert!(p.can_trivially_cast(TypeRef::Ref(str_arr), TypeRef::Ref(obj_arr)));
        assert!(!p.can_trivially_cast(TypeRef::Ref(obj_arr), TypeRef::Ref(str_arr)));
        assert!(!p.can_trivially_cast(TypeRef::Ref(int_arr), TypeRef::Ref(long_arr)));
    }

    /// Every runtime helper the lowering passes call is seeded at startup.
    #[test]
    fn runtime_helpers_seeded() {
        let p = Program::new();
        for name in [
            "Cast.dynamicCast",
            "Cast.instanceOf",
            "Cast.dynamicCastHost",
            "Cast.instanceOfHost",
            "Cast.throwClassCastExceptionUnlessNull",
            "Cast.narrow_int",
            "Cast.round_byte",
            "Cast.charToString",
            "LongLib.toInt",
            "LongLib.fromDouble",
            "LongLib.toString",
            "Exceptions.caught",
            "Boxing.box_int",
            "Boxing.unbox_double",
        ] {
            assert!(p.index_method(name).is_ok(), "missing helper {name}");
        }
        assert!(p.index_method("Cast.noSuchHelper").is_err());
    }

    /// Host-family membership follows the superclass chain.
    #[test]
    fn host_family_detection() {
        let mut p = Program::new();
        let host_root = p.well.host_object;
        let overlay = p.create_type(
            "Overlay",
            TypeKind::Class {
                is_abstract: false,
                is_final: false,
            },
            Some(host_root),
            false,
        );
        assert!(p.is_host_type(overlay));
        assert!(p.is_host_type(host_root));
        assert!(!p.is_host_type(p.well.string));
    }
}
