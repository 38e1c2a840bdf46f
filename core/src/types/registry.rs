use core::hash::{BuildHasher, Hash, Hasher};

use hashbrown::{DefaultHashBuilder, HashMap};
use smallvec::SmallVec;

use super::symbol::{GenericInstance, Member, PROTO, SymbolType, TypeId, TypeKind};

/// Owns every [`SymbolType`] of a compilation unit.
///
/// Types are deduplicated by structure: registering a type that is
/// structurally identical to an existing one returns the existing id.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<SymbolType>,
    by_hash: HashMap<u64, SmallVec<[TypeId; 1]>>,
    hasher: DefaultHashBuilder,
    function_proto: TypeId,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-ins in id order; the bool says whether the type gets a prototype.
const BUILTINS: [(&str, TypeKind, bool); 8] = [
    ("void", TypeKind::Void, false),
    ("null", TypeKind::Null, true),
    ("any", TypeKind::Any, true),
    ("bool", TypeKind::Bool, true),
    ("int", TypeKind::Int, true),
    ("float", TypeKind::Float, true),
    ("string", TypeKind::String, true),
    ("array", TypeKind::Array { element: None }, true),
];

impl TypeRegistry {
    pub fn new() -> Self {
        let mut types: Vec<SymbolType> = BUILTINS
            .iter()
            .map(|(name, kind, _)| SymbolType::new(*name, kind.clone()))
            .collect();
        types[TypeId::ARRAY.index()].generic_params = vec!["T".to_owned()];

        let mut registry = Self {
            types,
            by_hash: HashMap::new(),
            hasher: DefaultHashBuilder::default(),
            function_proto: TypeId::VOID,
        };
        for (index, (name, _, has_proto)) in BUILTINS.iter().enumerate() {
            if *has_proto {
                let proto = registry.prototype(name, Vec::new());
                registry.types[index].members.push(Member::new(PROTO, proto));
            }
        }
        registry.function_proto = registry.prototype("function", Vec::new());
        registry.reindex();
        registry
    }

    fn reindex(&mut self) {
        self.by_hash.clear();
        for index in 0..self.types.len() {
            let hash = self.structural_hash(&self.types[index]);
            self.by_hash
                .entry(hash)
                .or_default()
                .push(TypeId(index as u32));
        }
    }

    fn structural_hash(&self, ty: &SymbolType) -> u64 {
        let mut state = self.hasher.build_hasher();
        ty.name.hash(&mut state);
        ty.size.hash(&mut state);
        ty.kind.hash(&mut state);
        for member in &ty.members {
            member.name.hash(&mut state);
            member.ty.hash(&mut state);
        }
        ty.generic_params.hash(&mut state);
        ty.instance.hash(&mut state);
        state.finish()
    }

    /// Registers `ty`, or returns the id of a structurally identical type
    /// registered earlier.
    pub fn register(&mut self, ty: SymbolType) -> TypeId {
        let hash = self.structural_hash(&ty);
        if let Some(candidates) = self.by_hash.get(&hash) {
            if let Some(&existing) = candidates
                .iter()
                .find(|id| self.types[id.index()].structurally_equal(&ty))
            {
                tracing::trace!(name = %ty.name, id = existing.0, "type already registered");
                return existing;
            }
        }
        let id = TypeId(self.types.len() as u32);
        tracing::trace!(name = %ty.name, id = id.0, "registered type");
        self.types.push(ty);
        self.by_hash.entry(hash).or_default().push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, id: TypeId) -> &SymbolType {
        &self.types[id.index()]
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.types[id.index()].name
    }

    /// Looks up a built-in type by its source name.
    pub fn builtin(&self, name: &str) -> Option<TypeId> {
        BUILTINS
            .iter()
            .position(|(builtin, _, _)| *builtin == name)
            .map(|index| TypeId(index as u32))
    }

    /// Links a type to its entry in the program's static-object table.
    pub fn link_type_object(&mut self, id: TypeId, index: u32) {
        self.types[id.index()].type_object = Some(index);
    }

    pub fn proto(&self, id: TypeId) -> Option<TypeId> {
        self.get(id).proto()
    }

    /// Instance fields, taken from the type's prototype.
    pub fn fields(&self, id: TypeId) -> &[Member] {
        match self.proto(id) {
            Some(proto) => &self.types[proto.index()].members,
            None => &[],
        }
    }

    pub fn field(&self, id: TypeId, name: &str) -> Option<(u32, TypeId)> {
        self.fields(id)
            .iter()
            .position(|m| m.name == name)
            .map(|index| (index as u32, self.fields(id)[index].ty))
    }

    pub fn element_type(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id).kind {
            TypeKind::Array { element } => Some(element.unwrap_or(TypeId::ANY)),
            _ => None,
        }
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TypeKind::Array { .. })
    }

    pub fn is_struct(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TypeKind::Struct)
    }

    /// Name native methods are registered under: the generic base's name for
    /// instances (`array` for `array<int>`).
    pub fn owner_name(&self, id: TypeId) -> &str {
        match &self.get(id).instance {
            Some(instance) => self.name(instance.base),
            None => self.name(id),
        }
    }

    fn prototype(&mut self, owner: &str, fields: Vec<Member>) -> TypeId {
        let mut proto = SymbolType::new(format!("{}.{}", owner, PROTO), TypeKind::Prototype);
        proto.size = fields.len() as u32;
        proto.members = fields;
        self.register(proto)
    }

    pub fn generic_param(&mut self, index: u16, name: &str) -> TypeId {
        self.register(SymbolType::new(name, TypeKind::GenericParam(index)))
    }

    pub fn module_type(&mut self, path: &str) -> TypeId {
        self.register(SymbolType::new(path, TypeKind::Module))
    }

    /// Registers a struct and its prototype. Field types may refer to the
    /// struct's own generic parameters.
    pub fn define_struct(
        &mut self,
        name: &str,
        generic_params: Vec<String>,
        fields: Vec<Member>,
    ) -> TypeId {
        let size = fields.len() as u32;
        let proto = self.prototype(name, fields);
        let mut ty = SymbolType::new(name, TypeKind::Struct)
            .with_members(vec![Member::new(PROTO, proto)]);
        ty.generic_params = generic_params;
        ty.size = size;
        self.register(ty)
    }

    pub fn array_of(&mut self, element: TypeId) -> TypeId {
        let name = format!("array<{}>", self.name(element));
        let array_proto = self.proto(TypeId::ARRAY);
        let mut ty = SymbolType::new(
            name,
            TypeKind::Array {
                element: Some(element),
            },
        );
        if let Some(proto) = array_proto {
            ty.members.push(Member::new(PROTO, proto));
        }
        ty.instance = Some(GenericInstance {
            base: TypeId::ARRAY,
            args: vec![element],
        });
        self.register(ty)
    }

    pub fn function_type(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        let mut name = format!("function<{}", self.name(ret));
        for param in &params {
            name.push_str(", ");
            name.push_str(self.name(*param));
        }
        name.push('>');
        let ty = SymbolType::new(name, TypeKind::Function { params, ret })
            .with_members(vec![Member::new(PROTO, self.function_proto)]);
        self.register(ty)
    }

    /// Produces the concrete type `base<args...>`. The caller checks the
    /// argument count.
    pub fn instantiate(&mut self, base: TypeId, args: &[TypeId]) -> TypeId {
        if base == TypeId::ARRAY {
            let element = args.first().copied().unwrap_or(TypeId::ANY);
            return self.array_of(element);
        }
        let base_ty = self.get(base).clone();
        if !base_ty.is_generic() {
            return base;
        }

        let mut name = format!("{}<", base_ty.name);
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                name.push_str(", ");
            }
            name.push_str(self.name(*arg));
        }
        name.push('>');

        let fields: Vec<Member> = self
            .fields(base)
            .to_vec()
            .into_iter()
            .map(|m| Member {
                ty: self.substitute(m.ty, args),
                ..m
            })
            .collect();
        let size = fields.len() as u32;
        let proto = self.prototype(&name, fields);
        let mut ty =
            SymbolType::new(name, base_ty.kind).with_members(vec![Member::new(PROTO, proto)]);
        ty.size = size;
        ty.instance = Some(GenericInstance {
            base,
            args: args.to_vec(),
        });
        let id = self.register(ty);
        tracing::debug!(base = %base_ty.name, instance = %self.name(id), "instantiated generic type");
        id
    }

    /// Replaces generic parameter `i` with `args[i]` throughout `ty`.
    pub fn substitute(&mut self, ty: TypeId, args: &[TypeId]) -> TypeId {
        match self.get(ty).kind.clone() {
            TypeKind::GenericParam(index) => {
                args.get(index as usize).copied().unwrap_or(TypeId::ANY)
            }
            TypeKind::Array {
                element: Some(element),
            } => {
                let element = self.substitute(element, args);
                self.array_of(element)
            }
            TypeKind::Function { params, ret } => {
                let params = params.iter().map(|p| self.substitute(*p, args)).collect();
                let ret = self.substitute(ret, args);
                self.function_type(params, ret)
            }
            TypeKind::Struct => match self.get(ty).instance.clone() {
                Some(instance) => {
                    let new_args: Vec<TypeId> = instance
                        .args
                        .iter()
                        .map(|a| self.substitute(*a, args))
                        .collect();
                    self.instantiate(instance.base, &new_args)
                }
                None => ty,
            },
            _ => ty,
        }
    }

    /// Does `ty` mention any generic parameter?
    pub fn is_open(&self, ty: TypeId) -> bool {
        match &self.get(ty).kind {
            TypeKind::GenericParam(_) => true,
            TypeKind::Array { element } => element.is_some_and(|e| self.is_open(e)),
            TypeKind::Function { params, ret } => {
                params.iter().any(|p| self.is_open(*p)) || self.is_open(*ret)
            }
            _ => self
                .get(ty)
                .instance
                .as_ref()
                .is_some_and(|i| i.args.iter().any(|a| self.is_open(*a))),
        }
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
