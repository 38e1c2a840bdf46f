use hashbrown::HashMap;

use crate::syntax::Span;

use super::IdentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

impl ModuleId {
    /// The unnamed module holding built-ins and undeclared top-level code.
    pub const ROOT: ModuleId = ModuleId(0);
}

/// One lexical scope: names to identifiers.
pub type Scope = HashMap<String, IdentId>;

#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub span: Span,
    pub parent: Option<ModuleId>,
    pub children: Vec<ModuleId>,
    /// `scopes[0]` is the module scope; blocks and function bodies push more.
    pub scopes: Vec<Scope>,
}

impl Module {
    fn new(name: &str, span: Span, parent: Option<ModuleId>) -> Self {
        Self {
            name: name.to_owned(),
            span,
            parent,
            children: Vec::new(),
            scopes: vec![Scope::new()],
        }
    }

    pub fn module_scope(&self) -> &Scope {
        &self.scopes[0]
    }

    /// Innermost scope first.
    pub fn scope_chain(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter().rev()
    }
}

/// The hierarchy of modules in a compilation unit.
#[derive(Debug, Clone)]
pub struct ModuleTree {
    modules: Vec<Module>,
}

impl Default for ModuleTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleTree {
    pub fn new() -> Self {
        Self {
            modules: vec![Module::new("", Span::default(), None)],
        }
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Returns the child of `parent` called `name`, creating it if needed.
    /// Declaring a module twice reopens it.
    pub fn add_child(&mut self, parent: ModuleId, name: &str, span: Span) -> ModuleId {
        if let Some(existing) = self.child(parent, name) {
            return existing;
        }
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module::new(name, span, Some(parent)));
        self.get_mut(parent).children.push(id);
        id
    }

    pub fn child(&self, parent: ModuleId, name: &str) -> Option<ModuleId> {
        self.get(parent)
            .children
            .iter()
            .copied()
            .find(|c| self.get(*c).name == name)
    }

    /// Other children of the same parent.
    pub fn siblings(&self, id: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        let parent = self.get(id).parent;
        parent
            .into_iter()
            .flat_map(move |p| self.get(p).children.iter().copied())
            .filter(move |s| *s != id)
    }

    /// `id` followed by its parent, grandparent, ... up to the root.
    pub fn ancestors(&self, id: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        core::iter::successors(Some(id), move |m| self.get(*m).parent)
    }

    /// Resolves a module name as seen from `current`: for each module from
    /// `current` up to the root, its children are checked, then its siblings.
    pub fn lookup_module(&self, current: ModuleId, name: &str) -> Option<ModuleId> {
        for module in self.ancestors(current) {
            if let Some(child) = self.child(module, name) {
                return Some(child);
            }
            if let Some(sibling) = self.siblings(module).find(|s| self.get(*s).name == name) {
                return Some(sibling);
            }
        }
        None
    }

    /// Resolves `A.B.C`: the head by [`lookup_module`](Self::lookup_module),
    /// the rest through children.
    pub fn lookup_path(&self, current: ModuleId, path: &[&str]) -> Option<ModuleId> {
        let (head, rest) = path.split_first()?;
        let mut module = self.lookup_module(current, head)?;
        for segment in rest {
            module = self.child(module, segment)?;
        }
        Some(module)
    }

    /// Dotted path from the root, e.g. `"A.B"`. Empty for the root.
    pub fn canonical_path(&self, id: ModuleId) -> String {
        let mut names: Vec<&str> = self
            .ancestors(id)
            .filter(|m| *m != ModuleId::ROOT)
            .map(|m| self.get(m).name.as_str())
            .collect();
        names.reverse();
        names.join(".")
    }

    pub fn push_scope(&mut self, id: ModuleId) {
        self.get_mut(id).scopes.push(Scope::new());
    }

    pub fn pop_scope(&mut self, id: ModuleId) {
        let scopes = &mut self.get_mut(id).scopes;
        if scopes.len() > 1 {
            scopes.pop();
        }
    }

    /// Binds `name` in the innermost scope of `id`. Returns the identifier
    /// previously bound to `name` in that same scope, if any.
    pub fn bind(&mut self, id: ModuleId, name: &str, ident: IdentId) -> Option<IdentId> {
        // `pop_scope` never removes the module scope, so `last_mut` is `Some`.
        self.get_mut(id)
            .scopes
            .last_mut()
            .and_then(|scope| scope.insert(name.to_owned(), ident))
    }

    pub fn lookup_in_scope_chain(&self, id: ModuleId, name: &str) -> Option<IdentId> {
        self.get(id)
            .scope_chain()
            .find_map(|scope| scope.get(name).copied())
    }

    pub fn lookup_in_module_scope(&self, id: ModuleId, name: &str) -> Option<IdentId> {
        self.get(id).module_scope().get(name).copied()
    }

    /// Detaches every scope above the module scope, so lookups see only the
    /// module level. Used while instantiating generics from a nested scope.
    pub fn split_scopes(&mut self, id: ModuleId) -> Vec<Scope> {
        self.get_mut(id).scopes.split_off(1)
    }

    pub fn restore_scopes(&mut self, id: ModuleId, scopes: Vec<Scope>) {
        let module = self.get_mut(id);
        module.scopes.truncate(1);
        module.scopes.extend(scopes);
    }
}
