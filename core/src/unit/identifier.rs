use bitflags::bitflags;

use crate::syntax::{Expr, Span};
use crate::types::TypeId;

use super::{FuncId, ModuleId};

/// Index of an [`Identifier`] in its [`IdentifierArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentId(pub u32);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IdentFlags: u16 {
        const CONST = 1 << 0;
        const ALIAS = 1 << 1;
        const GENERIC = 1 << 2;
        const ARGUMENT = 1 << 3;
        const NATIVE = 1 << 4;
        const FUNCTION = 1 << 5;
        const TYPE = 1 << 6;
        const MODULE = 1 << 7;
        const EXPORTED = 1 << 8;
    }
}

/// Where the value behind an identifier lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Storage {
    #[default]
    Unassigned,
    /// A slot in static memory.
    Static(u32),
    /// A stack slot; the code generator picks the slot.
    Local,
    Function(FuncId),
    /// Index into the unit's native table.
    Native(u32),
    Type(TypeId),
    Module(ModuleId),
    /// A generic parameter bound to a concrete type.
    Generic(TypeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub index: IdentId,
    pub storage: Storage,
    pub flags: IdentFlags,
    /// Set on aliases: the identifier this one forwards to.
    pub aliasee: Option<IdentId>,
    /// Literal this identifier is known to hold (constants only).
    pub current: Option<Expr>,
    pub ty: TypeId,
    /// Type arguments of a generic instance.
    pub generic_args: Vec<TypeId>,
    use_count: u32,
    pub span: Span,
}

impl Identifier {
    pub fn is_const(&self) -> bool {
        self.flags.contains(IdentFlags::CONST)
    }

    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    /// What kind of entity this names, for error messages.
    pub fn describe(&self) -> &'static str {
        if self.flags.contains(IdentFlags::MODULE) {
            "module"
        } else if self.flags.contains(IdentFlags::TYPE) {
            "type"
        } else if self.flags.contains(IdentFlags::FUNCTION) {
            "function"
        } else if self.flags.contains(IdentFlags::NATIVE) {
            "native function"
        } else {
            "variable"
        }
    }
}

/// Owns every identifier of a compilation unit.
///
/// An alias is a separate record whose `aliasee` points at its target. Every
/// accessor that mutates or counts uses goes through [`unalias`](Self::unalias)
/// first, so aliases never carry state of their own.
#[derive(Debug, Clone, Default)]
pub struct IdentifierArena {
    idents: Vec<Identifier>,
}

impl IdentifierArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.idents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idents.is_empty()
    }

    pub fn declare(
        &mut self,
        name: &str,
        flags: IdentFlags,
        storage: Storage,
        ty: TypeId,
        span: Span,
    ) -> IdentId {
        let index = IdentId(self.idents.len() as u32);
        self.idents.push(Identifier {
            name: name.to_owned(),
            index,
            storage,
            flags,
            aliasee: None,
            current: None,
            ty,
            generic_args: Vec::new(),
            use_count: 0,
            span,
        });
        index
    }

    /// Declares `name` as an alias of `target`.
    pub fn alias(&mut self, name: &str, target: IdentId, span: Span) -> IdentId {
        let target = self.unalias(target);
        let (ty, storage, flags) = {
            let t = &self.idents[target.0 as usize];
            (t.ty, t.storage, t.flags)
        };
        let id = self.declare(name, flags | IdentFlags::ALIAS, storage, ty, span);
        self.idents[id.0 as usize].aliasee = Some(target);
        id
    }

    /// Follows alias links to the identifier that holds the state.
    pub fn unalias(&self, mut id: IdentId) -> IdentId {
        while let Some(next) = self.idents[id.0 as usize].aliasee {
            id = next;
        }
        id
    }

    /// The record behind `id`, after unaliasing.
    pub fn get(&self, id: IdentId) -> &Identifier {
        &self.idents[self.unalias(id).0 as usize]
    }

    pub fn get_mut(&mut self, id: IdentId) -> &mut Identifier {
        let id = self.unalias(id);
        &mut self.idents[id.0 as usize]
    }

    /// The record itself, even if it is an alias.
    pub fn raw(&self, id: IdentId) -> &Identifier {
        &self.idents[id.0 as usize]
    }

    pub fn add_use(&mut self, id: IdentId) {
        self.get_mut(id).use_count += 1;
    }

    pub fn release_use(&mut self, id: IdentId) {
        let ident = self.get_mut(id);
        ident.use_count = ident.use_count.saturating_sub(1);
    }

    pub fn use_count(&self, id: IdentId) -> u32 {
        self.get(id).use_count
    }

    pub fn bind_current(&mut self, id: IdentId, value: Expr) {
        self.get_mut(id).current = Some(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identifier> {
        self.idents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::build::int;
    use pretty_assertions::assert_eq;

    fn arena_with_x() -> (IdentifierArena, IdentId) {
        let mut arena = IdentifierArena::new();
        let x = arena.declare(
            "x",
            IdentFlags::CONST,
            Storage::Static(0),
            TypeId::INT,
            Span::default(),
        );
        (arena, x)
    }

    #[test]
    fn alias_forwards_uses_to_target() {
        let (mut arena, x) = arena_with_x();
        let y = arena.alias("y", x, Span::default());
        arena.add_use(y);
        arena.add_use(x);
        assert_eq!(arena.use_count(x), 2);
        assert_eq!(arena.raw(y).use_count(), 0);
        assert!(arena.raw(y).flags.contains(IdentFlags::ALIAS | IdentFlags::CONST));
    }

    #[test]
    fn alias_of_alias_points_at_the_root() {
        let (mut arena, x) = arena_with_x();
        let y = arena.alias("y", x, Span::default());
        let z = arena.alias("z", y, Span::default());
        assert_eq!(arena.raw(z).aliasee, Some(x));
        assert_eq!(arena.unalias(z), x);
    }

    #[test]
    fn bound_value_is_shared_through_alias() {
        let (mut arena, x) = arena_with_x();
        let y = arena.alias("y", x, Span::default());
        arena.bind_current(y, int(5));
        assert_eq!(arena.get(x).current, Some(int(5)));
    }

    #[test]
    fn release_use_saturates() {
        let (mut arena, x) = arena_with_x();
        arena.release_use(x);
        assert_eq!(arena.use_count(x), 0);
    }
}
