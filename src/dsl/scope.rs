use indexmap::IndexMap;

use super::ast::Local;
use super::error::CompileError;
use super::span::Span;
use super::types::PrimitiveType;

/// Lexical scope of local variables. A child borrows its parent, so a scope
/// chain lives exactly as long as the block being checked.
#[derive(Debug, Default)]
pub struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    variables: IndexMap<String, Local>,
}

impl<'a> Scope<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Scope<'_> {
        Scope {
            parent: Some(self),
            variables: IndexMap::new(),
        }
    }

    /// Declare `local` in this scope. Fails when the name is visible already.
    pub fn declare(&mut self, local: Local) -> bool {
        if self.lookup(&local.name).is_some() {
            return false;
        }
        self.variables.insert(local.name.clone(), local);
        true
    }

    pub fn lookup(&self, name: &str) -> Option<&Local> {
        self.variables
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.lookup(name)))
    }
}

/// Script-wide array slots. The runtime offers a fixed number of them.
#[derive(Debug)]
pub struct ArrayTable {
    slots: Vec<(String, PrimitiveType)>,
    capacity: usize,
}

impl ArrayTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Allocate the next slot. `Ok(None)` when the name is taken; running out
    /// of slots is an error for the whole script.
    pub fn define(&mut self, name: &str, ty: PrimitiveType, span: Span) -> Result<Option<u8>, CompileError> {
        if self.lookup(name).is_some() {
            return Ok(None);
        }
        let index = self.slots.len();
        let slot = u8::try_from(index).ok().filter(|_| index < self.capacity).ok_or_else(|| {
            CompileError::semantic(
                format!("Too many arrays declared, a script may only declare {}", self.capacity),
                span,
            )
        })?;
        self.slots.push((name.to_string(), ty));
        Ok(Some(slot))
    }

    pub fn lookup(&self, name: &str) -> Option<(u8, PrimitiveType)> {
        self.slots
            .iter()
            .position(|(n, _)| n == name)
            .and_then(|index| Some((u8::try_from(index).ok()?, self.slots.get(index)?.1)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn local(id: u32, name: &str) -> Local {
        Local {
            id,
            name: name.to_string(),
            ty: PrimitiveType::Int,
        }
    }

    #[test]
    fn child_sees_parent_and_rejects_shadowing() {
        let mut root = Scope::new();
        assert!(root.declare(local(0, "a")));
        let mut child = root.child();
        assert_eq!(child.lookup("a").unwrap().id, 0);
        assert!(!child.declare(local(1, "a")));
        assert!(child.declare(local(2, "b")));
        drop(child);
        assert!(root.lookup("b").is_none());
        assert!(root.declare(local(3, "b")));
    }

    #[test]
    fn array_slots_are_bounded() {
        let mut arrays = ArrayTable::new(2);
        assert_eq!(arrays.define("a", PrimitiveType::Int, Span::empty()).unwrap(), Some(0));
        assert_eq!(arrays.define("a", PrimitiveType::Obj, Span::empty()).unwrap(), None);
        assert_eq!(arrays.define("b", PrimitiveType::Obj, Span::empty()).unwrap(), Some(1));
        assert!(arrays.define("c", PrimitiveType::Int, Span::empty()).is_err());
        assert_eq!(arrays.lookup("b"), Some((1, PrimitiveType::Obj)));
        assert_eq!(arrays.len(), 2);
    }
}
