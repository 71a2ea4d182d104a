use std::collections::HashMap;

use compact_str::CompactString;

use crate::instruction::Slot;

#[derive(Debug)]
/// The variables declared directly in one lexical scope.
pub struct Frame {
    /// The stack size when the scope was entered.
    base: usize,
    vars: HashMap<CompactString, Slot>,
}

impl Frame {
    /// The stack size to restore when the scope exits.
    pub fn base(&self) -> usize {
        self.base
    }
}

#[derive(Debug, Default)]
/// A stack of frames mapping identifiers to stack slots. The innermost scope is last.
pub struct SymbolTable {
    frames: Vec<Frame>,
}

impl SymbolTable {
    /// Enters a new scope that starts at a stack size of `base`.
    pub fn push_frame(&mut self, base: usize) {
        self.frames.push(Frame {
            base,
            vars: HashMap::new(),
        });
    }

    /// Leaves the innermost scope and returns it.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Binds `name` to `slot` in the innermost frame.
    ///
    /// Returns the existing slot without changing anything if `name` is already declared in the
    /// innermost frame. Names in outer frames may be shadowed.
    pub fn declare(&mut self, name: &str, slot: Slot) -> Result<(), Slot> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        if let Some(existing) = frame.vars.get(name) {
            return Err(*existing);
        }
        frame.vars.insert(CompactString::new(name), slot);
        Ok(())
    }

    /// Returns `true` if `name` is declared in the innermost frame.
    pub fn declared_in_current_frame(&self, name: &str) -> bool {
        self.frames
            .last()
            .is_some_and(|frame| frame.vars.contains_key(name))
    }

    /// Returns the slot of `name`, searching from the innermost frame outwards.
    pub fn resolve(&self, name: &str) -> Option<Slot> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.vars.get(name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_innermost_frame() {
        let mut symbols = SymbolTable::default();
        symbols.push_frame(0);
        symbols.declare("x", Slot(0)).unwrap();
        symbols.push_frame(1);
        symbols.declare("x", Slot(1)).unwrap();
        assert_eq!(symbols.resolve("x"), Some(Slot(1)));

        let inner = symbols.pop_frame().unwrap();
        assert_eq!(inner.base(), 1);
        assert_eq!(symbols.resolve("x"), Some(Slot(0)));
    }

    #[test]
    fn outer_names_are_visible_in_inner_frames() {
        let mut symbols = SymbolTable::default();
        symbols.push_frame(0);
        symbols.declare("x", Slot(0)).unwrap();
        symbols.push_frame(1);
        assert_eq!(symbols.resolve("x"), Some(Slot(0)));
        assert_eq!(symbols.resolve("y"), None);
    }

    #[test]
    fn redeclaring_in_the_same_frame_fails() {
        let mut symbols = SymbolTable::default();
        symbols.push_frame(0);
        symbols.declare("x", Slot(0)).unwrap();
        assert!(symbols.declared_in_current_frame("x"));
        assert_eq!(symbols.declare("x", Slot(1)), Err(Slot(0)));
        assert_eq!(symbols.resolve("x"), Some(Slot(0)));
    }

    #[test]
    fn names_are_forgotten_when_frame_is_popped() {
        let mut symbols = SymbolTable::default();
        symbols.push_frame(0);
        symbols.push_frame(0);
        symbols.declare("y", Slot(0)).unwrap();
        symbols.pop_frame();
        assert!(!symbols.declared_in_current_frame("y"));
        assert_eq!(symbols.resolve("y"), None);
        assert!(symbols.pop_frame().is_some());
        assert!(symbols.pop_frame().is_none());
    }
}
