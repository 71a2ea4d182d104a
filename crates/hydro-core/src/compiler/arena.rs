use std::marker::PhantomData;

use bumpalo::Bump;

pub(crate) type BumpVec<'a, T> = bumpalo::collections::Vec<'a, T>;

/// An identifier for a node in a [`TypedStore`].
pub struct NodeId<T>(u32, PhantomData<fn() -> T>);

impl<T> NodeId<T> {
    fn new(idx: usize) -> NodeId<T> {
        NodeId(idx as u32, PhantomData)
    }

    /// Get the id as an index into its store.
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl<T> Eq for NodeId<T> {}
impl<T> Copy for NodeId<T> {}
impl<T> Clone for NodeId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for NodeId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> std::hash::Hash for NodeId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl<T> std::fmt::Debug for NodeId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let full_type_name = std::any::type_name::<T>();
        let type_name = full_type_name.split("::").last().unwrap_or("UNKNOWN");
        f.debug_tuple("NodeId")
            .field(&type_name)
            .field(&self.0)
            .finish()
    }
}

/// An append-only store for nodes of a single type.
///
/// Nodes live in bump allocated memory and are only released when the backing [`Bump`] is
/// dropped. Ids handed out by a store are only meaningful for that store.
#[derive(Debug, PartialEq)]
pub struct TypedStore<'bump, T> {
    nodes: BumpVec<'bump, T>,
}

impl<'bump, T> TypedStore<'bump, T> {
    /// Creates an empty store that allocates in `bump`.
    pub fn new_in(bump: &'bump Bump) -> Self {
        TypedStore {
            nodes: BumpVec::new_in(bump),
        }
    }

    /// Registers a new node in the store.
    pub fn alloc(&mut self, node: T) -> NodeId<T> {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// The number of nodes in the store.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl<T> std::ops::Index<NodeId<T>> for TypedStore<'_, T> {
    type Output = T;

    fn index(&self, id: NodeId<T>) -> &T {
        &self.nodes[id.idx()]
    }
}
