//! Fiber storage and tree walks.

use std::ops::{Index, IndexMut};

use slotmap::SlotMap;

use super::{Fiber, FiberId};

#[derive(Default)]
pub struct FiberArena {
    fibers: SlotMap<FiberId, Fiber>,
}

impl FiberArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fiber: Fiber) -> FiberId {
        self.fibers.insert(fiber)
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber> {
        self.fibers.get(id)
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber> {
        self.fibers.get_mut(id)
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.fibers.contains_key(id)
    }

    pub fn remove(&mut self, id: FiberId) -> Option<Fiber> {
        self.fibers.remove(id)
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Committed counterpart of `id`, if it still exists.
    pub fn alternate(&self, id: FiberId) -> Option<FiberId> {
        self.get(id)?.alternate.filter(|alt| self.contains(*alt))
    }

    /// Direct children in sibling order.
    pub fn children(&self, id: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = self.get(id).and_then(|f| f.child);
        while let Some(child) = next {
            out.push(child);
            next = self.get(child).and_then(|f| f.sibling);
        }
        out
    }

    /// Next fiber in depth-first pre-order, staying inside `top`.
    pub fn next_fiber(&self, id: FiberId, top: FiberId) -> Option<FiberId> {
        if let Some(child) = self.get(id)?.child {
            return Some(child);
        }
        self.next_after_subtree(id, top)
    }

    /// Next fiber in pre-order once the subtree of `id` is skipped.
    pub fn next_after_subtree(&self, id: FiberId, top: FiberId) -> Option<FiberId> {
        let mut current = id;
        while current != top {
            let fiber = self.get(current)?;
            if let Some(sibling) = fiber.sibling {
                return Some(sibling);
            }
            current = fiber.parent?;
        }
        None
    }

    /// All fibers under `top` (inclusive) in pre-order.
    pub fn preorder(&self, top: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = self.contains(top).then_some(top);
        while let Some(id) = next {
            out.push(id);
            next = self.next_fiber(id, top);
        }
        out
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: FiberId) -> impl Iterator<Item = FiberId> + '_ {
        std::iter::successors(self.get(id).and_then(|f| f.parent), move |current| {
            self.get(*current).and_then(|f| f.parent)
        })
    }

    /// Link `child` as the next child of `parent` after `previous`.
    pub fn link(&mut self, parent: FiberId, previous: Option<FiberId>, child: FiberId) {
        match previous {
            Some(prev) => self[prev].sibling = Some(child),
            None => self[parent].child = Some(child),
        }
        let fiber = &mut self[child];
        fiber.parent = Some(parent);
        fiber.sibling = None;
    }
}

impl Index<FiberId> for FiberArena {
    type Output = Fiber;

    fn index(&self, id: FiberId) -> &Fiber {
        &self.fibers[id]
    }
}

impl IndexMut<FiberId> for FiberArena {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber {
        &mut self.fibers[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ContextMap;
    use crate::fiber::{NodePart, Part};
    use crate::host::{MemoryHost, OutputId};

    fn part() -> (MemoryHost, Part) {
        let host = MemoryHost::new();
        let container: OutputId = host.container();
        (host, Part::Node(NodePart::new(container)))
    }

    fn tree(arena: &mut FiberArena, part: Part) -> [FiberId; 5] {
        // root ─ a ─ a1
        //      │   └ a2
        //      └ b
        let make = |arena: &mut FiberArena| arena.insert(Fiber::new(None, part, ContextMap::new(), 1));
        let root = make(arena);
        let a = make(arena);
        let b = make(arena);
        let a1 = make(arena);
        let a2 = make(arena);
        arena.link(root, None, a);
        arena.link(root, Some(a), b);
        arena.link(a, None, a1);
        arena.link(a, Some(a1), a2);
        [root, a, b, a1, a2]
    }

    #[test]
    fn test_preorder_walk() {
        let (_host, part) = part();
        let mut arena = FiberArena::new();
        let [root, a, b, a1, a2] = tree(&mut arena, part);

        assert_eq!(arena.preorder(root), vec![root, a, a1, a2, b]);
        assert_eq!(arena.preorder(a), vec![a, a1, a2], "walk stays inside the subtree");
        assert_eq!(arena.children(root), vec![a, b]);
    }

    #[test]
    fn test_skip_subtree() {
        let (_host, part) = part();
        let mut arena = FiberArena::new();
        let [root, a, b, _a1, a2] = tree(&mut arena, part);

        assert_eq!(arena.next_after_subtree(a, root), Some(b));
        assert_eq!(arena.next_after_subtree(a2, root), Some(b));
        assert_eq!(arena.next_after_subtree(b, root), None);
        assert_eq!(arena.next_after_subtree(a, a), None, "top ends the walk");
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let (_host, part) = part();
        let mut arena = FiberArena::new();
        let [root, a, _b, _a1, a2] = tree(&mut arena, part);

        assert_eq!(arena.ancestors(a2).collect::<Vec<_>>(), vec![a, root]);
    }

    #[test]
    fn test_alternate_of_removed_fiber_resolves_to_none() {
        let (_host, part) = part();
        let mut arena = FiberArena::new();
        let old = arena.insert(Fiber::new(None, part, ContextMap::new(), 1));
        let new = arena.insert(Fiber::from_alternate(old, &arena[old], None, part, 2));

        assert_eq!(arena.alternate(new), Some(old));
        arena.remove(old);
        assert_eq!(arena.alternate(new), None, "freed generation is unreachable");
    }
}
