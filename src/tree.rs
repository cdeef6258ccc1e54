//! Structural mutation and navigation over shared node handles.
//!
//! `Node<T>` methods cover single-cell state; everything that needs the
//! `Rc` identity itself (parent back-references, subtree depth rebase,
//! cycle guards) lives on [`TreeOps`], a trait implemented for the
//! `NodeRef<T>` alias since inherent impls on foreign types are not
//! allowed (E0116).

use std::collections::HashSet;
use std::rc::{Rc, Weak};

use tracing::instrument;

use crate::node::{CollapseDirective, NodeRef};
use crate::notify::Notify;
use crate::traversal::TreeWalk;

/// Set `depth` across a whole subtree, iteratively.
pub(crate) fn rebase_depth<T>(node: &NodeRef<T>, new_depth: usize) {
    let mut stack = vec![(Rc::clone(node), new_depth)];
    while let Some((n, d)) = stack.pop() {
        let mut b = n.borrow_mut();
        b.depth = d;
        for child in &b.children {
            stack.push((Rc::clone(child), d + 1));
        }
    }
}

/// Mark the cached height unknown on `node` and every ancestor, all the
/// way to the root. Invalidation never early-stops at an
/// already-invalid ancestor.
pub(crate) fn invalidate_height_up<T>(node: &NodeRef<T>) {
    let mut cur = Rc::clone(node);
    loop {
        cur.borrow().height_cache.set(None);
        let parent = { cur.borrow().parent.upgrade() };
        match parent {
            Some(p) => cur = p,
            None => break,
        }
    }
}

/// Remove `child` from its current parent's child list, clearing the
/// back-reference. Purely structural: no depth rebase, no version bump,
/// no notification. Returns the old parent, if any.
fn unlink_from_parent<T>(child: &NodeRef<T>) -> Option<NodeRef<T>> {
    let parent = child.borrow().parent.upgrade()?;
    {
        let cid = child.borrow().id.clone();
        let mut p = parent.borrow_mut();
        if let Some(pos) = p.child_index.remove(&cid) {
            p.children.remove(pos);
            p.rebuild_child_index();
        }
    }
    child.borrow_mut().parent = Weak::new();
    invalidate_height_up(&parent);
    Some(parent)
}

pub trait TreeOps<T> {
    // Child set
    fn add_child(&self, child: &NodeRef<T>, notify: Notify) -> bool;
    fn add_children(&self, children: &[NodeRef<T>], notify: Notify) -> usize;
    fn insert_child_at(&self, index: usize, child: &NodeRef<T>, notify: Notify) -> bool;
    fn remove_child(&self, id: &str, notify: Notify) -> Option<NodeRef<T>>;
    fn remove_children(&self, ids: &[&str], notify: Notify) -> Vec<NodeRef<T>>;
    fn clear_children(&self, notify: Notify) -> usize;
    fn reorder_child(&self, id: &str, new_index: usize, notify: Notify) -> bool;
    fn swap_children(&self, id_a: &str, id_b: &str, notify: Notify) -> bool;

    // Structural mutation
    fn detach(&self, notify: Notify) -> bool;
    fn move_to(&self, new_parent: &NodeRef<T>, notify: Notify) -> bool;
    fn replace_with(&self, other: &NodeRef<T>, notify: Notify) -> bool;

    // Navigation
    fn root(&self) -> NodeRef<T>;
    fn child_position(&self) -> Option<usize>;
    fn siblings(&self) -> Vec<NodeRef<T>>;
    fn path_from_root(&self) -> Vec<NodeRef<T>>;
    fn is_ancestor_of(&self, other: &NodeRef<T>) -> bool;
    fn is_descendant_of(&self, other: &NodeRef<T>) -> bool;
    fn is_sibling_of(&self, other: &NodeRef<T>) -> bool;
    fn common_ancestor_with(&self, other: &NodeRef<T>) -> Option<NodeRef<T>>;

    // Subtree collapse state
    fn expand_to_this(&self, notify: Notify) -> bool;
    fn collapse_to_level(&self, level: usize, notify: Notify) -> bool;
    fn expand_all(&self, notify: Notify) -> bool;
    fn collapse_all(&self, notify: Notify) -> bool;
    fn apply_collapsed(&self, collapsed_ids: &HashSet<String>, notify: Notify) -> bool;
}

impl<T> TreeOps<T> for NodeRef<T> {
    fn add_child(&self, child: &NodeRef<T>, notify: Notify) -> bool {
        let end = self.borrow().children.len();
        self.insert_child_at(end, child, notify)
    }

    fn add_children(&self, children: &[NodeRef<T>], notify: Notify) -> usize {
        let mut added = 0;
        for child in children {
            if self.add_child(child, Notify::Silent) {
                added += 1;
            }
        }
        if added > 0 {
            self.borrow().emit(notify);
        }
        added
    }

    #[instrument(level = "trace", skip_all, fields(index = index))]
    fn insert_child_at(&self, index: usize, child: &NodeRef<T>, notify: Notify) -> bool {
        // Cycle guards: a node cannot own itself or any of its
        // ancestors.
        if Rc::ptr_eq(self, child) || child.is_ancestor_of(self) {
            return false;
        }

        let old_parent = child.borrow().parent.upgrade();
        let same_parent = old_parent.as_ref().is_some_and(|p| Rc::ptr_eq(p, self));

        {
            let me = self.borrow();
            // When the child is re-inserted under the same parent it is
            // unlinked first, shrinking the list by one.
            let effective_len = me.children.len() - usize::from(same_parent);
            if index > effective_len {
                return false;
            }
            let cid = child.borrow().id.clone();
            if let Some(&pos) = me.child_index.get(&cid) {
                if !Rc::ptr_eq(&me.children[pos], child) {
                    // Sibling id collision.
                    return false;
                }
            }
        }

        // Single-ownership: attach implies prior detach.
        unlink_from_parent(child);

        let new_depth = {
            let mut me = self.borrow_mut();
            me.children.insert(index, Rc::clone(child));
            me.rebuild_child_index();
            me.depth + 1
        };
        child.borrow_mut().parent = Rc::downgrade(self);
        rebase_depth(child, new_depth);
        invalidate_height_up(self);

        self.borrow_mut().touch(notify);
        child.borrow_mut().touch(notify);
        if let Some(old) = old_parent {
            if !Rc::ptr_eq(&old, self) {
                old.borrow_mut().touch(notify);
            }
        }
        true
    }

    fn remove_child(&self, id: &str, notify: Notify) -> Option<NodeRef<T>> {
        let child = self.borrow().child(id)?;
        unlink_from_parent(&child);
        rebase_depth(&child, 0);
        self.borrow_mut().touch(notify);
        child.borrow_mut().touch(notify);
        Some(child)
    }

    fn remove_children(&self, ids: &[&str], notify: Notify) -> Vec<NodeRef<T>> {
        let mut removed = Vec::new();
        for id in ids {
            if let Some(child) = self.remove_child(id, Notify::Silent) {
                removed.push(child);
            }
        }
        if !removed.is_empty() {
            self.borrow().emit(notify);
        }
        removed
    }

    fn clear_children(&self, notify: Notify) -> usize {
        let drained: Vec<NodeRef<T>> = {
            let mut me = self.borrow_mut();
            me.child_index.clear();
            me.children.drain(..).collect()
        };
        if drained.is_empty() {
            return 0;
        }
        for child in &drained {
            child.borrow_mut().parent = Weak::new();
            rebase_depth(child, 0);
        }
        invalidate_height_up(self);
        self.borrow_mut().touch(notify);
        drained.len()
    }

    fn reorder_child(&self, id: &str, new_index: usize, notify: Notify) -> bool {
        let mut me = self.borrow_mut();
        let Some(&pos) = me.child_index.get(id) else {
            return false;
        };
        if new_index >= me.children.len() || new_index == pos {
            return false;
        }
        let child = me.children.remove(pos);
        me.children.insert(new_index, child);
        me.rebuild_child_index();
        me.touch(notify);
        true
    }

    fn swap_children(&self, id_a: &str, id_b: &str, notify: Notify) -> bool {
        let mut me = self.borrow_mut();
        let (Some(&pos_a), Some(&pos_b)) = (me.child_index.get(id_a), me.child_index.get(id_b))
        else {
            return false;
        };
        if pos_a == pos_b {
            return false;
        }
        me.children.swap(pos_a, pos_b);
        me.child_index.insert(id_a.to_string(), pos_b);
        me.child_index.insert(id_b.to_string(), pos_a);
        me.touch(notify);
        true
    }

    #[instrument(level = "trace", skip_all)]
    fn detach(&self, notify: Notify) -> bool {
        let Some(parent) = unlink_from_parent(self) else {
            return false;
        };
        rebase_depth(self, 0);
        parent.borrow_mut().touch(notify);
        self.borrow_mut().touch(notify);
        true
    }

    /// Refuses (false, no state change) when `new_parent` is this node
    /// or one of its descendants.
    #[instrument(level = "trace", skip_all)]
    fn move_to(&self, new_parent: &NodeRef<T>, notify: Notify) -> bool {
        new_parent.add_child(self, notify)
    }

    #[instrument(level = "trace", skip_all)]
    fn replace_with(&self, other: &NodeRef<T>, notify: Notify) -> bool {
        if Rc::ptr_eq(self, other) {
            return false;
        }
        let Some(parent) = self.borrow().parent.upgrade() else {
            return false;
        };
        if Rc::ptr_eq(&parent, other) || other.is_ancestor_of(&parent) {
            return false;
        }
        {
            let p = parent.borrow();
            let oid = other.borrow().id.clone();
            if let Some(&pos) = p.child_index.get(&oid) {
                if !Rc::ptr_eq(&p.children[pos], self) {
                    return false;
                }
            }
        }

        let other_old_parent = unlink_from_parent(other);

        // Position is looked up after the unlink: `other` may have been
        // a sibling, shifting positions.
        let pos = {
            let sid = self.borrow().id.clone();
            let p = parent.borrow();
            p.child_index[&sid]
        };
        {
            let mut p = parent.borrow_mut();
            let sid = self.borrow().id.clone();
            let oid = other.borrow().id.clone();
            p.children[pos] = Rc::clone(other);
            p.child_index.remove(&sid);
            p.child_index.insert(oid, pos);
        }
        self.borrow_mut().parent = Weak::new();
        rebase_depth(self, 0);
        other.borrow_mut().parent = Rc::downgrade(&parent);
        let child_depth = parent.borrow().depth + 1;
        rebase_depth(other, child_depth);
        invalidate_height_up(&parent);

        parent.borrow_mut().touch(notify);
        self.borrow_mut().touch(notify);
        other.borrow_mut().touch(notify);
        if let Some(old) = other_old_parent {
            if !Rc::ptr_eq(&old, &parent) {
                old.borrow_mut().touch(notify);
            }
        }
        true
    }

    fn root(&self) -> NodeRef<T> {
        let mut cur = Rc::clone(self);
        loop {
            let parent = { cur.borrow().parent.upgrade() };
            match parent {
                Some(p) => cur = p,
                None => return cur,
            }
        }
    }

    fn child_position(&self) -> Option<usize> {
        let parent = self.borrow().parent.upgrade()?;
        let sid = self.borrow().id.clone();
        let p = parent.borrow();
        p.child_index.get(&sid).copied()
    }

    fn siblings(&self) -> Vec<NodeRef<T>> {
        match self.borrow().parent.upgrade() {
            Some(parent) => parent
                .borrow()
                .children
                .iter()
                .filter(|c| !Rc::ptr_eq(c, self))
                .map(Rc::clone)
                .collect(),
            None => Vec::new(),
        }
    }

    fn path_from_root(&self) -> Vec<NodeRef<T>> {
        let mut path = vec![Rc::clone(self)];
        let mut cur = Rc::clone(self);
        loop {
            let parent = { cur.borrow().parent.upgrade() };
            match parent {
                Some(p) => {
                    path.push(Rc::clone(&p));
                    cur = p;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }

    fn is_ancestor_of(&self, other: &NodeRef<T>) -> bool {
        let mut cur = other.borrow().parent.upgrade();
        while let Some(node) = cur {
            if Rc::ptr_eq(&node, self) {
                return true;
            }
            cur = { node.borrow().parent.upgrade() };
        }
        false
    }

    fn is_descendant_of(&self, other: &NodeRef<T>) -> bool {
        other.is_ancestor_of(self)
    }

    fn is_sibling_of(&self, other: &NodeRef<T>) -> bool {
        if Rc::ptr_eq(self, other) {
            return false;
        }
        match (
            self.borrow().parent.upgrade(),
            other.borrow().parent.upgrade(),
        ) {
            (Some(a), Some(b)) => Rc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    /// Lowest common ancestor (self-inclusive), `None` when the two
    /// nodes live in different trees. Ids are only unique among
    /// siblings, so the intersection runs over node identities.
    fn common_ancestor_with(&self, other: &NodeRef<T>) -> Option<NodeRef<T>> {
        let own_chain = self.path_from_root();
        let mut cur = Some(Rc::clone(other));
        while let Some(node) = cur {
            if own_chain.iter().any(|n| Rc::ptr_eq(n, &node)) {
                return Some(node);
            }
            cur = { node.borrow().parent.upgrade() };
        }
        None
    }

    /// Expand every ancestor so a visible-only traversal from the root
    /// reaches this node.
    fn expand_to_this(&self, notify: Notify) -> bool {
        let mut changed = false;
        let mut cur = self.borrow().parent.upgrade();
        while let Some(node) = cur {
            changed |= node
                .borrow_mut()
                .set_collapsed(CollapseDirective::Expand, Notify::Silent);
            cur = { node.borrow().parent.upgrade() };
        }
        if changed {
            self.borrow().emit(notify);
        }
        changed
    }

    /// Within this subtree: nodes at relative depth < `level` expanded,
    /// at relative depth >= `level` collapsed.
    fn collapse_to_level(&self, level: usize, notify: Notify) -> bool {
        let base = self.borrow().depth;
        let mut changed = false;
        for node in self.descendants(false) {
            let directive = if node.borrow().depth - base < level {
                CollapseDirective::Expand
            } else {
                CollapseDirective::Collapse
            };
            changed |= node.borrow_mut().set_collapsed(directive, Notify::Silent);
        }
        if changed {
            self.borrow().emit(notify);
        }
        changed
    }

    fn expand_all(&self, notify: Notify) -> bool {
        let mut changed = false;
        for node in self.descendants(false) {
            changed |= node
                .borrow_mut()
                .set_collapsed(CollapseDirective::Expand, Notify::Silent);
        }
        if changed {
            self.borrow().emit(notify);
        }
        changed
    }

    fn collapse_all(&self, notify: Notify) -> bool {
        let mut changed = false;
        for node in self.descendants(false) {
            changed |= node
                .borrow_mut()
                .set_collapsed(CollapseDirective::Collapse, Notify::Silent);
        }
        if changed {
            self.borrow().emit(notify);
        }
        changed
    }

    /// Bulk restore for external snapshot serializers: collapsed iff
    /// the node's id is in the set.
    fn apply_collapsed(&self, collapsed_ids: &HashSet<String>, notify: Notify) -> bool {
        let mut changed = false;
        for node in self.descendants(false) {
            let directive = if collapsed_ids.contains(node.borrow().id()) {
                CollapseDirective::Collapse
            } else {
                CollapseDirective::Expand
            };
            changed |= node.borrow_mut().set_collapsed(directive, Notify::Silent);
        }
        if changed {
            self.borrow().emit(notify);
        }
        changed
    }
}
