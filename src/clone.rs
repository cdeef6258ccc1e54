//! Node duplication and structural equality.
//!
//! Copies never carry subscribers, version history, or the parent link:
//! a copy is always a fresh detached root. Deep variants are
//! hybrid-recursive with an explicit-stack fallback so arbitrarily deep
//! trees stay within the native call stack.

use std::rc::Rc;

use tracing::instrument;

use crate::node::{Node, NodeRef};
use crate::notify::Notify;
use crate::search::RECURSION_LIMIT;

impl<T: Clone> Node<T> {
    /// Childless copy of this node, with optional field overrides.
    /// Subscribers and the version counter are not copied; the result is
    /// a detached root.
    pub fn copy_with(
        &self,
        id: Option<&str>,
        collapsed: Option<bool>,
        items: Option<Vec<T>>,
    ) -> NodeRef<T> {
        let id = id.map_or_else(|| self.id().to_string(), str::to_string);
        let node = Rc::new(std::cell::RefCell::new(Node::detached(
            id,
            Rc::clone(&self.key_of),
        )));
        {
            let mut n = node.borrow_mut();
            n.collapsed = collapsed.unwrap_or(self.collapsed);
            for item in items.unwrap_or_else(|| self.items.clone()) {
                n.add(item, Notify::Silent);
            }
            n.version = 0;
        }
        node
    }
}

impl<T: PartialEq> Node<T> {
    /// Item-level equality: same item sequence with matching keys.
    /// Ids, children, and collapse state are ignored.
    pub fn shallow_equals(&self, other: &Node<T>) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|(a, b)| (self.key_of)(a) == (other.key_of)(b) && a == b)
    }
}

pub trait TreeClone<T> {
    /// Copy this node, optionally with its whole subtree and a new id
    /// for the copy's root. Every copied node is fresh: no subscribers,
    /// no parent, version reset.
    fn clone_node(&self, deep: bool, new_id: Option<&str>) -> NodeRef<T>
    where
        T: Clone;

    /// Structural equality over the whole subtree: ids, collapse state,
    /// items (with keys), and child order must all match.
    fn deep_equals(&self, other: &NodeRef<T>) -> bool
    where
        T: PartialEq;
}

impl<T> TreeClone<T> for NodeRef<T> {
    #[instrument(level = "trace", skip_all, fields(deep = deep))]
    fn clone_node(&self, deep: bool, new_id: Option<&str>) -> NodeRef<T>
    where
        T: Clone,
    {
        let dst = self.borrow().copy_with(new_id, None, None);
        if deep {
            clone_children_hybrid(self, &dst, 0);
        }
        dst
    }

    fn deep_equals(&self, other: &NodeRef<T>) -> bool
    where
        T: PartialEq,
    {
        deep_equals_hybrid(self, other, 0)
    }
}

/// Attach a freshly built copy without the usual reparenting guards:
/// the destination tree is private to the clone in progress.
fn attach_copy<T>(parent: &NodeRef<T>, child: &NodeRef<T>) {
    let child_depth = {
        let mut p = parent.borrow_mut();
        let pos = p.children.len();
        p.child_index.insert(child.borrow().id().to_string(), pos);
        p.children.push(Rc::clone(child));
        p.height_cache.set(None);
        p.depth() + 1
    };
    let mut c = child.borrow_mut();
    c.parent = Rc::downgrade(parent);
    c.depth = child_depth;
}

fn clone_children_hybrid<T: Clone>(src: &NodeRef<T>, dst: &NodeRef<T>, depth: usize) {
    if depth >= RECURSION_LIMIT {
        // Pair stack of (source node, its copy); order within one level
        // is preserved because children attach before being pushed.
        let mut stack = vec![(Rc::clone(src), Rc::clone(dst))];
        while let Some((s, d)) = stack.pop() {
            let children: Vec<NodeRef<T>> = s.borrow().children().iter().map(Rc::clone).collect();
            for child in children {
                let copy = { child.borrow().copy_with(None, None, None) };
                attach_copy(&d, &copy);
                stack.push((child, copy));
            }
        }
        return;
    }
    let children: Vec<NodeRef<T>> = src.borrow().children().iter().map(Rc::clone).collect();
    for child in children {
        let copy = { child.borrow().copy_with(None, None, None) };
        attach_copy(dst, &copy);
        clone_children_hybrid(&child, &copy, depth + 1);
    }
}

fn nodes_match<T: PartialEq>(a: &NodeRef<T>, b: &NodeRef<T>) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    let x = a.borrow();
    let y = b.borrow();
    x.id() == y.id()
        && x.is_collapsed() == y.is_collapsed()
        && x.child_count() == y.child_count()
        && x.shallow_equals(&y)
}

fn child_pairs<T>(a: &NodeRef<T>, b: &NodeRef<T>) -> Vec<(NodeRef<T>, NodeRef<T>)> {
    let x = a.borrow();
    let y = b.borrow();
    x.children()
        .iter()
        .zip(y.children().iter())
        .map(|(ca, cb)| (Rc::clone(ca), Rc::clone(cb)))
        .collect()
}

fn deep_equals_hybrid<T: PartialEq>(a: &NodeRef<T>, b: &NodeRef<T>, depth: usize) -> bool {
    if depth >= RECURSION_LIMIT {
        let mut stack = vec![(Rc::clone(a), Rc::clone(b))];
        while let Some((x, y)) = stack.pop() {
            if !nodes_match(&x, &y) {
                return false;
            }
            stack.extend(child_pairs(&x, &y));
        }
        return true;
    }
    if !nodes_match(a, b) {
        return false;
    }
    child_pairs(a, b)
        .iter()
        .all(|(ca, cb)| deep_equals_hybrid(ca, cb, depth + 1))
}
