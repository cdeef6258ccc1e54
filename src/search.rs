//! Subtree lookup by node id, item key, or item.
//!
//! DFS pre-order, O(subtree size) worst case. Tree depth is caller
//! controlled, so every search is hybrid-recursive: plain recursion up
//! to [`RECURSION_LIMIT`], then an explicit stack with identical
//! visitation order.

use std::rc::Rc;

use tracing::instrument;

use crate::node::{Node, NodeRef};

/// Recursion depth at which subtree algorithms switch from the call
/// stack to an explicit stack/queue.
pub(crate) const RECURSION_LIMIT: usize = 100;

pub trait TreeSearch<T> {
    /// First node in this subtree (self included, DFS pre-order) with
    /// the given id.
    fn find_node(&self, id: &str) -> Option<NodeRef<T>>;
    /// First node whose item set contains `key`.
    fn find_node_by_key(&self, key: &str) -> Option<NodeRef<T>>;
    /// First node containing an item with the same key as `item` (each
    /// node applies its own extractor).
    fn find_node_by_item(&self, item: &T) -> Option<NodeRef<T>>;
}

impl<T> TreeSearch<T> for NodeRef<T> {
    #[instrument(level = "trace", skip_all, fields(id = id))]
    fn find_node(&self, id: &str) -> Option<NodeRef<T>> {
        find_hybrid(self, 0, &|n: &Node<T>| n.id == id)
    }

    #[instrument(level = "trace", skip_all, fields(key = key))]
    fn find_node_by_key(&self, key: &str) -> Option<NodeRef<T>> {
        find_hybrid(self, 0, &|n: &Node<T>| n.key_index.contains_key(key))
    }

    fn find_node_by_item(&self, item: &T) -> Option<NodeRef<T>> {
        find_hybrid(self, 0, &|n: &Node<T>| {
            let key = (n.key_of)(item);
            n.key_index.contains_key(&key)
        })
    }
}

fn find_hybrid<T>(
    node: &NodeRef<T>,
    depth: usize,
    matches: &impl Fn(&Node<T>) -> bool,
) -> Option<NodeRef<T>> {
    if depth >= RECURSION_LIMIT {
        return find_iterative(node, matches);
    }
    if matches(&node.borrow()) {
        return Some(Rc::clone(node));
    }
    let children: Vec<NodeRef<T>> = node.borrow().children.iter().map(Rc::clone).collect();
    for child in children {
        if let Some(found) = find_hybrid(&child, depth + 1, matches) {
            return Some(found);
        }
    }
    None
}

/// Explicit-stack DFS pre-order, children pushed in reverse so the
/// visitation order matches the recursive form.
fn find_iterative<T>(node: &NodeRef<T>, matches: &impl Fn(&Node<T>) -> bool) -> Option<NodeRef<T>> {
    let mut stack = vec![Rc::clone(node)];
    while let Some(n) = stack.pop() {
        if matches(&n.borrow()) {
            return Some(n);
        }
        let b = n.borrow();
        for child in b.children.iter().rev() {
            stack.push(Rc::clone(child));
        }
    }
    None
}
