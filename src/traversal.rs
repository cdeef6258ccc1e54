//! Lazy subtree traversal.
//!
//! Every call produces a fresh, restartable, finite sequence; concurrent
//! iterations over an unmutated structure do not interfere. Sequences
//! are pull-based and never recurse, so traversal depth is bounded by
//! heap, not by the native call stack.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::node::NodeRef;
use crate::search::RECURSION_LIMIT;

/// Iterator over a subtree, including the start node.
///
/// BFS uses the deque as a queue; DFS pre-order uses it as a stack with
/// children pushed in reverse order so left-to-right order is preserved.
/// In visible-only mode a collapsed node is still yielded but never
/// expanded.
pub struct Descendants<T> {
    deque: VecDeque<NodeRef<T>>,
    depth_first: bool,
    visible_only: bool,
}

impl<T> Descendants<T> {
    pub(crate) fn new(start: &NodeRef<T>, depth_first: bool, visible_only: bool) -> Self {
        let mut deque = VecDeque::new();
        deque.push_back(Rc::clone(start));
        Self {
            deque,
            depth_first,
            visible_only,
        }
    }
}

impl<T> Iterator for Descendants<T> {
    type Item = NodeRef<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = if self.depth_first {
            self.deque.pop_back()
        } else {
            self.deque.pop_front()
        }?;
        {
            let n = node.borrow();
            if !(self.visible_only && n.collapsed) {
                if self.depth_first {
                    for child in n.children.iter().rev() {
                        self.deque.push_back(Rc::clone(child));
                    }
                } else {
                    for child in n.children.iter() {
                        self.deque.push_back(Rc::clone(child));
                    }
                }
            }
        }
        Some(node)
    }
}

/// Lazy ancestor sequence, immediate parent first, root last.
pub struct Ancestors<T> {
    cur: Option<NodeRef<T>>,
}

impl<T> Ancestors<T> {
    pub(crate) fn new(start: &NodeRef<T>) -> Self {
        Self {
            cur: start.borrow().parent.upgrade(),
        }
    }
}

impl<T> Iterator for Ancestors<T> {
    type Item = NodeRef<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur.take()?;
        self.cur = { node.borrow().parent.upgrade() };
        Some(node)
    }
}

pub trait TreeWalk<T> {
    /// All nodes of this subtree, self included. BFS by default, DFS
    /// pre-order when `depth_first`.
    fn descendants(&self, depth_first: bool) -> Descendants<T>;
    /// Like [`descendants`](TreeWalk::descendants), but never expands
    /// beneath a collapsed node (the collapsed node itself is yielded).
    fn visible_descendants(&self, depth_first: bool) -> Descendants<T>;
    /// Lazy ancestor chain, immediate parent → root.
    fn parents(&self) -> Ancestors<T>;

    /// All items of the subtree in BFS order.
    fn flattened_items(&self) -> Vec<T>
    where
        T: Clone;
    /// All item keys of the subtree in BFS order.
    fn flattened_keys(&self) -> Vec<String>;
    /// Total item count across the subtree.
    fn flattened_len(&self) -> usize;
    /// All childless nodes in subtree (DFS) order.
    fn leaves(&self) -> Vec<NodeRef<T>>;
    /// All nodes exactly `depth` hops below this node.
    fn nodes_at_depth(&self, depth: usize) -> Vec<NodeRef<T>>;
}

impl<T> TreeWalk<T> for NodeRef<T> {
    fn descendants(&self, depth_first: bool) -> Descendants<T> {
        Descendants::new(self, depth_first, false)
    }

    fn visible_descendants(&self, depth_first: bool) -> Descendants<T> {
        Descendants::new(self, depth_first, true)
    }

    fn parents(&self) -> Ancestors<T> {
        Ancestors::new(self)
    }

    fn flattened_items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.descendants(false)
            .flat_map(|n| n.borrow().items.clone())
            .collect()
    }

    fn flattened_keys(&self) -> Vec<String> {
        self.descendants(false).flat_map(|n| n.borrow().keys()).collect()
    }

    fn flattened_len(&self) -> usize {
        flattened_len_hybrid(self, 0)
    }

    fn leaves(&self) -> Vec<NodeRef<T>> {
        let mut out = Vec::new();
        leaves_hybrid(self, 0, &mut out);
        out
    }

    fn nodes_at_depth(&self, depth: usize) -> Vec<NodeRef<T>> {
        let mut out = Vec::new();
        let mut queue: VecDeque<(NodeRef<T>, usize)> = VecDeque::new();
        queue.push_back((Rc::clone(self), 0));
        while let Some((node, d)) = queue.pop_front() {
            if d == depth {
                out.push(node);
                continue;
            }
            let n = node.borrow();
            for child in &n.children {
                queue.push_back((Rc::clone(child), d + 1));
            }
        }
        out
    }
}

/// Hybrid recursion: plain recursion per level until the threshold,
/// then a queue-based count identical in result.
fn flattened_len_hybrid<T>(node: &NodeRef<T>, depth: usize) -> usize {
    if depth >= RECURSION_LIMIT {
        let mut total = 0;
        let mut queue: VecDeque<NodeRef<T>> = VecDeque::new();
        queue.push_back(Rc::clone(node));
        while let Some(n) = queue.pop_front() {
            let b = n.borrow();
            total += b.items.len();
            for child in &b.children {
                queue.push_back(Rc::clone(child));
            }
        }
        return total;
    }
    let b = node.borrow();
    b.items.len()
        + b.children
            .iter()
            .map(|c| flattened_len_hybrid(c, depth + 1))
            .sum::<usize>()
}

/// Hybrid recursion with an explicit-stack fallback that preserves the
/// recursive form's left-to-right leaf order.
fn leaves_hybrid<T>(node: &NodeRef<T>, depth: usize, out: &mut Vec<NodeRef<T>>) {
    if depth >= RECURSION_LIMIT {
        let mut stack = vec![Rc::clone(node)];
        while let Some(n) = stack.pop() {
            let b = n.borrow();
            if b.children.is_empty() {
                drop(b);
                out.push(n);
            } else {
                for child in b.children.iter().rev() {
                    stack.push(Rc::clone(child));
                }
            }
        }
        return;
    }
    let b = node.borrow();
    if b.children.is_empty() {
        drop(b);
        out.push(Rc::clone(node));
    } else {
        let children: Vec<NodeRef<T>> = b.children.iter().map(Rc::clone).collect();
        drop(b);
        for child in children {
            leaves_hybrid(&child, depth + 1, out);
        }
    }
}
