//! Tree node container: an ordered, keyed item set plus ordered child
//! nodes, forming a single-parent hierarchy.
//!
//! Nodes are shared as `Rc<RefCell<Node<T>>>` with `Weak` parent
//! back-references; the parent's child list is the sole ownership edge.
//! Item keys are extracted by an injected function and are unique within
//! one node's item set only — sibling nodes may carry the same key.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::instrument;

use crate::notify::{Notifier, Notify, SubscriberHandle};

/// Shared handle to a tree node.
pub type NodeRef<T> = Rc<RefCell<Node<T>>>;
/// Non-owning handle, used for parent back-references.
pub type WeakNodeRef<T> = Weak<RefCell<Node<T>>>;

/// Per-item key extractor. Must be pure and constant for the node's
/// lifetime.
pub type KeyOf<T> = Rc<dyn Fn(&T) -> String>;

/// Directive for the collapse state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseDirective {
    Collapse,
    Expand,
    Toggle,
}

pub struct Node<T> {
    pub(crate) id: String,
    pub(crate) key_of: KeyOf<T>,
    pub(crate) items: Vec<T>,
    /// key → position in `items`
    pub(crate) key_index: HashMap<String, usize>,
    /// Insertion order is traversal order.
    pub(crate) children: Vec<NodeRef<T>>,
    /// child id → position in `children`
    pub(crate) child_index: HashMap<String, usize>,
    pub(crate) parent: WeakNodeRef<T>,
    /// Edge count from the root; 0 for a root.
    pub(crate) depth: usize,
    /// Lazily cached subtree height; `None` = unknown.
    pub(crate) height_cache: Cell<Option<usize>>,
    pub(crate) collapsed: bool,
    pub(crate) version: u64,
    pub(crate) notifier: Notifier,
}

impl<T> Node<T> {
    /// Create a detached root node.
    pub fn new(id: impl Into<String>, key_of: impl Fn(&T) -> String + 'static) -> NodeRef<T> {
        Rc::new(RefCell::new(Self::detached(id.into(), Rc::new(key_of))))
    }

    /// Create a detached root node pre-filled with `items`. Items whose
    /// key is already taken within the initial set are dropped.
    pub fn with_items(
        id: impl Into<String>,
        key_of: impl Fn(&T) -> String + 'static,
        items: Vec<T>,
    ) -> NodeRef<T> {
        let node = Self::new(id, key_of);
        {
            let mut n = node.borrow_mut();
            for item in items {
                n.add(item, Notify::Silent);
            }
            n.version = 0;
        }
        node
    }

    pub(crate) fn detached(id: String, key_of: KeyOf<T>) -> Self {
        Self {
            id,
            key_of,
            items: Vec::new(),
            key_index: HashMap::new(),
            children: Vec::new(),
            child_index: HashMap::new(),
            parent: Weak::new(),
            depth: 0,
            height_cache: Cell::new(Some(0)),
            collapsed: false,
            version: 0,
            notifier: Notifier::new(),
        }
    }

    // ── Identity and accessors ─────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Key of an item under this node's extractor.
    pub fn key_for(&self, item: &T) -> String {
        (self.key_of)(item)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Item keys in item order.
    pub fn keys(&self) -> Vec<String> {
        self.items.iter().map(|i| (self.key_of)(i)).collect()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.key_index.get(key).map(|&pos| &self.items[pos])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.key_index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn children(&self) -> &[NodeRef<T>] {
        &self.children
    }

    pub fn child(&self, id: &str) -> Option<NodeRef<T>> {
        self.child_index.get(id).map(|&pos| Rc::clone(&self.children[pos]))
    }

    pub fn child_ids(&self) -> Vec<String> {
        self.children.iter().map(|c| c.borrow().id.clone()).collect()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn parent(&self) -> Option<NodeRef<T>> {
        self.parent.upgrade()
    }

    pub fn is_root(&self) -> bool {
        self.parent.upgrade().is_none()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Monotonic counter, bumped on every structural or item mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    // ── Height (lazily cached) ─────────────────────────

    /// Edge count of the longest downward path to a leaf. Memoized;
    /// recomputed iteratively (post-order, explicit stack) so deep
    /// trees never exhaust the native call stack.
    pub fn height(&self) -> usize {
        if let Some(h) = self.height_cache.get() {
            return h;
        }
        if self.children.is_empty() {
            self.height_cache.set(Some(0));
            return 0;
        }

        // Fill descendant caches bottom-up.
        let mut stack: Vec<(NodeRef<T>, bool)> = Vec::new();
        for child in self.children.iter().rev() {
            stack.push((Rc::clone(child), false));
        }
        while let Some((node, expanded)) = stack.pop() {
            let n = node.borrow();
            if expanded {
                let h = if n.children.is_empty() {
                    0
                } else {
                    1 + n
                        .children
                        .iter()
                        .map(|c| c.borrow().height_cache.get().unwrap_or(0))
                        .max()
                        .unwrap_or(0)
                };
                n.height_cache.set(Some(h));
            } else if n.height_cache.get().is_none() {
                drop(n);
                stack.push((Rc::clone(&node), true));
                let n = node.borrow();
                for child in n.children.iter().rev() {
                    stack.push((Rc::clone(child), false));
                }
            }
        }

        let h = 1 + self
            .children
            .iter()
            .map(|c| c.borrow().height_cache.get().unwrap_or(0))
            .max()
            .unwrap_or(0);
        self.height_cache.set(Some(h));
        h
    }

    // ── Change notification ────────────────────────────

    pub fn subscribe(&self, callback: impl Fn() + 'static) -> SubscriberHandle {
        self.notifier.subscribe(callback)
    }

    pub fn unsubscribe(&self, handle: SubscriberHandle) -> bool {
        self.notifier.unsubscribe(handle)
    }

    /// Bump the version and optionally notify. Called by every item and
    /// structural mutation.
    pub(crate) fn touch(&mut self, notify: Notify) {
        self.version += 1;
        if notify == Notify::Emit {
            self.notifier.notify();
        }
    }

    /// Notify without a version bump (collapse transitions).
    pub(crate) fn emit(&self, notify: Notify) {
        if notify == Notify::Emit {
            self.notifier.notify();
        }
    }

    // ── Item operations ────────────────────────────────

    /// Append an item. Rejected (false, no change) if its key already
    /// exists in this node.
    pub fn add(&mut self, item: T, notify: Notify) -> bool {
        let key = (self.key_of)(&item);
        if self.key_index.contains_key(&key) {
            return false;
        }
        self.key_index.insert(key, self.items.len());
        self.items.push(item);
        self.touch(notify);
        true
    }

    /// Insert at `index`. Rejected on duplicate key or out-of-range
    /// index.
    pub fn insert(&mut self, index: usize, item: T, notify: Notify) -> bool {
        if index > self.items.len() {
            return false;
        }
        let key = (self.key_of)(&item);
        if self.key_index.contains_key(&key) {
            return false;
        }
        self.items.insert(index, item);
        self.rebuild_key_index();
        self.touch(notify);
        true
    }

    /// Remove the item with the same key as `item`.
    pub fn remove(&mut self, item: &T, notify: Notify) -> Option<T> {
        let key = (self.key_of)(item);
        self.remove_by_key(&key, notify)
    }

    pub fn remove_by_key(&mut self, key: &str, notify: Notify) -> Option<T> {
        let pos = *self.key_index.get(key)?;
        let removed = self.items.remove(pos);
        self.rebuild_key_index();
        self.touch(notify);
        Some(removed)
    }

    /// Remove every item matching `pred`, returning them in order.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&T) -> bool, notify: Notify) -> Vec<T> {
        let mut removed = Vec::new();
        let mut kept = Vec::new();
        for item in self.items.drain(..) {
            if pred(&item) {
                removed.push(item);
            } else {
                kept.push(item);
            }
        }
        self.items = kept;
        if !removed.is_empty() {
            self.rebuild_key_index();
            self.touch(notify);
        }
        removed
    }

    /// Replace in place by the item's own key; behaves as `add` when
    /// the key is new. Returns the replaced item, or `None` when the
    /// item was appended instead.
    pub fn replace(&mut self, item: T, notify: Notify) -> Option<T> {
        let key = (self.key_of)(&item);
        match self.key_index.get(&key) {
            Some(&pos) => {
                let old = std::mem::replace(&mut self.items[pos], item);
                self.touch(notify);
                Some(old)
            }
            None => {
                self.add(item, notify);
                None
            }
        }
    }

    /// Replace the item stored under `key` with `item`, re-indexing it
    /// under its own key. Rejected (no change, `None`) when the
    /// replacement's key collides with a *different* existing entry.
    /// Behaves as `add` when `key` is unknown.
    pub fn replace_by_key(&mut self, key: &str, item: T, notify: Notify) -> Option<T> {
        let new_key = (self.key_of)(&item);
        match self.key_index.get(key) {
            Some(&pos) => {
                if new_key != key && self.key_index.contains_key(&new_key) {
                    return None;
                }
                let old = std::mem::replace(&mut self.items[pos], item);
                if new_key != key {
                    self.key_index.remove(key);
                    self.key_index.insert(new_key, pos);
                }
                self.touch(notify);
                Some(old)
            }
            None => {
                self.add(item, notify);
                None
            }
        }
    }

    /// Add-or-replace. Returns true when the item was genuinely new.
    pub fn upsert(&mut self, item: T, notify: Notify) -> bool {
        let key = (self.key_of)(&item);
        match self.key_index.get(&key) {
            Some(&pos) => {
                self.items[pos] = item;
                self.touch(notify);
                false
            }
            None => {
                self.key_index.insert(key, self.items.len());
                self.items.push(item);
                self.touch(notify);
                true
            }
        }
    }

    /// Bulk add-or-replace; notifies once. Returns the count of
    /// genuinely new items.
    pub fn upsert_all(&mut self, items: impl IntoIterator<Item = T>, notify: Notify) -> usize {
        let mut added = 0;
        let mut changed = false;
        for item in items {
            if self.upsert(item, Notify::Silent) {
                added += 1;
            }
            changed = true;
        }
        if changed {
            self.emit(notify);
        }
        added
    }

    /// Apply `transform` to every item. The transform must not change
    /// an item's key — that is a caller contract, asserted in debug
    /// builds, because a silent key change corrupts the key index.
    pub fn update_all(&mut self, mut transform: impl FnMut(&mut T), notify: Notify) {
        if self.items.is_empty() {
            return;
        }
        #[cfg(debug_assertions)]
        let keys_before: Vec<String> = self.items.iter().map(|i| (self.key_of)(i)).collect();

        for item in &mut self.items {
            transform(item);
        }

        #[cfg(debug_assertions)]
        for (pos, item) in self.items.iter().enumerate() {
            debug_assert_eq!(
                keys_before[pos],
                (self.key_of)(item),
                "update_all transform must not change item keys"
            );
        }

        self.touch(notify);
    }

    /// Sort items by their natural order. Returns false when the items
    /// were already in order (no version bump, no notification).
    pub fn sort(&mut self, notify: Notify) -> bool
    where
        T: Ord,
    {
        let before = self.keys();
        self.items.sort();
        if self.keys() == before {
            return false;
        }
        self.rebuild_key_index();
        self.touch(notify);
        true
    }

    /// Sort by a caller-supplied comparator; same no-change contract as
    /// [`sort`](Node::sort). Keys are unique per node, so an unchanged
    /// key sequence means an unchanged item order.
    pub fn sort_by(
        &mut self,
        mut compare: impl FnMut(&T, &T) -> std::cmp::Ordering,
        notify: Notify,
    ) -> bool {
        let before = self.keys();
        self.items.sort_by(|a, b| compare(a, b));
        if self.keys() == before {
            return false;
        }
        self.rebuild_key_index();
        self.touch(notify);
        true
    }

    /// Drop all items. Returns false when there was nothing to drop.
    pub fn clear(&mut self, notify: Notify) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.items.clear();
        self.key_index.clear();
        self.touch(notify);
        true
    }

    fn rebuild_key_index(&mut self) {
        self.key_index.clear();
        for (pos, item) in self.items.iter().enumerate() {
            self.key_index.insert((self.key_of)(item), pos);
        }
    }

    pub(crate) fn rebuild_child_index(&mut self) {
        self.child_index.clear();
        for (pos, child) in self.children.iter().enumerate() {
            self.child_index.insert(child.borrow().id.clone(), pos);
        }
    }

    // ── Collapse state machine ─────────────────────────

    /// Apply a collapse directive. Only a genuine transition notifies
    /// and returns true.
    #[instrument(level = "trace", skip_all, fields(id = %self.id, directive = ?directive))]
    pub fn set_collapsed(&mut self, directive: CollapseDirective, notify: Notify) -> bool {
        let target = match directive {
            CollapseDirective::Collapse => true,
            CollapseDirective::Expand => false,
            CollapseDirective::Toggle => !self.collapsed,
        };
        if self.collapsed == target {
            return false;
        }
        self.collapsed = target;
        self.emit(notify);
        true
    }

    pub fn toggle(&mut self, notify: Notify) -> bool {
        self.set_collapsed(CollapseDirective::Toggle, notify)
    }
}

/// Teardown is iterative: a deep tree (10k+ node linear chain) must not
/// unwind through one `Drop` frame per level. Children still referenced
/// elsewhere survive as detached roots.
impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        if self.children.is_empty() {
            return;
        }
        let mut stack: Vec<NodeRef<T>> = self.children.drain(..).collect();
        self.child_index.clear();
        while let Some(child) = stack.pop() {
            if Rc::strong_count(&child) == 1 {
                // Sole owner: flatten its children before it drops at
                // the end of this iteration.
                if let Ok(mut c) = child.try_borrow_mut() {
                    stack.extend(c.children.drain(..));
                    c.child_index.clear();
                }
            } else if let Ok(mut c) = child.try_borrow_mut() {
                // Externally held: becomes a root of its own tree.
                c.parent = Weak::new();
                c.depth = 0;
                let mut rebase: Vec<(NodeRef<T>, usize)> =
                    c.children.iter().map(|g| (Rc::clone(g), 1)).collect();
                drop(c);
                while let Some((node, d)) = rebase.pop() {
                    if let Ok(mut n) = node.try_borrow_mut() {
                        n.depth = d;
                        rebase.extend(n.children.iter().map(|g| (Rc::clone(g), d + 1)));
                    }
                }
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .field("collapsed", &self.collapsed)
            .field("items", &self.items)
            .field("children", &self.child_ids())
            .finish()
    }
}

impl<T> fmt::Display for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
