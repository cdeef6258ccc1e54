//! # treelink
//!
//! Framework-independent building blocks for hierarchical data: a tree
//! of keyed item containers plus a typed link overlay for relationships
//! the hierarchy cannot express.
//!
//! The tree side is generic over the item type `T`; items are addressed
//! by a key extracted through an injected function, unique within one
//! node only. Nodes are shared as `Rc<RefCell<_>>` handles with `Weak`
//! parent back-references, so the whole crate is single-threaded by
//! construction.
//!
//! ```
//! use treelink::{Node, Notify, TreeOps, TreeSearch};
//!
//! let root = Node::new("root", |item: &(String, i32)| item.0.clone());
//! let child = Node::new("child", |item: &(String, i32)| item.0.clone());
//! root.add_child(&child, Notify::Silent);
//! child.borrow_mut().add(("answer".into(), 42), Notify::Silent);
//!
//! let found = root.find_node_by_key("answer").unwrap();
//! assert_eq!(found.borrow().id(), "child");
//! ```
//!
//! The link overlay ([`LinkManager`]) relates node ids as opaque
//! strings, with directional typed links and graph queries
//! (reachability, shortest path, path enumeration) on top.

pub mod clone;
pub mod graph;
pub mod link;
pub mod node;
pub mod notify;
pub mod search;
pub mod traversal;
pub mod tree;

pub use clone::TreeClone;
pub use link::{LinkDirection, LinkManager, NodeLink};
pub use node::{CollapseDirective, KeyOf, Node, NodeRef, WeakNodeRef};
pub use notify::{Notifier, Notify, SubscriberHandle};
pub use search::TreeSearch;
pub use traversal::{Ancestors, Descendants, TreeWalk};
pub use tree::TreeOps;
