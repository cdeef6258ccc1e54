//! Tests for collapse state across subtrees and its interaction with
//! visible traversal.

use std::collections::HashSet;

use rstest::{fixture, rstest};

use treelink::{CollapseDirective, Node, NodeRef, Notify, TreeOps, TreeWalk};

mod common;
use common::init_test_setup;

fn node(id: &str) -> NodeRef<u32> {
    Node::new(id, |v: &u32| v.to_string())
}

/// root ── a ── a1 ── a1x
///      └─ b ── b1
#[fixture]
fn sample() -> NodeRef<u32> {
    init_test_setup();
    let root = node("root");
    let a = node("a");
    let a1 = node("a1");
    let b = node("b");
    root.add_child(&a, Notify::Silent);
    root.add_child(&b, Notify::Silent);
    a.add_child(&a1, Notify::Silent);
    a1.add_child(&node("a1x"), Notify::Silent);
    b.add_child(&node("b1"), Notify::Silent);
    root
}

fn visible_ids(root: &NodeRef<u32>) -> Vec<String> {
    root.visible_descendants(false)
        .map(|n| n.borrow().id().to_string())
        .collect()
}

#[rstest]
fn given_collapsed_branch_when_walking_visible_then_branch_contents_hide(sample: NodeRef<u32>) {
    let a = sample.borrow().child("a").unwrap();
    a.borrow_mut()
        .set_collapsed(CollapseDirective::Collapse, Notify::Silent);

    assert_eq!(visible_ids(&sample), vec!["root", "a", "b", "b1"]);
}

#[rstest]
fn given_collapse_all_when_expanding_to_a_node_then_its_path_opens(sample: NodeRef<u32>) {
    assert!(sample.collapse_all(Notify::Silent));
    assert_eq!(visible_ids(&sample), vec!["root"]);

    let a1x = sample
        .borrow()
        .child("a")
        .unwrap()
        .borrow()
        .child("a1")
        .unwrap()
        .borrow()
        .child("a1x")
        .unwrap();
    assert!(a1x.expand_to_this(Notify::Silent));

    // Every ancestor of a1x is expanded; the b branch stays shut.
    assert_eq!(visible_ids(&sample), vec!["root", "a", "b", "a1", "a1x"]);
    // a1x itself keeps its own collapse flag.
    assert!(a1x.borrow().is_collapsed());
    assert!(!a1x.expand_to_this(Notify::Silent), "no further transitions");
}

#[rstest]
fn given_level_when_collapsing_to_it_then_relative_depth_decides(sample: NodeRef<u32>) {
    assert!(sample.collapse_to_level(2, Notify::Silent));

    assert!(!sample.borrow().is_collapsed());
    let a = sample.borrow().child("a").unwrap();
    assert!(!a.borrow().is_collapsed());
    let a1 = a.borrow().child("a1").unwrap();
    assert!(a1.borrow().is_collapsed());

    // Levels are relative to the start node, not the tree root.
    assert!(a.collapse_to_level(0, Notify::Silent));
    assert!(a.borrow().is_collapsed());
    assert!(!sample.borrow().is_collapsed());
}

#[rstest]
fn given_expand_all_when_nothing_is_collapsed_then_no_change_is_reported(sample: NodeRef<u32>) {
    assert!(!sample.expand_all(Notify::Silent));
    assert!(sample.collapse_all(Notify::Silent));
    assert!(sample.expand_all(Notify::Silent));
    assert_eq!(visible_ids(&sample).len(), 6);
}

#[rstest]
fn given_id_snapshot_when_applying_then_collapse_matches_the_set(sample: NodeRef<u32>) {
    let snapshot: HashSet<String> = ["a", "b1"].iter().map(|s| s.to_string()).collect();
    assert!(sample.apply_collapsed(&snapshot, Notify::Silent));

    let a = sample.borrow().child("a").unwrap();
    let b = sample.borrow().child("b").unwrap();
    assert!(a.borrow().is_collapsed());
    assert!(!b.borrow().is_collapsed());
    assert!(b.borrow().child("b1").unwrap().borrow().is_collapsed());

    // Applying the same snapshot again is a no-op.
    assert!(!sample.apply_collapsed(&snapshot, Notify::Silent));
}

#[rstest]
fn given_collapse_transition_when_emitting_then_version_stays_put(sample: NodeRef<u32>) {
    let a = sample.borrow().child("a").unwrap();
    let version = a.borrow().version();
    a.borrow_mut().toggle(Notify::Emit);
    assert_eq!(a.borrow().version(), version);
}
