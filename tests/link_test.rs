//! End-to-end tests: a tree plus a link overlay, queried together.

use rstest::{fixture, rstest};

use treelink::{
    LinkDirection, LinkManager, Node, NodeRef, Notify, TreeOps, TreeSearch, TreeWalk,
};

mod common;
use common::init_test_setup;

#[derive(Debug, Clone, PartialEq)]
struct Doc {
    slug: String,
    words: usize,
}

fn doc(slug: &str, words: usize) -> Doc {
    Doc {
        slug: slug.to_string(),
        words,
    }
}

fn node(id: &str, docs: Vec<Doc>) -> NodeRef<Doc> {
    Node::with_items(id, |d: &Doc| d.slug.clone(), docs)
}

/// A documentation tree:
///
/// manual ── intro
///        ├─ guide ── install
///        │        └─ config
///        └─ reference
struct Workspace {
    root: NodeRef<Doc>,
    links: LinkManager,
}

#[fixture]
fn workspace() -> Workspace {
    init_test_setup();
    let root = node("manual", vec![doc("toc", 40)]);
    let guide = node("guide", vec![doc("guide-index", 80)]);
    root.add_child(&node("intro", vec![doc("welcome", 120)]), Notify::Silent);
    root.add_child(&guide, Notify::Silent);
    root.add_child(&node("reference", vec![doc("api", 900)]), Notify::Silent);
    guide.add_child(&node("install", vec![doc("setup", 300)]), Notify::Silent);
    guide.add_child(&node("config", vec![doc("options", 250)]), Notify::Silent);

    let mut links = LinkManager::new();
    links.add(
        treelink::NodeLink::new("see-1", "intro", "install", "see-also", LinkDirection::Outgoing),
        Notify::Silent,
    );
    links.add(
        treelink::NodeLink::new("see-2", "install", "config", "see-also", LinkDirection::Bidirectional),
        Notify::Silent,
    );
    links.add(
        treelink::NodeLink::new("dep-1", "config", "reference", "depends-on", LinkDirection::Outgoing),
        Notify::Silent,
    );

    Workspace { root, links }
}

#[rstest]
fn given_overlay_when_resolving_links_then_tree_nodes_come_back(workspace: Workspace) {
    let Workspace { root, links } = workspace;

    let nodes = links.linked_nodes(&root, "intro", None);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].borrow().id(), "install");
    assert_eq!(nodes[0].borrow().depth(), 2);

    let items = links.linked_items(&root, "install", Some("see-also"));
    assert_eq!(items, vec![doc("options", 250)]);
}

#[rstest]
fn given_removed_subtree_when_resolving_then_stale_endpoints_are_skipped(workspace: Workspace) {
    let Workspace { root, links } = workspace;

    root.remove_child("reference", Notify::Silent);

    // The link table still holds the edge; resolution just misses.
    assert!(links.are_linked("config", "reference", None));
    assert!(links.linked_nodes(&root, "config", Some("depends-on")).is_empty());
}

#[rstest]
fn given_mixed_directions_when_walking_reachability_then_paths_respect_them(
    workspace: Workspace,
) {
    let links = workspace.links;

    // intro → install ↔ config → reference
    let reached = links.reachable_nodes("intro", None, false, None);
    assert_eq!(reached.len(), 3);
    assert!(reached.contains("reference"));

    // From config the bidirectional edge leads back to install.
    let reached = links.reachable_nodes("config", None, false, None);
    assert!(reached.contains("install"));
    assert!(!reached.contains("intro"));

    let path = links.find_path("intro", "reference", None).unwrap();
    assert_eq!(path, vec!["intro", "install", "config", "reference"]);
    assert!(links.find_path("reference", "intro", None).is_none());

    let typed = links.find_path("intro", "config", Some("see-also")).unwrap();
    assert_eq!(typed, vec!["intro", "install", "config"]);
}

#[rstest]
fn given_node_deletion_when_cleaning_links_then_overlay_and_tree_agree(workspace: Workspace) {
    let Workspace { root, mut links } = workspace;

    let install = root.find_node("install").unwrap();
    install.detach(Notify::Silent);
    let removed = links.remove_all_for_node("install", Notify::Silent);

    assert_eq!(removed.len(), 2);
    assert_eq!(links.link_count(), 1);
    assert!(links.all_links("install", None).is_empty());
    assert!(root.find_node("install").is_none());
    // The detached subtree is still a live tree of its own.
    assert_eq!(install.borrow().depth(), 0);
    assert_eq!(install.flattened_len(), 1);
}

#[rstest]
fn given_key_search_when_looking_up_then_first_match_in_preorder_wins(workspace: Workspace) {
    let root = workspace.root;

    let hit = root.find_node_by_key("setup").unwrap();
    assert_eq!(hit.borrow().id(), "install");
    let hit = root.find_node_by_item(&doc("api", 0)).unwrap();
    assert_eq!(hit.borrow().id(), "reference");
    assert!(root.find_node_by_key("missing").is_none());
}
