//! Graph traversal over the link overlay.
//!
//! Everything here works on node id strings through the manager's
//! direction-respecting `linked_node_ids` neighbor function; the tree is
//! only consulted by the resolution glue at the bottom. All algorithms
//! are iterative (queue/stack based), so cycle-free termination does not
//! rely on the native call stack.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::instrument;

use crate::link::LinkManager;
use crate::node::NodeRef;
use crate::search::TreeSearch;

impl LinkManager {
    /// Every node id reachable from `start` by traversable links, BFS.
    /// `max_depth` bounds the hop count; hitting the bound is normal
    /// termination, not a failure. Without `include_start` the start is
    /// still reported when a cycle leads back to it — it is then a
    /// reachable node like any other.
    #[instrument(level = "debug", skip(self, link_type))]
    pub fn reachable_nodes(
        &self,
        start: &str,
        link_type: Option<&str>,
        include_start: bool,
        max_depth: Option<usize>,
    ) -> HashSet<String> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.to_string());
        let mut reentered_start = false;
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((start.to_string(), 0));

        while let Some((node, depth)) = queue.pop_front() {
            if max_depth.map_or(false, |limit| depth >= limit) {
                continue;
            }
            for next in self.linked_node_ids(&node, link_type) {
                if next == start {
                    reentered_start = true;
                }
                if visited.insert(next.clone()) {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        if !include_start && !reentered_start {
            visited.remove(start);
        }
        visited
    }

    /// Shortest path (by hop count) from `start` to `end`, as the full
    /// id sequence including both endpoints. `start == end` yields the
    /// single-element path; `None` when unreachable.
    #[instrument(level = "debug", skip(self, link_type))]
    pub fn find_path(&self, start: &str, end: &str, link_type: Option<&str>) -> Option<Vec<String>> {
        if start == end {
            return Some(vec![start.to_string()]);
        }

        let mut prev: HashMap<String, String> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.to_string());
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(start.to_string());

        while let Some(node) = queue.pop_front() {
            for next in self.linked_node_ids(&node, link_type) {
                if !visited.insert(next.clone()) {
                    continue;
                }
                prev.insert(next.clone(), node.clone());
                if next == end {
                    return Some(reconstruct(&prev, start, end));
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// All simple paths from `start` to `end`, DFS. A node may repeat
    /// across paths but never within one. `max_paths` caps the result
    /// count, `max_depth` the per-path hop count; both bounds are normal
    /// termination. `start == end` yields the trivial path only.
    #[instrument(level = "debug", skip(self, link_type))]
    pub fn find_all_paths(
        &self,
        start: &str,
        end: &str,
        link_type: Option<&str>,
        max_paths: Option<usize>,
        max_depth: Option<usize>,
    ) -> Vec<Vec<String>> {
        if start == end {
            return vec![vec![start.to_string()]];
        }

        let mut paths: Vec<Vec<String>> = Vec::new();
        let mut stack: Vec<Vec<String>> = vec![vec![start.to_string()]];

        while let Some(path) = stack.pop() {
            if max_paths.map_or(false, |limit| paths.len() >= limit) {
                break;
            }
            let last = path.last().map(String::as_str).unwrap_or(start);
            if last == end {
                paths.push(path);
                continue;
            }
            if max_depth.map_or(false, |limit| path.len() > limit) {
                continue;
            }
            // Reverse push keeps branch exploration aligned with the
            // neighbor order.
            for next in self.linked_node_ids(last, link_type).into_iter().rev() {
                if path.contains(&next) {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(next);
                stack.push(extended);
            }
        }
        paths
    }

    // ── Tree resolution glue ───────────────────────────

    /// Resolve the linked neighbors of `node_id` to actual tree nodes
    /// under `root`. Ids with no matching node are skipped silently —
    /// link endpoints are never validated against the tree.
    pub fn linked_nodes<T>(
        &self,
        root: &NodeRef<T>,
        node_id: &str,
        link_type: Option<&str>,
    ) -> Vec<NodeRef<T>> {
        self.linked_node_ids(node_id, link_type)
            .iter()
            .filter_map(|id| root.find_node(id))
            .collect()
    }

    /// Own items of every resolved linked node, in neighbor order.
    pub fn linked_items<T: Clone>(
        &self,
        root: &NodeRef<T>,
        node_id: &str,
        link_type: Option<&str>,
    ) -> Vec<T> {
        self.linked_nodes(root, node_id, link_type)
            .iter()
            .flat_map(|n| n.borrow().items().to_vec())
            .collect()
    }
}

fn reconstruct(prev: &HashMap<String, String>, start: &str, end: &str) -> Vec<String> {
    let mut path = vec![end.to_string()];
    let mut cur = end;
    while cur != start {
        match prev.get(cur) {
            Some(p) => {
                path.push(p.clone());
                cur = p;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{LinkDirection, NodeLink};
    use crate::notify::Notify;

    fn add(mgr: &mut LinkManager, id: &str, from: &str, to: &str, direction: LinkDirection) {
        mgr.add(
            NodeLink::new(id, from, to, "ref", direction),
            Notify::Silent,
        );
    }

    /// a → b → d, a → c → d, plus an unreachable island e → f.
    fn diamond() -> LinkManager {
        let mut mgr = LinkManager::new();
        add(&mut mgr, "l1", "a", "b", LinkDirection::Outgoing);
        add(&mut mgr, "l2", "a", "c", LinkDirection::Outgoing);
        add(&mut mgr, "l3", "b", "d", LinkDirection::Outgoing);
        add(&mut mgr, "l4", "c", "d", LinkDirection::Outgoing);
        add(&mut mgr, "l5", "e", "f", LinkDirection::Outgoing);
        mgr
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reachable_nodes_respects_direction() {
        let mgr = diamond();
        assert_eq!(
            mgr.reachable_nodes("a", None, false, None),
            set(&["b", "c", "d"])
        );
        // Nothing is traversable from the sink.
        assert!(mgr.reachable_nodes("d", None, false, None).is_empty());
    }

    #[test]
    fn reachable_nodes_bound_by_depth_is_normal_termination() {
        let mgr = diamond();
        assert_eq!(mgr.reachable_nodes("a", None, false, Some(1)), set(&["b", "c"]));
        assert_eq!(mgr.reachable_nodes("a", None, true, Some(0)), set(&["a"]));
    }

    #[test]
    fn reachable_nodes_includes_start_only_on_request() {
        let mgr = diamond();
        assert!(mgr.reachable_nodes("a", None, true, None).contains("a"));
        assert!(!mgr.reachable_nodes("a", None, false, None).contains("a"));
        // An unknown start with include_start still reports itself.
        assert_eq!(mgr.reachable_nodes("ghost", None, true, None), set(&["ghost"]));
    }

    #[test]
    fn reachable_nodes_reports_start_reached_back_through_a_cycle() {
        let mut mgr = LinkManager::new();
        add(&mut mgr, "l1", "a", "b", LinkDirection::Outgoing);
        add(&mut mgr, "l2", "b", "a", LinkDirection::Outgoing);

        assert_eq!(mgr.reachable_nodes("a", None, false, None), set(&["a", "b"]));
        // A depth bound short of the return edge keeps the start out.
        assert_eq!(mgr.reachable_nodes("a", None, false, Some(1)), set(&["b"]));
    }

    #[test]
    fn find_path_returns_a_shortest_hop_path() {
        let mut mgr = diamond();
        // Longer detour b → c must not win over the two-hop paths.
        add(&mut mgr, "l6", "b", "c", LinkDirection::Outgoing);

        let path = mgr.find_path("a", "d", None).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.first().map(String::as_str), Some("a"));
        assert_eq!(path.last().map(String::as_str), Some("d"));
    }

    #[test]
    fn find_path_handles_trivial_and_unreachable_cases() {
        let mgr = diamond();
        assert_eq!(mgr.find_path("a", "a", None), Some(vec!["a".to_string()]));
        assert!(mgr.find_path("a", "f", None).is_none());
        assert!(mgr.find_path("d", "a", None).is_none());
    }

    #[test]
    fn find_all_paths_enumerates_simple_paths() {
        let mgr = diamond();
        let mut paths = mgr.find_all_paths("a", "d", None, None, None);
        paths.sort();
        assert_eq!(
            paths,
            vec![
                vec!["a".to_string(), "b".to_string(), "d".to_string()],
                vec!["a".to_string(), "c".to_string(), "d".to_string()],
            ]
        );
    }

    #[test]
    fn find_all_paths_skips_cycles_within_a_path() {
        let mut mgr = LinkManager::new();
        add(&mut mgr, "l1", "a", "b", LinkDirection::Bidirectional);
        add(&mut mgr, "l2", "b", "c", LinkDirection::Bidirectional);

        let paths = mgr.find_all_paths("a", "c", None, None, None);
        assert_eq!(paths, vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]);
    }

    #[test]
    fn find_all_paths_honors_both_bounds() {
        let mgr = diamond();
        assert_eq!(mgr.find_all_paths("a", "d", None, Some(1), None).len(), 1);
        // One hop is not enough to reach d.
        assert!(mgr.find_all_paths("a", "d", None, None, Some(1)).is_empty());
        assert_eq!(mgr.find_all_paths("a", "d", None, None, Some(2)).len(), 2);
    }

    #[test]
    fn find_all_paths_start_equals_end_is_the_trivial_path() {
        let mgr = diamond();
        assert_eq!(
            mgr.find_all_paths("a", "a", None, None, None),
            vec![vec!["a".to_string()]]
        );
    }

    mod resolution {
        use super::*;
        use crate::node::Node;
        use crate::tree::TreeOps;

        #[test]
        fn linked_nodes_skips_ids_without_a_tree_node() {
            let root = Node::with_items("root", |s: &String| s.clone(), vec![]);
            let a = Node::with_items("a", |s: &String| s.clone(), vec!["a-item".to_string()]);
            let b = Node::with_items("b", |s: &String| s.clone(), vec!["b-item".to_string()]);
            root.add_child(&a, Notify::Silent);
            root.add_child(&b, Notify::Silent);

            let mut mgr = LinkManager::new();
            add(&mut mgr, "l1", "a", "b", LinkDirection::Outgoing);
            add(&mut mgr, "l2", "a", "phantom", LinkDirection::Outgoing);

            let nodes = mgr.linked_nodes(&root, "a", None);
            assert_eq!(nodes.len(), 1);
            assert_eq!(nodes[0].borrow().id(), "b");
            assert_eq!(mgr.linked_items(&root, "a", None), vec!["b-item".to_string()]);
        }
    }
}
