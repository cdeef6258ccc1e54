//! Typed relationships between node ids, kept outside the tree.
//!
//! Endpoints are opaque strings, never validated against any tree, so
//! links may reference nodes that do not exist (yet, or anymore). The
//! manager maintains mirror indexes per endpoint; a bidirectional link
//! appears in both direction indexes of both endpoints.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::notify::{Notifier, Notify, SubscriberHandle};

/// Traversability of a link.
///
/// `Outgoing` is traversable source → target, `Incoming` target →
/// source, `Bidirectional` both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    Outgoing,
    Incoming,
    Bidirectional,
}

/// A single typed relationship between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLink {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub link_type: String,
    pub direction: LinkDirection,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl NodeLink {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        link_type: impl Into<String>,
        direction: LinkDirection,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            link_type: link_type.into(),
            direction,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Node ids from which this link can be traversed.
    fn traversable_from(&self) -> [Option<&str>; 2] {
        match self.direction {
            LinkDirection::Outgoing => [Some(&self.source_id), None],
            LinkDirection::Incoming => [Some(&self.target_id), None],
            LinkDirection::Bidirectional => [Some(&self.source_id), Some(&self.target_id)],
        }
    }

    /// Node ids into which this link can be traversed.
    fn traversable_into(&self) -> [Option<&str>; 2] {
        match self.direction {
            LinkDirection::Outgoing => [Some(&self.target_id), None],
            LinkDirection::Incoming => [Some(&self.source_id), None],
            LinkDirection::Bidirectional => [Some(&self.target_id), Some(&self.source_id)],
        }
    }

    /// The endpoint opposite to `node_id`. For a self-loop both
    /// endpoints coincide.
    pub fn other_endpoint(&self, node_id: &str) -> &str {
        if self.source_id == node_id {
            &self.target_id
        } else {
            &self.source_id
        }
    }
}

/// Registry of links with per-endpoint mirror indexes.
///
/// `links` is authoritative; `outgoing`, `incoming` and `by_type` are
/// derived indexes holding link ids. Empty index sets are removed, so
/// index keys only exist while at least one link references them.
#[derive(Debug, Default)]
pub struct LinkManager {
    links: HashMap<String, NodeLink>,
    /// node id → links traversable from it
    outgoing: HashMap<String, HashSet<String>>,
    /// node id → links traversable into it
    incoming: HashMap<String, HashSet<String>>,
    by_type: HashMap<String, HashSet<String>>,
    notifier: Notifier,
}

fn index_insert(index: &mut HashMap<String, HashSet<String>>, key: &str, link_id: &str) {
    index
        .entry(key.to_string())
        .or_default()
        .insert(link_id.to_string());
}

fn index_remove(index: &mut HashMap<String, HashSet<String>>, key: &str, link_id: &str) {
    if let Some(set) = index.get_mut(key) {
        set.remove(link_id);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

impl LinkManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mutation ───────────────────────────────────────

    /// Register a link. A link with the same id is fully un-mirrored
    /// first and returned.
    #[instrument(level = "debug", skip_all, fields(link_id = %link.id, link_type = %link.link_type))]
    pub fn add(&mut self, link: NodeLink, notify: Notify) -> Option<NodeLink> {
        let old = self.remove(&link.id, Notify::Silent);
        self.mirror(&link);
        self.links.insert(link.id.clone(), link);
        self.emit(notify);
        old
    }

    /// Remove by link id. Unknown ids are nothing found, not an error.
    pub fn remove(&mut self, link_id: &str, notify: Notify) -> Option<NodeLink> {
        let link = self.links.remove(link_id)?;
        self.unmirror(&link);
        self.emit(notify);
        Some(link)
    }

    /// Remove every link touching `node_id` as either endpoint.
    #[instrument(level = "debug", skip(self, notify))]
    pub fn remove_all_for_node(&mut self, node_id: &str, notify: Notify) -> Vec<NodeLink> {
        let ids: Vec<String> = self
            .links
            .values()
            .filter(|l| l.source_id == node_id || l.target_id == node_id)
            .map(|l| l.id.clone())
            .collect();
        let removed: Vec<NodeLink> = ids
            .iter()
            .filter_map(|id| self.remove(id, Notify::Silent))
            .collect();
        if !removed.is_empty() {
            self.emit(notify);
        }
        removed
    }

    pub fn remove_all_of_type(&mut self, link_type: &str, notify: Notify) -> Vec<NodeLink> {
        let ids: Vec<String> = match self.by_type.get(link_type) {
            Some(set) => set.iter().cloned().collect(),
            None => return Vec::new(),
        };
        let removed: Vec<NodeLink> = ids
            .iter()
            .filter_map(|id| self.remove(id, Notify::Silent))
            .collect();
        if !removed.is_empty() {
            self.emit(notify);
        }
        removed
    }

    /// Drop everything. Returns the number of links removed.
    pub fn clear(&mut self, notify: Notify) -> usize {
        let count = self.links.len();
        if count == 0 {
            return 0;
        }
        self.links.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.by_type.clear();
        self.emit(notify);
        count
    }

    fn mirror(&mut self, link: &NodeLink) {
        for node in link.traversable_from().into_iter().flatten() {
            index_insert(&mut self.outgoing, node, &link.id);
        }
        for node in link.traversable_into().into_iter().flatten() {
            index_insert(&mut self.incoming, node, &link.id);
        }
        index_insert(&mut self.by_type, &link.link_type, &link.id);
    }

    fn unmirror(&mut self, link: &NodeLink) {
        for node in link.traversable_from().into_iter().flatten() {
            index_remove(&mut self.outgoing, node, &link.id);
        }
        for node in link.traversable_into().into_iter().flatten() {
            index_remove(&mut self.incoming, node, &link.id);
        }
        index_remove(&mut self.by_type, &link.link_type, &link.id);
    }

    // ── Queries ────────────────────────────────────────

    pub fn get(&self, link_id: &str) -> Option<&NodeLink> {
        self.links.get(link_id)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Number of links touching `node_id` in either direction, each
    /// counted once, optionally restricted to one type.
    pub fn link_count_for(&self, node_id: &str, link_type: Option<&str>) -> usize {
        self.all_links(node_id, link_type).len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links traversable from `node_id`, optionally restricted to one
    /// type.
    pub fn outgoing_links(&self, node_id: &str, link_type: Option<&str>) -> Vec<&NodeLink> {
        self.indexed_links(&self.outgoing, node_id, link_type)
    }

    /// Links traversable into `node_id`.
    pub fn incoming_links(&self, node_id: &str, link_type: Option<&str>) -> Vec<&NodeLink> {
        self.indexed_links(&self.incoming, node_id, link_type)
    }

    /// Every link touching `node_id` in either direction, each at most
    /// once (a bidirectional link sits in both indexes).
    pub fn all_links(&self, node_id: &str, link_type: Option<&str>) -> Vec<&NodeLink> {
        self.outgoing_links(node_id, link_type)
            .into_iter()
            .chain(self.incoming_links(node_id, link_type))
            .unique_by(|l| l.id.clone())
            .collect()
    }

    /// Other endpoints of links traversable from `node_id`, sorted and
    /// deduplicated.
    pub fn linked_node_ids(&self, node_id: &str, link_type: Option<&str>) -> Vec<String> {
        self.outgoing_links(node_id, link_type)
            .into_iter()
            .map(|l| l.other_endpoint(node_id).to_string())
            .sorted()
            .dedup()
            .collect()
    }

    /// True when some link is traversable `from` → `to`.
    pub fn are_linked(&self, from: &str, to: &str, link_type: Option<&str>) -> bool {
        self.link_between(from, to, link_type).is_some()
    }

    /// First link traversable `from` → `to`, if any.
    pub fn link_between(&self, from: &str, to: &str, link_type: Option<&str>) -> Option<&NodeLink> {
        self.outgoing_links(from, link_type)
            .into_iter()
            .find(|l| l.other_endpoint(from) == to)
    }

    fn indexed_links(
        &self,
        index: &HashMap<String, HashSet<String>>,
        node_id: &str,
        link_type: Option<&str>,
    ) -> Vec<&NodeLink> {
        match index.get(node_id) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.links.get(id))
                .filter(|l| link_type.map_or(true, |t| l.link_type == t))
                .sorted_by(|a, b| a.id.cmp(&b.id))
                .collect(),
            None => Vec::new(),
        }
    }

    // ── Change notification ────────────────────────────

    pub fn subscribe(&self, callback: impl Fn() + 'static) -> SubscriberHandle {
        self.notifier.subscribe(callback)
    }

    pub fn unsubscribe(&self, handle: SubscriberHandle) -> bool {
        self.notifier.unsubscribe(handle)
    }

    fn emit(&self, notify: Notify) {
        if notify == Notify::Emit {
            self.notifier.notify();
        }
    }
}
