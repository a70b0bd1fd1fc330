//! Reference graph
//!
//! Arena of reference nodes keyed by generated ids, with referer/referee
//! adjacency sets. The root sentinel stands for "kept alive by this process"
//! and is never released. A node whose last referer is removed is released;
//! the release cascades to every node it referenced.
//!
//! Object identity is tracked in a side table keyed by the `Arc` allocation,
//! together with the node's cached [`DataInfo`]. Releasing a node clears both,
//! so a value encountered again later gets a fresh id.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{RemotingError, Result};
use crate::remoting::data_info::{DataInfo, RefId};
use crate::remoting::value::ObjectRef;

/// One tracked value
pub struct ReferenceNode {
    pub id: RefId,
    /// Live target; `None` only for the root sentinel
    pub target: Option<ObjectRef>,
    /// Nodes keeping this one alive
    pub referers: HashSet<RefId>,
    /// Nodes this one keeps alive
    pub referees: HashSet<RefId>,
    /// Cached encoding, built once on first transfer
    pub data_info: Option<DataInfo>,
}

impl ReferenceNode {
    fn new(id: RefId, target: Option<ObjectRef>) -> Self {
        Self {
            id,
            target,
            referers: HashSet::new(),
            referees: HashSet::new(),
            data_info: None,
        }
    }

    /// Only self-edges remain
    fn is_orphan(&self) -> bool {
        self.referers.iter().all(|referer| referer == &self.id)
    }
}

fn identity_of(target: &ObjectRef) -> usize {
    Arc::as_ptr(target) as *const () as usize
}

pub struct ReferenceGraph {
    root_id: RefId,
    nodes: HashMap<RefId, ReferenceNode>,
    identities: HashMap<usize, RefId>,
}

impl Default for ReferenceGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceGraph {
    pub fn new() -> Self {
        let root_id = Uuid::new_v4().to_string();
        let mut nodes = HashMap::new();
        nodes.insert(root_id.clone(), ReferenceNode::new(root_id.clone(), None));
        Self {
            root_id,
            nodes,
            identities: HashMap::new(),
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Number of tracked values, excluding the root
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&ReferenceNode> {
        self.nodes.get(id)
    }

    pub fn target(&self, id: &str) -> Option<ObjectRef> {
        self.nodes.get(id).and_then(|node| node.target.clone())
    }

    /// Id of an already-tracked value
    pub fn ref_id_of(&self, target: &ObjectRef) -> Option<RefId> {
        self.identities.get(&identity_of(target)).cloned()
    }

    pub fn referer_count(&self, id: &str) -> usize {
        self.nodes.get(id).map(|node| node.referers.len()).unwrap_or(0)
    }

    pub fn referees(&self, id: &str) -> Vec<RefId> {
        self.nodes
            .get(id)
            .map(|node| node.referees.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cached_data_info(&self, id: &str) -> Option<&DataInfo> {
        self.nodes.get(id).and_then(|node| node.data_info.as_ref())
    }

    pub fn set_cached_data_info(&mut self, id: &str, info: DataInfo) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.data_info = Some(info);
        }
    }

    fn resolve_referer<'a>(&'a self, referer: Option<&'a str>) -> &'a str {
        referer.unwrap_or(&self.root_id)
    }

    /// Track `target` under `referer` (the root when `None`), reusing its id
    /// when it is already tracked.
    pub fn refer(&mut self, target: ObjectRef, referer: Option<&str>) -> Result<RefId> {
        if let Some(id) = self.ref_id_of(&target) {
            let referer = self.resolve_referer(referer).to_string();
            self.add_referer(&id, &referer)?;
            return Ok(id);
        }
        let id = Uuid::new_v4().to_string();
        self.insert_with_id(target, id, referer)
    }

    /// Track `target` under a caller-chosen id, typically the remote node id
    /// of the value a mirror stands for.
    pub fn insert_with_id(
        &mut self,
        target: ObjectRef,
        id: RefId,
        referer: Option<&str>,
    ) -> Result<RefId> {
        let referer = self.resolve_referer(referer).to_string();
        if !self.nodes.contains_key(&referer) {
            return Err(RemotingError::UnknownReference(referer));
        }
        if self.nodes.contains_key(&id) {
            return Err(RemotingError::Protocol(format!(
                "reference {} is already registered",
                id
            )));
        }
        self.identities.insert(identity_of(&target), id.clone());
        self.nodes
            .insert(id.clone(), ReferenceNode::new(id.clone(), Some(target)));
        self.add_referer(&id, &referer)?;
        Ok(id)
    }

    /// Look up a tracked value by id, adding `referer` as a new referer
    pub fn refer_by_id(&mut self, id: &str, referer: Option<&str>) -> Result<Option<ObjectRef>> {
        let Some(target) = self.target(id) else {
            return Ok(None);
        };
        let referer = self.resolve_referer(referer).to_string();
        self.add_referer(id, &referer)?;
        Ok(Some(target))
    }

    /// Add the edge `referer -> referee`
    pub fn add_referer(&mut self, referee: &str, referer: &str) -> Result<()> {
        if !self.nodes.contains_key(referer) {
            return Err(RemotingError::UnknownReference(referer.to_string()));
        }
        match self.nodes.get_mut(referee) {
            Some(node) => {
                node.referers.insert(referer.to_string());
            }
            None => return Err(RemotingError::UnknownReference(referee.to_string())),
        }
        if let Some(node) = self.nodes.get_mut(referer) {
            node.referees.insert(referee.to_string());
        }
        Ok(())
    }

    /// Remove the edge `referer -> referee` (referer defaults to the root).
    ///
    /// Returns whether the edge existed. Removing the last referer releases
    /// the referee and cascades.
    pub fn remove_referer(&mut self, referee: &str, referer: Option<&str>) -> bool {
        let referer = self.resolve_referer(referer).to_string();
        let orphaned = match self.nodes.get_mut(referee) {
            Some(node) => {
                if !node.referers.remove(&referer) {
                    return false;
                }
                node.is_orphan()
            }
            None => return false,
        };
        if let Some(node) = self.nodes.get_mut(&referer) {
            node.referees.remove(referee);
        }
        if orphaned && referee != self.root_id {
            self.release(referee);
        }
        true
    }

    /// Drop a node and everything only it kept alive
    fn release(&mut self, id: &str) {
        let mut pending = vec![id.to_string()];
        while let Some(id) = pending.pop() {
            let Some(node) = self.nodes.remove(&id) else {
                continue;
            };
            if let Some(target) = &node.target {
                self.identities.remove(&identity_of(target));
            }
            for referer in node.referers.iter().filter(|r| **r != id) {
                if let Some(parent) = self.nodes.get_mut(referer) {
                    parent.referees.remove(&id);
                }
            }
            for referee_id in node.referees {
                if referee_id == id || referee_id == self.root_id {
                    continue;
                }
                if let Some(referee) = self.nodes.get_mut(&referee_id) {
                    referee.referers.remove(&id);
                    if referee.is_orphan() {
                        pending.push(referee_id);
                    }
                }
            }
        }
    }

    /// Every id directly kept alive by the root
    pub fn root_referees(&self) -> Vec<RefId> {
        self.referees(&self.root_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remoting::value::PropertyBag;

    fn object() -> ObjectRef {
        Arc::new(PropertyBag::new())
    }

    #[test]
    fn test_refer_reuses_id() {
        let mut graph = ReferenceGraph::new();
        let target = object();
        let a = graph.refer(target.clone(), None).unwrap();
        let b = graph.refer(target.clone(), None).unwrap();
        assert_eq!(a, b);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.referer_count(&a), 1);
    }

    #[test]
    fn test_release_after_last_referer() {
        let mut graph = ReferenceGraph::new();
        let parent = graph.refer(object(), None).unwrap();
        let target = object();
        let id = graph.refer(target.clone(), None).unwrap();
        graph.refer(target.clone(), Some(&parent)).unwrap();
        assert_eq!(graph.referer_count(&id), 2);

        assert!(graph.remove_referer(&id, None));
        assert!(graph.contains(&id));
        assert!(!graph.remove_referer(&id, None));

        assert!(graph.remove_referer(&id, Some(&parent)));
        assert!(!graph.contains(&id));
        assert!(graph.ref_id_of(&target).is_none());
    }

    #[test]
    fn test_release_cascades() {
        let mut graph = ReferenceGraph::new();
        let a = graph.refer(object(), None).unwrap();
        let b = graph.refer(object(), Some(&a)).unwrap();
        let c = graph.refer(object(), Some(&b)).unwrap();
        let shared = graph.refer(object(), Some(&b)).unwrap();
        let root = graph.root_id().to_string();
        graph.add_referer(&shared, &root).unwrap();

        graph.remove_referer(&a, None);
        assert!(!graph.contains(&a));
        assert!(!graph.contains(&b));
        assert!(!graph.contains(&c));
        assert!(graph.contains(&shared));
        assert_eq!(graph.referer_count(&shared), 1);
    }

    #[test]
    fn test_self_reference_does_not_pin() {
        let mut graph = ReferenceGraph::new();
        let target = object();
        let id = graph.refer(target.clone(), None).unwrap();
        graph.refer(target, Some(&id)).unwrap();
        graph.remove_referer(&id, None);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_released_value_gets_fresh_id() {
        let mut graph = ReferenceGraph::new();
        let target = object();
        let first = graph.refer(target.clone(), None).unwrap();
        graph.remove_referer(&first, None);
        let second = graph.refer(target, None).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_unknown_referer_is_error() {
        let mut graph = ReferenceGraph::new();
        assert!(matches!(
            graph.refer(object(), Some("missing")),
            Err(RemotingError::UnknownReference(_))
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_insert_with_id_rejects_duplicates() {
        let mut graph = ReferenceGraph::new();
        graph.insert_with_id(object(), "x".to_string(), None).unwrap();
        assert!(graph.insert_with_id(object(), "x".to_string(), None).is_err());
        assert!(graph.refer_by_id("x", None).unwrap().is_some());
        assert!(graph.refer_by_id("y", None).unwrap().is_none());
    }
}
