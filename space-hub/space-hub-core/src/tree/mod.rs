//! Derived hierarchy built from the filtered entity list.
//!
//! The forest owns its children exclusively; parents are only reachable
//! through the `parent_id` key of the entity, never through back-pointers.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::entity::Entity;
use crate::sort::SortMode;

mod flatten;

pub use flatten::{flatten, FlattenedItem, FlattenedTree};


/// One entity plus its ordered children.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub entity: Entity,
    pub children: Vec<Node>,
    pub expanded: bool,
}

impl Node {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            children: Vec::new(),
            expanded: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.entity.id
    }

    pub fn is_folder(&self) -> bool {
        self.entity.is_folder()
    }

    /// Every id below this node, in pre-order, regardless of expansion.
    pub fn descendant_ids(&self) -> Vec<Uuid> {
        fn gather(node: &Node, out: &mut Vec<Uuid>) {
            for child in &node.children {
                out.push(child.id());
                gather(child, out);
            }
        }
        let mut ids = Vec::new();
        gather(self, &mut ids);
        ids
    }
}

/// Group, sort and nest the given entities.
///
/// Entities whose parent is not part of the list are attached at the root so
/// every input entity yields exactly one node. Entities caught in a parent
/// cycle are unreachable from the root and are dropped with a warning.
pub fn build_tree(entities: &[Entity], expanded: &HashSet<Uuid>, sort: SortMode) -> Vec<Node> {
    let known: HashSet<Uuid> = entities.iter().map(|e| e.id).collect();
    let mut groups: HashMap<Option<Uuid>, Vec<Entity>> = HashMap::new();
    for entity in entities {
        let key = match entity.parent_id {
            Some(pid) if known.contains(&pid) => Some(pid),
            Some(pid) => {
                debug!("parent {} of {} not loaded, placing at root", pid, entity.id);
                None
            }
            None => None,
        };
        groups.entry(key).or_default().push(entity.clone());
    }
    for group in groups.values_mut() {
        sort.sort(group);
    }

    fn build_level(
        groups: &mut HashMap<Option<Uuid>, Vec<Entity>>,
        parent: Option<Uuid>,
        expanded: &HashSet<Uuid>,
    ) -> Vec<Node> {
        let Some(group) = groups.remove(&parent) else {
            return Vec::new();
        };
        group
            .into_iter()
            .map(|entity| {
                let id = entity.id;
                let is_folder = entity.is_folder();
                Node {
                    entity,
                    children: build_level(groups, Some(id), expanded),
                    expanded: is_folder && expanded.contains(&id),
                }
            })
            .collect()
    }

    let roots = build_level(&mut groups, None, expanded);
    let unreachable: usize = groups.values().map(Vec::len).sum();
    if unreachable > 0 {
        warn!("{} entities unreachable from the root (parent cycle)", unreachable);
    }
    roots
}

/// Where a node was taken out of the forest.
#[derive(Clone, Debug)]
pub struct RemovedNode {
    pub node: Node,
    pub parent_id: Option<Uuid>,
    pub index: usize,
}

pub fn find<'a>(nodes: &'a [Node], id: Uuid) -> Option<&'a Node> {
    for node in nodes {
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find(&node.children, id) {
            return Some(found);
        }
    }
    None
}

pub fn find_mut<'a>(nodes: &'a mut [Node], id: Uuid) -> Option<&'a mut Node> {
    for node in nodes.iter_mut() {
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Parent key and sibling index of `id`.
pub fn locate(nodes: &[Node], id: Uuid) -> Option<(Option<Uuid>, usize)> {
    fn walk(nodes: &[Node], id: Uuid, parent: Option<Uuid>) -> Option<(Option<Uuid>, usize)> {
        for (index, node) in nodes.iter().enumerate() {
            if node.id() == id {
                return Some((parent, index));
            }
            if let Some(found) = walk(&node.children, id, Some(node.id())) {
                return Some(found);
            }
        }
        None
    }
    walk(nodes, id, None)
}

/// Child array of `parent`, or the root array for `None`.
pub fn siblings_mut(nodes: &mut Vec<Node>, parent: Option<Uuid>) -> Option<&mut Vec<Node>> {
    match parent {
        None => Some(nodes),
        Some(pid) => find_mut(nodes, pid).map(|node| &mut node.children),
    }
}

pub fn remove(nodes: &mut Vec<Node>, id: Uuid) -> Option<RemovedNode> {
    let (parent_id, index) = locate(nodes, id)?;
    let siblings = siblings_mut(nodes, parent_id)?;
    let node = siblings.remove(index);
    Some(RemovedNode {
        node,
        parent_id,
        index,
    })
}

/// Insert `node` into `parent` at `index` (clamped). Returns the node back if
/// the parent is not part of the forest.
pub fn insert(
    nodes: &mut Vec<Node>,
    parent: Option<Uuid>,
    index: usize,
    node: Node,
) -> Result<(), Node> {
    match siblings_mut(nodes, parent) {
        Some(siblings) => {
            let ix = index.min(siblings.len());
            siblings.insert(ix, node);
            Ok(())
        }
        None => Err(node),
    }
}

/// Total number of nodes in the forest.
pub fn count(nodes: &[Node]) -> usize {
    nodes.iter().map(|n| 1 + count(&n.children)).sum()
}
