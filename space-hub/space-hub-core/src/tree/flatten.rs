use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::Node;

/// A visible row of the tree in display order.
#[derive(Clone, Debug, PartialEq)]
pub struct FlattenedItem {
    pub id: Uuid,
    pub depth: usize,
    pub parent_id: Option<Uuid>,
    /// Position among all siblings, including ones hidden by collapse.
    pub index: usize,
    pub is_folder: bool,
    pub expanded: bool,
    /// Transitive closure of children, collapsed or not.
    pub descendants: HashSet<Uuid>,
}

/// Pre-order walk that only enters expanded folders.
pub fn flatten(nodes: &[Node]) -> Vec<FlattenedItem> {
    fn walk(nodes: &[Node], parent_id: Option<Uuid>, depth: usize, out: &mut Vec<FlattenedItem>) {
        for (index, node) in nodes.iter().enumerate() {
            out.push(FlattenedItem {
                id: node.id(),
                depth,
                parent_id,
                index,
                is_folder: node.is_folder(),
                expanded: node.expanded,
                descendants: node.descendant_ids().into_iter().collect(),
            });
            if node.is_folder() && node.expanded && !node.children.is_empty() {
                walk(&node.children, Some(node.id()), depth + 1, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(nodes, None, 0, &mut out);
    out
}

/// Flattened rows plus an id lookup, as consumed by drop projection.
#[derive(Clone, Debug, Default)]
pub struct FlattenedTree {
    items: Vec<FlattenedItem>,
    positions: HashMap<Uuid, usize>,
}

impl FlattenedTree {
    pub fn new(nodes: &[Node]) -> Self {
        Self::from_items(flatten(nodes))
    }

    pub fn from_items(items: Vec<FlattenedItem>) -> Self {
        let positions = items
            .iter()
            .enumerate()
            .map(|(ix, item)| (item.id, ix))
            .collect();
        Self { items, positions }
    }

    pub fn items(&self) -> &[FlattenedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&FlattenedItem> {
        self.positions.get(&id).map(|ix| &self.items[*ix])
    }

    /// Row position of `id` in display order.
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Whether `candidate` lies anywhere below `ancestor`.
    pub fn is_descendant(&self, ancestor: Uuid, candidate: Uuid) -> bool {
        self.get(ancestor)
            .is_some_and(|item| item.descendants.contains(&candidate))
    }

    /// Visible children of `parent` (`None` = root) in display order.
    pub fn children_of(&self, parent: Option<Uuid>) -> Vec<&FlattenedItem> {
        self.items
            .iter()
            .filter(|item| item.parent_id == parent)
            .collect()
    }
}
