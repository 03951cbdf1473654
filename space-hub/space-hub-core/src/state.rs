//! Mutable view state of one collection and the local halves of every edit.
//!
//! Each `*_local` method validates first and only then mutates, so an `Err`
//! always leaves the state untouched.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use tracing::debug;
use uuid::Uuid;

use crate::entity::Entity;
use crate::projection::Position;
use crate::service::ReorderDirection;
use crate::tree::{self, Node};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeState {
    pub tree: Vec<Node>,
    /// Unfiltered entity list as last loaded, plus optimistic edits.
    pub entities: Vec<Entity>,
    pub expanded: HashSet<Uuid>,
    pub has_trash: bool,
}

/// Deep copy taken right before an optimistic edit.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    state: TreeState,
}

impl Snapshot {
    pub fn capture(state: &TreeState) -> Self {
        Self {
            state: state.clone(),
        }
    }

    pub fn restore(self, state: &mut TreeState) {
        *state = self.state;
    }

    pub fn state(&self) -> &TreeState {
        &self.state
    }
}

impl TreeState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn entity(&self, id: Uuid) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    fn entity_mut(&mut self, id: Uuid) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// `id` followed by every cached entity below it, hidden ones included.
    pub fn collect_subtree(&self, id: Uuid) -> Vec<Uuid> {
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for entity in &self.entities {
            if let Some(pid) = entity.parent_id {
                children.entry(pid).or_default().push(entity.id);
            }
        }
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            if let Some(kids) = children.get(&current) {
                stack.extend(kids.iter().rev().copied());
            }
        }
        out
    }

    fn contains(&self, id: Uuid) -> bool {
        self.entity(id).is_some() || tree::find(&self.tree, id).is_some()
    }

    pub fn rename_local(&mut self, id: Uuid, title: &str) -> Result<()> {
        if !self.contains(id) {
            return Err(anyhow!("entity {} not found", id));
        }
        if let Some(node) = tree::find_mut(&mut self.tree, id) {
            node.entity.title = Some(title.to_string());
        }
        if let Some(entity) = self.entity_mut(id) {
            entity.title = Some(title.to_string());
        }
        Ok(())
    }

    /// Replace the cached copy of an entity with the server's version.
    pub fn reconcile(&mut self, entity: Entity) {
        if let Some(node) = tree::find_mut(&mut self.tree, entity.id) {
            node.entity = entity.clone();
        }
        if let Some(cached) = self.entity_mut(entity.id) {
            *cached = entity;
        }
    }

    /// Drop `id` and everything below it. Returns the removed ids.
    pub fn remove_subtree_local(&mut self, id: Uuid) -> Result<Vec<Uuid>> {
        if !self.contains(id) {
            return Err(anyhow!("entity {} not found", id));
        }
        let mut removed = self.collect_subtree(id);
        if let Some(node) = tree::find(&self.tree, id) {
            // nodes only present in the tree still have to go
            for extra in node.descendant_ids() {
                if !removed.contains(&extra) {
                    removed.push(extra);
                }
            }
        }
        tree::remove(&mut self.tree, id);
        let gone: HashSet<Uuid> = removed.iter().copied().collect();
        self.entities.retain(|e| !gone.contains(&e.id));
        self.expanded.retain(|id| !gone.contains(id));
        self.has_trash = true;
        Ok(removed)
    }

    /// Swap with the neighbouring sibling. Returns `false` at the boundary.
    pub fn reorder_adjacent_local(&mut self, id: Uuid, direction: ReorderDirection) -> Result<bool> {
        let (parent, index) =
            tree::locate(&self.tree, id).ok_or_else(|| anyhow!("entity {} not in tree", id))?;
        let siblings = tree::siblings_mut(&mut self.tree, parent)
            .ok_or_else(|| anyhow!("parent of {} not in tree", id))?;
        let other = match direction {
            ReorderDirection::Up if index > 0 => index - 1,
            ReorderDirection::Down if index + 1 < siblings.len() => index + 1,
            _ => return Ok(false),
        };
        siblings.swap(index, other);
        self.renumber(parent);
        Ok(true)
    }

    pub fn reorder_at_local(
        &mut self,
        id: Uuid,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()> {
        let (parent, _) =
            tree::locate(&self.tree, id).ok_or_else(|| anyhow!("entity {} not in tree", id))?;
        self.move_local(id, parent, reference_id, position)
    }

    /// Re-parent `id` next to `reference_id` (or at the start/end of the
    /// parent when there is no reference).
    pub fn move_local(
        &mut self,
        id: Uuid,
        parent_id: Option<Uuid>,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()> {
        let (old_parent, _) =
            tree::locate(&self.tree, id).ok_or_else(|| anyhow!("entity {} not in tree", id))?;
        if let Some(pid) = parent_id {
            if pid == id || self.collect_subtree(id).contains(&pid) {
                return Err(anyhow!("cannot move folder into its own descendant"));
            }
            if tree::find(&self.tree, id).is_some_and(|n| n.descendant_ids().contains(&pid)) {
                return Err(anyhow!("cannot move folder into its own descendant"));
            }
            let is_folder = self
                .entity(pid)
                .map(Entity::is_folder)
                .or_else(|| tree::find(&self.tree, pid).map(Node::is_folder));
            match is_folder {
                Some(true) => {}
                Some(false) => return Err(anyhow!("target {} is not a folder", pid)),
                None => return Err(anyhow!("target folder {} not found", pid)),
            }
        }
        if reference_id == Some(id) {
            return Err(anyhow!("cannot position {} relative to itself", id));
        }

        let Some(mut removed) = tree::remove(&mut self.tree, id) else {
            return Err(anyhow!("entity {} not in tree", id));
        };
        removed.node.entity.parent_id = parent_id;
        if let Some(entity) = self.entity_mut(id) {
            entity.parent_id = parent_id;
        }

        let position = position.unwrap_or_default();
        let index = match tree::siblings_mut(&mut self.tree, parent_id) {
            Some(siblings) => {
                let reference_ix =
                    reference_id.and_then(|r| siblings.iter().position(|n| n.id() == r));
                match (reference_ix, position) {
                    (Some(ix), Position::Before) => ix,
                    (Some(ix), Position::After) => ix + 1,
                    (None, Position::Before) if reference_id.is_none() => 0,
                    _ => siblings.len(),
                }
            }
            None => 0,
        };
        if tree::insert(&mut self.tree, parent_id, index, removed.node).is_err() {
            debug!("target {:?} not visible, {} leaves the tree", parent_id, id);
        }

        self.renumber(old_parent);
        if parent_id != old_parent {
            self.renumber(parent_id);
        }
        Ok(())
    }

    /// Rewrite the manual order of a sibling group so the cached list agrees
    /// with the tree. Hidden siblings keep their slots.
    fn renumber(&mut self, parent: Option<Uuid>) {
        let visible: Vec<Uuid> = match parent {
            None => self.tree.iter().map(Node::id).collect(),
            Some(pid) => match tree::find(&self.tree, pid) {
                Some(node) => node.children.iter().map(Node::id).collect(),
                None => return,
            },
        };
        let visible_set: HashSet<Uuid> = visible.iter().copied().collect();

        let mut group: Vec<(Uuid, f64)> = self
            .entities
            .iter()
            .filter(|e| e.parent_id == parent)
            .map(|e| (e.id, e.order()))
            .collect();
        group.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut next_visible = visible.iter().filter(|id| {
            self.entities
                .iter()
                .any(|e| e.id == **id && e.parent_id == parent)
        });
        let slots: Vec<Uuid> = group
            .iter()
            .map(|(id, _)| {
                if visible_set.contains(id) {
                    next_visible.next().copied().unwrap_or(*id)
                } else {
                    *id
                }
            })
            .collect();

        let orders: HashMap<Uuid, f64> = slots
            .into_iter()
            .enumerate()
            .map(|(ix, id)| (id, ix as f64))
            .collect();
        for entity in self.entities.iter_mut() {
            if let Some(order) = orders.get(&entity.id) {
                entity.order = *order;
            }
        }
        for node in tree::siblings_mut(&mut self.tree, parent)
            .into_iter()
            .flat_map(|s| s.iter_mut())
        {
            if let Some(order) = orders.get(&node.id()) {
                node.entity.order = *order;
            }
        }
    }
}
