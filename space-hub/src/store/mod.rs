//! JSON-file-backed implementation of the space service.
//!
//! The whole store lives in one file and is rewritten after every change.
//! Deleting only stamps `deleted_at`; the stamped records make up the trash
//! until they are restored. Changes are made on a copy that replaces the
//! live data only once it is on disk.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use space_hub_core::entity::{Entity, NewEntity};
use space_hub_core::preferences::{Preferences, PreferencesPatch};
use space_hub_core::projection::Position;
use space_hub_core::service::{ReorderDirection, SpaceService};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;


#[derive(Clone, Debug, Serialize, Deserialize)]
struct Record {
    entity: Entity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
}

impl Record {
    fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Collection {
    name: String,
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    preferences: Preferences,
}

impl Collection {
    fn record(&self, id: Uuid) -> Option<&Record> {
        self.records.iter().find(|r| r.entity.id == id)
    }

    fn record_mut(&mut self, id: Uuid) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.entity.id == id)
    }

    fn live(&self, id: Uuid) -> Result<&Entity> {
        match self.record(id) {
            Some(r) if r.is_live() => Ok(&r.entity),
            Some(_) => Err(anyhow!("entity {} is in the trash", id)),
            None => Err(anyhow!("entity {} not found", id)),
        }
    }

    fn require_folder(&self, id: Uuid) -> Result<()> {
        if self.live(id)?.is_folder() {
            Ok(())
        } else {
            Err(anyhow!("{} is not a folder", id))
        }
    }

    /// `id` plus everything below it, live or not.
    fn subtree(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            stack.extend(
                self.records
                    .iter()
                    .filter(|r| r.entity.parent_id == Some(current))
                    .map(|r| r.entity.id),
            );
        }
        out
    }

    /// Live children of `parent` in manual order.
    fn siblings(&self, parent: Option<Uuid>) -> Vec<Uuid> {
        let mut group: Vec<&Entity> = self
            .records
            .iter()
            .filter(|r| r.is_live() && r.entity.parent_id == parent)
            .map(|r| &r.entity)
            .collect();
        group.sort_by(|a, b| a.order().total_cmp(&b.order()));
        group.into_iter().map(|e| e.id).collect()
    }

    fn renumber(&mut self, ordered: &[Uuid]) {
        let slots: HashMap<Uuid, f64> = ordered
            .iter()
            .enumerate()
            .map(|(ix, id)| (*id, ix as f64))
            .collect();
        for record in self.records.iter_mut() {
            if let Some(order) = slots.get(&record.entity.id) {
                record.entity.order = *order;
            }
        }
    }

    /// Put `id` into `parent` next to `reference_id` and renumber the group.
    fn place(
        &mut self,
        id: Uuid,
        parent: Option<Uuid>,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) {
        let mut group: Vec<Uuid> = self
            .siblings(parent)
            .into_iter()
            .filter(|s| *s != id)
            .collect();
        let reference_ix = reference_id.and_then(|r| group.iter().position(|s| *s == r));
        let index = match (reference_ix, position.unwrap_or_default()) {
            (Some(ix), Position::Before) => ix,
            (Some(ix), Position::After) => ix + 1,
            (None, Position::Before) if reference_id.is_none() => 0,
            _ => group.len(),
        };
        group.insert(index, id);
        self.renumber(&group);
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    collections: HashMap<Uuid, Collection>,
}

impl StoreData {
    fn collection(&self, id: Uuid) -> Result<&Collection> {
        self.collections
            .get(&id)
            .ok_or_else(|| anyhow!("collection {} not found", id))
    }

    fn collection_mut(&mut self, id: Uuid) -> Result<&mut Collection> {
        self.collections
            .get_mut(&id)
            .ok_or_else(|| anyhow!("collection {} not found", id))
    }

    /// Collection holding the entity with `id`, trashed or not.
    fn owner_of(&self, id: Uuid) -> Result<Uuid> {
        self.collections
            .iter()
            .find(|(_, c)| c.record(id).is_some())
            .map(|(cid, _)| *cid)
            .ok_or_else(|| anyhow!("entity {} not found", id))
    }
}

/// Single-file store shared behind an async lock.
pub struct JsonSpaceStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl JsonSpaceStore {
    /// Open the store at `path`, starting empty when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            StoreData::default()
        };
        info!("opened space store at {}", path.display());
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn create_collection(&self, name: &str) -> Result<Uuid> {
        self.update(|data| {
            let id = Uuid::new_v4();
            data.collections.insert(
                id,
                Collection {
                    name: name.to_string(),
                    ..Default::default()
                },
            );
            Ok(id)
        })
        .await
    }

    /// All collections as `(id, name)`, sorted by name.
    pub async fn collections(&self) -> Vec<(Uuid, String)> {
        let data = self.data.read().await;
        let mut out: Vec<(Uuid, String)> = data
            .collections
            .iter()
            .map(|(id, c)| (*id, c.name.clone()))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1));
        out
    }

    /// Look a collection up by id or by name.
    pub async fn resolve_collection(&self, key: &str) -> Option<Uuid> {
        let data = self.data.read().await;
        if let Ok(id) = Uuid::parse_str(key) {
            if data.collections.contains_key(&id) {
                return Some(id);
            }
        }
        data.collections
            .iter()
            .find(|(_, c)| c.name == key)
            .map(|(id, _)| *id)
    }

    pub async fn entity(&self, id: Uuid) -> Option<Entity> {
        let data = self.data.read().await;
        data.collections
            .values()
            .find_map(|c| c.record(id))
            .map(|r| r.entity.clone())
    }

    /// Apply `edit` to a copy of the data, write the copy, then swap it in.
    /// A failed edit or write leaves the live data untouched.
    async fn update<T>(&self, edit: impl FnOnce(&mut StoreData) -> Result<T>) -> Result<T> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let out = edit(&mut next)?;
        self.persist(&next).await?;
        *data = next;
        Ok(out)
    }

    async fn persist(&self, data: &StoreData) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let raw = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SpaceService for JsonSpaceStore {
    async fn get_tree_content(&self, collection_id: Uuid) -> Result<Vec<Entity>> {
        let data = self.data.read().await;
        Ok(data
            .collection(collection_id)?
            .records
            .iter()
            .filter(|r| r.is_live())
            .map(|r| r.entity.clone())
            .collect())
    }

    /// Deleted records whose parent is not itself in the trash.
    async fn get_trash_content(&self, collection_id: Uuid) -> Result<Vec<Entity>> {
        let data = self.data.read().await;
        let collection = data.collection(collection_id)?;
        Ok(collection
            .records
            .iter()
            .filter(|r| !r.is_live())
            .filter(|r| {
                r.entity
                    .parent_id
                    .and_then(|pid| collection.record(pid))
                    .map_or(true, Record::is_live)
            })
            .map(|r| r.entity.clone())
            .collect())
    }

    async fn has_trash(&self, collection_id: Uuid) -> Result<bool> {
        let data = self.data.read().await;
        Ok(data
            .collection(collection_id)?
            .records
            .iter()
            .any(|r| !r.is_live()))
    }

    async fn get_preferences(&self, collection_id: Uuid) -> Result<Preferences> {
        let data = self.data.read().await;
        Ok(data.collection(collection_id)?.preferences.clone())
    }

    async fn update_preferences(&self, collection_id: Uuid, patch: PreferencesPatch) -> Result<()> {
        self.update(|data| {
            data.collection_mut(collection_id)?.preferences.apply(patch);
            Ok(())
        })
        .await
    }

    async fn create_entity(&self, spec: NewEntity) -> Result<Entity> {
        let entity = self
            .update(|data| {
                let collection = data.collection_mut(spec.collection_id)?;
                if let Some(pid) = spec.parent_id {
                    collection.require_folder(pid)?;
                }
                let order = collection.siblings(spec.parent_id).len() as f64;
                let entity = Entity::new(spec.kind, spec.title, spec.parent_id)
                    .with_order(order)
                    .with_author(spec.author);
                collection.records.push(Record {
                    entity: entity.clone(),
                    deleted_at: None,
                });
                Ok(entity)
            })
            .await?;
        debug!("created {} {}", entity.kind.as_str(), entity.id);
        Ok(entity)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let trashed = self
            .update(|data| {
                let cid = data.owner_of(id)?;
                let collection = data.collection_mut(cid)?;
                let parent = collection.live(id)?.parent_id;
                let now = Utc::now();
                let subtree = collection.subtree(id);
                for member in &subtree {
                    if let Some(record) = collection.record_mut(*member) {
                        if record.is_live() {
                            record.deleted_at = Some(now);
                        }
                    }
                }
                let remaining = collection.siblings(parent);
                collection.renumber(&remaining);
                Ok(subtree.len())
            })
            .await?;
        debug!("trashed {} ({} entities)", id, trashed);
        Ok(())
    }

    /// Bring back `id` and everything that was trashed together with it. A
    /// record whose parent is gone comes back at the root.
    async fn restore(&self, id: Uuid) -> Result<()> {
        self.update(|data| {
            let cid = data.owner_of(id)?;
            let collection = data.collection_mut(cid)?;
            let (stamp, parent) = match collection.record(id) {
                Some(Record {
                    deleted_at: Some(stamp),
                    entity,
                }) => (*stamp, entity.parent_id),
                _ => return Err(anyhow!("entity {} is not in the trash", id)),
            };
            let parent = parent.filter(|pid| collection.live(*pid).is_ok());
            for member in collection.subtree(id) {
                if let Some(record) = collection.record_mut(member) {
                    if record.deleted_at == Some(stamp) {
                        record.deleted_at = None;
                    }
                }
            }
            if let Some(record) = collection.record_mut(id) {
                record.entity.parent_id = parent;
            }
            collection.place(id, parent, None, Some(Position::After));
            Ok(())
        })
        .await
    }

    async fn rename(&self, id: Uuid, title: &str) -> Result<Entity> {
        self.update(|data| {
            let cid = data.owner_of(id)?;
            let collection = data.collection_mut(cid)?;
            collection.live(id)?;
            match collection.record_mut(id) {
                Some(record) => {
                    record.entity.title = Some(title.to_string());
                    record.entity.updated_at = Utc::now();
                    Ok(record.entity.clone())
                }
                None => Err(anyhow!("entity {} not found", id)),
            }
        })
        .await
    }

    async fn move_entity(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()> {
        self.update(|data| {
            let cid = data.owner_of(id)?;
            let collection = data.collection_mut(cid)?;
            let old_parent = collection.live(id)?.parent_id;
            if let Some(pid) = parent_id {
                // check structure before touching anything
                if collection.subtree(id).contains(&pid) {
                    return Err(anyhow!("cannot move folder into its own descendant"));
                }
                collection.require_folder(pid)?;
            }
            if let Some(record) = collection.record_mut(id) {
                record.entity.parent_id = parent_id;
                record.entity.updated_at = Utc::now();
            }
            collection.place(id, parent_id, reference_id, position);
            if old_parent != parent_id {
                let remaining = collection.siblings(old_parent);
                collection.renumber(&remaining);
            }
            Ok(())
        })
        .await
    }

    async fn reorder_adjacent(&self, id: Uuid, direction: ReorderDirection) -> Result<()> {
        self.update(|data| {
            let cid = data.owner_of(id)?;
            let collection = data.collection_mut(cid)?;
            let parent = collection.live(id)?.parent_id;
            let mut group = collection.siblings(parent);
            let Some(ix) = group.iter().position(|s| *s == id) else {
                return Err(anyhow!("entity {} not found", id));
            };
            let other = match direction {
                ReorderDirection::Up if ix > 0 => ix - 1,
                ReorderDirection::Down if ix + 1 < group.len() => ix + 1,
                _ => return Ok(()),
            };
            group.swap(ix, other);
            collection.renumber(&group);
            Ok(())
        })
        .await
    }

    async fn reorder_at(
        &self,
        id: Uuid,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()> {
        self.update(|data| {
            let cid = data.owner_of(id)?;
            let collection = data.collection_mut(cid)?;
            let parent = collection.live(id)?.parent_id;
            collection.place(id, parent, reference_id, position);
            Ok(())
        })
        .await
    }
}
