//! Scripted in-memory service used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::entity::{Entity, NewEntity};
use crate::preferences::{Preferences, PreferencesPatch};
use crate::projection::Position;
use crate::service::{ReorderDirection, SpaceService};

pub struct MockService {
    content: Mutex<HashMap<Uuid, Vec<Entity>>>,
    trash: Mutex<HashMap<Uuid, Vec<Entity>>>,
    prefs: Mutex<HashMap<Uuid, Preferences>>,
    calls: Mutex<Vec<String>>,
    writes: Mutex<Vec<(Uuid, PreferencesPatch)>>,
    failing: Mutex<HashSet<String>>,
    gated: AtomicBool,
    gate: Semaphore,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            content: Mutex::new(HashMap::new()),
            trash: Mutex::new(HashMap::new()),
            prefs: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    pub fn with_content(collection_id: Uuid, entities: Vec<Entity>) -> Self {
        let service = Self::new();
        service.content.lock().insert(collection_id, entities);
        service
    }

    pub fn set_preferences(&self, collection_id: Uuid, prefs: Preferences) {
        self.prefs.lock().insert(collection_id, prefs);
    }

    /// Make every later call of `op` fail.
    pub fn fail(&self, op: &str) {
        self.failing.lock().insert(op.to_string());
    }

    pub fn succeed(&self, op: &str) {
        self.failing.lock().remove(op);
    }

    /// Hold every call until `release` hands out a permit.
    pub fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, calls: usize) {
        self.gate.add_permits(calls);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn preference_writes(&self) -> Vec<(Uuid, PreferencesPatch)> {
        self.writes.lock().clone()
    }

    async fn enter(&self, op: &str) -> Result<()> {
        self.calls.lock().push(op.to_string());
        if self.gated.load(Ordering::SeqCst) {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| anyhow!("gate closed: {}", e))?;
            permit.forget();
        }
        if self.failing.lock().contains(op) {
            return Err(anyhow!("{} rejected", op));
        }
        Ok(())
    }

    fn collection_of(&self, id: Uuid) -> Option<Uuid> {
        self.content
            .lock()
            .iter()
            .find(|(_, entities)| entities.iter().any(|e| e.id == id))
            .map(|(cid, _)| *cid)
    }
}

#[async_trait]
impl SpaceService for MockService {
    async fn get_tree_content(&self, collection_id: Uuid) -> Result<Vec<Entity>> {
        self.enter("get_tree_content").await?;
        Ok(self
            .content
            .lock()
            .get(&collection_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_trash_content(&self, collection_id: Uuid) -> Result<Vec<Entity>> {
        self.enter("get_trash_content").await?;
        Ok(self
            .trash
            .lock()
            .get(&collection_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn has_trash(&self, collection_id: Uuid) -> Result<bool> {
        self.enter("has_trash").await?;
        Ok(self
            .trash
            .lock()
            .get(&collection_id)
            .is_some_and(|t| !t.is_empty()))
    }

    async fn get_preferences(&self, collection_id: Uuid) -> Result<Preferences> {
        self.enter("get_preferences").await?;
        Ok(self
            .prefs
            .lock()
            .get(&collection_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_preferences(&self, collection_id: Uuid, patch: PreferencesPatch) -> Result<()> {
        self.enter("update_preferences").await?;
        self.prefs
            .lock()
            .entry(collection_id)
            .or_default()
            .apply(patch.clone());
        self.writes.lock().push((collection_id, patch));
        Ok(())
    }

    async fn create_entity(&self, spec: NewEntity) -> Result<Entity> {
        self.enter("create_entity").await?;
        let entity = Entity::new(spec.kind, spec.title, spec.parent_id).with_author(spec.author);
        self.content
            .lock()
            .entry(spec.collection_id)
            .or_default()
            .push(entity.clone());
        Ok(entity)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        self.enter("soft_delete").await?;
        let Some(cid) = self.collection_of(id) else {
            return Err(anyhow!("entity not found"));
        };
        let mut content = self.content.lock();
        let entities = content.entry(cid).or_default();
        let Some(ix) = entities.iter().position(|e| e.id == id) else {
            return Err(anyhow!("entity not found"));
        };
        let removed = entities.remove(ix);
        self.trash.lock().entry(cid).or_default().push(removed);
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> Result<()> {
        self.enter("restore").await?;
        let mut trash = self.trash.lock();
        for (cid, items) in trash.iter_mut() {
            if let Some(ix) = items.iter().position(|e| e.id == id) {
                let entity = items.remove(ix);
                self.content.lock().entry(*cid).or_default().push(entity);
                return Ok(());
            }
        }
        Err(anyhow!("entity not in trash"))
    }

    async fn rename(&self, id: Uuid, title: &str) -> Result<Entity> {
        self.enter("rename").await?;
        let mut content = self.content.lock();
        for entities in content.values_mut() {
            if let Some(entity) = entities.iter_mut().find(|e| e.id == id) {
                entity.title = Some(title.to_string());
                return Ok(entity.clone());
            }
        }
        Err(anyhow!("entity not found"))
    }

    async fn move_entity(
        &self,
        _id: Uuid,
        _parent_id: Option<Uuid>,
        _reference_id: Option<Uuid>,
        _position: Option<Position>,
    ) -> Result<()> {
        self.enter("move_entity").await
    }

    async fn reorder_adjacent(&self, _id: Uuid, _direction: ReorderDirection) -> Result<()> {
        self.enter("reorder_adjacent").await
    }

    async fn reorder_at(
        &self,
        _id: Uuid,
        _reference_id: Option<Uuid>,
        _position: Option<Position>,
    ) -> Result<()> {
        self.enter("reorder_at").await
    }
}
