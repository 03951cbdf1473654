//! Persistence capabilities the tree core depends on.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, NewEntity};
use crate::preferences::{Preferences, PreferencesPatch};
use crate::projection::Position;

/// Direction of a one-step sibling swap.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReorderDirection {
    Up,
    Down,
}

/// Remote side of a collection. Every call may fail.
#[async_trait]
pub trait SpaceService: Send + Sync {
    async fn get_tree_content(&self, collection_id: Uuid) -> Result<Vec<Entity>>;
    async fn get_trash_content(&self, collection_id: Uuid) -> Result<Vec<Entity>>;
    async fn has_trash(&self, collection_id: Uuid) -> Result<bool>;

    async fn get_preferences(&self, collection_id: Uuid) -> Result<Preferences>;
    async fn update_preferences(&self, collection_id: Uuid, patch: PreferencesPatch) -> Result<()>;

    async fn create_entity(&self, spec: NewEntity) -> Result<Entity>;
    async fn soft_delete(&self, id: Uuid) -> Result<()>;
    async fn restore(&self, id: Uuid) -> Result<()>;
    async fn rename(&self, id: Uuid, title: &str) -> Result<Entity>;
    async fn move_entity(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()>;
    async fn reorder_adjacent(&self, id: Uuid, direction: ReorderDirection) -> Result<()>;
    async fn reorder_at(
        &self,
        id: Uuid,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()>;
}
