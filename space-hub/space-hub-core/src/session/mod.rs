//! Per-collection owner of the tree state.
//!
//! A session is created once and pointed at a collection with
//! [`SpaceSession::select_collection`]. Everything it caches belongs to that
//! collection; switching or deselecting throws the cache away and bumps the
//! scope token so reads issued for the previous collection are ignored when
//! they land.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::entity::{Entity, NewEntity};
use crate::events::{EventBus, TreeEvent};
use crate::filter::Filters;
use crate::mutation::MutationController;
use crate::preferences::PreferenceSync;
use crate::projection::{DropProjection, DropProjector, DropRequest, LayoutCache, Position};
use crate::service::{ReorderDirection, SpaceService};
use crate::sort::SortMode;
use crate::state::TreeState;
use crate::tree::{self, FlattenedTree};


#[derive(Clone, Debug, Default, PartialEq)]
struct ViewSettings {
    sort: SortMode,
    filters: Filters,
}

pub struct SpaceSession {
    service: Arc<dyn SpaceService>,
    config: SessionConfig,
    state: Rc<RefCell<TreeState>>,
    controller: MutationController,
    preferences: PreferenceSync,
    projector: DropProjector,
    events: EventBus,
    view: RefCell<ViewSettings>,
    collection: Cell<Option<Uuid>>,
    scope: Cell<u64>,
    loading: Cell<bool>,
}

impl SpaceSession {
    pub fn new(service: Arc<dyn SpaceService>, config: SessionConfig) -> Self {
        let state = Rc::new(RefCell::new(TreeState::default()));
        let events = EventBus::new();
        let controller = MutationController::new(state.clone(), service.clone(), events.clone());
        Self {
            preferences: PreferenceSync::new(service.clone(), config.debounce()),
            projector: DropProjector::new(config.indent_width),
            service,
            config,
            state,
            controller,
            events,
            view: RefCell::new(ViewSettings::default()),
            collection: Cell::new(None),
            scope: Cell::new(0),
            loading: Cell::new(false),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn collection_id(&self) -> Option<Uuid> {
        self.collection.get()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    pub fn sort_mode(&self) -> SortMode {
        self.view.borrow().sort
    }

    pub fn filters(&self) -> Filters {
        self.view.borrow().filters.clone()
    }

    pub fn state(&self) -> Ref<'_, TreeState> {
        self.state.borrow()
    }

    pub fn tree(&self) -> Ref<'_, [tree::Node]> {
        Ref::map(self.state.borrow(), |s| s.tree.as_slice())
    }

    pub fn has_trash(&self) -> bool {
        self.state.borrow().has_trash
    }

    pub fn is_expanded(&self, id: Uuid) -> bool {
        self.state.borrow().expanded.contains(&id)
    }

    pub fn select_collection(&self, collection_id: Uuid) {
        self.reset(Some(collection_id));
        info!("selected collection {}", collection_id);
    }

    pub fn deselect(&self) {
        self.reset(None);
    }

    fn reset(&self, collection: Option<Uuid>) {
        self.scope.set(self.scope.get() + 1);
        self.collection.set(collection);
        self.loading.set(false);
        self.controller.discard_pending();
        self.state.borrow_mut().clear();
        *self.view.borrow_mut() = ViewSettings::default();
    }

    fn require_collection(&self) -> Result<Uuid> {
        self.collection
            .get()
            .ok_or_else(|| anyhow!("no collection selected"))
    }

    /// Fetch content, trash flag and preferences for the selected collection.
    ///
    /// A failed content read leaves the collection empty and is only logged.
    /// Responses that arrive after the selection changed are dropped.
    pub async fn load(&self) -> Result<()> {
        let collection_id = self.require_collection()?;
        let token = self.scope.get();
        self.loading.set(true);

        let (content, trash, prefs) = tokio::join!(
            self.service.get_tree_content(collection_id),
            self.service.has_trash(collection_id),
            self.service.get_preferences(collection_id),
        );

        if self.scope.get() != token {
            debug!("discarding stale load of collection {}", collection_id);
            return Ok(());
        }
        self.loading.set(false);

        let entities = match content {
            Ok(entities) => entities,
            Err(e) => {
                warn!("failed to load collection {}: {}", collection_id, e);
                self.state.borrow_mut().clear();
                self.events.send(TreeEvent::Rebuilt { nodes: 0 });
                return Ok(());
            }
        };
        let has_trash = trash.unwrap_or_else(|e| {
            warn!("failed to check trash of {}: {}", collection_id, e);
            false
        });

        {
            let mut state = self.state.borrow_mut();
            match prefs {
                Ok(prefs) => {
                    *self.view.borrow_mut() = ViewSettings {
                        sort: prefs.sort,
                        filters: prefs.filters,
                    };
                    state.expanded = prefs.expanded_folders.into_iter().collect();
                }
                Err(e) => warn!("failed to load preferences of {}: {}", collection_id, e),
            }
            state.entities = entities;
            state.has_trash = has_trash;
        }
        self.rebuild();
        debug!(
            "loaded {} entities into collection {}",
            self.state.borrow().entities.len(),
            collection_id
        );
        Ok(())
    }

    /// Filter, sort and nest the cached entities again.
    pub fn rebuild(&self) {
        let nodes = {
            let view = self.view.borrow();
            let mut state = self.state.borrow_mut();
            let visible = view.filters.apply(&state.entities, Utc::now());
            state.tree = tree::build_tree(&visible, &state.expanded, view.sort);
            tree::count(&state.tree)
        };
        self.events.send(TreeEvent::Rebuilt { nodes });
    }

    /// Returns the new expansion flag.
    pub fn toggle_expanded(&self, id: Uuid) -> bool {
        let expanded = !self.is_expanded(id);
        self.set_expanded(id, expanded);
        self.is_expanded(id)
    }

    /// Only folders can be expanded; anything else is ignored.
    pub fn set_expanded(&self, id: Uuid, expanded: bool) {
        let changed = {
            let mut state = self.state.borrow_mut();
            if !state.entity(id).is_some_and(Entity::is_folder) {
                return;
            }
            if expanded {
                state.expanded.insert(id)
            } else {
                state.expanded.remove(&id)
            }
        };
        if changed {
            self.expansion_changed();
        }
    }

    pub fn expand_all(&self) {
        {
            let mut state = self.state.borrow_mut();
            let folders: Vec<Uuid> = state
                .entities
                .iter()
                .filter(|e| e.is_folder())
                .map(|e| e.id)
                .collect();
            state.expanded.extend(folders);
        }
        self.expansion_changed();
    }

    pub fn collapse_all(&self) {
        self.state.borrow_mut().expanded.clear();
        self.expansion_changed();
    }

    fn expansion_changed(&self) {
        self.rebuild();
        if let Some(collection_id) = self.collection.get() {
            let mut expanded: Vec<Uuid> = self.state.borrow().expanded.iter().copied().collect();
            expanded.sort();
            self.preferences.schedule_expanded(collection_id, expanded);
        }
    }

    pub fn set_sort_mode(&self, sort: SortMode) {
        if self.view.borrow().sort == sort {
            return;
        }
        self.view.borrow_mut().sort = sort;
        self.rebuild();
        if let Some(collection_id) = self.collection.get() {
            self.preferences.schedule_sort(collection_id, sort);
        }
    }

    pub fn set_filters(&self, filters: Filters) {
        if self.view.borrow().filters == filters {
            return;
        }
        self.view.borrow_mut().filters = filters.clone();
        self.rebuild();
        if let Some(collection_id) = self.collection.get() {
            self.preferences.schedule_filters(collection_id, filters);
        }
    }

    pub fn flatten(&self) -> FlattenedTree {
        FlattenedTree::new(&self.state.borrow().tree)
    }

    /// Uniform row layout of the current flattened tree.
    pub fn layout(&self, flat: &FlattenedTree) -> LayoutCache {
        LayoutCache::uniform(flat.items(), self.config.row_height)
    }

    /// Project a drag frame over the current tree. Manual reordering is only
    /// allowed while the session sorts by manual order.
    pub fn project_drop(&self, request: DropRequest<'_>) -> Option<DropProjection> {
        let flat = self.flatten();
        let request = request.default_sort(self.sort_mode().is_default());
        self.projector.project(&flat, &request)
    }

    /// Carry out a projected drop.
    pub async fn drop_projection(&self, dragged_id: Uuid, projection: &DropProjection) -> Result<()> {
        if !projection.is_valid {
            return Err(anyhow!("drop of {} is not allowed here", dragged_id));
        }
        if projection.is_same_parent {
            self.controller
                .reorder_at(dragged_id, projection.reference_id, Some(projection.position))
                .await
        } else {
            self.controller
                .move_to(
                    dragged_id,
                    projection.target_parent_id,
                    projection.reference_id,
                    Some(projection.position),
                )
                .await
        }
    }

    pub async fn rename(&self, id: Uuid, title: &str) -> Result<Entity> {
        self.controller.rename(id, title).await
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<()> {
        self.controller.soft_delete(id).await
    }

    pub async fn reorder_adjacent(&self, id: Uuid, direction: ReorderDirection) -> Result<()> {
        self.controller.reorder_adjacent(id, direction).await
    }

    pub async fn move_to(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()> {
        self.controller
            .move_to(id, parent_id, reference_id, position)
            .await
    }

    pub async fn reorder_at(
        &self,
        id: Uuid,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()> {
        self.controller.reorder_at(id, reference_id, position).await
    }

    pub fn has_pending_mutation(&self) -> bool {
        self.controller.has_pending()
    }

    /// Create remotely, then add the new entity to the cache and open its
    /// parent folder.
    pub async fn create_entity(&self, spec: NewEntity) -> Result<Entity> {
        let token = self.scope.get();
        let collection_id = spec.collection_id;
        let parent_id = spec.parent_id;
        let entity = self.service.create_entity(spec).await?;

        if self.scope.get() != token || self.collection.get() != Some(collection_id) {
            debug!("created {} outside the selected collection", entity.id);
            return Ok(entity);
        }
        {
            let mut state = self.state.borrow_mut();
            state.entities.push(entity.clone());
            if let Some(pid) = parent_id {
                state.expanded.insert(pid);
            }
        }
        if parent_id.is_some() {
            self.expansion_changed();
        } else {
            self.rebuild();
        }
        Ok(entity)
    }

    pub async fn trash_content(&self) -> Result<Vec<Entity>> {
        let collection_id = self.require_collection()?;
        self.service.get_trash_content(collection_id).await
    }

    /// Restore from the trash. Not optimistic: the tree is reloaded once the
    /// service confirms.
    pub async fn restore(&self, id: Uuid) -> Result<()> {
        self.require_collection()?;
        self.service.restore(id).await?;
        self.load().await
    }

    /// Replace the optimistic trash flag with the service's answer.
    pub async fn refresh_trash_flag(&self) -> Result<bool> {
        let collection_id = self.require_collection()?;
        let token = self.scope.get();
        let has_trash = self.service.has_trash(collection_id).await?;
        if self.scope.get() != token {
            debug!("discarding stale trash flag of {}", collection_id);
            return Ok(has_trash);
        }
        let changed = {
            let mut state = self.state.borrow_mut();
            std::mem::replace(&mut state.has_trash, has_trash) != has_trash
        };
        if changed {
            self.events.send(TreeEvent::TrashChanged { has_trash });
        }
        Ok(has_trash)
    }

    /// Drop any preference writes that have not fired yet.
    pub fn cancel_pending_writes(&self) {
        self.preferences.cancel_all();
    }
}
