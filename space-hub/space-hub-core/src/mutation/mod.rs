//! Optimistic edits: snapshot, apply locally, confirm remotely, roll back on
//! rejection.
//!
//! There is a single snapshot slot. A second edit issued while the first is
//! still awaiting confirmation snapshots the already-edited state, so rolling
//! it back lands on the state right after the first edit, not on the state
//! before both. A rejection whose snapshot was already replaced restores
//! nothing.

use std::cell::{Cell, Ref, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entity::Entity;
use crate::events::{EventBus, TreeEvent};
use crate::projection::Position;
use crate::service::{ReorderDirection, SpaceService};
use crate::state::{Snapshot, TreeState};


struct PendingSnapshot {
    ticket: u64,
    operation: &'static str,
    snapshot: Snapshot,
}

/// Cheap-to-clone handle; clones share state and the snapshot slot.
#[derive(Clone)]
pub struct MutationController {
    state: Rc<RefCell<TreeState>>,
    slot: Rc<RefCell<Option<PendingSnapshot>>>,
    tickets: Rc<Cell<u64>>,
    service: Arc<dyn SpaceService>,
    events: EventBus,
}

impl MutationController {
    pub fn new(
        state: Rc<RefCell<TreeState>>,
        service: Arc<dyn SpaceService>,
        events: EventBus,
    ) -> Self {
        Self {
            state,
            slot: Rc::new(RefCell::new(None)),
            tickets: Rc::new(Cell::new(0)),
            service,
            events,
        }
    }

    pub fn state(&self) -> Ref<'_, TreeState> {
        self.state.borrow()
    }

    /// Whether an edit is waiting for confirmation.
    pub fn has_pending(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Forget the pending snapshot. Used when the state it belongs to is
    /// replaced wholesale; a late rejection then has nothing to restore.
    pub fn discard_pending(&self) {
        if let Some(pending) = self.slot.borrow_mut().take() {
            debug!("discarding pending {} snapshot", pending.operation);
        }
    }

    pub async fn rename(&self, id: Uuid, title: &str) -> Result<Entity> {
        let ticket = self.begin("rename", |state| {
            state.rename_local(id, title)?;
            Ok(true)
        })?;
        self.events.send(TreeEvent::Renamed { id });
        let entity = self
            .confirm(ticket, self.service.rename(id, title))
            .await?;
        self.state.borrow_mut().reconcile(entity.clone());
        Ok(entity)
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let mut removed = 0;
        let ticket = self.begin("soft_delete", |state| {
            removed = state.remove_subtree_local(id)?.len();
            Ok(true)
        })?;
        self.events.send(TreeEvent::Deleted { id, removed });
        self.events.send(TreeEvent::TrashChanged { has_trash: true });
        self.confirm(ticket, self.service.soft_delete(id)).await
    }

    /// Swap with a neighbour. At either end of the sibling list this does
    /// nothing and never reaches the service.
    pub async fn reorder_adjacent(&self, id: Uuid, direction: ReorderDirection) -> Result<()> {
        let Some(ticket) = self.begin("reorder_adjacent", |state| {
            state.reorder_adjacent_local(id, direction)
        })?
        else {
            debug!("{} already at the {:?} boundary", id, direction);
            return Ok(());
        };
        self.events.send(TreeEvent::Reordered { id });
        self.confirm(Some(ticket), self.service.reorder_adjacent(id, direction))
            .await
    }

    pub async fn move_to(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()> {
        let ticket = self.begin("move", |state| {
            state.move_local(id, parent_id, reference_id, position)?;
            Ok(true)
        })?;
        self.events.send(TreeEvent::Moved {
            id,
            parent: parent_id,
        });
        self.confirm(
            ticket,
            self.service
                .move_entity(id, parent_id, reference_id, position),
        )
        .await
    }

    pub async fn reorder_at(
        &self,
        id: Uuid,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()> {
        let ticket = self.begin("reorder_at", |state| {
            state.reorder_at_local(id, reference_id, position)?;
            Ok(true)
        })?;
        self.events.send(TreeEvent::Reordered { id });
        self.confirm(ticket, self.service.reorder_at(id, reference_id, position))
            .await
    }

    /// Snapshot, then apply. `apply` reports whether anything changed; an
    /// unchanged state takes no snapshot and yields `None`.
    fn begin<F>(&self, operation: &'static str, apply: F) -> Result<Option<u64>>
    where
        F: FnOnce(&mut TreeState) -> Result<bool>,
    {
        let mut state = self.state.borrow_mut();
        let snapshot = Snapshot::capture(&state);
        match apply(&mut state) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(e) => {
                snapshot.restore(&mut state);
                return Err(e);
            }
        }
        let ticket = self.tickets.get() + 1;
        self.tickets.set(ticket);
        if let Some(previous) = self.slot.borrow_mut().replace(PendingSnapshot {
            ticket,
            operation,
            snapshot,
        }) {
            debug!(
                "{} snapshot replaces pending {} snapshot",
                operation, previous.operation
            );
        }
        Ok(Some(ticket))
    }

    async fn confirm<T>(
        &self,
        ticket: Option<u64>,
        remote: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let result = remote.await;
        let Some(ticket) = ticket else {
            return result;
        };
        match result {
            Ok(value) => {
                self.commit(ticket);
                Ok(value)
            }
            Err(e) => {
                self.rollback(ticket);
                Err(e)
            }
        }
    }

    fn commit(&self, ticket: u64) {
        let mut slot = self.slot.borrow_mut();
        // a newer edit owns the slot now; leave its snapshot alone
        if slot.as_ref().is_some_and(|p| p.ticket == ticket) {
            *slot = None;
        }
    }

    /// Restore the snapshot taken by `ticket`. When a newer edit has since
    /// replaced it, the slot belongs to that edit and nothing is restored;
    /// the rejected change stays on screen until the next load.
    fn rollback(&self, ticket: u64) {
        let mut slot = self.slot.borrow_mut();
        let pending = match slot.take() {
            Some(pending) if pending.ticket == ticket => pending,
            Some(newer) => {
                warn!(
                    "edit {} rejected after a newer {} was applied; local state diverges until reload",
                    ticket, newer.operation
                );
                *slot = Some(newer);
                return;
            }
            None => {
                warn!("edit {} rejected but no snapshot is left to restore", ticket);
                return;
            }
        };
        drop(slot);
        warn!("{} rejected, rolling back", pending.operation);
        let operation = pending.operation;
        pending.snapshot.restore(&mut self.state.borrow_mut());
        self.events.send(TreeEvent::RolledBack {
            operation: operation.to_string(),
        });
    }
}
