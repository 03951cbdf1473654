use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use space_hub::render::render_tree;
use space_hub::store::JsonSpaceStore;
use space_hub_core::config::SessionConfig;
use space_hub_core::entity::{Entity, EntityKind, NewEntity};
use space_hub_core::preferences::{Preferences, PreferencesPatch};
use space_hub_core::projection::{DropRequest, Position};
use space_hub_core::service::{ReorderDirection, SpaceService};
use space_hub_core::session::SpaceSession;
use tempfile::TempDir;
use uuid::Uuid;

/// Store wrapper that rejects every edit while `failing` is set.
struct FlakyStore {
    inner: JsonSpaceStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(anyhow!("store unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SpaceService for FlakyStore {
    async fn get_tree_content(&self, collection_id: Uuid) -> Result<Vec<Entity>> {
        self.inner.get_tree_content(collection_id).await
    }

    async fn get_trash_content(&self, collection_id: Uuid) -> Result<Vec<Entity>> {
        self.inner.get_trash_content(collection_id).await
    }

    async fn has_trash(&self, collection_id: Uuid) -> Result<bool> {
        self.inner.has_trash(collection_id).await
    }

    async fn get_preferences(&self, collection_id: Uuid) -> Result<Preferences> {
        self.inner.get_preferences(collection_id).await
    }

    async fn update_preferences(&self, collection_id: Uuid, patch: PreferencesPatch) -> Result<()> {
        self.check()?;
        self.inner.update_preferences(collection_id, patch).await
    }

    async fn create_entity(&self, spec: NewEntity) -> Result<Entity> {
        self.check()?;
        self.inner.create_entity(spec).await
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        self.check()?;
        self.inner.soft_delete(id).await
    }

    async fn restore(&self, id: Uuid) -> Result<()> {
        self.check()?;
        self.inner.restore(id).await
    }

    async fn rename(&self, id: Uuid, title: &str) -> Result<Entity> {
        self.check()?;
        self.inner.rename(id, title).await
    }

    async fn move_entity(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()> {
        self.check()?;
        self.inner
            .move_entity(id, parent_id, reference_id, position)
            .await
    }

    async fn reorder_adjacent(&self, id: Uuid, direction: ReorderDirection) -> Result<()> {
        self.check()?;
        self.inner.reorder_adjacent(id, direction).await
    }

    async fn reorder_at(
        &self,
        id: Uuid,
        reference_id: Option<Uuid>,
        position: Option<Position>,
    ) -> Result<()> {
        self.check()?;
        self.inner.reorder_at(id, reference_id, position).await
    }
}

struct Harness {
    _tempdir: TempDir,
    store: Arc<FlakyStore>,
    session: SpaceSession,
    folder: Uuid,
    a: Uuid,
    b: Uuid,
}

/// folder { a, b }
async fn harness() -> Harness {
    let tempdir = tempfile::tempdir().unwrap();
    let inner = JsonSpaceStore::open(tempdir.path().join("space.json")).unwrap();
    let cid = inner.create_collection("notes").await.unwrap();
    let create = |kind, title: &str, parent| NewEntity {
        collection_id: cid,
        parent_id: parent,
        kind,
        title: title.to_string(),
        author: "user1".to_string(),
    };
    let folder = inner
        .create_entity(create(EntityKind::Folder, "folder", None))
        .await
        .unwrap()
        .id;
    let a = inner
        .create_entity(create(EntityKind::Document, "a", Some(folder)))
        .await
        .unwrap()
        .id;
    let b = inner
        .create_entity(create(EntityKind::Document, "b", Some(folder)))
        .await
        .unwrap()
        .id;

    inner
        .update_preferences(cid, PreferencesPatch::expanded_folders(vec![folder]))
        .await
        .unwrap();

    let store = Arc::new(FlakyStore {
        inner,
        failing: AtomicBool::new(false),
    });
    let session = SpaceSession::new(store.clone(), SessionConfig::default());
    session.select_collection(cid);
    session.load().await.unwrap();
    Harness {
        _tempdir: tempdir,
        store,
        session,
        folder,
        a,
        b,
    }
}

fn visible(session: &SpaceSession) -> Vec<Uuid> {
    session.flatten().items().iter().map(|i| i.id).collect()
}

#[tokio::test]
async fn drop_is_persisted_by_the_store() {
    let h = harness().await;
    let flat = h.session.flatten();
    let layout = h.session.layout(&flat);
    let row = h.session.config().row_height;

    // pointer just below the center of b
    let projection = h
        .session
        .project_drop(
            DropRequest::new(h.a, h.b)
                .layout(&layout)
                .pointer_y(row * 2.5 + 1.0),
        )
        .unwrap();
    assert_eq!(projection.reference_id, Some(h.b));
    assert_eq!(projection.position, Position::After);
    h.session.drop_projection(h.a, &projection).await.unwrap();
    assert_eq!(visible(&h.session), vec![h.folder, h.b, h.a]);

    // a fresh load sees the same order
    h.session.load().await.unwrap();
    assert_eq!(visible(&h.session), vec![h.folder, h.b, h.a]);
}

#[tokio::test]
async fn rejected_rename_reverts_title() {
    let h = harness().await;
    h.store.failing.store(true, Ordering::SeqCst);

    let err = h.session.rename(h.a, "renamed").await.unwrap_err();
    assert!(err.to_string().contains("store unavailable"));
    assert_eq!(h.session.state().entity(h.a).unwrap().title(), "a");
    assert_eq!(h.store.inner.entity(h.a).await.unwrap().title(), "a");
}

#[tokio::test]
async fn rejected_delete_restores_subtree() {
    let h = harness().await;
    h.store.failing.store(true, Ordering::SeqCst);

    assert!(h.session.soft_delete(h.folder).await.is_err());
    assert_eq!(visible(&h.session), vec![h.folder, h.a, h.b]);
    assert!(!h.session.has_trash());
}

#[tokio::test]
async fn delete_and_restore_through_store() {
    let h = harness().await;

    h.session.soft_delete(h.a).await.unwrap();
    assert_eq!(visible(&h.session), vec![h.folder, h.b]);
    assert!(h.session.refresh_trash_flag().await.unwrap());
    assert_eq!(h.session.trash_content().await.unwrap().len(), 1);

    h.session.restore(h.a).await.unwrap();
    assert_eq!(visible(&h.session), vec![h.folder, h.b, h.a]);
    assert!(!h.session.has_trash());
}

#[tokio::test]
async fn nudge_at_top_is_silent() {
    let h = harness().await;
    h.store.failing.store(true, Ordering::SeqCst);

    // no remote call is made, so the failing store is never asked
    h.session
        .reorder_adjacent(h.a, ReorderDirection::Up)
        .await
        .unwrap();
    assert_eq!(visible(&h.session), vec![h.folder, h.a, h.b]);
}

#[tokio::test]
async fn render_marks_folders_and_indents_children() {
    let h = harness().await;
    let out = render_tree(&h.session.flatten(), &h.session.state());
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("- folder"));
    assert!(lines[1].starts_with("    a"));
    assert!(lines[2].contains(&h.b.to_string()));
}
