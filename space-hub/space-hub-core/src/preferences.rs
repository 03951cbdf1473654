//! Per-collection view preferences and their debounced persistence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::filter::Filters;
use crate::service::SpaceService;
use crate::sort::SortMode;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub sort: SortMode,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub expanded_folders: Vec<Uuid>,
}

impl Preferences {
    pub fn apply(&mut self, patch: PreferencesPatch) {
        if let Some(sort) = patch.sort {
            self.sort = sort;
        }
        if let Some(filters) = patch.filters {
            self.filters = filters;
        }
        if let Some(expanded) = patch.expanded_folders {
            self.expanded_folders = expanded;
        }
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PreferencesPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_folders: Option<Vec<Uuid>>,
}

impl PreferencesPatch {
    pub fn sort(sort: SortMode) -> Self {
        Self {
            sort: Some(sort),
            ..Default::default()
        }
    }

    pub fn filters(filters: Filters) -> Self {
        Self {
            filters: Some(filters),
            ..Default::default()
        }
    }

    pub fn expanded_folders(expanded: Vec<Uuid>) -> Self {
        Self {
            expanded_folders: Some(expanded),
            ..Default::default()
        }
    }
}

/// Each preference has its own timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    Sort,
    Filters,
    ExpandedFolders,
}

impl PreferenceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceKey::Sort => "sort",
            PreferenceKey::Filters => "filters",
            PreferenceKey::ExpandedFolders => "expanded_folders",
        }
    }
}

/// Cancel-and-replace writer: a new value for a key aborts the pending write
/// for that key and restarts the quiet window. Timers are per collection, so
/// switching collections never drops the previous collection's last change.
pub struct PreferenceSync {
    service: Arc<dyn SpaceService>,
    quiet: Duration,
    pending: Mutex<HashMap<(Uuid, PreferenceKey), JoinHandle<()>>>,
}

impl PreferenceSync {
    pub fn new(service: Arc<dyn SpaceService>, quiet: Duration) -> Self {
        Self {
            service,
            quiet,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet
    }

    pub fn schedule_sort(&self, collection_id: Uuid, sort: SortMode) {
        self.schedule(PreferenceKey::Sort, collection_id, PreferencesPatch::sort(sort));
    }

    pub fn schedule_filters(&self, collection_id: Uuid, filters: Filters) {
        self.schedule(
            PreferenceKey::Filters,
            collection_id,
            PreferencesPatch::filters(filters),
        );
    }

    pub fn schedule_expanded(&self, collection_id: Uuid, expanded: Vec<Uuid>) {
        self.schedule(
            PreferenceKey::ExpandedFolders,
            collection_id,
            PreferencesPatch::expanded_folders(expanded),
        );
    }

    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, key: PreferenceKey, collection_id: Uuid, patch: PreferencesPatch) {
        let service = self.service.clone();
        let quiet = self.quiet;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            match service.update_preferences(collection_id, patch).await {
                Ok(()) => debug!("saved {} preference for {}", key.as_str(), collection_id),
                // local state stays authoritative; the next load reconciles
                Err(e) => warn!("failed to save {} preference: {}", key.as_str(), e),
            }
        });
        if let Some(previous) = self.pending.lock().insert((collection_id, key), handle) {
            previous.abort();
        }
    }

    /// Number of writes that have not finished yet.
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Drop every pending write without persisting it.
    pub fn cancel_all(&self) {
        for (_, handle) in self.pending.lock().drain() {
            handle.abort();
        }
    }
}
