use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEvent {
    Rebuilt { nodes: usize },
    Renamed { id: Uuid },
    Deleted { id: Uuid, removed: usize },
    Moved { id: Uuid, parent: Option<Uuid> },
    Reordered { id: Uuid },
    RolledBack { operation: String },
    TrashChanged { has_trash: bool },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TreeEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: TreeEvent) {
        let _ = self.tx.send(event);
    }
}
