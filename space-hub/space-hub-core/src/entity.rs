//! Flat records as handed out by the persistence service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether an entity can hold children.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Folder,
    Document,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Folder => "folder",
            EntityKind::Document => "document",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "folder" | "Folder" => EntityKind::Folder,
            _ => EntityKind::Document,
        }
    }
}

/// A document or folder inside a collection.
///
/// Missing titles, orders and authors deserialize to their empty values so a
/// sparse record from the service never fails to load.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: Uuid,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub kind: EntityKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub order: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub author: String,
}

impl Entity {
    pub fn new(kind: EntityKind, title: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            parent_id,
            kind,
            title: Some(title.into()),
            order: 0.0,
            created_at: now,
            updated_at: now,
            author: String::new(),
        }
    }

    pub fn folder(title: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self::new(EntityKind::Folder, title, parent_id)
    }

    pub fn document(title: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self::new(EntityKind::Document, title, parent_id)
    }

    pub fn with_order(mut self, order: f64) -> Self {
        self.order = order;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntityKind::Folder
    }

    /// Title used for display and sorting; absent titles read as empty.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    /// Order value with non-finite numbers coerced to zero.
    pub fn order(&self) -> f64 {
        if self.order.is_finite() {
            self.order
        } else {
            0.0
        }
    }
}

/// Request payload for creating a new entity through the service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewEntity {
    pub collection_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub kind: EntityKind,
    pub title: String,
    #[serde(default)]
    pub author: String,
}
