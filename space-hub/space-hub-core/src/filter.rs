//! Visibility filters over the flat entity list.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::Entity;

/// Relative window on `updated_at`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Day,
    Week,
    Month,
    Year,
}

impl TimeWindow {
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Day => Duration::days(1),
            TimeWindow::Week => Duration::days(7),
            TimeWindow::Month => Duration::days(30),
            TimeWindow::Year => Duration::days(365),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Filters {
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    /// Empty means every author.
    #[serde(default)]
    pub authors: Vec<String>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.time_window.is_none() && self.authors.is_empty()
    }

    /// Whether an entity passes every active predicate on its own.
    pub fn matches(&self, entity: &Entity, now: DateTime<Utc>) -> bool {
        if let Some(window) = self.time_window {
            if entity.updated_at < now - window.duration() {
                return false;
            }
        }
        if !self.authors.is_empty() && !self.authors.iter().any(|a| *a == entity.author) {
            return false;
        }
        true
    }

    /// Keep every matching entity plus all of its ancestors, in input order.
    ///
    /// A folder that fails the predicates stays visible as long as any of its
    /// descendants matches.
    pub fn apply(&self, entities: &[Entity], now: DateTime<Utc>) -> Vec<Entity> {
        if self.is_empty() {
            return entities.to_vec();
        }

        let parents: HashMap<Uuid, Option<Uuid>> =
            entities.iter().map(|e| (e.id, e.parent_id)).collect();
        let mut visible: HashSet<Uuid> = HashSet::new();
        for entity in entities.iter().filter(|e| self.matches(e, now)) {
            let mut current = Some(entity.id);
            while let Some(id) = current {
                // an already-visible node has its ancestors marked too
                if !visible.insert(id) {
                    break;
                }
                current = parents.get(&id).copied().flatten();
            }
        }

        entities
            .iter()
            .filter(|e| visible.contains(&e.id))
            .cloned()
            .collect()
    }
}
