//! Ordering policies applied within a sibling group.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// Total-order policy selected by the user for every sibling group.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Manual order as maintained by drag and drop.
    #[default]
    Default,
    AlphabeticalAsc,
    AlphabeticalDesc,
    CreatedAsc,
    CreatedDesc,
    UpdatedAsc,
    UpdatedDesc,
}

impl SortMode {
    pub const ALL: [SortMode; 7] = [
        SortMode::Default,
        SortMode::AlphabeticalAsc,
        SortMode::AlphabeticalDesc,
        SortMode::CreatedAsc,
        SortMode::CreatedDesc,
        SortMode::UpdatedAsc,
        SortMode::UpdatedDesc,
    ];

    /// Manual sibling reordering is only meaningful under the default order.
    pub fn is_default(&self) -> bool {
        matches!(self, SortMode::Default)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Default => "default",
            SortMode::AlphabeticalAsc => "alphabetical_asc",
            SortMode::AlphabeticalDesc => "alphabetical_desc",
            SortMode::CreatedAsc => "created_asc",
            SortMode::CreatedDesc => "created_desc",
            SortMode::UpdatedAsc => "updated_asc",
            SortMode::UpdatedDesc => "updated_desc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == s)
    }

    /// Compare two siblings under this mode.
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        match self {
            SortMode::Default => a.order().total_cmp(&b.order()),
            SortMode::AlphabeticalAsc => a.title().cmp(b.title()),
            SortMode::AlphabeticalDesc => b.title().cmp(a.title()),
            SortMode::CreatedAsc => a.created_at.cmp(&b.created_at),
            SortMode::CreatedDesc => b.created_at.cmp(&a.created_at),
            SortMode::UpdatedAsc => a.updated_at.cmp(&b.updated_at),
            SortMode::UpdatedDesc => b.updated_at.cmp(&a.updated_at),
        }
    }

    /// Stable in-place sort of one sibling group.
    pub fn sort(&self, siblings: &mut [Entity]) {
        siblings.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn titled(title: Option<&str>) -> Entity {
        let mut e = Entity::document("", None);
        e.title = title.map(str::to_string);
        e
    }

    fn titles(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.title()).collect()
    }

    #[test]
    fn alphabetical_is_case_sensitive_and_missing_title_first() {
        let mut group = vec![titled(Some("beta")), titled(Some("Alpha")), titled(None)];
        SortMode::AlphabeticalAsc.sort(&mut group);
        assert_eq!(titles(&group), vec!["", "Alpha", "beta"]);

        SortMode::AlphabeticalDesc.sort(&mut group);
        assert_eq!(titles(&group), vec!["beta", "Alpha", ""]);
    }

    #[test]
    fn ties_keep_input_order() {
        let a = Entity::document("a", None).with_order(1.0);
        let b = Entity::document("b", None).with_order(1.0);
        let c = Entity::document("c", None).with_order(0.0);
        let mut group = vec![a, b, c];
        SortMode::Default.sort(&mut group);
        assert_eq!(titles(&group), vec!["c", "a", "b"]);
    }

    #[test]
    fn timestamp_modes() {
        let t = |s| Utc.timestamp_opt(s, 0).unwrap();
        let old = Entity::document("old", None).with_timestamps(t(10), t(300));
        let new = Entity::document("new", None).with_timestamps(t(20), t(200));
        let mut group = vec![new.clone(), old.clone()];

        SortMode::CreatedAsc.sort(&mut group);
        assert_eq!(titles(&group), vec!["old", "new"]);
        SortMode::CreatedDesc.sort(&mut group);
        assert_eq!(titles(&group), vec!["new", "old"]);
        SortMode::UpdatedAsc.sort(&mut group);
        assert_eq!(titles(&group), vec!["new", "old"]);
        SortMode::UpdatedDesc.sort(&mut group);
        assert_eq!(titles(&group), vec!["old", "new"]);
    }

    #[test]
    fn parse_matches_serde_names() {
        for mode in SortMode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
            assert_eq!(SortMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(SortMode::parse("bogus"), None);
    }
}
