use std::collections::HashMap;

use uuid::Uuid;

use crate::tree::FlattenedItem;

/// Vertical extent of a rendered row, in list coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowRect {
    pub top: f32,
    pub height: f32,
}

impl RowRect {
    pub fn new(top: f32, height: f32) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center(&self) -> f32 {
        self.top + self.height / 2.0
    }
}

/// Live row measurement, typically backed by the renderer.
pub trait RowGeometry {
    fn row_rect(&self, id: Uuid) -> Option<RowRect>;
}

/// Row rectangles captured once per drag so each frame avoids re-measuring.
#[derive(Clone, Debug, Default)]
pub struct LayoutCache {
    rows: HashMap<Uuid, RowRect>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of equal height stacked in display order.
    pub fn uniform(items: &[FlattenedItem], row_height: f32) -> Self {
        let rows = items
            .iter()
            .enumerate()
            .map(|(ix, item)| (item.id, RowRect::new(row_height * ix as f32, row_height)))
            .collect();
        Self { rows }
    }

    pub fn insert(&mut self, id: Uuid, rect: RowRect) {
        self.rows.insert(id, rect);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RowGeometry for LayoutCache {
    fn row_rect(&self, id: Uuid) -> Option<RowRect> {
        self.rows.get(&id).copied()
    }
}
