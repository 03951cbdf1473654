//! Turns a drag gesture over the flattened rows into a concrete insertion
//! point: "before/after sibling X inside parent P".

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tree::{FlattenedItem, FlattenedTree};

mod geometry;

pub use geometry::{LayoutCache, RowGeometry, RowRect};


/// Side of the reference sibling to insert on.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Before,
    #[default]
    After,
}

/// Resolved target of a drag gesture.
#[derive(Clone, Debug, PartialEq)]
pub struct DropProjection {
    pub target_parent_id: Option<Uuid>,
    /// `None` means the start (`Before`) or the end (`After`) of the parent.
    pub reference_id: Option<Uuid>,
    pub position: Position,
    pub depth: usize,
    pub is_same_parent: bool,
    pub is_valid: bool,
    pub is_on_folder_header: bool,
}

/// Inputs of one drag frame.
#[derive(Clone, Copy)]
pub struct DropRequest<'a> {
    pub dragged_id: Uuid,
    pub hovered_id: Uuid,
    /// Horizontal travel since drag start.
    pub offset_x: f32,
    pub is_default_sort: bool,
    pub pointer_y: Option<f32>,
    pub layout: Option<&'a LayoutCache>,
    pub geometry: Option<&'a dyn RowGeometry>,
}

impl<'a> DropRequest<'a> {
    pub fn new(dragged_id: Uuid, hovered_id: Uuid) -> Self {
        Self {
            dragged_id,
            hovered_id,
            offset_x: 0.0,
            is_default_sort: true,
            pointer_y: None,
            layout: None,
            geometry: None,
        }
    }

    pub fn offset_x(mut self, offset_x: f32) -> Self {
        self.offset_x = offset_x;
        self
    }

    pub fn default_sort(mut self, is_default_sort: bool) -> Self {
        self.is_default_sort = is_default_sort;
        self
    }

    pub fn pointer_y(mut self, pointer_y: f32) -> Self {
        self.pointer_y = Some(pointer_y);
        self
    }

    pub fn layout(mut self, layout: &'a LayoutCache) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn geometry(mut self, geometry: &'a dyn RowGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Cached rectangle first, live measurement as fallback.
    fn rect(&self, id: Uuid) -> Option<RowRect> {
        self.layout
            .and_then(|cache| cache.row_rect(id))
            .or_else(|| self.geometry.and_then(|g| g.row_rect(id)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Target {
    reference_id: Option<Uuid>,
    position: Position,
    on_header: bool,
}

impl Target {
    fn append(on_header: bool) -> Self {
        Self {
            reference_id: None,
            position: Position::After,
            on_header,
        }
    }

    fn before(id: Uuid, on_header: bool) -> Self {
        Self {
            reference_id: Some(id),
            position: Position::Before,
            on_header,
        }
    }

    fn after(id: Uuid) -> Self {
        Self {
            reference_id: Some(id),
            position: Position::After,
            on_header: false,
        }
    }
}

/// Stateless drop resolver; only the indent width is configurable.
#[derive(Clone, Copy, Debug)]
pub struct DropProjector {
    indent_width: f32,
}

impl Default for DropProjector {
    fn default() -> Self {
        Self::new(16.0)
    }
}

impl DropProjector {
    pub fn new(indent_width: f32) -> Self {
        Self { indent_width }
    }

    pub fn indent_width(&self) -> f32 {
        self.indent_width
    }

    /// Compute the projection for one drag frame.
    ///
    /// Returns `None` when the gesture would not move anything. A gesture that
    /// is recognised but not allowed comes back with `is_valid == false`.
    pub fn project(&self, flat: &FlattenedTree, request: &DropRequest<'_>) -> Option<DropProjection> {
        let dragged = flat.get(request.dragged_id)?;
        let hovered = flat.get(request.hovered_id)?;
        if dragged.id == hovered.id {
            return None;
        }

        let (scope_parent, scope_depth) = if hovered.is_folder {
            (Some(hovered.id), hovered.depth + 1)
        } else {
            (hovered.parent_id, hovered.depth)
        };
        let depth = self.projected_depth(dragged.depth, request.offset_x, scope_depth);
        let is_same_parent = scope_parent == dragged.parent_id;

        if flat.is_descendant(dragged.id, hovered.id) {
            return Some(DropProjection {
                target_parent_id: scope_parent,
                reference_id: None,
                position: Position::After,
                depth,
                is_same_parent,
                is_valid: false,
                is_on_folder_header: false,
            });
        }

        let target = Self::locate(flat, hovered, scope_parent, request);
        if is_same_parent && Self::is_identity(flat, dragged, &target) {
            return None;
        }

        let mut is_valid = true;
        if !request.is_default_sort && is_same_parent {
            is_valid = false;
        }
        if dragged.is_folder && scope_parent == Some(dragged.id) {
            is_valid = false;
        }

        Some(DropProjection {
            target_parent_id: scope_parent,
            reference_id: target.reference_id,
            position: target.position,
            depth,
            is_same_parent,
            is_valid,
            is_on_folder_header: target.on_header,
        })
    }

    /// Depth suggested by the horizontal offset, rounded to whole indents and
    /// kept within what the target scope can hold.
    fn projected_depth(&self, start_depth: usize, offset_x: f32, max_depth: usize) -> usize {
        if !self.indent_width.is_finite() || self.indent_width <= 0.0 || !offset_x.is_finite() {
            return start_depth.min(max_depth);
        }
        let delta = (offset_x / self.indent_width).round() as isize;
        let depth = (start_depth as isize + delta).max(0) as usize;
        depth.min(max_depth)
    }

    fn locate(
        flat: &FlattenedTree,
        hovered: &FlattenedItem,
        scope_parent: Option<Uuid>,
        request: &DropRequest<'_>,
    ) -> Target {
        if hovered.is_folder && !hovered.expanded {
            return Target::append(true);
        }

        let Some(pointer_y) = request.pointer_y else {
            return if hovered.is_folder {
                Target::append(false)
            } else {
                Target::after(hovered.id)
            };
        };

        let children = flat.children_of(scope_parent);

        if let Some(header) = scope_parent.and_then(|id| request.rect(id)) {
            if pointer_y <= header.bottom() {
                return match children.first() {
                    Some(first) => Target::before(first.id, true),
                    None => Target::append(true),
                };
            }
        }

        let mut last_known = None;
        for child in &children {
            let Some(rect) = request.rect(child.id) else {
                continue;
            };
            if rect.center() > pointer_y {
                return Target::before(child.id, false);
            }
            last_known = Some(child.id);
        }

        match last_known {
            Some(id) => Target::after(id),
            None => Target::append(false),
        }
    }

    /// Whether inserting at `target` leaves the dragged item where it is.
    /// Only meaningful when the target scope is the dragged item's own parent.
    fn is_identity(flat: &FlattenedTree, dragged: &FlattenedItem, target: &Target) -> bool {
        let siblings = flat.children_of(dragged.parent_id);
        let Some(pos) = siblings.iter().position(|s| s.id == dragged.id) else {
            return false;
        };
        let prev = pos.checked_sub(1).and_then(|ix| siblings.get(ix)).map(|s| s.id);
        let next = siblings.get(pos + 1).map(|s| s.id);

        match (target.reference_id, target.position) {
            (Some(r), _) if r == dragged.id => true,
            (Some(r), Position::Before) => next == Some(r),
            (Some(r), Position::After) => prev == Some(r),
            (None, Position::After) => next.is_none(),
            (None, Position::Before) => prev.is_none(),
        }
    }
}
