//! Plain-text rendering of the visible rows of a tree.

use std::fmt::Write;

use space_hub_core::projection::DropProjection;
use space_hub_core::state::TreeState;
use space_hub_core::tree::FlattenedTree;

/// One line per visible row, two spaces per depth level. Folders are marked
/// `+` when collapsed and `-` when open.
pub fn render_tree(flat: &FlattenedTree, state: &TreeState) -> String {
    let mut out = String::new();
    for item in flat.items() {
        let marker = match (item.is_folder, item.expanded) {
            (true, true) => '-',
            (true, false) => '+',
            (false, _) => ' ',
        };
        let title = state.entity(item.id).map(|e| e.title()).unwrap_or("");
        let _ = writeln!(
            out,
            "{}{} {}  [{}]",
            "  ".repeat(item.depth),
            marker,
            title,
            item.id
        );
    }
    out
}

pub fn render_projection(projection: &DropProjection) -> String {
    let parent = projection
        .target_parent_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "root".to_string());
    let reference = projection
        .reference_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "parent={} reference={} position={:?} depth={} same_parent={} valid={} header={}",
        parent,
        reference,
        projection.position,
        projection.depth,
        projection.is_same_parent,
        projection.is_valid,
        projection.is_on_folder_header
    )
}
