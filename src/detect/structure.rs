//! Coarse classification of a diagram's layout.
//!
//! The orchestrator only needs one answer from this module: is the grid a
//! tree? Tree notation (`+--` hanging off a stem) looks like misaligned box
//! corners to every other heuristic, so its lines must be kept out of
//! alignment grouping.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::charset::{self, CharClass};
use crate::grid::{Grid, Position};

/// Primary layout of a diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StructureType {
    Box,
    Tree,
    Graph,
    Unknown,
}

impl StructureType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Box => "BOX",
            Self::Tree => "TREE",
            Self::Graph => "GRAPH",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StructureClassifier {
    tree_branch_threshold: usize,
}

impl Default for StructureClassifier {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Corner characters needed before a grid counts as boxed.
const BOX_CORNER_THRESHOLD: usize = 4;

impl StructureClassifier {
    pub fn new(tree_branch_threshold: usize) -> Self {
        Self {
            tree_branch_threshold,
        }
    }

    /// TREE, then BOX, then GRAPH, else UNKNOWN.
    pub fn classify(&self, grid: &Grid) -> StructureType {
        let structure = if self.has_tree_patterns(grid) {
            StructureType::Tree
        } else if self.has_box_patterns(grid) {
            StructureType::Box
        } else if self.has_graph_patterns(grid) {
            StructureType::Graph
        } else {
            StructureType::Unknown
        };
        debug!(%structure, "structure classified");
        structure
    }

    pub fn has_tree_patterns(&self, grid: &Grid) -> bool {
        self.tree_branches(grid).len() >= self.tree_branch_threshold
    }

    pub fn has_box_patterns(&self, grid: &Grid) -> bool {
        grid.cells()
            .filter(|c| c.class() == CharClass::Corner)
            .take(BOX_CORNER_THRESHOLD)
            .count()
            >= BOX_CORNER_THRESHOLD
    }

    /// An arrow head touching a line, corner or junction.
    pub fn has_graph_patterns(&self, grid: &Grid) -> bool {
        grid.cells()
            .filter(|c| c.class() == CharClass::Arrow)
            .any(|arrow| {
                arrow
                    .neighbor_positions()
                    .iter()
                    .any(|&p| grid.class_at(p).is_some_and(CharClass::is_structural))
            })
    }

    /// Every branch start in row-major order.
    pub fn tree_branches(&self, grid: &Grid) -> Vec<Position> {
        grid.cells()
            .map(|c| c.position)
            .filter(|&p| is_tree_branch(grid, p))
            .collect()
    }
}

/// A bridge character followed by two horizontal characters with a vertical
/// or bridge character directly above. A box's top-left corner has its stem
/// below, so it never matches.
pub fn is_tree_branch(grid: &Grid, pos: Position) -> bool {
    let is_class = |p: Position, class: CharClass| grid.class_at(p) == Some(class);

    grid.get(pos).is_some_and(charset::is_bridge)
        && is_class(pos.offset(0, 1), CharClass::Horizontal)
        && is_class(pos.offset(0, 2), CharClass::Horizontal)
        && grid
            .get(pos.offset(-1, 0))
            .is_some_and(|above| charset::is_vertical(above) || charset::is_bridge(above))
}
