//! Rectangular frame detection traced from corner characters.

use std::collections::HashSet;

use tracing::debug;

use crate::charset::CharClass;
use crate::grid::{Cell, Grid, Position};
use crate::line::{Direction, Line};

/// A rectangle traced from its top-left corner. Edges include the corners.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStructure {
    pub top: Line,
    pub bottom: Line,
    pub left: Line,
    pub right: Line,
    pub height: usize,
    pub width: usize,
}

impl BoxStructure {
    pub fn new(top: Line, bottom: Line, left: Line, right: Line, height: usize, width: usize) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
            height,
            width,
        }
    }

    /// Top-left corner, taken from the top edge's start.
    pub fn origin(&self) -> Option<Position> {
        self.top.start()
    }

    /// `(top row, left col, height, width)`; two traces of the same rectangle
    /// share it.
    pub fn key(&self) -> Option<(isize, isize, usize, usize)> {
        Some((
            self.top.dominant_row()?,
            self.left.dominant_col()?,
            self.height,
            self.width,
        ))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoxDetector {
    min_size: usize,
}

impl Default for BoxDetector {
    fn default() -> Self {
        Self::new(2)
    }
}

impl BoxDetector {
    pub fn new(min_size: usize) -> Self {
        Self { min_size }
    }

    /// One box per distinct rectangle, in row-major order of the corner it
    /// was first traced from.
    pub fn detect_boxes(&self, grid: &Grid) -> Vec<BoxStructure> {
        let mut seen = HashSet::new();
        let mut boxes = Vec::new();

        let corners = grid
            .cells()
            .filter(|c| c.class() == CharClass::Corner)
            .map(|c| c.position);

        for top_left in corners {
            let Some(found) = self.trace_box(grid, top_left) else {
                continue;
            };
            if let Some(key) = found.key() {
                if seen.insert(key) {
                    boxes.push(found);
                }
            }
        }

        debug!(boxes = boxes.len(), "box detection finished");
        boxes
    }

    fn trace_box(&self, grid: &Grid, top_left: Position) -> Option<BoxStructure> {
        let top_right = trace(grid, top_left, (0, 1), CharClass::Horizontal)?;
        let width = (top_right.col - top_left.col + 1) as usize;
        if width < self.min_size {
            return None;
        }

        let bottom_left = trace(grid, top_left, (1, 0), CharClass::Vertical)?;
        let height = (bottom_left.row - top_left.row + 1) as usize;
        if height < self.min_size {
            return None;
        }

        let bottom_right = Position::new(bottom_left.row, top_right.col);
        if grid.class_at(bottom_right) != Some(CharClass::Corner) {
            return None;
        }

        Some(BoxStructure::new(
            edge(grid, top_left, top_right, Direction::Horizontal)?,
            edge(grid, bottom_left, bottom_right, Direction::Horizontal)?,
            edge(grid, top_left, bottom_left, Direction::Vertical)?,
            edge(grid, top_right, bottom_right, Direction::Vertical)?,
            height,
            width,
        ))
    }
}

/// Follow `through` characters from `start` until a corner. `None` when the
/// walk hits anything else or the grid edge.
fn trace(grid: &Grid, start: Position, step: (isize, isize), through: CharClass) -> Option<Position> {
    let mut pos = start.offset(step.0, step.1);
    loop {
        match grid.class_at(pos)? {
            class if class == through => pos = pos.offset(step.0, step.1),
            CharClass::Corner => return Some(pos),
            _ => return None,
        }
    }
}

/// Edge line from `from` to `to` inclusive, keeping line and corner cells.
fn edge(grid: &Grid, from: Position, to: Position, direction: Direction) -> Option<Line> {
    let line_class = match direction {
        Direction::Horizontal => CharClass::Horizontal,
        _ => CharClass::Vertical,
    };

    let positions: Vec<Position> = match direction {
        Direction::Horizontal => (from.col..=to.col).map(|c| Position::new(from.row, c)).collect(),
        _ => (from.row..=to.row).map(|r| Position::new(r, from.col)).collect(),
    };

    let cells: Vec<Cell> = positions
        .into_iter()
        .filter_map(|p| grid.cell(p))
        .filter(|c| c.class() == line_class || c.class() == CharClass::Corner)
        .collect();

    (cells.len() >= 2).then(|| Line::new(cells, direction))
}

/// Convenience wrapper over [`BoxDetector::detect_boxes`].
pub fn detect_boxes(grid: &Grid, min_size: usize) -> Vec<BoxStructure> {
    BoxDetector::new(min_size).detect_boxes(grid)
}
