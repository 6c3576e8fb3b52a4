//! Reconciliation of single line characters no detected line claimed.
//!
//! A lone `|` one column off a vertical line (or a lone `-` one row off a
//! horizontal line) is moved onto that line, provided the target cell is free
//! and moving it cannot tear surrounding text apart.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::{CorrectionSource, ShiftCorrection};
use crate::charset::CharClass;
use crate::grid::{Cell, Grid, Position};
use crate::line::{Direction, Line};

#[derive(Debug, Clone, Copy)]
pub struct StrayCharacterFinder {
    tolerance: usize,
}

impl Default for StrayCharacterFinder {
    fn default() -> Self {
        Self::new(1)
    }
}

impl StrayCharacterFinder {
    pub fn new(tolerance: usize) -> Self {
        Self { tolerance }
    }

    /// One single-cell correction per reconcilable stray, in row-major order.
    pub fn find_stray_corrections(&self, grid: &Grid, detected: &[Line]) -> Vec<ShiftCorrection> {
        let covered: HashSet<Position> = detected.iter().flat_map(Line::positions).collect();
        let verticals: Vec<&Line> = detected
            .iter()
            .filter(|l| l.direction() == Direction::Vertical)
            .collect();
        let horizontals: Vec<&Line> = detected
            .iter()
            .filter(|l| l.direction() == Direction::Horizontal)
            .collect();

        let corrections: Vec<ShiftCorrection> = grid
            .cells()
            .filter(|c| !covered.contains(&c.position))
            .filter_map(|stray| match stray.class() {
                CharClass::Vertical => self.vertical_correction(grid, stray, &verticals),
                CharClass::Horizontal => self.horizontal_correction(grid, stray, &horizontals),
                _ => None,
            })
            .collect();

        debug!(corrections = corrections.len(), "stray scan finished");
        corrections
    }

    fn vertical_correction(&self, grid: &Grid, stray: Cell, lines: &[&Line]) -> Option<ShiftCorrection> {
        let Position { row, col } = stray.position;
        let at_edge = is_right_edge(grid, row, col);
        if row_has_text(grid, row) && !at_edge {
            return None;
        }

        let tol = self.tolerance as isize;
        let target = nearest(lines, |line| {
            let line_col = line.dominant_col()?;
            let distance = col.abs_diff(line_col);
            if distance == 0 || distance > self.tolerance {
                return None;
            }
            let (top, bottom) = line.span()?;
            let in_span = (top - tol..=bottom + tol).contains(&row);
            let attached = at_edge && has_anchor_above_or_below(grid, row, line_col);
            (in_span || attached).then_some((distance, line_col))
        })?;

        self.one_cell(grid, stray, Position::new(row, target), Direction::Vertical)
    }

    fn horizontal_correction(&self, grid: &Grid, stray: Cell, lines: &[&Line]) -> Option<ShiftCorrection> {
        let Position { row, col } = stray.position;
        if col_has_text(grid, col) {
            return None;
        }

        let tol = self.tolerance as isize;
        let target = nearest(lines, |line| {
            let line_row = line.dominant_row()?;
            let distance = row.abs_diff(line_row);
            if distance == 0 || distance > self.tolerance {
                return None;
            }
            let (left, right) = line.span()?;
            (left - tol..=right + tol)
                .contains(&col)
                .then_some((distance, line_row))
        })?;

        self.one_cell(grid, stray, Position::new(target, col), Direction::Horizontal)
    }

    fn one_cell(
        &self,
        grid: &Grid,
        stray: Cell,
        target: Position,
        direction: Direction,
    ) -> Option<ShiftCorrection> {
        if !grid.cell(target).is_some_and(|c| c.is_empty()) {
            trace!(from = %stray.position, to = %target, "stray target occupied");
            return None;
        }
        trace!(from = %stray.position, to = %target, "stray correction");
        Some(ShiftCorrection::new(
            Line::new(vec![stray], direction),
            target.row - stray.position.row,
            target.col - stray.position.col,
            CorrectionSource::Stray,
        ))
    }
}

/// Coordinate of the closest qualifying line. The first line wins a tie.
fn nearest(lines: &[&Line], mut score: impl FnMut(&Line) -> Option<(usize, isize)>) -> Option<isize> {
    let mut best: Option<(usize, isize)> = None;
    for line in lines {
        if let Some((distance, coord)) = score(*line) {
            if best.is_none_or(|(d, _)| distance < d) {
                best = Some((distance, coord));
            }
        }
    }
    best.map(|(_, coord)| coord)
}

/// Anything on the row besides whitespace and vertical characters.
fn row_has_text(grid: &Grid, row: isize) -> bool {
    grid.row_cells(row as usize)
        .is_some_and(|cells| cells.iter().any(|c| !c.is_empty() && c.class() != CharClass::Vertical))
}

/// Anything in the column besides whitespace and horizontal characters.
fn col_has_text(grid: &Grid, col: isize) -> bool {
    grid.col_cells(col as usize)
        .is_some_and(|cells| cells.iter().any(|c| !c.is_empty() && c.class() != CharClass::Horizontal))
}

/// Only whitespace between `col` and the end of the row.
fn is_right_edge(grid: &Grid, row: isize, col: isize) -> bool {
    (col + 1..grid.width() as isize)
        .filter_map(|c| grid.cell(Position::new(row, c)))
        .all(|c| c.is_empty())
}

fn has_anchor_above_or_below(grid: &Grid, row: isize, col: isize) -> bool {
    [row - 1, row + 1].into_iter().any(|r| {
        grid.class_at(Position::new(r, col))
            .is_some_and(CharClass::is_column_anchor)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detect_lines;

    fn strays(text: &str, tolerance: usize) -> Vec<ShiftCorrection> {
        let grid = Grid::from_text(text);
        let lines = detect_lines(&grid, 2, false);
        StrayCharacterFinder::new(tolerance).find_stray_corrections(&grid, &lines)
    }

    // =========================================================================
    // Vertical strays
    // =========================================================================

    #[test]
    fn test_stray_pipe_pulled_onto_line() {
        let found = strays("|\n|\n |\n|\n|", 1);
        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.col_offset, -1);
        assert_eq!(c.row_offset, 0);
        assert_eq!(c.line.len(), 1);
        assert_eq!(c.source, CorrectionSource::Stray);
    }

    #[test]
    fn test_stray_beyond_tolerance_ignored() {
        assert!(strays("|\n|\n  |\n|\n|", 1).is_empty());
        assert_eq!(strays("|\n|\n  |\n|\n|", 2).len(), 1);
    }

    #[test]
    fn test_stray_on_text_row_left_alone() {
        assert!(strays("|   \n|   \n |ab\n|   \n|   ", 1).is_empty());
    }

    #[test]
    fn test_right_edge_stray_moves_despite_text() {
        let found = strays("ab |\nab |\nab  |\nab |", 1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].col_offset, -1);
    }

    #[test]
    fn test_right_edge_stray_outside_span_needs_anchor() {
        // Row 4 lies outside the line's span; only a `+` above the target
        // column connects it.
        let found = strays("x |\nx |\nx +\n\nx  |", 1);
        assert!(found.is_empty());
        let found = strays("x |\nx |\nx |\nx +\nx  |", 1);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_occupied_target_rejected() {
        // The cell left of the stray already holds a corner.
        assert!(strays("|\n|\n+|\n|\n|", 1).is_empty());
    }

    #[test]
    fn test_nearest_line_wins() {
        let found = strays("|  |\n|  |\n  | \n|  |\n|  |", 2);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].col_offset, 1);
    }

    // =========================================================================
    // Horizontal strays
    // =========================================================================

    #[test]
    fn test_stray_dash_pulled_onto_row() {
        let found = strays("--- ---\n   -   ", 1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].row_offset, -1);
        assert_eq!(found[0].col_offset, 0);
    }

    #[test]
    fn test_stray_dash_in_text_column_left_alone() {
        assert!(strays("--- ---\n   -   \n   a   ", 1).is_empty());
    }

    #[test]
    fn test_covered_cells_are_not_strays() {
        assert!(strays("+--+\n|  |\n+--+", 1).is_empty());
    }
}
