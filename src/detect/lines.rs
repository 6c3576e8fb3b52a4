//! Line detection with corner bridging.
//!
//! Rows are scanned left to right for horizontal runs and columns top to
//! bottom for vertical runs. A run may cross one or more bridge characters
//! (`+`, `.`, Unicode corners and junctions) when another matching character
//! follows them; the bridges themselves never become part of the line.

use std::collections::HashSet;

use tracing::debug;

use crate::charset::{self, CharClass};
use crate::grid::{Cell, Grid, Position};
use crate::line::{Direction, Line};

/// Finds horizontal, vertical and (optionally) diagonal lines in a grid.
#[derive(Debug, Clone, Copy)]
pub struct LineDetector {
    min_length: usize,
    detect_diagonals: bool,
}

impl Default for LineDetector {
    fn default() -> Self {
        Self::new(2, false)
    }
}

impl LineDetector {
    pub fn new(min_length: usize, detect_diagonals: bool) -> Self {
        Self {
            min_length: min_length.max(1),
            detect_diagonals,
        }
    }

    /// Every line of at least `min_length` cells: horizontals first, then
    /// verticals, then diagonals when enabled.
    pub fn detect_lines(&self, grid: &Grid) -> Vec<Line> {
        if grid.is_empty() {
            return Vec::new();
        }

        let mut lines = Vec::new();
        for row in 0..grid.height() as isize {
            self.scan(grid, Position::new(row, 0), (0, 1), Direction::Horizontal, &mut lines);
        }
        for col in 0..grid.width() as isize {
            self.scan(grid, Position::new(0, col), (1, 0), Direction::Vertical, &mut lines);
        }

        if self.detect_diagonals {
            lines.extend(self.detect_diagonal_down(grid));
            lines.extend(self.detect_diagonal_up(grid));
        }

        debug!(
            lines = lines.len(),
            min_length = self.min_length,
            diagonals = self.detect_diagonals,
            "line detection finished"
        );
        lines
    }

    /// Walk one row or column from `origin` in `step`, collecting runs.
    fn scan(
        &self,
        grid: &Grid,
        origin: Position,
        step: (isize, isize),
        direction: Direction,
        out: &mut Vec<Line>,
    ) {
        let wanted = match direction {
            Direction::Horizontal => CharClass::Horizontal,
            _ => CharClass::Vertical,
        };
        let matches = |pos: Position| grid.class_at(pos) == Some(wanted);
        let advance = |pos: Position| pos.offset(step.0, step.1);

        let mut pos = origin;
        while grid.contains(pos) {
            if !matches(pos) {
                pos = advance(pos);
                continue;
            }

            let mut cells = Vec::new();
            loop {
                if let Some(cell) = grid.cell(pos) {
                    cells.push(cell);
                }
                let next = advance(pos);
                if matches(next) {
                    pos = next;
                    continue;
                }

                // Skip consecutive bridges; the run survives only if a
                // matching character follows them.
                let mut probe = next;
                while grid.get(probe).is_some_and(charset::is_bridge) {
                    probe = advance(probe);
                }
                if probe != next && matches(probe) {
                    pos = probe;
                    continue;
                }

                pos = next;
                break;
            }

            if cells.len() >= self.min_length {
                out.push(Line::new(cells, direction));
            }
        }
    }

    fn detect_diagonal_down(&self, grid: &Grid) -> Vec<Line> {
        let starts = (0..grid.height() as isize)
            .flat_map(|r| (0..grid.width() as isize).map(move |c| Position::new(r, c)));
        self.trace_diagonals(grid, starts, CharClass::DiagonalDown, (1, 1), Direction::DiagonalDown)
    }

    fn detect_diagonal_up(&self, grid: &Grid) -> Vec<Line> {
        let width = grid.width() as isize;
        let starts = (0..grid.height() as isize)
            .rev()
            .flat_map(move |r| (0..width).map(move |c| Position::new(r, c)));
        self.trace_diagonals(grid, starts, CharClass::DiagonalUp, (-1, 1), Direction::DiagonalUp)
    }

    fn trace_diagonals(
        &self,
        grid: &Grid,
        starts: impl Iterator<Item = Position>,
        class: CharClass,
        step: (isize, isize),
        direction: Direction,
    ) -> Vec<Line> {
        let mut visited: HashSet<Position> = HashSet::new();
        let mut lines = Vec::new();

        for start in starts {
            if visited.contains(&start) || grid.class_at(start) != Some(class) {
                continue;
            }

            let mut cells: Vec<Cell> = Vec::new();
            let mut pos = start;
            while let Some(cell) = grid.cell(pos).filter(|c| c.class() == class) {
                if !visited.insert(pos) {
                    break;
                }
                cells.push(cell);
                pos = pos.offset(step.0, step.1);
            }

            if cells.len() >= self.min_length {
                lines.push(Line::new(cells, direction));
            }
        }

        lines
    }
}

/// Convenience wrapper over [`LineDetector::detect_lines`].
pub fn detect_lines(grid: &Grid, min_length: usize, detect_diagonals: bool) -> Vec<Line> {
    LineDetector::new(min_length, detect_diagonals).detect_lines(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Vec<Line> {
        detect_lines(&Grid::from_text(text), 2, false)
    }

    fn of(lines: &[Line], direction: Direction) -> Vec<&Line> {
        lines.iter().filter(|l| l.direction() == direction).collect()
    }

    // =========================================================================
    // Horizontal / vertical runs
    // =========================================================================

    #[test]
    fn test_empty_grid() {
        assert!(detect("").is_empty());
    }

    #[test]
    fn test_single_horizontal_run() {
        let lines = detect("  ----  ");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].direction(), Direction::Horizontal);
        assert_eq!(lines[0].span(), Some((2, 5)));
    }

    #[test]
    fn test_single_vertical_run() {
        let lines = detect("|\n|\n|");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].direction(), Direction::Vertical);
        assert_eq!(lines[0].len(), 3);
    }

    #[test]
    fn test_min_length_filter() {
        assert!(detect("-").is_empty());
        let grid = Grid::from_text("---");
        assert!(detect_lines(&grid, 4, false).is_empty());
        assert_eq!(detect_lines(&grid, 3, false).len(), 1);
    }

    #[test]
    fn test_mixed_weights_form_one_run() {
        let lines = detect("-=─━");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 4);
    }

    #[test]
    fn test_text_breaks_run() {
        let lines = detect("--a--");
        assert_eq!(lines.len(), 2);
    }

    // =========================================================================
    // Bridging
    // =========================================================================

    #[test]
    fn test_bridge_joins_segments_without_joining_line() {
        let lines = detect("--+--");
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.len(), 4);
        assert!(!line.contains(Position::new(0, 2)));
        assert_eq!(line.span(), Some((0, 4)));
    }

    #[test]
    fn test_multiple_consecutive_bridges() {
        let lines = detect("──┼┼──");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 4);
    }

    #[test]
    fn test_trailing_bridge_ends_run() {
        let lines = detect("--+  --");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].span(), Some((0, 1)));
    }

    #[test]
    fn test_bridge_only_column_is_not_a_line() {
        assert!(detect("+\n+\n+").is_empty());
    }

    #[test]
    fn test_vertical_bridge() {
        let lines = detect("|\n+\n|");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 2);
        assert_eq!(lines[0].span(), Some((0, 2)));
    }

    #[test]
    fn test_quote_corner_does_not_bridge() {
        let lines = detect("--'--");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_box_edges() {
        let lines = detect("+--+\n|  |\n|  |\n+--+");
        assert_eq!(of(&lines, Direction::Horizontal).len(), 2);
        let verticals = of(&lines, Direction::Vertical);
        assert_eq!(verticals.len(), 2);
        assert_eq!(verticals[0].dominant_col(), Some(0));
        assert_eq!(verticals[1].dominant_col(), Some(3));
    }

    // =========================================================================
    // Diagonals
    // =========================================================================

    #[test]
    fn test_diagonals_disabled_by_default() {
        let lines = detect("\\\n \\");
        assert!(lines.is_empty());
    }

    #[test]
    fn test_diagonal_down() {
        let lines = detect_lines(&Grid::from_text("\\\n \\\n  \\"), 2, true);
        let diagonals = of(&lines, Direction::DiagonalDown);
        assert_eq!(diagonals.len(), 1);
        assert_eq!(diagonals[0].len(), 3);
    }

    #[test]
    fn test_diagonal_up() {
        let lines = detect_lines(&Grid::from_text("  ╱\n ╱\n╱"), 2, true);
        let diagonals = of(&lines, Direction::DiagonalUp);
        assert_eq!(diagonals.len(), 1);
        assert_eq!(diagonals[0].len(), 3);
        assert_eq!(diagonals[0].start(), Some(Position::new(0, 2)));
    }

    #[test]
    fn test_single_diagonal_too_short() {
        let lines = detect_lines(&Grid::from_text("\\"), 2, true);
        assert!(lines.is_empty());
    }

    #[test]
    fn test_diagonal_not_split_into_overlaps() {
        let lines = detect_lines(&Grid::from_text("\\\n \\\n  \\\n   \\"), 2, true);
        assert_eq!(lines.len(), 1);
    }
}
