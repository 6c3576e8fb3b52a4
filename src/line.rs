//! Detected lines: ordered runs of cells that share a direction.

use std::fmt;

use serde::Serialize;

use crate::grid::{Cell, Position};

/// Orientation of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Horizontal,
    Vertical,
    /// Top-left to bottom-right (`\`).
    DiagonalDown,
    /// Bottom-left to top-right (`/`).
    DiagonalUp,
}

impl Direction {
    pub fn is_diagonal(self) -> bool {
        matches!(self, Self::DiagonalDown | Self::DiagonalUp)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
            Self::DiagonalDown => "diagonal-down",
            Self::DiagonalUp => "diagonal-up",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run of cells in one direction.
///
/// Lines are value objects: they are rebuilt on every detection pass and never
/// mutated afterwards. For a horizontal line every cell shares one row, for a
/// vertical line one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    cells: Vec<Cell>,
    direction: Direction,
}

impl Line {
    pub fn new(cells: Vec<Cell>, direction: Direction) -> Self {
        Self { cells, direction }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn axis_key(&self, pos: Position) -> isize {
        match self.direction {
            Direction::Horizontal => pos.col,
            _ => pos.row,
        }
    }

    /// Leftmost cell for horizontal lines, topmost otherwise.
    pub fn start(&self) -> Option<Position> {
        self.cells
            .iter()
            .map(|c| c.position)
            .min_by_key(|&p| self.axis_key(p))
    }

    /// Rightmost cell for horizontal lines, bottommost otherwise.
    pub fn end(&self) -> Option<Position> {
        self.cells
            .iter()
            .map(|c| c.position)
            .max_by_key(|&p| self.axis_key(p))
    }

    /// Inclusive range covered along the line's own axis: columns for a
    /// horizontal line, rows for everything else.
    pub fn span(&self) -> Option<(isize, isize)> {
        let start = self.start()?;
        let end = self.end()?;
        Some((self.axis_key(start), self.axis_key(end)))
    }

    /// The row shared by a horizontal line's cells.
    pub fn dominant_row(&self) -> Option<isize> {
        match self.direction {
            Direction::Horizontal => self.cells.first().map(|c| c.position.row),
            _ => None,
        }
    }

    /// The column shared by a vertical line's cells.
    pub fn dominant_col(&self) -> Option<isize> {
        match self.direction {
            Direction::Vertical => self.cells.first().map(|c| c.position.col),
            _ => None,
        }
    }

    /// Dominant row or column, whichever applies to the direction.
    pub fn dominant(&self) -> Option<isize> {
        self.dominant_row().or_else(|| self.dominant_col())
    }

    pub fn is_parallel_to(&self, other: &Line) -> bool {
        self.direction == other.direction
    }

    /// Signed distance from another parallel line along the perpendicular
    /// axis. Positive means below or to the right. Zero when either line has
    /// no dominant coordinate.
    pub fn offset_from(&self, other: &Line) -> isize {
        match (self.dominant(), other.dominant()) {
            (Some(mine), Some(theirs)) if self.is_parallel_to(other) => mine - theirs,
            _ => 0,
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.cells.iter().any(|c| c.position == pos)
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells.iter().map(|c| c.position)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => write!(
                f,
                "{} {}..{} ({} cells)",
                self.direction,
                start,
                end,
                self.len()
            ),
            _ => write!(f, "{} (empty)", self.direction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Character;

    fn horizontal(row: isize, cols: std::ops::RangeInclusive<isize>) -> Line {
        Line::new(
            cols.map(|c| Cell::new(Character::new('-'), Position::new(row, c)))
                .collect(),
            Direction::Horizontal,
        )
    }

    fn vertical(col: isize, rows: std::ops::RangeInclusive<isize>) -> Line {
        Line::new(
            rows.map(|r| Cell::new(Character::new('|'), Position::new(r, col)))
                .collect(),
            Direction::Vertical,
        )
    }

    #[test]
    fn test_start_and_end_horizontal() {
        let line = horizontal(3, 2..=6);
        assert_eq!(line.start(), Some(Position::new(3, 2)));
        assert_eq!(line.end(), Some(Position::new(3, 6)));
        assert_eq!(line.span(), Some((2, 6)));
        assert_eq!(line.len(), 5);
    }

    #[test]
    fn test_start_and_end_ignore_cell_order() {
        let mut cells: Vec<Cell> = vertical(1, 0..=3).cells().to_vec();
        cells.reverse();
        let line = Line::new(cells, Direction::Vertical);
        assert_eq!(line.start(), Some(Position::new(0, 1)));
        assert_eq!(line.end(), Some(Position::new(3, 1)));
    }

    #[test]
    fn test_empty_line() {
        let line = Line::new(Vec::new(), Direction::Horizontal);
        assert!(line.is_empty());
        assert_eq!(line.start(), None);
        assert_eq!(line.dominant_row(), None);
        assert_eq!(line.to_string(), "horizontal (empty)");
    }

    #[test]
    fn test_dominant_coordinates_match_direction() {
        let h = horizontal(4, 0..=2);
        let v = vertical(7, 0..=2);
        assert_eq!(h.dominant_row(), Some(4));
        assert_eq!(h.dominant_col(), None);
        assert_eq!(v.dominant_col(), Some(7));
        assert_eq!(v.dominant_row(), None);
        assert_eq!(v.dominant(), Some(7));
    }

    #[test]
    fn test_diagonal_has_no_dominant() {
        let line = Line::new(
            vec![
                Cell::new(Character::new('\\'), Position::new(0, 0)),
                Cell::new(Character::new('\\'), Position::new(1, 1)),
            ],
            Direction::DiagonalDown,
        );
        assert_eq!(line.dominant(), None);
        assert_eq!(line.span(), Some((0, 1)));
    }

    #[test]
    fn test_offset_from() {
        assert_eq!(horizontal(5, 0..=3).offset_from(&horizontal(3, 0..=3)), 2);
        assert_eq!(vertical(1, 0..=3).offset_from(&vertical(4, 0..=3)), -3);
        assert_eq!(horizontal(5, 0..=3).offset_from(&vertical(1, 0..=3)), 0);
    }

    #[test]
    fn test_parallel_and_contains() {
        let a = horizontal(0, 0..=2);
        let b = horizontal(9, 4..=5);
        assert!(a.is_parallel_to(&b));
        assert!(!a.is_parallel_to(&vertical(0, 0..=1)));
        assert!(a.contains(Position::new(0, 1)));
        assert!(!a.contains(Position::new(1, 1)));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            vertical(2, 1..=3).to_string(),
            "vertical (1,2)..(3,2) (3 cells)"
        );
    }
}
