//! Application of a single [`ShiftCorrection`] to a grid.

use super::ShiftCorrection;
use crate::error::{CorrectionError, Result};
use crate::grid::{Grid, Position};

/// Moves a correction's cells by its offset, all or nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftCorrector;

impl ShiftCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Apply to a copy; `grid` is never modified.
    pub fn apply_correction(&self, correction: &ShiftCorrection, grid: &Grid) -> Result<Grid> {
        let mut result = grid.clone();
        self.apply_in_place(correction, &mut result)?;
        Ok(result)
    }

    /// Apply to `grid` directly. On error the grid is unchanged.
    ///
    /// Every source and destination is checked before anything is written.
    /// Sources are then cleared before destinations are filled, so overlapping
    /// source and destination sets never clobber a cell that has yet to move.
    pub fn apply_in_place(&self, correction: &ShiftCorrection, grid: &mut Grid) -> Result<()> {
        if correction.is_noop() {
            return Ok(());
        }

        let moves: Vec<(Position, Position)> = correction
            .line
            .positions()
            .map(|from| (from, from.offset(correction.row_offset, correction.col_offset)))
            .collect();

        let outside = moves
            .iter()
            .flat_map(|&(from, to)| [from, to])
            .find(|pos| !grid.contains(*pos));
        if let Some(outside) = outside {
            return Err(CorrectionError::OutOfBounds {
                row: outside.row,
                col: outside.col,
                width: grid.width(),
                height: grid.height(),
            });
        }

        for (from, _) in &moves {
            grid.clear_cell(*from)?;
        }
        for (cell, (_, to)) in correction.line.cells().iter().zip(&moves) {
            grid.set_cell(*to, cell.character)?;
        }
        Ok(())
    }

    /// Apply each correction in order, stopping at the first failure.
    pub fn apply_corrections(&self, corrections: &[ShiftCorrection], grid: &Grid) -> Result<Grid> {
        let mut result = grid.clone();
        for correction in corrections {
            self.apply_in_place(correction, &mut result)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correct::CorrectionSource;
    use crate::grid::Cell;
    use crate::line::{Direction, Line};

    fn row_correction(grid: &Grid, row: usize, col_offset: isize) -> ShiftCorrection {
        let cells: Vec<Cell> = grid
            .row_cells(row)
            .unwrap()
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect();
        ShiftCorrection::new(
            Line::new(cells, Direction::Horizontal),
            0,
            col_offset,
            CorrectionSource::RowShift,
        )
    }

    #[test]
    fn test_shift_left() {
        let grid = Grid::from_text(" +--+\n  +--+");
        let correction = row_correction(&grid, 1, -1);
        let fixed = ShiftCorrector::new().apply_correction(&correction, &grid).unwrap();
        assert_eq!(fixed.to_string(), " +--+\n +--+");
    }

    #[test]
    fn test_original_untouched() {
        let grid = Grid::from_text("  |");
        let correction = row_correction(&grid, 0, -2);
        let fixed = ShiftCorrector::new().apply_correction(&correction, &grid).unwrap();
        assert_eq!(grid.to_string(), "  |");
        assert_eq!(fixed.to_string(), "|");
    }

    #[test]
    fn test_overlapping_move_keeps_every_cell() {
        // Each destination is another cell's source.
        let grid = Grid::from_text("abc ");
        let correction = row_correction(&grid, 0, 1);
        let fixed = ShiftCorrector::new().apply_correction(&correction, &grid).unwrap();
        assert_eq!(fixed.to_string(), " abc");
    }

    #[test]
    fn test_zero_offset_is_noop() {
        let grid = Grid::from_text("|x|");
        let correction = row_correction(&grid, 0, 0);
        let fixed = ShiftCorrector::new().apply_correction(&correction, &grid).unwrap();
        assert_eq!(fixed, grid);
    }

    #[test]
    fn test_out_of_bounds_is_atomic() {
        let mut grid = Grid::from_text("ab");
        let before = grid.clone();
        let correction = row_correction(&grid, 0, 1);
        let err = ShiftCorrector::new()
            .apply_in_place(&correction, &mut grid)
            .unwrap_err();
        assert_eq!(
            err,
            CorrectionError::OutOfBounds {
                row: 0,
                col: 2,
                width: 2,
                height: 1
            }
        );
        assert_eq!(grid, before);
    }

    #[test]
    fn test_out_of_bounds_source_is_atomic() {
        let mut grid = Grid::from_text("a\nb\nc");
        let before = grid.clone();
        let cells = vec![
            Cell::new('b'.into(), Position::new(1, 0)),
            Cell::new('x'.into(), Position::new(-1, 0)),
        ];
        let correction = ShiftCorrection::new(
            Line::new(cells, Direction::Vertical),
            1,
            0,
            CorrectionSource::Alignment,
        );
        let err = ShiftCorrector::new()
            .apply_in_place(&correction, &mut grid)
            .unwrap_err();
        assert!(matches!(
            err,
            CorrectionError::OutOfBounds { row: -1, col: 0, .. }
        ));
        assert_eq!(grid, before);
    }

    #[test]
    fn test_vertical_move() {
        let grid = Grid::from_text("---\n\n");
        let line = Line::new(grid.row_cells(0).unwrap(), Direction::Horizontal);
        let correction = ShiftCorrection::new(line, 2, 0, CorrectionSource::Alignment);
        let fixed = ShiftCorrector::new().apply_correction(&correction, &grid).unwrap();
        assert_eq!(fixed.to_string(), "\n\n---");
    }

    #[test]
    fn test_apply_corrections_in_sequence() {
        let grid = Grid::from_text("  |\n  |");
        let first = row_correction(&grid, 0, -1);
        let second = row_correction(&grid, 1, -2);
        let fixed = ShiftCorrector::new()
            .apply_corrections(&[first, second], &grid)
            .unwrap();
        assert_eq!(fixed.to_string(), " |\n|");
    }
}
