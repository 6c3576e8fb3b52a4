//! Whole-row shift detection by column consensus.
//!
//! Every vertical, corner and junction character votes for its column. A row
//! whose anchors all sit the same distance away from more popular, connected
//! columns is moved back as a unit, text included.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use super::{CorrectionSource, ShiftCorrection};
use crate::grid::{Cell, Grid, Position};
use crate::line::{Direction, Line};

/// Column histogram plus the exact anchor positions it was built from.
struct Consensus {
    counts: HashMap<isize, usize>,
    anchors: HashSet<Position>,
}

impl Consensus {
    fn build(grid: &Grid) -> Self {
        let mut counts = HashMap::new();
        let mut anchors = HashSet::new();
        for cell in grid.cells().filter(|c| c.class().is_column_anchor()) {
            *counts.entry(cell.position.col).or_insert(0) += 1;
            anchors.insert(cell.position);
        }
        Self { counts, anchors }
    }

    fn count(&self, col: isize) -> usize {
        self.counts.get(&col).copied().unwrap_or(0)
    }

    fn connects(&self, row: isize, col: isize) -> bool {
        self.anchors.contains(&Position::new(row - 1, col))
            || self.anchors.contains(&Position::new(row + 1, col))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RowShiftCorrector {
    tolerance: usize,
    min_consensus: usize,
}

impl Default for RowShiftCorrector {
    fn default() -> Self {
        Self::new(1, 2)
    }
}

impl RowShiftCorrector {
    pub fn new(tolerance: usize, min_consensus: usize) -> Self {
        Self {
            tolerance,
            min_consensus,
        }
    }

    /// At most one correction per row, top to bottom.
    pub fn find_row_shift_corrections(&self, grid: &Grid) -> Vec<ShiftCorrection> {
        if grid.is_empty() {
            return Vec::new();
        }

        let consensus = Consensus::build(grid);
        if consensus.anchors.is_empty() {
            return Vec::new();
        }

        let corrections: Vec<ShiftCorrection> = (0..grid.height())
            .filter_map(|row| self.check_row(grid, row, &consensus))
            .collect();

        debug!(corrections = corrections.len(), "row shift scan finished");
        corrections
    }

    fn check_row(&self, grid: &Grid, row: usize, consensus: &Consensus) -> Option<ShiftCorrection> {
        let cells = grid.row_cells(row)?;
        let r = row as isize;

        let mut pulls = cells
            .iter()
            .filter(|c| consensus.anchors.contains(&c.position))
            .map(|c| self.best_offset(r, c.position.col, consensus));

        // Every anchor on the row must agree on one non-zero pull.
        let first = pulls.next()?;
        if first == 0 || !pulls.all(|d| d == first) {
            return None;
        }

        let moving: Vec<Cell> = cells.into_iter().filter(|c| !c.is_empty()).collect();
        let width = grid.width() as isize;
        if moving
            .iter()
            .any(|c| !(0..width).contains(&(c.position.col - first)))
        {
            trace!(row, pull = first, "row shift would leave the grid");
            return None;
        }

        trace!(row, pull = first, cells = moving.len(), "row shift correction");
        Some(ShiftCorrection::new(
            Line::new(moving, Direction::Horizontal),
            0,
            -first,
            CorrectionSource::RowShift,
        ))
    }

    /// Signed distance from `col` to the most popular connected column within
    /// tolerance, or zero when the own column is already the best.
    ///
    /// Candidates are visited nearest first, left before right, and only a
    /// strictly higher count replaces the current best, so ties resolve to
    /// the lowest distance and then to the left.
    fn best_offset(&self, row: isize, col: isize, consensus: &Consensus) -> isize {
        let mut best_count = consensus.count(col);
        let mut offset = 0;

        for d in 1..=self.tolerance as isize {
            for candidate in [col - d, col + d] {
                let count = consensus.count(candidate);
                if count > best_count && count >= self.min_consensus && consensus.connects(row, candidate) {
                    best_count = count;
                    offset = col - candidate;
                }
            }
        }

        offset
    }
}
