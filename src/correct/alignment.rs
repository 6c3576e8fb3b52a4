//! Per-group alignment: move every member onto the reference line's row or
//! column.

use tracing::trace;

use super::{CorrectionSource, ShiftCorrection};
use crate::detect::ParallelGroup;
use crate::line::Direction;

/// Corrections for one parallel group.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult {
    pub corrections: Vec<ShiftCorrection>,
    pub reference_position: isize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlignmentCalculator;

impl AlignmentCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate_alignment(&self, group: &ParallelGroup) -> AlignmentResult {
        let expected = group.expected_position();
        let corrections = group
            .non_reference_lines()
            .filter_map(|line| {
                let offset = expected - line.dominant()?;
                if offset == 0 {
                    return None;
                }
                let (row_offset, col_offset) = match group.direction() {
                    Direction::Horizontal => (offset, 0),
                    _ => (0, offset),
                };
                trace!(%line, offset, "alignment correction");
                Some(ShiftCorrection::new(
                    line.clone(),
                    row_offset,
                    col_offset,
                    CorrectionSource::Alignment,
                ))
            })
            .collect();

        AlignmentResult {
            corrections,
            reference_position: expected,
        }
    }
}
