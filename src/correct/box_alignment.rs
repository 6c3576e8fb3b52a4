//! Box-edge reconciliation: the top and left edges anchor a box, the right and
//! bottom edges are moved to sit `width - 1` and `height - 1` away from them.

use tracing::trace;

use super::{CorrectionSource, ShiftCorrection};
use crate::detect::BoxStructure;

#[derive(Debug, Clone, Copy, Default)]
pub struct BoxAlignmentCalculator;

impl BoxAlignmentCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate_corrections(&self, boxes: &[BoxStructure]) -> Vec<ShiftCorrection> {
        boxes.iter().flat_map(|b| self.align_box(b)).collect()
    }

    fn align_box(&self, frame: &BoxStructure) -> Vec<ShiftCorrection> {
        let (Some(ref_col), Some(ref_row)) = (frame.left.dominant_col(), frame.top.dominant_row())
        else {
            return Vec::new();
        };

        let mut corrections = Vec::new();

        let target_col = ref_col + frame.width as isize - 1;
        if let Some(right_col) = frame.right.dominant_col() {
            if right_col != target_col {
                trace!(right_col, target_col, "box right edge off");
                corrections.push(ShiftCorrection::new(
                    frame.right.clone(),
                    0,
                    target_col - right_col,
                    CorrectionSource::BoxEdge,
                ));
            }
        }

        let target_row = ref_row + frame.height as isize - 1;
        if let Some(bottom_row) = frame.bottom.dominant_row() {
            if bottom_row != target_row {
                trace!(bottom_row, target_row, "box bottom edge off");
                corrections.push(ShiftCorrection::new(
                    frame.bottom.clone(),
                    target_row - bottom_row,
                    0,
                    CorrectionSource::BoxEdge,
                ));
            }
        }

        corrections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detect_boxes;
    use crate::grid::{Cell, Character, Grid, Position};
    use crate::line::{Direction, Line};

    fn run(c: char, positions: impl IntoIterator<Item = (isize, isize)>, direction: Direction) -> Line {
        Line::new(
            positions
                .into_iter()
                .map(|(r, col)| Cell::new(Character::new(c), Position::new(r, col)))
                .collect(),
            direction,
        )
    }

    #[test]
    fn test_detected_box_needs_nothing() {
        let boxes = detect_boxes(&Grid::from_text("+---+\n|   |\n|   |\n+---+"), 2);
        assert!(BoxAlignmentCalculator::new().calculate_corrections(&boxes).is_empty());
    }

    #[test]
    fn test_right_edge_pulled_in() {
        // Width 4 from column 0, but the right edge sits on column 4.
        let frame = BoxStructure::new(
            run('-', (0..4).map(|c| (0, c)), Direction::Horizontal),
            run('-', (0..4).map(|c| (3, c)), Direction::Horizontal),
            run('|', (0..4).map(|r| (r, 0)), Direction::Vertical),
            run('|', (0..4).map(|r| (r, 4)), Direction::Vertical),
            4,
            4,
        );
        let corrections = BoxAlignmentCalculator::new().calculate_corrections(&[frame]);
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].col_offset, -1);
        assert_eq!(corrections[0].row_offset, 0);
        assert_eq!(corrections[0].line.len(), 4);
        assert_eq!(corrections[0].source, CorrectionSource::BoxEdge);
    }

    #[test]
    fn test_bottom_edge_pulled_up() {
        let frame = BoxStructure::new(
            run('-', (0..4).map(|c| (1, c)), Direction::Horizontal),
            run('-', (0..4).map(|c| (5, c)), Direction::Horizontal),
            run('|', (1..5).map(|r| (r, 0)), Direction::Vertical),
            run('|', (1..5).map(|r| (r, 3)), Direction::Vertical),
            3,
            4,
        );
        let corrections = BoxAlignmentCalculator::new().calculate_corrections(&[frame]);
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].row_offset, -2);
    }

    #[test]
    fn test_missing_reference_skips_box() {
        let empty = Line::new(Vec::new(), Direction::Vertical);
        let frame = BoxStructure::new(
            run('-', (0..4).map(|c| (0, c)), Direction::Horizontal),
            run('-', (0..4).map(|c| (3, c)), Direction::Horizontal),
            empty,
            run('|', (0..4).map(|r| (r, 9)), Direction::Vertical),
            4,
            4,
        );
        assert!(BoxAlignmentCalculator::new().calculate_corrections(&[frame]).is_empty());
    }
}
