//! Grouping of same-direction lines that are meant to share a row or column.

use tracing::debug;

use crate::line::{Direction, Line};

/// Lines considered mutually alignable, with one authoritative reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelGroup {
    lines: Vec<Line>,
    direction: Direction,
    reference: usize,
    expected_position: isize,
}

impl ParallelGroup {
    /// Build a group from a non-empty set of lines. The reference is the
    /// longest line; the first one wins a tie.
    fn from_lines(lines: Vec<Line>, direction: Direction) -> Option<Self> {
        let mut reference = 0;
        for (i, line) in lines.iter().enumerate().skip(1) {
            if line.len() > lines[reference].len() {
                reference = i;
            }
        }
        let expected_position = lines.get(reference)?.dominant()?;
        Some(Self {
            lines,
            direction,
            reference,
            expected_position,
        })
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn reference_index(&self) -> usize {
        self.reference
    }

    pub fn reference_line(&self) -> &Line {
        &self.lines[self.reference]
    }

    /// Row (horizontal) or column (vertical) every member should sit on.
    pub fn expected_position(&self) -> isize {
        self.expected_position
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Members other than the reference.
    pub fn non_reference_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.reference)
            .map(|(_, line)| line)
    }
}

/// Groups lines by proximity of their dominant coordinate and overlap along
/// the other axis.
#[derive(Debug, Clone, Copy)]
pub struct ParallelLineFinder {
    tolerance: usize,
    min_overlap_ratio: f64,
}

impl Default for ParallelLineFinder {
    fn default() -> Self {
        Self::new(1, 0.5)
    }
}

impl ParallelLineFinder {
    pub fn new(tolerance: usize, min_overlap_ratio: f64) -> Self {
        Self {
            tolerance,
            min_overlap_ratio,
        }
    }

    /// Horizontal groups first, then vertical. Diagonal lines never group.
    pub fn find_parallel_groups(&self, lines: &[Line]) -> Vec<ParallelGroup> {
        let mut groups = self.group_direction(lines, Direction::Horizontal);
        groups.extend(self.group_direction(lines, Direction::Vertical));
        debug!(
            lines = lines.len(),
            groups = groups.len(),
            tolerance = self.tolerance,
            "parallel grouping finished"
        );
        groups
    }

    fn group_direction(&self, lines: &[Line], direction: Direction) -> Vec<ParallelGroup> {
        let mut sorted: Vec<(isize, &Line)> = lines
            .iter()
            .filter(|l| l.direction() == direction)
            .filter_map(|l| l.dominant().map(|d| (d, l)))
            .collect();
        // Stable, so lines on the same coordinate keep detection order.
        sorted.sort_by_key(|(d, _)| *d);

        let mut groups = Vec::new();
        let mut current: Vec<Line> = Vec::new();
        let mut last: Option<(isize, &Line)> = None;

        for (pos, line) in sorted {
            let joins = last.is_some_and(|(last_pos, last_line)| {
                pos.abs_diff(last_pos) <= self.tolerance && self.has_sufficient_overlap(last_line, line)
            });

            if !joins && !current.is_empty() {
                groups.extend(ParallelGroup::from_lines(std::mem::take(&mut current), direction));
            }
            current.push(line.clone());
            last = Some((pos, line));
        }

        if !current.is_empty() {
            groups.extend(ParallelGroup::from_lines(current, direction));
        }

        groups
    }

    /// Intersection of the two spans divided by the shorter span.
    pub fn has_sufficient_overlap(&self, a: &Line, b: &Line) -> bool {
        overlap_ratio(a, b).is_some_and(|ratio| ratio >= self.min_overlap_ratio)
    }
}

/// Overlap of two lines along their own axis, relative to the shorter one.
pub fn overlap_ratio(a: &Line, b: &Line) -> Option<f64> {
    let (start_a, end_a) = a.span()?;
    let (start_b, end_b) = b.span()?;

    let overlap = (end_a.min(end_b) - start_a.max(start_b) + 1).max(0);
    let shorter = (end_a - start_a + 1).min(end_b - start_b + 1);
    if shorter <= 0 {
        return None;
    }
    Some(overlap as f64 / shorter as f64)
}

/// Convenience wrapper over [`ParallelLineFinder::find_parallel_groups`].
pub fn find_parallel_groups(
    lines: &[Line],
    tolerance: usize,
    min_overlap_ratio: f64,
) -> Vec<ParallelGroup> {
    ParallelLineFinder::new(tolerance, min_overlap_ratio).find_parallel_groups(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, Character, Position};

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

    fn finder() -> ParallelLineFinder {
        ParallelLineFinder::default()
    }

    #[test]
    fn test_empty_input() {
        assert!(finder().find_parallel_groups(&[]).is_empty());
    }

    #[test]
    fn test_single_line_is_its_own_group() {
        let groups = finder().find_parallel_groups(&[horizontal(2, 0..=4)]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[0].expected_position(), 2);
        assert_eq!(groups[0].non_reference_lines().count(), 0);
    }

    #[test]
    fn test_adjacent_rows_group_together() {
        let groups = finder().find_parallel_groups(&[horizontal(0, 0..=5), horizontal(1, 1..=4)]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].expected_position(), 0);
    }

    #[test]
    fn test_distant_rows_split() {
        let groups = finder().find_parallel_groups(&[horizontal(0, 0..=5), horizontal(3, 0..=5)]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_non_overlapping_lines_split() {
        let groups = finder().find_parallel_groups(&[horizontal(0, 0..=3), horizontal(1, 10..=13)]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_overlap_ratio_uses_shorter_line() {
        let long = horizontal(0, 0..=9);
        let short = horizontal(1, 8..=11);
        assert_eq!(overlap_ratio(&long, &short), Some(0.5));
        assert!(finder().has_sufficient_overlap(&long, &short));
        assert!(!ParallelLineFinder::new(1, 0.75).has_sufficient_overlap(&long, &short));
    }

    #[test]
    fn test_chain_merges_against_last_added() {
        // 0 and 2 are two apart, but each is within one of row 1.
        let groups = finder().find_parallel_groups(&[
            horizontal(2, 0..=3),
            horizontal(0, 0..=3),
            horizontal(1, 0..=3),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn test_reference_is_longest() {
        let groups = finder().find_parallel_groups(&[vertical(4, 0..=2), vertical(5, 0..=6)]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reference_line().len(), 7);
        assert_eq!(groups[0].expected_position(), 5);
    }

    #[test]
    fn test_reference_tie_keeps_first() {
        let groups = finder().find_parallel_groups(&[horizontal(3, 0..=3), horizontal(4, 0..=3)]);
        assert_eq!(groups[0].reference_index(), 0);
        assert_eq!(groups[0].expected_position(), 3);
    }

    #[test]
    fn test_directions_grouped_separately() {
        let groups = finder().find_parallel_groups(&[
            horizontal(0, 0..=3),
            vertical(0, 0..=3),
            horizontal(1, 0..=3),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].direction(), Direction::Horizontal);
        assert_eq!(groups[1].direction(), Direction::Vertical);
    }

    #[test]
    fn test_zero_tolerance_requires_same_coordinate() {
        let groups = find_parallel_groups(&[horizontal(0, 0..=3), horizontal(1, 0..=3)], 0, 0.5);
        assert_eq!(groups.len(), 2);
    }
}
