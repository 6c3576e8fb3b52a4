//! The correction pipeline.
//!
//! ```text
//! detect lines ─┬─ parallel groups ─ (tree filter) ─ alignment ─┐
//!               ├─ boxes ─ box edges ───────────────────────────┤
//!               └─ strays ──────────────────────────────────────┤
//! row shifts ───────────────────────────────────────────────────┴─ apply in order
//! ```
//!
//! Each producer runs exactly once per call. The engine keeps no state
//! between calls; every call works on its own copy of the grid.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::{
    AlignmentCalculator, BoxAlignmentCalculator, CorrectionResult, RowShiftCorrector,
    ShiftCorrection, ShiftCorrector, StrayCharacterFinder,
};
use crate::detect::{
    BoxDetector, LineDetector, ParallelGroup, ParallelLineFinder, StructureClassifier,
    StructureType,
};
use crate::error::Result;
use crate::grid::{Cell, Grid, Position};
use crate::line::Line;
use crate::settings::EngineSettings;

/// Everything the pipeline decides before touching the grid.
struct Plan {
    lines: Vec<Line>,
    groups: Vec<ParallelGroup>,
    structure: StructureType,
    corrections: Vec<ShiftCorrection>,
}

#[derive(Debug, Clone)]
pub struct CorrectionEngine {
    settings: EngineSettings,
    line_detector: LineDetector,
    parallel_finder: ParallelLineFinder,
    classifier: StructureClassifier,
    box_detector: BoxDetector,
    stray_finder: StrayCharacterFinder,
    row_shift: RowShiftCorrector,
}

impl Default for CorrectionEngine {
    fn default() -> Self {
        Self::build(EngineSettings::default())
    }
}

impl CorrectionEngine {
    /// Build an engine after checking the settings.
    pub fn new(settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::build(settings))
    }

    fn build(settings: EngineSettings) -> Self {
        Self {
            line_detector: LineDetector::new(settings.min_line_length, settings.detect_diagonals),
            parallel_finder: ParallelLineFinder::new(settings.tolerance, settings.min_overlap_ratio),
            classifier: StructureClassifier::new(settings.tree_branch_threshold),
            box_detector: BoxDetector::new(settings.min_box_size),
            stray_finder: StrayCharacterFinder::new(settings.tolerance),
            row_shift: RowShiftCorrector::new(settings.tolerance, settings.min_consensus),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Every correction `correct` would attempt, without applying any.
    pub fn analyze<'a>(&self, grid: &'a Grid) -> CorrectionResult<'a> {
        let plan = self.plan(grid);
        CorrectionResult {
            original: grid,
            corrected: grid.clone(),
            corrections: plan.corrections,
            groups: plan.groups,
            lines: plan.lines,
            structure: plan.structure,
            skipped: 0,
        }
    }

    /// Apply every planned correction in order to one working copy. A
    /// correction that would leave the grid is dropped and counted in
    /// `skipped`; the rest still apply.
    pub fn correct<'a>(&self, grid: &'a Grid) -> CorrectionResult<'a> {
        let plan = self.plan(grid);
        let applier = ShiftCorrector::new();

        let mut corrected = grid.clone();
        let mut applied = Vec::with_capacity(plan.corrections.len());
        let mut skipped = 0;

        for correction in plan.corrections {
            match applier.apply_in_place(&correction, &mut corrected) {
                Ok(()) => applied.push(correction),
                Err(err) => {
                    debug!(%correction, error = %err, "correction skipped");
                    skipped += 1;
                }
            }
        }

        debug!(applied = applied.len(), skipped, "corrections applied");
        CorrectionResult {
            original: grid,
            corrected,
            corrections: applied,
            groups: plan.groups,
            lines: plan.lines,
            structure: plan.structure,
            skipped,
        }
    }

    /// Convenience: correct text and return the corrected text along with the
    /// number of corrections applied.
    pub fn correct_text(&self, text: &str) -> (String, usize) {
        let grid = Grid::from_text(text);
        let result = self.correct(&grid);
        (result.corrected.to_string(), result.corrections_count())
    }

    fn plan(&self, grid: &Grid) -> Plan {
        let lines = self.line_detector.detect_lines(grid);
        if lines.is_empty() {
            debug!("no lines detected");
            return Plan {
                lines,
                groups: Vec::new(),
                structure: StructureType::Unknown,
                corrections: Vec::new(),
            };
        }

        let mut groups = self.parallel_finder.find_parallel_groups(&lines);
        let structure = self.classifier.classify(grid);
        if structure == StructureType::Tree && self.settings.preserve_trees {
            let before = groups.len();
            groups = self.without_tree_groups(grid, groups);
            debug!(removed = before - groups.len(), "tree groups filtered");
        }

        let alignment = AlignmentCalculator::new();
        let mut corrections: Vec<ShiftCorrection> = groups
            .iter()
            .flat_map(|g| alignment.calculate_alignment(g).corrections)
            .collect();
        let aligned = corrections.len();

        let boxes = self.box_detector.detect_boxes(grid);
        corrections.extend(BoxAlignmentCalculator::new().calculate_corrections(&boxes));
        let boxed = corrections.len() - aligned;

        corrections.extend(self.stray_finder.find_stray_corrections(grid, &lines));
        corrections.extend(self.row_shift.find_row_shift_corrections(grid));

        debug!(
            lines = lines.len(),
            groups = groups.len(),
            boxes = boxes.len(),
            %structure,
            alignment = aligned,
            box_edges = boxed,
            corrections = corrections.len(),
            "correction plan ready"
        );
        for correction in &corrections {
            trace!(%correction, "planned");
        }

        Plan {
            lines,
            groups,
            structure,
            corrections,
        }
    }

    /// Drop every group with a line on or next to a tree branch start.
    fn without_tree_groups(&self, grid: &Grid, groups: Vec<ParallelGroup>) -> Vec<ParallelGroup> {
        let branches: HashSet<Position> = self.classifier.tree_branches(grid).into_iter().collect();
        let touches = |cell: &Cell| {
            branches.contains(&cell.position)
                || cell.neighbor_positions().iter().any(|p| branches.contains(p))
        };

        groups
            .into_iter()
            .filter(|g| !g.lines().iter().any(|l| l.cells().iter().any(touches)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correct::CorrectionSource;

    fn engine() -> CorrectionEngine {
        CorrectionEngine::default()
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let settings = EngineSettings {
            min_overlap_ratio: -0.1,
            ..Default::default()
        };
        assert!(CorrectionEngine::new(settings).is_err());
    }

    #[test]
    fn test_no_lines_short_circuits() {
        let grid = Grid::from_text("hello world");
        let result = engine().correct(&grid);
        assert_eq!(result.corrections_count(), 0);
        assert!(result.groups.is_empty());
        assert_eq!(result.structure, StructureType::Unknown);
        assert_eq!(result.corrected, grid);
    }

    #[test]
    fn test_aligned_box_unchanged() {
        let grid = Grid::from_text("+--+\n|  |\n+--+");
        let result = engine().correct(&grid);
        assert_eq!(result.corrections_count(), 0);
        assert!(!result.has_changes());
        assert_eq!(result.structure, StructureType::Box);
    }

    #[test]
    fn test_shifted_bottom_fixed() {
        let grid = Grid::from_text(" +--+\n |  |\n |  |\n |  |\n  +--+");
        let result = engine().correct(&grid);
        assert_eq!(result.corrections_count(), 1);
        assert_eq!(result.corrections[0].source, CorrectionSource::RowShift);
        assert_eq!(
            result.corrected.to_string(),
            " +--+\n |  |\n |  |\n |  |\n +--+"
        );
        assert_eq!(result.original.to_string(), grid.to_string());
    }

    #[test]
    fn test_analyze_does_not_mutate() {
        let grid = Grid::from_text(" +--+\n |  |\n |  |\n |  |\n  +--+");
        let result = engine().analyze(&grid);
        assert_eq!(result.corrections_count(), 1);
        assert_eq!(result.corrected, grid);
    }

    #[test]
    fn test_tree_groups_filtered() {
        let grid = Grid::from_text("root\n |\n +-- a\n +-- b");
        let result = engine().analyze(&grid);
        assert_eq!(result.structure, StructureType::Tree);
        assert!(result.groups.is_empty());
        assert_eq!(result.corrections_count(), 0);
    }

    #[test]
    fn test_tree_groups_kept_when_not_preserving() {
        let grid = Grid::from_text("root\n |\n +-- a\n +-- b");
        let settings = EngineSettings {
            preserve_trees: false,
            ..Default::default()
        };
        let result = CorrectionEngine::new(settings).unwrap().analyze(&grid);
        assert_eq!(result.groups.len(), 1);
    }

    #[test]
    fn test_correct_text() {
        let (text, count) = engine().correct_text("|\n|\n |\n|\n|");
        assert!(count >= 1);
        assert_eq!(text, "|\n|\n|\n|\n|");
    }
}
