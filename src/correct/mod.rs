//! Correction planning and application.
//!
//! Four independent producers propose [`ShiftCorrection`]s: parallel-group
//! alignment, box edges, stray characters and whole-row shifts. The
//! [`CorrectionEngine`] gathers them in that order and hands them to the
//! [`ShiftCorrector`], which is the only code that writes to a grid.

pub mod alignment;
pub mod apply;
pub mod box_alignment;
pub mod engine;
pub mod row_shift;
pub mod stray;

use std::fmt;

use serde::Serialize;

use crate::detect::{ParallelGroup, StructureType};
use crate::grid::Grid;
use crate::line::Line;

pub use alignment::{AlignmentCalculator, AlignmentResult};
pub use apply::ShiftCorrector;
pub use box_alignment::BoxAlignmentCalculator;
pub use engine::CorrectionEngine;
pub use row_shift::RowShiftCorrector;
pub use stray::StrayCharacterFinder;

/// Which producer proposed a correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionSource {
    Alignment,
    BoxEdge,
    Stray,
    RowShift,
}

impl CorrectionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alignment => "alignment",
            Self::BoxEdge => "box_edge",
            Self::Stray => "stray",
            Self::RowShift => "row_shift",
        }
    }
}

impl fmt::Display for CorrectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed move of a set of cells. Carries the characters as they were
/// when the correction was planned; applying it writes those characters.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftCorrection {
    pub line: Line,
    pub row_offset: isize,
    pub col_offset: isize,
    pub confidence: f64,
    pub source: CorrectionSource,
}

impl ShiftCorrection {
    pub fn new(line: Line, row_offset: isize, col_offset: isize, source: CorrectionSource) -> Self {
        Self {
            line,
            row_offset,
            col_offset,
            confidence: 1.0,
            source,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn is_noop(&self) -> bool {
        self.row_offset == 0 && self.col_offset == 0
    }
}

impl fmt::Display for ShiftCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} by ({:+}, {:+})",
            self.source, self.line, self.row_offset, self.col_offset
        )
    }
}

/// Outcome of one `analyze` or `correct` call.
///
/// For `analyze`, `corrections` lists everything that would be applied and
/// `corrected` equals `original`. For `correct`, it lists what was applied.
#[derive(Debug, Clone)]
pub struct CorrectionResult<'a> {
    pub original: &'a Grid,
    pub corrected: Grid,
    pub corrections: Vec<ShiftCorrection>,
    pub groups: Vec<ParallelGroup>,
    pub lines: Vec<Line>,
    pub structure: StructureType,
    /// Corrections dropped because they would leave the grid.
    pub skipped: usize,
}

impl CorrectionResult<'_> {
    pub fn corrections_count(&self) -> usize {
        self.corrections.len()
    }

    pub fn has_changes(&self) -> bool {
        self.corrected != *self.original
    }
}
