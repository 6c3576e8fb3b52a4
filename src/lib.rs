//! # realign
//!
//! Repairs ASCII and Unicode box-drawing diagrams whose lines have drifted
//! out of alignment.
//!
//! ## Overview
//!
//! Text is loaded into a rectangular [`Grid`], analyzed for lines, parallel
//! line groups, boxes and tree notation, and then repaired by moving
//! characters. Characters are never created or destroyed: every correction
//! translates existing cells by a whole-cell offset.
//!
//! ## Key Components
//!
//! - **Detection** ([`detect`]): maximal runs of line characters, bridged
//!   across corners and junctions; parallel groups; closed rectangles; and a
//!   coarse structure type.
//! - **Correction** ([`correct`]): alignment of parallel groups, reconciliation
//!   of stray characters, and whole-row shifts decided by column consensus.
//! - **Markdown** ([`markdown`]): the same engine applied to fenced diagram
//!   blocks, leaving everything else byte-identical.
//!
//! ## Algorithm Flow
//!
//! ```text
//! Text → Grid → Detect lines → Group / classify → Plan corrections → Apply → Text
//! ```
//!
//! ## Example
//!
//! ```
//! use realign::{CorrectionEngine, Grid};
//!
//! let grid = Grid::from_text(" +--+\n |  |\n |  |\n |  |\n  +--+");
//! let result = CorrectionEngine::default().correct(&grid);
//! assert_eq!(result.corrected.to_string(), " +--+\n |  |\n |  |\n |  |\n +--+");
//! ```

#![forbid(unsafe_code)]

pub mod charset;
pub mod correct;
pub mod detect;
pub mod error;
pub mod grid;
pub mod line;
pub mod markdown;
pub mod settings;

pub use charset::CharClass;
pub use correct::{CorrectionEngine, CorrectionResult, CorrectionSource, ShiftCorrection};
pub use detect::{BoxStructure, ParallelGroup, StructureType};
pub use error::{CorrectionError, Result};
pub use grid::{Cell, Character, Grid, Position};
pub use line::{Direction, Line};
pub use markdown::{DiagramClassifier, MarkdownCorrectionResult, MarkdownCorrector, parse_markdown};
pub use settings::EngineSettings;
