//! Read-only analysis of a grid: lines, parallel groups, boxes and the
//! overall structure type.

pub mod boxes;
pub mod lines;
pub mod parallel;
pub mod structure;

pub use boxes::{BoxDetector, BoxStructure, detect_boxes};
pub use lines::{LineDetector, detect_lines};
pub use parallel::{ParallelGroup, ParallelLineFinder, find_parallel_groups};
pub use structure::{StructureClassifier, StructureType, is_tree_branch};
