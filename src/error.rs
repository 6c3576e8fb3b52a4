//! Error types for the correction core.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, CorrectionError>;

/// Errors raised by grid access, character construction, settings validation
/// and Markdown block edits.
///
/// Ambiguous diagram structure is never an error: the affected element is simply
/// left uncorrected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrectionError {
    /// A position (usually a correction's translated cell) lies outside the grid.
    #[error("position ({row}, {col}) is outside the {width}x{height} grid")]
    OutOfBounds {
        row: isize,
        col: isize,
        width: usize,
        height: usize,
    },

    /// A character was built from something other than exactly one code point.
    #[error("character must be exactly one code point, got {value:?}")]
    InvalidCharacter { value: String },

    /// An engine tunable is outside its accepted range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A Markdown code block index past the end of the document's blocks.
    #[error("code block {index} out of range ({count} blocks)")]
    BlockOutOfRange { index: usize, count: usize },
}

impl CorrectionError {
    /// True for the out-of-bounds kind, which the engine treats as skippable.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_message() {
        let err = CorrectionError::OutOfBounds {
            row: -1,
            col: 3,
            width: 4,
            height: 2,
        };
        assert_eq!(
            err.to_string(),
            "position (-1, 3) is outside the 4x2 grid"
        );
        assert!(err.is_out_of_bounds());
    }

    #[test]
    fn test_invalid_character_message() {
        let err = CorrectionError::InvalidCharacter {
            value: "ab".to_string(),
        };
        assert!(err.to_string().contains("\"ab\""));
        assert!(!err.is_out_of_bounds());
    }
}
