//! Character classification for box-drawing diagrams.
//!
//! Every character maps to exactly one [`CharClass`]. The sets are fixed and
//! cover ASCII art (`-|+`) as well as the Unicode box-drawing block
//! (`─│┌┼`). Checks run in a fixed order, so a character that could belong to
//! several sets always lands in the first one.

use serde::Serialize;

/// Structural role of a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CharClass {
    /// `-`, `=`, `_`, `─`, `━`, `═`
    Horizontal,
    /// `|`, `!`, `│`, `┃`, `║`
    Vertical,
    /// `+`, `.`, `'`, `` ` `` and the twelve pure Unicode corners
    Corner,
    /// `*` and the Unicode tees and crosses
    Junction,
    /// `\`, `╲`
    DiagonalDown,
    /// `/`, `╱`
    DiagonalUp,
    /// `<`, `>`, `^`, `v`, `V`
    Arrow,
    /// Alphanumeric content
    Text,
    /// Space or tab
    Whitespace,
    /// Anything else
    Unknown,
}

impl CharClass {
    /// Horizontal, vertical, corner or junction.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Self::Horizontal | Self::Vertical | Self::Corner | Self::Junction
        )
    }

    /// Characters the row-shift consensus counts: vertical, corner or junction.
    pub fn is_column_anchor(self) -> bool {
        matches!(self, Self::Vertical | Self::Corner | Self::Junction)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Character Sets
// ─────────────────────────────────────────────────────────────────────────────

/// Check if character draws a horizontal line
pub fn is_horizontal(c: char) -> bool {
    matches!(c, '-' | '=' | '_' | '─' | '━' | '═')
}

/// Check if character draws a vertical line
pub fn is_vertical(c: char) -> bool {
    matches!(c, '|' | '!' | '│' | '┃' | '║')
}

/// Check if character is a corner piece (ASCII or Unicode)
pub fn is_corner(c: char) -> bool {
    matches!(
        c,
        '+' | '.'
            | '\''
            | '`'
            | '┌'
            | '┐'
            | '└'
            | '┘'
            | '┏'
            | '┓'
            | '┗'
            | '┛'
            | '╔'
            | '╗'
            | '╚'
            | '╝'
    )
}

/// Check if character is a tee or cross junction
pub fn is_junction(c: char) -> bool {
    matches!(
        c,
        '*' | '├' | '┤' | '┬' | '┴' | '┼' | '┠' | '┨' | '┯' | '┷' | '┿' | '╋'
    )
}

fn is_diagonal_down(c: char) -> bool {
    matches!(c, '\\' | '╲')
}

fn is_diagonal_up(c: char) -> bool {
    matches!(c, '/' | '╱')
}

fn is_arrow(c: char) -> bool {
    matches!(c, '<' | '>' | '^' | 'v' | 'V')
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t')
}

/// Check if a line scan may cross this character without ending the run.
///
/// `+` and `.` join ASCII segments; every Unicode corner and junction joins
/// box-drawing segments. `'` and `` ` `` are corners but never bridges.
pub fn is_bridge(c: char) -> bool {
    matches!(c, '+' | '.') || (c > '\u{7f}' && (is_corner(c) || is_junction(c)))
}

/// Classify a single character.
pub fn classify(c: char) -> CharClass {
    if is_horizontal(c) {
        CharClass::Horizontal
    } else if is_vertical(c) {
        CharClass::Vertical
    } else if is_corner(c) {
        CharClass::Corner
    } else if is_junction(c) {
        CharClass::Junction
    } else if is_diagonal_down(c) {
        CharClass::DiagonalDown
    } else if is_diagonal_up(c) {
        CharClass::DiagonalUp
    } else if is_arrow(c) {
        CharClass::Arrow
    } else if is_blank(c) {
        CharClass::Whitespace
    } else if c.is_alphanumeric() {
        CharClass::Text
    } else {
        CharClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // classify() tests
    // =========================================================================

    #[test]
    fn test_classify_ascii_lines() {
        for c in ['-', '=', '_'] {
            assert_eq!(classify(c), CharClass::Horizontal, "{c:?}");
        }
        for c in ['|', '!'] {
            assert_eq!(classify(c), CharClass::Vertical, "{c:?}");
        }
    }

    #[test]
    fn test_classify_ascii_corners_and_junction() {
        for c in ['+', '.', '\'', '`'] {
            assert_eq!(classify(c), CharClass::Corner, "{c:?}");
        }
        assert_eq!(classify('*'), CharClass::Junction);
    }

    #[test]
    fn test_classify_unicode_weights() {
        for c in ['─', '━', '═'] {
            assert_eq!(classify(c), CharClass::Horizontal, "{c:?}");
        }
        for c in ['│', '┃', '║'] {
            assert_eq!(classify(c), CharClass::Vertical, "{c:?}");
        }
    }

    #[test]
    fn test_classify_unicode_corners() {
        for c in "┌┐└┘┏┓┗┛╔╗╚╝".chars() {
            assert_eq!(classify(c), CharClass::Corner, "{c:?}");
        }
    }

    #[test]
    fn test_classify_unicode_junctions() {
        for c in "├┤┬┴┼┠┨┯┷┿╋".chars() {
            assert_eq!(classify(c), CharClass::Junction, "{c:?}");
        }
    }

    #[test]
    fn test_classify_diagonals_and_arrows() {
        assert_eq!(classify('\\'), CharClass::DiagonalDown);
        assert_eq!(classify('╲'), CharClass::DiagonalDown);
        assert_eq!(classify('/'), CharClass::DiagonalUp);
        assert_eq!(classify('╱'), CharClass::DiagonalUp);
        for c in ['<', '>', '^', 'v', 'V'] {
            assert_eq!(classify(c), CharClass::Arrow, "{c:?}");
        }
    }

    #[test]
    fn test_classify_fallbacks() {
        assert_eq!(classify(' '), CharClass::Whitespace);
        assert_eq!(classify('\t'), CharClass::Whitespace);
        assert_eq!(classify('a'), CharClass::Text);
        assert_eq!(classify('7'), CharClass::Text);
        assert_eq!(classify('é'), CharClass::Text);
        assert_eq!(classify('#'), CharClass::Unknown);
        assert_eq!(classify('╌'), CharClass::Unknown);
    }

    // =========================================================================
    // Predicate tests
    // =========================================================================

    #[test]
    fn test_is_bridge() {
        assert!(is_bridge('+'));
        assert!(is_bridge('.'));
        assert!(is_bridge('┌'));
        assert!(is_bridge('┼'));
        assert!(!is_bridge('\''));
        assert!(!is_bridge('`'));
        assert!(!is_bridge('*'));
        assert!(!is_bridge('-'));
    }

    #[test]
    fn test_structural_and_anchor_classes() {
        assert!(CharClass::Horizontal.is_structural());
        assert!(CharClass::Junction.is_structural());
        assert!(!CharClass::Arrow.is_structural());
        assert!(!CharClass::DiagonalUp.is_structural());

        assert!(CharClass::Vertical.is_column_anchor());
        assert!(CharClass::Corner.is_column_anchor());
        assert!(!CharClass::Horizontal.is_column_anchor());
    }
}
