//! The character grid and its value types.
//!
//! A [`Grid`] is a rectangular, row-major buffer of single code points. Every
//! other component reads it through [`Position`]-based accessors that return
//! `None` instead of touching memory outside the grid; only the shift corrector
//! mutates it.

use std::fmt;

use serde::Serialize;

use crate::charset::{self, CharClass};
use crate::error::{CorrectionError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Position
// ─────────────────────────────────────────────────────────────────────────────

/// A (row, col) coordinate. Signed so that translated positions can fall
/// outside the grid and be rejected rather than wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub row: isize,
    pub col: isize,
}

impl Position {
    pub const fn new(row: isize, col: isize) -> Self {
        Self { row, col }
    }

    /// Position translated by the given deltas.
    pub const fn offset(self, delta_row: isize, delta_col: isize) -> Self {
        Self {
            row: self.row + delta_row,
            col: self.col + delta_col,
        }
    }

    /// Euclidean distance.
    pub fn distance_to(self, other: Position) -> f64 {
        let dr = (self.row - other.row) as f64;
        let dc = (self.col - other.col) as f64;
        (dr * dr + dc * dc).sqrt()
    }

    /// Sum of absolute row and column differences.
    pub fn manhattan_distance_to(self, other: Position) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Character
// ─────────────────────────────────────────────────────────────────────────────

/// A single code point together with its derived classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Character(char);

impl Character {
    pub const SPACE: Character = Character(' ');

    pub const fn new(value: char) -> Self {
        Self(value)
    }

    /// Build a character from text that must hold exactly one code point.
    pub fn parse(value: &str) -> Result<Self> {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Self(c)),
            _ => Err(CorrectionError::InvalidCharacter {
                value: value.to_string(),
            }),
        }
    }

    pub const fn value(self) -> char {
        self.0
    }

    pub fn class(self) -> CharClass {
        charset::classify(self.0)
    }

    /// Horizontal or vertical line character.
    pub fn is_line_char(self) -> bool {
        matches!(self.class(), CharClass::Horizontal | CharClass::Vertical)
    }

    pub fn is_corner(self) -> bool {
        self.class() == CharClass::Corner
    }

    pub fn is_junction(self) -> bool {
        self.class() == CharClass::Junction
    }

    pub fn is_whitespace(self) -> bool {
        self.class() == CharClass::Whitespace
    }

    pub fn is_bridge(self) -> bool {
        charset::is_bridge(self.0)
    }
}

impl From<char> for Character {
    fn from(value: char) -> Self {
        Self(value)
    }
}

impl TryFrom<&str> for Character {
    type Error = CorrectionError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cell
// ─────────────────────────────────────────────────────────────────────────────

/// A character observed at a position. A snapshot, not a live view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub character: Character,
    pub position: Position,
}

impl Cell {
    pub const fn new(character: Character, position: Position) -> Self {
        Self {
            character,
            position,
        }
    }

    pub fn class(&self) -> CharClass {
        self.character.class()
    }

    /// Cell holds whitespace.
    pub fn is_empty(&self) -> bool {
        self.character.is_whitespace()
    }

    /// Cell holds a horizontal, vertical, corner or junction character.
    pub fn is_structural(&self) -> bool {
        self.class().is_structural()
    }

    /// Up, down, left, right.
    pub fn neighbor_positions(&self) -> [Position; 4] {
        let p = self.position;
        [
            p.offset(-1, 0),
            p.offset(1, 0),
            p.offset(0, -1),
            p.offset(0, 1),
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grid
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable width x height character matrix stored as one flat buffer.
///
/// `Clone` is a full deep copy; corrections always run against a clone so the
/// caller's grid is never touched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grid {
    width: usize,
    height: usize,
    data: Vec<char>,
}

impl Grid {
    /// Space-filled grid of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![' '; width * height],
        }
    }

    /// Build a grid from multi-line text, padding short lines with spaces to
    /// the longest line. A trailing `\r` on a line is dropped.
    pub fn from_text(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }

        let lines: Vec<Vec<char>> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).chars().collect())
            .collect();
        let width = lines.iter().map(Vec::len).max().unwrap_or(0);
        let height = lines.len();

        let mut grid = Self::new(width, height);
        for (row, line) in lines.iter().enumerate() {
            let start = row * width;
            grid.data[start..start + line.len()].copy_from_slice(line);
        }
        grid
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the position lies inside the grid.
    pub fn contains(&self, pos: Position) -> bool {
        self.index(pos).is_some()
    }

    fn index(&self, pos: Position) -> Option<usize> {
        let row = usize::try_from(pos.row).ok()?;
        let col = usize::try_from(pos.col).ok()?;
        (row < self.height && col < self.width).then(|| row * self.width + col)
    }

    fn out_of_bounds(&self, pos: Position) -> CorrectionError {
        CorrectionError::OutOfBounds {
            row: pos.row,
            col: pos.col,
            width: self.width,
            height: self.height,
        }
    }

    /// Raw character at a position.
    pub fn get(&self, pos: Position) -> Option<char> {
        self.index(pos).map(|i| self.data[i])
    }

    /// Classification of the character at a position.
    pub fn class_at(&self, pos: Position) -> Option<CharClass> {
        self.get(pos).map(charset::classify)
    }

    pub fn cell(&self, pos: Position) -> Option<Cell> {
        self.get(pos)
            .map(|c| Cell::new(Character::new(c), pos))
    }

    /// Overwrite the character at a position.
    pub fn set_cell(&mut self, pos: Position, character: Character) -> Result<()> {
        let i = self.index(pos).ok_or_else(|| self.out_of_bounds(pos))?;
        self.data[i] = character.value();
        Ok(())
    }

    /// Reset a position to a space.
    pub fn clear_cell(&mut self, pos: Position) -> Result<()> {
        self.set_cell(pos, Character::SPACE)
    }

    /// All cells of a row, or `None` when the row is out of range.
    pub fn row_cells(&self, row: usize) -> Option<Vec<Cell>> {
        if row >= self.height {
            return None;
        }
        let r = row as isize;
        Some(
            (0..self.width)
                .map(|col| {
                    let pos = Position::new(r, col as isize);
                    Cell::new(Character::new(self.data[row * self.width + col]), pos)
                })
                .collect(),
        )
    }

    /// All cells of a column, or `None` when the column is out of range.
    pub fn col_cells(&self, col: usize) -> Option<Vec<Cell>> {
        if col >= self.width {
            return None;
        }
        let c = col as isize;
        Some(
            (0..self.height)
                .map(|row| {
                    let pos = Position::new(row as isize, c);
                    Cell::new(Character::new(self.data[row * self.width + col]), pos)
                })
                .collect(),
        )
    }

    /// Every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.data.iter().enumerate().map(move |(i, &c)| {
            let pos = Position::new((i / self.width) as isize, (i % self.width) as isize);
            Cell::new(Character::new(c), pos)
        })
    }
}

impl fmt::Display for Grid {
    /// Rows with trailing whitespace stripped, trailing empty rows dropped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rows: Vec<String> = self
            .data
            .chunks(self.width.max(1))
            .take(self.height)
            .map(|row| row.iter().collect::<String>().trim_end().to_string())
            .collect();

        while rows.last().is_some_and(|r| r.is_empty()) {
            rows.pop();
        }

        write!(f, "{}", rows.join("\n"))
    }
}

impl From<&str> for Grid {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

/// Replace each tab with spaces up to the next multiple of `tab_width`.
///
/// Columns count characters, matching grid columns, and restart after every
/// newline. A `tab_width` of zero removes tabs.
pub fn expand_tabs(text: &str, tab_width: usize) -> String {
    let mut result = String::with_capacity(text.len());
    let mut col = 0;

    for c in text.chars() {
        match c {
            '\t' => {
                let spaces = tab_width - col % tab_width.max(1);
                result.extend(std::iter::repeat_n(' ', spaces));
                col += spaces;
            }
            '\n' => {
                result.push(c);
                col = 0;
            }
            _ => {
                result.push(c);
                col += 1;
            }
        }
    }

    result
}
