//! Diagram repair inside Markdown fenced code blocks.
//!
//! Only the lines between a block's fences are ever rewritten. Fence markers,
//! language labels and every line outside a diagram block pass through
//! untouched.

use std::borrow::Cow;

use serde::Serialize;
use tracing::debug;

use crate::charset::{CharClass, classify};
use crate::correct::CorrectionEngine;
use crate::error::{CorrectionError, Result};
use crate::grid::{Grid, expand_tabs};

/// Labels treated as diagram candidates when none are configured.
pub const DEFAULT_DIAGRAM_LANGUAGES: [&str; 5] = ["", "ascii", "text", "diagram", "art"];

/// Share of drawing characters a candidate block needs by default.
pub const DEFAULT_MIN_CHAR_RATIO: f64 = 0.05;

// ─────────────────────────────────────────────────────────────────────────────
// Fence parsing
// ─────────────────────────────────────────────────────────────────────────────

/// A fenced code block located in a Markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    /// Label after the opening fence, empty when absent.
    pub language: String,
    /// Lines between the fences joined by `\n`.
    pub content: String,
    /// Zero-based line of the opening fence.
    pub start_line: usize,
    /// Zero-based line of the closing fence.
    pub end_line: usize,
    pub fence_char: char,
    pub fence_indent: String,
}

impl CodeBlock {
    /// First content line, right after the opening fence.
    pub fn content_start_line(&self) -> usize {
        self.start_line + 1
    }
}

/// Markdown text plus the fenced blocks found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownDocument {
    pub text: String,
    pub code_blocks: Vec<CodeBlock>,
}

impl MarkdownDocument {
    /// The full text with block `index`'s inner lines replaced by
    /// `new_content`. An empty `new_content` leaves the fences adjacent.
    pub fn replace_content(&self, index: usize, new_content: &str) -> Result<String> {
        let block = self
            .code_blocks
            .get(index)
            .ok_or(CorrectionError::BlockOutOfRange {
                index,
                count: self.code_blocks.len(),
            })?;
        let mut lines: Vec<&str> = self.text.split('\n').collect();
        splice(&mut lines, block, new_content);
        Ok(lines.join("\n"))
    }
}

fn splice<'a>(lines: &mut Vec<&'a str>, block: &CodeBlock, new_content: &'a str) {
    let replacement: Vec<&str> = if new_content.is_empty() {
        Vec::new()
    } else {
        new_content.split('\n').collect()
    };
    lines.splice(block.content_start_line()..block.end_line, replacement);
}

/// Opening or closing fence line, split into its parts.
struct Fence<'a> {
    indent: &'a str,
    marker: char,
    len: usize,
    label: &'a str,
}

/// Optional whitespace, three or more backticks or tildes, an optional label
/// of `[A-Za-z0-9_+-]`, then nothing but whitespace.
fn parse_fence(line: &str) -> Option<Fence<'_>> {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];

    let marker = body.chars().next().filter(|&c| matches!(c, '`' | '~'))?;
    let len = body.chars().take_while(|&c| c == marker).count();
    if len < 3 {
        return None;
    }

    let rest = &body[len * marker.len_utf8()..];
    let label_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-')))
        .unwrap_or(rest.len());
    let (label, tail) = rest.split_at(label_len);
    if !tail.trim().is_empty() {
        return None;
    }

    Some(Fence {
        indent,
        marker,
        len,
        label,
    })
}

/// Find every closed fenced block. An opening fence without a matching close
/// is treated as ordinary text and scanning resumes on the next line.
pub fn parse_markdown(text: &str) -> MarkdownDocument {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut code_blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(open) = parse_fence(lines[i]) else {
            i += 1;
            continue;
        };

        let close = (i + 1..lines.len()).find(|&j| {
            parse_fence(lines[j])
                .is_some_and(|f| f.marker == open.marker && f.len >= open.len && f.label.is_empty())
        });

        match close {
            Some(j) => {
                code_blocks.push(CodeBlock {
                    language: open.label.to_string(),
                    content: lines[i + 1..j].join("\n"),
                    start_line: i,
                    end_line: j,
                    fence_char: open.marker,
                    fence_indent: open.indent.to_string(),
                });
                i = j + 1;
            }
            None => i += 1,
        }
    }

    MarkdownDocument {
        text: text.to_string(),
        code_blocks,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagram classification
// ─────────────────────────────────────────────────────────────────────────────

/// Decides which code blocks hold diagrams worth correcting.
#[derive(Debug, Clone)]
pub struct DiagramClassifier {
    languages: Vec<String>,
    min_char_ratio: f64,
}

impl Default for DiagramClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGRAM_LANGUAGES, DEFAULT_MIN_CHAR_RATIO)
    }
}

impl DiagramClassifier {
    pub fn new<I, S>(languages: I, min_char_ratio: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            languages: languages
                .into_iter()
                .map(|l| l.as_ref().to_lowercase())
                .collect(),
            min_char_ratio,
        }
    }

    pub fn is_candidate_language(&self, language: &str) -> bool {
        let language = language.to_lowercase();
        self.languages.iter().any(|l| *l == language)
    }

    /// A candidate language and enough drawing characters among the
    /// non-whitespace ones.
    pub fn is_diagram(&self, content: &str, language: &str) -> bool {
        if !self.is_candidate_language(language) {
            return false;
        }

        let (drawing, total) = content
            .chars()
            .filter(|c| !c.is_whitespace())
            .fold((0usize, 0usize), |(drawing, total), c| {
                let class = classify(c);
                let hit = class.is_structural() || class == CharClass::Arrow;
                (drawing + usize::from(hit), total + 1)
            });
        if total == 0 {
            return false;
        }
        drawing as f64 / total as f64 >= self.min_char_ratio
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Correction
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownCorrectionResult {
    pub corrected_text: String,
    /// Blocks classified as diagrams.
    pub blocks_found: usize,
    /// Diagram blocks that received at least one correction.
    pub blocks_corrected: usize,
    pub total_corrections: usize,
}

impl MarkdownCorrectionResult {
    pub fn has_changes(&self) -> bool {
        self.total_corrections > 0
    }
}

/// Runs the correction engine over every diagram block of a document.
#[derive(Debug, Clone, Default)]
pub struct MarkdownCorrector {
    classifier: DiagramClassifier,
    engine: CorrectionEngine,
    tab_width: Option<usize>,
}

impl MarkdownCorrector {
    pub fn new(classifier: DiagramClassifier, engine: CorrectionEngine) -> Self {
        Self {
            classifier,
            engine,
            tab_width: None,
        }
    }

    /// Expand tabs inside diagram blocks before building their grids. A block
    /// that needs no correction keeps its tabs.
    pub fn with_tab_width(mut self, tab_width: usize) -> Self {
        self.tab_width = Some(tab_width);
        self
    }

    pub fn engine(&self) -> &CorrectionEngine {
        &self.engine
    }

    /// Correct each diagram block and splice it back between its fences.
    ///
    /// Blocks are visited last to first, so a block whose line count changes
    /// never moves the blocks still waiting to be processed.
    pub fn correct(&self, text: &str) -> MarkdownCorrectionResult {
        let doc = parse_markdown(text);
        let diagrams: Vec<&CodeBlock> = doc
            .code_blocks
            .iter()
            .filter(|b| self.classifier.is_diagram(&b.content, &b.language))
            .collect();

        let mut replacements: Vec<(&CodeBlock, String)> = Vec::new();
        let mut total_corrections = 0;

        for &block in diagrams.iter().rev() {
            let content = match self.tab_width {
                Some(width) => Cow::Owned(expand_tabs(&block.content, width)),
                None => Cow::Borrowed(block.content.as_str()),
            };
            let grid = Grid::from_text(&content);
            let result = self.engine.correct(&grid);
            let count = result.corrections_count();
            debug!(
                line = block.start_line + 1,
                language = %block.language,
                corrections = count,
                "diagram block"
            );
            if count > 0 {
                total_corrections += count;
                let mut corrected = result.corrected.to_string();
                if block.content.ends_with('\r') {
                    corrected = terminate_with_cr(&corrected);
                }
                replacements.push((block, corrected));
            }
        }

        let mut lines: Vec<&str> = text.split('\n').collect();
        for (block, content) in &replacements {
            splice(&mut lines, block, content);
        }

        MarkdownCorrectionResult {
            corrected_text: lines.join("\n"),
            blocks_found: diagrams.len(),
            blocks_corrected: replacements.len(),
            total_corrections,
        }
    }
}

/// Restore the `\r` that CRLF documents carry before each `\n` split point.
fn terminate_with_cr(content: &str) -> String {
    content
        .split('\n')
        .map(|line| format!("{line}\r"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Fence parsing
    // =========================================================================

    #[test]
    fn test_parse_single_block() {
        let doc = parse_markdown("intro\n```text\n+--+\n+--+\n```\noutro");
        assert_eq!(doc.code_blocks.len(), 1);
        let block = &doc.code_blocks[0];
        assert_eq!(block.language, "text");
        assert_eq!(block.content, "+--+\n+--+");
        assert_eq!(block.start_line, 1);
        assert_eq!(block.end_line, 4);
        assert_eq!(block.fence_char, '`');
        assert_eq!(block.fence_indent, "");
    }

    #[test]
    fn test_parse_tilde_and_indent() {
        let doc = parse_markdown("  ~~~~\n  a\n  ~~~~~");
        assert_eq!(doc.code_blocks.len(), 1);
        assert_eq!(doc.code_blocks[0].fence_char, '~');
        assert_eq!(doc.code_blocks[0].fence_indent, "  ");
    }

    #[test]
    fn test_close_needs_same_marker_and_length() {
        // The backtick and short fences inside do not close the tilde block.
        let doc = parse_markdown("~~~~\n```\n~~~\n~~~~\nafter");
        assert_eq!(doc.code_blocks.len(), 1);
        assert_eq!(doc.code_blocks[0].content, "```\n~~~");
    }

    #[test]
    fn test_labelled_fence_does_not_close() {
        let doc = parse_markdown("```\na\n```rust\n```");
        assert_eq!(doc.code_blocks.len(), 1);
        assert_eq!(doc.code_blocks[0].content, "a\n```rust");
    }

    #[test]
    fn test_unclosed_fence_ignored() {
        let doc = parse_markdown("```\nno close\n");
        assert!(doc.code_blocks.is_empty());
    }

    #[test]
    fn test_not_a_fence() {
        assert!(parse_fence("``").is_none());
        assert!(parse_fence("```rust extra").is_none());
        assert!(parse_fence("text ```").is_none());
        assert!(parse_fence("```c++  ").is_some());
    }

    #[test]
    fn test_replace_content() {
        let doc = parse_markdown("a\n```\nold\nold\n```\nb");
        assert_eq!(doc.replace_content(0, "new").unwrap(), "a\n```\nnew\n```\nb");
        assert_eq!(doc.replace_content(0, "").unwrap(), "a\n```\n```\nb");
    }

    #[test]
    fn test_replace_content_out_of_range() {
        let doc = parse_markdown("no blocks");
        assert_eq!(
            doc.replace_content(0, "x"),
            Err(CorrectionError::BlockOutOfRange { index: 0, count: 0 })
        );
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn test_candidate_languages() {
        let classifier = DiagramClassifier::default();
        for lang in ["", "ascii", "TEXT", "Diagram", "art"] {
            assert!(classifier.is_candidate_language(lang), "{lang}");
        }
        assert!(!classifier.is_candidate_language("rust"));
    }

    #[test]
    fn test_is_diagram_by_ratio() {
        let classifier = DiagramClassifier::default();
        assert!(classifier.is_diagram("+--+\n|  |\n+--+", ""));
        assert!(!classifier.is_diagram("just some prose here", "text"));
        assert!(!classifier.is_diagram("+--+", "python"));
        assert!(!classifier.is_diagram("", ""));
        assert!(!classifier.is_diagram("   \n  ", ""));
    }

    #[test]
    fn test_custom_ratio() {
        let strict = DiagramClassifier::new(["text"], 0.9);
        assert!(!strict.is_diagram("ab-", "text"));
        assert!(strict.is_diagram("-|-", "text"));
    }

    // =========================================================================
    // Correction
    // =========================================================================

    #[test]
    fn test_corrects_drifted_block() {
        let text = "# Doc\n\n```\n+--+\n|  |\n|  |\n |  |\n|  |\n+--+\n```\n";
        let result = MarkdownCorrector::default().correct(text);
        assert_eq!(result.blocks_found, 1);
        assert_eq!(result.blocks_corrected, 1);
        assert!(result.total_corrections >= 1);
        assert_eq!(
            result.corrected_text,
            "# Doc\n\n```\n+--+\n|  |\n|  |\n|  |\n|  |\n+--+\n```\n"
        );
    }

    #[test]
    fn test_clean_blocks_byte_identical() {
        let text = "```text\n+--+   \n|  |\n+--+\n```\n\n```rust\nfn main() {}\n```";
        let result = MarkdownCorrector::default().correct(text);
        assert_eq!(result.blocks_found, 1);
        assert_eq!(result.blocks_corrected, 0);
        assert_eq!(result.corrected_text, text);
        assert!(!result.has_changes());
    }

    #[test]
    fn test_multiple_blocks_keep_positions() {
        let text = "```\n|\n|\n |\n|\n|\n```\nmiddle\n```\n|\n|\n |\n|\n|\n```";
        let result = MarkdownCorrector::default().correct(text);
        assert_eq!(result.blocks_found, 2);
        assert_eq!(result.blocks_corrected, 2);
        assert_eq!(
            result.corrected_text,
            "```\n|\n|\n|\n|\n|\n```\nmiddle\n```\n|\n|\n|\n|\n|\n```"
        );
    }

    #[test]
    fn test_crlf_document_keeps_crlf_in_corrected_block() {
        let text = "x\r\n```\r\n|\r\n|\r\n |\r\n|\r\n|\r\n```\r\n";
        let result = MarkdownCorrector::default().correct(text);
        assert!(result.has_changes());
        assert_eq!(
            result.corrected_text,
            "x\r\n```\r\n|\r\n|\r\n|\r\n|\r\n|\r\n```\r\n"
        );
        assert!(!result.corrected_text.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_tab_width_expands_block_tabs() {
        // As a single cell the tab leaves the pipe one column off; expanded to
        // four columns it is out of reach and the block stays as written.
        let text = "```\n|\n|\n\t|\n|\n|\n```";
        let raw = MarkdownCorrector::default().correct(text);
        assert!(raw.has_changes());
        assert_eq!(raw.corrected_text, "```\n|\n|\n|\n|\n|\n```");

        let expanded = MarkdownCorrector::default().with_tab_width(4).correct(text);
        assert!(!expanded.has_changes());
        assert_eq!(expanded.corrected_text, text);
    }
}
