//! Text measurement
//!
//! Pagination needs exactly one thing from the text system: given a piece of
//! text and a width, how is it broken into lines and how tall is each line.
//! [`TextMeasurer`] is that seam. Hosts with a real shaping stack implement it
//! on top of their shaper; [`FixedMetricsMeasurer`] is the bundled
//! implementation that wraps greedily at Unicode line break opportunities
//! (UAX #14) with a uniform glyph advance.

use crate::{MeasureError, TextStyle};
use unicode_segmentation::UnicodeSegmentation;

/// One laid out line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasuredLine {
    /// Number of characters on the line, including a trailing newline
    pub char_len: usize,
    /// Line height in points
    pub height: f32,
}

impl MeasuredLine {
    pub fn new(char_len: usize, height: f32) -> Self {
        Self { char_len, height }
    }
}

/// Host text measurement primitive
pub trait TextMeasurer: Send + Sync {
    /// Break `text` into lines no wider than `width`.
    ///
    /// The character counts of the returned lines must add up to the number
    /// of characters in `text`; empty text yields no lines.
    fn measure_lines(
        &self,
        text: &str,
        width: f32,
        style: &TextStyle,
    ) -> std::result::Result<Vec<MeasuredLine>, MeasureError>;

    /// Height of a single line in the given style
    fn line_height(&self, style: &TextStyle) -> f32 {
        style.line_height()
    }
}

/// Greedy line breaker with uniform glyph advances
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMetricsMeasurer;

struct Cluster {
    chars: usize,
    advance: f32,
    is_space: bool,
    hard_break: bool,
    break_after: bool,
}

impl FixedMetricsMeasurer {
    pub fn new() -> Self {
        Self
    }

    fn clusters(text: &str, style: &TextStyle) -> Vec<Cluster> {
        use unicode_linebreak::{linebreaks, BreakOpportunity};

        let allowed: Vec<usize> = linebreaks(text)
            .filter(|(_, op)| *op == BreakOpportunity::Allowed)
            .map(|(offset, _)| offset)
            .collect();

        text.grapheme_indices(true)
            .map(|(offset, grapheme)| {
                let end = offset + grapheme.len();
                let is_control = grapheme.chars().all(char::is_control);
                Cluster {
                    chars: grapheme.chars().count(),
                    advance: if is_control { 0.0 } else { style.glyph_advance() },
                    is_space: grapheme.chars().all(char::is_whitespace),
                    hard_break: grapheme.ends_with('\n'),
                    break_after: allowed.binary_search(&end).is_ok(),
                }
            })
            .collect()
    }
}

impl TextMeasurer for FixedMetricsMeasurer {
    fn measure_lines(
        &self,
        text: &str,
        width: f32,
        style: &TextStyle,
    ) -> std::result::Result<Vec<MeasuredLine>, MeasureError> {
        if !width.is_finite() || width <= 0.0 {
            return Err(MeasureError::InvalidWidth(width));
        }

        let line_height = self.line_height(style);
        let mut lines = Vec::new();
        let mut line_chars = 0usize;
        let mut line_width = 0.0f32;
        // (chars, width) of the current line up to its last break opportunity
        let mut last_break: Option<(usize, f32)> = None;

        for cluster in Self::clusters(text, style) {
            if line_chars > 0 && !cluster.is_space && line_width + cluster.advance > width {
                match last_break {
                    Some((chars, w)) if chars > 0 => {
                        lines.push(MeasuredLine::new(chars, line_height));
                        line_chars -= chars;
                        line_width -= w;
                    }
                    // No opportunity on this line: break inside the word
                    _ => {
                        lines.push(MeasuredLine::new(line_chars, line_height));
                        line_chars = 0;
                        line_width = 0.0;
                    }
                }
                last_break = None;
            }

            line_chars += cluster.chars;
            line_width += cluster.advance;

            if cluster.hard_break {
                lines.push(MeasuredLine::new(line_chars, line_height));
                line_chars = 0;
                line_width = 0.0;
                last_break = None;
            } else if cluster.break_after {
                last_break = Some((line_chars, line_width));
            }
        }

        if line_chars > 0 {
            lines.push(MeasuredLine::new(line_chars, line_height));
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> TextStyle {
        // 10pt glyphs, 10pt lines
        TextStyle {
            font_size: 10.0,
            line_spacing: 1.0,
            average_advance: 1.0,
        }
    }

    fn lens(lines: &[MeasuredLine]) -> Vec<usize> {
        lines.iter().map(|l| l.char_len).collect()
    }

    #[test]
    fn test_empty_text_has_no_lines() {
        let lines = FixedMetricsMeasurer.measure_lines("", 100.0, &style()).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_wraps_at_spaces() {
        // 5 glyphs per line
        let lines = FixedMetricsMeasurer
            .measure_lines("aaa bbb ccc", 50.0, &style())
            .unwrap();
        assert_eq!(lens(&lines), vec![4, 4, 3]);
        assert!(lines.iter().all(|l| l.height == 10.0));
    }

    #[test]
    fn test_newline_forces_break() {
        let lines = FixedMetricsMeasurer
            .measure_lines("ab\ncd\n", 100.0, &style())
            .unwrap();
        assert_eq!(lens(&lines), vec![3, 3]);
    }

    #[test]
    fn test_long_word_is_broken() {
        let lines = FixedMetricsMeasurer
            .measure_lines("abcdefghijkl", 50.0, &style())
            .unwrap();
        assert_eq!(lens(&lines), vec![5, 5, 2]);
    }

    #[test]
    fn test_combining_marks_stay_with_base() {
        // "e" + combining acute is one cluster of two chars
        let text = "e\u{301}e\u{301}e\u{301}";
        let lines = FixedMetricsMeasurer.measure_lines(text, 20.0, &style()).unwrap();
        assert_eq!(lens(&lines), vec![4, 2]);
    }

    #[test]
    fn test_char_counts_cover_text() {
        let text = "The quick brown fox\njumps over the lazy dog. \u{000C}End";
        let lines = FixedMetricsMeasurer.measure_lines(text, 60.0, &style()).unwrap();
        let total: usize = lines.iter().map(|l| l.char_len).sum();
        assert_eq!(total, text.chars().count());
    }

    #[test]
    fn test_invalid_width() {
        let result = FixedMetricsMeasurer.measure_lines("abc", 0.0, &style());
        assert_eq!(result, Err(MeasureError::InvalidWidth(0.0)));
    }
}
