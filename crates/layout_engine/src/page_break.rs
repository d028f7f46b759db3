//! Page break calculation
//!
//! Finds how much text, starting at a given offset, fits into a container of
//! a given height. Paragraphs are measured one at a time and lines are added
//! until the next one would overflow. Forced page break markers end the page
//! right after the marker.
//!
//! The first line of a page is always taken, even when it does not fit, so
//! `compute_end` makes progress for every start offset inside the document.

use crate::{ContainerSize, MeasuredLine, TextMeasurer, TextStyle};
use doc_model::Document;

/// Characters measured at once when a paragraph is longer than this
const MEASURE_WINDOW: usize = 4096;

/// Lines at the end of a cut window that are measured again with more text
const WINDOW_TAIL_LINES: usize = 2;

/// Computes page end offsets for body text
pub struct PageBreakCalculator<'a> {
    measurer: &'a dyn TextMeasurer,
    style: &'a TextStyle,
    paragraph_spacing: f32,
}

impl<'a> PageBreakCalculator<'a> {
    /// Create a calculator for body text in the given style
    pub fn new(measurer: &'a dyn TextMeasurer, style: &'a TextStyle, paragraph_spacing: f32) -> Self {
        Self {
            measurer,
            style,
            paragraph_spacing,
        }
    }

    /// Largest end offset such that `[start, end)` fits into `container`.
    ///
    /// Returns `document.len()` when `start` is at or past the end. For any
    /// other start the result is strictly greater than `start`.
    pub fn compute_end(&self, document: &Document, start: usize, container: ContainerSize) -> usize {
        let len = document.len();
        if start >= len {
            return len;
        }

        let mut pos = start;
        let mut used = 0.0f32;

        loop {
            let paragraph_end = document.paragraph_end(pos);
            let forced = document.next_page_break(pos).filter(|&b| b < paragraph_end);
            let segment_end = forced.map(|b| b + 1).unwrap_or(paragraph_end);

            // Long paragraphs are measured a window at a time so one page
            // never pays for the rest of the paragraph
            let mut window = MEASURE_WINDOW;
            while pos < segment_end {
                let window_end = segment_end.min(pos.saturating_add(window));
                let truncated = window_end < segment_end;
                let mut lines = self.measure_segment(document, pos, window_end, container.width);
                if truncated {
                    // The tail of a cut window may break differently in full text
                    if lines.len() <= WINDOW_TAIL_LINES {
                        window = window.saturating_mul(2);
                        continue;
                    }
                    lines.truncate(lines.len() - WINDOW_TAIL_LINES);
                }

                for line in lines {
                    let remaining = window_end - pos;
                    if remaining == 0 {
                        break;
                    }
                    let height = line.height.max(0.0);
                    if pos > start && used + height > container.height {
                        return pos;
                    }
                    used += height;
                    pos += line.char_len.clamp(1, remaining);
                }

                if !truncated {
                    // Text the measurer did not account for counts as zero height
                    pos = pos.max(segment_end);
                }
                window = window.saturating_mul(2);
            }

            if forced.is_some() || pos >= len {
                return pos;
            }
            used += self.paragraph_spacing;
        }
    }

    fn measure_segment(&self, document: &Document, start: usize, end: usize, width: f32) -> Vec<MeasuredLine> {
        let text = document.slice(start..end);
        match self.measurer.measure_lines(text, width, self.style) {
            Ok(lines) => lines,
            Err(err) => {
                tracing::warn!(start, end, error = %err, "Text measurement failed; treating range as zero height");
                vec![MeasuredLine::new(end - start, 0.0)]
            }
        }
    }
}
