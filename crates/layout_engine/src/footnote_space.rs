//! Footnote space estimation
//!
//! This module computes how much vertical space the footnote area of a page
//! needs:
//! - One separator rule with its surrounding space
//! - The wrapped content of every footnote, indented past its mark
//! - A fixed spacing after each footnote
//!
//! Heights are measured with the same [`TextMeasurer`] used for body text, so
//! the reserve is the true rendered height and not a guess. When a set of
//! footnotes does not fit under a height cap, [`FootnoteSpaceEstimator::fit`]
//! truncates the first block that overflows at a line boundary and returns
//! the remainder as continuation blocks for the next page.

use crate::{FootnoteStyle, MeasuredLine, TextMeasurer};
use doc_model::{Footnote, FootnoteId, NumberingScheme};
use serde::{Deserialize, Serialize};

// =============================================================================
// Footnote Blocks
// =============================================================================

/// A footnote, or the part of one, waiting to be placed in a footnote area
#[derive(Debug, Clone, PartialEq)]
pub struct FootnoteBlock {
    pub footnote_id: FootnoteId,
    pub number: u32,
    /// The formatted mark
    pub mark: String,
    /// Content still to be placed
    pub text: String,
    /// Characters of the footnote content placed on earlier pages
    pub offset: usize,
    /// Length of the complete footnote content in characters
    pub total_chars: usize,
}

impl FootnoteBlock {
    /// Block holding the complete content of a footnote
    pub fn from_footnote(footnote: &Footnote, scheme: NumberingScheme) -> Self {
        Self {
            footnote_id: footnote.id,
            number: footnote.number,
            mark: footnote.mark(scheme),
            text: footnote.content.clone(),
            offset: 0,
            total_chars: footnote.content.chars().count(),
        }
    }

    /// Whether this block starts partway through its footnote
    pub fn is_continuation(&self) -> bool {
        self.offset > 0
    }

    /// Whether content of the footnote remains after this block
    pub fn continues(&self) -> bool {
        self.offset + self.text.chars().count() < self.total_chars
    }

    /// Split after `chars` characters
    fn split_at_char(&self, chars: usize) -> (FootnoteBlock, FootnoteBlock) {
        let byte = self
            .text
            .char_indices()
            .nth(chars)
            .map(|(b, _)| b)
            .unwrap_or(self.text.len());
        let head = FootnoteBlock {
            text: self.text[..byte].to_string(),
            ..self.clone()
        };
        let tail = FootnoteBlock {
            text: self.text[byte..].to_string(),
            offset: self.offset + chars,
            ..self.clone()
        };
        (head, tail)
    }
}

// =============================================================================
// Footnote Separator
// =============================================================================

/// Layout for the footnote separator line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FootnoteSeparator {
    /// Width of the separator line
    pub width: f32,
    /// Weight (thickness) of the separator line
    pub weight: f32,
    /// Space above the separator
    pub space_above: f32,
    /// Space below the separator
    pub space_below: f32,
}

impl FootnoteSeparator {
    /// Separator for a footnote area of the given width
    pub fn from_style(style: &FootnoteStyle, content_width: f32) -> Self {
        Self {
            width: content_width * style.separator_length,
            weight: style.separator_weight,
            space_above: style.separator_space_above,
            space_below: style.separator_space_below,
        }
    }

    /// Get the total height including spacing
    pub fn height(&self) -> f32 {
        self.space_above + self.weight + self.space_below
    }
}

// =============================================================================
// Continuation Notice
// =============================================================================

/// "Continued on next page" indicator below a truncated footnote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationNotice {
    pub text: String,
    pub height: f32,
}

// =============================================================================
// Placements
// =============================================================================

/// A footnote block as rendered in a page's footnote area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootnotePlacement {
    pub footnote_id: FootnoteId,
    pub number: u32,
    pub mark: String,
    pub text: String,
    /// Rendered height of the text, without item spacing
    pub height: f32,
    /// Whether this is a continuation from the previous page
    pub is_continuation: bool,
    /// Whether this footnote continues to the next page
    pub continues_to_next: bool,
}

/// Result of fitting footnote blocks under a height cap
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FootnoteFit {
    /// Height to reserve at the bottom of the page
    pub reserve: f32,
    /// Blocks rendered on this page, in order
    pub placed: Vec<FootnotePlacement>,
    /// Blocks that move to the next page
    pub carried: Vec<FootnoteBlock>,
    /// Notice shown when `carried` is not empty
    pub notice: Option<ContinuationNotice>,
}

impl FootnoteFit {
    pub fn is_empty(&self) -> bool {
        self.placed.is_empty() && self.carried.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        !self.carried.is_empty()
    }
}

// =============================================================================
// Estimator
// =============================================================================

/// Measures footnote areas
pub struct FootnoteSpaceEstimator<'a> {
    measurer: &'a dyn TextMeasurer,
    style: &'a FootnoteStyle,
}

impl<'a> FootnoteSpaceEstimator<'a> {
    pub fn new(measurer: &'a dyn TextMeasurer, style: &'a FootnoteStyle) -> Self {
        Self { measurer, style }
    }

    /// Height of the separator block
    pub fn separator_height(&self) -> f32 {
        self.style.separator_height()
    }

    /// Separator for an area of the given width
    pub fn separator(&self, width: f32) -> FootnoteSeparator {
        FootnoteSeparator::from_style(self.style, width)
    }

    /// Width available to footnote text once the mark's indent is taken
    pub fn content_width(&self, width: f32) -> f32 {
        let indented = width - self.style.hanging_indent;
        if indented > 0.0 {
            indented
        } else {
            width
        }
    }

    /// Rendered height of a block's text at `width`
    pub fn block_height(&self, block: &FootnoteBlock, width: f32) -> f32 {
        self.lines(block, width).iter().map(|l| l.height.max(0.0)).sum()
    }

    /// Total height of the footnote area holding `blocks`. Zero when empty.
    pub fn estimate(&self, blocks: &[FootnoteBlock], width: f32) -> f32 {
        if blocks.is_empty() {
            return 0.0;
        }
        let items: f32 = blocks
            .iter()
            .map(|b| self.block_height(b, width) + self.style.item_spacing)
            .sum();
        self.separator_height() + items
    }

    /// Height of the continuation indicator
    pub fn continuation_notice_height(&self, width: f32) -> f32 {
        let measured = self.measurer.measure_lines(
            &self.style.continuation_notice,
            self.content_width(width),
            &self.style.text,
        );
        match measured {
            Ok(lines) if !lines.is_empty() => lines.iter().map(|l| l.height.max(0.0)).sum(),
            _ => self.measurer.line_height(&self.style.text),
        }
    }

    /// Split a block so that its head is at most `max_height` tall.
    ///
    /// Returns `(head, tail)`. The head is `None` when not even one line
    /// fits, unless `force_one_line` is set. The tail is `None` when the
    /// whole block fits.
    pub fn split_block(
        &self,
        block: &FootnoteBlock,
        width: f32,
        max_height: f32,
        force_one_line: bool,
    ) -> (Option<FootnoteBlock>, Option<FootnoteBlock>) {
        let lines = self.lines(block, width);
        let mut used = 0.0;
        let mut chars = 0;
        let mut taken = 0;
        for line in &lines {
            let height = line.height.max(0.0);
            if used + height > max_height && !(force_one_line && taken == 0) {
                break;
            }
            used += height;
            chars += line.char_len;
            taken += 1;
        }

        if taken == lines.len() {
            return (Some(block.clone()), None);
        }
        if taken == 0 {
            return (None, Some(block.clone()));
        }
        let (head, tail) = block.split_at_char(chars);
        (Some(head), Some(tail))
    }

    /// Place `blocks` in a footnote area at most `cap` tall.
    ///
    /// When everything fits the reserve is the exact area height. Otherwise
    /// the first overflowing block is truncated, a continuation notice is
    /// added, the rest is carried, and the reserve is the whole cap (or the
    /// rendered height if a forced line makes it taller).
    pub fn fit(&self, blocks: &[FootnoteBlock], width: f32, cap: f32, force_one_line: bool) -> FootnoteFit {
        if blocks.is_empty() {
            return FootnoteFit::default();
        }

        let total = self.estimate(blocks, width);
        if total <= cap {
            return FootnoteFit {
                reserve: total,
                placed: blocks.iter().map(|b| self.place(b, width)).collect(),
                carried: Vec::new(),
                notice: None,
            };
        }

        let notice = ContinuationNotice {
            text: self.style.continuation_notice.clone(),
            height: self.continuation_notice_height(width),
        };
        let budget = cap - notice.height;
        let mut used = self.separator_height();
        let mut placed = Vec::new();
        let mut carried = Vec::new();

        for (i, block) in blocks.iter().enumerate() {
            let height = self.block_height(block, width);
            if used + height + self.style.item_spacing <= budget {
                used += height + self.style.item_spacing;
                placed.push(self.place(block, width));
                continue;
            }

            let available = budget - used - self.style.item_spacing;
            let force = force_one_line && placed.is_empty();
            let (head, tail) = self.split_block(block, width, available, force);
            if let Some(head) = head {
                let placement = self.place(&head, width);
                used += placement.height + self.style.item_spacing;
                placed.push(placement);
            }
            carried.extend(tail);
            carried.extend(blocks[i + 1..].iter().cloned());
            break;
        }

        if carried.is_empty() {
            // Only reachable when rounding differs between the total and the loop
            return FootnoteFit {
                reserve: used,
                placed,
                carried,
                notice: None,
            };
        }

        used += notice.height;
        tracing::warn!(
            cap,
            required = total,
            carried = carried.len(),
            "Footnotes exceed the available height; continuing on next page"
        );
        FootnoteFit {
            reserve: cap.max(used),
            placed,
            carried,
            notice: Some(notice),
        }
    }

    /// Rendered height of a footnote area holding `placed` and an optional
    /// continuation notice, without the cap
    pub fn rendered_height(
        &self,
        placed: &[FootnotePlacement],
        notice: Option<&ContinuationNotice>,
    ) -> f32 {
        if placed.is_empty() && notice.is_none() {
            return 0.0;
        }
        let items: f32 = placed.iter().map(|p| p.height + self.style.item_spacing).sum();
        self.separator_height() + items + notice.map(|n| n.height).unwrap_or(0.0)
    }

    fn place(&self, block: &FootnoteBlock, width: f32) -> FootnotePlacement {
        FootnotePlacement {
            footnote_id: block.footnote_id,
            number: block.number,
            mark: block.mark.clone(),
            text: block.text.clone(),
            height: self.block_height(block, width),
            is_continuation: block.is_continuation(),
            continues_to_next: block.continues(),
        }
    }

    fn lines(&self, block: &FootnoteBlock, width: f32) -> Vec<MeasuredLine> {
        match self
            .measurer
            .measure_lines(&block.text, self.content_width(width), &self.style.text)
        {
            Ok(lines) => lines,
            Err(err) => {
                tracing::warn!(footnote = %block.footnote_id, error = %err, "Footnote measurement failed; treating it as zero height");
                vec![MeasuredLine::new(block.text.chars().count(), 0.0)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FixedMetricsMeasurer, TextStyle};
    use doc_model::RevisionId;

    /// 10pt lines, 10 chars per line at width 100, no decorations
    fn plain_style() -> FootnoteStyle {
        FootnoteStyle {
            text: TextStyle {
                font_size: 10.0,
                line_spacing: 1.0,
                average_advance: 1.0,
            },
            separator_space_above: 0.0,
            separator_weight: 0.0,
            separator_space_below: 0.0,
            item_spacing: 0.0,
            hanging_indent: 0.0,
            continuation_notice: "cont.".to_string(),
            ..Default::default()
        }
    }

    fn block(lines: usize) -> FootnoteBlock {
        let text: String = (0..lines).map(|_| "xxxxxxxxx\n").collect();
        let note = Footnote::new(RevisionId::new(), 0, text).with_number(1);
        FootnoteBlock::from_footnote(&note, NumberingScheme::Arabic)
    }

    #[test]
    fn test_estimate_empty_is_zero() {
        let style = FootnoteStyle::default();
        let estimator = FootnoteSpaceEstimator::new(&FixedMetricsMeasurer, &style);
        assert_eq!(estimator.estimate(&[], 468.0), 0.0);
    }

    #[test]
    fn test_estimate_sums_separator_lines_and_spacing() {
        let mut style = plain_style();
        style.separator_space_above = 6.0;
        style.separator_weight = 0.5;
        style.separator_space_below = 6.0;
        style.item_spacing = 4.0;
        let estimator = FootnoteSpaceEstimator::new(&FixedMetricsMeasurer, &style);

        let blocks = vec![block(2), block(3)];
        assert_eq!(estimator.estimate(&blocks, 100.0), 12.5 + 20.0 + 4.0 + 30.0 + 4.0);
    }

    #[test]
    fn test_estimate_grows_with_content() {
        let style = FootnoteStyle::default();
        let estimator = FootnoteSpaceEstimator::new(&FixedMetricsMeasurer, &style);
        let short = estimator.estimate(&[block(1)], 300.0);
        let long = estimator.estimate(&[block(30)], 300.0);
        assert!(long > short);
        assert!(long > 250.0);
    }

    #[test]
    fn test_hanging_indent_narrows_text() {
        let mut style = plain_style();
        style.hanging_indent = 50.0;
        let estimator = FootnoteSpaceEstimator::new(&FixedMetricsMeasurer, &style);
        // 9 chars per line no longer fit in 5 glyphs
        assert_eq!(estimator.block_height(&block(1), 100.0), 20.0);
        assert_eq!(estimator.content_width(30.0), 30.0);
    }

    #[test]
    fn test_separator_from_style() {
        let style = FootnoteStyle::default();
        let separator = FootnoteSeparator::from_style(&style, 300.0);
        assert!((separator.width - 99.0).abs() < 0.001);
        assert_eq!(separator.height(), 12.5);
    }

    #[test]
    fn test_split_block_at_line_boundary() {
        let style = plain_style();
        let estimator = FootnoteSpaceEstimator::new(&FixedMetricsMeasurer, &style);
        let original = block(5);

        let (head, tail) = estimator.split_block(&original, 100.0, 25.0, false);
        let head = head.unwrap();
        let tail = tail.unwrap();
        assert_eq!(head.text.chars().count(), 20);
        assert!(!head.is_continuation());
        assert!(head.continues());
        assert_eq!(tail.offset, 20);
        assert!(tail.is_continuation());
        assert!(!tail.continues());
        assert_eq!(format!("{}{}", head.text, tail.text), original.text);
    }

    #[test]
    fn test_split_block_edges() {
        let style = plain_style();
        let estimator = FootnoteSpaceEstimator::new(&FixedMetricsMeasurer, &style);
        let original = block(3);

        let (head, tail) = estimator.split_block(&original, 100.0, 100.0, false);
        assert_eq!(head, Some(original.clone()));
        assert!(tail.is_none());

        let (head, tail) = estimator.split_block(&original, 100.0, 5.0, false);
        assert!(head.is_none());
        assert_eq!(tail, Some(original.clone()));

        let (head, _) = estimator.split_block(&original, 100.0, 5.0, true);
        assert_eq!(head.unwrap().text.chars().count(), 10);
    }

    #[test]
    fn test_fit_exact_when_it_fits() {
        let style = plain_style();
        let estimator = FootnoteSpaceEstimator::new(&FixedMetricsMeasurer, &style);
        let fit = estimator.fit(&[block(2), block(3)], 100.0, 100.0, false);
        assert_eq!(fit.reserve, 50.0);
        assert_eq!(fit.placed.len(), 2);
        assert!(!fit.is_truncated());
        assert_eq!(estimator.rendered_height(&fit.placed, fit.notice.as_ref()), 50.0);
    }

    #[test]
    fn test_fit_truncates_and_carries() {
        let style = plain_style();
        let estimator = FootnoteSpaceEstimator::new(&FixedMetricsMeasurer, &style);
        let blocks = vec![block(2), block(5), block(1)];

        // 10pt notice leaves 45pt: first block whole, 2 lines of the second
        let fit = estimator.fit(&blocks, 100.0, 55.0, false);
        assert_eq!(fit.reserve, 55.0);
        assert_eq!(fit.placed.len(), 2);
        assert_eq!(fit.placed[1].height, 20.0);
        assert!(fit.placed[1].continues_to_next);
        assert_eq!(fit.carried.len(), 2);
        assert_eq!(fit.carried[0].offset, 20);
        assert_eq!(fit.carried[1], blocks[2]);
        assert_eq!(fit.notice.as_ref().map(|n| n.height), Some(10.0));
        assert!(estimator.rendered_height(&fit.placed, fit.notice.as_ref()) <= fit.reserve);
    }

    #[test]
    fn test_fit_forces_one_line() {
        let style = plain_style();
        let estimator = FootnoteSpaceEstimator::new(&FixedMetricsMeasurer, &style);
        let fit = estimator.fit(&[block(3)], 100.0, 5.0, true);
        assert_eq!(fit.placed.len(), 1);
        assert_eq!(fit.placed[0].height, 10.0);
        assert_eq!(fit.reserve, 20.0);
        assert_eq!(fit.carried[0].offset, 10);
    }

    #[test]
    fn test_fit_is_monotone_in_blocks() {
        let style = FootnoteStyle::default();
        let estimator = FootnoteSpaceEstimator::new(&FixedMetricsMeasurer, &style);
        let blocks = vec![block(4), block(12), block(3)];
        for cap in [0.0, 50.0, 120.0, 400.0] {
            let mut previous = 0.0;
            for n in 0..=blocks.len() {
                let reserve = estimator.fit(&blocks[..n], 300.0, cap, false).reserve;
                assert!(reserve >= previous, "cap {cap}: {reserve} < {previous}");
                previous = reserve;
            }
        }
    }

    /// Fails on any text containing U+FFFF
    struct UnmeasurableFootnotes;

    impl TextMeasurer for UnmeasurableFootnotes {
        fn measure_lines(
            &self,
            text: &str,
            width: f32,
            style: &TextStyle,
        ) -> std::result::Result<Vec<MeasuredLine>, crate::MeasureError> {
            if text.contains('\u{FFFF}') {
                Err(crate::MeasureError::Unmeasurable("noncharacter".to_string()))
            } else {
                FixedMetricsMeasurer.measure_lines(text, width, style)
            }
        }
    }

    #[test]
    fn test_unmeasurable_footnote_counts_as_zero_height() {
        use crate::{ContainerSize, PaginationEngine, PaginationSettings};
        use std::sync::Arc;

        let mut style = plain_style();
        style.separator_weight = 0.5;
        style.item_spacing = 4.0;
        let note = Footnote::new(RevisionId::new(), 15, "bad \u{FFFF} note").with_number(1);
        let blocks = vec![FootnoteBlock::from_footnote(&note, NumberingScheme::Arabic)];

        let estimator = FootnoteSpaceEstimator::new(&UnmeasurableFootnotes, &style);
        assert_eq!(estimator.estimate(&blocks, 100.0), 0.5 + 4.0);

        let fit = estimator.fit(&blocks, 100.0, 85.0, false);
        assert!(!fit.is_truncated());
        assert_eq!(fit.placed.len(), 1);
        assert_eq!(fit.placed[0].height, 0.0);
        assert!(!fit.placed[0].continues_to_next);
        assert_eq!(fit.reserve, 4.5);

        // Pagination carries on, and the tiny reserve leaves the breaks alone
        let settings = PaginationSettings {
            body: style.text,
            footnotes: style,
            ..Default::default()
        };
        let engine = PaginationEngine::new(settings, Arc::new(UnmeasurableFootnotes));
        let text: String = (0..25).map(|_| "aaaaaaaaa\n").collect();
        let document = doc_model::Document::from_plain_text(text);
        let container = ContainerSize::new(100.0, 105.0);

        let plain = engine.compute_pages(&document, &[], container).unwrap();
        let layout = engine.compute_pages(&document, &[note.clone()], container).unwrap();
        let ranges = |l: &crate::PageLayout| -> Vec<std::ops::Range<usize>> {
            l.pages.iter().map(|p| p.character_range.clone()).collect()
        };
        assert_eq!(ranges(&layout), ranges(&plain));
        assert_eq!(ranges(&layout), vec![0..100, 100..200, 200..250]);
        assert_eq!(layout.pages[0].footnotes, vec![note.id]);
        assert_eq!(layout.pages[0].footnote_reserve, 4.5);
    }
}
