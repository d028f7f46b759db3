//! Pagination
//!
//! Flows a document onto pages of a fixed container size, reserving space at
//! the bottom of each page for the footnotes anchored on it.
//!
//! Pages are computed in a single forward pass. For each page:
//! 1. Break at full height to get a candidate end
//! 2. Reserve space for the footnotes anchored in the candidate range, plus
//!    any continuation carried from the previous page, and break again
//! 3. If the shorter page lost footnotes, reserve for the remaining set and
//!    break once more
//!
//! The footnote set only shrinks as the body gets shorter, so step 3 never
//! needs to repeat. If the page grown back in step 3 would pick up a footnote
//! again, the end from step 2 is kept; its text already fits under the
//! larger reserve. Finalized pages are never revisited.
//!
//! Footnotes that would leave fewer than `min_body_lines` of body text are
//! truncated at a line boundary and continue on the next page.

use crate::{
    ContainerSize, ContinuationNotice, FootnoteBlock, FootnoteFit, FootnotePlacement,
    FootnoteSeparator, FootnoteSpaceEstimator, FixedMetricsMeasurer, LayoutError,
    PageBreakCalculator, PaginationSettings, Result, TextMeasurer,
};
use doc_model::{Document, Footnote, FootnoteId};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

// =============================================================================
// Pages
// =============================================================================

/// One page of a pagination result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based page number
    pub index: usize,
    /// Body text on this page, as character offsets
    pub character_range: Range<usize>,
    /// Height reserved at the bottom of the page for footnotes
    pub footnote_reserve: f32,
    /// Footnotes whose reference marker lies in `character_range`, in order
    pub footnotes: Vec<FootnoteId>,
    /// Footnote content rendered on this page, continuations first
    pub placements: Vec<FootnotePlacement>,
    /// Separator rule above the footnote area, if any
    pub separator: Option<FootnoteSeparator>,
    /// Whether footnote content on this page continues on the next one
    pub continues_on_next_page: bool,
    /// Indicator printed below a footnote that continues on the next page
    pub notice: Option<ContinuationNotice>,
}

impl Page {
    pub fn start(&self) -> usize {
        self.character_range.start
    }

    pub fn end(&self) -> usize {
        self.character_range.end
    }

    /// Whether the page renders any footnote content
    pub fn has_footnotes(&self) -> bool {
        !self.placements.is_empty() || self.continues_on_next_page
    }

    /// Whether the page only holds footnote continuations
    pub fn is_footnote_only(&self) -> bool {
        self.character_range.is_empty() && self.has_footnotes()
    }

    /// Height left for body text in `container`
    pub fn body_height(&self, container: ContainerSize) -> f32 {
        (container.height - self.footnote_reserve).max(0.0)
    }
}

/// Result of paginating one document snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Container the pages were computed for
    pub container: ContainerSize,
    /// Hash of the document content the pages were computed from
    pub content_hash: u64,
    pub pages: Vec<Page>,
}

impl PageLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page showing the character at `offset`
    pub fn page_for_offset(&self, offset: usize) -> Option<&Page> {
        self.pages.iter().find(|p| p.character_range.contains(&offset))
    }

    /// Page on which a footnote's reference marker lies
    pub fn page_of_footnote(&self, id: FootnoteId) -> Option<&Page> {
        self.pages.iter().find(|p| p.footnotes.contains(&id))
    }

    /// Total height reserved for footnotes across all pages
    pub fn total_reserve(&self) -> f32 {
        self.pages.iter().map(|p| p.footnote_reserve).sum()
    }
}

// =============================================================================
// Pagination Engine
// =============================================================================

/// Computes pages for document snapshots.
///
/// The engine holds no per-document state; `compute_pages` is a pure
/// function of its arguments and may be called from any thread.
pub struct PaginationEngine {
    settings: PaginationSettings,
    measurer: Arc<dyn TextMeasurer>,
}

/// Footnotes that take part in a pagination pass, sorted by position
struct Anchors {
    positions: Vec<usize>,
    blocks: Vec<FootnoteBlock>,
}

impl Anchors {
    fn collect(document: &Document, footnotes: &[Footnote], settings: &PaginationSettings) -> Self {
        let len = document.len();
        let mut active: Vec<&Footnote> = footnotes
            .iter()
            .filter(|f| f.is_active())
            .filter(|f| {
                if f.character_position >= len {
                    tracing::warn!(
                        footnote = %f.id,
                        position = f.character_position,
                        len,
                        "Footnote reference lies outside the document; skipping"
                    );
                    return false;
                }
                true
            })
            .collect();
        // Stable, so footnotes sharing a position keep their given order
        active.sort_by_key(|f| f.character_position);

        Self {
            positions: active.iter().map(|f| f.character_position).collect(),
            blocks: active
                .iter()
                .map(|f| FootnoteBlock::from_footnote(f, settings.footnotes.numbering))
                .collect(),
        }
    }

    /// Indices of footnotes anchored in `[start, end)`
    fn members(&self, start: usize, end: usize) -> Range<usize> {
        let lo = self.positions.partition_point(|&p| p < start);
        let hi = self.positions.partition_point(|&p| p < end);
        lo..hi.max(lo)
    }
}

impl PaginationEngine {
    pub fn new(settings: PaginationSettings, measurer: Arc<dyn TextMeasurer>) -> Self {
        Self { settings, measurer }
    }

    /// Engine using the bundled fixed-metrics measurer
    pub fn with_default_measurer(settings: PaginationSettings) -> Self {
        Self::new(settings, Arc::new(FixedMetricsMeasurer))
    }

    pub fn settings(&self) -> &PaginationSettings {
        &self.settings
    }

    /// Calculator for body text
    pub fn page_break_calculator(&self) -> PageBreakCalculator<'_> {
        PageBreakCalculator::new(
            self.measurer.as_ref(),
            &self.settings.body,
            self.settings.paragraph_spacing,
        )
    }

    /// Estimator for footnote areas
    pub fn footnote_estimator(&self) -> FootnoteSpaceEstimator<'_> {
        FootnoteSpaceEstimator::new(self.measurer.as_ref(), &self.settings.footnotes)
    }

    /// Largest footnote reserve that still leaves `min_body_lines` of body text
    pub fn footnote_cap(&self, container: ContainerSize) -> f32 {
        let body_line = self.measurer.line_height(&self.settings.body);
        (container.height - self.settings.min_body_lines as f32 * body_line).max(0.0)
    }

    /// Paginate a document snapshot.
    ///
    /// Trashed footnotes are ignored. Footnotes positioned past the end of
    /// the document are dropped from this pass with a warning.
    pub fn compute_pages(
        &self,
        document: &Document,
        footnotes: &[Footnote],
        container: ContainerSize,
    ) -> Result<PageLayout> {
        container.validate()?;

        let len = document.len();
        let anchors = Anchors::collect(document, footnotes, &self.settings);
        let calculator = self.page_break_calculator();
        let estimator = self.footnote_estimator();
        let cap = self.footnote_cap(container);
        let width = container.width;

        let mut pages = Vec::new();
        let mut carry: Vec<FootnoteBlock> = Vec::new();
        let mut start = 0;

        let fit_for = |carry: &[FootnoteBlock], members: &Range<usize>| -> FootnoteFit {
            let mut blocks = carry.to_vec();
            blocks.extend_from_slice(&anchors.blocks[members.clone()]);
            estimator.fit(&blocks, width, cap, false)
        };

        while start < len {
            let candidate_end = calculator.compute_end(document, start, container);
            let candidate = anchors.members(start, candidate_end);

            let (end, members, fit) = if candidate.is_empty() && carry.is_empty() {
                (candidate_end, candidate, FootnoteFit::default())
            } else {
                let fit = fit_for(&carry, &candidate);
                let end = calculator.compute_end(document, start, container.with_height(container.height - fit.reserve));
                let members = anchors.members(start, end);
                if members == candidate {
                    (end, members, fit)
                } else {
                    let refit = fit_for(&carry, &members);
                    let regrown = calculator.compute_end(
                        document,
                        start,
                        container.with_height(container.height - refit.reserve),
                    );
                    if anchors.members(start, regrown) == members {
                        (regrown, members, refit)
                    } else {
                        (end, members, refit)
                    }
                }
            };

            if end <= start {
                return Err(LayoutError::NoProgress {
                    page: pages.len(),
                    start,
                });
            }

            let footnote_ids = anchors.blocks[members].iter().map(|b| b.footnote_id).collect();
            carry = self.push_page(&mut pages, start..end, footnote_ids, fit, width);
            start = end;
        }

        // Continuations left over at the end of the document
        while !carry.is_empty() {
            let fit = estimator.fit(&carry, width, container.height, true);
            if fit.placed.is_empty() {
                tracing::warn!(
                    remaining = carry.len(),
                    "Footnote continuation made no progress; dropping the rest"
                );
                break;
            }
            carry = self.push_page(&mut pages, len..len, Vec::new(), fit, width);
        }

        if pages.is_empty() {
            pages.push(Page {
                index: 0,
                character_range: 0..0,
                footnote_reserve: 0.0,
                footnotes: Vec::new(),
                placements: Vec::new(),
                separator: None,
                continues_on_next_page: false,
                notice: None,
            });
        }

        Ok(PageLayout {
            container,
            content_hash: document.content_hash(),
            pages,
        })
    }

    /// Append a page and return the blocks it carries to the next one
    fn push_page(
        &self,
        pages: &mut Vec<Page>,
        range: Range<usize>,
        footnotes: Vec<FootnoteId>,
        fit: FootnoteFit,
        width: f32,
    ) -> Vec<FootnoteBlock> {
        let index = pages.len();
        let estimator = self.footnote_estimator();
        let separator = (!fit.is_empty()).then(|| estimator.separator(width));
        tracing::debug!(
            page = index,
            start = range.start,
            end = range.end,
            reserve = fit.reserve,
            rendered = estimator.rendered_height(&fit.placed, fit.notice.as_ref()),
            footnotes = footnotes.len(),
            carried = fit.carried.len(),
            "Finalized page"
        );
        pages.push(Page {
            index,
            character_range: range,
            footnote_reserve: fit.reserve,
            footnotes,
            placements: fit.placed,
            separator,
            continues_on_next_page: !fit.carried.is_empty(),
            notice: fit.notice,
        });
        fit.carried
    }
}

// =============================================================================
// Tests
// =============================================================================
