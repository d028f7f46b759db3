//! Page geometry and pagination settings
//!
//! [`PageConfig`] describes the physical page and its margins and yields the
//! [`ContainerSize`] that body text is flowed into. [`PaginationSettings`]
//! holds the typographic parameters of body text and footnotes, the
//! oversized-footnote policy, and the reflow tuning knobs. Settings are plain
//! serde structs and can be loaded from JSON; missing fields take defaults.

use crate::{LayoutError, Result};
use doc_model::NumberingScheme;
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// Container Size
// =============================================================================

/// Size of the area body text is flowed into, in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: f32,
    pub height: f32,
}

impl ContainerSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Same width with a different height. Negative heights clamp to zero.
    pub fn with_height(&self, height: f32) -> Self {
        Self {
            width: self.width,
            height: height.max(0.0),
        }
    }

    /// Check that the container can be laid out into
    pub fn validate(&self) -> Result<()> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(LayoutError::InvalidContainer(format!(
                "width must be positive, got {}",
                self.width
            )));
        }
        if !self.height.is_finite() || self.height < 0.0 {
            return Err(LayoutError::InvalidContainer(format!(
                "height must not be negative, got {}",
                self.height
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Page Size and Page Config
// =============================================================================

/// Standard page sizes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSize {
    /// US Letter (8.5" x 11")
    #[default]
    Letter,
    /// A4 (210mm x 297mm)
    A4,
    /// Legal (8.5" x 14")
    Legal,
    /// Custom size in points
    Custom { width: f32, height: f32 },
}

impl PageSize {
    /// Width and height in points
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PageSize::Letter => (612.0, 792.0),
            PageSize::A4 => (595.276, 841.89),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

/// Physical page layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub page_size: PageSize,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    /// Height reserved for the running header
    pub header_height: f32,
    /// Height reserved for the running footer
    pub footer_height: f32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self::letter()
    }
}

impl PageConfig {
    /// Letter page with 1 inch margins
    pub fn letter() -> Self {
        Self::with_size(PageSize::Letter)
    }

    /// A4 page with 1 inch margins
    pub fn a4() -> Self {
        Self::with_size(PageSize::A4)
    }

    /// Legal page with 1 inch margins
    pub fn legal() -> Self {
        Self::with_size(PageSize::Legal)
    }

    /// Custom page size with 1 inch margins
    pub fn custom(width: f32, height: f32) -> Self {
        Self::with_size(PageSize::Custom { width, height })
    }

    fn with_size(page_size: PageSize) -> Self {
        Self {
            page_size,
            margin_top: 72.0,
            margin_bottom: 72.0,
            margin_left: 72.0,
            margin_right: 72.0,
            header_height: 0.0,
            footer_height: 0.0,
        }
    }

    /// Set all four margins
    pub fn with_margins(mut self, margin: f32) -> Self {
        self.margin_top = margin;
        self.margin_bottom = margin;
        self.margin_left = margin;
        self.margin_right = margin;
        self
    }

    /// Width of the text area
    pub fn content_width(&self) -> f32 {
        let (width, _) = self.page_size.dimensions();
        width - self.margin_left - self.margin_right
    }

    /// Height of the text area, including the footnote area
    pub fn content_height(&self) -> f32 {
        let (_, height) = self.page_size.dimensions();
        height - self.margin_top - self.margin_bottom - self.header_height - self.footer_height
    }

    /// Container that body text and footnotes share
    pub fn container_size(&self) -> ContainerSize {
        ContainerSize::new(self.content_width(), self.content_height())
    }
}

// =============================================================================
// Text Styles
// =============================================================================

/// Metrics of a run of uniformly styled text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Font size in points
    pub font_size: f32,
    /// Line height as a multiple of the font size
    pub line_spacing: f32,
    /// Average glyph advance as a fraction of the em
    pub average_advance: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            line_spacing: 1.2,
            average_advance: 0.6,
        }
    }
}

impl TextStyle {
    pub fn new(font_size: f32, line_spacing: f32) -> Self {
        Self {
            font_size,
            line_spacing,
            ..Default::default()
        }
    }

    /// Height of one line
    pub fn line_height(&self) -> f32 {
        self.font_size * self.line_spacing
    }

    /// Advance of one average glyph
    pub fn glyph_advance(&self) -> f32 {
        self.font_size * self.average_advance
    }
}

/// Layout parameters of the footnote area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootnoteStyle {
    /// Footnote text metrics, typically smaller than body text
    pub text: TextStyle,
    /// Space between body text and the separator rule
    pub separator_space_above: f32,
    /// Thickness of the separator rule
    pub separator_weight: f32,
    /// Space between the separator rule and the first footnote
    pub separator_space_below: f32,
    /// Separator length as a fraction of the content width
    pub separator_length: f32,
    /// Space after each footnote
    pub item_spacing: f32,
    /// Indent reserved for the footnote mark
    pub hanging_indent: f32,
    /// How footnote numbers are rendered
    pub numbering: NumberingScheme,
    /// Text of the indicator shown when a footnote continues on the next page
    pub continuation_notice: String,
}

impl Default for FootnoteStyle {
    fn default() -> Self {
        Self {
            text: TextStyle::new(10.0, 1.2),
            separator_space_above: 6.0,
            separator_weight: 0.5,
            separator_space_below: 6.0,
            separator_length: 0.33,
            item_spacing: 4.0,
            hanging_indent: 18.0,
            numbering: NumberingScheme::Arabic,
            continuation_notice: "continued on next page".to_string(),
        }
    }
}

impl FootnoteStyle {
    /// Total height of the separator block
    pub fn separator_height(&self) -> f32 {
        self.separator_space_above + self.separator_weight + self.separator_space_below
    }
}

// =============================================================================
// Pagination Settings
// =============================================================================

/// All tunables of the pagination engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationSettings {
    /// Body text metrics
    pub body: TextStyle,
    /// Footnote area layout
    pub footnotes: FootnoteStyle,
    /// Minimum body lines a page keeps when footnotes overflow
    pub min_body_lines: usize,
    /// Extra space after each paragraph
    pub paragraph_spacing: f32,
    /// Delay used to coalesce bursts of edits before reflowing
    pub debounce_ms: u64,
    /// Number of pagination results kept in the cache
    pub cache_capacity: usize,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            body: TextStyle::default(),
            footnotes: FootnoteStyle::default(),
            min_body_lines: 2,
            paragraph_spacing: 0.0,
            debounce_ms: 150,
            cache_capacity: 16,
        }
    }
}

impl PaginationSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings that cannot produce a layout
    pub fn validate(&self) -> Result<()> {
        for (name, style) in [("body", &self.body), ("footnotes.text", &self.footnotes.text)] {
            if !(style.font_size.is_finite() && style.font_size > 0.0) {
                return Err(LayoutError::InvalidSettings(format!(
                    "{name}.font_size must be positive"
                )));
            }
            if !(style.line_spacing.is_finite() && style.line_spacing > 0.0) {
                return Err(LayoutError::InvalidSettings(format!(
                    "{name}.line_spacing must be positive"
                )));
            }
        }
        if self.paragraph_spacing < 0.0 || self.footnotes.item_spacing < 0.0 {
            return Err(LayoutError::InvalidSettings(
                "spacing must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
