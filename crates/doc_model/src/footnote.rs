//! Footnote model
//!
//! A footnote belongs to one document revision and is anchored to a character
//! offset in that revision's text. Footnotes are soft-deleted when trashed so
//! that they can be restored; only active footnotes take part in numbering
//! and pagination.

use crate::{DocModelError, FootnoteId, Result, RevisionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Footnote State
// =============================================================================

/// Lifecycle state of a footnote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FootnoteState {
    /// Visible, numbered, and laid out
    Active,
    /// Trashed but restorable
    Deleted,
}

impl FootnoteState {
    fn as_str(&self) -> &'static str {
        match self {
            FootnoteState::Active => "active",
            FootnoteState::Deleted => "deleted",
        }
    }
}

// =============================================================================
// Footnote
// =============================================================================

/// A footnote anchored in the document text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footnote {
    /// Unique ID
    pub id: FootnoteId,
    /// Revision that owns this footnote
    pub revision_id: RevisionId,
    /// Character offset of the reference marker
    pub character_position: usize,
    /// 1-based sequence number among active footnotes of the revision.
    /// Trashed footnotes keep the number they had when they were trashed.
    pub number: u32,
    /// Plain text content shown at the page bottom
    pub content: String,
    /// Whether the footnote is in the trash
    pub is_deleted: bool,
    /// When the footnote was trashed
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Footnote {
    /// Create a new, not yet numbered, active footnote
    pub fn new(revision_id: RevisionId, character_position: usize, content: impl Into<String>) -> Self {
        Self {
            id: FootnoteId::new(),
            revision_id,
            character_position,
            number: 0,
            content: content.into(),
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Set the number (builder style)
    pub fn with_number(mut self, number: u32) -> Self {
        self.number = number;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> FootnoteState {
        if self.is_deleted {
            FootnoteState::Deleted
        } else {
            FootnoteState::Active
        }
    }

    /// Check if the footnote takes part in numbering and layout
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Move the footnote to the trash
    pub fn trash(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.is_deleted {
            return Err(self.invalid_transition());
        }
        self.is_deleted = true;
        self.deleted_at = Some(at);
        Ok(())
    }

    /// Restore the footnote from the trash
    pub fn restore(&mut self) -> Result<()> {
        if !self.is_deleted {
            return Err(self.invalid_transition());
        }
        self.is_deleted = false;
        self.deleted_at = None;
        Ok(())
    }

    /// Format the visible mark for this footnote
    pub fn mark(&self, scheme: NumberingScheme) -> String {
        scheme.format(self.number)
    }

    fn invalid_transition(&self) -> DocModelError {
        DocModelError::InvalidTransition {
            id: self.id,
            state: self.state().as_str(),
        }
    }
}

// =============================================================================
// Numbering Scheme
// =============================================================================

/// How footnote numbers are rendered as marks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingScheme {
    /// 1, 2, 3, ...
    #[default]
    Arabic,
    /// i, ii, iii, iv, ...
    LowerRoman,
    /// I, II, III, IV, ...
    UpperRoman,
    /// a, b, ..., z, aa, ab, ...
    LowerLetter,
    /// A, B, ..., Z, AA, AB, ...
    UpperLetter,
    /// *, dagger, double dagger, section, pilcrow, double bar, then doubled
    Symbols,
}

const ROMAN: [(u32, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

const SYMBOLS: [char; 6] = ['*', '\u{2020}', '\u{2021}', '\u{00A7}', '\u{00B6}', '\u{2016}'];

impl NumberingScheme {
    /// Format a 1-based number. Zero formats as an empty mark.
    pub fn format(&self, number: u32) -> String {
        if number == 0 {
            return String::new();
        }
        match self {
            NumberingScheme::Arabic => number.to_string(),
            NumberingScheme::LowerRoman => roman(number).to_lowercase(),
            NumberingScheme::UpperRoman => roman(number),
            NumberingScheme::LowerLetter => letters(number, b'a'),
            NumberingScheme::UpperLetter => letters(number, b'A'),
            NumberingScheme::Symbols => {
                let repeat = ((number - 1) / 6 + 1) as usize;
                let symbol = SYMBOLS[((number - 1) % 6) as usize];
                std::iter::repeat(symbol).take(repeat).collect()
            }
        }
    }
}

fn roman(mut n: u32) -> String {
    if n > 3999 {
        return n.to_string();
    }
    let mut out = String::new();
    for (value, numeral) in ROMAN {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

fn letters(mut n: u32, base: u8) -> String {
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push((base + (n % 26) as u8) as char);
        n /= 26;
    }
    out.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_footnote_is_active() {
        let note = Footnote::new(RevisionId::new(), 12, "See chapter 3.");
        assert!(note.is_active());
        assert_eq!(note.state(), FootnoteState::Active);
        assert_eq!(note.number, 0);
        assert!(note.deleted_at.is_none());
    }

    #[test]
    fn test_trash_and_restore() {
        let mut note = Footnote::new(RevisionId::new(), 0, "x");
        let now = Utc::now();

        note.trash(now).unwrap();
        assert_eq!(note.state(), FootnoteState::Deleted);
        assert_eq!(note.deleted_at, Some(now));

        note.restore().unwrap();
        assert!(note.is_active());
        assert!(note.deleted_at.is_none());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut note = Footnote::new(RevisionId::new(), 0, "x");
        assert!(matches!(
            note.restore(),
            Err(DocModelError::InvalidTransition { state: "active", .. })
        ));

        note.trash(Utc::now()).unwrap();
        assert!(matches!(
            note.trash(Utc::now()),
            Err(DocModelError::InvalidTransition { state: "deleted", .. })
        ));
    }

    #[test]
    fn test_numbering_scheme_roman() {
        assert_eq!(NumberingScheme::LowerRoman.format(4), "iv");
        assert_eq!(NumberingScheme::LowerRoman.format(9), "ix");
        assert_eq!(NumberingScheme::UpperRoman.format(1999), "MCMXCIX");
        assert_eq!(NumberingScheme::UpperRoman.format(4000), "4000");
    }

    #[test]
    fn test_numbering_scheme_letter() {
        assert_eq!(NumberingScheme::LowerLetter.format(1), "a");
        assert_eq!(NumberingScheme::LowerLetter.format(26), "z");
        assert_eq!(NumberingScheme::LowerLetter.format(27), "aa");
        assert_eq!(NumberingScheme::UpperLetter.format(52), "AZ");
    }

    #[test]
    fn test_numbering_scheme_symbols() {
        assert_eq!(NumberingScheme::Symbols.format(1), "*");
        assert_eq!(NumberingScheme::Symbols.format(2), "\u{2020}");
        assert_eq!(NumberingScheme::Symbols.format(7), "**");
        assert_eq!(NumberingScheme::Symbols.format(13), "***");
    }

    #[test]
    fn test_mark_uses_number() {
        let note = Footnote::new(RevisionId::new(), 0, "x").with_number(3);
        assert_eq!(note.mark(NumberingScheme::Arabic), "3");
        assert_eq!(note.mark(NumberingScheme::LowerRoman), "iii");
        assert_eq!(Footnote::new(RevisionId::new(), 0, "x").mark(NumberingScheme::Arabic), "");
    }
}
