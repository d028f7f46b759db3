//! Layout Engine - Footnote-aware pagination
//!
//! This crate flows an immutable [`doc_model::Document`] snapshot onto pages
//! and reserves space at the bottom of each page for the footnotes anchored
//! on it:
//! - [`PageBreakCalculator`] finds how much body text fits a given height
//! - [`FootnoteSpaceEstimator`] measures the footnote area of a page
//! - [`PaginationEngine`] combines both in a single forward pass
//! - [`PaginationScheduler`] debounces reflow requests and publishes results
//!
//! Text measurement is delegated to the [`TextMeasurer`] trait so hosts can
//! plug in their own shaping stack.

mod cache;
mod config;
mod error;
mod footnote_space;
mod measure;
mod page_break;
mod paginator;
mod scheduler;

pub use cache::*;
pub use config::*;
pub use error::*;
pub use footnote_space::*;
pub use measure::*;
pub use page_break::*;
pub use paginator::*;
pub use scheduler::*;
