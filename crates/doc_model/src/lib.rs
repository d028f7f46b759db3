//! Document Model - Document snapshots and footnotes
//!
//! This crate provides the immutable document snapshots that pagination runs
//! on, the footnote model with its soft-delete lifecycle, and the
//! revision-scoped renumbering protocol that keeps footnote numbers in
//! document order.

mod document;
mod error;
mod footnote;
mod ids;
mod renumber;
mod store;

pub use document::*;
pub use error::*;
pub use footnote::*;
pub use ids::*;
pub use renumber::*;
pub use store::*;
