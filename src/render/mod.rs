//! Rendering: resolved tokens → segments → normalized layout → text.

pub mod layout;
pub mod writer;

use crate::model::OutputSegment;

/// Concatenate normalized segments in order.
pub fn render(segments: &[OutputSegment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}
