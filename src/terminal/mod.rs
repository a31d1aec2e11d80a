//! Terminal output for a running query.
//!
//! - `StatusLine` owns the single in-place progress row
//! - `ChunkAggregator` keeps word/character counts for streamed text
//! - `StreamRenderer` writes fragments above the status row

pub mod aggregator;
pub mod renderer;
pub mod status_line;
pub mod style;

#[cfg(test)]
pub(crate) mod screen;

pub use aggregator::StreamStats;
pub use renderer::StreamRenderer;
pub use status_line::StatusLine;
pub use style::OutputStyle;
