//! Struct-log trace processing
//!
//! - [`normalize`]: LOG data length alignment, run before any decoding
//! - [`call_tree`]: call tree reconstruction from depth and jump depth

pub mod call_tree;
pub mod normalize;

pub use call_tree::{build_call_tree, CallTreeBuilder, CollapsePredicate, FrameOpening};
pub use normalize::{normalize, normalized};
