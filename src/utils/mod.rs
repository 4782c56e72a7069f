//! Helper utilities
//!
//! - [`error_utils`]: revert payload decoding for reverted call frames

/// Revert reason parsing
pub mod error_utils;
