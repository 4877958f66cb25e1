//! Utility functions for display formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_distance, format_phone, mask_phone, truncate_string};
