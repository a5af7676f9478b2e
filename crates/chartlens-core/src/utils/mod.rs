//! Utility functions for display formatting.

pub mod format;

pub use format::{format_analysis_date, format_remaining, truncate_string};
