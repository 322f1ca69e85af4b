//! Core input handling
//!
//! - Encoding: BOM handling, UTF-16 conversion and UTF-8 validation

pub mod encoding;
