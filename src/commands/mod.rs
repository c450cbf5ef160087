//! Command implementations for the Skillet CLI

pub mod build;
pub mod cache;
pub mod completions;
pub mod version;
