//! Shared test utilities for the ITWS bridge workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An ITWS product XML builder
//! - Level grid and run-length text generators
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{ItwsMessageBuilder, rle_from_levels};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
