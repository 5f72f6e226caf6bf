//! Common utilities for the foldline engine.
//!
//! This crate provides shared infrastructure used by all engine components:
//! - **Warning System** - typed, non-fatal diagnostics collected per extraction run

pub mod warning;

pub use warning::{Diagnostics, Warning, WarningKind};
