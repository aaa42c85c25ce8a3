//! Destination table abstractions.
//!
//! Provides the [`Destination`] trait and its implementations: Google Sheets for production
//! and an in-memory table for tests.

mod base;
pub mod memory;
pub mod sheets;

pub use base::{Destination, SheetCoordinates};
