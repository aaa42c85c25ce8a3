//! Reconciles CRM deals into per-client spreadsheet worksheets.
//!
//! Each client cycle fetches the deals changed since a trailing window, projects them onto the
//! worksheet's header row, upserts them by deal id and finally removes rows for deals that were
//! archived or merged away.

pub mod catalog;
pub mod cycle;
pub mod destination;
pub mod error;
pub mod fetch;
pub mod header;
mod macros;
pub mod project;
pub mod reconcile;
pub mod service;
pub mod source;
pub mod transform;
pub mod types;
pub mod upsert;
