//! Source CRM abstractions.
//!
//! The [`Source`] trait covers every read the reconciliation engine performs against the CRM:
//! property catalogs, label catalogs, changed and archived deals, associations and batched
//! contact reads.

mod base;
pub mod hubspot;
pub mod memory;

pub use base::Source;
