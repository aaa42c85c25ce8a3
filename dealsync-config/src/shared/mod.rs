mod api;
mod base;
mod client;
mod mapping;
mod rules;
mod service;
mod sync;

pub use api::*;
pub use base::*;
pub use client::*;
pub use mapping::*;
pub use rules::*;
pub use service::*;
pub use sync::*;
