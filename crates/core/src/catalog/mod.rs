//! Catalog domain models: record kinds, record shapes, request and envelope.

mod catalog_model;
mod envelope_model;
pub mod lenient;

pub use catalog_model::*;
pub use envelope_model::*;
