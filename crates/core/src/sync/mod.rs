//! Cache-first synchronization: result contract, seams, stores and services.

mod catalog_sync;
mod catalog_sync_service;
mod memory_store;
mod session_provider;
mod sync_result_model;
mod sync_traits;

pub use catalog_sync::*;
pub use catalog_sync_service::*;
pub use memory_store::*;
pub use session_provider::*;
pub use sync_result_model::*;
pub use sync_traits::*;
