mod model;
mod repository;
mod tables;

pub use model::*;
pub use repository::*;
pub use tables::CacheTable;
