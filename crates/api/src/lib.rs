//! HTTP client for the catalog endpoint.
//!
//! [`CatalogApiClient`] runs each logical request through the direct call and
//! at most one fallback (redirect or form submission), and always answers with
//! an envelope.

mod client;
pub mod codec;
mod config;
mod error;
pub mod transport;

pub use client::CatalogApiClient;
pub use config::{ApiConfig, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::{ApiError, Result};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RequestBody};
