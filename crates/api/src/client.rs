//! Resilient request executor for the catalog endpoint.
//!
//! The backend is a web-script deployment that sometimes 30x-redirects its own
//! endpoint and sometimes rejects a JSON POST with 405. One logical request is
//! therefore run through a fixed ladder:
//!
//! ```text
//! Direct ──200/other──────────────▶ Done
//!   ├─ 301/302/303 + Location ──▶ Redirect ──▶ Done
//!   ├─ 301/302/303, no Location ─▶ Done (redirect_no_location)
//!   └─ 405 ─────────────────────▶ AlternativeMethod ──▶ Done
//! ```
//!
//! Only `Direct` can escalate; the follow-up states return an envelope, so no
//! state ever runs twice for one request.

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use catalog_core::catalog::{envelope_status, CatalogRecord, RemoteEnvelope, RemoteRequest};
use catalog_core::sync::CatalogRemoteTrait;

use crate::codec::{self, body_preview, HTTP_OK};
use crate::config::ApiConfig;
use crate::error::Result;
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport};

const ACTION_PARAM: &str = "action";

/// Returns `url` with `action` set to `action`, keeping any other query pairs.
fn with_action(url: &Url, action: &str) -> Url {
    let retained = url
        .query_pairs()
        .filter(|(key, _)| key != ACTION_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect::<Vec<_>>();

    let mut url = url.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(ACTION_PARAM, action);
    url
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301..=303)
}

const METHOD_NOT_ALLOWED: u16 = 405;

/// Where the direct call left the ladder.
enum DirectOutcome<T> {
    Done(RemoteEnvelope<T>),
    Redirect(Url),
    AlternativeMethod,
}

/// Client for the single catalog endpoint.
#[derive(Clone)]
pub struct CatalogApiClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: Url,
}

impl CatalogApiClient {
    /// Create a client with the reqwest transport.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = config.endpoint_url()?;
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(endpoint, Arc::new(transport)))
    }

    pub fn with_transport(endpoint: Url, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    /// Runs one logical request through the ladder. Never fails: every terminal
    /// condition is an envelope, synthesized when nothing usable came back.
    pub async fn execute<T: DeserializeOwned>(&self, request: &RemoteRequest) -> RemoteEnvelope<T> {
        match self.direct(request).await {
            DirectOutcome::Done(envelope) => envelope,
            DirectOutcome::Redirect(target) => self.follow_redirect(request, target).await,
            DirectOutcome::AlternativeMethod => self.submit_alternative(request).await,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Direct
    // ─────────────────────────────────────────────────────────────────────────

    /// POST {endpoint}?action={kind action} with a JSON body.
    async fn direct<T: DeserializeOwned>(&self, request: &RemoteRequest) -> DirectOutcome<T> {
        let url = with_action(&self.endpoint, request.kind.action());
        debug!("[CatalogApi] {} request: POST {}", request.kind, url);

        let response = match self
            .transport
            .post(HttpRequest::json(url.as_str(), codec::encode_json_body(request)))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("[CatalogApi] {} request failed: {}", request.kind, err);
                return DirectOutcome::Done(RemoteEnvelope::synthesized(
                    envelope_status::NETWORK_ERROR,
                    format!("Network error: {}", err),
                ));
            }
        };

        if is_redirect(response.status) {
            let location = response
                .location
                .as_deref()
                .map(str::trim)
                .filter(|location| !location.is_empty());
            let Some(location) = location else {
                warn!(
                    "[CatalogApi] {} got HTTP {} without Location",
                    request.kind, response.status
                );
                return DirectOutcome::Done(RemoteEnvelope::synthesized(
                    envelope_status::REDIRECT_NO_LOCATION,
                    format!("HTTP {} without a Location header", response.status),
                ));
            };
            return match url.join(location) {
                Ok(target) => {
                    debug!(
                        "[CatalogApi] {} redirected (HTTP {}) to {}",
                        request.kind, response.status, target
                    );
                    DirectOutcome::Redirect(target)
                }
                Err(err) => {
                    warn!(
                        "[CatalogApi] {} unusable Location '{}': {}",
                        request.kind, location, err
                    );
                    DirectOutcome::Done(RemoteEnvelope::synthesized(
                        envelope_status::REDIRECT_NO_LOCATION,
                        format!("Unusable Location '{}': {}", location, err),
                    ))
                }
            };
        }

        if response.status == METHOD_NOT_ALLOWED {
            info!(
                "[CatalogApi] {} JSON POST rejected (405), retrying as form submission",
                request.kind
            );
            return DirectOutcome::AlternativeMethod;
        }

        DirectOutcome::Done(codec::decode_envelope(response.status, &response.body))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Redirect
    // ─────────────────────────────────────────────────────────────────────────

    /// Reissues the JSON POST to the redirect target, once.
    async fn follow_redirect<T: DeserializeOwned>(
        &self,
        request: &RemoteRequest,
        target: Url,
    ) -> RemoteEnvelope<T> {
        let url = with_action(&target, request.kind.action());

        let response = match self
            .transport
            .post(HttpRequest::json(url.as_str(), codec::encode_json_body(request)))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("[CatalogApi] {} redirect request failed: {}", request.kind, err);
                return RemoteEnvelope::synthesized(
                    envelope_status::REDIRECT_ERROR,
                    format!("Redirect request failed: {}", err),
                );
            }
        };

        if response.status != HTTP_OK {
            warn!(
                "[CatalogApi] {} redirect target answered HTTP {}: {}",
                request.kind,
                response.status,
                body_preview(&response.body)
            );
            return RemoteEnvelope::synthesized(
                envelope_status::REDIRECT_FAILED,
                format!("Redirect target returned HTTP {}: {}", response.status, response.body),
            );
        }

        let mut envelope = codec::decode_envelope(response.status, &response.body);
        if envelope.status == envelope_status::INVALID_RESPONSE {
            envelope.status = envelope_status::REDIRECT_INVALID_RESPONSE.to_string();
        }
        envelope
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Alternative method
    // ─────────────────────────────────────────────────────────────────────────

    /// Reissues the request as a form submission to the endpoint, once.
    async fn submit_alternative<T: DeserializeOwned>(
        &self,
        request: &RemoteRequest,
    ) -> RemoteEnvelope<T> {
        let response = match self
            .transport
            .post(HttpRequest::form(
                self.endpoint.as_str(),
                codec::encode_form_fields(request),
            ))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("[CatalogApi] {} form submission failed: {}", request.kind, err);
                return RemoteEnvelope::synthesized(
                    envelope_status::ALTERNATIVE_ERROR,
                    format!("Form submission failed: {}", err),
                );
            }
        };

        if response.status != HTTP_OK {
            warn!(
                "[CatalogApi] {} form submission answered HTTP {}: {}",
                request.kind,
                response.status,
                body_preview(&response.body)
            );
            return RemoteEnvelope::synthesized(
                envelope_status::ALTERNATIVE_FAILED,
                format!("Form submission returned HTTP {}: {}", response.status, response.body),
            );
        }

        codec::decode_envelope(response.status, &response.body)
    }
}

#[async_trait]
impl<R: CatalogRecord> CatalogRemoteTrait<R> for CatalogApiClient {
    async fn fetch(&self, request: RemoteRequest) -> RemoteEnvelope<R> {
        self.execute(&request).await
    }
}
