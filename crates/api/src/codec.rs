//! Envelope codec: request payloads out, typed envelopes in.
//!
//! Decoding never fails. Every way a body can be wrong becomes a synthesized
//! envelope so the executor can keep classifying instead of unwinding.

use catalog_core::catalog::{envelope_status, RemoteEnvelope, RemoteRequest};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::json;

pub const HTTP_OK: u16 = 200;

const MAX_LOG_BODY_CHARS: usize = 512;

pub(crate) fn body_preview(body: &str) -> String {
    let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
    if body.chars().count() > MAX_LOG_BODY_CHARS {
        preview.push_str("...");
    }
    preview
}

/// JSON body of the primary call: `{sessionToken}` plus `productCategoryId` for products.
pub fn encode_json_body(request: &RemoteRequest) -> serde_json::Value {
    let mut body = json!({ "sessionToken": request.session_token });
    if let Some(category_id) = request.product_category_id() {
        body["productCategoryId"] = json!(category_id);
    }
    body
}

/// Form fields of the alternative submission. Same payload, with `action` as a field.
pub fn encode_form_fields(request: &RemoteRequest) -> Vec<(String, String)> {
    let mut fields = vec![
        ("action".to_string(), request.kind.action().to_string()),
        ("sessionToken".to_string(), request.session_token.clone()),
    ];
    if let Some(category_id) = request.product_category_id() {
        fields.push(("productCategoryId".to_string(), category_id.to_string()));
    }
    fields
}

/// Turns an HTTP status and raw body into an envelope.
///
/// - non-200: `unexpected_status`, body not parsed
/// - 200 whose first non-blank char is neither `{` nor `[`: `invalid_response`
/// - 200 JSON that does not fit the envelope: `parse_error`
///
/// Synthesized messages keep the raw body.
pub fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str) -> RemoteEnvelope<T> {
    if status != HTTP_OK {
        debug!("[CatalogApi] Response error ({}): {}", status, body_preview(body));
        return RemoteEnvelope::synthesized(
            envelope_status::UNEXPECTED_STATUS,
            format!("HTTP {}: {}", status, body),
        );
    }

    let trimmed = body.trim();
    if !matches!(trimmed.chars().next(), Some('{') | Some('[')) {
        warn!("[CatalogApi] Non-JSON body: {}", body_preview(body));
        return RemoteEnvelope::synthesized(
            envelope_status::INVALID_RESPONSE,
            format!("Expected JSON response but received: {}", body),
        );
    }

    serde_json::from_str::<RemoteEnvelope<T>>(trimmed).unwrap_or_else(|e| {
        warn!(
            "[CatalogApi] Failed to deserialize response. Body: {}, Error: {}",
            body_preview(body),
            e
        );
        RemoteEnvelope::synthesized(
            envelope_status::PARSE_ERROR,
            format!("Failed to parse response: {}; body: {}", e, body),
        )
    })
}
