//! Decoded (or synthesized) response envelope.

use serde::{Deserialize, Serialize};

use super::lenient;

/// Envelope status vocabulary. `success` and `debug` come from the backend;
/// everything else is synthesized locally when a call or a decode fails.
pub mod envelope_status {
    pub const SUCCESS: &str = "success";
    pub const DEBUG: &str = "debug";

    pub const UNEXPECTED_STATUS: &str = "unexpected_status";
    pub const INVALID_RESPONSE: &str = "invalid_response";
    pub const PARSE_ERROR: &str = "parse_error";
    pub const NETWORK_ERROR: &str = "network_error";

    pub const REDIRECT_NO_LOCATION: &str = "redirect_no_location";
    pub const REDIRECT_FAILED: &str = "redirect_failed";
    pub const REDIRECT_INVALID_RESPONSE: &str = "redirect_invalid_response";
    pub const REDIRECT_ERROR: &str = "redirect_error";

    pub const ALTERNATIVE_FAILED: &str = "alternative_failed";
    pub const ALTERNATIVE_ERROR: &str = "alternative_error";
}

/// Bilingual descriptive block attached to every response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoBlock {
    #[serde(default, deserialize_with = "lenient::string")]
    pub action: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub action_information_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub action_information_en: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RemoteEnvelope<T> {
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient::list")]
    pub data: Vec<T>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub info: InfoBlock,
}

impl<T> RemoteEnvelope<T> {
    /// Envelope standing in for a failure that produced no usable body.
    pub fn synthesized(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
            data: Vec::new(),
            info: InfoBlock::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(envelope_status::SUCCESS)
    }

    pub fn is_debug(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(envelope_status::DEBUG)
    }
}
