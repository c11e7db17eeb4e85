//! Tri-state result stream contract and the sync error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::catalog::envelope_status;

/// Machine-readable reason carried by `SyncResult::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// 200 with a body that is not the expected JSON.
    DecodeFailed,
    /// Redirect without a usable target, or the target itself failed.
    RedirectUnresolvable,
    /// 405 and the alternative submission failed as well.
    MethodRejectedUnrecoverable,
    /// Any other non-200 status.
    HttpStatusError,
    /// Backend reported success with zero records.
    EmptyResult,
    /// Backend answered in diagnostic mode.
    DebugMode,
    /// Transport failure with no cached fallback.
    NetworkUnreachable,
    /// No session token available.
    NoSession,
    /// Well-formed envelope carrying a failure status of the backend's own.
    ServerRejected,
    /// Local cache read or write failed.
    CacheFailure,
}

impl SyncErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::DecodeFailed => "decode_failed",
            SyncErrorKind::RedirectUnresolvable => "redirect_unresolvable",
            SyncErrorKind::MethodRejectedUnrecoverable => "method_rejected_unrecoverable",
            SyncErrorKind::HttpStatusError => "http_status_error",
            SyncErrorKind::EmptyResult => "empty_result",
            SyncErrorKind::DebugMode => "debug_mode",
            SyncErrorKind::NetworkUnreachable => "network_unreachable",
            SyncErrorKind::NoSession => "no_session",
            SyncErrorKind::ServerRejected => "server_rejected",
            SyncErrorKind::CacheFailure => "cache_failure",
        }
    }

    /// Classify a non-success envelope status.
    ///
    /// Every transport-level failure of the ladder maps to `NetworkUnreachable`,
    /// whichever rung it happened on.
    pub fn for_failed_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            envelope_status::INVALID_RESPONSE | envelope_status::PARSE_ERROR => {
                SyncErrorKind::DecodeFailed
            }
            envelope_status::REDIRECT_NO_LOCATION
            | envelope_status::REDIRECT_FAILED
            | envelope_status::REDIRECT_INVALID_RESPONSE => SyncErrorKind::RedirectUnresolvable,
            envelope_status::ALTERNATIVE_FAILED => SyncErrorKind::MethodRejectedUnrecoverable,
            envelope_status::UNEXPECTED_STATUS => SyncErrorKind::HttpStatusError,
            envelope_status::NETWORK_ERROR
            | envelope_status::REDIRECT_ERROR
            | envelope_status::ALTERNATIVE_ERROR => SyncErrorKind::NetworkUnreachable,
            envelope_status::DEBUG => SyncErrorKind::DebugMode,
            _ => SyncErrorKind::ServerRejected,
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cause of a failed synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_session() -> Self {
        Self::new(SyncErrorKind::NoSession, "no session token available")
    }

    pub fn empty_result() -> Self {
        Self::new(SyncErrorKind::EmptyResult, "API returned empty data")
    }

    pub fn debug_mode(message: &str) -> Self {
        Self::new(
            SyncErrorKind::DebugMode,
            format!("debug response: {}", message),
        )
    }

    pub fn cache_failure(err: impl fmt::Display) -> Self {
        Self::new(SyncErrorKind::CacheFailure, err.to_string())
    }
}

/// What consumers observe: loading, data, or a classified error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "payload", rename_all = "snake_case")]
pub enum SyncResult<T> {
    Loading,
    Success(Vec<T>),
    Error(SyncError),
}

impl<T> SyncResult<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, SyncResult::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SyncResult::Success(_))
    }

    pub fn data(&self) -> Option<&[T]> {
        match self {
            SyncResult::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            SyncResult::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<SyncErrorKind> {
        self.error().map(|err| err.kind)
    }
}
