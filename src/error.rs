//! Various errors module.

use core::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub use crate::api::auth::AuthError;
pub use crate::api::tiktok::connect::ConnectError;
pub use crate::api::tiktok::post::SubmissionError;
pub use crate::config::ConfigError;

/// A structured failure reported by the upstream provider (TikTok), found under
/// `data.error` in the response envelope. Passed through verbatim.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderError {
    /// Provider error code *(example: `spam_risk_too_many_posts`)*.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub code: String,
    /// Provider description of the failure.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub message: String,
    /// Provider log identifier, useful when contacting their support.
    #[serde(deserialize_with = "crate::de::null_as_default")]
    pub log_id: String,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (log id {})", self.code, self.message, self.log_id)
    }
}

/// Local validation failures. These are raised before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No media was attached (empty file, empty photo set).
    #[error("Please select a file or provide a URL to upload.")]
    MissingMedia,
    /// The caption is empty or whitespace only.
    #[error("Please enter a title for your post.")]
    EmptyCaption,
    /// The given video URL is not a well-formed absolute URL.
    #[error("Please enter a valid URL: {0}")]
    InvalidUrl(String),
    /// The cover index does not point into the photo set.
    #[error("Cover index {index} is out of bounds for {len} photo(s).")]
    CoverIndexOutOfBounds {
        /// Requested cover index.
        index: usize,
        /// Number of photos in the set.
        len: usize,
    },
    /// The media content type could not be understood.
    #[error("Unsupported content type: {0}")]
    InvalidContentType(String),
}

/// Represents errors of the read-only queries (profile, videos, video detail)
/// and of the publish status poller.
#[derive(Error, Debug)]
pub enum FetchError {
    /// No bearer token is stored. The request was not sent.
    #[error("You must be logged in to perform this request.")]
    NotLoggedIn,
    /// A required argument (video id, publish id) was empty. The request was not sent.
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),
    /// Communication with the backend was successful,
    /// but it returned a non-2xx HTTP status.
    #[error("{message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Backend message, or a generic fallback.
        message: String,
    },
    /// The backend answered `2xx` with `success: false` or without a payload.
    #[error("{0}")]
    Unsuccessful(String),
    /// The requested video does not exist.
    #[error("Video not found")]
    NotFound,
    /// Communication with the backend failed.
    ///
    /// This could be caused by an internet outage, a wrong base URL, a timeout
    /// and similar errors.
    #[error("The communication with the Postiva API failed: {0}")]
    Unreachable(String),
    /// The response could not be parsed into the expected data structure.
    #[error("Could not parse response into the expected data structure: {0}")]
    ParseError(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::Unreachable(error.to_string())
        }
    }
}

impl FetchError {
    pub(crate) async fn from_response(response: reqwest::Response, action: &str) -> Self {
        let status = response.status().as_u16();
        let body = ErrorBody::read(response).await;

        Self::Rejected {
            status,
            message: body
                .message()
                .unwrap_or_else(|| format!("HTTP {status}: Failed to {action}")),
        }
    }
}

/// Errors of the status poller share the shape of [`FetchError`].
pub type PollError = FetchError;

/// Body of a non-2xx response.
///
/// Auth endpoints answer `{"detail": "..."}` (or a list of validation objects),
/// the TikTok endpoints answer the regular envelope. Unparseable bodies become
/// an empty `ErrorBody` so that callers fall back to a generic message.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl ErrorBody {
    pub(crate) async fn read(response: reqwest::Response) -> Self {
        response.json::<Self>().await.unwrap_or_default()
    }

    pub(crate) fn detail(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
            // [{ "loc": [...], "msg": "field required", "type": "..." }]
            Value::Array(items) => items
                .iter()
                .find_map(|item| item.get("msg").and_then(Value::as_str))
                .map(ToString::to_string),
            _ => None,
        }
    }

    pub(crate) fn message(&self) -> Option<String> {
        self.message.clone().filter(|message| !message.is_empty())
    }

    pub(crate) fn detail_or_message(&self) -> Option<String> {
        self.detail().or_else(|| self.message())
    }

    pub(crate) fn provider_error(&self) -> Option<ProviderError> {
        let error = self.data.as_ref()?.get("error")?;
        serde_json::from_value(error.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_wins_over_message() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail": "Incorrect email or password", "message": "nope"}"#)
                .unwrap();

        assert_eq!(
            body.detail_or_message().as_deref(),
            Some("Incorrect email or password")
        );
    }

    #[test]
    fn detail_list_uses_first_msg() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"detail": [{"loc": ["body", "email"], "msg": "field required", "type": "value_error.missing"}]}"#,
        )
        .unwrap();

        assert_eq!(body.detail().as_deref(), Some("field required"));
    }

    #[test]
    fn provider_error_is_read_from_data() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"success": false, "message": "Upload failed", "data": {"error": {"code": "spam_risk", "message": "too many posts", "log_id": "L1"}}}"#,
        )
        .unwrap();

        let provider = body.provider_error().unwrap();
        assert_eq!(provider.code, "spam_risk");
        assert_eq!(provider.log_id, "L1");
        assert_eq!(body.message().as_deref(), Some("Upload failed"));
    }

    #[test]
    fn empty_body_has_no_message() {
        let body = ErrorBody::default();
        assert!(body.detail_or_message().is_none());
        assert!(body.provider_error().is_none());
    }
}
