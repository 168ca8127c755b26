use std::collections::HashMap;

use tracing::debug;

use crate::error::ApiCallError;
use crate::provider::retry::{is_retryable_status, retry_after_from_headers};

use super::types::ErrorBody;

/// Non-2xx HTTP response as handed over by the transport.
#[derive(Debug, Clone, Copy)]
pub struct FailedResponse<'a> {
    pub url: &'a str,
    pub status: u16,
    /// Reason phrase such as `Too Many Requests`; may be empty.
    pub status_text: &'a str,
    pub headers: &'a HashMap<String, String>,
    pub body: &'a [u8],
}

/// Decodes an OpenRouter failure into an [`ApiCallError`].
///
/// A body that is not `{"error": {...}}` JSON falls back to a message built
/// from the status line.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use parley_llm::provider::openrouter::{FailedResponse, decode_error};
///
/// let headers = HashMap::new();
/// let err = decode_error(FailedResponse {
///     url: "https://openrouter.ai/api/v1/chat/completions",
///     status: 429,
///     status_text: "Too Many Requests",
///     headers: &headers,
///     body: br#"{"error":{"message":"Rate limit exceeded","code":429}}"#,
/// });
/// assert_eq!(err.message, "Rate limit exceeded");
/// assert!(err.retryable);
/// ```
pub fn decode_error(response: FailedResponse<'_>) -> ApiCallError {
    let FailedResponse {
        url,
        status,
        status_text,
        headers,
        body,
    } = response;

    let mut error = ApiCallError {
        message: format!("{status} {status_text}").trim_end().to_string(),
        status_code: status,
        url: url.to_string(),
        retryable: is_retryable_status(status),
        retry_after: retry_after_from_headers(headers),
        error_type: None,
        code: None,
        data: None,
    };

    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => {
            if !parsed.error.message.is_empty() {
                error.message = parsed.error.message.clone();
            }
            error.error_type = parsed.error.error_type.clone();
            error.code = parsed.error.code_string();
            error.data = serde_json::to_value(&parsed).ok();
        }
        Err(err) => debug!(status, %err, "error body is not provider JSON"),
    }
    error
}
