use std::time::Duration;

use thiserror::Error;

use crate::types::Response;

/// Aggregates every failure mode exposed by the crate.
///
/// Encoding and aggregation failures are local and never worth retrying; only
/// [`LLMError::ApiCall`] carries a retry hint, see [`LLMError::is_retryable`].
#[derive(Debug, Error)]
pub enum LLMError {
    /// The prompt is structurally invalid for the target format.
    #[error("invalid prompt: {message}")]
    InvalidPrompt { message: String },
    /// A content block cannot be represented inside this message role.
    #[error("unsupported {block} block in {message_role} message")]
    UnsupportedContent {
        /// Role of the message holding the block, such as `assistant`.
        message_role: &'static str,
        /// Variant name of the offending block, such as `reasoning`.
        block: &'static str,
    },
    /// The target wire format has no representation for a feature.
    #[error("'{functionality}' functionality not supported")]
    UnsupportedFunctionality { functionality: &'static str },
    /// A payload could not be serialized into the wire format.
    #[error("encoding failed: {message}")]
    Encoding { message: String },
    /// A stream event violated the response builder state machine. The response
    /// aggregated before the rejected event is kept in `partial`.
    #[error("{source}")]
    Aggregation {
        source: AggregationError,
        partial: Box<Response>,
    },
    /// The stream reported an error; the failure carries the partial response.
    #[error(transparent)]
    StreamFailure(Box<StreamFailure>),
    /// The provider answered with a failure status.
    #[error(transparent)]
    ApiCall(Box<ApiCallError>),
    /// Wire JSON could not be parsed.
    #[error("JSON parsing failed: {message}; text: {text}")]
    JsonParse {
        /// Offending input, kept verbatim for debugging.
        text: String,
        message: String,
    },
    /// The provider returned a response without any choices.
    #[error("no content generated: {message}")]
    NoContentGenerated { message: String },
    /// Failure reported by the byte-stream transport.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The byte stream could not be framed into events.
    #[error("stream error: {message}")]
    Stream { message: String },
}

impl LLMError {
    /// Creates an [`LLMError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley_llm::error::LLMError;
    ///
    /// let err = LLMError::transport("connection reset");
    /// assert!(matches!(err, LLMError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn invalid_prompt<T: Into<String>>(message: T) -> Self {
        Self::InvalidPrompt {
            message: message.into(),
        }
    }

    pub(crate) fn json_parse(text: impl Into<String>, err: serde_json::Error) -> Self {
        Self::JsonParse {
            text: text.into(),
            message: err.to_string(),
        }
    }

    /// Response aggregated before a streaming call failed, if any.
    pub fn partial_response(&self) -> Option<&Response> {
        match self {
            Self::Aggregation { partial, .. } => Some(partial),
            Self::StreamFailure(failure) => Some(&failure.partial),
            _ => None,
        }
    }

    pub fn into_partial_response(self) -> Option<Response> {
        match self {
            Self::Aggregation { partial, .. } => Some(*partial),
            Self::StreamFailure(failure) => Some(failure.into_partial()),
            _ => None,
        }
    }

    /// Returns `true` only for provider failures flagged as retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ApiCall(err) if err.retryable)
    }
}

impl From<ApiCallError> for LLMError {
    fn from(err: ApiCallError) -> Self {
        Self::ApiCall(Box::new(err))
    }
}

/// Rejections raised by [`crate::builder::ResponseBuilder::add_event`].
///
/// A rejected event leaves the builder untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("cannot add {event} event after finish event")]
    AfterFinish { event: &'static str },
    #[error("invalid state transition: cannot add {event} in {state} state")]
    InvalidTransition {
        event: &'static str,
        state: &'static str,
    },
    #[error("cannot add reasoning signature: no content blocks exist")]
    NoReasoningBlock,
    #[error("cannot add reasoning signature: last block is a {found} block")]
    LastBlockNotReasoning { found: &'static str },
    #[error("response ID mismatch: expected {expected}, got {actual}")]
    ResponseIdMismatch { expected: String, actual: String },
    #[error("duplicate tool call ID: {id}")]
    DuplicateToolCall { id: String },
}

/// Provider failure decoded from an HTTP error response.
#[derive(Debug, Clone, Error)]
#[error("API call to {url} failed with status {status_code}: {message}")]
pub struct ApiCallError {
    pub message: String,
    pub status_code: u16,
    pub url: String,
    /// Advisory only; the crate never retries on its own.
    pub retryable: bool,
    /// Wait hint from a numeric `Retry-After` header.
    pub retry_after: Option<Duration>,
    /// Provider error `type` field, when the body parsed.
    pub error_type: Option<String>,
    /// Provider error `code` field, when the body parsed.
    pub code: Option<String>,
    /// Parsed error body, when the body was JSON.
    pub data: Option<serde_json::Value>,
}

impl ApiCallError {
    /// Returns `true` when the error code or message points at a context-window overflow.
    pub fn is_token_limit(&self) -> bool {
        let code_hit = self.code.as_deref().is_some_and(|code| {
            let code = code.to_ascii_lowercase();
            TOKEN_LIMIT_CODES.contains(&code.as_str())
        });
        let message = self.message.to_ascii_lowercase();
        code_hit
            || TOKEN_LIMIT_PHRASES
                .iter()
                .any(|phrase| message.contains(phrase))
    }
}

/// Stream-reported failure paired with whatever was aggregated before it.
#[derive(Debug, Clone, Error)]
#[error("stream error: {message}")]
pub struct StreamFailure {
    pub message: String,
    pub partial: Box<Response>,
}

impl StreamFailure {
    pub fn into_partial(self) -> Response {
        *self.partial
    }
}

impl From<StreamFailure> for LLMError {
    fn from(failure: StreamFailure) -> Self {
        Self::StreamFailure(Box::new(failure))
    }
}

const TOKEN_LIMIT_CODES: &[&str] = &[
    "context_length_exceeded",
    "max_context_length_exceeded",
    "prompt_tokens_exceeded",
    "context_window_exceeded",
];

const TOKEN_LIMIT_PHRASES: &[&str] = &[
    "context length",
    "context window",
    "token limit",
    "maximum context",
    "prompt is too long",
];
