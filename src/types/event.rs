use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::response::{CallWarning, FinishReason, LogProb, RawCall, RawResponse, RequestInfo};
use super::response::{ResponseInfo, Usage};
use super::{ProviderMetadata, base64_bytes};

/// Incremental unit of a streamed generation, in provider arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// Partial response text.
    TextDelta { text: String },
    /// Partial reasoning text.
    Reasoning { text: String },
    /// Signature for the reasoning block streamed just before it.
    ReasoningSignature { signature: String },
    /// Opaque reasoning payload.
    RedactedReasoning { data: String },
    /// Tool call delivered in one piece.
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: String,
    },
    /// Fragment of a tool call's JSON arguments.
    ToolCallDelta {
        tool_call_id: String,
        tool_name: String,
        args_delta: String,
    },
    Source { source: Source },
    /// File generated by the model.
    File {
        media_type: String,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    ResponseMetadata {
        #[serde(default)]
        id: String,
        #[serde(default)]
        model_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Last event of a well-formed stream.
    Finish {
        finish_reason: FinishReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<ProviderMetadata>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        log_probs: Vec<LogProb>,
    },
    /// Failure reported in-band by the stream.
    Error { message: String },
}

impl StreamEvent {
    pub fn text_delta(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn tool_call_delta(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_delta: impl Into<String>,
    ) -> Self {
        Self::ToolCallDelta {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args_delta: args_delta.into(),
        }
    }

    /// Finish event carrying only a reason.
    pub fn finish(finish_reason: FinishReason) -> Self {
        Self::Finish {
            finish_reason,
            usage: None,
            provider_metadata: None,
            log_probs: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text-delta",
            Self::Reasoning { .. } => "reasoning",
            Self::ReasoningSignature { .. } => "reasoning-signature",
            Self::RedactedReasoning { .. } => "redacted-reasoning",
            Self::ToolCall { .. } => "tool-call",
            Self::ToolCallDelta { .. } => "tool-call-delta",
            Self::Source { .. } => "source",
            Self::File { .. } => "file",
            Self::ResponseMetadata { .. } => "response-metadata",
            Self::Finish { .. } => "finish",
            Self::Error { .. } => "error",
        }
    }
}

/// Source cited by the model. Only `"url"` sources exist today.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default = "default_source_type")]
    pub source_type: String,
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

impl Source {
    pub fn url(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source_type: default_source_type(),
            id: id.into(),
            url: url.into(),
            title: None,
            provider_metadata: None,
        }
    }
}

fn default_source_type() -> String {
    "url".to_string()
}

/// Data known when a stream opens, delivered beside the event sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    #[serde(default)]
    pub raw_call: RawCall,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<RawResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_info: Option<RequestInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_info: Option<ResponseInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CallWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}
