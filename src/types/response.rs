use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ContentBlock, ProviderMetadata, ReasoningBlock, ToolCallBlock};

/// Fully materialized result of a generation.
///
/// Streaming responses are folded into this shape by
/// [`crate::builder::ResponseBuilder`]; batched responses are decoded directly by
/// the provider codecs.
///
/// # Examples
///
/// ```
/// # use parley_llm::types::{ContentBlock, FinishReason, Response};
/// let response = Response {
///     content: vec![ContentBlock::text("Hello "), ContentBlock::text("World")],
///     finish_reason: Some(FinishReason::Stop),
///     ..Response::default()
/// };
/// assert_eq!(response.text(), "Hello World");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Output blocks in the order they were produced.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CallWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_probs: Vec<LogProb>,
    #[serde(default)]
    pub raw_call: RawCall,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<RawResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_info: Option<RequestInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_info: Option<ResponseInfo>,
}

impl Response {
    /// Concatenation of every text block.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> Vec<&ToolCallBlock> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn reasoning(&self) -> Vec<&ReasoningBlock> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Reasoning(reasoning) => Some(reasoning),
                _ => None,
            })
            .collect()
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    /// The provider did not report a reason, or reported one we do not recognize.
    #[default]
    Unknown,
}

/// Token accounting for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    /// Portion of `output_tokens` spent on reasoning.
    #[serde(default)]
    pub reasoning_tokens: u64,
    /// Portion of `input_tokens` served from the provider's prompt cache.
    #[serde(default)]
    pub cached_tokens: u64,
}

impl Usage {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Log probability of a single alternative token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLogProb {
    pub token: String,
    #[serde(rename = "logprob")]
    pub log_prob: f64,
}

/// Log probability of a generated token plus its most likely alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogProb {
    pub token: String,
    #[serde(rename = "logprob")]
    pub log_prob: f64,
    #[serde(default)]
    pub top_log_probs: Vec<TokenLogProb>,
}

/// Non-fatal problem with a call, such as a setting the provider ignores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CallWarning {
    UnsupportedSetting {
        setting: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    UnsupportedTool {
        tool: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Other { message: String },
}

/// Prompt and settings exactly as sent to the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_prompt: Option<Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub raw_settings: HashMap<String, Value>,
}

impl RawCall {
    pub fn is_empty(&self) -> bool {
        self.raw_prompt.is_none() && self.raw_settings.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    /// JSON body sent to the provider.
    #[serde(default)]
    pub body: String,
}

/// Identity of the generated response as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub model_id: String,
}
