//! Canonical conversation model shared by every codec in the crate.
//!
//! A prompt is an ordered list of [`Message`]s; each message carries typed
//! [`ContentBlock`]s. Providers translate these into their own wire format and
//! translate responses back into [`Response`] values.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod event;
mod response;

pub use event::{Source, StreamEvent, StreamMetadata};
pub use response::{
    CallWarning, FinishReason, LogProb, RawCall, RawResponse, RequestInfo, Response,
    ResponseInfo, TokenLogProb, Usage,
};

/// Opaque provider-specific extensions keyed by provider name.
///
/// The core never interprets the values; they are carried through so that a
/// provider can round-trip its own extensions.
///
/// # Examples
///
/// ```
/// # use parley_llm::types::ProviderMetadata;
/// # use serde_json::json;
/// let mut metadata = ProviderMetadata::new();
/// metadata.set("openrouter", json!({ "cache_control": "ephemeral" }));
/// assert!(metadata.has("openrouter"));
/// assert!(!metadata.has("anthropic"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderMetadata(HashMap<String, Value>);

impl ProviderMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value stored for `provider`.
    pub fn get(&self, provider: &str) -> Option<&Value> {
        self.0.get(provider)
    }

    /// Deserializes the value stored for `provider` into `T`.
    ///
    /// Returns `None` when the provider is absent or the value has a different shape.
    pub fn get_as<T: DeserializeOwned>(&self, provider: &str) -> Option<T> {
        self.0
            .get(provider)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set(&mut self, provider: impl Into<String>, value: Value) {
        self.0.insert(provider.into(), value);
    }

    pub fn has(&self, provider: &str) -> bool {
        self.0.contains_key(provider)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every entry of `other` into `self`, replacing entries with the same key.
    pub fn merge(&mut self, other: ProviderMetadata) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<HashMap<String, Value>> for ProviderMetadata {
    fn from(map: HashMap<String, Value>) -> Self {
        Self(map)
    }
}

/// One conversational turn.
///
/// # Examples
///
/// ```
/// # use parley_llm::types::{ContentBlock, Message};
/// let prompt = vec![
///     Message::system("You are concise."),
///     Message::user(vec![
///         ContentBlock::text("Describe this image"),
///         ContentBlock::image_url("https://example.com/cat.png"),
///     ]),
/// ];
/// assert_eq!(prompt[1].role(), "user");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System(SystemMessage),
    User(UserMessage),
    Assistant(AssistantMessage),
    Tool(ToolMessage),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System(SystemMessage {
            content: content.into(),
            provider_metadata: None,
        })
    }

    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self::User(UserMessage {
            content,
            provider_metadata: None,
        })
    }

    /// Shorthand for a user message holding a single text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentBlock::text(text)])
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::Assistant(AssistantMessage {
            content,
            provider_metadata: None,
        })
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::assistant(vec![ContentBlock::text(text)])
    }

    pub fn tool(content: Vec<ToolResultBlock>) -> Self {
        Self::Tool(ToolMessage {
            content,
            provider_metadata: None,
        })
    }

    /// Wire role name of the message.
    pub fn role(&self) -> &'static str {
        match self {
            Self::System(_) => "system",
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::Tool(_) => "tool",
        }
    }

    pub fn provider_metadata(&self) -> Option<&ProviderMetadata> {
        match self {
            Self::System(msg) => msg.provider_metadata.as_ref(),
            Self::User(msg) => msg.provider_metadata.as_ref(),
            Self::Assistant(msg) => msg.provider_metadata.as_ref(),
            Self::Tool(msg) => msg.provider_metadata.as_ref(),
        }
    }
}

/// System instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

/// Message authored by the end user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

/// Message previously generated by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

/// Results of tool executions, answering earlier assistant tool calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolMessage {
    #[serde(default)]
    pub content: Vec<ToolResultBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

/// Typed unit of message or response content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentBlock {
    Text(TextBlock),
    Image(ImageBlock),
    File(FileBlock),
    ToolCall(ToolCallBlock),
    ToolResult(ToolResultBlock),
    Reasoning(ReasoningBlock),
    RedactedReasoning(RedactedReasoningBlock),
    Source(SourceBlock),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextBlock {
            text: text.into(),
            provider_metadata: None,
        })
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Image(ImageBlock::from_url(url))
    }

    pub fn tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: impl Into<String>,
    ) -> Self {
        Self::ToolCall(ToolCallBlock {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args: args.into(),
            provider_metadata: None,
        })
    }

    /// Variant name used in diagnostics and in the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::File(_) => "file",
            Self::ToolCall(_) => "tool-call",
            Self::ToolResult(_) => "tool-result",
            Self::Reasoning(_) => "reasoning",
            Self::RedactedReasoning(_) => "redacted-reasoning",
            Self::Source(_) => "source",
        }
    }
}

/// Plain text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

/// Image referenced by URL or carried inline.
///
/// When both `url` and `data` are set the URL wins; a block with neither cannot
/// be encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes::option"
    )]
    pub data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

impl ImageBlock {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_data(data: Vec<u8>, media_type: Option<String>) -> Self {
        Self {
            data: Some(data),
            media_type,
            ..Self::default()
        }
    }
}

/// Arbitrary file referenced by URL or carried inline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes::option"
    )]
    pub data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

impl FileBlock {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_data(data: Vec<u8>, media_type: Option<String>) -> Self {
        Self {
            data: Some(data),
            media_type,
            ..Self::default()
        }
    }
}

/// Tool invocation requested by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallBlock {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Raw JSON arguments exactly as produced by the model; may be malformed.
    #[serde(default)]
    pub args: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

/// Output of a tool execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_call_id: String,
    pub tool_name: String,
    /// JSON-compatible result payload.
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

impl ToolResultBlock {
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            result,
            ..Self::default()
        }
    }
}

/// Model reasoning trace, optionally signed by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningBlock {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

/// Reasoning the provider returned only in encrypted/opaque form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedactedReasoningBlock {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

/// Citation used to generate a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
}

impl From<Source> for SourceBlock {
    fn from(source: Source) -> Self {
        Self {
            id: source.id,
            url: source.url,
            title: source.title,
            provider_metadata: source.provider_metadata,
        }
    }
}

/// Serializes byte payloads as standard base64 strings.
pub(crate) mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }

    pub(crate) mod option {
        use super::*;

        pub(crate) fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
                None => serializer.serialize_none(),
            }
        }

        pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|encoded| {
                    STANDARD
                        .decode(encoded.as_bytes())
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}
