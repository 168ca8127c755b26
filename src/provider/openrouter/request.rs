use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::LLMError;
use crate::types::{
    AssistantMessage, ContentBlock, FileBlock, ImageBlock, Message, ToolCallBlock, ToolMessage,
    UserMessage,
};

use super::types::{
    ContentPart, ImageUrl, Prompt, UserContent, WireFunction, WireMessage, WireToolCall,
    function_kind,
};

const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/jpeg";

/// Encodes a conversation into the OpenRouter chat message array.
///
/// Tool messages fan out: every tool result becomes its own wire message, so
/// the output may be longer or shorter than the input.
///
/// # Errors
///
/// Returns [`LLMError::UnsupportedContent`] for blocks the chat format cannot
/// carry in a given role, [`LLMError::InvalidPrompt`] for image or file blocks
/// without a URL or bytes, and [`LLMError::Encoding`] for tool-call arguments
/// that are not valid JSON.
///
/// # Examples
///
/// ```
/// use parley_llm::provider::openrouter::encode_prompt;
/// use parley_llm::provider::openrouter::types::{UserContent, WireMessage};
/// use parley_llm::types::Message;
///
/// let prompt = encode_prompt(&[Message::user_text("hello")]).unwrap();
/// assert_eq!(
///     prompt,
///     vec![WireMessage::User { content: UserContent::Text("hello".into()) }]
/// );
/// ```
#[tracing::instrument(level = "debug", skip_all, fields(messages = prompt.len()))]
pub fn encode_prompt(prompt: &[Message]) -> Result<Prompt, LLMError> {
    let mut messages = Vec::with_capacity(prompt.len() * 2);
    for message in prompt {
        match message {
            Message::System(system) => messages.push(WireMessage::System {
                content: system.content.clone(),
            }),
            Message::User(user) => messages.push(encode_user_message(user)?),
            Message::Assistant(assistant) => messages.push(encode_assistant_message(assistant)?),
            Message::Tool(tool) => messages.extend(encode_tool_message(tool)?),
        }
    }
    Ok(messages)
}

fn encode_user_message(message: &UserMessage) -> Result<WireMessage, LLMError> {
    if let [ContentBlock::Text(block)] = message.content.as_slice() {
        return Ok(WireMessage::User {
            content: UserContent::Text(block.text.clone()),
        });
    }

    let parts = message
        .content
        .iter()
        .map(encode_user_part)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(WireMessage::User {
        content: UserContent::Parts(parts),
    })
}

fn encode_user_part(block: &ContentBlock) -> Result<ContentPart, LLMError> {
    match block {
        ContentBlock::Text(text) => Ok(ContentPart::Text {
            text: text.text.clone(),
        }),
        ContentBlock::Image(image) => Ok(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image_url(image)?,
            },
        }),
        ContentBlock::File(file) => Ok(ContentPart::Text {
            text: file_text(file)?,
        }),
        other => Err(LLMError::UnsupportedContent {
            message_role: "user",
            block: other.kind(),
        }),
    }
}

fn image_url(image: &ImageBlock) -> Result<String, LLMError> {
    if let Some(url) = non_empty(image.url.as_deref()) {
        return Ok(url.to_string());
    }
    match &image.data {
        Some(data) => {
            let media_type =
                non_empty(image.media_type.as_deref()).unwrap_or(DEFAULT_IMAGE_MEDIA_TYPE);
            Ok(data_url(media_type, data))
        }
        None => Err(LLMError::invalid_prompt(
            "image block must carry either a url or data",
        )),
    }
}

/// Files travel as text parts: the URL, a data URL when the media type is
/// known, or otherwise the bytes read as UTF-8.
fn file_text(file: &FileBlock) -> Result<String, LLMError> {
    if let Some(url) = non_empty(file.url.as_deref()) {
        return Ok(url.to_string());
    }
    let Some(data) = &file.data else {
        return Err(LLMError::invalid_prompt(
            "file block must carry either a url or data",
        ));
    };
    Ok(match non_empty(file.media_type.as_deref()) {
        Some(media_type) => data_url(media_type, data),
        None => String::from_utf8_lossy(data).into_owned(),
    })
}

fn data_url(media_type: &str, data: &[u8]) -> String {
    format!("data:{media_type};base64,{}", STANDARD.encode(data))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn encode_assistant_message(message: &AssistantMessage) -> Result<WireMessage, LLMError> {
    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in &message.content {
        match block {
            ContentBlock::Text(text) => content.push_str(&text.text),
            ContentBlock::ToolCall(call) => tool_calls.push(encode_tool_call(call)?),
            other => {
                return Err(LLMError::UnsupportedContent {
                    message_role: "assistant",
                    block: other.kind(),
                });
            }
        }
    }
    Ok(WireMessage::Assistant {
        content,
        reasoning: None,
        tool_calls,
    })
}

fn encode_tool_call(call: &ToolCallBlock) -> Result<WireToolCall, LLMError> {
    let arguments = if call.args.trim().is_empty() {
        "{}".to_string()
    } else {
        serde_json::from_str::<serde::de::IgnoredAny>(&call.args).map_err(|err| {
            LLMError::Encoding {
                message: format!(
                    "tool call {} has invalid JSON arguments: {err}",
                    call.tool_call_id
                ),
            }
        })?;
        call.args.clone()
    };
    Ok(WireToolCall {
        kind: function_kind(),
        id: call.tool_call_id.clone(),
        function: WireFunction {
            name: call.tool_name.clone(),
            arguments,
        },
    })
}

fn encode_tool_message(message: &ToolMessage) -> Result<Vec<WireMessage>, LLMError> {
    message
        .content
        .iter()
        .map(|result| {
            let content = serde_json::to_string(&result.result).map_err(|err| LLMError::Encoding {
                message: format!("failed to encode tool result {}: {err}", result.tool_call_id),
            })?;
            Ok(WireMessage::Tool {
                content,
                tool_call_id: result.tool_call_id.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::ToolResultBlock;

    #[test]
    fn inline_image_defaults_to_jpeg_data_url() {
        let block = ContentBlock::Image(ImageBlock::from_data(vec![0xff, 0xd8], None));
        let part = encode_user_part(&block).expect("encode");
        assert_eq!(
            part,
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/jpeg;base64,/9g=".into()
                }
            }
        );
    }

    #[test]
    fn image_url_wins_over_data() {
        let block = ImageBlock {
            url: Some("https://example.com/a.png".into()),
            data: Some(vec![1]),
            ..ImageBlock::default()
        };
        assert_eq!(image_url(&block).expect("url"), "https://example.com/a.png");
    }

    #[test]
    fn file_without_media_type_is_read_as_text() {
        let file = FileBlock::from_data(b"plain notes".to_vec(), None);
        assert_eq!(file_text(&file).expect("text"), "plain notes");

        let file = FileBlock::from_data(b"%PDF".to_vec(), Some("application/pdf".into()));
        assert_eq!(
            file_text(&file).expect("text"),
            "data:application/pdf;base64,JVBERg=="
        );
    }

    #[test]
    fn empty_media_blocks_are_invalid() {
        let err = image_url(&ImageBlock::default()).unwrap_err();
        assert!(matches!(err, LLMError::InvalidPrompt { .. }));
        let err = file_text(&FileBlock::default()).unwrap_err();
        assert!(matches!(err, LLMError::InvalidPrompt { .. }));
    }

    #[test]
    fn tool_call_arguments_are_validated_and_kept_verbatim() {
        let call = ToolCallBlock {
            tool_call_id: "call_1".into(),
            tool_name: "search".into(),
            args: r#"{"q": "rust"}"#.into(),
            provider_metadata: None,
        };
        let wire = encode_tool_call(&call).expect("encode");
        assert_eq!(wire.function.arguments, r#"{"q": "rust"}"#);
        assert_eq!(wire.kind, "function");

        let empty = ToolCallBlock {
            args: String::new(),
            ..call.clone()
        };
        assert_eq!(encode_tool_call(&empty).expect("encode").function.arguments, "{}");

        let broken = ToolCallBlock {
            args: r#"{"q":"#.into(),
            ..call
        };
        assert!(matches!(
            encode_tool_call(&broken).unwrap_err(),
            LLMError::Encoding { .. }
        ));
    }

    #[test]
    fn tool_results_are_serialized_as_json_strings() {
        let message = ToolMessage {
            content: vec![ToolResultBlock::new("call_1", "search", json!("done"))],
            provider_metadata: None,
        };
        let encoded = encode_tool_message(&message).expect("encode");
        assert_eq!(
            encoded,
            vec![WireMessage::Tool {
                content: r#""done""#.into(),
                tool_call_id: "call_1".into()
            }]
        );
    }
}
