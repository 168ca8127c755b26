use crate::config::{CompletionPromptOptions, InputFormat};
use crate::error::LLMError;
use crate::types::{AssistantMessage, ContentBlock, Message, UserMessage};

/// Flattened transcript for completion-style endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionPrompt {
    pub prompt: String,
    /// Empty on the direct pass-through path.
    pub stop_sequences: Vec<String>,
}

/// Flattens a conversation into a single completion prompt.
///
/// A lone user text message under [`InputFormat::Prompt`] passes through
/// untouched. Otherwise a leading system message becomes a preamble, every turn
/// is written as `label:\ntext\n\n`, and the transcript ends with the assistant
/// label so the model continues as the assistant. The returned stop sequence
/// keeps it from writing the next user turn itself.
///
/// # Examples
///
/// ```
/// use parley_llm::config::CompletionPromptOptions;
/// use parley_llm::provider::openrouter::convert_to_completion_prompt;
/// use parley_llm::types::Message;
///
/// let converted = convert_to_completion_prompt(
///     &[Message::system("sys"), Message::user_text("hi")],
///     &CompletionPromptOptions::default(),
/// )
/// .unwrap();
/// assert_eq!(converted.prompt, "sys\n\nuser:\nhi\n\nassistant:\n");
/// assert_eq!(converted.stop_sequences, vec!["\nuser:".to_string()]);
/// ```
#[tracing::instrument(level = "debug", skip_all, fields(messages = prompt.len()))]
pub fn convert_to_completion_prompt(
    prompt: &[Message],
    options: &CompletionPromptOptions,
) -> Result<CompletionPrompt, LLMError> {
    let user = options.user_label();
    let assistant = options.assistant_label();

    if options.input_format == InputFormat::Prompt {
        if let [Message::User(message)] = prompt {
            if let [ContentBlock::Text(block)] = message.content.as_slice() {
                return Ok(CompletionPrompt {
                    prompt: block.text.clone(),
                    stop_sequences: Vec::new(),
                });
            }
        }
    }

    let mut text = String::new();
    let rest = match prompt {
        [Message::System(system), rest @ ..] => {
            text.push_str(&system.content);
            text.push_str("\n\n");
            rest
        }
        _ => prompt,
    };

    for message in rest {
        let (label, body) = match message {
            Message::System(_) => {
                return Err(LLMError::invalid_prompt(
                    "unexpected system message in prompt",
                ));
            }
            Message::User(message) => (user, user_text(message)?),
            Message::Assistant(message) => (assistant, assistant_text(message)?),
            Message::Tool(_) => {
                return Err(LLMError::UnsupportedFunctionality {
                    functionality: "tool messages",
                });
            }
        };
        text.push_str(label);
        text.push_str(":\n");
        text.push_str(&body);
        text.push_str("\n\n");
    }

    text.push_str(assistant);
    text.push_str(":\n");

    Ok(CompletionPrompt {
        prompt: text,
        stop_sequences: vec![format!("\n{user}:")],
    })
}

fn user_text(message: &UserMessage) -> Result<String, LLMError> {
    let mut text = String::new();
    for block in &message.content {
        match block {
            ContentBlock::Text(block) => text.push_str(&block.text),
            ContentBlock::Image(_) => {
                return Err(LLMError::UnsupportedFunctionality {
                    functionality: "images",
                });
            }
            ContentBlock::File(_) => {
                return Err(LLMError::UnsupportedFunctionality {
                    functionality: "file attachments",
                });
            }
            other => {
                return Err(LLMError::UnsupportedContent {
                    message_role: "user",
                    block: other.kind(),
                });
            }
        }
    }
    Ok(text)
}

fn assistant_text(message: &AssistantMessage) -> Result<String, LLMError> {
    let mut text = String::new();
    for block in &message.content {
        match block {
            ContentBlock::Text(block) => text.push_str(&block.text),
            ContentBlock::ToolCall(_) => {
                return Err(LLMError::UnsupportedFunctionality {
                    functionality: "tool-call messages",
                });
            }
            other => {
                return Err(LLMError::UnsupportedContent {
                    message_role: "assistant",
                    block: other.kind(),
                });
            }
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_format_never_passes_through() {
        let converted = convert_to_completion_prompt(
            &[Message::user_text("hello")],
            &CompletionPromptOptions::default(),
        )
        .expect("convert");
        assert_eq!(converted.prompt, "user:\nhello\n\nassistant:\n");
        assert_eq!(converted.stop_sequences, vec!["\nuser:".to_string()]);
    }

    #[test]
    fn reasoning_in_assistant_turn_is_unsupported() {
        let message = Message::assistant(vec![ContentBlock::Reasoning(Default::default())]);
        let err = convert_to_completion_prompt(&[message], &CompletionPromptOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            LLMError::UnsupportedContent {
                message_role: "assistant",
                block: "reasoning"
            }
        ));
    }
}
