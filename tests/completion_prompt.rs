use parley_llm::config::{CompletionPromptOptions, InputFormat};
use parley_llm::error::LLMError;
use parley_llm::provider::openrouter::convert_to_completion_prompt;
use parley_llm::types::{ContentBlock, FileBlock, Message, ToolResultBlock};
use serde_json::json;

fn prompt_format() -> CompletionPromptOptions {
    CompletionPromptOptions::default().with_input_format(InputFormat::Prompt)
}

#[test]
fn single_user_text_passes_through() {
    let converted =
        convert_to_completion_prompt(&[Message::user_text("hello world")], &prompt_format())
            .expect("convert");
    assert_eq!(converted.prompt, "hello world");
    assert!(converted.stop_sequences.is_empty());
}

#[test]
fn system_prefix_and_trailing_assistant_label() {
    let converted = convert_to_completion_prompt(
        &[Message::system("sys"), Message::user_text("hi")],
        &prompt_format(),
    )
    .expect("convert");
    assert_eq!(converted.prompt, "sys\n\nuser:\nhi\n\nassistant:\n");
    assert_eq!(converted.stop_sequences, vec!["\nuser:".to_string()]);
}

#[test]
fn multi_turn_transcript_uses_custom_labels() {
    let options = CompletionPromptOptions::default()
        .with_user_label("Human")
        .with_assistant_label("AI");
    let converted = convert_to_completion_prompt(
        &[
            Message::user(vec![ContentBlock::text("Hi "), ContentBlock::text("there")]),
            Message::assistant_text("Hello!"),
            Message::user_text("Tell me a joke"),
        ],
        &options,
    )
    .expect("convert");
    assert_eq!(
        converted.prompt,
        "Human:\nHi there\n\nAI:\nHello!\n\nHuman:\nTell me a joke\n\nAI:\n"
    );
    assert_eq!(converted.stop_sequences, vec!["\nHuman:".to_string()]);
}

#[test]
fn late_system_message_is_invalid() {
    let err = convert_to_completion_prompt(
        &[Message::user_text("hi"), Message::system("late")],
        &CompletionPromptOptions::default(),
    )
    .unwrap_err();
    match err {
        LLMError::InvalidPrompt { message } => {
            assert!(message.contains("unexpected system message"), "{message}")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unsupported_features_are_named() {
    let cases = [
        (
            Message::tool(vec![ToolResultBlock::new("c", "t", json!(1))]),
            "tool messages",
        ),
        (
            Message::user(vec![ContentBlock::image_url("https://example.com/a.png")]),
            "images",
        ),
        (
            Message::user(vec![ContentBlock::File(FileBlock::from_url(
                "https://example.com/a.pdf",
            ))]),
            "file attachments",
        ),
        (
            Message::assistant(vec![ContentBlock::tool_call("c", "t", "{}")]),
            "tool-call messages",
        ),
    ];

    for (message, expected) in cases {
        let err = convert_to_completion_prompt(&[message], &CompletionPromptOptions::default())
            .unwrap_err();
        match err {
            LLMError::UnsupportedFunctionality { functionality } => {
                assert_eq!(functionality, expected)
            }
            other => panic!("unexpected error for {expected}: {other:?}"),
        }
    }
}

#[test]
fn prompt_format_with_history_is_formatted() {
    let converted = convert_to_completion_prompt(
        &[Message::user_text("a"), Message::assistant_text("b")],
        &prompt_format(),
    )
    .expect("convert");
    assert_eq!(converted.prompt, "user:\na\n\nassistant:\nb\n\nassistant:\n");
}
